use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level, cli.debug, cli.output.is_json())?;

    let command = cli.command.name();
    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    debug!(command, config = %path.display(), version = env!("CARGO_PKG_VERSION"), "hidebox starting");

    let result = dispatch(&cli, &CliContext::new(config, path)).await;
    match &result {
        Ok(()) => debug!(command, "done"),
        Err(err) => error!(command, error = %err, "hidebox {command} failed"),
    }
    result
}
