use super::env::CliArgs;
use super::info::{cmd_info, cmd_stats};
use super::inspect::{cmd_apply, cmd_inspect};
use super::rules::cmd_rules;
use super::snooze::cmd_snooze;
use super::transfer::{cmd_export, cmd_import};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output.clone();
    match cli.command.clone() {
        Commands::Rules(args) => cmd_rules(args, ctx, output).await,
        Commands::Snooze(args) => cmd_snooze(args, ctx, output).await,
        Commands::Export(args) => cmd_export(args, ctx).await,
        Commands::Import(args) => cmd_import(args, ctx, output).await,
        Commands::Inspect(args) => cmd_inspect(args, output).await,
        Commands::Apply(args) => cmd_apply(args, ctx, output).await,
        Commands::Stats(args) => cmd_stats(args, ctx, output).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
