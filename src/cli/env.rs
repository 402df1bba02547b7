use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

/// Hide page elements with generated CSS selectors.
#[derive(Parser)]
#[command(name = "hidebox", version, about)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// YAML config; defaults to config/hidebox.yaml, then the user config dir
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Same as --log-level debug
    #[arg(short, long)]
    pub debug: bool,

    /// human or json; logs always go to stderr
    #[arg(short, long, default_value = "human")]
    pub output: crate::cli::output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
