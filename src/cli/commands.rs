use clap::Subcommand;

use super::info::StatsArgs;
use super::inspect::{ApplyArgs, InspectArgs};
use super::rules::RulesArgs;
use super::snooze::SnoozeArgs;
use super::transfer::{ExportArgs, ImportArgs};

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Manage stored hiding rules
    Rules(RulesArgs),

    /// Pause or resume hiding on a domain
    Snooze(SnoozeArgs),

    /// Write every domain and the settings to a JSON bundle
    Export(ExportArgs),

    /// Merge domains and settings from a JSON bundle
    Import(ImportArgs),

    /// Generate a selector for an element of a page fixture
    Inspect(InspectArgs),

    /// Run the page runtime over a page fixture
    Apply(ApplyArgs),

    /// Show rule counts for a domain
    Stats(StatsArgs),

    /// Show build and storage information
    Info,
}

impl Commands {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Rules(_) => "rules",
            Commands::Snooze(_) => "snooze",
            Commands::Export(_) => "export",
            Commands::Import(_) => "import",
            Commands::Inspect(_) => "inspect",
            Commands::Apply(_) => "apply",
            Commands::Stats(_) => "stats",
            Commands::Info => "info",
        }
    }
}
