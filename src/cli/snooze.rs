use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Subcommand};
use serde_json::json;

use hidebox_core_types::now_millis;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SnoozeArgs {
    #[command(subcommand)]
    pub action: SnoozeAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SnoozeAction {
    /// Suspend hiding on a domain
    Set {
        #[arg(long)]
        domain: String,

        /// Defaults to the configured snooze length
        #[arg(long)]
        minutes: Option<u64>,
    },

    /// Resume hiding on a domain
    Clear {
        #[arg(long)]
        domain: String,
    },

    /// Show whether a domain is snoozed
    Status {
        #[arg(long)]
        domain: String,
    },
}

pub async fn cmd_snooze(args: SnoozeArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let repo = ctx.repository().await?;
    let now = now_millis();
    match args.action {
        SnoozeAction::Set { domain, minutes } => {
            let minutes = minutes.unwrap_or(ctx.config().default_snooze_minutes);
            if minutes == 0 {
                bail!("snooze length must be at least one minute");
            }
            let until = repo.snooze_domain(&domain, minutes, now).await?;
            if output.is_json() {
                print_json(&json!({ "domain": domain, "until": until }))?;
            } else {
                println!("{domain} snoozed for {minutes} minutes");
            }
        }
        SnoozeAction::Clear { domain } => {
            let cleared = repo.clear_snooze(&domain).await?;
            if output.is_json() {
                print_json(&json!({ "domain": domain, "cleared": cleared }))?;
            } else if cleared {
                println!("{domain} is no longer snoozed");
            } else {
                println!("{domain} was not snoozed");
            }
        }
        SnoozeAction::Status { domain } => {
            let snoozed = repo.is_domain_snoozed(&domain, now).await?;
            let until = if snoozed {
                repo.snooze_until(&domain).await?
            } else {
                None
            };
            if output.is_json() {
                print_json(&json!({ "domain": domain, "snoozed": snoozed, "until": until }))?;
            } else {
                match until {
                    Some(until) => {
                        let left = Duration::from_secs(((until - now).max(0) / 1000) as u64);
                        let ends = DateTime::<Utc>::from_timestamp_millis(until)
                            .map(|at| at.with_timezone(&Local).format("%H:%M").to_string())
                            .unwrap_or_else(|| until.to_string());
                        println!(
                            "{domain} is snoozed until {ends} ({} left)",
                            humantime::format_duration(left)
                        );
                    }
                    None => println!("{domain} is not snoozed"),
                }
            }
        }
    }
    Ok(())
}
