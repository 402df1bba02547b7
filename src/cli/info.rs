use std::time::{Duration, UNIX_EPOCH};

use anyhow::Result;
use clap::Args;
use humantime::format_rfc3339;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct StatsArgs {
    #[arg(long)]
    pub domain: String,
}

pub async fn cmd_stats(args: StatsArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let repo = ctx.repository().await?;
    let stats = repo.domain_stats(&args.domain).await?;
    if output.is_json() {
        return print_json(&stats);
    }

    println!("Domain: {}", stats.domain);
    println!(
        "Rules: {} ({} enabled)",
        stats.rules_count, stats.enabled_rules_count
    );
    if let Some(apply) = stats.apply_to_subdomains {
        println!("Applies to subdomains: {}", if apply { "yes" } else { "no" });
    }
    if let Some(updated_at) = stats.updated_at.filter(|at| *at > 0) {
        let when = UNIX_EPOCH + Duration::from_millis(updated_at as u64);
        println!("Updated: {}", format_rfc3339(when));
    }
    Ok(())
}

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let repo = ctx.repository().await?;
    let domains = repo.domains().await?;
    let snoozes = repo.snoozes().await?;
    let settings = repo.settings().await?;
    let total_rules: usize = domains.values().map(|entry| entry.rules.len()).sum();

    println!("HideBox System Information");
    println!("==========================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!();

    println!("Configuration:");
    println!("- Config File: {}", ctx.config_path().display());
    println!("- Store: {}", config.store_path.display());
    println!(
        "- Debounce: {}",
        humantime::format_duration(config.debounce())
    );
    println!("- Default Snooze: {} minutes", config.default_snooze_minutes);
    println!();

    println!("Storage:");
    println!("- Domains: {}", domains.len());
    println!("- Rules: {}", total_rules);
    println!("- Snoozed Domains: {}", snoozes.len());
    println!("- Settings Version: {}", settings.version);
    println!(
        "- Auto Apply Rules: {}",
        if settings.auto_apply_rules {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(())
}
