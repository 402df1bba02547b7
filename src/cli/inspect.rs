use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::json;
use tokio::fs;

use hidebox_core_types::now_millis;
use hidebox_dom::{DocumentHandle, PageFixture, SyntheticDocument};
use hidebox_selection_session::TracingSink;
use hidebox_selector_generator::SelectorGenerator;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};
use crate::content::PageRuntime;

#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
    /// Page fixture (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// CSS selector of the element to inspect
    #[arg(long)]
    pub target: String,
}

#[derive(Args, Clone, Debug)]
pub struct ApplyArgs {
    /// Page fixture (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Print the resulting document outline
    #[arg(long)]
    pub outline: bool,
}

pub async fn load_fixture(path: &Path) -> Result<SyntheticDocument> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read page fixture {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let fixture: PageFixture = if is_yaml {
        serde_yaml::from_str(&content).context("Failed to parse page fixture")?
    } else {
        serde_json::from_str(&content).context("Failed to parse page fixture")?
    };
    Ok(SyntheticDocument::from_fixture(&fixture)?)
}

pub async fn cmd_inspect(args: InspectArgs, output: OutputFormat) -> Result<()> {
    let doc = load_fixture(&args.page).await?;
    let element = doc
        .query_selector(&args.target)?
        .ok_or_else(|| anyhow!("No element matches '{}'", args.target))?;

    let generator = SelectorGenerator::new();
    let generated = generator.generate(&doc, element);
    let description = generator.describe(&doc, element);
    let checks = generator.check_fallbacks(&doc, element);

    if output.is_json() {
        return print_json(&json!({
            "generated": generated,
            "description": description,
            "checks": checks,
        }));
    }

    println!("Element: {}", description.note());
    match &generated.selector {
        Some(selector) => {
            let strategy = generated.strategy.map(|tag| tag.name()).unwrap_or("unknown");
            println!(
                "Selector: {selector} (confidence {:.2}, {strategy})",
                generated.confidence
            );
        }
        None => println!("Selector: none found"),
    }
    if !generated.fallbacks.is_empty() {
        println!("Fallbacks:");
        for fallback in &generated.fallbacks {
            println!("  - {fallback}");
        }
    }
    if !checks.is_empty() {
        println!("Checks:");
        for check in &checks {
            let verdict = if check.valid { "ok" } else { "rejected" };
            let detail = match (&check.match_count, &check.error) {
                (_, Some(error)) => format!(" ({error})"),
                (Some(count), None) => format!(" ({count} match(es))"),
                (None, None) => String::new(),
            };
            println!("  {verdict:>8} {}{detail}", check.selector);
        }
    }
    Ok(())
}

pub async fn cmd_apply(args: ApplyArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let doc = load_fixture(&args.page).await?;
    let repo = ctx.repository().await?;
    let mut runtime = PageRuntime::new(doc, repo, Arc::new(TracingSink), ctx.config());

    let report = runtime.initialize(now_millis()).await?;
    runtime.settle().await;
    let stats = runtime.hider().stats();

    if output.is_json() {
        return print_json(&json!({
            "domain": runtime.domain(),
            "snoozed": report.snoozed,
            "stats": stats,
        }));
    }

    println!("Domain: {}", runtime.domain());
    if report.snoozed {
        println!("Snoozed: hiding suspended");
    }
    println!(
        "Rules: {}  Hidden elements: {}",
        stats.total_rules, stats.total_elements
    );
    for rule in &stats.rule_stats {
        let marker = if rule.is_effective { "+" } else { "-" };
        println!("  {marker} {} -> {}", rule.selector, rule.element_count);
    }
    if args.outline {
        println!();
        println!("{}", runtime.doc().outline());
    }
    Ok(())
}
