use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ExportArgs {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ImportArgs {
    /// Bundle produced by `export`
    pub file: PathBuf,
}

pub async fn cmd_export(args: ExportArgs, ctx: &CliContext) -> Result<()> {
    let repo = ctx.repository().await?;
    let bundle = repo.export_all().await?;
    match args.output {
        Some(path) => {
            let rendered = serde_json::to_string_pretty(&bundle)?;
            fs::write(&path, rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                domains = bundle.domains.len(),
                "Exported data to {}",
                path.display()
            );
        }
        None => print_json(&bundle)?,
    }
    Ok(())
}

pub async fn cmd_import(args: ImportArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&content).context("Import file is not valid JSON")?;

    let repo = ctx.repository().await?;
    let summary = repo.import(&payload).await?;
    if output.is_json() {
        print_json(&summary)?;
    } else {
        println!(
            "Imported {} domain(s){}",
            summary.domains_imported,
            if summary.settings_replaced {
                " and settings"
            } else {
                ""
            }
        );
    }
    Ok(())
}
