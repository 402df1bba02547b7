use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use hidebox_core_types::{now_millis, DomainMap, Rule, RuleId};

use super::context::CliContext;
use super::output::{print_json, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum RulesAction {
    /// List rules, optionally for one domain
    List {
        #[arg(long)]
        domain: Option<String>,
    },

    /// Add a rule by hand
    Add {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        selector: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Remove the rule with this selector
    Remove {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        selector: String,
    },

    /// Enable a rule, or disable it with --disable
    Toggle {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        disable: bool,
    },

    /// Replace a rule's note
    Note {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        note: String,
    },

    /// Let the domain's rules cover its subdomains
    Subdomains {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        disable: bool,
    },

    /// Drop every rule of a domain
    Clear {
        #[arg(long)]
        domain: String,
    },
}

pub async fn cmd_rules(args: RulesArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let repo = ctx.repository().await?;
    match args.action {
        RulesAction::List { domain } => {
            let selected: DomainMap = repo
                .domains()
                .await?
                .into_iter()
                .filter(|(name, _)| domain.as_deref().map_or(true, |wanted| wanted == name.as_str()))
                .collect();
            if output.is_json() {
                return print_json(&selected);
            }
            if selected.is_empty() {
                println!("No rules stored");
            }
            for (name, entry) in &selected {
                let scope = if entry.apply_to_subdomains { " (+subdomains)" } else { "" };
                println!("{name}{scope}");
                for rule in &entry.rules {
                    print_rule(rule);
                }
            }
        }
        RulesAction::Add {
            domain,
            selector,
            note,
        } => {
            if !hidebox_dom::is_valid_selector(&selector) {
                bail!("'{selector}' is not a valid selector");
            }
            let rule = Rule::new(selector.clone(), 1.0, now_millis()).with_note(note.unwrap_or_default());
            let added = repo.append_rule(&domain, rule.clone()).await?;
            report(&output, json!({ "added": added, "rule": rule }), || {
                if added {
                    println!("Added {} to {domain}", rule.selector);
                } else {
                    println!("{domain} already hides {selector}");
                }
            })?;
        }
        RulesAction::Remove { domain, selector } => {
            let removed = repo.remove_rule(&domain, &selector).await?;
            report(&output, json!({ "removed": removed }), || {
                if removed {
                    println!("Removed {selector} from {domain}");
                } else {
                    println!("No rule {selector} on {domain}");
                }
            })?;
        }
        RulesAction::Toggle {
            domain,
            id,
            disable,
        } => {
            let rule = repo
                .set_rule_enabled(&domain, &RuleId(id), !disable)
                .await?;
            report(&output, json!({ "rule": rule }), || print_rule(&rule))?;
        }
        RulesAction::Note { domain, id, note } => {
            let rule = repo.set_rule_note(&domain, &RuleId(id), &note).await?;
            report(&output, json!({ "rule": rule }), || print_rule(&rule))?;
        }
        RulesAction::Subdomains { domain, disable } => {
            repo.set_apply_to_subdomains(&domain, !disable).await?;
            report(&output, json!({ "applyToSubdomains": !disable }), || {
                let state = if disable { "no longer apply" } else { "now apply" };
                println!("Rules of {domain} {state} to subdomains");
            })?;
        }
        RulesAction::Clear { domain } => {
            let cleared = repo.clear_domain(&domain).await?;
            report(&output, json!({ "cleared": cleared }), || {
                if cleared {
                    println!("Cleared all rules of {domain}");
                } else {
                    println!("No rules stored for {domain}");
                }
            })?;
        }
    }
    Ok(())
}

fn print_rule(rule: &Rule) {
    let state = if rule.enabled { "on " } else { "off" };
    println!(
        "  [{state}] {}  {}  ({:.2}) {}",
        rule.id.as_str(),
        rule.selector,
        rule.confidence,
        rule.note
    );
}

fn report(output: &OutputFormat, value: serde_json::Value, human: impl FnOnce()) -> Result<()> {
    if output.is_json() {
        print_json(&value)
    } else {
        human();
        Ok(())
    }
}
