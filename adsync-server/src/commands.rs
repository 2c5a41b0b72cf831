use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use adsync_core::modules::config as core_config;
use adsync_core::{RunOptions, SyncEngine};
use adsync_types::models::{DryRunReport, PendingCounts};
use adsync_types::{EntityRef, SyncReport};

async fn open_engine() -> Result<(SyncEngine, Option<EntityRef>)> {
    let config = core_config::load_config().context("Failed to load configuration")?;
    let data_dir = core_config::get_data_dir().context("Failed to resolve data directory")?;
    let engine = SyncEngine::open(&config, &data_dir).await?;
    Ok((engine, config.default_network))
}

pub async fn handle_sync(network: Option<EntityRef>, fallback: bool, json: bool) -> Result<()> {
    let (engine, default_network) = open_engine().await?;
    let scope = network.or(default_network);
    let report = engine.sync_with_sink(RunOptions { scope, fallback }, &adsync_core::sync::NullSink).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(dry_run) = &report.dry_run {
            print_issues(dry_run);
        }
        print_report(&report);
    }

    if !report.success {
        anyhow::bail!(if report.aborted { "sync aborted by validation" } else { "sync finished with errors" });
    }
    Ok(())
}

pub async fn handle_validate(network: Option<EntityRef>, json: bool) -> Result<()> {
    let (engine, default_network) = open_engine().await?;
    let report = engine.dry_run(network.or(default_network)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_pending(&report.pending);
    print_issues(&report);
    if report.valid {
        println!("{} Ready to sync", "✓".green());
    } else {
        println!("{} {} blocking error(s)", "✗".red(), report.errors.len());
    }
    Ok(())
}

pub async fn handle_pending(network: Option<EntityRef>) -> Result<()> {
    let (engine, default_network) = open_engine().await?;
    let pending = engine.pending(network.or(default_network)).await?;
    print_pending(&pending);
    Ok(())
}

fn print_report(report: &SyncReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Step", "Processed", "Created", "Updated", "Blocked", "Failed", "Status"]);

    for step in report.results.values() {
        let status = if step.success {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new(step.error.as_deref().unwrap_or("failed")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(step.step.as_str()),
            Cell::new(step.count),
            Cell::new(step.created),
            Cell::new(step.updated),
            Cell::new(step.blocked),
            Cell::new(step.failed),
            status,
        ]);
    }

    println!("{table}");
    if report.fallback_applied {
        println!("{}", "Entity steps were rerun once (fallback)".yellow());
    }
    let summary = format!("{} created, {} processed", report.created_total(), report.entity_total());
    if report.success {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red(), summary);
    }
}

fn print_pending(pending: &PendingCounts) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Kind", "Pending"]);
    for (kind, count) in [
        ("networks", pending.networks),
        ("advertisers", pending.advertisers),
        ("zones", pending.zones),
        ("campaigns", pending.campaigns),
        ("advertisements", pending.advertisements),
        ("placements", pending.placements),
    ] {
        table.add_row(vec![Cell::new(kind), Cell::new(count)]);
    }
    println!("{table}");
}

fn print_issues(report: &DryRunReport) {
    for issue in &report.errors {
        println!("{} {}", "error:".red().bold(), issue);
    }
    for issue in &report.warnings {
        println!("{} {}", "warning:".yellow(), issue);
    }
}
