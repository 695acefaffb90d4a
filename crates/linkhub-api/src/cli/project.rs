//! Registry CLI commands: list, show, redeploy, import.

use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use linkhub_infra::legacy::import_legacy;
use linkhub_types::project::{ProjectKey, ProjectRecord};

use crate::state::AppState;

/// Registry record without the logo payloads.
#[derive(Debug, Serialize)]
struct ProjectSummary<'a> {
    key: &'a str,
    project: &'a str,
    title: &'a str,
    url: String,
    links: [&'a str; 3],
    logos: [&'a str; 3],
    revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl<'a> ProjectSummary<'a> {
    fn new(record: &'a ProjectRecord, domain_suffix: &str) -> Self {
        Self {
            key: record.key.as_str(),
            project: record.project_id.as_str(),
            title: &record.title,
            url: format!("https://{}.{domain_suffix}", record.project_id),
            links: [
                record.links[0].as_str(),
                record.links[1].as_str(),
                record.links[2].as_str(),
            ],
            logos: [
                &record.logos[0].filename,
                &record.logos[1].filename,
                &record.logos[2].filename,
            ],
            revision: record.revision,
            updated_at: record.updated_at,
        }
    }
}

/// List every registered page in a table.
pub async fn list_projects(state: &AppState, json: bool) -> Result<()> {
    let collection = state.registry.load().await?;
    let suffix = &state.config.hosting.domain_suffix;

    if json {
        let summaries: Vec<_> = collection
            .values()
            .map(|r| ProjectSummary::new(r, suffix))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if collection.is_empty() {
        println!();
        println!(
            "  {} No pages registered yet. Create one by messaging the bot: {}",
            style("i").blue().bold(),
            style("/create").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("URL").fg(Color::White),
        Cell::new("Rev").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for record in collection.values() {
        let summary = ProjectSummary::new(record, suffix);
        let updated = record
            .updated_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(summary.key).fg(Color::Yellow),
            Cell::new(summary.title).fg(Color::Cyan),
            Cell::new(&summary.url),
            Cell::new(summary.revision),
            Cell::new(updated).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} page{}",
        style(collection.len()).bold(),
        if collection.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show one page's links and logo files.
pub async fn show_project(state: &AppState, key: &str, json: bool) -> Result<()> {
    let key = ProjectKey::parse(key).ok_or_else(|| anyhow!("'{key}' is not a valid edit key"))?;
    let record = state.registry.get(&key).await?;
    let summary = ProjectSummary::new(&record, &state.config.hosting.domain_suffix);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(summary.title).cyan().bold());
    println!("  {}", style(&summary.url).underlined());
    println!();

    println!("  {}", style("── Links ──").dim());
    for (label, link) in ["Main bot", "Backup bot", "Channel"].iter().zip(summary.links) {
        println!("  {:<12}{}", style(format!("{label}:")).bold(), link);
    }
    println!();

    println!("  {}", style("── Logos ──").dim());
    for (slot, logo) in record.logos.iter().enumerate() {
        println!(
            "  {:<12}{} {}",
            style(format!("Slot {}:", slot + 1)).bold(),
            logo.filename,
            style(format!("({} bytes)", logo.bytes.len())).dim()
        );
    }
    println!();

    println!("  {}", style("── Details ──").dim());
    println!("  {:<12}{}", style("Key:").bold(), summary.key);
    println!("  {:<12}{}", style("Project:").bold(), summary.project);
    println!("  {:<12}{}", style("Revision:").bold(), summary.revision);
    println!();

    Ok(())
}

/// Redeploy every page with the current templates.
pub async fn redeploy_all(state: &AppState, json: bool) -> Result<()> {
    let publisher = state.publisher().await?;
    let reports = publisher.redeploy_all(&state.registry).await?;
    let failed = reports.iter().filter(|r| r.result.is_err()).count();

    if json {
        let rows: Vec<_> = reports
            .iter()
            .map(|r| match &r.result {
                Ok(url) => serde_json::json!({
                    "key": r.key.as_str(),
                    "project": r.project_id.as_str(),
                    "url": url,
                }),
                Err(e) => serde_json::json!({
                    "key": r.key.as_str(),
                    "project": r.project_id.as_str(),
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!();
        for report in &reports {
            match &report.result {
                Ok(url) => println!(
                    "  {} [{}] {}",
                    style("✓").green(),
                    report.key,
                    style(url).cyan()
                ),
                Err(e) => println!("  {} [{}] {}", style("✗").red(), report.key, e),
            }
        }
        println!();
        println!(
            "  {} redeployed, {} failed",
            style(reports.len() - failed).bold(),
            style(failed).bold()
        );
        println!();
    }

    if failed > 0 {
        return Err(anyhow!("{failed} of {} redeployments failed", reports.len()));
    }
    Ok(())
}

/// Import a legacy `projects.json` file into the registry.
pub async fn import(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let report = import_legacy(&state.registry, path).await?;

    if json {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| serde_json::json!({ "key": s.key, "reason": s.reason }))
            .collect();
        let imported: Vec<_> = report.imported.iter().map(|k| k.as_str()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "imported": imported,
                "skipped": skipped,
            }))?
        );
        return Ok(());
    }

    println!();
    for key in &report.imported {
        println!("  {} {}", style("✓").green(), key);
    }
    for skipped in &report.skipped {
        println!(
            "  {} {} {}",
            style("-").yellow(),
            skipped.key,
            style(format!("({})", skipped.reason)).dim()
        );
    }
    println!();
    println!(
        "  {} imported, {} skipped",
        style(report.imported.len()).bold(),
        style(report.skipped.len()).bold()
    );
    println!();

    Ok(())
}
