//! Check command implementation.

use console::style;
use std::time::Instant;
use tracing::debug;

use lt_core::AppSummary;
use lt_io::Engine;

use crate::display::{format_update_line, print_json};

/// Scan every installed app and print what can be updated.
pub async fn run(engine: &Engine, json: bool) -> Result<(), lt_core::Error> {
    let start = Instant::now();
    let outcomes = engine.check_all().await;
    let summaries: Vec<AppSummary> = outcomes.iter().map(AppSummary::from_outcome).collect();
    debug!(apps = summaries.len(), elapsed = ?start.elapsed(), "scan complete");

    if json {
        print_json(&summaries);
        return Ok(());
    }

    let updates: Vec<&AppSummary> = summaries
        .iter()
        .filter(|s| s.available_version.is_some())
        .collect();

    if updates.is_empty() {
        println!(
            "{} All {} apps are up to date ({:.1}s)",
            style("==>").cyan().bold(),
            summaries.len(),
            start.elapsed().as_secs_f64()
        );
        return Ok(());
    }

    println!(
        "{} {} of {} apps have updates ({:.1}s):",
        style("==>").cyan().bold(),
        style(updates.len()).green().bold(),
        summaries.len(),
        start.elapsed().as_secs_f64()
    );
    println!();
    for summary in &updates {
        println!("    {}", format_update_line(summary));
    }

    if updates.iter().any(|s| !s.can_install) {
        println!();
        println!(
            "    {} updates marked in yellow must be installed by hand",
            style("Note:").yellow().bold()
        );
    }

    Ok(())
}
