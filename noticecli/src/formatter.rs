//! Output formatters for a reconciliation run

use anyhow::Result;
use colored::*;
use noticecraft_core::{ProcessConfig, RunSummary};

/// Print the inputs before the run starts
pub fn print_plan(config: &ProcessConfig) {
    println!(
        "{} {}",
        "Notification sheet:".bold(),
        config.notification.display().to_string().cyan()
    );
    println!("{}", "Arrangement tables:".bold());
    for (i, path) in config.arrangements.iter().enumerate() {
        println!("  {:2}: {}", i + 1, path.display());
    }
    let highlight = if config.highlight {
        "on".green()
    } else {
        "off".bright_black()
    };
    println!("{} {}", "Highlight:".bold(), highlight);
    println!();
}

/// Print the run summary in human-readable format
pub fn print_human(summary: &RunSummary) {
    if summary.records == 0 {
        println!("{}", "No subject rows matched an arrangement".yellow().bold());
    } else {
        println!("{}", "✓ Notification sheet filled".green().bold());
    }
    println!("  {} {}", "Output:".bold(), summary.output.display());
    println!("  {} {}", "Arrangement tables:".bold(), summary.sources);
    println!("  {} {}", "Students:".bold(), summary.students);
    println!("  {} {}", "Subject rows written:".bold(), summary.records);
}

/// Print the run summary in JSON format
pub fn print_json(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
