//! Read-only ingestion status.
//!
//! Derives human-readable throughput and ETA figures from the persisted
//! checkpoint. A pure read path: never mutates state, never touches the
//! network, and always reflects the last successfully checkpointed run
//! state — including the error log, so a degraded run can be diagnosed
//! without raw logs.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::progress::format_number;

/// Run the status command: read the checkpoint and print a summary.
pub fn run_status(config: &Config) -> Result<()> {
    let store = CheckpointStore::new(&config.checkpoint.path);

    let checkpoint = match store.load()? {
        Some(cp) => cp,
        None => {
            println!("FoodData Sync — Ingestion Status");
            println!("================================");
            println!();
            println!("  no checkpoint found — no ingestion has run");
            println!("  (start one with `fdsync run`)");
            return Ok(());
        }
    };

    println!("FoodData Sync — Ingestion Status");
    println!("================================");
    println!();
    println!("  Checkpoint:  {}", store.path().display());
    println!(
        "  Progress:    {} / {} items ({:.1}%)",
        format_number(checkpoint.processed),
        format_number(checkpoint.total_expected),
        checkpoint.percent_complete()
    );
    println!("  Inserted:    {}", format_number(checkpoint.inserted));
    println!("  Duplicates:  {}", format_number(checkpoint.skipped));
    println!(
        "  Position:    {} page {}",
        checkpoint.current_partition, checkpoint.current_page
    );
    println!("  Started:     {}", format_ts_iso(checkpoint.started_at));
    println!(
        "  Last update: {}",
        format_ts_relative(checkpoint.updated_at)
    );

    match checkpoint.estimated_completion {
        Some(eta) => println!("  ETA:         {}", format_ts_iso(eta)),
        None => println!("  ETA:         (not enough progress yet)"),
    }

    if !checkpoint.errors.is_empty() {
        println!();
        println!("  Errors ({} logged, most recent last):", checkpoint.errors.len());
        for error in checkpoint.errors.iter().rev().take(5).rev() {
            println!("    {}", error);
        }
    }

    println!();
    Ok(())
}

fn format_ts_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Format a timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}
