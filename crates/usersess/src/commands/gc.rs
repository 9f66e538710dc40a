//! Garbage collection: a single sweep or a periodic sweeper.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::time::Duration;
use tracing::info;
use usersess_core::{Settings, SweepReport};

use crate::tracker::open_tracker;

/// Run one sweep and print what it removed.
pub fn sweep(max_lifetime: Option<u64>, settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let max_lifetime = max_lifetime.unwrap_or_else(|| settings.gc_max_lifetime_secs());

    let report = tracker
        .garbage_collector()
        .sweep(max_lifetime)
        .context("Garbage collection failed")?;

    print_report(&report);
    Ok(())
}

/// Sweep every `interval` seconds until Ctrl-C.
pub async fn daemon(interval: Option<u64>, max_lifetime: Option<u64>, settings: &Settings) -> Result<()> {
    let interval = interval.unwrap_or(settings.gc.interval_secs);
    if interval == 0 {
        bail!("--interval must be greater than 0");
    }
    let max_lifetime = max_lifetime.unwrap_or_else(|| settings.gc_max_lifetime_secs());

    let tracker = open_tracker(settings)?;
    let scheduler = tracker.spawn_gc(Duration::from_secs(interval), max_lifetime);
    let mut reports = scheduler.subscribe();

    println!(
        "{}",
        format!("Sweeping every {}s (Ctrl-C to stop)", interval).cyan()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = reports.borrow_and_update().clone();
                if let Some(report) = latest {
                    print_report(&report);
                }
            }
        }
    }

    scheduler.stop();
    println!("{}", "✓ Sweeper stopped".green());
    Ok(())
}

fn print_report(report: &SweepReport) {
    let payloads = match report.payloads_removed {
        Some(count) => count.to_string(),
        None => "engine gc failed".yellow().to_string(),
    };
    println!(
        "{} {} record(s), {} payload(s) removed (cutoff {})",
        "✓".green(),
        report.rows_removed,
        payloads,
        report.cutoff.to_rfc3339()
    );
}
