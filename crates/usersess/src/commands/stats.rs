//! Store summary.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use usersess_core::Settings;

use crate::tracker::open_tracker;

/// Summary for JSON output.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub database: String,
    pub table: String,
    pub engine: String,
    pub timeout_secs: u64,
    pub gc_interval_secs: u64,
    pub active_sessions: usize,
}

pub fn execute(json: bool, settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let stats = StoreStats {
        database: settings.resolve_database_path().display().to_string(),
        table: tracker.store().fields().table.clone(),
        engine: tracker.backend().name().to_string(),
        timeout_secs: tracker.timeout_secs(),
        gc_interval_secs: settings.gc.interval_secs,
        active_sessions: tracker.store().count_active()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Session Store".cyan().bold());
    println!("{}", "─".repeat(40));
    println!("  Database:        {}", stats.database);
    println!("  Table:           {}", stats.table);
    println!("  Engine:          {}", stats.engine);
    println!("  Timeout:         {}s", stats.timeout_secs);
    println!("  GC interval:     {}s", stats.gc_interval_secs);
    println!(
        "  Active sessions: {}",
        stats.active_sessions.to_string().green().bold()
    );
    Ok(())
}
