//! Schema creation.

use anyhow::Result;
use colored::Colorize;
use usersess_core::Settings;

use crate::tracker::open_tracker;

pub fn execute(settings: &Settings) -> Result<()> {
    // Opening the tracker creates the table and indexes when missing
    let tracker = open_tracker(settings)?;

    println!("{}", "✓ Session table ready".green());
    println!("  database: {}", settings.resolve_database_path().display());
    println!("  table:    {}", tracker.store().fields().table);
    println!("  engine:   {}", tracker.backend().name());
    Ok(())
}
