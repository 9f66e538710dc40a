//! Opens the session store and payload engine described by the settings.

use anyhow::{Context, Result};
use usersess_core::{EngineRegistry, SessionTracker, Settings};

/// Build a tracker with the built-in engines.
pub fn open_tracker(settings: &Settings) -> Result<SessionTracker> {
    SessionTracker::from_settings(settings, &EngineRegistry::default()).with_context(|| {
        format!(
            "Failed to open session store at {}",
            settings.resolve_database_path().display()
        )
    })
}
