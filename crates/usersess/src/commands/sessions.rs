//! Per-user session listing, inspection and revocation.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use colored::Colorize;
use usersess_core::{DelegateBackend, SessionRecord, Settings};

use crate::tracker::open_tracker;

/// List a user's sessions.
pub fn list(user: &str, all: bool, json: bool, settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let sessions = tracker
        .store()
        .list_for_user(user, all)
        .context("Failed to list sessions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    println!("{}", format!("Sessions of user {}", user).cyan().bold());
    println!("{}", "─".repeat(70));

    if sessions.is_empty() {
        println!("  No sessions found");
        return Ok(());
    }

    let now = Utc::now();
    for session in &sessions {
        println!(
            "  {} {} [{}]",
            short_id(&session.identifier),
            session.display_name,
            status_label(session, now)
        );
        println!(
            "      {} · last seen {}",
            if session.client_address.is_empty() { "-" } else { session.client_address.as_str() },
            session
                .accessed_at
                .map(|at| format_age(now, at))
                .unwrap_or_else(|| "never".to_string())
        );
    }
    println!();
    println!("  {} session(s)", sessions.len());
    Ok(())
}

/// Show a single session record.
pub fn show(identifier: &str, json: bool, settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let Some(session) = tracker.store().find(identifier)? else {
        bail!("Session '{}' not found", identifier);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    let now = Utc::now();
    println!("{}", format!("Session {}", session.identifier).cyan().bold());
    println!("{}", "─".repeat(70));
    println!("  Status:   {}", status_label(&session, now));
    println!("  User:     {}", session.user_id.as_deref().unwrap_or("(anonymous)"));
    println!("  Device:   {}", session.display_name);
    println!("  Address:  {}", session.client_address);
    println!("  Agent:    {}", session.user_agent);
    println!("  Created:  {}", session.created_at.to_rfc3339());
    println!("  Modified: {}", session.modified_at.to_rfc3339());
    println!(
        "  Accessed: {}",
        session
            .accessed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Expires:  {}", session.expires_at.to_rfc3339());
    Ok(())
}

/// Destroy a session through the lifecycle controller: payload and record.
pub fn revoke(identifier: &str, settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    if tracker.store().find(identifier)?.is_none() {
        println!("{}", format!("Session '{}' not found", identifier).yellow());
        return Ok(());
    }

    tracker
        .controller()
        .destroy(identifier)
        .with_context(|| format!("Failed to revoke session {}", identifier))?;

    println!("{}", format!("✓ Session {} revoked", short_id(identifier)).green());
    if let Some(warning) = local_payload_warning(tracker.backend().as_ref()) {
        println!("{}", warning.yellow());
    }
    Ok(())
}

/// Warning for engines whose payloads this process cannot reach.
fn local_payload_warning(backend: &dyn DelegateBackend) -> Option<String> {
    backend.is_process_local().then(|| {
        format!(
            "⚠ Engine '{}' keeps payloads inside the application process; only the record was removed",
            backend.name()
        )
    })
}

fn status_label(session: &SessionRecord, now: DateTime<Utc>) -> colored::ColoredString {
    if session.is_expired_at(now) {
        "expired".red()
    } else {
        "active".green()
    }
}

/// First 12 characters of an identifier
fn short_id(identifier: &str) -> &str {
    match identifier.char_indices().nth(12) {
        Some((idx, _)) => &identifier[..idx],
        None => identifier,
    }
}

/// Human readable distance from `at` to `now`
fn format_age(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;
    use usersess_core::{EngineConfig, RequestContext};

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now, now - Duration::minutes(5)), "5m ago");
        assert_eq!(format_age(now, now - Duration::hours(3)), "3h ago");
        assert_eq!(format_age(now, now - Duration::days(2)), "2d ago");
        assert_eq!(format_age(now, now + Duration::minutes(5)), "just now");
    }

    #[test]
    fn test_revoke_removes_record_and_payload() {
        let temp_dir = tempdir().unwrap();
        let settings = Settings {
            database_path: Some(temp_dir.path().join("usersess.db")),
            data_dir: temp_dir.path().to_path_buf(),
            engine: EngineConfig::new("files"),
            ..Settings::default()
        };

        let tracker = open_tracker(&settings).unwrap();
        let mut session = tracker.controller();
        session
            .write("abc", b"payload", &RequestContext::default().with_user("7"))
            .unwrap();
        let payload_key = session.payload_key().unwrap().to_string();

        list("7", false, true, &settings).unwrap();
        show("abc", false, &settings).unwrap();
        revoke("abc", &settings).unwrap();

        assert!(tracker.store().find("abc").unwrap().is_none());
        assert_eq!(tracker.backend().read(&payload_key).unwrap(), None);
        assert!(show("abc", true, &settings).is_err());
        revoke("abc", &settings).unwrap();
    }

    #[test]
    fn test_revoke_warns_for_process_local_engine() {
        let temp_dir = tempdir().unwrap();
        let settings = Settings {
            database_path: Some(temp_dir.path().join("usersess.db")),
            data_dir: temp_dir.path().to_path_buf(),
            ..Settings::default()
        };

        let tracker = open_tracker(&settings).unwrap();
        let warning = local_payload_warning(tracker.backend().as_ref()).unwrap();
        assert!(warning.contains("cache"));

        tracker
            .controller()
            .write("abc", b"payload", &RequestContext::default())
            .unwrap();
        revoke("abc", &settings).unwrap();
        assert!(tracker.store().find("abc").unwrap().is_none());

        let files = Settings {
            engine: EngineConfig::new("files"),
            ..settings
        };
        let tracker = open_tracker(&files).unwrap();
        assert_eq!(local_payload_warning(tracker.backend().as_ref()), None);
    }
}
