//! SQLite payload table (`database` engine).

use super::DelegateBackend;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::session::MAX_TIMEOUT_SECS;
use crate::store::check_identifier;
use chrono::{Duration, Utc};
use rusqlite::{OptionalExtension, params};
use std::sync::Arc;

/// Payloads stored as BLOBs in their own table, expiring `timeout_secs`
/// after the last write.
pub struct DatabaseBackend {
    db: Arc<Database>,
    table: String,
    timeout_secs: u64,
}

impl DatabaseBackend {
    pub const DEFAULT_TABLE: &'static str = "session_payloads";

    /// Create the backend, creating its table if needed.
    pub fn new(db: Arc<Database>, table: &str, timeout_secs: u64) -> Result<Self> {
        check_identifier("table", table)?;

        let conn = db.lock()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                id TEXT NOT NULL PRIMARY KEY,
                data BLOB,
                expires INTEGER
            );
            CREATE INDEX IF NOT EXISTS {t}_expires_idx ON {t} (expires);",
            t = table
        ))
        .map_err(to_backend)?;
        drop(conn);

        Ok(Self {
            db,
            table: table.to_string(),
            timeout_secs,
        })
    }
}

fn to_backend(err: impl std::fmt::Display) -> Error {
    Error::backend("database", err)
}

impl DelegateBackend for DatabaseBackend {
    fn name(&self) -> &str {
        "database"
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.db.lock().map_err(to_backend)?;
        conn.query_row(
            &format!("SELECT data FROM {} WHERE id = ?1", self.table),
            params![key],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()
        .map(Option::flatten)
        .map_err(to_backend)
    }

    fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        let expires = Utc::now() + Duration::seconds(self.timeout_secs.min(MAX_TIMEOUT_SECS) as i64);
        let conn = self.db.lock().map_err(to_backend)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, data, expires) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, expires = excluded.expires",
                self.table
            ),
            params![key, payload, expires.timestamp_millis()],
        )
        .map_err(to_backend)?;
        Ok(())
    }

    fn destroy(&self, key: &str) -> Result<()> {
        let conn = self.db.lock().map_err(to_backend)?;
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", self.table), params![key])
            .map_err(to_backend)?;
        Ok(())
    }

    /// Rows carry their own expiry, so `max_lifetime_secs` is not consulted.
    fn gc(&self, _max_lifetime_secs: u64) -> Result<usize> {
        let conn = self.db.lock().map_err(to_backend)?;
        conn.execute(
            &format!("DELETE FROM {} WHERE expires < ?1", self.table),
            params![Utc::now().timestamp_millis()],
        )
        .map_err(to_backend)
    }
}
