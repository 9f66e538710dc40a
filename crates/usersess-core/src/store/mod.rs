//! Relational persistence for session metadata rows.
//!
//! The store is pure data access: it never talks to a payload engine and
//! never decides *when* a record should change. Column names come from a
//! [`FieldMap`] so an existing sessions table can be reused as is.

mod fields;
mod schema;

pub use fields::FieldMap;
pub(crate) use fields::check_identifier;

use crate::db::{Database, RenameOutcome, SessionRecord, from_millis, to_millis};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;
use tracing::{debug, info};

/// Length in hex characters of generated payload keys
pub const PAYLOAD_KEY_LEN: usize = 64;

/// Generate a fresh payload key from the operating system's CSPRNG.
pub fn new_payload_key() -> String {
    let mut bytes = [0u8; PAYLOAD_KEY_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Session record persistence over the shared [`Database`].
pub struct SessionRecordStore {
    db: Arc<Database>,
    fields: FieldMap,
}

impl SessionRecordStore {
    /// Create a store using the given column mapping.
    pub fn new(db: Arc<Database>, fields: FieldMap) -> Result<Self> {
        fields.validate()?;
        Ok(Self { db, fields })
    }

    /// Create a store using the default table layout.
    pub fn with_defaults(db: Arc<Database>) -> Result<Self> {
        Self::new(db, FieldMap::default())
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Create the table and indexes if they do not exist yet.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute_batch(&schema::create_table_sql(&self.fields))?;
        info!(table = %self.fields.table, "Session table ready");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Find a record by primary key
    pub fn find(&self, identifier: &str) -> Result<Option<SessionRecord>> {
        let conn = self.db.lock()?;
        self.find_by(&conn, &self.fields.identifier, identifier)
    }

    /// Find a record by the key its payload is stored under
    pub fn find_by_payload_key(&self, payload_key: &str) -> Result<Option<SessionRecord>> {
        let conn = self.db.lock()?;
        self.find_by(&conn, &self.fields.payload_key, payload_key)
    }

    /// List the sessions owned by a user, most recently accessed first
    pub fn list_for_user(&self, user_id: &str, include_expired: bool) -> Result<Vec<SessionRecord>> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let now = to_millis(Utc::now());

        let expiry_filter = if include_expired {
            String::new()
        } else {
            format!(" AND {} >= ?2", f.expires_at)
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1{}
             ORDER BY {accessed} IS NULL, {accessed} DESC, {created} DESC",
            f.select_list(),
            f.table,
            f.user_id,
            expiry_filter,
            accessed = f.accessed_at,
            created = f.created_at,
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = if include_expired {
            stmt.query_map(params![user_id], map_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![user_id, now], map_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Count records that have not expired yet
    pub fn count_active(&self) -> Result<usize> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} >= ?1", f.table, f.expires_at),
            params![to_millis(Utc::now())],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or update a record and return the stored row.
    ///
    /// An insert stamps `created_at`; every save stamps `modified_at`.
    /// Creation-time fields are never rewritten, and an existing non-empty
    /// user reference always wins over the incoming one. Values for unmapped
    /// optional columns are dropped.
    pub fn save(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let now = to_millis(Utc::now());

        let (columns, values) = f.insert_lists();
        let sql = format!(
            "INSERT INTO {t} ({columns})
             VALUES ({values})
             ON CONFLICT({id}) DO UPDATE SET
                {pk} = excluded.{pk},
                {uid} = COALESCE(NULLIF({t}.{uid}, ''), excluded.{uid}),
                {modified} = excluded.{modified},
                {accessed} = COALESCE(excluded.{accessed}, {t}.{accessed}),
                {expires} = excluded.{expires}",
            t = f.table,
            id = f.identifier,
            pk = f.payload_key,
            uid = f.user_id,
            modified = f.modified_at,
            accessed = f.accessed_at,
            expires = f.expires_at,
        );

        conn.execute(
            &sql,
            params![
                record.identifier,
                record.payload_key,
                record.user_id,
                record.display_name,
                record.user_agent,
                record.client_address,
                now,
                record.accessed_at.map(to_millis),
                to_millis(record.expires_at),
            ],
        )?;

        self.find_by(&conn, &f.identifier, &record.identifier)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows.into())
    }

    /// Move the row stored under `from` to `record.identifier` in one transaction.
    ///
    /// The stored state is re-read inside the transaction, so a retried
    /// rename observes an earlier success instead of reapplying it. If
    /// another row already holds `record.payload_key` a fresh key is
    /// generated. A row already stored under the target identifier makes the
    /// update fail with a constraint violation.
    pub fn rename(&self, from: &str, record: &SessionRecord) -> Result<RenameOutcome> {
        let f = &self.fields;
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        if self.find_by(&tx, &f.identifier, from)?.is_none() {
            return Ok(match self.find_by(&tx, &f.identifier, &record.identifier)? {
                Some(target) => RenameOutcome::AlreadyRenamed(target),
                None => RenameOutcome::SourceMissing,
            });
        }

        let mut payload_key = record.payload_key.clone();
        if let Some(holder) = self.find_by(&tx, &f.payload_key, &payload_key)? {
            if holder.identifier != from {
                debug!(from = %from, "Payload key taken by another session, generating a new one");
                payload_key = new_payload_key();
            }
        }

        let sql = format!(
            "UPDATE {t} SET
                {id} = ?1,
                {pk} = ?2,
                {uid} = COALESCE(NULLIF({uid}, ''), ?3),
                {modified} = ?4,
                {expires} = ?5
             WHERE {id} = ?6",
            t = f.table,
            id = f.identifier,
            pk = f.payload_key,
            uid = f.user_id,
            modified = f.modified_at,
            expires = f.expires_at,
        );
        tx.execute(
            &sql,
            params![
                record.identifier,
                payload_key,
                record.user_id,
                to_millis(Utc::now()),
                to_millis(record.expires_at),
                from,
            ],
        )?;

        let renamed = self
            .find_by(&tx, &f.identifier, &record.identifier)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;

        info!(from = %from, to = %renamed.identifier, "Session identifier renamed");
        Ok(RenameOutcome::Renamed(renamed))
    }

    /// Refresh the access timestamp only. Returns false if the row is gone.
    pub fn touch(&self, identifier: &str, accessed_at: DateTime<Utc>) -> Result<bool> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let changed = conn.execute(
            &format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", f.table, f.accessed_at, f.identifier),
            params![to_millis(accessed_at), identifier],
        )?;
        Ok(changed > 0)
    }

    /// Delete a record. Deleting an absent row is not an error.
    pub fn delete(&self, identifier: &str) -> Result<bool> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let changed = conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", f.table, f.identifier),
            params![identifier],
        )?;
        Ok(changed > 0)
    }

    /// Bulk delete every record whose expiry lies before `cutoff`
    pub fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let f = &self.fields;
        let conn = self.db.lock()?;
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE {} < ?1", f.table, f.expires_at),
            params![to_millis(cutoff)],
        )?;
        Ok(removed)
    }

    fn find_by(&self, conn: &Connection, column: &str, value: &str) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.fields.select_list(),
            self.fields.table,
            column
        );
        let mut stmt = conn.prepare(&sql)?;
        Ok(stmt.query_row(params![value], map_record).optional()?)
    }
}

fn map_record(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        identifier: row.get(0)?,
        payload_key: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        user_id: user_reference(row.get_ref(2)?),
        display_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        user_agent: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        client_address: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        created_at: from_millis(row.get::<_, Option<i64>>(6)?.unwrap_or_default()),
        modified_at: from_millis(row.get::<_, Option<i64>>(7)?.unwrap_or_default()),
        accessed_at: row.get::<_, Option<i64>>(8)?.map(from_millis),
        expires_at: from_millis(row.get::<_, Option<i64>>(9)?.unwrap_or_default()),
    })
}

/// Legacy tables keep the user reference as an INTEGER column.
fn user_reference(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Some(String::from_utf8_lossy(t).into_owned()).filter(|s| !s.is_empty())
        }
    }
}
