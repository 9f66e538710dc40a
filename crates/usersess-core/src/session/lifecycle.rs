//! The session protocol hooks: open, read, write, close, destroy, gc.

use super::context::{IdentityResolver, RequestContext};
use super::display::DisplayNamer;
use super::MAX_TIMEOUT_SECS;
use crate::backend::DelegateBackend;
use crate::db::{RenameOutcome, SessionRecord};
use crate::error::{Error, Result};
use crate::gc::GarbageCollector;
use crate::store::{SessionRecordStore, new_payload_key};
use chrono::{Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a controller is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Bound,
    Closed,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Bound => "bound",
            Self::Closed => "closed",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

enum Binding {
    Uninitialized,
    Bound(SessionRecord),
    Closed,
    Destroyed,
}

/// Drives one protocol session: keeps the relational record in step with
/// the payload stored by the delegate engine.
///
/// A controller is not shared between in-flight sessions. Create one per
/// request with [`SessionTracker::controller`](super::SessionTracker::controller).
pub struct SessionLifecycleController {
    store: Arc<SessionRecordStore>,
    backend: Arc<dyn DelegateBackend>,
    gc: Arc<GarbageCollector>,
    identity: Arc<dyn IdentityResolver>,
    namer: Arc<dyn DisplayNamer>,
    timeout: Duration,
    binding: Binding,
}

impl SessionLifecycleController {
    pub fn new(
        store: Arc<SessionRecordStore>,
        backend: Arc<dyn DelegateBackend>,
        gc: Arc<GarbageCollector>,
        identity: Arc<dyn IdentityResolver>,
        namer: Arc<dyn DisplayNamer>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            backend,
            gc,
            identity,
            namer,
            timeout: Duration::seconds(timeout_secs.min(MAX_TIMEOUT_SECS) as i64),
            binding: Binding::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.binding {
            Binding::Uninitialized => LifecycleState::Uninitialized,
            Binding::Bound(_) => LifecycleState::Bound,
            Binding::Closed => LifecycleState::Closed,
            Binding::Destroyed => LifecycleState::Destroyed,
        }
    }

    /// The bound record
    pub fn record(&self) -> Result<&SessionRecord> {
        match &self.binding {
            Binding::Bound(record) => Ok(record),
            _ => Err(Error::NotInitialized),
        }
    }

    /// Payload key of the bound record
    pub fn payload_key(&self) -> Result<&str> {
        self.record().map(|record| record.payload_key.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Protocol hooks
    // ─────────────────────────────────────────────────────────────────────────

    /// Nothing to prepare: records are bound lazily on the first read or write.
    pub fn open(&mut self, save_path: &str, name: &str) -> Result<()> {
        debug!(save_path, name, "Session open");
        Ok(())
    }

    /// Return the stored payload, or empty bytes for a new session.
    ///
    /// While a record is bound the payload of that record is returned even
    /// if `identifier` names another session; a following write under the
    /// new identifier renames the record.
    pub fn read(&mut self, identifier: &str, ctx: &RequestContext) -> Result<Vec<u8>> {
        if identifier.is_empty() {
            return Err(Error::invalid_argument("session identifier must not be empty"));
        }
        let payload_key = self.ensure_bound(identifier, ctx)?.payload_key.clone();

        let payload = self.backend.read(&payload_key)?;
        if payload.is_none() {
            debug!(identifier, engine = %self.backend.name(), "No stored payload");
        }
        Ok(payload.unwrap_or_default())
    }

    /// Persist the record, then hand the payload to the engine.
    ///
    /// A relational failure aborts before the payload is written. An engine
    /// failure after the record was saved is returned as an error but the
    /// saved record stays. If the row disappears while the payload is being
    /// written, the payload is removed again and
    /// [`Error::DestroyedConcurrently`] is returned.
    pub fn write(&mut self, identifier: &str, payload: &[u8], ctx: &RequestContext) -> Result<()> {
        if identifier.is_empty() {
            return Err(Error::invalid_argument("session identifier must not be empty"));
        }

        let mut record = self.ensure_bound(identifier, ctx)?.clone();
        let previous = std::mem::replace(&mut record.identifier, identifier.to_string());

        if !record.has_user() {
            if let Some(user_id) = self.identity.resolve(ctx).filter(|u| !u.is_empty()) {
                info!(identifier, user_id = %user_id, "Session associated with user");
                record.user_id = Some(user_id);
            }
        }
        record.expires_at = Utc::now() + self.timeout;

        let saved = if previous == identifier {
            self.store.save(&record)?
        } else {
            self.rename(&previous, record, ctx)?
        };

        let payload_key = saved.payload_key.clone();
        self.binding = Binding::Bound(saved);

        if let Err(e) = self.backend.write(&payload_key, payload) {
            warn!(
                identifier,
                engine = %self.backend.name(),
                error = %e,
                "Payload write failed after the record was saved"
            );
            return Err(e);
        }

        let still_owned = self
            .store
            .find(identifier)?
            .is_some_and(|row| row.payload_key == payload_key);
        if !still_owned {
            warn!(identifier, "Session destroyed during write, discarding payload");
            if let Err(e) = self.backend.destroy(&payload_key) {
                warn!(identifier, engine = %self.backend.name(), error = %e, "Orphaned payload destroy failed");
            }
            self.binding = Binding::Destroyed;
            return Err(Error::DestroyedConcurrently(identifier.to_string()));
        }
        Ok(())
    }

    /// Record the access time and release the bound record.
    pub fn close(&mut self, identifier: &str) -> Result<()> {
        let record = match std::mem::replace(&mut self.binding, Binding::Closed) {
            Binding::Bound(record) => record,
            other => {
                self.binding = other;
                debug!(identifier, "Close without a bound record");
                return Ok(());
            }
        };

        if record.identifier != identifier {
            debug!(identifier, bound = %record.identifier, "Closing the bound record");
        }
        if !self.store.touch(&record.identifier, Utc::now())? {
            debug!(identifier = %record.identifier, "Record vanished before close");
        }
        Ok(())
    }

    /// Remove both the payload and the record.
    ///
    /// Both deletions are attempted even if the first fails; the call
    /// succeeds only when both did.
    pub fn destroy(&mut self, identifier: &str) -> Result<()> {
        let bound = matches!(&self.binding, Binding::Bound(r) if r.identifier == identifier);
        let record = match &self.binding {
            Binding::Bound(record) if bound => Some(record.clone()),
            _ => self.store.find(identifier)?,
        };
        let Some(record) = record else {
            debug!(identifier, "Nothing to destroy");
            return Ok(());
        };

        let payload_result = if record.payload_key.is_empty() {
            Ok(())
        } else {
            self.backend.destroy(&record.payload_key)
        };
        let row_result = self.store.delete(&record.identifier);

        if bound {
            self.binding = Binding::Destroyed;
        }

        match (payload_result, row_result) {
            (Ok(()), Ok(_)) => {
                info!(identifier, "Session destroyed");
                Ok(())
            }
            (Err(e), Ok(_)) => {
                warn!(identifier, engine = %self.backend.name(), error = %e, "Record deleted but payload destroy failed");
                Err(e)
            }
            (Ok(()), Err(e)) => {
                warn!(identifier, error = %e, "Payload destroyed but record delete failed");
                Err(e)
            }
            (Err(payload_err), Err(row_err)) => {
                warn!(
                    identifier,
                    payload_error = %payload_err,
                    error = %row_err,
                    "Session destroy failed"
                );
                Err(row_err)
            }
        }
    }

    /// Protocol gc hook; returns the number of records removed.
    pub fn gc(&self, max_lifetime_secs: u64) -> Result<usize> {
        self.gc.sweep(max_lifetime_secs).map(|report| report.rows_removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_bound(&mut self, identifier: &str, ctx: &RequestContext) -> Result<&SessionRecord> {
        if !matches!(self.binding, Binding::Bound(_)) {
            let record = self.initialize(identifier, ctx)?;
            self.binding = Binding::Bound(record);
        }
        self.record()
    }

    fn initialize(&self, identifier: &str, ctx: &RequestContext) -> Result<SessionRecord> {
        match self.store.find(identifier)? {
            Some(mut existing) => {
                if existing.payload_key.is_empty() {
                    existing.payload_key = new_payload_key();
                    existing = self.store.save(&existing)?;
                    info!(identifier, "Assigned payload key to legacy record");
                }
                debug!(identifier, "Bound existing session record");
                Ok(existing)
            }
            None => {
                let record = self.store.save(&self.new_record(identifier, ctx))?;
                info!(
                    identifier,
                    client_address = %record.client_address,
                    "Session record created"
                );
                Ok(record)
            }
        }
    }

    fn new_record(&self, identifier: &str, ctx: &RequestContext) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            identifier: identifier.to_string(),
            payload_key: new_payload_key(),
            user_id: None,
            display_name: self.namer.display_name(&ctx.user_agent),
            user_agent: ctx.user_agent.clone(),
            client_address: ctx.client_address.clone(),
            created_at: now,
            modified_at: now,
            accessed_at: None,
            expires_at: now + self.timeout,
        }
    }

    fn rename(&self, from: &str, record: SessionRecord, ctx: &RequestContext) -> Result<SessionRecord> {
        match self.store.rename(from, &record)? {
            RenameOutcome::Renamed(renamed) => Ok(renamed),
            RenameOutcome::AlreadyRenamed(mut existing) => {
                debug!(from, to = %existing.identifier, "Rename already applied");
                if !existing.has_user() {
                    existing.user_id = record.user_id;
                }
                existing.expires_at = record.expires_at;
                self.store.save(&existing)
            }
            RenameOutcome::SourceMissing => {
                warn!(from, to = %record.identifier, "Renamed session vanished, starting a new record");
                let mut fresh = self.new_record(&record.identifier, ctx);
                fresh.user_id = record.user_id;
                self.store.save(&fresh)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::gc::tests::{BrokenBackend, setup_store};
    use crate::session::context::ContextIdentity;
    use crate::session::display::UserAgentSummary;
    use crate::store::PAYLOAD_KEY_LEN;

    struct Harness {
        store: Arc<SessionRecordStore>,
        backend: Arc<MemoryBackend>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: setup_store(),
                backend: Arc::new(MemoryBackend::new()),
            }
        }

        fn controller(&self, timeout_secs: u64) -> SessionLifecycleController {
            controller_with(Arc::clone(&self.store), self.backend.clone(), timeout_secs)
        }
    }

    fn controller_with(
        store: Arc<SessionRecordStore>,
        backend: Arc<dyn DelegateBackend>,
        timeout_secs: u64,
    ) -> SessionLifecycleController {
        let gc = Arc::new(GarbageCollector::new(Arc::clone(&store), Arc::clone(&backend)));
        SessionLifecycleController::new(
            store,
            backend,
            gc,
            Arc::new(ContextIdentity),
            Arc::new(UserAgentSummary),
            timeout_secs,
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new("10.0.0.1", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
    }

    #[test]
    fn test_read_unknown_creates_one_record() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        assert_eq!(session.read("abc", &ctx()).unwrap(), Vec::<u8>::new());
        assert_eq!(session.state(), LifecycleState::Bound);

        let record = h.store.find("abc").unwrap().unwrap();
        assert_eq!(record.payload_key.len(), PAYLOAD_KEY_LEN);
        assert_eq!(record.display_name, "Firefox on Linux (Generic desktop)");
        assert_eq!(record.client_address, "10.0.0.1");
        assert_eq!(record.user_id, None);
        assert_eq!(h.store.count_active().unwrap(), 1);
    }

    #[test]
    fn test_accessors_require_binding() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        assert!(matches!(session.record(), Err(Error::NotInitialized)));
        assert!(matches!(session.payload_key(), Err(Error::NotInitialized)));

        session.open("/tmp", "PHPSESSID").unwrap();
        session.read("abc", &ctx()).unwrap();
        assert_eq!(session.payload_key().unwrap().len(), PAYLOAD_KEY_LEN);
    }

    #[test]
    fn test_write_overwrites_payload_and_extends_expiry() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        session.write("abc", b"d1", &ctx()).unwrap();
        let first = h.store.find("abc").unwrap().unwrap();
        session.write("abc", b"d2", &ctx()).unwrap();
        let second = h.store.find("abc").unwrap().unwrap();

        assert_eq!(h.backend.read(&second.payload_key).unwrap(), Some(b"d2".to_vec()));
        assert_eq!(first.payload_key, second.payload_key);
        assert!(second.expires_at >= first.expires_at);
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_write_rejects_empty_identifier() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        let err = session.write("", b"x", &ctx()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(session.state(), LifecycleState::Uninitialized);
        assert!(h.backend.is_empty());
    }

    #[test]
    fn test_write_under_new_identifier_renames() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        session.write("i", b"d", &ctx()).unwrap();
        let key = session.payload_key().unwrap().to_string();
        session.write("j", b"d2", &ctx()).unwrap();

        assert!(h.store.find("i").unwrap().is_none());
        let renamed = h.store.find("j").unwrap().unwrap();
        assert_eq!(renamed.payload_key, key);
        assert_eq!(h.backend.read(&renamed.payload_key).unwrap(), Some(b"d2".to_vec()));
    }

    #[test]
    fn test_read_after_regenerate_keeps_bound_payload() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        session.write("i", b"state", &ctx()).unwrap();
        assert_eq!(session.read("j", &ctx()).unwrap(), b"state".to_vec());
        assert!(h.store.find("j").unwrap().is_none());
    }

    #[test]
    fn test_rename_retry_sees_earlier_success() {
        let h = Harness::new();
        let mut first = h.controller(1440);
        first.write("i", b"d", &ctx()).unwrap();

        // A second controller still bound to the old identifier
        let mut stale = h.controller(1440);
        stale.read("i", &ctx()).unwrap();

        first.write("j", b"d2", &ctx()).unwrap();
        stale.write("j", b"d3", &ctx()).unwrap();

        assert!(h.store.find("i").unwrap().is_none());
        let record = h.store.find("j").unwrap().unwrap();
        assert_eq!(h.backend.read(&record.payload_key).unwrap(), Some(b"d3".to_vec()));
    }

    #[test]
    fn test_rename_of_destroyed_source_starts_fresh() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("i", b"d", &ctx()).unwrap();
        let old_key = session.payload_key().unwrap().to_string();

        h.store.delete("i").unwrap();
        session.write("j", b"d2", &ctx()).unwrap();

        let record = h.store.find("j").unwrap().unwrap();
        assert_ne!(record.payload_key, old_key);
        assert_eq!(h.backend.read(&record.payload_key).unwrap(), Some(b"d2".to_vec()));
    }

    #[test]
    fn test_user_association_is_set_once() {
        let h = Harness::new();
        let mut session = h.controller(1440);

        session.write("abc", b"x", &ctx()).unwrap();
        assert_eq!(h.store.find("abc").unwrap().unwrap().user_id, None);

        session.write("abc", b"x", &ctx().with_user("u1")).unwrap();
        assert_eq!(h.store.find("abc").unwrap().unwrap().user_id.as_deref(), Some("u1"));

        session.write("abc", b"x", &ctx()).unwrap();
        session.write("abc", b"x", &ctx().with_user("u2")).unwrap();
        assert_eq!(h.store.find("abc").unwrap().unwrap().user_id.as_deref(), Some("u1"));

        // A fresh controller for the same session cannot overwrite it either
        let mut other = h.controller(1440);
        other.write("abc", b"x", &ctx().with_user("u3")).unwrap();
        assert_eq!(h.store.find("abc").unwrap().unwrap().user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_resolver_consulted_once_per_write() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = move |_ctx: &RequestContext| -> Option<String> {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        };

        let h = Harness::new();
        let gc = Arc::new(GarbageCollector::new(Arc::clone(&h.store), h.backend.clone()));
        let mut session = SessionLifecycleController::new(
            Arc::clone(&h.store),
            h.backend.clone(),
            gc,
            Arc::new(resolver),
            Arc::new(UserAgentSummary),
            1440,
        );

        session.read("abc", &ctx()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        session.write("abc", b"x", &ctx()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destroy_then_read_is_brand_new() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"secret", &ctx()).unwrap();
        let old_key = session.payload_key().unwrap().to_string();

        session.destroy("abc").unwrap();
        assert_eq!(session.state(), LifecycleState::Destroyed);
        assert!(h.store.find("abc").unwrap().is_none());
        assert_eq!(h.backend.read(&old_key).unwrap(), None);

        assert_eq!(session.read("abc", &ctx()).unwrap(), Vec::<u8>::new());
        assert_ne!(session.payload_key().unwrap(), old_key);
    }

    #[test]
    fn test_destroy_unknown_and_unbound() {
        let h = Harness::new();
        let mut writer = h.controller(1440);
        writer.write("abc", b"x", &ctx()).unwrap();

        let mut admin = h.controller(1440);
        admin.destroy("missing").unwrap();
        admin.destroy("abc").unwrap();
        assert_eq!(admin.state(), LifecycleState::Uninitialized);
        assert!(h.store.find("abc").unwrap().is_none());
        assert!(h.backend.is_empty());
    }

    #[test]
    fn test_close_without_binding_succeeds() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.close("abc").unwrap();
        assert_eq!(session.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_close_after_destroy_does_not_resurrect() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"x", &ctx()).unwrap();

        h.store.delete("abc").unwrap();
        session.close("abc").unwrap();
        assert!(h.store.find("abc").unwrap().is_none());
        assert_eq!(session.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_abc_scenario() {
        let h = Harness::new();
        let mut session = h.controller(3600);

        let before = Utc::now();
        session.write("abc", b"payload", &ctx()).unwrap();
        let created = h.store.find("abc").unwrap().unwrap();
        let expected = before + Duration::seconds(3600);
        assert!((created.expires_at - expected).num_seconds().abs() <= 5);
        assert_eq!(created.accessed_at, None);

        session.close("abc").unwrap();
        let closed = h.store.find("abc").unwrap().unwrap();
        assert!(closed.accessed_at.is_some());
        assert_eq!(closed.expires_at, created.expires_at);
        assert_eq!(closed.payload_key, created.payload_key);
        assert_eq!(closed.modified_at, created.modified_at);

        session.destroy("abc").unwrap();
        assert!(h.store.find("abc").unwrap().is_none());
        assert_eq!(h.backend.read(&created.payload_key).unwrap(), None);
    }

    #[test]
    fn test_closed_controller_rebinds_on_next_read() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"x", &ctx()).unwrap();
        session.close("abc").unwrap();

        assert!(matches!(session.record(), Err(Error::NotInitialized)));
        assert_eq!(session.read("abc", &ctx()).unwrap(), b"x".to_vec());
        assert_eq!(session.state(), LifecycleState::Bound);
    }

    #[test]
    fn test_expired_record_is_still_readable() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"x", &ctx()).unwrap();
        session.close("abc").unwrap();

        let mut record = h.store.find("abc").unwrap().unwrap();
        record.expires_at = Utc::now() - Duration::seconds(10);
        h.store.save(&record).unwrap();

        let mut later = h.controller(1440);
        assert_eq!(later.read("abc", &ctx()).unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_payload_failure_keeps_record() {
        let store = setup_store();
        let mut session = controller_with(Arc::clone(&store), Arc::new(BrokenBackend), 1440);

        let err = session.write("abc", b"x", &ctx()).unwrap_err();
        assert!(err.is_backend());
        assert!(store.find("abc").unwrap().is_some());
        assert_eq!(session.state(), LifecycleState::Bound);
    }

    #[test]
    fn test_destroy_attempts_both_deletions() {
        let store = setup_store();
        let mut writer = controller_with(Arc::clone(&store), Arc::new(MemoryBackend::new()), 1440);
        writer.write("abc", b"x", &ctx()).unwrap();

        let mut broken = controller_with(Arc::clone(&store), Arc::new(BrokenBackend), 1440);
        let err = broken.destroy("abc").unwrap_err();
        assert!(err.is_backend());
        assert!(store.find("abc").unwrap().is_none());
    }

    #[test]
    fn test_gc_hook_forwards_to_collector() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"x", &ctx()).unwrap();

        let mut record = h.store.find("abc").unwrap().unwrap();
        record.expires_at = Utc::now() - Duration::seconds(1);
        h.store.save(&record).unwrap();

        assert_eq!(session.gc(1440).unwrap(), 1);
        assert!(h.store.find("abc").unwrap().is_none());
    }

    #[test]
    fn test_legacy_record_without_payload_key_gets_one() {
        let h = Harness::new();
        let mut session = h.controller(1440);
        session.write("abc", b"x", &ctx()).unwrap();

        let mut record = h.store.find("abc").unwrap().unwrap();
        record.payload_key = String::new();
        h.store.save(&record).unwrap();

        let mut later = h.controller(1440);
        later.read("abc", &ctx()).unwrap();
        assert_eq!(later.payload_key().unwrap().len(), PAYLOAD_KEY_LEN);
        assert_eq!(
            h.store.find("abc").unwrap().unwrap().payload_key,
            later.payload_key().unwrap()
        );
    }

    /// Engine whose write lands after another request destroyed the session.
    struct DestroyDuringWrite {
        inner: MemoryBackend,
        store: Arc<SessionRecordStore>,
        identifier: &'static str,
    }

    impl DelegateBackend for DestroyDuringWrite {
        fn name(&self) -> &str {
            "racing"
        }
        fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
            self.inner.destroy(key)?;
            self.store.delete(self.identifier)?;
            self.inner.write(key, payload)
        }
        fn destroy(&self, key: &str) -> Result<()> {
            self.inner.destroy(key)
        }
        fn gc(&self, max_lifetime_secs: u64) -> Result<usize> {
            self.inner.gc(max_lifetime_secs)
        }
    }

    #[test]
    fn test_write_racing_destroy_leaves_no_orphan_payload() {
        let store = setup_store();
        let backend = Arc::new(DestroyDuringWrite {
            inner: MemoryBackend::new(),
            store: Arc::clone(&store),
            identifier: "abc",
        });
        let mut session = controller_with(Arc::clone(&store), backend.clone(), 1440);

        session.read("abc", &ctx()).unwrap();
        let payload_key = session.payload_key().unwrap().to_string();

        let err = session.write("abc", b"data", &ctx()).unwrap_err();
        assert!(matches!(err, Error::DestroyedConcurrently(ref id) if id == "abc"));
        assert!(err.is_persistence());
        assert_eq!(session.state(), LifecycleState::Destroyed);

        assert!(store.find("abc").unwrap().is_none());
        assert!(backend.inner.is_empty());
        assert_eq!(backend.read(&payload_key).unwrap(), None);
    }
}
