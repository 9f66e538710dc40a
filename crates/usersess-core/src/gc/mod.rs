//! Expired session cleanup.
//!
//! A sweep removes every relational record whose expiry lies in the past,
//! then asks the payload engine to run its own cleanup. Sweeps never overlap:
//! a second caller waits for the running one ([`GarbageCollector::sweep`]) or
//! skips ([`GarbageCollector::try_sweep`]).

mod scheduler;

pub use scheduler::GcScheduler;

use crate::backend::DelegateBackend;
use crate::error::{Error, Result};
use crate::store::SessionRecordStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records deleted from the relational store
    pub rows_removed: usize,
    /// Payloads the engine reported as removed; `None` if its cleanup failed
    pub payloads_removed: Option<usize>,
    /// Records expiring before this instant were removed
    pub cutoff: DateTime<Utc>,
}

/// Sweeps expired records and forwards cleanup to the payload engine.
pub struct GarbageCollector {
    store: Arc<SessionRecordStore>,
    backend: Arc<dyn DelegateBackend>,
    running: Mutex<()>,
}

impl GarbageCollector {
    pub fn new(store: Arc<SessionRecordStore>, backend: Arc<dyn DelegateBackend>) -> Self {
        Self {
            store,
            backend,
            running: Mutex::new(()),
        }
    }

    /// Run a sweep, waiting for any sweep already in progress.
    ///
    /// The relational cutoff is "now": records are removed once their own
    /// expiry has passed. `max_lifetime_secs` is passed to the engine, which
    /// applies it to payloads it cannot otherwise date.
    pub fn sweep(&self, max_lifetime_secs: u64) -> Result<SweepReport> {
        let _guard = self.running.lock().map_err(|_| Error::LockPoisoned)?;
        self.sweep_locked(max_lifetime_secs)
    }

    /// Run a sweep unless one is already in progress, in which case
    /// `Ok(None)` is returned immediately.
    pub fn try_sweep(&self, max_lifetime_secs: u64) -> Result<Option<SweepReport>> {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(_)) => return Err(Error::LockPoisoned),
        };
        self.sweep_locked(max_lifetime_secs).map(Some)
    }

    fn sweep_locked(&self, max_lifetime_secs: u64) -> Result<SweepReport> {
        let cutoff = Utc::now();
        let rows_removed = match self.store.delete_expired_before(cutoff) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(table = %self.store.fields().table, error = %e, "Expired record sweep failed");
                return Err(e);
            }
        };

        // The relational sweep already succeeded; engine failures are reported, not raised
        let payloads_removed = match self.backend.gc(max_lifetime_secs) {
            Ok(removed) => Some(removed),
            Err(e) => {
                warn!(engine = %self.backend.name(), error = %e, "Payload gc failed");
                None
            }
        };

        info!(
            rows_removed,
            payloads_removed = ?payloads_removed,
            max_lifetime_secs,
            "Session gc sweep finished"
        );

        Ok(SweepReport {
            rows_removed,
            payloads_removed,
            cutoff,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::db::{Database, SessionRecord};
    use crate::store::new_payload_key;
    use chrono::Duration;

    /// Engine whose every call fails
    pub(crate) struct BrokenBackend;

    impl DelegateBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::backend("broken", "unavailable"))
        }
        fn write(&self, _key: &str, _payload: &[u8]) -> Result<()> {
            Err(Error::backend("broken", "unavailable"))
        }
        fn destroy(&self, _key: &str) -> Result<()> {
            Err(Error::backend("broken", "unavailable"))
        }
        fn gc(&self, _max_lifetime_secs: u64) -> Result<usize> {
            Err(Error::backend("broken", "unavailable"))
        }
    }

    pub(crate) fn setup_store() -> Arc<SessionRecordStore> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = SessionRecordStore::with_defaults(db).unwrap();
        store.ensure_schema().unwrap();
        Arc::new(store)
    }

    pub(crate) fn insert_record(store: &SessionRecordStore, id: &str, expires_in: Duration) {
        let now = Utc::now();
        store
            .save(&SessionRecord {
                identifier: id.to_string(),
                payload_key: new_payload_key(),
                user_id: None,
                display_name: String::new(),
                user_agent: String::new(),
                client_address: String::new(),
                created_at: now,
                modified_at: now,
                accessed_at: None,
                expires_at: now + expires_in,
            })
            .unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = setup_store();
        insert_record(&store, "stale", Duration::seconds(-10));
        insert_record(&store, "live", Duration::seconds(600));

        let gc = GarbageCollector::new(Arc::clone(&store), Arc::new(MemoryBackend::new()));
        let report = gc.sweep(1440).unwrap();

        assert_eq!(report.rows_removed, 1);
        assert_eq!(report.payloads_removed, Some(0));
        assert!(store.find("stale").unwrap().is_none());
        assert!(store.find("live").unwrap().is_some());
    }

    #[test]
    fn test_engine_failure_is_not_escalated() {
        let store = setup_store();
        insert_record(&store, "stale", Duration::seconds(-10));

        let gc = GarbageCollector::new(Arc::clone(&store), Arc::new(BrokenBackend));
        let report = gc.sweep(1440).unwrap();

        assert_eq!(report.rows_removed, 1);
        assert_eq!(report.payloads_removed, None);
    }

    #[test]
    fn test_try_sweep_skips_while_running() {
        let gc = GarbageCollector::new(setup_store(), Arc::new(MemoryBackend::new()));

        let guard = gc.running.lock().unwrap();
        assert_eq!(gc.try_sweep(60).unwrap(), None);
        drop(guard);

        assert!(gc.try_sweep(60).unwrap().is_some());
    }

    #[test]
    fn test_relational_failure_is_returned() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SessionRecordStore::with_defaults(db).unwrap());

        // No table yet, so the delete fails
        let gc = GarbageCollector::new(store, Arc::new(MemoryBackend::new()));
        let err = gc.sweep(60).unwrap_err();
        assert!(err.is_persistence());
    }
}
