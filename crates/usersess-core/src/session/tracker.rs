//! Shared wiring for building per-request controllers.

use super::context::{ContextIdentity, IdentityResolver};
use super::display::{DisplayNamer, UserAgentSummary};
use super::lifecycle::SessionLifecycleController;
use crate::backend::{DelegateBackend, EngineContext, EngineRegistry};
use crate::config::Settings;
use crate::db::Database;
use crate::error::Result;
use crate::gc::{GarbageCollector, GcScheduler};
use crate::store::SessionRecordStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Long-lived state shared by every controller of an application: the
/// record store, the payload engine, the collaborators and the collector.
#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<SessionRecordStore>,
    backend: Arc<dyn DelegateBackend>,
    gc: Arc<GarbageCollector>,
    identity: Arc<dyn IdentityResolver>,
    namer: Arc<dyn DisplayNamer>,
    timeout_secs: u64,
}

impl SessionTracker {
    pub fn new(
        store: Arc<SessionRecordStore>,
        backend: Arc<dyn DelegateBackend>,
        timeout_secs: u64,
    ) -> Self {
        let gc = Arc::new(GarbageCollector::new(Arc::clone(&store), Arc::clone(&backend)));
        Self {
            store,
            backend,
            gc,
            identity: Arc::new(ContextIdentity),
            namer: Arc::new(UserAgentSummary),
            timeout_secs,
        }
    }

    /// Validate `settings`, open the database, make sure the session table
    /// exists and construct the configured engine.
    pub fn from_settings(settings: &Settings, registry: &EngineRegistry) -> Result<Self> {
        settings.validate(registry)?;

        let database_path = settings.resolve_database_path();
        let db = Arc::new(Database::open_path(&database_path)?);

        let store = SessionRecordStore::new(Arc::clone(&db), settings.fields.clone())?;
        store.ensure_schema()?;

        let backend = registry.build(&EngineContext {
            config: &settings.engine,
            database: db,
            data_dir: &settings.data_dir,
            timeout_secs: settings.timeout_secs,
        })?;

        info!(
            database = %database_path.display(),
            engine = %backend.name(),
            timeout_secs = settings.timeout_secs,
            "Session tracking ready"
        );

        Ok(Self::new(Arc::new(store), backend, settings.timeout_secs))
    }

    /// Replace the identity resolver
    pub fn with_identity_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.identity = Arc::new(resolver);
        self
    }

    /// Replace the display namer
    pub fn with_display_namer(mut self, namer: impl DisplayNamer + 'static) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    /// A fresh controller for one protocol session
    pub fn controller(&self) -> SessionLifecycleController {
        SessionLifecycleController::new(
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
            Arc::clone(&self.gc),
            Arc::clone(&self.identity),
            Arc::clone(&self.namer),
            self.timeout_secs,
        )
    }

    pub fn store(&self) -> &Arc<SessionRecordStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn DelegateBackend> {
        &self.backend
    }

    pub fn garbage_collector(&self) -> &Arc<GarbageCollector> {
        &self.gc
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Start periodic sweeps sharing this tracker's collector.
    pub fn spawn_gc(&self, interval: Duration, max_lifetime_secs: u64) -> GcScheduler {
        GcScheduler::start(Arc::clone(&self.gc), interval, max_lifetime_secs)
    }
}
