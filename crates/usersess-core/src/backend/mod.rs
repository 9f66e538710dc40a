//! Delegate payload engines.
//!
//! The lifecycle controller never stores session payload bytes itself; it
//! hands them to a [`DelegateBackend`] under the record's payload key.
//! Engines are looked up by name in an [`EngineRegistry`] when the
//! application starts, so a misspelled engine fails before the first request.
//!
//! Built-in engines:
//! - `cache`: in-process map ([`MemoryBackend`])
//! - `files`: one file per payload key ([`FileBackend`])
//! - `database`: SQLite payload table ([`DatabaseBackend`])

mod database;
mod files;
mod memory;

pub use database::DatabaseBackend;
pub use files::FileBackend;
pub use memory::MemoryBackend;

use crate::db::Database;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Standard session save-handler contract for payload engines.
pub trait DelegateBackend: Send + Sync {
    /// Engine name used in logs and errors
    fn name(&self) -> &str;

    /// Initialization hook of the session protocol.
    fn open(&self, _save_path: &str, _session_name: &str) -> Result<()> {
        Ok(())
    }

    /// Read the payload stored under `key`; `None` on a miss.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `payload` under `key`, replacing any previous value.
    fn write(&self, key: &str, payload: &[u8]) -> Result<()>;

    /// Remove the payload under `key`. A missing key is not an error.
    fn destroy(&self, key: &str) -> Result<()>;

    /// Drop payloads idle for longer than `max_lifetime_secs`; returns how
    /// many were removed, as far as the engine can tell.
    fn gc(&self, max_lifetime_secs: u64) -> Result<usize>;

    /// True when payloads live only in this process, so another process
    /// sharing the database cannot see or remove them.
    fn is_process_local(&self) -> bool {
        false
    }
}

/// Engine selection as it appears in configuration.
///
/// ```toml
/// [engine]
/// name = "files"
/// options = { path = "/var/lib/usersess/payloads" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registered engine name
    #[serde(default = "default_engine")]
    pub name: String,

    /// Engine specific options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_engine() -> String {
    "cache".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine(),
            options: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    /// Set an engine option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Everything an engine factory may draw on.
pub struct EngineContext<'a> {
    pub config: &'a EngineConfig,
    /// Database shared with the record store
    pub database: Arc<Database>,
    /// Data directory for file based engines
    pub data_dir: &'a Path,
    /// Session timeout of the controller, in seconds
    pub timeout_secs: u64,
}

impl EngineContext<'_> {
    /// Parse a numeric option, falling back to `default` when unset.
    pub fn option_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.config.option(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "engine option {}.{} must be a number, got {:?}",
                    self.config.name, key, raw
                ))
            }),
            None => Ok(default),
        }
    }
}

/// Constructor registered under an engine name
pub type EngineFactory =
    Box<dyn Fn(&EngineContext<'_>) -> Result<Arc<dyn DelegateBackend>> + Send + Sync>;

/// Maps engine names to their constructors.
pub struct EngineRegistry {
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    /// Registry without any engine
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the `cache`, `files` and `database` engines
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert("cache", |_ctx| Ok(Arc::new(MemoryBackend::new())));
        registry.insert("files", |ctx| {
            let dir = ctx
                .config
                .option("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| ctx.data_dir.join("payloads"));
            Ok(Arc::new(FileBackend::new(dir)?))
        });
        registry.insert("database", |ctx| {
            let db = match ctx.config.option("path") {
                Some(path) => Arc::new(Database::open_path(Path::new(path))?),
                None => Arc::clone(&ctx.database),
            };
            let table = ctx.config.option("table").unwrap_or(DatabaseBackend::DEFAULT_TABLE);
            let timeout_secs = ctx.option_u64("timeout_secs", ctx.timeout_secs)?;
            Ok(Arc::new(DatabaseBackend::new(db, table, timeout_secs)?))
        });
        registry
    }

    fn insert<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&EngineContext<'_>) -> Result<Arc<dyn DelegateBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Register a custom engine. Names are unique.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&EngineContext<'_>) -> Result<Arc<dyn DelegateBackend>> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::config("engine name must not be empty"));
        }
        if self.factories.contains_key(&name) {
            return Err(Error::config(format!("engine already registered: {}", name)));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fail fast when configuration names an engine nobody registered.
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if self.contains(&config.name) {
            Ok(())
        } else {
            Err(Error::UnknownEngine(config.name.clone()))
        }
    }

    /// Construct the configured engine
    pub fn build(&self, ctx: &EngineContext<'_>) -> Result<Arc<dyn DelegateBackend>> {
        let factory = self
            .factories
            .get(&ctx.config.name)
            .ok_or_else(|| Error::UnknownEngine(ctx.config.name.clone()))?;
        let backend = factory(ctx)?;
        debug!(engine = %backend.name(), "Session engine constructed");
        Ok(backend)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
