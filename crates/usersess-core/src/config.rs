//! Configuration management for usersess.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (USERSESS_*)
//! 2. Config file (USERSESS_CONFIG, else ~/.usersess/config.toml)
//! 3. Default values
//!
//! ```toml
//! timeout_secs = 1440
//!
//! [engine]
//! name = "files"
//! options = { path = "/var/lib/usersess/payloads" }
//!
//! [fields]
//! table = "user_sessions"
//! user_id = "account_id"
//! user_agent = ""          # table has no user agent column
//!
//! [gc]
//! interval_secs = 300
//! ```

use crate::backend::{EngineConfig, EngineRegistry};
use crate::db::{DATABASE_FILE_NAME, Database};
use crate::error::{Error, Result};
use crate::session::MAX_TIMEOUT_SECS;
use crate::store::FieldMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite file holding session records; located automatically when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Base directory for usersess data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Session lifetime after each write, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Payload engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Table and column names of the session records
    #[serde(default)]
    pub fields: FieldMap,

    /// Garbage collection
    #[serde(default)]
    pub gc: GcConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcConfig {
    /// Seconds between background sweeps
    #[serde(default = "default_gc_interval")]
    pub interval_secs: u64,

    /// Lifetime handed to the payload engine; the session timeout when unset
    #[serde(default)]
    pub max_lifetime_secs: Option<u64>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".usersess")
}

fn default_timeout_secs() -> u64 {
    1440 // 24 minutes, the usual host default
}

fn default_gc_interval() -> u64 {
    300
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_gc_interval(),
            max_lifetime_secs: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            data_dir: default_data_dir(),
            timeout_secs: default_timeout_secs(),
            engine: EngineConfig::default(),
            fields: FieldMap::default(),
            gc: GcConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load a specific config file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = Self::load_file(path)?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("USERSESS_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Apply `USERSESS_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Result<Option<u64>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::config(format!("{} must be a number, got {:?}", key, raw))),
                None => Ok(None),
            }
        };

        if let Some(path) = lookup("USERSESS_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("USERSESS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(engine) = lookup("USERSESS_ENGINE") {
            if engine != self.engine.name {
                self.engine = EngineConfig::new(engine);
            }
        }
        if let Some(timeout) = number("USERSESS_TIMEOUT_SECS")? {
            self.timeout_secs = timeout;
        }
        if let Some(interval) = number("USERSESS_GC_INTERVAL_SECS")? {
            self.gc.interval_secs = interval;
        }
        Ok(())
    }

    /// Check values and that the configured engine is registered.
    pub fn validate(&self, registry: &EngineRegistry) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::config(format!(
                "timeout_secs must be between 1 and {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.gc.interval_secs == 0 {
            return Err(Error::config("gc.interval_secs must be greater than 0"));
        }
        if self.engine.name.trim().is_empty() {
            return Err(Error::config("engine.name must not be empty"));
        }
        self.fields.validate()?;
        registry.validate(&self.engine)
    }

    /// Database file to open: the configured path, an existing database
    /// found by [`Database::find_database`], or one in the data directory.
    pub fn resolve_database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => Database::find_database().unwrap_or_else(|_| self.data_dir.join(DATABASE_FILE_NAME)),
        }
    }

    /// Lifetime handed to the engine's gc
    pub fn gc_max_lifetime_secs(&self) -> u64 {
        self.gc.max_lifetime_secs.unwrap_or(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.timeout_secs, 1440);
        assert_eq!(settings.engine.name, "cache");
        assert_eq!(settings.fields.table, "user_sessions");
        assert_eq!(settings.gc.interval_secs, 300);
        assert_eq!(settings.gc_max_lifetime_secs(), 1440);
        assert!(settings.validate(&EngineRegistry::default()).is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            timeout_secs = 3600

            [engine]
            name = "files"
            options = { path = "/tmp/payloads" }

            [fields]
            user_id = "account_id"
            "#,
        )
        .unwrap();

        assert_eq!(settings.timeout_secs, 3600);
        assert_eq!(settings.engine.option("path"), Some("/tmp/payloads"));
        assert_eq!(settings.fields.user_id, "account_id");
        assert_eq!(settings.fields.identifier, "id");
        assert_eq!(settings.gc, GcConfig::default());
    }

    #[test]
    fn test_load_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        assert_eq!(Settings::load_file(&path).unwrap(), Settings::default());

        std::fs::write(&path, "[gc]\ninterval_secs = 60\nmax_lifetime_secs = 90\n").unwrap();
        let settings = Settings::load_file(&path).unwrap();
        assert_eq!(settings.gc.interval_secs, 60);
        assert_eq!(settings.gc_max_lifetime_secs(), 90);

        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(matches!(Settings::load_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut settings = Settings::from_toml_str("timeout_secs = 3600\n[engine]\nname = \"files\"").unwrap();
        settings
            .apply_overrides(env(&[
                ("USERSESS_TIMEOUT_SECS", "60"),
                ("USERSESS_ENGINE", "database"),
                ("USERSESS_DATABASE_PATH", "/tmp/sessions.db"),
            ]))
            .unwrap();

        assert_eq!(settings.timeout_secs, 60);
        assert_eq!(settings.engine.name, "database");
        assert_eq!(settings.resolve_database_path(), PathBuf::from("/tmp/sessions.db"));
    }

    #[test]
    fn test_bad_env_number() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(env(&[("USERSESS_GC_INTERVAL_SECS", "often")]))
            .unwrap_err();
        assert!(err.to_string().contains("USERSESS_GC_INTERVAL_SECS"));
    }

    #[test]
    fn test_validate() {
        let registry = EngineRegistry::default();

        let mut settings = Settings::default();
        settings.timeout_secs = 0;
        assert!(settings.validate(&registry).is_err());

        let mut settings = Settings::default();
        settings.gc.interval_secs = 0;
        assert!(settings.validate(&registry).is_err());

        let mut settings = Settings::default();
        settings.engine = EngineConfig::new("memcache");
        assert!(matches!(settings.validate(&registry), Err(Error::UnknownEngine(_))));

        let mut settings = Settings::default();
        settings.fields.expires_at = "expires; DROP TABLE x".to_string();
        assert!(settings.validate(&registry).is_err());
    }
}
