//! In-process payload cache (`cache` engine).

use super::DelegateBackend;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    data: Vec<u8>,
    written_at: Instant,
}

/// Payloads kept in a process-local map.
///
/// Nothing survives a restart, which matches a cache-backed session store.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached payloads
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::backend("cache", "lock poisoned")
}

impl DelegateBackend for MemoryBackend {
    fn name(&self) -> &str {
        "cache"
    }

    fn is_process_local(&self) -> bool {
        true
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).map(|entry| entry.data.clone()))
    }

    fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                data: payload.to_vec(),
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn gc(&self, max_lifetime_secs: u64) -> Result<usize> {
        let max_lifetime = Duration::from_secs(max_lifetime_secs);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| entry.written_at.elapsed() < max_lifetime);
        Ok(before - entries.len())
    }
}
