//! File-per-session payload storage (`files` engine).

use super::DelegateBackend;
use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::debug;

const FILE_PREFIX: &str = "sess_";

/// Stores each payload in `<dir>/sess_<key>`.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir` for payload files, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error("create", &dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::backend("files", format!("refusing unsafe payload key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}{}", FILE_PREFIX, key)))
    }
}

fn io_error(action: &str, target: &str, err: std::io::Error) -> Error {
    Error::backend("files", format!("{} {}: {}", action, target, err))
}

impl DelegateBackend for FileBackend {
    fn name(&self) -> &str {
        "files"
    }

    fn open(&self, _save_path: &str, _session_name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| io_error("create", &self.dir.display().to_string(), e))
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", key, e)),
        }
    }

    fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        // Write then rename so readers never see a truncated payload
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, payload).map_err(|e| io_error("write", key, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error("rename", key, e))
    }

    fn destroy(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", key, e)),
        }
    }

    fn gc(&self, max_lifetime_secs: u64) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(max_lifetime_secs))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = fs::read_dir(&self.dir)
            .map_err(|e| io_error("list", &self.dir.display().to_string(), e))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let is_payload = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(FILE_PREFIX));
            if !is_payload {
                continue;
            }

            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| modified <= cutoff)
                .unwrap_or(false);
            if stale && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }

        debug!(removed, dir = %self.dir.display(), "File payload gc finished");
        Ok(removed)
    }
}
