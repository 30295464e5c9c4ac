//! File-backed key-value store
//!
//! Keeps the full map in memory behind a mutex and rewrites the JSON file on
//! every mutation. Reads never touch the disk.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_claims::KeyValueStore;

use crate::error::StoreError;

type Entries = BTreeMap<String, String>;

/// Key-value store persisted as a single JSON file
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileKeyValueStore {
    /// Opens the store at `path`, creating parent directories as needed
    ///
    /// A missing file starts an empty store. A file that is not a JSON
    /// string map is logged and replaced on the next write.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Entries>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Store file is not a JSON string map; starting empty");
                    Entries::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        info!(keys = entries.len(), "Opened claim store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Writes the map next to the target and renames it into place
    fn flush(&self, entries: &Entries) -> Result<(), StoreError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        let encoded = serde_json::to_vec_pretty(entries)?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        temp.write_all(&encoded).map_err(|e| StoreError::io(temp.path(), e))?;
        temp.as_file().sync_all().map_err(|e| StoreError::io(temp.path(), e))?;
        temp.persist(&self.path).map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!(keys = entries.len(), "Flushed claim store");
        Ok(())
    }

    /// Applies `change` and flushes; the in-memory map is rolled back if the flush fails
    fn mutate(&self, change: impl FnOnce(&mut Entries) -> bool) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        let previous = entries.clone();
        if !change(&mut entries) {
            return Ok(());
        }
        if let Err(e) = self.flush(&entries) {
            *entries = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), PortError> {
        self.mutate(|entries| {
            if entries.get(key) == Some(&value) {
                return false;
            }
            entries.insert(key.to_string(), value);
            true
        })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PortError> {
        self.mutate(|entries| entries.remove(key).is_some())?;
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<(), PortError> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            entries.len() != before
        })?;
        Ok(())
    }
}

impl DomainPort for FileKeyValueStore {}

#[async_trait]
impl HealthCheckable for FileKeyValueStore {
    /// Checks that the store directory is still present and the lock usable
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

        let problem = match (fs::metadata(dir), self.lock()) {
            (Ok(meta), Ok(_)) if meta.is_dir() => None,
            (Ok(_), Ok(_)) => Some(format!("{} is not a directory", dir.display())),
            (Err(e), _) => Some(StoreError::io(dir, e).to_string()),
            (_, Err(e)) => Some(e.to_string()),
        };

        HealthCheckResult {
            adapter_id: "file-claim-store".to_string(),
            status: if problem.is_none() { AdapterHealth::Healthy } else { AdapterHealth::Unhealthy },
            latency_ms: start.elapsed().as_millis() as u64,
            message: problem,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("nested/claims.json")).unwrap();
        assert!(store.is_empty());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.json");

        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("claim/a/disposition", "\"approved\"".to_string()).unwrap();
        store.set("claim/a/workflow_step", "\"closure\"".to_string()).unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get("claim/a/disposition").unwrap().as_deref(),
            Some("\"approved\"")
        );
    }

    #[test]
    fn test_clear_prefix_only_touches_namespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.json");
        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("claim/a/image", "{}".to_string()).unwrap();
        store.set("claim/a/approval/auto_approve", "true".to_string()).unwrap();
        store.set("claim/b/image", "{}".to_string()).unwrap();

        store.clear_prefix("claim/a/").unwrap();

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("claim/b/image").unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("claims.json")).unwrap();
        store.delete("claim/a/cost_estimate").unwrap();
        // nothing changed, so nothing was written
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileKeyValueStore::open(&path).unwrap();
        assert!(store.is_empty());

        store.set("claim/a/disposition", "\"pending\"".to_string()).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("claim/a/disposition"));
    }

    #[test]
    fn test_failed_flush_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.json");
        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("claim/a/image", "{}".to_string()).unwrap();

        // a directory at the target path makes the rename fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(store.set("claim/a/disposition", "\"approved\"".to_string()).is_err());
        assert_eq!(store.get("claim/a/disposition").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_health_check_reports_missing_directory() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("data/claims.json")).unwrap();
        assert_eq!(store.health_check().await.status, AdapterHealth::Healthy);

        fs::remove_dir_all(dir.path().join("data")).unwrap();
        let health = store.health_check().await;
        assert_eq!(health.status, AdapterHealth::Unhealthy);
        assert!(health.message.is_some());
    }
}
