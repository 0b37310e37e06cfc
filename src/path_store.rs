//! Media Protector - Original Path Table
//!
//! Remembers where each container's file originally lived so unprotect can
//! restore it there. Keyed by container file name (e.g. `a.jpg.mprot`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ProtectorResult;
use crate::files::write_atomic;

/// Lookup table from container name to original location
pub trait OriginalPathStore: Send + Sync {
    fn store(&self, container_name: &str, original_path: &Path) -> ProtectorResult<()>;

    fn lookup(&self, container_name: &str) -> ProtectorResult<Option<PathBuf>>;

    fn remove(&self, container_name: &str) -> ProtectorResult<()>;
}

/// One recorded location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRecord {
    pub original_path: PathBuf,
    pub protected_at: DateTime<Utc>,
}

impl PathRecord {
    fn now(original_path: &Path) -> Self {
        Self {
            original_path: original_path.to_path_buf(),
            protected_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY
// ═══════════════════════════════════════════════════════════════════════════

/// Process-lifetime table
#[derive(Debug, Default)]
pub struct MemoryPathStore {
    records: Mutex<HashMap<String, PathRecord>>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl OriginalPathStore for MemoryPathStore {
    fn store(&self, container_name: &str, original_path: &Path) -> ProtectorResult<()> {
        self.records
            .lock()
            .insert(container_name.to_string(), PathRecord::now(original_path));
        Ok(())
    }

    fn lookup(&self, container_name: &str) -> ProtectorResult<Option<PathBuf>> {
        Ok(self
            .records
            .lock()
            .get(container_name)
            .map(|r| r.original_path.clone()))
    }

    fn remove(&self, container_name: &str) -> ProtectorResult<()> {
        self.records.lock().remove(container_name);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON FILE
// ═══════════════════════════════════════════════════════════════════════════

/// Table persisted as a JSON object, rewritten atomically on every change
#[derive(Debug)]
pub struct JsonPathStore {
    path: PathBuf,
    records: Mutex<HashMap<String, PathRecord>>,
}

impl JsonPathStore {
    /// Open the table at `path`, starting empty if the file does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> ProtectorResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice(&data)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of every record
    pub fn records(&self) -> HashMap<String, PathRecord> {
        self.records.lock().clone()
    }

    fn persist(&self, records: &HashMap<String, PathRecord>) -> ProtectorResult<()> {
        let data = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &data)
    }
}

impl OriginalPathStore for JsonPathStore {
    fn store(&self, container_name: &str, original_path: &Path) -> ProtectorResult<()> {
        let mut records = self.records.lock();
        records.insert(container_name.to_string(), PathRecord::now(original_path));
        self.persist(&records)
    }

    fn lookup(&self, container_name: &str) -> ProtectorResult<Option<PathBuf>> {
        Ok(self
            .records
            .lock()
            .get(container_name)
            .map(|r| r.original_path.clone()))
    }

    fn remove(&self, container_name: &str) -> ProtectorResult<()> {
        let mut records = self.records.lock();
        if records.remove(container_name).is_some() {
            self.persist(&records)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = MemoryPathStore::new();
        store.store("a.jpg.mprot", Path::new("/sd/DCIM/a.jpg")).unwrap();

        assert_eq!(
            store.lookup("a.jpg.mprot").unwrap(),
            Some(PathBuf::from("/sd/DCIM/a.jpg"))
        );
        assert_eq!(store.lookup("b.jpg.mprot").unwrap(), None);

        store.remove("a.jpg.mprot").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("state").join("paths.json");

        {
            let store = JsonPathStore::open(&file).unwrap();
            store.store("clip.mp4.mprot", Path::new("/sd/Movies/clip.mp4")).unwrap();
            store.store("a.png.mprot", Path::new("/sd/a.png")).unwrap();
            store.remove("a.png.mprot").unwrap();
        }

        let reopened = JsonPathStore::open(&file).unwrap();
        assert_eq!(
            reopened.lookup("clip.mp4.mprot").unwrap(),
            Some(PathBuf::from("/sd/Movies/clip.mp4"))
        );
        assert_eq!(reopened.lookup("a.png.mprot").unwrap(), None);
        assert_eq!(reopened.records().len(), 1);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("paths.json");
        std::fs::write(&file, b"not json").unwrap();

        assert!(JsonPathStore::open(&file).is_err());
    }
}
