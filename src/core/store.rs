//! Persisted per-file metadata store
//!
//! Indexes are never persisted. At load time a library is rebuilt from this
//! snapshot of per-file metadata (capture date, size, signature, camera model,
//! storage identity), keyed by record id. The snapshot is a versioned JSON
//! file kept in the library root.

use crate::core::error::{LibraryError, Result};
use crate::library::record::{CaptureDate, MediaKind, MediaRecord, RecordId, Signature, SystemIdentity};
use crate::library::Library;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Metadata remembered for one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMetadata {
    #[serde(default)]
    pub capture_date: Option<CaptureDate>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub camera_model: Option<String>,
    #[serde(default)]
    pub system_identity: Option<SystemIdentity>,
    #[serde(default)]
    pub kind: MediaKind,
}

impl From<&MediaRecord> for StoredMetadata {
    fn from(record: &MediaRecord) -> Self {
        Self {
            capture_date: record.capture_date,
            file_size: record.file_size,
            signature: record.signature.clone(),
            camera_model: record.camera_model.clone(),
            system_identity: record.system_identity,
            kind: record.kind,
        }
    }
}

impl StoredMetadata {
    /// Rebuild a record from the stored fields
    pub fn to_record(&self, id: &str) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            capture_date: self.capture_date,
            file_size: self.file_size,
            signature: self.signature.clone(),
            system_identity: self.system_identity,
            kind: self.kind,
            camera_model: self.camera_model.clone(),
        }
    }
}

/// Versioned snapshot of a library's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStore {
    version: u32,
    #[serde(default)]
    saved_at: u64,
    #[serde(default)]
    entries: BTreeMap<RecordId, StoredMetadata>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl MetadataStore {
    const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| LibraryError::store(path, format!("failed to read: {}", e)))?;

        let store: MetadataStore = serde_json::from_str(&json)
            .map_err(|e| LibraryError::store(path, format!("failed to parse: {}", e)))?;

        if store.version != Self::CURRENT_VERSION {
            return Err(LibraryError::store(
                path,
                format!(
                    "version mismatch: expected {}, got {}",
                    Self::CURRENT_VERSION,
                    store.version
                ),
            ));
        }

        debug!("Loaded {} metadata entries from {}", store.entries.len(), path.display());
        Ok(store)
    }

    /// Load a store, starting empty when it is missing or unusable
    ///
    /// A broken store only costs recomputation, so it is never fatal.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring metadata store, rebuilding: {}", e);
                Self::default()
            }
        }
    }

    /// Write the store to disk as pretty JSON
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.saved_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LibraryError::store(path, format!("failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LibraryError::store(path, format!("failed to create directory: {}", e)))?;
        }

        fs::write(path, json)
            .map_err(|e| LibraryError::store(path, format!("failed to write: {}", e)))?;

        info!("Saved {} metadata entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Snapshot every record of a library
    pub fn from_library(library: &Library) -> Self {
        Self {
            entries: library
                .records()
                .map(|r| (r.id.clone(), StoredMetadata::from(r)))
                .collect(),
            ..Self::default()
        }
    }

    /// Rebuild a library in memory from the stored entries alone
    pub fn to_library(&self, name: &str) -> Result<Library> {
        let mut library = Library::new(name);
        for (id, metadata) in &self.entries {
            library.insert(metadata.to_record(id))?;
        }
        Ok(library)
    }

    pub fn get(&self, id: &str) -> Option<&StoredMetadata> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: impl Into<RecordId>, metadata: StoredMetadata) {
        self.entries.insert(id.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::{day, image, with_identity};
    use tempfile::TempDir;

    fn sample_library() -> Library {
        let mut library = Library::new("A");
        library
            .insert(with_identity(image("a.jpg", Some(day(1)), 100, Some(7)), 1, 2))
            .unwrap();
        library.insert(image("b.jpg", None, 50, None)).unwrap();
        library
            .set_camera_model("a.jpg", Some("X100V".to_string()))
            .unwrap();
        library
    }

    #[test]
    fn test_store_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meta").join("store.json");

        let library = sample_library();
        let mut store = MetadataStore::from_library(&library);
        store.save(&path).unwrap();

        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("a.jpg").unwrap().camera_model.as_deref(), Some("X100V"));

        let rebuilt = loaded.to_library("A").unwrap();
        assert!(rebuilt.size_index().contains(day(1), 100));
        assert!(rebuilt.identity_index().exists(SystemIdentity::new(1, 2)));
        assert_eq!(rebuilt.record("b.jpg"), library.record("b.jpg"));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();

        assert!(matches!(
            MetadataStore::load(&path),
            Err(LibraryError::Store { .. })
        ));
        assert!(MetadataStore::load_or_default(&path).is_empty());
    }

    #[test]
    fn test_corrupt_store_falls_back_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(MetadataStore::load_or_default(&path).is_empty());
        assert!(MetadataStore::load_or_default(&temp_dir.path().join("missing.json")).is_empty());
    }
}
