//! Media library: tracked records plus their three lookup indexes
//!
//! A [`Library`] is the single owner and the only mutator of its indexes.
//! Every field update removes the record from the buckets keyed by the old
//! value before inserting it under the new one, so stale co-membership cannot
//! happen. Mutation takes `&mut self`; callers that compute signatures in
//! parallel must merge the results back on one thread.
//!
//! # Submodules
//!
//! - `record` - Record data model and field updates
//! - `scanner` - Directory walker producing records for a library

pub mod record;
pub mod scanner;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::core::error::{LibraryError, Result};
use crate::index::{ExactIdentityIndex, SignatureIndex, SizeIndex};
use log::debug;
use record::{FieldUpdate, MediaRecord, RecordId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use record::{
    CaptureDate, MediaKind, PerceptualHash, Signature, SystemIdentity, NEAR_DUPLICATE_THRESHOLD,
};

/// One library (e.g. "camera import" or "curated archive")
#[derive(Debug, Default, Clone)]
pub struct Library {
    name: String,
    root: Option<PathBuf>,
    records: BTreeMap<RecordId, MediaRecord>,
    identity_index: ExactIdentityIndex,
    size_index: SizeIndex,
    signature_index: SignatureIndex,
}

impl Library {
    /// Create an empty in-memory library
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an empty library rooted at a directory
    pub fn with_root(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: Some(root.into()),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Absolute path of a record, if the library has a root
    pub fn path_of(&self, id: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(id))
    }

    /// Start tracking a record, indexing whatever fields it already has
    pub fn insert(&mut self, record: MediaRecord) -> Result<()> {
        if self.records.contains_key(&record.id) {
            return Err(LibraryError::DuplicateRecord(record.id));
        }
        debug!("{}: insert {}", self.name, record.id);
        self.index_identity(&record);
        self.index_size(&record);
        self.index_signature(&record);
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Stop tracking a record, detaching it from every index
    pub fn remove(&mut self, id: &str) -> Result<MediaRecord> {
        let record = self
            .records
            .get(id)
            .ok_or_else(|| LibraryError::UnknownRecord(id.to_string()))?;

        unindex_identity(&mut self.identity_index, record)?;
        unindex_size(&mut self.size_index, record)?;
        unindex_signature(&mut self.signature_index, record)?;

        debug!("{}: remove {}", self.name, id);
        self.records
            .remove(id)
            .ok_or_else(|| LibraryError::UnknownRecord(id.to_string()))
    }

    /// Move a record into another library (copy/sync collaborators)
    pub fn transfer_to(&mut self, id: &str, destination: &mut Library) -> Result<()> {
        if destination.records.contains_key(id) {
            return Err(LibraryError::DuplicateRecord(id.to_string()));
        }
        let record = self.remove(id)?;
        debug!("transfer {} from {} to {}", id, self.name, destination.name);
        destination.insert(record)
    }

    /// Apply one field update, moving the record between buckets as needed
    pub fn apply(&mut self, id: &str, update: FieldUpdate) -> Result<()> {
        let record = self
            .records
            .get(id)
            .ok_or_else(|| LibraryError::UnknownRecord(id.to_string()))?;

        let mut updated = record.clone();
        match update {
            FieldUpdate::SystemIdentity(identity) => updated.system_identity = identity,
            FieldUpdate::CaptureDate(date) => updated.capture_date = date,
            FieldUpdate::FileSize(size) => updated.file_size = Some(size),
            FieldUpdate::Kind(kind) => updated.kind = kind,
            FieldUpdate::Signature(signature) => updated.signature = signature,
            FieldUpdate::CameraModel(model) => updated.camera_model = model,
        }
        if &updated == record {
            return Ok(());
        }

        let identity_changed = updated.system_identity != record.system_identity;
        let size_changed = updated.size_key() != record.size_key();
        let signature_changed = updated.signature_key() != record.signature_key();

        if identity_changed {
            unindex_identity(&mut self.identity_index, record)?;
        }
        if size_changed {
            unindex_size(&mut self.size_index, record)?;
        }
        if signature_changed {
            unindex_signature(&mut self.signature_index, record)?;
        }

        if identity_changed {
            self.index_identity(&updated);
        }
        if size_changed {
            self.index_size(&updated);
        }
        if signature_changed {
            self.index_signature(&updated);
        }

        self.records.insert(id.to_string(), updated);
        Ok(())
    }

    pub fn set_capture_date(&mut self, id: &str, date: Option<CaptureDate>) -> Result<()> {
        self.apply(id, FieldUpdate::CaptureDate(date))
    }

    pub fn set_file_size(&mut self, id: &str, size: u64) -> Result<()> {
        self.apply(id, FieldUpdate::FileSize(size))
    }

    pub fn set_signature(&mut self, id: &str, signature: Option<Signature>) -> Result<()> {
        self.apply(id, FieldUpdate::Signature(signature))
    }

    pub fn set_system_identity(&mut self, id: &str, identity: Option<SystemIdentity>) -> Result<()> {
        self.apply(id, FieldUpdate::SystemIdentity(identity))
    }

    pub fn set_camera_model(&mut self, id: &str, model: Option<String>) -> Result<()> {
        self.apply(id, FieldUpdate::CameraModel(model))
    }

    /// Drop and rebuild all three indexes from the records
    ///
    /// Index updates are not transactional; this is the recovery path after
    /// an interrupted mutation.
    pub fn rebuild_indexes(&mut self) {
        self.identity_index = ExactIdentityIndex::new();
        self.size_index = SizeIndex::new();
        self.signature_index = SignatureIndex::new();

        let records: Vec<MediaRecord> = self.records.values().cloned().collect();
        for record in &records {
            self.index_identity(record);
            self.index_size(record);
            self.index_signature(record);
        }
        debug!("{}: rebuilt indexes for {} records", self.name, records.len());
    }

    pub fn record(&self, id: &str) -> Option<&MediaRecord> {
        self.records.get(id)
    }

    pub fn contains_record(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All records, ordered by id
    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.values()
    }

    /// Records without a capture date (never compared by content)
    pub fn undated_records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.values().filter(|r| r.capture_date.is_none())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identity_index(&self) -> &ExactIdentityIndex {
        &self.identity_index
    }

    pub fn size_index(&self) -> &SizeIndex {
        &self.size_index
    }

    pub fn signature_index(&self) -> &SignatureIndex {
        &self.signature_index
    }

    fn index_identity(&mut self, record: &MediaRecord) {
        if let Some(identity) = record.system_identity {
            self.identity_index.add(identity, &record.id);
        }
    }

    fn index_size(&mut self, record: &MediaRecord) {
        if let Some((date, size)) = record.size_key() {
            self.size_index.add(date, size, &record.id);
        }
    }

    fn index_signature(&mut self, record: &MediaRecord) {
        if let Some((date, signature)) = record.signature_key() {
            self.signature_index.add(date, signature, &record.id);
        }
    }
}

fn unindex_identity(index: &mut ExactIdentityIndex, record: &MediaRecord) -> Result<()> {
    match record.system_identity {
        Some(identity) => index.remove(identity, &record.id),
        None => Ok(()),
    }
}

fn unindex_size(index: &mut SizeIndex, record: &MediaRecord) -> Result<()> {
    match record.size_key() {
        Some((date, size)) => index.remove(date, size, &record.id),
        None => Ok(()),
    }
}

fn unindex_signature(index: &mut SignatureIndex, record: &MediaRecord) -> Result<()> {
    match record.capture_date {
        Some(date) if record.signature.is_some() => index.remove(date, &record.id),
        _ => Ok(()),
    }
}
