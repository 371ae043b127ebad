//! Exact identity index: storage identity -> records
//!
//! Detects the same physical file reappearing (hardlink, rename detected as a
//! move) without any content comparison.

use crate::core::error::{LibraryError, Result};
use crate::library::record::{RecordId, SystemIdentity};
use log::trace;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ExactIdentityIndex {
    buckets: HashMap<SystemIdentity, Vec<RecordId>>,
}

impl ExactIdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under `identity`; no-op if it is already there
    pub fn add(&mut self, identity: SystemIdentity, id: &str) {
        let bucket = self.buckets.entry(identity).or_default();
        if !bucket.iter().any(|r| r == id) {
            trace!("identity index: add {} -> {}", identity, id);
            bucket.push(id.to_string());
        }
    }

    /// Remove a record from `identity`, deleting the bucket once empty
    pub fn remove(&mut self, identity: SystemIdentity, id: &str) -> Result<()> {
        let bucket = self
            .buckets
            .get_mut(&identity)
            .ok_or_else(|| LibraryError::desync("identity index", id, identity))?;

        let pos = bucket
            .iter()
            .position(|r| r == id)
            .ok_or_else(|| LibraryError::desync("identity index", id, identity))?;

        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&identity);
        }
        trace!("identity index: remove {} -> {}", identity, id);
        Ok(())
    }

    pub fn exists(&self, identity: SystemIdentity) -> bool {
        self.buckets.contains_key(&identity)
    }

    /// Records sharing `identity` (empty if none)
    pub fn get(&self, identity: SystemIdentity) -> &[RecordId] {
        self.buckets
            .get(&identity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
