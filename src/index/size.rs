//! Size index: capture date -> byte size -> records
//!
//! The cheapest content tier. Two records with the same capture date and the
//! same byte size are treated as duplicates without any hashing.

use crate::core::error::{LibraryError, Result};
use crate::library::record::{CaptureDate, RecordId};
use log::trace;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct SizeIndex {
    dates: BTreeMap<CaptureDate, BTreeMap<u64, Vec<RecordId>>>,
}

impl SizeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under (date, size); no-op if already present
    pub fn add(&mut self, date: CaptureDate, size: u64, id: &str) {
        let bucket = self.dates.entry(date).or_default().entry(size).or_default();
        if !bucket.iter().any(|r| r == id) {
            trace!("size index: add ({}, {}) -> {}", date, size, id);
            bucket.push(id.to_string());
        }
    }

    /// Remove a record from (date, size), pruning the bucket and date when empty
    pub fn remove(&mut self, date: CaptureDate, size: u64, id: &str) -> Result<()> {
        let key = || format!("({}, {})", date, size);

        let sizes = self
            .dates
            .get_mut(&date)
            .ok_or_else(|| LibraryError::desync("size index", id, key()))?;
        let bucket = sizes
            .get_mut(&size)
            .ok_or_else(|| LibraryError::desync("size index", id, key()))?;
        let pos = bucket
            .iter()
            .position(|r| r == id)
            .ok_or_else(|| LibraryError::desync("size index", id, key()))?;

        bucket.remove(pos);
        if bucket.is_empty() {
            sizes.remove(&size);
        }
        if sizes.is_empty() {
            self.dates.remove(&date);
        }
        trace!("size index: remove {} -> {}", key(), id);
        Ok(())
    }

    /// Records at exactly (date, size)
    pub fn bucket(&self, date: CaptureDate, size: u64) -> &[RecordId] {
        self.dates
            .get(&date)
            .and_then(|sizes| sizes.get(&size))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, date: CaptureDate, size: u64) -> bool {
        !self.bucket(date, size).is_empty()
    }

    /// Size groups for one date, ordered by size
    pub fn sizes_for(&self, date: CaptureDate) -> Option<&BTreeMap<u64, Vec<RecordId>>> {
        self.dates.get(&date)
    }

    /// Dates holding at least one record, oldest first
    pub fn dates(&self) -> impl Iterator<Item = &CaptureDate> {
        self.dates.keys()
    }

    /// All dates with their size groups, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (&CaptureDate, &BTreeMap<u64, Vec<RecordId>>)> {
        self.dates.iter()
    }

    /// Number of distinct dates
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
