//! Signature index: capture date -> near-duplicate clusters
//!
//! Clustering is greedy and deliberately non-transitive. A new fingerprint is
//! tested only against each cluster's original representative, in insertion
//! order, and joins the first one within [`NEAR_DUPLICATE_THRESHOLD`]. The
//! representative never changes, so for a chain A-B-C with A~B, B~C and
//! A!~C, inserting A, B, C yields `{A, B}` and `{C}`.

use crate::core::error::{LibraryError, Result};
use crate::library::record::{CaptureDate, RecordId, Signature, NEAR_DUPLICATE_THRESHOLD};
use log::trace;
use std::collections::BTreeMap;

/// Records grouped around one representative fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub representative: Signature,
    pub members: Vec<RecordId>,
}

impl Cluster {
    fn accepts(&self, signature: &Signature) -> bool {
        self.representative
            .distance(signature)
            .is_some_and(|d| d < NEAR_DUPLICATE_THRESHOLD)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SignatureIndex {
    dates: BTreeMap<CaptureDate, Vec<Cluster>>,
}

impl SignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with fingerprint `signature` for `date`
    ///
    /// No-op if any cluster of `date` already holds the record.
    pub fn add(&mut self, date: CaptureDate, signature: &Signature, id: &str) {
        let clusters = self.dates.entry(date).or_default();
        if clusters.iter().any(|c| c.members.iter().any(|r| r == id)) {
            return;
        }

        match clusters.iter_mut().find(|c| c.accepts(signature)) {
            Some(cluster) => {
                trace!(
                    "signature index: {} joins cluster {} on {}",
                    id,
                    cluster.representative,
                    date
                );
                cluster.members.push(id.to_string());
            }
            None => {
                trace!(
                    "signature index: {} starts cluster {} on {}",
                    id,
                    signature,
                    date
                );
                clusters.push(Cluster {
                    representative: signature.clone(),
                    members: vec![id.to_string()],
                });
            }
        }
    }

    /// Detach a record from whichever cluster of `date` currently holds it
    pub fn remove(&mut self, date: CaptureDate, id: &str) -> Result<()> {
        let clusters = self
            .dates
            .get_mut(&date)
            .ok_or_else(|| LibraryError::desync("signature index", id, date))?;

        let (cluster_pos, member_pos) = clusters
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.members.iter().position(|r| r == id).map(|mi| (ci, mi)))
            .ok_or_else(|| LibraryError::desync("signature index", id, date))?;

        clusters[cluster_pos].members.remove(member_pos);
        if clusters[cluster_pos].members.is_empty() {
            clusters.remove(cluster_pos);
        }
        if clusters.is_empty() {
            self.dates.remove(&date);
        }
        trace!("signature index: remove {} on {}", id, date);
        Ok(())
    }

    /// Clusters for one date, in insertion order
    pub fn clusters_for(&self, date: CaptureDate) -> &[Cluster] {
        self.dates
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First cluster of `date` whose representative is near `signature`
    pub fn find_near(&self, date: CaptureDate, signature: &Signature) -> Option<&Cluster> {
        self.clusters_for(date).iter().find(|c| c.accepts(signature))
    }

    /// Cluster of `date` containing the record
    pub fn cluster_of(&self, date: CaptureDate, id: &str) -> Option<&Cluster> {
        self.clusters_for(date)
            .iter()
            .find(|c| c.members.iter().any(|r| r == id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CaptureDate, &Vec<Cluster>)> {
        self.dates.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
