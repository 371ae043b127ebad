//! Sync id assignment across two libraries
//!
//! Every record of A and B gets a sync id such that the same content carries
//! the same base id in both libraries. Copies inside one library get `.1`,
//! `.2`, ... replica suffixes and videos get the configured prefix.
//!
//! Records are visited oldest first, so content added later receives new ids
//! instead of shifting old ones. The [`SyncIdCache`] remembers which id each
//! storage identity received and is consulted before a new id is minted,
//! which keeps ids stable from one run to the next.

use super::comparator::similar_records;
use crate::core::error::{LibraryError, Result};
use crate::library::record::{MediaKind, MediaRecord, RecordId, SystemIdentity};
use crate::library::Library;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Which of the two libraries a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Sync id -> record id, one map per library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIdMaps {
    pub a: BTreeMap<String, RecordId>,
    pub b: BTreeMap<String, RecordId>,
}

impl SyncIdMaps {
    pub fn side(&self, side: Side) -> &BTreeMap<String, RecordId> {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<String, RecordId> {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    /// Sync id assigned to a record, if any
    pub fn sync_id_of(&self, side: Side, id: &str) -> Option<&str> {
        self.side(side)
            .iter()
            .find(|(_, record)| record.as_str() == id)
            .map(|(sync_id, _)| sync_id.as_str())
    }
}

/// Persisted storage identity -> base sync id map, plus the id counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIdCache {
    version: u32,
    #[serde(default)]
    saved_at: u64,
    #[serde(default = "first_counter")]
    next_counter: u64,
    /// Keyed by the identity's `device:inode` form
    #[serde(default)]
    ids: BTreeMap<String, String>,
}

fn first_counter() -> u64 {
    1
}

impl Default for SyncIdCache {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: 0,
            next_counter: first_counter(),
            ids: BTreeMap::new(),
        }
    }
}

impl SyncIdCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| LibraryError::store(path, format!("failed to read: {}", e)))?;

        let mut cache: SyncIdCache = serde_json::from_str(&json)
            .map_err(|e| LibraryError::store(path, format!("failed to parse: {}", e)))?;

        if cache.version != Self::CURRENT_VERSION {
            return Err(LibraryError::store(
                path,
                format!(
                    "version mismatch: expected {}, got {}",
                    Self::CURRENT_VERSION,
                    cache.version
                ),
            ));
        }

        // Never mint below an id already handed out
        let floor = cache.highest_cached_counter() + 1;
        if cache.next_counter < floor {
            warn!(
                "Sync id counter {} in {} is behind cached ids, resuming at {}",
                cache.next_counter,
                path.display(),
                floor
            );
            cache.next_counter = floor;
        }

        debug!("Loaded {} sync id(s) from {}", cache.ids.len(), path.display());
        Ok(cache)
    }

    /// Load a cache, starting empty when it is missing or unusable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Ignoring sync id cache, ids may change: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.saved_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LibraryError::store(path, format!("failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| LibraryError::store(path, format!("failed to create dir: {}", e)))?;
            }
        }
        fs::write(path, json)
            .map_err(|e| LibraryError::store(path, format!("failed to write: {}", e)))?;

        info!("Saved {} sync id(s) to {}", self.ids.len(), path.display());
        Ok(())
    }

    pub fn get(&self, identity: SystemIdentity) -> Option<&str> {
        self.ids.get(&identity.to_string()).map(String::as_str)
    }

    pub fn insert(&mut self, identity: SystemIdentity, sync_id: impl Into<String>) {
        self.ids.insert(identity.to_string(), sync_id.into());
    }

    pub fn next_counter(&self) -> u64 {
        self.next_counter
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Largest numeric part among cached ids, 0 when there is none
    fn highest_cached_counter(&self) -> u64 {
        self.ids
            .values()
            .filter_map(|id| {
                id.trim_start_matches(|c: char| !c.is_ascii_digit())
                    .parse::<u64>()
                    .ok()
            })
            .max()
            .unwrap_or(0)
    }

    /// Mint `prefix + counter`, skipping ids taken earlier in this run
    fn mint(&mut self, prefix: &str, taken: &HashSet<String>) -> String {
        loop {
            let id = format!("{}{}", prefix, self.next_counter);
            self.next_counter += 1;
            if !taken.contains(&id) {
                return id;
            }
        }
    }
}

/// Assign sync ids to every record of `a` and `b`
///
/// `video_prefix` is prepended to ids minted for groups started by a video.
/// The cache is read and updated; persisting it is up to the caller.
pub fn build_sync_id_maps(
    a: &Library,
    b: &Library,
    cache: &mut SyncIdCache,
    video_prefix: &str,
) -> SyncIdMaps {
    let library = |side: Side| match side {
        Side::A => a,
        Side::B => b,
    };

    let mut order: Vec<(Side, &MediaRecord)> = a
        .records()
        .map(|r| (Side::A, r))
        .chain(b.records().map(|r| (Side::B, r)))
        .collect();
    order.sort_by(|(side_x, x), (side_y, y)| {
        compare_dates(x, y).then_with(|| (side_x, &x.id).cmp(&(side_y, &y.id)))
    });

    let mut visited: HashSet<(Side, &str)> = HashSet::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut maps = SyncIdMaps::default();
    let mut groups = 0usize;
    let mut reused = 0usize;

    for (side, record) in order {
        if visited.contains(&(side, record.id.as_str())) {
            continue;
        }

        let mut members: BTreeSet<(Side, RecordId)> = BTreeSet::new();
        members.insert((side, record.id.clone()));
        members.extend(
            similar_records(record, library(side), true)
                .into_iter()
                .map(|id| (side, id)),
        );
        members.extend(
            similar_records(record, library(side.other()), false)
                .into_iter()
                .map(|id| (side.other(), id)),
        );
        members.retain(|(s, id)| !visited.contains(&(*s, id.as_str())));

        let records: Vec<(Side, &MediaRecord)> = members
            .iter()
            .filter_map(|(s, id)| library(*s).record(id).map(|r| (*s, r)))
            .collect();
        for (s, r) in &records {
            visited.insert((*s, r.id.as_str()));
        }

        let cached = records
            .iter()
            .filter_map(|(_, r)| r.system_identity)
            .filter_map(|identity| cache.get(identity))
            .find(|id| !taken.contains(*id))
            .map(str::to_string);
        let base = match cached {
            Some(id) => {
                reused += 1;
                id
            }
            None => {
                let prefix = if record.kind == MediaKind::Video {
                    video_prefix
                } else {
                    ""
                };
                cache.mint(prefix, &taken)
            }
        };

        for (_, r) in &records {
            if let Some(identity) = r.system_identity {
                cache.insert(identity, base.clone());
            }
        }

        if records.len() == 1 {
            let (s, r) = records[0];
            maps.side_mut(s).insert(base.clone(), r.id.clone());
        } else {
            for (k, (s, r)) in records.iter().enumerate() {
                maps.side_mut(*s).insert(format!("{}.{}", base, k + 1), r.id.clone());
            }
        }

        taken.insert(base);
        groups += 1;
    }

    info!(
        "Assigned {} sync id(s) to {} + {} record(s), {} reused from cache",
        groups,
        a.len(),
        b.len(),
        reused
    );
    maps
}

/// Oldest first, undated last
fn compare_dates(x: &MediaRecord, y: &MediaRecord) -> Ordering {
    match (x.capture_date, y.capture_date) {
        (Some(dx), Some(dy)) => dx.cmp(&dy),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
