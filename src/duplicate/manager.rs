//! Duplicate equivalence classes and metadata propagation
//!
//! Classes are derived per capture date from two mutually exclusive sources:
//!
//! 1. **Size**: a date whose size index holds a single size group is one
//!    class, and no signature is ever computed for it.
//! 2. **Signature**: a date with several size groups is ambiguous. Its classes
//!    come from the signature index clusters of that date.
//!
//! A dated record without a file size sits in no size group. Unless a
//! signature cluster already holds it, it forms a class of its own.
//!
//! Signatures are computed lazily. [`DuplicateManager::resolve`] fingerprints
//! one representative per size group of each ambiguous date and copies the
//! result to the rest of the group, so a date with N size groups costs at
//! most N computations.

use super::signature::{ComputedSignature, SignatureComputer, SignatureSource};
use crate::core::error::Result;
use crate::library::record::{CaptureDate, MediaRecord, RecordId};
use crate::library::Library;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Field that may be copied between members of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatedField {
    Signature,
    CameraModel,
}

/// Where a class came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSource {
    /// The only size group of its date
    Size,
    /// A signature cluster of an ambiguous date
    Signature,
    /// Members of an ambiguous date that have no signature yet, by size
    Unresolved,
    /// A record without capture date, alone by definition
    Undated,
    /// A dated record without file size that no cluster holds
    Unsized,
}

/// One duplicate equivalence class
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub date: Option<CaptureDate>,
    pub source: GroupSource,
    pub members: Vec<RecordId>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_duplicate(&self) -> bool {
        self.members.len() > 1
    }

    /// Member used to test the whole class
    pub fn representative(&self) -> Option<&str> {
        self.members.first().map(String::as_str)
    }
}

/// Progress of a signature pass
#[derive(Debug, Clone)]
pub struct SignatureProgress {
    pub current: usize,
    pub total: usize,
    pub current_file: RecordId,
}

/// Statistics of a signature pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Signatures computed
    pub computed: usize,
    /// Computations that fell back to the size proxy
    pub fell_back: usize,
    /// Size groups whose signature was copied from one member to the rest
    pub propagated: usize,
    /// The pass stopped early on a shutdown request
    pub interrupted: bool,
}

/// Derives duplicate classes for a library and resolves ambiguity on demand
pub struct DuplicateManager<S: SignatureSource = SignatureComputer> {
    source: S,
    parallel: bool,
}

impl DuplicateManager<SignatureComputer> {
    /// Manager using the filesystem signature computer
    pub fn with_computer(computer: SignatureComputer) -> Self {
        let parallel = computer.config().parallel;
        Self::new(computer, parallel)
    }
}

impl<S: SignatureSource> DuplicateManager<S> {
    pub fn new(source: S, parallel: bool) -> Self {
        Self { source, parallel }
    }

    /// Compute just enough signatures to resolve every ambiguous date
    pub fn resolve<F>(
        &self,
        library: &mut Library,
        shutdown: &AtomicBool,
        progress: F,
    ) -> Result<PassStats>
    where
        F: Fn(SignatureProgress) + Send + Sync,
    {
        let candidates: Vec<RecordId> = candidate_duplicates(library)
            .into_iter()
            .filter(|id| !has_signature(library, id))
            .collect();

        info!("Resolving duplicates: {} signature(s) needed", candidates.len());
        let mut stats = self.compute_signatures(library, candidates, shutdown, &progress)?;
        if stats.interrupted {
            return Ok(stats);
        }

        for group in ambiguous_size_groups(library) {
            if propagate(library, PropagatedField::Signature, &group)? {
                stats.propagated += 1;
            }
        }

        // Groups with several differing stored signatures cannot be propagated
        let leftovers: Vec<RecordId> = ambiguous_size_groups(library)
            .into_iter()
            .flatten()
            .filter(|id| !has_signature(library, id))
            .collect();
        if !leftovers.is_empty() {
            let extra = self.compute_signatures(library, leftovers, shutdown, &progress)?;
            stats.computed += extra.computed;
            stats.fell_back += extra.fell_back;
            stats.interrupted = extra.interrupted;
        }

        Ok(stats)
    }

    /// Explicit full pass: compute a signature for every record lacking one
    pub fn compute_all<F>(
        &self,
        library: &mut Library,
        shutdown: &AtomicBool,
        progress: F,
    ) -> Result<PassStats>
    where
        F: Fn(SignatureProgress) + Send + Sync,
    {
        let missing: Vec<RecordId> = library
            .records()
            .filter(|r| r.signature.is_none())
            .map(|r| r.id.clone())
            .collect();

        info!("Full signature pass: {} record(s)", missing.len());
        self.compute_signatures(library, missing, shutdown, &progress)
    }

    /// Fingerprint `ids` (in parallel if configured) and merge on this thread
    fn compute_signatures<F>(
        &self,
        library: &mut Library,
        ids: Vec<RecordId>,
        shutdown: &AtomicBool,
        progress: &F,
    ) -> Result<PassStats>
    where
        F: Fn(SignatureProgress) + Send + Sync,
    {
        let records: Vec<MediaRecord> = ids
            .iter()
            .filter_map(|id| library.record(id).cloned())
            .collect();
        let root = library.root().map(Path::to_path_buf);
        let total = records.len();
        let processed = AtomicUsize::new(0);

        let work = |record: &MediaRecord| -> Option<(RecordId, ComputedSignature)> {
            if shutdown.load(Ordering::Relaxed) {
                return None;
            }
            let computed = self.source.signature_for(root.as_deref(), record);
            let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
            progress(SignatureProgress {
                current,
                total,
                current_file: record.id.clone(),
            });
            Some((record.id.clone(), computed))
        };

        let results: Vec<Option<(RecordId, ComputedSignature)>> = if self.parallel {
            records.par_iter().map(&work).collect()
        } else {
            records.iter().map(&work).collect()
        };

        let mut stats = PassStats::default();
        for (id, computed) in results.into_iter().flatten() {
            if computed.fell_back {
                stats.fell_back += 1;
                debug!("{}: signature fell back to size proxy", id);
            }
            library.set_signature(&id, Some(computed.signature))?;
            stats.computed += 1;
        }

        if shutdown.load(Ordering::SeqCst) {
            info!("Signature pass interrupted after {}/{} file(s)", stats.computed, total);
            stats.interrupted = true;
        }
        if stats.fell_back > 0 {
            warn!(
                "{} of {} signature(s) fell back to the size proxy",
                stats.fell_back, stats.computed
            );
        }
        Ok(stats)
    }
}

/// One representative per size group of every ambiguous date
///
/// These are the only records whose signature is needed to resolve the
/// library. A member that already has a signature is preferred.
pub fn candidate_duplicates(library: &Library) -> Vec<RecordId> {
    library
        .size_index()
        .iter()
        .filter(|(_, sizes)| sizes.len() > 1)
        .flat_map(|(_, sizes)| sizes.values())
        .filter_map(|group| {
            group
                .iter()
                .find(|id| has_signature(library, id))
                .or_else(|| group.first())
                .cloned()
        })
        .collect()
}

/// All equivalence classes of dated records, oldest date first
///
/// Singleton classes are included; filter with
/// [`DuplicateGroup::is_duplicate`] for reporting.
pub fn duplicate_groups(library: &Library) -> Vec<DuplicateGroup> {
    let mut groups = Vec::new();

    for (date, sizes) in library.size_index().iter() {
        if sizes.len() == 1 {
            groups.extend(sizes.values().map(|members| DuplicateGroup {
                date: Some(*date),
                source: GroupSource::Size,
                members: members.clone(),
            }));
            continue;
        }

        groups.extend(
            library
                .signature_index()
                .clusters_for(*date)
                .iter()
                .map(|cluster| DuplicateGroup {
                    date: Some(*date),
                    source: GroupSource::Signature,
                    members: cluster.members.clone(),
                }),
        );

        for members in sizes.values() {
            let unresolved: Vec<RecordId> = members
                .iter()
                .filter(|id| !has_signature(library, id))
                .cloned()
                .collect();
            if !unresolved.is_empty() {
                debug!("{} record(s) on {} still lack a signature", unresolved.len(), date);
                groups.push(DuplicateGroup {
                    date: Some(*date),
                    source: GroupSource::Unresolved,
                    members: unresolved,
                });
            }
        }
    }

    let covered: HashSet<&RecordId> = groups.iter().flat_map(|g| &g.members).collect();
    let r#unsized: Vec<DuplicateGroup> = library
        .records()
        .filter(|r| r.capture_date.is_some() && !covered.contains(&r.id))
        .map(|record| DuplicateGroup {
            date: record.capture_date,
            source: GroupSource::Unsized,
            members: vec![record.id.clone()],
        })
        .collect();
    if !r#unsized.is_empty() {
        debug!("{} dated record(s) have no file size", r#unsized.len());
        groups.extend(r#unsized);
        groups.sort_by_key(|g| g.date);
    }

    groups
}

/// Undated records as singleton classes
pub fn undated_groups(library: &Library) -> Vec<DuplicateGroup> {
    library
        .undated_records()
        .map(|record| DuplicateGroup {
            date: None,
            source: GroupSource::Undated,
            members: vec![record.id.clone()],
        })
        .collect()
}

/// Copy `field` from the single member holding it to the members lacking it
///
/// Does nothing unless exactly one member has a value. Returns whether any
/// member changed, so a second call on an unchanged group returns `false`.
pub fn propagate(
    library: &mut Library,
    field: PropagatedField,
    group: &[RecordId],
) -> Result<bool> {
    let records: Vec<&MediaRecord> = group.iter().filter_map(|id| library.record(id)).collect();

    let holders: Vec<&MediaRecord> = records
        .iter()
        .copied()
        .filter(|r| field_is_set(r, field))
        .collect();
    if holders.len() != 1 {
        return Ok(false);
    }

    let source = holders[0].clone();
    let targets: Vec<RecordId> = records
        .iter()
        .filter(|r| !field_is_set(r, field))
        .map(|r| r.id.clone())
        .collect();
    if targets.is_empty() {
        return Ok(false);
    }

    for id in &targets {
        match field {
            PropagatedField::Signature => library.set_signature(id, source.signature.clone())?,
            PropagatedField::CameraModel => {
                library.set_camera_model(id, source.camera_model.clone())?
            }
        }
    }
    debug!(
        "Propagated {:?} from {} to {} record(s)",
        field,
        source.id,
        targets.len()
    );
    Ok(true)
}

/// Propagate camera models within every duplicate class
pub fn propagate_camera_models(library: &mut Library) -> Result<usize> {
    let mut changed = 0;
    for group in duplicate_groups(library) {
        if group.is_duplicate()
            && propagate(library, PropagatedField::CameraModel, &group.members)?
        {
            changed += 1;
        }
    }
    Ok(changed)
}

fn has_signature(library: &Library, id: &str) -> bool {
    library.record(id).is_some_and(|r| r.signature.is_some())
}

fn field_is_set(record: &MediaRecord, field: PropagatedField) -> bool {
    match field {
        PropagatedField::Signature => record.signature.is_some(),
        PropagatedField::CameraModel => record.camera_model.is_some(),
    }
}

/// Size groups of every date that has more than one size
fn ambiguous_size_groups(library: &Library) -> Vec<Vec<RecordId>> {
    library
        .size_index()
        .iter()
        .filter(|(_, sizes)| sizes.len() > 1)
        .flat_map(|(_, sizes)| sizes.values().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::{day, image};
    use crate::library::record::{PerceptualHash, Signature};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Signature source answering from a fixed table and recording calls
    struct FakeSource {
        hashes: HashMap<&'static str, u64>,
        calls: Mutex<Vec<RecordId>>,
    }

    impl FakeSource {
        fn new(hashes: &[(&'static str, u64)]) -> Self {
            Self {
                hashes: hashes.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SignatureSource for &FakeSource {
        fn signature_for(&self, _root: Option<&Path>, record: &MediaRecord) -> ComputedSignature {
            self.calls.lock().unwrap().push(record.id.clone());
            match self.hashes.get(record.id.as_str()) {
                Some(bits) => ComputedSignature {
                    signature: Signature::Perceptual(PerceptualHash(*bits)),
                    fell_back: false,
                },
                None => ComputedSignature {
                    signature: Signature::SizeProxy(record.file_size.unwrap_or(0)),
                    fell_back: true,
                },
            }
        }
    }

    fn no_progress(_: SignatureProgress) {}

    fn library() -> Library {
        let mut library = Library::new("A");
        // day 1: unambiguous, one size
        library.insert(image("d1/a.jpg", Some(day(1)), 100, None)).unwrap();
        library.insert(image("d1/b.jpg", Some(day(1)), 100, None)).unwrap();
        // day 2: ambiguous, three sizes
        library.insert(image("d2/a.jpg", Some(day(2)), 100, None)).unwrap();
        library.insert(image("d2/a_copy.jpg", Some(day(2)), 100, None)).unwrap();
        library.insert(image("d2/b.jpg", Some(day(2)), 200, None)).unwrap();
        library.insert(image("d2/c.jpg", Some(day(2)), 300, None)).unwrap();
        // undated
        library.insert(image("undated.jpg", None, 100, None)).unwrap();
        library
    }

    #[test]
    fn test_candidates_only_from_ambiguous_dates() {
        let candidates = candidate_duplicates(&library());

        assert_eq!(candidates, ["d2/a.jpg", "d2/b.jpg", "d2/c.jpg"]);
    }

    #[test]
    fn test_groups_before_resolution() {
        let groups = duplicate_groups(&library());

        assert_eq!(groups[0].source, GroupSource::Size);
        assert_eq!(groups[0].members, ["d1/a.jpg", "d1/b.jpg"]);
        assert!(groups[1..].iter().all(|g| g.source == GroupSource::Unresolved));
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_resolve_computes_one_signature_per_size_group() {
        // b is a resized copy of a (near hash); c is unrelated
        let source = FakeSource::new(&[
            ("d2/a.jpg", 0b0000),
            ("d2/b.jpg", 0b0011),
            ("d2/c.jpg", 0xff00),
        ]);
        let manager = DuplicateManager::new(&source, false);
        let mut library = library();

        let stats = manager
            .resolve(&mut library, &AtomicBool::new(false), no_progress)
            .unwrap();

        let mut calls = source.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, ["d2/a.jpg", "d2/b.jpg", "d2/c.jpg"]);
        assert_eq!(stats.computed, 3);
        assert_eq!(stats.propagated, 1);
        assert!(!stats.interrupted);

        // never computed for the unambiguous date or the undated record
        assert!(library.record("d1/a.jpg").unwrap().signature.is_none());
        assert!(library.record("undated.jpg").unwrap().signature.is_none());
        // copied to the same-size member
        assert_eq!(
            library.record("d2/a_copy.jpg").unwrap().signature,
            library.record("d2/a.jpg").unwrap().signature
        );

        let groups = duplicate_groups(&library);
        let day2: Vec<&DuplicateGroup> = groups.iter().filter(|g| g.date == Some(day(2))).collect();
        assert_eq!(day2.len(), 2);
        assert!(day2.iter().all(|g| g.source == GroupSource::Signature));
        // propagated copy joins last, after the near-duplicate b
        assert_eq!(day2[0].members, ["d2/a.jpg", "d2/b.jpg", "d2/a_copy.jpg"]);
        assert_eq!(day2[1].members, ["d2/c.jpg"]);
    }

    #[test]
    fn test_resolve_is_lazy_on_second_run() {
        let source = FakeSource::new(&[("d2/a.jpg", 1), ("d2/b.jpg", 2), ("d2/c.jpg", 3)]);
        let manager = DuplicateManager::new(&source, true);
        let mut library = library();
        let shutdown = AtomicBool::new(false);

        manager.resolve(&mut library, &shutdown, no_progress).unwrap();
        let first_calls = source.calls.lock().unwrap().len();

        let stats = manager.resolve(&mut library, &shutdown, no_progress).unwrap();
        assert_eq!(stats, PassStats::default());
        assert_eq!(source.calls.lock().unwrap().len(), first_calls);
    }

    #[test]
    fn test_resolve_counts_fallbacks() {
        let source = FakeSource::new(&[("d2/a.jpg", 1)]);
        let manager = DuplicateManager::new(&source, false);
        let mut library = library();

        let stats = manager
            .resolve(&mut library, &AtomicBool::new(false), no_progress)
            .unwrap();
        assert_eq!(stats.fell_back, 2);
        assert_eq!(
            library.record("d2/b.jpg").unwrap().signature,
            Some(Signature::SizeProxy(200))
        );
    }

    #[test]
    fn test_resolve_honours_shutdown() {
        let source = FakeSource::new(&[]);
        let manager = DuplicateManager::new(&source, false);
        let mut library = library();

        let stats = manager
            .resolve(&mut library, &AtomicBool::new(true), no_progress)
            .unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.computed, 0);
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_compute_all_covers_every_record() {
        let source = FakeSource::new(&[]);
        let manager = DuplicateManager::new(&source, false);
        let mut library = library();

        let stats = manager
            .compute_all(&mut library, &AtomicBool::new(false), no_progress)
            .unwrap();
        assert_eq!(stats.computed, 7);
        assert!(library.records().all(|r| r.signature.is_some()));
    }

    #[test]
    fn test_propagate_is_idempotent() {
        let mut library = library();
        library
            .set_camera_model("d1/a.jpg", Some("iPhone 15".to_string()))
            .unwrap();
        let group = vec!["d1/a.jpg".to_string(), "d1/b.jpg".to_string()];

        assert!(propagate(&mut library, PropagatedField::CameraModel, &group).unwrap());
        assert_eq!(
            library.record("d1/b.jpg").unwrap().camera_model.as_deref(),
            Some("iPhone 15")
        );
        assert!(!propagate(&mut library, PropagatedField::CameraModel, &group).unwrap());
    }

    #[test]
    fn test_propagate_requires_single_holder() {
        let mut library = library();
        library.set_camera_model("d2/a.jpg", Some("A".to_string())).unwrap();
        library.set_camera_model("d2/b.jpg", Some("B".to_string())).unwrap();
        let group = vec![
            "d2/a.jpg".to_string(),
            "d2/b.jpg".to_string(),
            "d2/c.jpg".to_string(),
        ];

        assert!(!propagate(&mut library, PropagatedField::CameraModel, &group).unwrap());
        assert!(library.record("d2/c.jpg").unwrap().camera_model.is_none());

        let empty: Vec<RecordId> = Vec::new();
        assert!(!propagate(&mut library, PropagatedField::Signature, &empty).unwrap());
    }

    #[test]
    fn test_propagate_camera_models_across_classes() {
        let mut library = library();
        library.set_camera_model("d1/b.jpg", Some("GR III".to_string())).unwrap();

        assert_eq!(propagate_camera_models(&mut library).unwrap(), 1);
        assert_eq!(
            library.record("d1/a.jpg").unwrap().camera_model.as_deref(),
            Some("GR III")
        );
    }

    #[test]
    fn test_dated_record_without_size_is_own_class() {
        let mut library = library();
        let mut r#unsized = MediaRecord::new("d1/no_size.jpg");
        r#unsized.capture_date = Some(day(1));
        r#unsized.signature = Some(Signature::Perceptual(PerceptualHash(5)));
        library.insert(r#unsized).unwrap();

        let groups = duplicate_groups(&library);
        let own: Vec<&DuplicateGroup> = groups
            .iter()
            .filter(|g| g.members.contains(&"d1/no_size.jpg".to_string()))
            .collect();

        assert_eq!(own.len(), 1);
        assert_eq!(own[0].source, GroupSource::Unsized);
        assert_eq!(own[0].date, Some(day(1)));
        assert!(groups.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_unsized_record_on_empty_date_is_compared() {
        let mut a = Library::new("A");
        let mut r#unsized = MediaRecord::new("lonely.jpg");
        r#unsized.capture_date = Some(day(9));
        r#unsized.signature = Some(Signature::Perceptual(PerceptualHash(5)));
        a.insert(r#unsized).unwrap();

        let groups = duplicate_groups(&a);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, ["lonely.jpg"]);

        let comparison = crate::sync::SetComparator::new(&a, &Library::new("B")).cmp();
        assert_eq!(comparison.only_in_a.len(), 1);
        assert!(comparison.in_both.is_empty());
    }

    #[test]
    fn test_undated_groups_are_singletons() {
        let groups = undated_groups(&library());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source, GroupSource::Undated);
        assert_eq!(groups[0].members, ["undated.jpg"]);
    }
}
