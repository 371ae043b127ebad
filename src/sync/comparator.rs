//! Cross-library comparison
//!
//! A record of one library is looked up in another library's indexes, cheapest
//! tier first: storage identity, then (date, size), then a near signature
//! cluster. Any hit counts, so two unrelated files shot on the same day with
//! the same size are reported as present in both libraries.
//!
//! Only records sharing a capture date are ever related. Undated records are
//! never compared by content: they match only another undated record with the
//! same storage identity.

use crate::duplicate::manager::{duplicate_groups, undated_groups, DuplicateGroup};
use crate::library::record::{CaptureDate, MediaRecord, RecordId};
use crate::library::Library;
use log::{debug, info};
use std::collections::BTreeSet;

/// Whether `other` holds something the same as `record`
pub fn contains(record: &MediaRecord, other: &Library) -> bool {
    let identity_hit = record.system_identity.is_some_and(|identity| {
        other
            .identity_index()
            .get(identity)
            .iter()
            .any(|id| same_date(other, id, record.capture_date))
    });
    if identity_hit {
        return true;
    }

    let Some(date) = record.capture_date else {
        return false;
    };

    if let Some(size) = record.file_size {
        if other.size_index().contains(date, size) {
            return true;
        }
    }

    record
        .signature
        .as_ref()
        .is_some_and(|signature| other.signature_index().find_near(date, signature).is_some())
}

/// Every record of `library` related to `record` by any tier
///
/// Pass `own_library = true` when `library` is the one holding `record`, so
/// the record itself is left out. Ids are unique only within one library, so
/// a record with the same id in another library is a legitimate result.
pub fn similar_records(record: &MediaRecord, library: &Library, own_library: bool) -> Vec<RecordId> {
    let mut similar: BTreeSet<&RecordId> = BTreeSet::new();

    if let Some(identity) = record.system_identity {
        similar.extend(
            library
                .identity_index()
                .get(identity)
                .iter()
                .filter(|id| same_date(library, id, record.capture_date)),
        );
    }

    if let Some(date) = record.capture_date {
        if let Some(size) = record.file_size {
            similar.extend(library.size_index().bucket(date, size));
        }

        if let Some(signature) = &record.signature {
            if let Some(cluster) = library.signature_index().find_near(date, signature) {
                similar.extend(&cluster.members);
            }
        }
    }

    similar
        .into_iter()
        .filter(|id| !(own_library && **id == record.id))
        .cloned()
        .collect()
}

/// Both dated on the same instant, or both undated
fn same_date(library: &Library, id: &str, date: Option<CaptureDate>) -> bool {
    library.record(id).is_some_and(|r| r.capture_date == date)
}

/// Duplicate classes of A split by presence in B
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    pub in_both: Vec<DuplicateGroup>,
    pub only_in_a: Vec<DuplicateGroup>,
}

impl Comparison {
    /// Number of A's records covered by `in_both`
    pub fn records_in_both(&self) -> usize {
        self.in_both.iter().map(DuplicateGroup::len).sum()
    }

    /// Number of A's records covered by `only_in_a`
    pub fn records_only_in_a(&self) -> usize {
        self.only_in_a.iter().map(DuplicateGroup::len).sum()
    }
}

/// Records of A split by storage identity alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactComparison {
    pub in_both: Vec<RecordId>,
    pub only_in_a: Vec<RecordId>,
}

/// Compares library A against library B
pub struct SetComparator<'a> {
    a: &'a Library,
    b: &'a Library,
}

impl<'a> SetComparator<'a> {
    pub fn new(a: &'a Library, b: &'a Library) -> Self {
        Self { a, b }
    }

    /// Partition A's duplicate classes, testing one representative per class
    ///
    /// Undated records of A appear as singleton classes and end up in
    /// `in_both` only through a storage identity hit.
    pub fn cmp(&self) -> Comparison {
        let mut comparison = Comparison::default();

        for group in duplicate_groups(self.a)
            .into_iter()
            .chain(undated_groups(self.a))
        {
            let present = group
                .representative()
                .and_then(|id| self.a.record(id))
                .is_some_and(|record| contains(record, self.b));

            if present {
                comparison.in_both.push(group);
            } else {
                comparison.only_in_a.push(group);
            }
        }

        info!(
            "{} vs {}: {} class(es) in both, {} only in {}",
            self.a.name(),
            self.b.name(),
            comparison.in_both.len(),
            comparison.only_in_a.len(),
            self.a.name()
        );
        comparison
    }

    /// Partition A's records by storage identity only
    pub fn exact_cmp(&self) -> ExactComparison {
        let mut comparison = ExactComparison::default();

        for record in self.a.records() {
            let present = record
                .system_identity
                .is_some_and(|identity| self.b.identity_index().exists(identity));

            if present {
                comparison.in_both.push(record.id.clone());
            } else {
                comparison.only_in_a.push(record.id.clone());
            }
        }

        debug!(
            "{} vs {} (exact): {} in both, {} only in {}",
            self.a.name(),
            self.b.name(),
            comparison.in_both.len(),
            comparison.only_in_a.len(),
            self.a.name()
        );
        comparison
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::{day, image, with_identity};
    use crate::library::record::Signature;

    fn library(name: &str, records: Vec<MediaRecord>) -> Library {
        let mut library = Library::new(name);
        for record in records {
            library.insert(record).unwrap();
        }
        library
    }

    #[test]
    fn test_same_date_and_size_is_contained() {
        // different bytes, same day and size: reported present anyway
        let p1 = image("P1.jpg", Some(day(1)), 100, Some(0x00ff));
        let b = library("B", vec![image("P2.jpg", Some(day(1)), 100, Some(0xff00))]);

        assert!(contains(&p1, &b));
    }

    #[test]
    fn test_distinct_dates_never_related() {
        let record = with_identity(image("a.jpg", Some(day(1)), 100, Some(7)), 1, 42);
        let b = library(
            "B",
            vec![with_identity(image("a.jpg", Some(day(2)), 100, Some(7)), 1, 42)],
        );

        assert!(!contains(&record, &b));
        assert!(similar_records(&record, &b, false).is_empty());
        assert!(SetComparator::new(&library("A", vec![record]), &b)
            .cmp()
            .in_both
            .is_empty());
    }

    #[test]
    fn test_near_signature_is_contained() {
        let record = image("a.jpg", Some(day(1)), 100, Some(0b0000));
        let b = library("B", vec![image("a_small.jpg", Some(day(1)), 40, Some(0b0111))]);
        assert!(contains(&record, &b));

        let far = image("c.jpg", Some(day(1)), 100, Some(0b1111));
        let b = library("B", vec![image("a_small.jpg", Some(day(1)), 40, Some(0b0000))]);
        assert!(!contains(&far, &b));
    }

    #[test]
    fn test_identity_is_contained() {
        let record = with_identity(image("a.jpg", Some(day(1)), 100, None), 3, 9);
        let b = library(
            "B",
            vec![with_identity(image("renamed.jpg", Some(day(1)), 100, None), 3, 9)],
        );
        assert!(contains(&record, &b));
    }

    #[test]
    fn test_undated_matched_by_identity_only() {
        let record = with_identity(image("a.jpg", None, 100, None), 3, 9);
        let b = library(
            "B",
            vec![
                with_identity(image("hardlink.jpg", None, 100, None), 3, 9),
                image("same_size.jpg", None, 100, Some(0)),
            ],
        );

        assert!(contains(&record, &b));
        assert_eq!(similar_records(&record, &b, false), ["hardlink.jpg"]);

        let a = library("A", vec![record]);
        let comparison = SetComparator::new(&a, &b).cmp();
        assert_eq!(comparison.in_both.len(), 1);
        assert_eq!(comparison.in_both[0].members, ["a.jpg"]);
    }

    #[test]
    fn test_undated_never_matched_by_content() {
        let record = image("a.jpg", None, 100, Some(0));
        let b = library("B", vec![image("a.jpg", None, 100, Some(0))]);

        assert!(!contains(&record, &b));
        assert!(similar_records(&record, &b, false).is_empty());
    }

    #[test]
    fn test_undated_identity_ignores_dated_copy() {
        let record = with_identity(image("a.jpg", None, 100, None), 3, 9);
        let b = library(
            "B",
            vec![with_identity(image("a.jpg", Some(day(1)), 100, None), 3, 9)],
        );

        assert!(!contains(&record, &b));
    }

    #[test]
    fn test_similar_records_excludes_self_in_own_library() {
        let a = library(
            "A",
            vec![
                image("a.jpg", Some(day(1)), 100, None),
                image("a_copy.jpg", Some(day(1)), 100, None),
                image("other.jpg", Some(day(1)), 250, None),
            ],
        );
        let record = a.record("a.jpg").unwrap();

        assert_eq!(similar_records(record, &a, true), ["a_copy.jpg"]);
        assert_eq!(similar_records(record, &a, false), ["a.jpg", "a_copy.jpg"]);
    }

    #[test]
    fn test_similar_records_unions_tiers() {
        let b = library(
            "B",
            vec![
                with_identity(image("hardlink.jpg", Some(day(1)), 100, None), 1, 1),
                image("same_size.jpg", Some(day(1)), 100, None),
                image("resized.jpg", Some(day(1)), 30, Some(0b0001)),
                image("unrelated.jpg", Some(day(1)), 55, Some(0xffff)),
            ],
        );
        let record = with_identity(image("a.jpg", Some(day(1)), 100, Some(0)), 1, 1);

        assert_eq!(
            similar_records(&record, &b, false),
            ["hardlink.jpg", "resized.jpg", "same_size.jpg"]
        );
    }

    #[test]
    fn test_cmp_partitions_classes() {
        let a = library(
            "A",
            vec![
                image("d1/a.jpg", Some(day(1)), 100, None),
                image("d1/a_copy.jpg", Some(day(1)), 100, None),
                image("d2/b.jpg", Some(day(2)), 200, None),
                image("undated.jpg", None, 100, None),
            ],
        );
        let b = library("B", vec![image("x.jpg", Some(day(1)), 100, None)]);

        let comparison = SetComparator::new(&a, &b).cmp();

        assert_eq!(comparison.in_both.len(), 1);
        assert_eq!(comparison.in_both[0].members, ["d1/a.jpg", "d1/a_copy.jpg"]);
        assert_eq!(comparison.records_in_both(), 2);
        assert_eq!(comparison.only_in_a.len(), 2);
        assert_eq!(comparison.records_only_in_a(), 2);
    }

    #[test]
    fn test_exact_cmp_ignores_size_and_signature() {
        let a = library(
            "A",
            vec![
                with_identity(image("linked.jpg", Some(day(1)), 100, None), 1, 5),
                image("same_size.jpg", Some(day(1)), 300, None),
                with_identity(image("undated.jpg", None, 10, None), 1, 6),
            ],
        );
        let b = library(
            "B",
            vec![
                with_identity(image("elsewhere.jpg", Some(day(1)), 100, None), 1, 5),
                image("same_size.jpg", Some(day(1)), 300, None),
                with_identity(image("undated.jpg", None, 10, None), 1, 6),
            ],
        );

        let comparison = SetComparator::new(&a, &b).exact_cmp();
        assert_eq!(comparison.in_both, ["linked.jpg", "undated.jpg"]);
        assert_eq!(comparison.only_in_a, ["same_size.jpg"]);
    }

    #[test]
    fn test_signature_kinds_do_not_mix() {
        let mut record = image("clip.jpg", Some(day(1)), 100, None);
        record.signature = Some(Signature::SizeProxy(0));
        let b = library("B", vec![image("photo.jpg", Some(day(1)), 50, Some(0))]);
        assert!(!contains(&record, &b));
    }
}
