//! Reporting helpers for duplicate classes
//!
//! Labels are cosmetic: members are sorted by file name and numbered from 1,
//! groups are numbered in the order given. They are never persisted and
//! never used as identity.

use super::manager::DuplicateGroup;
use crate::library::record::RecordId;
use crate::library::Library;
use std::collections::BTreeMap;

/// Display label of one group member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabel {
    pub group: usize,
    pub index: usize,
    pub id: RecordId,
}

impl std::fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group, self.index)
    }
}

/// Group size -> number of groups of that size
pub fn group_size_histogram(groups: &[DuplicateGroup]) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for group in groups.iter().filter(|g| !g.is_empty()) {
        *histogram.entry(group.len()).or_insert(0) += 1;
    }
    histogram
}

/// "N elements found K times" lines, one per group size
pub fn format_histogram(histogram: &BTreeMap<usize, usize>) -> Vec<String> {
    histogram
        .iter()
        .map(|(times, count)| {
            let noun = if *count == 1 { "element" } else { "elements" };
            let when = if *times == 1 {
                "once".to_string()
            } else {
                format!("{} times", times)
            };
            format!("{} {} found {}", count, noun, when)
        })
        .collect()
}

/// Number groups 1..M and their members 1..N by file name
pub fn label_groups(library: &Library, groups: &[DuplicateGroup]) -> Vec<Vec<GroupLabel>> {
    groups
        .iter()
        .enumerate()
        .map(|(g, group)| {
            let mut members: Vec<&RecordId> = group.members.iter().collect();
            members.sort_by(|a, b| {
                let name = |id: &str| {
                    library
                        .record(id)
                        .map(|r| r.file_name().to_string())
                        .unwrap_or_else(|| id.to_string())
                };
                name(a).cmp(&name(b)).then_with(|| a.cmp(b))
            });

            members
                .into_iter()
                .enumerate()
                .map(|(i, id)| GroupLabel {
                    group: g + 1,
                    index: i + 1,
                    id: id.clone(),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::manager::GroupSource;
    use crate::library::fixtures::{day, image};

    fn group(members: &[&str]) -> DuplicateGroup {
        DuplicateGroup {
            date: Some(day(1)),
            source: GroupSource::Size,
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_histogram_counts_group_sizes() {
        let groups = vec![
            group(&["a"]),
            group(&["b"]),
            group(&["c", "d"]),
            group(&["e", "f", "g"]),
            group(&["h", "i", "j"]),
        ];
        let histogram = group_size_histogram(&groups);

        assert_eq!(histogram.get(&1), Some(&2));
        assert_eq!(histogram.get(&2), Some(&1));
        assert_eq!(histogram.get(&3), Some(&2));

        assert_eq!(
            format_histogram(&histogram),
            [
                "2 elements found once",
                "1 element found 2 times",
                "2 elements found 3 times"
            ]
        );
    }

    #[test]
    fn test_labels_sort_by_file_name() {
        let mut library = Library::new("A");
        library.insert(image("z/b.jpg", Some(day(1)), 1, None)).unwrap();
        library.insert(image("a/c.jpg", Some(day(1)), 1, None)).unwrap();
        library.insert(image("m/a.jpg", Some(day(1)), 1, None)).unwrap();

        let labels = label_groups(
            &library,
            &[group(&["z/b.jpg", "a/c.jpg", "m/a.jpg"]), group(&["x.jpg"])],
        );

        let ids: Vec<&str> = labels[0].iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["m/a.jpg", "z/b.jpg", "a/c.jpg"]);
        assert_eq!(labels[0][2].to_string(), "1.3");
        assert_eq!(labels[1][0].to_string(), "2.1");
    }
}
