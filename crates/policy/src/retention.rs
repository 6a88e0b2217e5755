use bkm_catalog::{Age, HostCatalog};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A finalized backup selected for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion {
    pub number: u64,
    /// Seconds since the backup was finalized.
    pub age: u64,
}

/// Keep the `keep` youngest finalized backups of every host, and delete
/// anything beyond those that is older than `max_age` seconds.
///
/// In-progress backups are never candidates and don't count towards `keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep: usize,
    pub max_age: u64,
}
impl RetentionPolicy {
    pub fn new(keep: usize, max_age: u64) -> Self {
        Self { keep, max_age }
    }

    /// Deletions for every host in the catalog, keyed by hostname.
    ///
    /// Hosts with nothing to delete are left out.
    pub fn select_for_deletion(&self, catalog: &HostCatalog, now: OffsetDateTime) -> BTreeMap<String, Vec<Deletion>> {
        catalog
            .backups_by_age(now)
            .filter_map(|(hostname, backups)| {
                let selected = self.select(&backups);
                if !selected.is_empty() {
                    tracing::debug!(host = hostname, count = selected.len(), "Backups selected for deletion");
                }
                (!selected.is_empty()).then(|| (hostname.to_string(), selected))
            })
            .collect()
    }

    /// Deletions for a single host's `(number, age)` pairs, oldest first.
    ///
    /// Backups of equal age rank by number, the higher number counting as
    /// the younger one.
    pub fn select(&self, backups: &[(u64, Age)]) -> Vec<Deletion> {
        let mut finalized: Vec<(u64, u64)> =
            backups.iter().filter_map(|(number, age)| age.seconds().map(|seconds| (*number, seconds))).collect();
        finalized.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

        let mut selected = Vec::new();
        while finalized.len() > self.keep {
            let Some((number, age)) = finalized.pop() else {
                break;
            };
            if age > self.max_age {
                selected.push(Deletion { number, age });
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkm_storage::ObjectInfo;
    use rstest::rstest;
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-01 00:00 UTC);
    const DAY: u64 = 86_400;

    fn finalized(days: &[u64]) -> Vec<(u64, Age)> {
        days.iter().enumerate().map(|(i, d)| (i as u64 + 1, Age::Finalized(d * DAY))).collect()
    }

    #[test]
    fn test_keeps_youngest_deletes_old() {
        // web1 finalized 1 and 40 days ago, keep one, 30 day limit.
        let mut catalog = HostCatalog::default();
        for (number, days) in [(1_u64, 40_i64), (2, 1)] {
            let at = NOW - Duration::days(days);
            catalog.fold("bkup-a", ObjectInfo::new(format!("web1.{number}.tar"), 10, at)).unwrap();
            catalog.fold("bkup-a", ObjectInfo::new(format!("web1.{number}.tar.COMPLETE"), 0, at)).unwrap();
        }
        let selected = RetentionPolicy::new(1, 30 * DAY).select_for_deletion(&catalog, NOW);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["web1"], vec![Deletion { number: 1, age: 40 * DAY }]);
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[400], 1)]
    #[case(&[400, 500, 600], 3)]
    #[case(&[400, 500, 600], 5)]
    fn test_at_or_below_keep_deletes_nothing(#[case] days: &[u64], #[case] keep: usize) {
        assert!(RetentionPolicy::new(keep, 0).select(&finalized(days)).is_empty());
    }

    #[test]
    fn test_in_progress_never_selected_nor_counted() {
        let mut backups = finalized(&[50, 60]);
        backups.push((3, Age::InProgress));
        backups.push((4, Age::InProgress));
        let selected = RetentionPolicy::new(1, 30 * DAY).select(&backups);
        assert_eq!(selected, vec![Deletion { number: 2, age: 60 * DAY }]);
    }

    #[test]
    fn test_max_age_is_exclusive() {
        let selected = RetentionPolicy::new(0, 30 * DAY).select(&finalized(&[30, 31]));
        assert_eq!(selected, vec![Deletion { number: 2, age: 31 * DAY }]);
    }

    #[test]
    fn test_youngest_always_retained_and_old_always_selected() {
        let days = [3, 90, 1, 45, 12, 200, 31, 29, 0, 60];
        let backups = finalized(&days);
        let max_age = 30 * DAY;
        for keep in 0..=days.len() {
            let selected = RetentionPolicy::new(keep, max_age).select(&backups);
            let mut by_age = backups.clone();
            by_age.sort_by_key(|(_, age)| *age);
            let (retained, beyond) = by_age.split_at(keep.min(by_age.len()));
            for (number, _) in retained {
                assert!(selected.iter().all(|d| d.number != *number), "keep={keep} deleted #{number}");
            }
            for (number, age) in beyond {
                let expected = age.seconds().is_some_and(|s| s > max_age);
                assert_eq!(selected.iter().any(|d| d.number == *number), expected, "keep={keep} #{number}");
            }
        }
    }

    #[test]
    fn test_equal_ages_delete_lower_number_first() {
        let backups = vec![(7, Age::Finalized(40 * DAY)), (8, Age::Finalized(40 * DAY))];
        let selected = RetentionPolicy::new(1, 30 * DAY).select(&backups);
        assert_eq!(selected, vec![Deletion { number: 7, age: 40 * DAY }]);
    }
}
