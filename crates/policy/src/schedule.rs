use bkm_catalog::{Age, HostCatalog};
use time::OffsetDateTime;

/// Added when the youngest backup of a host is still in progress.
const IN_PROGRESS_BONUS: f64 = 200.0;
/// Subtracted once a host holds at least the target number of backups.
const TARGET_MET_PENALTY: f64 = 100.0;

/// A host's need for a new backup run. Higher is more urgent.
#[derive(Debug, Clone, PartialEq)]
pub struct HostScore {
    pub hostname: String,
    pub score: f64,
}
impl HostScore {
    /// Only hosts with a strictly positive score get a new run.
    pub fn needs_backup(&self) -> bool {
        self.score > 0.0
    }
}

/// Score every host in the catalog, most urgent first.
///
/// Ties keep catalog order, i.e. ascending hostname.
pub fn rank_hosts(catalog: &HostCatalog, target: usize, now: OffsetDateTime) -> Vec<HostScore> {
    let mut scores: Vec<HostScore> = catalog
        .backups_by_age(now)
        .map(|(hostname, backups)| {
            let ages: Vec<Age> = backups.into_iter().map(|(_, age)| age).collect();
            let score = score_host(&ages, target);
            tracing::trace!(host = hostname, score, backups = ages.len(), "Scored host");
            HostScore { hostname: hostname.to_string(), score }
        })
        .collect();
    // Stable, so equal scores stay in hostname order.
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

/// Score a single host from the ages of its backups.
///
/// An in-progress youngest backup earns [`IN_PROGRESS_BONUS`]; in-progress
/// backups never count as backups held. Each finalized backup lowers the
/// score by one, reaching `target` lowers it by [`TARGET_MET_PENALTY`], and
/// the age of the oldest backup raises it by `log10(oldest)` less
/// `log10(oldest - newest)`.
pub fn score_host(ages: &[Age], target: usize) -> f64 {
    let mut ages = ages.to_vec();
    ages.sort();

    let mut score = 0.0;
    if ages.first() == Some(&Age::InProgress) {
        score += IN_PROGRESS_BONUS;
    }
    let finalized: Vec<u64> = ages.iter().filter_map(Age::seconds).collect();
    if finalized.len() >= target {
        score -= TARGET_MET_PENALTY;
    }
    score -= finalized.len() as f64;
    if let (Some(&newest), Some(&oldest)) = (finalized.first(), finalized.last()) {
        score += (oldest.max(1) as f64).log10();
        score -= (oldest.saturating_sub(newest).max(1) as f64).log10();
    }
    score
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

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_in_progress_backup() {
        let mut catalog = HostCatalog::default();
        catalog.fold("bkup-a", ObjectInfo::new("db2.1.tar.aa", 10, NOW)).unwrap();
        let ranked = rank_hosts(&catalog, 3, NOW);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].hostname, "db2");
        assert!(approx(ranked[0].score, IN_PROGRESS_BONUS));
        assert!(ranked[0].needs_backup());
    }

    #[rstest]
    #[case(&[], 3, 0.0)]
    #[case(&[Age::Finalized(1000)], 3, -1.0 + 3.0)]
    #[case(&[Age::Finalized(10), Age::Finalized(1000)], 2, -100.0 - 2.0 + 3.0 - (990_f64).log10())]
    #[case(&[Age::InProgress, Age::Finalized(100)], 1, 200.0 - 100.0 - 1.0 + 2.0)]
    // Only the youngest slot earns the bonus, but no in-progress backup counts.
    #[case(&[Age::InProgress, Age::InProgress], 1, 200.0)]
    #[case(&[Age::Finalized(0)], 3, -1.0)]
    fn test_score_host(#[case] ages: &[Age], #[case] target: usize, #[case] expected: f64) {
        let score = score_host(ages, target);
        assert!(approx(score, expected), "{score} != {expected}");
    }

    #[test]
    fn test_more_backups_never_raise_score() {
        // The first finalized backup of a host trades the count penalty for
        // its log-age term, so monotonicity is checked from one backup on.
        let pool = [0, 1, 59, 3_600, 86_399, 2 * DAY, 7 * DAY, 40 * DAY, 365 * DAY];
        let orders: [Vec<u64>; 2] = [pool.to_vec(), pool.iter().rev().copied().collect()];
        for target in 0..5 {
            for with_in_progress in [false, true] {
                for order in &orders {
                    let mut ages: Vec<Age> = Vec::new();
                    if with_in_progress {
                        ages.push(Age::InProgress);
                    }
                    ages.push(Age::Finalized(order[0]));
                    for seconds in &order[1..] {
                        let before = score_host(&ages, target);
                        ages.push(Age::Finalized(*seconds));
                        let after = score_host(&ages, target);
                        assert!(after <= before, "target={target} adding {seconds}: {before} -> {after}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_rank_orders_by_urgency_then_hostname() {
        let mut catalog = HostCatalog::default();
        let mut finalize = |host: &str, number: u64, days: i64| {
            let at = NOW - Duration::days(days);
            catalog.fold("bkup-a", ObjectInfo::new(format!("{host}.{number}.tar"), 1, at)).unwrap();
            catalog.fold("bkup-a", ObjectInfo::new(format!("{host}.{number}.tar.COMPLETE"), 0, at)).unwrap();
        };
        finalize("beta", 1, 2);
        finalize("alpha", 1, 2);
        for n in 1..=3 {
            finalize("gamma", n, n as i64);
        }
        catalog.fold("bkup-a", ObjectInfo::new("delta.1.tar", 1, NOW)).unwrap();

        let ranked: Vec<_> = rank_hosts(&catalog, 3, NOW).into_iter().map(|h| h.hostname).collect();
        assert_eq!(ranked, vec!["delta", "alpha", "beta", "gamma"]);
    }
}
