use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds elapsed since a backup was finalized.
///
/// Unfinalized backups have no meaningful age, so they get their own variant
/// instead of a magic number. Ordering places [`Age::InProgress`] before
/// every finalized age, i.e. an in-progress backup sorts as the youngest
/// entry; scheduling depends on that placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Age {
    InProgress,
    Finalized(u64),
}
impl Age {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }

    /// Elapsed seconds, if finalized.
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::InProgress => None,
            Self::Finalized(seconds) => Some(*seconds),
        }
    }

    /// Youngest-first ordering with in-progress backups ahead of everything.
    pub fn in_progress_first(a: &Self, b: &Self) -> Ordering {
        match (a, b) {
            (Self::InProgress, Self::InProgress) => Ordering::Equal,
            (Self::InProgress, Self::Finalized(_)) => Ordering::Less,
            (Self::Finalized(_), Self::InProgress) => Ordering::Greater,
            (Self::Finalized(a), Self::Finalized(b)) => a.cmp(b),
        }
    }
}
impl Ord for Age {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::in_progress_first(self, other)
    }
}
impl PartialOrd for Age {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Display for Age {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::InProgress => write!(f, "in progress"),
            Self::Finalized(seconds) if *seconds < SECONDS_PER_DAY => write!(f, "{:.1}h", *seconds as f64 / 3600.0),
            Self::Finalized(seconds) => write!(f, "{:.1}d", *seconds as f64 / SECONDS_PER_DAY as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_sorts_youngest() {
        let mut ages = vec![Age::Finalized(500), Age::InProgress, Age::Finalized(0), Age::Finalized(u64::MAX)];
        ages.sort();
        assert_eq!(ages, vec![Age::InProgress, Age::Finalized(0), Age::Finalized(500), Age::Finalized(u64::MAX)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Age::InProgress.to_string(), "in progress");
        assert_eq!(Age::Finalized(5400).to_string(), "1.5h");
        assert_eq!(Age::Finalized(40 * SECONDS_PER_DAY).to_string(), "40.0d");
    }
}
