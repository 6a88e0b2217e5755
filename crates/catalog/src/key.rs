//! Object name parsing.
//!
//! Backups are written as flat objects whose names carry everything the
//! catalog knows about them:
//!
//! ```text
//! <hostname>.<number>.tar[.<split>][.gpg]     data part
//! <hostname>.<number>.tar.COMPLETE            finalization marker
//! ```
//!
//! Hostnames may contain dots, so names are decoded by stripping known
//! suffixes from the right until only `<hostname>.<number>` remains. Split
//! indices written in front of the archive segment
//! (`<hostname>.<number>.<split>.tar`) are accepted too, as long as they are
//! not all digits.

use crate::error::{Error, ErrorKind};
use std::str::FromStr;

/// Final segment of the marker written once every part is uploaded.
pub const FINALIZATION_SUFFIX: &str = "COMPLETE";
/// Final segment of encrypted parts. Encryption state is not tracked.
pub const ENCRYPTION_SUFFIX: &str = "gpg";
/// Archive segment preceding the optional encryption suffix.
pub const ARCHIVE_SUFFIX: &str = "tar";
/// Character length of a multi-part split index (`aa`, `ab`, ...).
const SPLIT_INDEX_LEN: usize = 2;

/// What a single object contributes to its backup record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// One part (or the whole) of the backup archive.
    Data,
    /// Zero-length marker signalling that the backup is complete.
    FinalizationMarker,
}

/// The typed result of decoding one object name.
///
/// Never persisted; consumed immediately when folding a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyFragment {
    pub hostname: String,
    pub backup_number: u64,
    pub role: KeyRole,
}
impl KeyFragment {
    pub fn is_finalization_marker(&self) -> bool {
        self.role == KeyRole::FinalizationMarker
    }
}
impl FromStr for KeyFragment {
    type Err = Error;

    /// Decodes an object name.
    ///
    /// Returns [`ErrorKind::StrayKey`] for a marker with nothing left in
    /// front of it, and [`ErrorKind::MalformedKey`] when no integer backup
    /// number or no hostname can be recovered.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let mut segments: Vec<&str> = name.split('.').collect();
        let role = if segments.last() == Some(&FINALIZATION_SUFFIX) {
            // Markers are `<host>.<number>.tar.COMPLETE`: drop the marker and
            // the archive segment in front of it, nothing else applies.
            segments.pop();
            segments.pop();
            if segments.is_empty() {
                exn::bail!(ErrorKind::StrayKey(name.to_string()));
            }
            KeyRole::FinalizationMarker
        } else {
            if segments.last() == Some(&ENCRYPTION_SUFFIX) {
                segments.pop();
            }
            if segments.last().is_some_and(|s| *s != ARCHIVE_SUFFIX && is_split_index(s)) {
                segments.pop();
            }
            if segments.last() == Some(&ARCHIVE_SUFFIX) {
                segments.pop();
                if segments.last().is_some_and(|s| is_split_index(s) && !s.bytes().all(|b| b.is_ascii_digit())) {
                    segments.pop();
                }
            }
            KeyRole::Data
        };
        let backup_number = segments
            .pop()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| Error::from(ErrorKind::MalformedKey(name.to_string())))?;
        let hostname = segments.join(".");
        if hostname.is_empty() {
            exn::bail!(ErrorKind::MalformedKey(name.to_string()));
        }
        Ok(Self { hostname, backup_number, role })
    }
}

fn is_split_index(segment: &str) -> bool {
    segment.chars().count() == SPLIT_INDEX_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("web1.4.tar", "web1", 4, KeyRole::Data)]
    #[case("web1.4.tar.gpg", "web1", 4, KeyRole::Data)]
    #[case("web1.4.tar.aa", "web1", 4, KeyRole::Data)]
    #[case("web1.4.tar.ab.gpg", "web1", 4, KeyRole::Data)]
    #[case("web1.4.tar.07.gpg", "web1", 4, KeyRole::Data)]
    #[case("web1.4.aa.tar", "web1", 4, KeyRole::Data)]
    #[case("web1.4.ab.tar.gpg", "web1", 4, KeyRole::Data)]
    // Two-digit backup numbers stay put.
    #[case("web1.12.tar", "web1", 12, KeyRole::Data)]
    #[case("web1.12.tar.ac.gpg", "web1", 12, KeyRole::Data)]
    #[case("web1.4.tar.COMPLETE", "web1", 4, KeyRole::FinalizationMarker)]
    #[case("db2.example.com.120.tar.zz.gpg", "db2.example.com", 120, KeyRole::Data)]
    #[case("db2.example.com.120.tar.COMPLETE", "db2.example.com", 120, KeyRole::FinalizationMarker)]
    #[case("web1.0.tar", "web1", 0, KeyRole::Data)]
    // A two-character hostname label is only stripped when it is in split position.
    #[case("ab.cd.3.tar", "ab.cd", 3, KeyRole::Data)]
    fn test_parse(#[case] name: &str, #[case] hostname: &str, #[case] number: u64, #[case] role: KeyRole) {
        let fragment: KeyFragment = name.parse().unwrap();
        assert_eq!(fragment.hostname, hostname);
        assert_eq!(fragment.backup_number, number);
        assert_eq!(fragment.role, role);
    }

    #[test]
    fn test_parse_recovers_every_grammar_variant() {
        let hosts = ["web1", "db2.example.com", "a.b.c.d"];
        for host in hosts {
            for number in [0_u64, 7, 4_294_967_296] {
                let data = [
                    format!("{host}.{number}.tar"),
                    format!("{host}.{number}.tar.gpg"),
                    format!("{host}.{number}.tar.aa"),
                    format!("{host}.{number}.tar.az.gpg"),
                    format!("{host}.{number}.aa.tar"),
                    format!("{host}.{number}.az.tar.gpg"),
                ];
                for name in data {
                    let fragment: KeyFragment = name.parse().unwrap();
                    assert_eq!((fragment.hostname.as_str(), fragment.backup_number), (host, number), "{name}");
                    assert!(!fragment.is_finalization_marker(), "{name}");
                }
                let marker: KeyFragment = format!("{host}.{number}.tar.COMPLETE").parse().unwrap();
                assert_eq!((marker.hostname.as_str(), marker.backup_number), (host, number));
                assert!(marker.is_finalization_marker());
            }
        }
    }

    #[rstest]
    #[case("stray.COMPLETE")]
    #[case("COMPLETE")]
    fn test_stray_marker(#[case] name: &str) {
        let err = name.parse::<KeyFragment>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::StrayKey(n) if n == name));
    }

    #[rstest]
    #[case("")]
    #[case("web1")]
    #[case("web1.tar")]
    #[case("web1.four.tar")]
    #[case("web1.-4.tar")]
    #[case("web1.+4.tar")]
    #[case("4.tar")]
    #[case(".4.tar")]
    #[case("12")]
    #[case("web1.4.COMPLETE")]
    #[case("web1.99999999999999999999999.tar")]
    fn test_malformed(#[case] name: &str) {
        let err = name.parse::<KeyFragment>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedKey(_)), "{name}");
    }
}
