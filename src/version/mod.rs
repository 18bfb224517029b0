// src/version/mod.rs

//! EVR (epoch:version-release) parsing and ordering
//!
//! Versions are compared the way RPM-family package managers do it: the
//! epoch first, then the version, then the release. Each segment is split
//! into runs of digits and runs of letters and compared run by run.

use std::cmp::Ordering;
use std::fmt;

/// A parsed epoch:version-release triple
///
/// Equality follows ordering, so `0:1.0` and `1.0` are equal.
#[derive(Debug, Clone)]
pub struct Evr {
    pub epoch: Option<String>,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    pub fn new(epoch: Option<&str>, version: &str, release: Option<&str>) -> Self {
        Self {
            epoch: epoch.filter(|e| !e.is_empty()).map(str::to_string),
            version: version.to_string(),
            release: release.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }

    /// Parse an EVR string
    ///
    /// Format: [epoch:]version[-release]
    /// - "1.2.3" → epoch=None, version="1.2.3", release=None
    /// - "2:1.2.3-4.el8" → epoch=Some("2"), version="1.2.3", release=Some("4.el8")
    ///
    /// The epoch ends at the first colon, the release starts after the last
    /// dash. Parsing never fails; a missing part is simply absent.
    pub fn parse(s: &str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) => (Some(e), r),
            None => (None, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, Some(r)),
            None => (rest, None),
        };

        Self::new(epoch, version, release)
    }

    fn epoch_str(&self) -> &str {
        self.epoch.as_deref().unwrap_or("0")
    }

    /// Compare for dependency ranges
    ///
    /// Like `cmp`, except that the release is only compared when both sides
    /// carry one: a requirement on `foo = 1.0` matches every `1.0-N`.
    pub fn range_cmp(&self, other: &Evr) -> Ordering {
        vercmp(self.epoch_str(), other.epoch_str())
            .then_with(|| vercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(r1), Some(r2)) => vercmp(r1, r2),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        vercmp(self.epoch_str(), other.epoch_str())
            .then_with(|| vercmp(&self.version, &other.version))
            .then_with(|| {
                vercmp(
                    self.release.as_deref().unwrap_or(""),
                    other.release.as_deref().unwrap_or(""),
                )
            })
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Evr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Evr {}

/// Compare two EVR strings
pub fn compare(evr1: &str, evr2: &str) -> Ordering {
    Evr::parse(evr1).cmp(&Evr::parse(evr2))
}

/// Compare a single version segment (epoch, version or release)
pub fn vercmp(a: &str, b: &str) -> Ordering {
    let mut one = if a.is_empty() { "0" } else { a }.as_bytes();
    let mut two = if b.is_empty() { "0" } else { b }.as_bytes();

    if one == two {
        return Ordering::Equal;
    }

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        match (one.first(), two.first()) {
            (None, None) => return Ordering::Equal,
            // An extra numeric run is newer, an extra alphabetic run is older
            (Some(c), None) => {
                return if c.is_ascii_digit() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
            }
            (None, Some(c)) => {
                return if c.is_ascii_digit() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
            }
            (Some(c1), Some(c2)) => {
                let numeric1 = c1.is_ascii_digit();
                let numeric2 = c2.is_ascii_digit();

                if numeric1 != numeric2 {
                    return if numeric1 {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    };
                }

                let (run1, rest1) = split_run(one, numeric1);
                let (run2, rest2) = split_run(two, numeric2);

                let ord = if numeric1 {
                    compare_numeric(run1, run2)
                } else {
                    run1.cmp(run2)
                };
                if ord != Ordering::Equal {
                    return ord;
                }

                one = rest1;
                two = rest2;
            }
        }
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|c| c.is_ascii_alphanumeric())
        .unwrap_or(s.len());
    &s[start..]
}

fn split_run(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evr_parse_simple() {
        let v = Evr::parse("1.2.3");
        assert_eq!(v.epoch, None);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_evr_parse_full() {
        let v = Evr::parse("1:2.3.4-5.el8");
        assert_eq!(v.epoch.as_deref(), Some("1"));
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release.as_deref(), Some("5.el8"));
    }

    #[test]
    fn test_evr_parse_release_after_last_dash() {
        let v = Evr::parse("1.0-rc1-3");
        assert_eq!(v.version, "1.0-rc1");
        assert_eq!(v.release.as_deref(), Some("3"));
    }

    #[test]
    fn test_missing_epoch_is_zero() {
        assert_eq!(compare("1:1.0-1", "1.0-1"), Ordering::Greater);
        assert_eq!(compare("0:1.0-1", "1.0-1"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_runs_compare_numerically() {
        assert_eq!(compare("1.0-2", "1.0-10"), Ordering::Less);
        assert_eq!(vercmp("1.010", "1.9"), Ordering::Greater);
        assert_eq!(vercmp("007", "7"), Ordering::Equal);
    }

    #[test]
    fn test_identical_strings_are_equal() {
        assert_eq!(compare("a", "a"), Ordering::Equal);
        assert_eq!(vercmp("1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_alphabetic_runs_compare_by_character() {
        assert_eq!(vercmp("1.0a", "1.0b"), Ordering::Less);
        assert_eq!(vercmp("abc", "abd"), Ordering::Less);
        assert_eq!(vercmp("B", "a"), Ordering::Less);
    }

    #[test]
    fn test_extra_runs() {
        // extra numeric run wins, extra alphabetic run loses
        assert_eq!(vercmp("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(vercmp("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(vercmp("1.0a", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.0", "1.0a"), Ordering::Greater);
    }

    #[test]
    fn test_numeric_beats_alphabetic_at_same_position() {
        assert_eq!(vercmp("1.1", "1.a"), Ordering::Greater);
        assert_eq!(vercmp("1.a", "1.1"), Ordering::Less);
    }

    #[test]
    fn test_empty_segment_equals_zero() {
        assert_eq!(vercmp("", "0"), Ordering::Equal);
        assert_eq!(compare("1.0", "1.0-0"), Ordering::Equal);
        assert_eq!(compare("1.0", "1.0-1"), Ordering::Less);
    }

    #[test]
    fn test_separators_are_not_significant() {
        assert_eq!(vercmp("1.0", "1_0"), Ordering::Equal);
        assert_eq!(vercmp("2.0.1", "2-0-1"), Ordering::Equal);
    }

    #[test]
    fn test_epoch_dominates_version() {
        let v1 = Evr::parse("1:1.0.0");
        let v2 = Evr::parse("0:2.0.0");
        assert!(v1 > v2);
    }

    #[test]
    fn test_range_cmp_ignores_missing_release() {
        let req = Evr::parse("1.0");
        let have = Evr::parse("1.0-3");
        assert_eq!(req.range_cmp(&have), Ordering::Equal);
        assert_eq!(req.cmp(&have), Ordering::Less);

        let have_old = Evr::parse("1.0-1");
        assert_eq!(have.range_cmp(&have_old), Ordering::Greater);
    }

    #[test]
    fn test_evr_display() {
        assert_eq!(Evr::parse("1.2.3").to_string(), "1.2.3");
        assert_eq!(Evr::parse("2:1.2.3-4.el8").to_string(), "2:1.2.3-4.el8");
    }
}
