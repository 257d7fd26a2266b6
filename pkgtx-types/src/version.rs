use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::Error;

/// A package version string.
///
/// Versions are never rejected for being unparseable: [`compare_versions`]
/// falls back to treating any run of characters it cannot classify as a
/// numeric or alphabetic segment as a plain string comparison, so the only
/// validation performed here is that the string is non-empty.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Version(String);

impl Version {
    /// Creates a new `Version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidVersion);
        }
        Ok(Self(value))
    }

    /// Returns the version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_version_strings(&self.0, &other.0)
    }
}

/// Compares two version strings using RPM-style `rpmvercmp` semantics.
///
/// The strings are walked left to right. Runs of non-alphanumeric characters
/// (including the `-` that conventionally separates a version from its
/// release) act purely as segment separators and are never compared
/// themselves, so a trailing release number is naturally treated as a
/// secondary sort key once the version segments that precede it compare
/// equal. Each segment is either all-digits or all-letters; a numeric
/// segment always compares greater than an alphabetic one at the same
/// position (so `1.0` is newer than `1.0a`, matching RPM's convention that an
/// alphabetic suffix denotes a pre-release). Numeric segments compare as
/// integers after stripping leading zeros; alphabetic segments compare
/// byte-lexically. This never fails: any input, however irregular, produces
/// a total order.
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut ai = 0usize;
    let mut bi = 0usize;

    loop {
        while ai < a.len() && !a[ai].is_ascii_alphanumeric() {
            ai += 1;
        }
        while bi < b.len() && !b[bi].is_ascii_alphanumeric() {
            bi += 1;
        }

        let a_rem = ai < a.len();
        let b_rem = bi < b.len();
        if !a_rem && !b_rem {
            return Ordering::Equal;
        }
        if !b_rem {
            return if a[ai].is_ascii_digit() {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        if !a_rem {
            return if b[bi].is_ascii_digit() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        let a_start = ai;
        let b_start = bi;
        let a_numeric = a[ai].is_ascii_digit();
        if a_numeric {
            while ai < a.len() && a[ai].is_ascii_digit() {
                ai += 1;
            }
        } else {
            while ai < a.len() && a[ai].is_ascii_alphabetic() {
                ai += 1;
            }
        }
        let b_numeric = b[bi].is_ascii_digit();
        if b_numeric {
            while bi < b.len() && b[bi].is_ascii_digit() {
                bi += 1;
            }
        } else {
            while bi < b.len() && b[bi].is_ascii_alphabetic() {
                bi += 1;
            }
        }

        if a_numeric && !b_numeric {
            return Ordering::Greater;
        }
        if !a_numeric && b_numeric {
            return Ordering::Less;
        }

        let a_seg: String = a[a_start..ai].iter().collect();
        let b_seg: String = b[b_start..bi].iter().collect();

        let ordering = if a_numeric {
            let a_trimmed = a_seg.trim_start_matches('0');
            let b_trimmed = b_seg.trim_start_matches('0');
            match a_trimmed.len().cmp(&b_trimmed.len()) {
                Ordering::Equal => a_trimmed.cmp(b_trimmed),
                other => other,
            }
        } else {
            a_seg.cmp(&b_seg)
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// The relational sense of a version requirement.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display, strum::EnumString)]
pub enum Sense {
    /// Exact version match.
    #[strum(serialize = "=")]
    Eq,
    /// Greater than or equal to.
    #[strum(serialize = ">=")]
    Ge,
    /// Less than or equal to.
    #[strum(serialize = "<=")]
    Le,
    /// Strictly less than.
    #[strum(serialize = "<")]
    Lt,
    /// Strictly greater than.
    #[strum(serialize = ">")]
    Gt,
    /// No version constraint; any installed version satisfies.
    #[strum(serialize = "*")]
    Any,
}

/// Returns true if `installed_version` satisfies a requirement of
/// `required_version` under `sense`.
///
/// `sense == Sense::Any` is always satisfied, matching a dependency that
/// names a package or feature with no version constraint at all.
pub fn version_satisfies(installed_version: &Version, sense: Sense, required_version: &Version) -> bool {
    if sense == Sense::Any {
        return true;
    }
    match compare_version_strings(installed_version.as_str(), required_version.as_str()) {
        Ordering::Less => matches!(sense, Sense::Lt | Sense::Le),
        Ordering::Equal => matches!(sense, Sense::Eq | Sense::Ge | Sense::Le),
        Ordering::Greater => matches!(sense, Sense::Gt | Sense::Ge),
    }
}
