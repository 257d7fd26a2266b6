use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::Error;

/// The name of a package, used as part of its identity.
///
/// Names are opaque, case-sensitive strings. The only constraint enforced
/// here is that a name is non-empty and contains no path separator, since
/// names are used to build catalog lookup keys and must never be confused
/// with filesystem paths.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Name(String);

impl Name {
    /// Creates a new `Name` from a string, validating it in the process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is empty or contains `/`.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of a capability a package provides, or a path it owns.
///
/// Kept distinct from [`Name`] even though both wrap a plain string: a
/// dependency is satisfied by matching against a package's *name* or against
/// one of its *features* (`provides` entries, or files it owns), and
/// conflating the two was a recurring source of bugs in the system this
/// crate's resolution algorithm is modeled on. A feature whose value starts
/// with `/` is a file path rather than a symbolic capability name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Feature(String);

impl Feature {
    /// Creates a new `Feature` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidName(value));
        }
        Ok(Self(value))
    }

    /// Returns the feature as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this feature is a filesystem path rather than a
    /// symbolic capability name.
    pub fn is_path(&self) -> bool {
        self.0.starts_with('/')
    }
}

impl AsRef<str> for Feature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Name> for Feature {
    fn from(name: Name) -> Self {
        Self(name.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn from_str_agrees_with_new() -> TestResult {
        let parsed: Name = "gimp-print".parse()?;
        assert_eq!(parsed, Name::new("gimp-print")?);
        assert!("pkg/evil".parse::<Name>().is_err());
        Ok(())
    }

    #[rstest]
    #[case("gimp-print", true)]
    #[case("", false)]
    #[case("pkg/evil", false)]
    fn name_validation(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(Name::new(input).is_ok(), valid);
    }

    #[rstest]
    #[case("/usr/bin/gimp", true)]
    #[case("capability(printing)", false)]
    fn feature_is_path(#[case] input: &str, #[case] is_path: bool) {
        let feature = Feature::new(input).unwrap();
        assert_eq!(feature.is_path(), is_path);
    }

    #[test]
    fn feature_rejects_empty() {
        assert!(Feature::new("").is_err());
    }
}
