use std::fmt::{Display, Formatter};

/// Catalog-assigned unique handle for a logical package version.
///
/// Opaque and immutable once assigned; the unit of identity the dedup pass
/// (§4.4 Pass B) collapses nodes on. Two `PackageRef`s with the same
/// `PackageId` always refer to the same logical package, regardless of how
/// many distinct graph paths led to them.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PackageId(String);

impl PackageId {
    /// Wraps a catalog-assigned identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for PackageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
