use std::fmt::{Debug, Formatter};
use std::ops::BitOr;

/// Bitset recording which attributes of a [`crate::PackageRef`] have been
/// loaded from the catalog or a local file.
///
/// Flags only ever gain bits over the lifetime of one resolution run (the
/// fill-monotonicity invariant, §3.2): there is no method that clears a bit.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct FillFlags(u8);

impl FillFlags {
    /// The name has been filled.
    pub const NAME: Self = Self(0b0000_0001);
    /// The version has been filled.
    pub const VERSION: Self = Self(0b0000_0010);
    /// The dependency list has been filled.
    pub const DEPS: Self = Self(0b0000_0100);
    /// The provides list has been filled.
    pub const PROVIDES: Self = Self(0b0000_1000);
    /// The owned-file list has been filled.
    pub const FILES: Self = Self(0b0001_0000);

    /// The minimum set of flags Pass A (§4.4) requires before a node is
    /// considered filled: name, version, deps and provides.
    pub const MANDATORY: Self = Self(Self::NAME.0 | Self::VERSION.0 | Self::DEPS.0 | Self::PROVIDES.0);

    /// The empty flag set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true if `self` has every bit set in `other`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets every bit in `other`, in place.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns the union of `self` and `other`.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if Pass A's mandatory set is fully present.
    pub const fn is_mandatory_complete(self) -> bool {
        self.contains(Self::MANDATORY)
    }
}

impl BitOr for FillFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl Debug for FillFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::NAME) {
            names.push("NAME");
        }
        if self.contains(Self::VERSION) {
            names.push("VERSION");
        }
        if self.contains(Self::DEPS) {
            names.push("DEPS");
        }
        if self.contains(Self::PROVIDES) {
            names.push("PROVIDES");
        }
        if self.contains(Self::FILES) {
            names.push("FILES");
        }
        if names.is_empty() {
            write!(f, "FillFlags(empty)")
        } else {
            write!(f, "FillFlags({})", names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_insert_only_grows() {
        let mut flags = FillFlags::empty();
        assert!(!flags.contains(FillFlags::NAME));
        flags.insert(FillFlags::NAME);
        flags.insert(FillFlags::VERSION);
        assert!(flags.contains(FillFlags::NAME));
        assert!(flags.contains(FillFlags::VERSION));
        assert!(!flags.is_mandatory_complete());
        flags.insert(FillFlags::DEPS | FillFlags::PROVIDES);
        assert!(flags.is_mandatory_complete());
    }
}
