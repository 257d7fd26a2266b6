use pkgtx_types::{Feature, Name};

/// A query against the local package database (§4.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Criterion {
    /// Packages whose name matches exactly.
    Matches(Name),
    /// Packages that provide a given feature or file.
    Provides(Feature),
    /// The package that owns a given file path.
    Owns(String),
    /// Packages that require a given name or feature.
    Requires(String),
}
