use std::path::PathBuf;

use pkgtx_types::Name;

/// A package the caller wants installed, as passed to `resolve_install`.
///
/// Either names a catalog package to look up, or a local file to read
/// directly (§4.2: "a ref carrying a filename is read from disk instead of
/// going through CAT").
#[derive(Clone, Debug)]
pub struct RequestedPackage {
    /// The package name to resolve, when not reading from a local file.
    pub name: Option<Name>,
    /// The architecture to request, if the caller cares which one.
    pub architecture: Option<String>,
    /// A local file to read instead of calling the catalog.
    pub local_file: Option<PathBuf>,
}

impl RequestedPackage {
    /// Requests `name` from the catalog.
    pub fn named(name: Name) -> Self {
        Self {
            name: Some(name),
            architecture: None,
            local_file: None,
        }
    }

    /// Requests the package described by a local file.
    pub fn from_file(path: PathBuf) -> Self {
        Self {
            name: None,
            architecture: None,
            local_file: Some(path),
        }
    }

    /// Requests `name` for a specific architecture.
    pub fn for_architecture(name: Name, architecture: impl Into<String>) -> Self {
        Self {
            name: Some(name),
            architecture: Some(architecture.into()),
            local_file: None,
        }
    }
}
