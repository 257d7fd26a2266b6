use pkgtx_types::Version;

use crate::error::LPSError;

/// The result of applying one package within an `install_batch`/
/// `uninstall_batch` call (§4.3).
#[derive(Clone, Debug)]
pub enum PerPackageOutcome {
    /// The package was newly installed.
    Installed(String),
    /// The package replaced an older installed version.
    Upgraded(String, Version),
    /// The package was removed.
    Removed(String),
    /// Applying this package failed; the batch as a whole still failed
    /// atomically, this records which member and why.
    Failed(String, String),
}

impl PerPackageOutcome {
    /// Builds a [`PerPackageOutcome::Failed`] from an [`LPSError`].
    pub fn failed(name: impl Into<String>, error: &LPSError) -> Self {
        Self::Failed(name.into(), error.to_string())
    }
}
