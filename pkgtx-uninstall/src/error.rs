/// Errors the uninstall traverser can return.
#[derive(Debug, thiserror::Error)]
pub enum UninstallError {
    /// The local package database could not be queried.
    #[error(transparent)]
    Lps(#[from] pkgtx_local::LPSError),

    /// A name failed to validate.
    #[error(transparent)]
    Types(#[from] pkgtx_types::Error),

    /// `resolve_uninstall` was called with no roots.
    #[error("no packages were requested for removal")]
    EmptyRoots,
}
