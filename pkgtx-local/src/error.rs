/// Errors a [`crate::LocalPackageSystem`] implementation can return.
#[derive(Debug, thiserror::Error)]
pub enum LPSError {
    /// The database could not be locked (another operation holds it).
    #[error("local package database at '{0}' is locked by another process")]
    Locked(String),

    /// A filesystem operation against the database failed.
    #[error("I/O error accessing local package database: {0}")]
    Io(#[from] std::io::Error),

    /// An installed package record could not be parsed.
    #[error("malformed package record '{0}': {1}")]
    MalformedRecord(String, String),

    /// A pre-flight dependency conflict was detected; the whole batch was
    /// refused (§4.3: `install_batch`/`uninstall_batch` must be atomic with
    /// respect to the LPS's own dependency check).
    #[error("batch refused: pre-flight dependency conflict on '{0}'")]
    DependencyConflict(String),

    /// The requested package was not installed.
    #[error("package '{0}' is not installed")]
    NotInstalled(String),
}
