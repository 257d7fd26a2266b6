/// Errors the transaction executor and journal reader/writer can return.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The local package system refused or could not apply the batch.
    #[error(transparent)]
    Lps(#[from] pkgtx_local::LPSError),

    /// A name or version failed to validate while building the batch or
    /// journal.
    #[error(transparent)]
    Types(#[from] pkgtx_types::Error),

    /// Downloading a package's file failed, after the single retry §4.7
    /// allows.
    #[error("failed to fetch '{name}' after one retry: {reason}")]
    FetchFailed {
        /// The package whose download failed.
        name: String,
        /// The underlying reason the fetch hook reported.
        reason: String,
    },

    /// A downloaded file's checksum did not match the catalog-provided one.
    #[error("checksum mismatch for '{0}'")]
    ChecksumMismatch(String),

    /// An observer declined at the `preflight_check` cancellation point.
    #[error("cancelled at preflight check")]
    Cancelled,

    /// The journal file could not be read or written.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The journal's XML could not be parsed or serialized.
    #[error("malformed transaction journal: {0}")]
    MalformedJournal(String),
}
