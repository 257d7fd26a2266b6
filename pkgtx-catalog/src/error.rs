/// Errors a [`crate::CatalogClient`] can return from `get_info` (§4.2).
///
/// Of these, only [`CatalogError::NotFound`] is a resolution-level failure
/// that the resolver handles by marking the offending node `CANNOT_OPEN`;
/// every other variant is fatal to the whole run and propagates out.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No package matching the request exists in the catalog.
    #[error("package '{0}' not found in catalog")]
    NotFound(String),

    /// More than one package matched an underspecified request.
    #[error("request for '{0}' is ambiguous: multiple packages match")]
    Ambiguous(String),

    /// The catalog could not be reached at all.
    #[error("network error contacting catalog: {0}")]
    NetworkError(String),

    /// The catalog responded, but the response was malformed.
    #[error("malformed catalog response: {0}")]
    BadResponse(String),

    /// The catalog requires authentication this client does not have.
    #[error("catalog requires authentication")]
    AuthRequired,

    /// Reading or parsing a local package descriptor file failed.
    #[error("could not read local package file '{path}': {reason}")]
    LocalFileUnreadable {
        /// The path that could not be read.
        path: String,
        /// A human-readable reason.
        reason: String,
    },
}
