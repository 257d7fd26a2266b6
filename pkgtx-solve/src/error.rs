/// Errors the resolver and conflict analyzer can return.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// The catalog could not be reached or returned malformed data.
    #[error(transparent)]
    Catalog(#[from] pkgtx_catalog::CatalogError),

    /// The local package database could not be queried.
    #[error(transparent)]
    Lps(#[from] pkgtx_local::LPSError),

    /// A name, version or feature failed to validate.
    #[error(transparent)]
    Types(#[from] pkgtx_types::Error),

    /// `resolve_install` was called with no roots.
    #[error("no packages were requested")]
    EmptyRoots,
}
