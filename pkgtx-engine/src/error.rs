/// Errors observed at the engine boundary (§7).
///
/// Per-root resolution and conflict failures are not represented here: they
/// are accumulated into the returned `ResolvedTree`/`UninstallPlan` and
/// reported per toplevel via `install_failed`/`uninstall_failed` (§7
/// "Propagation policy"). Only infrastructure failures that abort the whole
/// run reach this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Resolution or conflict analysis could not proceed at all.
    #[error(transparent)]
    Solve(#[from] pkgtx_solve::SolveError),

    /// The uninstall traverser could not proceed at all.
    #[error(transparent)]
    Uninstall(#[from] pkgtx_uninstall::UninstallError),

    /// Transaction execution, journal handling, or a fetch failed fatally.
    #[error(transparent)]
    Transaction(#[from] pkgtx_transaction::TransactionError),
}
