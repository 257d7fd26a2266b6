use pkgtx_types::Name;

/// A root the user asked to remove, whose removal was refused because it
/// would break one or more installed packages outside the requested set
/// (§4.6 "Upward").
#[derive(Clone, Debug)]
pub struct UninstallFailure {
    /// The root whose removal was refused.
    pub root: Name,
    /// Installed packages (outside the requested set) that require `root`,
    /// transitively, and would therefore stop working.
    pub broken: Vec<Name>,
}

/// The output of [`crate::resolve_uninstall`] (§4.6).
#[derive(Clone, Debug, Default)]
pub struct UninstallPlan {
    /// The final removal set: surviving roots union their safe orphans,
    /// in the order they were decided safe to remove. Always disjoint from
    /// every name in `failures`.
    pub removals: Vec<Name>,
    /// Roots whose removal was refused, with the breakage that caused it.
    pub failures: Vec<UninstallFailure>,
}

impl UninstallPlan {
    /// Returns true if every requested root could be removed.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}
