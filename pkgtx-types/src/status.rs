/// The lifecycle state of a [`crate::PackageRef`] during resolution.
///
/// The happy path is `Unknown -> PartlyResolved -> Resolved`; any of the
/// other variants is reached instead on failure. `Resolved` and the five
/// error variants are terminal: once a node reaches one of them it is never
/// revisited by a later resolver pass.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum Status {
    /// No resolution work has happened yet.
    Unknown,
    /// Filled and partially checked, but not yet at a fixed point.
    PartlyResolved,
    /// Fully resolved: filled, deduped and all dependencies satisfied.
    Resolved,
    /// The catalog (or local file) had no such package.
    CannotOpen,
    /// The ref's architecture is `src`; source packages are not installable.
    SourceNotSupported,
    /// At least one dependency could not be satisfied.
    DependencyFail,
    /// Installing this package would break an existing installed package.
    BreaksDependency,
    /// The ref is structurally malformed.
    Invalid,
}

impl Status {
    /// Returns true if this status will never change again within the same
    /// resolution run.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Resolved
                | Status::CannotOpen
                | Status::SourceNotSupported
                | Status::DependencyFail
                | Status::BreaksDependency
                | Status::Invalid
        )
    }

    /// Returns true if this is one of the five terminal *error* states
    /// (i.e. terminal but not `Resolved`).
    pub const fn is_terminal_error(self) -> bool {
        self.is_terminal() && !matches!(self, Status::Resolved)
    }
}

/// Whether installing a package upgrades, downgrades, or leaves unchanged an
/// existing installed package of the same name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum ModStatus {
    /// The new package is a newer version than the one it replaces.
    Upgraded,
    /// The new package is an older version than the one it replaces.
    Downgraded,
    /// The new package is the same version as the one it replaces.
    Unchanged,
}

/// The kind of inconsistency a [`crate::BreakRecord`] documents.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum BreakKind {
    /// A feature an installed package required has disappeared.
    FeatureMissing,
    /// Two packages claim ownership of the same file path.
    FileConflict,
    /// An installed package's version requirement is no longer met.
    VersionConflict,
}
