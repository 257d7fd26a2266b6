use crate::arena::NodeIndex;
use crate::fill::FillFlags;
use crate::id::PackageId;
use crate::name::{Feature, Name};
use crate::status::{BreakKind, ModStatus, Status};
use crate::version::{Sense, Version};

/// A directed edge `parent requires child` (§3).
///
/// The pointer to the child is a [`NodeIndex`] into the same
/// [`crate::ResolvedTree`] the parent belongs to: a non-owning reference, in
/// keeping with the tree's arena ownership model.
#[derive(Clone, Debug)]
pub struct Dependency {
    /// The required package.
    pub child: NodeIndex,
    /// How `version`, if present, constrains the child.
    pub sense: Sense,
    /// The required version, if the dependency names one.
    pub version: Option<Version>,
}

/// Records that installing the owning package will replace an already
/// installed package (§3, §4.4 "Modification status").
///
/// `replaced` points at the installed package's own node in the same tree
/// (the resolver gives every replaced package a node so that CA can inspect
/// its provides list); `replaced_name`/`replaced_version` are a snapshot
/// taken at the time the relation was recorded, so that the child-family
/// heuristic (§4.1) can be evaluated without a second arena lookup.
#[derive(Clone, Debug)]
pub struct ModifiesEntry {
    /// The installed package being replaced.
    pub replaced: NodeIndex,
    /// The replaced package's name at the time of replacement.
    pub replaced_name: Name,
    /// The replaced package's version at the time of replacement.
    pub replaced_version: Version,
    /// Whether the replacement is an upgrade, downgrade, or no-op.
    pub mod_status: ModStatus,
}

/// A record that one new package invalidates an existing installed package
/// (§3).
#[derive(Clone, Debug)]
pub struct BreakRecord {
    /// What kind of inconsistency this is.
    pub kind: BreakKind,
    /// The package this break is attached to, i.e. the one whose install
    /// caused the inconsistency.
    pub broken: NodeIndex,
    /// Free-form description of the offending feature, file or version
    /// (e.g. `"/usr/bin/x"` for a `FileConflict`, or a feature name for a
    /// `FeatureMissing`).
    pub offending: String,
}

/// A node in the resolution graph (§3).
///
/// Constructed partially filled by [`make_ref`] and mutated in place by the
/// resolver as its fill-flags and status advance; owned exclusively by
/// whichever [`crate::ResolvedTree`]'s arena it lives in.
#[derive(Clone, Debug)]
pub struct PackageRef {
    /// The package's name, once known.
    pub name: Option<Name>,
    /// The desired or resolved version, once known.
    pub version: Option<Version>,
    /// Minor/patch qualifier distinct from the main version component.
    pub minor: Option<String>,
    /// Target architecture (e.g. `"i386"`, `"src"`).
    pub architecture: Option<String>,
    /// Target distribution string.
    pub distribution: Option<String>,
    /// Which attributes have been loaded so far.
    pub fill_flags: FillFlags,
    /// Features (including owned file paths) this package provides.
    pub provides: Vec<Feature>,
    /// Outgoing dependency edges.
    pub depends: Vec<Dependency>,
    /// Installed packages this package replaces.
    pub modifies: Vec<ModifiesEntry>,
    /// Recorded inconsistencies caused by installing this package.
    pub breaks: Vec<BreakRecord>,
    /// Current lifecycle state.
    pub status: Status,
    /// Whether the user requested this package directly.
    pub toplevel: bool,
    /// The catalog identity, once known.
    pub id: Option<PackageId>,
    /// A local file path, if this ref was constructed from one (§4.4
    /// "Local file inputs").
    pub filename: Option<String>,
}

impl PackageRef {
    /// Returns true if `self`'s fill-flags already contain Pass A's
    /// mandatory set.
    pub const fn is_filled(&self) -> bool {
        self.fill_flags.is_mandatory_complete()
    }

    /// Returns true if this ref is a source package (`architecture == "src"`,
    /// §4.4 edge-case policy).
    pub fn is_source(&self) -> bool {
        self.architecture.as_deref() == Some("src")
    }
}

/// Constructs a partially-filled [`PackageRef`] suitable as a resolver
/// input.
///
/// Only `name` is required; the rest of the fields start empty and
/// `fill_flags` starts at [`FillFlags::empty`], reflecting that nothing has
/// been fetched yet.
pub fn make_ref(
    name: Option<Name>,
    version: Option<Version>,
    minor: Option<String>,
    architecture: Option<String>,
    distribution: Option<String>,
) -> PackageRef {
    let mut fill_flags = FillFlags::empty();
    if name.is_some() {
        fill_flags.insert(FillFlags::NAME);
    }
    if version.is_some() {
        fill_flags.insert(FillFlags::VERSION);
    }
    PackageRef {
        name,
        version,
        minor,
        architecture,
        distribution,
        fill_flags,
        provides: Vec::new(),
        depends: Vec::new(),
        modifies: Vec::new(),
        breaks: Vec::new(),
        status: Status::Unknown,
        toplevel: false,
        id: None,
        filename: None,
    }
}

/// Returns a stable, user-facing name for `package`.
///
/// Falls back to the first provided feature if the name itself is absent
/// (e.g. for a ref that has not yet been filled by the catalog).
pub fn ref_readable_name(package: &PackageRef) -> String {
    if let Some(name) = &package.name {
        return name.as_str().to_string();
    }
    if let Some(feature) = package.provides.first() {
        return feature.as_str().to_string();
    }
    "<unnamed package>".to_string()
}

/// Returns true if `package`'s catalog identity is `id`.
pub fn ref_matches_id(package: &PackageRef, id: &PackageId) -> bool {
    package.id.as_ref() == Some(id)
}

/// Returns true iff `dep_name` is a hyphen-prefix of the name of some package
/// `parent` modifies, at the same version as that modification (§4.1, §9,
/// the "child family" heuristic): used to recognize that a dependency is
/// really a sub-package of one the parent is upgrading.
///
/// This is deliberately as fuzzy as the heuristic it is modeled on, and is
/// advisory-only (see `SPEC_FULL.md`'s discussion of this open question): it
/// must never be used to silently suppress a genuine dependency failure, only
/// to annotate a diagnostic explaining why one might be spurious. Matching
/// is first-match-wins against `parent.modifies` in order, so the source's
/// ambiguous-double-match panic path is simply never reached here.
pub fn ref_related_as_child_family(parent: &PackageRef, dep_name: &Name, dep_version: &Version) -> bool {
    parent
        .modifies
        .iter()
        .any(|entry| is_child_family_match(dep_name, dep_version, &entry.replaced_name, &entry.replaced_version))
}

fn is_child_family_match(dep_name: &Name, dep_version: &Version, candidate_name: &Name, candidate_version: &Version) -> bool {
    if dep_version != candidate_version {
        return false;
    }
    let candidate = candidate_name.as_str();
    let prefix = dep_name.as_str();
    candidate.len() > prefix.len() && candidate.starts_with(prefix) && candidate.as_bytes()[prefix.len()] == b'-'
}
