use std::collections::{HashMap, HashSet};
use std::path::Path;

use pkgtx_local::{Criterion, LocalPackageSystem};
use pkgtx_types::{BreakKind, BreakRecord, Feature, NodeIndex, ResolvedTree, Status};

use crate::attribution::attribute_failures;
use crate::error::SolveError;

/// Walks a resolved tree looking for the three kinds of inconsistency CA
/// checks for, in order (§4.5): file ownership conflicts between two
/// packages being installed together, conflicts with files owned by
/// installed packages not in the tree, and feature regressions an upgrade
/// would inflict on installed packages that depend on a feature the
/// upgraded package drops.
///
/// Each check mutates the offending nodes in place, pushing a
/// [`BreakRecord`] and flipping their status to
/// [`Status::BreaksDependency`] if it was not already a terminal error; it
/// never removes nodes or edges, leaving that decision to the transaction
/// executor.
#[derive(Debug, Default)]
pub struct ConflictAnalyzer;

impl ConflictAnalyzer {
    /// Creates a new analyzer. Stateless: all state lives in the tree it is
    /// given to check.
    pub fn new() -> Self {
        Self
    }

    /// Runs all three checks against `tree`, querying `lps` for checks 2 and
    /// 3, then re-runs the §4.4 failure-attribution walk so a break recorded
    /// against a non-toplevel node still fails its toplevel root (§4.5's
    /// closing paragraph; §3 Invariant 3): a break flips only the offending
    /// node's own status, and that node is often a dependency several levels
    /// below the root whose `succeeded_roots()`/`failed_roots()` split the
    /// caller actually acts on.
    pub fn check(&self, tree: &mut ResolvedTree, lps: &dyn LocalPackageSystem, root: &Path) -> Result<(), SolveError> {
        let stubs = stub_indices(tree);
        self.check_file_conflicts(tree, &stubs);
        self.check_feature_regressions(tree, &stubs);
        self.check_installed_conflicts(tree, &stubs, lps, root)?;
        self.check_feature_consistency(tree, lps, root)?;
        attribute_failures(tree);
        Ok(())
    }

    /// Check 1: pairwise file conflicts between two packages both new to the
    /// tree. Both the package that first claimed the path and the one that
    /// collides with it are broken (§4.5 point 1: "record a FileConflict
    /// break on both packages and fail both toplevels").
    fn check_file_conflicts(&self, tree: &mut ResolvedTree, stubs: &HashSet<NodeIndex>) {
        let mut owners: HashMap<String, NodeIndex> = HashMap::new();
        let mut conflicts: Vec<(NodeIndex, String)> = Vec::new();

        for (index, node) in new_nodes(tree, stubs) {
            for feature in &node.provides {
                if !feature.is_path() {
                    continue;
                }
                match owners.get(feature.as_str()) {
                    Some(&owner) if owner != index => {
                        conflicts.push((owner, feature.as_str().to_string()));
                        conflicts.push((index, feature.as_str().to_string()));
                    }
                    _ => {
                        owners.insert(feature.as_str().to_string(), index);
                    }
                }
            }
        }

        for (index, path) in conflicts {
            push_break(tree, index, BreakKind::FileConflict, path);
        }
    }

    fn check_feature_regressions(&self, tree: &mut ResolvedTree, stubs: &HashSet<NodeIndex>) {
        let mut provided_versions: HashMap<String, pkgtx_types::Version> = HashMap::new();
        for (_, node) in new_nodes(tree, stubs) {
            let Some(version) = &node.version else { continue };
            for feature in &node.provides {
                provided_versions
                    .entry(feature.as_str().to_string())
                    .and_modify(|existing| {
                        if *version > *existing {
                            *existing = version.clone();
                        }
                    })
                    .or_insert_with(|| version.clone());
            }
        }

        let mut regressions: Vec<(NodeIndex, String)> = Vec::new();
        for (index, node) in tree.arena.iter() {
            for dependency in &node.depends {
                let Some(required) = &dependency.version else { continue };
                let Some(child) = tree.arena.get(dependency.child) else { continue };
                let Some(child_name) = &child.name else { continue };
                let feature = Feature::from(child_name.clone());
                if let Some(best) = provided_versions.get(feature.as_str()) {
                    if !pkgtx_types::version_satisfies(best, dependency.sense, required) {
                        regressions.push((index, feature.as_str().to_string()));
                    }
                }
            }
        }

        for (index, feature) in regressions {
            push_break(tree, index, BreakKind::FeatureMissing, feature);
        }
    }

    /// Check 2: every file a new package provides is checked against
    /// `LPS.query(Owns, f)`. An installed owner that is itself being
    /// replaced by something in the tree is fine as long as the replacement
    /// still provides `f`; an installed owner absent from the tree entirely
    /// is a straight file conflict (§4.5 point 2).
    fn check_installed_conflicts(&self, tree: &mut ResolvedTree, stubs: &HashSet<NodeIndex>, lps: &dyn LocalPackageSystem, root: &Path) -> Result<(), SolveError> {
        let mut file_conflicts: Vec<(NodeIndex, String)> = Vec::new();
        let mut vanishing: Vec<(NodeIndex, String)> = Vec::new();

        for (index, node) in new_nodes(tree, stubs) {
            for feature in &node.provides {
                if !feature.is_path() {
                    continue;
                }
                for owner in lps.query(root, &Criterion::Owns(feature.as_str().to_string()))? {
                    let Some(owner_name) = &owner.name else { continue };
                    match upgrader_of(tree, owner_name) {
                        Some((upgrader_index, upgrader)) => {
                            let still_provided = upgrader.provides.iter().any(|f| f.as_str() == feature.as_str());
                            if !still_provided {
                                vanishing.push((upgrader_index, feature.as_str().to_string()));
                            }
                        }
                        None => file_conflicts.push((index, feature.as_str().to_string())),
                    }
                }
            }
        }

        for (index, path) in file_conflicts {
            push_break(tree, index, BreakKind::FileConflict, path);
        }
        for (index, feature) in vanishing {
            push_break(tree, index, BreakKind::FeatureMissing, feature);
        }
        Ok(())
    }

    /// Check 3: for every package `P` that replaces an installed `P'`, any
    /// feature `P'` provided that `P` does not is checked against
    /// `LPS.query(Requires, f)`, excluding requirers that are themselves
    /// being upgraded in this tree. A non-empty result means `P` breaks
    /// those installed requirers (§4.5 point 3).
    fn check_feature_consistency(&self, tree: &mut ResolvedTree, lps: &dyn LocalPackageSystem, root: &Path) -> Result<(), SolveError> {
        let upgraded_names: HashSet<String> = tree
            .arena
            .iter()
            .flat_map(|(_, node)| node.modifies.iter().map(|m| m.replaced_name.as_str().to_string()))
            .collect();

        let mut breaks: Vec<(NodeIndex, String)> = Vec::new();
        for (index, node) in tree.arena.iter() {
            if node.modifies.is_empty() {
                continue;
            }
            let dropped_features: Vec<String> = node
                .modifies
                .iter()
                .filter_map(|modifies| tree.arena.get(modifies.replaced))
                .flat_map(|replaced| &replaced.provides)
                .map(|f| f.as_str().to_string())
                .filter(|f| !node.provides.iter().any(|p| p.as_str() == f))
                .collect();

            for feature in dropped_features {
                let requirers = lps.query(root, &Criterion::Requires(feature.clone()))?;
                let still_breaking = requirers
                    .iter()
                    .filter_map(|r| r.name.as_ref())
                    .any(|name| !upgraded_names.contains(name.as_str()));
                if still_breaking {
                    breaks.push((index, feature));
                }
            }
        }

        for (index, feature) in breaks {
            push_break(tree, index, BreakKind::FeatureMissing, feature);
        }
        Ok(())
    }
}

/// Nodes in `tree` that are part of this transaction's new packages, i.e.
/// not a stub standing in for an already-installed package being replaced.
fn new_nodes<'a>(tree: &'a ResolvedTree, stubs: &'a HashSet<NodeIndex>) -> impl Iterator<Item = (NodeIndex, &'a pkgtx_types::PackageRef)> {
    tree.arena.iter().filter(move |(index, _)| !stubs.contains(index))
}

fn stub_indices(tree: &ResolvedTree) -> HashSet<NodeIndex> {
    tree.arena.iter().flat_map(|(_, node)| node.modifies.iter().map(|m| m.replaced)).collect()
}

fn upgrader_of<'a>(tree: &'a ResolvedTree, name: &pkgtx_types::Name) -> Option<(NodeIndex, &'a pkgtx_types::PackageRef)> {
    tree.arena.iter().find(|(_, node)| node.modifies.iter().any(|m| &m.replaced_name == name))
}

fn push_break(tree: &mut ResolvedTree, index: NodeIndex, kind: BreakKind, offending: String) {
    if let Some(node) = tree.get_mut(index) {
        node.breaks.push(BreakRecord { kind, broken: index, offending });
        if !node.status.is_terminal_error() {
            node.status = Status::BreaksDependency;
        }
    }
}

#[cfg(test)]
mod tests {
    use pkgtx_local::FileLps;
    use pkgtx_types::{make_ref, Dependency, ModStatus, ModifiesEntry, Name, Sense, Version};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn detects_a_file_conflict_between_two_packages() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut tree = ResolvedTree::new();
        let mut a = make_ref(Some(Name::new("a")?), Some(Version::new("1.0")?), None, None, None);
        a.provides.push(Feature::new("/usr/bin/tool")?);
        a.toplevel = true;
        let mut b = make_ref(Some(Name::new("b")?), Some(Version::new("1.0")?), None, None, None);
        b.provides.push(Feature::new("/usr/bin/tool")?);
        b.toplevel = true;

        let a_idx = tree.arena.push(a);
        let b_idx = tree.arena.push(b);
        tree.roots = vec![a_idx, b_idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, dir.path())?;

        let a_node = tree.get(a_idx).ok_or("missing a")?;
        assert!(!a_node.breaks.is_empty());
        Ok(())
    }

    #[test]
    fn detects_a_feature_regression() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut tree = ResolvedTree::new();
        let provider = make_ref(Some(Name::new("libfoo")?), Some(Version::new("1.0")?), None, None, None);
        let provider_idx = tree.arena.push(provider);

        let mut consumer = make_ref(Some(Name::new("app")?), Some(Version::new("1.0")?), None, None, None);
        consumer.toplevel = true;
        consumer.depends.push(Dependency {
            child: provider_idx,
            sense: Sense::Ge,
            version: Some(Version::new("2.0")?),
        });
        let consumer_idx = tree.arena.push(consumer);
        tree.roots = vec![consumer_idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, dir.path())?;

        let consumer_node = tree.get(consumer_idx).ok_or("missing consumer")?;
        assert!(!consumer_node.breaks.is_empty());
        Ok(())
    }

    #[test]
    fn no_conflicts_in_a_clean_tree() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut tree = ResolvedTree::new();
        let mut only = make_ref(Some(Name::new("app")?), Some(Version::new("1.0")?), None, None, None);
        only.toplevel = true;
        let idx = tree.arena.push(only);
        tree.roots = vec![idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, dir.path())?;

        assert!(tree.get(idx).ok_or("missing node")?.breaks.is_empty());
        Ok(())
    }

    #[test]
    fn upgrading_in_place_is_not_a_self_conflict() -> TestResult {
        // A package that still provides the same path it always did, now
        // represented as both an installed stub and its own replacement,
        // must not be flagged as conflicting with itself (§4.5 point 1
        // applies only to two distinct *new* packages).
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut tree = ResolvedTree::new();

        let mut installed_stub = make_ref(Some(Name::new("app")?), Some(Version::new("1.0")?), None, None, None);
        installed_stub.provides.push(Feature::new("/usr/bin/app")?);
        let stub_idx = tree.arena.push(installed_stub);

        let mut upgraded = make_ref(Some(Name::new("app")?), Some(Version::new("2.0")?), None, None, None);
        upgraded.provides.push(Feature::new("/usr/bin/app")?);
        upgraded.toplevel = true;
        upgraded.modifies.push(ModifiesEntry {
            replaced: stub_idx,
            replaced_name: Name::new("app")?,
            replaced_version: Version::new("1.0")?,
            mod_status: ModStatus::Upgraded,
        });
        let upgraded_idx = tree.arena.push(upgraded);
        tree.roots = vec![upgraded_idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, dir.path())?;

        assert!(tree.get(upgraded_idx).ok_or("missing node")?.breaks.is_empty());
        Ok(())
    }

    #[test]
    fn file_owned_by_an_installed_package_not_in_the_tree_conflicts() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("root");
        let lps = FileLps::new();
        let installed = make_ref(Some(Name::new("owner")?), Some(Version::new("1.0")?), None, None, None);
        lps.install_batch(&root, &[installed_providing(&installed, "/usr/bin/clash")?], pkgtx_local::InstallFlags::empty())?;

        let mut tree = ResolvedTree::new();
        let mut newcomer = make_ref(Some(Name::new("newcomer")?), Some(Version::new("1.0")?), None, None, None);
        newcomer.provides.push(Feature::new("/usr/bin/clash")?);
        newcomer.toplevel = true;
        let idx = tree.arena.push(newcomer);
        tree.roots = vec![idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, &root)?;

        assert!(!tree.get(idx).ok_or("missing node")?.breaks.is_empty());
        Ok(())
    }

    #[test]
    fn a_conflict_between_non_toplevel_siblings_fails_their_toplevels() -> TestResult {
        // Two roots each pull in a dependency, and those two dependencies
        // (not the roots themselves) are the ones that actually conflict.
        // Both toplevels must end up failing (§4.5 check 1 "fail both
        // toplevels"), even though neither root's own status was ever
        // touched by `push_break`.
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut tree = ResolvedTree::new();

        let mut dep_a = make_ref(Some(Name::new("plugin-a")?), Some(Version::new("1.0")?), None, None, None);
        dep_a.provides.push(Feature::new("/usr/lib/shared.so")?);
        let dep_a_idx = tree.arena.push(dep_a);

        let mut dep_b = make_ref(Some(Name::new("plugin-b")?), Some(Version::new("1.0")?), None, None, None);
        dep_b.provides.push(Feature::new("/usr/lib/shared.so")?);
        let dep_b_idx = tree.arena.push(dep_b);

        let mut root_a = make_ref(Some(Name::new("app-a")?), Some(Version::new("1.0")?), None, None, None);
        root_a.toplevel = true;
        root_a.depends.push(Dependency {
            child: dep_a_idx,
            sense: Sense::Any,
            version: None,
        });
        let root_a_idx = tree.arena.push(root_a);

        let mut root_b = make_ref(Some(Name::new("app-b")?), Some(Version::new("1.0")?), None, None, None);
        root_b.toplevel = true;
        root_b.depends.push(Dependency {
            child: dep_b_idx,
            sense: Sense::Any,
            version: None,
        });
        let root_b_idx = tree.arena.push(root_b);

        tree.roots = vec![root_a_idx, root_b_idx];

        ConflictAnalyzer::new().check(&mut tree, &lps, dir.path())?;

        let dep_a_node = tree.get(dep_a_idx).ok_or("missing dep_a")?;
        let dep_b_node = tree.get(dep_b_idx).ok_or("missing dep_b")?;
        assert!(!dep_a_node.breaks.is_empty());
        assert!(!dep_b_node.breaks.is_empty());
        assert_eq!(dep_a_node.status, Status::BreaksDependency);
        assert_eq!(dep_b_node.status, Status::BreaksDependency);

        assert_eq!(tree.failed_roots().count(), 2);
        let root_a_node = tree.get(root_a_idx).ok_or("missing root_a")?;
        let root_b_node = tree.get(root_b_idx).ok_or("missing root_b")?;
        assert_eq!(root_a_node.status, Status::DependencyFail);
        assert_eq!(root_b_node.status, Status::DependencyFail);
        Ok(())
    }

    fn installed_providing(base: &pkgtx_types::PackageRef, path: &str) -> Result<pkgtx_types::PackageRef, pkgtx_types::Error> {
        let mut owner = base.clone();
        owner.provides.push(Feature::new(path)?);
        Ok(owner)
    }
}
