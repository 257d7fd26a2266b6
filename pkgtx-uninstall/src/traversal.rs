use std::collections::{HashSet, VecDeque};
use std::path::Path;

use pkgtx_events::{Event, EventBus};
use pkgtx_local::{Criterion, LocalPackageSystem};
use pkgtx_types::{make_ref, Arena, BreakKind, BreakRecord, Feature, Name, Status};

use crate::error::UninstallError;
use crate::plan::{UninstallFailure, UninstallPlan};

/// Resolves the removal of `requested` into a final removal set, or a list
/// of roots whose removal was refused (§4.6).
///
/// Runs the upward traversal first (breakage propagation: does removing this
/// root break something installed outside the requested set?), then the
/// downward traversal for every root that survives it (safe-orphan removal:
/// which of a surviving root's own dependencies are now needed by nothing
/// else?). The final removal set is `roots ∪ orphans \ failures`, exactly as
/// §4.6 specifies.
pub fn resolve_uninstall(
    lps: &dyn LocalPackageSystem,
    events: &mut EventBus,
    root: &Path,
    requested: Vec<Name>,
) -> Result<UninstallPlan, UninstallError> {
    if requested.is_empty() {
        return Err(UninstallError::EmptyRoots);
    }

    let requested_set: HashSet<Name> = requested.iter().cloned().collect();
    let mut failures = Vec::new();
    let mut surviving = Vec::new();

    for candidate in &requested {
        let broken = upward_breakage(lps, root, candidate, &requested_set)?;
        if broken.is_empty() {
            surviving.push(candidate.clone());
        } else {
            log::warn!("refusing to remove '{candidate}': would break {} installed package(s)", broken.len());
            report_failure(events, candidate, &broken);
            failures.push(UninstallFailure {
                root: candidate.clone(),
                broken,
            });
        }
    }

    let removals = downward_orphans(lps, root, &surviving)?;

    Ok(UninstallPlan { removals, failures })
}

/// Upward traversal (§4.6): starting from `candidate`, repeatedly asks which
/// installed packages require the current working set, stopping when no new
/// requirer outside `requested_set` is found. Returns every such requirer,
/// i.e. everything that would break if `candidate` (and the rest of
/// `requested_set`) were removed.
fn upward_breakage(lps: &dyn LocalPackageSystem, root: &Path, candidate: &Name, requested_set: &HashSet<Name>) -> Result<Vec<Name>, UninstallError> {
    let mut visited: HashSet<Name> = HashSet::from([candidate.clone()]);
    let mut frontier: VecDeque<Name> = VecDeque::from([candidate.clone()]);
    let mut broken = Vec::new();

    while let Some(current) = frontier.pop_front() {
        let requirers = lps.query(root, &Criterion::Requires(current.as_str().to_string()))?;
        for requirer in requirers {
            let Some(name) = requirer.name else { continue };
            if requested_set.contains(&name) || !visited.insert(name.clone()) {
                continue;
            }
            broken.push(name.clone());
            frontier.push_back(name);
        }
    }

    Ok(broken)
}

/// Downward traversal (§4.6): for every surviving root, walks its own
/// dependencies and adds each one to the removal set iff every installed
/// requirer of it (by name *and* by any feature it provides — see
/// `DESIGN.md`'s Open Question decision) is already in the removal set,
/// transitively. Computes the safe-orphan set alongside the roots
/// themselves.
fn downward_orphans(lps: &dyn LocalPackageSystem, root: &Path, surviving: &[Name]) -> Result<Vec<Name>, UninstallError> {
    let mut removal_set: HashSet<Name> = surviving.iter().cloned().collect();
    let mut removals: Vec<Name> = surviving.to_vec();
    let mut queue: VecDeque<Name> = VecDeque::new();

    for candidate_root in surviving {
        for dependency in lps.requires(root, candidate_root)? {
            if let Ok(name) = Name::new(dependency.as_str()) {
                queue.push_back(name);
            }
        }
    }

    while let Some(candidate) = queue.pop_front() {
        if removal_set.contains(&candidate) {
            continue;
        }
        if is_safe_to_remove(lps, root, &candidate, &removal_set)? {
            removal_set.insert(candidate.clone());
            removals.push(candidate.clone());
            for dependency in lps.requires(root, &candidate)? {
                if let Ok(name) = Name::new(dependency.as_str()) {
                    queue.push_back(name);
                }
            }
        }
    }

    Ok(removals)
}

/// Returns true iff every installed requirer of `candidate` — whether it
/// requires it by name or by one of the features `candidate` provides — is
/// already in `removal_set`.
fn is_safe_to_remove(lps: &dyn LocalPackageSystem, root: &Path, candidate: &Name, removal_set: &HashSet<Name>) -> Result<bool, UninstallError> {
    let mut requirer_names: HashSet<Name> = HashSet::new();
    for requirer in lps.query(root, &Criterion::Requires(candidate.as_str().to_string()))? {
        if let Some(name) = requirer.name {
            requirer_names.insert(name);
        }
    }

    let provides: Vec<Feature> = lps
        .query(root, &Criterion::Matches(candidate.clone()))?
        .into_iter()
        .next()
        .map(|reference| reference.provides)
        .unwrap_or_default();
    for feature in provides {
        for requirer in lps.query(root, &Criterion::Requires(feature.as_str().to_string()))? {
            if let Some(name) = requirer.name {
                requirer_names.insert(name);
            }
        }
    }

    Ok(requirer_names.iter().all(|name| removal_set.contains(name)))
}

/// Emits `UninstallFailed` for a root whose removal was refused, building a
/// throwaway single-node arena just so the event can carry proper
/// [`BreakRecord`]s (§4.8): the uninstall traverser has no resolved tree of
/// its own to host them in.
fn report_failure(events: &mut EventBus, candidate: &Name, broken: &[Name]) {
    let index = Arena::<()>::new().push(());
    let mut node = make_ref(Some(candidate.clone()), None, None, None, None);
    node.status = Status::BreaksDependency;
    node.breaks = broken
        .iter()
        .map(|name| BreakRecord {
            kind: BreakKind::FeatureMissing,
            broken: index,
            offending: name.as_str().to_string(),
        })
        .collect();
    events.emit(Event::UninstallFailed {
        reference: &node,
        breaks: &node.breaks,
    });
}

#[cfg(test)]
mod tests {
    use pkgtx_local::FileLps;
    use testresult::TestResult;

    use super::*;

    fn install(lps: &FileLps, dir: &Path, name: &str, version: &str, requires: &[&str]) -> TestResult {
        use pkgtx_local::InstallFlags;
        let mut reference = make_ref(Some(Name::new(name)?), Some(pkgtx_types::Version::new(version)?), None, None, None);
        reference.provides = vec![Feature::new(name)?];
        lps.install_batch(dir, std::slice::from_ref(&reference), InstallFlags::empty())?;
        // install_batch always records an empty `requires` list (it has no
        // access to the resolved tree's dependency edges); write the record
        // directly here so tests can exercise the downward/upward traversal
        // against packages that actually require something.
        let record = pkgtx_local::InstalledRecord {
            name: Name::new(name)?,
            version: pkgtx_types::Version::new(version)?,
            provides: vec![Feature::new(name)?],
            requires: requires.iter().map(|r| Feature::new(*r).unwrap()).collect(),
            files: Vec::new(),
        };
        std::fs::write(dir.join("var/lib/pkgtx/installed").join(name), pkgtx_local::write_record(&record))?;
        Ok(())
    }

    #[test]
    fn removing_an_unneeded_leaf_succeeds() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        install(&lps, dir.path(), "standalone", "1.0", &[])?;

        let mut events = EventBus::new();
        let plan = resolve_uninstall(&lps, &mut events, dir.path(), vec![Name::new("standalone")?])?;

        assert!(plan.is_complete_success());
        assert_eq!(plan.removals, vec![Name::new("standalone")?]);
        Ok(())
    }

    #[test]
    fn removing_a_package_something_else_needs_fails() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        install(&lps, dir.path(), "libfoo", "1.0", &[])?;
        install(&lps, dir.path(), "consumer", "1.0", &["libfoo"])?;

        let mut events = EventBus::new();
        let plan = resolve_uninstall(&lps, &mut events, dir.path(), vec![Name::new("libfoo")?])?;

        assert!(!plan.is_complete_success());
        assert_eq!(plan.failures[0].broken, vec![Name::new("consumer")?]);
        assert!(plan.removals.is_empty());
        Ok(())
    }

    #[test]
    fn removing_both_requester_and_dependency_together_succeeds() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        install(&lps, dir.path(), "libfoo", "1.0", &[])?;
        install(&lps, dir.path(), "consumer", "1.0", &["libfoo"])?;

        let mut events = EventBus::new();
        let plan = resolve_uninstall(
            &lps,
            &mut events,
            dir.path(),
            vec![Name::new("libfoo")?, Name::new("consumer")?],
        )?;

        assert!(plan.is_complete_success());
        assert_eq!(plan.removals.len(), 2);
        Ok(())
    }

    #[test]
    fn downward_pass_orphans_a_dependency_nothing_else_needs() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        install(&lps, dir.path(), "libfoo", "1.0", &[])?;
        install(&lps, dir.path(), "app", "1.0", &["libfoo"])?;

        let mut events = EventBus::new();
        let plan = resolve_uninstall(&lps, &mut events, dir.path(), vec![Name::new("app")?])?;

        assert!(plan.is_complete_success());
        assert!(plan.removals.contains(&Name::new("libfoo")?));
        assert!(plan.removals.contains(&Name::new("app")?));
        Ok(())
    }

    #[test]
    fn downward_pass_keeps_a_dependency_something_else_still_needs() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        install(&lps, dir.path(), "libfoo", "1.0", &[])?;
        install(&lps, dir.path(), "app", "1.0", &["libfoo"])?;
        install(&lps, dir.path(), "other-consumer", "1.0", &["libfoo"])?;

        let mut events = EventBus::new();
        let plan = resolve_uninstall(&lps, &mut events, dir.path(), vec![Name::new("app")?])?;

        assert!(plan.is_complete_success());
        assert_eq!(plan.removals, vec![Name::new("app")?]);
        Ok(())
    }

    #[test]
    fn empty_roots_is_rejected() -> TestResult {
        let dir = tempfile::tempdir()?;
        let lps = FileLps::new();
        let mut events = EventBus::new();
        let result = resolve_uninstall(&lps, &mut events, dir.path(), Vec::new());
        assert!(result.is_err());
        Ok(())
    }
}
