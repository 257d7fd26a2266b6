use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pkgtx_events::{Event, EventBus};
use pkgtx_local::{Criterion, InstallFlags, LocalPackageSystem, PerPackageOutcome, UninstallFlags};
use pkgtx_types::{make_ref, ref_readable_name, Feature, Name, NodeIndex, PackageRef, ResolvedTree, Version};

use crate::error::TransactionError;
use crate::fetch::{fetch_with_retry, Fetcher};
use crate::journal::{Journal, JournalEntry, JournalOperation};

fn reachable_from(tree: &ResolvedTree, root: NodeIndex) -> HashSet<NodeIndex> {
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        if !visited.insert(index) {
            continue;
        }
        if let Some(node) = tree.get(index) {
            for dependency in &node.depends {
                stack.push(dependency.child);
            }
        }
    }
    visited
}

/// Downloads every non-local node reachable from `tree`'s roots, excluding a
/// whole root's subtree (but not its siblings) the first time one of its
/// nodes fails to download (§4.7 point 1).
///
/// Returns the set of node indices that remain eligible for the install
/// batch.
fn fetch_tree(fetcher: &dyn Fetcher, events: &mut EventBus, tree: &ResolvedTree) -> HashSet<NodeIndex> {
    let mut excluded_roots: HashSet<NodeIndex> = tree.failed_roots().map(|(index, _)| index).collect();
    let mut excluded_nodes: HashSet<NodeIndex> = HashSet::new();

    for &root_index in &tree.roots {
        if excluded_roots.contains(&root_index) {
            continue;
        }
        let subtree = reachable_from(tree, root_index);
        for &node_index in &subtree {
            if excluded_nodes.contains(&node_index) {
                continue;
            }
            let Some(node) = tree.get(node_index) else { continue };
            if node.filename.is_some() {
                continue;
            }
            if let Err(failure) = fetch_with_retry(fetcher, node) {
                let name = ref_readable_name(node);
                events.emit(Event::DownloadFailed {
                    name: &name,
                    reason: &failure.reason,
                });
                excluded_roots.insert(root_index);
                excluded_nodes.extend(subtree.iter().copied());
                break;
            }
        }
    }

    let mut eligible = HashSet::new();
    for &root_index in &tree.roots {
        if excluded_roots.contains(&root_index) {
            continue;
        }
        eligible.extend(reachable_from(tree, root_index));
    }
    eligible
}

fn outcomes_to_journal(outcomes: &[PerPackageOutcome], new_versions: &HashMap<String, Version>) -> Vec<JournalEntry> {
    let mut entries = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            PerPackageOutcome::Installed(name) => {
                let Ok(parsed) = Name::new(name.clone()) else { continue };
                entries.push(JournalEntry {
                    name: parsed,
                    operation: JournalOperation::Installed,
                    new_version: new_versions.get(name).cloned(),
                    previous_version: None,
                });
            }
            PerPackageOutcome::Upgraded(name, previous) => {
                let Ok(parsed) = Name::new(name.clone()) else { continue };
                entries.push(JournalEntry {
                    name: parsed,
                    operation: JournalOperation::Upgraded,
                    new_version: new_versions.get(name).cloned(),
                    previous_version: Some(previous.clone()),
                });
            }
            PerPackageOutcome::Removed(name) => {
                let Ok(parsed) = Name::new(name.clone()) else { continue };
                entries.push(JournalEntry {
                    name: parsed,
                    operation: JournalOperation::Removed,
                    new_version: None,
                    previous_version: new_versions.get(name).cloned(),
                });
            }
            PerPackageOutcome::Failed(name, reason) => {
                log::error!("LPS reported failure for '{name}': {reason}");
            }
        }
    }
    entries
}

/// Executes an install transaction against a resolved tree (§4.7).
///
/// Downloads every node not already local, offers cancellation at the
/// preflight checkpoint, hands the surviving batch to the LPS in one call,
/// and writes a journal recording what happened. Returns the path the
/// journal was written to.
///
/// Checksum verification (§4.7 point 2) is not performed: the resolver's
/// `PackageRef` carries no checksum field to verify against (see
/// `DESIGN.md`).
pub fn execute_install(
    fetcher: &dyn Fetcher,
    lps: &dyn LocalPackageSystem,
    events: &mut EventBus,
    root: &Path,
    transaction_dir: &Path,
    tree: &ResolvedTree,
    flags: InstallFlags,
) -> Result<PathBuf, TransactionError> {
    let eligible = fetch_tree(fetcher, events, tree);

    let mut seen = HashSet::new();
    let mut refs: Vec<PackageRef> = Vec::new();
    for &root_index in &tree.roots {
        if !eligible.contains(&root_index) {
            continue;
        }
        for index in reachable_from(tree, root_index) {
            if seen.insert(index) {
                if let Some(node) = tree.get(index) {
                    refs.push(node.clone());
                }
            }
        }
    }

    // Byte totals are not tracked on `PackageRef`; `total_bytes` is reported
    // as 0 rather than fabricated (see `DESIGN.md`).
    if !events.preflight_check(0, refs.len()) {
        return Err(TransactionError::Cancelled);
    }

    let new_versions: HashMap<String, Version> = refs
        .iter()
        .filter_map(|r| Some((r.name.as_ref()?.as_str().to_string(), r.version.clone()?)))
        .collect();

    let outcomes = lps.install_batch(root, &refs, flags)?;

    let count = outcomes.len();
    for (index, (reference, outcome)) in refs.iter().zip(&outcomes).enumerate() {
        let _ = outcome;
        events.emit(Event::InstallProgress {
            reference,
            index,
            count,
            pkg_done: 0,
            pkg_total: 0,
            total_done: index as u64,
            total_total: count as u64,
        });
    }

    let journal = Journal {
        entries: outcomes_to_journal(&outcomes, &new_versions),
    };
    let path = crate::journal::write_journal(transaction_dir, &journal)?;
    events.emit(Event::Done);
    Ok(path)
}

/// Executes an uninstall transaction against a removal set produced by
/// `pkgtx_uninstall::resolve_uninstall` (§4.7).
///
/// Captures each package's installed version before removing it, so the
/// journal can drive a revert.
pub fn execute_uninstall(
    lps: &dyn LocalPackageSystem,
    events: &mut EventBus,
    root: &Path,
    transaction_dir: &Path,
    removals: &[Name],
    flags: UninstallFlags,
) -> Result<PathBuf, TransactionError> {
    if !events.preflight_check(0, removals.len()) {
        return Err(TransactionError::Cancelled);
    }

    let mut previous_versions: HashMap<String, Version> = HashMap::new();
    for name in removals {
        if let Some(reference) = lps.query(root, &Criterion::Matches(name.clone()))?.into_iter().next() {
            if let Some(version) = reference.version {
                previous_versions.insert(name.as_str().to_string(), version);
            }
        }
    }

    let refs: Vec<PackageRef> = removals.iter().map(|name| make_ref(Some(name.clone()), None, None, None, None)).collect();
    let outcomes = lps.uninstall_batch(root, &refs, flags)?;

    let count = outcomes.len();
    for (index, reference) in refs.iter().enumerate() {
        events.emit(Event::InstallProgress {
            reference,
            index,
            count,
            pkg_done: 0,
            pkg_total: 0,
            total_done: index as u64,
            total_total: count as u64,
        });
    }

    let journal = Journal {
        entries: outcomes_to_journal(&outcomes, &previous_versions),
    };
    let path = crate::journal::write_journal(transaction_dir, &journal)?;
    events.emit(Event::Done);
    Ok(path)
}

/// Reads the journal at `journal_path` and feeds its inverse operations back
/// through TX as a normal transaction (§4.7 "Revert").
///
/// Reinstalling a previously-removed package refetches its file through
/// `fetcher` by name and version, since TX does not retain downloaded files
/// across runs unless the caller declined `delete_files`.
pub fn revert(
    fetcher: &dyn Fetcher,
    lps: &dyn LocalPackageSystem,
    events: &mut EventBus,
    root: &Path,
    transaction_dir: &Path,
    journal_path: &Path,
) -> Result<PathBuf, TransactionError> {
    let journal = crate::journal::read_journal(journal_path)?;
    let inverse = journal.inverse();

    let mut to_remove: Vec<Name> = Vec::new();
    let mut to_install: Vec<PackageRef> = Vec::new();
    for entry in &inverse.entries {
        match entry.operation {
            JournalOperation::Removed => to_remove.push(entry.name.clone()),
            JournalOperation::Installed | JournalOperation::Upgraded => {
                let mut reference = make_ref(Some(entry.name.clone()), entry.new_version.clone(), None, None, None);
                reference.provides = vec![Feature::from(entry.name.clone())];
                to_install.push(reference);
            }
        }
    }

    let mut entries = Vec::new();

    if !to_remove.is_empty() {
        let removal_path = execute_uninstall(lps, events, root, transaction_dir, &to_remove, UninstallFlags::empty())?;
        entries.extend(crate::journal::read_journal(&removal_path)?.entries);
    }

    if !to_install.is_empty() {
        for reference in &to_install {
            fetch_with_retry(fetcher, reference).map_err(|e| TransactionError::FetchFailed {
                name: ref_readable_name(reference),
                reason: e.reason,
            })?;
        }
        if !events.preflight_check(0, to_install.len()) {
            return Err(TransactionError::Cancelled);
        }
        let new_versions: HashMap<String, Version> = to_install
            .iter()
            .filter_map(|r| Some((r.name.as_ref()?.as_str().to_string(), r.version.clone()?)))
            .collect();
        let outcomes = lps.install_batch(root, &to_install, InstallFlags::UPGRADE | InstallFlags::DOWNGRADE)?;
        entries.extend(outcomes_to_journal(&outcomes, &new_versions));
    }

    let journal = Journal { entries };
    let path = crate::journal::write_journal(transaction_dir, &journal)?;
    events.emit(Event::Done);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use pkgtx_local::FileLps;
    use pkgtx_types::{make_ref, Status};
    use testresult::TestResult;

    use super::*;

    struct NoopFetcher;

    impl Fetcher for NoopFetcher {
        fn fetch(&self, _reference: &PackageRef) -> Result<PathBuf, crate::fetch::FetchError> {
            Ok(PathBuf::from("/tmp/fetched"))
        }
    }

    fn single_root_tree(name: &str, version: &str) -> ResolvedTree {
        let mut tree = ResolvedTree::new();
        let mut node = make_ref(Some(Name::new(name).unwrap()), Some(Version::new(version).unwrap()), None, None, None);
        node.toplevel = true;
        node.status = Status::Resolved;
        let index = tree.arena.push(node);
        tree.roots.push(index);
        tree
    }

    #[test]
    fn execute_install_writes_a_journal_and_applies_to_lps() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("root");
        let transactions = dir.path().join("transactions");
        let lps = FileLps::new();
        let mut events = EventBus::new();
        let fetcher = NoopFetcher;

        let tree = single_root_tree("app", "1.0");
        let journal_path = execute_install(&fetcher, &lps, &mut events, &root, &transactions, &tree, InstallFlags::empty())?;

        assert!(journal_path.exists());
        assert!(lps.is_installed(&root, &Name::new("app")?, None, pkgtx_types::Sense::Any)?);

        let journal = crate::journal::read_journal(&journal_path)?;
        assert_eq!(journal.entries.len(), 1);
        assert_eq!(journal.entries[0].operation, JournalOperation::Installed);
        Ok(())
    }

    #[test]
    fn execute_uninstall_captures_previous_version_in_journal() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("root");
        let transactions = dir.path().join("transactions");
        let lps = FileLps::new();
        let mut events = EventBus::new();
        let fetcher = NoopFetcher;

        let tree = single_root_tree("app", "1.0");
        execute_install(&fetcher, &lps, &mut events, &root, &transactions, &tree, InstallFlags::empty())?;

        let journal_path = execute_uninstall(&lps, &mut events, &root, &transactions, &[Name::new("app")?], UninstallFlags::empty())?;
        let journal = crate::journal::read_journal(&journal_path)?;
        assert_eq!(journal.entries[0].operation, JournalOperation::Removed);
        assert_eq!(journal.entries[0].previous_version, Some(Version::new("1.0")?));
        assert!(!lps.is_installed(&root, &Name::new("app")?, None, pkgtx_types::Sense::Any)?);
        Ok(())
    }

    #[test]
    fn revert_of_an_install_removes_the_package_again() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("root");
        let transactions = dir.path().join("transactions");
        let lps = FileLps::new();
        let mut events = EventBus::new();
        let fetcher = NoopFetcher;

        let tree = single_root_tree("app", "1.0");
        let journal_path = execute_install(&fetcher, &lps, &mut events, &root, &transactions, &tree, InstallFlags::empty())?;

        revert(&fetcher, &lps, &mut events, &root, &transactions, &journal_path)?;
        assert!(!lps.is_installed(&root, &Name::new("app")?, None, pkgtx_types::Sense::Any)?);
        Ok(())
    }

    struct CancelingObserver;

    impl pkgtx_events::Observer for CancelingObserver {
        fn notify(&mut self, _event: &Event<'_>) {}
        fn confirm_preflight(&mut self, _total_bytes: u64, _total_packages: usize) -> bool {
            false
        }
    }

    #[test]
    fn cancelling_at_preflight_performs_no_lps_mutation() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("root");
        let transactions = dir.path().join("transactions");
        let lps = FileLps::new();
        let mut events = EventBus::new();
        events.add_observer(Box::new(CancelingObserver));
        let fetcher = NoopFetcher;

        let tree = single_root_tree("app", "1.0");
        let result = execute_install(&fetcher, &lps, &mut events, &root, &transactions, &tree, InstallFlags::empty());

        assert!(result.is_err());
        assert!(!lps.is_installed(&root, &Name::new("app")?, None, pkgtx_types::Sense::Any)?);
        Ok(())
    }
}
