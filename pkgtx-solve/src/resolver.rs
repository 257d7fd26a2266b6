use std::collections::{HashMap, VecDeque};
use std::path::Path;

use pkgtx_catalog::{CatalogClient, CatalogError, FilledRef};
use pkgtx_events::{Event, EventBus};
use pkgtx_local::{Criterion, LocalPackageSystem};
use pkgtx_types::{make_ref, Dependency, FillFlags, ModStatus, ModifiesEntry, Name, NodeIndex, PackageRef, ResolvedTree, Sense, Status, Version};

use crate::attribution::attribute_failures;
use crate::error::SolveError;
use crate::request::RequestedPackage;

struct PendingEntry {
    index: NodeIndex,
    /// Where the edge that caused this entry to be queued lives, as
    /// `(parent_index, position in parent's depends)` — `None` for a
    /// toplevel root, which has no inbound edge. Lets Pass B rewrite the
    /// edge in place on dedup instead of appending a second one and
    /// orphaning this entry's node (see `resolve_install`'s dedup branch).
    edge_ref: Option<(NodeIndex, usize)>,
    request: Option<RequestedPackage>,
    sense: Sense,
    version: Option<Version>,
}

struct PendingDependency {
    child_index: NodeIndex,
    sense: Sense,
    version: Option<Version>,
    name: Name,
}

/// Resolves `requested` into a fully-resolved (or partially-failed)
/// dependency tree (§4.4).
///
/// Runs the three-pass fixed-point loop (info fetch, dedup, satisfaction
/// pruning) until the work queue is empty, then attributes every subtree
/// failure back up to the toplevel root that caused it to be pulled in.
pub fn resolve_install(
    catalog: &dyn CatalogClient,
    lps: &dyn LocalPackageSystem,
    events: &mut EventBus,
    root: &Path,
    requested: Vec<RequestedPackage>,
) -> Result<ResolvedTree, SolveError> {
    if requested.is_empty() {
        return Err(SolveError::EmptyRoots);
    }

    let mut tree = ResolvedTree::new();
    let mut dedupe_map = HashMap::new();
    let mut installed_stub_cache = HashMap::new();
    let mut queue: VecDeque<PendingEntry> = VecDeque::new();
    // Keyed by name (local-file requests bypass it): two frontier nodes
    // naming the same package fold onto one CAT call here, before dedup
    // ever learns they share a `PackageId` (§4.4 "at-most-once information
    // fetch per identity"; §8 testable property).
    let mut fetch_cache: HashMap<Name, FilledRef> = HashMap::new();
    // Named roots, keyed by request name. A dependency on one of these is
    // already guaranteed to land in the same transaction, so Pass C prunes
    // it outright rather than asking the LPS (§8 Happy Path scenario 1).
    let mut root_names: HashMap<Name, NodeIndex> = HashMap::new();

    for request in requested {
        let mut node = make_ref(request.name.clone(), None, None, request.architecture.clone(), None);
        node.toplevel = true;
        node.filename = request.local_file.as_ref().map(|path| path.display().to_string());
        let index = tree.arena.push(node);
        tree.roots.push(index);
        if let Some(name) = &request.name {
            root_names.insert(name.clone(), index);
        }
        queue.push_back(PendingEntry {
            index,
            edge_ref: None,
            request: Some(request),
            sense: Sense::Any,
            version: None,
        });
    }

    while let Some(entry) = queue.pop_front() {
        // Pass A: info fetch.
        let filled = match fetch_info(catalog, entry.request.as_ref(), &mut fetch_cache) {
            Ok(filled) => filled,
            Err(err) => {
                log::warn!("failed to fetch package info: {err}");
                if let Some(node) = tree.get_mut(entry.index) {
                    node.status = catalog_error_to_status(&err);
                }
                continue;
            }
        };

        // Pass B: dedup. A second ref resolving to an id already seen folds
        // into the existing node instead of growing a duplicate subtree;
        // this is also what breaks a cyclic dependency from looping forever,
        // since the cycle's second visit dedupes against the first.
        if let Some(&existing) = dedupe_map.get(&filled.id) {
            if existing != entry.index {
                match entry.edge_ref {
                    Some((parent, position)) => rewrite_dependency_edge(&mut tree, parent, position, existing, events),
                    None => {
                        if let Some(slot) = tree.roots.iter_mut().find(|r| **r == entry.index) {
                            *slot = existing;
                        }
                    }
                }
                continue;
            }
        }
        dedupe_map.insert(filled.id.clone(), entry.index);

        apply_filled_ref(&mut tree, entry.index, &filled);
        record_modification(&mut tree, lps, root, entry.index, &filled, &mut installed_stub_cache)?;

        if tree.get(entry.index).map(PackageRef::is_source).unwrap_or(false) {
            if let Some(node) = tree.get_mut(entry.index) {
                node.status = Status::SourceNotSupported;
            }
            continue;
        }

        let self_name = tree.get(entry.index).and_then(|node| node.name.clone());
        let mut new_dependencies = Vec::new();
        for dep in &filled.depends {
            if self_name.as_ref() == Some(&dep.name) {
                continue; // self-dependency: trivially satisfied, ignore.
            }

            // Pass C: a dependency on a package that is itself one of the
            // requested roots is already guaranteed to install in this same
            // transaction, whatever the LPS currently reports (§4.4 Pass C,
            // §8 Happy Path scenario 1: "no surviving edges after Pass C").
            if let Some(&root_index) = root_names.get(&dep.name) {
                if root_index != entry.index {
                    continue;
                }
            }

            let mut satisfied = lps.is_installed(root, &dep.name, dep.version.as_ref(), dep.sense)?;
            if !satisfied && softcat_false_negative(lps, root, dep)? {
                satisfied = true;
                if let Some(node) = tree.get(entry.index) {
                    events.emit(Event::CompatibilityWorkaroundApplied {
                        child: node,
                        feature: dep.name.as_str(),
                    });
                }
            }
            if satisfied {
                continue;
            }

            let child_index = tree.arena.push(make_ref(Some(dep.name.clone()), None, None, None, None));
            new_dependencies.push(PendingDependency {
                child_index,
                sense: dep.sense,
                version: dep.version.clone(),
                name: dep.name.clone(),
            });
        }

        for dependency in new_dependencies {
            let edge = Dependency {
                child: dependency.child_index,
                sense: dependency.sense,
                version: dependency.version.clone(),
            };
            let mut position = None;
            if let Some(parent_ref) = tree.get_mut(entry.index) {
                parent_ref.depends.push(edge);
                position = Some(parent_ref.depends.len() - 1);
            }
            if let Some(parent_ref) = tree.get(entry.index) {
                if let Some(needed) = parent_ref.depends.last() {
                    events.emit(Event::DependencyCheck { parent: parent_ref, needed });
                }
            }
            queue.push_back(PendingEntry {
                index: dependency.child_index,
                edge_ref: position.map(|pos| (entry.index, pos)),
                request: Some(RequestedPackage::named(dependency.name)),
                sense: dependency.sense,
                version: dependency.version,
            });
        }

        if let Some(node) = tree.get_mut(entry.index) {
            node.status = Status::Resolved;
        }
    }

    attribute_failures(&mut tree);
    dedupe_roots(&mut tree);

    Ok(tree)
}

fn fetch_info(
    catalog: &dyn CatalogClient,
    request: Option<&RequestedPackage>,
    fetch_cache: &mut HashMap<Name, FilledRef>,
) -> Result<FilledRef, CatalogError> {
    let Some(request) = request else {
        return Err(CatalogError::BadResponse("pending entry carried no request".to_string()));
    };
    if let Some(path) = &request.local_file {
        return pkgtx_catalog::read_local_package_file(path);
    }
    let Some(name) = &request.name else {
        return Err(CatalogError::BadResponse("request named neither a package nor a local file".to_string()));
    };
    if let Some(cached) = fetch_cache.get(name) {
        return Ok(cached.clone());
    }
    let filled = catalog.get_info(name, request.architecture.as_deref())?;
    fetch_cache.insert(name.clone(), filled.clone());
    Ok(filled)
}

fn catalog_error_to_status(err: &CatalogError) -> Status {
    match err {
        CatalogError::NotFound(_) | CatalogError::Ambiguous(_) | CatalogError::NetworkError(_) | CatalogError::AuthRequired | CatalogError::LocalFileUnreadable { .. } => {
            Status::CannotOpen
        }
        CatalogError::BadResponse(_) => Status::Invalid,
    }
}

fn apply_filled_ref(tree: &mut ResolvedTree, index: NodeIndex, filled: &FilledRef) {
    let Some(node) = tree.get_mut(index) else {
        return;
    };
    node.id = Some(filled.id.clone());
    node.name = Some(filled.name.clone());
    node.version = Some(filled.version.clone());
    node.minor = filled.minor.clone();
    node.architecture = filled.architecture.clone();
    node.distribution = filled.distribution.clone();
    node.provides = filled.provides.clone();
    node.fill_flags.insert(FillFlags::NAME);
    node.fill_flags.insert(FillFlags::VERSION);
    node.fill_flags.insert(FillFlags::DEPS);
    node.fill_flags.insert(FillFlags::PROVIDES);
    node.status = Status::PartlyResolved;
}

/// Records, on `index`'s node, that installing it replaces an already
/// installed package of the same name (§4.4 "Modification status").
fn record_modification(
    tree: &mut ResolvedTree,
    lps: &dyn LocalPackageSystem,
    root: &Path,
    index: NodeIndex,
    filled: &FilledRef,
    cache: &mut HashMap<Name, NodeIndex>,
) -> Result<(), SolveError> {
    let Some((installed_index, installed_version)) = lookup_installed_stub(tree, lps, root, &filled.name, cache)? else {
        return Ok(());
    };

    let mod_status = match filled.version.cmp(&installed_version) {
        std::cmp::Ordering::Greater => ModStatus::Upgraded,
        std::cmp::Ordering::Less => ModStatus::Downgraded,
        std::cmp::Ordering::Equal => ModStatus::Unchanged,
    };

    if let Some(node) = tree.get_mut(index) {
        node.modifies.push(ModifiesEntry {
            replaced: installed_index,
            replaced_name: filled.name.clone(),
            replaced_version: installed_version,
            mod_status,
        });
    }
    Ok(())
}

fn lookup_installed_stub(
    tree: &mut ResolvedTree,
    lps: &dyn LocalPackageSystem,
    root: &Path,
    name: &Name,
    cache: &mut HashMap<Name, NodeIndex>,
) -> Result<Option<(NodeIndex, Version)>, SolveError> {
    if let Some(&index) = cache.get(name) {
        let version = tree.get(index).and_then(|node| node.version.clone());
        return Ok(version.map(|version| (index, version)));
    }

    let matches = lps.query(root, &Criterion::Matches(name.clone()))?;
    let Some(installed) = matches.into_iter().next() else {
        return Ok(None);
    };
    let Some(version) = installed.version.clone() else {
        return Ok(None);
    };

    let mut stub = installed;
    stub.status = Status::Resolved;
    let index = tree.arena.push(stub);
    cache.insert(name.clone(), index);
    Ok(Some((index, version)))
}

/// Rewrites the dependency edge at `parent.depends[position]` to point at
/// `canonical` instead of the duplicate node Pass A created for it. Pass B
/// dedup must rewrite in place rather than append a second edge: appending
/// would leave the original child node an orphan that no edge references,
/// while still sitting in `entry`'s now-abandoned subtree (§4.4 Pass B).
fn rewrite_dependency_edge(tree: &mut ResolvedTree, parent: NodeIndex, position: usize, canonical: NodeIndex, events: &mut EventBus) {
    if let Some(parent_ref) = tree.get_mut(parent) {
        if let Some(edge) = parent_ref.depends.get_mut(position) {
            edge.child = canonical;
        }
    }
    if let Some(parent_ref) = tree.get(parent) {
        if let Some(edge) = parent_ref.depends.get(position) {
            events.emit(Event::DependencyCheck { parent: parent_ref, needed: edge });
        }
    }
}

/// The softcat-bug workaround (§4.4 Pass C, `SPEC_FULL.md` Supplemented
/// Features): the original catalog tool sometimes reported an exact-version
/// (`=`) dependency that should have been a minimum-version (`>=`) one,
/// making a strictly newer installed package report as unsatisfied. If a
/// package of the right name is installed at or above the required version
/// and the declared sense was `Eq`, treat it as satisfied.
fn softcat_false_negative(lps: &dyn LocalPackageSystem, root: &Path, dep: &pkgtx_catalog::CatalogDependency) -> Result<bool, SolveError> {
    if dep.sense != Sense::Eq {
        return Ok(false);
    }
    let Some(required) = &dep.version else {
        return Ok(false);
    };
    Ok(lps.is_installed(root, &dep.name, Some(required), Sense::Ge)?)
}

fn dedupe_roots(tree: &mut ResolvedTree) {
    let mut seen = std::collections::HashSet::new();
    tree.roots.retain(|index| seen.insert(*index));
}
