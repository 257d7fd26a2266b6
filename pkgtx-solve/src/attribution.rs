use std::collections::{HashMap, HashSet, VecDeque};

use pkgtx_types::{NodeIndex, ResolvedTree, Status};

/// Reconstructs parent pointers from a tree's `depends` edges by walking
/// outward from the roots (§4.4 "the resolver walks up parent pointers
/// until it reaches a toplevel").
///
/// Built fresh each time rather than carried on `ResolvedTree` itself: CA
/// (§4.5) mutates node statuses, never edges, so the tree's edges alone are
/// always enough to rebuild the same parent relationships the resolver saw.
pub(crate) fn build_parent_map(tree: &ResolvedTree) -> HashMap<NodeIndex, NodeIndex> {
    let mut parents = HashMap::new();
    let mut visited: HashSet<NodeIndex> = tree.roots.iter().copied().collect();
    let mut queue: VecDeque<NodeIndex> = tree.roots.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        let Some(node) = tree.get(current) else { continue };
        for dependency in &node.depends {
            if visited.insert(dependency.child) {
                parents.insert(dependency.child, current);
                queue.push_back(dependency.child);
            }
        }
    }

    parents
}

/// Walks every node with a terminal-error status up to its toplevel root
/// and marks that root `DependencyFail` (§4.4 "Failure attribution", §4.5's
/// closing paragraph, §3 Invariant 3).
///
/// Safe to call more than once on the same tree: a root already in a
/// terminal-error state is left untouched, so re-running this after CA
/// records new breaks only ever adds failures, never clears one.
pub(crate) fn attribute_failures(tree: &mut ResolvedTree) {
    let parents = build_parent_map(tree);

    let failing: Vec<NodeIndex> = tree
        .arena
        .indices()
        .filter(|&index| tree.get(index).map(|node| node.status.is_terminal_error()).unwrap_or(false))
        .collect();

    for node in failing {
        let mut current = node;
        while let Some(&parent) = parents.get(&current) {
            current = parent;
        }
        if let Some(root_ref) = tree.get_mut(current) {
            if !root_ref.status.is_terminal_error() {
                root_ref.status = Status::DependencyFail;
            }
        }
    }
}
