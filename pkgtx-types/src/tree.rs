use std::fmt::{self, Display, Formatter};

use crate::arena::{Arena, NodeIndex};
use crate::package::{ref_readable_name, PackageRef};

/// A user-facing grouping of root packages (§3).
///
/// Input-only: a `Category` owns its root [`PackageRef`]s until it is handed
/// to the resolver, which takes ownership of them by moving them into its
/// arena. Never mutated after it is parsed from a catalog descriptor.
#[derive(Clone, Debug)]
pub struct Category {
    /// The category's display name.
    pub name: String,
    /// The roots belonging to this category, in catalog order.
    pub roots: Vec<PackageRef>,
}

impl Category {
    /// Creates a new, empty category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roots: Vec::new(),
        }
    }
}

/// The output of the resolver (§3, §4.4).
///
/// Exclusively owns every [`PackageRef`] it contains, in a single
/// [`Arena`]; dependency, modifies and breaks edges are [`NodeIndex`]
/// values that reference other nodes in the same arena (never pointers,
/// never reference counts — see `SPEC_FULL.md`'s note on the arena
/// redesign).
#[derive(Clone, Debug, Default)]
pub struct ResolvedTree {
    /// Every node reachable from this run's roots, in the order they were
    /// inserted.
    pub arena: Arena<PackageRef>,
    /// The toplevel roots, in the order the user (or category) requested
    /// them.
    pub roots: Vec<NodeIndex>,
}

impl ResolvedTree {
    /// Creates an empty tree.
    pub const fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
        }
    }

    /// Returns the node at `index`.
    pub fn get(&self, index: NodeIndex) -> Option<&PackageRef> {
        self.arena.get(index)
    }

    /// Returns the node at `index`, mutably.
    pub fn get_mut(&mut self, index: NodeIndex) -> Option<&mut PackageRef> {
        self.arena.get_mut(index)
    }

    /// Iterates over the toplevel roots as `(index, ref)` pairs.
    pub fn root_nodes(&self) -> impl Iterator<Item = (NodeIndex, &PackageRef)> {
        self.roots.iter().filter_map(move |&idx| self.arena.get(idx).map(|n| (idx, n)))
    }

    /// Iterates over the toplevel roots whose status is a terminal error
    /// (§8: "r is reported in the final failure list iff r's subtree ...
    /// contains at least one node with terminal-error status").
    pub fn failed_roots(&self) -> impl Iterator<Item = (NodeIndex, &PackageRef)> {
        self.root_nodes().filter(|(_, n)| n.status.is_terminal_error())
    }

    /// Iterates over the toplevel roots that are not failing.
    pub fn succeeded_roots(&self) -> impl Iterator<Item = (NodeIndex, &PackageRef)> {
        self.root_nodes().filter(|(_, n)| !n.status.is_terminal_error())
    }

    /// Renders the tree depth-first, starting from each root, as a
    /// human-readable debug dump (§9 "debug tree dump"): one line per node,
    /// indented by depth, showing name, version and status.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for &root in &self.roots {
            self.render_node(root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, index: NodeIndex, depth: usize, out: &mut String) {
        let Some(node) = self.arena.get(index) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let version = node.version.as_ref().map(|v| v.as_str().to_string()).unwrap_or_else(|| "?".to_string());
        out.push_str(&format!("{indent}{} {version} [{}]\n", ref_readable_name(node), node.status));
        for dep in &node.depends {
            self.render_node(dep.child, depth + 1, out);
        }
    }
}

impl Display for ResolvedTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_tree())
    }
}

#[cfg(test)]
mod tests {
    use crate::name::Name;
    use crate::package::make_ref;
    use crate::status::Status;
    use crate::version::Version;

    use super::*;

    #[test]
    fn failed_roots_reflects_terminal_error_status() {
        let mut tree = ResolvedTree::new();
        let mut ok = make_ref(Some(Name::new("app").unwrap()), Some(Version::new("1.0").unwrap()), None, None, None);
        ok.status = Status::Resolved;
        ok.toplevel = true;
        let mut bad = make_ref(Some(Name::new("broken").unwrap()), None, None, None, None);
        bad.status = Status::DependencyFail;
        bad.toplevel = true;

        let ok_idx = tree.arena.push(ok);
        let bad_idx = tree.arena.push(bad);
        tree.roots = vec![ok_idx, bad_idx];

        let failed: Vec<_> = tree.failed_roots().map(|(idx, _)| idx).collect();
        assert_eq!(failed, vec![bad_idx]);

        let succeeded: Vec<_> = tree.succeeded_roots().map(|(idx, _)| idx).collect();
        assert_eq!(succeeded, vec![ok_idx]);
    }

    #[test]
    fn render_tree_includes_dependency_lines() {
        let mut tree = ResolvedTree::new();
        let child = make_ref(Some(Name::new("libfoo").unwrap()), Some(Version::new("1.0").unwrap()), None, None, None);
        let child_idx = tree.arena.push(child);
        let mut parent = make_ref(Some(Name::new("app").unwrap()), Some(Version::new("2.0").unwrap()), None, None, None);
        parent.toplevel = true;
        parent.depends.push(crate::package::Dependency {
            child: child_idx,
            sense: crate::version::Sense::Ge,
            version: Some(Version::new("1.0").unwrap()),
        });
        let parent_idx = tree.arena.push(parent);
        tree.roots = vec![parent_idx];

        let rendered = tree.render_tree();
        assert!(rendered.contains("app"));
        assert!(rendered.contains("libfoo"));
    }
}
