//! Hierarchy forest: epics at the roots, stories/tasks and subtasks below.

use super::item::{ChildRef, IssueType, Item, ItemId};
use std::collections::VecDeque;

/// Index of a node inside a [`Forest`].
pub type NodeIndex = usize;

/// A node of the forest.
#[derive(Debug, Clone)]
pub struct Node {
    /// The exported item.
    pub item: Item,
    /// Parent node; `None` for epics.
    pub parent: Option<NodeIndex>,
    /// Children in listing order.
    pub children: Vec<NodeIndex>,
    /// Distance from the root (epics are at depth 0).
    pub depth: usize,
    /// Child references of this item that matched no parsed record.
    pub dangling: Vec<ChildRef>,
}

/// A problem found while linking the export into a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildIssue {
    /// An item lists a child that matches no parsed record.
    Dangling {
        /// Item listing the child.
        item: ItemId,
        /// The unresolved reference.
        reference: ChildRef,
    },
    /// An item is listed as a child by more than one parent.
    MultipleParents {
        /// The child listed twice.
        child: ItemId,
        /// Parent that keeps the child.
        kept: ItemId,
        /// Parent whose reference was ignored.
        ignored: ItemId,
    },
    /// An item is unreachable from its epic because of a reference cycle.
    Cycle {
        /// The excluded item.
        item: ItemId,
        /// Its title.
        title: String,
        /// Its source type.
        issue_type: IssueType,
    },
}

/// Rooted forest of items, stored as an arena.
///
/// Nodes can only be attached under an existing node, so every non-root
/// node has exactly one parent and the structure is acyclic.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
    roots: Vec<NodeIndex>,
    issues: Vec<BuildIssue>,
}

impl Forest {
    /// Creates an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root (epic) node.
    pub fn add_root(&mut self, item: Item) -> NodeIndex {
        let index = self.push(item, None, 0);
        self.roots.push(index);
        index
    }

    /// Adds a node under `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn add_child(&mut self, parent: NodeIndex, item: Item) -> Option<NodeIndex> {
        let depth = self.nodes.get(parent)?.depth + 1;
        let index = self.push(item, Some(parent), depth);
        self.nodes[parent].children.push(index);
        Some(index)
    }

    fn push(&mut self, item: Item, parent: Option<NodeIndex>, depth: usize) -> NodeIndex {
        self.nodes.push(Node {
            item,
            parent,
            children: Vec::new(),
            depth,
            dangling: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Records unresolved child references on a node.
    pub fn mark_dangling(&mut self, index: NodeIndex, refs: Vec<ChildRef>) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        for reference in refs {
            self.issues.push(BuildIssue::Dangling {
                item: node.item.id.clone(),
                reference: reference.clone(),
            });
            node.dangling.push(reference);
        }
    }

    /// Records a linking problem that does not belong to a single node.
    pub fn record_issue(&mut self, issue: BuildIssue) {
        self.issues.push(issue);
    }

    /// Returns a node by index.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Returns all nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the root indices.
    #[must_use]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Returns problems found while linking.
    #[must_use]
    pub fn issues(&self) -> &[BuildIssue] {
        &self.issues
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the forest has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds a node by item id.
    #[must_use]
    pub fn find(&self, id: &ItemId) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| &node.item.id == id)
    }

    /// Breadth-first order over all roots; every parent precedes its children.
    #[must_use]
    pub fn traversal_order(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<NodeIndex> = self.roots.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            order.push(index);
            queue.extend(self.nodes[index].children.iter().copied());
        }
        order
    }

    /// All descendants of a node, breadth-first, excluding the node itself.
    #[must_use]
    pub fn descendants(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(index) else {
            return out;
        };
        let mut queue: VecDeque<NodeIndex> = node.children.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            queue.extend(self.nodes[next].children.iter().copied());
        }
        out
    }
}
