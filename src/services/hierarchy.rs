//! Links parsed records into the hierarchy forest.

use crate::models::{
    BuildIssue, ChildRef, EpicRecord, ExportSnapshot, Forest, Item, NodeIndex, normalize_name,
};
use std::collections::{HashMap, VecDeque};

/// Assembles an [`ExportSnapshot`] into a [`Forest`].
///
/// Within each epic, child references resolve by id first and by normalized
/// name second. The first item to claim a child keeps it; later claims are
/// recorded as [`BuildIssue::MultipleParents`]. Unclaimed items hang directly
/// off the epic. Items only reachable through a reference cycle are left out
/// and recorded as [`BuildIssue::Cycle`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchyBuilder;

impl HierarchyBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the forest. Linking problems are kept on the forest, never fatal.
    #[must_use]
    pub fn build(&self, snapshot: ExportSnapshot) -> Forest {
        let mut forest = Forest::new();
        for record in snapshot.epics {
            link_epic(&mut forest, record);
        }
        tracing::debug!(
            roots = forest.roots().len(),
            nodes = forest.len(),
            issues = forest.issues().len(),
            "Built hierarchy forest"
        );
        forest
    }
}

/// Lookup of an epic's items by id and by normalized title.
struct ItemIndex {
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl ItemIndex {
    fn new(items: &[Item]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            by_id.entry(item.id.as_str().to_string()).or_insert(i);
            by_name.entry(normalize_name(&item.title)).or_insert(i);
        }
        Self { by_id, by_name }
    }

    fn resolve(&self, reference: &ChildRef) -> Option<usize> {
        reference
            .id
            .as_deref()
            .and_then(|id| self.by_id.get(id))
            .or_else(|| self.by_name.get(&normalize_name(&reference.name)))
            .copied()
    }
}

fn link_epic(forest: &mut Forest, record: EpicRecord) {
    let EpicRecord { epic, items } = record;
    let index = ItemIndex::new(&items);

    let mut owner: Vec<Option<usize>> = vec![None; items.len()];
    let mut claimed: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut dangling: Vec<Vec<ChildRef>> = vec![Vec::new(); items.len()];

    for (parent, item) in items.iter().enumerate() {
        for reference in &item.children {
            let Some(child) = index.resolve(reference) else {
                dangling[parent].push(reference.clone());
                continue;
            };
            match owner[child] {
                _ if child == parent => {
                    tracing::debug!(item_id = %item.id, "Ignoring self reference");
                },
                Some(existing) if existing == parent => {},
                Some(existing) => forest.record_issue(BuildIssue::MultipleParents {
                    child: items[child].id.clone(),
                    kept: items[existing].id.clone(),
                    ignored: item.id.clone(),
                }),
                None => {
                    owner[child] = Some(parent);
                    claimed[parent].push(child);
                },
            }
        }
    }

    // Epic-level references only need to resolve; every unclaimed item
    // already belongs to the epic.
    let epic_dangling: Vec<ChildRef> = epic
        .children
        .iter()
        .filter(|reference| index.resolve(reference).is_none())
        .cloned()
        .collect();

    let root = forest.add_root(epic);
    forest.mark_dangling(root, epic_dangling);

    let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
    let mut queue: VecDeque<(usize, NodeIndex)> = VecDeque::new();
    for i in (0..owner.len()).filter(|&i| owner[i].is_none()) {
        if let Some(node) = attach(forest, &mut slots, &mut dangling, i, root) {
            queue.push_back((i, node));
        }
    }
    while let Some((i, node)) = queue.pop_front() {
        for &child in &claimed[i] {
            if let Some(child_node) = attach(forest, &mut slots, &mut dangling, child, node) {
                queue.push_back((child, child_node));
            }
        }
    }

    for item in slots.into_iter().flatten() {
        forest.record_issue(BuildIssue::Cycle {
            item: item.id,
            title: item.title,
            issue_type: item.issue_type,
        });
    }
}

/// Moves item `i` under `parent`, once.
fn attach(
    forest: &mut Forest,
    slots: &mut [Option<Item>],
    dangling: &mut [Vec<ChildRef>],
    i: usize,
    parent: NodeIndex,
) -> Option<NodeIndex> {
    let item = slots[i].take()?;
    let node = forest.add_child(parent, item)?;
    forest.mark_dangling(node, std::mem::take(&mut dangling[i]));
    Some(node)
}
