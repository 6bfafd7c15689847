//! Migration driver.
//!
//! Replays a [`Forest`] against a tracker in parent-before-child order.
//! Each node ends in exactly one [`Outcome`]; a failed node's subtree is
//! skipped while its siblings carry on.

use super::mapper::{People, RecordMapper};
use crate::models::{BuildIssue, Forest, IssueKey, IssueType, ItemId, NodeIndex, RemoteMapping};
use crate::tracker::TrackerClient;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Outcome code of an item left out of the forest by a reference cycle.
pub const CYCLE_CODE: &str = "cycle";

/// Mutable state of one run: the remote mapping and a user lookup cache.
#[derive(Debug, Default)]
pub struct RunContext {
    mapping: RemoteMapping,
    /// Ids created by this run, as opposed to seeded entries.
    created: HashSet<ItemId>,
    users: HashMap<String, Option<String>>,
}

impl RunContext {
    /// Creates a context with an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with a previous run's mapping.
    #[must_use]
    pub fn with_mapping(mapping: RemoteMapping) -> Self {
        Self {
            mapping,
            created: HashSet::new(),
            users: HashMap::new(),
        }
    }

    /// Item id → issue key entries recorded so far.
    #[must_use]
    pub const fn mapping(&self) -> &RemoteMapping {
        &self.mapping
    }

    /// Consumes the context, returning the mapping.
    #[must_use]
    pub fn into_mapping(self) -> RemoteMapping {
        self.mapping
    }
}

/// How a node ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Created in this run.
    Created(IssueKey),
    /// Present in the seeded mapping; not created again.
    AlreadyMapped(IssueKey),
    /// Could not be created.
    Failed {
        /// Error code (see [`Error::code`]).
        code: &'static str,
        /// Error message.
        reason: String,
    },
    /// Not attempted because an ancestor has no issue key.
    Skipped {
        /// The ancestor whose failure blocked this node.
        blocked_by: ItemId,
    },
}

/// Outcome of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    /// Item id.
    pub item_id: ItemId,
    /// Item title.
    pub title: String,
    /// Destination issue type.
    pub issue_type: IssueType,
    /// Result.
    pub outcome: Outcome,
}

/// Per-node outcomes of a run, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Outcomes in traversal order.
    pub outcomes: Vec<NodeOutcome>,
}

impl MigrationReport {
    /// Nodes created in this run.
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Created(_)))
    }

    /// Nodes found in the seeded mapping.
    #[must_use]
    pub fn already_mapped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyMapped(_)))
    }

    /// Nodes that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Nodes skipped below a failure.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    /// True when every node was created or already mapped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Failed nodes.
    pub fn failures(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }

    /// Outcome of an item, if it was visited.
    #[must_use]
    pub fn outcome_of(&self, id: &ItemId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.item_id == id)
            .map(|o| &o.outcome)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// Logs totals and every failure.
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.outcomes.len(),
            created = self.created(),
            already_mapped = self.already_mapped(),
            failed = self.failed(),
            skipped = self.skipped(),
            "Migration finished"
        );
        for failure in self.failures() {
            if let Outcome::Failed { code, reason } = &failure.outcome {
                tracing::warn!(
                    item_id = %failure.item_id,
                    title = %failure.title,
                    code = *code,
                    reason = %reason,
                    "Item not migrated"
                );
            }
        }
    }
}

/// Drives creation of a forest against a tracker.
pub struct MigrationDriver<C: TrackerClient> {
    client: C,
    mapper: RecordMapper,
    transitions: bool,
}

impl<C: TrackerClient> MigrationDriver<C> {
    /// Creates a driver. Status transitions are on by default.
    #[must_use]
    pub const fn new(client: C, mapper: RecordMapper) -> Self {
        Self {
            client,
            mapper,
            transitions: true,
        }
    }

    /// Enables or disables status transitions after creation.
    #[must_use]
    pub const fn with_transitions(mut self, enabled: bool) -> Self {
        self.transitions = enabled;
        self
    }

    /// Visits every node once, creating what is not mapped yet.
    ///
    /// Items the forest excluded as cycle members are reported as failed
    /// with code [`CYCLE_CODE`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] before any remote call if the forest
    /// does not fit the destination hierarchy. Per-node failures are recorded
    /// in the report instead.
    pub fn run(&self, forest: &Forest, ctx: &mut RunContext) -> Result<MigrationReport> {
        let types = self.mapper.destination_types(forest)?;
        let mut report = MigrationReport::default();
        // Root failure blocking each node's subtree.
        let mut blocked: Vec<Option<ItemId>> = vec![None; forest.len()];

        for index in forest.traversal_order() {
            let Some(node) = forest.node(index) else {
                continue;
            };
            let item = &node.item;
            let issue_type = types[index];

            let outcome = match parent_key(forest, index, &ctx.mapping, &blocked) {
                Err(blocked_by) => {
                    tracing::warn!(
                        item_id = %item.id,
                        title = %item.title,
                        blocked_by = %blocked_by,
                        "Skipping item below a failed parent"
                    );
                    Outcome::Skipped { blocked_by }
                },
                Ok(parent_key) => self.visit(forest, index, issue_type, parent_key.as_ref(), ctx),
            };

            match &outcome {
                Outcome::Failed { .. } => blocked[index] = Some(item.id.clone()),
                Outcome::Skipped { blocked_by } => blocked[index] = Some(blocked_by.clone()),
                Outcome::Created(_) | Outcome::AlreadyMapped(_) => {},
            }
            report.outcomes.push(NodeOutcome {
                item_id: item.id.clone(),
                title: item.title.clone(),
                issue_type,
                outcome,
            });
        }

        for issue in forest.issues() {
            if let BuildIssue::Cycle {
                item,
                title,
                issue_type,
            } = issue
            {
                tracing::error!(
                    item_id = %item,
                    title = %title,
                    code = CYCLE_CODE,
                    "Item only reachable through a reference cycle; not migrated"
                );
                report.outcomes.push(NodeOutcome {
                    item_id: item.clone(),
                    title: title.clone(),
                    issue_type: *issue_type,
                    outcome: Outcome::Failed {
                        code: CYCLE_CODE,
                        reason: "only reachable through a reference cycle".to_string(),
                    },
                });
            }
        }

        Ok(report)
    }

    fn visit(
        &self,
        forest: &Forest,
        index: NodeIndex,
        issue_type: IssueType,
        parent_key: Option<&IssueKey>,
        ctx: &mut RunContext,
    ) -> Outcome {
        let Some(node) = forest.node(index) else {
            return Outcome::Failed {
                code: "invalid_input",
                reason: format!("unknown node {index}"),
            };
        };
        let item = &node.item;

        if !node.dangling.is_empty() {
            let err = Error::DanglingReference {
                item: item.id.to_string(),
                reference: node
                    .dangling
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            return failed(item.id.as_str(), &item.title, &err);
        }

        if let Some(key) = ctx.mapping.get(&item.id) {
            if ctx.created.contains(&item.id) {
                let err = Error::InvalidInput(format!(
                    "item id '{}' was already used by another item in this run ({key})",
                    item.id
                ));
                return failed(item.id.as_str(), &item.title, &err);
            }
            tracing::info!(
                item_id = %item.id,
                title = %item.title,
                issue_key = %key,
                "Already migrated, reusing key"
            );
            return Outcome::AlreadyMapped(key.clone());
        }

        let people = People {
            assignee: self.resolve_user(ctx, item.assignee.as_deref()),
            reporter: self.resolve_user(ctx, item.reporter.as_deref()),
        };
        let request = self.mapper.map(item, issue_type, parent_key, &people);

        let key = match self
            .client
            .create_issue(&request)
            .and_then(|key| ctx.mapping.insert(item.id.clone(), key.clone()).map(|()| key))
        {
            Ok(key) => key,
            Err(err) => return failed(item.id.as_str(), &item.title, &err),
        };
        ctx.created.insert(item.id.clone());

        tracing::info!(
            item_id = %item.id,
            title = %item.title,
            issue_type = %issue_type,
            issue_key = %key,
            parent = parent_key.map(IssueKey::as_str),
            "Created issue"
        );

        if self.transitions {
            if let Some(status) = item.status.as_deref() {
                self.apply_status(&key, status);
            }
        }

        Outcome::Created(key)
    }

    /// Moves a created issue to its status; problems are warnings.
    fn apply_status(&self, key: &IssueKey, status: &str) {
        match self.client.transition_issue(key, status) {
            Ok(true) => tracing::info!(issue_key = %key, status, "Issue transitioned"),
            Ok(false) => {
                tracing::warn!(issue_key = %key, status, "No transition leads to status");
            },
            Err(err) => {
                tracing::warn!(issue_key = %key, status, error = %err, "Status transition failed");
            },
        }
    }

    /// Resolves an identity to an account id, once per run.
    fn resolve_user(&self, ctx: &mut RunContext, identity: Option<&str>) -> Option<String> {
        let identity = identity?;
        if let Some(cached) = ctx.users.get(identity) {
            return cached.clone();
        }

        let account = match self.client.find_user(identity) {
            Ok(Some(account)) => Some(account),
            Ok(None) => {
                tracing::warn!(user = identity, "No tracker account found; field omitted");
                None
            },
            Err(err) => {
                tracing::warn!(user = identity, error = %err, "User lookup failed; field omitted");
                None
            },
        };
        ctx.users.insert(identity.to_string(), account.clone());
        account
    }
}

/// Key of the node's parent; `Err` names the failure that blocks it.
fn parent_key(
    forest: &Forest,
    index: NodeIndex,
    mapping: &RemoteMapping,
    blocked: &[Option<ItemId>],
) -> std::result::Result<Option<IssueKey>, ItemId> {
    let Some(parent) = forest.node(index).and_then(|n| n.parent) else {
        return Ok(None);
    };
    let Some(parent_node) = forest.node(parent) else {
        return Ok(None);
    };
    match mapping.get(&parent_node.item.id) {
        Some(key) => Ok(Some(key.clone())),
        None => Err(blocked[parent]
            .clone()
            .unwrap_or_else(|| parent_node.item.id.clone())),
    }
}

fn failed(item_id: &str, title: &str, err: &Error) -> Outcome {
    tracing::error!(
        item_id,
        title,
        code = err.code(),
        error = %err,
        "Failed to migrate item"
    );
    Outcome::Failed {
        code: err.code(),
        reason: err.to_string(),
    }
}
