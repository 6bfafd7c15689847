//! Maps forest nodes to create-issue requests.

use crate::config::{EpicLink, HierarchyRules};
use crate::models::{Forest, IssueKey, IssueType, Item};
use crate::tracker::{AccountRef, CreateIssueRequest, IssueFields, KeyRef, NameRef};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Tracker accounts resolved for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct People {
    /// Assignee account id.
    pub assignee: Option<String>,
    /// Reporter account id.
    pub reporter: Option<String>,
}

/// Translates items into the tracker's create-issue shape.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    project_key: String,
    rules: HierarchyRules,
}

impl RecordMapper {
    /// Creates a mapper for a project.
    #[must_use]
    pub fn new(project_key: impl Into<String>, rules: HierarchyRules) -> Self {
        Self {
            project_key: project_key.into(),
            rules,
        }
    }

    /// Hierarchy rules in use.
    #[must_use]
    pub const fn rules(&self) -> &HierarchyRules {
        &self.rules
    }

    /// Destination type of every node, indexed by node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] listing every node the destination
    /// hierarchy cannot hold.
    pub fn destination_types(&self, forest: &Forest) -> Result<Vec<IssueType>> {
        let mut types: Vec<Option<IssueType>> = vec![None; forest.len()];
        let mut problems = Vec::new();

        for index in forest.traversal_order() {
            let Some(node) = forest.node(index) else {
                continue;
            };
            let parent_type = node.parent.and_then(|p| types[p]);
            match self
                .rules
                .destination_type(node.depth, node.item.issue_type, parent_type)
            {
                Ok(issue_type) => types[index] = Some(issue_type),
                Err(e) => problems.push(format!(
                    "'{}' ({}): {}",
                    node.item.title,
                    node.item.id,
                    configuration_message(e)
                )),
            }
        }

        if !problems.is_empty() {
            return Err(Error::Configuration(format!(
                "{} item(s) do not fit the destination hierarchy: {}",
                problems.len(),
                problems.join("; ")
            )));
        }

        Ok(types.into_iter().map(|t| t.unwrap_or(IssueType::Task)).collect())
    }

    /// Checks the whole forest against the hierarchy rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any node cannot be placed.
    pub fn preflight(&self, forest: &Forest) -> Result<()> {
        self.destination_types(forest).map(|_| ())
    }

    /// Builds the create-issue request for one item.
    #[must_use]
    pub fn map(
        &self,
        item: &Item,
        issue_type: IssueType,
        parent: Option<&IssueKey>,
        people: &People,
    ) -> CreateIssueRequest {
        let type_name = self.rules.names.name(issue_type).to_string();
        let description = if item.description.trim().is_empty() {
            format!("{type_name} migrated from export")
        } else {
            item.description.clone()
        };

        let mut custom = BTreeMap::new();
        let mut parent_ref = None;
        if let Some(key) = parent {
            match (issue_type, &self.rules.epic_link) {
                (IssueType::Epic, _) => {},
                (IssueType::Subtask, _) | (_, EpicLink::Parent) => {
                    parent_ref = Some(KeyRef {
                        key: key.to_string(),
                    });
                },
                (_, EpicLink::Field(field)) => {
                    custom.insert(field.clone(), serde_json::Value::from(key.as_str()));
                },
            }
        }
        if let (Some(field), Some(points)) = (&self.rules.story_points_field, item.story_points) {
            custom.insert(field.clone(), serde_json::Value::from(points));
        }

        CreateIssueRequest {
            fields: IssueFields {
                project: KeyRef {
                    key: self.project_key.clone(),
                },
                summary: item.title.clone(),
                description,
                issuetype: NameRef { name: type_name },
                assignee: people.assignee.clone().map(|account_id| AccountRef { account_id }),
                reporter: people.reporter.clone().map(|account_id| AccountRef { account_id }),
                priority: item.priority.clone().map(|name| NameRef { name }),
                parent: parent_ref,
                custom,
            },
        }
    }
}

fn configuration_message(err: Error) -> String {
    match err {
        Error::Configuration(msg) => msg,
        other => other.to_string(),
    }
}
