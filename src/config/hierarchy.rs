//! Destination hierarchy rules.

use crate::models::IssueType;
use crate::{Error, Result};

/// Issue type names as the destination project spells them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTypeNames {
    /// Epic type name.
    pub epic: String,
    /// Story type name.
    pub story: String,
    /// Task type name.
    pub task: String,
    /// Bug type name.
    pub bug: String,
    /// Subtask type name.
    pub subtask: String,
}

impl Default for IssueTypeNames {
    fn default() -> Self {
        Self {
            epic: "Epic".to_string(),
            story: "Story".to_string(),
            task: "Task".to_string(),
            bug: "Bug".to_string(),
            subtask: "Sub-task".to_string(),
        }
    }
}

impl IssueTypeNames {
    /// Destination name for a type.
    #[must_use]
    pub fn name(&self, issue_type: IssueType) -> &str {
        match issue_type {
            IssueType::Epic => &self.epic,
            IssueType::Story => &self.story,
            IssueType::Task => &self.task,
            IssueType::Bug => &self.bug,
            IssueType::Subtask => &self.subtask,
        }
    }
}

/// How a story/task/bug points at its epic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EpicLink {
    /// The standard `parent` field (team-managed projects).
    #[default]
    Parent,
    /// A custom "Epic Link" field, e.g. `customfield_10014`.
    Field(String),
}

/// Which parent/child shapes the destination accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRules {
    /// Issue type names.
    pub names: IssueTypeNames,
    /// Epic link style for depth-1 issues.
    pub epic_link: EpicLink,
    /// Types allowed to own subtasks.
    pub subtask_parents: Vec<IssueType>,
    /// Custom field receiving story points, if any.
    pub story_points_field: Option<String>,
}

impl Default for HierarchyRules {
    fn default() -> Self {
        Self {
            names: IssueTypeNames::default(),
            epic_link: EpicLink::Parent,
            subtask_parents: vec![IssueType::Story, IssueType::Task, IssueType::Bug],
            story_points_field: None,
        }
    }
}

impl HierarchyRules {
    /// Deepest level the destination can represent (epic = 0, subtask = 2).
    pub const MAX_DEPTH: usize = 2;

    /// Destination type of a node at `depth` whose source type is `source`.
    ///
    /// `parent` is the destination type of the node's parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the destination cannot hold the
    /// node: too deep, an epic below the root, or a subtask under a parent
    /// type the rules forbid.
    pub fn destination_type(
        &self,
        depth: usize,
        source: IssueType,
        parent: Option<IssueType>,
    ) -> Result<IssueType> {
        match depth {
            0 => Ok(IssueType::Epic),
            1 => match source {
                IssueType::Epic | IssueType::Subtask => Err(Error::Configuration(format!(
                    "a {source} cannot be placed directly under an epic"
                ))),
                other => Ok(other),
            },
            2 => {
                let parent = parent.unwrap_or(IssueType::Epic);
                if self.subtask_parents.contains(&parent) {
                    Ok(IssueType::Subtask)
                } else {
                    Err(Error::Configuration(format!(
                        "destination does not allow subtasks under a {parent}"
                    )))
                }
            },
            _ => Err(Error::Configuration(format!(
                "hierarchy depth {depth} exceeds the destination maximum of {} (epic > issue > subtask)",
                Self::MAX_DEPTH
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_types_by_depth() {
        let rules = HierarchyRules::default();
        assert_eq!(
            rules.destination_type(0, IssueType::Task, None).unwrap(),
            IssueType::Epic
        );
        assert_eq!(
            rules
                .destination_type(1, IssueType::Story, Some(IssueType::Epic))
                .unwrap(),
            IssueType::Story
        );
        assert_eq!(
            rules
                .destination_type(2, IssueType::Task, Some(IssueType::Story))
                .unwrap(),
            IssueType::Subtask
        );
    }

    #[test]
    fn test_too_deep_is_configuration_error() {
        let rules = HierarchyRules::default();
        let err = rules
            .destination_type(3, IssueType::Task, Some(IssueType::Subtask))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_forbidden_subtask_parent() {
        let rules = HierarchyRules {
            subtask_parents: vec![IssueType::Task],
            ..HierarchyRules::default()
        };
        let err = rules
            .destination_type(2, IssueType::Task, Some(IssueType::Story))
            .unwrap_err();
        assert!(err.to_string().contains("subtasks under a story"));
    }

    #[test]
    fn test_type_names() {
        let names = IssueTypeNames::default();
        assert_eq!(names.name(IssueType::Subtask), "Sub-task");
        assert_eq!(names.name(IssueType::Epic), "Epic");
    }
}
