//! Column-header to field-role mapping for task listings.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Semantic role of a task-listing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldRole {
    /// Item title (required).
    Title,
    /// Stable item id.
    Id,
    /// Assignee display name.
    Assignee,
    /// Reporter display name.
    Reporter,
    /// Source priority label.
    Priority,
    /// Source status label.
    Status,
    /// Source item type.
    Type,
    /// Child link list.
    ChildItems,
    /// One-line summary, used when the item page has no description.
    ShortDescription,
    /// Story point estimate.
    StoryPoints,
}

impl FieldRole {
    /// All roles in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Title,
        Self::Id,
        Self::Assignee,
        Self::Reporter,
        Self::Priority,
        Self::Status,
        Self::Type,
        Self::ChildItems,
        Self::ShortDescription,
        Self::StoryPoints,
    ];

    /// Roles a mapping must assign.
    pub const REQUIRED: [Self; 1] = [Self::Title];

    /// Configuration key of the role.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Id => "id",
            Self::Assignee => "assignee",
            Self::Reporter => "reporter",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Type => "type",
            Self::ChildItems => "child_items",
            Self::ShortDescription => "short_description",
            Self::StoryPoints => "story_points",
        }
    }

    /// Header text the exporter writes for the role.
    #[must_use]
    pub const fn default_header(self) -> &'static str {
        match self {
            Self::Title => "Task name",
            Self::Id => "ID",
            Self::Assignee => "Assignee",
            Self::Reporter => "Reported By",
            Self::Priority => "Priority",
            Self::Status => "Status",
            Self::Type => "Type",
            Self::ChildItems => "Child Tasks",
            Self::ShortDescription => "Short Description",
            Self::StoryPoints => "# Story Points",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.key() == key)
    }
}

/// Validated mapping from field roles to the column headers that carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    headers: BTreeMap<FieldRole, String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            headers: FieldRole::ALL
                .into_iter()
                .map(|role| (role, role.default_header().to_string()))
                .collect(),
        }
    }
}

impl FieldMapping {
    /// Builds a mapping from `role key → header` pairs, on top of the defaults.
    ///
    /// An empty header unassigns a role.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown role keys, a required role
    /// left unassigned, or two roles sharing one header.
    pub fn from_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut mapping = Self::default();
        for (key, header) in overrides {
            let role = FieldRole::from_key(key).ok_or_else(|| {
                Error::Configuration(format!("unknown field role '{key}' in [fields]"))
            })?;
            let header = header.trim();
            if header.is_empty() {
                mapping.headers.remove(&role);
            } else {
                mapping.headers.insert(role, header.to_string());
            }
        }
        mapping.validate()?;
        Ok(mapping)
    }

    /// Checks that required roles are assigned and headers are unique.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        for role in FieldRole::REQUIRED {
            if !self.headers.contains_key(&role) {
                return Err(Error::Configuration(format!(
                    "field mapping must assign a column to required role '{}'",
                    role.key()
                )));
            }
        }
        let mut seen: HashMap<String, FieldRole> = HashMap::new();
        for (role, header) in &self.headers {
            if let Some(other) = seen.insert(header.to_lowercase(), *role) {
                return Err(Error::Configuration(format!(
                    "column '{header}' is mapped to both '{}' and '{}'",
                    other.key(),
                    role.key()
                )));
            }
        }
        Ok(())
    }

    /// Header assigned to a role.
    #[must_use]
    pub fn header(&self, role: FieldRole) -> Option<&str> {
        self.headers.get(&role).map(String::as_str)
    }

    /// Iterates assigned roles and headers.
    pub fn iter(&self) -> impl Iterator<Item = (FieldRole, &str)> {
        self.headers.iter().map(|(role, header)| (*role, header.as_str()))
    }
}

/// Source priority label → tracker priority name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriorityTable {
    /// Explicit translations.
    #[serde(default = "default_priority_map")]
    pub map: HashMap<String, String>,
    /// Priority for empty or unknown labels.
    #[serde(default = "default_priority")]
    pub default: String,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            map: default_priority_map(),
            default: default_priority(),
        }
    }
}

impl PriorityTable {
    /// Translates a source priority label.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        self.map
            .get(raw.trim())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

fn default_priority_map() -> HashMap<String, String> {
    [
        ("P0-Blocker", "Highest"),
        ("P1-Critical", "High"),
        ("P2-High", "Medium"),
        ("P3-Normal", "Low"),
        ("P4-Minor", "Lowest"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

fn default_priority() -> String {
    "Medium".to_string()
}
