//! Exported items and their identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Trailing ` <hexid>` suffix the exporter appends to page and row names.
static HEX_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s([a-f0-9]{16,})$").ok());

/// Identifier of an exported item.
///
/// Taken from the export's `ID` column when present, otherwise from the
/// hexadecimal suffix of the file name, otherwise a slug of the title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives an id from an exported name, preferring its hex suffix.
    #[must_use]
    pub fn derive(name: &str) -> Self {
        extract_hex_id(name).map_or_else(|| Self(slugify(&clean_title(name))), Self)
    }

    /// Like [`ItemId::derive`], but a title slug is prefixed with `scope`.
    ///
    /// Exporter hex ids are unique on their own; slugs only within an epic.
    #[must_use]
    pub fn derive_within(scope: &Self, name: &str) -> Self {
        extract_hex_id(name).map_or_else(
            || Self(format!("{}/{}", scope.0, slugify(&clean_title(name)))),
            Self,
        )
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issue key assigned by the tracker (e.g. `PROJ-42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    /// Wraps a tracker-assigned key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of an item, in source and destination terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Top-level grouping item.
    Epic,
    /// User story.
    Story,
    /// Plain task.
    Task,
    /// Defect.
    Bug,
    /// Child of a story, task or bug.
    Subtask,
}

impl IssueType {
    /// Normalizes the export's free-form `Type` column.
    ///
    /// Anything not recognized as a story or bug is a task.
    #[must_use]
    pub fn from_source(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "user story" | "story" => Self::Story,
            "bug" | "bugs" => Self::Bug,
            _ => Self::Task,
        }
    }

    /// Returns the canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Subtask => "subtask",
        }
    }

    /// Parses a canonical name as written in configuration files.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "epic" => Some(Self::Epic),
            "story" => Some(Self::Story),
            "task" => Some(Self::Task),
            "bug" => Some(Self::Bug),
            "subtask" | "sub-task" => Some(Self::Subtask),
            _ => None,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference from one item to a child item, as listed in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    /// Id parsed from the link target, if any.
    pub id: Option<String>,
    /// Display name of the child.
    pub name: String,
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} ({id})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One exported page: an epic, story, task, bug or subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier within the export.
    pub id: ItemId,
    /// Title, used as the issue summary.
    pub title: String,
    /// Long description, possibly empty.
    pub description: String,
    /// Assignee identity (email when the users table knows the name).
    pub assignee: Option<String>,
    /// Reporter identity.
    pub reporter: Option<String>,
    /// Destination priority name.
    pub priority: Option<String>,
    /// Destination status name, if one is mapped.
    pub status: Option<String>,
    /// Story point estimate.
    pub story_points: Option<f64>,
    /// Source type.
    pub issue_type: IssueType,
    /// Child references in listing order.
    pub children: Vec<ChildRef>,
}

impl Item {
    /// Creates an item with only the identifying fields set.
    #[must_use]
    pub fn new(id: ItemId, title: impl Into<String>, issue_type: IssueType) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            assignee: None,
            reporter: None,
            priority: None,
            status: None,
            story_points: None,
            issue_type,
            children: Vec::new(),
        }
    }

    /// Adds a child reference.
    #[must_use]
    pub fn with_child(mut self, id: Option<&str>, name: impl Into<String>) -> Self {
        self.children.push(ChildRef {
            id: id.map(String::from),
            name: name.into(),
        });
        self
    }

    /// Merges child references, skipping ones already listed.
    pub fn merge_children(&mut self, refs: impl IntoIterator<Item = ChildRef>) {
        for child in refs {
            let known = self.children.iter().any(|existing| match (&existing.id, &child.id) {
                (Some(a), Some(b)) => a == b,
                _ => normalize_name(&existing.name) == normalize_name(&child.name),
            });
            if !known {
                self.children.push(child);
            }
        }
    }
}

/// Removes the exporter's trailing ` <hexid>` from a name.
#[must_use]
pub fn clean_title(name: &str) -> String {
    match HEX_SUFFIX.as_ref() {
        Some(re) => re.replace(name.trim(), "").into_owned(),
        None => name.trim().to_string(),
    }
}

/// Extracts the exporter's trailing hex id from a name.
#[must_use]
pub fn extract_hex_id(name: &str) -> Option<String> {
    HEX_SUFFIX
        .as_ref()?
        .captures(name.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalizes a name for matching: colons removed, whitespace trimmed.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.replace(':', "").trim().to_string()
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
