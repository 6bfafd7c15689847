//! Page files: a property block followed by a free-form description.
//!
//! ```text
//! **Created by:** Ada Lovelace
//! **Assignee:** Grace Hopper
//! **Child Tasks:** Write tests (Items/Write%20tests%2001234567....md)
//!
//! **Description:**
//! Everything below the marker is the description.
//! ```

use crate::Result;
use crate::models::ChildRef;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// `Key: value`, optionally bold on either side of the colon.
static PROPERTY_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\*{0,2}(.*?):\*{0,2}\s*(.*)$").ok());

/// `Name (path/to/Name%20<hexid>.md)`.
static CHILD_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([^(]+)\s?\(([^)]+)\.md\)").ok());

const BOLD_MARKER: &str = "**Description:**";
const PLAIN_MARKER: &str = "Description:";

/// Page properties the reader understands. Everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageProperty {
    /// `Created by`.
    CreatedBy,
    /// `Reported By`.
    ReportedBy,
    /// `Assignee`.
    Assignee,
    /// `Priority`.
    Priority,
    /// `Status`.
    Status,
    /// `Type`.
    Type,
    /// `Child Tasks`.
    ChildTasks,
}

impl PageProperty {
    fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "created by" => Some(Self::CreatedBy),
            "reported by" => Some(Self::ReportedBy),
            "assignee" => Some(Self::Assignee),
            "priority" => Some(Self::Priority),
            "status" => Some(Self::Status),
            "type" => Some(Self::Type),
            "child tasks" => Some(Self::ChildTasks),
            _ => None,
        }
    }
}

/// A parsed page file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    properties: BTreeMap<PageProperty, String>,
    /// Child references from the `Child Tasks` property.
    pub child_refs: Vec<ChildRef>,
    /// Description body.
    pub description: String,
}

impl Page {
    /// Parses page text.
    ///
    /// With a description marker, the lines above it are the property block
    /// and the text below is the description. Without one, the whole text is
    /// the description and properties are still picked from it.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let (head, description) = match split_description(text) {
            Some((head, body)) => (head, body.trim()),
            None => (text, text.trim()),
        };

        let mut page = Self {
            description: description.to_string(),
            ..Self::default()
        };

        let Some(re) = PROPERTY_LINE.as_ref() else {
            return page;
        };
        for line in head.lines() {
            let Some(caps) = re.captures(line.trim()) else {
                continue;
            };
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(property) = PageProperty::from_key(key.as_str()) else {
                continue;
            };
            if page.properties.contains_key(&property) {
                continue;
            }
            let value = value.as_str().trim().to_string();
            if property == PageProperty::ChildTasks {
                page.child_refs = parse_child_refs(&value);
            }
            page.properties.insert(property, value);
        }
        page
    }

    /// Reads and parses a page file.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the file cannot be read.
    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self::parse(&super::read_text(path)?))
    }

    /// Raw value of a property, if present and non-empty.
    #[must_use]
    pub fn property(&self, property: PageProperty) -> Option<&str> {
        self.properties
            .get(&property)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Reporter: `Created by`, falling back to `Reported By`.
    #[must_use]
    pub fn reporter(&self) -> Option<&str> {
        self.property(PageProperty::CreatedBy)
            .or_else(|| self.property(PageProperty::ReportedBy))
    }
}

/// Splits at the first description marker that starts a line (not the first line).
fn split_description(text: &str) -> Option<(&str, &str)> {
    for marker in [BOLD_MARKER, PLAIN_MARKER] {
        let found = text.match_indices(marker).find(|(pos, _)| {
            *pos > 0
                && text[..*pos].ends_with('\n')
                && (marker == BOLD_MARKER || text[pos + marker.len()..].starts_with(['\n', '\r']))
        });
        if let Some((pos, _)) = found {
            return Some((&text[..pos], &text[pos + marker.len()..]));
        }
    }
    None
}

/// Parses a `Child Tasks` link list.
///
/// The id is the last 32 characters of the link target when they are hex
/// digits; the name is URL-decoded for spaces and stripped of list separators.
#[must_use]
pub fn parse_child_refs(text: &str) -> Vec<ChildRef> {
    let Some(re) = CHILD_LINK.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let name = caps
                .get(1)?
                .as_str()
                .replace("%20", " ")
                .trim()
                .trim_start_matches([',', ' '])
                .trim()
                .to_string();
            if name.is_empty() {
                return None;
            }
            let target = caps.get(2)?.as_str();
            let tail: String = {
                let chars: Vec<char> = target.chars().collect();
                chars[chars.len().saturating_sub(32)..].iter().collect()
            };
            let id = (tail.len() == 32 && tail.chars().all(|c| c.is_ascii_hexdigit()))
                .then_some(tail);
            Some(ChildRef { id, name })
        })
        .collect()
}
