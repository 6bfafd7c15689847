//! CSV task listings.
//!
//! Column headers are matched to roles through the configured
//! [`FieldMapping`]; unmapped columns are ignored.

use super::lookups::Lookups;
use super::page::parse_child_refs;
use crate::config::{FieldMapping, FieldRole, PriorityTable};
use crate::models::{IssueType, Item, ItemId, clean_title};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Maps field roles to CSV column indices.
#[derive(Debug, Default)]
struct ColumnMap {
    columns: BTreeMap<FieldRole, usize>,
}

impl ColumnMap {
    /// Creates a column map from CSV headers.
    fn from_headers(headers: &csv::StringRecord, fields: &FieldMapping) -> Result<Self> {
        let headers: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();

        let mut map = Self::default();
        for (role, header) in fields.iter() {
            let wanted = header.to_lowercase();
            if let Some(index) = headers.iter().position(|h| *h == wanted) {
                map.columns.insert(role, index);
            }
        }

        for role in FieldRole::REQUIRED {
            if !map.columns.contains_key(&role) {
                return Err(Error::Structural(format!(
                    "missing '{}' column (role '{}')",
                    fields.header(role).unwrap_or_default(),
                    role.key()
                )));
            }
        }

        Ok(map)
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, role: FieldRole) -> Option<&'r str> {
        self.columns
            .get(&role)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn has(&self, role: FieldRole) -> bool {
        self.columns.contains_key(&role)
    }
}

/// Reads one task listing into items, in row order.
///
/// Rows without a title are skipped with a warning. Ids derived from a
/// title are scoped under `scope`, the owning epic's id.
///
/// # Errors
///
/// Returns [`Error::Structural`] if the file cannot be read, its header row
/// lacks a required column, or a row is malformed.
pub fn read_listing(
    path: &Path,
    scope: &ItemId,
    fields: &FieldMapping,
    priorities: &PriorityTable,
    lookups: &Lookups,
) -> Result<Vec<Item>> {
    let text = super::read_text(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::Structural(format!("{}: unreadable header row: {e}", path.display())))?
        .clone();
    let columns = ColumnMap::from_headers(&headers, fields)
        .map_err(|e| match e {
            Error::Structural(msg) => Error::Structural(format!("{}: {msg}", path.display())),
            other => other,
        })?;

    let mut items = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            Error::Structural(format!("{}: malformed row {}: {e}", path.display(), row + 1))
        })?;

        let Some(raw_title) = columns.get(&record, FieldRole::Title) else {
            tracing::warn!(
                file = %path.display(),
                row = row + 1,
                "Skipping listing row without a title"
            );
            continue;
        };

        let item = parse_row(&columns, &record, scope, raw_title, priorities, lookups);
        tracing::debug!(
            item_id = %item.id,
            title = %item.title,
            issue_type = %item.issue_type,
            "Listed item"
        );
        items.push(item);
    }

    Ok(items)
}

fn parse_row(
    columns: &ColumnMap,
    record: &csv::StringRecord,
    scope: &ItemId,
    raw_title: &str,
    priorities: &PriorityTable,
    lookups: &Lookups,
) -> Item {
    let field = |role| columns.get(record, role);

    let id = field(FieldRole::Id).map_or_else(|| ItemId::derive_within(scope, raw_title), ItemId::new);
    let issue_type = IssueType::from_source(field(FieldRole::Type).unwrap_or_default());
    let mut item = Item::new(id, clean_title(raw_title), issue_type);

    item.description = field(FieldRole::ShortDescription)
        .unwrap_or_default()
        .to_string();
    item.assignee = field(FieldRole::Assignee).and_then(|name| lookups.user(name));
    item.reporter = field(FieldRole::Reporter).and_then(|name| lookups.user(name));
    if columns.has(FieldRole::Priority) {
        item.priority = Some(priorities.normalize(field(FieldRole::Priority).unwrap_or_default()));
    }
    if columns.has(FieldRole::Status) {
        item.status = lookups.status(field(FieldRole::Status).unwrap_or_default());
    }
    item.story_points = field(FieldRole::StoryPoints).and_then(|raw| {
        raw.parse::<f64>()
            .map_err(|_| {
                tracing::warn!(title = %item.title, value = raw, "Ignoring non-numeric story points");
            })
            .ok()
    });
    if let Some(children) = field(FieldRole::ChildItems) {
        item.children = parse_child_refs(children);
    }

    item
}
