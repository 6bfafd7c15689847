//! Remote mapping from local item ids to tracker issue keys.

use super::item::{IssueKey, ItemId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Run-scoped table linking item ids to the issue keys the tracker assigned.
///
/// Entries are only ever added; an id keeps the first key it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteMapping {
    entries: BTreeMap<ItemId, IssueKey>,
}

impl RemoteMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the key assigned to an item.
    ///
    /// Re-recording the same key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the item already maps to a different key.
    pub fn insert(&mut self, id: ItemId, key: IssueKey) -> Result<()> {
        if let Some(existing) = self.entries.get(&id) {
            if existing == &key {
                return Ok(());
            }
            return Err(Error::InvalidInput(format!(
                "item '{id}' is already mapped to {existing}, refusing {key}"
            )));
        }
        self.entries.insert(id, key);
        Ok(())
    }

    /// Returns the key for an item.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&IssueKey> {
        self.entries.get(id)
    }

    /// Returns true if the item is mapped.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of mapped items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries ordered by item id.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &IssueKey)> {
        self.entries.iter()
    }

    /// Loads a mapping snapshot written by [`RemoteMapping::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed,
    /// since it is only ever named by configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read mapping {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("cannot parse mapping {}: {e}", path.display()))
        })
    }

    /// Writes the mapping as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_mapping".to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| Error::OperationFailed {
            operation: "write_mapping".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
    }
}
