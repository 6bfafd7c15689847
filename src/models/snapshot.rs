//! Parsed export, before hierarchy linking.

use super::item::Item;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One epic and the flat list of items its task listings contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicRecord {
    /// The epic itself.
    pub epic: Item,
    /// Items listed under the epic, in listing order.
    pub items: Vec<Item>,
}

/// Everything the export reader produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    /// Epics in file-name order.
    pub epics: Vec<EpicRecord>,
}

impl ExportSnapshot {
    /// Total number of items, epics included.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.epics.iter().map(|e| 1 + e.items.len()).sum()
    }

    /// Writes the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_snapshot".to_string(),
            cause: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_snapshot_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        std::fs::write(path, json).map_err(|e| Error::OperationFailed {
            operation: "write_snapshot".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
    }
}
