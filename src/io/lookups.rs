//! Optional `users.json` and `status.json` translation tables.

use crate::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

const USERS_FILE: &str = "users.json";
const STATUS_FILE: &str = "status.json";
const EMPTY_STATUS: &str = "backlog";

/// Person and status translation tables shipped next to the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookups {
    users: HashMap<String, String>,
    statuses: HashMap<String, String>,
}

impl Lookups {
    /// Builds lookups from in-memory tables.
    #[must_use]
    pub fn new(users: HashMap<String, String>, statuses: HashMap<String, String>) -> Self {
        let statuses = statuses
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self { users, statuses }
    }

    /// Loads whichever tables exist under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if a table exists but is not a JSON
    /// object of strings.
    pub fn load(root: &Path) -> Result<Self> {
        let users = load_table(&root.join(USERS_FILE))?;
        let statuses = load_table(&root.join(STATUS_FILE))?;
        tracing::debug!(
            users = users.len(),
            statuses = statuses.len(),
            "Loaded lookup tables"
        );
        Ok(Self::new(users, statuses))
    }

    /// Resolves a display name to an identity (email when known).
    ///
    /// Unknown names pass through unchanged; empty names are `None`.
    #[must_use]
    pub fn user(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.users.get(name).cloned().unwrap_or_else(|| name.to_string()))
    }

    /// Resolves a source status to a tracker status name.
    ///
    /// Matching is case-insensitive; an empty status means `backlog`.
    #[must_use]
    pub fn status(&self, raw: &str) -> Option<String> {
        let key = raw.trim().to_lowercase();
        let key = if key.is_empty() { EMPTY_STATUS } else { key.as_str() };
        self.statuses.get(key).cloned()
    }
}

fn load_table(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let text = super::read_text(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Structural(format!("{} is not a name table: {e}", path.display())))
}
