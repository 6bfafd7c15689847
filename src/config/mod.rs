//! Configuration management.
//!
//! Configuration is layered:
//!
//! 1. `.env` in the working directory (loaded into the process environment)
//! 2. A TOML file: `--config`, `TRACKER_MIGRATE_CONFIG`, `./tracker-migrate.toml`,
//!    or `<config dir>/tracker-migrate/config.toml`
//! 3. Environment overrides (`JIRA_SERVER_URL`, `JIRA_USERNAME`, `JIRA_TOKEN`,
//!    `JIRA_PROJECT_KEY`, `TRACKER_MIGRATE_*`)
//!
//! Credentials are never taken from CLI flags.

mod fields;
mod hierarchy;

pub use fields::{FieldMapping, FieldRole, PriorityTable};
pub use hierarchy::{EpicLink, HierarchyRules, IssueTypeNames};

use crate::models::IssueType;
use crate::observability::LogFormat;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration for a migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrateConfig {
    /// Destination tracker settings.
    pub tracker: TrackerSettings,
    /// Retry policy for transient tracker failures.
    pub retry: RetrySettings,
    /// Task-listing column mapping.
    pub fields: FieldMapping,
    /// Destination hierarchy rules.
    pub hierarchy: HierarchyRules,
    /// Priority translation table.
    pub priorities: PriorityTable,
    /// Run behavior.
    pub migration: MigrationSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Authentication scheme for the tracker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// Username + API token (Atlassian Cloud).
    #[default]
    Basic,
    /// Personal access token (Data Center).
    Bearer,
}

impl AuthScheme {
    /// Parses a scheme name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "bearer" | "pat" => Some(Self::Bearer),
            _ => None,
        }
    }
}

/// Destination tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Base URL, e.g. `https://example.atlassian.net`.
    pub server_url: Option<String>,
    /// Account name for basic auth.
    pub username: Option<String>,
    /// API token.
    pub api_token: Option<SecretString>,
    /// Project receiving the issues.
    pub project_key: Option<String>,
    /// Authentication scheme.
    pub auth: AuthScheme,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            username: None,
            api_token: None,
            project_key: None,
            auth: AuthScheme::Basic,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetrySettings {
    /// Delay before retry number `attempt` (1-based): `base_delay_ms * 2^(attempt - 1)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        self.base_delay_ms
            .saturating_mul(1 << (attempt - 1).min(10))
    }
}

/// Run behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Where to write the parsed export before any remote call.
    pub snapshot_path: Option<PathBuf>,
    /// Where to write the final remote mapping.
    pub mapping_path: Option<PathBuf>,
    /// Mapping from a previous run; mapped items are not created again.
    pub resume_mapping: Option<PathBuf>,
    /// Whether to move created issues to their mapped status.
    pub transition_status: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            snapshot_path: Some(PathBuf::from("epics_data.json")),
            mapping_path: None,
            resume_mapping: None,
            transition_status: true,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory receiving one log file per run.
    pub dir: PathBuf,
    /// Output format.
    pub format: LogFormat,
    /// Default filter directive when no env filter is set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Tracker section.
    pub tracker: Option<ConfigFileTracker>,
    /// Retry section.
    pub retry: Option<ConfigFileRetry>,
    /// Field role → column header overrides.
    pub fields: Option<HashMap<String, String>>,
    /// Hierarchy section.
    pub hierarchy: Option<ConfigFileHierarchy>,
    /// Priority table.
    pub priorities: Option<PriorityTable>,
    /// Migration section.
    pub migration: Option<ConfigFileMigration>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Tracker section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTracker {
    /// Server URL.
    pub server_url: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// API token.
    pub api_token: Option<String>,
    /// Project key.
    pub project_key: Option<String>,
    /// `basic` or `bearer`.
    pub auth: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Retry section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetry {
    /// Max retries.
    pub max_retries: Option<u32>,
    /// Base delay.
    pub base_delay_ms: Option<u64>,
}

/// Hierarchy section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHierarchy {
    /// Epic type name.
    pub epic_type: Option<String>,
    /// Story type name.
    pub story_type: Option<String>,
    /// Task type name.
    pub task_type: Option<String>,
    /// Bug type name.
    pub bug_type: Option<String>,
    /// Subtask type name.
    pub subtask_type: Option<String>,
    /// Custom epic link field; unset means the `parent` field.
    pub epic_link_field: Option<String>,
    /// Custom story points field.
    pub story_points_field: Option<String>,
    /// Types allowed to own subtasks.
    pub subtask_parents: Option<Vec<String>>,
}

/// Migration section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMigration {
    /// Snapshot path; empty string disables the snapshot.
    pub snapshot_path: Option<String>,
    /// Mapping output path.
    pub mapping_path: Option<String>,
    /// Mapping from a previous run.
    pub resume_mapping: Option<String>,
    /// Status transitions.
    pub transition_status: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Log directory.
    pub dir: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Default level.
    pub level: Option<String>,
}

impl MigrateConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from every layer.
    ///
    /// # Errors
    ///
    /// Returns an error if a named or discovered config file cannot be read
    /// or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let config = if let Some(path) = path {
            Self::load_from_file(path)?
        } else if let Some(path) = std::env::var("TRACKER_MIGRATE_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
        {
            Self::load_from_file(Path::new(&path))?
        } else {
            Self::load_default()?
        };

        Ok(config.with_env_overrides())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or describes an invalid mapping.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid config file: {e}")))?;
        Self::from_config_file(file)
    }

    /// Loads the first config file found in the default locations.
    ///
    /// Returns default configuration if none exists.
    fn load_default() -> Result<Self> {
        let mut candidates = vec![PathBuf::from("tracker-migrate.toml")];
        if let Some(base_dirs) = directories::BaseDirs::new() {
            candidates.push(
                base_dirs
                    .config_dir()
                    .join("tracker-migrate")
                    .join("config.toml"),
            );
        }

        match candidates.iter().find(|path| path.exists()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using discovered config file");
                Self::load_from_file(path)
            },
            None => Ok(Self::default()),
        }
    }

    /// Converts a `ConfigFile` to `MigrateConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(tracker) = file.tracker {
            config.tracker.server_url = non_empty(tracker.server_url);
            config.tracker.username = non_empty(tracker.username);
            config.tracker.api_token = non_empty(tracker.api_token).map(SecretString::from);
            config.tracker.project_key = non_empty(tracker.project_key);
            if let Some(auth) = tracker.auth {
                config.tracker.auth = AuthScheme::parse(&auth).ok_or_else(|| {
                    Error::Configuration(format!("unknown tracker auth scheme '{auth}'"))
                })?;
            }
            if let Some(v) = tracker.timeout_ms {
                config.tracker.timeout_ms = v;
            }
            if let Some(v) = tracker.connect_timeout_ms {
                config.tracker.connect_timeout_ms = v;
            }
        }
        if let Some(retry) = file.retry {
            if let Some(v) = retry.max_retries {
                config.retry.max_retries = v;
            }
            if let Some(v) = retry.base_delay_ms {
                config.retry.base_delay_ms = v;
            }
        }
        if let Some(fields) = file.fields {
            config.fields = FieldMapping::from_overrides(&fields)?;
        }
        if let Some(hierarchy) = file.hierarchy {
            apply_hierarchy(&mut config.hierarchy, hierarchy)?;
        }
        if let Some(priorities) = file.priorities {
            config.priorities = priorities;
        }
        if let Some(migration) = file.migration {
            if let Some(path) = migration.snapshot_path {
                config.migration.snapshot_path = non_empty(Some(path)).map(PathBuf::from);
            }
            config.migration.mapping_path = non_empty(migration.mapping_path).map(PathBuf::from);
            config.migration.resume_mapping =
                non_empty(migration.resume_mapping).map(PathBuf::from);
            if let Some(v) = migration.transition_status {
                config.migration.transition_status = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(dir) = non_empty(logging.dir) {
                config.logging.dir = PathBuf::from(dir);
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format).ok_or_else(|| {
                    Error::Configuration(format!("unknown log format '{format}'"))
                })?;
            }
            if let Some(level) = non_empty(logging.level) {
                config.logging.level = level;
            }
        }

        Ok(config)
    }

    /// Applies process environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JIRA_SERVER_URL") {
            self.tracker.server_url = Some(v);
        }
        if let Some(v) = get("JIRA_USERNAME") {
            self.tracker.username = Some(v);
        }
        if let Some(v) = get("JIRA_TOKEN") {
            self.tracker.api_token = Some(SecretString::from(v));
        }
        if let Some(v) = get("JIRA_PROJECT_KEY") {
            self.tracker.project_key = Some(v);
        }
        if let Some(v) = get("TRACKER_MIGRATE_MAX_RETRIES") {
            if let Ok(parsed) = v.parse::<u32>() {
                self.retry.max_retries = parsed;
            }
        }
        if let Some(v) = get("TRACKER_MIGRATE_LOG_DIR") {
            self.logging.dir = PathBuf::from(v);
        }
        if let Some(format) = get("TRACKER_MIGRATE_LOG_FORMAT").and_then(|v| LogFormat::parse(&v))
        {
            self.logging.format = format;
        }

        self
    }

    /// Returns the destination project key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no project key is set.
    pub fn project_key(&self) -> Result<&str> {
        self.tracker
            .project_key
            .as_deref()
            .ok_or_else(|| Error::Configuration("JIRA_PROJECT_KEY is not set".to_string()))
    }

    /// Checks that everything a live run needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming every missing setting.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.tracker.server_url.is_none() {
            missing.push("JIRA_SERVER_URL");
        }
        if self.tracker.auth == AuthScheme::Basic && self.tracker.username.is_none() {
            missing.push("JIRA_USERNAME");
        }
        if self
            .tracker
            .api_token
            .as_ref()
            .is_none_or(|token| token.expose_secret().is_empty())
        {
            missing.push("JIRA_TOKEN");
        }
        if self.tracker.project_key.is_none() {
            missing.push("JIRA_PROJECT_KEY");
        }
        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "missing tracker settings: {}",
                missing.join(", ")
            )));
        }
        self.fields.validate()
    }
}

fn apply_hierarchy(rules: &mut HierarchyRules, file: ConfigFileHierarchy) -> Result<()> {
    let names = &mut rules.names;
    for (slot, value) in [
        (&mut names.epic, file.epic_type),
        (&mut names.story, file.story_type),
        (&mut names.task, file.task_type),
        (&mut names.bug, file.bug_type),
        (&mut names.subtask, file.subtask_type),
    ] {
        if let Some(v) = non_empty(value) {
            *slot = v;
        }
    }
    if let Some(field) = non_empty(file.epic_link_field) {
        rules.epic_link = EpicLink::Field(field);
    }
    rules.story_points_field = non_empty(file.story_points_field);
    if let Some(parents) = file.subtask_parents {
        rules.subtask_parents = parents
            .iter()
            .map(|name| {
                IssueType::parse(name).ok_or_else(|| {
                    Error::Configuration(format!("unknown issue type '{name}' in subtask_parents"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_env(key: &str) -> Option<String> {
        match key {
            "JIRA_SERVER_URL" => Some("https://example.atlassian.net".to_string()),
            "JIRA_USERNAME" => Some("migrator@example.com".to_string()),
            "JIRA_TOKEN" => Some("token-123".to_string()),
            "JIRA_PROJECT_KEY" => Some("PROJ".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = MigrateConfig::new();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
        assert_eq!(
            config.migration.snapshot_path,
            Some(PathBuf::from("epics_data.json"))
        );
        assert!(config.migration.resume_mapping.is_none());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let err = MigrateConfig::new().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("JIRA_SERVER_URL"));
        assert!(msg.contains("JIRA_TOKEN"));
        assert!(msg.contains("JIRA_PROJECT_KEY"));

        let config = MigrateConfig::new().with_overrides_from(complete_env);
        assert!(config.validate().is_ok());
        assert_eq!(config.project_key().unwrap(), "PROJ");
    }

    #[test]
    fn test_bearer_auth_does_not_need_username() {
        let mut config = MigrateConfig::new().with_overrides_from(|key| match key {
            "JIRA_USERNAME" => None,
            other => complete_env(other),
        });
        assert!(config.validate().is_err());

        config.tracker.auth = AuthScheme::Bearer;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = MigrateConfig::from_toml(
            r#"
            [tracker]
            server_url = "https://jira.internal"
            project_key = "OPS"
            auth = "bearer"

            [retry]
            max_retries = 5
            base_delay_ms = 0

            [fields]
            title = "Name"

            [hierarchy]
            subtask_type = "Subtask"
            epic_link_field = "customfield_10014"
            subtask_parents = ["task"]

            [migration]
            snapshot_path = ""
            resume_mapping = "previous.json"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.auth, AuthScheme::Bearer);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.fields.header(FieldRole::Title), Some("Name"));
        assert_eq!(config.hierarchy.names.subtask, "Subtask");
        assert_eq!(
            config.hierarchy.epic_link,
            EpicLink::Field("customfield_10014".to_string())
        );
        assert_eq!(config.hierarchy.subtask_parents, vec![IssueType::Task]);
        assert!(config.migration.snapshot_path.is_none());
        assert_eq!(
            config.migration.resume_mapping,
            Some(PathBuf::from("previous.json"))
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(MigrateConfig::from_toml("[tracker]\nauth = \"kerberos\"\n").is_err());
        assert!(MigrateConfig::from_toml("[fields]\ntitle = \"\"\n").is_err());
        assert!(MigrateConfig::from_toml("[hierarchy]\nsubtask_parents = [\"saga\"]\n").is_err());
        assert!(MigrateConfig::from_toml("[unknown]\nkey = 1\n").is_err());
    }

    #[test]
    fn test_env_overrides_win() {
        let config = MigrateConfig::from_toml("[tracker]\nproject_key = \"OLD\"\n")
            .unwrap()
            .with_overrides_from(|key| match key {
                "JIRA_PROJECT_KEY" => Some("NEW".to_string()),
                "TRACKER_MIGRATE_MAX_RETRIES" => Some("7".to_string()),
                "JIRA_USERNAME" => Some("   ".to_string()),
                _ => None,
            });
        assert_eq!(config.project_key().unwrap(), "NEW");
        assert_eq!(config.retry.max_retries, 7);
        assert!(config.tracker.username.is_none());
    }

    #[test]
    fn test_retry_delay_backoff() {
        let retry = RetrySettings {
            max_retries: 3,
            base_delay_ms: 100,
        };
        assert_eq!(retry.delay_for_attempt(0), 0);
        assert_eq!(retry.delay_for_attempt(1), 100);
        assert_eq!(retry.delay_for_attempt(2), 200);
        assert_eq!(retry.delay_for_attempt(3), 400);
    }
}
