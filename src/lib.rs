//! # tracker-migrate
//!
//! Moves hierarchical project-management data (Epics → Stories/Tasks →
//! Subtasks) from an exported document-database directory into an issue
//! tracker through its REST API.
//!
//! The pipeline runs in four stages:
//!
//! - [`io::ExportReader`] walks the `Epics/` and `Items/` folders and parses
//!   page files and CSV task listings
//! - [`services::HierarchyBuilder`] links the parsed records into a rooted
//!   forest and fixes a parent-before-child traversal order
//! - [`services::RecordMapper`] turns each node into a create-issue payload
//! - [`services::MigrationDriver`] replays the forest against a
//!   [`tracker::TrackerClient`], recording assigned issue keys so children can
//!   link to their parents
//!
//! ## Example
//!
//! ```rust,ignore
//! use tracker_migrate::{MigrateConfig, io::ExportReader, services::HierarchyBuilder};
//!
//! let config = MigrateConfig::load(None)?;
//! let export = ExportReader::new(&root, &config.fields, &config.priorities).read()?;
//! let forest = HierarchyBuilder::new().build(export);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod tracker;

pub use config::MigrateConfig;
pub use models::{Forest, IssueKey, IssueType, Item, ItemId, RemoteMapping};
pub use services::{MigrationDriver, MigrationReport, RunContext};
pub use tracker::{JiraClient, RetryingTracker, TrackerClient};

/// Error type for migration operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Fatal |
/// |---------|-------------|-------|
/// | `Structural` | Missing `Epics/`/`Items/`, malformed CSV header, unreadable file | yes |
/// | `Configuration` | Missing credentials, invalid field mapping, unsupported hierarchy | yes |
/// | `DanglingReference` | A child reference matches no parsed record | no |
/// | `RemoteRejected` | Tracker answered 4xx, or transient retries were exhausted | no |
/// | `Transient` | Connect/timeout failure, 408, 429, 5xx | no (retried) |
/// | `InvalidInput` | Malformed values handed to a component | no |
/// | `OperationFailed` | Local I/O outside the export (logs, snapshots) | no |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The export directory does not have the expected layout.
    #[error("structural error in export: {0}")]
    Structural(String),

    /// The destination or field configuration cannot support this run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A node lists a child that matches no parsed record.
    #[error("dangling reference: item '{item}' lists unknown child '{reference}'")]
    DanglingReference {
        /// Id of the item that lists the child.
        item: String,
        /// The unresolved child reference, as written in the export.
        reference: String,
    },

    /// The tracker refused the request.
    #[error("remote rejected{}: {message}", .status.map_or_else(String::new, |s| format!(" ({s})")))]
    RemoteRejected {
        /// HTTP status code, when the tracker answered at all.
        status: Option<u16>,
        /// Tracker-supplied message.
        message: String,
    },

    /// A network-level or server-side failure that may succeed on retry.
    #[error("transient failure during '{operation}': {cause}")]
    Transient {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for errors that must abort the run before any remote call.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Structural(_) | Self::Configuration(_))
    }

    /// Returns true for errors worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Short machine-friendly code for log fields.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Structural(_) => "structural",
            Self::Configuration(_) => "configuration",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::Transient { .. } => "transient",
            Self::InvalidInput(_) => "invalid_input",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;
