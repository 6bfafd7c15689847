//! Issue tracker clients.
//!
//! [`TrackerClient`] is the seam between the migration driver and the
//! remote tracker. [`JiraClient`] talks to a Jira-compatible REST API;
//! [`RetryingTracker`] wraps any client with bounded retries for transient
//! failures.
//!
//! # Error Mapping
//!
//! | Outcome | Error |
//! |---------|-------|
//! | 2xx | success |
//! | 4xx (except 408, 429) | [`Error::RemoteRejected`](crate::Error::RemoteRejected) |
//! | connect/timeout, 408, 429, 5xx | [`Error::Transient`](crate::Error::Transient) |

mod jira;
mod payload;
mod retry;

pub use jira::JiraClient;
pub use payload::{AccountRef, CreateIssueRequest, IssueFields, KeyRef, NameRef};
pub use retry::RetryingTracker;

use crate::Result;
use crate::config::TrackerSettings;
use crate::models::IssueKey;
use std::time::Duration;

/// Operations the migration needs from a tracker.
pub trait TrackerClient {
    /// Short client name for logs.
    fn name(&self) -> &'static str;

    /// Creates an issue and returns its key.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `Transient` errors as described in the
    /// module docs.
    fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueKey>;

    /// Looks up an account id by email or display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup request fails.
    fn find_user(&self, query: &str) -> Result<Option<String>>;

    /// Moves an issue to the status named `status`.
    ///
    /// Returns `false` when no transition leads to that status.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails.
    fn transition_issue(&self, key: &IssueKey, status: &str) -> Result<bool>;
}

impl<T: TrackerClient + ?Sized> TrackerClient for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueKey> {
        (**self).create_issue(request)
    }

    fn find_user(&self, query: &str) -> Result<Option<String>> {
        (**self).find_user(query)
    }

    fn transition_issue(&self, key: &IssueKey, status: &str) -> Result<bool> {
        (**self).transition_issue(key, status)
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
#[must_use]
pub fn build_http_client(settings: &TrackerSettings) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(format!("tracker-migrate/{}", env!("CARGO_PKG_VERSION")));
    if settings.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(settings.timeout_ms));
    }
    if settings.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(settings.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build tracker HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}
