//! Bounded retries for transient tracker failures.

use super::{CreateIssueRequest, TrackerClient};
use crate::config::RetrySettings;
use crate::models::IssueKey;
use crate::{Error, Result};
use std::time::Duration;

/// Wraps a [`TrackerClient`] and retries [`Error::Transient`] failures with
/// exponential backoff.
///
/// Once the retry budget is spent the last failure surfaces as
/// [`Error::RemoteRejected`]. Non-transient errors are returned at once.
pub struct RetryingTracker<C: TrackerClient> {
    inner: C,
    retry: RetrySettings,
}

enum FailureAction {
    Retry,
    Fail(Error),
}

impl<C: TrackerClient> RetryingTracker<C> {
    /// Creates a retrying wrapper.
    #[must_use]
    pub const fn new(inner: C, retry: RetrySettings) -> Self {
        Self { inner, retry }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    fn execute<T, F>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let tracker: &'static str = self.inner.name();
        let span = tracing::info_span!(
            "tracker.request",
            tracker = tracker,
            operation = operation,
            attempts = tracing::field::Empty,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let max_attempts = self.retry.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match call() {
                Ok(value) => {
                    span.record("attempts", attempt);
                    span.record("status", "success");
                    return Ok(value);
                },
                Err(err) => err,
            };

            match self.handle_failure(operation, err, attempt, max_attempts) {
                FailureAction::Retry => {},
                FailureAction::Fail(err) => {
                    span.record("attempts", attempt);
                    span.record("status", err.code());
                    return Err(err);
                },
            }
        }
    }

    fn handle_failure(
        &self,
        operation: &'static str,
        err: Error,
        attempt: u32,
        max_attempts: u32,
    ) -> FailureAction {
        if !err.is_transient() {
            return FailureAction::Fail(err);
        }

        if attempt >= max_attempts {
            tracing::warn!(
                operation,
                attempts = attempt,
                error = %err,
                "Giving up after transient failures"
            );
            return FailureAction::Fail(Error::RemoteRejected {
                status: None,
                message: format!("gave up after {attempt} attempts: {err}"),
            });
        }

        let delay_ms = self.retry.delay_for_attempt(attempt);
        tracing::warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms,
            error = %err,
            "Transient tracker failure, retrying"
        );
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
        FailureAction::Retry
    }
}

impl<C: TrackerClient> TrackerClient for RetryingTracker<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueKey> {
        self.execute("create_issue", || self.inner.create_issue(request))
    }

    fn find_user(&self, query: &str) -> Result<Option<String>> {
        self.execute("find_user", || self.inner.find_user(query))
    }

    fn transition_issue(&self, key: &IssueKey, status: &str) -> Result<bool> {
        self.execute("transition_issue", || {
            self.inner.transition_issue(key, status)
        })
    }
}
