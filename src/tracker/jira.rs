//! Jira REST API (v2) client.

use super::{CreateIssueRequest, TrackerClient, build_http_client};
use crate::config::{AuthScheme, TrackerSettings};
use crate::models::IssueKey;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Longest raw response body quoted in an error message.
const MAX_BODY_IN_ERROR: usize = 500;

enum Credentials {
    Basic {
        username: String,
        token: SecretString,
    },
    Bearer(SecretString),
}

/// Blocking Jira client authenticated with an API token.
pub struct JiraClient {
    /// Base URL without a trailing slash.
    base_url: String,
    credentials: Credentials,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Deserialize)]
struct UserRecord {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct TransitionList {
    #[serde(default)]
    transitions: Vec<Transition>,
}

#[derive(Deserialize)]
struct Transition {
    id: String,
    to: TransitionTarget,
}

#[derive(Deserialize)]
struct TransitionTarget {
    name: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

impl JiraClient {
    /// Creates a client from tracker settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the server URL or credentials are
    /// missing.
    pub fn from_settings(settings: &TrackerSettings) -> Result<Self> {
        let base_url = settings
            .server_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::Configuration("JIRA_SERVER_URL is not set".to_string()))?;
        let token = settings
            .api_token
            .clone()
            .ok_or_else(|| Error::Configuration("JIRA_TOKEN is not set".to_string()))?;

        let credentials = match settings.auth {
            AuthScheme::Basic => Credentials::Basic {
                username: settings.username.clone().ok_or_else(|| {
                    Error::Configuration("JIRA_USERNAME is not set".to_string())
                })?,
                token,
            },
            AuthScheme::Bearer => Credentials::Bearer(token),
        };

        Ok(Self {
            base_url,
            credentials,
            client: build_http_client(settings),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.base_url)
    }

    fn authorize(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.credentials {
            Credentials::Basic { username, token } => {
                builder.basic_auth(username, Some(token.expose_secret()))
            },
            Credentials::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        }
    }

    /// Sends a request and returns the body of a successful response.
    fn send(
        &self,
        operation: &'static str,
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<(u16, String)> {
        let response = self
            .authorize(builder)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| request_error(operation, &e))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| request_error(operation, &e))?;

        if (200..300).contains(&status) {
            tracing::debug!(operation, status, "Tracker request succeeded");
            Ok((status, body))
        } else {
            tracing::debug!(operation, status, body = %truncate(&body), "Tracker returned error status");
            Err(classify_status(operation, status, &body))
        }
    }
}

impl TrackerClient for JiraClient {
    fn name(&self) -> &'static str {
        "jira"
    }

    fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueKey> {
        let builder = self.client.post(self.url("issue")).json(request);
        let (status, body) = self.send("create_issue", builder)?;
        let created: CreatedIssue =
            serde_json::from_str(&body).map_err(|e| Error::RemoteRejected {
                status: Some(status),
                message: format!("response has no issue key: {e}"),
            })?;
        Ok(IssueKey::new(created.key))
    }

    fn find_user(&self, query: &str) -> Result<Option<String>> {
        let builder = self
            .client
            .get(self.url("user/search"))
            .query(&[("query", query), ("maxResults", "1")]);
        let (_, body) = self.send("find_user", builder)?;
        let users: Vec<UserRecord> =
            serde_json::from_str(&body).map_err(|e| Error::OperationFailed {
                operation: "find_user".to_string(),
                cause: format!("unexpected user search response: {e}"),
            })?;
        Ok(users
            .into_iter()
            .next()
            .and_then(|user| user.account_id.or(user.name)))
    }

    fn transition_issue(&self, key: &IssueKey, status: &str) -> Result<bool> {
        let path = self.url(&format!("issue/{key}/transitions"));
        let (_, body) = self.send("list_transitions", self.client.get(&path))?;
        let list: TransitionList =
            serde_json::from_str(&body).map_err(|e| Error::OperationFailed {
                operation: "list_transitions".to_string(),
                cause: format!("unexpected transitions response: {e}"),
            })?;

        let Some(transition) = list
            .transitions
            .iter()
            .find(|t| t.to.name.eq_ignore_ascii_case(status))
        else {
            return Ok(false);
        };

        let payload = serde_json::json!({ "transition": { "id": transition.id } });
        self.send("transition_issue", self.client.post(&path).json(&payload))?;
        Ok(true)
    }
}

/// Maps a transport failure: timeouts and connect errors are transient.
fn request_error(operation: &'static str, e: &reqwest::Error) -> Error {
    let error_kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    };
    tracing::debug!(operation, error_kind, error = %e, "Tracker request failed");

    if e.is_timeout() || e.is_connect() {
        Error::Transient {
            operation: operation.to_string(),
            cause: format!("{error_kind} error: {e}"),
        }
    } else {
        Error::RemoteRejected {
            status: e.status().map(|s| s.as_u16()),
            message: format!("{error_kind} error: {e}"),
        }
    }
}

/// Maps a non-2xx status to an error.
fn classify_status(operation: &str, status: u16, body: &str) -> Error {
    let message = error_message(body);
    match status {
        408 | 429 | 500..=599 => Error::Transient {
            operation: operation.to_string(),
            cause: format!("HTTP {status}: {message}"),
        },
        _ => Error::RemoteRejected {
            status: Some(status),
            message,
        },
    }
}

/// Extracts `errorMessages` and `errors` from a Jira error body.
fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let mut parts = parsed.error_messages;
    parts.extend(
        parsed
            .errors
            .into_iter()
            .map(|(field, message)| format!("{field}: {message}")),
    );
    if !parts.is_empty() {
        return parts.join("; ");
    }
    let raw = truncate(body.trim());
    if raw.is_empty() {
        "no response body".to_string()
    } else {
        raw
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_BODY_IN_ERROR).collect()
}
