//! Create-issue request body.

use serde::Serialize;
use std::collections::BTreeMap;

/// Body of `POST /rest/api/2/issue`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateIssueRequest {
    /// Issue fields.
    pub fields: IssueFields,
}

/// Fields of a new issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueFields {
    /// Destination project.
    pub project: KeyRef,
    /// Issue title.
    pub summary: String,
    /// Issue body.
    pub description: String,
    /// Issue type, by name.
    pub issuetype: NameRef,
    /// Assignee account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<AccountRef>,
    /// Reporter account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<AccountRef>,
    /// Priority, by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<NameRef>,
    /// Parent issue (epic for team-managed projects, owner of a subtask).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<KeyRef>,
    /// Custom fields such as an epic link or story points.
    #[serde(flatten)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// `{"key": ...}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRef {
    /// Project or issue key.
    pub key: String,
}

/// `{"name": ...}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRef {
    /// Display name.
    pub name: String,
}

/// `{"accountId": ...}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRef {
    /// Tracker account id.
    #[serde(rename = "accountId")]
    pub account_id: String,
}

impl CreateIssueRequest {
    /// Key in the `parent` field.
    #[must_use]
    pub fn parent_key(&self) -> Option<&str> {
        self.fields.parent.as_ref().map(|p| p.key.as_str())
    }

    /// Value of a custom field.
    #[must_use]
    pub fn custom_field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.custom.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_tracker_shape() {
        let request = CreateIssueRequest {
            fields: IssueFields {
                project: KeyRef {
                    key: "PROJ".to_string(),
                },
                summary: "Checkout form".to_string(),
                description: "Build it".to_string(),
                issuetype: NameRef {
                    name: "Story".to_string(),
                },
                assignee: Some(AccountRef {
                    account_id: "acc-1".to_string(),
                }),
                reporter: None,
                priority: None,
                parent: None,
                custom: BTreeMap::from([("customfield_10014".to_string(), json!("PROJ-1"))]),
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "fields": {
                    "project": {"key": "PROJ"},
                    "summary": "Checkout form",
                    "description": "Build it",
                    "issuetype": {"name": "Story"},
                    "assignee": {"accountId": "acc-1"},
                    "customfield_10014": "PROJ-1"
                }
            })
        );
        assert_eq!(request.parent_key(), None);
        assert_eq!(request.custom_field("customfield_10014"), Some(&json!("PROJ-1")));
    }
}
