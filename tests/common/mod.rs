//! Shared fixtures: an in-memory tracker and export directories on disk.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracker_migrate::config::MigrateConfig;
use tracker_migrate::tracker::CreateIssueRequest;
use tracker_migrate::{Error, IssueKey, Result, TrackerClient};

/// Records every payload and replays scripted failures per summary.
#[derive(Default)]
pub struct FakeTracker {
    created: Mutex<Vec<CreateIssueRequest>>,
    attempts: Mutex<Vec<String>>,
    transitions: Mutex<Vec<(String, String)>>,
    failures: Mutex<HashMap<String, VecDeque<Error>>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next create of `summary` with `err`.
    pub fn fail_next(&self, summary: &str, err: Error) {
        self.failures
            .lock()
            .unwrap()
            .entry(summary.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn reject(&self, summary: &str) {
        self.fail_next(
            summary,
            Error::RemoteRejected {
                status: Some(400),
                message: "issuetype: invalid".to_string(),
            },
        );
    }

    pub fn fail_transiently(&self, summary: &str, times: usize) {
        for _ in 0..times {
            self.fail_next(
                summary,
                Error::Transient {
                    operation: "create_issue".to_string(),
                    cause: "HTTP 503: unavailable".to_string(),
                },
            );
        }
    }

    pub fn created(&self) -> Vec<CreateIssueRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_summaries(&self) -> Vec<String> {
        self.created()
            .into_iter()
            .map(|r| r.fields.summary)
            .collect()
    }

    pub fn payload(&self, summary: &str) -> CreateIssueRequest {
        self.created()
            .into_iter()
            .find(|r| r.fields.summary == summary)
            .unwrap_or_else(|| panic!("no payload for {summary}"))
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn transitions(&self) -> Vec<(String, String)> {
        self.transitions.lock().unwrap().clone()
    }
}

impl TrackerClient for FakeTracker {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueKey> {
        let summary = request.fields.summary.clone();
        self.attempts.lock().unwrap().push(summary.clone());
        if let Some(err) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&summary)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(IssueKey::new(format!(
            "{}-{}",
            request.fields.project.key,
            created.len()
        )))
    }

    fn find_user(&self, query: &str) -> Result<Option<String>> {
        Ok(query
            .strip_suffix("@example.com")
            .map(|name| format!("acc-{name}")))
    }

    fn transition_issue(&self, key: &IssueKey, status: &str) -> Result<bool> {
        self.transitions
            .lock()
            .unwrap()
            .push((key.to_string(), status.to_string()));
        Ok(true)
    }
}

pub const EPIC_HEX: &str = "0123456789abcdef0123456789abcdef";

/// An export with one epic and the given listing CSV.
pub struct Export {
    pub dir: tempfile::TempDir,
}

impl Export {
    pub fn with_listing(csv: &str) -> Self {
        let export = Self::empty();
        export.add_epic(&format!("Payments {EPIC_HEX}"), "All payment work", csv);
        export
    }

    /// An export with one epic per `(page name, listing CSV)` pair.
    pub fn with_epics(epics: &[(&str, &str)]) -> Self {
        let export = Self::empty();
        for (name, csv) in epics {
            export.add_epic(name, "Planned work", csv);
        }
        export
    }

    fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Epics")).unwrap();
        fs::create_dir_all(root.join("Items")).unwrap();
        fs::write(root.join("users.json"), r#"{"Ada": "ada@example.com"}"#).unwrap();
        fs::write(
            root.join("status.json"),
            r#"{"in progress": "In Progress", "backlog": "Backlog"}"#,
        )
        .unwrap();
        Self { dir }
    }

    fn add_epic(&self, name: &str, description: &str, csv: &str) {
        let epics = self.path("Epics");
        let title = name.trim_end_matches(EPIC_HEX).trim_end();
        fs::create_dir_all(epics.join(name)).unwrap();
        fs::write(
            epics.join(format!("{name}.md")),
            format!("# {title}\nCreated by: Ada\nDescription:\n{description}\n"),
        )
        .unwrap();
        fs::write(epics.join(name).join("Tasks.csv"), csv).unwrap();
    }

    /// Epic → Checkout (story) → Validate card (task), plus a sibling story.
    pub fn standard() -> Self {
        Self::with_listing(
            "Task name,ID,Type,Assignee,Priority,Status,Child Tasks\n\
             Checkout,S-1,Story,Ada,P1-Critical,In progress,Validate card (Validate%20card.md)\n\
             Validate card,T-1,Task,,,,\n\
             Refunds,S-2,User Story,,,,\n",
        )
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Config pointing every output file into the export's temp dir.
    pub fn config(&self) -> MigrateConfig {
        let mut config = MigrateConfig::default();
        config.tracker.project_key = Some("PROJ".to_string());
        config.migration.snapshot_path = Some(self.path("epics_data.json"));
        config.migration.mapping_path = Some(self.path("mapping.json"));
        config
    }
}
