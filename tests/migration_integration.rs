//! End-to-end runs of the migration pipeline against an in-memory tracker.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{EPIC_HEX, Export, FakeTracker};
use tracker_migrate::config::RetrySettings;
use tracker_migrate::services::{CYCLE_CODE, Outcome, run_pipeline};
use tracker_migrate::{Error, ItemId, RemoteMapping, RetryingTracker};

#[test]
fn test_minimal_chain_links_parents() {
    let export = Export::with_listing(
        "Task name,ID,Type,Child Tasks\n\
         Checkout,S-1,Story,Validate card (Validate%20card.md)\n\
         Validate card,T-1,Task,\n",
    );
    let fake = FakeTracker::new();

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();

    assert!(report.is_success());
    assert_eq!(
        fake.created_summaries(),
        vec!["Payments", "Checkout", "Validate card"]
    );
    assert_eq!(fake.payload("Payments").parent_key(), None);
    assert_eq!(fake.payload("Checkout").parent_key(), Some("PROJ-1"));
    let subtask = fake.payload("Validate card");
    assert_eq!(subtask.parent_key(), Some("PROJ-2"));
    assert_eq!(subtask.fields.issuetype.name, "Sub-task");

    let mapping = RemoteMapping::load(&export.path("mapping.json")).unwrap();
    assert_eq!(mapping.len(), 3);
    assert_eq!(
        mapping.get(&ItemId::new(EPIC_HEX)).map(|k| k.as_str()),
        Some("PROJ-1")
    );
    assert_eq!(mapping.get(&ItemId::new("S-1")).map(|k| k.as_str()), Some("PROJ-2"));
    assert_eq!(mapping.get(&ItemId::new("T-1")).map(|k| k.as_str()), Some("PROJ-3"));
}

#[test]
fn test_payload_fields_and_transitions() {
    let export = Export::standard();
    let fake = FakeTracker::new();

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();
    assert_eq!(report.created(), 4);

    let epic = fake.payload("Payments");
    assert_eq!(epic.fields.description, "All payment work");
    assert_eq!(
        epic.fields.reporter.as_ref().map(|r| r.account_id.as_str()),
        Some("acc-ada")
    );

    let story = fake.payload("Checkout");
    assert_eq!(
        story.fields.assignee.as_ref().map(|a| a.account_id.as_str()),
        Some("acc-ada")
    );
    assert_eq!(
        story.fields.priority.as_ref().map(|p| p.name.as_str()),
        Some("High")
    );
    assert_eq!(story.fields.description, "Story migrated from export");

    let transitions = fake.transitions();
    assert!(transitions.contains(&("PROJ-2".to_string(), "In Progress".to_string())));
    assert!(transitions.iter().any(|(_, status)| status == "Backlog"));

    assert!(export.path("epics_data.json").exists());
}

#[test]
fn test_dangling_reference_skips_only_its_subtree() {
    let export = Export::with_listing(
        "Task name,ID,Type,Child Tasks\n\
         Checkout,S-1,Story,\"Validate card (Validate%20card.md), Ghost task (Ghost%20task.md)\"\n\
         Validate card,T-1,Task,\n\
         Refunds,S-2,Story,\n",
    );
    let fake = FakeTracker::new();

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(fake.created_summaries(), vec!["Payments", "Refunds"]);
    match report.outcome_of(&ItemId::new("S-1")) {
        Some(Outcome::Failed { code, reason }) => {
            assert_eq!(*code, "dangling_reference");
            assert!(reason.contains("Ghost task"));
        },
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        report.outcome_of(&ItemId::new("T-1")),
        Some(&Outcome::Skipped {
            blocked_by: ItemId::new("S-1")
        })
    );
}

#[test]
fn test_resume_does_not_recreate_mapped_items() {
    let export = Export::standard();
    let first = FakeTracker::new();
    first.reject("Refunds");
    let report = run_pipeline(export.root(), &export.config(), &first).unwrap();
    assert_eq!(report.created(), 3);
    assert_eq!(report.failed(), 1);

    let mut config = export.config();
    config.migration.resume_mapping = Some(export.path("mapping.json"));
    let second = FakeTracker::new();
    let report = run_pipeline(export.root(), &config, &second).unwrap();

    assert!(report.is_success());
    assert_eq!(report.already_mapped(), 3);
    assert_eq!(second.created_summaries(), vec!["Refunds"]);
    assert_eq!(second.payload("Refunds").parent_key(), Some("PROJ-1"));

    let mapping = RemoteMapping::load(&export.path("mapping.json")).unwrap();
    assert_eq!(mapping.len(), 4);
}

#[test]
fn test_malformed_header_aborts_before_remote_calls() {
    let export = Export::with_listing("Name,ID,Type\nCheckout,S-1,Story\n");
    let fake = FakeTracker::new();

    let err = run_pipeline(export.root(), &export.config(), &fake).unwrap_err();

    assert!(matches!(err, Error::Structural(ref msg) if msg.contains("Task name")));
    assert!(err.is_fatal());
    assert_eq!(fake.attempts(), 0);
    assert!(!export.path("epics_data.json").exists());
}

#[test]
fn test_missing_project_key_is_fatal() {
    let export = Export::standard();
    let mut config = export.config();
    config.tracker.project_key = None;
    let fake = FakeTracker::new();

    let err = run_pipeline(export.root(), &config, &fake).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(fake.attempts(), 0);
}

#[test]
fn test_rejected_story_blocks_its_task_not_its_sibling() {
    let export = Export::standard();
    let fake = FakeTracker::new();
    fake.reject("Checkout");

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();

    assert_eq!(fake.created_summaries(), vec!["Payments", "Refunds"]);
    assert!(matches!(
        report.outcome_of(&ItemId::new("S-1")),
        Some(Outcome::Failed { code: "remote_rejected", .. })
    ));
    assert!(matches!(
        report.outcome_of(&ItemId::new("T-1")),
        Some(Outcome::Skipped { .. })
    ));
    assert!(matches!(
        report.outcome_of(&ItemId::new("S-2")),
        Some(Outcome::Created(_))
    ));
}

#[test]
fn test_transient_failures_are_retried() {
    let export = Export::standard();
    let fake = FakeTracker::new();
    fake.fail_transiently("Checkout", 2);
    let client = RetryingTracker::new(
        &fake,
        RetrySettings {
            max_retries: 2,
            base_delay_ms: 0,
        },
    );

    let report = run_pipeline(export.root(), &export.config(), client).unwrap();

    assert!(report.is_success());
    assert_eq!(fake.attempts(), 6);
}

#[test]
fn test_exhausted_retries_surface_as_rejection() {
    let export = Export::standard();
    let fake = FakeTracker::new();
    fake.fail_transiently("Payments", 5);
    let client = RetryingTracker::new(
        &fake,
        RetrySettings {
            max_retries: 2,
            base_delay_ms: 0,
        },
    );

    let report = run_pipeline(export.root(), &export.config(), client).unwrap();

    assert_eq!(fake.attempts(), 3);
    assert!(fake.created_summaries().is_empty());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 3);
    match report.outcome_of(&ItemId::new(EPIC_HEX)) {
        Some(Outcome::Failed { code, reason }) => {
            assert_eq!(*code, "remote_rejected");
            assert!(reason.contains("gave up after 3 attempts"));
        },
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_same_titles_in_different_epics_are_all_created() {
    let listing = "Task name,Type,Child Tasks\n\
                   Write tests,Story,Unit tests (Unit%20tests.md)\n\
                   Unit tests,Task,\n";
    let export = Export::with_epics(&[("Alpha", listing), ("Beta", listing)]);
    let fake = FakeTracker::new();

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();

    assert!(report.is_success());
    assert_eq!(report.created(), 6);
    assert_eq!(report.already_mapped(), 0);
    assert_eq!(fake.created().len(), 6);

    let parents: Vec<_> = fake
        .created()
        .into_iter()
        .filter(|r| r.fields.summary == "Unit tests")
        .map(|r| r.parent_key().map(str::to_string))
        .collect();
    assert_eq!(parents.len(), 2);
    assert!(parents.iter().all(Option::is_some));
    assert_ne!(parents[0], parents[1]);

    let mapping = RemoteMapping::load(&export.path("mapping.json")).unwrap();
    assert_eq!(mapping.len(), 6);
    assert!(mapping.get(&ItemId::new("alpha/unit-tests")).is_some());
    assert!(mapping.get(&ItemId::new("beta/unit-tests")).is_some());
}

#[test]
fn test_duplicate_titles_in_one_epic_abort_before_remote_calls() {
    let export = Export::with_listing(
        "Task name,Type\n\
         Write tests,Story\n\
         Write tests,Task\n",
    );
    let fake = FakeTracker::new();

    let err = run_pipeline(export.root(), &export.config(), &fake).unwrap_err();

    assert!(matches!(err, Error::Structural(ref msg) if msg.contains("write-tests")));
    assert_eq!(fake.attempts(), 0);
}

#[test]
fn test_reference_cycle_fails_the_run() {
    let export = Export::with_listing(
        "Task name,ID,Type,Child Tasks\n\
         A,A-1,Task,B (B.md)\n\
         B,B-1,Task,A (A.md)\n",
    );
    let fake = FakeTracker::new();

    let report = run_pipeline(export.root(), &export.config(), &fake).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed(), 2);
    assert_eq!(fake.created_summaries(), vec!["Payments"]);
    for id in ["A-1", "B-1"] {
        assert!(matches!(
            report.outcome_of(&ItemId::new(id)),
            Some(Outcome::Failed { code: CYCLE_CODE, .. })
        ));
    }
}

#[test]
fn test_unwritable_snapshot_aborts_before_remote_calls() {
    let export = Export::standard();
    let mut config = export.config();
    config.migration.snapshot_path = Some(export.path("users.json").join("epics_data.json"));
    let fake = FakeTracker::new();

    let err = run_pipeline(export.root(), &config, &fake).unwrap_err();

    assert!(matches!(err, Error::OperationFailed { .. }));
    assert_eq!(fake.attempts(), 0);
}
