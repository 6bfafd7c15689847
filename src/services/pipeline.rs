//! End-to-end run: read, link, preflight, drive.

use super::hierarchy::HierarchyBuilder;
use super::mapper::RecordMapper;
use super::migration::{MigrationDriver, MigrationReport, RunContext};
use crate::config::MigrateConfig;
use crate::io::ExportReader;
use crate::models::{BuildIssue, Forest, RemoteMapping};
use crate::tracker::TrackerClient;
use crate::Result;
use std::path::Path;
use std::time::Instant;

/// Migrates the export at `root` into the tracker behind `client`.
///
/// Every fatal check (export layout, listing headers, snapshot write,
/// hierarchy fit, resume mapping) runs before the first remote call, so an
/// `Err` always means nothing was created.
///
/// # Errors
///
/// Returns [`crate::Error::Structural`] or [`crate::Error::Configuration`]
/// for an unusable export or setup, and [`crate::Error::OperationFailed`]
/// when the snapshot cannot be written. Per-item failures are reported in
/// the returned [`MigrationReport`].
pub fn run_pipeline<C: TrackerClient>(
    root: &Path,
    config: &MigrateConfig,
    client: C,
) -> Result<MigrationReport> {
    let start = Instant::now();
    tracing::info!(root = %root.display(), tracker = client.name(), "Starting migration");

    let snapshot = ExportReader::new(root, &config.fields, &config.priorities).read()?;
    tracing::info!(
        epics = snapshot.epics.len(),
        items = snapshot.item_count(),
        "Parsed export"
    );
    if let Some(path) = &config.migration.snapshot_path {
        snapshot.save(path)?;
        tracing::info!(path = %path.display(), "Wrote export snapshot");
    }

    let forest = HierarchyBuilder::new().build(snapshot);
    log_build_issues(&forest);

    let mapper = RecordMapper::new(config.project_key()?, config.hierarchy.clone());
    mapper.preflight(&forest)?;

    let mut ctx = match &config.migration.resume_mapping {
        Some(path) => {
            let mapping = RemoteMapping::load(path)?;
            tracing::info!(
                path = %path.display(),
                entries = mapping.len(),
                "Resuming from previous mapping"
            );
            RunContext::with_mapping(mapping)
        },
        None => RunContext::new(),
    };

    let driver = MigrationDriver::new(client, mapper)
        .with_transitions(config.migration.transition_status);
    let report = driver.run(&forest, &mut ctx)?;

    if let Some(path) = &config.migration.mapping_path {
        match ctx.mapping().save(path) {
            Ok(()) => tracing::info!(path = %path.display(), "Wrote issue mapping"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to write issue mapping"),
        }
    }

    report.log_summary();
    tracing::info!(
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Pipeline complete"
    );
    Ok(report)
}

/// Dangling references and cycles are reported by the driver.
fn log_build_issues(forest: &Forest) {
    for issue in forest.issues() {
        match issue {
            BuildIssue::Dangling { .. } | BuildIssue::Cycle { .. } => {},
            BuildIssue::MultipleParents {
                child,
                kept,
                ignored,
            } => tracing::warn!(
                item_id = %child,
                kept_parent = %kept,
                ignored_parent = %ignored,
                "Item listed under several parents; keeping the first"
            ),
        }
    }
}
