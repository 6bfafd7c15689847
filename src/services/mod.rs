//! Migration services.
//!
//! Services turn a parsed export into tracker issues:
//!
//! - [`HierarchyBuilder`] links records into a [`crate::models::Forest`]
//! - [`RecordMapper`] checks the forest against the destination hierarchy
//!   and builds create-issue payloads
//! - [`MigrationDriver`] creates issues parent-before-child
//! - [`run_pipeline`] chains the stages for one run

mod hierarchy;
mod mapper;
mod migration;
mod pipeline;

pub use hierarchy::HierarchyBuilder;
pub use mapper::{People, RecordMapper};
pub use migration::{CYCLE_CODE, MigrationDriver, MigrationReport, NodeOutcome, Outcome, RunContext};
pub use pipeline::run_pipeline;
