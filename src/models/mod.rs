//! Data models for the migration pipeline.

mod forest;
mod item;
mod mapping;
mod snapshot;

pub use forest::{BuildIssue, Forest, Node, NodeIndex};
pub use item::{
    ChildRef, IssueKey, IssueType, Item, ItemId, clean_title, extract_hex_id, normalize_name,
};
pub use mapping::RemoteMapping;
pub use snapshot::{EpicRecord, ExportSnapshot};
