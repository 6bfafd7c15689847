//! Export reader.
//!
//! Walks an exported workspace and turns it into an [`ExportSnapshot`]:
//!
//! ```text
//! root/
//! ├── Epics/
//! │   ├── Payments 0123456789abcdef.md      epic page
//! │   └── Payments 0123456789abcdef/
//! │       └── Tasks.csv                      task listing
//! ├── Items/
//! │   └── Build checkout form 89ab....md     item pages
//! ├── users.json                             optional, name → email
//! └── status.json                            optional, status → tracker status
//! ```
//!
//! Reading never mutates the export. Any layout problem is a
//! [`Error::Structural`](crate::Error::Structural).
//!
//! [`ExportSnapshot`]: crate::models::ExportSnapshot

mod export;
mod listing;
mod lookups;
mod page;

pub use export::ExportReader;
pub use listing::read_listing;
pub use lookups::Lookups;
pub use page::{Page, PageProperty, parse_child_refs};

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Reads a UTF-8 text file, dropping a leading byte-order mark.
///
/// # Errors
///
/// Returns [`Error::Structural`] if the file cannot be read.
pub fn read_text(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Structural(format!("cannot read {}: {e}", path.display())))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Lists the files in `dir` with the given extension, sorted by name.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Structural(format!("cannot list {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Structural(format!("cannot list {}: {e}", dir.display())))?
            .path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem as a string, lossily converted.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_text_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        std::fs::write(&path, "\u{feff}Assignee: Ada").unwrap();
        assert_eq!(read_text(&path).unwrap(), "Assignee: Ada");
    }

    #[test]
    fn test_read_text_missing_file_is_structural() {
        let err = read_text(Path::new("/nonexistent/page.md")).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.md", "a.md", "c.csv", "d.MD"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("e.md")).unwrap();

        let names: Vec<_> = list_files(dir.path(), "md")
            .unwrap()
            .iter()
            .map(|p| file_stem(p))
            .collect();
        assert_eq!(names, vec!["a", "b", "d"]);
    }
}
