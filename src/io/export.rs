//! Walks the export root and assembles epics with their listed items.

use super::lookups::Lookups;
use super::page::{Page, PageProperty};
use super::{file_stem, list_files, read_listing};
use crate::config::{FieldMapping, PriorityTable};
use crate::models::{EpicRecord, ExportSnapshot, IssueType, Item, ItemId, clean_title};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const EPICS_DIR: &str = "Epics";
const ITEMS_DIR: &str = "Items";

/// Item pages are matched by this many leading title characters.
const PAGE_PREFIX_CHARS: usize = 35;

/// Reads an export directory.
pub struct ExportReader<'a> {
    root: PathBuf,
    fields: &'a FieldMapping,
    priorities: &'a PriorityTable,
}

impl<'a> ExportReader<'a> {
    /// Creates a reader for the export at `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        fields: &'a FieldMapping,
        priorities: &'a PriorityTable,
    ) -> Self {
        Self {
            root: root.into(),
            fields,
            priorities,
        }
    }

    /// Parses every epic page, its task listings and the matching item pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if `Epics/` or `Items/` is missing, a
    /// listing has a malformed header, any file cannot be read, or two
    /// records end up with the same id.
    pub fn read(&self) -> Result<ExportSnapshot> {
        let epics_dir = self.require_dir(EPICS_DIR)?;
        let items_dir = self.require_dir(ITEMS_DIR)?;
        let lookups = Lookups::load(&self.root)?;
        let item_pages = ItemPages::scan(&items_dir)?;

        let mut snapshot = ExportSnapshot::default();
        let mut seen = HashMap::new();
        for page_path in list_files(&epics_dir, "md")? {
            let record = self.read_epic(&page_path, &item_pages, &lookups)?;
            claim_ids(&mut seen, &record)?;
            tracing::info!(
                epic = %record.epic.title,
                items = record.items.len(),
                "Found epic in export"
            );
            snapshot.epics.push(record);
        }

        tracing::info!(
            epics = snapshot.epics.len(),
            items = snapshot.item_count(),
            root = %self.root.display(),
            "Export parsed"
        );
        Ok(snapshot)
    }

    fn require_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.root.join(name);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::Structural(format!(
                "missing {name}/ folder in {}",
                self.root.display()
            )))
        }
    }

    fn read_epic(
        &self,
        page_path: &Path,
        item_pages: &ItemPages,
        lookups: &Lookups,
    ) -> Result<EpicRecord> {
        let stem = file_stem(page_path);
        let page = Page::read(page_path)?;

        let mut epic = Item::new(ItemId::derive(&stem), clean_title(&stem), IssueType::Epic);
        epic.description.clone_from(&page.description);
        self.fill_from_page(&mut epic, &page, lookups);
        epic.merge_children(page.child_refs);

        let mut items = Vec::new();
        let listing_dir = page_path.with_extension("");
        if listing_dir.is_dir() {
            for csv_path in list_files(&listing_dir, "csv")? {
                items.extend(read_listing(
                    &csv_path,
                    &epic.id,
                    self.fields,
                    self.priorities,
                    lookups,
                )?);
            }
        } else {
            tracing::debug!(epic = %epic.title, "Epic has no listing folder");
        }

        for item in &mut items {
            let Some(path) = item_pages.find(&item.title) else {
                tracing::debug!(item_id = %item.id, title = %item.title, "No item page found");
                continue;
            };
            tracing::debug!(
                title = %item.title,
                page = %path.display(),
                "Matched item page"
            );
            let page = Page::read(path)?;
            if !page.description.trim().is_empty() {
                item.description.clone_from(&page.description);
            }
            self.fill_from_page(item, &page, lookups);
            item.merge_children(page.child_refs);
        }

        Ok(EpicRecord { epic, items })
    }

    /// Fills fields the listing left empty from page properties.
    fn fill_from_page(&self, item: &mut Item, page: &Page, lookups: &Lookups) {
        if item.reporter.is_none() {
            item.reporter = page.reporter().and_then(|name| lookups.user(name));
        }
        if item.assignee.is_none() {
            item.assignee = page
                .property(PageProperty::Assignee)
                .and_then(|name| lookups.user(name));
        }
        if item.priority.is_none() {
            item.priority = page
                .property(PageProperty::Priority)
                .map(|raw| self.priorities.normalize(raw));
        }
        if item.status.is_none() {
            item.status = page
                .property(PageProperty::Status)
                .and_then(|raw| lookups.status(raw));
        }
    }
}

/// Records every id of an epic, failing on one already taken.
fn claim_ids(seen: &mut HashMap<ItemId, String>, record: &EpicRecord) -> Result<()> {
    for item in std::iter::once(&record.epic).chain(&record.items) {
        if let Some(first) = seen.insert(item.id.clone(), item.title.clone()) {
            return Err(Error::Structural(format!(
                "id '{}' is shared by '{first}' and '{}' in epic '{}'; add an ID column or rename one",
                item.id, item.title, record.epic.title
            )));
        }
    }
    Ok(())
}

/// Item pages indexed by lower-cased file name.
struct ItemPages {
    pages: Vec<(String, PathBuf)>,
}

impl ItemPages {
    fn scan(dir: &Path) -> Result<Self> {
        let pages = list_files(dir, "md")?
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                (name, path)
            })
            .collect();
        Ok(Self { pages })
    }

    /// First page whose name starts with the title's leading characters.
    fn find(&self, title: &str) -> Option<&Path> {
        let prefix: String = title
            .chars()
            .take(PAGE_PREFIX_CHARS)
            .collect::<String>()
            .to_lowercase();
        if prefix.is_empty() {
            return None;
        }
        self.pages
            .iter()
            .find(|(name, _)| name.starts_with(&prefix))
            .map(|(_, path)| path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const EPIC_HEX: &str = "0123456789abcdef0123456789abcdef";

    fn export_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Epics").join(format!("Payments {EPIC_HEX}"))).unwrap();
        fs::create_dir_all(root.join("Items")).unwrap();
        fs::write(
            root.join("Epics").join(format!("Payments {EPIC_HEX}.md")),
            "# Payments\nCreated by: Ada\nAssignee: Grace\nDescription:\nAll payment work\n",
        )
        .unwrap();
        fs::write(
            root.join("Epics")
                .join(format!("Payments {EPIC_HEX}"))
                .join("Tasks.csv"),
            "Task name,ID,Type,Short Description\n\
             Checkout form,S-1,Story,Short text\n\
             Validate card number,T-1,Task,\n",
        )
        .unwrap();
        fs::write(
            root.join("Items").join("Checkout form fedcba9876543210.md"),
            "Priority: P0-Blocker\n\
             Child Tasks: Validate card number (Validate%20card%20number%20aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.md)\n\
             **Description:**\nFull checkout description\n",
        )
        .unwrap();
        fs::write(root.join("users.json"), r#"{"Ada": "ada@example.com"}"#).unwrap();
        dir
    }

    #[test]
    fn test_read_export() {
        let dir = export_root();
        let fields = FieldMapping::default();
        let priorities = PriorityTable::default();
        let snapshot = ExportReader::new(dir.path(), &fields, &priorities)
            .read()
            .unwrap();

        assert_eq!(snapshot.epics.len(), 1);
        assert_eq!(snapshot.item_count(), 3);

        let record = &snapshot.epics[0];
        assert_eq!(record.epic.title, "Payments");
        assert_eq!(record.epic.id.as_str(), EPIC_HEX);
        assert_eq!(record.epic.description, "All payment work");
        assert_eq!(record.epic.reporter.as_deref(), Some("ada@example.com"));
        assert_eq!(record.epic.assignee.as_deref(), Some("Grace"));

        let story = &record.items[0];
        assert_eq!(story.description, "Full checkout description");
        assert_eq!(story.priority.as_deref(), Some("Highest"));
        assert_eq!(story.children.len(), 1);
        assert_eq!(story.children[0].name, "Validate card number");

        let task = &record.items[1];
        assert_eq!(task.description, "");
        assert!(task.children.is_empty());
    }

    #[test]
    fn test_same_titles_in_two_epics_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Items")).unwrap();
        for epic in ["Alpha", "Beta"] {
            fs::create_dir_all(root.join("Epics").join(epic)).unwrap();
            fs::write(root.join("Epics").join(format!("{epic}.md")), "").unwrap();
            fs::write(
                root.join("Epics").join(epic).join("Tasks.csv"),
                "Task name,Type
Write tests,Story
",
            )
            .unwrap();
        }

        let fields = FieldMapping::default();
        let priorities = PriorityTable::default();
        let snapshot = ExportReader::new(root, &fields, &priorities).read().unwrap();

        let ids: Vec<_> = snapshot
            .epics
            .iter()
            .map(|record| record.items[0].id.as_str())
            .collect();
        assert_eq!(ids, vec!["alpha/write-tests", "beta/write-tests"]);
    }

    #[test]
    fn test_duplicate_ids_are_structural() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Epics").join("Alpha")).unwrap();
        fs::create_dir_all(root.join("Items")).unwrap();
        fs::write(root.join("Epics").join("Alpha.md"), "").unwrap();
        fs::write(
            root.join("Epics").join("Alpha").join("Tasks.csv"),
            "Task name,Type
Write tests,Story
Write tests,Task
",
        )
        .unwrap();

        let fields = FieldMapping::default();
        let priorities = PriorityTable::default();
        let err = ExportReader::new(root, &fields, &priorities)
            .read()
            .unwrap_err();
        assert!(matches!(err, Error::Structural(ref msg) if msg.contains("alpha/write-tests")));
    }

    #[test]
    fn test_missing_items_folder_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Epics")).unwrap();
        let fields = FieldMapping::default();
        let priorities = PriorityTable::default();
        let err = ExportReader::new(dir.path(), &fields, &priorities)
            .read()
            .unwrap_err();
        assert!(matches!(err, Error::Structural(ref msg) if msg.contains("Items/")));
    }

    #[test]
    fn test_epic_without_listing_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Epics")).unwrap();
        fs::create_dir_all(dir.path().join("Items")).unwrap();
        fs::write(dir.path().join("Epics").join("Solo.md"), "Just text").unwrap();

        let fields = FieldMapping::default();
        let priorities = PriorityTable::default();
        let snapshot = ExportReader::new(dir.path(), &fields, &priorities)
            .read()
            .unwrap();
        assert_eq!(snapshot.epics[0].epic.id.as_str(), "solo");
        assert!(snapshot.epics[0].items.is_empty());
    }

    #[test]
    fn test_item_page_prefix_match() {
        let pages = ItemPages {
            pages: vec![
                (
                    "a very long item title that exceeds the prefix limit 0123.md".to_string(),
                    PathBuf::from("long.md"),
                ),
                ("short 89ab.md".to_string(), PathBuf::from("short.md")),
            ],
        };
        assert_eq!(
            pages.find("A very long item title that exceeds the prefix: trimmed in file"),
            Some(Path::new("long.md"))
        );
        assert_eq!(pages.find("Short"), Some(Path::new("short.md")));
        assert_eq!(pages.find("Missing"), None);
    }
}
