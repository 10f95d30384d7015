//! Domain models shared by the record store and the TUI. These types stay
//! light-weight data holders so the store can focus on invariants and the UI
//! on presentation. Every value that leaves the store is an owned copy, which
//! keeps the front end from holding on to storage a later delete could drop.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One catalog entry. The store assigns `id` and owns every live instance;
/// callers only ever see clones.
pub struct Book {
    /// Store-assigned identifier. Unique across live records and never reused
    /// once retired by a delete.
    pub id: i32,
    /// Title shown in lists and matched by title search.
    pub title: String,
    /// Author shown in lists and matched by author search.
    pub author: String,
    /// Publication year, kept numeric so sorting is numeric too.
    pub year: i32,
    /// ISBN-10, ISBN-13 or a hyphenated variant. Unique within the catalog.
    pub isbn: String,
    /// Free-form shelf category, may be empty.
    pub category: String,
    /// Lending state: `true` while on the shelf, `false` while lent out.
    pub available: bool,
}

impl Book {
    /// Literal used for the lending state in tables and CSV exports.
    pub fn status_label(&self) -> &'static str {
        if self.available {
            "Available"
        } else {
            "Borrowed"
        }
    }

    /// Render the record as one CSV row. Fields are joined verbatim, so a
    /// comma inside a title or category shifts the columns of that row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.id,
            self.title,
            self.author,
            self.year,
            self.isbn,
            self.category,
            self.status_label()
        )
    }

    /// `Title - Author` string used by confirmation dialogs and status lines.
    pub fn display_title(&self) -> String {
        if self.author.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.author)
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Title: {}, Author: {}, Year: {}, ISBN: {}, Category: {}, Status: {}",
            self.id,
            self.title,
            self.author,
            self.year,
            self.isbn,
            self.category,
            self.status_label()
        )
    }
}

/// Partial update applied by `CatalogStore::update`. `None` and blank values
/// both mean "keep the current value".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub category: Option<String>,
}

impl BookPatch {
    /// True when applying the patch could not change anything.
    pub fn is_empty(&self) -> bool {
        blank(&self.title)
            && blank(&self.author)
            && self.year.is_none()
            && blank(&self.isbn)
            && blank(&self.category)
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Fields the catalog can be reordered by.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Author,
    Year,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::Title => "title",
            SortKey::Author => "author",
            SortKey::Year => "year",
        };
        f.write_str(label)
    }
}

/// Lending counters derived from the current catalog.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub total: usize,
    pub available: usize,
    pub borrowed: usize,
}
