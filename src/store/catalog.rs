use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::models::{Book, BookPatch, CatalogStats, SortKey};

use super::codec;
use super::error::{Result, StoreError, ValidationError};
use super::export::{self, ImportReport};
use super::validation::{check_isbn, check_year, is_valid_isbn, is_valid_year, require_text};

/// Owner of the in-memory catalog and its persistence file.
///
/// Every read hands out clones, so nothing outside the store can observe a
/// record after a delete or a reload replaced it. Changes live only in memory
/// until `save` or `close`; a store dropped while dirty makes one last attempt
/// to save.
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    books: Vec<Book>,
    /// Largest id ever handed out, including ids of deleted books.
    last_issued_id: i32,
    dirty: bool,
}

impl CatalogStore {
    /// Empty store bound to `path`, without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            books: Vec::new(),
            last_issued_id: 0,
            dirty: false,
        }
    }

    /// Bind to `path` and load whatever it holds. A missing file starts an
    /// empty catalog; an unreadable one does too, with a warning in the log.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        if let Err(err) = store.load() {
            warn!(path = %store.path.display(), error = %err, "starting with an empty catalog");
            store.books.clear();
            store.last_issued_id = 0;
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the catalog changed since it was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the in-memory catalog with the file contents. A missing file
    /// is an empty catalog, not an error.
    pub fn load(&mut self) -> Result<()> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no catalog file yet, starting empty");
                self.books.clear();
                self.last_issued_id = 0;
                self.dirty = false;
                return Ok(());
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };

        let decoded = codec::decode(&bytes).map_err(|reason| StoreError::Format {
            path: self.path.clone(),
            reason,
        })?;
        if decoded.truncated {
            warn!(
                path = %self.path.display(),
                kept = decoded.books.len(),
                "catalog file ends inside a record; the partial record was dropped"
            );
        }

        let max_live = decoded.books.iter().map(|b| b.id).max().unwrap_or(0);
        self.last_issued_id = decoded.last_issued_id.max(max_live);
        self.books = decoded.books;
        self.dirty = false;
        info!(path = %self.path.display(), books = self.books.len(), "catalog loaded");
        Ok(())
    }

    /// Overwrite the persistence file with the whole catalog. The parent
    /// directory is created on demand.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }

        let file = File::create(&self.path).map_err(|err| StoreError::io(&self.path, err))?;
        let mut out = BufWriter::new(file);
        codec::encode(&mut out, self.last_issued_id, &self.books)
            .and_then(|_| out.flush())
            .map_err(|err| StoreError::io(&self.path, err))?;

        self.dirty = false;
        info!(path = %self.path.display(), books = self.books.len(), "catalog saved");
        Ok(())
    }

    /// Release the store, saving first when anything changed. A clean store
    /// leaves the file alone, so a file that failed to load is never replaced
    /// by an empty catalog just because the session ended. Errors come back
    /// to the caller instead of being swallowed by `Drop`.
    pub fn close(mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let result = self.save();
        // Whatever happened, Drop must not try again.
        self.dirty = false;
        result
    }

    /// Validate and append a new, available book.
    pub fn create(
        &mut self,
        title: &str,
        author: &str,
        year: i32,
        isbn: &str,
        category: &str,
    ) -> Result<Book> {
        require_text(title, ValidationError::EmptyTitle)?;
        require_text(author, ValidationError::EmptyAuthor)?;
        check_year(year)?;
        check_isbn(isbn)?;
        if self.isbn_taken(isbn, None) {
            return Err(ValidationError::DuplicateIsbn(isbn.to_string()).into());
        }

        let book = Book {
            id: self.next_id()?,
            title: title.to_string(),
            author: author.to_string(),
            year,
            isbn: isbn.to_string(),
            category: category.to_string(),
            available: true,
        };
        self.last_issued_id = book.id;
        self.books.push(book.clone());
        self.dirty = true;
        debug!(id = book.id, isbn = %book.isbn, "book created");
        Ok(book)
    }

    pub fn find_by_id(&self, id: i32) -> Result<Book> {
        self.books
            .iter()
            .find(|book| book.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Case-insensitive substring search over titles, in catalog order.
    pub fn find_by_title(&self, query: &str) -> Vec<Book> {
        self.find_matching(query, |book| book.title.as_str())
    }

    /// Case-insensitive substring search over authors, in catalog order.
    pub fn find_by_author(&self, query: &str) -> Vec<Book> {
        self.find_matching(query, |book| book.author.as_str())
    }

    fn find_matching<F>(&self, query: &str, field: F) -> Vec<Book>
    where
        F: Fn(&Book) -> &str,
    {
        let needle = query.to_lowercase();
        self.books
            .iter()
            .filter(|book| field(book).to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Remove a book and hand back what was removed. Its id stays retired.
    pub fn delete(&mut self, id: i32) -> Result<Book> {
        let idx = self.position(id)?;
        let removed = self.books.remove(idx);
        self.dirty = true;
        debug!(id, "book deleted");
        Ok(removed)
    }

    /// Apply the non-blank parts of `patch`. An out-of-range year or an
    /// invalid or already-used ISBN is skipped without failing the update.
    pub fn update(&mut self, id: i32, patch: BookPatch) -> Result<Book> {
        let idx = self.position(id)?;

        let isbn = patch.isbn.filter(|isbn| !isbn.trim().is_empty());
        let isbn = match isbn {
            Some(isbn) if !is_valid_isbn(&isbn) => {
                debug!(id, %isbn, "ignoring malformed isbn in update");
                None
            }
            Some(isbn) if self.isbn_taken(&isbn, Some(id)) => {
                debug!(id, %isbn, "ignoring duplicate isbn in update");
                None
            }
            other => other,
        };
        let year = match patch.year {
            Some(year) if !is_valid_year(year) => {
                debug!(id, year, "ignoring out-of-range year in update");
                None
            }
            other => other,
        };

        let book = &mut self.books[idx];
        if let Some(title) = patch.title.filter(|v| !v.trim().is_empty()) {
            book.title = title;
        }
        if let Some(author) = patch.author.filter(|v| !v.trim().is_empty()) {
            book.author = author;
        }
        if let Some(year) = year {
            book.year = year;
        }
        if let Some(isbn) = isbn {
            book.isbn = isbn;
        }
        if let Some(category) = patch.category.filter(|v| !v.trim().is_empty()) {
            book.category = category;
        }

        self.dirty = true;
        Ok(book.clone())
    }

    pub fn sort_by_title(&mut self) {
        self.sort(SortKey::Title);
    }

    pub fn sort_by_author(&mut self) {
        self.sort(SortKey::Author);
    }

    pub fn sort_by_year(&mut self) {
        self.sort(SortKey::Year);
    }

    /// Ascending, stable reorder by one field. Text compares byte-wise.
    pub fn sort(&mut self, key: SortKey) {
        match key {
            SortKey::Title => self.sort_by(|a, b| a.title.cmp(&b.title)),
            SortKey::Author => self.sort_by(|a, b| a.author.cmp(&b.author)),
            SortKey::Year => self.sort_by(|a, b| a.year.cmp(&b.year)),
        }
        debug!(%key, "catalog sorted");
    }

    /// Stable reorder with a caller-supplied comparator.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Book, &Book) -> Ordering,
    {
        self.books.sort_by(compare);
        self.dirty = true;
    }

    /// Lend a book out.
    pub fn borrow(&mut self, id: i32) -> Result<()> {
        let idx = self.position(id)?;
        let book = &mut self.books[idx];
        if !book.available {
            return Err(StoreError::AlreadyBorrowed(id));
        }
        book.available = false;
        self.dirty = true;
        debug!(id, "book borrowed");
        Ok(())
    }

    /// Put a lent-out book back on the shelf.
    pub fn return_book(&mut self, id: i32) -> Result<()> {
        let idx = self.position(id)?;
        let book = &mut self.books[idx];
        if book.available {
            return Err(StoreError::AlreadyAvailable(id));
        }
        book.available = true;
        self.dirty = true;
        debug!(id, "book returned");
        Ok(())
    }

    pub fn count_total(&self) -> usize {
        self.books.len()
    }

    pub fn count_available(&self) -> usize {
        self.books.iter().filter(|book| book.available).count()
    }

    pub fn count_borrowed(&self) -> usize {
        self.count_total() - self.count_available()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total: self.count_total(),
            available: self.count_available(),
            borrowed: self.count_borrowed(),
        }
    }

    /// Snapshot of the catalog in its current order.
    pub fn books(&self) -> Vec<Book> {
        self.books.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Write the catalog to `path` as CSV, in current order.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|err| StoreError::io(path, err))?;
        export::write_csv(&mut BufWriter::new(file), &self.books)
            .map_err(|err| StoreError::io(path, err))?;
        info!(path = %path.display(), books = self.books.len(), "catalog exported");
        Ok(())
    }

    /// Add every acceptable row of a CSV file in export format. Ids in the
    /// file are ignored; each row is created fresh and, when marked
    /// `Borrowed`, lent out right after creation.
    pub fn import_csv(&mut self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| StoreError::io(path, err))?;
        let (rows, rejected) =
            export::read_csv(BufReader::new(file)).map_err(|err| StoreError::io(path, err))?;

        let mut report = ImportReport {
            skipped: rejected,
            ..ImportReport::default()
        };
        for row in rows {
            match self.create(&row.title, &row.author, row.year, &row.isbn, &row.category) {
                Ok(book) => {
                    if row.borrowed {
                        self.borrow(book.id)?;
                    }
                    report.imported.push(book.id);
                }
                Err(err) => report.skipped.push((row.line, err.to_string())),
            }
        }
        report.skipped.sort_by_key(|(line, _)| *line);

        info!(
            path = %path.display(),
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "csv import finished"
        );
        Ok(report)
    }

    fn position(&self, id: i32) -> Result<usize> {
        self.books
            .iter()
            .position(|book| book.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn isbn_taken(&self, isbn: &str, except: Option<i32>) -> bool {
        self.books
            .iter()
            .any(|book| book.isbn == isbn && Some(book.id) != except)
    }

    fn next_id(&self) -> Result<i32> {
        let max_live = self.books.iter().map(|b| b.id).max().unwrap_or(0);
        self.last_issued_id
            .max(max_live)
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted)
    }
}

impl Drop for CatalogStore {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        if let Err(err) = self.save() {
            warn!(path = %self.path.display(), error = %err, "failed to save catalog on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn scratch(dir: &TempDir) -> CatalogStore {
        CatalogStore::new(dir.path().join("catalog.bin"))
    }

    #[test]
    fn create_assigns_ids_and_availability() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let dune = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();
        assert_eq!(dune.id, 1);
        assert!(dune.available);

        let emma = store
            .create("Emma", "Austen", 1815, "9780141439587", "")
            .unwrap();
        assert_eq!(emma.id, 2);
        assert_eq!(store.count_total(), 2);
    }

    #[test]
    fn create_checks_fields_in_order() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let err = store.create(" ", "", 5, "bad", "").unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));

        let err = store.create("T", "", 5, "bad", "").unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyAuthor)));

        let err = store.create("T", "A", 5, "bad", "").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::YearOutOfRange(5))
        ));

        let err = store.create("T", "A", 2000, "bad", "").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidIsbn(_))
        ));
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn ids_are_never_reused_after_delete() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let first = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();
        let dup = store.create("Other", "Someone", 2000, "9780441013593", "");
        assert!(matches!(
            dup,
            Err(StoreError::Validation(ValidationError::DuplicateIsbn(_)))
        ));

        let removed = store.delete(first.id).unwrap();
        assert_eq!(removed, first);
        assert!(store.is_empty());

        let next = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn update_applies_valid_fields_and_skips_invalid_ones() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let dune = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();
        store
            .create("Emma", "Austen", 1815, "9780141439587", "")
            .unwrap();

        let updated = store
            .update(
                dune.id,
                BookPatch {
                    title: Some("Dune Messiah".into()),
                    author: Some("   ".into()),
                    year: Some(3000),
                    isbn: Some("9780141439587".into()),
                    category: Some("Classic".into()),
                },
            )
            .unwrap();

        assert_eq!(
            updated,
            Book {
                title: "Dune Messiah".into(),
                category: "Classic".into(),
                ..dune.clone()
            }
        );
        assert_eq!(store.find_by_id(dune.id).unwrap(), updated);
    }

    #[test]
    fn update_may_keep_its_own_isbn() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let dune = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();
        let updated = store
            .update(
                dune.id,
                BookPatch {
                    isbn: Some("978-0-441-01359-3".into()),
                    year: Some(1966),
                    ..BookPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.isbn, "978-0-441-01359-3");
        assert_eq!(updated.year, 1966);

        assert!(matches!(
            store.update(99, BookPatch::default()),
            Err(StoreError::NotFound(99))
        ));
    }

    #[test]
    fn lending_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        let dune = store
            .create("Dune", "Herbert", 1965, "9780441013593", "SciFi")
            .unwrap();

        assert!(matches!(
            store.return_book(dune.id),
            Err(StoreError::AlreadyAvailable(1))
        ));
        store.borrow(dune.id).unwrap();
        assert!(matches!(
            store.borrow(dune.id),
            Err(StoreError::AlreadyBorrowed(1))
        ));
        assert_eq!(
            store.stats(),
            CatalogStats {
                total: 1,
                available: 0,
                borrowed: 1,
            }
        );

        store.return_book(dune.id).unwrap();
        assert_eq!(store.find_by_id(dune.id).unwrap(), dune);
        assert!(matches!(store.borrow(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn search_is_case_insensitive_and_ordered() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        store
            .create("The Hobbit", "Tolkien", 1937, "9780547928227", "")
            .unwrap();
        store
            .create("Dune", "Herbert", 1965, "9780441013593", "")
            .unwrap();
        store
            .create("The Silmarillion", "J.R.R. TOLKIEN", 1977, "9780618391110", "")
            .unwrap();

        let titles: Vec<_> = store
            .find_by_title("THE")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["The Hobbit", "The Silmarillion"]);

        let ids: Vec<_> = store
            .find_by_author("tolkien")
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(store.find_by_title("").len(), 3);
        assert!(store.find_by_author("austen").is_empty());
    }

    #[test]
    fn sorts_are_stable() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        store.create("B", "X", 2001, "1000000001", "").unwrap();
        store.create("A", "Y", 2000, "1000000002", "").unwrap();
        store.create("B", "Z", 1999, "1000000003", "").unwrap();
        store.create("A", "W", 1999, "1000000004", "").unwrap();

        store.sort_by_year();
        let ids: Vec<_> = store.books().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);

        store.sort_by_title();
        let ids: Vec<_> = store.books().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);

        store.sort_by_author();
        let authors: Vec<_> = store.books().into_iter().map(|b| b.author).collect();
        assert_eq!(authors, vec!["W", "X", "Y", "Z"]);
    }

    #[test]
    fn title_sort_is_byte_wise() {
        let dir = tempdir().unwrap();
        let mut store = scratch(&dir);
        store.create("apple", "A", 2000, "1000000001", "").unwrap();
        store.create("Zebra", "A", 2000, "1000000002", "").unwrap();
        store.sort(SortKey::Title);
        assert_eq!(store.books()[0].title, "Zebra");
    }
}
