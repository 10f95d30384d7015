use crate::models::Book;
use crate::store::CatalogStore;

/// Which field an active search matches against.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum SearchTarget {
    Title,
    Author,
}

impl SearchTarget {
    pub(crate) fn toggled(self) -> Self {
        match self {
            SearchTarget::Title => SearchTarget::Author,
            SearchTarget::Author => SearchTarget::Title,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            SearchTarget::Title => "Title",
            SearchTarget::Author => "Author",
        }
    }
}

/// Query applied to the catalog table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Filter {
    pub(crate) target: SearchTarget,
    pub(crate) query: String,
}

/// Snapshot of the catalog as the table shows it. Rows are copies taken from
/// the store, refreshed after every change.
pub(crate) struct CatalogScreen {
    pub(crate) rows: Vec<Book>,
    pub(crate) filter: Option<Filter>,
    pub(crate) selected: usize,
}

impl CatalogScreen {
    pub(crate) fn new(store: &CatalogStore) -> Self {
        let mut screen = Self {
            rows: Vec::new(),
            filter: None,
            selected: 0,
        };
        screen.refresh(store);
        screen
    }

    /// Re-read rows from the store, keeping the selection on the same book
    /// when it is still visible.
    pub(crate) fn refresh(&mut self, store: &CatalogStore) {
        let focus = self.current_book().map(|book| book.id);
        self.rows = match &self.filter {
            Some(filter) => match filter.target {
                SearchTarget::Title => store.find_by_title(&filter.query),
                SearchTarget::Author => store.find_by_author(&filter.query),
            },
            None => store.books(),
        };
        match focus {
            Some(id) if self.focus(id) => {}
            _ => self.ensure_in_bounds(),
        }
    }

    pub(crate) fn set_filter(&mut self, filter: Option<Filter>, store: &CatalogStore) {
        self.filter = filter;
        self.selected = 0;
        self.refresh(store);
    }

    /// Move the selection onto `id`. Returns false when that book is not in
    /// the current rows.
    pub(crate) fn focus(&mut self, id: i32) -> bool {
        match self.rows.iter().position(|book| book.id == id) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    pub(crate) fn current_book(&self) -> Option<&Book> {
        self.rows.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len() as isize;
        let new = (self.selected as isize + offset).clamp(0, len - 1);
        self.selected = new as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    pub(crate) fn ensure_in_bounds(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded(dir: &tempfile::TempDir) -> CatalogStore {
        let mut store = CatalogStore::new(dir.path().join("catalog.bin"));
        store
            .create("The Hobbit", "Tolkien", 1937, "9780547928227", "")
            .unwrap();
        store
            .create("Dune", "Herbert", 1965, "9780441013593", "")
            .unwrap();
        store
            .create("Emma", "Austen", 1815, "9780141439587", "")
            .unwrap();
        store
    }

    #[test]
    fn filter_narrows_rows() {
        let dir = tempdir().unwrap();
        let store = seeded(&dir);
        let mut screen = CatalogScreen::new(&store);
        assert_eq!(screen.rows.len(), 3);

        screen.set_filter(
            Some(Filter {
                target: SearchTarget::Author,
                query: "AUST".into(),
            }),
            &store,
        );
        assert_eq!(screen.rows.len(), 1);
        assert_eq!(screen.current_book().unwrap().title, "Emma");

        screen.set_filter(None, &store);
        assert_eq!(screen.rows.len(), 3);
    }

    #[test]
    fn refresh_keeps_selection_on_the_same_book() {
        let dir = tempdir().unwrap();
        let mut store = seeded(&dir);
        let mut screen = CatalogScreen::new(&store);
        screen.move_selection(1);
        assert_eq!(screen.current_book().unwrap().id, 2);

        store.sort_by_title();
        screen.refresh(&store);
        assert_eq!(screen.current_book().unwrap().id, 2);

        store.delete(2).unwrap();
        screen.refresh(&store);
        assert!(screen.selected < screen.rows.len());
    }

    #[test]
    fn selection_is_clamped() {
        let dir = tempdir().unwrap();
        let store = seeded(&dir);
        let mut screen = CatalogScreen::new(&store);
        screen.move_selection(-5);
        assert_eq!(screen.selected, 0);
        screen.move_selection(50);
        assert_eq!(screen.selected, 2);
        screen.select_first();
        assert_eq!(screen.selected, 0);
        screen.select_last();
        assert_eq!(screen.selected, 2);
    }
}
