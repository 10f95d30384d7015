use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Book, BookPatch};

/// Values collected by the add form, ready for `CatalogStore::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewBook {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) year: i32,
    pub(crate) isbn: String,
    pub(crate) category: String,
}

/// Internal representation of the book form fields, shared by add and edit.
#[derive(Default, Clone)]
pub(crate) struct BookForm {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) year: String,
    pub(crate) isbn: String,
    pub(crate) category: String,
    pub(crate) active: BookField,
    pub(crate) error: Option<String>,
    /// Edit forms treat blank fields as "keep the current value".
    pub(crate) editing: bool,
}

/// Fields available within the book form, in focus order.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum BookField {
    #[default]
    Title,
    Author,
    Year,
    Isbn,
    Category,
}

impl BookField {
    pub(crate) const ALL: [BookField; 5] = [
        BookField::Title,
        BookField::Author,
        BookField::Year,
        BookField::Isbn,
        BookField::Category,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            BookField::Title => "Title",
            BookField::Author => "Author",
            BookField::Year => "Year",
            BookField::Isbn => "ISBN",
            BookField::Category => "Category",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

impl BookForm {
    /// Populate the form from an existing book when editing.
    pub(crate) fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year.to_string(),
            isbn: book.isbn.clone(),
            category: book.category.clone(),
            active: BookField::Title,
            error: None,
            editing: true,
        }
    }

    pub(crate) fn next_field(&mut self) {
        let idx = (self.active.index() + 1) % BookField::ALL.len();
        self.active = BookField::ALL[idx];
    }

    pub(crate) fn previous_field(&mut self) {
        let len = BookField::ALL.len();
        let idx = (self.active.index() + len - 1) % len;
        self.active = BookField::ALL[idx];
    }

    fn value(&self, field: BookField) -> &String {
        match field {
            BookField::Title => &self.title,
            BookField::Author => &self.author,
            BookField::Year => &self.year,
            BookField::Isbn => &self.isbn,
            BookField::Category => &self.category,
        }
    }

    fn value_mut(&mut self, field: BookField) -> &mut String {
        match field {
            BookField::Title => &mut self.title,
            BookField::Author => &mut self.author,
            BookField::Year => &mut self.year,
            BookField::Isbn => &mut self.isbn,
            BookField::Category => &mut self.category,
        }
    }

    /// Append a character to the active field. The year only takes digits.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if self.active == BookField::Year && !ch.is_ascii_digit() {
            return false;
        }
        let field = self.active;
        self.value_mut(field).push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    /// Validate the add form. The store repeats the real checks; this only
    /// turns text into typed values and catches missing input early.
    pub(crate) fn parse_new(&self) -> Result<NewBook> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Title is required."));
        }
        let author = self.author.trim();
        if author.is_empty() {
            return Err(anyhow!("Author is required."));
        }
        let year_raw = self.year.trim();
        if year_raw.is_empty() {
            return Err(anyhow!("Year is required."));
        }
        let year = year_raw
            .parse::<i32>()
            .context("Year must be a number.")?;
        let isbn = self.isbn.trim();
        if isbn.is_empty() {
            return Err(anyhow!("ISBN is required."));
        }
        Ok(NewBook {
            title: title.to_string(),
            author: author.to_string(),
            year,
            isbn: isbn.to_string(),
            category: self.category.trim().to_string(),
        })
    }

    /// Build the patch for an edit. Blank fields stay out of the patch.
    pub(crate) fn to_patch(&self) -> Result<BookPatch> {
        let text = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        let year = match self.year.trim() {
            "" => None,
            raw => Some(raw.parse::<i32>().context("Year must be a number.")?),
        };
        Ok(BookPatch {
            title: text(&self.title),
            author: text(&self.author),
            year,
            isbn: text(&self.isbn),
            category: text(&self.category),
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field: BookField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let placeholder = if self.editing {
            "<keep>"
        } else if field == BookField::Category {
            "<optional>"
        } else {
            "<required>"
        };
        let display = if value.is_empty() {
            placeholder.to_string()
        } else {
            value.clone()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label())),
            Span::styled(display, style),
        ])
    }

    /// Cursor column and row offset for the active field.
    pub(crate) fn cursor_offset(&self) -> (u16, u16) {
        let field = self.active;
        let prefix = field.label().len() + 2;
        let column = prefix + self.value(field).chars().count();
        (column as u16, field.index() as u16)
    }
}

/// State for confirming a permanent delete.
#[derive(Clone)]
pub(crate) struct ConfirmBookDelete {
    pub(crate) book: Book,
}

/// What a single-line prompt is collecting.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum PromptKind {
    Export,
    Import,
    GoTo,
}

impl PromptKind {
    pub(crate) fn title(self) -> &'static str {
        match self {
            PromptKind::Export => "Export to CSV",
            PromptKind::Import => "Import from CSV",
            PromptKind::GoTo => "Go to ID",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            PromptKind::Export | PromptKind::Import => "File",
            PromptKind::GoTo => "ID",
        }
    }
}

/// One-field prompt used for file names and id lookups.
#[derive(Clone)]
pub(crate) struct Prompt {
    pub(crate) kind: PromptKind,
    pub(crate) value: String,
    pub(crate) error: Option<String>,
}

impl Prompt {
    pub(crate) fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            value: String::new(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() || (self.kind == PromptKind::GoTo && !ch.is_ascii_digit()) {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value.pop();
    }

    /// Non-blank text value for file prompts.
    pub(crate) fn file_name(&self) -> Result<String> {
        let name = self.value.trim();
        if name.is_empty() {
            return Err(anyhow!("A file name is required."));
        }
        Ok(name.to_string())
    }

    /// Numeric value for the go-to prompt.
    pub(crate) fn id(&self) -> Result<i32> {
        let raw = self.value.trim();
        if raw.is_empty() {
            return Err(anyhow!("Enter a book ID."));
        }
        raw.parse::<i32>().context("ID must be a number.")
    }
}
