use std::mem;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{Book, SortKey};
use crate::store::{CatalogStore, StoreError, MAX_YEAR, MIN_YEAR};

use super::forms::{BookField, BookForm, ConfirmBookDelete, Prompt, PromptKind};
use super::helpers::{centered_rect, surface_error, window_start};
use super::screens::{CatalogScreen, Filter, SearchTarget};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows moved by PageUp/PageDown.
const PAGE_STEP: isize = 10;

/// Fine-grained modes layered over the catalog table. Keeping this explicit
/// makes it easy to reason about which popup is drawn and what keys do.
enum Mode {
    Normal,
    AddingBook(BookForm),
    EditingBook { id: i32, form: BookForm },
    ConfirmDelete(ConfirmBookDelete),
    Searching(SearchState),
    Prompting(Prompt),
    Statistics,
}

/// State for an active inline search.
struct SearchState {
    target: SearchTarget,
    query: String,
}

impl SearchState {
    fn filter(&self) -> Option<Filter> {
        if self.query.is_empty() {
            None
        } else {
            Some(Filter {
                target: self.target,
                query: self.query.clone(),
            })
        }
    }
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state. The app owns the only `CatalogStore`; hand it
/// back with `into_store` so the caller can close (and save) it.
pub struct App {
    store: CatalogStore,
    settings: Settings,
    catalog: CatalogScreen,
    mode: Mode,
    status: Option<StatusMessage>,
    last_export: Option<PathBuf>,
    saved_search: Option<SearchState>,
}

impl App {
    pub fn new(store: CatalogStore, settings: Settings) -> Self {
        let catalog = CatalogScreen::new(&store);
        let mut app = Self {
            store,
            settings,
            catalog,
            mode: Mode::Normal,
            status: None,
            last_export: None,
            saved_search: None,
        };
        let total = app.store.count_total();
        app.set_status(
            format!("Loaded {total} books from {}.", app.store.path().display()),
            StatusKind::Info,
        );
        app
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn into_store(self) -> CatalogStore {
        self.store
    }

    /// Feed one key press through the current mode. Returns `true` when the
    /// user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingBook(form) => self.handle_add_book(code, form)?,
            Mode::EditingBook { id, form } => self.handle_edit_book(code, id, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::Prompting(prompt) => self.handle_prompt(code, prompt)?,
            Mode::Statistics => match code {
                KeyCode::Char('q') => {
                    exit = true;
                    Mode::Normal
                }
                _ => Mode::Normal,
            },
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if self.catalog.filter.is_some() {
                    self.catalog.set_filter(None, &self.store);
                    self.set_status("Search cleared.", StatusKind::Info);
                } else {
                    *exit = true;
                }
            }
            KeyCode::Up => self.catalog.move_selection(-1),
            KeyCode::Down => self.catalog.move_selection(1),
            KeyCode::PageUp => self.catalog.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.catalog.move_selection(PAGE_STEP),
            KeyCode::Home => self.catalog.select_first(),
            KeyCode::End => self.catalog.select_last(),
            KeyCode::Char('+') | KeyCode::Char('n') => {
                self.clear_status();
                return Ok(Mode::AddingBook(BookForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::Enter => {
                if let Some(book) = self.catalog.current_book().cloned() {
                    self.clear_status();
                    return Ok(Mode::EditingBook {
                        id: book.id,
                        form: BookForm::from_book(&book),
                    });
                }
                self.set_status("No book selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(book) = self.catalog.current_book().cloned() {
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(ConfirmBookDelete { book }));
                }
                self.set_status("No book selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('b') | KeyCode::Char('B') => self.borrow_selected(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.return_selected(),
            KeyCode::Char('f') | KeyCode::Char('/') => {
                let state = match self.catalog.filter.clone() {
                    Some(filter) => SearchState {
                        target: filter.target,
                        query: filter.query,
                    },
                    None => SearchState {
                        target: SearchTarget::Title,
                        query: String::new(),
                    },
                };
                return Ok(Mode::Searching(state));
            }
            KeyCode::Char('g') | KeyCode::Char('G') => {
                return Ok(Mode::Prompting(Prompt::new(PromptKind::GoTo)));
            }
            KeyCode::Char('t') | KeyCode::Char('T') => self.sort_catalog(SortKey::Title),
            KeyCode::Char('a') | KeyCode::Char('A') => self.sort_catalog(SortKey::Author),
            KeyCode::Char('y') | KeyCode::Char('Y') => self.sort_catalog(SortKey::Year),
            KeyCode::Char('x') | KeyCode::Char('X') => {
                return Ok(Mode::Prompting(Prompt::new(PromptKind::Export)));
            }
            KeyCode::Char('i') | KeyCode::Char('I') => {
                return Ok(Mode::Prompting(Prompt::new(PromptKind::Import)));
            }
            KeyCode::Char('o') | KeyCode::Char('O') => self.open_last_export(),
            KeyCode::Char('s') | KeyCode::Char('S') => return Ok(Mode::Statistics),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add_book(&mut self, code: KeyCode, mut form: BookForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add book cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_book(&form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::AddingBook(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_book(&mut self, code: KeyCode, id: i32, mut form: BookForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_book(id, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingBook { id, form })
        } else if let Some(state) = self.saved_search.take() {
            Ok(Mode::Searching(state))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmBookDelete) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.store.delete(confirm.book.id) {
                    Ok(removed) => {
                        self.catalog.refresh(&self.store);
                        info!(id = removed.id, title = %removed.title, "deleted from the catalog");
                        self.set_status(
                            format!("Deleted '{}'.", removed.display_title()),
                            StatusKind::Info,
                        );
                        Ok(Mode::Normal)
                    }
                    Err(err) => {
                        self.report_store_error(&err);
                        Ok(Mode::Normal)
                    }
                }
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.catalog.set_filter(None, &self.store);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                let shown = self.catalog.rows.len();
                if self.catalog.filter.is_some() {
                    self.set_status(format!("{shown} matching books."), StatusKind::Info);
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Up => {
                self.catalog.move_selection(-1);
                return Ok(Mode::Searching(state));
            }
            KeyCode::Down => {
                self.catalog.move_selection(1);
                return Ok(Mode::Searching(state));
            }
            KeyCode::PageUp => {
                self.catalog.move_selection(-PAGE_STEP);
                return Ok(Mode::Searching(state));
            }
            KeyCode::PageDown => {
                self.catalog.move_selection(PAGE_STEP);
                return Ok(Mode::Searching(state));
            }
            KeyCode::Tab | KeyCode::BackTab => state.target = state.target.toggled(),
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    state.query.push(ch);
                }
            }
            _ => return Ok(Mode::Searching(state)),
        }

        self.catalog.set_filter(state.filter(), &self.store);
        Ok(Mode::Searching(state))
    }

    fn handle_prompt(&mut self, code: KeyCode, mut prompt: Prompt) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", prompt.kind.title()), StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Backspace => {
                prompt.backspace();
                Ok(Mode::Prompting(prompt))
            }
            KeyCode::Char(ch) => {
                if prompt.push_char(ch) {
                    prompt.error = None;
                }
                Ok(Mode::Prompting(prompt))
            }
            KeyCode::Enter => {
                let outcome = match prompt.kind {
                    PromptKind::Export => self.export_catalog(&prompt),
                    PromptKind::Import => self.import_catalog(&prompt),
                    PromptKind::GoTo => self.go_to_book(&prompt),
                };
                match outcome {
                    Ok(()) => Ok(Mode::Normal),
                    Err(err) => {
                        let message = surface_error(&err);
                        prompt.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                        Ok(Mode::Prompting(prompt))
                    }
                }
            }
            _ => Ok(Mode::Prompting(prompt)),
        }
    }

    /// Ctrl+E while searching jumps straight into editing the highlighted
    /// book, and returns to the same search afterwards.
    pub(crate) fn handle_ctrl_e(&mut self) -> Result<()> {
        if !matches!(self.mode, Mode::Searching(_)) {
            return Ok(());
        }

        let previous = mem::replace(&mut self.mode, Mode::Normal);
        if let Mode::Searching(state) = previous {
            self.saved_search = Some(state);
        }

        if let Some(book) = self.catalog.current_book().cloned() {
            self.mode = Mode::EditingBook {
                id: book.id,
                form: BookForm::from_book(&book),
            };
        } else {
            self.set_status("No book selected to edit.", StatusKind::Error);
            if let Some(state) = self.saved_search.take() {
                self.mode = Mode::Searching(state);
            }
        }
        Ok(())
    }

    /// Ctrl+S writes the catalog file immediately.
    pub(crate) fn handle_ctrl_s(&mut self) -> Result<()> {
        match self.store.save() {
            Ok(()) => {
                let total = self.store.count_total();
                self.set_status(format!("Saved {total} books."), StatusKind::Info);
            }
            Err(err) => self.report_store_error(&err),
        }
        Ok(())
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        self.draw_catalog(frame, content_area);

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingBook(form) => self.draw_book_form(frame, area, "Add Book", form),
            Mode::EditingBook { form, .. } => self.draw_book_form(frame, area, "Edit Book", form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Prompting(prompt) => self.draw_prompt(frame, area, prompt),
            Mode::Statistics => self.draw_statistics(frame, area),
            Mode::Normal => {}
        }
    }

    fn draw_catalog(&self, frame: &mut Frame, area: Rect) {
        let mut title = format!("Library Catalog • {} books", self.store.count_total());
        if let Some(filter) = &self.catalog.filter {
            title.push_str(&format!(
                " • {} contains \"{}\" ({} shown)",
                filter.target.label(),
                filter.query,
                self.catalog.rows.len()
            ));
        }
        let block = Block::default().title(title).borders(Borders::ALL);

        if self.catalog.rows.is_empty() {
            let message = if self.catalog.filter.is_some() {
                "No books match the search."
            } else {
                "No books yet. Press '+' to add one."
            };
            let paragraph = Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(["ID", "Title", "Author", "Year", "ISBN", "Category", "Status"])
            .style(Style::default().add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        // Borders plus the header row and its margin.
        let capacity = area.height.saturating_sub(4) as usize;
        let start = window_start(self.catalog.selected, self.catalog.rows.len(), capacity);
        let end = (start + capacity.max(1)).min(self.catalog.rows.len());

        let rows: Vec<Row> = self.catalog.rows[start..end]
            .iter()
            .map(|book| {
                let status_style = if book.available {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                };
                Row::new(vec![
                    Cell::from(book.id.to_string()),
                    Cell::from(book.title.clone()),
                    Cell::from(book.author.clone()),
                    Cell::from(book.year.to_string()),
                    Cell::from(book.isbn.clone()),
                    Cell::from(book.category.clone()),
                    Cell::from(book.status_label()).style(status_style),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Percentage(20),
            Constraint::Length(6),
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Length(10),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");

        let mut state = TableState::default();
        state.select(Some(self.catalog.selected - start));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&str, &str)] = match &self.mode {
            Mode::AddingBook(_) | Mode::EditingBook { .. } => &[
                ("[Tab]", " Next Field   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::ConfirmDelete(_) => &[("[y]", " Delete   "), ("[n]", " Keep")],
            Mode::Searching(_) => &[
                ("[Tab]", " Title/Author   "),
                ("[↑↓]", " Navigate   "),
                ("[Ctrl+E]", " Edit   "),
                ("[Enter]", " Keep Filter   "),
                ("[Esc]", " Clear"),
            ],
            Mode::Prompting(_) => &[("[Enter]", " Confirm   "), ("[Esc]", " Cancel")],
            Mode::Statistics => &[("[any key]", " Close")],
            Mode::Normal => &[
                ("[+]", " Add   "),
                ("[e]", " Edit   "),
                ("[-]", " Delete   "),
                ("[b/r]", " Borrow/Return   "),
                ("[f]", " Search   "),
                ("[g]", " Go to ID   "),
                ("[t/a/y]", " Sort   "),
                ("[x/i]", " Export/Import   "),
                ("[s]", " Stats   "),
                ("[q]", " Quit"),
            ],
        };

        let spans: Vec<Span<'static>> = keys
            .iter()
            .flat_map(|(key, label)| {
                [
                    Span::styled(key.to_string(), key_style),
                    Span::raw(label.to_string()),
                ]
            })
            .collect();
        Line::from(spans)
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = format!("{}: ", state.target.label());
        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("{prefix}{}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + prefix.len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_book_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &BookForm) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = BookField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            let hint = if form.editing {
                "Blank fields keep their value • Enter to save • Esc to cancel".to_string()
            } else {
                format!("Year {MIN_YEAR}-{MAX_YEAR} • Enter to save • Esc to cancel")
            };
            lines.push(Line::from(Span::styled(
                hint,
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (column, row) = form.cursor_offset();
        frame.set_cursor_position((inner.x + column, inner.y + row));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmBookDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Book").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(Span::styled(
                format!("Delete '{}'?", confirm.book.display_title()),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "ID {} • ISBN {} • {}",
                confirm.book.id,
                confirm.book.isbn,
                confirm.book.status_label()
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Its ID will not be reused. Press y to delete or n to keep it.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, prompt: &Prompt) {
        let popup_area = centered_rect(60, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(prompt.kind.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let prefix = format!("{}: ", prompt.kind.label());
        let mut lines = vec![
            Line::from(vec![
                Span::raw(prefix.clone()),
                Span::styled(prompt.value.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
        ];
        if let Some(error) = &prompt.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else if prompt.kind != PromptKind::GoTo {
            lines.push(Line::from(Span::styled(
                format!(
                    "Relative names are placed in {}",
                    self.settings.export_dir.display()
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + prefix.len() as u16 + prompt.value.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_statistics(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(40, 30, area);
        frame.render_widget(Clear, popup_area);

        let stats = self.store.stats();
        let block = Block::default()
            .title("Library Statistics")
            .borders(Borders::ALL);
        let lines = vec![
            Line::from(format!("Total books:     {}", stats.total)),
            Line::from(Span::styled(
                format!("Available books: {}", stats.available),
                Style::default().fg(Color::Green),
            )),
            Line::from(Span::styled(
                format!("Borrowed books:  {}", stats.borrowed),
                Style::default().fg(Color::Red),
            )),
        ];
        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, popup_area);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// Show a store error in the footer. Anything beyond bad input or a
    /// lending conflict also goes to the log.
    fn report_store_error(&mut self, err: &StoreError) {
        if !err.is_recoverable_input() {
            warn!(error = %err, "catalog operation failed");
        }
        self.set_status(err.to_string(), StatusKind::Error);
    }

    fn save_new_book(&mut self, form: &BookForm) -> Result<()> {
        let new = form.parse_new()?;
        let book = self
            .store
            .create(&new.title, &new.author, new.year, &new.isbn, &new.category)?;
        self.catalog.refresh(&self.store);
        self.catalog.focus(book.id);
        self.set_status(
            format!("Book added successfully with ID: {}.", book.id),
            StatusKind::Info,
        );
        Ok(())
    }

    /// Apply an edit. The store drops an invalid year or ISBN without failing,
    /// so the footer points out which requested values were not taken.
    fn save_existing_book(&mut self, id: i32, form: &BookForm) -> Result<()> {
        let patch = form.to_patch()?;
        let updated = self.store.update(id, patch.clone())?;
        self.catalog.refresh(&self.store);
        self.catalog.focus(id);

        let mut kept = Vec::new();
        if patch.year.is_some_and(|year| year != updated.year) {
            kept.push("year");
        }
        if patch.isbn.as_deref().is_some_and(|isbn| isbn != updated.isbn) {
            kept.push("ISBN");
        }
        if kept.is_empty() {
            self.set_status(format!("Updated '{}'.", updated.title), StatusKind::Info);
        } else {
            self.set_status(
                format!(
                    "Updated '{}'; kept current {} (invalid or already in use).",
                    updated.title,
                    kept.join(" and ")
                ),
                StatusKind::Info,
            );
        }
        Ok(())
    }

    fn borrow_selected(&mut self) {
        let Some(book) = self.catalog.current_book().cloned() else {
            self.set_status("No book selected to borrow.", StatusKind::Error);
            return;
        };
        match self.store.borrow(book.id) {
            Ok(()) => {
                self.catalog.refresh(&self.store);
                self.set_status(
                    format!("Book '{}' borrowed successfully.", book.title),
                    StatusKind::Info,
                );
            }
            Err(err) => self.report_store_error(&err),
        }
    }

    fn return_selected(&mut self) {
        let Some(book) = self.catalog.current_book().cloned() else {
            self.set_status("No book selected to return.", StatusKind::Error);
            return;
        };
        match self.store.return_book(book.id) {
            Ok(()) => {
                self.catalog.refresh(&self.store);
                self.set_status(
                    format!("Book '{}' returned successfully.", book.title),
                    StatusKind::Info,
                );
            }
            Err(err) => self.report_store_error(&err),
        }
    }

    fn sort_catalog(&mut self, key: SortKey) {
        self.store.sort(key);
        self.catalog.refresh(&self.store);
        self.set_status(format!("Books sorted by {key}."), StatusKind::Info);
    }

    fn export_catalog(&mut self, prompt: &Prompt) -> Result<()> {
        let path = self.settings.csv_path(&prompt.file_name()?)?;
        self.store
            .export_csv(&path)
            .map_err(|err| anyhow!("Export failed: {err}"))?;
        self.set_status(
            format!(
                "Exported {} books to {} (press o to open).",
                self.store.count_total(),
                path.display()
            ),
            StatusKind::Info,
        );
        self.last_export = Some(path);
        Ok(())
    }

    fn import_catalog(&mut self, prompt: &Prompt) -> Result<()> {
        let path = self.settings.csv_path(&prompt.file_name()?)?;
        let report = self
            .store
            .import_csv(&path)
            .map_err(|err| anyhow!("Import failed: {err}"))?;
        self.catalog.refresh(&self.store);
        if let Some(id) = report.imported.first() {
            self.catalog.focus(*id);
        }
        for (line, reason) in &report.skipped {
            info!(line, %reason, "import row skipped");
        }
        let kind = if report.imported.is_empty() && !report.skipped.is_empty() {
            StatusKind::Error
        } else {
            StatusKind::Info
        };
        self.set_status(report.summary(), kind);
        Ok(())
    }

    fn go_to_book(&mut self, prompt: &Prompt) -> Result<()> {
        let id = prompt.id()?;
        let book: Book = self.store.find_by_id(id)?;
        if !self.catalog.focus(id) {
            self.catalog.set_filter(None, &self.store);
            self.catalog.focus(id);
        }
        self.set_status(book.to_string(), StatusKind::Info);
        Ok(())
    }

    fn open_last_export(&mut self) {
        let Some(path) = self.last_export.clone() else {
            self.set_status("Nothing exported yet. Press x to export.", StatusKind::Error);
            return;
        };
        match open_path(&path) {
            Ok(()) => self.set_status(format!("Opened {}.", path.display()), StatusKind::Info),
            Err(err) => self.set_status(format!("Failed to open export: {err}"), StatusKind::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn app_in(dir: &TempDir) -> App {
        let settings = Settings {
            data_file: dir.path().join("catalog.bin"),
            export_dir: dir.path().to_path_buf(),
            log_file: dir.path().join("catalog.log"),
            log_level: "info".to_string(),
        };
        let store = CatalogStore::open(&settings.data_file);
        App::new(store, settings)
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn add_book(app: &mut App, fields: [&str; 5]) {
        app.handle_key(KeyCode::Char('+')).unwrap();
        for (idx, value) in fields.iter().enumerate() {
            if idx > 0 {
                app.handle_key(KeyCode::Tab).unwrap();
            }
            type_text(app, value);
        }
        app.handle_key(KeyCode::Enter).unwrap();
    }

    fn status(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    #[test]
    fn add_borrow_and_return_through_keys() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", "SciFi"]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status(&app), "Book added successfully with ID: 1.");

        app.handle_key(KeyCode::Char('b')).unwrap();
        assert_eq!(app.store().count_borrowed(), 1);
        app.handle_key(KeyCode::Char('b')).unwrap();
        assert_eq!(status(&app), "Book 1 is already borrowed.");
        app.handle_key(KeyCode::Char('r')).unwrap();
        assert_eq!(app.store().count_available(), 1);
    }

    #[test]
    fn unparseable_year_shows_form_message() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", ""]);

        app.handle_key(KeyCode::Char('e')).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(&mut app, "99999999999");
        app.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(status(&app), "Year must be a number.");
        assert!(matches!(app.mode, Mode::EditingBook { .. }));
        assert_eq!(app.store().find_by_id(1).unwrap().year, 1965);
    }

    #[test]
    fn blank_export_name_is_rejected() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.handle_key(KeyCode::Char('x')).unwrap();
        type_text(&mut app, "   ");
        app.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(status(&app), "A file name is required.");
        assert!(matches!(app.mode, Mode::Prompting(_)));
    }

    #[test]
    fn invalid_add_keeps_form_open() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "12", ""]);
        match &app.mode {
            Mode::AddingBook(form) => {
                assert_eq!(form.error.as_deref(), Some("Invalid ISBN format: 12"))
            }
            _ => panic!("form should stay open"),
        }
        assert!(app.store().is_empty());
    }

    #[test]
    fn delete_requires_confirmation() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", ""]);

        app.handle_key(KeyCode::Char('-')).unwrap();
        app.handle_key(KeyCode::Char('n')).unwrap();
        assert_eq!(app.store().count_total(), 1);

        app.handle_key(KeyCode::Char('-')).unwrap();
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert!(app.store().is_empty());
    }

    #[test]
    fn edit_reports_ignored_year() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", ""]);

        app.handle_key(KeyCode::Char('e')).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        for _ in 0..4 {
            app.handle_key(KeyCode::Backspace).unwrap();
        }
        type_text(&mut app, "3000");
        app.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(
            status(&app),
            "Updated 'Dune'; kept current year (invalid or already in use)."
        );
        assert_eq!(app.store().find_by_id(1).unwrap().year, 1965);
    }

    #[test]
    fn search_filters_then_escape_clears() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", ""]);
        add_book(&mut app, ["Emma", "Austen", "1815", "9780141439587", ""]);

        app.handle_key(KeyCode::Char('f')).unwrap();
        type_text(&mut app, "em");
        assert_eq!(app.catalog.rows.len(), 1);

        app.handle_key(KeyCode::Tab).unwrap();
        assert!(app.catalog.rows.is_empty());

        app.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(app.catalog.rows.len(), 2);
    }

    #[test]
    fn export_then_import_into_fresh_catalog() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        add_book(&mut app, ["Dune", "Herbert", "1965", "9780441013593", "SciFi"]);
        app.handle_key(KeyCode::Char('b')).unwrap();

        app.handle_key(KeyCode::Char('x')).unwrap();
        type_text(&mut app, "books");
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(Path::new(&dir.path().join("books.csv")).exists());

        let other = tempdir().unwrap();
        let mut fresh = app_in(&other);
        fresh.handle_key(KeyCode::Char('i')).unwrap();
        type_text(&mut fresh, dir.path().join("books.csv").to_str().unwrap());
        fresh.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(status(&fresh), "Imported 1 books.");
        assert_eq!(fresh.store().count_borrowed(), 1);
    }

    #[test]
    fn quit_keys_exit() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
        assert!(app.handle_key(KeyCode::Esc).unwrap());
    }
}
