use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use super::app::App;

/// How long to wait for input before redrawing the catalog table.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Show the catalog full-screen until the user quits with `q`, Esc or
/// Ctrl+C. The store stays inside `app`; saving it on exit is the caller's
/// job. The terminal is restored before returning, even when a key handler
/// fails.
pub fn run_app(app: &mut App) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;

    let result = event_loop(&mut terminal, app);

    cleanup_terminal(&mut terminal)?;
    result
}

/// Ctrl+S saves, Ctrl+E edits the highlighted search hit and Ctrl+C quits.
/// These are intercepted before `App::handle_key` sees the plain key.
fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw frame")?;

        if event::poll(POLL_INTERVAL).context("event polling failed")? {
            if let Event::Key(key_event) = event::read().context("failed to read event")? {
                if key_event.kind == KeyEventKind::Press {
                    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
                        match key_event.code {
                            KeyCode::Char('e') => {
                                app.handle_ctrl_e()?;
                                continue;
                            }
                            KeyCode::Char('s') => {
                                app.handle_ctrl_s()?;
                                continue;
                            }
                            KeyCode::Char('c') => return Ok(()),
                            _ => {}
                        }
                    }

                    if app.handle_key(key_event.code)? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal
        .show_cursor()
        .context("failed to restore cursor visibility")
}
