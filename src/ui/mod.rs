//! Ratatui front-end for the catalog: a book table with popups for editing,
//! searching and CSV transfer.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
