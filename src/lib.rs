//! Library surface for the book catalog manager.
//!
//! `store` holds the catalog and its on-disk formats and has no terminal
//! dependencies, so it can be driven from tests or other tooling. `ui` is the
//! interactive front-end the binary launches.
pub mod config;
pub mod logging;
pub mod models;
pub mod store;
pub mod ui;

pub use config::{Cli, Settings};
pub use models::{Book, BookPatch, CatalogStats, SortKey};
pub use store::{CatalogStore, ImportReport, StoreError, ValidationError};
pub use ui::{run_app, App};
