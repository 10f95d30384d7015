//! The record store: the in-memory catalog plus its binary persistence file
//! and CSV exchange format.

mod catalog;
mod codec;
mod error;
mod export;
mod validation;

pub use catalog::CatalogStore;
pub use codec::{FORMAT_VERSION, MAGIC};
pub use error::{Result, StoreError, ValidationError};
pub use export::{ImportReport, CSV_HEADER};
pub use validation::{is_valid_isbn, is_valid_year, MAX_YEAR, MIN_YEAR};
