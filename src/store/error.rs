use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Input problems reported by `create` (and by CSV import, which funnels each
/// row through the same checks). Each one is recoverable: the caller fixes
/// the value and tries again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title cannot be empty.")]
    EmptyTitle,
    #[error("Author cannot be empty.")]
    EmptyAuthor,
    #[error("Invalid year {0}. Must be between 1000 and 2030.")]
    YearOutOfRange(i32),
    #[error("Invalid ISBN format: {0}")]
    InvalidIsbn(String),
    #[error("A book with ISBN {0} already exists.")]
    DuplicateIsbn(String),
}

/// Everything a `CatalogStore` operation can report back to its caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Book with ID {0} not found.")]
    NotFound(i32),
    #[error("Book {0} is already borrowed.")]
    AlreadyBorrowed(i32),
    #[error("Book {0} is already available.")]
    AlreadyAvailable(i32),
    #[error("No book ids left to assign.")]
    IdsExhausted,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a catalog file: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// State conflicts and bad input are expected during normal use; only
    /// I/O and format problems point at something outside the catalog.
    pub fn is_recoverable_input(&self) -> bool {
        matches!(
            self,
            StoreError::Validation(_)
                | StoreError::NotFound(_)
                | StoreError::AlreadyBorrowed(_)
                | StoreError::AlreadyAvailable(_)
        )
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
