//! Errors raised by the partitioning layer and the parallel stores

use thiserror::Error;

use super::ElementType;

/// Errors that a single process can detect without talking to its peers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Malformed partition parameters
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A global index outside `[0, count)`
    #[error("Index {index} out of range for {count} entities")]
    OutOfRange { index: usize, count: usize },
    /// A global index owned by another rank than the one asked
    #[error("Index {index} is outside the owned range [{start}, {stop})")]
    NotOwned {
        index: usize,
        start: usize,
        stop: usize,
    },
    /// Local entity indices are unsorted, or a ghost precedes an owned entity
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
}

/// Errors surfaced by a [`ParallelStore`](super::ParallelStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Dataset {0} does not exist")]
    DatasetNotFound(String),
    #[error("Dataset {path} already exists with shape {existing:?}, requested {requested:?}")]
    ShapeMismatch {
        path: String,
        existing: [usize; 2],
        requested: [usize; 2],
    },
    #[error("Dataset {path} holds {existing:?}, got {requested:?}")]
    ElementTypeMismatch {
        path: String,
        existing: ElementType,
        requested: ElementType,
    },
    #[error("Write of {len} rows at offset {offset} exceeds {rows} rows of dataset {path}")]
    OutOfBounds {
        path: String,
        offset: usize,
        len: usize,
        rows: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
