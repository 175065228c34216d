//! Storage Errors
//!
//! Misses (unknown key, nothing to delete) are not errors in twinkv: they come
//! back as `None`, `false` or `0`. The variants below cover the few conditions
//! an engine cannot absorb on its own.

use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout the storage layer.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the storage engines and the dump codec.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The tree engine refused to allocate another node.
    #[error("tree is full: node limit of {max} reached")]
    CapacityExceeded { max: usize },

    /// An ordered cursor was advanced past the last record.
    #[error("cursor advanced past the end of the tree")]
    CursorExhausted,

    /// Reading or writing a dump file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
