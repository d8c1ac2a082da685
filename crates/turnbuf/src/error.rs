//! Error taxonomy for buffer operations.
//!
//! Oversized turns and an over-budget buffer are *not* errors: the
//! compaction pass handles them. Only caller mistakes and the persistence
//! boundary surface here.

use std::path::PathBuf;

/// Errors returned by [`BoundedMemory`](crate::memory::BoundedMemory) and the
/// persistence helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A value passed in is not a usable turn, snapshot, or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `delete` was given positions outside `[0, size)`. Nothing was removed.
    #[error("invalid index: {indices:?} (buffer holds {size} turns)")]
    OutOfRange { indices: Vec<usize>, size: usize },

    /// The operation is part of the interface but has no implementation.
    #[error("{0} is not implemented for BoundedMemory")]
    NotImplemented(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MemoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
