//! # World Error Types
//!
//! Only configuration and storage failures are errors. Missing chunks are
//! reported as `None`/`false` and out-of-range reads return air.

use strata_core::CodecError;
use thiserror::Error;

/// Errors that can occur in world operations.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Y coordinate outside the world height range.
    #[error("y {y} outside world bounds [{min_y}, {max_y}]")]
    OutOfBounds {
        /// Requested Y.
        y: i32,
        /// Lowest valid Y.
        min_y: i32,
        /// Highest valid Y.
        max_y: i32,
    },

    /// Configuration rejected by validation.
    #[error("invalid world config: {0}")]
    InvalidConfig(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Section bytes could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Chunk file could not be decompressed or is malformed.
    #[error("corrupt chunk data: {0}")]
    Decompress(String),

    /// A chunk file holds a different chunk than the one requested.
    #[error("chunk key mismatch: expected {expected}, found {found}")]
    ChunkKeyMismatch {
        /// Requested key.
        expected: i64,
        /// Key stored in the file.
        found: i64,
    },
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
