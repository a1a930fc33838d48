//! Errors shared by every Voxland crate.

use thiserror::Error;

use crate::coords::ChunkPos;

/// Failure of a world, chunk or persistence operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a save file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A save file or voxel buffer is malformed
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Coordinate outside the world's vertical range
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// No more chunks can be loaded
    #[error("chunk capacity exhausted ({capacity} chunks loaded)")]
    CapacityExhausted { capacity: usize },

    /// Chunk is queued or being generated in the background
    #[error("chunk ({}, {}) is not ready yet", .0.x, .0.z)]
    ChunkPending(ChunkPos),

    /// Chunk has no terrain yet
    #[error("chunk ({}, {}) has not been generated", .0.x, .0.z)]
    NotGenerated(ChunkPos),
}

/// `Result` specialised to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
