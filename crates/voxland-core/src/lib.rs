//! Core types, math, and traits for the Voxland voxel world.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Block identifiers and the static block registry
//! - Coordinate systems (world, chunk, local)
//! - Ray and bounding box helpers
//! - Common error types

pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{ChunkPos, Direction, LocalPos, WorldPos};
pub use error::{Error, Result};
pub use types::{BlockId, BlockInfo};

/// Engine-wide constants
pub mod constants {
    /// Horizontal size of a chunk in voxels (X and Z)
    pub const CHUNK_SIZE: usize = 16;
    /// Vertical size of a chunk in voxels (Y)
    pub const CHUNK_HEIGHT: usize = 256;
    /// Total voxels in a chunk (16 * 256 * 16)
    pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE;
    /// Bits needed to represent a horizontal position within a chunk (4 bits for 0-15)
    pub const CHUNK_BITS: u32 = 4;
    /// Default upper bound on concurrently loaded chunks
    pub const MAX_LOADED_CHUNKS: usize = 1024;
}
