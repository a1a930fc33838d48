//! Chunked voxel world for the Voxland engine.
//!
//! Terrain is generated per chunk column, streamed around an observer,
//! turned into face-culled meshes, and saved to a flat binary file.

pub mod chunk;
pub mod chunk_manager;
pub mod generation;
pub mod meshing;
pub mod persistence;
pub mod streaming;
pub mod world;

pub use chunk::{Chunk, ChunkView};
pub use chunk_manager::ChunkManager;
pub use generation::{TerrainConfig, TerrainGenerator};
pub use meshing::{build_chunk_mesh, ChunkMesh, Face, MeshHandle, MeshSink, MeshVertex};
pub use persistence::WorldSave;
pub use streaming::{ChunkStreamer, StreamingConfig, StreamingUpdate};
pub use world::{GenerationMode, RaycastHit, World, WorldConfig};

/// World seed for procedural generation.
pub type WorldSeed = i32;
