//! Chunk data structure for voxel world storage.

use voxland_core::constants::{CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME};
use voxland_core::{BlockId, ChunkPos, Direction, Error, LocalPos, Result};

use crate::meshing::MeshHandle;

/// A single column of voxel data (16x256x16 voxels).
pub struct Chunk {
    /// Position in chunk coordinates. Fixed for the chunk's lifetime.
    pos: ChunkPos,
    /// Dense voxel grid, indexed by `LocalPos::to_index`.
    blocks: Box<[BlockId]>,
    /// Terrain has been synthesized (or loaded).
    generated: bool,
    /// Geometry no longer matches voxel content.
    dirty: bool,
    /// Voxels were edited after generation and cannot be regenerated.
    modified: bool,
    /// Handles to loaded lateral neighbors, indexed by `Direction::index`.
    neighbors: [Option<ChunkPos>; 4],
    /// Renderer-owned mesh built from this chunk, if any.
    mesh: Option<MeshHandle>,
}

impl Chunk {
    /// Create a new all-air chunk at the given position.
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            blocks: vec![BlockId::AIR; CHUNK_VOLUME].into_boxed_slice(),
            generated: false,
            dirty: true,
            modified: false,
            neighbors: [None; 4],
            mesh: None,
        }
    }

    /// Create a generated chunk from a full voxel grid (e.g. read from disk).
    pub fn with_blocks(pos: ChunkPos, blocks: Box<[BlockId]>) -> Result<Self> {
        if blocks.len() != CHUNK_VOLUME {
            return Err(Error::InvalidData(format!(
                "chunk ({}, {}) has {} voxels, expected {CHUNK_VOLUME}",
                pos.x,
                pos.z,
                blocks.len()
            )));
        }
        Ok(Self {
            pos,
            blocks,
            generated: true,
            dirty: true,
            modified: false,
            neighbors: [None; 4],
            mesh: None,
        })
    }

    /// Position of this chunk in chunk coordinates.
    #[inline]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Get the block at local coordinates. Out of range reads as air.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockId {
        LocalPos::try_new(x, y, z).map_or(BlockId::AIR, |local| self.get_local(local))
    }

    /// Get the block at a local position.
    #[inline]
    pub fn get_local(&self, local: LocalPos) -> BlockId {
        self.blocks[local.to_index()]
    }

    /// Set the block at local coordinates.
    ///
    /// Out of range writes are ignored. Returns `true` when the stored value
    /// changed, in which case the chunk is marked dirty. Neighbors sharing
    /// the written face are reported by [`Chunk::edge_neighbors`].
    pub fn set(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> bool {
        LocalPos::try_new(x, y, z).is_some_and(|local| self.set_local(local, block))
    }

    /// Set the block at a local position. See [`Chunk::set`].
    pub fn set_local(&mut self, local: LocalPos, block: BlockId) -> bool {
        let slot = &mut self.blocks[local.to_index()];
        if *slot == block {
            return false;
        }
        *slot = block;
        self.dirty = true;
        if self.generated {
            self.modified = true;
        }
        true
    }

    /// Loaded neighbors whose geometry can change when `local` is written.
    ///
    /// Only cells on the outer X/Z boundary touch a neighbor.
    pub fn edge_neighbors(&self, local: LocalPos) -> impl Iterator<Item = ChunkPos> + '_ {
        let last = (CHUNK_SIZE - 1) as u8;
        let touched = [
            (local.z == 0, Direction::North),
            (local.z == last, Direction::South),
            (local.x == last, Direction::East),
            (local.x == 0, Direction::West),
        ];
        touched
            .into_iter()
            .filter(|(on_edge, _)| *on_edge)
            .filter_map(|(_, direction)| self.neighbor(direction))
    }

    /// Raw voxel grid in storage order.
    #[inline]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Take the voxel grid out of the chunk, leaving it unusable.
    pub(crate) fn into_blocks(self) -> Box<[BlockId]> {
        self.blocks
    }

    /// Reset every voxel to air and forget generation and edits.
    pub(crate) fn reset(&mut self) {
        self.blocks.fill(BlockId::AIR);
        self.generated = false;
        self.modified = false;
        self.dirty = true;
    }

    /// Mark terrain as synthesized; the chunk needs a mesh.
    pub fn mark_generated(&mut self) {
        self.generated = true;
        self.dirty = true;
    }

    /// Whether terrain has been synthesized or loaded.
    #[inline]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether the chunk needs to be re-meshed.
    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether voxels were edited after generation.
    #[inline]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the chunk as needing a new mesh.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flag the chunk's mesh as current.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Mark the voxels as differing from generated terrain.
    pub(crate) fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Handle of the loaded neighbor in the given direction.
    #[inline]
    pub const fn neighbor(&self, direction: Direction) -> Option<ChunkPos> {
        self.neighbors[direction.index()]
    }

    pub(crate) fn set_neighbor(&mut self, direction: Direction, neighbor: Option<ChunkPos>) {
        self.neighbors[direction.index()] = neighbor;
    }

    /// Current mesh handle, if a mesh was uploaded.
    #[inline]
    pub const fn mesh(&self) -> Option<MeshHandle> {
        self.mesh
    }

    /// Swap in a new mesh handle, returning the superseded one.
    pub(crate) fn replace_mesh(&mut self, mesh: Option<MeshHandle>) -> Option<MeshHandle> {
        std::mem::replace(&mut self.mesh, mesh)
    }

    /// Check if this chunk is empty (all air).
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.is_air())
    }

    /// Get memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.blocks.len() * std::mem::size_of::<BlockId>()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("generated", &self.generated)
            .field("dirty", &self.dirty)
            .field("modified", &self.modified)
            .field("neighbors", &self.neighbors)
            .field("mesh", &self.mesh)
            .field("blocks", &"<voxels>")
            .finish()
    }
}

/// A chunk together with its resolved lateral neighbors.
///
/// Lets visibility checks cross chunk boundaries without a global lookup.
#[derive(Clone, Copy)]
pub struct ChunkView<'a> {
    chunk: &'a Chunk,
    neighbors: [Option<&'a Chunk>; 4],
}

impl<'a> ChunkView<'a> {
    /// View a chunk with the given neighbors, indexed by `Direction::index`.
    pub const fn new(chunk: &'a Chunk, neighbors: [Option<&'a Chunk>; 4]) -> Self {
        Self { chunk, neighbors }
    }

    /// View a chunk as if no neighbor were loaded.
    pub const fn isolated(chunk: &'a Chunk) -> Self {
        Self::new(chunk, [None; 4])
    }

    /// The viewed chunk.
    #[inline]
    pub const fn chunk(&self) -> &'a Chunk {
        self.chunk
    }

    /// Get a block, resolving X/Z coordinates just outside the chunk
    /// through the matching neighbor.
    ///
    /// Returns air when Y is out of range, the neighbor is missing or not
    /// generated, or both X and Z fall outside the chunk.
    pub fn get_neighbor_aware(&self, x: i32, y: i32, z: i32) -> BlockId {
        const SIZE: i32 = CHUNK_SIZE as i32;

        if y < 0 || y >= CHUNK_HEIGHT as i32 {
            return BlockId::AIR;
        }

        let x_inside = (0..SIZE).contains(&x);
        let z_inside = (0..SIZE).contains(&z);
        let (direction, nx, nz) = match (x_inside, z_inside) {
            (true, true) => return self.chunk.get(x, y, z),
            (false, false) => return BlockId::AIR,
            (false, true) if x < 0 => (Direction::West, x + SIZE, z),
            (false, true) => (Direction::East, x - SIZE, z),
            (true, false) if z < 0 => (Direction::North, x, z + SIZE),
            (true, false) => (Direction::South, x, z - SIZE),
        };

        match self.neighbors[direction.index()] {
            Some(neighbor) if neighbor.is_generated() => neighbor.get(nx, y, nz),
            _ => BlockId::AIR,
        }
    }
}
