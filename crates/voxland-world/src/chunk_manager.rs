//! Chunk manager with spatial indexing and neighbor links.

use hashbrown::HashMap;
use voxland_core::{BlockId, ChunkPos, Direction, Error, LocalPos, Result};

use crate::chunk::{Chunk, ChunkView};

/// Owns all loaded chunks, indexed by position.
///
/// Keeps each chunk's lateral neighbor handles in sync as chunks come and
/// go, and remembers load order so dirty chunks are handed out oldest first.
pub struct ChunkManager {
    /// All loaded chunks indexed by position.
    chunks: HashMap<ChunkPos, Chunk>,
    /// Positions in the order they were loaded.
    order: Vec<ChunkPos>,
    /// Maximum number of chunks to keep loaded.
    max_chunks: usize,
}

impl ChunkManager {
    /// Create a new chunk manager with the given capacity.
    pub fn new(max_chunks: usize) -> Self {
        Self {
            chunks: HashMap::with_capacity(max_chunks),
            order: Vec::with_capacity(max_chunks),
            max_chunks,
        }
    }

    /// Check if a chunk exists at the given position.
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Get the number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if no chunks are loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Get the maximum chunk capacity.
    pub fn capacity(&self) -> usize {
        self.max_chunks
    }

    /// Whether another chunk can be inserted.
    pub fn is_full(&self) -> bool {
        self.chunks.len() >= self.max_chunks
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    /// Insert a chunk and link it with its loaded neighbors.
    ///
    /// Neighbors are marked dirty so faces against the new chunk get
    /// re-culled. Replacing a chunk at an occupied position keeps its place
    /// in load order and returns the old chunk.
    pub fn insert(&mut self, mut chunk: Chunk) -> Result<Option<Chunk>> {
        let pos = chunk.pos();
        let replacing = self.chunks.contains_key(&pos);
        if !replacing && self.is_full() {
            return Err(Error::CapacityExhausted {
                capacity: self.max_chunks,
            });
        }

        for (direction, neighbor_pos) in pos.neighbors() {
            if let Some(neighbor) = self.chunks.get_mut(&neighbor_pos) {
                neighbor.set_neighbor(direction.opposite(), Some(pos));
                neighbor.mark_dirty();
                chunk.set_neighbor(direction, Some(neighbor_pos));
            } else {
                chunk.set_neighbor(direction, None);
            }
        }

        let old = self.chunks.insert(pos, chunk);
        if old.is_none() {
            self.order.push(pos);
        }
        Ok(old)
    }

    /// Remove a chunk, clearing the back-links held by its neighbors.
    pub fn remove(&mut self, pos: ChunkPos) -> Option<Chunk> {
        let chunk = self.chunks.remove(&pos)?;
        self.order.retain(|p| *p != pos);

        for direction in Direction::ALL {
            if let Some(neighbor) = chunk
                .neighbor(direction)
                .and_then(|neighbor_pos| self.chunks.get_mut(&neighbor_pos))
            {
                neighbor.set_neighbor(direction.opposite(), None);
                neighbor.mark_dirty();
            }
        }

        Some(chunk)
    }

    /// Resolve a chunk and its neighbor handles into a view.
    pub fn view(&self, pos: ChunkPos) -> Option<ChunkView<'_>> {
        let chunk = self.chunks.get(&pos)?;
        let neighbors = Direction::ALL.map(|direction| {
            chunk
                .neighbor(direction)
                .and_then(|neighbor_pos| self.chunks.get(&neighbor_pos))
        });
        Some(ChunkView::new(chunk, neighbors))
    }

    /// Write a voxel in a loaded chunk.
    ///
    /// When the value changes on a chunk edge, the chunk across that edge is
    /// marked dirty too. Returns `None` if the chunk isn't loaded, otherwise
    /// whether the voxel changed.
    pub fn set_block(&mut self, pos: ChunkPos, local: LocalPos, block: BlockId) -> Option<bool> {
        let chunk = self.chunks.get_mut(&pos)?;
        if !chunk.set_local(local, block) {
            return Some(false);
        }

        let touched: Vec<ChunkPos> = chunk.edge_neighbors(local).collect();
        for neighbor_pos in touched {
            if let Some(neighbor) = self.chunks.get_mut(&neighbor_pos) {
                neighbor.mark_dirty();
            }
        }
        Some(true)
    }

    /// Loaded positions in load order.
    pub fn positions(&self) -> &[ChunkPos] {
        &self.order
    }

    /// Chunks in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.order.iter().filter_map(|pos| self.chunks.get(pos))
    }

    /// Up to `max` generated chunks needing a mesh, oldest first.
    pub fn dirty_chunks(&self, max: usize) -> Vec<ChunkPos> {
        self.iter()
            .filter(|chunk| chunk.is_generated() && chunk.is_dirty())
            .map(Chunk::pos)
            .take(max)
            .collect()
    }

    /// Positions whose Chebyshev distance from `center` exceeds `radius`.
    pub fn chunks_outside(&self, center: ChunkPos, radius: i32) -> Vec<ChunkPos> {
        self.order
            .iter()
            .filter(|pos| pos.chebyshev_distance(center) > radius)
            .copied()
            .collect()
    }

    /// Get total memory usage of all chunks.
    pub fn memory_usage(&self) -> usize {
        self.chunks.values().map(Chunk::memory_usage).sum()
    }

    /// Consume the manager, yielding every chunk.
    pub fn into_chunks(self) -> impl Iterator<Item = Chunk> {
        self.chunks.into_values()
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new(voxland_core::constants::MAX_LOADED_CHUNKS)
    }
}
