//! Coordinate systems for the voxel world.

use crate::constants::{CHUNK_BITS, CHUNK_HEIGHT, CHUNK_SIZE};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Lateral direction between horizontally adjacent chunks.
///
/// North is -Z, South is +Z, East is +X and West is -X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four directions, in index order.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Stable index into per-direction arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::South => 1,
            Self::East => 2,
            Self::West => 3,
        }
    }

    /// The direction pointing back.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Chunk offset `(dx, dz)` for this direction.
    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

/// Position within a chunk (0 to CHUNK_SIZE-1 on X/Z, 0 to CHUNK_HEIGHT-1 on Y).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// Create a new local position
    #[inline]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_SIZE);
        debug_assert!((y as usize) < CHUNK_HEIGHT);
        debug_assert!((z as usize) < CHUNK_SIZE);
        Self { x, y, z }
    }

    /// Create a local position from signed coordinates, or `None` if any
    /// axis falls outside the chunk.
    #[inline]
    pub const fn try_new(x: i32, y: i32, z: i32) -> Option<Self> {
        if x < 0
            || z < 0
            || y < 0
            || x >= CHUNK_SIZE as i32
            || z >= CHUNK_SIZE as i32
            || y >= CHUNK_HEIGHT as i32
        {
            return None;
        }
        Some(Self {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        })
    }

    /// Convert to linear index for flat array storage.
    ///
    /// Layout is X-major, then Y, then Z, which is also the order voxels
    /// are written to save files.
    #[inline]
    pub const fn to_index(self) -> usize {
        ((self.x as usize) * CHUNK_HEIGHT + self.y as usize) * CHUNK_SIZE + self.z as usize
    }

    /// Create from linear index
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        let z = (index % CHUNK_SIZE) as u8;
        let y = ((index / CHUNK_SIZE) % CHUNK_HEIGHT) as u8;
        let x = (index / (CHUNK_SIZE * CHUNK_HEIGHT)) as u8;
        Self { x, y, z }
    }

    /// Whether this cell lies on the outer X/Z boundary of its chunk.
    #[inline]
    pub const fn is_on_boundary(self) -> bool {
        let last = (CHUNK_SIZE - 1) as u8;
        self.x == 0 || self.z == 0 || self.x == last || self.z == last
    }
}

/// Chunk position in chunk coordinates.
///
/// Chunks span the full world height, so only X and Z are needed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Smallest chunk coordinate whose voxels fit in `i32` world coordinates.
    pub const MIN_COORD: i32 = i32::MIN >> CHUNK_BITS;
    /// Largest chunk coordinate whose voxels fit in `i32` world coordinates.
    pub const MAX_COORD: i32 = i32::MAX >> CHUNK_BITS;

    /// Create a new chunk position
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given horizontal world position.
    #[inline]
    pub fn containing(world_x: f32, world_z: f32) -> Self {
        Self::new(
            (world_x.floor() as i32) >> CHUNK_BITS,
            (world_z.floor() as i32) >> CHUNK_BITS,
        )
    }

    /// Whether every voxel of this chunk has an `i32` world coordinate.
    #[inline]
    pub const fn is_addressable(self) -> bool {
        self.x >= Self::MIN_COORD
            && self.x <= Self::MAX_COORD
            && self.z >= Self::MIN_COORD
            && self.z <= Self::MAX_COORD
    }

    /// Convert to world position (corner of chunk at Y = 0)
    #[inline]
    pub const fn origin(self) -> WorldPos {
        WorldPos::new(self.x << CHUNK_BITS, 0, self.z << CHUNK_BITS)
    }

    /// The adjacent chunk position in the given direction.
    ///
    /// Wraps at the ends of the `i32` range.
    #[inline]
    pub const fn neighbor(self, direction: Direction) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.x.wrapping_add(dx), self.z.wrapping_add(dz))
    }

    /// Get the four laterally neighboring chunk positions
    pub fn neighbors(self) -> [(Direction, Self); 4] {
        Direction::ALL.map(|direction| (direction, self.neighbor(direction)))
    }

    /// Distance in chunks along the larger axis, saturating at `i32::MAX`.
    #[inline]
    pub const fn chebyshev_distance(self, other: Self) -> i32 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        let d = if dx > dz { dx } else { dz };
        if d > i32::MAX as u32 {
            i32::MAX
        } else {
            d as i32
        }
    }
}

/// World position in voxel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WorldPos {
    /// Create a new world position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk containing this position
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.x >> CHUNK_BITS, self.z >> CHUNK_BITS)
    }

    /// Get the local position within the chunk, or `None` when Y is
    /// outside the world's vertical range.
    #[inline]
    pub const fn local_pos(self) -> Option<LocalPos> {
        let mask = (CHUNK_SIZE - 1) as i32;
        LocalPos::try_new(self.x & mask, self.y, self.z & mask)
    }

    /// Split into chunk and local position
    #[inline]
    pub const fn split(self) -> Option<(ChunkPos, LocalPos)> {
        match self.local_pos() {
            Some(local) => Some((self.chunk_pos(), local)),
            None => None,
        }
    }

    /// Create from chunk and local position
    #[inline]
    pub const fn from_chunk_local(chunk: ChunkPos, local: LocalPos) -> Self {
        Self::new(
            (chunk.x << CHUNK_BITS) + local.x as i32,
            local.y as i32,
            (chunk.z << CHUNK_BITS) + local.z as i32,
        )
    }

    /// Convert to floating point Vec3
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Convert to glam IVec3
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<Vec3> for WorldPos {
    fn from(v: Vec3) -> Self {
        Self::new(v.x.floor() as i32, v.y.floor() as i32, v.z.floor() as i32)
    }
}

impl From<IVec3> for WorldPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}
