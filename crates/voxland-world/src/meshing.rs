//! Face-culled mesh generation for chunks.
//!
//! Every exposed face of a non-air voxel becomes two triangles at unit size.
//! A face is exposed when the cell next to it, looked up through the chunk's
//! neighbors if needed, is air or transparent. Faces are not merged.

use bytemuck::{Pod, Zeroable};
use voxland_core::{ChunkPos, Error, Result};

use crate::chunk::ChunkView;
use voxland_core::constants::{CHUNK_HEIGHT, CHUNK_SIZE};

/// Opaque handle to a mesh owned by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Consumer of chunk meshes.
///
/// Implemented by the renderer. It owns whatever resource backs a handle
/// and must release it when the handle is retired.
pub trait MeshSink {
    /// Take ownership of a freshly built mesh for the chunk at `pos`.
    fn upload(&mut self, pos: ChunkPos, mesh: &ChunkMesh) -> MeshHandle;

    /// Release a mesh that was superseded or whose chunk was unloaded.
    fn retire(&mut self, handle: MeshHandle);
}

/// One of the six faces of a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Top,
    Bottom,
    East,
    West,
    South,
    North,
}

impl Face {
    pub const ALL: [Self; 6] = [
        Self::Top,
        Self::Bottom,
        Self::East,
        Self::West,
        Self::South,
        Self::North,
    ];

    /// Offset to the cell this face looks at.
    #[inline]
    pub const fn normal(self) -> (i32, i32, i32) {
        match self {
            Self::Top => (0, 1, 0),
            Self::Bottom => (0, -1, 0),
            Self::East => (1, 0, 0),
            Self::West => (-1, 0, 0),
            Self::South => (0, 0, 1),
            Self::North => (0, 0, -1),
        }
    }

    /// Fixed directional shading applied to the block colour.
    #[inline]
    pub const fn brightness(self) -> f32 {
        match self {
            Self::Top => 1.0,
            Self::Bottom => 0.5,
            Self::East | Self::West => 0.8,
            Self::South | Self::North => 0.7,
        }
    }

    /// Corners of the face's two triangles, relative to the voxel's min corner.
    pub const fn corners(self) -> [[f32; 3]; 6] {
        match self {
            Self::Top => [
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            Self::Bottom => [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
            ],
            Self::East => [
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 1.0],
                [1.0, 0.0, 1.0],
            ],
            Self::West => [
                [0.0, 0.0, 0.0],
                [0.0, 1.0, 1.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            Self::South => [
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
            Self::North => [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
        }
    }
}

/// Interleaved vertex: world-space position followed by flat RGB colour.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Triangle list for one chunk, six vertices per visible face.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    pub vertices: Vec<MeshVertex>,
}

impl ChunkMesh {
    pub const VERTICES_PER_FACE: usize = 6;

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / Self::VERTICES_PER_FACE
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex data as raw bytes, ready for a GPU buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    fn push_face(&mut self, origin: [f32; 3], face: Face, color: [f32; 3]) {
        let shade = face.brightness();
        let color = color.map(|c| c * shade);
        for corner in face.corners() {
            self.vertices.push(MeshVertex {
                position: [
                    origin[0] + corner[0],
                    origin[1] + corner[1],
                    origin[2] + corner[2],
                ],
                color,
            });
        }
    }
}

/// Build the mesh for a chunk.
///
/// Returns `Ok(None)` when no face is visible, and `Error::NotGenerated` if
/// the chunk has no terrain yet.
pub fn build_chunk_mesh(view: &ChunkView<'_>) -> Result<Option<ChunkMesh>> {
    let chunk = view.chunk();
    if !chunk.is_generated() {
        return Err(Error::NotGenerated(chunk.pos()));
    }

    let base = chunk.pos().origin();
    let mut mesh = ChunkMesh::default();

    for x in 0..CHUNK_SIZE as i32 {
        for y in 0..CHUNK_HEIGHT as i32 {
            for z in 0..CHUNK_SIZE as i32 {
                let block = chunk.get(x, y, z);
                if block.is_air() {
                    continue;
                }

                let origin = [(base.x + x) as f32, y as f32, (base.z + z) as f32];
                let color = block.info().color;

                for face in Face::ALL {
                    let (dx, dy, dz) = face.normal();
                    let adjacent = view.get_neighbor_aware(x + dx, y + dy, z + dz);
                    if adjacent.is_air() || adjacent.is_transparent() {
                        mesh.push_face(origin, face, color);
                    }
                }
            }
        }
    }

    Ok((!mesh.is_empty()).then_some(mesh))
}
