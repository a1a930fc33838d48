//! Procedural terrain generation.

use noise::{Fbm, MultiFractal, NoiseFn, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use voxland_core::constants::{CHUNK_HEIGHT, CHUNK_SIZE};
use voxland_core::{BlockId, ChunkPos};

use crate::chunk::Chunk;
use crate::WorldSeed;

/// Terrain generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Sea level (Y coordinate).
    pub sea_level: i32,
    /// Surface height where the noise is zero.
    pub base_height: i32,
    /// Surface offset at full noise amplitude.
    pub height_amplitude: f64,
    /// Frequency of the first noise octave, in cycles per block.
    pub frequency: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Depth of dirt layer below surface.
    pub dirt_depth: i32,
    /// Surfaces this far above sea level are capped with snow.
    pub snow_offset: i32,
    /// Chance for a stone cell to become ore.
    pub ore_chance: f64,
    /// Chance for a dry column to grow a tree.
    pub tree_chance: f64,
    /// Trunk length in blocks.
    pub trunk_height: i32,
    /// Headroom a column needs below the world ceiling to grow a tree.
    pub tree_clearance: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            sea_level: 64,
            base_height: 50,
            height_amplitude: 40.0,
            frequency: 0.02,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            dirt_depth: 4,
            snow_offset: 30,
            ore_chance: 0.01,
            tree_chance: 0.02,
            trunk_height: 5,
            tree_clearance: 10,
        }
    }
}

/// Procedural terrain generator using fractal value noise.
///
/// Output depends only on the seed, the config and the chunk position, so a
/// chunk can be regenerated at any time and on any thread.
#[derive(Clone)]
pub struct TerrainGenerator {
    seed: WorldSeed,
    config: TerrainConfig,
    height_noise: Fbm<Value>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given configuration.
    pub fn new(seed: WorldSeed, config: TerrainConfig) -> Self {
        let height_noise = Fbm::<Value>::new(seed as u32)
            .set_octaves(config.octaves)
            .set_frequency(config.frequency)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            seed,
            config,
            height_noise,
        }
    }

    /// Create a terrain generator with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::new(seed, TerrainConfig::default())
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Get the terrain configuration.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Get terrain height at world XZ coordinates.
    ///
    /// Returns the Y coordinate of the surface block, in `[1, CHUNK_HEIGHT - 1]`.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let noise_value = self.height_noise.get([f64::from(world_x), f64::from(world_z)]);
        let height =
            self.config.base_height + (noise_value * self.config.height_amplitude) as i32;
        height.clamp(1, CHUNK_HEIGHT as i32 - 1)
    }

    /// Fill a chunk's voxels from its position and mark it generated.
    ///
    /// Any previous content is discarded.
    pub fn generate_chunk(&self, chunk: &mut Chunk) {
        chunk.reset();
        let origin = chunk.pos().origin();

        for x in 0..CHUNK_SIZE as i32 {
            for z in 0..CHUNK_SIZE as i32 {
                let world_x = origin.x + x;
                let world_z = origin.z + z;
                let height = self.height_at(world_x, world_z);
                let mut rng = ChaCha8Rng::seed_from_u64(column_seed(self.seed, world_x, world_z));
                self.generate_column(chunk, x, z, height, &mut rng);
            }
        }

        chunk.mark_generated();
    }

    /// Generate a fresh chunk at the given position.
    pub fn generate(&self, pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(pos);
        self.generate_chunk(&mut chunk);
        chunk
    }

    /// Generate multiple chunks in parallel.
    pub fn generate_chunks_parallel(&self, positions: &[ChunkPos]) -> Vec<Chunk> {
        positions.par_iter().map(|&pos| self.generate(pos)).collect()
    }

    fn generate_column(
        &self,
        chunk: &mut Chunk,
        x: i32,
        z: i32,
        height: i32,
        rng: &mut ChaCha8Rng,
    ) {
        let cfg = &self.config;
        chunk.set(x, 0, z, BlockId::BEDROCK);

        let stone_top = (height - cfg.dirt_depth).max(1);
        for y in 1..stone_top {
            let block = if rng.gen::<f64>() < cfg.ore_chance {
                ore_for_depth(y, rng)
            } else {
                BlockId::STONE
            };
            chunk.set(x, y, z, block);
        }

        for y in stone_top..height {
            chunk.set(x, y, z, BlockId::DIRT);
        }

        if height >= cfg.sea_level {
            let cap = if height > cfg.sea_level + cfg.snow_offset {
                BlockId::SNOW
            } else {
                BlockId::GRASS
            };
            chunk.set(x, height, z, cap);

            if height < CHUNK_HEIGHT as i32 - cfg.tree_clearance
                && rng.gen::<f64>() < cfg.tree_chance
            {
                self.grow_tree(chunk, x, z, height);
            }
        } else {
            if height > cfg.sea_level - 3 {
                for y in (height - 2).max(0)..=height {
                    chunk.set(x, y, z, BlockId::SAND);
                }
            } else {
                chunk.set(x, height, z, BlockId::DIRT);
            }

            for y in height + 1..=cfg.sea_level {
                chunk.set(x, y, z, BlockId::WATER);
            }
        }
    }

    /// Trunk above the surface plus a diamond canopy around its top.
    ///
    /// Leaves only fill air and are clipped to the chunk.
    fn grow_tree(&self, chunk: &mut Chunk, x: i32, z: i32, height: i32) {
        let trunk = self.config.trunk_height;
        for dy in 1..=trunk {
            chunk.set(x, height + dy, z, BlockId::WOOD);
        }

        for dx in -2..=2_i32 {
            for dz in -2..=2_i32 {
                if dx.abs() + dz.abs() > 3 {
                    continue;
                }
                for dy in trunk - 1..=trunk + 2 {
                    let (lx, ly, lz) = (x + dx, height + dy, z + dz);
                    if chunk.get(lx, ly, lz).is_air() {
                        chunk.set(lx, ly, lz, BlockId::LEAVES);
                    }
                }
            }
        }
    }
}

/// Ore variant for a stone cell at height `y`; deeper bands favour rarer ore.
fn ore_for_depth(y: i32, rng: &mut ChaCha8Rng) -> BlockId {
    let roll = rng.gen_range(0..100);
    match y {
        y if y < 16 && roll < 30 => BlockId::DIAMOND_ORE,
        y if (16..32).contains(&y) && roll < 40 => BlockId::GOLD_ORE,
        y if (32..64).contains(&y) && roll < 50 => BlockId::IRON_ORE,
        _ => BlockId::COAL_ORE,
    }
}

/// Per-column RNG seed mixed from the world seed and column coordinates.
fn column_seed(seed: WorldSeed, world_x: i32, world_z: i32) -> u64 {
    let mut h = u64::from(seed as u32) ^ 0x9E37_79B9_7F4A_7C15;
    h ^= u64::from(world_x as u32).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = h.rotate_left(31);
    h ^= u64::from(world_z as u32).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 29)
}
