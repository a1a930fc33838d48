//! World facade: chunk storage, streaming, editing, picking and saving.

use std::path::Path;

use glam::Vec3;
use hashbrown::HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use voxland_core::constants::{CHUNK_HEIGHT, MAX_LOADED_CHUNKS};
use voxland_core::math::{Aabb, Ray};
use voxland_core::{BlockId, ChunkPos, Error, Result, WorldPos};

use crate::chunk::Chunk;
use crate::chunk_manager::ChunkManager;
use crate::generation::{TerrainConfig, TerrainGenerator};
use crate::meshing::{build_chunk_mesh, ChunkMesh, MeshHandle, MeshSink};
use crate::persistence;
use crate::streaming::{ChunkStreamer, StreamingConfig, StreamingUpdate};
use crate::WorldSeed;

/// Where new chunks are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMode {
    /// On the calling thread, before the requesting call returns.
    #[default]
    Sync,
    /// On a background worker; callers see `Error::ChunkPending` meanwhile.
    Async,
}

/// World configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub terrain: TerrainConfig,
    pub streaming: StreamingConfig,
    /// Hard limit on loaded plus in-flight chunks.
    pub max_chunks: usize,
    /// Maximum ray length for block picking.
    pub reach_distance: f32,
    /// Distance between ray samples.
    pub raycast_step: f32,
    pub mode: GenerationMode,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            streaming: StreamingConfig::default(),
            max_chunks: MAX_LOADED_CHUNKS,
            reach_distance: 5.0,
            raycast_step: 0.1,
            mode: GenerationMode::Sync,
        }
    }
}

/// Result of a successful block pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaycastHit {
    /// First solid cell along the ray.
    pub hit: WorldPos,
    /// Last cell sampled before `hit`; where a placed block would go.
    pub placement: WorldPos,
}

/// A chunked voxel world around a moving observer.
pub struct World {
    config: WorldConfig,
    seed: WorldSeed,
    chunks: ChunkManager,
    streamer: ChunkStreamer,
    /// Voxels of edited chunks that were unloaded, restored on reload.
    parked: HashMap<ChunkPos, Box<[BlockId]>>,
    /// Mesh handles waiting to be returned to the renderer.
    retired: Vec<MeshHandle>,
}

impl World {
    /// Create an empty world.
    ///
    /// Fails only if the background worker can't be started in async mode.
    pub fn new(seed: WorldSeed, config: WorldConfig) -> Result<Self> {
        let generator = TerrainGenerator::new(seed, config.terrain.clone());
        let streamer = match config.mode {
            GenerationMode::Sync => ChunkStreamer::new(config.streaming.clone(), generator),
            GenerationMode::Async => {
                ChunkStreamer::new_async(config.streaming.clone(), generator)?
            }
        };
        Ok(Self::from_parts(seed, config, streamer))
    }

    /// Create a synchronous world with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        let config = WorldConfig::default();
        let generator = TerrainGenerator::new(seed, config.terrain.clone());
        let streamer = ChunkStreamer::new(config.streaming.clone(), generator);
        Self::from_parts(seed, config, streamer)
    }

    fn from_parts(seed: WorldSeed, config: WorldConfig, streamer: ChunkStreamer) -> Self {
        Self {
            chunks: ChunkManager::new(config.max_chunks),
            config,
            seed,
            streamer,
            parked: HashMap::new(),
            retired: Vec::new(),
        }
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Loaded chunks.
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn generator(&self) -> &TerrainGenerator {
        self.streamer.generator()
    }

    /// Number of edited chunks kept in memory while unloaded.
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Number of chunks requested from the worker and not yet loaded.
    pub fn in_flight_count(&self) -> usize {
        self.streamer.in_flight_count()
    }

    /// Get a chunk, loading it if needed.
    ///
    /// In sync mode a missing chunk is generated before returning. In async
    /// mode it is requested from the worker and `Error::ChunkPending` is
    /// returned until it arrives. Fails with `Error::CapacityExhausted` when
    /// no more chunks may be loaded, and with `Error::OutOfBounds` for
    /// chunks whose voxels lie beyond `i32` world coordinates.
    pub fn get_chunk(&mut self, cx: i32, cz: i32) -> Result<&Chunk> {
        let pos = ChunkPos::new(cx, cz);
        if !pos.is_addressable() {
            return Err(Error::OutOfBounds(format!("chunk ({cx}, {cz}) is outside the world")));
        }
        if !self.chunks.contains(pos) {
            self.load_chunk(pos)?;
        }
        self.chunks.get(pos).ok_or(Error::ChunkPending(pos))
    }

    /// Look up a loaded chunk without loading it.
    pub fn find_chunk(&self, cx: i32, cz: i32) -> Option<&Chunk> {
        self.chunks.get(ChunkPos::new(cx, cz))
    }

    /// Block at a global voxel coordinate. Unloaded or out of range reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.block_at(WorldPos::new(x, y, z))
    }

    fn block_at(&self, pos: WorldPos) -> BlockId {
        pos.split()
            .and_then(|(chunk_pos, local)| {
                self.chunks.get(chunk_pos).map(|chunk| chunk.get_local(local))
            })
            .unwrap_or(BlockId::AIR)
    }

    /// Write a block at a global voxel coordinate.
    ///
    /// The target chunk is loaded first, synchronously even in async mode.
    /// Nothing changes if the write fails.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> Result<()> {
        let (pos, local) = WorldPos::new(x, y, z).split().ok_or_else(|| {
            Error::OutOfBounds(format!("y = {y} is outside 0..{CHUNK_HEIGHT}"))
        })?;

        self.force_load(pos)?;
        self.chunks
            .set_block(pos, local, block)
            .map(|_| ())
            .ok_or(Error::ChunkPending(pos))
    }

    /// Load chunks around the observer and unload those too far away.
    pub fn update_streaming(&mut self, observer_x: f32, observer_z: f32) -> StreamingUpdate {
        let center = ChunkPos::containing(observer_x, observer_z);
        let mut update = StreamingUpdate {
            center,
            generated: self.poll_generated(),
            ..StreamingUpdate::default()
        };

        if self.config.streaming.unload {
            update.unloaded = self.unload_outside(center);
        }

        self.streamer.rebuild_load_queue(center, &self.chunks);
        let batch_limit = if self.streamer.is_async() {
            self.config.streaming.max_gen_per_update
        } else {
            usize::MAX
        };

        let mut batch = Vec::new();
        let mut capacity_hit = false;
        while let Some(pos) = self.streamer.pop_load() {
            if let Some(blocks) = self.parked.remove(&pos) {
                match self.unpark(pos, blocks, batch.len()) {
                    Ok(()) => update.restored += 1,
                    Err(_) => {
                        capacity_hit = true;
                        update.deferred += 1;
                    }
                }
                continue;
            }

            let committed = self.chunks.len() + self.streamer.in_flight_count() + batch.len();
            if committed >= self.config.max_chunks {
                capacity_hit = true;
                update.deferred += 1;
            } else if batch.len() >= batch_limit {
                update.deferred += 1;
            } else {
                batch.push(pos);
            }
        }

        if capacity_hit {
            warn!(
                capacity = self.config.max_chunks,
                deferred = update.deferred,
                "chunk capacity exhausted while streaming"
            );
        }

        if !batch.is_empty() {
            if self.streamer.is_async() {
                let count = batch.len();
                if self.streamer.submit(batch) {
                    update.submitted = count;
                } else {
                    debug!(count, "chunk worker queue full, retrying next update");
                    update.deferred += count;
                }
            } else {
                for chunk in self.streamer.generate_now(&batch) {
                    if self.insert_chunk(chunk).is_ok() {
                        update.generated += 1;
                    }
                }
            }
        }

        update.in_flight = self.streamer.in_flight_count();
        if update.generated + update.restored + update.submitted + update.unloaded > 0 {
            debug!(
                center = ?center,
                generated = update.generated,
                restored = update.restored,
                submitted = update.submitted,
                unloaded = update.unloaded,
                in_flight = update.in_flight,
                "streaming update"
            );
        }
        update
    }

    /// Insert chunks finished by the worker. Returns how many were accepted.
    pub fn poll_generated(&mut self) -> usize {
        let mut accepted = 0;
        for chunk in self.streamer.collect_completed() {
            if self.chunks.contains(chunk.pos()) {
                continue;
            }
            if self.insert_chunk(chunk).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// Up to `max_count` generated chunks needing a mesh, in load order.
    pub fn collect_dirty(&mut self, max_count: usize) -> Vec<ChunkPos> {
        self.poll_generated();
        self.chunks.dirty_chunks(max_count)
    }

    /// Rebuild meshes for up to `max_count` dirty chunks.
    ///
    /// Released handles are retired first. Meshes are built in parallel, then
    /// uploaded; superseded handles are retired and dirty flags cleared.
    /// Returns the number of chunks processed.
    pub fn rebuild_meshes<S: MeshSink>(&mut self, sink: &mut S, max_count: usize) -> usize {
        for handle in self.retired.drain(..) {
            sink.retire(handle);
        }

        let dirty = self.collect_dirty(max_count);
        let chunks = &self.chunks;
        let built: Vec<(ChunkPos, Result<Option<ChunkMesh>>)> = dirty
            .par_iter()
            .map(|&pos| {
                let mesh = chunks
                    .view(pos)
                    .map_or(Err(Error::ChunkPending(pos)), |view| build_chunk_mesh(&view));
                (pos, mesh)
            })
            .collect();

        let mut rebuilt = 0;
        for (pos, mesh) in built {
            let mesh = match mesh {
                Ok(mesh) => mesh,
                Err(err) => {
                    warn!(?pos, %err, "skipping mesh rebuild");
                    continue;
                }
            };
            let Some(chunk) = self.chunks.get_mut(pos) else {
                continue;
            };

            let handle = mesh.map(|mesh| sink.upload(pos, &mesh));
            if let Some(old) = chunk.replace_mesh(handle) {
                sink.retire(old);
            }
            chunk.clear_dirty();
            rebuilt += 1;
        }
        rebuilt
    }

    /// March a ray in fixed steps and report the first solid block within reach.
    ///
    /// Returns `None` on a miss or when `direction` has zero length.
    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<RaycastHit> {
        let ray = Ray::new(origin, direction)?;
        let step = self.config.raycast_step;
        if step <= 0.0 {
            return None;
        }

        let mut placement = WorldPos::from(origin);
        let mut i = 0_u32;
        loop {
            let t = i as f32 * step;
            if t >= self.config.reach_distance {
                return None;
            }
            let cell = WorldPos::from(ray.at(t));
            if self.block_at(cell).is_solid() {
                return Some(RaycastHit {
                    hit: cell,
                    placement,
                });
            }
            placement = cell;
            i += 1;
        }
    }

    /// Whether the block containing `point` is solid.
    pub fn is_solid_at(&self, point: Vec3) -> bool {
        self.block_at(WorldPos::from(point)).is_solid()
    }

    /// Whether `aabb` overlaps any solid block with non-zero volume.
    pub fn intersects_solid(&self, aabb: &Aabb) -> bool {
        let min = WorldPos::from(aabb.min);
        let max = WorldPos::from(aabb.max.ceil() - Vec3::ONE);

        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let cell = WorldPos::new(x, y, z);
                    if self.block_at(cell).is_solid()
                        && Aabb::unit_cube(cell.to_vec3()).overlaps(aabb)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Feet position two blocks above the terrain surface at the origin.
    pub fn spawn_point(&self) -> Vec3 {
        let height = self.generator().height_at(0, 0);
        Vec3::new(0.5, (height + 2) as f32, 0.5)
    }

    /// Write every generated chunk, loaded or parked, to `path`.
    ///
    /// Returns the number of chunks written. An existing file is only
    /// replaced once the new one is complete.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();

        let mut records: Vec<(ChunkPos, &[BlockId])> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.is_generated())
            .map(|chunk| (chunk.pos(), chunk.blocks()))
            .collect();
        let mut parked: Vec<(ChunkPos, &[BlockId])> = self
            .parked
            .iter()
            .map(|(pos, blocks)| (*pos, &**blocks))
            .collect();
        parked.sort_by_key(|(pos, _)| (pos.x, pos.z));
        records.extend(parked);

        let written = persistence::save_to_path(path, self.seed, &records)?;
        info!(path = %path.display(), chunks = written, seed = self.seed, "saved world");
        Ok(written)
    }

    /// Replace the world with the contents of a save file.
    ///
    /// The file is read and validated in full before anything changes; on
    /// error the current world is left as it was. Outstanding worker results
    /// are discarded and existing meshes are queued for retirement.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let save = persistence::load_from_path(path)?;
        let count = save.chunks.len();

        let mut staged = ChunkManager::new(self.config.max_chunks);
        let mut parked = HashMap::new();
        for (pos, blocks) in save.chunks {
            if staged.is_full() {
                parked.insert(pos, blocks);
                continue;
            }
            let mut chunk = Chunk::with_blocks(pos, blocks)?;
            chunk.mark_modified();
            staged.insert(chunk)?;
        }

        let previous = std::mem::replace(&mut self.chunks, staged);
        self.retired
            .extend(previous.into_chunks().filter_map(|chunk| chunk.mesh()));
        self.parked = parked;
        self.seed = save.seed;
        self.streamer
            .reset(TerrainGenerator::new(save.seed, self.config.terrain.clone()));

        info!(
            path = %path.display(),
            chunks = count,
            parked = self.parked.len(),
            seed = self.seed,
            "loaded world"
        );
        Ok(count)
    }

    /// Whether one more chunk fits next to `reserved` chunks already promised.
    fn has_room(&self, reserved: usize) -> bool {
        self.chunks.len() + self.streamer.in_flight_count() + reserved < self.config.max_chunks
    }

    fn capacity_error(&self) -> Error {
        warn!(capacity = self.config.max_chunks, "chunk capacity exhausted");
        Error::CapacityExhausted {
            capacity: self.config.max_chunks,
        }
    }

    fn insert_chunk(&mut self, chunk: Chunk) -> Result<()> {
        match self.chunks.insert(chunk) {
            Ok(_) => Ok(()),
            Err(Error::CapacityExhausted { .. }) => Err(self.capacity_error()),
            Err(err) => Err(err),
        }
    }

    /// Bring a parked chunk back, keeping it parked if there is no room.
    fn unpark(&mut self, pos: ChunkPos, blocks: Box<[BlockId]>, reserved: usize) -> Result<()> {
        if !self.has_room(reserved) {
            self.parked.insert(pos, blocks);
            return Err(self.capacity_error());
        }
        let mut chunk = Chunk::with_blocks(pos, blocks)?;
        chunk.mark_modified();
        self.insert_chunk(chunk)
    }

    /// Load a missing chunk the way `get_chunk` does.
    fn load_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        if let Some(blocks) = self.parked.remove(&pos) {
            return self.unpark(pos, blocks, 0);
        }
        if self.streamer.is_in_flight(pos) {
            return Err(Error::ChunkPending(pos));
        }
        if !self.has_room(0) {
            return Err(self.capacity_error());
        }

        if self.streamer.is_async() {
            if !self.streamer.submit(vec![pos]) {
                debug!(?pos, "chunk worker queue full");
            }
            return Err(Error::ChunkPending(pos));
        }

        let chunk = self.generator().generate(pos);
        self.insert_chunk(chunk)
    }

    /// Load a missing chunk on the calling thread, taking over any
    /// outstanding worker request for it.
    fn force_load(&mut self, pos: ChunkPos) -> Result<()> {
        if self.chunks.contains(pos) {
            return Ok(());
        }
        if let Some(blocks) = self.parked.remove(&pos) {
            return self.unpark(pos, blocks, 0);
        }

        self.streamer.cancel(pos);
        if !self.has_room(0) {
            return Err(self.capacity_error());
        }
        let chunk = self.generator().generate(pos);
        self.insert_chunk(chunk)
    }

    /// Unload chunks beyond the unload distance. Returns how many went.
    fn unload_outside(&mut self, center: ChunkPos) -> usize {
        let radius = self.config.streaming.unload_distance();
        self.streamer.cancel_outside(center, radius);

        let far = self.chunks.chunks_outside(center, radius);
        for &pos in &far {
            if let Some(chunk) = self.chunks.remove(pos) {
                self.release(chunk);
            }
        }
        far.len()
    }

    fn release(&mut self, chunk: Chunk) {
        if let Some(handle) = chunk.mesh() {
            self.retired.push(handle);
        }
        if chunk.is_modified() {
            let pos = chunk.pos();
            self.parked.insert(pos, chunk.into_blocks());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;
    use std::time::{Duration, Instant};
    use voxland_core::constants::CHUNK_SIZE;

    #[derive(Default)]
    struct RecordingSink {
        next: u64,
        live: HashSet<MeshHandle>,
        uploads: Vec<(ChunkPos, usize)>,
        retired: Vec<MeshHandle>,
    }

    impl MeshSink for RecordingSink {
        fn upload(&mut self, pos: ChunkPos, mesh: &ChunkMesh) -> MeshHandle {
            self.next += 1;
            let handle = MeshHandle(self.next);
            self.live.insert(handle);
            self.uploads.push((pos, mesh.face_count()));
            handle
        }

        fn retire(&mut self, handle: MeshHandle) {
            assert!(self.live.remove(&handle), "retired unknown mesh {handle:?}");
            self.retired.push(handle);
        }
    }

    fn config(render_distance: i32) -> WorldConfig {
        WorldConfig {
            terrain: TerrainConfig {
                tree_chance: 0.0,
                ..TerrainConfig::default()
            },
            streaming: StreamingConfig {
                render_distance,
                unload_margin: 1,
                ..StreamingConfig::default()
            },
            ..WorldConfig::default()
        }
    }

    fn test_world(seed: WorldSeed) -> World {
        World::new(seed, config(1)).unwrap()
    }

    fn wait_for_chunk(world: &mut World, cx: i32, cz: i32) -> bool {
        let deadline = Instant::now() + Duration::from_secs(20);
        while Instant::now() < deadline {
            if world.get_chunk(cx, cz).is_ok() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
            world.poll_generated();
        }
        false
    }

    #[test]
    fn get_chunk_generates_and_links() {
        let mut world = test_world(42);
        assert!(world.find_chunk(0, 0).is_none());

        let chunk = world.get_chunk(0, 0).unwrap();
        assert!(chunk.is_generated());
        assert_eq!(
            chunk.blocks(),
            TerrainGenerator::new(42, config(1).terrain)
                .generate(ChunkPos::new(0, 0))
                .blocks()
        );

        world.get_chunk(1, 0).unwrap();
        let east = world.find_chunk(0, 0).unwrap().neighbor(voxland_core::Direction::East);
        assert_eq!(east, Some(ChunkPos::new(1, 0)));
        assert_eq!(world.chunks().len(), 2);
    }

    #[test]
    fn block_roundtrip_with_negative_coordinates() {
        let mut world = test_world(1);
        let coords = [(-1, 200, -1), (-17, 5, 33), (0, 255, -16), (31, 0, -33)];
        for (i, &(x, y, z)) in coords.iter().enumerate() {
            let block = BlockId(i as u8 + 11);
            world.set_block(x, y, z, block).unwrap();
            assert_eq!(world.get_block(x, y, z), block);
        }

        let chunk = world.find_chunk(-1, -1).unwrap();
        assert_eq!(chunk.get(CHUNK_SIZE as i32 - 1, 200, CHUNK_SIZE as i32 - 1), BlockId(11));
    }

    #[test]
    fn get_block_never_loads() {
        let world = test_world(1);
        assert_eq!(world.get_block(100, 10, 100), BlockId::AIR);
        assert_eq!(world.get_block(0, -1, 0), BlockId::AIR);
        assert!(world.chunks().is_empty());
    }

    #[test]
    fn set_block_out_of_range_fails_cleanly() {
        let mut world = test_world(1);
        let err = world.set_block(0, CHUNK_HEIGHT as i32, 0, BlockId::STONE).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
        assert!(world.chunks().is_empty());
    }

    #[test]
    fn capacity_is_a_hard_limit() {
        let mut world = World::new(
            3,
            WorldConfig {
                max_chunks: 2,
                ..config(1)
            },
        )
        .unwrap();
        world.get_chunk(0, 0).unwrap();
        world.get_chunk(0, 1).unwrap();

        let err = world.get_chunk(5, 5).unwrap_err();
        assert!(matches!(err, Error::CapacityExhausted { capacity: 2 }));
        assert!(world.set_block(80, 100, 80, BlockId::STONE).is_err());
        // Loaded chunks still answer.
        assert!(world.get_chunk(0, 0).is_ok());
        assert_eq!(world.chunks().len(), 2);
    }

    #[test]
    fn streaming_loads_square_around_observer() {
        let mut world = World::new(9, config(2)).unwrap();
        let update = world.update_streaming(8.0, 8.0);

        assert_eq!(update.center, ChunkPos::new(0, 0));
        assert_eq!(update.generated, 25);
        assert_eq!(world.chunks().len(), 25);
        for cx in -2..=2 {
            for cz in -2..=2 {
                assert!(world.find_chunk(cx, cz).is_some());
            }
        }

        let again = world.update_streaming(8.0, 8.0);
        assert_eq!(again.generated, 0);
        assert_eq!(again.unloaded, 0);
    }

    #[test]
    fn streaming_respects_capacity() {
        let mut world = World::new(
            9,
            WorldConfig {
                max_chunks: 10,
                ..config(2)
            },
        )
        .unwrap();
        let update = world.update_streaming(0.0, 0.0);
        assert_eq!(update.generated, 10);
        assert_eq!(update.deferred, 15);
        assert!(world.find_chunk(0, 0).is_some());
    }

    #[test]
    fn distant_chunks_are_unloaded() {
        let mut world = World::new(9, config(1)).unwrap();
        world.update_streaming(0.0, 0.0);
        assert_eq!(world.chunks().len(), 9);

        // Unload distance is 2, so moving two chunks east drops the west column.
        let update = world.update_streaming(2.0 * 16.0, 0.0);
        assert_eq!(update.unloaded, 3);
        assert_eq!(update.generated, 6);
        assert!(world.find_chunk(-1, 0).is_none());
        assert!(world.find_chunk(0, 0).is_some());
        let west = world.find_chunk(2, 0).unwrap().neighbor(voxland_core::Direction::West);
        assert_eq!(west, Some(ChunkPos::new(1, 0)));

        let far = world.update_streaming(1000.0, 1000.0);
        assert_eq!(far.generated, 9);
        assert_eq!(world.chunks().len(), 9);
    }

    #[test]
    fn edited_chunks_survive_unloading() {
        let mut world = World::new(9, config(1)).unwrap();
        world.update_streaming(0.0, 0.0);
        world.set_block(2, 150, 3, BlockId::BRICK).unwrap();

        world.update_streaming(1000.0, 0.0);
        assert!(world.find_chunk(0, 0).is_none());
        assert_eq!(world.parked_count(), 1);

        let update = world.update_streaming(0.0, 0.0);
        assert_eq!(update.restored, 1);
        assert_eq!(world.parked_count(), 0);
        assert_eq!(world.get_block(2, 150, 3), BlockId::BRICK);
        assert!(world.find_chunk(0, 0).unwrap().is_modified());
    }

    #[test]
    fn boundary_writes_dirty_the_neighbor() {
        let mut world = test_world(4);
        let mut sink = RecordingSink::default();
        world.get_chunk(0, 0).unwrap();
        world.get_chunk(-1, 0).unwrap();
        world.rebuild_meshes(&mut sink, usize::MAX);
        assert!(world.collect_dirty(usize::MAX).is_empty());

        world.set_block(7, 150, 7, BlockId::STONE).unwrap();
        assert_eq!(world.collect_dirty(usize::MAX), vec![ChunkPos::new(0, 0)]);
        world.rebuild_meshes(&mut sink, usize::MAX);

        world.set_block(0, 150, 7, BlockId::STONE).unwrap();
        let dirty = world.collect_dirty(usize::MAX);
        assert_eq!(dirty, vec![ChunkPos::new(0, 0), ChunkPos::new(-1, 0)]);
    }

    #[test]
    fn collect_dirty_follows_load_order() {
        let mut world = test_world(4);
        let order = [(3, 3), (-3, 3), (3, -3), (-3, -3)];
        for (cx, cz) in order {
            world.get_chunk(cx, cz).unwrap();
        }
        let expected: Vec<_> = order.iter().map(|&(x, z)| ChunkPos::new(x, z)).collect();
        assert_eq!(world.collect_dirty(usize::MAX), expected);
        assert_eq!(world.collect_dirty(3), expected[..3].to_vec());
    }

    #[test]
    fn mesh_handles_are_replaced_and_retired() {
        let mut world = World::new(4, config(1)).unwrap();
        let mut sink = RecordingSink::default();
        world.update_streaming(0.0, 0.0);

        let rebuilt = world.rebuild_meshes(&mut sink, 4);
        assert_eq!(rebuilt, 4);
        assert_eq!(sink.uploads.len(), 4);
        let rebuilt = world.rebuild_meshes(&mut sink, usize::MAX);
        assert_eq!(rebuilt, 5);
        assert_eq!(sink.live.len(), 9);
        assert!(world.chunks().iter().all(|c| c.mesh().is_some() && !c.is_dirty()));

        let before = world.find_chunk(0, 0).unwrap().mesh().unwrap();
        world.set_block(8, 140, 8, BlockId::GLASS).unwrap();
        world.rebuild_meshes(&mut sink, usize::MAX);
        assert_eq!(sink.retired, vec![before]);
        assert_ne!(world.find_chunk(0, 0).unwrap().mesh(), Some(before));

        // Unloading queues handles; the next rebuild hands them back.
        world.update_streaming(5000.0, 5000.0);
        world.rebuild_meshes(&mut sink, 0);
        assert_eq!(sink.live.len(), 0);
    }

    #[test]
    fn emptied_chunk_drops_its_mesh() {
        let mut world = test_world(4);
        let mut sink = RecordingSink::default();
        let pos = ChunkPos::new(0, 0);
        let mut air = Chunk::new(pos);
        air.mark_generated();
        air.set(1, 200, 1, BlockId::STONE);
        world.chunks.insert(air).unwrap();

        world.rebuild_meshes(&mut sink, usize::MAX);
        assert_eq!(sink.uploads, vec![(pos, 6)]);

        world.set_block(1, 200, 1, BlockId::AIR).unwrap();
        world.rebuild_meshes(&mut sink, usize::MAX);
        assert_eq!(sink.retired.len(), 1);
        assert!(world.find_chunk(0, 0).unwrap().mesh().is_none());
        assert!(!world.find_chunk(0, 0).unwrap().is_dirty());
    }

    #[test]
    fn raycast_reports_hit_and_placement() {
        let mut world = test_world(5);
        world.set_block(3, 200, 0, BlockId::STONE).unwrap();

        let hit = world
            .raycast(Vec3::new(0.5, 200.5, 0.5), Vec3::X)
            .expect("stone is within reach");
        assert_eq!(hit.hit, WorldPos::new(3, 200, 0));
        assert_eq!(hit.placement, WorldPos::new(2, 200, 0));
    }

    #[test]
    fn raycast_misses_are_not_errors() {
        let mut world = test_world(5);
        world.set_block(9, 200, 0, BlockId::STONE).unwrap();

        let origin = Vec3::new(0.5, 200.5, 0.5);
        assert!(world.raycast(origin, Vec3::X).is_none());
        assert!(world.raycast(origin, Vec3::Y).is_none());
        assert!(world.raycast(origin, Vec3::ZERO).is_none());
    }

    #[test]
    fn raycast_passes_through_water() {
        let mut world = test_world(5);
        world.set_block(1, 200, 0, BlockId::WATER).unwrap();
        world.set_block(2, 200, 0, BlockId::DIRT).unwrap();

        let hit = world.raycast(Vec3::new(0.5, 200.5, 0.5), Vec3::X).unwrap();
        assert_eq!(hit.hit, WorldPos::new(2, 200, 0));
        assert_eq!(hit.placement, WorldPos::new(1, 200, 0));
    }

    #[test]
    fn mover_queries() {
        let mut world = test_world(6);
        world.update_streaming(0.0, 0.0);

        let spawn = world.spawn_point();
        let height = world.generator().height_at(0, 0);
        assert!(world.is_solid_at(Vec3::new(0.5, height as f32 + 0.5, 0.5)));
        assert!(!world.is_solid_at(spawn));
        assert!(!world.intersects_solid(&Aabb::from_feet(spawn, 0.3, 1.8)));

        let standing = Vec3::new(0.5, height as f32 + 1.0, 0.5);
        assert!(!world.intersects_solid(&Aabb::from_feet(standing, 0.3, 1.8)));
        let sunk = Vec3::new(0.5, height as f32 + 0.5, 0.5);
        assert!(world.intersects_solid(&Aabb::from_feet(sunk, 0.3, 1.8)));
    }

    #[test]
    fn restore_respects_slots_taken_by_generation() {
        let mut world = World::new(
            5,
            WorldConfig {
                max_chunks: 8,
                ..config(1)
            },
        )
        .unwrap();

        // (1, 1) is the last chunk popped around the origin.
        world.set_block(20, 150, 20, BlockId::BRICK).unwrap();
        world.update_streaming(1000.0, 1000.0);
        assert_eq!(world.parked_count(), 1);

        let update = world.update_streaming(8.0, 8.0);
        assert_eq!(update.generated, 8);
        assert_eq!(update.restored, 0);
        assert_eq!(update.deferred, 1);
        assert_eq!(world.chunks().len(), 8);
        assert!(world.find_chunk(1, 1).is_none());
        assert_eq!(world.parked_count(), 1);
    }

    #[test]
    fn with_seed_matches_default_sync_world() {
        let mut quick = World::with_seed(77);
        let mut built = World::new(77, WorldConfig::default()).unwrap();
        assert_eq!(quick.config(), built.config());
        assert_eq!(quick.in_flight_count(), 0);
        assert_eq!(
            quick.get_chunk(2, -3).unwrap().blocks(),
            built.get_chunk(2, -3).unwrap().blocks()
        );
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.dat");

        let mut original = test_world(42);
        original.update_streaming(0.0, 0.0);
        original.set_block(-5, 180, 12, BlockId::GOLD_ORE).unwrap();
        let written = original.save(&path).unwrap();
        assert_eq!(written, 9);

        let mut restored = test_world(7);
        restored.get_chunk(40, 40).unwrap();
        let loaded = restored.load(&path).unwrap();

        assert_eq!(loaded, 9);
        assert_eq!(restored.seed(), 42);
        assert_eq!(restored.generator().seed(), 42);
        assert!(restored.find_chunk(40, 40).is_none());
        for chunk in original.chunks().iter() {
            let copy = restored.find_chunk(chunk.pos().x, chunk.pos().z).unwrap();
            assert_eq!(copy.blocks(), chunk.blocks());
            assert!(copy.is_generated() && copy.is_dirty());
        }
        assert_eq!(restored.get_block(-5, 180, 12), BlockId::GOLD_ORE);
    }

    #[test]
    fn save_includes_parked_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.dat");

        let mut world = test_world(42);
        world.set_block(0, 150, 0, BlockId::BRICK).unwrap();
        world.update_streaming(1000.0, 1000.0);
        assert_eq!(world.parked_count(), 1);
        assert_eq!(world.save(&path).unwrap(), 10);

        let mut restored = test_world(0);
        restored.load(&path).unwrap();
        assert_eq!(restored.get_block(0, 150, 0), BlockId::BRICK);
    }

    #[test]
    fn load_overflow_is_parked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.dat");

        let mut world = test_world(42);
        world.update_streaming(0.0, 0.0);
        world.save(&path).unwrap();

        let mut small = World::new(
            1,
            WorldConfig {
                max_chunks: 4,
                ..config(1)
            },
        )
        .unwrap();
        assert_eq!(small.load(&path).unwrap(), 9);
        assert_eq!(small.chunks().len(), 4);
        assert_eq!(small.parked_count(), 5);
    }

    #[test]
    fn failed_load_leaves_world_intact() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.dat");
        std::fs::write(&garbage, [1, 0, 0, 0, 5, 0, 0, 0, 9]).unwrap();

        let mut world = test_world(3);
        world.set_block(1, 100, 1, BlockId::SNOW).unwrap();

        assert!(matches!(world.load(&garbage), Err(Error::InvalidData(_))));
        assert!(matches!(
            world.load(dir.path().join("missing.dat")),
            Err(Error::Io(_))
        ));

        assert_eq!(world.seed(), 3);
        assert_eq!(world.chunks().len(), 1);
        assert_eq!(world.get_block(1, 100, 1), BlockId::SNOW);
    }

    #[test]
    fn load_rejects_chunks_beyond_world_edge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.dat");
        let stone = vec![BlockId::STONE; voxland_core::constants::CHUNK_VOLUME];
        persistence::save_to_path(&path, 5, &[(ChunkPos::new(i32::MAX, 0), stone.as_slice())])
            .unwrap();

        let mut world = test_world(3);
        world.update_streaming(0.0, 0.0);
        assert!(matches!(world.load(&path), Err(Error::InvalidData(_))));
        assert_eq!(world.seed(), 3);
        assert_eq!(world.chunks().len(), 9);

        let update = world.update_streaming(100.0, 0.0);
        assert_eq!(update.center, ChunkPos::new(6, 0));
    }

    #[test]
    fn get_chunk_beyond_world_edge_is_out_of_bounds() {
        let mut world = test_world(3);
        assert!(matches!(world.get_chunk(i32::MAX, 0), Err(Error::OutOfBounds(_))));
        assert!(matches!(world.get_chunk(0, i32::MIN), Err(Error::OutOfBounds(_))));
        assert!(world.chunks().is_empty());

        let edge = ChunkPos::MAX_COORD;
        assert_eq!(world.get_chunk(edge, 0).unwrap().pos(), ChunkPos::new(edge, 0));
    }

    #[test]
    fn failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(3);
        // A directory can't be replaced by a file.
        assert!(world.save(dir.path()).is_err());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn async_get_chunk_reports_pending() {
        let mut world = World::new(
            8,
            WorldConfig {
                mode: GenerationMode::Async,
                ..config(1)
            },
        )
        .unwrap();

        assert!(matches!(world.get_chunk(2, 2), Err(Error::ChunkPending(_))));
        assert!(world.in_flight_count() >= 1);
        assert!(wait_for_chunk(&mut world, 2, 2));
        assert_eq!(
            world.find_chunk(2, 2).unwrap().blocks(),
            TerrainGenerator::new(8, config(1).terrain)
                .generate(ChunkPos::new(2, 2))
                .blocks()
        );
    }

    #[test]
    fn async_set_block_generates_immediately() {
        let mut world = World::new(
            8,
            WorldConfig {
                mode: GenerationMode::Async,
                ..config(1)
            },
        )
        .unwrap();

        assert!(world.get_chunk(0, 0).is_err());
        world.set_block(4, 120, 4, BlockId::ICE).unwrap();
        assert_eq!(world.get_block(4, 120, 4), BlockId::ICE);

        // The worker's copy of the chunk must not overwrite the edit.
        std::thread::sleep(Duration::from_millis(200));
        world.poll_generated();
        assert_eq!(world.get_block(4, 120, 4), BlockId::ICE);
    }

    #[test]
    fn async_streaming_fills_in_over_updates() {
        let mut world = World::new(
            8,
            WorldConfig {
                mode: GenerationMode::Async,
                ..config(1)
            },
        )
        .unwrap();

        let first = world.update_streaming(0.0, 0.0);
        assert_eq!(first.generated, 0);
        assert_eq!(first.submitted, 9);

        let deadline = Instant::now() + Duration::from_secs(20);
        while world.chunks().len() < 9 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
            world.update_streaming(0.0, 0.0);
        }
        assert_eq!(world.chunks().len(), 9);
        assert_eq!(world.in_flight_count(), 0);
    }

    #[test]
    fn load_discards_in_flight_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.dat");
        let mut source = test_world(77);
        source.get_chunk(0, 0).unwrap();
        source.save(&path).unwrap();

        let mut world = World::new(
            8,
            WorldConfig {
                mode: GenerationMode::Async,
                ..config(1)
            },
        )
        .unwrap();
        world.update_streaming(0.0, 0.0);
        world.load(&path).unwrap();
        assert_eq!(world.in_flight_count(), 0);

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(world.poll_generated(), 0);
        assert_eq!(world.chunks().len(), 1);
        assert_eq!(
            world.find_chunk(0, 0).unwrap().blocks(),
            source.find_chunk(0, 0).unwrap().blocks()
        );
    }
}
