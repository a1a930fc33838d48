//! Chunk streaming around an observer.
//!
//! The streamer decides which chunks are missing near the observer, nearest
//! first, and produces them either on the calling thread or on a background
//! worker. Worker results are tagged with an epoch so that anything requested
//! before a world reload is dropped on arrival.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use voxland_core::{ChunkPos, Result};

use crate::chunk::Chunk;
use crate::chunk_manager::ChunkManager;
use crate::generation::TerrainGenerator;

/// Load queue entry. The heap pops the nearest chunk first.
#[derive(Debug, Clone, Copy)]
struct LoadPriority {
    pos: ChunkPos,
    /// Squared distance to the observer chunk (lower = higher priority).
    distance_sq: i32,
}

impl PartialEq for LoadPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LoadPriority {}

impl PartialOrd for LoadPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken by position so order is stable.
        other
            .distance_sq
            .cmp(&self.distance_sq)
            .then_with(|| other.pos.x.cmp(&self.pos.x))
            .then_with(|| other.pos.z.cmp(&self.pos.z))
    }
}

/// How far around the observer chunks are kept, and how fast they load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Chebyshev radius in chunks kept loaded around the observer.
    pub render_distance: i32,
    /// Extra chunks beyond `render_distance` before a chunk is unloaded.
    pub unload_margin: i32,
    /// Maximum chunks handed to the worker per update in async mode.
    pub max_gen_per_update: usize,
    /// Whether chunks far from the observer are unloaded.
    pub unload: bool,
}

impl StreamingConfig {
    /// Chebyshev distance beyond which chunks are unloaded.
    pub const fn unload_distance(&self) -> i32 {
        self.render_distance + self.unload_margin
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            unload_margin: 2,
            max_gen_per_update: 16,
            unload: true,
        }
    }
}

/// Summary of one streaming update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingUpdate {
    /// Chunk containing the observer.
    pub center: ChunkPos,
    /// Chunks generated and inserted during this update.
    pub generated: usize,
    /// Parked chunks brought back instead of regenerated.
    pub restored: usize,
    /// Chunks handed to the background worker.
    pub submitted: usize,
    /// Chunks removed for being too far away.
    pub unloaded: usize,
    /// Chunks still requested from the worker.
    pub in_flight: usize,
    /// Missing chunks that could not be loaded yet.
    pub deferred: usize,
}

/// Message from the streamer to the worker.
enum ChunkWorkRequest {
    /// Build terrain for a batch of columns.
    Generate {
        epoch: u64,
        generator: Arc<TerrainGenerator>,
        positions: Vec<ChunkPos>,
    },
    /// Ask the thread to exit.
    Shutdown,
}

/// One generated chunk, tagged with the epoch it was requested in.
struct ChunkWorkResult {
    epoch: u64,
    chunk: Chunk,
}

/// Owns the generation thread and both ends of its channels.
struct ChunkWorkerHandle {
    /// Outgoing generation batches.
    request_tx: Sender<ChunkWorkRequest>,
    /// Finished chunks coming back.
    result_rx: Receiver<ChunkWorkResult>,
    /// Joined on shutdown.
    thread: Option<JoinHandle<()>>,
}

impl ChunkWorkerHandle {
    fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = channel::bounded::<ChunkWorkRequest>(16);
        let (result_tx, result_rx) = channel::unbounded::<ChunkWorkResult>();

        let thread = thread::Builder::new()
            .name("chunk-worker".to_string())
            .spawn(move || Self::worker_loop(&request_rx, &result_tx))?;
        debug!("chunk worker started");

        Ok(Self {
            request_tx,
            result_rx,
            thread: Some(thread),
        })
    }

    /// Blocks waiting for requests and generates each batch with rayon.
    fn worker_loop(request_rx: &Receiver<ChunkWorkRequest>, result_tx: &Sender<ChunkWorkResult>) {
        while let Ok(ChunkWorkRequest::Generate {
            epoch,
            generator,
            positions,
        }) = request_rx.recv()
        {
            for chunk in generator.generate_chunks_parallel(&positions) {
                if result_tx.send(ChunkWorkResult { epoch, chunk }).is_err() {
                    return;
                }
            }
        }
        debug!("chunk worker exiting");
    }

    /// Queue a request without blocking. `false` if the queue is full.
    fn send_work(&self, request: ChunkWorkRequest) -> bool {
        self.request_tx.try_send(request).is_ok()
    }

    fn try_recv(&self) -> Option<ChunkWorkResult> {
        self.result_rx.try_recv().ok()
    }

    /// Stop the thread and join it.
    fn shutdown(&mut self) {
        let _ = self.request_tx.send(ChunkWorkRequest::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ChunkWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Plans and produces chunks around a moving observer.
pub struct ChunkStreamer {
    config: StreamingConfig,
    generator: Arc<TerrainGenerator>,
    load_queue: BinaryHeap<LoadPriority>,
    /// Present only in async mode.
    worker: Option<ChunkWorkerHandle>,
    /// Positions requested from the worker and not yet accepted.
    in_flight: HashSet<ChunkPos>,
    /// Bumped whenever outstanding requests must be ignored.
    epoch: u64,
}

impl ChunkStreamer {
    /// Create a streamer that generates chunks on the calling thread.
    pub fn new(config: StreamingConfig, generator: TerrainGenerator) -> Self {
        Self {
            config,
            generator: Arc::new(generator),
            load_queue: BinaryHeap::new(),
            worker: None,
            in_flight: HashSet::new(),
            epoch: 0,
        }
    }

    /// Create a streamer backed by a background worker thread.
    pub fn new_async(config: StreamingConfig, generator: TerrainGenerator) -> Result<Self> {
        let worker = ChunkWorkerHandle::spawn()?;
        Ok(Self {
            worker: Some(worker),
            ..Self::new(config, generator)
        })
    }

    /// Whether generation runs on the background worker.
    pub fn is_async(&self) -> bool {
        self.worker.is_some()
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Queue every chunk within render distance of `center` that is neither
    /// loaded nor in flight.
    pub fn rebuild_load_queue(&mut self, center: ChunkPos, chunk_manager: &ChunkManager) {
        self.load_queue.clear();

        let r = self.config.render_distance;
        for dz in -r..=r {
            for dx in -r..=r {
                let pos = ChunkPos::new(center.x + dx, center.z + dz);
                if !chunk_manager.contains(pos) && !self.in_flight.contains(&pos) {
                    self.load_queue.push(LoadPriority {
                        pos,
                        distance_sq: dx * dx + dz * dz,
                    });
                }
            }
        }
    }

    /// Nearest queued position.
    pub fn pop_load(&mut self) -> Option<ChunkPos> {
        self.load_queue.pop().map(|entry| entry.pos)
    }

    /// Missing chunks still queued from the last rebuild.
    pub fn pending_count(&self) -> usize {
        self.load_queue.len()
    }

    /// Generate chunks on the calling thread, in parallel.
    pub fn generate_now(&self, positions: &[ChunkPos]) -> Vec<Chunk> {
        self.generator.generate_chunks_parallel(positions)
    }

    /// Hand a batch to the worker.
    ///
    /// Returns `false` without side effects when there is no worker or its
    /// queue is full.
    pub fn submit(&mut self, positions: Vec<ChunkPos>) -> bool {
        let Some(worker) = &self.worker else {
            return false;
        };
        if positions.is_empty() {
            return true;
        }

        let request = ChunkWorkRequest::Generate {
            epoch: self.epoch,
            generator: Arc::clone(&self.generator),
            positions: positions.clone(),
        };
        if !worker.send_work(request) {
            return false;
        }
        self.in_flight.extend(positions);
        true
    }

    /// Drain finished chunks from the worker (non-blocking).
    ///
    /// A chunk is returned only if it was requested in the current epoch and
    /// is still wanted.
    pub fn collect_completed(&mut self) -> Vec<Chunk> {
        let mut accepted = Vec::new();
        let Some(worker) = &self.worker else {
            return accepted;
        };

        while let Some(result) = worker.try_recv() {
            let pos = result.chunk.pos();
            if result.epoch == self.epoch && self.in_flight.remove(&pos) {
                accepted.push(result.chunk);
            } else {
                trace!(?pos, epoch = result.epoch, "discarding stale chunk");
            }
        }
        accepted
    }

    pub fn is_in_flight(&self, pos: ChunkPos) -> bool {
        self.in_flight.contains(&pos)
    }

    /// Chunks submitted to the worker and not yet collected.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop waiting for a chunk; its result will be discarded.
    pub fn cancel(&mut self, pos: ChunkPos) -> bool {
        self.in_flight.remove(&pos)
    }

    /// Cancel in-flight chunks farther than `radius` from `center`.
    pub fn cancel_outside(&mut self, center: ChunkPos, radius: i32) {
        self.in_flight
            .retain(|pos| pos.chebyshev_distance(center) <= radius);
    }

    /// Switch to a new generator and forget every outstanding request.
    pub fn reset(&mut self, generator: TerrainGenerator) {
        self.generator = Arc::new(generator);
        self.epoch += 1;
        self.in_flight.clear();
        self.load_queue.clear();
    }
}
