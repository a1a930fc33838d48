//! Voxland headless driver
//!
//! Walks an observer across procedurally generated terrain, streaming chunks
//! in and out and rebuilding meshes every frame, without a window.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p voxland-cli -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use glam::Vec3;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voxland_core::{BlockId, ChunkPos};
use voxland_world::{
    ChunkMesh, GenerationMode, MeshHandle, MeshSink, StreamingConfig, World, WorldConfig,
};

/// Upper bound on meshes rebuilt per frame.
const MESHES_PER_FRAME: usize = 64;
/// How long the last frame waits for the worker to drain in async mode.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Options {
    seed: i32,
    render_distance: i32,
    frames: u32,
    step: f32,
    mode: GenerationMode,
    save: Option<PathBuf>,
    load: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: 12345,
            render_distance: StreamingConfig::default().render_distance,
            frames: 120,
            step: 1.0,
            mode: GenerationMode::Sync,
            save: None,
            load: None,
        }
    }
}

impl Options {
    fn from_args() -> anyhow::Result<Self> {
        let mut options = Self::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seed" => options.seed = parse_value(&arg, args.next())?,
                "--render-distance" => options.render_distance = parse_value(&arg, args.next())?,
                "--frames" => options.frames = parse_value(&arg, args.next())?,
                "--step" => options.step = parse_value(&arg, args.next())?,
                "--async" => options.mode = GenerationMode::Async,
                "--save" => options.save = Some(parse_value(&arg, args.next())?),
                "--load" => options.load = Some(parse_value(&arg, args.next())?),
                other => anyhow::bail!("unknown argument `{other}`, see --help"),
            }
        }

        anyhow::ensure!(options.render_distance >= 0, "render distance must not be negative");
        Ok(options)
    }
}

fn parse_value<T>(flag: &str, value: Option<String>) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = value.with_context(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .with_context(|| format!("invalid value `{value}` for {flag}"))
}

/// Stands in for a renderer: counts uploads and live handles.
#[derive(Debug, Default)]
struct CountingSink {
    next: u64,
    live: usize,
    uploaded: usize,
    vertices: usize,
}

impl MeshSink for CountingSink {
    fn upload(&mut self, _pos: ChunkPos, mesh: &ChunkMesh) -> MeshHandle {
        self.next += 1;
        self.live += 1;
        self.uploaded += 1;
        self.vertices += mesh.vertex_count();
        MeshHandle(self.next)
    }

    fn retire(&mut self, _handle: MeshHandle) {
        self.live = self.live.saturating_sub(1);
    }
}

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = Options::from_args()?;
    run(&options)
}

fn run(options: &Options) -> anyhow::Result<()> {
    let config = WorldConfig {
        streaming: StreamingConfig {
            render_distance: options.render_distance,
            ..StreamingConfig::default()
        },
        mode: options.mode,
        ..WorldConfig::default()
    };
    let mut world = World::new(options.seed, config).context("failed to create world")?;

    if let Some(path) = &options.load {
        let count = world
            .load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!(chunks = count, seed = world.seed(), "resumed saved world");
    }

    let spawn = world.spawn_point();
    info!(
        seed = world.seed(),
        mode = ?options.mode,
        render_distance = options.render_distance,
        spawn = ?spawn,
        "starting walk"
    );

    let mut sink = CountingSink::default();
    let started = Instant::now();
    let mut observer = spawn;

    for frame in 0..options.frames {
        let update = world.update_streaming(observer.x, observer.z);
        world.rebuild_meshes(&mut sink, MESHES_PER_FRAME);

        if frame % 30 == 0 {
            info!(
                frame,
                center = ?update.center,
                loaded = world.chunks().len(),
                in_flight = update.in_flight,
                parked = world.parked_count(),
                "frame"
            );
        }
        observer.x += options.step;
    }

    if options.mode == GenerationMode::Async {
        drain(&mut world, &mut sink, observer);
    }
    while world.rebuild_meshes(&mut sink, MESHES_PER_FRAME) > 0 {}

    dig_below(&mut world, observer);

    info!(
        elapsed = ?started.elapsed(),
        loaded = world.chunks().len(),
        parked = world.parked_count(),
        meshes_uploaded = sink.uploaded,
        meshes_live = sink.live,
        vertices = sink.vertices,
        memory_kib = world.chunks().memory_usage() / 1024,
        "walk finished"
    );

    if let Some(path) = &options.save {
        let count = world
            .save(path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!(chunks = count, path = %path.display(), "saved");
    }

    Ok(())
}

/// Keep streaming at the final position until the worker has caught up.
fn drain(world: &mut World, sink: &mut CountingSink, observer: Vec3) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        let update = world.update_streaming(observer.x, observer.z);
        world.rebuild_meshes(sink, MESHES_PER_FRAME);
        if update.in_flight == 0 && update.deferred == 0 {
            break;
        }
        if Instant::now() >= deadline {
            warn!(in_flight = update.in_flight, "gave up waiting for chunk worker");
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Pick the block under the observer and replace it with air.
fn dig_below(world: &mut World, observer: Vec3) {
    let surface = world
        .generator()
        .height_at(observer.x.floor() as i32, observer.z.floor() as i32);
    let eye = Vec3::new(observer.x, surface as f32 + 2.5, observer.z);

    match world.raycast(eye, Vec3::NEG_Y) {
        Some(hit) => {
            let before = world.get_block(hit.hit.x, hit.hit.y, hit.hit.z);
            match world.set_block(hit.hit.x, hit.hit.y, hit.hit.z, BlockId::AIR) {
                Ok(()) => info!(block = ?before, at = ?hit.hit, "dug block below observer"),
                Err(err) => warn!(%err, "could not dig"),
            }
        }
        None => info!("nothing within reach below observer"),
    }
}

fn print_help() {
    eprintln!(
        "Voxland headless world driver

USAGE:
    cargo run -p voxland-cli -- [OPTIONS]

WORLD OPTIONS:
    --seed <N>              World generation seed (default: 12345)
    --load <PATH>           Resume from a save file before walking
    --save <PATH>           Write the world to PATH when finished

STREAMING OPTIONS:
    --render-distance <N>   Chunk load radius (default: 8)
    --async                 Generate chunks on a background worker
    --frames <N>            Number of frames to simulate (default: 120)
    --step <F>              Blocks walked east per frame (default: 1.0)

OTHER:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
