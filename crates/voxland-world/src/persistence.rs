//! Binary world save format.
//!
//! Layout, all integers little-endian `i32`:
//!
//! ```text
//! seed
//! chunk_count
//! chunk_count x { cx, cz, CHUNK_VOLUME voxel bytes }
//! ```
//!
//! Voxels are stored one byte per cell in `LocalPos::to_index` order.
//! There is no header, version or checksum.

use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use voxland_core::constants::CHUNK_VOLUME;
use voxland_core::{BlockId, ChunkPos, Error, Result};

use crate::WorldSeed;

/// Size in bytes of one chunk record.
pub const RECORD_SIZE: usize = 8 + CHUNK_VOLUME;

/// A fully parsed and validated save file.
#[derive(Debug)]
pub struct WorldSave {
    pub seed: WorldSeed,
    /// Chunk records in file order.
    pub chunks: Vec<(ChunkPos, Box<[BlockId]>)>,
}

/// Encode a world into `writer`. Returns the number of records written.
pub fn write_world<W: Write>(
    writer: &mut W,
    seed: WorldSeed,
    chunks: &[(ChunkPos, &[BlockId])],
) -> Result<usize> {
    let count = i32::try_from(chunks.len())
        .map_err(|_| Error::InvalidData(format!("too many chunks to save: {}", chunks.len())))?;

    writer.write_all(&seed.to_le_bytes())?;
    writer.write_all(&count.to_le_bytes())?;

    for (pos, blocks) in chunks {
        if blocks.len() != CHUNK_VOLUME {
            return Err(Error::InvalidData(format!(
                "chunk ({}, {}) has {} voxels",
                pos.x,
                pos.z,
                blocks.len()
            )));
        }
        writer.write_all(&pos.x.to_le_bytes())?;
        writer.write_all(&pos.z.to_le_bytes())?;
        writer.write_all(bytemuck::cast_slice::<BlockId, u8>(blocks))?;
    }

    Ok(chunks.len())
}

/// Decode a complete save file.
///
/// The whole input must be consumed: truncated records, a negative count,
/// duplicate or out-of-world chunk coordinates and trailing bytes are all
/// rejected.
pub fn read_world(bytes: &[u8]) -> Result<WorldSave> {
    let mut reader = ByteReader::new(bytes);
    let seed = reader.read_i32()?;
    let count = reader.read_i32()?;
    let count = usize::try_from(count)
        .map_err(|_| Error::InvalidData(format!("negative chunk count {count}")))?;

    // Cap the preallocation by what the input could actually hold.
    let mut chunks = Vec::with_capacity(count.min(reader.remaining() / RECORD_SIZE));
    let mut seen = HashSet::with_capacity(chunks.capacity());

    for index in 0..count {
        let pos = ChunkPos::new(reader.read_i32()?, reader.read_i32()?);
        if !pos.is_addressable() {
            return Err(Error::InvalidData(format!(
                "chunk ({}, {}) at record {index} is outside the world",
                pos.x, pos.z
            )));
        }
        if !seen.insert(pos) {
            return Err(Error::InvalidData(format!(
                "duplicate chunk ({}, {}) at record {index}",
                pos.x, pos.z
            )));
        }
        let voxels = reader.read_bytes(CHUNK_VOLUME)?;
        let blocks: Box<[BlockId]> = voxels.iter().map(|&tag| BlockId(tag)).collect();
        chunks.push((pos, blocks));
    }

    if reader.remaining() != 0 {
        return Err(Error::InvalidData(format!(
            "{} trailing bytes after {count} chunks",
            reader.remaining()
        )));
    }

    Ok(WorldSave { seed, chunks })
}

/// Write a save file, replacing `path` only once the new file is complete.
pub fn save_to_path(
    path: &Path,
    seed: WorldSeed,
    chunks: &[(ChunkPos, &[BlockId])],
) -> Result<usize> {
    let temp_path = temp_sibling(path)?;

    let result = write_file(&temp_path, seed, chunks).and_then(|written| {
        fs::rename(&temp_path, path)?;
        Ok(written)
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_file(path: &Path, seed: WorldSeed, chunks: &[(ChunkPos, &[BlockId])]) -> Result<usize> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    let written = write_world(&mut writer, seed, chunks)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(written)
}

/// Read and validate a save file.
pub fn load_from_path(path: &Path) -> Result<WorldSave> {
    let bytes = fs::read(path)?;
    read_world(&bytes)
}

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidData(format!("{} is not a file path", path.display())))?;
    let mut temp_name = OsString::from(name);
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn read_i32(&mut self) -> Result<i32> {
        let (head, rest) = self
            .bytes
            .split_first_chunk::<4>()
            .ok_or_else(|| Error::InvalidData("unexpected end of save file".into()))?;
        self.bytes = rest;
        Ok(i32::from_le_bytes(*head))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < len {
            return Err(Error::InvalidData(format!(
                "truncated chunk record: {} of {len} bytes",
                self.bytes.len()
            )));
        }
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(head)
    }
}
