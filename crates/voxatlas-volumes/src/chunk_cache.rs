// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed on-disk cache of decoded chunks.
//!
//! File name = SHA-256 of `(source url, scale key, chunk grid coordinates,
//! frame)`. File layout: magic `VXC1`, three little-endian `u32` dimensions
//! `(z, y, x)`, then the `f32` values.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array3;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{VolumeError, VolumeResult};

const MAGIC: &[u8; 4] = b"VXC1";
const EXTENSION: &str = "chunk";

#[derive(Debug, Clone)]
pub struct ChunkCache {
    dir: PathBuf,
}

impl ChunkCache {
    /// Open (and create if needed) a cache directory
    pub fn open(dir: impl Into<PathBuf>) -> VolumeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| VolumeError::Cache(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic key of one chunk
    pub fn key(source_url: &str, scale_key: &str, grid: [i64; 3], frame: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_url.as_bytes());
        hasher.update([0u8]);
        hasher.update(scale_key.as_bytes());
        hasher.update([0u8]);
        for g in grid {
            hasher.update(g.to_le_bytes());
        }
        hasher.update((frame as u64).to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    /// Cached chunk for `key`, if any. Unreadable entries count as misses.
    pub fn get(&self, key: &str) -> Option<Array3<f32>> {
        let path = self.path(key);
        if !path.is_file() {
            return None;
        }
        match read_chunk_file(&path) {
            Ok(chunk) => {
                debug!("Chunk cache hit {}", key);
                Some(chunk)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn put(&self, key: &str, chunk: &Array3<f32>) -> VolumeResult<()> {
        let path = self.path(key);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        for dim in chunk.shape() {
            writer.write_u32::<LittleEndian>(*dim as u32)?;
        }
        for value in chunk.iter() {
            writer.write_f32::<LittleEndian>(*value)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Remove every cached chunk
    pub fn clear(&self) -> VolumeResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn read_chunk_file(path: &Path) -> VolumeResult<Array3<f32>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(VolumeError::Cache("bad magic".to_string()));
    }
    let mut shape = [0usize; 3];
    for dim in shape.iter_mut() {
        *dim = reader.read_u32::<LittleEndian>()? as usize;
    }
    let mut values = vec![0f32; shape.iter().product()];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Array3::from_shape_vec(shape, values).map_err(|e| VolumeError::Cache(e.to_string()))
}
