// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Assembly of sub-volumes from chunk grids.
//!
//! A fetch maps the physical region of interest into the scale's voxel space,
//! reads every chunk of the covering grid into a buffer sized to the grid
//! footprint, crops the overhang, and returns the data in the store's native
//! `(z, y, x)` order together with an affine that accounts for the reversal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{s, Array3};
use tracing::{debug, warn};
use voxatlas_structures::{Affine, BoundingBox, Image};

use crate::byte_source::ByteSource;
use crate::chunk_cache::ChunkCache;
use crate::codec::decode_raw;
use crate::error::{VolumeError, VolumeResult};
use crate::scale::{Scale, ScaleCatalog};

const RAW_ENCODING: &str = "raw";

#[derive(Debug)]
pub struct ChunkedVolumeFetcher {
    base_url: String,
    source: Arc<dyn ByteSource>,
    cache: Option<ChunkCache>,
    color_warning_issued: AtomicBool,
}

impl ChunkedVolumeFetcher {
    pub fn new(base_url: impl Into<String>, source: Arc<dyn ByteSource>, cache: Option<ChunkCache>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source,
            cache,
            color_warning_issued: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> Option<&ChunkCache> {
        self.cache.as_ref()
    }

    /// Fetch the first channel; further channels are dropped with a one-time warning
    pub fn fetch(&self, catalog: &ScaleCatalog, scale: &Scale, bbox: Option<&BoundingBox>) -> VolumeResult<Image> {
        if catalog.num_channels() > 1 && !self.color_warning_issued.swap(true, Ordering::Relaxed) {
            warn!(
                "Volume {} has {} channels; color channel data is not supported, returning the first channel only",
                self.base_url,
                catalog.num_channels()
            );
        }
        self.fetch_frame(catalog, scale, bbox, 0)
    }

    /// Fetch one channel of `scale` restricted to the physical `bbox`
    /// (whole extent if `None`)
    pub fn fetch_frame(
        &self,
        catalog: &ScaleCatalog,
        scale: &Scale,
        bbox: Option<&BoundingBox>,
        frame: usize,
    ) -> VolumeResult<Image> {
        if frame >= catalog.num_channels() {
            return Err(VolumeError::FrameOutOfRange {
                frame,
                frames: catalog.num_channels(),
            });
        }
        if scale.encoding != RAW_ENCODING {
            return Err(VolumeError::UnsupportedEncoding(scale.encoding.clone()));
        }

        let mut voxel_box = scale.voxel_bbox(bbox)?;
        for axis in voxel_box.expand_degenerate(1.0) {
            warn!(
                "Bounding box in voxel space will be enlarged to voxel size 1 along axis {}.",
                axis
            );
        }
        let voxel_box = voxel_box
            .snap_outward()
            .intersection(&scale.extent())
            .ok_or_else(|| VolumeError::OutOfBounds(format!("{:?}", bbox)))?;

        // inclusive-lower / exclusive-upper chunk grid range, (x, y, z)
        let mut g0 = [0i64; 3];
        let mut g1 = [0i64; 3];
        for d in 0..3 {
            let offset = scale.voxel_offset[d] as f64;
            let chunk = scale.chunk_size[d] as f64;
            g0[d] = ((voxel_box.min[d] - offset) / chunk).floor() as i64;
            g1[d] = ((voxel_box.max[d] - offset) / chunk).ceil() as i64;
        }
        debug!(
            "Fetching chunks {:?}..{:?} of scale '{}' from {}",
            g0, g1, scale.key, self.base_url
        );

        let [cx, cy, cz] = scale.chunk_size;
        let buffer_zyx = [
            (g1[2] - g0[2]) as usize * cz,
            (g1[1] - g0[1]) as usize * cy,
            (g1[0] - g0[0]) as usize * cx,
        ];
        let mut buffer = Array3::<f32>::zeros(buffer_zyx);

        for gx in g0[0]..g1[0] {
            let x0 = (gx - g0[0]) as usize * cx;
            for gy in g0[1]..g1[1] {
                let y0 = (gy - g0[1]) as usize * cy;
                for gz in g0[2]..g1[2] {
                    let z0 = (gz - g0[2]) as usize * cz;
                    let chunk = self.read_chunk(catalog, scale, [gx, gy, gz], frame)?;
                    let (dz, dy, dx) = chunk.dim();
                    buffer
                        .slice_mut(s![z0..z0 + dz, y0..y0 + dy, x0..x0 + dx])
                        .assign(&chunk);
                }
            }
        }

        // crop the chunk mosaic to the requested voxel box
        let mut start = [0usize; 3];
        let mut extent = [0usize; 3];
        for d in 0..3 {
            let mosaic_origin = scale.voxel_offset[d] + g0[d] * scale.chunk_size[d] as i64;
            start[d] = (voxel_box.min[d] as i64 - mosaic_origin) as usize;
            extent[d] = (voxel_box.max[d] - voxel_box.min[d]) as usize;
        }
        let data = buffer
            .slice(s![
                start[2]..start[2] + extent[2],
                start[1]..start[1] + extent[1],
                start[0]..start[0] + extent[0]
            ])
            .to_owned();

        let affine = scale
            .affine()
            .compose(&Affine::translation(voxel_box.min))
            .compose(&Affine::axis_reversal());
        Ok(Image::new(data, affine, catalog.dtype()))
    }

    /// One chunk as `(z, y, x)` for the given frame, via the cache when enabled
    fn read_chunk(&self, catalog: &ScaleCatalog, scale: &Scale, grid: [i64; 3], frame: usize) -> VolumeResult<Array3<f32>> {
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ChunkCache::key(&self.base_url, &scale.key, grid, frame));
        let (lo, hi) = scale.chunk_bounds(grid);
        let shape_zyx = (
            (hi[2] - lo[2]) as usize,
            (hi[1] - lo[1]) as usize,
            (hi[0] - lo[0]) as usize,
        );
        let url = scale.chunk_url(&self.base_url, grid);

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            match cache.get(key) {
                Some(chunk) if chunk.dim() == shape_zyx => return Ok(chunk),
                Some(chunk) => warn!(
                    "Cached chunk for {} has shape {:?} instead of {:?}, fetching it again",
                    url,
                    chunk.dim(),
                    shape_zyx
                ),
                None => {}
            }
        }

        let shape_czyx = [catalog.num_channels(), shape_zyx.0, shape_zyx.1, shape_zyx.2];
        let bytes = self.source.fetch_bytes(&url)?;
        let chunk_czyx = decode_raw(&bytes, catalog.dtype(), shape_czyx)?;
        let chunk = chunk_czyx.slice(s![frame, .., .., ..]).to_owned();

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Err(e) = cache.put(key, &chunk) {
                warn!("Could not write chunk {} to cache: {}", url, e);
            }
        }
        Ok(chunk)
    }
}
