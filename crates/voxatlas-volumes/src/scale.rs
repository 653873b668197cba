// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Resolution levels of a chunked volume.
//!
//! Scales are ordered finest first by the geometric mean of their per-axis
//! resolution, ties broken by key. A plain all-axes comparison is not a total
//! order for anisotropic data, so a single scalar key is used instead.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use voxatlas_structures::{Affine, BoundingBox, DataType, MapType};

use crate::error::{VolumeError, VolumeResult};

const NM_PER_MM: f64 = 1e6;

/// One entry of `info.scales`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    pub chunk_sizes: Vec<[usize; 3]>,
    pub encoding: String,
    pub key: String,
    /// Nanometres per voxel
    pub resolution: [f64; 3],
    pub size: [usize; 3],
    #[serde(default)]
    pub voxel_offset: [i64; 3],
}

/// The precomputed `info` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedInfo {
    pub data_type: DataType,
    #[serde(default = "default_channels")]
    pub num_channels: usize,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub scales: Vec<ScaleInfo>,
}

fn default_channels() -> usize {
    1
}

impl PrecomputedInfo {
    pub fn from_json(bytes: &[u8]) -> VolumeResult<Self> {
        let info: PrecomputedInfo = serde_json::from_slice(bytes)?;
        if info.scales.is_empty() {
            return Err(VolumeError::InvalidInfo("no scales defined".to_string()));
        }
        if info.num_channels == 0 {
            return Err(VolumeError::InvalidInfo("num_channels must be at least 1".to_string()));
        }
        Ok(info)
    }

    /// Segmentation volumes hold labels, everything else continuous values
    pub fn map_type(&self) -> MapType {
        if self.volume_type == "segmentation" {
            MapType::Labelled
        } else {
            MapType::Continuous
        }
    }
}

/// A single resolution level with its chunk grid and voxel-to-physical affine
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    pub key: String,
    pub chunk_size: [usize; 3],
    pub resolution_nm: [f64; 3],
    /// Voxel extent (x, y, z)
    pub size: [usize; 3],
    pub voxel_offset: [i64; 3],
    pub encoding: String,
    affine: Affine,
}

impl Scale {
    /// Build a scale from its info entry and the volume's nanometre transform
    pub fn from_info(info: &ScaleInfo, transform_nm: &Affine) -> VolumeResult<Self> {
        let chunk_size = *info.chunk_sizes.first().ok_or_else(|| {
            VolumeError::InvalidInfo(format!("scale '{}' has no chunk size", info.key))
        })?;
        if chunk_size.contains(&0) || info.size.contains(&0) {
            return Err(VolumeError::InvalidInfo(format!(
                "scale '{}' has zero chunk size or extent",
                info.key
            )));
        }
        if info.resolution.iter().any(|r| !(*r > 0.0)) {
            return Err(VolumeError::InvalidInfo(format!(
                "scale '{}' has non-positive resolution {:?}",
                info.key, info.resolution
            )));
        }

        let scaling = Affine::from_scale_offset(info.resolution, [0.0; 3]);
        let affine = transform_nm.compose(&scaling).scale_spatial_rows(NM_PER_MM);

        Ok(Self {
            key: info.key.clone(),
            chunk_size,
            resolution_nm: info.resolution,
            size: info.size,
            voxel_offset: info.voxel_offset,
            encoding: info.encoding.clone(),
            affine,
        })
    }

    pub fn resolution_mm(&self) -> [f64; 3] {
        self.resolution_nm.map(|r| r / NM_PER_MM)
    }

    /// True if this scale is at least as fine as `resolution_mm` on every axis
    pub fn resolves(&self, resolution_mm: f64) -> bool {
        self.resolution_mm().iter().all(|r| *r <= resolution_mm)
    }

    /// Geometric mean resolution in mm, the ordering key of a catalog
    pub fn ordering_key(&self) -> f64 {
        let [a, b, c] = self.resolution_mm();
        (a * b * c).cbrt()
    }

    /// Voxel (x, y, z) -> physical mm
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Full voxel extent, offset included
    pub fn extent(&self) -> BoundingBox {
        let min = self.voxel_offset.map(|o| o as f64);
        let max = [
            min[0] + self.size[0] as f64,
            min[1] + self.size[1] as f64,
            min[2] + self.size[2] as f64,
        ];
        BoundingBox::new(min, max, None)
    }

    /// A physical bounding box expressed in this scale's voxel space, or the
    /// full extent when no box is given
    pub fn voxel_bbox(&self, bbox: Option<&BoundingBox>) -> VolumeResult<BoundingBox> {
        match bbox {
            None => Ok(self.extent()),
            Some(b) => Ok(b.transform(&self.affine.inverse()?)),
        }
    }

    /// Approximate bytes needed to fetch `bbox` at this scale
    pub fn estimate_nbytes(&self, bbox: Option<&BoundingBox>, item_size: usize) -> VolumeResult<f64> {
        Ok(item_size as f64 * self.voxel_bbox(bbox)?.volume())
    }

    /// Absolute voxel range `[lo, hi)` covered by chunk `grid` along each axis,
    /// clipped to the volume extent
    pub fn chunk_bounds(&self, grid: [i64; 3]) -> ([i64; 3], [i64; 3]) {
        let mut lo = [0i64; 3];
        let mut hi = [0i64; 3];
        for d in 0..3 {
            let chunk = self.chunk_size[d] as i64;
            lo[d] = self.voxel_offset[d] + grid[d] * chunk;
            hi[d] = (lo[d] + chunk).min(self.voxel_offset[d] + self.size[d] as i64);
        }
        (lo, hi)
    }

    /// `{base}/{key}/{x0}-{x1}_{y0}-{y1}_{z0}-{z1}`
    pub fn chunk_url(&self, base_url: &str, grid: [i64; 3]) -> String {
        let (lo, hi) = self.chunk_bounds(grid);
        format!(
            "{}/{}/{}-{}_{}-{}_{}-{}",
            base_url.trim_end_matches('/'),
            self.key,
            lo[0],
            hi[0],
            lo[1],
            hi[1],
            lo[2],
            hi[2]
        )
    }

    fn order(&self, other: &Scale) -> Ordering {
        self.ordering_key()
            .total_cmp(&other.ordering_key())
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Ordered resolution levels of one volume, plus the volume-wide properties
/// read from the same `info` document
#[derive(Debug, Clone)]
pub struct ScaleCatalog {
    scales: Vec<Scale>,
    dtype: DataType,
    num_channels: usize,
    map_type: MapType,
}

impl ScaleCatalog {
    pub fn new(mut scales: Vec<Scale>, dtype: DataType, num_channels: usize, map_type: MapType) -> VolumeResult<Self> {
        if scales.is_empty() {
            return Err(VolumeError::InvalidInfo("no scales defined".to_string()));
        }
        scales.sort_by(|a, b| a.order(b));
        Ok(Self {
            scales,
            dtype,
            num_channels,
            map_type,
        })
    }

    /// Build from a parsed `info` document and the nanometre transform
    pub fn from_info(info: &PrecomputedInfo, transform_nm: &Affine) -> VolumeResult<Self> {
        let scales = info
            .scales
            .iter()
            .map(|s| Scale::from_info(s, transform_nm))
            .collect::<VolumeResult<Vec<_>>>()?;
        Self::new(scales, info.data_type, info.num_channels, info.map_type())
    }

    /// Scales, finest first
    pub fn scales(&self) -> &[Scale] {
        &self.scales
    }

    pub fn get(&self, index: usize) -> Option<&Scale> {
        self.scales.get(index)
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn finest(&self) -> &Scale {
        &self.scales[0]
    }

    pub fn coarsest(&self) -> &Scale {
        &self.scales[self.scales.len() - 1]
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }
}
