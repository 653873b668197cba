// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Voxel images: a 3D array together with its voxel-to-physical affine

use ndarray::{s, Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::affine::Affine;
use crate::bounding_box::BoundingBox;
use crate::error::{StructureError, StructureResult};

/// Element type of the stored voxel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    /// Bytes per element
    pub fn item_size(&self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Uint64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

/// A 3D voxel array with its affine.
///
/// Values are held as `f32` regardless of the source element type; `dtype`
/// records the original type so that integer label images keep
/// nearest-neighbour semantics when resampled.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub data: Array3<f32>,
    pub affine: Affine,
    pub dtype: DataType,
}

impl Image {
    pub fn new(data: Array3<f32>, affine: Affine, dtype: DataType) -> Self {
        Self { data, affine, dtype }
    }

    /// All-zero image on the given grid
    pub fn zeros(shape: [usize; 3], affine: Affine, dtype: DataType) -> Self {
        Self::new(Array3::zeros(shape), affine, dtype)
    }

    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    /// True if both images share voxel grid (shape and affine)
    pub fn same_grid(&self, other: &Image) -> bool {
        self.shape() == other.shape() && self.affine.approx_eq(&other.affine, 1e-9)
    }

    /// Value at an integer voxel index, `None` if outside the array
    pub fn value_at(&self, index: [i64; 3]) -> Option<f32> {
        let shape = self.shape();
        if (0..3).any(|d| index[d] < 0 || index[d] as usize >= shape[d]) {
            return None;
        }
        Some(self.data[[index[0] as usize, index[1] as usize, index[2] as usize]])
    }

    /// Value at the voxel nearest to a physical coordinate
    pub fn value_at_physical(&self, point: [f64; 3]) -> StructureResult<Option<f32>> {
        let index = self.affine.inverse()?.transform_to_index(point);
        Ok(self.value_at(index))
    }

    /// Physical bounding box of the voxel grid
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_shape(self.shape()).transform(&self.affine)
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| **v != 0.0).count()
    }

    /// Binary (0/1) image of voxels equal to `label`
    pub fn label_mask(&self, label: u32) -> Image {
        let target = label as f32;
        Image::new(
            self.data.mapv(|v| if v == target { 1.0 } else { 0.0 }),
            self.affine,
            DataType::Uint8,
        )
    }

    /// Binary (0/1) image of voxels strictly above `threshold`
    pub fn threshold_mask(&self, threshold: f32) -> Image {
        Image::new(
            self.data.mapv(|v| if v > threshold { 1.0 } else { 0.0 }),
            self.affine,
            DataType::Uint8,
        )
    }

    /// Voxelwise combination of two images on the same grid
    pub fn zip_with<F>(&self, other: &Image, f: F) -> StructureResult<Array3<f32>>
    where
        F: Fn(f32, f32) -> f32,
    {
        if self.shape() != other.shape() {
            return Err(StructureError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: other.shape().to_vec(),
            });
        }
        let mut out = Array3::zeros(self.data.raw_dim());
        Zip::from(&mut out)
            .and(&self.data)
            .and(&other.data)
            .for_each(|o, &a, &b| *o = f(a, b));
        Ok(out)
    }

    /// Sub-image covering a voxel-space box, clamped to the array.
    ///
    /// The box is snapped outward to whole voxels; the affine of the result is
    /// shifted to the new origin. Returns `None` if the box misses the array.
    pub fn crop_voxels(&self, voxel_box: &BoundingBox) -> Option<Image> {
        let snapped = voxel_box.snap_outward();
        let shape = self.shape();
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for d in 0..3 {
            let a = snapped.min[d].max(0.0) as usize;
            let b = snapped.max[d].min(shape[d] as f64).max(0.0) as usize;
            if b <= a {
                return None;
            }
            lo[d] = a;
            hi[d] = b;
        }
        let data = self
            .data
            .slice(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]])
            .to_owned();
        let shift = Affine::translation([lo[0] as f64, lo[1] as f64, lo[2] as f64]);
        Some(Image::new(data, self.affine.compose(&shift), self.dtype))
    }
}
