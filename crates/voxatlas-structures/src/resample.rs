// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Resampling of images onto a target voxel grid

use ndarray::Array3;
use tracing::debug;

use crate::affine::Affine;
use crate::error::StructureResult;
use crate::image::Image;

/// Interpolation used when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Linear,
}

impl Interpolation {
    /// Nearest neighbour for integer (label) data, linear otherwise
    pub fn for_image(image: &Image) -> Self {
        if image.dtype.is_integer() {
            Interpolation::Nearest
        } else {
            Interpolation::Linear
        }
    }
}

/// Resample `source` onto the grid given by `target_affine` / `target_shape`.
///
/// Target voxels that fall outside the source array are zero. The result keeps
/// the source element type.
pub fn resample_to_grid(
    source: &Image,
    target_affine: &Affine,
    target_shape: [usize; 3],
    interpolation: Interpolation,
) -> StructureResult<Image> {
    if source.shape() == target_shape && source.affine.approx_eq(target_affine, 1e-9) {
        return Ok(source.clone());
    }
    debug!(
        "Resampling image of shape {:?} onto grid {:?} ({:?})",
        source.shape(),
        target_shape,
        interpolation
    );

    // target voxel -> physical -> source voxel
    let warp = source.affine.inverse()?.compose(target_affine);
    let data = Array3::from_shape_fn(target_shape, |(i, j, k)| {
        let p = warp.transform_point([i as f64, j as f64, k as f64]);
        match interpolation {
            Interpolation::Nearest => sample_nearest(&source.data, p),
            Interpolation::Linear => sample_linear(&source.data, p),
        }
    });
    Ok(Image::new(data, *target_affine, source.dtype))
}

fn in_bounds(data: &Array3<f32>, idx: [i64; 3]) -> bool {
    let shape = data.shape();
    (0..3).all(|d| idx[d] >= 0 && (idx[d] as usize) < shape[d])
}

fn sample_nearest(data: &Array3<f32>, p: [f64; 3]) -> f32 {
    let idx = [
        (p[0] + 0.5).floor() as i64,
        (p[1] + 0.5).floor() as i64,
        (p[2] + 0.5).floor() as i64,
    ];
    if in_bounds(data, idx) {
        data[[idx[0] as usize, idx[1] as usize, idx[2] as usize]]
    } else {
        0.0
    }
}

fn sample_linear(data: &Array3<f32>, p: [f64; 3]) -> f32 {
    let base = [p[0].floor(), p[1].floor(), p[2].floor()];
    let frac = [p[0] - base[0], p[1] - base[1], p[2] - base[2]];
    let mut acc = 0.0f64;
    for corner in 0..8usize {
        let offs = [(corner >> 2) & 1, (corner >> 1) & 1, corner & 1];
        let mut weight = 1.0;
        let mut idx = [0i64; 3];
        for d in 0..3 {
            weight *= if offs[d] == 1 { frac[d] } else { 1.0 - frac[d] };
            idx[d] = base[d] as i64 + offs[d] as i64;
        }
        if weight == 0.0 || !in_bounds(data, idx) {
            continue;
        }
        acc += weight * data[[idx[0] as usize, idx[1] as usize, idx[2] as usize]] as f64;
    }
    acc as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DataType;

    fn ramp() -> Image {
        let data = Array3::from_shape_fn((4, 4, 4), |(i, _, _)| i as f32);
        Image::new(data, Affine::identity(), DataType::Float32)
    }

    #[test]
    fn test_identical_grid_is_a_copy() {
        let img = ramp();
        let out = resample_to_grid(&img, &img.affine, img.shape(), Interpolation::Linear).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_linear_halfway_between_voxels() {
        let img = ramp();
        // target voxel i sits at physical x = i + 0.5
        let target = Affine::translation([0.5, 0.0, 0.0]);
        let out = resample_to_grid(&img, &target, [3, 4, 4], Interpolation::Linear).unwrap();
        assert!((out.data[[0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((out.data[[2, 1, 3]] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_on_coarser_grid_and_outside_is_zero() {
        let mut data = Array3::<f32>::zeros((4, 4, 4));
        data[[2, 2, 2]] = 7.0;
        let img = Image::new(data, Affine::identity(), DataType::Uint8);
        let coarse = Affine::from_scale_offset([2.0, 2.0, 2.0], [0.0, 0.0, 0.0]);
        let out = resample_to_grid(&img, &coarse, [3, 3, 3], Interpolation::for_image(&img)).unwrap();
        assert_eq!(out.data[[1, 1, 1]], 7.0);
        assert_eq!(out.data[[2, 2, 2]], 0.0);
        assert_eq!(out.dtype, DataType::Uint8);
    }
}
