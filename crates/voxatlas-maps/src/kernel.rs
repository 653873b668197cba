// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gaussian probability kernels for uncertain point locations.

use ndarray::Array3;

/// Normalised isotropic 3D Gaussian.
///
/// The kernel spans `sigma_points` standard deviations to each side of the
/// centre voxel, i.e. `2 * r + 1` voxels per axis with `r = floor(sigma_points * sigma_vox)`.
pub fn gaussian_kernel(sigma_vox: f64, sigma_points: f64) -> Array3<f32> {
    let r = (sigma_points * sigma_vox).floor().max(0.0) as usize;
    let size = 2 * r + 1;
    let two_sigma_sq = 2.0 * sigma_vox * sigma_vox;
    let centre = r as f64;

    let mut kernel = Array3::from_shape_fn((size, size, size), |(i, j, k)| {
        if two_sigma_sq <= 0.0 {
            return if i == r && j == r && k == r { 1.0 } else { 0.0 };
        }
        let d2 = (i as f64 - centre).powi(2) + (j as f64 - centre).powi(2) + (k as f64 - centre).powi(2);
        (-d2 / two_sigma_sq).exp()
    });
    let total = kernel.sum();
    if total > 0.0 {
        kernel.mapv_inplace(|v| v / total);
    }
    kernel.mapv(|v| v as f32)
}

/// Half-extent in voxels of a kernel returned by [`gaussian_kernel`]
pub fn kernel_radius(kernel: &Array3<f32>) -> usize {
    kernel.dim().0 / 2
}
