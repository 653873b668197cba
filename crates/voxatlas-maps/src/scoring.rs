// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Overlap scores between a query mask and a region mask on the same grid.
//!
//! A mask is read through a voxel accessor whose support is the set of voxels
//! above zero. Support sizes and bounds are summarised once per mask, so a
//! comparison only visits the shared and union bounding boxes and never
//! materialises either mask.

use ndarray::{Array3, ArrayView3};

/// Support size and voxel bounds of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSummary {
    pub count: usize,
    pub lower: [usize; 3],
    pub upper: [usize; 3],
}

impl MaskSummary {
    /// Summary of a single voxel
    pub fn voxel(index: [usize; 3]) -> Self {
        Self {
            count: 1,
            lower: index,
            upper: [index[0] + 1, index[1] + 1, index[2] + 1],
        }
    }

    /// Add one support voxel
    pub fn include(&mut self, index: [usize; 3]) {
        self.count += 1;
        for d in 0..3 {
            self.lower[d] = self.lower[d].min(index[d]);
            self.upper[d] = self.upper[d].max(index[d] + 1);
        }
    }

    /// `None` if no voxel is above zero
    pub fn of(data: &Array3<f32>) -> Option<Self> {
        let mut summary: Option<MaskSummary> = None;
        for ((i, j, k), v) in data.indexed_iter() {
            if *v <= 0.0 {
                continue;
            }
            match summary.as_mut() {
                Some(s) => s.include([i, j, k]),
                None => summary = Some(MaskSummary::voxel([i, j, k])),
            }
        }
        summary
    }

    /// Shared bounds, `None` if the boxes are disjoint
    pub fn intersect(&self, other: &MaskSummary) -> Option<([usize; 3], [usize; 3])> {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        for d in 0..3 {
            lo[d] = self.lower[d].max(other.lower[d]);
            hi[d] = self.upper[d].min(other.upper[d]);
            if hi[d] <= lo[d] {
                return None;
            }
        }
        Some((lo, hi))
    }

    fn union(&self, other: &MaskSummary) -> ([usize; 3], [usize; 3]) {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        for d in 0..3 {
            lo[d] = self.lower[d].min(other.lower[d]);
            hi[d] = self.upper[d].max(other.upper[d]);
        }
        (lo, hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapScores {
    /// Number of voxels in both supports
    pub overlap: usize,
    pub iou: f64,
    /// Share of the region covered by the query
    pub contains: f64,
    /// Share of the query covered by the region
    pub contained: f64,
    /// Pearson correlation over the union bounding box; `None` if either side is constant there
    pub correlation: Option<f64>,
    /// Maximum region value inside the intersection
    pub value: f64,
}

/// Visit every voxel index of `lo..hi` in raster order
pub fn for_each_voxel(lo: [usize; 3], hi: [usize; 3], mut visit: impl FnMut([usize; 3])) {
    for i in lo[0]..hi[0] {
        for j in lo[1]..hi[1] {
            for k in lo[2]..hi[2] {
                visit([i, j, k]);
            }
        }
    }
}

/// Score a query against a region, both given as voxel accessors.
///
/// `None` if the supports do not overlap.
pub fn compare_supports<Q, R>(
    query: Q,
    query_summary: &MaskSummary,
    region: R,
    region_summary: &MaskSummary,
) -> Option<OverlapScores>
where
    Q: Fn([usize; 3]) -> f32,
    R: Fn([usize; 3]) -> f32,
{
    let (lo, hi) = query_summary.intersect(region_summary)?;

    let mut overlap = 0usize;
    let mut value = f64::NEG_INFINITY;
    for_each_voxel(lo, hi, |p| {
        if query(p) > 0.0 {
            let r = region(p);
            if r > 0.0 {
                overlap += 1;
                value = value.max(r as f64);
            }
        }
    });
    if overlap == 0 {
        return None;
    }

    let intersection = overlap as f64;
    let union = (query_summary.count + region_summary.count - overlap) as f64;
    let (ulo, uhi) = query_summary.union(region_summary);
    Some(OverlapScores {
        overlap,
        iou: intersection / union,
        contains: intersection / region_summary.count as f64,
        contained: intersection / query_summary.count as f64,
        correlation: pearson_within(ulo, uhi, &query, &region),
        value,
    })
}

/// [`compare_supports`] for two arrays on the same grid
pub fn compare_masks(
    query: &Array3<f32>,
    query_summary: &MaskSummary,
    region: &Array3<f32>,
    region_summary: &MaskSummary,
) -> Option<OverlapScores> {
    compare_supports(|p| query[p], query_summary, |p| region[p], region_summary)
}

/// Pearson correlation of two accessors over the window `lo..hi`
pub fn pearson_within<A, B>(lo: [usize; 3], hi: [usize; 3], a: A, b: B) -> Option<f64>
where
    A: Fn([usize; 3]) -> f32,
    B: Fn([usize; 3]) -> f32,
{
    let n = (0..3).map(|d| hi[d].saturating_sub(lo[d])).product::<usize>() as f64;
    if n == 0.0 {
        return None;
    }
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for_each_voxel(lo, hi, |p| {
        sum_a += a(p) as f64;
        sum_b += b(p) as f64;
    });
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for_each_voxel(lo, hi, |p| {
        let dx = a(p) as f64 - mean_a;
        let dy = b(p) as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    });
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

/// Pearson correlation coefficient of two equally shaped arrays
pub fn pearson(a: ArrayView3<f32>, b: ArrayView3<f32>) -> Option<f64> {
    let (x, y, z) = a.dim();
    pearson_within([0; 3], [x, y, z], |p| a[p], |p| b[p])
}
