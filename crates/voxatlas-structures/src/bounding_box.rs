// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Axis-aligned bounding boxes (volumes of interest)

use serde::{Deserialize, Serialize};

use crate::affine::Affine;

const SNAP_TOLERANCE: f64 = 1e-6;

/// Axis-aligned region `[min, max]` with an optional reference space name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub space: Option<String>,
}

impl BoundingBox {
    /// Create a box from two corner points in any order
    pub fn new(point1: [f64; 3], point2: [f64; 3], space: Option<String>) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for d in 0..3 {
            min[d] = point1[d].min(point2[d]);
            max[d] = point1[d].max(point2[d]);
        }
        Self { min, max, space }
    }

    /// Box covering a voxel grid of the given shape, starting at the origin
    pub fn from_shape(shape: [usize; 3]) -> Self {
        Self::new(
            [0.0, 0.0, 0.0],
            [shape[0] as f64, shape[1] as f64, shape[2] as f64],
            None,
        )
    }

    /// Extent along each axis
    pub fn shape(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Product of the extents
    pub fn volume(&self) -> f64 {
        self.shape().iter().product()
    }

    fn corners(&self) -> [[f64; 3]; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [a[0], a[1], b[2]],
            [a[0], b[1], a[2]],
            [a[0], b[1], b[2]],
            [b[0], a[1], a[2]],
            [b[0], a[1], b[2]],
            [b[0], b[1], a[2]],
            [b[0], b[1], b[2]],
        ]
    }

    /// Transform all eight corners and return their axis-aligned hull.
    ///
    /// The space reference is dropped; the result lives in whatever space
    /// `affine` maps into.
    pub fn transform(&self, affine: &Affine) -> BoundingBox {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for corner in self.corners() {
            let p = affine.transform_point(corner);
            for d in 0..3 {
                min[d] = min[d].min(p[d]);
                max[d] = max[d].max(p[d]);
            }
        }
        BoundingBox { min, max, space: None }
    }

    /// Snap to integer voxel boundaries: floor the minimum, ceil the maximum.
    ///
    /// Coordinates within `SNAP_TOLERANCE` of an integer are treated as that
    /// integer, so round-off from an affine round trip does not add a voxel.
    pub fn snap_outward(&self) -> BoundingBox {
        BoundingBox {
            min: self.min.map(|v| (v + SNAP_TOLERANCE).floor()),
            max: self.max.map(|v| (v - SNAP_TOLERANCE).ceil()),
            space: self.space.clone(),
        }
    }

    /// Enlarge every axis whose extent is below `min_extent` so that it is
    /// exactly `min_extent` wide. Returns the axes that were changed.
    pub fn expand_degenerate(&mut self, min_extent: f64) -> Vec<usize> {
        let mut expanded = Vec::new();
        for d in 0..3 {
            if self.max[d] - self.min[d] < min_extent {
                self.max[d] = self.min[d] + min_extent;
                expanded.push(d);
            }
        }
        expanded
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for d in 0..3 {
            min[d] = self.min[d].max(other.min[d]);
            max[d] = self.max[d].min(other.max[d]);
            if max[d] <= min[d] {
                return None;
            }
        }
        Some(BoundingBox {
            min,
            max,
            space: self.space.clone(),
        })
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|d| p[d] >= self.min[d] && p[d] <= self.max[d])
    }
}
