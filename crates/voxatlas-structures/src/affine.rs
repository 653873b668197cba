// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Affine-matrix utilities for voxel <-> physical coordinate transforms.
//!
//! An [`Affine`] maps homogeneous voxel indices `(i, j, k, 1)` of an array to
//! physical coordinates (millimetres). Composition follows matrix
//! multiplication order: `a.compose(&b)` applies `b` first, then `a`.

use std::fmt;
use std::ops::Mul;

use cgmath::{Matrix4, SquareMatrix, Vector4};

use crate::error::{StructureError, StructureResult};

/// 4x4 homogeneous coordinate transform
#[derive(Clone, Copy, PartialEq)]
pub struct Affine {
    matrix: Matrix4<f64>,
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build from row-major values (the layout used by NIfTI and `transform.json`)
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        // cgmath stores columns
        let matrix = Matrix4::new(
            rows[0][0], rows[1][0], rows[2][0], rows[3][0],
            rows[0][1], rows[1][1], rows[2][1], rows[3][1],
            rows[0][2], rows[1][2], rows[2][2], rows[3][2],
            rows[0][3], rows[1][3], rows[2][3], rows[3][3],
        );
        Self { matrix }
    }

    /// Build from a possibly partial row list, as found in `transform.json`
    /// files which sometimes omit the homogeneous row.
    pub fn from_row_vecs(rows: &[Vec<f64>]) -> StructureResult<Self> {
        if rows.len() < 3 || rows.len() > 4 || rows.iter().any(|r| r.len() != 4) {
            return Err(StructureError::BadParameters(format!(
                "expected 3 or 4 rows of 4 values, got {:?}",
                rows.iter().map(Vec::len).collect::<Vec<_>>()
            )));
        }
        let mut out = [[0.0, 0.0, 0.0, 0.0], [0.0; 4], [0.0; 4], [0.0, 0.0, 0.0, 1.0]];
        for (r, row) in rows.iter().enumerate() {
            out[r].copy_from_slice(row);
        }
        Ok(Self::from_rows(out))
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.matrix[c][r];
            }
        }
        rows
    }

    /// Value at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[col][row]
    }

    /// Diagonal scaling followed by a translation
    pub fn from_scale_offset(scale: [f64; 3], offset: [f64; 3]) -> Self {
        Self::from_rows([
            [scale[0], 0.0, 0.0, offset[0]],
            [0.0, scale[1], 0.0, offset[1]],
            [0.0, 0.0, scale[2], offset[2]],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn translation(offset: [f64; 3]) -> Self {
        Self::from_scale_offset([1.0, 1.0, 1.0], offset)
    }

    /// Permutation mapping array index order `(z, y, x)` to `(x, y, z)`.
    ///
    /// Chunked stores serve arrays in reversed axis order relative to the
    /// physical axes; this matrix is its own inverse.
    pub fn axis_reversal() -> Self {
        Self::from_rows([
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine {
            matrix: self.matrix * other.matrix,
        }
    }

    pub fn inverse(&self) -> StructureResult<Affine> {
        self.matrix
            .invert()
            .map(|matrix| Affine { matrix })
            .ok_or_else(|| StructureError::SingularTransform(format!("{:?}", self)))
    }

    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let v = self.matrix * Vector4::new(p[0], p[1], p[2], 1.0);
        [v.x, v.y, v.z]
    }

    /// Transform a point and round each coordinate to the nearest integer index
    pub fn transform_to_index(&self, p: [f64; 3]) -> [i64; 3] {
        let v = self.transform_point(p);
        [
            (v[0] + 0.5).floor() as i64,
            (v[1] + 0.5).floor() as i64,
            (v[2] + 0.5).floor() as i64,
        ]
    }

    /// Divide the three spatial rows by `divisor` (e.g. nanometre -> millimetre)
    pub fn scale_spatial_rows(&self, divisor: f64) -> Affine {
        let mut rows = self.to_rows();
        for row in rows.iter_mut().take(3) {
            for value in row.iter_mut() {
                *value /= divisor;
            }
        }
        Affine::from_rows(rows)
    }

    /// Physical length of one voxel step along each array axis
    pub fn voxel_sizes(&self) -> [f64; 3] {
        let mut sizes = [0.0; 3];
        for (c, size) in sizes.iter_mut().enumerate() {
            let col = self.matrix[c];
            *size = (col.x * col.x + col.y * col.y + col.z * col.z).sqrt();
        }
        sizes
    }

    /// Mean voxel edge length, used to convert physical uncertainties to voxels
    pub fn mean_voxel_size(&self) -> f64 {
        let sizes = self.voxel_sizes();
        (sizes[0] + sizes[1] + sizes[2]) / 3.0
    }

    pub fn approx_eq(&self, other: &Affine, tolerance: f64) -> bool {
        let a = self.to_rows();
        let b = other.to_rows();
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(x, y)| (x - y).abs() <= tolerance)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        self.compose(&rhs)
    }
}

impl fmt::Debug for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Affine").field(&self.to_rows()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_roundtrip_through_column_storage() {
        let rows = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let affine = Affine::from_rows(rows);
        assert_eq!(affine.to_rows(), rows);
        assert_eq!(affine.get(0, 3), 4.0);
        assert_eq!(affine.get(2, 0), 9.0);
    }

    #[test]
    fn test_scale_offset_and_inverse() {
        let affine = Affine::from_scale_offset([2.0, 2.0, 0.5], [10.0, -4.0, 1.0]);
        assert_eq!(affine.transform_point([1.0, 1.0, 2.0]), [12.0, -2.0, 2.0]);

        let inverse = affine.inverse().unwrap();
        let p = inverse.transform_point([12.0, -2.0, 2.0]);
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!((p[1] - 1.0).abs() < 1e-12);
        assert!((p[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_transform_is_reported() {
        let flat = Affine::from_scale_offset([1.0, 0.0, 1.0], [0.0, 0.0, 0.0]);
        assert!(matches!(
            flat.inverse(),
            Err(StructureError::SingularTransform(_))
        ));
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let scale = Affine::from_scale_offset([2.0, 2.0, 2.0], [0.0, 0.0, 0.0]);
        let shift = Affine::translation([1.0, 0.0, 0.0]);
        // scale(shift(p))
        assert_eq!(scale.compose(&shift).transform_point([0.0, 0.0, 0.0]), [2.0, 0.0, 0.0]);
        // shift(scale(p))
        assert_eq!((shift * scale).transform_point([0.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_axis_reversal_is_involution() {
        let rev = Affine::axis_reversal();
        assert_eq!(rev.transform_point([1.0, 2.0, 3.0]), [3.0, 2.0, 1.0]);
        assert!(rev.compose(&rev).approx_eq(&Affine::identity(), 0.0));
    }

    #[test]
    fn test_voxel_sizes_and_rounding() {
        let affine = Affine::from_scale_offset([0.5, 1.0, 1.5], [0.0, 0.0, 0.0]);
        assert_eq!(affine.voxel_sizes(), [0.5, 1.0, 1.5]);
        assert!((affine.mean_voxel_size() - 1.0).abs() < 1e-12);
        assert_eq!(Affine::identity().transform_to_index([1.49, 1.5, -0.4]), [1, 2, 0]);
    }

    #[test]
    fn test_partial_rows_get_homogeneous_row() {
        let rows = vec![
            vec![1.0, 0.0, 0.0, 5.0],
            vec![0.0, 1.0, 0.0, 6.0],
            vec![0.0, 0.0, 1.0, 7.0],
        ];
        let affine = Affine::from_row_vecs(&rows).unwrap();
        assert_eq!(affine.to_rows()[3], [0.0, 0.0, 0.0, 1.0]);
        assert!(Affine::from_row_vecs(&rows[..2]).is_err());
    }
}
