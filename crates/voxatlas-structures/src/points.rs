// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Physical coordinates with positional uncertainty

use serde::{Deserialize, Serialize};

use crate::error::{StructureError, StructureResult};

/// A single physical coordinate (mm) with an isotropic uncertainty `sigma_mm`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub coordinate: [f64; 3],
    pub sigma_mm: f64,
    pub space: Option<String>,
}

impl Point {
    pub fn new(coordinate: [f64; 3]) -> Self {
        Self {
            coordinate,
            sigma_mm: 0.0,
            space: None,
        }
    }

    pub fn with_sigma(mut self, sigma_mm: f64) -> Self {
        self.sigma_mm = sigma_mm;
        self
    }

    pub fn in_space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }
}

/// An ordered set of coordinates, each with its own uncertainty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    coordinates: Vec<[f64; 3]>,
    sigma_mm: Vec<f64>,
    pub space: Option<String>,
}

impl PointSet {
    /// All points share the same uncertainty
    pub fn new(coordinates: Vec<[f64; 3]>, sigma_mm: f64) -> Self {
        let sigma_mm = vec![sigma_mm; coordinates.len()];
        Self {
            coordinates,
            sigma_mm,
            space: None,
        }
    }

    pub fn with_sigmas(coordinates: Vec<[f64; 3]>, sigma_mm: Vec<f64>) -> StructureResult<Self> {
        if coordinates.len() != sigma_mm.len() {
            return Err(StructureError::ShapeMismatch {
                expected: vec![coordinates.len()],
                actual: vec![sigma_mm.len()],
            });
        }
        Ok(Self {
            coordinates,
            sigma_mm,
            space: None,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[[f64; 3]] {
        &self.coordinates
    }

    pub fn sigmas(&self) -> &[f64] {
        &self.sigma_mm
    }

    pub fn has_constant_sigma(&self) -> bool {
        match self.sigma_mm.first() {
            Some(first) => self.sigma_mm.iter().all(|s| s == first),
            None => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.coordinates
            .iter()
            .zip(self.sigma_mm.iter())
            .map(move |(c, s)| Point {
                coordinate: *c,
                sigma_mm: *s,
                space: self.space.clone(),
            })
    }
}

impl From<Point> for PointSet {
    fn from(point: Point) -> Self {
        Self {
            coordinates: vec![point.coordinate],
            sigma_mm: vec![point.sigma_mm],
            space: point.space,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_sigma_detection() {
        let uniform = PointSet::new(vec![[0.0; 3], [1.0; 3]], 0.5);
        assert!(uniform.has_constant_sigma());

        let mixed = PointSet::with_sigmas(vec![[0.0; 3], [1.0; 3]], vec![0.5, 2.0]).unwrap();
        assert!(!mixed.has_constant_sigma());
        assert_eq!(mixed.iter().nth(1).unwrap().sigma_mm, 2.0);
    }

    #[test]
    fn test_mismatched_sigmas_rejected() {
        assert!(PointSet::with_sigmas(vec![[0.0; 3]], vec![]).is_err());
    }

    #[test]
    fn test_point_converts_to_singleton_set() {
        let set: PointSet = Point::new([1.0, 2.0, 3.0]).with_sigma(4.0).in_space("mni152").into();
        assert_eq!(set.len(), 1);
        assert_eq!(set.sigmas(), &[4.0]);
        assert_eq!(set.space.as_deref(), Some("mni152"));
    }
}
