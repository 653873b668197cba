// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sampling of voxel locations from weight volumes.

use ndarray::{Array3, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{MapError, MapResult};

// Stand-in for infinity that keeps the parabola intersections finite
const FAR: f64 = 1e20;

/// Squared distance transform of a 1D sampled function (Felzenszwalb and Huttenlocher)
fn squared_edt_1d(f: &[f64], out: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, o) in out.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let d = q as f64 - v[k] as f64;
        *o = d * d + f[v[k]];
    }
}

/// Squared Euclidean distance (in voxels) from every foreground voxel to the
/// nearest background voxel; background voxels are zero.
///
/// A mask without background yields `None`.
pub fn squared_distance_transform(mask: &Array3<bool>) -> Option<Array3<f64>> {
    if mask.iter().all(|m| *m) {
        return None;
    }
    let mut dist = mask.mapv(|m| if m { FAR } else { 0.0 });
    for axis in 0..3 {
        let mut buffer = Vec::new();
        let mut out = Vec::new();
        for mut lane in dist.lanes_mut(Axis(axis)) {
            buffer.clear();
            buffer.extend(lane.iter().copied());
            out.resize(buffer.len(), 0.0);
            squared_edt_1d(&buffer, &mut out);
            for (target, value) in lane.iter_mut().zip(out.iter()) {
                *target = *value;
            }
        }
    }
    Some(dist)
}

/// Draw `n` voxel indices with probability proportional to `weights`
pub fn sample_voxels<R: Rng + ?Sized>(weights: &Array3<f64>, n: usize, rng: &mut R) -> MapResult<Vec<[usize; 3]>> {
    let candidates: Vec<([usize; 3], f64)> = weights
        .indexed_iter()
        .filter(|(_, w)| **w > 0.0 && w.is_finite())
        .map(|((i, j, k), w)| ([i, j, k], *w))
        .collect();
    let distribution = WeightedIndex::new(candidates.iter().map(|(_, w)| *w))
        .map_err(|e| MapError::InvalidRequest(format!("cannot sample from weights: {}", e)))?;
    Ok((0..n).map(|_| candidates[distribution.sample(rng)].0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_distance_transform_of_line() {
        let mut mask = Array3::from_elem((1, 1, 7), true);
        mask[[0, 0, 0]] = false;
        let dist = squared_distance_transform(&mask).unwrap();
        let row: Vec<f64> = dist.iter().copied().collect();
        assert_eq!(row, vec![0.0, 1.0, 4.0, 9.0, 16.0, 25.0, 36.0]);
    }

    #[test]
    fn test_distance_transform_of_cube() {
        let mut mask = Array3::from_elem((5, 5, 5), false);
        for i in 1..4 {
            for j in 1..4 {
                for k in 1..4 {
                    mask[[i, j, k]] = true;
                }
            }
        }
        let dist = squared_distance_transform(&mask).unwrap();
        assert_eq!(dist[[2, 2, 2]], 4.0);
        assert_eq!(dist[[1, 1, 1]], 1.0);
        assert_eq!(dist[[0, 0, 0]], 0.0);
        assert!(squared_distance_transform(&Array3::from_elem((2, 2, 2), true)).is_none());
    }

    #[test]
    fn test_samples_stay_on_positive_weights() {
        let mut weights = Array3::zeros((4, 4, 4));
        weights[[1, 2, 3]] = 1.0;
        weights[[3, 0, 0]] = 3.0;
        let mut rng = StdRng::seed_from_u64(7);
        let samples = sample_voxels(&weights, 200, &mut rng).unwrap();
        assert_eq!(samples.len(), 200);
        assert!(samples.iter().all(|s| *s == [1, 2, 3] || *s == [3, 0, 0]));
        let heavy = samples.iter().filter(|s| **s == [3, 0, 0]).count();
        assert!(heavy > 100);

        assert!(sample_voxels(&Array3::zeros((2, 2, 2)), 1, &mut rng).is_err());
    }
}
