// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connected components of a thresholded volume (26-connectivity).

use std::collections::VecDeque;

use ndarray::Array3;

/// One labelled component
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Label in the component image, starting at 1
    pub label: u32,
    pub size: usize,
    /// Inclusive lower / exclusive upper voxel bounds
    pub lower: [usize; 3],
    pub upper: [usize; 3],
}

/// Label the voxels above zero.
///
/// Components are numbered in raster order of their first voxel. Returns the
/// label image (0 = background) and the component list.
pub fn label_components(data: &Array3<f32>) -> (Array3<u32>, Vec<Component>) {
    let (nx, ny, nz) = data.dim();
    let mut labels = Array3::<u32>::zeros((nx, ny, nz));
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for ((i, j, k), value) in data.indexed_iter() {
        if *value <= 0.0 || labels[[i, j, k]] != 0 {
            continue;
        }
        let label = components.len() as u32 + 1;
        let mut component = Component {
            label,
            size: 0,
            lower: [i, j, k],
            upper: [i + 1, j + 1, k + 1],
        };
        labels[[i, j, k]] = label;
        queue.push_back([i, j, k]);

        while let Some(voxel) = queue.pop_front() {
            component.size += 1;
            for d in 0..3 {
                component.lower[d] = component.lower[d].min(voxel[d]);
                component.upper[d] = component.upper[d].max(voxel[d] + 1);
            }
            for di in -1i64..=1 {
                for dj in -1i64..=1 {
                    for dk in -1i64..=1 {
                        let n = [voxel[0] as i64 + di, voxel[1] as i64 + dj, voxel[2] as i64 + dk];
                        if n[0] < 0 || n[1] < 0 || n[2] < 0 {
                            continue;
                        }
                        let n = [n[0] as usize, n[1] as usize, n[2] as usize];
                        if n[0] >= nx || n[1] >= ny || n[2] >= nz {
                            continue;
                        }
                        if data[n] > 0.0 && labels[n] == 0 {
                            labels[n] = label;
                            queue.push_back(n);
                        }
                    }
                }
            }
        }
        components.push(component);
    }
    (labels, components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonal_neighbours_connect() {
        let mut data = Array3::zeros((4, 4, 4));
        data[[0, 0, 0]] = 1.0;
        data[[1, 1, 1]] = 0.5;
        data[[3, 3, 3]] = 2.0;
        let (labels, components) = label_components(&data);

        assert_eq!(components.len(), 2);
        assert_eq!(components[0].size, 2);
        assert_eq!(components[0].lower, [0, 0, 0]);
        assert_eq!(components[0].upper, [2, 2, 2]);
        assert_eq!(labels[[1, 1, 1]], 1);
        assert_eq!(labels[[3, 3, 3]], 2);
        assert_eq!(labels[[2, 2, 2]], 0);
    }

    #[test]
    fn test_empty_volume_has_no_components() {
        let data = Array3::from_elem((3, 3, 3), -1.0);
        let (labels, components) = label_components(&data);
        assert!(components.is_empty());
        assert!(labels.iter().all(|l| *l == 0));
    }
}
