// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Voxel grid bookkeeping across affines, crops and resampling.

use ndarray::Array3;
use voxatlas_structures::{
    resample_to_grid, Affine, BoundingBox, DataType, Image, Interpolation, MapIndex, Point,
};

/// Grid of a chunk stored in `(z, y, x)` order at 2 mm, starting at voxel (4, 0, 2)
fn chunk_affine() -> Affine {
    Affine::from_scale_offset([2.0; 3], [0.0; 3])
        .compose(&Affine::translation([4.0, 0.0, 2.0]))
        .compose(&Affine::axis_reversal())
}

#[test]
fn test_reversed_chunk_index_maps_to_physical_xyz() {
    let affine = chunk_affine();
    // array index (z=1, y=2, x=3) -> voxel (x=3+4, y=2, z=1+2) -> 2 mm steps
    assert_eq!(affine.transform_point([1.0, 2.0, 3.0]), [14.0, 4.0, 6.0]);
    assert_eq!(affine.inverse().unwrap().transform_to_index([14.2, 3.9, 6.1]), [1, 2, 3]);
    assert_eq!(affine.voxel_sizes(), [2.0, 2.0, 2.0]);
}

#[test]
fn test_crop_keeps_physical_positions() {
    let data = Array3::from_shape_fn((4, 4, 4), |(z, y, x)| (z * 16 + y * 4 + x) as f32);
    let image = Image::new(data, chunk_affine(), DataType::Uint16);

    let crop = image
        .crop_voxels(&BoundingBox::new([1.2, 0.0, 2.0], [3.0, 2.0, 10.0], None))
        .unwrap();
    assert_eq!(crop.shape(), [2, 2, 2]);

    let probe = crop.affine.transform_point([0.0, 1.0, 1.0]);
    assert_eq!(image.value_at_physical(probe).unwrap(), crop.value_at([0, 1, 1]));
    assert!(image
        .crop_voxels(&BoundingBox::new([5.0, 5.0, 5.0], [6.0, 6.0, 6.0], None))
        .is_none());
}

#[test]
fn test_labels_survive_upsampling() {
    let mut coarse = Image::zeros([2, 2, 2], Affine::from_scale_offset([2.0; 3], [0.0; 3]), DataType::Uint32);
    coarse.data[[1, 1, 1]] = 7.0;

    let fine_affine = Affine::from_scale_offset([1.0; 3], [0.0; 3]);
    let fine = resample_to_grid(&coarse, &fine_affine, [4, 4, 4], Interpolation::for_image(&coarse)).unwrap();
    assert_eq!(fine.dtype, DataType::Uint32);
    assert!(fine.data.iter().all(|v| *v == 0.0 || *v == 7.0));
    assert_eq!(fine.value_at_physical([2.0, 2.0, 2.0]).unwrap(), Some(7.0));
    assert_eq!(fine.value_at_physical([0.0, 0.0, 0.0]).unwrap(), Some(0.0));
}

#[test]
fn test_bounding_box_of_image_and_intersection() {
    let image = Image::zeros([4, 4, 4], Affine::from_scale_offset([0.5; 3], [-1.0, -1.0, -1.0]), DataType::Uint8);
    let bbox = image.bounding_box();
    assert!(bbox.contains([0.0, 0.0, 0.0]));
    assert!(!bbox.contains([2.0, 0.0, 0.0]));

    let other = BoundingBox::new([0.0, 0.0, 0.0], [5.0, 5.0, 5.0], None);
    let overlap = bbox.intersection(&other).unwrap();
    assert!(overlap.volume() > 0.0);
    assert!(overlap.volume() <= bbox.volume());
}

#[test]
fn test_index_and_point_serialize() {
    let index = MapIndex::labelled(1, 12).with_fragment("left");
    let json = serde_json::to_string(&index).unwrap();
    let back: MapIndex = serde_json::from_str(&json).unwrap();
    assert_eq!(back, index);
    assert_eq!(index.to_string(), "(volume=1, label=12, fragment=left)");

    let point = Point::new([1.0, 2.0, 3.0]).with_sigma(0.5).in_space("mni152");
    let value = serde_json::to_value(&point).unwrap();
    assert_eq!(value["sigma_mm"], 0.5);
}
