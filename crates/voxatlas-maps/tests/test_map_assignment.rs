// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Integration tests for parcellation maps backed by a precomputed segmentation.

The segmentation covers an 8 mm cube at two scales (S0 1 mm, S1 2 mm, 4^3
chunks). Label 1 fills x < 4 mm, label 2 the rest.
*/

use std::sync::Arc;

use voxatlas_maps::{AssignOptions, FetchRequest, IndexSpec, MapError, ParcellationMap};
use voxatlas_structures::{Affine, DataType, Image, MapType, Point, PointSet};
use voxatlas_volumes::codec::encode_raw;
use voxatlas_volumes::{
    InMemoryVolume, MemoryByteSource, PrecomputedInfo, PrecomputedVolume, Scale, ScaleSelector, VolumeProvider,
};

const INFO: &str = r#"{"data_type": "uint32", "num_channels": 1, "type": "segmentation",
    "scales": [
      {"chunk_sizes": [[4, 4, 4]], "encoding": "raw", "key": "S0",
       "resolution": [1000000, 1000000, 1000000], "size": [8, 8, 8]},
      {"chunk_sizes": [[4, 4, 4]], "encoding": "raw", "key": "S1",
       "resolution": [2000000, 2000000, 2000000], "size": [4, 4, 4]}
    ]}"#;

fn segmentation_store(base_url: &str) -> Arc<MemoryByteSource> {
    let source = Arc::new(MemoryByteSource::new());
    source.insert(format!("{base_url}/info"), INFO.as_bytes().to_vec());
    let info = PrecomputedInfo::from_json(INFO.as_bytes()).unwrap();
    for scale_info in &info.scales {
        let scale = Scale::from_info(scale_info, &Affine::identity()).unwrap();
        let half = scale.size[0] as i64 / 2;
        let grid_extent = scale.size[0].div_ceil(scale.chunk_size[0]) as i64;
        for gx in 0..grid_extent {
            for gy in 0..grid_extent {
                for gz in 0..grid_extent {
                    let (lo, hi) = scale.chunk_bounds([gx, gy, gz]);
                    let mut values = Vec::new();
                    for _z in lo[2]..hi[2] {
                        for _y in lo[1]..hi[1] {
                            for x in lo[0]..hi[0] {
                                values.push(if x < half { 1.0 } else { 2.0 });
                            }
                        }
                    }
                    source.insert(
                        scale.chunk_url(base_url, [gx, gy, gz]),
                        encode_raw(&values, DataType::Uint32),
                    );
                }
            }
        }
    }
    source
}

fn segmentation_map() -> ParcellationMap {
    let source = segmentation_store("mem://seg");
    let volume: Arc<dyn VolumeProvider> =
        Arc::new(PrecomputedVolume::new("mem://seg", source, ScaleSelector::new(u64::MAX)));
    ParcellationMap::from_json(
        "halves",
        r#"{"anterior": [{"label": 1}], "posterior": [{"label": 2}]}"#,
        vec![volume],
    )
    .unwrap()
}

#[test]
fn test_maptype_follows_labels() {
    let map = segmentation_map();
    assert_eq!(map.maptype().unwrap(), MapType::Labelled);

    let volume = map.volumes()[0].clone();
    let mixed = ParcellationMap::new(
        "mixed",
        vec![
            ("A".into(), vec![IndexSpec::labelled(0, 1)]),
            ("B".into(), vec![IndexSpec::labelled(0, 2)]),
            ("C".into(), vec![IndexSpec::whole(0)]),
        ],
        vec![volume],
    )
    .unwrap();
    assert!(matches!(mixed.maptype(), Err(MapError::InconsistentLabels)));
    assert!(mixed.assign(&Point::new([1.0, 1.0, 1.0]), AssignOptions::default()).is_err());
}

#[test]
fn test_centroid_points_hit_only_their_region() {
    let map = segmentation_map();
    let centroids = map.compute_centroids(Some(1.0)).unwrap();
    assert_eq!(centroids.len(), 2);
    assert!((centroids["anterior"].coordinate[0] - 1.5).abs() < 1e-9);

    for (region, centroid) in &centroids {
        let result = map.assign(centroid, AssignOptions::default().with_resolution(1.0)).unwrap();
        assert_eq!(result.len(), 1, "{region}");
        assert_eq!(result.rows()[0].region, *region);
        assert!(result.rows()[0].value > 0.0);
    }
}

#[test]
fn test_region_mask_assigns_to_itself() {
    let map = segmentation_map();
    let mask = map
        .fetch(&FetchRequest::region("posterior").with_resolution(1.0))
        .unwrap()
        .unwrap();
    assert_eq!(mask.shape(), [8, 8, 8]);

    let result = map.assign(&mask, AssignOptions::default().with_resolution(1.0)).unwrap();
    assert_eq!(result.len(), 1);
    let row = &result.rows()[0];
    assert_eq!(row.region, "posterior");
    assert_eq!(row.iou, Some(1.0));
    assert_eq!(row.contains, Some(1.0));
    assert_eq!(row.contained, Some(1.0));
}

#[test]
fn test_query_on_finer_grid_is_resampled() {
    let map = segmentation_map();
    // 0.5 mm query covering x in [5, 7) mm
    let mut query = Image::zeros([16, 16, 16], Affine::from_scale_offset([0.5; 3], [0.0; 3]), DataType::Uint8);
    for i in 10..14 {
        for j in 0..16 {
            for k in 0..16 {
                query.data[[i, j, k]] = 1.0;
            }
        }
    }
    // the map at 2 mm is stored in (z, y, x) order; physical x maps to the last array axis
    let result = map.assign(&query, AssignOptions::default().with_resolution(2.0)).unwrap();
    assert_eq!(result.regions_for(1), vec!["posterior"]);
    assert_eq!(result.components().unwrap().shape(), [4, 4, 4]);
}

#[test]
fn test_uncertain_point_between_regions() {
    let map = segmentation_map();
    let points = PointSet::with_sigmas(vec![[1.0, 4.0, 4.0], [4.0, 4.0, 4.0]], vec![0.0, 3.0]).unwrap();
    let result = map.assign(&points, AssignOptions::default().with_resolution(1.0)).unwrap();

    assert_eq!(result.regions_for(0), vec!["anterior"]);
    let mut second = result.regions_for(1);
    second.sort();
    assert_eq!(second, vec!["anterior", "posterior"]);
    assert!(result.columns().contains(&"contained"));
}

/// 48^3 grid tiled by 512 blocks of 6^3 voxels, labelled 1..=512 in raster order
fn tiled_map() -> ParcellationMap {
    let data = ndarray::Array3::from_shape_fn((48, 48, 48), |(i, j, k)| {
        (1 + (i / 6) * 64 + (j / 6) * 8 + k / 6) as f32
    });
    let volume: Arc<dyn VolumeProvider> = Arc::new(InMemoryVolume::new(
        Image::new(data, Affine::identity(), DataType::Uint16),
        MapType::Labelled,
    ));
    let indices = (1..=512)
        .map(|label| (format!("block-{label}"), vec![IndexSpec::labelled(0, label)]))
        .collect();
    ParcellationMap::new("tiles", indices, vec![volume]).unwrap()
}

#[test]
fn test_scattered_query_scores_every_component() {
    let map = tiled_map();
    // an isolated voxel at every even index: 24^3 separate components
    let mut query = Image::zeros([48, 48, 48], Affine::identity(), DataType::Uint8);
    for ((i, j, k), v) in query.data.indexed_iter_mut() {
        if i % 2 == 0 && j % 2 == 0 && k % 2 == 0 {
            *v = 1.0;
        }
    }

    let result = map.assign(&query, AssignOptions::default().with_min_size(1)).unwrap();
    assert_eq!(result.len(), 24 * 24 * 24);
    assert_eq!(result.components().unwrap().count_nonzero(), 24 * 24 * 24);
    assert!(result.iter().all(|r| r.contained == Some(1.0)));
    assert!(result.iter().all(|r| (r.iou.unwrap() - 1.0 / 216.0).abs() < 1e-12));
    // components are numbered in raster order of their voxel
    assert_eq!(result.regions_for(1), vec!["block-1"]);
    assert_eq!(result.regions_for(4), vec!["block-2"]);
    assert_eq!(result.regions_for(24 * 24 * 24), vec!["block-512"]);

    let result = map.assign(&query, AssignOptions::default().with_min_size(2)).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.components().unwrap().count_nonzero(), 0);
}

#[test]
fn test_compress_precomputed_map_is_idempotent() {
    let map = segmentation_map();
    let once = map.compress(Some(2.0)).unwrap();
    let twice = once.compress(None).unwrap();
    assert_eq!(once.len(), 1);
    for region in ["anterior", "posterior"] {
        let a = once.fetch(&FetchRequest::region(region)).unwrap().unwrap();
        let b = twice.fetch(&FetchRequest::region(region)).unwrap().unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.count_nonzero(), 32);
    }
}
