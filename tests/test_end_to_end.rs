// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
End-to-end tests: a precomputed segmentation on disk, loaded through the TOML
configuration, wrapped in a parcellation map and queried.

The dataset is an 8 mm cube at 1 mm (S0) and 2 mm (S1) with 4^3 chunks.
Label 1 ("inferior") fills physical z < 4 mm, label 2 ("superior") the rest.
*/

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use voxatlas::config::{load_config, VoxatlasConfig};
use voxatlas::prelude::*;
use voxatlas::volumes::codec::encode_raw;
use voxatlas::volumes::{PrecomputedInfo, Scale};

const INFO: &str = r#"{"data_type": "uint16", "num_channels": 1, "type": "segmentation",
    "scales": [
      {"chunk_sizes": [[4, 4, 4]], "encoding": "raw", "key": "S0",
       "resolution": [1000000, 1000000, 1000000], "size": [8, 8, 8]},
      {"chunk_sizes": [[4, 4, 4]], "encoding": "raw", "key": "S1",
       "resolution": [2000000, 2000000, 2000000], "size": [4, 4, 4]}
    ]}"#;

struct Fixture {
    _dir: TempDir,
    dataset: PathBuf,
    config: VoxatlasConfig,
}

impl Fixture {
    fn url(&self) -> String {
        format!("file://{}", self.dataset.display())
    }

    fn volume(&self) -> Arc<dyn VolumeProvider> {
        Arc::new(PrecomputedVolume::from_config(self.url(), &self.config.fetch).unwrap())
    }

    fn map(&self) -> ParcellationMap {
        ParcellationMap::from_json(
            "vertical halves",
            r#"{"inferior": [{"label": 1}], "superior": [{"label": 2}]}"#,
            vec![self.volume()],
        )
        .unwrap()
    }
}

fn write_dataset(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("info"), INFO).unwrap();

    let info = PrecomputedInfo::from_json(INFO.as_bytes()).unwrap();
    let base_url = format!("file://{}", root.display());
    for scale_info in &info.scales {
        let scale = Scale::from_info(scale_info, &Affine::identity()).unwrap();
        let half = scale.size[2] as i64 / 2;
        let grid_extent = scale.size[0].div_ceil(scale.chunk_size[0]) as i64;
        for gx in 0..grid_extent {
            for gy in 0..grid_extent {
                for gz in 0..grid_extent {
                    let (lo, hi) = scale.chunk_bounds([gx, gy, gz]);
                    let mut values = Vec::new();
                    for z in lo[2]..hi[2] {
                        for _y in lo[1]..hi[1] {
                            for _x in lo[0]..hi[0] {
                                values.push(if z < half { 1.0 } else { 2.0 });
                            }
                        }
                    }
                    let url = scale.chunk_url(&base_url, [gx, gy, gz]);
                    let path = PathBuf::from(url.trim_start_matches("file://"));
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(path, encode_raw(&values, DataType::Uint16)).unwrap();
                }
            }
        }
    }
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let dataset = dir.path().join("segmentation");
    write_dataset(&dataset);

    let config_path = dir.path().join("voxatlas_configuration.toml");
    fs::write(
        &config_path,
        format!(
            "[fetch]\nmax_gib = 0.5\nuse_cache = true\ncache_dir = {:?}\n\n[assignment]\nmin_size_voxel = 2\n",
            dir.path().join("cache").display().to_string()
        ),
    )
    .unwrap();
    let config = load_config(Some(config_path.as_path()), None).unwrap();

    Fixture {
        _dir: dir,
        dataset,
        config,
    }
}

fn cached_chunks(config: &VoxatlasConfig) -> usize {
    fs::read_dir(&config.fetch.cache_dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

#[test]
fn test_configuration_drives_volume_access() {
    let fx = fixture();
    assert_eq!(fx.config.assignment.min_size_voxel, 2);

    let volume = fx.volume();
    assert_eq!(volume.map_type().unwrap(), MapType::Labelled);
    assert_eq!(volume.scales().unwrap().len(), 2);

    let coarse = volume.fetch(None, None).unwrap();
    assert_eq!(coarse.shape(), [4, 4, 4]);
    assert_eq!(coarse.dtype, DataType::Uint16);
    // (z, y, x) order: lower physical z is the first array axis
    assert_eq!(coarse.data[[0, 3, 3]], 1.0);
    assert_eq!(coarse.data[[3, 0, 0]], 2.0);
    assert_eq!(cached_chunks(&fx.config), 1);
}

#[test]
fn test_cached_chunks_outlive_the_dataset() {
    let fx = fixture();
    let bbox = BoundingBox::new([0.0, 0.0, 0.0], [7.0, 7.0, 7.0], None);
    let first = fx.volume().fetch(Some(1.0), Some(&bbox)).unwrap();
    assert_eq!(cached_chunks(&fx.config), 8);

    fs::remove_dir_all(fx.dataset.join("S0")).unwrap();
    let second = fx.volume().fetch(Some(1.0), Some(&bbox)).unwrap();
    assert_eq!(first, second);

    let uncached = PrecomputedVolume::new(fx.url(), Arc::new(FileByteSource::new()), ScaleSelector::new(u64::MAX));
    assert!(matches!(uncached.fetch(Some(1.0), Some(&bbox)), Err(VolumeError::Fetch { .. })));
}

#[test]
fn test_map_workflow() {
    let fx = fixture();
    let map = fx.map();
    assert_eq!(map.regions(), vec!["inferior", "superior"]);
    assert_eq!(map.maptype().unwrap(), MapType::Labelled);

    let centroids = map.compute_centroids(Some(1.0)).unwrap();
    assert!((centroids["inferior"].coordinate[2] - 1.5).abs() < 1e-9);
    assert!((centroids["superior"].coordinate[2] - 5.5).abs() < 1e-9);

    let options = AssignOptions::from_config(&fx.config.assignment).with_resolution(1.0);
    let points = PointSet::new(
        vec![centroids["inferior"].coordinate, centroids["superior"].coordinate],
        0.0,
    );
    let table = map.assign(&points, options).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].region, "inferior");
    assert_eq!(table.rows()[1].region, "superior");

    let json = table.to_json().unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert!(json[0].get("iou").is_none());
}

#[test]
fn test_compressed_map_and_colorize() {
    let fx = fixture();
    let map = fx.map();
    let compressed = map.compress(Some(2.0)).unwrap();
    assert_eq!(compressed.len(), 1);
    assert_eq!(compressed.maptype().unwrap(), MapType::Labelled);

    let superior = compressed
        .fetch(&FetchRequest::region("superior"))
        .unwrap()
        .unwrap();
    assert_eq!(superior.count_nonzero(), 32);

    let values = BTreeMap::from([("inferior".to_string(), 0.25), ("superior".to_string(), 0.75)]);
    let painted = map.colorize(&values, Some(2.0)).unwrap().unwrap();
    assert_eq!(painted.dtype, DataType::Float32);
    assert_eq!(painted.data[[0, 0, 0]], 0.25);
    assert_eq!(painted.data[[3, 3, 3]], 0.75);
}

#[test]
fn test_sampled_locations_fall_inside_their_region() {
    let fx = fixture();
    let map = fx.map();
    let mut rng = StdRng::seed_from_u64(7);
    let samples = map.sample_locations("superior", 20, &mut rng).unwrap().unwrap();
    assert_eq!(samples.len(), 20);
    for p in samples.iter() {
        assert!(p.coordinate[2] >= 3.5, "{:?}", p.coordinate);
    }
}
