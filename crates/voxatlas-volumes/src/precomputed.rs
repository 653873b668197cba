// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Neuroglancer precomputed volumes.
//!
//! The scale catalog is discovered from `{url}/info` (and the optional
//! `{url}/transform.json`) on first use and kept per instance until
//! [`PrecomputedVolume::reset`] is called.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use voxatlas_config::FetchConfig;
use voxatlas_structures::{Affine, BoundingBox, DataType, Image, MapType};

use crate::byte_source::{source_for_url, ByteSource};
use crate::chunk_cache::ChunkCache;
use crate::error::{VolumeError, VolumeResult};
use crate::fetcher::ChunkedVolumeFetcher;
use crate::provider::VolumeProvider;
use crate::scale::{PrecomputedInfo, Scale, ScaleCatalog};
use crate::selector::ScaleSelector;

#[derive(Debug)]
pub struct PrecomputedVolume {
    url: String,
    source: Arc<dyn ByteSource>,
    selector: ScaleSelector,
    fetcher: ChunkedVolumeFetcher,
    transform_nm: Option<Affine>,
    catalog: RwLock<Option<Arc<ScaleCatalog>>>,
}

impl PrecomputedVolume {
    pub fn new(url: impl Into<String>, source: Arc<dyn ByteSource>, selector: ScaleSelector) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        let fetcher = ChunkedVolumeFetcher::new(url.clone(), source.clone(), None);
        Self {
            url,
            source,
            selector,
            fetcher,
            transform_nm: None,
            catalog: RwLock::new(None),
        }
    }

    /// Volume with byte source, budget and chunk cache taken from `[fetch]`
    pub fn from_config(url: impl Into<String>, config: &FetchConfig) -> VolumeResult<Self> {
        let url = url.into();
        let source: Arc<dyn ByteSource> = Arc::from(source_for_url(&url, config)?);
        let volume = Self::new(url, source, ScaleSelector::from_config(config));
        if config.use_cache {
            let cache = ChunkCache::open(config.resolved_cache_dir())?;
            Ok(volume.with_cache(cache))
        } else {
            Ok(volume)
        }
    }

    pub fn with_cache(mut self, cache: ChunkCache) -> Self {
        self.fetcher = ChunkedVolumeFetcher::new(self.url.clone(), self.source.clone(), Some(cache));
        self
    }

    /// Use an explicit nanometre transform instead of `transform.json`
    pub fn with_transform_nm(mut self, transform_nm: Affine) -> Self {
        self.transform_nm = Some(transform_nm);
        self
    }

    pub fn with_selector(mut self, selector: ScaleSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn selector(&self) -> &ScaleSelector {
        &self.selector
    }

    /// Load the scale catalog if it has not been loaded yet
    pub fn ensure_initialized(&self) -> VolumeResult<Arc<ScaleCatalog>> {
        if let Some(catalog) = self.catalog.read().as_ref() {
            return Ok(catalog.clone());
        }

        let mut slot = self.catalog.write();
        if let Some(catalog) = slot.as_ref() {
            return Ok(catalog.clone());
        }
        let info = PrecomputedInfo::from_json(&self.source.fetch_bytes(&format!("{}/info", self.url))?)?;
        let transform_nm = self.load_transform_nm()?;
        let catalog = Arc::new(ScaleCatalog::from_info(&info, &transform_nm)?);
        info!(
            "Loaded {} scale(s) of {} ({:?}, {:?})",
            catalog.len(),
            self.url,
            catalog.dtype(),
            catalog.map_type()
        );
        *slot = Some(catalog.clone());
        Ok(catalog)
    }

    /// Drop the cached scale catalog; the next access reloads it
    pub fn reset(&self) {
        *self.catalog.write() = None;
    }

    fn load_transform_nm(&self) -> VolumeResult<Affine> {
        if let Some(t) = self.transform_nm {
            return Ok(t);
        }
        let url = format!("{}/transform.json", self.url);
        match self.source.fetch_bytes(&url) {
            Ok(bytes) => {
                let rows: Vec<Vec<f64>> = serde_json::from_slice(&bytes)?;
                Ok(Affine::from_row_vecs(&rows)?)
            }
            Err(VolumeError::Fetch { .. }) => {
                warn!("No transform.json found at {}, using identity.", self.url);
                Ok(Affine::identity())
            }
            Err(e) => Err(e),
        }
    }

    /// Scale chosen for `resolution_mm` / `bbox` under the byte budget
    pub fn select_scale(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>) -> VolumeResult<Scale> {
        let catalog = self.ensure_initialized()?;
        Ok(self.selector.select(&catalog, resolution_mm, bbox)?.clone())
    }

    /// Voxel extent (x, y, z) of the scale selected for `resolution_mm`
    pub fn get_shape(&self, resolution_mm: Option<f64>) -> VolumeResult<[usize; 3]> {
        Ok(self.select_scale(resolution_mm, None)?.size)
    }

    pub fn dtype(&self) -> VolumeResult<DataType> {
        Ok(self.ensure_initialized()?.dtype())
    }

    pub fn is_float(&self) -> VolumeResult<bool> {
        Ok(self.dtype()?.is_float())
    }
}

impl VolumeProvider for PrecomputedVolume {
    fn fetch(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>) -> VolumeResult<Image> {
        let catalog = self.ensure_initialized()?;
        let scale = self.selector.select(&catalog, resolution_mm, bbox)?;
        self.fetcher.fetch(&catalog, scale, bbox)
    }

    fn fetch_frame(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>, frame: usize) -> VolumeResult<Image> {
        let catalog = self.ensure_initialized()?;
        let scale = self.selector.select(&catalog, resolution_mm, bbox)?;
        self.fetcher.fetch_frame(&catalog, scale, bbox, frame)
    }

    fn scales(&self) -> VolumeResult<Vec<Scale>> {
        Ok(self.ensure_initialized()?.scales().to_vec())
    }

    fn map_type(&self) -> VolumeResult<MapType> {
        Ok(self.ensure_initialized()?.map_type())
    }

    fn num_frames(&self) -> VolumeResult<usize> {
        Ok(self.ensure_initialized()?.num_channels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::codec::encode_raw;

    const URL: &str = "mem://atlas/labels";

    const INFO: &[u8] = br#"{"data_type": "uint16", "num_channels": 1, "type": "segmentation",
        "scales": [{"chunk_sizes": [[4, 4, 4]], "encoding": "raw", "key": "1mm",
                    "resolution": [1000000, 1000000, 1000000],
                    "size": [6, 5, 4], "voxel_offset": [0, 0, 0]}]}"#;

    /// 6x5x4 volume in 4^3 chunks holding `x + 10 * y + 100 * z`
    fn memory_store(with_transform: bool) -> Arc<MemoryByteSource> {
        let source = Arc::new(MemoryByteSource::new());
        source.insert(format!("{URL}/info"), INFO.to_vec());
        if with_transform {
            source.insert(
                format!("{URL}/transform.json"),
                b"[[1,0,0,-3000000],[0,1,0,0],[0,0,1,0]]".to_vec(),
            );
        }
        let info = PrecomputedInfo::from_json(INFO).unwrap();
        let scale = Scale::from_info(&info.scales[0], &Affine::identity()).unwrap();
        for gx in 0..2 {
            for gy in 0..2 {
                let grid = [gx, gy, 0];
                let (lo, hi) = scale.chunk_bounds(grid);
                let mut values = Vec::new();
                for z in lo[2]..hi[2] {
                    for y in lo[1]..hi[1] {
                        for x in lo[0]..hi[0] {
                            values.push((x + 10 * y + 100 * z) as f32);
                        }
                    }
                }
                source.insert(scale.chunk_url(URL, grid), encode_raw(&values, DataType::Uint16));
            }
        }
        source
    }

    #[test]
    fn test_catalog_is_loaded_once_until_reset() {
        let store = memory_store(true);
        let volume = PrecomputedVolume::new(URL, store.clone(), ScaleSelector::new(u64::MAX));
        volume.ensure_initialized().unwrap();
        let after_first = store.request_count();
        volume.ensure_initialized().unwrap();
        assert_eq!(store.request_count(), after_first);

        volume.reset();
        volume.ensure_initialized().unwrap();
        assert_eq!(store.request_count(), 2 * after_first);
    }

    #[test]
    fn test_volume_properties() {
        let volume = PrecomputedVolume::new(URL, memory_store(false), ScaleSelector::new(u64::MAX));
        assert_eq!(volume.dtype().unwrap(), DataType::Uint16);
        assert!(!volume.is_float().unwrap());
        assert_eq!(volume.map_type().unwrap(), MapType::Labelled);
        assert_eq!(volume.get_shape(None).unwrap(), [6, 5, 4]);
        assert_eq!(volume.scales().unwrap().len(), 1);
    }

    #[test]
    fn test_transform_json_shifts_physical_space() {
        let volume = PrecomputedVolume::new(URL, memory_store(true), ScaleSelector::new(u64::MAX));
        let image = volume.fetch(None, None).unwrap();
        assert_eq!(image.affine.transform_point([0.0, 0.0, 0.0]), [-3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_full_fetch_spans_chunks_in_zyx_order() {
        let volume = PrecomputedVolume::new(URL, memory_store(false), ScaleSelector::new(u64::MAX));
        let image = volume.fetch(None, None).unwrap();
        assert_eq!(image.shape(), [4, 5, 6]);
        // data[z, y, x]
        assert_eq!(image.data[[3, 4, 5]], 345.0);
        assert_eq!(image.data[[1, 0, 4]], 104.0);
        // the affine maps array indices back to (x, y, z)
        assert_eq!(image.affine.transform_point([3.0, 4.0, 5.0]), [5.0, 4.0, 3.0]);
        assert_eq!(image.value_at_physical([5.0, 4.0, 3.0]).unwrap(), Some(345.0));
    }

    #[test]
    fn test_sub_bbox_inside_one_chunk_is_cropped() {
        let volume = PrecomputedVolume::new(URL, memory_store(false), ScaleSelector::new(u64::MAX));
        let bbox = BoundingBox::new([1.0, 1.0, 1.0], [3.0, 2.0, 4.0], None);
        let image = volume.fetch(Some(1.0), Some(&bbox)).unwrap();
        assert_eq!(image.shape(), [3, 1, 2]);
        assert_eq!(image.value_at_physical([2.0, 1.0, 3.0]).unwrap(), Some(312.0));
    }

    #[test]
    fn test_degenerate_bbox_is_expanded() {
        let volume = PrecomputedVolume::new(URL, memory_store(false), ScaleSelector::new(u64::MAX));
        let bbox = BoundingBox::new([2.0, 2.0, 2.0], [2.0, 2.0, 2.0], None);
        let image = volume.fetch(None, Some(&bbox)).unwrap();
        assert_eq!(image.shape(), [1, 1, 1]);
        assert_eq!(image.data[[0, 0, 0]], 222.0);
    }

    #[test]
    fn test_bbox_outside_volume_is_rejected() {
        let volume = PrecomputedVolume::new(URL, memory_store(false), ScaleSelector::new(u64::MAX));
        let bbox = BoundingBox::new([50.0, 50.0, 50.0], [60.0, 60.0, 60.0], None);
        assert!(matches!(volume.fetch(None, Some(&bbox)), Err(VolumeError::OutOfBounds(_))));
    }

    #[test]
    fn test_missing_info_propagates_fetch_error() {
        let volume = PrecomputedVolume::new("mem://nowhere", Arc::new(MemoryByteSource::new()), ScaleSelector::new(1));
        assert!(matches!(volume.ensure_initialized(), Err(VolumeError::Fetch { .. })));
    }
}
