// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The volume provider contract and the in-process providers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use voxatlas_structures::{resample_to_grid, BoundingBox, Image, Interpolation, MapType};

use crate::error::{VolumeError, VolumeResult};
use crate::scale::Scale;

/// Anything that can produce an image for a resolution and region of interest.
///
/// `resolution_mm` follows the scale selection rules: `None` lets the provider
/// choose (coarsest feasible), a negative value forces the finest level.
pub trait VolumeProvider: Send + Sync + fmt::Debug {
    /// Fetch a single frame (channel / 4th-dimension slice)
    fn fetch_frame(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>, frame: usize) -> VolumeResult<Image>;

    fn fetch(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>) -> VolumeResult<Image> {
        self.fetch_frame(resolution_mm, bbox, 0)
    }

    /// Fetch a named fragment (e.g. one hemisphere)
    fn fetch_fragment(
        &self,
        fragment: &str,
        _resolution_mm: Option<f64>,
        _bbox: Option<&BoundingBox>,
    ) -> VolumeResult<Image> {
        Err(VolumeError::UnknownFragment {
            fragment: fragment.to_string(),
            available: self.fragments(),
        })
    }

    fn fragments(&self) -> Vec<String> {
        Vec::new()
    }

    /// Available resolution levels, finest first; empty for single-resolution providers
    fn scales(&self) -> VolumeResult<Vec<Scale>>;

    fn map_type(&self) -> VolumeResult<MapType>;

    fn num_frames(&self) -> VolumeResult<usize> {
        Ok(1)
    }
}

/// Crop an in-memory image to a physical bounding box
fn crop_to_bbox(image: &Image, bbox: Option<&BoundingBox>) -> VolumeResult<Image> {
    match bbox {
        None => Ok(image.clone()),
        Some(b) => {
            let voxel_box = b.transform(&image.affine.inverse()?);
            image
                .crop_voxels(&voxel_box)
                .ok_or_else(|| VolumeError::OutOfBounds(format!("{:?}", b)))
        }
    }
}

/// Already-decoded images, one per frame
#[derive(Debug, Clone)]
pub struct InMemoryVolume {
    frames: Vec<Image>,
    map_type: MapType,
}

impl InMemoryVolume {
    pub fn new(image: Image, map_type: MapType) -> Self {
        Self {
            frames: vec![image],
            map_type,
        }
    }

    pub fn with_frames(frames: Vec<Image>, map_type: MapType) -> VolumeResult<Self> {
        if frames.is_empty() {
            return Err(VolumeError::FrameOutOfRange { frame: 0, frames: 0 });
        }
        Ok(Self { frames, map_type })
    }

    pub fn image(&self) -> &Image {
        &self.frames[0]
    }
}

impl VolumeProvider for InMemoryVolume {
    fn fetch_frame(&self, _resolution_mm: Option<f64>, bbox: Option<&BoundingBox>, frame: usize) -> VolumeResult<Image> {
        let image = self.frames.get(frame).ok_or(VolumeError::FrameOutOfRange {
            frame,
            frames: self.frames.len(),
        })?;
        crop_to_bbox(image, bbox)
    }

    fn scales(&self) -> VolumeResult<Vec<Scale>> {
        Ok(Vec::new())
    }

    fn map_type(&self) -> VolumeResult<MapType> {
        Ok(self.map_type)
    }

    fn num_frames(&self) -> VolumeResult<usize> {
        Ok(self.frames.len())
    }
}

/// One z-slice (frame) of a 4D provider, exposed as a 3D volume
#[derive(Debug, Clone)]
pub struct Subvolume {
    provider: Arc<dyn VolumeProvider>,
    z: usize,
}

impl Subvolume {
    pub fn new(provider: Arc<dyn VolumeProvider>, z: usize) -> Self {
        Self { provider, z }
    }

    pub fn z(&self) -> usize {
        self.z
    }
}

impl VolumeProvider for Subvolume {
    fn fetch_frame(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>, frame: usize) -> VolumeResult<Image> {
        if frame != 0 {
            return Err(VolumeError::FrameOutOfRange { frame, frames: 1 });
        }
        self.provider.fetch_frame(resolution_mm, bbox, self.z)
    }

    fn scales(&self) -> VolumeResult<Vec<Scale>> {
        self.provider.scales()
    }

    fn map_type(&self) -> VolumeResult<MapType> {
        self.provider.map_type()
    }
}

/// A volume split into named fragments (e.g. `left` / `right` hemisphere).
///
/// Fetching without a fragment merges all fragments onto the grid of the first
/// one, keeping the voxelwise maximum.
#[derive(Debug, Clone)]
pub struct FragmentedVolume {
    fragments: BTreeMap<String, Arc<dyn VolumeProvider>>,
}

impl FragmentedVolume {
    pub fn new(fragments: BTreeMap<String, Arc<dyn VolumeProvider>>) -> VolumeResult<Self> {
        if fragments.is_empty() {
            return Err(VolumeError::UnknownFragment {
                fragment: String::new(),
                available: Vec::new(),
            });
        }
        Ok(Self { fragments })
    }

    fn first(&self) -> VolumeResult<&Arc<dyn VolumeProvider>> {
        self.fragments.values().next().ok_or_else(|| VolumeError::UnknownFragment {
            fragment: String::new(),
            available: Vec::new(),
        })
    }
}

impl VolumeProvider for FragmentedVolume {
    fn fetch_frame(&self, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>, frame: usize) -> VolumeResult<Image> {
        let mut merged: Option<Image> = None;
        for (name, provider) in &self.fragments {
            let image = provider.fetch_frame(resolution_mm, bbox, frame)?;
            merged = Some(match merged {
                None => image,
                Some(acc) => {
                    debug!("Merging fragment '{}'", name);
                    let aligned = resample_to_grid(&image, &acc.affine, acc.shape(), Interpolation::for_image(&image))?;
                    let data = acc.zip_with(&aligned, f32::max)?;
                    Image::new(data, acc.affine, acc.dtype)
                }
            });
        }
        merged.ok_or_else(|| VolumeError::UnknownFragment {
            fragment: String::new(),
            available: Vec::new(),
        })
    }

    fn fetch_fragment(&self, fragment: &str, resolution_mm: Option<f64>, bbox: Option<&BoundingBox>) -> VolumeResult<Image> {
        match self.fragments.get(fragment) {
            Some(provider) => provider.fetch(resolution_mm, bbox),
            None => Err(VolumeError::UnknownFragment {
                fragment: fragment.to_string(),
                available: self.fragments(),
            }),
        }
    }

    fn fragments(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }

    fn scales(&self) -> VolumeResult<Vec<Scale>> {
        self.first()?.scales()
    }

    fn map_type(&self) -> VolumeResult<MapType> {
        self.first()?.map_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use voxatlas_structures::{Affine, DataType};

    fn labelled(value: f32, at: (usize, usize, usize)) -> Image {
        let mut data = Array3::zeros((4, 4, 4));
        data[at] = value;
        Image::new(data, Affine::identity(), DataType::Uint8)
    }

    #[test]
    fn test_in_memory_crops_to_bbox() {
        let volume = InMemoryVolume::new(labelled(3.0, (2, 2, 2)), MapType::Labelled);
        let bbox = BoundingBox::new([1.0, 1.0, 1.0], [3.0, 3.0, 3.0], None);
        let image = volume.fetch(None, Some(&bbox)).unwrap();
        assert_eq!(image.shape(), [2, 2, 2]);
        assert_eq!(image.data[[1, 1, 1]], 3.0);
        assert_eq!(image.affine.transform_point([1.0, 1.0, 1.0]), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_subvolume_selects_frame() {
        let frames = vec![labelled(1.0, (0, 0, 0)), labelled(2.0, (1, 1, 1))];
        let volume: Arc<dyn VolumeProvider> =
            Arc::new(InMemoryVolume::with_frames(frames, MapType::Continuous).unwrap());
        assert_eq!(volume.num_frames().unwrap(), 2);

        let second = Subvolume::new(volume.clone(), 1);
        let image = second.fetch(None, None).unwrap();
        assert_eq!(image.data[[1, 1, 1]], 2.0);
        assert!(matches!(
            Subvolume::new(volume, 5).fetch(None, None),
            Err(VolumeError::FrameOutOfRange { frame: 5, frames: 2 })
        ));
    }

    #[test]
    fn test_fragments_merge_and_select() {
        let mut fragments: BTreeMap<String, Arc<dyn VolumeProvider>> = BTreeMap::new();
        fragments.insert("left".into(), Arc::new(InMemoryVolume::new(labelled(1.0, (0, 0, 0)), MapType::Labelled)));
        fragments.insert("right".into(), Arc::new(InMemoryVolume::new(labelled(2.0, (3, 3, 3)), MapType::Labelled)));
        let volume = FragmentedVolume::new(fragments).unwrap();

        let merged = volume.fetch(None, None).unwrap();
        assert_eq!(merged.count_nonzero(), 2);

        let right = volume.fetch_fragment("right", None, None).unwrap();
        assert_eq!(right.count_nonzero(), 1);
        assert_eq!(right.data[[3, 3, 3]], 2.0);

        assert!(matches!(
            volume.fetch_fragment("middle", None, None),
            Err(VolumeError::UnknownFragment { .. })
        ));
        assert_eq!(volume.fragments(), vec!["left".to_string(), "right".to_string()]);
    }
}
