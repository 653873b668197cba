// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Parcellation maps.

A [`ParcellationMap`] owns a [`RegionIndexTable`] and the list of volume
providers its indices point into. Both are fixed at construction; operations
that derive a new map (such as [`ParcellationMap::compress`]) return a new
instance.
*/

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ndarray::{Array3, Zip};
use rand::Rng;
use tracing::{debug, info, warn};
use voxatlas_structures::{
    resample_to_grid, BoundingBox, DataType, Image, Interpolation, LabelSpec, MapIndex, MapType, Point, PointSet,
};
use voxatlas_volumes::{InMemoryVolume, Subvolume, VolumeProvider};

use crate::assignment::{AssignOptions, AssignmentTable, MaskAssignmentEngine, ScoreAgainstMasks};
use crate::error::{MapError, MapResult};
use crate::region_index::{IndexSpec, NameMatch, RegionIndexTable, RegionLookup};
use crate::sampling::{sample_voxels, squared_distance_transform};

/// What to fetch from a map.
///
/// At most one of `region` and `index` may be set; with neither, the map must
/// consist of a single volume.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub region: Option<String>,
    pub index: Option<MapIndex>,
    pub resolution_mm: Option<f64>,
    pub bbox: Option<BoundingBox>,
    pub fragment: Option<String>,
}

impl FetchRequest {
    pub fn region(spec: impl Into<String>) -> Self {
        Self {
            region: Some(spec.into()),
            ..Default::default()
        }
    }

    pub fn index(index: MapIndex) -> Self {
        Self {
            index: Some(index),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: MapIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_resolution(mut self, resolution_mm: f64) -> Self {
        self.resolution_mm = Some(resolution_mm);
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ParcellationMap {
    name: String,
    table: RegionIndexTable,
    volumes: Vec<Arc<dyn VolumeProvider>>,
    lookup: Arc<dyn RegionLookup>,
}

impl ParcellationMap {
    /// Build a map from region name -> index specifications.
    ///
    /// Every distinct `(volume, z)` pair becomes one map volume, wrapping the
    /// provider in a [`Subvolume`] when `z` is given; indices are renumbered
    /// onto that list.
    pub fn new(
        name: impl Into<String>,
        indices: Vec<(String, Vec<IndexSpec>)>,
        volumes: Vec<Arc<dyn VolumeProvider>>,
    ) -> MapResult<Self> {
        let name = name.into();
        let mut map_volumes: Vec<Arc<dyn VolumeProvider>> = Vec::new();
        let mut remap: HashMap<(usize, Option<usize>), usize> = HashMap::new();
        let mut entries = Vec::with_capacity(indices.len());

        for (region, specs) in indices {
            let mut mapped = Vec::with_capacity(specs.len());
            for spec in specs {
                let provider = volumes.get(spec.volume).ok_or(MapError::VolumeOutOfRange {
                    requested: spec.volume,
                    available: volumes.len(),
                })?;
                let volume = *remap.entry((spec.volume, spec.z)).or_insert_with(|| {
                    let wrapped: Arc<dyn VolumeProvider> = match spec.z {
                        Some(z) => Arc::new(Subvolume::new(provider.clone(), z)),
                        None => provider.clone(),
                    };
                    map_volumes.push(wrapped);
                    map_volumes.len() - 1
                });
                mapped.push(MapIndex {
                    volume,
                    label: LabelSpec::from(spec.label),
                    fragment: spec.fragment,
                });
            }
            entries.push((region, mapped));
        }

        debug!(
            "Map '{}': {} regions over {} volume(s)",
            name,
            entries.len(),
            map_volumes.len()
        );
        Ok(Self {
            name,
            table: RegionIndexTable::from_entries(entries),
            volumes: map_volumes,
            lookup: Arc::new(NameMatch),
        })
    }

    /// Build a map from a JSON object `{"region": [{"volume": 0, "label": 1}, ...]}`.
    ///
    /// Regions are ordered by name.
    pub fn from_json(
        name: impl Into<String>,
        indices_json: &str,
        volumes: Vec<Arc<dyn VolumeProvider>>,
    ) -> MapResult<Self> {
        let indices: BTreeMap<String, Vec<IndexSpec>> = serde_json::from_str(indices_json)?;
        Self::new(name, indices.into_iter().collect(), volumes)
    }

    /// Replace the region name resolver
    pub fn with_lookup(mut self, lookup: Arc<dyn RegionLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &RegionIndexTable {
        &self.table
    }

    pub fn volumes(&self) -> &[Arc<dyn VolumeProvider>] {
        &self.volumes
    }

    /// Number of volumes
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn regions(&self) -> Vec<&str> {
        self.table.regions()
    }

    pub fn labels(&self) -> BTreeSet<LabelSpec> {
        self.table.labels()
    }

    pub fn maptype(&self) -> MapResult<MapType> {
        self.table.maptype()
    }

    pub fn find_indices(&self, spec: &str) -> Vec<(MapIndex, String)> {
        self.table.find_indices(spec, self.lookup.as_ref())
    }

    pub fn get_index(&self, spec: &str) -> MapResult<Option<MapIndex>> {
        self.table.get_index(spec, self.lookup.as_ref())
    }

    pub fn get_region(&self, index: &MapIndex) -> Option<&str> {
        self.table.get_region(index)
    }

    /// Fetch a volume, or a regional map when a region or labelled index is given.
    ///
    /// A labelled index yields a binary `uint8` mask. An unmapped region
    /// yields `Ok(None)`.
    pub fn fetch(&self, request: &FetchRequest) -> MapResult<Option<Image>> {
        let mut index = match (&request.region, &request.index) {
            (Some(_), Some(_)) => {
                return Err(MapError::InvalidRequest(
                    "'region' and 'index' cannot be specified at the same time".into(),
                ))
            }
            (Some(spec), None) => match self.get_index(spec)? {
                Some(index) => index,
                None => return Ok(None),
            },
            (None, Some(index)) => index.clone(),
            (None, None) if self.volumes.len() == 1 => MapIndex::whole(0),
            (None, None) => {
                return Err(MapError::InvalidRequest(format!(
                    "map '{}' provides {} volumes, specify an index or region to fetch",
                    self.name,
                    self.volumes.len()
                )))
            }
        };

        if let Some(fragment) = &request.fragment {
            if let Some(indexed) = &index.fragment {
                if indexed != fragment {
                    return Err(MapError::FragmentConflict {
                        requested: fragment.clone(),
                        indexed: indexed.clone(),
                    });
                }
            }
            index.fragment = Some(fragment.clone());
        }

        self.fetch_resolved(&index, request.resolution_mm, request.bbox.as_ref())
            .map(Some)
    }

    /// Fetch the structure addressed by `index`
    pub fn fetch_index(&self, index: &MapIndex, resolution_mm: Option<f64>) -> MapResult<Image> {
        self.fetch_resolved(index, resolution_mm, None)
    }

    fn fetch_resolved(
        &self,
        index: &MapIndex,
        resolution_mm: Option<f64>,
        bbox: Option<&BoundingBox>,
    ) -> MapResult<Image> {
        let provider = self.volumes.get(index.volume).ok_or(MapError::VolumeOutOfRange {
            requested: index.volume,
            available: self.volumes.len(),
        })?;
        let image = match &index.fragment {
            Some(fragment) => provider.fetch_fragment(fragment, resolution_mm, bbox)?,
            None => provider.fetch(resolution_mm, bbox)?,
        };
        Ok(match index.label {
            LabelSpec::Label(label) => image.label_mask(label),
            LabelSpec::Whole => image,
        })
    }

    /// All volumes, in order
    pub fn fetch_iter(&self, resolution_mm: Option<f64>) -> impl Iterator<Item = MapResult<Image>> + '_ {
        (0..self.volumes.len()).map(move |i| self.fetch_resolved(&MapIndex::whole(i), resolution_mm, None))
    }

    /// Merge all volumes into a single labelled volume on the grid of volume 0.
    ///
    /// Labels are assigned sequentially from 1 in volume order (and label
    /// order within a volume). Continuous maps keep, per voxel, the region
    /// with the highest value; labelled maps copy label voxels directly.
    pub fn compress(&self, resolution_mm: Option<f64>) -> MapResult<ParcellationMap> {
        let maptype = self.maptype()?;
        let template = self.fetch_index(&MapIndex::whole(0), resolution_mm)?;
        let shape = template.shape();
        let interpolation = match maptype {
            MapType::Labelled => Interpolation::Nearest,
            MapType::Continuous => Interpolation::Linear,
        };
        info!(
            "Compressing {} {:?} volume(s) of map '{}' into a single labelled volume",
            self.volumes.len(),
            maptype,
            self.name
        );

        let mut result = Array3::<f32>::zeros(shape);
        let mut voxelwise_max = Array3::<f32>::zeros(shape);
        let mut region_indices: Vec<(String, Vec<IndexSpec>)> = Vec::new();
        let mut next_label = 1u32;

        for (volume, image) in self.fetch_iter(resolution_mm).enumerate() {
            let mut image = image?;
            if !image.same_grid(&template) {
                debug!("Compression requires to resample volume {} ({:?})", volume, interpolation);
                image = resample_to_grid(&image, &template.affine, shape, interpolation)?;
            }

            let labels: Vec<LabelSpec> = match maptype {
                MapType::Labelled => {
                    let observed: BTreeSet<u32> = image
                        .data
                        .iter()
                        .filter(|v| **v > 0.0)
                        .map(|v| v.round() as u32)
                        .collect();
                    observed.into_iter().map(LabelSpec::Label).collect()
                }
                MapType::Continuous => vec![LabelSpec::Whole],
            };

            for label in labels {
                let Some(region) = self.table.region_for(volume, label) else {
                    warn!(
                        "Label index {} is observed in map volume {}, but no region is defined for it.",
                        label, volume
                    );
                    continue;
                };
                let spec = IndexSpec::labelled(0, next_label);
                match region_indices.iter().position(|(r, _)| r == region) {
                    Some(i) => region_indices[i].1.push(spec),
                    None => region_indices.push((region.to_string(), vec![spec])),
                }

                let new_label = next_label as f32;
                Zip::from(&mut result)
                    .and(&mut voxelwise_max)
                    .and(&image.data)
                    .for_each(|r, m, &v| {
                        let update = match label {
                            LabelSpec::Whole => v > *m,
                            LabelSpec::Label(l) => v == l as f32,
                        };
                        if update {
                            *r = new_label;
                            *m = v;
                        }
                    });
                next_label += 1;
            }
        }

        let compressed = Image::new(result, template.affine, DataType::Uint32);
        let volume: Arc<dyn VolumeProvider> = Arc::new(InMemoryVolume::new(compressed, MapType::Labelled));
        Ok(ParcellationMap::new(format!("{} compressed", self.name), region_indices, vec![volume])?
            .with_lookup(self.lookup.clone()))
    }

    /// Physical centroid of every region.
    ///
    /// Labelled indices select voxels equal to the label, whole-volume
    /// indices voxels above zero. Regions without voxels are skipped.
    pub fn compute_centroids(&self, resolution_mm: Option<f64>) -> MapResult<BTreeMap<String, Point>> {
        let mut images: HashMap<usize, Image> = HashMap::new();
        let mut centroids = BTreeMap::new();

        for region in self.table.regions() {
            let indices = self.table.indices(region).unwrap_or(&[]);
            let mut sum = [0.0f64; 3];
            let mut count = 0usize;
            for index in indices {
                if index.label == LabelSpec::Label(0) {
                    continue;
                }
                if !images.contains_key(&index.volume) {
                    let image = self.fetch_index(&MapIndex::whole(index.volume), resolution_mm)?;
                    images.insert(index.volume, image);
                }
                let Some(image) = images.get(&index.volume) else {
                    continue;
                };

                let mut voxel_sum = [0.0f64; 3];
                let mut n = 0usize;
                for ((i, j, k), v) in image.data.indexed_iter() {
                    let selected = match index.label {
                        LabelSpec::Label(l) => *v == l as f32,
                        LabelSpec::Whole => *v > 0.0,
                    };
                    if selected {
                        voxel_sum[0] += i as f64;
                        voxel_sum[1] += j as f64;
                        voxel_sum[2] += k as f64;
                        n += 1;
                    }
                }
                if n == 0 {
                    continue;
                }
                let mean = voxel_sum.map(|s| s / n as f64);
                let physical = image.affine.transform_point(mean);
                for d in 0..3 {
                    sum[d] += physical[d] * n as f64;
                }
                count += n;
            }

            if count == 0 {
                warn!("Region '{}' has no voxels in map '{}'", region, self.name);
                continue;
            }
            centroids.insert(region.to_string(), Point::new(sum.map(|s| s / count as f64)));
        }
        Ok(centroids)
    }

    /// Paint per-region values into one volume.
    ///
    /// Whole-volume regions claim the voxels where their map is highest;
    /// labelled regions claim their label voxels. Returns `None` if no value
    /// could be placed.
    pub fn colorize(&self, values: &BTreeMap<String, f64>, resolution_mm: Option<f64>) -> MapResult<Option<Image>> {
        let mut resolved: Vec<(MapIndex, f64)> = Vec::new();
        for (region, value) in values {
            match self.get_index(region)? {
                Some(index) => resolved.push((index, *value)),
                None => warn!("Cannot colorize '{}': not mapped in '{}'", region, self.name),
            }
        }

        let mut result: Option<Image> = None;
        for volume in 0..self.volumes.len() {
            let painted: Vec<&(MapIndex, f64)> = resolved.iter().filter(|(i, _)| i.volume == volume).collect();
            if painted.is_empty() {
                continue;
            }
            let mut image = self.fetch_index(&MapIndex::whole(volume), resolution_mm)?;
            let canvas = result.get_or_insert_with(|| Image::zeros(image.shape(), image.affine, DataType::Float32));
            if !image.same_grid(canvas) {
                let interpolation = Interpolation::for_image(&image);
                image = resample_to_grid(&image, &canvas.affine, canvas.shape(), interpolation)?;
            }

            let mut max_values = Array3::<f32>::zeros(image.data.raw_dim());
            for (index, value) in painted {
                let value = *value as f32;
                Zip::from(&mut canvas.data)
                    .and(&mut max_values)
                    .and(&image.data)
                    .for_each(|c, m, &v| match index.label {
                        LabelSpec::Whole => {
                            if v > *m {
                                *c = value;
                                *m = v;
                            }
                        }
                        LabelSpec::Label(l) => {
                            if v == l as f32 {
                                *c = value;
                            }
                        }
                    });
            }
        }
        Ok(result)
    }

    /// Draw `n` physical locations inside a region.
    ///
    /// Binary masks are weighted by their squared distance transform,
    /// continuous maps by their values. An unmapped region yields `Ok(None)`.
    pub fn sample_locations<R: Rng + ?Sized>(
        &self,
        spec: &str,
        n: usize,
        rng: &mut R,
    ) -> MapResult<Option<PointSet>> {
        let Some(index) = self.get_index(spec)? else {
            return Ok(None);
        };
        let mask = self.fetch_index(&index, None)?;
        let weights = if mask.dtype.is_integer() {
            let foreground = mask.data.mapv(|v| v > 0.0);
            squared_distance_transform(&foreground)
                .unwrap_or_else(|| foreground.mapv(|f| if f { 1.0 } else { 0.0 }))
        } else {
            mask.data.mapv(|v| v.max(0.0) as f64)
        };
        let coordinates = sample_voxels(&weights, n, rng)?
            .into_iter()
            .map(|[i, j, k]| mask.affine.transform_point([i as f64, j as f64, k as f64]))
            .collect();
        Ok(Some(PointSet::new(coordinates, 0.0)))
    }

    /// Assign a point, point set or image to the regions of this map
    pub fn assign<Q: ScoreAgainstMasks + ?Sized>(&self, query: &Q, options: AssignOptions) -> MapResult<AssignmentTable> {
        let map_type = self.maptype()?;
        let volumes = self
            .fetch_iter(options.resolution_mm)
            .collect::<MapResult<Vec<_>>>()?;
        debug!("Assigning against {} volume(s) of map '{}'", volumes.len(), self.name);
        let engine = MaskAssignmentEngine::new(&self.table, map_type, volumes, options)?;
        query.score_against(&engine)
    }
}
