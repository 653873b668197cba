// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Assignment of spatial queries to the regions of a parcellation map.

Every query kind reduces to image-versus-mask scoring:

- **Points** whose uncertainty is below the voxel-precision cutoff are read
  out directly at their nearest voxel in every map volume.
- **Uncertain points** are replaced by a Gaussian kernel centred on the
  point's voxel and scored inside the kernel window; the rows carry the point
  index.
- **Images** are resampled onto the map grid, split into connected components,
  and every component is scored against every mapped region mask.

Region masks are never materialised. Their supports are summarised once per
engine and read back through the map volume, so memory stays at one grid
whatever the number of components.
*/

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use ndarray::Array3;
use serde::Serialize;
use tracing::{debug, info, warn};
use voxatlas_config::AssignmentConfig;
use voxatlas_structures::{
    resample_to_grid, Affine, DataType, Image, Interpolation, LabelSpec, MapType, Point, PointSet,
};

use crate::components::label_components;
use crate::error::{MapError, MapResult};
use crate::kernel::{gaussian_kernel, kernel_radius};
use crate::region_index::RegionIndexTable;
use crate::scoring::{compare_supports, MaskSummary};

/// Tunables of an assignment run
#[derive(Debug, Clone, PartialEq)]
pub struct AssignOptions {
    /// Components of a query image smaller than this are ignored
    pub min_size_voxel: usize,
    /// Map values at or below this are not assigned
    pub lower_threshold: f64,
    /// Point uncertainty (in voxels) from which the Gaussian kernel path is used
    pub voxel_precision_cutoff: f64,
    /// Kernel half-width in multiples of sigma
    pub kernel_sigma_points: f64,
    /// Resolution at which map volumes are fetched
    pub resolution_mm: Option<f64>,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self::from_config(&AssignmentConfig::default())
    }
}

impl AssignOptions {
    pub fn from_config(config: &AssignmentConfig) -> Self {
        Self {
            min_size_voxel: config.min_size_voxel,
            lower_threshold: config.lower_threshold,
            voxel_precision_cutoff: config.voxel_precision_cutoff,
            kernel_sigma_points: config.kernel_sigma_points,
            resolution_mm: None,
        }
    }

    pub fn with_min_size(mut self, min_size_voxel: usize) -> Self {
        self.min_size_voxel = min_size_voxel;
        self
    }

    pub fn with_lower_threshold(mut self, lower_threshold: f64) -> Self {
        self.lower_threshold = lower_threshold;
        self
    }

    pub fn with_resolution(mut self, resolution_mm: f64) -> Self {
        self.resolution_mm = Some(resolution_mm);
        self
    }
}

/// One row of an assignment table.
///
/// `structure` is the point index for point queries and the component label
/// for image queries. The overlap metrics are undefined for exact coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRecord {
    pub structure: usize,
    pub volume: usize,
    pub region: String,
    pub value: f64,
    pub correlation: Option<f64>,
    pub iou: Option<f64>,
    pub contains: Option<f64>,
    pub contained: Option<f64>,
}

const REQUIRED_COLUMNS: [&str; 4] = ["structure", "volume", "region", "value"];

/// Sorted assignment rows plus, for image queries, the component label image
#[derive(Debug, Clone, Default)]
pub struct AssignmentTable {
    rows: Vec<AssignmentRecord>,
    components: Option<Image>,
}

impl AssignmentTable {
    /// Sort by structure (ascending) then score (descending), keeping the best
    /// row per `(structure, region)` pair
    pub fn from_records(mut rows: Vec<AssignmentRecord>, components: Option<Image>) -> Self {
        rows.sort_by(|a, b| {
            a.structure
                .cmp(&b.structure)
                .then_with(|| {
                    let ca = a.correlation.unwrap_or(f64::NEG_INFINITY);
                    let cb = b.correlation.unwrap_or(f64::NEG_INFINITY);
                    cb.total_cmp(&ca)
                })
                .then_with(|| b.value.total_cmp(&a.value))
                .then_with(|| a.region.cmp(&b.region))
        });
        let mut seen = HashSet::new();
        rows.retain(|r| seen.insert((r.structure, r.region.clone())));
        Self { rows, components }
    }

    pub fn rows(&self) -> &[AssignmentRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssignmentRecord> {
        self.rows.iter()
    }

    /// Component label image of an image query
    pub fn components(&self) -> Option<&Image> {
        self.components.as_ref()
    }

    /// Regions assigned to one structure, best first
    pub fn regions_for(&self, structure: usize) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.structure == structure)
            .map(|r| r.region.as_str())
            .collect()
    }

    /// Column names; optional metrics undefined in every row are left out
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = REQUIRED_COLUMNS.to_vec();
        let optional: [(&'static str, fn(&AssignmentRecord) -> Option<f64>); 4] = [
            ("correlation", |r| r.correlation),
            ("iou", |r| r.iou),
            ("contains", |r| r.contains),
            ("contained", |r| r.contained),
        ];
        for (name, get) in optional {
            if self.rows.iter().any(|r| get(r).is_some()) {
                columns.push(name);
            }
        }
        columns
    }

    /// Rows as JSON objects restricted to [`Self::columns`]
    pub fn to_json(&self) -> MapResult<serde_json::Value> {
        let columns = self.columns();
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let serde_json::Value::Object(mut object) = serde_json::to_value(row)? else {
                continue;
            };
            object.retain(|key, _| columns.contains(&key.as_str()));
            out.push(serde_json::Value::Object(object));
        }
        Ok(serde_json::Value::Array(out))
    }
}

/// A spatial object to assign
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialQuery {
    Point(Point),
    PointSet(PointSet),
    Image(Image),
}

impl From<Point> for SpatialQuery {
    fn from(point: Point) -> Self {
        SpatialQuery::Point(point)
    }
}

impl From<PointSet> for SpatialQuery {
    fn from(points: PointSet) -> Self {
        SpatialQuery::PointSet(points)
    }
}

impl From<Image> for SpatialQuery {
    fn from(image: Image) -> Self {
        SpatialQuery::Image(image)
    }
}

/// Implemented by every query kind
pub trait ScoreAgainstMasks {
    fn score_against(&self, engine: &MaskAssignmentEngine<'_>) -> MapResult<AssignmentTable>;
}

impl ScoreAgainstMasks for Point {
    fn score_against(&self, engine: &MaskAssignmentEngine<'_>) -> MapResult<AssignmentTable> {
        PointSet::from(self.clone()).score_against(engine)
    }
}

impl ScoreAgainstMasks for PointSet {
    fn score_against(&self, engine: &MaskAssignmentEngine<'_>) -> MapResult<AssignmentTable> {
        Ok(AssignmentTable::from_records(engine.assign_points(self)?, None))
    }
}

impl ScoreAgainstMasks for Image {
    fn score_against(&self, engine: &MaskAssignmentEngine<'_>) -> MapResult<AssignmentTable> {
        let (rows, components) = engine.assign_image(self)?;
        Ok(AssignmentTable::from_records(rows, Some(components)))
    }
}

impl ScoreAgainstMasks for SpatialQuery {
    fn score_against(&self, engine: &MaskAssignmentEngine<'_>) -> MapResult<AssignmentTable> {
        match self {
            SpatialQuery::Point(p) => p.score_against(engine),
            SpatialQuery::PointSet(p) => p.score_against(engine),
            SpatialQuery::Image(i) => i.score_against(engine),
        }
    }
}

/// Region masks of one map, aligned on the grid of its first volume
pub struct MaskAssignmentEngine<'a> {
    table: &'a RegionIndexTable,
    map_type: MapType,
    template: Affine,
    shape: [usize; 3],
    volumes: Vec<Image>,
    options: AssignOptions,
    regions: OnceLock<Vec<RegionExtent<'a>>>,
}

impl fmt::Debug for MaskAssignmentEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskAssignmentEngine")
            .field("map_type", &self.map_type)
            .field("shape", &self.shape)
            .field("volumes", &self.volumes.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Support of one mapped region inside its volume
#[derive(Debug, Clone)]
struct RegionExtent<'a> {
    volume: usize,
    region: &'a str,
    label: LabelSpec,
    summary: MaskSummary,
}

fn grow(summary: &mut Option<MaskSummary>, index: [usize; 3]) {
    match summary.as_mut() {
        Some(s) => s.include(index),
        None => *summary = Some(MaskSummary::voxel(index)),
    }
}

/// Support of a kernel whose voxel 0 sits at `origin` on a grid of `shape`
fn kernel_support(kernel: &Array3<f32>, origin: [i64; 3], shape: [usize; 3]) -> Option<MaskSummary> {
    let mut summary = None;
    for ((i, j, k), v) in kernel.indexed_iter() {
        if *v <= 0.0 {
            continue;
        }
        let p = [origin[0] + i as i64, origin[1] + j as i64, origin[2] + k as i64];
        if (0..3).all(|d| p[d] >= 0 && (p[d] as usize) < shape[d]) {
            grow(&mut summary, [p[0] as usize, p[1] as usize, p[2] as usize]);
        }
    }
    summary
}

impl<'a> MaskAssignmentEngine<'a> {
    /// `volumes[i]` must be the image of map volume `i`
    pub fn new(
        table: &'a RegionIndexTable,
        map_type: MapType,
        volumes: Vec<Image>,
        options: AssignOptions,
    ) -> MapResult<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| MapError::InvalidRequest("cannot assign against a map without volumes".into()))?;
        let template = first.affine;
        let shape = first.shape();

        let mut aligned = Vec::with_capacity(volumes.len());
        for (i, volume) in volumes.into_iter().enumerate() {
            if volume.shape() == shape && volume.affine.approx_eq(&template, 1e-9) {
                aligned.push(volume);
            } else {
                warn!("Map volume {} is not on the grid of volume 0 and will be resampled", i);
                let interpolation = Interpolation::for_image(&volume);
                aligned.push(resample_to_grid(&volume, &template, shape, interpolation)?);
            }
        }

        Ok(Self {
            table,
            map_type,
            template,
            shape,
            volumes: aligned,
            options,
            regions: OnceLock::new(),
        })
    }

    pub fn options(&self) -> &AssignOptions {
        &self.options
    }

    pub fn assign(&self, query: &dyn ScoreAgainstMasks) -> MapResult<AssignmentTable> {
        query.score_against(self)
    }

    /// Region mapped at a voxel value of `volume`
    fn region_at(&self, volume: usize, value: f32) -> Option<&'a str> {
        let label = match self.map_type {
            MapType::Labelled => LabelSpec::Label(value.round() as u32),
            MapType::Continuous => LabelSpec::Whole,
        };
        let region = self.table.region_for(volume, label);
        if region.is_none() {
            debug!("No region mapped for volume {} label {}", volume, label);
        }
        region
    }

    /// Records for every volume whose value at `index` exceeds the threshold
    fn read_voxel(&self, structure: usize, index: [i64; 3], rows: &mut Vec<AssignmentRecord>) {
        for (volume, image) in self.volumes.iter().enumerate() {
            let Some(value) = image.value_at(index) else {
                continue;
            };
            if (value as f64) <= self.options.lower_threshold {
                continue;
            }
            if let Some(region) = self.region_at(volume, value) {
                rows.push(AssignmentRecord {
                    structure,
                    volume,
                    region: region.to_string(),
                    value: value as f64,
                    correlation: None,
                    iou: None,
                    contains: None,
                    contained: None,
                });
            }
        }
    }

    fn assign_points(&self, points: &PointSet) -> MapResult<Vec<AssignmentRecord>> {
        let mut rows = Vec::new();
        let scaling = self.template.mean_voxel_size();
        let phys2vox = self.template.inverse()?;
        let cutoff = self.options.voxel_precision_cutoff;

        if let Some(sigma) = points.sigmas().first() {
            if points.has_constant_sigma() && sigma / scaling < cutoff {
                info!("Points have constant single-voxel precision, using direct multi-point lookup.");
                for (i, coordinate) in points.coordinates().iter().enumerate() {
                    self.read_voxel(i, phys2vox.transform_to_index(*coordinate), &mut rows);
                }
                return Ok(rows);
            }
        }

        for (i, point) in points.iter().enumerate() {
            let sigma_vox = point.sigma_mm / scaling;
            let anchor = phys2vox.transform_to_index(point.coordinate);
            if sigma_vox < cutoff {
                debug!("Assigning coordinate {:?} to {} volumes", point.coordinate, self.volumes.len());
                self.read_voxel(i, anchor, &mut rows);
                continue;
            }

            debug!(
                "Assigning uncertain coordinate {:?} (sigma {:.2} voxels) to {} volumes",
                point.coordinate,
                sigma_vox,
                self.volumes.len()
            );
            let kernel = gaussian_kernel(sigma_vox, self.options.kernel_sigma_points);
            let r = kernel_radius(&kernel) as i64;
            let origin = [anchor[0] - r, anchor[1] - r, anchor[2] - r];
            let Some(summary) = kernel_support(&kernel, origin, self.shape) else {
                debug!("Kernel of point {} lies outside the map grid", i);
                continue;
            };
            let extent = kernel.dim().0 as i64;
            let query = |p: [usize; 3]| {
                let q = [p[0] as i64 - origin[0], p[1] as i64 - origin[1], p[2] as i64 - origin[2]];
                if q.iter().all(|c| (0..extent).contains(c)) {
                    kernel[[q[0] as usize, q[1] as usize, q[2] as usize]]
                } else {
                    0.0
                }
            };
            self.score_structure(i, query, &summary, &mut rows);
        }
        Ok(rows)
    }

    /// Supports of every mapped region, computed on first use
    fn region_extents(&self) -> &[RegionExtent<'a>] {
        self.regions.get_or_init(|| self.collect_region_extents())
    }

    fn collect_region_extents(&self) -> Vec<RegionExtent<'a>> {
        let threshold = self.options.lower_threshold as f32;
        let mut extents = Vec::new();
        for (volume, image) in self.volumes.iter().enumerate() {
            let labels = self.table.labels_in_volume(volume);
            let wants_whole = labels.contains(&LabelSpec::Whole);
            let wants_labels = labels.iter().any(|l| matches!(l, LabelSpec::Label(_)));
            if !wants_whole && !wants_labels {
                continue;
            }

            let mut whole = None;
            let mut per_label: HashMap<u32, MaskSummary> = HashMap::new();
            for ((i, j, k), &v) in image.data.indexed_iter() {
                if v <= 0.0 {
                    continue;
                }
                if wants_whole && v > threshold {
                    grow(&mut whole, [i, j, k]);
                }
                if wants_labels && v.fract() == 0.0 {
                    per_label
                        .entry(v as u32)
                        .and_modify(|s| s.include([i, j, k]))
                        .or_insert_with(|| MaskSummary::voxel([i, j, k]));
                }
            }

            for label in labels {
                let Some(region) = self.table.region_for(volume, label) else {
                    continue;
                };
                let summary = match label {
                    LabelSpec::Whole => whole,
                    LabelSpec::Label(l) => per_label.get(&l).copied(),
                };
                match summary {
                    Some(summary) => extents.push(RegionExtent {
                        volume,
                        region,
                        label,
                        summary,
                    }),
                    None => debug!("Region '{}' has no voxels in volume {}", region, volume),
                }
            }
        }
        debug!("Summarised {} region mask(s)", extents.len());
        extents
    }

    /// Score one query structure, read through `query`, against every region
    fn score_structure<Q>(&self, structure: usize, query: Q, summary: &MaskSummary, rows: &mut Vec<AssignmentRecord>)
    where
        Q: Fn([usize; 3]) -> f32,
    {
        let threshold = self.options.lower_threshold as f32;
        for extent in self.region_extents() {
            let data = &self.volumes[extent.volume].data;
            let label = extent.label;
            let region = |p: [usize; 3]| {
                let v = data[p];
                let inside = match label {
                    LabelSpec::Label(l) => v == l as f32,
                    LabelSpec::Whole => v > threshold,
                };
                if inside {
                    v
                } else {
                    0.0
                }
            };
            if let Some(scores) = compare_supports(&query, summary, region, &extent.summary) {
                rows.push(AssignmentRecord {
                    structure,
                    volume: extent.volume,
                    region: extent.region.to_string(),
                    value: scores.value,
                    correlation: scores.correlation,
                    iou: Some(scores.iou),
                    contains: Some(scores.contains),
                    contained: Some(scores.contained),
                });
            }
        }
    }

    fn assign_image(&self, query: &Image) -> MapResult<(Vec<AssignmentRecord>, Image)> {
        let min_size_voxel = self.options.min_size_voxel;
        let aligned = resample_to_grid(query, &self.template, self.shape, Interpolation::for_image(query))?;
        let (labels, components) = label_components(&aligned.data);

        let mut rejected = vec![false; components.len() + 1];
        let mut rows = Vec::new();
        for component in &components {
            if component.size < min_size_voxel {
                debug!(
                    "Skipping component {} of {} voxels (minimum {})",
                    component.label, component.size, min_size_voxel
                );
                rejected[component.label as usize] = true;
                continue;
            }
            let target = component.label;
            let summary = MaskSummary {
                count: component.size,
                lower: component.lower,
                upper: component.upper,
            };
            let voxel = |p: [usize; 3]| if labels[p] == target { aligned.data[p] } else { 0.0 };
            self.score_structure(target as usize, voxel, &summary, &mut rows);
        }
        debug!(
            "Scored {} of {} query component(s)",
            rejected.iter().skip(1).filter(|r| !**r).count(),
            components.len()
        );

        let component_image = labels.mapv(|l| if rejected[l as usize] { 0.0 } else { l as f32 });
        Ok((rows, Image::new(component_image, self.template, DataType::Uint32)))
    }
}
