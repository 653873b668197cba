// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # voxatlas-maps
//!
//! Parcellation maps and spatial-to-region assignment.
//!
//! - [`RegionIndexTable`]: region name to `(volume, label, fragment)` indices
//! - [`ParcellationMap`]: fetch, compress, centroids, colorize, sampling
//! - [`MaskAssignmentEngine`]: overlap scoring of points, point sets and images
//!   against region masks, producing an [`AssignmentTable`]

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod assignment;
pub mod components;
pub mod error;
pub mod kernel;
pub mod parcellation_map;
pub mod region_index;
pub mod sampling;
pub mod scoring;

pub use assignment::{
    AssignOptions, AssignmentRecord, AssignmentTable, MaskAssignmentEngine, ScoreAgainstMasks, SpatialQuery,
};
pub use error::{MapError, MapResult};
pub use parcellation_map::{FetchRequest, ParcellationMap};
pub use region_index::{clear_name, IndexSpec, NameMatch, RegionIndexTable, RegionLookup};
pub use scoring::OverlapScores;
