// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error handling for parcellation maps.
*/

use thiserror::Error;
use voxatlas_structures::StructureError;
use voxatlas_volumes::VolumeError;

/// Result type for map operations
pub type MapResult<T> = Result<T, MapError>;

/// Error types for map operations
#[derive(Error, Debug)]
pub enum MapError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    /// A region or index specification matched more than one structure
    #[error("'{spec}' matches multiple structures: {candidates:?}")]
    AmbiguousSpecification { spec: String, candidates: Vec<String> },

    /// Labels are neither all integers nor all absent
    #[error("Map labels are inconsistent: integer labels are mixed with whole-volume indices")]
    InconsistentLabels,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Volume index {requested} out of range, map has {available} volume(s)")]
    VolumeOutOfRange { requested: usize, available: usize },

    #[error("Requested fragment '{requested}' conflicts with fragment '{indexed}' of the map index")]
    FragmentConflict { requested: String, indexed: String },

    #[error("Invalid map specification: {0}")]
    InvalidSpecification(String),
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::InvalidSpecification(err.to_string())
    }
}
