// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error handling for volume access.
*/

use thiserror::Error;
use voxatlas_structures::StructureError;

/// Result type for volume operations
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Error types for volume operations
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// The byte source could not deliver the requested URL
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// No scale satisfies the byte budget
    #[error(
        "Fetch is infeasible relative to the limit of {budget_bytes} bytes; \
         coarsest available resolution is {closest_resolution_mm:?} mm"
    )]
    InfeasibleResolution {
        budget_bytes: u64,
        closest_resolution_mm: [f64; 3],
    },

    #[error("Unsupported chunk encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Invalid volume info: {0}")]
    InvalidInfo(String),

    #[error("Chunk decode error: {0}")]
    Decode(String),

    #[error("Chunk cache error: {0}")]
    Cache(String),

    #[error("Frame {frame} requested, but volume provides {frames} frame(s)")]
    FrameOutOfRange { frame: usize, frames: usize },

    #[error("Unknown fragment '{fragment}', available: {available:?}")]
    UnknownFragment {
        fragment: String,
        available: Vec<String>,
    },

    /// The requested region lies entirely outside the volume
    #[error("Region of interest does not overlap the volume: {0}")]
    OutOfBounds(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for VolumeError {
    fn from(err: std::io::Error) -> Self {
        VolumeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::InvalidInfo(err.to_string())
    }
}
