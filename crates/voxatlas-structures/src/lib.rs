// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # voxatlas-structures
//!
//! Core spatial data types shared by every voxatlas crate:
//!
//! - [`Affine`]: 4x4 voxel-to-physical coordinate transforms
//! - [`BoundingBox`]: axis-aligned regions of interest
//! - [`Image`]: a 3D voxel array paired with its affine
//! - [`MapIndex`], [`LabelSpec`], [`MapType`]: addressing structures inside a parcellation map
//! - [`Point`], [`PointSet`]: physical coordinates with positional uncertainty
//! - [`resample`]: nearest-neighbour and trilinear resampling onto a target grid

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod affine;
pub mod bounding_box;
pub mod error;
pub mod image;
pub mod map_index;
pub mod points;
pub mod resample;

pub use affine::Affine;
pub use bounding_box::BoundingBox;
pub use error::{StructureError, StructureResult};
pub use image::{DataType, Image};
pub use map_index::{LabelSpec, MapIndex, MapType};
pub use points::{Point, PointSet};
pub use resample::{resample_to_grid, Interpolation};
