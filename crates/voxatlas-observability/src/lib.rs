// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # voxatlas-observability
//!
//! Unified logging setup for voxatlas crates with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation inside timestamped run folders

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known voxatlas crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "voxatlas",
    "voxatlas-structures",
    "voxatlas-config",
    "voxatlas-observability",
    "voxatlas-volumes",
    "voxatlas-maps",
];

/// Tracing target for a crate name (`voxatlas-maps` -> `voxatlas_maps`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
