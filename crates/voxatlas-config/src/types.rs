// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `voxatlas_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Bytes per GiB
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VoxatlasConfig {
    pub fetch: FetchConfig,
    pub assignment: AssignmentConfig,
    pub logging: LoggingConfig,
}

/// Remote volume retrieval
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Largest image array fetched in one request, in GiB
    pub max_gib: f64,
    /// Keep fetched chunks in the local chunk cache
    pub use_cache: bool,
    /// Chunk cache directory; empty = platform cache directory
    pub cache_dir: PathBuf,
    pub http_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_gib: 0.2,
            use_cache: false,
            cache_dir: PathBuf::new(),
            http_timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    /// Byte budget derived from `max_gib`
    pub fn byte_budget(&self) -> u64 {
        (self.max_gib * GIB) as u64
    }

    /// Cache directory with the platform fallback applied:
    /// `$XDG_CACHE_HOME/voxatlas`, then `$HOME/.cache/voxatlas`, then `./.voxatlas_cache`
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if !self.cache_dir.as_os_str().is_empty() {
            return self.cache_dir.clone();
        }
        if let Ok(xdg) = env::var("XDG_CACHE_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join("voxatlas");
            }
        }
        if let Ok(home) = env::var("HOME") {
            if !home.is_empty() {
                return PathBuf::from(home).join(".cache").join("voxatlas");
            }
        }
        PathBuf::from(".voxatlas_cache")
    }
}

/// Region assignment defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Components of a query image smaller than this are ignored
    pub min_size_voxel: usize,
    /// Map values at or below this are not assigned
    pub lower_threshold: f64,
    /// Point uncertainty (in voxels) below which exact voxel lookup is used
    pub voxel_precision_cutoff: f64,
    /// Gaussian kernel half-width, in multiples of sigma
    pub kernel_sigma_points: f64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            min_size_voxel: 1,
            lower_threshold: 0.0,
            voxel_precision_cutoff: 3.0,
            kernel_sigma_points: 3.0,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the `EnvFilter` (trace, debug, info, warn, error)
    pub level: String,
    /// Base directory for log files (file logging only)
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_budget_from_gib() {
        let fetch = FetchConfig {
            max_gib: 0.5,
            ..Default::default()
        };
        assert_eq!(fetch.byte_budget(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_explicit_cache_dir_wins() {
        let fetch = FetchConfig {
            cache_dir: PathBuf::from("/tmp/chunks"),
            ..Default::default()
        };
        assert_eq!(fetch.resolved_cache_dir(), PathBuf::from("/tmp/chunks"));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: VoxatlasConfig = toml::from_str("[assignment]\nlower_threshold = 0.25\n").unwrap();
        assert_eq!(config.assignment.lower_threshold, 0.25);
        assert_eq!(config.assignment.voxel_precision_cutoff, 3.0);
        assert_eq!(config.logging.level, "info");
    }
}
