// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # voxatlas-config
//!
//! Settings for volume retrieval, region assignment and logging, read from
//! `voxatlas_configuration.toml` and overridden by `VOXATLAS_*` environment
//! variables, then by dotted CLI keys.
//!
//! ```toml
//! [fetch]
//! max_gib = 0.5          # largest single fetch
//! use_cache = true
//!
//! [assignment]
//! min_size_voxel = 4
//! ```
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use voxatlas_config::load_config;
//!
//! let cli = HashMap::from([("fetch.max_gib".to_string(), "1.0".to_string())]);
//! let config = load_config(None, Some(&cli)).expect("Failed to load config");
//! assert_eq!(config.fetch.byte_budget(), 1 << 30);
//! ```
//!
//! Every section carries defaults, so an empty file (or
//! [`VoxatlasConfig::default`]) is a complete configuration.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config, set_value, ENVIRONMENT_KEYS,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

pub use serde;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    FileNotFound(String),

    #[error("Cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed voxatlas_configuration.toml: {0}")]
    ParseError(String),

    #[error("{0}")]
    ValidationError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
