// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Locating and reading `voxatlas_configuration.toml`
//!
//! Values are layered: file first, then `VOXATLAS_*` environment variables,
//! then dotted `section.key` overrides from the command line.

use crate::{validate_config, ConfigError, ConfigResult, VoxatlasConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

const CONFIG_FILE_NAME: &str = "voxatlas_configuration.toml";

/// Directories above the working directory that are searched
const PARENT_SEARCH_DEPTH: usize = 5;

/// Path of the configuration file.
///
/// `VOXATLAS_CONFIG_PATH` wins when set and must exist. Otherwise the working
/// directory and its nearest parents are searched.
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(explicit) = env::var("VOXATLAS_CONFIG_PATH") {
        let path = PathBuf::from(explicit);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::FileNotFound(format!(
                "VOXATLAS_CONFIG_PATH points to a missing file: {}",
                path.display()
            )))
        };
    }

    let candidates: Vec<PathBuf> = env::current_dir()
        .map(|cwd| {
            cwd.ancestors()
                .take(PARENT_SEARCH_DEPTH + 1)
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .collect()
        })
        .unwrap_or_default();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let searched: String = candidates
        .iter()
        .map(|path| format!("\n  {}", path.display()))
        .collect();
    Err(ConfigError::FileNotFound(format!(
        "no {} found; searched:{}\nset VOXATLAS_CONFIG_PATH to use another location",
        CONFIG_FILE_NAME, searched
    )))
}

/// Read, override and validate the configuration.
///
/// `config_path` skips the search of [`find_config_file`]. `cli_args` maps
/// dotted keys such as `fetch.max_gib` to their new values.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<VoxatlasConfig> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let mut config: VoxatlasConfig = toml::from_str(&fs::read_to_string(&path)?)?;
    apply_environment_overrides(&mut config);
    if let Some(overrides) = cli_args {
        apply_cli_overrides(&mut config, overrides);
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_into<T: FromStr>(target: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *target = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Set one setting by dotted key (`fetch.max_gib`, `assignment.min_size_voxel`, ...).
///
/// Returns `false` for unknown keys and for values that do not parse; the
/// configuration is left unchanged in that case.
pub fn set_value(config: &mut VoxatlasConfig, key: &str, value: &str) -> bool {
    match key {
        "fetch.max_gib" => parse_into(&mut config.fetch.max_gib, value),
        "fetch.use_cache" => {
            config.fetch.use_cache = parse_flag(value);
            true
        }
        "fetch.cache_dir" => parse_into(&mut config.fetch.cache_dir, value),
        "fetch.http_timeout_secs" => parse_into(&mut config.fetch.http_timeout_secs, value),
        "assignment.min_size_voxel" => parse_into(&mut config.assignment.min_size_voxel, value),
        "assignment.lower_threshold" => parse_into(&mut config.assignment.lower_threshold, value),
        "assignment.voxel_precision_cutoff" => parse_into(&mut config.assignment.voxel_precision_cutoff, value),
        "assignment.kernel_sigma_points" => parse_into(&mut config.assignment.kernel_sigma_points, value),
        "logging.level" => parse_into(&mut config.logging.level, value),
        "logging.log_dir" => parse_into(&mut config.logging.log_dir, value),
        "logging.retention_days" => parse_into(&mut config.logging.retention_days, value),
        "logging.retention_runs" => parse_into(&mut config.logging.retention_runs, value),
        _ => false,
    }
}

/// Environment variable -> dotted key
pub const ENVIRONMENT_KEYS: &[(&str, &str)] = &[
    ("VOXATLAS_MAX_GIB", "fetch.max_gib"),
    ("VOXATLAS_USE_CACHE", "fetch.use_cache"),
    ("VOXATLAS_CACHE_DIR", "fetch.cache_dir"),
    ("VOXATLAS_HTTP_TIMEOUT_SECS", "fetch.http_timeout_secs"),
    ("VOXATLAS_LOG_LEVEL", "logging.level"),
];

/// Apply the variables of [`ENVIRONMENT_KEYS`] that are set.
///
/// Returns the variables whose value was rejected.
pub fn apply_environment_overrides(config: &mut VoxatlasConfig) -> Vec<String> {
    let mut rejected = Vec::new();
    for (variable, key) in ENVIRONMENT_KEYS {
        let Ok(value) = env::var(variable) else {
            continue;
        };
        if !set_value(config, key, &value) {
            warn!("Ignoring {}={:?}: not a valid value for {}", variable, value, key);
            rejected.push(variable.to_string());
        }
    }
    rejected
}

/// Apply CLI overrides given as dotted keys
/// (e.g. `{"fetch.max_gib": "1.5", "assignment.lower_threshold": "0.2"}`).
///
/// Returns the keys that are unknown or whose value was rejected.
pub fn apply_cli_overrides(config: &mut VoxatlasConfig, cli_args: &HashMap<String, String>) -> Vec<String> {
    let mut rejected = Vec::new();
    for (key, value) in cli_args {
        if !set_value(config, key, value) {
            warn!("Ignoring override {}={:?}: unknown key or invalid value", key, value);
            rejected.push(key.clone());
        }
    }
    rejected.sort();
    rejected
}
