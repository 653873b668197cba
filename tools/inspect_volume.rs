// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Precomputed Volume Inspector

Prints the scale catalog of a precomputed volume and the scale that would be
selected for a requested resolution, region of interest and byte budget.

Usage:
  cargo run --bin inspect_volume -- <url> [--resolution <mm>] [--bbox x0,y0,z0,x1,y1,z1] [--max-gib <gib>] [--fetch]

Example:
  cargo run --bin inspect_volume -- file:///data/bigbrain --resolution 0.32 --debug volumes
*/

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use voxatlas::config::{load_config, VoxatlasConfig};
use voxatlas::observability::{init_logging, CrateDebugFlags, LoggingOptions};
use voxatlas::prelude::*;

/// Inspect a neuroglancer precomputed volume
#[derive(Parser, Debug)]
#[command(name = "inspect_volume", version, long_about = None)]
struct Args {
    /// Volume URL (http(s)://, file:// or a local directory)
    url: String,

    /// Requested resolution in mm (negative = finest available)
    #[arg(short, long, allow_hyphen_values = true)]
    resolution: Option<f64>,

    /// Region of interest in mm: x0,y0,z0,x1,y1,z1
    #[arg(long)]
    bbox: Option<String>,

    /// Override the fetch byte budget (GiB)
    #[arg(long)]
    max_gib: Option<f64>,

    /// Path to voxatlas_configuration.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fetch the selected region and print value statistics
    #[arg(long, default_value_t = false)]
    fetch: bool,

    /// Enable debug logging for a crate (repeatable, or "all")
    #[arg(long = "debug", value_name = "CRATE")]
    debug: Vec<String>,
}

fn parse_bbox(spec: &str) -> Result<BoundingBox> {
    let values = spec
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bounding box '{}'", spec))?;
    if values.len() != 6 {
        return Err(anyhow!("bounding box needs 6 values, got {}", values.len()));
    }
    Ok(BoundingBox::new(
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        None,
    ))
}

fn load_configuration(args: &Args) -> Result<VoxatlasConfig> {
    let mut overrides = HashMap::new();
    if let Some(gib) = args.max_gib {
        overrides.insert("fetch.max_gib".to_string(), gib.to_string());
    }
    match &args.config {
        Some(path) => Ok(load_config(Some(path.as_path()), Some(&overrides))?),
        None => match load_config(None, Some(&overrides)) {
            Ok(config) => Ok(config),
            Err(e) => {
                let mut config = VoxatlasConfig::default();
                let mut rejected = voxatlas::config::apply_environment_overrides(&mut config);
                rejected.extend(voxatlas::config::apply_cli_overrides(&mut config, &overrides));
                voxatlas::config::validate_config(&config)?;
                eprintln!("No configuration loaded ({}), using defaults", e);
                for key in rejected {
                    eprintln!("Ignored invalid setting {}", key);
                }
                Ok(config)
            }
        },
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_configuration(&args)?;

    let mut flags = CrateDebugFlags::default();
    for name in &args.debug {
        flags.enable(name);
    }
    let _guard = init_logging(
        &flags,
        &LoggingOptions {
            level: config.logging.level.clone(),
            log_dir: config.logging.log_dir.clone(),
            retention_days: config.logging.retention_days,
            retention_runs: config.logging.retention_runs,
        },
    )?;

    for name in flags.unknown() {
        warn!("Ignoring --debug {}: not a voxatlas crate", name);
    }

    let url = args.url.clone();
    let volume = PrecomputedVolume::from_config(url.as_str(), &config.fetch)?;
    let bbox = args.bbox.as_deref().map(parse_bbox).transpose()?;

    info!("Inspecting {}", url);
    println!("Volume:   {}", url);
    println!("Type:     {:?} ({:?})", volume.map_type()?, volume.dtype()?);
    println!("Channels: {}", volume.num_frames()?);
    println!("Budget:   {} bytes", config.fetch.byte_budget());
    println!();
    println!("{:<10} {:>24} {:>20} {:>16} {:>14}", "key", "resolution (mm)", "size", "chunk", "est. bytes");
    let item_size = volume.dtype()?.item_size();
    for scale in volume.scales()? {
        let estimate = scale.estimate_nbytes(bbox.as_ref(), item_size)?;
        let r = scale.resolution_mm();
        println!(
            "{:<10} {:>24} {:>20} {:>16} {:>14.0}",
            scale.key,
            format!("{:.4}x{:.4}x{:.4}", r[0], r[1], r[2]),
            format!("{}x{}x{}", scale.size[0], scale.size[1], scale.size[2]),
            format!("{}x{}x{}", scale.chunk_size[0], scale.chunk_size[1], scale.chunk_size[2]),
            estimate
        );
    }
    println!();

    match volume.select_scale(args.resolution, bbox.as_ref()) {
        Ok(scale) => println!("Selected scale: {} ({:?} mm)", scale.key, scale.resolution_mm()),
        Err(e) => {
            warn!("Scale selection failed: {}", e);
            return Err(e.into());
        }
    }

    if args.fetch {
        let image = volume.fetch(args.resolution, bbox.as_ref())?;
        let (min, max) = image
            .data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        println!(
            "Fetched {:?} voxels (z, y, x): min {} max {} nonzero {}",
            image.shape(),
            min,
            max,
            image.count_nonzero()
        );
    }
    Ok(())
}
