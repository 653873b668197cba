//! # voxatlas - Brain volume access and region assignment
//!
//! voxatlas maps between two representations of spatial brain data: large,
//! remotely hosted multi-resolution volumes, and anatomical regions defined by
//! label or probability masks.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! voxatlas = "0.1"
//! ```
//!
//! ## Usage Examples
//!
//! ### Fetch a remote volume under a byte budget
//!
//! ```rust,no_run
//! use voxatlas::prelude::*;
//!
//! let config = voxatlas::config::load_config(None, None)?;
//! let volume = PrecomputedVolume::from_config("https://data.example.org/bigbrain", &config.fetch)?;
//!
//! // coarsest scale that still resolves 0.5 mm and fits the budget
//! let bbox = BoundingBox::new([-10.0, -10.0, -10.0], [10.0, 10.0, 10.0], None);
//! let image = volume.fetch(Some(0.5), Some(&bbox))?;
//! println!("{:?}", image.shape());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Assign a point to the regions of a labelled map
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voxatlas::prelude::*;
//!
//! let source: Arc<dyn ByteSource> = Arc::new(HttpByteSource::new(std::time::Duration::from_secs(30))?);
//! let volume: Arc<dyn VolumeProvider> =
//!     Arc::new(PrecomputedVolume::new("https://data.example.org/labels", source, ScaleSelector::new(200 << 20)));
//! let map = ParcellationMap::from_json(
//!     "julich",
//!     r#"{"Area hOc1 left": [{"label": 1}], "Area hOc1 right": [{"label": 2}]}"#,
//!     vec![volume],
//! )?;
//!
//! let table = map.assign(&Point::new([-8.0, -90.0, 2.0]).with_sigma(1.0), AssignOptions::default())?;
//! println!("{}", table.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: voxatlas-structures, voxatlas-config       │
//! │  (Affine, BoundingBox, Image, MapIndex; TOML config)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Infrastructure: voxatlas-observability                 │
//! │  (tracing subscriber, per-crate debug flags)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data access: voxatlas-volumes                          │
//! │  (scale selection, chunked fetch, chunk cache)          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: voxatlas-maps                              │
//! │  (region tables, compress, centroids, assignment)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use voxatlas_config as config;
pub use voxatlas_structures as structures;

// Re-export infrastructure
pub use voxatlas_observability as observability;

// Re-export data access and algorithms
pub use voxatlas_maps as maps;
pub use voxatlas_volumes as volumes;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::structures::{
        Affine, BoundingBox, DataType, Image, LabelSpec, MapIndex, MapType, Point, PointSet,
    };

    pub use crate::volumes::{
        ByteSource, ChunkCache, FileByteSource, HttpByteSource, InMemoryVolume, PrecomputedVolume, ScaleSelector,
        VolumeError, VolumeProvider,
    };

    pub use crate::maps::{
        AssignOptions, AssignmentTable, FetchRequest, IndexSpec, MapError, ParcellationMap, ScoreAgainstMasks,
        SpatialQuery,
    };
}
