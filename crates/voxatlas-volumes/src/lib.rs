// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # voxatlas-volumes
//!
//! Multi-resolution chunked volume access.
//!
//! - [`ScaleCatalog`]: ordered resolution levels of one volume
//! - [`ScaleSelector`]: budget-aware choice of a level for a fetch
//! - [`ChunkedVolumeFetcher`]: chunk-grid assembly with optional [`ChunkCache`]
//! - [`VolumeProvider`]: the contract consumed by parcellation maps, implemented
//!   by [`PrecomputedVolume`], [`InMemoryVolume`], [`Subvolume`] and [`FragmentedVolume`]
//!
//! Remote data is retrieved through a [`ByteSource`]; HTTP, file system and
//! in-memory sources are provided.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod byte_source;
pub mod chunk_cache;
pub mod codec;
pub mod error;
pub mod fetcher;
pub mod precomputed;
pub mod provider;
pub mod scale;
pub mod selector;

pub use byte_source::{source_for_url, ByteSource, FileByteSource, HttpByteSource, MemoryByteSource};
pub use chunk_cache::ChunkCache;
pub use error::{VolumeError, VolumeResult};
pub use fetcher::ChunkedVolumeFetcher;
pub use precomputed::PrecomputedVolume;
pub use provider::{FragmentedVolume, InMemoryVolume, Subvolume, VolumeProvider};
pub use scale::{PrecomputedInfo, Scale, ScaleCatalog, ScaleInfo};
pub use selector::ScaleSelector;
