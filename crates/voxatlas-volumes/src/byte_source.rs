// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! "Fetch bytes by URL" collaborators used by every remote volume.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;
use voxatlas_config::FetchConfig;

use crate::error::{VolumeError, VolumeResult};

/// Minimal retrieval contract: fetch the bytes behind a URL or fail.
///
/// Failures are not retried; they surface at the call that triggered them.
pub trait ByteSource: Send + Sync + fmt::Debug {
    fn fetch_bytes(&self, url: &str) -> VolumeResult<Vec<u8>>;
}

/// Blocking HTTP(S) source
#[derive(Debug)]
pub struct HttpByteSource {
    client: reqwest::blocking::Client,
}

impl HttpByteSource {
    pub fn new(timeout: Duration) -> VolumeResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VolumeError::Fetch {
                url: String::new(),
                reason: format!("HTTP client init failed: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &FetchConfig) -> VolumeResult<Self> {
        Self::new(Duration::from_secs(config.http_timeout_secs))
    }
}

impl ByteSource for HttpByteSource {
    fn fetch_bytes(&self, url: &str) -> VolumeResult<Vec<u8>> {
        debug!("GET {}", url);
        let fail = |reason: String| VolumeError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP status {status}")));
        }
        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Local file system source for `file://` URLs and plain paths
#[derive(Debug, Default, Clone)]
pub struct FileByteSource;

impl FileByteSource {
    pub fn new() -> Self {
        Self
    }

    fn path_for(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

impl ByteSource for FileByteSource {
    fn fetch_bytes(&self, url: &str) -> VolumeResult<Vec<u8>> {
        let path = Self::path_for(url);
        std::fs::read(&path).map_err(|e| VolumeError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-process store keyed by full URL
#[derive(Debug, Default)]
pub struct MemoryByteSource {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    requests: AtomicUsize,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.entries.write().insert(url.into(), bytes);
    }

    /// Number of `fetch_bytes` calls served so far, including misses
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl ByteSource for MemoryByteSource {
    fn fetch_bytes(&self, url: &str) -> VolumeResult<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.entries
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| VolumeError::Fetch {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}

/// Pick a byte source for a URL: HTTP for `http(s)://`, the file system otherwise
pub fn source_for_url(url: &str, config: &FetchConfig) -> VolumeResult<Box<dyn ByteSource>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Box::new(HttpByteSource::from_config(config)?))
    } else {
        Ok(Box::new(FileByteSource::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_counts_requests() {
        let source = MemoryByteSource::new();
        source.insert("mem://vol/info", b"{}".to_vec());

        assert_eq!(source.fetch_bytes("mem://vol/info").unwrap(), b"{}".to_vec());
        assert!(matches!(
            source.fetch_bytes("mem://vol/missing"),
            Err(VolumeError::Fetch { .. })
        ));
        assert_eq!(source.request_count(), 2);
    }

    #[test]
    fn test_file_source_accepts_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info");
        std::fs::write(&path, b"abc").unwrap();

        let source = FileByteSource::new();
        let url = format!("file://{}", path.display());
        assert_eq!(source.fetch_bytes(&url).unwrap(), b"abc".to_vec());
        assert_eq!(source.fetch_bytes(path.to_str().unwrap()).unwrap(), b"abc".to_vec());
    }
}
