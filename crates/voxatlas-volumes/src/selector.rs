// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byte-budgeted scale selection

use tracing::{debug, warn};
use voxatlas_config::FetchConfig;
use voxatlas_structures::BoundingBox;

use crate::error::{VolumeError, VolumeResult};
use crate::scale::{Scale, ScaleCatalog};

/// Picks the scale used for a fetch.
///
/// - `resolution_mm == None`: every scale is a candidate.
/// - negative: the finest scale only.
/// - otherwise: scales that resolve the request on every axis.
///
/// The coarsest candidate wins; without candidates the finest scale is used
/// and a degraded-resolution warning is emitted. The choice then moves to
/// coarser scales until the estimated fetch fits the byte budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSelector {
    byte_budget: u64,
}

impl ScaleSelector {
    pub fn new(byte_budget: u64) -> Self {
        Self { byte_budget }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.byte_budget())
    }

    pub fn byte_budget(&self) -> u64 {
        self.byte_budget
    }

    /// Select a scale for `bbox` (physical space) at `resolution_mm`.
    ///
    /// # Errors
    /// `VolumeError::InfeasibleResolution` if even the coarsest scale exceeds
    /// the budget.
    pub fn select<'a>(
        &self,
        catalog: &'a ScaleCatalog,
        resolution_mm: Option<f64>,
        bbox: Option<&BoundingBox>,
    ) -> VolumeResult<&'a Scale> {
        let scales = catalog.scales();
        let mut index = match resolution_mm {
            None => scales.len() - 1,
            Some(r) if r < 0.0 => 0,
            Some(r) => match scales.iter().rposition(|s| s.resolves(r)) {
                Some(i) => i,
                None => {
                    warn!(
                        "Requested resolution {} mm is not available. Falling back to the highest possible resolution of {:?} mm.",
                        r,
                        catalog.finest().resolution_mm()
                    );
                    0
                }
            },
        };

        let item_size = catalog.dtype().item_size();
        let initial = index;
        loop {
            let estimate = scales[index].estimate_nbytes(bbox, item_size)?;
            debug!(
                "Approximate size for fetching scale '{}' ({:?} mm) is {:.0} bytes",
                scales[index].key,
                scales[index].resolution_mm(),
                estimate
            );
            if estimate <= self.byte_budget as f64 {
                break;
            }
            index += 1;
            if index >= scales.len() {
                return Err(VolumeError::InfeasibleResolution {
                    budget_bytes: self.byte_budget,
                    closest_resolution_mm: catalog.coarsest().resolution_mm(),
                });
            }
        }

        if index != initial {
            warn!(
                "Resolution was reduced to {:?} mm to provide a feasible volume size",
                scales[index].resolution_mm()
            );
        }
        Ok(&scales[index])
    }
}
