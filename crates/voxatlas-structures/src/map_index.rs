// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Addressing of structures inside a parcellation map

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which voxels of a volume belong to a structure.
///
/// `Whole` addresses the entire volume (continuous / probability maps),
/// `Label(n)` the voxels whose value equals `n` (labelled maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabelSpec {
    Whole,
    Label(u32),
}

impl LabelSpec {
    pub fn label(&self) -> Option<u32> {
        match self {
            LabelSpec::Whole => None,
            LabelSpec::Label(l) => Some(*l),
        }
    }

    pub fn is_whole(&self) -> bool {
        matches!(self, LabelSpec::Whole)
    }
}

impl From<Option<u32>> for LabelSpec {
    fn from(label: Option<u32>) -> Self {
        match label {
            Some(l) => LabelSpec::Label(l),
            None => LabelSpec::Whole,
        }
    }
}

impl fmt::Display for LabelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSpec::Whole => write!(f, "*"),
            LabelSpec::Label(l) => write!(f, "{}", l),
        }
    }
}

/// `(volume, label, fragment)` triple identifying one structure in a map
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapIndex {
    pub volume: usize,
    pub label: LabelSpec,
    pub fragment: Option<String>,
}

impl MapIndex {
    pub fn new(volume: usize, label: LabelSpec) -> Self {
        Self {
            volume,
            label,
            fragment: None,
        }
    }

    pub fn labelled(volume: usize, label: u32) -> Self {
        Self::new(volume, LabelSpec::Label(label))
    }

    pub fn whole(volume: usize) -> Self {
        Self::new(volume, LabelSpec::Whole)
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

impl fmt::Display for MapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(frag) => write!(f, "(volume={}, label={}, fragment={})", self.volume, self.label, frag),
            None => write!(f, "(volume={}, label={})", self.volume, self.label),
        }
    }
}

/// Kind of parcellation map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapType {
    /// Regions are discrete integer labels
    Labelled,
    /// Regions are probability / intensity volumes
    Continuous,
}
