// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region name to map index table.
//!
//! A [`RegionIndexTable`] is built once from a declarative description
//! (region name -> list of [`IndexSpec`]) and is immutable afterwards. Region
//! names are resolved through a [`RegionLookup`]; the table only consumes the
//! resolved names.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use voxatlas_structures::{LabelSpec, MapIndex, MapType};

use crate::error::{MapError, MapResult};

/// One entry of a declarative map description.
///
/// `volume` defaults to 0, a missing `label` addresses the whole volume, and
/// `z` selects a frame of a 4D volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    #[serde(default)]
    pub volume: usize,
    #[serde(default)]
    pub label: Option<u32>,
    #[serde(default)]
    pub z: Option<usize>,
    #[serde(default)]
    pub fragment: Option<String>,
}

impl IndexSpec {
    pub fn labelled(volume: usize, label: u32) -> Self {
        Self {
            volume,
            label: Some(label),
            ..Default::default()
        }
    }

    pub fn whole(volume: usize) -> Self {
        Self {
            volume,
            ..Default::default()
        }
    }

    pub fn with_z(mut self, z: usize) -> Self {
        self.z = Some(z);
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

/// Resolves a free-form region specification to the names known to a map
pub trait RegionLookup: Send + Sync + fmt::Debug {
    fn resolve(&self, spec: &str, known: &[&str]) -> Vec<String>;
}

/// Whitespace-normalised, case-insensitive name matching.
///
/// An exact (normalised) match wins; otherwise every known name containing
/// the specification is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMatch;

/// Collapse runs of whitespace and lowercase
pub fn clear_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl RegionLookup for NameMatch {
    fn resolve(&self, spec: &str, known: &[&str]) -> Vec<String> {
        let wanted = clear_name(spec);
        if wanted.is_empty() {
            return Vec::new();
        }
        if let Some(exact) = known.iter().find(|k| clear_name(k) == wanted) {
            return vec![exact.to_string()];
        }
        known
            .iter()
            .filter(|k| clear_name(k).contains(&wanted))
            .map(|k| k.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionIndexTable {
    /// Insertion-ordered region entries
    entries: Vec<(String, Vec<MapIndex>)>,
}

impl RegionIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, warning about indices that appear more than once
    pub fn from_entries(entries: Vec<(String, Vec<MapIndex>)>) -> Self {
        let table = Self { entries };
        let duplicates = table.duplicates();
        if !duplicates.is_empty() {
            warn!("Non unique indices encountered in region table: {:?}", duplicates);
        }
        table
    }

    /// Indices used by more than one entry (or twice by the same one)
    pub fn duplicates(&self) -> Vec<MapIndex> {
        let mut seen = HashSet::new();
        let mut duplicates = BTreeSet::new();
        for index in self.iter().map(|(_, i)| i) {
            if !seen.insert(index) {
                duplicates.insert(index.clone());
            }
        }
        duplicates.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MapIndex)> {
        self.entries
            .iter()
            .flat_map(|(region, indices)| indices.iter().map(move |i| (region.as_str(), i)))
    }

    pub fn regions(&self) -> Vec<&str> {
        self.entries.iter().map(|(r, _)| r.as_str()).collect()
    }

    pub fn indices(&self, region: &str) -> Option<&[MapIndex]> {
        self.entries
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, i)| i.as_slice())
    }

    pub fn num_regions(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set of all labels, `Whole` included if any index addresses a whole volume
    pub fn labels(&self) -> BTreeSet<LabelSpec> {
        self.iter().map(|(_, i)| i.label).collect()
    }

    pub fn maptype(&self) -> MapResult<MapType> {
        let labels = self.labels();
        if labels.iter().all(|l| !l.is_whole()) {
            Ok(MapType::Labelled)
        } else if labels.iter().all(|l| l.is_whole()) {
            Ok(MapType::Continuous)
        } else {
            Err(MapError::InconsistentLabels)
        }
    }

    /// All indices whose region matches `spec`, paired with the region name.
    ///
    /// Exact region names are used directly; anything else goes through
    /// `lookup`. No match is logged and yields an empty list.
    pub fn find_indices(&self, spec: &str, lookup: &dyn RegionLookup) -> Vec<(MapIndex, String)> {
        if let Some(indices) = self.indices(spec) {
            return indices.iter().map(|i| (i.clone(), spec.to_string())).collect();
        }
        let known = self.regions();
        let matched: HashSet<String> = lookup.resolve(spec, &known).into_iter().collect();
        if matched.is_empty() {
            warn!("Region '{}' not defined in region table", spec);
        }
        self.iter()
            .filter(|(region, _)| matched.contains(*region))
            .map(|(region, index)| (index.clone(), region.to_string()))
            .collect()
    }

    /// The single index matching `spec`; ambiguity is an error, no match is `None`
    pub fn get_index(&self, spec: &str, lookup: &dyn RegionLookup) -> MapResult<Option<MapIndex>> {
        let mut matches = self.find_indices(spec, lookup);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop().map(|(index, _)| index)),
            _ => Err(MapError::AmbiguousSpecification {
                spec: spec.to_string(),
                candidates: matches
                    .iter()
                    .map(|(index, region)| format!("{} {}", region, index))
                    .collect(),
            }),
        }
    }

    /// Region mapped by `index`
    pub fn get_region(&self, index: &MapIndex) -> Option<&str> {
        let found = self.iter().find(|(_, i)| *i == index).map(|(r, _)| r);
        if found.is_none() {
            warn!("Index {} not defined in region table", index);
        }
        found
    }

    /// Region mapped by `(volume, label)` regardless of fragment
    pub fn region_for(&self, volume: usize, label: LabelSpec) -> Option<&str> {
        self.iter()
            .find(|(_, i)| i.volume == volume && i.label == label)
            .map(|(r, _)| r)
    }

    /// Distinct labels mapped in `volume`, sorted
    pub fn labels_in_volume(&self, volume: usize) -> Vec<LabelSpec> {
        let labels: BTreeSet<LabelSpec> = self
            .iter()
            .filter(|(_, i)| i.volume == volume)
            .map(|(_, i)| i.label)
            .collect();
        labels.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RegionIndexTable {
        RegionIndexTable::from_entries(vec![
            ("Area hOc1 left".into(), vec![MapIndex::labelled(0, 1)]),
            ("Area hOc1 right".into(), vec![MapIndex::labelled(0, 2)]),
            ("Area 44".into(), vec![MapIndex::labelled(0, 3).with_fragment("left")]),
        ])
    }

    #[test]
    fn test_maptype_scenario() {
        let mut entries = vec![
            ("A".to_string(), vec![MapIndex::labelled(0, 1)]),
            ("B".to_string(), vec![MapIndex::labelled(0, 2)]),
        ];
        assert_eq!(RegionIndexTable::from_entries(entries.clone()).maptype().unwrap(), MapType::Labelled);

        entries.push(("C".to_string(), vec![MapIndex::whole(0)]));
        assert!(matches!(
            RegionIndexTable::from_entries(entries).maptype(),
            Err(MapError::InconsistentLabels)
        ));

        let continuous = RegionIndexTable::from_entries(vec![
            ("A".into(), vec![MapIndex::whole(0)]),
            ("B".into(), vec![MapIndex::whole(1)]),
        ]);
        assert_eq!(continuous.maptype().unwrap(), MapType::Continuous);
    }

    #[test]
    fn test_find_and_get_index() {
        let table = table();
        assert_eq!(table.find_indices("hoc1", &NameMatch).len(), 2);
        assert_eq!(
            table.get_index("area  HOC1 left", &NameMatch).unwrap(),
            Some(MapIndex::labelled(0, 1))
        );
        assert!(matches!(
            table.get_index("hOc1", &NameMatch),
            Err(MapError::AmbiguousSpecification { candidates, .. }) if candidates.len() == 2
        ));
        assert_eq!(table.get_index("hOc5", &NameMatch).unwrap(), None);
    }

    #[test]
    fn test_reverse_lookup_ignores_fragment_only_in_region_for() {
        let table = table();
        assert_eq!(table.region_for(0, LabelSpec::Label(3)), Some("Area 44"));
        assert_eq!(table.get_region(&MapIndex::labelled(0, 3)), None);
        assert_eq!(
            table.get_region(&MapIndex::labelled(0, 3).with_fragment("left")),
            Some("Area 44")
        );
    }

    #[test]
    fn test_duplicates_detected() {
        let table = RegionIndexTable::from_entries(vec![
            ("A".into(), vec![MapIndex::labelled(0, 1)]),
            ("B".into(), vec![MapIndex::labelled(0, 1), MapIndex::labelled(0, 2)]),
        ]);
        assert_eq!(table.duplicates(), vec![MapIndex::labelled(0, 1)]);
        assert_eq!(table.labels_in_volume(0), vec![LabelSpec::Label(1), LabelSpec::Label(2)]);
    }

    #[test]
    fn test_index_spec_defaults_from_json() {
        let spec: IndexSpec = serde_json::from_str(r#"{"label": 4}"#).unwrap();
        assert_eq!(spec, IndexSpec::labelled(0, 4));
        let spec: IndexSpec = serde_json::from_str(r#"{"volume": 2, "z": 1}"#).unwrap();
        assert_eq!(spec, IndexSpec::whole(2).with_z(1));
    }
}
