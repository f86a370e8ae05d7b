//! Geoset visibility: which alternative submeshes end up in the draw buffer.
//!
//! A geoset id packs `group * 100 + variant`. Submeshes of one group are
//! alternatives (hair styles, boots, capes), so a sensible visible set holds
//! at most one variant per group. [`select_visible`] takes the caller's set at
//! face value; [`select_by_group`] makes the one-per-group rule structural.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::{
    config::LoaderConfig,
    model::{IndexRange, Submesh},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GeosetId {
    pub group: u16,
    pub variant: u16,
}

impl GeosetId {
    pub fn new(group: u16, variant: u16) -> Self {
        Self { group, variant }
    }

    pub fn id(&self) -> u32 {
        self.group as u32 * 100 + self.variant as u32
    }
}

impl From<u32> for GeosetId {
    fn from(id: u32) -> Self {
        Self {
            group: (id / 100) as u16,
            variant: (id % 100) as u16,
        }
    }
}

impl From<&Submesh> for GeosetId {
    fn from(submesh: &Submesh) -> Self {
        Self::from(submesh.id as u32)
    }
}

/// Index ranges of every submesh whose id is in `enabled_ids`, in declaration
/// order. Duplicated ids contribute one range per submesh.
pub fn select_visible(submeshes: &[Submesh], enabled_ids: &HashSet<u32>) -> Vec<IndexRange> {
    submeshes
        .iter()
        .filter(|s| enabled_ids.contains(&(s.id as u32)))
        .map(Submesh::index_range)
        .collect()
}

/// Like [`select_visible`], but driven by a `group -> variant` map so two
/// variants of one group can never be enabled together.
pub fn select_by_group(submeshes: &[Submesh], variants: &BTreeMap<u16, u16>) -> Vec<IndexRange> {
    submeshes
        .iter()
        .filter(|s| variants.get(&s.group()) == Some(&s.variant()))
        .map(Submesh::index_range)
        .collect()
}

/// Concatenates the selected ranges of `indices` into one draw list. Ranges
/// running past the end are cut short.
pub fn build_draw_indices(indices: &[u32], ranges: &[IndexRange]) -> Vec<u32> {
    let mut draw = Vec::with_capacity(total_index_count(ranges));
    for range in ranges {
        let start = (range.start as usize).min(indices.len());
        let end = (range.end() as usize).min(indices.len());
        draw.extend_from_slice(&indices[start..end]);
    }
    draw
}

pub fn total_index_count(ranges: &[IndexRange]) -> usize {
    ranges.iter().map(|r| r.count as usize).sum()
}

/// Geoset ids shown before the user picks anything, following the config's
/// default visibility table.
pub fn default_visible_ids(submeshes: &[Submesh], config: &LoaderConfig) -> HashSet<u32> {
    submeshes
        .iter()
        .filter(|s| config.is_default_visible(s.group(), s.variant()))
        .map(|s| s.id as u32)
        .collect()
}

/// Every group present in the model with its sorted variants.
pub fn group_variants(submeshes: &[Submesh]) -> BTreeMap<u16, Vec<u16>> {
    let mut groups: BTreeMap<u16, BTreeSet<u16>> = BTreeMap::new();
    for submesh in submeshes {
        groups.entry(submesh.group()).or_default().insert(submesh.variant());
    }
    groups
        .into_iter()
        .map(|(group, variants)| (group, variants.into_iter().collect()))
        .collect()
}

pub fn group_name(group: u16) -> Option<&'static str> {
    Some(match group {
        0 => "Body",
        1 => "Hair",
        2 => "Facial 1",
        3 => "Facial 2",
        4 => "Bracers",
        5 => "Boots",
        7 => "Ears",
        8 => "Sleeves",
        9 => "Kneepads",
        10 => "Chest",
        11 => "Pants",
        12 => "Tabard",
        13 => "Legs",
        14 => "Cloak",
        15 => "Cape",
        16 => "Loincloth",
        17 => "Eyeglow",
        18 => "Belt",
        _ => return None,
    })
}
