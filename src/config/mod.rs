use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::reader::DEFAULT_MAX_ARRAY_COUNT;

pub const DEFAULT_MAX_ATTACHMENT_OFFSET: f32 = 100.0;

/// Parse-time limits and viewer defaults.
///
/// Every field has a default, so an empty JSON object (`{}`) is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Upper bound on any array descriptor's element count.
    pub max_array_count: usize,
    /// Attachments whose local offset is longer than this are dropped.
    pub max_attachment_offset: f32,
    /// Which skin profile supplies the index buffer and submesh table.
    pub skin_profile: usize,
    /// Geoset group -> variants shown by default. `None` shows every variant.
    pub default_visible: BTreeMap<u16, Option<Vec<u16>>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let mut default_visible = BTreeMap::new();
        for group in [0, 2, 3, 7] {
            default_visible.insert(group, None);
        }
        for group in [4, 5, 13, 15] {
            default_visible.insert(group, Some(vec![1]));
        }

        Self {
            max_array_count: DEFAULT_MAX_ARRAY_COUNT,
            max_attachment_offset: DEFAULT_MAX_ATTACHMENT_OFFSET,
            skin_profile: 0,
            default_visible,
        }
    }
}

impl LoaderConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid loader config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read loader config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Whether `variant` of `group` is shown before the user picks anything.
    pub fn is_default_visible(&self, group: u16, variant: u16) -> bool {
        match self.default_visible.get(&group) {
            Some(None) => true,
            Some(Some(variants)) => variants.contains(&variant),
            None => false,
        }
    }
}
