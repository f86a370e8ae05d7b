use std::path::Path;

use anyhow::Context;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    config::LoaderConfig,
    error::Result,
    reader::BinaryReader,
};

pub mod attachment;
pub mod bone;
pub mod header;
pub mod sequence;
pub mod skin;
pub mod texture;
pub mod vertex;

pub use attachment::{parse_attachments, Attachment};
pub use bone::{hierarchy_order, parse_bones, Bone, Interpolation, TrackKind, TrackMeta};
pub use header::{parse_header, HeaderLayout, ModelHeader};
pub use sequence::{parse_global_sequences, parse_sequences, GlobalSequence, Sequence};
pub use skin::{parse_skin_sections, Batch, IndexRange, SkinProfile, Submesh};
pub use texture::{parse_materials, parse_textures, Material, Texture, TextureKind};
pub use vertex::{parse_vertices, Vertex};

/// A localized anomaly the parser recovered from by dropping one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    pub section: &'static str,
    pub index: usize,
    pub message: String,
}

impl ParseDiagnostic {
    pub(crate) fn warn(section: &'static str, index: usize, message: String) -> Self {
        warn!("dropping {} {}: {}", section, index, message);
        Self {
            section,
            index,
            message,
        }
    }
}

/// Alternate playback entry: which sequence to fall back to and how.
#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayableEntry {
    pub fallback: i16,
    pub flags: u16,
}

crate::reader::fixed_record! { PlayableEntry => 4 }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub header: ModelHeader,
    pub name: String,
    pub global_sequences: Vec<GlobalSequence>,
    pub sequences: Vec<Sequence>,
    pub sequence_lookup: Vec<i16>,
    pub playable_lookup: Vec<PlayableEntry>,
    pub bones: Vec<Bone>,
    pub key_bone_lookup: Vec<i16>,
    pub vertices: Vec<Vertex>,
    pub skin_profiles: Vec<SkinProfile>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
    pub bone_lookup: Vec<u16>,
    pub texture_lookup: Vec<u16>,
    pub attachments: Vec<Attachment>,
    pub attachment_lookup: Vec<i16>,
    /// Which entry of `skin_profiles` supplies the draw geometry.
    pub active_skin: usize,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Model {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::from_file_with_config(path, &LoaderConfig::default())
    }

    pub fn from_file_with_config(
        path: impl AsRef<Path>,
        config: &LoaderConfig,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path)
            .with_context(|| format!("failed to read model {}", path.display()))?;
        parse_model(&buf, config)
            .with_context(|| format!("failed to parse model {}", path.display()))
    }

    pub fn skin(&self) -> Option<&SkinProfile> {
        self.skin_profiles.get(self.active_skin)
    }

    /// Submeshes of the active skin profile, empty if the model has none.
    pub fn submeshes(&self) -> &[Submesh] {
        self.skin().map(|s| s.submeshes.as_slice()).unwrap_or(&[])
    }

    pub fn sequence_index(&self, id: u16, sub_id: u16) -> Option<usize> {
        self.sequences.iter().position(|s| s.id == id && s.sub_id == sub_id)
    }

    /// First sequence in storage order that plays clip `id`.
    pub fn first_variant(&self, id: u16) -> Option<usize> {
        self.sequences.iter().position(|s| s.id == id)
    }

    pub fn attachment(&self, id: u32) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.id == id)
    }

    pub fn root_bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones.iter().enumerate().filter(|(_, b)| b.is_root()).map(|(i, _)| i)
    }
}

/// Decode a complete model. Header or offset corruption is fatal; dropped
/// attachments and batches are recorded in [`Model::diagnostics`].
pub fn parse_model(buf: &[u8], config: &LoaderConfig) -> Result<Model> {
    let reader = BinaryReader::new(buf).with_max_array_count(config.max_array_count);
    let header = header::read_header(&reader)?;

    let name = reader.read_c_string(header.name)?;
    let global_sequences = reader.read_array("global sequences", header.global_sequences)?;
    let sequences = sequence::read_sequences(&reader, &header)?;
    let sequence_lookup = reader.read_array("sequence lookup", header.sequence_lookup)?;
    let playable_lookup = match header.playable_lookup {
        Some(desc) => reader.read_array("playable lookup", desc)?,
        None => vec![],
    };
    let bones = bone::read_bones(&reader, &header)?;
    let key_bone_lookup = reader.read_array("key bone lookup", header.key_bone_lookup)?;
    let vertices = vertex::read_vertices(&reader, &header)?;
    let mut skin_profiles = skin::read_skin_sections(&reader, &header)?;
    let textures = texture::read_textures(&reader, &header)?;
    let materials = reader.read_array("materials", header.materials)?;
    let bone_lookup = reader.read_array("bone lookup", header.bone_lookup)?;
    let texture_lookup: Vec<u16> = reader.read_array("texture lookup", header.texture_lookup)?;
    let (attachments, mut diagnostics) = attachment::read_attachments(&reader, &header, config)?;
    let attachment_lookup = reader.read_array("attachment lookup", header.attachment_lookup)?;

    for (i, profile) in skin_profiles.iter_mut().enumerate() {
        diagnostics.extend(profile.resolve_batches(i, &texture_lookup, textures.len()));
    }

    let active_skin = if config.skin_profile < skin_profiles.len() {
        config.skin_profile
    } else {
        if !skin_profiles.is_empty() {
            warn!(
                "skin profile {} requested but model has {}; using profile 0",
                config.skin_profile,
                skin_profiles.len()
            );
        }
        0
    };

    debug!(
        "parsed model {:?}: {} vertices, {} bones, {} sequences, {} skin profiles, {} diagnostics",
        name,
        vertices.len(),
        bones.len(),
        sequences.len(),
        skin_profiles.len(),
        diagnostics.len()
    );

    Ok(Model {
        header,
        name,
        global_sequences,
        sequences,
        sequence_lookup,
        playable_lookup,
        bones,
        key_bone_lookup,
        vertices,
        skin_profiles,
        textures,
        materials,
        bone_lookup,
        texture_lookup,
        attachments,
        attachment_lookup,
        active_skin,
        diagnostics,
    })
}
