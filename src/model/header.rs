use log::debug;
use serde::Serialize;

use crate::{
    error::{ParseError, Result},
    math::M2Vector3,
    reader::{ArrayDescriptor, BinaryReader},
};

pub const MODEL_MAGIC: [u8; 4] = *b"MD20";
pub const MIN_VERSION: u32 = 256;
pub const MAX_VERSION: u32 = 264;
/// First version that carries the playable-lookup descriptor and stores skin
/// profiles through an array descriptor.
pub const EXTENDED_VERSION: u32 = 260;

pub const VERTEX_STRIDE: usize = 48;
pub const TEXTURE_STRIDE: usize = 16;
pub const MATERIAL_STRIDE: usize = 4;
pub const SKIN_PROFILE_STRIDE: usize = 44;

/// The two historical header layouts. Every version-dependent size and offset
/// is answered here so that the section parsers never branch on raw versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderLayout {
    /// Versions 256..=259.
    Classic,
    /// Versions 260..=264.
    Extended,
}

impl HeaderLayout {
    pub fn for_version(version: u32) -> Result<Self> {
        match version {
            v if (MIN_VERSION..EXTENDED_VERSION).contains(&v) => Ok(HeaderLayout::Classic),
            v if (EXTENDED_VERSION..=MAX_VERSION).contains(&v) => Ok(HeaderLayout::Extended),
            _ => Err(ParseError::UnsupportedVersion {
                version,
                min: MIN_VERSION,
                max: MAX_VERSION,
            }),
        }
    }

    pub fn header_size(self) -> usize {
        match self {
            HeaderLayout::Classic => 148,
            HeaderLayout::Extended => 160,
        }
    }

    pub fn sequence_stride(self) -> usize {
        match self {
            HeaderLayout::Classic => 68,
            HeaderLayout::Extended => 64,
        }
    }

    pub fn track_size(self) -> usize {
        match self {
            HeaderLayout::Classic => 28,
            HeaderLayout::Extended => 20,
        }
    }

    pub fn bone_stride(self) -> usize {
        match self {
            HeaderLayout::Classic => 108,
            HeaderLayout::Extended => 88,
        }
    }

    pub fn submesh_stride(self) -> usize {
        match self {
            HeaderLayout::Classic => 32,
            HeaderLayout::Extended => 48,
        }
    }

    pub fn batch_stride(self) -> usize {
        match self {
            HeaderLayout::Classic => 24,
            HeaderLayout::Extended => 28,
        }
    }

    pub fn attachment_stride(self) -> usize {
        match self {
            HeaderLayout::Classic => 48,
            HeaderLayout::Extended => 40,
        }
    }

    /// Byte size of one rotation keyframe value.
    pub fn rotation_value_size(self) -> usize {
        match self {
            HeaderLayout::Classic => 16,
            HeaderLayout::Extended => 8,
        }
    }

    fn bones_base(self) -> usize {
        match self {
            HeaderLayout::Classic => 0x2C,
            HeaderLayout::Extended => 0x34,
        }
    }

    fn textures_base(self) -> usize {
        match self {
            HeaderLayout::Classic => self.bones_base() + 0x1C,
            HeaderLayout::Extended => self.bones_base() + 0x20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub layout: HeaderLayout,
    pub name: ArrayDescriptor,
    pub global_flags: u32,
    pub global_sequences: ArrayDescriptor,
    pub sequences: ArrayDescriptor,
    pub sequence_lookup: ArrayDescriptor,
    pub playable_lookup: Option<ArrayDescriptor>,
    pub bones: ArrayDescriptor,
    pub key_bone_lookup: ArrayDescriptor,
    pub vertices: ArrayDescriptor,
    /// Classic headers store only a count; the descriptor's offset is then the
    /// end of the header, where the profiles always start.
    pub skin_profiles: ArrayDescriptor,
    pub textures: ArrayDescriptor,
    pub materials: ArrayDescriptor,
    pub bone_lookup: ArrayDescriptor,
    pub texture_lookup: ArrayDescriptor,
    pub bounding_box_min: M2Vector3,
    pub bounding_box_max: M2Vector3,
    pub bounding_radius: f32,
    pub attachments: ArrayDescriptor,
    pub attachment_lookup: ArrayDescriptor,
}

impl ModelHeader {
    /// Checks every section descriptor against its record stride and the
    /// buffer length.
    pub fn validate(&self, reader: &BinaryReader) -> Result<()> {
        let layout = self.layout;
        let sections: [(&'static str, Option<ArrayDescriptor>, usize); 15] = [
            ("name", Some(self.name), 1),
            ("global sequences", Some(self.global_sequences), 4),
            ("sequences", Some(self.sequences), layout.sequence_stride()),
            ("sequence lookup", Some(self.sequence_lookup), 2),
            ("playable lookup", self.playable_lookup, 4),
            ("bones", Some(self.bones), layout.bone_stride()),
            ("key bone lookup", Some(self.key_bone_lookup), 2),
            ("vertices", Some(self.vertices), VERTEX_STRIDE),
            ("skin profiles", Some(self.skin_profiles), SKIN_PROFILE_STRIDE),
            ("textures", Some(self.textures), TEXTURE_STRIDE),
            ("materials", Some(self.materials), MATERIAL_STRIDE),
            ("bone lookup", Some(self.bone_lookup), 2),
            ("texture lookup", Some(self.texture_lookup), 2),
            ("attachments", Some(self.attachments), layout.attachment_stride()),
            ("attachment lookup", Some(self.attachment_lookup), 2),
        ];

        for (what, desc, stride) in sections {
            if let Some(desc) = desc {
                reader.check_array(what, desc, stride)?;
            }
        }
        Ok(())
    }
}

pub fn parse_header(buf: &[u8]) -> Result<ModelHeader> {
    read_header(&BinaryReader::new(buf))
}

pub(crate) fn read_header(reader: &BinaryReader) -> Result<ModelHeader> {
    let magic_bytes = reader.read_fixed_bytes(0, 4)?;
    let mut magic = [0u8; 4];
    magic.copy_from_slice(magic_bytes);
    if magic != MODEL_MAGIC {
        return Err(ParseError::InvalidMagic {
            expected: MODEL_MAGIC,
            found: magic,
        });
    }

    let version = reader.read_u32(0x04)?;
    let layout = HeaderLayout::for_version(version)?;
    reader.check_range(0, layout.header_size())?;
    debug!("model version {} uses the {:?} header layout", version, layout);

    let playable_lookup = match layout {
        HeaderLayout::Classic => None,
        HeaderLayout::Extended => Some(reader.read_array_descriptor(0x2C)?),
    };

    let p = layout.bones_base();
    let skin_profiles = match layout {
        HeaderLayout::Classic => {
            ArrayDescriptor::new(reader.read_u32(p + 0x18)?, layout.header_size() as u32)
        }
        HeaderLayout::Extended => reader.read_array_descriptor(p + 0x18)?,
    };

    let q = layout.textures_base();
    let header = ModelHeader {
        magic,
        version,
        layout,
        name: reader.read_array_descriptor(0x08)?,
        global_flags: reader.read_u32(0x10)?,
        global_sequences: reader.read_array_descriptor(0x14)?,
        sequences: reader.read_array_descriptor(0x1C)?,
        sequence_lookup: reader.read_array_descriptor(0x24)?,
        playable_lookup,
        bones: reader.read_array_descriptor(p)?,
        key_bone_lookup: reader.read_array_descriptor(p + 0x08)?,
        vertices: reader.read_array_descriptor(p + 0x10)?,
        skin_profiles,
        textures: reader.read_array_descriptor(q)?,
        materials: reader.read_array_descriptor(q + 0x08)?,
        bone_lookup: reader.read_array_descriptor(q + 0x10)?,
        texture_lookup: reader.read_array_descriptor(q + 0x18)?,
        bounding_box_min: reader.read_record(q + 0x20)?,
        bounding_box_max: reader.read_record(q + 0x2C)?,
        bounding_radius: reader.read_f32(q + 0x38)?,
        attachments: reader.read_array_descriptor(q + 0x3C)?,
        attachment_lookup: reader.read_array_descriptor(q + 0x44)?,
    };

    header.validate(reader)?;
    Ok(header)
}
