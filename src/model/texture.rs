use binrw::binrw;
use serde::Serialize;

use crate::{
    error::Result,
    reader::{fixed_record, ArrayDescriptor, BinaryReader},
};

use super::header::ModelHeader;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TextureRecord {
    pub kind: u32,
    pub flags: u32,
    pub filename: ArrayDescriptor,
}

/// Render flags and blend mode referenced by a batch's material index.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Material {
    pub flags: u16,
    pub blend_mode: u16,
}

fixed_record! {
    TextureRecord => 16,
    Material => 4,
}

/// Where a texture's pixels come from. Only `Hardcoded` textures name a file;
/// the replaceable kinds are swapped in by character customisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureKind {
    Hardcoded,
    Body,
    Cape,
    Hair,
    Fur,
    CreatureSkin1,
    CreatureSkin2,
    CreatureSkin3,
    Other(u32),
}

impl From<u32> for TextureKind {
    fn from(raw: u32) -> Self {
        match raw {
            0 => TextureKind::Hardcoded,
            1 => TextureKind::Body,
            2 => TextureKind::Cape,
            6 => TextureKind::Hair,
            8 => TextureKind::Fur,
            11 => TextureKind::CreatureSkin1,
            12 => TextureKind::CreatureSkin2,
            13 => TextureKind::CreatureSkin3,
            other => TextureKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Texture {
    pub kind: TextureKind,
    pub flags: u32,
    pub filename: Option<String>,
}

impl Texture {
    pub fn is_replaceable(&self) -> bool {
        self.kind != TextureKind::Hardcoded
    }
}

pub fn parse_textures(buf: &[u8], header: &ModelHeader) -> Result<Vec<Texture>> {
    read_textures(&BinaryReader::new(buf), header)
}

pub(crate) fn read_textures(reader: &BinaryReader, header: &ModelHeader) -> Result<Vec<Texture>> {
    let records: Vec<TextureRecord> = reader.read_array("textures", header.textures)?;
    records
        .into_iter()
        .map(|record| {
            let name = reader.read_c_string(record.filename)?;
            Ok(Texture {
                kind: TextureKind::from(record.kind),
                flags: record.flags,
                filename: (!name.is_empty()).then_some(name),
            })
        })
        .collect()
}

pub fn parse_materials(buf: &[u8], header: &ModelHeader) -> Result<Vec<Material>> {
    BinaryReader::new(buf).read_array("materials", header.materials)
}
