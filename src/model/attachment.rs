use binrw::binrw;
use cgmath::InnerSpace;
use serde::Serialize;

use crate::{
    config::LoaderConfig,
    error::Result,
    math::M2Vector3,
    reader::{fixed_record, BinaryReader},
};

use super::{header::ModelHeader, ParseDiagnostic};

/// Leading fields of an attachment record; the animated-visibility track
/// that follows is not read.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AttachmentRecord {
    pub id: u32,
    pub bone: u16,
    pub unknown: u16,
    pub offset: M2Vector3,
}

fixed_record! { AttachmentRecord => 20 }

/// A named point on a bone where props, weapons and effects are mounted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub id: u32,
    pub bone: usize,
    pub offset: M2Vector3,
}

/// Decodes the attachment table. Entries pointing at a missing bone or with an
/// implausible offset are skipped and reported instead of failing the model.
pub fn parse_attachments(
    buf: &[u8],
    header: &ModelHeader,
    config: &LoaderConfig,
) -> Result<(Vec<Attachment>, Vec<ParseDiagnostic>)> {
    let reader = BinaryReader::new(buf).with_max_array_count(config.max_array_count);
    read_attachments(&reader, header, config)
}

pub(crate) fn read_attachments(
    reader: &BinaryReader,
    header: &ModelHeader,
    config: &LoaderConfig,
) -> Result<(Vec<Attachment>, Vec<ParseDiagnostic>)> {
    let records: Vec<AttachmentRecord> =
        reader.read_strided("attachments", header.attachments, header.layout.attachment_stride())?;
    let bone_count = header.bones.count as usize;

    let mut attachments = Vec::with_capacity(records.len());
    let mut diagnostics = vec![];
    for (i, record) in records.into_iter().enumerate() {
        let bone = record.bone as usize;
        if bone >= bone_count {
            diagnostics.push(ParseDiagnostic::warn(
                "attachment",
                i,
                format!("attachment {} references bone {} of {}", record.id, bone, bone_count),
            ));
            continue;
        }

        let offset = record.offset;
        if !offset.is_finite() || offset.0.magnitude() > config.max_attachment_offset {
            diagnostics.push(ParseDiagnostic::warn(
                "attachment",
                i,
                format!("attachment {} has implausible offset {:?}", record.id, offset.to_slice()),
            ));
            continue;
        }

        attachments.push(Attachment {
            id: record.id,
            bone,
            offset,
        });
    }

    Ok((attachments, diagnostics))
}
