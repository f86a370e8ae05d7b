use binrw::binrw;
use serde::Serialize;

use crate::{
    error::Result,
    math::M2Vector3,
    reader::{fixed_record, BinaryReader},
};

use super::header::{HeaderLayout, ModelHeader};

/// Classic sequences place each clip on one shared timeline.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassicSequenceRecord {
    pub id: u16,
    pub sub_id: u16,
    pub start: u32,
    pub end: u32,
    pub move_speed: f32,
    pub flags: u32,
    pub frequency: i16,
    pub padding: u16,
    pub replay_min: u32,
    pub replay_max: u32,
    pub blend_time: u32,
    pub bounds_min: M2Vector3,
    pub bounds_max: M2Vector3,
    pub bounds_radius: f32,
    pub variation_next: i16,
    pub alias_next: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExtendedSequenceRecord {
    pub id: u16,
    pub sub_id: u16,
    pub duration: u32,
    pub move_speed: f32,
    pub flags: u32,
    pub frequency: i16,
    pub padding: u16,
    pub replay_min: u32,
    pub replay_max: u32,
    pub blend_time: u32,
    pub bounds_min: M2Vector3,
    pub bounds_max: M2Vector3,
    pub bounds_radius: f32,
    pub variation_next: i16,
    pub alias_next: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalSequence {
    pub duration: u32,
}

fixed_record! {
    ClassicSequenceRecord => 68,
    ExtendedSequenceRecord => 64,
    GlobalSequence => 4,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub id: u16,
    pub sub_id: u16,
    pub duration: u32,
    /// Classic layout only: where the clip starts on the shared timeline.
    pub timeline_start: Option<u32>,
    pub move_speed: f32,
    pub flags: u32,
    pub frequency: i16,
    pub replay_min: u32,
    pub replay_max: u32,
    /// Carried for callers; playback switches clips without blending.
    pub blend_time: u32,
    pub bounds_min: M2Vector3,
    pub bounds_max: M2Vector3,
    pub bounds_radius: f32,
    pub variation_next: i16,
    pub alias_next: u16,
}

impl From<ClassicSequenceRecord> for Sequence {
    fn from(r: ClassicSequenceRecord) -> Self {
        Self {
            id: r.id,
            sub_id: r.sub_id,
            duration: r.end.saturating_sub(r.start),
            timeline_start: Some(r.start),
            move_speed: r.move_speed,
            flags: r.flags,
            frequency: r.frequency,
            replay_min: r.replay_min,
            replay_max: r.replay_max,
            blend_time: r.blend_time,
            bounds_min: r.bounds_min,
            bounds_max: r.bounds_max,
            bounds_radius: r.bounds_radius,
            variation_next: r.variation_next,
            alias_next: r.alias_next,
        }
    }
}

impl From<ExtendedSequenceRecord> for Sequence {
    fn from(r: ExtendedSequenceRecord) -> Self {
        Self {
            id: r.id,
            sub_id: r.sub_id,
            duration: r.duration,
            timeline_start: None,
            move_speed: r.move_speed,
            flags: r.flags,
            frequency: r.frequency,
            replay_min: r.replay_min,
            replay_max: r.replay_max,
            blend_time: r.blend_time,
            bounds_min: r.bounds_min,
            bounds_max: r.bounds_max,
            bounds_radius: r.bounds_radius,
            variation_next: r.variation_next,
            alias_next: r.alias_next,
        }
    }
}

pub fn parse_sequences(buf: &[u8], header: &ModelHeader) -> Result<Vec<Sequence>> {
    read_sequences(&BinaryReader::new(buf), header)
}

pub(crate) fn read_sequences(reader: &BinaryReader, header: &ModelHeader) -> Result<Vec<Sequence>> {
    let stride = header.layout.sequence_stride();
    Ok(match header.layout {
        HeaderLayout::Classic => reader
            .read_strided::<ClassicSequenceRecord>("sequences", header.sequences, stride)?
            .into_iter()
            .map(Sequence::from)
            .collect(),
        HeaderLayout::Extended => reader
            .read_strided::<ExtendedSequenceRecord>("sequences", header.sequences, stride)?
            .into_iter()
            .map(Sequence::from)
            .collect(),
    })
}

pub fn parse_global_sequences(buf: &[u8], header: &ModelHeader) -> Result<Vec<GlobalSequence>> {
    BinaryReader::new(buf).read_array("global sequences", header.global_sequences)
}
