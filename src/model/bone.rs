use std::collections::VecDeque;

use binrw::binrw;
use serde::Serialize;

use crate::{
    error::{ParseError, Result},
    math::{M2PackedQuaternion, M2Quaternion, M2Vector3},
    reader::{fixed_record, ArrayDescriptor, BinaryReader},
};

use super::header::{HeaderLayout, ModelHeader};

/// How a track blends between neighbouring keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Interpolation {
    /// Step: hold the earlier key until the next one.
    None,
    #[default]
    Linear,
    /// Tangents are not carried by the converted keyframe format, so sampling
    /// treats this as linear.
    Hermite,
    Bezier,
}

impl Interpolation {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Interpolation::None,
            2 => Interpolation::Hermite,
            3 => Interpolation::Bezier,
            _ => Interpolation::Linear,
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            Interpolation::None => 0,
            Interpolation::Linear => 1,
            Interpolation::Hermite => 2,
            Interpolation::Bezier => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    Translation,
    Rotation,
    Scale,
}

impl TrackKind {
    pub const ALL: [TrackKind; 3] = [TrackKind::Translation, TrackKind::Rotation, TrackKind::Scale];

    pub fn index(self) -> usize {
        match self {
            TrackKind::Translation => 0,
            TrackKind::Rotation => 1,
            TrackKind::Scale => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackMeta {
    pub interpolation: Interpolation,
    pub global_sequence: Option<u16>,
    /// Number of per-sequence ranges (classic) or per-sequence key lists
    /// (extended) the track declares.
    pub sequence_ranges: u32,
    pub keyframe_count: u32,
}

/// Classic track: one flat key array shared by every sequence, with a
/// `(start, end)` range per sequence.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassicTrackHeader {
    pub interpolation: i16,
    pub global_sequence: i16,
    pub ranges: ArrayDescriptor,
    pub timestamps: ArrayDescriptor,
    pub values: ArrayDescriptor,
}

/// Extended track: one key array per sequence.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExtendedTrackHeader {
    pub interpolation: i16,
    pub global_sequence: i16,
    pub timestamps: ArrayDescriptor,
    pub values: ArrayDescriptor,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BonePrefix {
    pub key_bone_id: i32,
    pub flags: u32,
    pub parent: i16,
    pub submesh_id: u16,
}

fixed_record! {
    ClassicTrackHeader => 28,
    ExtendedTrackHeader => 20,
    BonePrefix => 12,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub key_bone_id: i32,
    pub flags: u32,
    pub parent: Option<usize>,
    pub submesh_id: u16,
    pub pivot: M2Vector3,
    pub rest_translation: M2Vector3,
    pub rest_rotation: M2Quaternion,
    pub rest_scale: M2Vector3,
    /// Indexed by [`TrackKind::index`].
    pub tracks: [TrackMeta; 3],
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn track(&self, kind: TrackKind) -> &TrackMeta {
        &self.tracks[kind.index()]
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            key_bone_id: -1,
            flags: 0,
            parent: None,
            submesh_id: 0,
            pivot: M2Vector3::ZERO,
            rest_translation: M2Vector3::ZERO,
            rest_rotation: M2Quaternion::IDENTITY,
            rest_scale: M2Vector3::ONE,
            tracks: [TrackMeta::default(); 3],
        }
    }
}

fn global_sequence(raw: i16) -> Option<u16> {
    u16::try_from(raw).ok()
}

/// Reads a track header at `offset`, validates every key array it points to and
/// returns its metadata plus the first keyframe value, if any.
fn read_track<T>(
    reader: &BinaryReader,
    layout: HeaderLayout,
    offset: usize,
    value_size: usize,
    decode: impl Fn(&BinaryReader, usize) -> Result<T>,
) -> Result<(TrackMeta, Option<T>)> {
    match layout {
        HeaderLayout::Classic => {
            let header: ClassicTrackHeader = reader.read_record(offset)?;
            reader.check_array("track ranges", header.ranges, 8)?;
            reader.check_array("track timestamps", header.timestamps, 4)?;
            reader.check_array("track values", header.values, value_size)?;

            let first = if header.values.is_empty() {
                None
            } else {
                Some(decode(reader, header.values.offset as usize)?)
            };
            let meta = TrackMeta {
                interpolation: Interpolation::from_raw(header.interpolation as i32),
                global_sequence: global_sequence(header.global_sequence),
                sequence_ranges: header.ranges.count,
                keyframe_count: header.timestamps.count,
            };
            Ok((meta, first))
        }
        HeaderLayout::Extended => {
            let header: ExtendedTrackHeader = reader.read_record(offset)?;
            let timestamp_lists: Vec<ArrayDescriptor> =
                reader.read_array("track timestamp lists", header.timestamps)?;
            let value_lists: Vec<ArrayDescriptor> =
                reader.read_array("track value lists", header.values)?;

            let mut keyframe_count = 0u32;
            for list in &timestamp_lists {
                reader.check_array("track timestamps", *list, 4)?;
                keyframe_count = keyframe_count.saturating_add(list.count);
            }
            for list in &value_lists {
                reader.check_array("track values", *list, value_size)?;
            }

            let first = match value_lists.iter().find(|list| !list.is_empty()) {
                Some(list) => Some(decode(reader, list.offset as usize)?),
                None => None,
            };
            let meta = TrackMeta {
                interpolation: Interpolation::from_raw(header.interpolation as i32),
                global_sequence: global_sequence(header.global_sequence),
                sequence_ranges: header.timestamps.count,
                keyframe_count,
            };
            Ok((meta, first))
        }
    }
}

fn read_vector(reader: &BinaryReader, offset: usize) -> Result<M2Vector3> {
    reader.read_record(offset)
}

pub fn parse_bones(buf: &[u8], header: &ModelHeader) -> Result<Vec<Bone>> {
    read_bones(&BinaryReader::new(buf), header)
}

pub(crate) fn read_bones(reader: &BinaryReader, header: &ModelHeader) -> Result<Vec<Bone>> {
    let layout = header.layout;
    let stride = layout.bone_stride();
    reader.check_array("bones", header.bones, stride)?;

    let count = header.bones.count as usize;
    let mut bones = Vec::with_capacity(count);
    for i in 0..count {
        let offset = header.bones.offset as usize + i * stride;
        let prefix: BonePrefix = reader.read_record(offset)?;

        let parent = match prefix.parent {
            -1 => None,
            p if p >= 0 && (p as usize) < count => Some(p as usize),
            p => {
                return Err(ParseError::OutOfRangeIndex {
                    what: "bone parent",
                    index: p as u16 as usize,
                    limit: count,
                })
            }
        };

        // Extended bones carry u16 distance + u16 z-ratio before the tracks.
        let tracks_offset = offset
            + 12
            + match layout {
                HeaderLayout::Classic => 0,
                HeaderLayout::Extended => 4,
            };
        let track_size = layout.track_size();

        let (translation, rest_translation) =
            read_track(reader, layout, tracks_offset, 12, read_vector)?;
        let (rotation, rest_rotation) = read_track(
            reader,
            layout,
            tracks_offset + track_size,
            layout.rotation_value_size(),
            |reader, offset| match layout {
                HeaderLayout::Classic => reader.read_record::<M2Quaternion>(offset),
                HeaderLayout::Extended => {
                    Ok(reader.read_record::<M2PackedQuaternion>(offset)?.unpack())
                }
            },
        )?;
        let (scale, rest_scale) =
            read_track(reader, layout, tracks_offset + 2 * track_size, 12, read_vector)?;
        let pivot = read_vector(reader, tracks_offset + 3 * track_size)?;

        bones.push(Bone {
            key_bone_id: prefix.key_bone_id,
            flags: prefix.flags,
            parent,
            submesh_id: prefix.submesh_id,
            pivot,
            rest_translation: rest_translation.unwrap_or(M2Vector3::ZERO),
            rest_rotation: rest_rotation.unwrap_or(M2Quaternion::IDENTITY),
            rest_scale: rest_scale.unwrap_or(M2Vector3::ONE),
            tracks: [translation, rotation, scale],
        });
    }

    hierarchy_order(&bones)?;
    Ok(bones)
}

/// Parent-before-child evaluation order: roots in storage order, then their
/// descendants breadth first. Fails if any bone is its own ancestor.
pub fn hierarchy_order(bones: &[Bone]) -> Result<Vec<usize>> {
    let mut children = vec![Vec::new(); bones.len()];
    let mut queue = VecDeque::new();
    for (i, bone) in bones.iter().enumerate() {
        match bone.parent {
            Some(p) if p < bones.len() => children[p].push(i),
            Some(p) => {
                return Err(ParseError::OutOfRangeIndex {
                    what: "bone parent",
                    index: p,
                    limit: bones.len(),
                })
            }
            None => queue.push_back(i),
        }
    }

    let mut order = Vec::with_capacity(bones.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        queue.extend(children[i].iter().copied());
    }

    if order.len() < bones.len() {
        let mut visited = vec![false; bones.len()];
        for &i in &order {
            visited[i] = true;
        }
        let bone = visited.iter().position(|v| !v).unwrap_or(0);
        return Err(ParseError::CyclicHierarchy { bone });
    }
    Ok(order)
}
