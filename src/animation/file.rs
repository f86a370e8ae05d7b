//! The converted animation-track file (`ANIM`).
//!
//! Layout, all little endian:
//!
//! ```text
//! header            28 bytes   magic, counts, four table offsets
//! sequences         20 bytes each
//! global sequences   4 bytes each (duration)
//! bone track meta    8 bytes each (interpolation and global sequence per track)
//! keyframe index     6 bytes per (bone, sequence) pair, bone major
//! keyframe data      per pair: translation keys, rotation keys, scale keys
//! ```
//!
//! The keyframe data region starts right after the index table. Translation
//! and scale keys are `u16 time + 3 x f32`, rotation keys `u16 time + 4 x f32`
//! (x, y, z, w).

use std::io::{Cursor, Seek, SeekFrom};

use binrw::{binrw, BinWrite};
use serde::Serialize;

use crate::{
    error::{AnimationError, ParseError},
    math::{M2Quaternion, M2Vector3},
    reader::{fixed_record, ArrayDescriptor, BinaryReader, FixedRecord},
};

pub const ANIM_MAGIC: [u8; 4] = *b"ANIM";
pub const ANIM_HEADER_SIZE: usize = 28;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnimHeader {
    pub magic: [u8; 4],
    pub bone_count: u16,
    pub sequence_count: u16,
    pub global_sequence_count: u16,
    pub reserved: u16,
    pub sequence_offset: u32,
    pub global_sequence_offset: u32,
    pub bone_meta_offset: u32,
    pub keyframe_index_offset: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnimSequence {
    pub id: u16,
    pub sub_id: u16,
    pub duration: u32,
    pub flags: u32,
    pub blend_time: u16,
    pub frequency: u16,
    pub variation_next: i16,
    pub alias_next: i16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoneTrackMeta {
    /// Per track kind (translation, rotation, scale).
    pub interpolation: [u8; 3],
    /// Per track kind; negative means the track follows the active sequence.
    pub global_sequence: [i8; 3],
    pub reserved: [u8; 2],
}

/// Key counts of one (bone, sequence) pair.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyframeCounts {
    pub translation: u16,
    pub rotation: u16,
    pub scale: u16,
}

impl KeyframeCounts {
    pub fn byte_len(&self) -> u64 {
        self.translation as u64 * VectorKey::SIZE as u64
            + self.rotation as u64 * QuaternionKey::SIZE as u64
            + self.scale as u64 * VectorKey::SIZE as u64
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VectorKey {
    pub time: u16,
    pub value: M2Vector3,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuaternionKey {
    pub time: u16,
    pub value: M2Quaternion,
}

fixed_record! {
    AnimHeader => 28,
    AnimSequence => 20,
    BoneTrackMeta => 8,
    KeyframeCounts => 6,
    VectorKey => 14,
    QuaternionKey => 18,
}

/// All keys of one (bone, sequence) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PairKeys {
    pub translation: Vec<VectorKey>,
    pub rotation: Vec<QuaternionKey>,
    pub scale: Vec<VectorKey>,
}

impl PairKeys {
    pub fn counts(&self) -> KeyframeCounts {
        KeyframeCounts {
            translation: self.translation.len() as u16,
            rotation: self.rotation.len() as u16,
            scale: self.scale.len() as u16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationFile {
    pub header: AnimHeader,
    pub sequences: Vec<AnimSequence>,
    pub global_sequences: Vec<u32>,
    pub bone_meta: Vec<BoneTrackMeta>,
    /// `bone_count * sequence_count` entries, bone major.
    pub pairs: Vec<PairKeys>,
}

fn corrupt(reason: String) -> AnimationError {
    AnimationError::CorruptIndexTable { reason }
}

impl AnimationFile {
    /// Builds a file with the tables packed back to back after the header.
    /// `pairs` must hold `bone_meta.len() * sequences.len()` entries.
    pub fn new(
        sequences: Vec<AnimSequence>,
        global_sequences: Vec<u32>,
        bone_meta: Vec<BoneTrackMeta>,
        pairs: Vec<PairKeys>,
    ) -> Result<Self, AnimationError> {
        let expected = bone_meta.len() * sequences.len();
        if pairs.len() != expected {
            let message = format!("{} keyframe pairs for {} expected", pairs.len(), expected);
            return Err(corrupt(message));
        }
        let count = |n: usize, what: &str| {
            u16::try_from(n).map_err(|_| corrupt(format!("{} {} do not fit a u16 count", n, what)))
        };
        for pair in &pairs {
            count(pair.translation.len().max(pair.rotation.len()).max(pair.scale.len()), "keys")?;
        }

        let sequence_offset = ANIM_HEADER_SIZE;
        let global_sequence_offset = sequence_offset + sequences.len() * AnimSequence::SIZE;
        let bone_meta_offset = global_sequence_offset + global_sequences.len() * 4;
        let keyframe_index_offset = bone_meta_offset + bone_meta.len() * BoneTrackMeta::SIZE;

        let header = AnimHeader {
            magic: ANIM_MAGIC,
            bone_count: count(bone_meta.len(), "bones")?,
            sequence_count: count(sequences.len(), "sequences")?,
            global_sequence_count: count(global_sequences.len(), "global sequences")?,
            reserved: 0,
            sequence_offset: sequence_offset as u32,
            global_sequence_offset: global_sequence_offset as u32,
            bone_meta_offset: bone_meta_offset as u32,
            keyframe_index_offset: keyframe_index_offset as u32,
        };

        Ok(Self {
            header,
            sequences,
            global_sequences,
            bone_meta,
            pairs,
        })
    }

    pub fn parse(buf: &[u8]) -> Result<Self, AnimationError> {
        let reader = BinaryReader::new(buf);
        let header: AnimHeader = reader.read_record(0)?;
        if header.magic != ANIM_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: ANIM_MAGIC,
                found: header.magic,
            }
            .into());
        }

        let sequences: Vec<AnimSequence> = reader.read_array(
            "animation sequences",
            ArrayDescriptor::new(header.sequence_count as u32, header.sequence_offset),
        )?;
        let global_sequences: Vec<u32> = reader.read_array(
            "animation global sequences",
            ArrayDescriptor::new(
                header.global_sequence_count as u32,
                header.global_sequence_offset,
            ),
        )?;
        let bone_meta: Vec<BoneTrackMeta> = reader.read_array(
            "bone track metadata",
            ArrayDescriptor::new(header.bone_count as u32, header.bone_meta_offset),
        )?;

        let pair_count = header.bone_count as u64 * header.sequence_count as u64;
        let index_len = pair_count * KeyframeCounts::SIZE as u64;
        let data_start = header.keyframe_index_offset as u64 + index_len;
        if data_start > buf.len() as u64 {
            return Err(corrupt(format!(
                "index table of {} pairs at {} overruns {} byte file",
                pair_count,
                header.keyframe_index_offset,
                buf.len()
            )));
        }
        let counts: Vec<KeyframeCounts> = reader
            .read_array(
                "keyframe index",
                ArrayDescriptor::new(pair_count as u32, header.keyframe_index_offset),
            )
            .map_err(|e| corrupt(e.to_string()))?;

        // One pass to place every run before decoding any of them.
        let mut offsets = Vec::with_capacity(counts.len());
        let mut cursor = data_start;
        for c in &counts {
            offsets.push(cursor);
            cursor += c.byte_len();
        }
        if cursor > buf.len() as u64 {
            return Err(corrupt(format!(
                "keyframe data needs {} bytes from offset {} but the file is {} bytes",
                cursor - data_start,
                data_start,
                buf.len()
            )));
        }

        let mut pairs = Vec::with_capacity(counts.len());
        for (c, &offset) in counts.iter().zip(&offsets) {
            let t_offset = offset as u32;
            let r_offset = t_offset + c.translation as u32 * VectorKey::SIZE as u32;
            let s_offset = r_offset + c.rotation as u32 * QuaternionKey::SIZE as u32;
            let translation = ArrayDescriptor::new(c.translation as u32, t_offset);
            let rotation = ArrayDescriptor::new(c.rotation as u32, r_offset);
            let scale = ArrayDescriptor::new(c.scale as u32, s_offset);
            pairs.push(PairKeys {
                translation: reader.read_array("translation keys", translation)?,
                rotation: reader.read_array("rotation keys", rotation)?,
                scale: reader.read_array("scale keys", scale)?,
            });
        }

        Ok(Self {
            header,
            sequences,
            global_sequences,
            bone_meta,
            pairs,
        })
    }

    pub fn pair_index(&self, bone: usize, sequence: usize) -> usize {
        bone * self.header.sequence_count as usize + sequence
    }

    /// Writes the file back using the header's table offsets. Gaps between
    /// tables are zero filled, so a parsed file reproduces its input bytes.
    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.header.write_le(&mut cursor)?;

        cursor.seek(SeekFrom::Start(self.header.sequence_offset as u64))?;
        self.sequences.write_le(&mut cursor)?;
        cursor.seek(SeekFrom::Start(self.header.global_sequence_offset as u64))?;
        self.global_sequences.write_le(&mut cursor)?;
        cursor.seek(SeekFrom::Start(self.header.bone_meta_offset as u64))?;
        self.bone_meta.write_le(&mut cursor)?;

        cursor.seek(SeekFrom::Start(self.header.keyframe_index_offset as u64))?;
        for pair in &self.pairs {
            pair.counts().write_le(&mut cursor)?;
        }
        for pair in &self.pairs {
            pair.translation.write_le(&mut cursor)?;
            pair.rotation.write_le(&mut cursor)?;
            pair.scale.write_le(&mut cursor)?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vkey(time: u16, x: f32) -> VectorKey {
        VectorKey {
            time,
            value: M2Vector3::new(x, 0.0, 0.0),
        }
    }

    fn sample_file() -> AnimationFile {
        let sequences = vec![
            AnimSequence {
                id: 0,
                duration: 1000,
                ..Default::default()
            },
            AnimSequence {
                id: 4,
                duration: 500,
                ..Default::default()
            },
        ];
        let meta = BoneTrackMeta {
            interpolation: [1, 1, 1],
            global_sequence: [-1, -1, -1],
            reserved: [0, 0],
        };
        let pairs = vec![
            PairKeys {
                translation: vec![vkey(0, 0.0), vkey(1000, 1.0)],
                ..Default::default()
            },
            PairKeys {
                rotation: vec![QuaternionKey {
                    time: 0,
                    value: M2Quaternion::IDENTITY,
                }],
                ..Default::default()
            },
        ];
        AnimationFile::new(sequences, vec![3000], vec![meta], pairs).unwrap()
    }

    #[test]
    fn header_offsets_are_packed() {
        let file = sample_file();
        assert_eq!(file.header.sequence_offset, 28);
        assert_eq!(file.header.global_sequence_offset, 68);
        assert_eq!(file.header.bone_meta_offset, 72);
        assert_eq!(file.header.keyframe_index_offset, 80);
    }

    #[test]
    fn writes_and_reparses_identically() {
        let file = sample_file();
        let bytes = file.to_bytes().unwrap();
        // 80 + 2 pairs * 6 + 2 translation keys * 14 + 1 rotation key * 18
        assert_eq!(bytes.len(), 80 + 12 + 28 + 18);

        let parsed = AnimationFile::parse(&bytes).unwrap();
        assert_eq!(parsed, file);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"MINA");
        assert!(matches!(
            AnimationFile::parse(&bytes),
            Err(AnimationError::Parse(ParseError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn overrunning_counts_are_corrupt_index() {
        let mut bytes = sample_file().to_bytes().unwrap();
        // first pair claims 0xffff translation keys
        bytes[80..82].copy_from_slice(&u16::MAX.to_le_bytes());
        assert!(matches!(
            AnimationFile::parse(&bytes),
            Err(AnimationError::CorruptIndexTable { .. })
        ));
    }

    #[test]
    fn pair_count_mismatch_is_rejected() {
        let err = AnimationFile::new(
            vec![AnimSequence::default()],
            vec![],
            vec![],
            vec![PairKeys::default()],
        );
        assert!(err.is_err());
    }
}
