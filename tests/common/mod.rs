// Shared fixture builders: hand-assembled model and animation files in both
// header layouts.
#![allow(dead_code)]

use binrw::BinWrite;
use std::io::Cursor;

use m2_rig::{
    animation::{AnimSequence, AnimationFile, BoneTrackMeta, PairKeys, QuaternionKey, VectorKey},
    math::{M2PackedQuaternion, M2Quaternion, M2Vector3},
    model::Vertex,
};

pub const CLASSIC: u32 = 256;
pub const EXTENDED: u32 = 264;

#[derive(Debug, Clone)]
pub struct FixtureBone {
    pub parent: i16,
    pub key_bone_id: i32,
    pub pivot: [f32; 3],
    /// Single-key rest values; `None` leaves the track empty.
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

impl FixtureBone {
    pub fn root(pivot: [f32; 3]) -> Self {
        Self {
            parent: -1,
            key_bone_id: -1,
            pivot,
            translation: None,
            rotation: None,
            scale: None,
        }
    }

    pub fn child(parent: i16, pivot: [f32; 3]) -> Self {
        Self {
            parent,
            ..Self::root(pivot)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelFixture {
    pub version: u32,
    pub name: String,
    pub global_sequences: Vec<u32>,
    /// (id, sub id, duration)
    pub sequences: Vec<(u16, u16, u32)>,
    pub bones: Vec<FixtureBone>,
    pub vertices: Vec<Vertex>,
    pub vertex_map: Vec<u16>,
    /// Local indices into `vertex_map`.
    pub indices: Vec<u16>,
    /// (geoset id, index start, index count)
    pub submeshes: Vec<(u16, u16, u16)>,
    /// (submesh index, texture combo index)
    pub batches: Vec<(u16, u16)>,
    pub textures: Vec<String>,
    pub texture_lookup: Vec<u16>,
    /// (id, bone, offset)
    pub attachments: Vec<(u32, u16, [f32; 3])>,
}

pub fn vertex(position: [f32; 3], bone: u8) -> Vertex {
    Vertex {
        position: M2Vector3::new(position[0], position[1], position[2]),
        bone_weights: [255, 0, 0, 0],
        bone_indices: [bone, 0, 0, 0],
        normal: M2Vector3::new(0.0, 0.0, 1.0),
        tex_coords: [position[0], position[1]],
        tex_coords2: [0.0, 0.0],
    }
}

/// Root at the origin, one child with pivot (0, 0, 2).
pub fn two_bone_fixture(version: u32) -> ModelFixture {
    ModelFixture {
        version,
        name: "TwoBones".to_string(),
        global_sequences: vec![],
        sequences: vec![(0, 0, 1000)],
        bones: vec![FixtureBone::root([0.0, 0.0, 0.0]), FixtureBone::child(0, [0.0, 0.0, 2.0])],
        vertices: vec![
            vertex([0.0, 0.0, 0.0], 0),
            vertex([1.0, 0.0, 0.0], 0),
            vertex([0.0, 0.0, 3.0], 1),
        ],
        vertex_map: vec![0, 1, 2],
        indices: vec![0, 1, 2],
        submeshes: vec![(0, 0, 3)],
        batches: vec![],
        textures: vec![],
        texture_lookup: vec![],
        attachments: vec![(5, 1, [0.0, 0.0, 0.5])],
    }
}

/// A character with six alternative geosets, three sequences, one global
/// sequence, a texture, an attachment and keyed rest values.
pub fn character_fixture(version: u32) -> ModelFixture {
    let mut root = FixtureBone::root([0.0, 0.0, 0.0]);
    root.key_bone_id = 0;
    root.translation = Some([0.0, 0.0, 1.0]);
    let mut head = FixtureBone::child(0, [0.0, 0.0, 2.0]);
    // 180 degrees about z packs exactly in both layouts
    head.rotation = Some([0.0, 0.0, 1.0, 0.0]);
    head.scale = Some([2.0, 2.0, 2.0]);

    ModelFixture {
        version,
        name: "Character".to_string(),
        global_sequences: vec![4000],
        sequences: vec![(0, 0, 1000), (4, 0, 600), (4, 1, 800)],
        bones: vec![root, head],
        vertices: (0..6)
            .map(|i| vertex([i as f32, (i % 2) as f32, (i / 3) as f32], (i % 2) as u8))
            .collect(),
        vertex_map: (0..6).collect(),
        indices: vec![0, 1, 2, 1, 2, 3, 2, 3, 4, 3, 4, 5, 0, 2, 4, 1, 3, 5],
        submeshes: vec![
            (0, 0, 3),
            (101, 3, 3),
            (401, 6, 3),
            (402, 9, 3),
            (903, 12, 3),
            (1301, 15, 3),
        ],
        batches: vec![(0, 0), (2, 0)],
        textures: vec!["Character\\Human\\Skin.blp".to_string()],
        texture_lookup: vec![0],
        attachments: vec![(1, 1, [0.0, 0.0, 0.5]), (11, 0, [0.25, 0.0, 0.0])],
    }
}

fn align(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

/// Appends `bytes` at the next 4-byte boundary and returns their offset.
fn push(buf: &mut Vec<u8>, bytes: &[u8]) -> u32 {
    align(buf);
    let at = buf.len();
    buf.extend_from_slice(bytes);
    at as u32
}

/// Appends an array and returns its `(count, offset)` descriptor.
fn push_array(buf: &mut Vec<u8>, count: usize, bytes: &[u8]) -> (u32, u32) {
    if count == 0 {
        return (0, 0);
    }
    (count as u32, push(buf, bytes))
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_desc(buf: &mut [u8], at: usize, (count, offset): (u32, u32)) {
    put_u32(buf, at, count);
    put_u32(buf, at + 4, offset);
}

fn desc_bytes(out: &mut Vec<u8>, (count, offset): (u32, u32)) {
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl ModelFixture {
    pub fn is_extended(&self) -> bool {
        self.version >= 260
    }

    /// One track header; `value` is the encoded single key, if any.
    fn track(&self, buf: &mut Vec<u8>, value: Option<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![];
        let interpolation: i16 = if value.is_some() { 1 } else { 0 };
        out.extend_from_slice(&interpolation.to_le_bytes());
        out.extend_from_slice(&(-1i16).to_le_bytes());

        match (self.is_extended(), value) {
            (false, Some(value)) => {
                let ranges = push_array(buf, 1, &u32_bytes(&[0, 0]));
                let timestamps = push_array(buf, 1, &u32_bytes(&[0]));
                let values = push_array(buf, 1, &value);
                desc_bytes(&mut out, ranges);
                desc_bytes(&mut out, timestamps);
                desc_bytes(&mut out, values);
            }
            (false, None) => out.extend_from_slice(&[0u8; 24]),
            (true, Some(value)) => {
                let timestamps = push_array(buf, 1, &u32_bytes(&[0]));
                let values = push_array(buf, 1, &value);
                let mut timestamp_list = vec![];
                desc_bytes(&mut timestamp_list, timestamps);
                let mut value_list = vec![];
                desc_bytes(&mut value_list, values);
                let timestamp_lists = push_array(buf, 1, &timestamp_list);
                let value_lists = push_array(buf, 1, &value_list);
                desc_bytes(&mut out, timestamp_lists);
                desc_bytes(&mut out, value_lists);
            }
            (true, None) => out.extend_from_slice(&[0u8; 16]),
        }
        out
    }

    fn bone_records(&self, buf: &mut Vec<u8>) -> Vec<u8> {
        let mut records = vec![];
        for bone in &self.bones {
            let translation = bone.translation.map(|v| f32_bytes(&v));
            let rotation = bone.rotation.map(|q| {
                if self.is_extended() {
                    let unpacked = M2Quaternion::from_xyzw(q[0], q[1], q[2], q[3]);
                    let packed = M2PackedQuaternion::pack(&unpacked);
                    packed.0.iter().flat_map(|c| c.to_le_bytes()).collect()
                } else {
                    f32_bytes(&q)
                }
            });
            let scale = bone.scale.map(|v| f32_bytes(&v));

            let mut record = vec![];
            record.extend_from_slice(&bone.key_bone_id.to_le_bytes());
            record.extend_from_slice(&0u32.to_le_bytes());
            record.extend_from_slice(&bone.parent.to_le_bytes());
            record.extend_from_slice(&0u16.to_le_bytes());
            if self.is_extended() {
                record.extend_from_slice(&[0u8; 4]);
            }
            for value in [translation, rotation, scale] {
                let track = self.track(buf, value);
                record.extend_from_slice(&track);
            }
            record.extend_from_slice(&f32_bytes(&bone.pivot));
            records.extend_from_slice(&record);
        }
        records
    }

    fn sequence_records(&self) -> Vec<u8> {
        let mut out = vec![];
        let mut start = 0u32;
        for &(id, sub_id, duration) in &self.sequences {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&sub_id.to_le_bytes());
            if self.is_extended() {
                out.extend_from_slice(&duration.to_le_bytes());
            } else {
                out.extend_from_slice(&start.to_le_bytes());
                out.extend_from_slice(&(start + duration).to_le_bytes());
            }
            start += duration;
            out.extend_from_slice(&f32_bytes(&[1.5])); // move speed
            out.extend_from_slice(&32u32.to_le_bytes()); // flags
            out.extend_from_slice(&0i16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&u32_bytes(&[0, 0, 150]));
            out.extend_from_slice(&f32_bytes(&[-1.0, -1.0, 0.0, 1.0, 1.0, 2.0, 2.0]));
            out.extend_from_slice(&(-1i16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out
    }

    fn vertex_bytes(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(vec![]);
        for vertex in &self.vertices {
            vertex.write(&mut cursor).unwrap();
        }
        cursor.into_inner()
    }

    fn submesh_records(&self) -> Vec<u8> {
        let mut out = vec![];
        for &(id, index_start, index_count) in &self.submeshes {
            let vertex_count = self.vertices.len() as u16;
            let fields = [id, 0, 0, vertex_count, index_start, index_count, 1, 0, 1, 0];
            out.extend_from_slice(&u16_bytes(&fields));
            out.extend_from_slice(&f32_bytes(&[0.0, 0.0, 1.0]));
            if self.is_extended() {
                out.extend_from_slice(&f32_bytes(&[0.0, 0.0, 1.0, 2.5]));
            }
        }
        out
    }

    fn batch_records(&self) -> Vec<u8> {
        let mut out = vec![];
        for &(submesh, texture_combo) in &self.batches {
            out.push(16); // flags
            out.push(0); // priority plane
            out.extend_from_slice(&0u16.to_le_bytes()); // shader
            out.extend_from_slice(&submesh.to_le_bytes());
            out.extend_from_slice(&submesh.to_le_bytes());
            out.extend_from_slice(&(-1i16).to_le_bytes());
            out.extend_from_slice(&u16_bytes(&[0, 0, 1, texture_combo, 0, 0, 0]));
            if self.is_extended() {
                out.extend_from_slice(&u16_bytes(&[3, 0]));
            }
        }
        out
    }

    fn attachment_records(&self) -> Vec<u8> {
        let mut out = vec![];
        for &(id, bone, offset) in &self.attachments {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&bone.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&f32_bytes(&offset));
            let track = if self.is_extended() { 20 } else { 28 };
            out.extend_from_slice(&vec![0u8; track]);
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let extended = self.is_extended();
        let header_size = if extended { 160 } else { 148 };
        let p = if extended { 0x34 } else { 0x2C };
        let q = p + if extended { 0x20 } else { 0x1C };

        let mut buf = vec![0u8; header_size];
        buf[0..4].copy_from_slice(b"MD20");
        put_u32(&mut buf, 4, self.version);

        // one skin profile, right after the header
        let skin_at = push(&mut buf, &[0u8; 44]) as usize;

        let mut name = self.name.clone().into_bytes();
        name.push(0);
        let name = push_array(&mut buf, name.len(), &name);
        let global_sequences = push_array(
            &mut buf,
            self.global_sequences.len(),
            &u32_bytes(&self.global_sequences),
        );
        let sequences = push_array(&mut buf, self.sequences.len(), &self.sequence_records());
        let bone_records = self.bone_records(&mut buf);
        let bones = push_array(&mut buf, self.bones.len(), &bone_records);
        let vertices = push_array(&mut buf, self.vertices.len(), &self.vertex_bytes());

        let skin_vertices =
            push_array(&mut buf, self.vertex_map.len(), &u16_bytes(&self.vertex_map));
        let skin_indices = push_array(&mut buf, self.indices.len(), &u16_bytes(&self.indices));
        let submeshes = push_array(&mut buf, self.submeshes.len(), &self.submesh_records());
        let batches = push_array(&mut buf, self.batches.len(), &self.batch_records());

        let mut texture_records = vec![];
        for filename in &self.textures {
            let mut bytes = filename.clone().into_bytes();
            bytes.push(0);
            let filename = push_array(&mut buf, bytes.len(), &bytes);
            texture_records.extend_from_slice(&u32_bytes(&[0, 3]));
            desc_bytes(&mut texture_records, filename);
        }
        let textures = push_array(&mut buf, self.textures.len(), &texture_records);
        let material_records = vec![0u8; 4 * self.textures.len()];
        let materials = push_array(&mut buf, self.textures.len(), &material_records);
        let lookup_records = u16_bytes(&self.texture_lookup);
        let texture_lookup = push_array(&mut buf, self.texture_lookup.len(), &lookup_records);
        let attachments = push_array(&mut buf, self.attachments.len(), &self.attachment_records());
        let lookup: Vec<u16> = self.attachments.iter().map(|a| a.0 as u16).collect();
        let attachment_lookup = push_array(&mut buf, lookup.len(), &u16_bytes(&lookup));
        align(&mut buf);

        let mut skin = vec![];
        for desc in [skin_vertices, skin_indices, (0, 0), submeshes, batches] {
            desc_bytes(&mut skin, desc);
        }
        skin.extend_from_slice(&64u32.to_le_bytes());
        buf[skin_at..skin_at + 44].copy_from_slice(&skin);

        put_desc(&mut buf, 0x08, name);
        put_desc(&mut buf, 0x14, global_sequences);
        put_desc(&mut buf, 0x1C, sequences);
        put_desc(&mut buf, p, bones);
        put_desc(&mut buf, p + 0x10, vertices);
        if extended {
            put_desc(&mut buf, p + 0x18, (1, skin_at as u32));
        } else {
            put_u32(&mut buf, p + 0x18, 1);
        }
        put_desc(&mut buf, q, textures);
        put_desc(&mut buf, q + 0x08, materials);
        put_desc(&mut buf, q + 0x18, texture_lookup);
        buf[q + 0x20..q + 0x38].copy_from_slice(&f32_bytes(&[-1.0, -1.0, 0.0, 1.0, 1.0, 3.0]));
        buf[q + 0x38..q + 0x3C].copy_from_slice(&f32_bytes(&[3.5]));
        put_desc(&mut buf, q + 0x3C, attachments);
        put_desc(&mut buf, q + 0x44, attachment_lookup);
        buf
    }
}

pub fn vkey(time: u16, value: [f32; 3]) -> VectorKey {
    VectorKey {
        time,
        value: M2Vector3::new(value[0], value[1], value[2]),
    }
}

pub fn qkey(time: u16, value: [f32; 4]) -> QuaternionKey {
    QuaternionKey {
        time,
        value: M2Quaternion::from_xyzw(value[0], value[1], value[2], value[3]),
    }
}

pub fn sequence(id: u16, sub_id: u16, duration: u32) -> AnimSequence {
    AnimSequence {
        id,
        sub_id,
        duration,
        variation_next: -1,
        alias_next: -1,
        ..Default::default()
    }
}

pub fn linear_meta(global: [i8; 3]) -> BoneTrackMeta {
    BoneTrackMeta {
        interpolation: [1, 1, 1],
        global_sequence: global,
        reserved: [0, 0],
    }
}

/// Animation for [`two_bone_fixture`] / [`character_fixture`] bones:
/// sequence 0 (id 0, 1000 ms) slides the root along x, sequence 1 (id 4,
/// 600 ms) lifts it along z. The child's scale track is driven by global
/// sequence 0 (4000 ms) from the run stored under sequence 0.
pub fn two_bone_animation() -> AnimationFile {
    let sequences = vec![sequence(0, 0, 1000), sequence(4, 0, 600)];
    let bone_meta = vec![linear_meta([-1, -1, -1]), linear_meta([-1, -1, 0])];
    let pairs = vec![
        // root, sequence 0
        PairKeys {
            translation: vec![vkey(0, [0.0, 0.0, 0.0]), vkey(1000, [10.0, 0.0, 0.0])],
            ..Default::default()
        },
        // root, sequence 1
        PairKeys {
            translation: vec![vkey(0, [0.0, 0.0, 0.0]), vkey(600, [0.0, 0.0, 6.0])],
            ..Default::default()
        },
        // child, sequence 0
        PairKeys {
            rotation: vec![qkey(0, [0.0, 0.0, 0.0, 1.0])],
            scale: vec![vkey(0, [1.0, 1.0, 1.0]), vkey(4000, [5.0, 5.0, 5.0])],
            ..Default::default()
        },
        // child, sequence 1
        PairKeys::default(),
    ];
    AnimationFile::new(sequences, vec![4000], bone_meta, pairs).unwrap()
}
