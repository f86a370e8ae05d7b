use binrw::binrw;
use serde::Serialize;

use crate::{
    error::{ParseError, Result},
    math::M2Vector3,
    reader::{fixed_record, ArrayDescriptor, BinaryReader, FixedRecord},
};

use super::{
    header::{HeaderLayout, ModelHeader, SKIN_PROFILE_STRIDE},
    ParseDiagnostic,
};

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SkinProfileRecord {
    pub vertices: ArrayDescriptor,
    pub indices: ArrayDescriptor,
    pub properties: ArrayDescriptor,
    pub submeshes: ArrayDescriptor,
    pub batches: ArrayDescriptor,
    pub max_bones: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SubmeshRecord {
    pub id: u16,
    pub level: u16,
    pub vertex_start: u16,
    pub vertex_count: u16,
    pub index_start: u16,
    pub index_count: u16,
    pub bone_count: u16,
    pub bone_combo_index: u16,
    pub bone_influences: u16,
    pub center_bone_index: u16,
    pub center: M2Vector3,
}

/// Trailing sort bounds of an extended submesh record.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SubmeshSortRecord {
    pub sort_center: M2Vector3,
    pub sort_radius: f32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BatchRecord {
    pub flags: u8,
    pub priority_plane: i8,
    pub shader_id: u16,
    pub submesh_index: u16,
    pub geoset_index: u16,
    pub color_index: i16,
    pub material_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    pub transparency_combo_index: u16,
    pub texture_transform_combo_index: u16,
}

fixed_record! {
    SkinProfileRecord => 44,
    SubmeshRecord => 32,
    SubmeshSortRecord => 16,
    BatchRecord => 24,
    [u8; 4] => 4,
}

/// A contiguous run of the profile's resolved triangle index list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IndexRange {
    pub start: u32,
    pub count: u32,
}

impl IndexRange {
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submesh {
    /// Geoset id: `group = id / 100`, `variant = id % 100`.
    pub id: u16,
    pub level: u16,
    pub vertex_start: u16,
    pub vertex_count: u16,
    /// Already extended by `level << 16`.
    pub index_start: u32,
    pub index_count: u32,
    pub bone_count: u16,
    pub bone_combo_index: u16,
    pub bone_influences: u16,
    pub center_bone_index: u16,
    pub center: M2Vector3,
    pub sort_center: Option<M2Vector3>,
    pub sort_radius: Option<f32>,
}

impl Submesh {
    pub fn group(&self) -> u16 {
        self.id / 100
    }

    pub fn variant(&self) -> u16 {
        self.id % 100
    }

    pub fn index_range(&self) -> IndexRange {
        IndexRange {
            start: self.index_start,
            count: self.index_count,
        }
    }

    fn from_record(record: SubmeshRecord, sort: Option<SubmeshSortRecord>) -> Self {
        Self {
            id: record.id,
            level: record.level,
            vertex_start: record.vertex_start,
            vertex_count: record.vertex_count,
            index_start: record.index_start as u32 + ((record.level as u32) << 16),
            index_count: record.index_count as u32,
            bone_count: record.bone_count,
            bone_combo_index: record.bone_combo_index,
            bone_influences: record.bone_influences,
            center_bone_index: record.center_bone_index,
            center: record.center,
            sort_center: sort.map(|s| s.sort_center),
            sort_radius: sort.map(|s| s.sort_radius),
        }
    }
}

/// A texture unit: draws one submesh with one material and texture chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub flags: u8,
    pub priority_plane: i8,
    pub shader_id: u16,
    pub submesh_index: u16,
    pub geoset_index: u16,
    pub color_index: i16,
    pub material_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    pub transparency_combo_index: u16,
    pub texture_transform_combo_index: u16,
    /// Extended layout only.
    pub texture_unit_flags: Option<u16>,
    /// Texture table entry reached through the texture lookup. Set once the
    /// batch has been resolved.
    pub texture_index: Option<usize>,
}

impl Batch {
    fn from_record(record: BatchRecord, texture_unit_flags: Option<u16>) -> Self {
        Self {
            flags: record.flags,
            priority_plane: record.priority_plane,
            shader_id: record.shader_id,
            submesh_index: record.submesh_index,
            geoset_index: record.geoset_index,
            color_index: record.color_index,
            material_index: record.material_index,
            material_layer: record.material_layer,
            texture_count: record.texture_count,
            texture_combo_index: record.texture_combo_index,
            texture_coord_combo_index: record.texture_coord_combo_index,
            transparency_combo_index: record.transparency_combo_index,
            texture_transform_combo_index: record.texture_transform_combo_index,
            texture_unit_flags,
            texture_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinProfile {
    /// Local vertex index -> model vertex index.
    pub vertex_map: Vec<u16>,
    /// Triangle list already mapped to model vertex indices.
    pub indices: Vec<u32>,
    pub bone_properties: Vec<[u8; 4]>,
    pub submeshes: Vec<Submesh>,
    pub batches: Vec<Batch>,
    pub max_bones: u32,
}

impl SkinProfile {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn submesh_indices(&self, submesh: &Submesh) -> &[u32] {
        let start = (submesh.index_start as usize).min(self.indices.len());
        let end = (submesh.index_range().end() as usize).min(self.indices.len());
        &self.indices[start..end]
    }

    /// Follow every batch's `texture_combo_index -> texture_lookup -> texture`
    /// chain. Batches whose chain or submesh reference cannot be resolved are
    /// dropped and reported.
    pub fn resolve_batches(
        &mut self,
        profile: usize,
        texture_lookup: &[u16],
        texture_count: usize,
    ) -> Vec<ParseDiagnostic> {
        let mut diagnostics = vec![];
        let submesh_count = self.submeshes.len();
        let batches = std::mem::take(&mut self.batches);

        for (i, mut batch) in batches.into_iter().enumerate() {
            if batch.submesh_index as usize >= submesh_count {
                diagnostics.push(ParseDiagnostic::warn(
                    "batch",
                    i,
                    format!(
                        "profile {}: submesh {} out of range ({} submeshes)",
                        profile, batch.submesh_index, submesh_count
                    ),
                ));
                continue;
            }

            let Some(&texture) = texture_lookup.get(batch.texture_combo_index as usize) else {
                diagnostics.push(ParseDiagnostic::warn(
                    "batch",
                    i,
                    format!(
                        "profile {}: texture combo {} out of range ({} lookup entries)",
                        profile,
                        batch.texture_combo_index,
                        texture_lookup.len()
                    ),
                ));
                continue;
            };
            if texture as usize >= texture_count {
                diagnostics.push(ParseDiagnostic::warn(
                    "batch",
                    i,
                    format!(
                        "profile {}: texture {} out of range ({} textures)",
                        profile, texture, texture_count
                    ),
                ));
                continue;
            }

            batch.texture_index = Some(texture as usize);
            self.batches.push(batch);
        }

        diagnostics
    }
}

pub fn parse_skin_sections(buf: &[u8], header: &ModelHeader) -> Result<Vec<SkinProfile>> {
    read_skin_sections(&BinaryReader::new(buf), header)
}

pub(crate) fn read_skin_sections(
    reader: &BinaryReader,
    header: &ModelHeader,
) -> Result<Vec<SkinProfile>> {
    let records: Vec<SkinProfileRecord> =
        reader.read_strided("skin profiles", header.skin_profiles, SKIN_PROFILE_STRIDE)?;
    let vertex_count = header.vertices.count as usize;

    records
        .into_iter()
        .map(|record| read_skin_profile(reader, header.layout, record, vertex_count))
        .collect()
}

fn read_skin_profile(
    reader: &BinaryReader,
    layout: HeaderLayout,
    record: SkinProfileRecord,
    vertex_count: usize,
) -> Result<SkinProfile> {
    let vertex_map: Vec<u16> = reader.read_array("skin vertices", record.vertices)?;
    if let Some(&bad) = vertex_map.iter().find(|&&v| v as usize >= vertex_count) {
        return Err(ParseError::OutOfRangeIndex {
            what: "skin vertex",
            index: bad as usize,
            limit: vertex_count,
        });
    }

    let local_indices: Vec<u16> = reader.read_array("skin indices", record.indices)?;
    let indices = local_indices
        .iter()
        .map(|&local| {
            vertex_map
                .get(local as usize)
                .map(|&global| global as u32)
                .ok_or(ParseError::OutOfRangeIndex {
                    what: "skin index",
                    index: local as usize,
                    limit: vertex_map.len(),
                })
        })
        .collect::<Result<Vec<u32>>>()?;

    let bone_properties: Vec<[u8; 4]> = reader.read_array("skin properties", record.properties)?;

    let submesh_stride = layout.submesh_stride();
    reader.check_array("submeshes", record.submeshes, submesh_stride)?;
    let mut submeshes = Vec::with_capacity(record.submeshes.count as usize);
    for i in 0..record.submeshes.count as usize {
        let offset = record.submeshes.offset as usize + i * submesh_stride;
        let sort = match layout {
            HeaderLayout::Classic => None,
            HeaderLayout::Extended => {
                Some(reader.read_record::<SubmeshSortRecord>(offset + SubmeshRecord::SIZE)?)
            }
        };
        let submesh = Submesh::from_record(reader.read_record(offset)?, sort);

        let end = submesh.index_range().end() as usize;
        if end > indices.len() {
            return Err(ParseError::OutOfRangeIndex {
                what: "submesh index range",
                index: end,
                limit: indices.len(),
            });
        }
        submeshes.push(submesh);
    }

    let batch_stride = layout.batch_stride();
    reader.check_array("batches", record.batches, batch_stride)?;
    let mut batches = Vec::with_capacity(record.batches.count as usize);
    for i in 0..record.batches.count as usize {
        let offset = record.batches.offset as usize + i * batch_stride;
        let texture_unit_flags = match layout {
            HeaderLayout::Classic => None,
            HeaderLayout::Extended => Some(reader.read_u16(offset + BatchRecord::SIZE)?),
        };
        batches.push(Batch::from_record(reader.read_record(offset)?, texture_unit_flags));
    }

    Ok(SkinProfile {
        vertex_map,
        indices,
        bone_properties,
        submeshes,
        batches,
        max_bones: record.max_bones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submesh(id: u16, level: u16, index_start: u16, index_count: u16) -> Submesh {
        Submesh::from_record(
            SubmeshRecord {
                id,
                level,
                index_start,
                index_count,
                ..Default::default()
            },
            None,
        )
    }

    fn batch(submesh_index: u16, texture_combo_index: u16) -> Batch {
        Batch::from_record(
            BatchRecord {
                submesh_index,
                texture_combo_index,
                ..Default::default()
            },
            None,
        )
    }

    fn profile(batches: Vec<Batch>) -> SkinProfile {
        SkinProfile {
            vertex_map: vec![0, 1, 2],
            indices: vec![0, 1, 2],
            bone_properties: vec![],
            submeshes: vec![submesh(0, 0, 0, 3)],
            batches,
            max_bones: 0,
        }
    }

    #[test]
    fn geoset_id_decodes_group_and_variant() {
        let s = submesh(1302, 0, 0, 0);
        assert_eq!(s.group(), 13);
        assert_eq!(s.variant(), 2);
    }

    #[test]
    fn level_extends_index_start() {
        let s = submesh(0, 1, 6, 3);
        assert_eq!(s.index_start, 65536 + 6);
        assert_eq!(s.index_range(), IndexRange { start: 65542, count: 3 });
    }

    #[test]
    fn batches_resolve_through_texture_lookup() {
        let mut skin = profile(vec![batch(0, 1)]);
        let diagnostics = skin.resolve_batches(0, &[5, 0], 2);
        assert!(diagnostics.is_empty());
        assert_eq!(skin.batches[0].texture_index, Some(0));
    }

    #[test]
    fn unresolvable_batches_are_dropped_with_diagnostics() {
        let mut skin = profile(vec![batch(0, 0), batch(0, 9), batch(4, 1), batch(0, 1)]);
        let diagnostics = skin.resolve_batches(0, &[5, 1], 2);

        assert_eq!(skin.batches.len(), 1);
        assert_eq!(skin.batches[0].texture_index, Some(1));
        let dropped: Vec<usize> = diagnostics.iter().map(|d| d.index).collect();
        assert_eq!(dropped, vec![0, 1, 2]);
    }

    #[test]
    fn submesh_indices_slice() {
        let skin = SkinProfile {
            indices: vec![0, 1, 2, 2, 1, 3],
            submeshes: vec![submesh(0, 0, 3, 3)],
            ..profile(vec![])
        };
        assert_eq!(skin.submesh_indices(&skin.submeshes[0]), &[2, 1, 3]);
        assert_eq!(skin.triangle_count(), 2);
    }

    #[test]
    fn record_sizes() {
        assert_eq!(SkinProfileRecord::SIZE, SKIN_PROFILE_STRIDE);
        assert_eq!(
            SubmeshRecord::SIZE + SubmeshSortRecord::SIZE,
            HeaderLayout::Extended.submesh_stride()
        );
        assert_eq!(BatchRecord::SIZE, HeaderLayout::Classic.batch_stride());
    }
}
