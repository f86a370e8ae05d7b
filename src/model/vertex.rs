use binrw::binrw;
use serde::Serialize;

use crate::{
    error::{ParseError, Result},
    math::M2Vector3,
    reader::{fixed_record, BinaryReader},
};

use super::header::ModelHeader;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vertex {
    pub position: M2Vector3,
    /// Sum to at most 255.
    pub bone_weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: M2Vector3,
    pub tex_coords: [f32; 2],
    pub tex_coords2: [f32; 2],
}

fixed_record! { Vertex => 48 }

impl Vertex {
    pub fn weight_sum(&self) -> u32 {
        self.bone_weights.iter().map(|&w| w as u32).sum()
    }

    /// Influences with a non-zero weight, as `(bone, weight / 255)`.
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bone_indices
            .iter()
            .zip(self.bone_weights.iter())
            .filter(|(_, w)| **w > 0)
            .map(|(&b, &w)| (b as usize, w as f32 / 255.0))
    }
}

pub fn parse_vertices(buf: &[u8], header: &ModelHeader) -> Result<Vec<Vertex>> {
    read_vertices(&BinaryReader::new(buf), header)
}

pub(crate) fn read_vertices(reader: &BinaryReader, header: &ModelHeader) -> Result<Vec<Vertex>> {
    let vertices: Vec<Vertex> = reader.read_array("vertices", header.vertices)?;
    let bone_count = header.bones.count as usize;

    for vertex in &vertices {
        // Indices with zero weight are still checked; a renderer may read them.
        if let Some(&index) = vertex.bone_indices.iter().find(|&&i| i as usize >= bone_count) {
            return Err(ParseError::OutOfRangeIndex {
                what: "vertex bone",
                index: index as usize,
                limit: bone_count,
            });
        }
    }

    Ok(vertices)
}
