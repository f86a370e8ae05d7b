//! GPU-ready vertex and index buffers, plus CPU skinning for previews.

use cgmath::{Matrix4, Vector4};

use crate::{
    geoset::build_draw_indices,
    model::{IndexRange, Model, Vertex},
};

/// Vertex layout uploaded for GPU skinning. Bone weights are normalised to
/// `0..=1`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub bone_weights: [f32; 4],
    pub bone_indices: [u32; 4],
}

impl From<&Vertex> for GpuVertex {
    fn from(vertex: &Vertex) -> Self {
        Self {
            position: vertex.position.to_slice(),
            normal: vertex.normal.to_slice(),
            tex_coords: vertex.tex_coords,
            bone_weights: vertex.bone_weights.map(|w| w as f32 / 255.0),
            bone_indices: vertex.bone_indices.map(|i| i as u32),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    pub vertices: Vec<GpuVertex>,
    pub indices: Vec<u32>,
}

impl VertexBuffer {
    /// All model vertices with the draw list of the active skin profile,
    /// restricted to `ranges`.
    pub fn from_model(model: &Model, ranges: &[IndexRange]) -> Self {
        let indices = model
            .skin()
            .map(|skin| build_draw_indices(&skin.indices, ranges))
            .unwrap_or_default();

        Self {
            vertices: model.vertices.iter().map(GpuVertex::from).collect(),
            indices,
        }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Skin positions on the CPU: `sum(weight / 255 * M[bone] * p)`, with no
/// renormalisation of weights that sum below 255. Vertices without weight
/// keep their bind position, as do influences on bones missing from
/// `bone_matrices`.
pub fn deform_positions(vertices: &[Vertex], bone_matrices: &[Matrix4<f32>]) -> Vec<[f32; 3]> {
    vertices
        .iter()
        .map(|vertex| {
            let p = vertex.position.0;
            let bind = Vector4::new(p.x, p.y, p.z, 1.0);
            let mut skinned = Vector4::new(0.0, 0.0, 0.0, 0.0);
            let mut weighted = false;

            for (bone, weight) in vertex.influences() {
                let moved = match bone_matrices.get(bone) {
                    Some(m) => m * bind,
                    None => bind,
                };
                skinned += moved * weight;
                weighted = true;
            }

            if !weighted {
                return p.into();
            }
            [skinned.x, skinned.y, skinned.z]
        })
        .collect()
}
