use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};
use ptree::TreeBuilder;

use crate::{
    error::ParseError,
    math::M2Quaternion,
    model::{hierarchy_order, Attachment, Bone},
};

use super::{
    sampler::{sample_bone, AnimationState, LocalPose},
    store::KeyframeStore,
};

/// `T(pivot + translation) * R * S * T(-pivot)`: the bone rotates and scales
/// about its pivot, then moves by its translation.
pub fn local_matrix(pivot: Vector3<f32>, pose: &LocalPose) -> Matrix4<f32> {
    let rotation = pose.rotation.0;
    let rotation = if rotation.magnitude2() > f32::EPSILON {
        rotation.normalize()
    } else {
        M2Quaternion::IDENTITY.0
    };
    let scale = pose.scale.0;

    Matrix4::from_translation(pivot + pose.translation.0)
        * Matrix4::from(rotation)
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
        * Matrix4::from_translation(-pivot)
}

/// Bone hierarchy with its evaluation order resolved once.
#[derive(Debug, Clone)]
pub struct Skeleton {
    order: Vec<usize>,
    parents: Vec<Option<usize>>,
    pivots: Vec<Vector3<f32>>,
}

impl Skeleton {
    pub fn new(bones: &[Bone]) -> Result<Self, ParseError> {
        Ok(Self {
            order: hierarchy_order(bones)?,
            parents: bones.iter().map(|b| b.parent).collect(),
            pivots: bones.iter().map(|b| b.pivot.0).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Parent-before-child evaluation order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn parent(&self, bone: usize) -> Option<usize> {
        self.parents.get(bone).copied().flatten()
    }

    /// Fills `out` with one matrix per bone: `parent * local`, identity parent
    /// for roots.
    pub fn compose(&self, mut pose: impl FnMut(usize) -> LocalPose, out: &mut Vec<Matrix4<f32>>) {
        out.clear();
        out.resize(self.len(), Matrix4::identity());

        for &bone in &self.order {
            let local = local_matrix(self.pivots[bone], &pose(bone));
            out[bone] = match self.parents[bone] {
                Some(parent) => out[parent] * local,
                None => local,
            };
        }
    }

    pub fn rest_pose(&self, bones: &[Bone], out: &mut Vec<Matrix4<f32>>) {
        let fallback = LocalPose::rest(&Bone::default());
        self.compose(|i| bones.get(i).map(LocalPose::rest).unwrap_or(fallback), out);
    }

    /// Sample every bone at the state's clocks and compose the result.
    pub fn animate(
        &self,
        bones: &[Bone],
        store: &KeyframeStore,
        state: &AnimationState,
        out: &mut Vec<Matrix4<f32>>,
    ) {
        let fallback = Bone::default();
        self.compose(
            |i| sample_bone(store, state, i, bones.get(i).unwrap_or(&fallback)),
            out,
        );
    }

    /// The bone's placed frame: its matrix applied at its pivot. A bone at
    /// rest is a pure translation to its pivot.
    pub fn world_transform(&self, matrices: &[Matrix4<f32>], bone: usize) -> Option<Matrix4<f32>> {
        let matrix = matrices.get(bone)?;
        let pivot = self.pivots.get(bone)?;
        Some(matrix * Matrix4::from_translation(*pivot))
    }

    pub fn attachment_transform(
        &self,
        matrices: &[Matrix4<f32>],
        attachment: &Attachment,
    ) -> Option<Matrix4<f32>> {
        let matrix = matrices.get(attachment.bone)?;
        Some(matrix * Matrix4::from_translation(attachment.offset.0))
    }

    fn add_bone_to_tree(
        &self,
        bone: usize,
        bones: &[Bone],
        children: &[Vec<usize>],
        tree: &mut TreeBuilder,
    ) {
        let label = match bones.get(bone) {
            Some(b) if b.key_bone_id >= 0 => format!("[{}] key bone {}", bone, b.key_bone_id),
            _ => format!("[{}]", bone),
        };

        if children[bone].is_empty() {
            tree.add_empty_child(label);
        } else {
            tree.begin_child(label);
            for &child in &children[bone] {
                self.add_bone_to_tree(child, bones, children, tree);
            }
            tree.end_child();
        }
    }

    /// Text rendering of the hierarchy, one line per bone.
    pub fn hierarchy_tree(&self, bones: &[Bone]) -> std::io::Result<String> {
        let mut children = vec![Vec::new(); self.len()];
        for (bone, parent) in self.parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(bone);
            }
        }

        let mut tree = TreeBuilder::new("bones".to_string());
        for root in (0..self.len()).filter(|&b| self.parents[b].is_none()) {
            self.add_bone_to_tree(root, bones, &children, &mut tree);
        }

        let mut out = Vec::new();
        ptree::write_tree(&tree.build(), &mut out)?;
        Ok(String::from_utf8_lossy(&out).to_string())
    }
}
