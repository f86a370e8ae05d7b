use std::{collections::HashSet, sync::Arc};

use cgmath::{Matrix4, SquareMatrix};
use log::warn;

use crate::{
    animation::{AnimationState, KeyframeStore, Skeleton},
    error::{AnimationError, ParseError},
    geoset::select_visible,
    model::{IndexRange, Model},
};

/// Immutable data shared by every instance of one model.
#[derive(Debug)]
pub struct ModelAsset {
    pub model: Model,
    pub animation: Option<KeyframeStore>,
    pub skeleton: Skeleton,
}

impl ModelAsset {
    pub fn new(model: Model, animation: Option<KeyframeStore>) -> Result<Arc<Self>, ParseError> {
        let skeleton = Skeleton::new(&model.bones)?;

        if let Some(store) = &animation {
            if store.bone_count() != model.bones.len() {
                warn!(
                    "animation has {} bones but model {:?} has {}; missing bones stay at rest",
                    store.bone_count(),
                    model.name,
                    model.bones.len()
                );
            }
        }

        Ok(Arc::new(Self {
            model,
            animation,
            skeleton,
        }))
    }
}

/// One animated copy of a shared asset. Owns its clocks and pose buffer.
#[derive(Debug)]
pub struct ModelInstance {
    asset: Arc<ModelAsset>,
    state: Option<AnimationState>,
    matrices: Vec<Matrix4<f32>>,
}

impl ModelInstance {
    pub fn new(asset: Arc<ModelAsset>) -> Self {
        let state = asset.animation.as_ref().map(AnimationState::new);
        let mut instance = Self {
            asset,
            state,
            matrices: vec![],
        };
        instance.refresh_pose();
        instance
    }

    pub fn asset(&self) -> &Arc<ModelAsset> {
        &self.asset
    }

    pub fn state(&self) -> Option<&AnimationState> {
        self.state.as_ref()
    }

    fn refresh_pose(&mut self) {
        let asset = &self.asset;
        match (&asset.animation, &self.state) {
            (Some(store), Some(state)) => {
                asset.skeleton.animate(&asset.model.bones, store, state, &mut self.matrices)
            }
            _ => asset.skeleton.rest_pose(&asset.model.bones, &mut self.matrices),
        }
    }

    fn animation(&mut self) -> Option<(&KeyframeStore, &mut AnimationState)> {
        match (self.asset.animation.as_ref(), self.state.as_mut()) {
            (Some(store), Some(state)) => Some((store, state)),
            _ => None,
        }
    }

    /// Fails with `MissingSequence` for an unknown index, or for any index
    /// when the asset has no animation.
    pub fn set_sequence(&mut self, index: usize) -> Result<(), AnimationError> {
        let (store, state) = self
            .animation()
            .ok_or(AnimationError::MissingSequence { index, count: 0 })?;
        state.set_sequence(store, index)?;
        self.refresh_pose();
        Ok(())
    }

    pub fn set_sequence_by_id(&mut self, id: u16) -> Result<usize, AnimationError> {
        let (store, state) = self.animation().ok_or(AnimationError::MissingSequenceId { id })?;
        let index = state.set_sequence_by_id(store, id)?;
        self.refresh_pose();
        Ok(index)
    }

    /// Advance the clocks and recompute every bone matrix.
    pub fn update(&mut self, delta_ms: f64) {
        if let Some((store, state)) = self.animation() {
            state.update(store, delta_ms);
        }
        self.refresh_pose();
    }

    pub fn pause(&mut self) {
        if let Some(state) = &mut self.state {
            state.pause();
        }
    }

    pub fn resume(&mut self) {
        if let Some(state) = &mut self.state {
            state.resume();
        }
    }

    pub fn bone_matrices(&self) -> &[Matrix4<f32>] {
        &self.matrices
    }

    /// Column-major matrices as bytes, ready for a uniform or storage buffer.
    pub fn bone_matrix_bytes(&self) -> Vec<u8> {
        let columns: Vec<[[f32; 4]; 4]> = self.matrices.iter().map(|&m| m.into()).collect();
        bytemuck::cast_slice(&columns).to_vec()
    }

    pub fn world_transform(&self, bone: usize) -> Option<Matrix4<f32>> {
        self.asset.skeleton.world_transform(&self.matrices, bone)
    }

    /// Transform of attachment point `id`, or `None` if the model has no such
    /// attachment.
    pub fn attachment_transform(&self, id: u32) -> Option<Matrix4<f32>> {
        let attachment = self.asset.model.attachment(id)?;
        self.asset.skeleton.attachment_transform(&self.matrices, attachment)
    }

    pub fn visible_ranges(&self, enabled_ids: &HashSet<u32>) -> Vec<IndexRange> {
        select_visible(self.asset.model.submeshes(), enabled_ids)
    }

    /// Matrix of `bone`, identity for unknown bones.
    pub fn bone_matrix(&self, bone: usize) -> Matrix4<f32> {
        self.matrices.get(bone).copied().unwrap_or_else(Matrix4::identity)
    }
}
