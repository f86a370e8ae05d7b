//! Runtime skeletal animation: the converted keyframe file, the flat
//! keyframe store built from it, per-instance sampling and matrix composition.

pub mod file;
pub mod sampler;
pub mod skeleton;
pub mod store;

pub use file::{AnimSequence, AnimationFile, BoneTrackMeta, PairKeys, QuaternionKey, VectorKey};
pub use sampler::{sample_bone, sample_run, AnimationState, LocalPose};
pub use skeleton::{local_matrix, Skeleton};
pub use store::{KeyframeRun, KeyframeStore, TrackSource};
