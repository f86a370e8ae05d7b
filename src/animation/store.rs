use std::ops::Range;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    error::AnimationError,
    math::{M2Quaternion, M2Vector3},
    model::{Interpolation, TrackKind},
};

use super::file::{AnimSequence, AnimationFile};

/// Location of one keyframe run inside a channel's flat arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSpan {
    pub start: u32,
    pub len: u32,
}

impl RunSpan {
    fn range(&self) -> Range<usize> {
        self.start as usize..self.start as usize + self.len as usize
    }
}

/// Resolved timing source of one bone track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackSource {
    pub interpolation: Interpolation,
    /// Index into the store's global sequences. `None` follows the active
    /// sequence's local clock.
    pub global_sequence: Option<usize>,
}

impl Default for TrackSource {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Linear,
            global_sequence: None,
        }
    }
}

/// A borrowed, time-ascending run of keys.
#[derive(Debug, Clone, Copy)]
pub struct KeyframeRun<'a, T> {
    pub times: &'a [u16],
    pub values: &'a [T],
}

impl<T> KeyframeRun<'_, T> {
    pub fn len(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
struct Channel<T> {
    times: Vec<u16>,
    values: Vec<T>,
}

impl<T: Copy> Channel<T> {
    fn push_run(&mut self, keys: impl Iterator<Item = (u16, T)>) -> RunSpan {
        let start = self.times.len();
        for (time, value) in keys {
            self.times.push(time);
            self.values.push(value);
        }
        RunSpan {
            start: start as u32,
            len: (self.times.len() - start) as u32,
        }
    }

    fn run(&self, span: RunSpan) -> KeyframeRun<'_, T> {
        let range = span.range();
        KeyframeRun {
            times: self.times.get(range.clone()).unwrap_or(&[]),
            values: self.values.get(range).unwrap_or(&[]),
        }
    }
}

/// Every keyframe run of an animation file, decoded once into flat per-channel
/// arrays. Looking up a run is an index into `spans`; sampling it is a binary
/// search over that run only.
#[derive(Debug, Clone)]
pub struct KeyframeStore {
    sequences: Vec<AnimSequence>,
    global_sequences: Vec<u32>,
    tracks: Vec<[TrackSource; 3]>,
    /// Bone major: `bone * sequence_count + sequence`.
    spans: Vec<[RunSpan; 3]>,
    translation: Channel<M2Vector3>,
    rotation: Channel<M2Quaternion>,
    scale: Channel<M2Vector3>,
}

impl KeyframeStore {
    pub fn from_bytes(buf: &[u8]) -> Result<Self, AnimationError> {
        Ok(Self::from_file(&AnimationFile::parse(buf)?))
    }

    pub fn from_file(file: &AnimationFile) -> Self {
        let global_count = file.global_sequences.len();
        let tracks = file
            .bone_meta
            .iter()
            .enumerate()
            .map(|(bone, meta)| {
                let mut sources = [TrackSource::default(); 3];
                for kind in TrackKind::ALL {
                    let k = kind.index();
                    let global_sequence = match meta.global_sequence[k] {
                        g if g < 0 => None,
                        g if (g as usize) < global_count => Some(g as usize),
                        g => {
                            warn!(
                                "bone {} {:?}: no global sequence {} (of {}), using local clock",
                                bone, kind, g, global_count
                            );
                            None
                        }
                    };
                    sources[k] = TrackSource {
                        interpolation: Interpolation::from_raw(meta.interpolation[k] as i32),
                        global_sequence,
                    };
                }
                sources
            })
            .collect();

        let mut translation = Channel::default();
        let mut rotation = Channel::default();
        let mut scale = Channel::default();
        let spans = file
            .pairs
            .iter()
            .map(|pair| {
                [
                    translation.push_run(pair.translation.iter().map(|k| (k.time, k.value))),
                    rotation.push_run(pair.rotation.iter().map(|k| (k.time, k.value))),
                    scale.push_run(pair.scale.iter().map(|k| (k.time, k.value))),
                ]
            })
            .collect();

        debug!(
            "keyframe store: {} bones, {} sequences, {} global sequences, keys t{} r{} s{}",
            file.bone_meta.len(),
            file.sequences.len(),
            global_count,
            translation.times.len(),
            rotation.times.len(),
            scale.times.len()
        );

        Self {
            sequences: file.sequences.clone(),
            global_sequences: file.global_sequences.clone(),
            tracks,
            spans,
            translation,
            rotation,
            scale,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequences(&self) -> &[AnimSequence] {
        &self.sequences
    }

    pub fn sequence(&self, index: usize) -> Option<&AnimSequence> {
        self.sequences.get(index)
    }

    /// First sequence in storage order that plays clip `id`.
    pub fn find_sequence(&self, id: u16) -> Option<usize> {
        self.sequences.iter().position(|s| s.id == id)
    }

    /// Durations in milliseconds.
    pub fn global_sequences(&self) -> &[u32] {
        &self.global_sequences
    }

    pub fn track(&self, bone: usize, kind: TrackKind) -> Option<TrackSource> {
        self.tracks.get(bone).map(|t| t[kind.index()])
    }

    fn span(&self, bone: usize, sequence: usize, kind: TrackKind) -> RunSpan {
        if bone >= self.bone_count() || sequence >= self.sequence_count() {
            return RunSpan::default();
        }
        self.spans
            .get(bone * self.sequence_count() + sequence)
            .map(|s| s[kind.index()])
            .unwrap_or_default()
    }

    pub fn translation_run(&self, bone: usize, sequence: usize) -> KeyframeRun<'_, M2Vector3> {
        self.translation.run(self.span(bone, sequence, TrackKind::Translation))
    }

    pub fn rotation_run(&self, bone: usize, sequence: usize) -> KeyframeRun<'_, M2Quaternion> {
        self.rotation.run(self.span(bone, sequence, TrackKind::Rotation))
    }

    pub fn scale_run(&self, bone: usize, sequence: usize) -> KeyframeRun<'_, M2Vector3> {
        self.scale.run(self.span(bone, sequence, TrackKind::Scale))
    }
}
