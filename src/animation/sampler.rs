use serde::Serialize;

use crate::{
    error::AnimationError,
    math::{Interpolate, M2Quaternion, M2Vector3},
    model::{Bone, Interpolation, TrackKind},
};

use super::store::{KeyframeRun, KeyframeStore};

/// Surrounding key indices for `time`: `(i, i + 1)` with `times[i] <= time`,
/// or `(i, i)` when `time` is before the first or after the last key.
fn find_keyframe_indices(times: &[u16], time: f64) -> (usize, usize) {
    let pos = times.partition_point(|&t| t as f64 <= time);

    if pos == 0 {
        (0, 0) // before first keyframe
    } else if pos >= times.len() {
        let last = times.len() - 1;
        (last, last) // at or after last keyframe
    } else {
        (pos - 1, pos)
    }
}

/// Sample one run at `time` milliseconds. Returns `None` for an empty run so
/// the caller can fall back to the bone's rest value.
pub fn sample_run<T: Interpolate>(
    run: KeyframeRun<'_, T>,
    time: f64,
    interpolation: Interpolation,
) -> Option<T> {
    let len = run.len();
    if len == 0 {
        return None;
    }
    if len == 1 {
        return Some(run.values[0]);
    }

    let times = &run.times[..len];
    // NaN and negative times clamp to the first key, +inf to the last
    let time = if time.is_nan() { 0.0 } else { time.clamp(0.0, f64::MAX) };
    let (prev, next) = find_keyframe_indices(times, time);
    if prev == next || interpolation == Interpolation::None {
        return Some(run.values[prev]);
    }

    let (t0, t1) = (times[prev] as f64, times[next] as f64);
    let t = if t1 > t0 { ((time - t0) / (t1 - t0)) as f32 } else { 0.0 };
    // Hermite and Bezier tangents are not carried; they blend linearly.
    Some(run.values[prev].interpolate(&run.values[next], t))
}

/// Per-instance playback state. Models share their keyframe store; every
/// instance owns one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationState {
    pub sequence_index: usize,
    /// Milliseconds into the active sequence.
    pub local_clock: f64,
    /// Milliseconds into each global sequence.
    pub global_clocks: Vec<f64>,
    pub paused: bool,
}

fn wrap(clock: f64, duration: u32) -> f64 {
    if duration == 0 {
        0.0
    } else {
        clock.rem_euclid(duration as f64)
    }
}

impl AnimationState {
    pub fn new(store: &KeyframeStore) -> Self {
        Self {
            sequence_index: 0,
            local_clock: 0.0,
            global_clocks: vec![0.0; store.global_sequences().len()],
            paused: false,
        }
    }

    /// Hard switch to `index`: the local clock restarts and blend time is not
    /// applied. Global clocks keep running.
    pub fn set_sequence(
        &mut self,
        store: &KeyframeStore,
        index: usize,
    ) -> Result<(), AnimationError> {
        if index >= store.sequence_count() {
            return Err(AnimationError::MissingSequence {
                index,
                count: store.sequence_count(),
            });
        }
        self.sequence_index = index;
        self.local_clock = 0.0;
        Ok(())
    }

    /// Switch to the first variant of clip `id`, returning its index.
    pub fn set_sequence_by_id(
        &mut self,
        store: &KeyframeStore,
        id: u16,
    ) -> Result<usize, AnimationError> {
        let index = store
            .find_sequence(id)
            .ok_or(AnimationError::MissingSequenceId { id })?;
        self.set_sequence(store, index)?;
        Ok(index)
    }

    /// Advance every clock by `delta_ms`, wrapping each at its own duration.
    /// Non-finite or negative deltas are ignored.
    pub fn update(&mut self, store: &KeyframeStore, delta_ms: f64) {
        if self.paused || !delta_ms.is_finite() || delta_ms <= 0.0 {
            return;
        }

        let duration = store.sequence(self.sequence_index).map_or(0, |s| s.duration);
        self.local_clock = wrap(self.local_clock + delta_ms, duration);

        for (clock, &duration) in self.global_clocks.iter_mut().zip(store.global_sequences()) {
            *clock = wrap(*clock + delta_ms, duration);
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// The (sequence, time) a track of `bone` is sampled at. Global tracks use
    /// the run stored under sequence 0 and their own clock.
    fn time_source(
        &self,
        store: &KeyframeStore,
        bone: usize,
        kind: TrackKind,
    ) -> (usize, f64, Interpolation) {
        match store.track(bone, kind) {
            Some(source) => match source.global_sequence {
                Some(g) => {
                    let clock = self.global_clocks.get(g).copied().unwrap_or(0.0);
                    (0, clock, source.interpolation)
                }
                None => (self.sequence_index, self.local_clock, source.interpolation),
            },
            None => (self.sequence_index, self.local_clock, Interpolation::Linear),
        }
    }
}

/// A bone's sampled local transform components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalPose {
    pub translation: M2Vector3,
    pub rotation: M2Quaternion,
    pub scale: M2Vector3,
}

impl LocalPose {
    pub fn rest(bone: &Bone) -> Self {
        Self {
            translation: bone.rest_translation,
            rotation: bone.rest_rotation,
            scale: bone.rest_scale,
        }
    }
}

/// Sample all three tracks of `bone`, falling back to its rest values for
/// empty runs.
pub fn sample_bone(
    store: &KeyframeStore,
    state: &AnimationState,
    index: usize,
    bone: &Bone,
) -> LocalPose {
    let rest = LocalPose::rest(bone);

    let (sequence, time, interpolation) = state.time_source(store, index, TrackKind::Translation);
    let translation = sample_run(store.translation_run(index, sequence), time, interpolation);

    let (sequence, time, interpolation) = state.time_source(store, index, TrackKind::Rotation);
    let rotation = sample_run(store.rotation_run(index, sequence), time, interpolation);

    let (sequence, time, interpolation) = state.time_source(store, index, TrackKind::Scale);
    let scale = sample_run(store.scale_run(index, sequence), time, interpolation);

    LocalPose {
        translation: translation.unwrap_or(rest.translation),
        rotation: rotation.unwrap_or(rest.rotation),
        scale: scale.unwrap_or(rest.scale),
    }
}
