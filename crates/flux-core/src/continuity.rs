// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Continuity: gauge/slew state preserved across graph edits.
//!
//! Every render-bound output (position, color, radius) is a continuity
//! target keyed by a [`StableTargetId`]. When a recompile rebases the
//! underlying values, the store captures the visible offset into a gauge
//! that decays over a per-semantic time constant, and slew-limits the
//! output so nothing snaps.
//!
//! The capture-before-reallocation ordering is enforced structurally:
//! [`TargetState::snapshot_then_resize`] computes the old effective values
//! and hands them back BEFORE any new buffer exists, so the "old effective
//! value" cannot accidentally be read from reallocated storage.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ident::{Hash, StableTargetId};
use crate::ir::IdentityMode;
use crate::kernel::{lane_hash, seed_from_hash};

/// What a continuity target semantically carries; selects its canonical
/// time constant and slew cap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SemanticTag {
    /// World-space positions (canonical tau ≈ 360 ms).
    Position,
    /// Colors (≈ 150 ms).
    Color,
    /// Radii (≈ 120 ms).
    Radius,
    /// Opacity (≈ 80 ms).
    Opacity,
    /// Anything else (≈ 150 ms).
    Other,
}

impl SemanticTag {
    /// Canonical time constant in milliseconds.
    #[must_use]
    pub fn canonical_tau_ms(self) -> f64 {
        match self {
            Self::Position => 360.0,
            Self::Color | Self::Other => 150.0,
            Self::Radius => 120.0,
            Self::Opacity => 80.0,
        }
    }

    /// Slew cap in value units per second.
    #[must_use]
    pub fn slew_per_second(self) -> f64 {
        match self {
            Self::Position | Self::Radius => 2.0,
            Self::Color | Self::Other => 4.0,
            Self::Opacity => 6.0,
        }
    }
}

/// Global continuity knobs.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContinuityConfig {
    /// Decay sharpness, clamped to `[0.3, 2]`.
    pub decay_exponent: f64,
    /// Global tau scale, clamped to `[0, 3]`.
    pub tau_multiplier: f64,
    /// Reference tau in ms, clamped to `[50, 500]`.
    pub base_tau_ms: f64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            decay_exponent: 1.0,
            tau_multiplier: 1.0,
            base_tau_ms: 150.0,
        }
    }
}

impl ContinuityConfig {
    fn clamped(self) -> Self {
        Self {
            decay_exponent: self.decay_exponent.clamp(0.3, 2.0),
            tau_multiplier: self.tau_multiplier.clamp(0.0, 3.0),
            base_tau_ms: self.base_tau_ms.clamp(50.0, 500.0),
        }
    }

    /// Effective tau for a semantic under these knobs.
    #[must_use]
    pub fn effective_tau_ms(&self, tag: SemanticTag) -> f64 {
        tag.canonical_tau_ms() * (self.base_tau_ms / 150.0) * self.tau_multiplier
    }
}

/// Continuity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContinuityError {
    /// Stable identity requested but the instance carries none.
    #[error("identity mode requires stable ids but none were provided")]
    MissingStableIds,
}

/// Pre-reallocation view of a target: old ids and old visible values.
#[derive(Debug)]
pub struct SlewSnapshot {
    ids: Vec<u64>,
    effective: Vec<f64>,
    stride: usize,
}

/// Per-target gauge/slew state.
#[derive(Debug)]
pub struct TargetState {
    base: Vec<f64>,
    gauge: Vec<f64>,
    slew: Vec<f64>,
    out: Vec<f64>,
    decay_t: Vec<f64>,
    ids: Vec<u64>,
    count: usize,
    stride: usize,
    tag: SemanticTag,
    rebase_pending: bool,
}

impl TargetState {
    fn new(tag: SemanticTag, stride: usize) -> Self {
        Self {
            base: Vec::new(),
            gauge: Vec::new(),
            slew: Vec::new(),
            out: Vec::new(),
            decay_t: Vec::new(),
            ids: Vec::new(),
            count: 0,
            stride,
            tag,
            rebase_pending: false,
        }
    }

    fn effective_lane(&self, lane: usize, decay_exponent: f64) -> f64 {
        let elem = lane / self.stride;
        let t = self.decay_t.get(elem).copied().unwrap_or(f64::INFINITY);
        let decay = libm::exp(-decay_exponent * t);
        self.base.get(lane).copied().unwrap_or(0.0)
            + self.gauge.get(lane).copied().unwrap_or(0.0) * decay
    }

    /// Captures old ids and effective values, THEN resizes every buffer.
    ///
    /// This is the only way to resize a target, which is what makes the
    /// capture-before-reallocation invariant impossible to skip.
    fn snapshot_then_resize(
        &mut self,
        new_count: usize,
        decay_exponent: f64,
    ) -> SlewSnapshot {
        let snapshot = SlewSnapshot {
            ids: self.ids.clone(),
            effective: (0..self.count * self.stride)
                .map(|lane| {
                    // The previous visible output wins over the analytic
                    // effective value when slew was still catching up.
                    self.out
                        .get(lane)
                        .copied()
                        .unwrap_or_else(|| self.effective_lane(lane, decay_exponent))
                })
                .collect(),
            stride: self.stride,
        };
        let lanes = new_count * self.stride;
        self.base.resize(lanes, 0.0);
        self.gauge.resize(lanes, 0.0);
        self.slew.resize(lanes, 0.0);
        self.out.resize(lanes, 0.0);
        self.decay_t.resize(new_count, f64::INFINITY);
        self.ids.resize(new_count, 0);
        self.count = new_count;
        snapshot
    }
}

/// Store of every continuity target, keyed by stable target id.
#[derive(Debug, Default)]
pub struct ContinuityStore {
    targets: FxHashMap<StableTargetId, TargetState>,
    config: ContinuityConfig,
    pulses: Vec<(StableTargetId, f64)>,
}

impl ContinuityStore {
    /// Creates a store with default knobs.
    #[must_use]
    pub fn new(config: ContinuityConfig) -> Self {
        Self {
            targets: FxHashMap::default(),
            config: config.clamped(),
            pulses: Vec::new(),
        }
    }

    /// Current knobs.
    #[must_use]
    pub fn config(&self) -> ContinuityConfig {
        self.config
    }

    /// Replaces the knobs (clamped to their documented ranges).
    pub fn set_config(&mut self, config: ContinuityConfig) {
        self.config = config.clamped();
    }

    /// Marks every target for gauge recapture: the next `apply` treats its
    /// incoming data as a rebase (graph edit) rather than animation.
    pub fn mark_rebase(&mut self) {
        for state in self.targets.values_mut() {
            state.rebase_pending = true;
        }
    }

    /// Queues a test pulse against a target; applied once, next frame.
    pub fn request_pulse(&mut self, target: StableTargetId, magnitude: f64) {
        self.pulses.push((target, magnitude));
    }

    /// Number of tracked targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Applies continuity to one target for this frame and returns the
    /// effective (smoothed) lanes to publish to the render assembler.
    ///
    /// `data` is the freshly materialized buffer (`count × stride` lanes);
    /// `id_domain` seeds per-element stable ids when `identity` is stable.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        target: StableTargetId,
        tag: SemanticTag,
        data: &[f64],
        stride: usize,
        count: usize,
        id_domain: &Hash,
        identity: IdentityMode,
        dt_ms: f64,
    ) -> &[f64] {
        let config = self.config;
        let state = self
            .targets
            .entry(target)
            .or_insert_with(|| TargetState::new(tag, stride));

        let fresh = state.count == 0 && state.base.is_empty();
        if state.count != count {
            let snapshot = state.snapshot_then_resize(count, config.decay_exponent);
            let seed = seed_from_hash(id_domain);
            for i in 0..count {
                state.ids[i] = lane_hash(seed, i as u64);
            }
            match identity {
                IdentityMode::Stable if !fresh => {
                    // Remap per-element state by stable id; unmapped
                    // elements initialize from base, removed ones drop.
                    for i in 0..count {
                        let id = state.ids[i];
                        if let Some(old) = snapshot.ids.iter().position(|&o| o == id) {
                            for c in 0..stride {
                                let old_lane = old * snapshot.stride + c;
                                if let Some(&v) = snapshot.effective.get(old_lane) {
                                    state.out[i * stride + c] = v;
                                    state.slew[i * stride + c] = v;
                                }
                            }
                            state.decay_t[i] = 0.0;
                        } else {
                            for c in 0..stride {
                                state.out[i * stride + c] = data[i * stride + c];
                                state.slew[i * stride + c] = data[i * stride + c];
                            }
                            state.decay_t[i] = f64::INFINITY;
                        }
                    }
                    state.rebase_pending = true;
                }
                _ => {
                    for lane in 0..count * stride {
                        state.out[lane] = data[lane];
                        state.slew[lane] = data[lane];
                    }
                }
            }
        }

        // Rebase: capture the visible offset into the gauge so the value
        // keeps moving from where the eye last saw it. A fresh target has
        // nothing visible yet; its pending flag clears without capture.
        if state.rebase_pending && !fresh {
            for lane in 0..count * stride {
                let visible = state.out[lane];
                state.gauge[lane] = visible - data[lane];
            }
            for t in &mut state.decay_t {
                *t = 0.0;
            }
        }
        state.rebase_pending = false;

        // Pending pulses add to the gauge, once.
        let mut i = 0;
        while i < self.pulses.len() {
            if self.pulses[i].0 == target {
                let (_, magnitude) = self.pulses.swap_remove(i);
                for lane in 0..count * stride {
                    state.gauge[lane] += magnitude;
                }
                for t in &mut state.decay_t {
                    *t = 0.0;
                }
            } else {
                i += 1;
            }
        }

        // Base tracks the fresh data; decay time advances in tau units.
        state.base.copy_from_slice(&data[..count * stride]);
        let tau = config.effective_tau_ms(state.tag).max(1e-6);
        let dt_t = dt_ms / tau;
        for t in &mut state.decay_t {
            *t += dt_t;
        }

        // Effective value, then slew limiting against the previous output.
        let cap = state.tag.slew_per_second() * (dt_ms / 1000.0);
        for lane in 0..count * stride {
            let effective = state.effective_lane(lane, config.decay_exponent);
            let prev = state.slew[lane];
            let limited = if fresh {
                effective
            } else {
                prev + (effective - prev).clamp(-cap, cap)
            };
            state.out[lane] = limited;
            state.slew[lane] = limited;
        }
        if fresh {
            // First sight of this target: adopt the data outright.
            state.out.copy_from_slice(&data[..count * stride]);
            state.slew.copy_from_slice(&data[..count * stride]);
        }
        &state.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::make_target_id;

    fn store() -> ContinuityStore {
        ContinuityStore::new(ContinuityConfig::default())
    }

    #[test]
    fn first_frame_adopts_data() {
        let mut s = store();
        let id = make_target_id("dots", "position");
        let data = vec![0.25, 0.75];
        let out = s.apply(
            id,
            SemanticTag::Position,
            &data,
            1,
            2,
            &[1u8; 32],
            IdentityMode::Stable,
            16.0,
        );
        assert_eq!(out, &data[..]);
    }

    #[test]
    fn rebase_is_slew_limited() {
        let mut s = store();
        let id = make_target_id("dots", "position");
        let domain = [2u8; 32];
        for _ in 0..10 {
            s.apply(
                id,
                SemanticTag::Position,
                &[0.0],
                1,
                1,
                &domain,
                IdentityMode::Stable,
                16.0,
            );
        }
        s.mark_rebase();
        let out = s.apply(
            id,
            SemanticTag::Position,
            &[1.0],
            1,
            1,
            &domain,
            IdentityMode::Stable,
            16.0,
        );
        // Visible value moves off 0.0 by at most the slew cap.
        let cap = SemanticTag::Position.slew_per_second() * 0.016;
        assert!(out[0].abs() <= cap + 1e-12, "jumped to {}", out[0]);
    }

    #[test]
    fn shrinking_keeps_surviving_elements() {
        let mut s = store();
        let id = make_target_id("dots", "position");
        let domain = [3u8; 32];
        let big: Vec<f64> = (0..100).map(f64::from).collect();
        for _ in 0..5 {
            s.apply(
                id,
                SemanticTag::Position,
                &big,
                1,
                100,
                &domain,
                IdentityMode::Stable,
                16.0,
            );
        }
        let small: Vec<f64> = (0..50).map(f64::from).collect();
        let out = s.apply(
            id,
            SemanticTag::Position,
            &small,
            1,
            50,
            &domain,
            IdentityMode::Stable,
            16.0,
        );
        let cap = SemanticTag::Position.slew_per_second() * 0.016;
        for (i, v) in out.iter().enumerate() {
            assert!(
                (v - small[i]).abs() <= cap + 1e-9,
                "element {i} stepped by {}",
                (v - small[i]).abs()
            );
        }
    }
}
