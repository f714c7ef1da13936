// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pooled typed-array buffers with a strict one-frame lifetime.
//!
//! The pool is the single owner of per-frame transient lane memory.
//! [`BufferPool::acquire`] lends an exclusive buffer for the current frame;
//! [`BufferPool::release_all`] takes every lent buffer back at frame end.
//! A buffer that outlives its frame is the canonical cause of frame
//! corruption, so debug builds poison returned buffers with a recognizable
//! NaN pattern — stale reads turn into loud NaN anomalies instead of
//! plausible stale values.

use rustc_hash::FxHashMap;

use crate::types::Payload;

/// Poison pattern: a quiet NaN with a recognizable payload.
pub const POISON_BITS: u64 = 0x7FF8_DEAD_DEAD_DEAD;

/// Whether released buffers are poisoned in this build.
#[must_use]
pub fn poison_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "poison_release"))
}

/// One pooled buffer, exclusively lent until the frame releases it.
#[derive(Debug)]
pub struct PoolBuffer {
    data: Vec<f64>,
    payload: Payload,
    count: usize,
}

impl PoolBuffer {
    /// Element payload.
    #[must_use]
    pub fn payload(&self) -> Payload {
        self.payload
    }

    /// Element count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// All lanes (`count × stride`).
    #[must_use]
    pub fn lanes(&self) -> &[f64] {
        &self.data
    }

    /// All lanes, mutably.
    pub fn lanes_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Lanes of one element.
    #[must_use]
    pub fn element(&self, index: usize) -> &[f64] {
        let stride = self.payload.stride() as usize;
        &self.data[index * stride..(index + 1) * stride]
    }
}

/// Running pool statistics for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Total acquisitions over the pool's lifetime.
    pub acquired: u64,
    /// Peak lanes lent simultaneously.
    pub peak_lanes: usize,
    /// Distinct `(payload, count)` buckets currently pooled.
    pub buckets: usize,
}

/// Size-bucketed pool keyed by `(payload, count)`.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: FxHashMap<(Payload, usize), Vec<Vec<f64>>>,
    lent: usize,
    lent_lanes: usize,
    stats: PoolStats,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lends a zeroed buffer of `count` elements of `payload`.
    pub fn acquire(&mut self, payload: Payload, count: usize) -> PoolBuffer {
        let lanes = count * payload.stride() as usize;
        let mut data = self
            .free
            .get_mut(&(payload, count))
            .and_then(Vec::pop)
            .unwrap_or_else(|| vec![0.0; lanes]);
        data.resize(lanes, 0.0);
        data.fill(0.0);
        self.lent += 1;
        self.lent_lanes += lanes;
        self.stats.acquired += 1;
        self.stats.peak_lanes = self.stats.peak_lanes.max(self.lent_lanes);
        PoolBuffer {
            data,
            payload,
            count,
        }
    }

    /// Takes every buffer the frame acquired back into the size buckets.
    ///
    /// With poisoning on, each returned buffer is overwritten with
    /// [`POISON_BITS`] NaNs first, so any view retained past this call
    /// reads garbage that cannot be mistaken for live data.
    pub fn release_all(&mut self, buffers: impl IntoIterator<Item = PoolBuffer>) {
        for mut buf in buffers {
            if poison_enabled() {
                let words: &mut [u64] = bytemuck::cast_slice_mut(buf.data.as_mut_slice());
                words.fill(POISON_BITS);
            }
            self.lent = self.lent.saturating_sub(1);
            self.lent_lanes = self.lent_lanes.saturating_sub(buf.data.len());
            self.free
                .entry((buf.payload, buf.count))
                .or_default()
                .push(buf.data);
        }
        debug_assert_eq!(self.lent, 0, "a frame buffer escaped release_all");
    }

    /// Number of buffers currently lent out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lent
    }

    /// Lifetime statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            buckets: self.free.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_comes_from_the_matching_bucket() {
        let mut pool = BufferPool::new();
        let a = pool.acquire(Payload::Vec3, 16);
        assert_eq!(a.lanes().len(), 48);
        pool.release_all([a]);
        let b = pool.acquire(Payload::Vec3, 16);
        // Reused memory arrives zeroed, not poisoned.
        assert!(b.lanes().iter().all(|v| *v == 0.0));
        pool.release_all([b]);
        assert_eq!(pool.stats().acquired, 2);
    }

    #[test]
    fn released_buffers_are_poisoned_in_debug() {
        if !poison_enabled() {
            return;
        }
        let mut pool = BufferPool::new();
        let buf = pool.acquire(Payload::Float, 4);
        let data_before_release: Vec<f64> = buf.lanes().to_vec();
        assert!(data_before_release.iter().all(|v| *v == 0.0));
        pool.release_all([buf]);
        // The bucketed storage itself is poisoned.
        let stale = &pool.free[&(Payload::Float, 4)][0];
        assert!(stale.iter().all(|v| v.is_nan()));
        assert!(stale.iter().all(|v| v.to_bits() == POISON_BITS));
    }

    #[test]
    fn peak_tracks_simultaneous_lending() {
        let mut pool = BufferPool::new();
        let a = pool.acquire(Payload::Float, 8);
        let b = pool.acquire(Payload::Float, 8);
        assert_eq!(pool.stats().peak_lanes, 16);
        pool.release_all([a, b]);
        assert_eq!(pool.outstanding(), 0);
    }
}
