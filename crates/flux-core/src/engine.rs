// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine root object: owns every subsystem, no module globals.
//!
//! The engine threads explicit state through the pipeline: block registry,
//! diagnostics hub, continuity store, compile cache, active program, and
//! executor. Edits arrive debounced; a new program replaces the old only at
//! a frame boundary, and a failed compile keeps the last-known-good program
//! running while its diagnostics surface through the hub.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::block::{BlockRegistry, RegistryError};
use crate::blocks::register_builtins;
use crate::compile::{compile, CompileOptions};
use crate::continuity::{ContinuityConfig, ContinuityStore};
use crate::diag::DiagnosticsHub;
use crate::exec::{Executor, PoolStats};
use crate::ident::{Hash, StableTargetId};
use crate::ir::CompiledProgram;
use crate::patch::Patch;
use crate::render::RenderFrameIR;

/// Compile-cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Cache hits.
    pub hits: u64,
    /// Cache misses (fresh compiles).
    pub misses: u64,
}

/// Fluent builder for [`Engine`].
#[derive(Debug)]
pub struct EngineBuilder {
    continuity: ContinuityConfig,
    dt_ceiling_ms: f64,
    debounce_ms: f64,
    lenient_units: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            continuity: ContinuityConfig::default(),
            dt_ceiling_ms: 100.0,
            debounce_ms: 120.0,
            lenient_units: false,
        }
    }
}

impl EngineBuilder {
    /// Starts a builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuity knobs.
    #[must_use]
    pub fn continuity(mut self, config: ContinuityConfig) -> Self {
        self.continuity = config;
        self
    }

    /// Largest dt one frame may consume, in ms.
    #[must_use]
    pub fn dt_ceiling_ms(mut self, ceiling: f64) -> Self {
        self.dt_ceiling_ms = ceiling.max(1.0);
        self
    }

    /// Edit-coalescing window, in ms.
    #[must_use]
    pub fn debounce_ms(mut self, window: f64) -> Self {
        self.debounce_ms = window.clamp(0.0, 1000.0);
        self
    }

    /// Downgrade unit mismatches to warnings and auto-insert adapters.
    #[must_use]
    pub fn lenient_units(mut self, lenient: bool) -> Self {
        self.lenient_units = lenient;
        self
    }

    /// Builds the engine with the builtin block library registered.
    pub fn build(self) -> Result<Engine, RegistryError> {
        let mut registry = BlockRegistry::new();
        register_builtins(&mut registry)?;
        Ok(Engine {
            registry,
            hub: DiagnosticsHub::new(),
            continuity: ContinuityStore::new(self.continuity),
            cache: FxHashMap::default(),
            cache_stats: CacheStats::default(),
            program: None,
            executor: None,
            pending: None,
            debounce_ms: self.debounce_ms,
            dt_ceiling_ms: self.dt_ceiling_ms,
            lenient_units: self.lenient_units,
            patch_revision: 0,
            now_ms: 0.0,
        })
    }
}

/// The engine root.
#[derive(Debug)]
pub struct Engine {
    registry: BlockRegistry,
    hub: DiagnosticsHub,
    continuity: ContinuityStore,
    cache: FxHashMap<Hash, Arc<CompiledProgram>>,
    cache_stats: CacheStats,
    program: Option<Arc<CompiledProgram>>,
    executor: Option<Executor>,
    pending: Option<(Patch, f64)>,
    debounce_ms: f64,
    dt_ceiling_ms: f64,
    lenient_units: bool,
    patch_revision: u64,
    now_ms: f64,
}

impl Engine {
    /// A builder with default configuration.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The block registry (for editors and loaders).
    #[must_use]
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// The diagnostics hub.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsHub {
        &self.hub
    }

    /// Mutable hub access (muting, draining).
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticsHub {
        &mut self.hub
    }

    /// The active program, if any compile succeeded.
    #[must_use]
    pub fn program(&self) -> Option<&Arc<CompiledProgram>> {
        self.program.as_ref()
    }

    /// Compile-cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache_stats
    }

    /// Buffer-pool statistics of the running executor.
    #[must_use]
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.executor.as_ref().map(Executor::pool_stats)
    }

    /// Queues a continuity test pulse.
    pub fn request_pulse(&mut self, target: StableTargetId, magnitude: f64) {
        self.continuity.request_pulse(target, magnitude);
    }

    /// Loads a patch immediately (no debounce). Returns `true` when the
    /// compile produced a program; diagnostics land in the hub either way.
    pub fn load(&mut self, patch: &Patch) -> bool {
        self.patch_revision += 1;
        let swapped = self.compile_and_swap(patch);
        // A fresh load replaces, rather than edits, the running graph.
        if swapped {
            self.continuity.mark_rebase();
        }
        swapped
    }

    /// Schedules a debounced edit; successive edits inside the window
    /// coalesce. The compile runs at the next frame boundary after the
    /// window closes.
    pub fn schedule_edit(&mut self, patch: Patch) {
        self.pending = Some((patch, self.now_ms + self.debounce_ms));
    }

    fn compile_and_swap(&mut self, patch: &Patch) -> bool {
        let hash = patch.content_hash();
        let options = CompileOptions {
            patch_id: None,
            patch_revision: self.patch_revision,
            lenient_units: self.lenient_units,
        };
        self.hub.begin_revision();
        let program = if let Some(cached) = self.cache.get(&hash) {
            self.cache_stats.hits += 1;
            Some(Arc::clone(cached))
        } else {
            self.cache_stats.misses += 1;
            let result = compile(patch, &self.registry, &options);
            for diag in result.diagnostics {
                self.hub.report(diag);
            }
            result.program.map(|p| {
                let arc = Arc::new(p);
                self.cache.insert(hash, Arc::clone(&arc));
                arc
            })
        };
        match program {
            Some(program) => {
                self.executor = Some(Executor::new(Arc::clone(&program), self.dt_ceiling_ms));
                self.program = Some(program);
                true
            }
            // Keep the last-known-good program running.
            None => false,
        }
    }

    /// Advances one frame. Pending edits apply first (the swap is atomic
    /// from the executor's viewpoint — only ever between frames).
    pub fn advance(&mut self, dt_ms: f64) -> Option<RenderFrameIR> {
        self.now_ms += dt_ms.max(0.0);
        if let Some((_, due)) = &self.pending {
            if self.now_ms >= *due {
                if let Some((patch, _)) = self.pending.take() {
                    self.patch_revision += 1;
                    if self.compile_and_swap(&patch) {
                        self.continuity.mark_rebase();
                    }
                }
            }
        }
        let executor = self.executor.as_mut()?;
        let frame = executor.advance(dt_ms, &mut self.continuity).clone();
        for diag in executor.frame_diagnostics().to_vec() {
            self.hub.report(diag);
        }
        Some(frame)
    }

    /// Copy of the most recent frame.
    #[must_use]
    pub fn snapshot_frame(&self) -> Option<RenderFrameIR> {
        self.executor.as_ref().and_then(Executor::snapshot_frame)
    }

    /// Accumulated host time in ms.
    #[must_use]
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }
}
