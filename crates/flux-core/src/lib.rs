// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! flux-core: deterministic dataflow animation compiler and executor.
//!
//! Authors build a graph of typed blocks (oscillators, fields, layouts,
//! renderers); the compiler lowers it into an IR of scalar and field
//! expressions with an explicit per-frame schedule; the executor evaluates
//! the schedule into versioned draw-op frames. Given an identical patch,
//! dt sequence, and continuity state, the frame sequence is bit-identical.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]

/// Block definitions, registry, adapters, and the lowering seam.
pub mod block;
/// The builtin block library.
pub mod blocks;
/// Compile pipeline (passes 0–8).
pub mod compile;
/// Gauge/slew continuity across recompiles.
pub mod continuity;
/// Structured diagnostics and the hub.
pub mod diag;
/// Engine root object.
pub mod engine;
/// Buffer pool and executor.
pub mod exec;
mod ident;
/// Intermediate representation.
pub mod ir;
/// Three-layer kernel registry.
pub mod kernel;
/// Authored graph model.
pub mod patch;
/// Render assembly and frame IR.
pub mod render;
/// Five-axis canonical type system.
pub mod types;

// Re-exports for the stable public API.
/// Block registry surface.
pub use block::{BlockDef, BlockRegistry, Category, PortDef, RegistryError};
/// Builtin registration entry point.
pub use blocks::register_builtins;
/// Compile entry point and result types.
pub use compile::{compile, CompileOptions, CompileResult};
/// Continuity configuration and store.
pub use continuity::{ContinuityConfig, ContinuityStore, SemanticTag};
/// Diagnostic model.
pub use diag::{DiagAction, DiagDomain, DiagTarget, Diagnostic, DiagnosticsHub, Severity};
/// Engine root and builder.
pub use engine::{CacheStats, Engine, EngineBuilder};
/// Executor and pool.
pub use exec::{Executor, PoolStats};
/// Identifier types and constructors.
pub use ident::{make_block_id, make_edge_id, make_target_id, short_hash, BlockId, EdgeId, Hash, StableTargetId};
/// Program artifact and schedule surface.
pub use ir::{
    CompiledProgram, DrawTopology, InstanceDecl, RenderBinding, ScheduleStep, SlotMeta,
    SlotStorage, StyleSpec,
};
/// Authored graph types.
pub use patch::{BlockInstance, CombineMode, Edge, InputSettings, Patch, PortRef, Value};
/// Frame IR and digest.
pub use render::{frame_digest, DrawOp, InstanceTransforms, RenderFrameIR, RENDER_FRAME_VERSION};
/// Canonical type system surface.
pub use types::{
    check_connection, contract_compatible, payload_admits_unit, unify, CanonicalType, Cardinality,
    ConnectionCheck, Contract, Payload, TypeError, Unit,
};
