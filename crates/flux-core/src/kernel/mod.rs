// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Three-layer kernel registry.
//!
//! - Layer A ([`Opcode`]): scalar math, the single enforcer of numeric ops.
//! - Layer B ([`SignalKernel`]): phase-based oscillators, easings, shaping.
//! - Layer C ([`FieldKernel`]): buffer operations over instance lanes.
//!
//! Dispatch is closed-enum everywhere; "kernel name" is a variant tag, not a
//! string key. Declarative signatures live in [`sig`], decoupled from the
//! implementations.

pub mod field;
pub mod hash;
pub mod opcode;
pub mod sig;
pub mod signal;

pub use field::{
    circle_layout, eval_field_lane, grid_layout, hsv_to_rgb, line_layout, path_derive,
    polygon_vertex, FieldKernel, LaneCtx, PathDeriveKind, GOLDEN_ANGLE,
};
pub use hash::{hash01, lane_hash, mix64, seed_from_hash, to_unit, value_noise};
pub use opcode::{eval_opcode, Arity, KernelError, Opcode};
pub use sig::{field_signature, opcode_input_unit, signal_signature, KernelSignature};
pub use signal::{eval_signal, SignalKernel};
