// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar and field expression variants.
//!
//! Expressions are arena-allocated and referenced by dense ids; the graph is
//! `(Vec<expr>, ids)`, never owning pointers. Leaves are constants and slot
//! reads; the schedule guarantees a slot is written before any expression
//! reads it.

use crate::ident::Hash;
use crate::kernel::{FieldKernel, Opcode, PathDeriveKind, SignalKernel};

/// Dense index of a [`ValueExpr`](ValueExpr) in the program arena.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueExprId(pub u32);

/// Dense index of a [`FieldExpr`](FieldExpr) in the program arena. Also the
/// buffer-cache key during materialization.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldId(pub u32);

/// Dense index of a value slot.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotId(pub u32);

/// Dense index of an instance declaration.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceId(pub u32);

/// Dense index of a persistent state slot.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

/// Dense index of an event channel.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub u32);

/// Pure per-lane function referenced by `map`/`zip`/`zipSig`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PureFn {
    /// A Layer A opcode, applied componentwise.
    Opcode(Opcode),
    /// A Layer C field kernel.
    Kernel(FieldKernel),
}

/// Reduction over a field's lanes into a signal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduceOp {
    /// Componentwise sum.
    Sum,
    /// Componentwise mean.
    Average,
    /// Componentwise minimum.
    Min,
    /// Componentwise maximum.
    Max,
}

impl ReduceOp {
    /// Stable lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Parses a serialized name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "sum" => Self::Sum,
            "average" => Self::Average,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }
}

/// Scalar (signal-level) expression.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueExpr {
    /// Constant lanes (length = payload stride).
    Const {
        /// Lane values.
        lanes: Vec<f64>,
    },
    /// Read a previously written slot.
    ReadSlot(SlotId),
    /// Layer A opcode over argument expressions, componentwise.
    Opcode {
        /// Opcode.
        op: Opcode,
        /// Arguments.
        args: Vec<ValueExprId>,
    },
    /// Layer B signal kernel over argument expressions.
    Kernel {
        /// Kernel.
        kernel: SignalKernel,
        /// Arguments.
        args: Vec<ValueExprId>,
    },
    /// Concatenate argument lanes into a wider value (vector/color
    /// construction at signal level).
    Pack {
        /// Arguments, in lane order.
        args: Vec<ValueExprId>,
    },
    /// Layer C field kernel applied in signal context (single lane,
    /// `count` 1).
    FieldFn {
        /// Kernel.
        kernel: FieldKernel,
        /// Arguments.
        args: Vec<ValueExprId>,
    },
    /// Read one lane of a materialized field.
    SelectFromField {
        /// Source field.
        field: FieldId,
        /// Lane index expression (floored, clamped to the instance).
        index: ValueExprId,
    },
    /// Reduce a materialized field into a signal.
    Reduce {
        /// Source field.
        field: FieldId,
        /// Reduction.
        op: ReduceOp,
    },
    /// Threshold crossing with hysteresis; fires at most once per frame.
    CrossingEvent {
        /// Monitored signal.
        signal: ValueExprId,
        /// Crossing threshold.
        threshold: f64,
        /// Hysteresis band half-width.
        hysteresis: f64,
        /// Holds the previous sample and arm state.
        state: StateId,
    },
    /// Latch a value on event arrival.
    Hold {
        /// Triggering event.
        event: EventId,
        /// Value sampled when the event fires.
        value: ValueExprId,
        /// Output before the first firing.
        initial: Vec<f64>,
        /// Holds the latched lanes.
        state: StateId,
    },
    /// Path derivative sampled at a parameter along a shape's control
    /// polyline.
    PathDerivativeAt {
        /// Object slot holding the [`PathGeometry`].
        geometry: SlotId,
        /// Derivative kind.
        kind: PathDeriveKind,
        /// Arc-length-normalized parameter in `[0, 1]`.
        t: ValueExprId,
    },
}

/// One argument of a `zipSig` combination.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ZipArg {
    /// A per-lane field.
    Field(FieldId),
    /// A shared signal, read once per frame.
    Sig(SlotId),
}

/// Built-in per-instance field sources.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Intrinsic {
    /// Lane index `0..count`.
    Index,
    /// `i / (count − 1)`; 0 when `count == 1`.
    NormalizedIndex,
    /// Deterministic per-lane hash in `[0, 1)`.
    RandomId,
    /// Layout position (vec3); requires a layout.
    Position,
    /// Layout radius (float); requires a layout.
    Radius,
}

impl Intrinsic {
    /// Stable camelCase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::NormalizedIndex => "normalizedIndex",
            Self::RandomId => "randomId",
            Self::Position => "position",
            Self::Radius => "radius",
        }
    }
}

/// Field (instance-aligned) expression.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldExpr {
    /// Built-in source derived from the instance itself.
    Intrinsic {
        /// Owning instance.
        instance: InstanceId,
        /// Which intrinsic.
        which: Intrinsic,
    },
    /// Every lane holds the same constant element.
    Const {
        /// Element lanes (length = payload stride).
        lanes: Vec<f64>,
    },
    /// Every lane holds the signal's current value.
    Broadcast {
        /// Source signal slot.
        signal: SlotId,
    },
    /// Elementwise map of one field.
    Map {
        /// Source field.
        src: FieldId,
        /// Opcode or unary field kernel.
        f: PureFn,
    },
    /// Elementwise combination of aligned fields.
    Zip {
        /// Source fields (same instance).
        srcs: Vec<FieldId>,
        /// Combining function.
        f: PureFn,
    },
    /// Aligned fields combined with shared signals; signals are read once
    /// and applied to all lanes. Argument order is preserved.
    ZipSig {
        /// Ordered arguments (fields and signals interleaved as authored).
        args: Vec<ZipArg>,
        /// Combining function.
        f: PureFn,
    },
    /// Positions generated by the instance's layout.
    Layout {
        /// Owning instance.
        instance: InstanceId,
    },
    /// Per-control-point path derivative over a shape.
    PathDerivative {
        /// Object slot holding the [`PathGeometry`].
        geometry: SlotId,
        /// Owning instance (one lane per control point).
        instance: InstanceId,
        /// Derivative kind.
        kind: PathDeriveKind,
    },
}

/// Local-space path geometry: control points plus a topology id.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathGeometry {
    /// Distinct-geometry grouping key for draw-op batching.
    pub topology: u64,
    /// LOCAL-SPACE control points centered at the origin.
    pub points: Vec<[f64; 2]>,
    /// Whether the path closes back to the first point.
    pub closed: bool,
}

/// Opaque camera projection payload.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CameraProjection {
    /// Orthographic: world `[0, 1]²` maps to screen `[0, 1]²` around
    /// `center` scaled by `zoom`.
    Orthographic {
        /// World-space center.
        center: [f64; 2],
        /// Zoom factor; 1.0 is identity.
        zoom: f64,
    },
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self::Orthographic {
            center: [0.5, 0.5],
            zoom: 1.0,
        }
    }
}

/// Value held in an object-storage slot.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectValue {
    /// Local-space path geometry.
    Shape(PathGeometry),
    /// Camera projection.
    Camera(CameraProjection),
    /// Reference to an external path resource.
    PathRef(Hash),
    /// Bare topology id.
    Topology(u64),
}
