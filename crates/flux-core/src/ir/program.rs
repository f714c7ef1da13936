// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compiled program artifact: instances, slots, expressions, schedule.

use std::collections::BTreeMap;

use crate::ident::{BlockId, Hash, StableTargetId};
use crate::types::CanonicalType;

use super::expr::{
    EventId, FieldExpr, FieldId, InstanceId, ObjectValue, SlotId, StateId, ValueExpr, ValueExprId,
};

/// Storage plane a slot lives in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotStorage {
    /// Numeric `f64` plane.
    F64,
    /// Opaque objects (camera, path refs, topology ids).
    Object,
    /// Path geometry.
    Shape2d,
}

/// Resolved layout of one value slot.
///
/// Invariant: for any two slots sharing a storage plane, the ranges
/// `[offset, offset + stride)` are disjoint.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotMeta {
    /// Slot id.
    pub slot: SlotId,
    /// Storage plane.
    pub storage: SlotStorage,
    /// First lane index within the plane.
    pub offset: u32,
    /// Lane count (payload stride; 1 for object planes).
    pub stride: u32,
    /// Fully resolved type.
    pub ty: CanonicalType,
}

/// Element count of an instance.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstanceCount {
    /// Known at compile time.
    Fixed(usize),
    /// Resolved by the host before the first frame.
    Dynamic,
}

impl InstanceCount {
    /// Fixed count, or `None` when dynamic.
    #[must_use]
    pub fn fixed(self) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(n),
            Self::Dynamic => None,
        }
    }
}

/// Whether elements keep identity across recompiles.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IdentityMode {
    /// Elements carry stable ids; continuity remaps on count change.
    Stable,
    /// No identity; continuity reinitializes from base.
    None,
}

/// Static layout generating an instance's intrinsic positions.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutSpec {
    /// Row-major grid, cell-centered in `[0, 1]²`.
    Grid {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// Even spacing along a segment.
    Line {
        /// Start point.
        from: [f64; 2],
        /// End point.
        to: [f64; 2],
    },
    /// Even spacing on a circle.
    Circle {
        /// Center.
        center: [f64; 2],
        /// Radius.
        radius: f64,
    },
}

/// One declared instance (a collection of addressable elements).
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceDecl {
    /// Dense id.
    pub id: InstanceId,
    /// Domain label (e.g. `"circle"`), informational.
    pub domain: String,
    /// Element count.
    pub count: InstanceCount,
    /// Layout, when the instance carries one.
    pub layout: Option<LayoutSpec>,
    /// Identity mode for continuity remapping.
    pub identity: IdentityMode,
    /// Stable-id domain; element i's stable id is `(id_domain, i)`.
    pub id_domain: Hash,
}

/// One persistent state slot (feedback loops, crossing memories, holds).
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateDecl {
    /// Dense id.
    pub id: StateId,
    /// Lane count.
    pub stride: u32,
    /// Value before the first frame.
    pub initial: Vec<f64>,
}

/// Slots the time root writes at frame head.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeBinding {
    /// Accumulated milliseconds.
    pub t_ms: SlotId,
    /// Primary phase in turns, `[0, 1)`.
    pub phase_a: SlotId,
    /// Derived phase in turns, `[0, 1)`.
    pub phase_b: SlotId,
    /// Period of `phase_a` in ms.
    pub period_a_ms: f64,
    /// Period of `phase_b` in ms.
    pub period_b_ms: f64,
}

/// Primitive topology for renderers without custom geometry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrawTopology {
    /// Filled circles.
    Circle,
    /// Axis-aligned squares.
    Square,
    /// Custom path geometry (see [`super::expr::PathGeometry`]).
    Path,
}

/// Line cap style.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineCap {
    /// Flat end.
    Butt,
    /// Rounded end.
    Round,
    /// Squared-off end.
    Square,
}

/// Line join style.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineJoin {
    /// Sharp corner.
    Miter,
    /// Rounded corner.
    Round,
    /// Clipped corner.
    Bevel,
}

/// Declarative style attached to a renderer. Backends may ignore fields
/// they cannot express.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleSpec {
    /// Fill color override.
    pub fill: Option<[f64; 4]>,
    /// Stroke color.
    pub stroke: Option<[f64; 4]>,
    /// Stroke width in normalized screen units.
    pub stroke_width: Option<f64>,
    /// Line cap.
    pub line_cap: Option<LineCap>,
    /// Line join.
    pub line_join: Option<LineJoin>,
}

/// Everything a renderer step needs, resolved to fields and slots.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderBinding {
    /// Instance being drawn.
    pub instance: InstanceId,
    /// World-space positions (vec2 or vec3).
    pub position: FieldId,
    /// Per-element radius (float).
    pub radius: FieldId,
    /// Per-element color.
    pub color: FieldId,
    /// Per-element opacity, if wired.
    pub opacity: Option<FieldId>,
    /// Per-element rotation in radians, if wired.
    pub rotation: Option<FieldId>,
    /// Per-element non-uniform scale, if wired.
    pub scale2: Option<FieldId>,
    /// Object slot with path geometry, for `Path` topology.
    pub geometry: Option<SlotId>,
    /// Draw topology.
    pub topology: DrawTopology,
    /// Style.
    pub style: StyleSpec,
    /// Continuity target for positions.
    pub target_position: StableTargetId,
    /// Continuity target for colors.
    pub target_color: StableTargetId,
    /// Continuity target for radii.
    pub target_radius: StableTargetId,
}

/// One ordered action in the per-frame plan.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScheduleStep {
    /// Evaluate a scalar expression into its slot.
    EvalSig {
        /// Destination slot.
        slot: SlotId,
        /// Expression.
        expr: ValueExprId,
    },
    /// Evaluate an event expression; fires at most once per frame.
    Event {
        /// Event channel.
        event: EventId,
        /// Crossing expression.
        expr: ValueExprId,
    },
    /// Materialize a field into a pooled buffer.
    Materialize {
        /// Field to materialize.
        field: FieldId,
        /// Instance that sizes the buffer.
        instance: InstanceId,
    },
    /// Copy persistent state into a slot (step head).
    StateRead {
        /// Destination slot.
        slot: SlotId,
        /// Source state.
        state: StateId,
    },
    /// Copy a slot into persistent state (step tail).
    StateWrite {
        /// Destination state.
        state: StateId,
        /// Source slot.
        slot: SlotId,
    },
    /// Bind a camera projection for an instance.
    Projection {
        /// Projected instance.
        instance: InstanceId,
        /// Camera object slot; `None` selects the default orthographic.
        camera: Option<SlotId>,
    },
    /// Assemble draw ops for an instance.
    Render(Box<RenderBinding>),
}

/// Headline counts for CLI and cache reporting.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramStats {
    /// Authored blocks compiled (adapters included).
    pub blocks: usize,
    /// Schedule steps.
    pub steps: usize,
    /// Value slots.
    pub slots: usize,
}

/// Port direction for resolved-type lookups.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortDir {
    /// Input port.
    In,
    /// Output port.
    Out,
}

/// The compiler's output artifact; everything the executor needs.
#[derive(Clone, PartialEq, Debug)]
pub struct CompiledProgram {
    /// Content hash of the source patch (compile-cache key).
    pub patch_hash: Hash,
    /// Declared instances.
    pub instances: Vec<InstanceDecl>,
    /// Scalar expression arena.
    pub value_exprs: Vec<ValueExpr>,
    /// Field expression arena.
    pub field_exprs: Vec<FieldExpr>,
    /// Field types, aligned with `field_exprs`.
    pub field_types: Vec<CanonicalType>,
    /// Owning instance per field (`None` for broadcast/const).
    pub field_instance: Vec<Option<InstanceId>>,
    /// Slot layouts (aligned with slot ids).
    pub slots: Vec<SlotMeta>,
    /// Persistent state declarations.
    pub states: Vec<StateDecl>,
    /// Event channel count.
    pub event_count: usize,
    /// Initial values of object slots.
    pub object_init: BTreeMap<SlotId, ObjectValue>,
    /// Ordered per-frame plan.
    pub schedule: Vec<ScheduleStep>,
    /// Time-root bindings.
    pub time: TimeBinding,
    /// Resolved type per `(block, port, direction)`.
    pub resolved_port_types: BTreeMap<(BlockId, String, PortDir), CanonicalType>,
    /// Edge id → contributing? Shadowed fan-in edges report `false`; the
    /// editor renders them dimmed without a recompile.
    pub contributing_edges: BTreeMap<crate::ident::EdgeId, bool>,
    /// Total `f64` plane length.
    pub f64_len: usize,
    /// Total object plane length.
    pub object_len: usize,
    /// Total shape plane length.
    pub shape_len: usize,
    /// Headline counts.
    pub stats: ProgramStats,
}

impl CompiledProgram {
    /// Stride of a field, from its resolved payload.
    #[must_use]
    pub fn field_stride(&self, field: FieldId) -> u32 {
        self.field_types[field.0 as usize]
            .payload
            .value()
            .map_or(1, crate::types::Payload::stride)
    }

    /// Fixed element count of an instance.
    ///
    /// Dynamic instances must be resolved by the host before execution;
    /// unresolved dynamic counts execute as empty.
    #[must_use]
    pub fn instance_count(&self, instance: InstanceId) -> usize {
        self.instances[instance.0 as usize]
            .count
            .fixed()
            .unwrap_or(0)
    }
}
