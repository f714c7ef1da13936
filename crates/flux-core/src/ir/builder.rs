// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Accumulator the lowering pass drives to build a program.
//!
//! Block lowering closures receive a mutable [`IrBuilder`] and push slots,
//! expressions, instances, and schedule fragments. The builder collects in
//! emission order; schedule assembly and slot layout finalize afterwards.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::ident::Hash;
use crate::types::{CanonicalType, ExtentId, Payload};

use super::expr::{
    EventId, FieldExpr, FieldId, InstanceId, ObjectValue, SlotId, StateId, ValueExpr, ValueExprId,
};
use super::program::{
    IdentityMode, InstanceCount, InstanceDecl, LayoutSpec, ScheduleStep, SlotStorage, StateDecl,
    TimeBinding,
};

/// Reference to an already-lowered value, handed to downstream blocks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueRef {
    /// A scalar slot.
    Slot(SlotId),
    /// A field expression.
    Field(FieldId),
    /// An instance handle (extent-carrying ports).
    Instance(InstanceId),
    /// An event channel.
    Event(EventId),
}

impl ValueRef {
    /// Slot view.
    #[must_use]
    pub fn slot(self) -> Option<SlotId> {
        match self {
            Self::Slot(s) => Some(s),
            _ => None,
        }
    }

    /// Field view.
    #[must_use]
    pub fn field(self) -> Option<FieldId> {
        match self {
            Self::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Instance view.
    #[must_use]
    pub fn instance(self) -> Option<InstanceId> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Event view.
    #[must_use]
    pub fn event(self) -> Option<EventId> {
        match self {
            Self::Event(e) => Some(e),
            _ => None,
        }
    }
}

/// Storage plane for a payload.
#[must_use]
pub fn storage_for(payload: Payload) -> SlotStorage {
    match payload {
        Payload::Shape => SlotStorage::Shape2d,
        Payload::CameraProjection | Payload::PathRef | Payload::TopologyId => SlotStorage::Object,
        _ => SlotStorage::F64,
    }
}

/// Mutable program accumulator.
#[derive(Debug, Default)]
pub struct IrBuilder {
    pub(crate) slot_types: Vec<CanonicalType>,
    pub(crate) value_exprs: Vec<ValueExpr>,
    pub(crate) field_exprs: Vec<FieldExpr>,
    pub(crate) field_types: Vec<CanonicalType>,
    pub(crate) field_instance: Vec<Option<InstanceId>>,
    pub(crate) instances: Vec<InstanceDecl>,
    pub(crate) states: Vec<StateDecl>,
    pub(crate) event_count: u32,
    pub(crate) object_init: BTreeMap<SlotId, ObjectValue>,
    pub(crate) steps: Vec<ScheduleStep>,
    pub(crate) time: Option<TimeBinding>,
    pub(crate) pending_state_writes: Vec<(StateId, crate::ident::BlockId, String)>,
    materialized: FxHashSet<u32>,
}

impl IrBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a slot of `ty`. Offsets are assigned later by the slot
    /// metadata pass.
    pub fn alloc_slot(&mut self, ty: CanonicalType) -> SlotId {
        let id = SlotId(u32::try_from(self.slot_types.len()).unwrap_or(u32::MAX));
        self.slot_types.push(ty);
        id
    }

    /// Resolved type of a slot.
    #[must_use]
    pub fn slot_type(&self, slot: SlotId) -> &CanonicalType {
        &self.slot_types[slot.0 as usize]
    }

    /// Interns a scalar expression.
    pub fn push_value(&mut self, expr: ValueExpr) -> ValueExprId {
        let id = ValueExprId(u32::try_from(self.value_exprs.len()).unwrap_or(u32::MAX));
        self.value_exprs.push(expr);
        id
    }

    /// Single-lane constant expression.
    pub fn const_scalar(&mut self, value: f64) -> ValueExprId {
        self.push_value(ValueExpr::Const {
            lanes: vec![value],
        })
    }

    /// Multi-lane constant expression.
    pub fn const_lanes(&mut self, lanes: Vec<f64>) -> ValueExprId {
        self.push_value(ValueExpr::Const { lanes })
    }

    /// Slot-read expression.
    pub fn read_slot(&mut self, slot: SlotId) -> ValueExprId {
        self.push_value(ValueExpr::ReadSlot(slot))
    }

    /// Appends an `EvalSig` step writing `expr` into `slot`.
    pub fn eval_sig(&mut self, slot: SlotId, expr: ValueExprId) {
        self.steps.push(ScheduleStep::EvalSig { slot, expr });
    }

    /// Allocates a slot of `ty` and schedules `expr` into it.
    pub fn eval_into(&mut self, ty: CanonicalType, expr: ValueExprId) -> SlotId {
        let slot = self.alloc_slot(ty);
        self.eval_sig(slot, expr);
        slot
    }

    /// Interns a field expression with its resolved type and owning
    /// instance (`None` for broadcast/const).
    pub fn push_field(
        &mut self,
        expr: FieldExpr,
        ty: CanonicalType,
        instance: Option<InstanceId>,
    ) -> FieldId {
        let id = FieldId(u32::try_from(self.field_exprs.len()).unwrap_or(u32::MAX));
        self.field_exprs.push(expr);
        self.field_types.push(ty);
        self.field_instance.push(instance);
        id
    }

    /// Owning instance of a field, when pinned.
    #[must_use]
    pub fn field_instance(&self, field: FieldId) -> Option<InstanceId> {
        self.field_instance[field.0 as usize]
    }

    /// Resolved type of a field.
    #[must_use]
    pub fn field_type(&self, field: FieldId) -> &CanonicalType {
        &self.field_types[field.0 as usize]
    }

    /// Schedules materialization of `field` over `instance`, once.
    pub fn ensure_materialized(&mut self, field: FieldId, instance: InstanceId) {
        if self.materialized.insert(field.0) {
            self.steps.push(ScheduleStep::Materialize { field, instance });
        }
    }

    /// Declares an instance and returns its id.
    pub fn create_instance(
        &mut self,
        domain: impl Into<String>,
        count: InstanceCount,
        layout: Option<LayoutSpec>,
        identity: IdentityMode,
        id_domain: Hash,
    ) -> InstanceId {
        let id = InstanceId(u32::try_from(self.instances.len()).unwrap_or(u32::MAX));
        self.instances.push(InstanceDecl {
            id,
            domain: domain.into(),
            count,
            layout,
            identity,
            id_domain,
        });
        id
    }

    /// The extent token carried in field types bound to `instance`.
    #[must_use]
    pub fn extent_of(instance: InstanceId) -> ExtentId {
        ExtentId(instance.0)
    }

    /// Attaches (or replaces) an instance's layout.
    pub fn set_layout(&mut self, instance: InstanceId, layout: LayoutSpec) {
        self.instances[instance.0 as usize].layout = Some(layout);
    }

    /// Declared element count of an instance (0 when dynamic).
    #[must_use]
    pub fn instance_count(&self, instance: InstanceId) -> usize {
        self.instances[instance.0 as usize].count.fixed().unwrap_or(0)
    }

    /// Instance declaration access for lowering closures.
    #[must_use]
    pub fn instance(&self, instance: InstanceId) -> &InstanceDecl {
        &self.instances[instance.0 as usize]
    }

    /// Load-time object value of a slot, when one was declared.
    #[must_use]
    pub fn object(&self, slot: SlotId) -> Option<&ObjectValue> {
        self.object_init.get(&slot)
    }

    /// Declares a persistent state slot.
    pub fn declare_state(&mut self, stride: u32, initial: Vec<f64>) -> StateId {
        debug_assert_eq!(initial.len(), stride as usize);
        let id = StateId(u32::try_from(self.states.len()).unwrap_or(u32::MAX));
        self.states.push(StateDecl {
            id,
            stride,
            initial,
        });
        id
    }

    /// Declares an event channel.
    pub fn declare_event(&mut self) -> EventId {
        let id = EventId(self.event_count);
        self.event_count += 1;
        id
    }

    /// Sets an object slot's load-time value.
    pub fn set_object(&mut self, slot: SlotId, value: ObjectValue) {
        self.object_init.insert(slot, value);
    }

    /// Binds the time-root slots. Exactly one time root per program; the
    /// topology pass enforces this before lowering runs.
    pub fn set_time(&mut self, binding: TimeBinding) {
        debug_assert!(self.time.is_none(), "second time root reached lowering");
        self.time = Some(binding);
    }

    /// Appends an arbitrary schedule step.
    pub fn push_step(&mut self, step: ScheduleStep) {
        self.steps.push(step);
    }

    /// Defers a state write whose source value lowers later (feedback
    /// edges). The lowering pass resolves the named input port after every
    /// block has produced its outputs and emits the `StateWrite` step.
    pub fn defer_state_write(
        &mut self,
        state: StateId,
        block: crate::ident::BlockId,
        port: impl Into<String>,
    ) {
        self.pending_state_writes.push((state, block, port.into()));
    }

    /// Number of slots allocated so far.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_is_emitted_once_per_field() {
        let mut b = IrBuilder::new();
        let inst = b.create_instance(
            "dot",
            InstanceCount::Fixed(4),
            None,
            IdentityMode::Stable,
            [0u8; 32],
        );
        let f = b.push_field(
            FieldExpr::Const { lanes: vec![1.0] },
            CanonicalType::field(Payload::Float, IrBuilder::extent_of(inst)),
            Some(inst),
        );
        b.ensure_materialized(f, inst);
        b.ensure_materialized(f, inst);
        assert_eq!(
            b.steps
                .iter()
                .filter(|s| matches!(s, ScheduleStep::Materialize { .. }))
                .count(),
            1
        );
    }
}
