// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass 7 — schedule assembly.
//!
//! Merges the per-block step fragments into the global frame plan. Lowering
//! already emitted fragments in topological order with `(blockId, portId)`
//! tie-breaking, so ordering within a class is preserved; this pass imposes
//! the class ordering: state reads at step head, the evaluation body in
//! emission order, state writes at step tail, then projection and render.

use crate::ir::ScheduleStep;

fn class_of(step: &ScheduleStep) -> u8 {
    match step {
        ScheduleStep::StateRead { .. } => 0,
        ScheduleStep::EvalSig { .. } | ScheduleStep::Event { .. } | ScheduleStep::Materialize { .. } => 1,
        ScheduleStep::StateWrite { .. } => 2,
        ScheduleStep::Projection { .. } => 3,
        ScheduleStep::Render(_) => 4,
    }
}

/// Orders the collected steps into the final schedule.
pub(crate) fn assemble(steps: Vec<ScheduleStep>) -> Vec<ScheduleStep> {
    let mut ordered = steps;
    // Stable: emission order survives within each class.
    ordered.sort_by_key(class_of);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EventId, SlotId, StateId, ValueExprId};

    #[test]
    fn state_reads_head_writes_tail_renders_last() {
        let steps = vec![
            ScheduleStep::EvalSig {
                slot: SlotId(0),
                expr: ValueExprId(0),
            },
            ScheduleStep::StateWrite {
                state: StateId(0),
                slot: SlotId(0),
            },
            ScheduleStep::StateRead {
                slot: SlotId(1),
                state: StateId(0),
            },
            ScheduleStep::Event {
                event: EventId(0),
                expr: ValueExprId(1),
            },
        ];
        let ordered = assemble(steps);
        assert!(matches!(ordered[0], ScheduleStep::StateRead { .. }));
        assert!(matches!(ordered[1], ScheduleStep::EvalSig { .. }));
        assert!(matches!(ordered[2], ScheduleStep::Event { .. }));
        assert!(matches!(ordered[3], ScheduleStep::StateWrite { .. }));
    }
}
