// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Time root blocks.

use crate::block::{BlockDef, BlockRegistry, Capabilities, Category, PortDef, RegistryError};
use crate::ir::{TimeBinding, ValueRef};
use crate::types::{CanonicalType, Contract, Payload, Unit};

/// Registry type name of the infinite time root.
pub const TIME_ROOT: &str = "InfiniteTimeRoot";

/// Registers the time family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    let t_ms = CanonicalType::signal(Payload::Float).with_unit(Unit::Ms);
    let phase = CanonicalType::signal(Payload::Phase)
        .with_unit(Unit::Turns)
        .with_contract(Contract::Wrap01);

    reg.register(
        BlockDef::new(TIME_ROOT, Category::Time)
            .output(PortDef::new("tMs", t_ms))
            .output(PortDef::new("phaseA", phase))
            .output(PortDef::new("phaseB", phase))
            .caps(Capabilities {
                time_root: true,
                stateful: true,
                ..Capabilities::default()
            })
            .lowering(move |ctx| {
                let period_a = ctx.param_f64("periodAMs", 2000.0).max(1.0);
                let period_b = ctx.param_f64("periodBMs", 500.0).max(1.0);
                let t_slot = ctx.ir.alloc_slot(ctx.out_type("tMs"));
                let a_slot = ctx.ir.alloc_slot(ctx.out_type("phaseA"));
                let b_slot = ctx.ir.alloc_slot(ctx.out_type("phaseB"));
                // The executor writes these at frame head; no EvalSig steps.
                ctx.ir.set_time(TimeBinding {
                    t_ms: t_slot,
                    phase_a: a_slot,
                    phase_b: b_slot,
                    period_a_ms: period_a,
                    period_b_ms: period_b,
                });
                ctx.bind("tMs", ValueRef::Slot(t_slot));
                ctx.bind("phaseA", ValueRef::Slot(a_slot));
                ctx.bind("phaseB", ValueRef::Slot(b_slot));
                Ok(())
            }),
    )
}
