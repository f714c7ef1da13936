// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Signal family: constants, oscillators, easings, shaping, events.

use crate::block::{
    BlockDef, BlockRegistry, Capabilities, CardinalityMode, Category, LowerError, PortDef,
    RegistryError,
};
use crate::ir::{ValueExpr, ValueRef};
use crate::kernel::SignalKernel;
use crate::patch::Value;
use crate::types::{Axis, CanonicalType, Cardinality, Contract, Payload, Unit};

use super::{sig_any, sig_poly};

fn event_ty() -> CanonicalType {
    CanonicalType {
        payload: Axis::Instantiated(Payload::Float),
        unit: Axis::Instantiated(Unit::Scalar),
        contract: Axis::Instantiated(Contract::None),
        cardinality: Axis::Instantiated(Cardinality::Event),
        extent: Axis::Default,
    }
}

fn read_input_slot(
    ctx: &mut crate::block::LowerCtx<'_>,
    port: &str,
) -> Result<crate::ir::ValueExprId, LowerError> {
    let slot = ctx
        .require_input(port)?
        .slot()
        .ok_or_else(|| LowerError::BadInput {
            port: port.to_owned(),
        })?;
    Ok(ctx.ir.read_slot(slot))
}

/// Registers the signal family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    let phase_in = CanonicalType::signal(Payload::Phase)
        .with_unit(Unit::Turns)
        .with_contract(Contract::Wrap01);
    let norm = CanonicalType::signal(Payload::Float)
        .with_unit(Unit::Normalized)
        .with_contract(Contract::Clamp01);

    reg.register(
        BlockDef::new("Const", Category::Signal)
            // A bare literal carries no unit; it reads as scalar, and
            // flowing it into an annotated port takes an explicit adapter.
            .output(PortDef::new(
                "out",
                sig_poly(Payload::Float).with_unit(Unit::Scalar),
            ))
            .lowering(|ctx| {
                let value = ctx.param_f64("value", 0.0);
                let expr = ctx.ir.const_scalar(value);
                let slot = ctx.ir.eval_into(ctx.out_type("out"), expr);
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Oscillator", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(PortDef::new("phase", phase_in).with_default(Value::Float(0.0)))
            .output(PortDef::new(
                "value",
                CanonicalType::signal(Payload::Float).with_contract(Contract::Clamp11),
            ))
            .lowering(|ctx| {
                let wave = ctx.param_str("wave").unwrap_or("oscSin");
                let kernel = SignalKernel::parse(wave)
                    .filter(|k| k.is_oscillator())
                    .ok_or(LowerError::InvalidConfig {
                        key: "wave".to_owned(),
                        expected: "an oscillator kernel name",
                    })?;
                let arg = read_input_slot(ctx, "phase")?;
                let expr = ctx.ir.push_value(ValueExpr::Kernel {
                    kernel,
                    args: vec![arg],
                });
                let slot = ctx.ir.eval_into(ctx.out_type("value"), expr);
                ctx.bind("value", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Ease", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(PortDef::new("t", norm).with_default(Value::Float(0.0)))
            .output(PortDef::new("value", norm))
            .lowering(|ctx| {
                let curve = ctx.param_str("curve").unwrap_or("easeInOutQuad");
                let kernel = SignalKernel::parse(curve)
                    .filter(|k| !k.is_oscillator() && k.arg_count() == 1)
                    .ok_or(LowerError::InvalidConfig {
                        key: "curve".to_owned(),
                        expected: "an easing kernel name",
                    })?;
                let arg = read_input_slot(ctx, "t")?;
                let expr = ctx.ir.push_value(ValueExpr::Kernel {
                    kernel,
                    args: vec![arg],
                });
                let slot = ctx.ir.eval_into(ctx.out_type("value"), expr);
                ctx.bind("value", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Smoothstep", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(
                PortDef::new("e0", CanonicalType::signal(Payload::Float))
                    .with_default(Value::Float(0.0)),
            )
            .input(
                PortDef::new("e1", CanonicalType::signal(Payload::Float))
                    .with_default(Value::Float(1.0)),
            )
            .input(PortDef::new("x", CanonicalType::signal(Payload::Float)))
            .output(PortDef::new(
                "value",
                CanonicalType::signal(Payload::Float).with_contract(Contract::Clamp01),
            ))
            .lowering(|ctx| {
                let args = vec![
                    read_input_slot(ctx, "e0")?,
                    read_input_slot(ctx, "e1")?,
                    read_input_slot(ctx, "x")?,
                ];
                let expr = ctx.ir.push_value(ValueExpr::Kernel {
                    kernel: SignalKernel::Smoothstep,
                    args,
                });
                let slot = ctx.ir.eval_into(ctx.out_type("value"), expr);
                ctx.bind("value", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Step", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(
                PortDef::new("edge", CanonicalType::signal(Payload::Float))
                    .with_default(Value::Float(0.5)),
            )
            .input(PortDef::new("x", CanonicalType::signal(Payload::Float)))
            .output(PortDef::new(
                "value",
                CanonicalType::signal(Payload::Float).with_contract(Contract::Clamp01),
            ))
            .lowering(|ctx| {
                let args = vec![read_input_slot(ctx, "edge")?, read_input_slot(ctx, "x")?];
                let expr = ctx.ir.push_value(ValueExpr::Kernel {
                    kernel: SignalKernel::Step,
                    args,
                });
                let slot = ctx.ir.eval_into(ctx.out_type("value"), expr);
                ctx.bind("value", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Noise", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(PortDef::new("x", CanonicalType::signal(Payload::Float)))
            .output(PortDef::new(
                "value",
                CanonicalType::signal(Payload::Float).with_contract(Contract::Wrap01),
            ))
            .lowering(|ctx| {
                let arg = read_input_slot(ctx, "x")?;
                let expr = ctx.ir.push_value(ValueExpr::Kernel {
                    kernel: SignalKernel::Noise,
                    args: vec![arg],
                });
                let slot = ctx.ir.eval_into(ctx.out_type("value"), expr);
                ctx.bind("value", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Crossing", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .input(PortDef::new("signal", sig_poly(Payload::Float)))
            .output(PortDef::new("event", event_ty()))
            .caps(Capabilities {
                stateful: true,
                ..Capabilities::default()
            })
            .lowering(|ctx| {
                let threshold = ctx.param_f64("threshold", 0.0);
                let hysteresis = ctx.param_f64("hysteresis", 0.0).abs();
                let signal = read_input_slot(ctx, "signal")?;
                // state: [previous sample, armed flag]
                let state = ctx.ir.declare_state(2, vec![f64::NAN, 1.0]);
                let event = ctx.ir.declare_event();
                let expr = ctx.ir.push_value(ValueExpr::CrossingEvent {
                    signal,
                    threshold,
                    hysteresis,
                    state,
                });
                ctx.ir.push_step(crate::ir::ScheduleStep::Event { event, expr });
                ctx.bind("event", ValueRef::Event(event));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Hold", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .generic(crate::block::PayloadGroup {
                name: "h".to_owned(),
                allowed: vec![Payload::Float, Payload::Vec2, Payload::Vec3, Payload::Color],
            })
            .input(PortDef::new("trigger", event_ty()))
            .input(
                PortDef::new("value", sig_any())
                    .with_default(Value::Float(0.0))
                    .in_group("h"),
            )
            .output(PortDef::new("out", sig_any()).in_group("h"))
            .caps(Capabilities {
                stateful: true,
                ..Capabilities::default()
            })
            .lowering(|ctx| {
                let event = ctx
                    .require_input("trigger")?
                    .event()
                    .ok_or_else(|| LowerError::BadInput {
                        port: "trigger".to_owned(),
                    })?;
                let value = read_input_slot(ctx, "value")?;
                let out_ty = ctx.out_type("out");
                let stride = out_ty.payload.value().map_or(1, Payload::stride);
                let initial = ctx.param_f64("initial", 0.0);
                let state = ctx
                    .ir
                    .declare_state(stride, vec![initial; stride as usize]);
                let expr = ctx.ir.push_value(ValueExpr::Hold {
                    event,
                    value,
                    initial: vec![initial; stride as usize],
                    state,
                });
                let slot = ctx.ir.eval_into(out_ty, expr);
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Memory", Category::Signal)
            .cardinality(CardinalityMode::SignalOnly)
            .generic(crate::block::PayloadGroup {
                name: "m".to_owned(),
                allowed: vec![Payload::Float, Payload::Vec2, Payload::Vec3, Payload::Color],
            })
            .input(PortDef::new("in", sig_any()).in_group("m"))
            .output(PortDef::new("out", sig_any()).in_group("m"))
            .caps(Capabilities {
                stateful: true,
                ..Capabilities::default()
            })
            .lowering(|ctx| {
                // Reads land at step head, the write at step tail; the
                // in-edge is severed for cycle detection, which is what
                // makes authored feedback loops legal.
                let out_ty = ctx.out_type("out");
                let stride = out_ty.payload.value().map_or(1, Payload::stride);
                let initial = ctx.param_f64("initial", 0.0);
                let state = ctx
                    .ir
                    .declare_state(stride, vec![initial; stride as usize]);
                let slot = ctx.ir.alloc_slot(out_ty);
                ctx.ir
                    .push_step(crate::ir::ScheduleStep::StateRead { slot, state });
                let block_id = ctx.block().id;
                ctx.ir.defer_state_write(state, block_id, "in");
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    Ok(())
}
