// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Adapters and lenses: auto-insertable conversions.
//!
//! Unit adapters are cardinality-preserving (they ride signal or field
//! edges alike). Patterns register alongside the block defs; Pass 2 selects
//! by pattern match and priority.

use core::f64::consts::TAU;

use crate::block::{
    AdapterDef, BlockDef, BlockRegistry, Category, LowerCtx, LowerError, PortDef, RegistryError,
    TypePattern,
};
use crate::ir::{FieldExpr, PureFn, ValueRef};
use crate::kernel::Opcode;
use crate::types::{Axis, CanonicalType, Cardinality, Contract, Payload, Unit};

use super::{const_slot, elementwise};

/// Registry name of the scalar→radians reinterpreting adapter.
pub const ADAPTER_SCALAR_TO_RADIANS: &str = "Adapter_ScalarToRadians";
/// Registry name of the turns→radians converting adapter.
pub const ADAPTER_TURNS_TO_RADIANS: &str = "Adapter_TurnsToRadians";
/// Registry name of the clamp01 lens.
pub const LENS_CLAMP01: &str = "Lens_Clamp01";
/// Registry name of the signal→field broadcast node.
pub const BROADCAST: &str = "Broadcast";

fn float_with_unit(unit: Unit) -> CanonicalType {
    CanonicalType {
        payload: Axis::Instantiated(Payload::Float),
        unit: Axis::Instantiated(unit),
        contract: Axis::Default,
        cardinality: Axis::Default,
        extent: Axis::Default,
    }
}

fn float_open() -> CanonicalType {
    CanonicalType {
        payload: Axis::Instantiated(Payload::Float),
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Default,
        extent: Axis::Default,
    }
}

fn lower_scaled(ctx: &mut LowerCtx<'_>, factor: Option<f64>) -> Result<(), LowerError> {
    let input = ctx.require_input("in")?;
    let out_ty = ctx.out_type("out");
    let out = match factor {
        Some(k) => {
            let k_slot = const_slot(ctx.ir, vec![k], CanonicalType::signal(Payload::Float));
            elementwise(
                ctx.ir,
                PureFn::Opcode(Opcode::Mul),
                &[input, ValueRef::Slot(k_slot)],
                out_ty,
            )?
        }
        // Variadic add of one argument: the identity, re-typed.
        None => elementwise(ctx.ir, PureFn::Opcode(Opcode::Add), &[input], out_ty)?,
    };
    ctx.bind("out", out);
    Ok(())
}

fn unit_adapter(name: &str, from: Unit, to: Unit, factor: Option<f64>) -> BlockDef {
    BlockDef::new(name, Category::Adapter)
        .input(PortDef::new("in", float_with_unit(from)))
        .output(PortDef::new("out", float_with_unit(to)))
        .lowering(move |ctx| lower_scaled(ctx, factor))
}

fn lens(name: &str, contract: Contract) -> BlockDef {
    BlockDef::new(name, Category::Adapter)
        .input(PortDef::new("in", float_open()))
        .output(PortDef::new("out", float_open().with_contract(contract)))
        .lowering(move |ctx| {
            let input = ctx.require_input("in")?;
            let out_ty = ctx.out_type("out");
            let out = match contract {
                Contract::Wrap01 => {
                    elementwise(ctx.ir, PureFn::Opcode(Opcode::Wrap01), &[input], out_ty)?
                }
                Contract::Clamp11 => {
                    let lo = const_slot(ctx.ir, vec![-1.0], CanonicalType::signal(Payload::Float));
                    let hi = const_slot(ctx.ir, vec![1.0], CanonicalType::signal(Payload::Float));
                    elementwise(
                        ctx.ir,
                        PureFn::Opcode(Opcode::Clamp),
                        &[input, ValueRef::Slot(lo), ValueRef::Slot(hi)],
                        out_ty,
                    )?
                }
                Contract::Clamp01 | Contract::None => {
                    let lo = const_slot(ctx.ir, vec![0.0], CanonicalType::signal(Payload::Float));
                    let hi = const_slot(ctx.ir, vec![1.0], CanonicalType::signal(Payload::Float));
                    elementwise(
                        ctx.ir,
                        PureFn::Opcode(Opcode::Clamp),
                        &[input, ValueRef::Slot(lo), ValueRef::Slot(hi)],
                        out_ty,
                    )?
                }
            };
            ctx.bind("out", out);
            Ok(())
        })
}

/// Registers the adapter family and its insertion patterns.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(unit_adapter(
        ADAPTER_SCALAR_TO_RADIANS,
        Unit::Scalar,
        Unit::Radians,
        None,
    ))?;
    reg.register(unit_adapter(
        ADAPTER_TURNS_TO_RADIANS,
        Unit::Turns,
        Unit::Radians,
        Some(TAU),
    ))?;
    reg.register(unit_adapter(
        "Adapter_DegreesToRadians",
        Unit::Degrees,
        Unit::Radians,
        Some(TAU / 360.0),
    ))?;
    reg.register(unit_adapter(
        "Adapter_RadiansToTurns",
        Unit::Radians,
        Unit::Turns,
        Some(1.0 / TAU),
    ))?;
    reg.register(unit_adapter(
        "Adapter_MsToSeconds",
        Unit::Ms,
        Unit::Seconds,
        Some(1e-3),
    ))?;
    reg.register(unit_adapter(
        "Adapter_SecondsToMs",
        Unit::Seconds,
        Unit::Ms,
        Some(1e3),
    ))?;

    reg.register(unit_adapter(
        "Adapter_ScalarToNormalized",
        Unit::Scalar,
        Unit::Normalized,
        None,
    ))?;
    reg.register(unit_adapter(
        "Adapter_NormalizedToScalar",
        Unit::Normalized,
        Unit::Scalar,
        None,
    ))?;

    reg.register(lens(LENS_CLAMP01, Contract::Clamp01))?;
    reg.register(lens("Lens_Wrap01", Contract::Wrap01))?;
    reg.register(lens("Lens_Clamp11", Contract::Clamp11))?;

    reg.register(
        BlockDef::new(BROADCAST, Category::Adapter)
            .generic(crate::block::PayloadGroup {
                name: "p".to_owned(),
                allowed: vec![
                    Payload::Float,
                    Payload::Int,
                    Payload::Bool,
                    Payload::Vec2,
                    Payload::Vec3,
                    Payload::Color,
                    Payload::Phase,
                ],
            })
            .input(
                PortDef::new(
                    "in",
                    CanonicalType {
                        payload: Axis::Default,
                        unit: Axis::Default,
                        contract: Axis::Default,
                        cardinality: Axis::Instantiated(Cardinality::Signal),
                        extent: Axis::Default,
                    },
                )
                .in_group("p"),
            )
            .output(
                PortDef::new(
                    "out",
                    CanonicalType {
                        payload: Axis::Default,
                        unit: Axis::Default,
                        contract: Axis::Default,
                        cardinality: Axis::Instantiated(Cardinality::Field),
                        extent: Axis::Default,
                    },
                )
                .in_group("p"),
            )
            .lowering(|ctx| {
                let signal =
                    ctx.require_input("in")?
                        .slot()
                        .ok_or_else(|| LowerError::BadInput {
                            port: "in".to_owned(),
                        })?;
                let ty = ctx.out_type("out");
                let field = ctx.ir.push_field(FieldExpr::Broadcast { signal }, ty, None);
                ctx.bind("out", ValueRef::Field(field));
                Ok(())
            }),
    )?;

    for (name, priority, from, to) in [
        (
            ADAPTER_SCALAR_TO_RADIANS,
            1,
            TypePattern::any().payload(Payload::Float).unit(Unit::Scalar),
            TypePattern::any().unit(Unit::Radians),
        ),
        (
            ADAPTER_TURNS_TO_RADIANS,
            5,
            TypePattern::any().unit(Unit::Turns),
            TypePattern::any().unit(Unit::Radians),
        ),
        (
            "Adapter_DegreesToRadians",
            5,
            TypePattern::any().unit(Unit::Degrees),
            TypePattern::any().unit(Unit::Radians),
        ),
        (
            "Adapter_RadiansToTurns",
            5,
            TypePattern::any().unit(Unit::Radians),
            TypePattern::any().unit(Unit::Turns),
        ),
        (
            "Adapter_MsToSeconds",
            5,
            TypePattern::any().unit(Unit::Ms),
            TypePattern::any().unit(Unit::Seconds),
        ),
        (
            "Adapter_SecondsToMs",
            5,
            TypePattern::any().unit(Unit::Seconds),
            TypePattern::any().unit(Unit::Ms),
        ),
        (
            "Adapter_ScalarToNormalized",
            1,
            TypePattern::any().payload(Payload::Float).unit(Unit::Scalar),
            TypePattern::any().unit(Unit::Normalized),
        ),
        (
            "Adapter_NormalizedToScalar",
            1,
            TypePattern::any()
                .payload(Payload::Float)
                .unit(Unit::Normalized),
            TypePattern::any().unit(Unit::Scalar),
        ),
        (
            LENS_CLAMP01,
            5,
            TypePattern::any(),
            TypePattern::any().contract(Contract::Clamp01),
        ),
        (
            "Lens_Wrap01",
            5,
            TypePattern::any(),
            TypePattern::any().contract(Contract::Wrap01),
        ),
        (
            "Lens_Clamp11",
            5,
            TypePattern::any(),
            TypePattern::any().contract(Contract::Clamp11),
        ),
    ] {
        reg.register_adapter(AdapterDef {
            type_name: name.to_owned(),
            priority,
            from,
            to,
        })?;
    }

    Ok(())
}
