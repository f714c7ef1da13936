// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Math family: payload-generic arithmetic preserving cardinality.

use crate::block::{
    BlockDef, BlockRegistry, Category, LowerError, LowerCtx, PayloadGroup, PortDef, RegistryError,
};
use crate::ir::PureFn;
use crate::kernel::Opcode;
use crate::patch::Value;
use crate::types::{Axis, CanonicalType, Payload};

use super::{elementwise, sig_poly};

fn generic_port(name: &str) -> PortDef {
    let ty = CanonicalType {
        payload: Axis::Default,
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Default,
        extent: Axis::Default,
    };
    PortDef::new(name, ty).in_group("t")
}

fn numeric_group() -> PayloadGroup {
    PayloadGroup {
        name: "t".to_owned(),
        allowed: vec![Payload::Float, Payload::Vec2, Payload::Vec3],
    }
}

fn lower_binary(ctx: &mut LowerCtx<'_>, op: Opcode) -> Result<(), LowerError> {
    let a = ctx.require_input("a")?;
    let b = ctx.require_input("b")?;
    let out_ty = ctx.out_type("out");
    let out = elementwise(ctx.ir, PureFn::Opcode(op), &[a, b], out_ty)?;
    ctx.bind("out", out);
    Ok(())
}

/// Registers the math family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        BlockDef::new("Add", Category::Math)
            .generic(numeric_group())
            .allow_broadcast()
            .input(generic_port("a"))
            .input(generic_port("b").with_default(Value::Float(0.0)))
            .output(generic_port("out"))
            .lowering(|ctx| lower_binary(ctx, Opcode::Add)),
    )?;

    reg.register(
        BlockDef::new("Multiply", Category::Math)
            .generic(numeric_group())
            .allow_broadcast()
            .input(generic_port("a"))
            .input(generic_port("b").with_default(Value::Float(1.0)))
            .output(generic_port("out"))
            .lowering(|ctx| lower_binary(ctx, Opcode::Mul)),
    )?;

    reg.register(
        BlockDef::new("Scale", Category::Math)
            .generic(numeric_group())
            .allow_broadcast()
            .input(generic_port("in"))
            .input(
                PortDef::new(
                    "factor",
                    sig_poly(Payload::Float).with_unit(crate::types::Unit::Scalar),
                )
                .with_default(Value::Float(1.0)),
            )
            .output(generic_port("out"))
            .lowering(|ctx| {
                let input = ctx.require_input("in")?;
                let factor = ctx.require_input("factor")?;
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Opcode(Opcode::Mul), &[input, factor], out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Clamp", Category::Math)
            .allow_broadcast()
            .generic(PayloadGroup {
                name: "c".to_owned(),
                allowed: vec![Payload::Float],
            })
            .input(PortDef::new("in", sig_poly(Payload::Float)).in_group("c"))
            .input(
                PortDef::new("lo", sig_poly(Payload::Float))
                    .with_default(Value::Float(0.0))
                    .in_group("c"),
            )
            .input(
                PortDef::new("hi", sig_poly(Payload::Float))
                    .with_default(Value::Float(1.0))
                    .in_group("c"),
            )
            .output(PortDef::new("out", sig_poly(Payload::Float)).in_group("c"))
            .lowering(|ctx| {
                let args = [
                    ctx.require_input("in")?,
                    ctx.require_input("lo")?,
                    ctx.require_input("hi")?,
                ];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Opcode(Opcode::Clamp), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Lerp", Category::Math)
            .generic(numeric_group())
            .allow_broadcast()
            .input(generic_port("a"))
            .input(generic_port("b"))
            .input(
                PortDef::new(
                    "t",
                    sig_poly(Payload::Float).with_unit(crate::types::Unit::Normalized),
                )
                .with_default(Value::Float(0.5)),
            )
            .output(generic_port("out"))
            .lowering(|ctx| {
                let args = [
                    ctx.require_input("a")?,
                    ctx.require_input("b")?,
                    ctx.require_input("t")?,
                ];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Opcode(Opcode::Lerp), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    let vec2_out = sig_poly(Payload::Vec2).with_unit(crate::types::Unit::Scalar);
    let vec3_out = sig_poly(Payload::Vec3).with_unit(crate::types::Unit::Scalar);

    reg.register(
        BlockDef::new("MakeVec2", Category::Math)
            .allow_broadcast()
            .input(PortDef::new("x", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .input(PortDef::new("y", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .output(PortDef::new("out", vec2_out))
            .lowering(|ctx| {
                let args = [ctx.require_input("x")?, ctx.require_input("y")?];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(crate::kernel::FieldKernel::MakeVec2), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("MakeVec3", Category::Math)
            .allow_broadcast()
            .input(PortDef::new("x", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .input(PortDef::new("y", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .input(PortDef::new("z", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .output(PortDef::new("out", vec3_out))
            .lowering(|ctx| {
                let args = [
                    ctx.require_input("x")?,
                    ctx.require_input("y")?,
                    ctx.require_input("z")?,
                ];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(crate::kernel::FieldKernel::MakeVec3), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("PolarToCartesian", Category::Math)
            .allow_broadcast()
            .input(PortDef::new(
                "angle",
                CanonicalType::signal(Payload::Float).with_unit(crate::types::Unit::Radians),
            ))
            .input(
                PortDef::new("radius", sig_poly(Payload::Float)).with_default(Value::Float(1.0)),
            )
            .output(PortDef::new(
                "out",
                sig_poly(Payload::Vec2).with_unit(crate::types::Unit::Scalar),
            ))
            .lowering(|ctx| {
                let args = [ctx.require_input("angle")?, ctx.require_input("radius")?];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(crate::kernel::FieldKernel::PolarToCartesian), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    Ok(())
}
