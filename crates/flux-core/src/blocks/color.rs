// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Color family.

use crate::block::{BlockDef, BlockRegistry, Category, PortDef, RegistryError};
use crate::ir::{PureFn, ValueRef};
use crate::kernel::FieldKernel;
use crate::patch::Value;
use crate::types::{CanonicalType, Contract, Payload, Unit};

use super::{elementwise, sig_poly};

/// Registers the color family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        BlockDef::new("ColorConst", Category::Color)
            .output(PortDef::new(
                "out",
                CanonicalType::signal(Payload::Color).with_contract(Contract::Clamp01),
            ))
            .lowering(|ctx| {
                let lanes = vec![
                    ctx.param_f64("r", 1.0).clamp(0.0, 1.0),
                    ctx.param_f64("g", 1.0).clamp(0.0, 1.0),
                    ctx.param_f64("b", 1.0).clamp(0.0, 1.0),
                    ctx.param_f64("a", 1.0).clamp(0.0, 1.0),
                ];
                let expr = ctx.ir.const_lanes(lanes);
                let slot = ctx.ir.eval_into(ctx.out_type("out"), expr);
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("HsvToRgb", Category::Color)
            .allow_broadcast()
            .input(PortDef::new(
                "hsv",
                sig_poly(Payload::Vec3).with_unit(Unit::Scalar),
            ))
            .output(PortDef::new(
                "color",
                sig_poly(Payload::Color)
                    .with_unit(Unit::Scalar)
                    .with_contract(Contract::Clamp01),
            ))
            .lowering(|ctx| {
                let input = ctx.require_input("hsv")?;
                let out_ty = ctx.out_type("color");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(FieldKernel::HsvToRgb), &[input], out_ty)?;
                ctx.bind("color", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("ApplyOpacity", Category::Color)
            .allow_broadcast()
            .input(PortDef::new(
                "color",
                sig_poly(Payload::Color).with_unit(Unit::Scalar),
            ))
            .input(
                PortDef::new(
                    "opacity",
                    CanonicalType::signal(Payload::Float).with_unit(Unit::Normalized),
                )
                .with_default(Value::Float(1.0)),
            )
            .output(PortDef::new(
                "out",
                sig_poly(Payload::Color).with_unit(Unit::Scalar),
            ))
            .lowering(|ctx| {
                let args = [ctx.require_input("color")?, ctx.require_input("opacity")?];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(FieldKernel::ApplyOpacity), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    Ok(())
}
