// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field family: instance sources and per-lane operations.

use crate::block::{
    BlockDef, BlockRegistry, CardinalityMode, Category, LowerError, PortDef, RegistryError,
};
use crate::ir::{
    FieldExpr, IdentityMode, InstanceCount, Intrinsic, IrBuilder, PureFn, ReduceOp, ValueExpr,
    ValueRef,
};
use crate::kernel::FieldKernel;
use crate::patch::Value;
use crate::types::{Axis, CanonicalType, Cardinality, Contract, Payload, Unit};

use super::{elementwise, field_poly, sig_poly};

/// Registers the field family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        BlockDef::new("Array", Category::Field)
            .cardinality(CardinalityMode::FieldOnly)
            .output(PortDef::new(
                "index",
                field_poly(Payload::Float).with_unit(Unit::Count),
            ))
            .output(PortDef::new(
                "normalizedIndex",
                field_poly(Payload::Float)
                    .with_unit(Unit::Normalized)
                    .with_contract(Contract::Clamp01),
            ))
            .output(PortDef::new(
                "randomId",
                field_poly(Payload::Float)
                    .with_unit(Unit::Scalar)
                    .with_contract(Contract::Wrap01),
            ))
            .lowering(|ctx| {
                let count = ctx.param_count("count", 16);
                let id_domain = ctx.target("elements").0;
                let instance = ctx.ir.create_instance(
                    ctx.param_str("domain").unwrap_or("point").to_owned(),
                    InstanceCount::Fixed(count),
                    None,
                    IdentityMode::Stable,
                    id_domain,
                );
                let extent = IrBuilder::extent_of(instance);
                for (port, which) in [
                    ("index", Intrinsic::Index),
                    ("normalizedIndex", Intrinsic::NormalizedIndex),
                    ("randomId", Intrinsic::RandomId),
                ] {
                    let mut ty = ctx.out_type(port);
                    ty.cardinality = Axis::Instantiated(Cardinality::Field);
                    ty.extent = Axis::Instantiated(extent);
                    let field = ctx
                        .ir
                        .push_field(FieldExpr::Intrinsic { instance, which }, ty, Some(instance));
                    ctx.bind(port, ValueRef::Field(field));
                }
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Jitter2D", Category::Field)
            .cardinality(CardinalityMode::FieldOnly)
            .allow_broadcast()
            .input(PortDef::new(
                "position",
                field_poly(Payload::Vec3).with_unit(Unit::Scalar),
            ))
            .input(
                PortDef::new("amount", sig_poly(Payload::Float).with_unit(Unit::Scalar))
                    .with_default(Value::Float(0.1)),
            )
            .output(PortDef::new(
                "out",
                field_poly(Payload::Vec3).with_unit(Unit::Scalar),
            ))
            .lowering(|ctx| {
                let args = [ctx.require_input("position")?, ctx.require_input("amount")?];
                let out_ty = ctx.out_type("out");
                let out = elementwise(ctx.ir,
                    PureFn::Kernel(FieldKernel::Jitter2d), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("FieldEffect", Category::Field)
            .cardinality(CardinalityMode::FieldOnly)
            .allow_broadcast()
            .input(PortDef::new("in", field_poly(Payload::Float)))
            .input(
                PortDef::new("param", sig_poly(Payload::Float).with_unit(Unit::Scalar))
                    .with_default(Value::Float(0.0)),
            )
            .output(PortDef::new(
                "out",
                CanonicalType {
                    payload: Axis::Default,
                    unit: Axis::Default,
                    contract: Axis::Default,
                    cardinality: Axis::Instantiated(Cardinality::Field),
                    extent: Axis::Default,
                },
            ))
            .lowering(|ctx| {
                let effect = ctx.param_str("effect").unwrap_or("fieldPulse");
                let kernel = match effect {
                    "fieldPulse" => FieldKernel::FieldPulse,
                    "fieldAngularOffset" => FieldKernel::FieldAngularOffset,
                    "fieldRadiusSqrt" => FieldKernel::FieldRadiusSqrt,
                    "fieldGoldenAngle" => FieldKernel::FieldGoldenAngle,
                    "fieldHueFromPhase" => FieldKernel::FieldHueFromPhase,
                    _ => {
                        return Err(LowerError::InvalidConfig {
                            key: "effect".to_owned(),
                            expected: "a field effect kernel name",
                        });
                    }
                };
                let out_ty = ctx.out_type("out");
                if let Some(p) = out_ty.payload.value() {
                    if p.stride() != kernel.out_stride() {
                        return Err(LowerError::Unsupported(format!(
                            "effect {} produces stride {}, but the wired payload is {}",
                            kernel.name(),
                            kernel.out_stride(),
                            p.name()
                        )));
                    }
                }
                let input = ctx.require_input("in")?;
                let args: Vec<ValueRef> = if kernel.arg_count() == 2 {
                    vec![input, ctx.require_input("param")?]
                } else {
                    vec![input]
                };
                let out = elementwise(ctx.ir, PureFn::Kernel(kernel), &args, out_ty)?;
                ctx.bind("out", out);
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Reduce", Category::Field)
            .cardinality(CardinalityMode::Collapse)
            .input(PortDef::new("in", field_poly(Payload::Float)))
            .output(PortDef::new("out", sig_poly(Payload::Float)))
            .lowering(|ctx| {
                let op = ReduceOp::parse(ctx.param_str("op").unwrap_or("average")).ok_or(
                    LowerError::InvalidConfig {
                        key: "op".to_owned(),
                        expected: "sum|average|min|max",
                    },
                )?;
                let field = ctx
                    .require_input("in")?
                    .field()
                    .ok_or_else(|| LowerError::BadInput {
                        port: "in".to_owned(),
                    })?;
                let instance =
                    ctx.ir
                        .field_instance(field)
                        .ok_or_else(|| LowerError::Unsupported(
                            "reduce requires an instance-bound field".to_owned(),
                        ))?;
                ctx.ir.ensure_materialized(field, instance);
                let expr = ctx.ir.push_value(ValueExpr::Reduce { field, op });
                let slot = ctx.ir.eval_into(ctx.out_type("out"), expr);
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("Select", Category::Field)
            .cardinality(CardinalityMode::Collapse)
            .input(PortDef::new("in", field_poly(Payload::Float)))
            .input(PortDef::new("index", sig_poly(Payload::Float)).with_default(Value::Float(0.0)))
            .output(PortDef::new("out", sig_poly(Payload::Float)))
            .lowering(|ctx| {
                let field = ctx
                    .require_input("in")?
                    .field()
                    .ok_or_else(|| LowerError::BadInput {
                        port: "in".to_owned(),
                    })?;
                let instance =
                    ctx.ir
                        .field_instance(field)
                        .ok_or_else(|| LowerError::Unsupported(
                            "select requires an instance-bound field".to_owned(),
                        ))?;
                ctx.ir.ensure_materialized(field, instance);
                let index_slot = ctx
                    .require_input("index")?
                    .slot()
                    .ok_or_else(|| LowerError::BadInput {
                        port: "index".to_owned(),
                    })?;
                let index = ctx.ir.read_slot(index_slot);
                let expr = ctx
                    .ir
                    .push_value(ValueExpr::SelectFromField { field, index });
                let slot = ctx.ir.eval_into(ctx.out_type("out"), expr);
                ctx.bind("out", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    Ok(())
}
