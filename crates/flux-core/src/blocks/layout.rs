// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layout family: world-space position generators over an instance.
//!
//! A layout block adopts the instance of whatever field arrives on its
//! `elements` port (typically an Array intrinsic), attaches a layout spec to
//! that instance, and emits the position field. Positions are WORLD-SPACE
//! and unit-normalized.

use crate::block::{
    BlockDef, BlockRegistry, CardinalityMode, Category, LowerCtx, LowerError, PortDef,
    RegistryError,
};
use crate::ir::{FieldExpr, InstanceId, IrBuilder, LayoutSpec, ValueRef};
use crate::types::{Axis, CanonicalType, Cardinality, Payload, Unit};

use super::{field_poly, param_vec2};

fn elements_port() -> PortDef {
    let ty = CanonicalType {
        payload: Axis::Default,
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Instantiated(Cardinality::Field),
        extent: Axis::Default,
    };
    PortDef::new("elements", ty)
}

fn instance_of_elements(ctx: &LowerCtx<'_>) -> Result<InstanceId, LowerError> {
    let field = ctx
        .require_input("elements")?
        .field()
        .ok_or_else(|| LowerError::BadInput {
            port: "elements".to_owned(),
        })?;
    ctx.ir.field_instance(field).ok_or_else(|| {
        LowerError::Unsupported("layout requires an instance-bound field".to_owned())
    })
}

fn bind_position(ctx: &mut LowerCtx<'_>, instance: InstanceId, layout: LayoutSpec) {
    ctx.ir.set_layout(instance, layout);
    let mut ty = ctx.out_type("position");
    ty.cardinality = Axis::Instantiated(Cardinality::Field);
    ty.extent = Axis::Instantiated(IrBuilder::extent_of(instance));
    let field = ctx
        .ir
        .push_field(FieldExpr::Layout { instance }, ty, Some(instance));
    ctx.bind("position", ValueRef::Field(field));
}

fn position_port() -> PortDef {
    PortDef::new("position", field_poly(Payload::Vec3).with_unit(Unit::Scalar))
}

/// Registers the layout family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        BlockDef::new("GridLayout", Category::Layout)
            .cardinality(CardinalityMode::FieldOnly)
            .input(elements_port())
            .output(position_port())
            .lowering(|ctx| {
                let rows = ctx.param_count("rows", 4).max(1);
                let cols = ctx.param_count("cols", 4).max(1);
                let instance = instance_of_elements(ctx)?;
                bind_position(ctx, instance, LayoutSpec::Grid { rows, cols });
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("LineLayout", Category::Layout)
            .cardinality(CardinalityMode::FieldOnly)
            .input(elements_port())
            .output(position_port())
            .lowering(|ctx| {
                let from = param_vec2(ctx, "from", [0.1, 0.5]);
                let to = param_vec2(ctx, "to", [0.9, 0.5]);
                let instance = instance_of_elements(ctx)?;
                bind_position(ctx, instance, LayoutSpec::Line { from, to });
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("CircleLayout", Category::Layout)
            .cardinality(CardinalityMode::FieldOnly)
            .input(elements_port())
            .output(position_port())
            .lowering(|ctx| {
                let center = param_vec2(ctx, "center", [0.5, 0.5]);
                let radius = ctx.param_f64("radius", 0.35);
                let instance = instance_of_elements(ctx)?;
                bind_position(ctx, instance, LayoutSpec::Circle { center, radius });
                Ok(())
            }),
    )?;

    Ok(())
}
