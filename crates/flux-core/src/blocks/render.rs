// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer blocks: package fields into draw bindings.
//!
//! A renderer adopts the instance of its field inputs; when every bound
//! input is a broadcast (no pinned instance anywhere), it creates an
//! implicit single-element instance so a plain signal chain still draws.

use crate::block::{
    BlockDef, BlockRegistry, Capabilities, CardinalityMode, Category, LowerCtx, LowerError,
    PortDef, RegistryError,
};
use crate::ir::{
    DrawTopology, FieldId, IdentityMode, InstanceCount, InstanceId, LineCap, LineJoin,
    RenderBinding, ScheduleStep, StyleSpec, ValueRef,
};
use crate::patch::Value;
use crate::types::{Axis, CanonicalType, Cardinality, Contract, Payload, Unit};

use super::{as_field, common_instance, field_poly};

fn style_from_params(ctx: &LowerCtx<'_>) -> StyleSpec {
    fn color_param(ctx: &LowerCtx<'_>, key: &str) -> Option<[f64; 4]> {
        match ctx.param(key) {
            Some(Value::Color(c)) => Some(*c),
            _ => None,
        }
    }
    StyleSpec {
        fill: color_param(ctx, "fillColor"),
        stroke: color_param(ctx, "strokeColor"),
        stroke_width: ctx.param("strokeWidth").and_then(Value::as_f64),
        line_cap: match ctx.param_str("lineCap") {
            Some("butt") => Some(LineCap::Butt),
            Some("round") => Some(LineCap::Round),
            Some("square") => Some(LineCap::Square),
            _ => None,
        },
        line_join: match ctx.param_str("lineJoin") {
            Some("miter") => Some(LineJoin::Miter),
            Some("round") => Some(LineJoin::Round),
            Some("bevel") => Some(LineJoin::Bevel),
            _ => None,
        },
    }
}

fn position_port() -> PortDef {
    // Accepts vec2 or vec3; the payload pass pins it from the producer.
    let ty = CanonicalType {
        payload: Axis::Default,
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Instantiated(Cardinality::Field),
        extent: Axis::Default,
    };
    PortDef::new("position", ty).in_group("pos")
}

fn common_render_def(def: BlockDef) -> BlockDef {
    def.cardinality(CardinalityMode::FieldOnly)
        .allow_broadcast()
        .generic(crate::block::PayloadGroup {
            name: "pos".to_owned(),
            allowed: vec![Payload::Vec2, Payload::Vec3],
        })
        .caps(Capabilities {
            renderer: true,
            ..Capabilities::default()
        })
        .input(position_port())
        .input(
            PortDef::new(
                "radius",
                field_poly(Payload::Float).with_unit(Unit::Scalar),
            )
            .with_default(Value::Float(0.02)),
        )
        .input(
            PortDef::new(
                "color",
                field_poly(Payload::Color)
                    .with_unit(Unit::Scalar)
                    .with_contract(Contract::Clamp01),
            )
            .with_default(Value::Color([1.0, 1.0, 1.0, 1.0])),
        )
        .input(
            PortDef::new(
                "opacity",
                field_poly(Payload::Float).with_unit(Unit::Normalized),
            )
            .optional(),
        )
        .input(
            PortDef::new(
                "rotation",
                field_poly(Payload::Float).with_unit(Unit::Radians),
            )
            .optional(),
        )
        .input(PortDef::new("camera", CanonicalType::signal(Payload::CameraProjection)).optional())
}

struct BoundFields {
    instance: InstanceId,
    position: FieldId,
    radius: FieldId,
    color: FieldId,
    opacity: Option<FieldId>,
    rotation: Option<FieldId>,
}

fn bind_fields(ctx: &mut LowerCtx<'_>) -> Result<BoundFields, LowerError> {
    let pos_ref = ctx.require_input("position")?;
    let mut refs = vec![pos_ref];
    for port in ["radius", "color", "opacity", "rotation"] {
        if let Some(r) = ctx.input(port) {
            refs.push(r);
        }
    }
    let instance = match common_instance(ctx.ir, &refs)? {
        Some(i) => i,
        None => {
            // Signal-only chain: one implicit element.
            let id_domain = ctx.target("position").0;
            ctx.ir.create_instance(
                "single",
                InstanceCount::Fixed(1),
                None,
                IdentityMode::Stable,
                id_domain,
            )
        }
    };

    let position = {
        let ty = ctx.in_type("position");
        let r = pos_ref;
        as_field(ctx.ir, r, ty)?
    };
    let radius = {
        let r = ctx.require_input("radius")?;
        let ty = ctx.in_type("radius");
        as_field(ctx.ir, r, ty)?
    };
    let color = {
        let r = ctx.require_input("color")?;
        let ty = ctx.in_type("color");
        as_field(ctx.ir, r, ty)?
    };
    let opacity = match ctx.input("opacity") {
        Some(r) => {
            let ty = ctx.in_type("opacity");
            Some(as_field(ctx.ir, r, ty)?)
        }
        None => None,
    };
    let rotation = match ctx.input("rotation") {
        Some(r) => {
            let ty = ctx.in_type("rotation");
            Some(as_field(ctx.ir, r, ty)?)
        }
        None => None,
    };

    for field in [Some(position), Some(radius), Some(color), opacity, rotation]
        .into_iter()
        .flatten()
    {
        ctx.ir.ensure_materialized(field, instance);
    }

    Ok(BoundFields {
        instance,
        position,
        radius,
        color,
        opacity,
        rotation,
    })
}

fn push_render(
    ctx: &mut LowerCtx<'_>,
    bound: BoundFields,
    topology: DrawTopology,
    geometry: Option<crate::ir::SlotId>,
) {
    let camera = ctx.input("camera").and_then(ValueRef::slot);
    ctx.ir.push_step(ScheduleStep::Projection {
        instance: bound.instance,
        camera,
    });
    let style = style_from_params(ctx);
    let binding = RenderBinding {
        instance: bound.instance,
        position: bound.position,
        radius: bound.radius,
        color: bound.color,
        opacity: bound.opacity,
        rotation: bound.rotation,
        scale2: None,
        geometry,
        topology,
        style,
        target_position: ctx.target("position"),
        target_color: ctx.target("color"),
        target_radius: ctx.target("radius"),
    };
    ctx.ir.push_step(ScheduleStep::Render(Box::new(binding)));
}

/// Registers the renderer family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        common_render_def(BlockDef::new("RenderPrimitiveInstances", Category::Render)).lowering(
            |ctx| {
                let topology = match ctx.param_str("topology").unwrap_or("circle") {
                    "circle" => DrawTopology::Circle,
                    "square" => DrawTopology::Square,
                    _ => {
                        return Err(LowerError::InvalidConfig {
                            key: "topology".to_owned(),
                            expected: "circle|square",
                        });
                    }
                };
                let bound = bind_fields(ctx)?;
                push_render(ctx, bound, topology, None);
                Ok(())
            },
        ),
    )?;

    reg.register(
        common_render_def(BlockDef::new("RenderPathInstances", Category::Render))
            .input(PortDef::new("shape", CanonicalType::signal(Payload::Shape)))
            .lowering(|ctx| {
                let geometry = ctx
                    .require_input("shape")?
                    .slot()
                    .ok_or_else(|| LowerError::BadInput {
                        port: "shape".to_owned(),
                    })?;
                let bound = bind_fields(ctx)?;
                push_render(ctx, bound, DrawTopology::Path, Some(geometry));
                Ok(())
            }),
    )?;

    Ok(())
}
