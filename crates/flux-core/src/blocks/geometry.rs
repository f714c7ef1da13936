// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geometry family: local-space shapes, path derivatives, cameras.

use crate::block::{
    BlockDef, BlockRegistry, CardinalityMode, Category, LowerError, PortDef, RegistryError,
};
use crate::ir::{
    CameraProjection, FieldExpr, IdentityMode, InstanceCount, IrBuilder, ObjectValue, PathGeometry,
    ValueRef,
};
use crate::kernel::{polygon_vertex, seed_from_hash, PathDeriveKind};
use crate::types::{Axis, CanonicalType, Cardinality, Payload, Unit};

use super::{field_poly, param_vec2};

fn shape_ty() -> CanonicalType {
    CanonicalType::signal(Payload::Shape)
}

fn camera_ty() -> CanonicalType {
    CanonicalType::signal(Payload::CameraProjection)
}

/// Registers the geometry family.
pub fn register(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    reg.register(
        BlockDef::new("PolygonGeometry", Category::Geometry)
            .output(PortDef::new("shape", shape_ty()))
            .lowering(|ctx| {
                let sides = ctx.param_count("sides", 5).max(3);
                let rx = ctx.param_f64("rx", 0.5);
                let ry = ctx.param_f64("ry", 0.5);
                let points: Vec<[f64; 2]> = (0..sides)
                    .map(|i| polygon_vertex(i, sides, rx, ry))
                    .collect();
                // Topology keys draw-op batching; role-derived so identical
                // blocks in two patches group identically.
                let topology = seed_from_hash(ctx.target("shape").as_bytes());
                let slot = ctx.ir.alloc_slot(ctx.out_type("shape"));
                ctx.ir.set_object(
                    slot,
                    ObjectValue::Shape(PathGeometry {
                        topology,
                        points,
                        closed: true,
                    }),
                );
                ctx.bind("shape", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    reg.register(
        BlockDef::new("PathFrame", Category::Path)
            .cardinality(CardinalityMode::FieldOnly)
            .input(PortDef::new("shape", shape_ty()))
            .output(PortDef::new(
                "derivative",
                field_poly(Payload::Vec2).with_unit(Unit::Scalar),
            ))
            .lowering(|ctx| {
                let kind = match ctx.param_str("kind").unwrap_or("tangent") {
                    "tangent" => PathDeriveKind::Tangent,
                    "normal" => PathDeriveKind::Normal,
                    _ => {
                        return Err(LowerError::InvalidConfig {
                            key: "kind".to_owned(),
                            expected: "tangent|normal",
                        });
                    }
                };
                lower_path_derive(ctx, kind, "derivative")
            }),
    )?;

    reg.register(
        BlockDef::new("PathArcLength", Category::Path)
            .cardinality(CardinalityMode::FieldOnly)
            .input(PortDef::new("shape", shape_ty()))
            .output(PortDef::new(
                "length",
                field_poly(Payload::Float).with_unit(Unit::Scalar),
            ))
            .lowering(|ctx| lower_path_derive(ctx, PathDeriveKind::ArcLength, "length")),
    )?;

    reg.register(
        BlockDef::new("Camera", Category::Render)
            .output(PortDef::new("camera", camera_ty()))
            .lowering(|ctx| {
                let center = param_vec2(ctx, "center", [0.5, 0.5]);
                let zoom = ctx.param_f64("zoom", 1.0);
                let slot = ctx.ir.alloc_slot(ctx.out_type("camera"));
                ctx.ir.set_object(
                    slot,
                    ObjectValue::Camera(CameraProjection::Orthographic { center, zoom }),
                );
                ctx.bind("camera", ValueRef::Slot(slot));
                Ok(())
            }),
    )?;

    Ok(())
}

fn lower_path_derive(
    ctx: &mut crate::block::LowerCtx<'_>,
    kind: PathDeriveKind,
    out_port: &str,
) -> Result<(), LowerError> {
    let geometry = ctx
        .require_input("shape")?
        .slot()
        .ok_or_else(|| LowerError::BadInput {
            port: "shape".to_owned(),
        })?;
    let Some(ObjectValue::Shape(shape)) = ctx.ir.object(geometry) else {
        return Err(LowerError::Unsupported(
            "path derivatives require compile-time geometry".to_owned(),
        ));
    };
    let count = shape.points.len();
    let id_domain = ctx.target(out_port).0;
    let instance = ctx.ir.create_instance(
        "controlPoint",
        InstanceCount::Fixed(count),
        None,
        IdentityMode::Stable,
        id_domain,
    );
    let mut ty = ctx.out_type(out_port);
    ty.cardinality = Axis::Instantiated(Cardinality::Field);
    ty.unit = Axis::Instantiated(Unit::Scalar);
    ty.extent = Axis::Instantiated(IrBuilder::extent_of(instance));
    let field = ctx.ir.push_field(
        FieldExpr::PathDerivative {
            geometry,
            instance,
            kind,
        },
        ty,
        Some(instance),
    );
    ctx.bind(out_port, ValueRef::Field(field));
    Ok(())
}
