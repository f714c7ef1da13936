// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builtin block library.
//!
//! One module per family; [`register_builtins`] populates a registry with
//! the full set. Lowering closures share the elementwise helper below so
//! signal/field mixing behaves identically across blocks: all-signal inputs
//! evaluate in scalar context, any field input promotes the operation to
//! `map`/`zip`/`zipSig` over the common instance.

mod adapter;
mod color;
mod field;
mod geometry;
mod layout;
mod math;
mod render;
mod signal;
mod time;

use crate::block::{BlockRegistry, LowerCtx, LowerError, RegistryError};
use crate::ir::{FieldExpr, InstanceId, IrBuilder, PureFn, ValueExpr, ValueRef, ZipArg};
use crate::types::{Axis, CanonicalType, Cardinality};

pub use adapter::{ADAPTER_SCALAR_TO_RADIANS, ADAPTER_TURNS_TO_RADIANS, BROADCAST, LENS_CLAMP01};
pub use time::TIME_ROOT;

/// Registers every builtin block and adapter pattern.
pub fn register_builtins(reg: &mut BlockRegistry) -> Result<(), RegistryError> {
    time::register(reg)?;
    signal::register(reg)?;
    math::register(reg)?;
    field::register(reg)?;
    layout::register(reg)?;
    geometry::register(reg)?;
    color::register(reg)?;
    render::register(reg)?;
    adapter::register(reg)?;
    Ok(())
}

/// Signal type with an instantiated payload and polymorphic unit/contract,
/// for ports that adopt their neighbors' annotations.
#[must_use]
pub(crate) fn sig_poly(payload: crate::types::Payload) -> CanonicalType {
    CanonicalType {
        payload: Axis::Instantiated(payload),
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Instantiated(Cardinality::Signal),
        extent: Axis::Default,
    }
}

/// Field type with an instantiated payload and polymorphic extent.
#[must_use]
pub(crate) fn field_poly(payload: crate::types::Payload) -> CanonicalType {
    CanonicalType {
        payload: Axis::Instantiated(payload),
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Instantiated(Cardinality::Field),
        extent: Axis::Default,
    }
}

/// Fully polymorphic-but-signal type (payload inferred).
#[must_use]
pub(crate) fn sig_any() -> CanonicalType {
    CanonicalType {
        payload: Axis::Default,
        unit: Axis::Default,
        contract: Axis::Default,
        cardinality: Axis::Instantiated(Cardinality::Signal),
        extent: Axis::Default,
    }
}

/// Vec2 config value (accepts a `vec2` literal or a two-element list).
#[must_use]
pub(crate) fn param_vec2(ctx: &LowerCtx<'_>, key: &str, fallback: [f64; 2]) -> [f64; 2] {
    use crate::patch::Value;
    match ctx.param(key) {
        Some(Value::Vec2(v)) => *v,
        Some(Value::List(items)) if items.len() == 2 => {
            let x = items[0].as_f64().unwrap_or(fallback[0]);
            let y = items[1].as_f64().unwrap_or(fallback[1]);
            [x, y]
        }
        _ => fallback,
    }
}

/// The instance shared by the field arguments, if any is pinned.
///
/// Pinned instances must agree; a disagreement is an extent violation the
/// type passes could not see (broadcast fields are extent-free).
pub(crate) fn common_instance(
    ir: &IrBuilder,
    ins: &[ValueRef],
) -> Result<Option<InstanceId>, LowerError> {
    let mut found: Option<InstanceId> = None;
    for r in ins {
        if let ValueRef::Field(f) = r {
            if let Some(inst) = ir.field_instance(*f) {
                match found {
                    None => found = Some(inst),
                    Some(prev) if prev != inst => {
                        return Err(LowerError::Unsupported(
                            "zip inputs are bound to different instances".to_owned(),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
    }
    Ok(found)
}

/// Lowers a pure function over mixed signal/field inputs.
///
/// - all slots → scalar expression into a fresh slot
/// - one field, no signals → `map`
/// - several fields, no signals → `zip`
/// - fields plus signals → `zipSig` with argument order preserved
///
/// `out_ty` supplies payload/unit/contract; cardinality and extent follow
/// from the chosen path.
pub(crate) fn elementwise(
    ir: &mut IrBuilder,
    f: PureFn,
    ins: &[ValueRef],
    out_ty: CanonicalType,
) -> Result<ValueRef, LowerError> {
    let any_field = ins.iter().any(|r| matches!(r, ValueRef::Field(_)));
    if !any_field {
        let mut args = Vec::with_capacity(ins.len());
        for r in ins {
            let slot = r.slot().ok_or_else(|| LowerError::BadInput {
                port: "<elementwise>".to_owned(),
            })?;
            args.push(ir.read_slot(slot));
        }
        let expr = match f {
            PureFn::Opcode(op) => ValueExpr::Opcode { op, args },
            PureFn::Kernel(kernel) => ValueExpr::FieldFn { kernel, args },
        };
        let mut ty = out_ty;
        ty.cardinality = Axis::Instantiated(Cardinality::Signal);
        ty.extent = Axis::Default;
        let id = ir.push_value(expr);
        return Ok(ValueRef::Slot(ir.eval_into(ty, id)));
    }

    let instance = common_instance(ir, ins)?;
    let mut ty = out_ty;
    ty.cardinality = Axis::Instantiated(Cardinality::Field);
    ty.extent = instance.map_or(Axis::Default, |i| {
        Axis::Instantiated(IrBuilder::extent_of(i))
    });

    let fields: Vec<_> = ins.iter().filter_map(|r| r.field()).collect();
    let sigs = ins.len() - fields.len();
    let expr = if sigs == 0 {
        if let [only] = fields[..] {
            FieldExpr::Map { src: only, f }
        } else {
            FieldExpr::Zip { srcs: fields, f }
        }
    } else {
        let mut args = Vec::with_capacity(ins.len());
        for r in ins {
            args.push(match r {
                ValueRef::Field(fid) => ZipArg::Field(*fid),
                ValueRef::Slot(s) => ZipArg::Sig(*s),
                ValueRef::Instance(_) | ValueRef::Event(_) => {
                    return Err(LowerError::BadInput {
                        port: "<elementwise>".to_owned(),
                    });
                }
            });
        }
        FieldExpr::ZipSig { args, f }
    };
    Ok(ValueRef::Field(ir.push_field(expr, ty, instance)))
}

/// Coerces a reference to a field, broadcasting slots.
pub(crate) fn as_field(
    ir: &mut IrBuilder,
    r: ValueRef,
    ty: CanonicalType,
) -> Result<crate::ir::FieldId, LowerError> {
    match r {
        ValueRef::Field(f) => Ok(f),
        ValueRef::Slot(signal) => {
            let mut fty = ty;
            fty.cardinality = Axis::Instantiated(Cardinality::Field);
            Ok(ir.push_field(FieldExpr::Broadcast { signal }, fty, None))
        }
        ValueRef::Instance(_) | ValueRef::Event(_) => Err(LowerError::BadInput {
            port: "<field>".to_owned(),
        }),
    }
}

/// Constant lanes evaluated into a fresh slot of `ty`.
pub(crate) fn const_slot(ir: &mut IrBuilder, lanes: Vec<f64>, ty: CanonicalType) -> crate::ir::SlotId {
    let expr = ir.const_lanes(lanes);
    ir.eval_into(ty, expr)
}
