// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass 6 — block lowering.
//!
//! Walks the lowered blocks in topological order. Per block: resolve each
//! input port to a single [`ValueRef`] (combining contributing fan-in and
//! applying literal defaults), assemble a [`LowerCtx`], run the definition's
//! lowering closure, and record the bound outputs for downstream blocks.
//! Deferred state writes (feedback through `Memory`) resolve at the end.

use std::collections::BTreeMap;

use crate::block::{LowerCtx, LowerError};
use crate::blocks::elementwise;
use crate::diag::{codes, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ir::{IrBuilder, PortDir, PureFn, ScheduleStep, ValueRef};
use crate::kernel::{FieldKernel, Opcode};
use crate::patch::{CombineMode, Value};
use crate::types::{Axis, CanonicalType, Cardinality, Payload};

use super::normalize::NormalizedPatch;
use super::solve::TypeMap;
use super::wiring::{effective_combine, Wiring};

/// Expands a config literal into payload lanes. Scalars splat across the
/// stride; exact-stride literals pass through; anything else best-efforts
/// by repeating lanes.
fn value_to_lanes(value: &Value, payload: Payload) -> Vec<f64> {
    let stride = payload.stride() as usize;
    let direct: Vec<f64> = match value {
        Value::Float(v) => vec![*v],
        #[allow(clippy::cast_precision_loss)]
        Value::Int(v) => vec![*v as f64],
        Value::Bool(b) => vec![f64::from(u8::from(*b))],
        Value::Vec2(v) => v.to_vec(),
        Value::Vec3(v) => v.to_vec(),
        Value::Color(v) => v.to_vec(),
        Value::List(items) => items.iter().filter_map(Value::as_f64).collect(),
        Value::Null | Value::Str(_) => vec![0.0],
    };
    if direct.len() == stride {
        return direct;
    }
    if direct.len() == 1 {
        return vec![direct[0]; stride];
    }
    (0..stride)
        .map(|i| direct.get(i).copied().unwrap_or(0.0))
        .collect()
}

fn fold_refs(
    ir: &mut IrBuilder,
    mode: CombineMode,
    refs: &[ValueRef],
    ty: CanonicalType,
) -> Result<ValueRef, LowerError> {
    debug_assert!(refs.len() >= 2);
    match mode {
        // Winnowing already reduced last/first to one edge.
        CombineMode::Last | CombineMode::First => Ok(refs[refs.len() - 1]),
        CombineMode::Sum => elementwise(ir, PureFn::Opcode(Opcode::Add), refs, ty),
        CombineMode::Mul => elementwise(ir, PureFn::Opcode(Opcode::Mul), refs, ty),
        CombineMode::Max | CombineMode::Or => {
            elementwise(ir, PureFn::Opcode(Opcode::Max), refs, ty)
        }
        CombineMode::Min | CombineMode::And => {
            elementwise(ir, PureFn::Opcode(Opcode::Min), refs, ty)
        }
        CombineMode::Average => {
            let sum = elementwise(ir, PureFn::Opcode(Opcode::Add), refs, ty)?;
            #[allow(clippy::cast_precision_loss)]
            let inv = 1.0 / refs.len() as f64;
            let k = ir.const_lanes(vec![inv]);
            let k_slot = ir.eval_into(CanonicalType::signal(Payload::Float), k);
            elementwise(
                ir,
                PureFn::Opcode(Opcode::Mul),
                &[sum, ValueRef::Slot(k_slot)],
                ty,
            )
        }
        CombineMode::Layer => {
            // Highest sort key composites on top; fold from the bottom up.
            let mut acc = refs[0];
            for &next in &refs[1..] {
                acc = elementwise(ir, PureFn::Kernel(FieldKernel::LayerColor), &[next, acc], ty)?;
            }
            Ok(acc)
        }
    }
}

/// Runs lowering over every block in the wiring's lowered set.
pub(crate) fn lower_blocks(
    norm: &NormalizedPatch,
    tm: &TypeMap,
    wiring: &Wiring,
    diags: &mut Vec<Diagnostic>,
) -> IrBuilder {
    let mut ir = IrBuilder::new();
    let mut outputs: BTreeMap<(usize, String), ValueRef> = BTreeMap::new();

    for &ix in &norm.topo {
        if !wiring.lowered.contains(&ix) {
            continue;
        }
        let block = &norm.blocks[ix];

        let mut port_types: BTreeMap<(String, PortDir), CanonicalType> = BTreeMap::new();
        for port in &block.def.inputs {
            port_types.insert(
                (port.name.clone(), PortDir::In),
                tm.get(ix, &port.name, PortDir::In),
            );
        }
        for port in &block.def.outputs {
            port_types.insert(
                (port.name.clone(), PortDir::Out),
                tm.get(ix, &port.name, PortDir::Out),
            );
        }

        let mut inputs: BTreeMap<String, ValueRef> = BTreeMap::new();
        let mut failed = false;
        for port in &block.def.inputs {
            let mut refs: Vec<ValueRef> = Vec::new();
            if let Some(edge_ixs) = norm.in_edges.get(&(ix, port.name.clone())) {
                for &ei in edge_ixs {
                    let edge = &norm.edges[ei];
                    if !wiring.contributing.get(&edge.id).copied().unwrap_or(true) {
                        continue;
                    }
                    let Some(fi) = norm.ix(&edge.from.block) else {
                        continue;
                    };
                    if let Some(r) = outputs.get(&(fi, edge.from.port.clone())) {
                        refs.push(*r);
                    }
                }
            }
            let ty = tm.get(ix, &port.name, PortDir::In);
            let resolved = match refs.len() {
                0 => {
                    let default = block
                        .inst
                        .inputs
                        .get(&port.name)
                        .and_then(|s| s.default.clone())
                        .or_else(|| port.default.clone());
                    match default {
                        Some(value) => {
                            let payload = ty.payload.value().unwrap_or(Payload::Float);
                            let lanes = value_to_lanes(&value, payload);
                            let mut slot_ty = ty;
                            slot_ty.cardinality = Axis::Instantiated(Cardinality::Signal);
                            slot_ty.extent = Axis::Default;
                            let expr = ir.const_lanes(lanes);
                            Some(ValueRef::Slot(ir.eval_into(slot_ty, expr)))
                        }
                        None => None,
                    }
                }
                1 => Some(refs[0]),
                _ => {
                    let mode = effective_combine(norm, ix, &port.name);
                    match fold_refs(&mut ir, mode, &refs, ty) {
                        Ok(r) => Some(r),
                        Err(err) => {
                            diags.push(lower_diag(block, &err));
                            failed = true;
                            None
                        }
                    }
                }
            };
            if let Some(r) = resolved {
                inputs.insert(port.name.clone(), r);
            }
        }
        if failed {
            continue;
        }

        let mut outs: BTreeMap<String, ValueRef> = BTreeMap::new();
        let mut ctx = LowerCtx::new(&mut ir, &block.inst, &inputs, &port_types, &mut outs);
        if let Err(err) = (block.def.lower.as_ref())(&mut ctx) {
            diags.push(lower_diag(block, &err));
            continue;
        }
        for (port, r) in outs {
            outputs.insert((ix, port), r);
        }
    }

    // Feedback edges: resolve deferred state writes now that every source
    // has produced its outputs.
    let pending = std::mem::take(&mut ir.pending_state_writes);
    for (state, block_id, port) in pending {
        let Some(ix) = norm.ix(&block_id) else {
            continue;
        };
        let source = norm
            .in_edges
            .get(&(ix, port.clone()))
            .into_iter()
            .flatten()
            .map(|&ei| &norm.edges[ei])
            .filter(|e| wiring.contributing.get(&e.id).copied().unwrap_or(true))
            .find_map(|e| {
                let fi = norm.ix(&e.from.block)?;
                outputs.get(&(fi, e.from.port.clone())).copied()
            });
        match source {
            Some(ValueRef::Slot(slot)) => {
                ir.push_step(ScheduleStep::StateWrite { state, slot });
            }
            Some(_) => diags.push(Diagnostic::new(
                codes::E_INVALID_CONFIG,
                Severity::Error,
                DiagDomain::Compile,
                DiagTarget::Block(block_id),
                "invalid feedback source",
                "state feedback requires a signal source".to_owned(),
            )),
            // Unconnected Memory input: the state holds its initial value.
            None => {}
        }
    }

    ir
}

fn lower_diag(block: &super::normalize::NormBlock, err: &LowerError) -> Diagnostic {
    Diagnostic::new(
        codes::E_INVALID_CONFIG,
        Severity::Error,
        DiagDomain::Compile,
        DiagTarget::Block(block.inst.id),
        "lowering failed",
        format!("block `{}`: {err}", block.inst.display_name),
    )
}
