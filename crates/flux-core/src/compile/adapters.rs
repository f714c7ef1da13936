// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass 2 — adapter insertion.
//!
//! Consults [`check_connection`] per edge. Contract gaps pull in the
//! matching lens; signal→field gaps pull in a broadcast node; unit gaps are
//! bridged only in lenient mode (strict mode already errored in Pass 1).
//! Inserted block ids derive from the edge id, so re-compiling a patch that
//! already contains the adapter converges instead of stacking another.

use std::collections::BTreeMap;

use crate::block::BlockRegistry;
use crate::blocks::BROADCAST;
use crate::diag::{codes, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ident::{make_block_id, make_edge_id, short_hash};
use crate::ir::PortDir;
use crate::patch::{BlockInstance, Edge, Patch, PortRef};
use crate::types::{check_connection, AdapterNeed, ConnectionCheck, TypeError};

use super::normalize::NormalizedPatch;
use super::solve::{broadcast_allowed, TypeMap, UnitConflict};

fn splice(patch: &mut Patch, edge: &Edge, adapter_type: &str) {
    let display = format!("{}_{}", adapter_type, short_hash(edge.id.as_bytes()));
    let block_id = make_block_id(&display);
    patch.blocks.entry(block_id).or_insert_with(|| BlockInstance {
        id: block_id,
        block_type: adapter_type.to_owned(),
        display_name: display.clone(),
        params: BTreeMap::new(),
        inputs: BTreeMap::new(),
    });
    patch.edges.retain(|e| e.id != edge.id);
    patch.edges.push(Edge {
        id: make_edge_id(&format!("{display}:in")),
        from: edge.from.clone(),
        to: PortRef {
            block: block_id,
            port: "in".to_owned(),
        },
        sort_key: 0,
    });
    patch.edges.push(Edge {
        id: make_edge_id(&format!("{display}:out")),
        from: PortRef {
            block: block_id,
            port: "out".to_owned(),
        },
        to: edge.to.clone(),
        // Keep the destination port's fan-in ordering intact.
        sort_key: edge.sort_key,
    });
}

/// Runs adapter insertion over the current solve state. Returns `true`
/// when the patch was modified (the driver re-normalizes and re-solves).
pub(crate) fn insert_adapters(
    reg: &BlockRegistry,
    patch: &mut Patch,
    norm: &NormalizedPatch,
    tm: &TypeMap,
    unit_conflicts: &[UnitConflict],
    diags: &mut Vec<Diagnostic>,
) -> bool {
    let mut modified = false;

    for conflict in unit_conflicts {
        let edge = &norm.edges[conflict.edge_ix];
        let (Some(fi), Some(ti)) = (norm.ix(&edge.from.block), norm.ix(&edge.to.block)) else {
            continue;
        };
        let from_ty = tm.get(fi, &edge.from.port, PortDir::Out);
        let to_ty = tm.get(ti, &edge.to.port, PortDir::In);
        let need = AdapterNeed::UnitConversion {
            from: conflict.from,
            to: conflict.to,
        };
        match reg.find_adapter(&need, &from_ty, &to_ty) {
            Some(adapter) => {
                splice(patch, edge, &adapter.type_name.clone());
                modified = true;
            }
            None => diags.push(Diagnostic::new(
                codes::E_ADAPTER_NOT_FOUND,
                Severity::Error,
                DiagDomain::Compile,
                DiagTarget::Edge(edge.id),
                "no adapter found",
                format!(
                    "no registered adapter converts {} to {}",
                    conflict.from.name(),
                    conflict.to.name()
                ),
            )),
        }
    }

    for edge in &norm.edges {
        let (Some(fi), Some(ti)) = (norm.ix(&edge.from.block), norm.ix(&edge.to.block)) else {
            continue;
        };
        let from_ty = tm.get(fi, &edge.from.port, PortDir::Out);
        let to_ty = tm.get(ti, &edge.to.port, PortDir::In);
        match check_connection(&from_ty, &to_ty, broadcast_allowed(&norm.blocks[ti])) {
            ConnectionCheck::Compatible => {}
            ConnectionCheck::NeedsAdapter(AdapterNeed::Broadcast) => {
                splice(patch, edge, BROADCAST);
                modified = true;
            }
            ConnectionCheck::NeedsAdapter(AdapterNeed::ContractLens { required }) => {
                let need = AdapterNeed::ContractLens { required };
                match reg.find_adapter(&need, &from_ty, &to_ty) {
                    Some(adapter) => {
                        let name = adapter.type_name.clone();
                        diags.push(Diagnostic::new(
                            codes::I_LENS_INSERTED,
                            Severity::Info,
                            DiagDomain::Compile,
                            DiagTarget::Edge(edge.id),
                            "lens inserted",
                            format!("inserted {name} to establish {}", required.name()),
                        ));
                        splice(patch, edge, &name);
                        modified = true;
                    }
                    None => diags.push(Diagnostic::new(
                        codes::E_ADAPTER_NOT_FOUND,
                        Severity::Error,
                        DiagDomain::Compile,
                        DiagTarget::Edge(edge.id),
                        "no lens found",
                        format!("no registered lens establishes {}", required.name()),
                    )),
                }
            }
            // Strict-mode unit gaps were already reported by Pass 1.
            ConnectionCheck::NeedsAdapter(AdapterNeed::UnitConversion { .. }) => {}
            ConnectionCheck::Incompatible(err) => {
                let code = match err {
                    TypeError::PayloadMismatch(_, _) => codes::E_PAYLOAD_MISMATCH,
                    TypeError::CardinalityMismatch(_, _) => codes::E_CARDINALITY_MISMATCH,
                    _ => codes::E_TYPE_MISMATCH,
                };
                diags.push(Diagnostic::new(
                    code,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Edge(edge.id),
                    "incompatible connection",
                    err.to_string(),
                ));
            }
        }
    }

    modified
}
