// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass 4 — wiring validation and combine-mode winnowing.
//!
//! Validates combine modes against resolved payloads, temporality
//! crossings, and input coverage; winnows multi-edge fan-ins down to the
//! contributing set; computes which blocks reach a renderer (the lowered
//! set) and warns about the rest.

use std::collections::{BTreeMap, BTreeSet};

use crate::diag::{codes, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ident::EdgeId;
use crate::ir::PortDir;
use crate::patch::CombineMode;
use crate::types::Cardinality;

use super::normalize::NormalizedPatch;
use super::solve::TypeMap;

/// Outcome of the wiring pass.
#[derive(Debug, Default)]
pub(crate) struct Wiring {
    /// Edge id → contributing? Shadowed edges stay in the patch (and their
    /// sources stay compiled) but are excluded from input combination.
    pub(crate) contributing: BTreeMap<EdgeId, bool>,
    /// Blocks to lower: reach a renderer, or are the time root, or no
    /// renderer exists at all.
    pub(crate) lowered: BTreeSet<usize>,
}

/// The combine mode in force for one input port.
pub(crate) fn effective_combine(
    norm: &NormalizedPatch,
    block_ix: usize,
    port: &str,
) -> CombineMode {
    let block = &norm.blocks[block_ix];
    block
        .inst
        .inputs
        .get(port)
        .and_then(|s| s.combine)
        .or_else(|| block.def.input_port(port).map(|p| p.combine))
        .unwrap_or_default()
}

pub(crate) fn validate_wiring(
    norm: &NormalizedPatch,
    tm: &TypeMap,
    diags: &mut Vec<Diagnostic>,
) -> Wiring {
    let mut wiring = Wiring::default();

    // Winnowing and combine-mode admission.
    for (ix, block) in norm.blocks.iter().enumerate() {
        for port in &block.def.inputs {
            let Some(edge_ixs) = norm.in_edges.get(&(ix, port.name.clone())) else {
                continue;
            };
            if edge_ixs.is_empty() {
                continue;
            }
            let mode = effective_combine(norm, ix, &port.name);
            let ty = tm.get(ix, &port.name, PortDir::In);
            if let Some(payload) = ty.payload.value() {
                if !mode.allowed_for(payload) {
                    diags.push(Diagnostic::new(
                        codes::E_COMBINE_MODE,
                        Severity::Error,
                        DiagDomain::Compile,
                        DiagTarget::Port {
                            block: block.inst.id,
                            port: port.name.clone(),
                        },
                        "combine mode not allowed",
                        format!(
                            "payload {} does not admit combine mode `{}`",
                            payload.name(),
                            mode.name()
                        ),
                    ));
                }
            }
            // Edges arrive in canonical order (sort_key ascending), so the
            // winner for last/first sits at an end.
            let winner = match mode {
                CombineMode::Last => edge_ixs.last().copied(),
                CombineMode::First => edge_ixs.first().copied(),
                _ => None,
            };
            for &ei in edge_ixs {
                let contributing = winner.map_or(true, |w| w == ei);
                wiring
                    .contributing
                    .insert(norm.edges[ei].id, contributing);
            }
        }
    }

    // Temporality: event flow must stay on event ports, and continuous
    // flow must not land on event ports. Crossing/Hold are the sanctioned
    // boundary blocks.
    for edge in &norm.edges {
        let (Some(fi), Some(ti)) = (norm.ix(&edge.from.block), norm.ix(&edge.to.block)) else {
            continue;
        };
        let from_card = tm.get(fi, &edge.from.port, PortDir::Out).cardinality.value();
        let to_card = tm.get(ti, &edge.to.port, PortDir::In).cardinality.value();
        let from_event = from_card == Some(Cardinality::Event);
        let to_event = to_card == Some(Cardinality::Event);
        if from_event != to_event {
            diags.push(Diagnostic::new(
                codes::E_TEMPORALITY,
                Severity::Error,
                DiagDomain::Compile,
                DiagTarget::Edge(edge.id),
                "temporality crossing",
                "events and continuous values only meet through Hold or Crossing".to_owned(),
            ));
        }
    }

    // Input coverage: every required input needs an edge or a default.
    for (ix, block) in norm.blocks.iter().enumerate() {
        for port in &block.def.inputs {
            if port.optional {
                continue;
            }
            let has_edge = norm
                .in_edges
                .get(&(ix, port.name.clone()))
                .is_some_and(|e| !e.is_empty());
            let has_default = port.default.is_some()
                || block
                    .inst
                    .inputs
                    .get(&port.name)
                    .is_some_and(|s| s.default.is_some());
            if !has_edge && !has_default {
                diags.push(Diagnostic::new(
                    codes::E_MISSING_INPUT,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Port {
                        block: block.inst.id,
                        port: port.name.clone(),
                    },
                    "missing input",
                    format!(
                        "input `{}.{}` has no edge, no default, and is not optional",
                        block.inst.display_name, port.name
                    ),
                ));
            }
        }
    }

    // Lowered set: backward reachability from renderers (plus the time
    // root). With no renderer in the patch everything compiles, so hosts
    // can probe partial graphs without warning spam.
    let renderers: Vec<usize> = norm
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.def.caps.renderer)
        .map(|(i, _)| i)
        .collect();
    if renderers.is_empty() {
        wiring.lowered = (0..norm.blocks.len()).collect();
    } else {
        let mut stack = renderers;
        while let Some(ix) = stack.pop() {
            if !wiring.lowered.insert(ix) {
                continue;
            }
            for port in &norm.blocks[ix].def.inputs {
                if let Some(edge_ixs) = norm.in_edges.get(&(ix, port.name.clone())) {
                    for &ei in edge_ixs {
                        if let Some(fi) = norm.ix(&norm.edges[ei].from.block) {
                            stack.push(fi);
                        }
                    }
                }
            }
        }
        for (ix, block) in norm.blocks.iter().enumerate() {
            if block.def.caps.time_root {
                wiring.lowered.insert(ix);
            } else if !wiring.lowered.contains(&ix) {
                diags.push(Diagnostic::new(
                    codes::W_GRAPH_DISCONNECTED_BLOCK,
                    Severity::Warn,
                    DiagDomain::Compile,
                    DiagTarget::Block(block.inst.id),
                    "disconnected block",
                    format!(
                        "block `{}` does not reach any renderer and was skipped",
                        block.inst.display_name
                    ),
                ));
            }
        }
    }

    wiring
}
