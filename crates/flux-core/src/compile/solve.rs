// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Axis solving: payload propagation (Pass 0), unit constraints (Pass 1),
//! and type finalization (Pass 3).
//!
//! Both solvers run the same union-find over per-port variables. Variables
//! are NOT shared across block instances; ports of one block that declare a
//! common group share one variable, which is how payload-generic blocks and
//! unit-preserving arithmetic propagate through.

use std::collections::BTreeMap;

use crate::block::BroadcastPolicy;
use crate::diag::{codes, DiagAction, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ir::PortDir;
use crate::types::{Axis, CanonicalType, Cardinality, Contract, Payload, Unit};

use super::normalize::NormalizedPatch;

/// Evolving `(block ix, port, dir) → type` map threaded through the passes.
#[derive(Clone, Debug, Default)]
pub(crate) struct TypeMap {
    pub(crate) map: BTreeMap<(usize, String, PortDir), CanonicalType>,
}

impl TypeMap {
    pub(crate) fn get(&self, block: usize, port: &str, dir: PortDir) -> CanonicalType {
        self.map
            .get(&(block, port.to_owned(), dir))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set(&mut self, block: usize, port: &str, dir: PortDir, ty: CanonicalType) {
        self.map.insert((block, port.to_owned(), dir), ty);
    }
}

/// Seeds the map with the port constraint types from the definitions.
pub(crate) fn seed_types(norm: &NormalizedPatch) -> TypeMap {
    let mut tm = TypeMap::default();
    for (ix, block) in norm.blocks.iter().enumerate() {
        for port in &block.def.inputs {
            tm.set(ix, &port.name, PortDir::In, port.ty);
        }
        for port in &block.def.outputs {
            tm.set(ix, &port.name, PortDir::Out, port.ty);
        }
    }
    tm
}

/// Union-find with an attached resolved value per class.
struct Solver<T: Copy + PartialEq> {
    parent: Vec<u32>,
    value: Vec<Option<T>>,
}

impl<T: Copy + PartialEq> Solver<T> {
    fn new() -> Self {
        Self {
            parent: Vec::new(),
            value: Vec::new(),
        }
    }

    fn fresh(&mut self, value: Option<T>) -> u32 {
        let id = u32::try_from(self.parent.len()).unwrap_or(u32::MAX);
        self.parent.push(id);
        self.value.push(value);
        id
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    /// Merges two classes. `Err((a, b))` reports irreconcilable pins.
    fn union(&mut self, a: u32, b: u32) -> Result<(), (T, T)> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return Ok(());
        }
        let merged = match (self.value[ra as usize], self.value[rb as usize]) {
            (Some(x), Some(y)) if x != y => return Err((x, y)),
            (v @ Some(_), _) | (_, v) => v,
        };
        self.parent[rb as usize] = ra;
        self.value[ra as usize] = merged;
        Ok(())
    }

    /// Pins a class to a value; `Err` on disagreement.
    fn pin(&mut self, x: u32, value: T) -> Result<(), (T, T)> {
        let r = self.find(x);
        match self.value[r as usize] {
            Some(v) if v != value => Err((v, value)),
            _ => {
                self.value[r as usize] = Some(value);
                Ok(())
            }
        }
    }

    fn resolved(&mut self, x: u32) -> Option<T> {
        let r = self.find(x);
        self.value[r as usize]
    }
}

/// Per-port variable table. Ports sharing a block-level group share a
/// variable; every other polymorphic port gets its own.
struct PortVars {
    vars: BTreeMap<(usize, String, PortDir), u32>,
}

fn build_port_vars<T: Copy + PartialEq>(
    norm: &NormalizedPatch,
    solver: &mut Solver<T>,
    fixed: impl Fn(&CanonicalType) -> Option<T>,
    grouped: impl Fn(&crate::block::PortDef) -> Option<String>,
) -> PortVars {
    let mut vars = BTreeMap::new();
    for (ix, block) in norm.blocks.iter().enumerate() {
        let mut group_vars: BTreeMap<String, u32> = BTreeMap::new();
        let ports = block
            .def
            .inputs
            .iter()
            .map(|p| (p, PortDir::In))
            .chain(block.def.outputs.iter().map(|p| (p, PortDir::Out)));
        for (port, dir) in ports {
            let pinned = fixed(&port.ty);
            let var = match grouped(port) {
                Some(group) => {
                    let v = *group_vars
                        .entry(group)
                        .or_insert_with(|| solver.fresh(None));
                    if let Some(value) = pinned {
                        // Group pins merge; disagreement inside one def is a
                        // registration bug, so debug-assert only.
                        let r = solver.pin(v, value);
                        debug_assert!(r.is_ok(), "conflicting pins inside one block def");
                    }
                    v
                }
                None => solver.fresh(pinned),
            };
            vars.insert((ix, port.name.clone(), dir), var);
        }
    }
    PortVars { vars }
}

impl PortVars {
    fn get(&self, block: usize, port: &str, dir: PortDir) -> Option<u32> {
        self.vars.get(&(block, port.to_owned(), dir)).copied()
    }
}

/// Pass 0 — payload resolution over the edge graph.
pub(crate) fn resolve_payloads(
    norm: &NormalizedPatch,
    tm: &mut TypeMap,
    diags: &mut Vec<Diagnostic>,
) {
    let mut solver: Solver<Payload> = Solver::new();
    let vars = build_port_vars(
        norm,
        &mut solver,
        |ty| ty.payload.value(),
        |port| port.payload_group.clone(),
    );

    for edge in &norm.edges {
        let (Some(fi), Some(ti)) = (norm.ix(&edge.from.block), norm.ix(&edge.to.block)) else {
            continue;
        };
        let (Some(a), Some(b)) = (
            vars.get(fi, &edge.from.port, PortDir::Out),
            vars.get(ti, &edge.to.port, PortDir::In),
        ) else {
            continue;
        };
        if let Err((x, y)) = solver.union(a, b) {
            diags.push(Diagnostic::new(
                codes::E_PAYLOAD_MISMATCH,
                Severity::Error,
                DiagDomain::Compile,
                DiagTarget::Edge(edge.id),
                "payload mismatch",
                format!("edge carries {} into a {} port", x.name(), y.name()),
            ));
        }
    }

    // Write back and enforce declared allowed sets.
    for (ix, block) in norm.blocks.iter().enumerate() {
        for (port, dir) in block
            .def
            .inputs
            .iter()
            .map(|p| (p, PortDir::In))
            .chain(block.def.outputs.iter().map(|p| (p, PortDir::Out)))
        {
            let Some(var) = vars.get(ix, &port.name, dir) else {
                continue;
            };
            let Some(payload) = solver.resolved(var) else {
                continue;
            };
            if let Some(group) = &port.payload_group {
                if let Some(decl) = block.def.payload_groups.iter().find(|g| &g.name == group) {
                    if !decl.allowed.contains(&payload) {
                        diags.push(Diagnostic::new(
                            codes::E_PAYLOAD_MISMATCH,
                            Severity::Error,
                            DiagDomain::Compile,
                            DiagTarget::Port {
                                block: block.inst.id,
                                port: port.name.clone(),
                            },
                            "payload not allowed",
                            format!(
                                "block `{}` does not accept payload {} on `{}`",
                                block.inst.display_name,
                                payload.name(),
                                port.name
                            ),
                        ));
                        continue;
                    }
                }
            }
            let mut ty = tm.get(ix, &port.name, dir);
            ty.payload = Axis::Instantiated(payload);
            tm.set(ix, &port.name, dir, ty);
        }
    }
}

/// An edge whose endpoint units disagree, kept for lenient-mode adapter
/// insertion.
#[derive(Clone, Copy, Debug)]
pub(crate) struct UnitConflict {
    pub(crate) edge_ix: usize,
    pub(crate) from: Unit,
    pub(crate) to: Unit,
}

/// Pass 1 — unit constraint solving with a per-port disjoint-set.
///
/// In strict mode a conflicting edge is an `E_UNIT_MISMATCH` error carrying
/// an adapter hint. In lenient mode the edge is left un-unified and
/// reported back for Pass 2 to bridge with an adapter.
pub(crate) fn solve_units(
    norm: &NormalizedPatch,
    tm: &mut TypeMap,
    reg: &crate::block::BlockRegistry,
    lenient: bool,
    diags: &mut Vec<Diagnostic>,
) -> Vec<UnitConflict> {
    let mut solver: Solver<Unit> = Solver::new();
    let vars = build_port_vars(
        norm,
        &mut solver,
        |ty| ty.unit.value(),
        |port| port.payload_group.clone(),
    );
    let mut conflicts = Vec::new();

    for (edge_ix, edge) in norm.edges.iter().enumerate() {
        let (Some(fi), Some(ti)) = (norm.ix(&edge.from.block), norm.ix(&edge.to.block)) else {
            continue;
        };
        let (Some(a), Some(b)) = (
            vars.get(fi, &edge.from.port, PortDir::Out),
            vars.get(ti, &edge.to.port, PortDir::In),
        ) else {
            continue;
        };
        if let Err((from, to)) = solver.union(a, b) {
            if lenient {
                conflicts.push(UnitConflict { edge_ix, from, to });
                diags.push(Diagnostic::new(
                    codes::W_UNIT_MISMATCH,
                    Severity::Warn,
                    DiagDomain::Compile,
                    DiagTarget::Edge(edge.id),
                    "unit mismatch (adapter inserted)",
                    format!("{} flows into a {} port", from.name(), to.name()),
                ));
            } else {
                let from_probe = CanonicalType::signal(Payload::Float).with_unit(from);
                let to_probe = CanonicalType::signal(Payload::Float).with_unit(to);
                let candidates = reg.adapter_candidates(&from_probe, &to_probe);
                let mut diag = Diagnostic::new(
                    codes::E_UNIT_MISMATCH,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Edge(edge.id),
                    "unit mismatch",
                    format!("{} flows into a {} port", from.name(), to.name()),
                );
                if let Some(first) = candidates.first() {
                    diag = diag
                        .with_hint(format!("available adapters: {}", candidates.join(", ")))
                        .with_action(DiagAction::AddAdapter {
                            adapter_type: first.clone(),
                            edge: edge.id,
                        });
                }
                diags.push(diag);
            }
        }
    }

    for (ix, block) in norm.blocks.iter().enumerate() {
        for (port, dir) in block
            .def
            .inputs
            .iter()
            .map(|p| (p, PortDir::In))
            .chain(block.def.outputs.iter().map(|p| (p, PortDir::Out)))
        {
            let Some(var) = vars.get(ix, &port.name, dir) else {
                continue;
            };
            if let Some(unit) = solver.resolved(var) {
                let mut ty = tm.get(ix, &port.name, dir);
                ty.unit = Axis::Instantiated(unit);
                tm.set(ix, &port.name, dir, ty);
            }
        }
    }
    conflicts
}

/// Whether a signal may broadcast into this block's field port.
pub(crate) fn broadcast_allowed(block: &super::normalize::NormBlock) -> bool {
    block.def.broadcast == BroadcastPolicy::AllowZipSig
}

/// Pass 3 — assign every port a fully instantiated type.
///
/// Cardinality and extent propagate forward in topological order; unit and
/// contract default to `scalar`/`none` on ports nothing constrained. Ports
/// of lowered blocks that still lack a payload are reported.
pub(crate) fn finalize_types(
    norm: &NormalizedPatch,
    tm: &mut TypeMap,
    lowered: &std::collections::BTreeSet<usize>,
    diags: &mut Vec<Diagnostic>,
) {
    use crate::block::CardinalityMode;

    for &ix in &norm.topo {
        let block = &norm.blocks[ix];
        let mut any_field_input = false;
        for port in &block.def.inputs {
            let mut ty = tm.get(ix, &port.name, PortDir::In);
            if ty.cardinality.is_default() {
                let from_edge = norm
                    .in_edges
                    .get(&(ix, port.name.clone()))
                    .and_then(|edges| edges.first())
                    .map(|&ei| &norm.edges[ei])
                    .and_then(|edge| {
                        let fi = norm.ix(&edge.from.block)?;
                        tm.get(fi, &edge.from.port, PortDir::Out).cardinality.value()
                    });
                ty.cardinality = Axis::Instantiated(from_edge.unwrap_or(Cardinality::Signal));
            }
            if ty.cardinality.value() == Some(Cardinality::Field) {
                any_field_input = true;
            }
            tm.set(ix, &port.name, PortDir::In, ty);
        }
        for port in &block.def.outputs {
            let mut ty = tm.get(ix, &port.name, PortDir::Out);
            if ty.cardinality.is_default() {
                let cardinality = match block.def.cardinality {
                    CardinalityMode::Preserve => {
                        if any_field_input {
                            Cardinality::Field
                        } else {
                            Cardinality::Signal
                        }
                    }
                    CardinalityMode::FieldOnly => Cardinality::Field,
                    CardinalityMode::SignalOnly | CardinalityMode::Collapse => Cardinality::Signal,
                };
                ty.cardinality = Axis::Instantiated(cardinality);
            }
            tm.set(ix, &port.name, PortDir::Out, ty);
        }
    }

    for (ix, block) in norm.blocks.iter().enumerate() {
        if !lowered.contains(&ix) {
            continue;
        }
        for (port, dir) in block
            .def
            .inputs
            .iter()
            .map(|p| (p, PortDir::In))
            .chain(block.def.outputs.iter().map(|p| (p, PortDir::Out)))
        {
            let connected = match dir {
                PortDir::In => norm
                    .in_edges
                    .get(&(ix, port.name.clone()))
                    .is_some_and(|e| !e.is_empty()),
                PortDir::Out => norm
                    .out_edges
                    .get(&ix)
                    .is_some_and(|edges| {
                        edges
                            .iter()
                            .any(|&ei| norm.edges[ei].from.port == port.name)
                    }),
            };
            let mut ty = tm.get(ix, &port.name, dir);
            if ty.unit.is_default() {
                if connected {
                    diags.push(
                        Diagnostic::new(
                            codes::E_UNRESOLVED_UNIT,
                            Severity::Error,
                            DiagDomain::Compile,
                            DiagTarget::Port {
                                block: block.inst.id,
                                port: port.name.clone(),
                            },
                            "unresolved unit",
                            format!(
                                "no constraint determines the unit of `{}.{}`",
                                block.inst.display_name, port.name
                            ),
                        )
                        .with_hint(
                            "add an Adapter on a connected edge or wire a TimeRoot phase"
                                .to_owned(),
                        ),
                    );
                } else {
                    ty.unit = Axis::Instantiated(Unit::Scalar);
                }
            }
            if ty.contract.is_default() {
                ty.contract = Axis::Instantiated(Contract::None);
            }
            if ty.payload.is_default() && (connected || (dir == PortDir::In && !port.optional)) {
                diags.push(Diagnostic::new(
                    codes::E_UNRESOLVED_PAYLOAD,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Port {
                        block: block.inst.id,
                        port: port.name.clone(),
                    },
                    "unresolved payload",
                    format!(
                        "no connection determines the payload of `{}.{}`",
                        block.inst.display_name, port.name
                    ),
                ));
            }
            tm.set(ix, &port.name, dir, ty);
        }
    }
}
