// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Patch normalization: dense indexing, canonical edge order, structural
//! validation, and cycle detection.
//!
//! Cycles are rejected here with one exemption: an edge into a `Memory`
//! block's state input does not create a same-frame dependency (the write
//! lands at step tail, the read at next frame's head), so such edges are
//! severed before the traversal.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::block::{BlockDef, BlockRegistry};
use crate::diag::{codes, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ident::{BlockId, EdgeId};
use crate::patch::{BlockInstance, Edge, Patch};

/// One densely indexed block with its resolved definition.
#[derive(Clone, Debug)]
pub struct NormBlock {
    /// The authored instance.
    pub inst: BlockInstance,
    /// Its registry definition.
    pub def: Arc<BlockDef>,
}

/// Validated, densely indexed view of a patch.
#[derive(Clone, Debug, Default)]
pub struct NormalizedPatch {
    /// Blocks sorted by id.
    pub blocks: Vec<NormBlock>,
    /// Block id → dense index.
    pub block_ix: BTreeMap<BlockId, usize>,
    /// Edges in canonical order: `(to.block, to.port, sort_key, id)`.
    pub edges: Vec<Edge>,
    /// Incoming edge indices per `(block ix, input port name)`.
    pub in_edges: FxHashMap<(usize, String), Vec<usize>>,
    /// Outgoing edge indices per block ix.
    pub out_edges: FxHashMap<usize, Vec<usize>>,
    /// Topological order of block indices (state edges severed).
    pub topo: Vec<usize>,
}

impl NormalizedPatch {
    /// Dense index of a block id.
    #[must_use]
    pub fn ix(&self, id: &BlockId) -> Option<usize> {
        self.block_ix.get(id).copied()
    }
}

/// Whether an edge into `(def, port)` is severed for cycle purposes.
fn is_state_edge(def: &BlockDef, port: &str) -> bool {
    def.type_name == "Memory" && port == "in"
}

/// Builds a [`NormalizedPatch`], accumulating structural diagnostics.
///
/// Returns `None` when the structure is too broken to continue (unknown
/// block types, dangling edges, cycles).
pub fn normalize(
    reg: &BlockRegistry,
    patch: &Patch,
    diags: &mut Vec<Diagnostic>,
) -> Option<NormalizedPatch> {
    let mut ok = true;
    let mut blocks = Vec::new();
    let mut block_ix = BTreeMap::new();
    let mut seen_names: BTreeMap<&str, BlockId> = BTreeMap::new();

    for (id, inst) in &patch.blocks {
        debug_assert_eq!(*id, inst.id);
        if let Some(prev) = seen_names.insert(&inst.display_name, *id) {
            if prev != *id {
                ok = false;
                diags.push(Diagnostic::new(
                    codes::E_DUPLICATE_BLOCK,
                    Severity::Error,
                    DiagDomain::Authoring,
                    DiagTarget::Block(*id),
                    "duplicate block name",
                    format!("two blocks share the name `{}`", inst.display_name),
                ));
            }
        }
        match reg.get(&inst.block_type) {
            Some(def) => {
                block_ix.insert(*id, blocks.len());
                blocks.push(NormBlock {
                    inst: inst.clone(),
                    def,
                });
            }
            None => {
                ok = false;
                diags.push(Diagnostic::new(
                    codes::E_INVALID_CONFIG,
                    Severity::Error,
                    DiagDomain::Authoring,
                    DiagTarget::Block(*id),
                    "unknown block type",
                    format!("no registered block type `{}`", inst.block_type),
                ));
            }
        }
    }

    let mut edges: Vec<Edge> = Vec::with_capacity(patch.edges.len());
    let mut seen_edge_ids: BTreeMap<EdgeId, ()> = BTreeMap::new();
    for edge in &patch.edges {
        if seen_edge_ids.insert(edge.id, ()).is_some() {
            // Duplicate edge ids collapse; keep the first occurrence.
            continue;
        }
        let dangling = |msg: String| {
            Diagnostic::new(
                codes::E_DANGLING_EDGE,
                Severity::Error,
                DiagDomain::Authoring,
                DiagTarget::Edge(edge.id),
                "dangling edge",
                msg,
            )
        };
        let from_ix = block_ix.get(&edge.from.block).copied();
        let to_ix = block_ix.get(&edge.to.block).copied();
        let (Some(fi), Some(ti)) = (from_ix, to_ix) else {
            ok = false;
            diags.push(dangling("edge endpoint references a missing block".into()));
            continue;
        };
        if blocks[fi].def.output_port(&edge.from.port).is_none() {
            ok = false;
            diags.push(dangling(format!(
                "block `{}` has no output port `{}`",
                blocks[fi].inst.display_name, edge.from.port
            )));
            continue;
        }
        if blocks[ti].def.input_port(&edge.to.port).is_none() {
            ok = false;
            diags.push(dangling(format!(
                "block `{}` has no input port `{}`",
                blocks[ti].inst.display_name, edge.to.port
            )));
            continue;
        }
        edges.push(edge.clone());
    }

    // Canonical edge order keeps everything downstream deterministic.
    edges.sort_by(|a, b| {
        (&a.to.block, &a.to.port, a.sort_key, &a.id).cmp(&(
            &b.to.block,
            &b.to.port,
            b.sort_key,
            &b.id,
        ))
    });

    let mut in_edges: FxHashMap<(usize, String), Vec<usize>> = FxHashMap::default();
    let mut out_edges: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (i, edge) in edges.iter().enumerate() {
        let (Some(&fi), Some(&ti)) = (block_ix.get(&edge.from.block), block_ix.get(&edge.to.block))
        else {
            continue;
        };
        in_edges
            .entry((ti, edge.to.port.clone()))
            .or_default()
            .push(i);
        out_edges.entry(fi).or_default().push(i);
    }

    // Kahn topological sort over same-frame dependencies. Ties break by
    // block id (blocks are already sorted by id), keeping lowering order
    // stable across compiles.
    let n = blocks.len();
    let mut indegree = vec![0usize; n];
    let mut forward: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in &edges {
        let (Some(&fi), Some(&ti)) = (block_ix.get(&edge.from.block), block_ix.get(&edge.to.block))
        else {
            continue;
        };
        if is_state_edge(&blocks[ti].def, &edge.to.port) {
            continue;
        }
        forward[fi].push(ti);
        indegree[ti] += 1;
    }
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut topo = Vec::with_capacity(n);
    let mut cursor = 0;
    while cursor < ready.len() {
        // `ready` stays sorted: new entries are pushed then the tail is
        // sorted before consumption.
        let node = ready[cursor];
        cursor += 1;
        topo.push(node);
        let start = ready.len();
        for &next in &forward[node] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(next);
            }
        }
        ready[start..].sort_unstable();
    }
    if topo.len() != n {
        ok = false;
        diags.push(Diagnostic::new(
            codes::E_CYCLE,
            Severity::Error,
            DiagDomain::Authoring,
            DiagTarget::Patch,
            "cycle in patch graph",
            "the patch contains a dependency cycle; route feedback through a Memory block"
                .to_owned(),
        ));
    }

    if !ok {
        return None;
    }
    Some(NormalizedPatch {
        blocks,
        block_ix,
        edges,
        in_edges,
        out_edges,
        topo,
    })
}
