// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The compile pipeline: normalized patch in, [`CompiledProgram`] out.
//!
//! Passes run in order, collecting diagnostics instead of aborting where
//! safe, so one compile surfaces as many problems as possible:
//!
//! 0. payload resolution over the edge graph
//! 1. unit constraint solving (per-port union-find)
//! 2. adapter insertion (loops with 0–1 until the patch stops changing)
//! 3. type graph finalization
//! 4. wiring validation and combine winnowing
//! 5. topology and time root
//! 6. block lowering
//! 7. schedule assembly
//! 8. slot metadata
//!
//! `compile` never panics; failure is a result with diagnostics.

mod adapters;
mod lower;
mod normalize;
mod schedule;
mod slots;
mod solve;
mod wiring;

pub use normalize::{normalize, NormalizedPatch};

use std::collections::BTreeMap;

use crate::block::BlockRegistry;
use crate::diag::{codes, DiagAction, DiagTarget, Diagnostic, Severity};
use crate::diag::DiagDomain;
use crate::ir::{CompiledProgram, PortDir, ProgramStats};
use crate::patch::Patch;
use crate::types::CanonicalType;

/// Options threaded through a compile.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Host-assigned patch identity, echoed into diagnostics.
    pub patch_id: Option<String>,
    /// Monotone revision of the authored patch.
    pub patch_revision: u64,
    /// Downgrade unit mismatches to warnings and auto-insert adapters.
    pub lenient_units: bool,
}

/// Outcome of [`compile`]. `program` is present iff no error-severity
/// diagnostic was produced; warnings and info ride along either way.
#[derive(Debug)]
pub struct CompileResult {
    /// The compiled program, on success.
    pub program: Option<CompiledProgram>,
    /// Everything the passes reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    /// `true` when a program was produced.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.program.is_some()
    }

    /// Error-severity diagnostics only.
    #[must_use]
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }
}

fn dedupe(diags: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::with_capacity(diags.len());
    for d in diags {
        if seen.insert((d.code, d.primary.clone())) {
            out.push(d);
        }
    }
    out
}

/// Compiles an authored patch against a registry.
#[must_use]
pub fn compile(patch: &Patch, reg: &BlockRegistry, options: &CompileOptions) -> CompileResult {
    let patch_hash = patch.content_hash();
    let mut work = patch.clone();

    // Passes 0–2 loop until adapter insertion converges. Structural
    // diagnostics from superseded iterations are re-derived by the final
    // iteration; insertion records (lens infos, lenient warnings) are
    // one-shot, so they carry forward and dedupe at the end.
    let mut diags: Vec<Diagnostic>;
    let mut carried: Vec<Diagnostic> = Vec::new();
    let norm;
    let mut tm;
    let mut rounds = 0;
    loop {
        diags = Vec::new();
        let Some(n) = normalize(reg, &work, &mut diags) else {
            carried.append(&mut diags);
            return finish(None, carried, options);
        };
        let mut t = solve::seed_types(&n);
        solve::resolve_payloads(&n, &mut t, &mut diags);
        let conflicts = solve::solve_units(&n, &mut t, reg, options.lenient_units, &mut diags);
        let modified =
            adapters::insert_adapters(reg, &mut work, &n, &t, &conflicts, &mut diags);
        rounds += 1;
        if !modified || rounds >= 4 {
            carried.append(&mut diags);
            diags = carried;
            norm = n;
            tm = t;
            break;
        }
        carried.append(&mut diags);
    }

    // Pass 4 computes the lowered set, which pass 3 needs to scope its
    // polymorphism reporting.
    let wiring = wiring::validate_wiring(&norm, &tm, &mut diags);
    solve::finalize_types(&norm, &mut tm, &wiring.lowered, &mut diags);

    // Pass 5 — exactly one time root among the lowered blocks.
    let time_roots: Vec<usize> = norm
        .blocks
        .iter()
        .enumerate()
        .filter(|(ix, b)| b.def.caps.time_root && wiring.lowered.contains(ix))
        .map(|(ix, _)| ix)
        .collect();
    match time_roots.len() {
        1 => {}
        0 => {
            diags.push(
                Diagnostic::new(
                    codes::E_TIME_ROOT_MISSING,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Patch,
                    "no time root",
                    "the patch has no time root; nothing drives the clock".to_owned(),
                )
                .with_action(DiagAction::CreateTimeRoot {
                    time_root_kind: "Infinite".to_owned(),
                }),
            );
        }
        _ => {
            for &ix in &time_roots[1..] {
                diags.push(Diagnostic::new(
                    codes::E_INVALID_CONFIG,
                    Severity::Error,
                    DiagDomain::Compile,
                    DiagTarget::Block(norm.blocks[ix].inst.id),
                    "multiple time roots",
                    "a compiled program drives exactly one clock".to_owned(),
                ));
            }
        }
    }

    if diags.iter().any(|d| d.severity == Severity::Error) {
        return finish(None, diags, options);
    }

    // Pass 6 — lowering.
    let ir = lower::lower_blocks(&norm, &tm, &wiring, &mut diags);
    if diags.iter().any(|d| d.severity == Severity::Error) {
        return finish(None, diags, options);
    }
    let Some(time) = ir.time else {
        // A time-root block that failed to bind is a lowering bug; surface
        // it as a normal diagnostic rather than panicking.
        diags.push(Diagnostic::new(
            codes::E_TIME_ROOT_MISSING,
            Severity::Error,
            DiagDomain::Compile,
            DiagTarget::Patch,
            "time root did not lower",
            "the time root produced no clock binding".to_owned(),
        ));
        return finish(None, diags, options);
    };

    // Passes 7–8 — schedule and slots.
    let schedule = schedule::assemble(ir.steps);
    let plan = slots::layout_slots(&ir.slot_types);

    let mut resolved_port_types: BTreeMap<(crate::ident::BlockId, String, PortDir), CanonicalType> =
        BTreeMap::new();
    for ((ix, port, dir), ty) in &tm.map {
        resolved_port_types.insert((norm.blocks[*ix].inst.id, port.clone(), *dir), *ty);
    }

    let stats = ProgramStats {
        blocks: norm.blocks.len(),
        steps: schedule.len(),
        slots: plan.slots.len(),
    };
    let program = CompiledProgram {
        patch_hash,
        instances: ir.instances,
        value_exprs: ir.value_exprs,
        field_exprs: ir.field_exprs,
        field_types: ir.field_types,
        field_instance: ir.field_instance,
        slots: plan.slots,
        states: ir.states,
        event_count: usize::try_from(ir.event_count).unwrap_or(usize::MAX),
        object_init: ir.object_init,
        schedule,
        time,
        resolved_port_types,
        contributing_edges: wiring.contributing,
        f64_len: plan.f64_len,
        object_len: plan.object_len,
        shape_len: plan.shape_len,
        stats,
    };
    finish(Some(program), diags, options)
}

fn finish(
    program: Option<CompiledProgram>,
    diags: Vec<Diagnostic>,
    options: &CompileOptions,
) -> CompileResult {
    let mut diagnostics = dedupe(diags);
    for d in &mut diagnostics {
        d.patch_revision = Some(options.patch_revision);
        d.compile_revision = Some(options.patch_revision);
    }
    CompileResult {
        program,
        diagnostics,
    }
}
