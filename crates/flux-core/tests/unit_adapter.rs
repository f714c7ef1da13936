// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{block, connect, registry, set_input_default};
use flux_core::{compile, CompileOptions, DiagAction, Patch, Value};

/// An oscillator's scalar output feeding a radians port.
fn mismatched_patch(with_adapter: bool) -> Patch {
    let mut patch = Patch::new("angles");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Oscillator", "osc", &[]));
    let mut polar = block("PolarToCartesian", "polar", &[]);
    set_input_default(&mut polar, "radius", Value::Float(0.3));
    patch.add_block(polar);
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));

    connect(&mut patch, ("time", "phaseA"), ("osc", "phase"), 0);
    if with_adapter {
        patch.add_block(block("Adapter_ScalarToRadians", "toRad", &[]));
        connect(&mut patch, ("osc", "value"), ("toRad", "in"), 1);
        connect(&mut patch, ("toRad", "out"), ("polar", "angle"), 2);
    } else {
        connect(&mut patch, ("osc", "value"), ("polar", "angle"), 1);
    }
    connect(&mut patch, ("polar", "out"), ("draw", "position"), 3);
    patch
}

#[test]
fn strict_mode_reports_unit_mismatch_with_adapter_hint() {
    let result = compile(&mismatched_patch(false), &registry(), &CompileOptions::default());
    assert!(!result.is_ok());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == "E_UNIT_MISMATCH")
        .expect("unit mismatch diagnostic");
    let hint = diag.hint.as_deref().unwrap_or_default();
    assert!(
        hint.contains("Adapter_ScalarToRadians"),
        "hint did not name the adapter: {hint}"
    );
    assert!(diag
        .actions
        .iter()
        .any(|a| matches!(a, DiagAction::AddAdapter { adapter_type, .. }
            if adapter_type == "Adapter_ScalarToRadians")));
}

#[test]
fn inserting_the_adapter_makes_it_compile() {
    let result = compile(&mismatched_patch(true), &registry(), &CompileOptions::default());
    assert!(result.is_ok(), "{:#?}", result.diagnostics);
    assert!(!result
        .diagnostics
        .iter()
        .any(|d| d.code == "E_UNIT_MISMATCH"));
}

#[test]
fn lenient_mode_inserts_and_downgrades() {
    let options = CompileOptions {
        lenient_units: true,
        ..CompileOptions::default()
    };
    let result = compile(&mismatched_patch(false), &registry(), &options);
    assert!(result.is_ok(), "{:#?}", result.diagnostics);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "W_UNIT_MISMATCH"));
}

#[test]
fn compilation_is_deterministic_across_runs() {
    let reg = registry();
    let options = CompileOptions {
        lenient_units: true,
        ..CompileOptions::default()
    };
    let a = compile(&mismatched_patch(false), &reg, &options);
    let b = compile(&mismatched_patch(false), &reg, &options);
    assert_eq!(a.program, b.program);
}
