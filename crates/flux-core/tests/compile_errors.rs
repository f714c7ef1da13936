// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{block, connect, registry, set_input_default};
use flux_core::{compile, CompileOptions, DiagAction, Patch, Value};

#[test]
fn empty_patch_reports_missing_time_root_with_create_action() {
    let patch = Patch::new("p");
    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(!result.is_ok());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == "E_TIME_ROOT_MISSING")
        .expect("missing time root diagnostic");
    assert!(diag.actions.iter().any(|a| matches!(
        a,
        DiagAction::CreateTimeRoot { time_root_kind } if time_root_kind == "Infinite"
    )));
}

#[test]
fn plain_cycle_is_rejected() {
    let mut patch = Patch::new("p");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Add", "a", &[]));
    patch.add_block(block("Add", "b", &[]));
    connect(&mut patch, ("a", "out"), ("b", "a"), 0);
    connect(&mut patch, ("b", "out"), ("a", "a"), 1);
    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(!result.is_ok());
    assert!(result.diagnostics.iter().any(|d| d.code == "E_CYCLE"));
}

#[test]
fn feedback_through_memory_compiles() {
    let mut patch = Patch::new("p");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Const", "seed", &[("value", Value::Float(0.01))]));
    patch.add_block(block("Memory", "mem", &[("initial", Value::Float(0.1))]));
    let mut add = block("Add", "acc", &[]);
    set_input_default(&mut add, "b", Value::Float(0.0));
    patch.add_block(add);
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));
    patch.add_block(block("Const", "y", &[("value", Value::Float(0.5))]));
    patch.add_block(block("MakeVec2", "vec", &[]));

    // acc = mem + seed; mem <- acc (next frame); radius <- acc
    connect(&mut patch, ("mem", "out"), ("acc", "a"), 0);
    connect(&mut patch, ("seed", "out"), ("acc", "b"), 1);
    connect(&mut patch, ("acc", "out"), ("mem", "in"), 2);
    connect(&mut patch, ("acc", "out"), ("draw", "radius"), 3);
    connect(&mut patch, ("acc", "out"), ("vec", "x"), 4);
    connect(&mut patch, ("y", "out"), ("vec", "y"), 5);
    connect(&mut patch, ("vec", "out"), ("draw", "position"), 6);

    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(
        result.is_ok(),
        "memory feedback should compile: {:#?}",
        result.diagnostics
    );
    assert!(!result.diagnostics.iter().any(|d| d.code == "E_CYCLE"));
}

#[test]
fn missing_required_input_is_reported() {
    let mut patch = Patch::new("p");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Array", "arr", &[("count", Value::Int(4))]));
    // GridLayout with nothing on `elements`.
    patch.add_block(block("GridLayout", "grid", &[]));
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));
    connect(&mut patch, ("grid", "position"), ("draw", "position"), 0);
    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(!result.is_ok());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "E_MISSING_INPUT"));
}

#[test]
fn unknown_block_type_fails_structurally() {
    let mut patch = Patch::new("p");
    patch.add_block(block("NoSuchBlock", "x", &[]));
    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(!result.is_ok());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "E_INVALID_CONFIG"));
}

#[test]
fn disconnected_block_warns_but_compiles() {
    let mut patch = Patch::new("p");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Const", "orphan", &[("value", Value::Float(1.0))]));
    patch.add_block(block("Const", "y", &[("value", Value::Float(0.5))]));
    patch.add_block(block("MakeVec2", "vec", &[]));
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));
    connect(&mut patch, ("y", "out"), ("vec", "x"), 0);
    connect(&mut patch, ("y", "out"), ("vec", "y"), 1);
    connect(&mut patch, ("vec", "out"), ("draw", "position"), 2);
    let result = compile(&patch, &registry(), &CompileOptions::default());
    assert!(result.is_ok(), "{:#?}", result.diagnostics);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "W_GRAPH_DISCONNECTED_BLOCK"));
}
