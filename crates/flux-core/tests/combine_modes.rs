// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{block, compile_ok, connect, set_input_combine, set_input_default};
use flux_core::{CombineMode, Engine, Patch, Value};

/// Three constants (1, 2, 4) fanned into one input port, routed to the
/// renderer's radius so the combined value is observable on screen.
fn fan_in_patch(mode: CombineMode) -> Patch {
    let mut patch = Patch::new("fan");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Const", "one", &[("value", Value::Float(1.0))]));
    patch.add_block(block("Const", "two", &[("value", Value::Float(2.0))]));
    patch.add_block(block("Const", "four", &[("value", Value::Float(4.0))]));
    let mut add = block("Add", "join", &[]);
    set_input_combine(&mut add, "a", mode);
    set_input_default(&mut add, "b", Value::Float(0.0));
    patch.add_block(add);
    patch.add_block(block("Const", "x", &[("value", Value::Float(0.5))]));
    patch.add_block(block("MakeVec2", "vec", &[]));
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));

    connect(&mut patch, ("one", "out"), ("join", "a"), 0);
    connect(&mut patch, ("two", "out"), ("join", "a"), 1);
    connect(&mut patch, ("four", "out"), ("join", "a"), 2);
    connect(&mut patch, ("join", "out"), ("draw", "radius"), 3);
    connect(&mut patch, ("x", "out"), ("vec", "x"), 4);
    connect(&mut patch, ("x", "out"), ("vec", "y"), 5);
    connect(&mut patch, ("vec", "out"), ("draw", "position"), 6);
    patch
}

fn observed_radius(mode: CombineMode) -> f32 {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(engine.load(&fan_in_patch(mode)), "{:#?}", engine.diagnostics().active());
    let frame = engine.advance(16.0).expect("frame");
    frame.ops[0].instances().screen_radius[0]
}

#[test]
fn last_winnows_to_the_highest_sort_key() {
    let program = compile_ok(&fan_in_patch(CombineMode::Last));
    let contributing: Vec<bool> = program
        .contributing_edges
        .values()
        .copied()
        .collect();
    assert_eq!(contributing.iter().filter(|c| !**c).count(), 2);
    assert!((observed_radius(CombineMode::Last) - 4.0).abs() < 1e-6);
}

#[test]
fn sum_reactivates_every_edge() {
    let program = compile_ok(&fan_in_patch(CombineMode::Sum));
    assert!(program.contributing_edges.values().all(|c| *c));
    assert!((observed_radius(CombineMode::Sum) - 7.0).abs() < 1e-6);
}

#[test]
fn shadowed_sources_stay_compiled() {
    // Switching last → sum must not change the compiled block set; the
    // shadowed constants are already in the program.
    let last = compile_ok(&fan_in_patch(CombineMode::Last));
    let sum = compile_ok(&fan_in_patch(CombineMode::Sum));
    assert_eq!(last.stats.blocks, sum.stats.blocks);
    assert_eq!(last.instances.len(), sum.instances.len());
}

#[test]
fn average_and_extrema_fold() {
    assert!((observed_radius(CombineMode::Average) - 7.0 / 3.0).abs() < 1e-6);
    assert!((observed_radius(CombineMode::Max) - 4.0).abs() < 1e-6);
    assert!((observed_radius(CombineMode::Min) - 1.0).abs() < 1e-6);
}
