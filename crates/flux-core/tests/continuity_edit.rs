// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{block, connect};
use flux_core::{Engine, Patch, SemanticTag, Value};

fn grid_patch(count: i64, rows: i64, cols: i64) -> Patch {
    let mut patch = Patch::new("grid");
    patch.add_block(block("InfiniteTimeRoot", "time", &[]));
    patch.add_block(block("Array", "arr", &[("count", Value::Int(count))]));
    patch.add_block(block(
        "GridLayout",
        "grid",
        &[("rows", Value::Int(rows)), ("cols", Value::Int(cols))],
    ));
    patch.add_block(block("RenderPrimitiveInstances", "draw", &[]));
    connect(&mut patch, ("arr", "index"), ("grid", "elements"), 0);
    connect(&mut patch, ("grid", "position"), ("draw", "position"), 1);
    patch
}

/// Shrinking 100 → 50 elements while moving the layout: surviving elements
/// keep their continuity state, so no per-element step exceeds the
/// position slew cap.
#[test]
fn surviving_elements_transition_smoothly_across_an_edit() {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(
        engine.load(&grid_patch(100, 10, 10)),
        "{:#?}",
        engine.diagnostics().active()
    );

    // Let positions stabilize.
    let mut before = Vec::new();
    for _ in 0..30 {
        let frame = engine.advance(16.0).expect("frame");
        before = frame.ops[0].instances().screen_position.clone();
    }
    assert_eq!(before.len(), 200);

    // Edit: fewer elements, rows halved (every surviving element moves).
    assert!(
        engine.load(&grid_patch(50, 5, 10)),
        "{:#?}",
        engine.diagnostics().active()
    );
    let frame = engine.advance(16.0).expect("frame");
    let after = frame.ops[0].instances().screen_position.clone();
    assert_eq!(after.len(), 100);

    // All depths are 0, so op order is element order on both sides.
    let cap = SemanticTag::Position.slew_per_second() * 0.016 + 1e-6;
    let mut max_step: f64 = 0.0;
    for i in 0..50 {
        let dx = f64::from(after[i * 2]) - f64::from(before[i * 2]);
        let dy = f64::from(after[i * 2 + 1]) - f64::from(before[i * 2 + 1]);
        max_step = max_step.max(dx.abs()).max(dy.abs());
    }
    assert!(
        max_step <= cap,
        "an element stepped {max_step}, beyond the slew cap {cap}"
    );
    // And the edit genuinely moved targets: elements converge over time.
    let mut settled = after;
    for _ in 0..200 {
        let frame = engine.advance(16.0).expect("frame");
        settled = frame.ops[0].instances().screen_position.clone();
    }
    // Row 1 of the old 10×10 grid sat at y=0.15; in the 5×10 grid it sits
    // at y=0.3. Element 10 (row 1, col 0) must have travelled there.
    let y = f64::from(settled[10 * 2 + 1]);
    assert!((y - 0.3).abs() < 0.02, "element 10 settled at y={y}");
}

/// A pulse disturbs a target's gauge and then decays away.
#[test]
fn test_pulse_disturbs_and_decays() {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(engine.load(&grid_patch(16, 4, 4)));
    for _ in 0..10 {
        engine.advance(16.0);
    }
    let calm = engine.snapshot_frame().expect("frame").ops[0]
        .instances()
        .screen_position
        .clone();

    let target = flux_core::make_target_id("draw", "position");
    engine.request_pulse(target, 0.5);
    let disturbed = engine.advance(16.0).expect("frame").ops[0]
        .instances()
        .screen_position
        .clone();
    assert!(
        disturbed
            .iter()
            .zip(&calm)
            .any(|(a, b)| (a - b).abs() > 1e-4),
        "pulse had no visible effect"
    );

    for _ in 0..400 {
        engine.advance(16.0);
    }
    let recovered = engine.snapshot_frame().expect("frame").ops[0]
        .instances()
        .screen_position
        .clone();
    for (a, b) in recovered.iter().zip(&calm) {
        assert!((a - b).abs() < 1e-3, "gauge did not decay: {a} vs {b}");
    }
}
