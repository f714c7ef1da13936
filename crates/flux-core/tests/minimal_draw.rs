// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{assert_slot_ranges_disjoint, block, compile_ok, connect, set_input_default};
use flux_core::{DrawOp, Engine, Patch, Value};

/// TimeRoot → Oscillator → scale/offset → MakeVec2 → primitive renderer.
/// The dot's screen x follows `0.5 + 0.5·sin(2π·t/T)` with T = 2000 ms.
fn minimal_patch() -> Patch {
    let mut patch = Patch::new("minimal");
    patch.add_block(block(
        "InfiniteTimeRoot",
        "time",
        &[("periodAMs", Value::Float(2000.0))],
    ));
    patch.add_block(block("Oscillator", "osc", &[("wave", Value::Str("oscSin".into()))]));
    let mut half = block("Scale", "half", &[]);
    set_input_default(&mut half, "factor", Value::Float(0.5));
    patch.add_block(half);
    let mut center = block("Add", "center", &[]);
    set_input_default(&mut center, "b", Value::Float(0.5));
    patch.add_block(center);
    let mut vec = block("MakeVec2", "vec", &[]);
    set_input_default(&mut vec, "y", Value::Float(0.5));
    patch.add_block(vec);
    let mut draw = block("RenderPrimitiveInstances", "draw", &[]);
    set_input_default(&mut draw, "radius", Value::Float(0.02));
    patch.add_block(draw);

    connect(&mut patch, ("time", "phaseA"), ("osc", "phase"), 0);
    connect(&mut patch, ("osc", "value"), ("half", "in"), 1);
    connect(&mut patch, ("half", "out"), ("center", "a"), 2);
    connect(&mut patch, ("center", "out"), ("vec", "x"), 3);
    connect(&mut patch, ("vec", "out"), ("draw", "position"), 4);
    patch
}

#[test]
fn compiles_with_disjoint_slots() {
    let program = compile_ok(&minimal_patch());
    assert_slot_ranges_disjoint(&program);
    assert!(program.stats.steps > 0);
    assert!(program.stats.slots > 0);
}

#[test]
fn sixty_frames_track_the_oscillator() {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(engine.load(&minimal_patch()), "{:#?}", engine.diagnostics().active());

    let mut t_ms = 0.0;
    for _ in 0..60 {
        let frame = engine.advance(16.0).expect("frame");
        t_ms += 16.0;
        assert_eq!(frame.ops.len(), 1);
        let op = &frame.ops[0];
        assert_eq!(op.kind(), "drawPrimitiveInstances");
        assert!(matches!(op, DrawOp::PrimitiveInstances { .. }));
        let instances = op.instances();
        assert_eq!(instances.count, 1);

        let expected_x = 0.5 + 0.5 * (core::f64::consts::TAU * (t_ms / 2000.0)).sin();
        let sx = f64::from(instances.screen_position[0]);
        let sy = f64::from(instances.screen_position[1]);
        assert!(
            (sx - expected_x).abs() < 1e-4,
            "frame at t={t_ms}: x={sx}, expected {expected_x}"
        );
        assert!((sy - 0.5).abs() < 1e-6, "y drifted to {sy}");
        assert!((f64::from(instances.screen_radius[0]) - 0.02).abs() < 1e-6);
    }
}

#[test]
fn default_color_is_white() {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(engine.load(&minimal_patch()));
    let frame = engine.advance(16.0).expect("frame");
    let color = &frame.ops[0].instances().color;
    assert_eq!(color, &vec![1.0_f32, 1.0, 1.0, 1.0]);
}
