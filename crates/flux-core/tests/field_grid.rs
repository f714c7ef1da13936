// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

mod common;

use common::{assert_slot_ranges_disjoint, block, compile_ok, connect};
use flux_core::{Engine, Patch, ScheduleStep, Value};

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

#[test]
fn position_field_is_vec3_over_sixteen_elements() {
    let program = compile_ok(&grid_patch(16, 4, 4));
    assert_slot_ranges_disjoint(&program);

    let binding = program
        .schedule
        .iter()
        .find_map(|s| match s {
            ScheduleStep::Render(b) => Some(b),
            _ => None,
        })
        .expect("render step");
    assert_eq!(program.field_stride(binding.position), 3);
    assert_eq!(program.instance_count(binding.instance), 16);
    // 16 elements × 3 lanes = 48 materialized lanes.
    assert_eq!(
        program.instance_count(binding.instance) * program.field_stride(binding.position) as usize,
        48
    );
}

#[test]
fn positions_form_a_regular_grid_inside_the_unit_square() {
    let mut engine = Engine::builder().build().expect("engine");
    assert!(engine.load(&grid_patch(16, 4, 4)), "{:#?}", engine.diagnostics().active());
    let frame = engine.advance(16.0).expect("frame");
    let instances = frame.ops[0].instances();
    assert_eq!(instances.count, 16);

    let mut xs: Vec<f32> = instances
        .screen_position
        .chunks(2)
        .map(|p| p[0])
        .collect();
    let mut ys: Vec<f32> = instances
        .screen_position
        .chunks(2)
        .map(|p| p[1])
        .collect();
    xs.sort_by(f32::total_cmp);
    xs.dedup();
    ys.sort_by(f32::total_cmp);
    ys.dedup();
    assert_eq!(xs, vec![0.125_f32, 0.375, 0.625, 0.875]);
    assert_eq!(ys, vec![0.125_f32, 0.375, 0.625, 0.875]);
    for p in instances.screen_position.chunks(2) {
        assert!((0.0..=1.0).contains(&p[0]));
        assert!((0.0..=1.0).contains(&p[1]));
    }
}
