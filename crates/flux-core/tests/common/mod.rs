// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, dead_code)]

use std::collections::BTreeMap;

use flux_core::{
    compile, make_block_id, make_edge_id, register_builtins, BlockInstance, BlockRegistry,
    CombineMode, CompileOptions, CompiledProgram, Edge, InputSettings, Patch, PortRef, Value,
};

pub fn registry() -> BlockRegistry {
    let mut reg = BlockRegistry::new();
    register_builtins(&mut reg).expect("builtin registration");
    reg
}

pub fn block(ty: &str, name: &str, params: &[(&str, Value)]) -> BlockInstance {
    BlockInstance {
        id: make_block_id(name),
        block_type: ty.to_owned(),
        display_name: name.to_owned(),
        params: params
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
        inputs: BTreeMap::new(),
    }
}

pub fn set_input_default(block: &mut BlockInstance, port: &str, value: Value) {
    block
        .inputs
        .entry(port.to_owned())
        .or_insert_with(InputSettings::default)
        .default = Some(value);
}

pub fn set_input_combine(block: &mut BlockInstance, port: &str, mode: CombineMode) {
    block
        .inputs
        .entry(port.to_owned())
        .or_insert_with(InputSettings::default)
        .combine = Some(mode);
}

pub fn connect(patch: &mut Patch, from: (&str, &str), to: (&str, &str), sort_key: u32) {
    let label = format!("{}.{}->{}.{}#{sort_key}", from.0, from.1, to.0, to.1);
    patch.add_edge(Edge {
        id: make_edge_id(&label),
        from: PortRef {
            block: make_block_id(from.0),
            port: from.1.to_owned(),
        },
        to: PortRef {
            block: make_block_id(to.0),
            port: to.1.to_owned(),
        },
        sort_key,
    });
}

pub fn compile_ok(patch: &Patch) -> CompiledProgram {
    let reg = registry();
    let result = compile(patch, &reg, &CompileOptions::default());
    assert!(
        result.is_ok(),
        "expected compile to succeed, got: {:#?}",
        result.diagnostics
    );
    result.program.expect("program present when ok")
}

pub fn assert_slot_ranges_disjoint(program: &CompiledProgram) {
    for a in &program.slots {
        for b in &program.slots {
            if a.slot == b.slot || a.storage != b.storage {
                continue;
            }
            let a_range = a.offset..a.offset + a.stride;
            let b_range = b.offset..b.offset + b.stride;
            assert!(
                a_range.end <= b_range.start || b_range.end <= a_range.start,
                "slots {:?} and {:?} overlap in {:?}",
                a.slot,
                b.slot,
                a.storage
            );
        }
    }
}
