// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! AST ↔ engine patch conversion.

use std::collections::BTreeMap;

use thiserror::Error;

use flux_core::{
    make_block_id, make_edge_id, BlockInstance, CombineMode, Edge, InputSettings, Patch, PortRef,
    Value,
};

use crate::ast::{AstValue, BlockAst, InputAst, OutputAst, PatchAst};

/// Conversion failures. Conversion collects every failure rather than
/// stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Two blocks share a display name.
    #[error("duplicate block name `{0}`")]
    DuplicateBlock(String),
    /// An output targets a block that does not exist.
    #[error("block `{block}` routes `{port}` to unknown block `{target}`")]
    UnknownTarget {
        /// Source block name.
        block: String,
        /// Source port.
        port: String,
        /// Missing target name.
        target: String,
    },
    /// An input block names an unknown combine mode.
    #[error("block `{block}` input `{port}` has unknown combine mode `{mode}`")]
    UnknownCombine {
        /// Block name.
        block: String,
        /// Port name.
        port: String,
        /// Unparseable mode.
        mode: String,
    },
    /// Composite definitions require registration through the editor
    /// pipeline and cannot lower directly into a patch.
    #[error("composite `{0}` cannot be instantiated from a bare document")]
    Composite(String),
}

fn ast_value(value: &AstValue) -> Value {
    match value {
        AstValue::Int(v) => Value::Int(*v),
        AstValue::Float(v) => Value::Float(*v),
        AstValue::Str(s) => Value::Str(s.clone()),
        AstValue::Bool(b) => Value::Bool(*b),
        AstValue::Null => Value::Null,
        AstValue::List(items) => {
            let nums: Option<Vec<f64>> = items
                .iter()
                .map(|i| match i {
                    #[allow(clippy::cast_precision_loss)]
                    AstValue::Int(v) => Some(*v as f64),
                    AstValue::Float(v) => Some(*v),
                    _ => None,
                })
                .collect();
            match nums.as_deref() {
                Some([x, y]) => Value::Vec2([*x, *y]),
                Some([x, y, z]) => Value::Vec3([*x, *y, *z]),
                Some([r, g, b, a]) => Value::Color([*r, *g, *b, *a]),
                _ => Value::List(items.iter().map(ast_value).collect()),
            }
        }
    }
}

fn value_ast(value: &Value) -> AstValue {
    match value {
        Value::Null => AstValue::Null,
        Value::Float(v) => AstValue::Float(*v),
        Value::Int(v) => AstValue::Int(*v),
        Value::Bool(b) => AstValue::Bool(*b),
        Value::Str(s) => AstValue::Str(s.clone()),
        Value::Vec2(v) => AstValue::List(v.iter().map(|c| AstValue::Float(*c)).collect()),
        Value::Vec3(v) => AstValue::List(v.iter().map(|c| AstValue::Float(*c)).collect()),
        Value::Color(v) => AstValue::List(v.iter().map(|c| AstValue::Float(*c)).collect()),
        Value::List(items) => AstValue::List(items.iter().map(value_ast).collect()),
    }
}

/// Builds an engine patch from a parsed document.
///
/// Composites are definitions, not instantiations; their presence is an
/// error here (the editor registers them before compilation).
pub fn to_patch(ast: &PatchAst) -> Result<Patch, Vec<ConvertError>> {
    let mut errors = Vec::new();
    for composite in &ast.composites {
        errors.push(ConvertError::Composite(composite.type_name.clone()));
    }

    let mut patch = Patch::new(ast.name.clone());
    let mut names: BTreeMap<&str, ()> = BTreeMap::new();
    for block in &ast.blocks {
        if names.insert(&block.name, ()).is_some() {
            errors.push(ConvertError::DuplicateBlock(block.name.clone()));
            continue;
        }
        let mut inputs = BTreeMap::new();
        for input in &block.inputs {
            let combine = match &input.combine {
                None => None,
                Some(mode) => match CombineMode::parse(mode) {
                    Some(m) => Some(m),
                    None => {
                        errors.push(ConvertError::UnknownCombine {
                            block: block.name.clone(),
                            port: input.port.clone(),
                            mode: mode.clone(),
                        });
                        None
                    }
                },
            };
            inputs.insert(
                input.port.clone(),
                InputSettings {
                    combine,
                    default: input.default.as_ref().map(ast_value),
                },
            );
        }
        patch.add_block(BlockInstance {
            id: make_block_id(&block.name),
            block_type: block.type_name.clone(),
            display_name: block.name.clone(),
            params: block
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), ast_value(v)))
                .collect(),
            inputs,
        });
    }

    let mut sort_key: u32 = 0;
    for block in &ast.blocks {
        for out in &block.outputs {
            if !ast.blocks.iter().any(|b| b.name == out.dst_block) {
                errors.push(ConvertError::UnknownTarget {
                    block: block.name.clone(),
                    port: out.src_port.clone(),
                    target: out.dst_block.clone(),
                });
                continue;
            }
            let label = format!(
                "{}.{}->{}.{}#{}",
                block.name, out.src_port, out.dst_block, out.dst_port, sort_key
            );
            patch.add_edge(Edge {
                id: make_edge_id(&label),
                from: PortRef {
                    block: make_block_id(&block.name),
                    port: out.src_port.clone(),
                },
                to: PortRef {
                    block: make_block_id(&out.dst_block),
                    port: out.dst_port.clone(),
                },
                sort_key,
            });
            sort_key += 1;
        }
    }

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(errors)
    }
}

/// Projects an engine patch back into document form, canonically ordered:
/// blocks by display name, attributes by key, outputs by
/// `(src port, target, target port, sort key)`.
#[must_use]
pub fn patch_to_ast(patch: &Patch) -> PatchAst {
    let by_id: BTreeMap<_, _> = patch
        .blocks
        .values()
        .map(|b| (b.id, b.display_name.clone()))
        .collect();

    let mut blocks: Vec<BlockAst> = patch
        .blocks
        .values()
        .map(|inst| {
            let mut attrs: Vec<(String, AstValue)> = inst
                .params
                .iter()
                .map(|(k, v)| (k.clone(), value_ast(v)))
                .collect();
            attrs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut inputs: Vec<InputAst> = inst
                .inputs
                .iter()
                .filter(|(_, s)| s.combine.is_some() || s.default.is_some())
                .map(|(port, s)| InputAst {
                    port: port.clone(),
                    combine: s.combine.map(|m| m.name().to_owned()),
                    default: s.default.as_ref().map(value_ast),
                })
                .collect();
            inputs.sort_by(|a, b| a.port.cmp(&b.port));

            let mut outputs: Vec<(u32, OutputAst)> = patch
                .edges
                .iter()
                .filter(|e| e.from.block == inst.id)
                .filter_map(|e| {
                    let target = by_id.get(&e.to.block)?;
                    Some((
                        e.sort_key,
                        OutputAst {
                            src_port: e.from.port.clone(),
                            dst_block: target.clone(),
                            dst_port: e.to.port.clone(),
                        },
                    ))
                })
                .collect();
            outputs.sort_by(|a, b| {
                (&a.1.src_port, &a.1.dst_block, &a.1.dst_port, a.0).cmp(&(
                    &b.1.src_port,
                    &b.1.dst_block,
                    &b.1.dst_port,
                    b.0,
                ))
            });

            BlockAst {
                type_name: inst.block_type.clone(),
                name: inst.display_name.clone(),
                attrs,
                inputs,
                outputs: outputs.into_iter().map(|(_, o)| o).collect(),
            }
        })
        .collect();
    blocks.sort_by(|a, b| a.name.cmp(&b.name));

    PatchAst {
        name: patch.name.clone(),
        blocks,
        composites: Vec::new(),
    }
}
