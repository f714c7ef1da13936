// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical document emitter.
//!
//! Output is stably ordered (blocks by name, attributes by key, expose
//! blocks by external id) so serialize → deserialize → serialize is
//! bitwise stable on a canonical document. Keys the grammar cannot express
//! as bare identifiers are quoted.

use std::fmt::Write as _;

use crate::ast::{AstValue, BlockAst, CompositeAst, ExposeAst, PatchAst};

/// Words the grammar claims; they never appear as bare keys.
const RESERVED: &[&str] = &[
    "patch",
    "block",
    "composite",
    "outputs",
    "input",
    "expose_input",
    "expose_output",
    "null",
    "true",
    "false",
];

fn is_bare_key(key: &str) -> bool {
    if RESERVED.contains(&key) {
        return false;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn key(s: &str) -> String {
    if is_bare_key(s) {
        s.to_owned()
    } else {
        quote(s)
    }
}

fn number(v: f64) -> String {
    if !v.is_finite() {
        return "0.0".to_owned();
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        // Keep the decimal point so floats stay floats on re-parse.
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn value(v: &AstValue) -> String {
    match v {
        AstValue::Int(i) => i.to_string(),
        AstValue::Float(f) => number(*f),
        AstValue::Str(s) => quote(s),
        AstValue::Bool(b) => b.to_string(),
        AstValue::Null => "null".to_owned(),
        AstValue::List(items) => {
            let inner: Vec<String> = items.iter().map(value).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}

fn emit_block(out: &mut String, block: &BlockAst, indent: &str) {
    let _ = writeln!(
        out,
        "{indent}block {} {} {{",
        quote(&block.type_name),
        quote(&block.name)
    );
    for (k, v) in &block.attrs {
        let _ = writeln!(out, "{indent}  {} = {}", key(k), value(v));
    }
    for input in &block.inputs {
        let _ = writeln!(out, "{indent}  input {} {{", quote(&input.port));
        if let Some(mode) = &input.combine {
            let _ = writeln!(out, "{indent}    combine = {}", quote(mode));
        }
        if let Some(default) = &input.default {
            let _ = writeln!(out, "{indent}    default = {}", value(default));
        }
        let _ = writeln!(out, "{indent}  }}");
    }
    if !block.outputs.is_empty() {
        let _ = writeln!(out, "{indent}  outputs {{");
        for o in &block.outputs {
            let _ = writeln!(
                out,
                "{indent}    {} = {}.{}",
                key(&o.src_port),
                key(&o.dst_block),
                key(&o.dst_port)
            );
        }
        let _ = writeln!(out, "{indent}  }}");
    }
    let _ = writeln!(out, "{indent}}}");
}

fn emit_expose(out: &mut String, form: &str, e: &ExposeAst) {
    let _ = writeln!(out, "  {form} {} {{", quote(&e.external));
    let _ = writeln!(out, "    block = {}", quote(&e.block));
    let _ = writeln!(out, "    port = {}", quote(&e.port));
    if let Some(label) = &e.label {
        let _ = writeln!(out, "    label = {}", quote(label));
    }
    let _ = writeln!(out, "  }}");
}

fn emit_composite(out: &mut String, composite: &CompositeAst) {
    let _ = writeln!(out, "composite {} {{", quote(&composite.type_name));
    let mut blocks = composite.blocks.clone();
    blocks.sort_by(|a, b| a.name.cmp(&b.name));
    for block in &blocks {
        emit_block(out, block, "  ");
    }
    // Expose blocks emit sorted by external id for deterministic output.
    let mut ins = composite.expose_inputs.clone();
    ins.sort_by(|a, b| a.external.cmp(&b.external));
    for e in &ins {
        emit_expose(out, "expose_input", e);
    }
    let mut outs = composite.expose_outputs.clone();
    outs.sort_by(|a, b| a.external.cmp(&b.external));
    for e in &outs {
        emit_expose(out, "expose_output", e);
    }
    let _ = writeln!(out, "}}");
}

/// Serializes a document canonically.
#[must_use]
pub fn serialize(ast: &PatchAst) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "patch {} {{", quote(&ast.name));
    let mut blocks = ast.blocks.clone();
    blocks.sort_by(|a, b| a.name.cmp(&b.name));
    for block in &blocks {
        emit_block(&mut out, block, "  ");
    }
    let _ = writeln!(out, "}}");
    let mut composites = ast.composites.clone();
    composites.sort_by(|a, b| a.type_name.cmp(&b.type_name));
    for composite in &composites {
        emit_composite(&mut out, composite);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn serialize_parse_serialize_is_bitwise_stable() {
        let src = r#"patch "demo" {
  block "Const" "radius" {
    value = 0.02
  }
  block "Oscillator" "osc" {
    wave = "oscSin"
    outputs {
      value = radius.out
    }
  }
}
"#;
        let once = parse(src);
        assert!(once.errors.is_empty(), "{:?}", once.errors);
        let emitted = serialize(&once.ast);
        let twice = parse(&emitted);
        assert!(twice.errors.is_empty(), "{:?}", twice.errors);
        assert_eq!(emitted, serialize(&twice.ast));
    }

    #[test]
    fn odd_keys_are_quoted() {
        let out = parse(r#"patch "p" { block "Const" "k" { "odd key" = 1 } }"#);
        let emitted = serialize(&out.ast);
        assert!(emitted.contains(r#""odd key" = 1"#));
    }

    #[test]
    fn integral_floats_keep_their_point() {
        assert_eq!(number(2.0), "2.0");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(-2.0), "-2.0");
    }

    #[test]
    fn expose_blocks_sort_by_external_id() {
        let out = parse(
            r#"composite "C" {
                block "Const" "k" { value = 1 }
                expose_output "zeta" { block = "k" port = "out" }
                expose_output "alpha" { block = "k" port = "out" }
            }"#,
        );
        let emitted = serialize(&out.ast);
        let alpha = emitted.find(r#"expose_output "alpha""#).unwrap();
        let zeta = emitted.find(r#"expose_output "zeta""#).unwrap();
        assert!(alpha < zeta);
    }
}
