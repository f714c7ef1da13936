// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parsed form of a patch document, independent of the engine model.

/// Attribute value.
#[derive(Clone, PartialEq, Debug)]
pub enum AstValue {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// `null`.
    Null,
    /// Bracketed list.
    List(Vec<AstValue>),
}

/// Per-input-port settings block.
#[derive(Clone, PartialEq, Debug)]
pub struct InputAst {
    /// Port name.
    pub port: String,
    /// Combine mode name, if set.
    pub combine: Option<String>,
    /// Default literal, if set.
    pub default: Option<AstValue>,
}

/// One outgoing connection: `srcPort = dstBlock.dstPort`.
#[derive(Clone, PartialEq, Debug)]
pub struct OutputAst {
    /// Source port on the declaring block.
    pub src_port: String,
    /// Destination block display name.
    pub dst_block: String,
    /// Destination port name.
    pub dst_port: String,
}

/// One `block "Type" "name" { ... }` form.
#[derive(Clone, PartialEq, Debug)]
pub struct BlockAst {
    /// Registry type name.
    pub type_name: String,
    /// Display name (unique within the patch).
    pub name: String,
    /// Attributes in authored order.
    pub attrs: Vec<(String, AstValue)>,
    /// Input settings blocks.
    pub inputs: Vec<InputAst>,
    /// Outgoing connections in authored order.
    pub outputs: Vec<OutputAst>,
}

/// One `expose_input`/`expose_output` form inside a composite.
#[derive(Clone, PartialEq, Debug)]
pub struct ExposeAst {
    /// External port name.
    pub external: String,
    /// Inner block display name.
    pub block: String,
    /// Inner port name.
    pub port: String,
    /// Optional editor label.
    pub label: Option<String>,
}

/// One `composite "Type" { ... }` form.
#[derive(Clone, PartialEq, Debug)]
pub struct CompositeAst {
    /// Composite type name.
    pub type_name: String,
    /// Inner blocks.
    pub blocks: Vec<BlockAst>,
    /// Exposed inputs.
    pub expose_inputs: Vec<ExposeAst>,
    /// Exposed outputs.
    pub expose_outputs: Vec<ExposeAst>,
}

/// A whole document: one patch plus any composite definitions.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PatchAst {
    /// Patch display name.
    pub name: String,
    /// Top-level blocks.
    pub blocks: Vec<BlockAst>,
    /// Composite definitions.
    pub composites: Vec<CompositeAst>,
}
