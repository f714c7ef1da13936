// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Authored graph model: blocks, edges, config values, content hashing.
//!
//! A [`Patch`] is the snapshot the editor (or the HCL front-end) hands to the
//! compiler. It is plain data with deterministic iteration order; the compile
//! cache keys on [`Patch::content_hash`].

use std::collections::BTreeMap;

use blake3::Hasher;

use crate::ident::{BlockId, EdgeId, Hash};

/// Configuration literal attached to a block or port default.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Absent value; distinct from a missing key.
    Null,
    /// Float literal.
    Float(f64),
    /// Integer literal.
    Int(i64),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
    /// Two-component vector literal.
    Vec2([f64; 2]),
    /// Three-component vector literal.
    Vec3([f64; 3]),
    /// RGBA color literal.
    Color([f64; 4]),
    /// Homogeneous list literal.
    List(Vec<Value>),
}

impl Value {
    /// Numeric view; ints widen to float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view; floats with integral value narrow.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Non-negative count view.
    #[must_use]
    pub fn as_count(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    /// String view.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn hash_into(&self, hasher: &mut Hasher) {
        match self {
            Self::Null => {
                hasher.update(&[0]);
            }
            Self::Float(v) => {
                hasher.update(&[1]);
                hasher.update(&v.to_le_bytes());
            }
            Self::Int(v) => {
                hasher.update(&[2]);
                hasher.update(&v.to_le_bytes());
            }
            Self::Bool(b) => {
                hasher.update(&[3, u8::from(*b)]);
            }
            Self::Str(s) => {
                hasher.update(&[4]);
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            Self::Vec2(v) => {
                hasher.update(&[5]);
                for c in v {
                    hasher.update(&c.to_le_bytes());
                }
            }
            Self::Vec3(v) => {
                hasher.update(&[6]);
                for c in v {
                    hasher.update(&c.to_le_bytes());
                }
            }
            Self::Color(v) => {
                hasher.update(&[7]);
                for c in v {
                    hasher.update(&c.to_le_bytes());
                }
            }
            Self::List(items) => {
                hasher.update(&[8]);
                hasher.update(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.hash_into(hasher);
                }
            }
        }
    }
}

/// How multiple incoming edges on one input port reduce to a single value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombineMode {
    /// Highest sort key wins.
    #[default]
    Last,
    /// Lowest sort key wins.
    First,
    /// Componentwise sum.
    Sum,
    /// Componentwise mean.
    Average,
    /// Componentwise maximum.
    Max,
    /// Componentwise minimum.
    Min,
    /// Componentwise product.
    Mul,
    /// Alpha-over compositing (colors only).
    Layer,
    /// Boolean or.
    Or,
    /// Boolean and.
    And,
}

impl CombineMode {
    /// Stable lowercase name used in serialized patches.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::First => "first",
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Max => "max",
            Self::Min => "min",
            Self::Mul => "mul",
            Self::Layer => "layer",
            Self::Or => "or",
            Self::And => "and",
        }
    }

    /// Parses a serialized name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Self::Last,
            "first" => Self::First,
            "sum" => Self::Sum,
            "average" => Self::Average,
            "max" => Self::Max,
            "min" => Self::Min,
            "mul" => Self::Mul,
            "layer" => Self::Layer,
            "or" => Self::Or,
            "and" => Self::And,
            _ => return None,
        })
    }

    /// Closed payload/combine admission table.
    ///
    /// - `color` admits last, first, layer
    /// - `bool` admits last, first, or, and
    /// - numeric payloads admit last, first, sum, average, max, min, mul
    /// - opaque payloads admit last, first
    #[must_use]
    pub fn allowed_for(self, payload: crate::types::Payload) -> bool {
        use crate::types::Payload;
        match payload {
            Payload::Color => matches!(self, Self::Last | Self::First | Self::Layer),
            Payload::Bool => matches!(self, Self::Last | Self::First | Self::Or | Self::And),
            Payload::Float | Payload::Int | Payload::Vec2 | Payload::Vec3 | Payload::Phase => {
                matches!(
                    self,
                    Self::Last
                        | Self::First
                        | Self::Sum
                        | Self::Average
                        | Self::Max
                        | Self::Min
                        | Self::Mul
                )
            }
            Payload::Shape | Payload::CameraProjection | Payload::PathRef | Payload::TopologyId => {
                matches!(self, Self::Last | Self::First)
            }
        }
    }
}

/// Per-port authoring settings on a block instance.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputSettings {
    /// Combine mode override; `None` falls back to the port definition.
    pub combine: Option<CombineMode>,
    /// Literal default when no edge arrives.
    pub default: Option<Value>,
}

/// One authored block.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockInstance {
    /// Unique id within the patch.
    pub id: BlockId,
    /// Registry type name.
    pub block_type: String,
    /// Author-facing role label; also the stable-identity root for
    /// continuity targets.
    pub display_name: String,
    /// Configuration record.
    pub params: BTreeMap<String, Value>,
    /// Per-input-port settings keyed by port name.
    pub inputs: BTreeMap<String, InputSettings>,
}

/// An edge endpoint: `(block, port name)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortRef {
    /// Owning block.
    pub block: BlockId,
    /// Port name on that block.
    pub port: String,
}

/// A directed edge between two ports.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Unique id within the patch.
    pub id: EdgeId,
    /// Source output port.
    pub from: PortRef,
    /// Destination input port.
    pub to: PortRef,
    /// Orders multiple edges into one port; combine modes consult it.
    pub sort_key: u32,
}

/// The authored graph handed to the compiler.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patch {
    /// Patch display name.
    pub name: String,
    /// Blocks keyed by id (deterministic iteration order).
    pub blocks: BTreeMap<BlockId, BlockInstance>,
    /// Edges in authored order.
    pub edges: Vec<Edge>,
}

impl Patch {
    /// Creates an empty named patch.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a block, returning its id.
    pub fn add_block(&mut self, block: BlockInstance) -> BlockId {
        let id = block.id;
        self.blocks.insert(id, block);
        id
    }

    /// Adds an edge.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Canonical content hash over blocks (sorted by id) and edges (sorted
    /// by id). Two patches that differ only in authored edge order hash
    /// identically.
    #[must_use]
    pub fn content_hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(b"patch:");
        hasher.update(&(self.blocks.len() as u64).to_le_bytes());
        for (id, block) in &self.blocks {
            hasher.update(id.as_bytes());
            hasher.update(block.block_type.as_bytes());
            hasher.update(&[0]);
            hasher.update(block.display_name.as_bytes());
            hasher.update(&[0]);
            hasher.update(&(block.params.len() as u64).to_le_bytes());
            for (key, value) in &block.params {
                hasher.update(key.as_bytes());
                hasher.update(&[0]);
                value.hash_into(&mut hasher);
            }
            hasher.update(&(block.inputs.len() as u64).to_le_bytes());
            for (port, settings) in &block.inputs {
                hasher.update(port.as_bytes());
                hasher.update(&[0]);
                match settings.combine {
                    None => {
                        hasher.update(&[0]);
                    }
                    Some(mode) => {
                        hasher.update(&[1]);
                        hasher.update(mode.name().as_bytes());
                    }
                }
                match &settings.default {
                    None => {
                        hasher.update(&[0]);
                    }
                    Some(value) => {
                        hasher.update(&[1]);
                        value.hash_into(&mut hasher);
                    }
                }
            }
        }
        let mut edges: Vec<&Edge> = self.edges.iter().collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        hasher.update(&(edges.len() as u64).to_le_bytes());
        for edge in edges {
            hasher.update(edge.id.as_bytes());
            hasher.update(edge.from.block.as_bytes());
            hasher.update(edge.from.port.as_bytes());
            hasher.update(&[0]);
            hasher.update(edge.to.block.as_bytes());
            hasher.update(edge.to.port.as_bytes());
            hasher.update(&[0]);
            hasher.update(&edge.sort_key.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{make_block_id, make_edge_id};

    fn block(name: &str, ty: &str) -> BlockInstance {
        BlockInstance {
            id: make_block_id(name),
            block_type: ty.to_owned(),
            display_name: name.to_owned(),
            params: BTreeMap::new(),
            inputs: BTreeMap::new(),
        }
    }

    #[test]
    fn content_hash_ignores_edge_insertion_order() {
        let mut a = Patch::new("p");
        a.add_block(block("x", "Const"));
        a.add_block(block("y", "Const"));
        let e1 = Edge {
            id: make_edge_id("e1"),
            from: PortRef {
                block: make_block_id("x"),
                port: "out".into(),
            },
            to: PortRef {
                block: make_block_id("y"),
                port: "in".into(),
            },
            sort_key: 0,
        };
        let e2 = Edge {
            id: make_edge_id("e2"),
            from: PortRef {
                block: make_block_id("y"),
                port: "out".into(),
            },
            to: PortRef {
                block: make_block_id("x"),
                port: "in".into(),
            },
            sort_key: 1,
        };
        let mut b = a.clone();
        a.add_edge(e1.clone());
        a.add_edge(e2.clone());
        b.add_edge(e2);
        b.add_edge(e1);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_sees_param_changes() {
        let mut a = Patch::new("p");
        let mut blk = block("x", "Const");
        blk.params.insert("value".into(), Value::Float(1.0));
        a.add_block(blk);
        let mut b = Patch::new("p");
        let mut blk = block("x", "Const");
        blk.params.insert("value".into(), Value::Float(2.0));
        b.add_block(blk);
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
