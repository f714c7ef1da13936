// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block definitions, the process-wide registry, and adapter patterns.
//!
//! A [`BlockDef`] is declarative: typed ports, cardinality mode, broadcast
//! policy, payload generics, capability flags, and a lowering closure that
//! emits IR. Registration fails fast on duplicates. Categories exist for the
//! editor surface and carry no semantic weight.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::ident::{make_target_id, StableTargetId};
use crate::ir::{IrBuilder, PortDir, ValueRef};
use crate::patch::{BlockInstance, CombineMode, Value};
use crate::types::{
    AdapterNeed, Axis, CanonicalType, Cardinality, Contract, Payload, Unit,
};

/// How a block's output cardinality relates to its inputs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CardinalityMode {
    /// Outputs mirror the unified input cardinality.
    Preserve,
    /// Operates on fields only.
    FieldOnly,
    /// Operates on signals only.
    SignalOnly,
    /// Consumes a field, produces a signal (reductions).
    Collapse,
}

/// Whether signal inputs may participate in field operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BroadcastPolicy {
    /// Signals zip with fields; the compiler inserts a broadcast.
    AllowZipSig,
    /// Signals never cross into this block's field ports.
    Deny,
}

/// Capability flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Capabilities {
    /// Output depends only on inputs.
    pub pure_fn: bool,
    /// Declares per-frame state slots.
    pub stateful: bool,
    /// Drives the clock; exactly one per program.
    pub time_root: bool,
    /// Emits draw operations.
    pub renderer: bool,
}

/// Editor-facing grouping. No semantic weight.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Category {
    /// Clocks and phase sources.
    Time,
    /// Scalar signal shaping.
    Signal,
    /// Arithmetic.
    Math,
    /// Instances and per-lane operations.
    Field,
    /// Position generators.
    Layout,
    /// Local-space geometry.
    Geometry,
    /// Color construction.
    Color,
    /// Path operations.
    Path,
    /// Renderers.
    Render,
    /// Auto-insertable conversions and user lenses.
    Adapter,
}

impl Category {
    /// Stable lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Signal => "signal",
            Self::Math => "math",
            Self::Field => "field",
            Self::Layout => "layout",
            Self::Geometry => "geometry",
            Self::Color => "color",
            Self::Path => "path",
            Self::Render => "render",
            Self::Adapter => "adapter",
        }
    }
}

/// One typed port on a block definition.
#[derive(Clone, Debug)]
pub struct PortDef {
    /// Port name, unique within the block.
    pub name: String,
    /// Type constraint; `Default` axes are polymorphic.
    pub ty: CanonicalType,
    /// May be left unconnected without a default.
    pub optional: bool,
    /// Literal source when no edge arrives.
    pub default: Option<Value>,
    /// Default combine mode for multi-edge fan-in.
    pub combine: CombineMode,
    /// Payload-generic group this port belongs to, if any.
    pub payload_group: Option<String>,
}

impl PortDef {
    /// A port constrained to `ty`.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: CanonicalType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            combine: CombineMode::Last,
            payload_group: None,
        }
    }

    /// Marks the port optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attaches a literal default.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Overrides the default combine mode.
    #[must_use]
    pub fn with_combine(mut self, combine: CombineMode) -> Self {
        self.combine = combine;
        self
    }

    /// Joins a payload-generic group.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.payload_group = Some(group.into());
        self
    }
}

/// Allowed payload set for one generic port group.
#[derive(Clone, Debug)]
pub struct PayloadGroup {
    /// Group key referenced by [`PortDef::payload_group`].
    pub name: String,
    /// Payloads the group may instantiate to.
    pub allowed: Vec<Payload>,
}

/// Failures a lowering closure may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A config key is missing or has the wrong shape.
    #[error("invalid config `{key}`: expected {expected}")]
    InvalidConfig {
        /// Config key.
        key: String,
        /// Expected shape description.
        expected: &'static str,
    },
    /// A required input arrived with an unusable reference kind.
    #[error("input `{port}` is missing or of the wrong kind")]
    BadInput {
        /// Port name.
        port: String,
    },
    /// The block cannot lower the resolved type combination.
    #[error("unsupported lowering: {0}")]
    Unsupported(String),
}

/// Context handed to a lowering closure.
pub struct LowerCtx<'a> {
    /// IR accumulator.
    pub ir: &'a mut IrBuilder,
    block: &'a BlockInstance,
    inputs: &'a BTreeMap<String, ValueRef>,
    port_types: &'a BTreeMap<(String, PortDir), CanonicalType>,
    outputs: &'a mut BTreeMap<String, ValueRef>,
}

impl<'a> LowerCtx<'a> {
    /// Assembles a context. Called once per block by the lowering pass.
    #[must_use]
    pub fn new(
        ir: &'a mut IrBuilder,
        block: &'a BlockInstance,
        inputs: &'a BTreeMap<String, ValueRef>,
        port_types: &'a BTreeMap<(String, PortDir), CanonicalType>,
        outputs: &'a mut BTreeMap<String, ValueRef>,
    ) -> Self {
        Self {
            ir,
            block,
            inputs,
            port_types,
            outputs,
        }
    }

    /// The authored block being lowered.
    #[must_use]
    pub fn block(&self) -> &BlockInstance {
        self.block
    }

    /// Author-facing role label.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.block.display_name
    }

    /// Continuity target id for one of this block's output ports.
    #[must_use]
    pub fn target(&self, port: &str) -> StableTargetId {
        make_target_id(&self.block.display_name, port)
    }

    /// Lowered reference arriving at an input port, if any.
    #[must_use]
    pub fn input(&self, port: &str) -> Option<ValueRef> {
        self.inputs.get(port).copied()
    }

    /// Lowered reference at a required input port.
    pub fn require_input(&self, port: &str) -> Result<ValueRef, LowerError> {
        self.input(port).ok_or_else(|| LowerError::BadInput {
            port: port.to_owned(),
        })
    }

    /// Resolved type of an input port.
    #[must_use]
    pub fn in_type(&self, port: &str) -> CanonicalType {
        self.port_types
            .get(&(port.to_owned(), PortDir::In))
            .copied()
            .unwrap_or_default()
    }

    /// Resolved type of an output port.
    #[must_use]
    pub fn out_type(&self, port: &str) -> CanonicalType {
        self.port_types
            .get(&(port.to_owned(), PortDir::Out))
            .copied()
            .unwrap_or_default()
    }

    /// Float config value with a fallback.
    #[must_use]
    pub fn param_f64(&self, key: &str, fallback: f64) -> f64 {
        self.block
            .params
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(fallback)
    }

    /// Count config value with a fallback.
    #[must_use]
    pub fn param_count(&self, key: &str, fallback: usize) -> usize {
        self.block
            .params
            .get(key)
            .and_then(Value::as_count)
            .unwrap_or(fallback)
    }

    /// String config value.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.block.params.get(key).and_then(Value::as_str)
    }

    /// Raw config value.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.block.params.get(key)
    }

    /// Binds an output port to a lowered reference.
    pub fn bind(&mut self, port: &str, value: ValueRef) {
        self.outputs.insert(port.to_owned(), value);
    }
}

/// Lowering closure signature.
pub type LowerFn = Arc<dyn Fn(&mut LowerCtx<'_>) -> Result<(), LowerError> + Send + Sync>;

/// Declarative block definition.
#[derive(Clone)]
pub struct BlockDef {
    /// Unique registry type name.
    pub type_name: String,
    /// Editor grouping.
    pub category: Category,
    /// Ordered input ports.
    pub inputs: Vec<PortDef>,
    /// Ordered output ports.
    pub outputs: Vec<PortDef>,
    /// Cardinality mode.
    pub cardinality: CardinalityMode,
    /// Broadcast policy for field ports.
    pub broadcast: BroadcastPolicy,
    /// Payload-generic groups.
    pub payload_groups: Vec<PayloadGroup>,
    /// Capability flags.
    pub caps: Capabilities,
    /// Lowering closure.
    pub lower: LowerFn,
}

impl std::fmt::Debug for BlockDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDef")
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

impl BlockDef {
    /// Starts a definition with no ports and a no-op lowering.
    #[must_use]
    pub fn new(type_name: impl Into<String>, category: Category) -> Self {
        Self {
            type_name: type_name.into(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            cardinality: CardinalityMode::Preserve,
            broadcast: BroadcastPolicy::Deny,
            payload_groups: Vec::new(),
            caps: Capabilities::default(),
            lower: Arc::new(|_| Ok(())),
        }
    }

    /// Appends an input port.
    #[must_use]
    pub fn input(mut self, port: PortDef) -> Self {
        self.inputs.push(port);
        self
    }

    /// Appends an output port.
    #[must_use]
    pub fn output(mut self, port: PortDef) -> Self {
        self.outputs.push(port);
        self
    }

    /// Sets the cardinality mode.
    #[must_use]
    pub fn cardinality(mut self, mode: CardinalityMode) -> Self {
        self.cardinality = mode;
        self
    }

    /// Opts into zip-with-signal broadcasting.
    #[must_use]
    pub fn allow_broadcast(mut self) -> Self {
        self.broadcast = BroadcastPolicy::AllowZipSig;
        self
    }

    /// Declares a payload-generic group.
    #[must_use]
    pub fn generic(mut self, group: PayloadGroup) -> Self {
        self.payload_groups.push(group);
        self
    }

    /// Sets capability flags.
    #[must_use]
    pub fn caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Sets the lowering closure.
    #[must_use]
    pub fn lowering(
        mut self,
        f: impl Fn(&mut LowerCtx<'_>) -> Result<(), LowerError> + Send + Sync + 'static,
    ) -> Self {
        self.lower = Arc::new(f);
        self
    }

    /// Finds an input port definition by name.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Finds an output port definition by name.
    #[must_use]
    pub fn output_port(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Wildcard pattern over type axes. `None` matches anything, including a
/// still-default axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypePattern {
    /// Payload constraint.
    pub payload: Option<Payload>,
    /// Unit constraint.
    pub unit: Option<Unit>,
    /// Contract constraint.
    pub contract: Option<Contract>,
    /// Cardinality constraint.
    pub cardinality: Option<Cardinality>,
}

impl TypePattern {
    /// Matches any type.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Constrains the unit axis.
    #[must_use]
    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Constrains the payload axis.
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Constrains the contract axis.
    #[must_use]
    pub fn contract(mut self, contract: Contract) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Returns `true` when every constrained axis matches the type's
    /// instantiated value.
    #[must_use]
    pub fn matches(&self, ty: &CanonicalType) -> bool {
        fn axis_ok<T: Copy + PartialEq>(want: Option<T>, have: Axis<T>) -> bool {
            match want {
                None => true,
                Some(w) => have.value() == Some(w),
            }
        }
        axis_ok(self.payload, ty.payload)
            && axis_ok(self.unit, ty.unit)
            && axis_ok(self.contract, ty.contract)
            && axis_ok(self.cardinality, ty.cardinality)
    }
}

/// Auto-insertable adapter: a pattern pair plus the block type that
/// realizes the conversion.
#[derive(Clone, Debug)]
pub struct AdapterDef {
    /// Registry type name of the adapter block.
    pub type_name: String,
    /// Higher wins when several patterns match.
    pub priority: i32,
    /// Source side pattern.
    pub from: TypePattern,
    /// Destination side pattern.
    pub to: TypePattern,
}

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A block type name was registered twice.
    #[error("duplicate block type: {0}")]
    DuplicateBlock(String),
    /// An adapter type name was registered twice.
    #[error("duplicate adapter: {0}")]
    DuplicateAdapter(String),
}

/// Process-wide block registry, populated at engine construction.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    defs: BTreeMap<String, Arc<BlockDef>>,
    adapters: Vec<AdapterDef>,
}

impl BlockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block definition; duplicates fail fast.
    pub fn register(&mut self, def: BlockDef) -> Result<(), RegistryError> {
        let name = def.type_name.clone();
        if self.defs.contains_key(&name) {
            return Err(RegistryError::DuplicateBlock(name));
        }
        self.defs.insert(name, Arc::new(def));
        Ok(())
    }

    /// Registers an adapter pattern; the named block must also be
    /// registered as a definition.
    pub fn register_adapter(&mut self, adapter: AdapterDef) -> Result<(), RegistryError> {
        if self
            .adapters
            .iter()
            .any(|a| a.type_name == adapter.type_name)
        {
            return Err(RegistryError::DuplicateAdapter(adapter.type_name));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    /// Looks up a definition by type name.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<Arc<BlockDef>> {
        self.defs.get(type_name).cloned()
    }

    /// Definitions satisfying a predicate, in name order.
    pub fn find(&self, mut pred: impl FnMut(&BlockDef) -> bool) -> Vec<Arc<BlockDef>> {
        self.defs
            .values()
            .filter(|d| pred(d))
            .cloned()
            .collect()
    }

    /// Distinct categories with at least one definition, sorted.
    #[must_use]
    pub fn all_categories(&self) -> Vec<Category> {
        let mut cats: Vec<Category> = self.defs.values().map(|d| d.category).collect();
        cats.sort_unstable();
        cats.dedup();
        cats
    }

    /// Selects the highest-priority adapter whose patterns bridge
    /// `from → to` for the given need. Ties break by type name so
    /// selection is deterministic.
    #[must_use]
    pub fn find_adapter(
        &self,
        need: &AdapterNeed,
        from: &CanonicalType,
        to: &CanonicalType,
    ) -> Option<&AdapterDef> {
        let mut best: Option<&AdapterDef> = None;
        for adapter in &self.adapters {
            if !adapter.from.matches(from) || !adapter.to.matches(to) {
                continue;
            }
            // Contract lenses must establish exactly the required contract.
            if let AdapterNeed::ContractLens { required } = need {
                if adapter.to.contract != Some(*required) {
                    continue;
                }
            }
            let better = match best {
                None => true,
                Some(b) => {
                    (adapter.priority, &adapter.type_name) > (b.priority, &b.type_name)
                }
            };
            if better {
                best = Some(adapter);
            }
        }
        best
    }

    /// Names of adapters that could bridge `from → to`, for hints.
    #[must_use]
    pub fn adapter_candidates(&self, from: &CanonicalType, to: &CanonicalType) -> Vec<String> {
        self.adapters
            .iter()
            .filter(|a| a.from.matches(from) && a.to.matches(to))
            .map(|a| a.type_name.clone())
            .collect()
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_fails_fast() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockDef::new("Const", Category::Signal)).unwrap();
        assert_eq!(
            reg.register(BlockDef::new("Const", Category::Signal)),
            Err(RegistryError::DuplicateBlock("Const".into()))
        );
    }

    #[test]
    fn pattern_wildcards_match_default_axes() {
        let pat = TypePattern::any().unit(Unit::Radians);
        let ty = CanonicalType::signal(Payload::Float).with_unit(Unit::Radians);
        assert!(pat.matches(&ty));
        assert!(!pat.matches(&CanonicalType::signal(Payload::Float)));
        assert!(TypePattern::any().matches(&CanonicalType::any()));
    }

    #[test]
    fn adapter_selection_prefers_priority_then_name() {
        let mut reg = BlockRegistry::new();
        for (name, priority) in [("A_Low", 1), ("B_High", 5), ("A_AlsoHigh", 5)] {
            reg.register_adapter(AdapterDef {
                type_name: name.into(),
                priority,
                from: TypePattern::any(),
                to: TypePattern::any(),
            })
            .unwrap();
        }
        let from = CanonicalType::signal(Payload::Float);
        let to = CanonicalType::signal(Payload::Float).with_unit(Unit::Radians);
        let picked = reg
            .find_adapter(
                &AdapterNeed::UnitConversion {
                    from: Unit::Scalar,
                    to: Unit::Radians,
                },
                &from,
                &to,
            )
            .unwrap();
        assert_eq!(picked.type_name, "B_High");
    }
}
