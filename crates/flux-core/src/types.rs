// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Five-axis canonical type system with per-axis unification.
//!
//! A [`CanonicalType`] is the product of five axes: payload, unit, value
//! contract, cardinality, and (for fields) extent. Each axis is either
//! `Default` (polymorphic) or `Instantiated`. Unification is strict and
//! per-axis; there is no widening.

use thiserror::Error;

/// Data kind carried by a value.
///
/// Closed set. `Color` is 4-stride RGBA; `Phase` is a float constrained to
/// `[0, 1)`. The tail variants are opaque payloads routed through object
/// storage rather than the `f64` plane.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    /// 64-bit float lane.
    Float,
    /// Integer lane (stored as `f64`, validated integral).
    Int,
    /// Boolean lane (stored as `f64` 0/1).
    Bool,
    /// Two-component vector.
    Vec2,
    /// Three-component vector.
    Vec3,
    /// RGBA color, stride 4.
    Color,
    /// Local-space path geometry handle (object storage).
    Shape,
    /// Float constrained to `[0, 1)`.
    Phase,
    /// Opaque camera projection (object storage).
    CameraProjection,
    /// Opaque path reference (object storage).
    PathRef,
    /// Opaque topology identifier (object storage).
    TopologyId,
}

impl Payload {
    /// Number of `f64` lanes one element of this payload occupies.
    ///
    /// Opaque payloads occupy one object-storage slot and report stride 1.
    #[must_use]
    pub fn stride(self) -> u32 {
        match self {
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Color => 4,
            Self::Float
            | Self::Int
            | Self::Bool
            | Self::Phase
            | Self::Shape
            | Self::CameraProjection
            | Self::PathRef
            | Self::TopologyId => 1,
        }
    }

    /// Returns `true` if this payload lives in object storage rather than
    /// the numeric plane.
    #[must_use]
    pub fn is_opaque(self) -> bool {
        matches!(
            self,
            Self::Shape | Self::CameraProjection | Self::PathRef | Self::TopologyId
        )
    }

    /// Stable lowercase name used in diagnostics and serialized patches.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Color => "color",
            Self::Shape => "shape",
            Self::Phase => "phase",
            Self::CameraProjection => "cameraProjection",
            Self::PathRef => "pathRef",
            Self::TopologyId => "topologyId",
        }
    }
}

/// Semantic unit annotation on a numeric value.
///
/// Units are checked for compatibility but never converted implicitly;
/// conversion requires an adapter block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    /// Dimensionless.
    Scalar,
    /// Angle in radians.
    Radians,
    /// Angle in full turns (`1.0` = 2π radians).
    Turns,
    /// Milliseconds.
    Ms,
    /// Seconds.
    Seconds,
    /// Angle in degrees.
    Degrees,
    /// Discrete count.
    Count,
    /// Normalized `[0, 1]` proportion.
    Normalized,
}

impl Unit {
    /// Stable lowercase name used in diagnostics and serialized patches.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Radians => "radians",
            Self::Turns => "turns",
            Self::Ms => "ms",
            Self::Seconds => "seconds",
            Self::Degrees => "degrees",
            Self::Count => "count",
            Self::Normalized => "normalized",
        }
    }
}

/// Range guarantee declared on a value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Contract {
    /// No range guarantee.
    #[default]
    None,
    /// Clamped to `[0, 1]`.
    Clamp01,
    /// Wrapped into `[0, 1)`.
    Wrap01,
    /// Clamped to `[-1, 1]`.
    Clamp11,
}

impl Contract {
    /// Stable lowercase name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Clamp01 => "clamp01",
            Self::Wrap01 => "wrap01",
            Self::Clamp11 => "clamp11",
        }
    }
}

/// How many lanes a value carries per frame.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cardinality {
    /// One lane per frame.
    Signal,
    /// N aligned lanes bound to an instance.
    Field,
    /// Sparse, at most one firing per frame.
    Event,
    /// Zero-lane compile-time constant.
    Const,
}

impl Cardinality {
    /// Stable lowercase name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Field => "field",
            Self::Event => "event",
            Self::Const => "const",
        }
    }
}

/// Compile-time token identifying a field extent (the instance domain a
/// field is aligned to). Assigned densely during compilation; two fields
/// with different extents never zip.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtentId(pub u32);

/// One axis of a canonical type: polymorphic or pinned to a value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis<T> {
    /// Axis not yet constrained.
    #[default]
    Default,
    /// Axis pinned to a concrete value.
    Instantiated(T),
}

impl<T: Copy> Axis<T> {
    /// Returns the instantiated value, if any.
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Default => None,
            Self::Instantiated(v) => Some(v),
        }
    }

    /// Returns `true` when the axis is still polymorphic.
    #[must_use]
    pub fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }
}

/// Product of the five type axes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanonicalType {
    /// Data kind axis.
    pub payload: Axis<Payload>,
    /// Unit annotation axis.
    pub unit: Axis<Unit>,
    /// Range contract axis.
    pub contract: Axis<Contract>,
    /// Lane-count axis.
    pub cardinality: Axis<Cardinality>,
    /// Instance domain axis; meaningful only for `Field` cardinality.
    pub extent: Axis<ExtentId>,
}

impl CanonicalType {
    /// A fully polymorphic type (every axis `Default`).
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Shorthand for a signal of `payload` with unit `scalar` and no contract.
    #[must_use]
    pub fn signal(payload: Payload) -> Self {
        Self {
            payload: Axis::Instantiated(payload),
            unit: Axis::Instantiated(Unit::Scalar),
            contract: Axis::Instantiated(Contract::None),
            cardinality: Axis::Instantiated(Cardinality::Signal),
            extent: Axis::Default,
        }
    }

    /// Shorthand for a field of `payload` over `extent`.
    #[must_use]
    pub fn field(payload: Payload, extent: ExtentId) -> Self {
        Self {
            payload: Axis::Instantiated(payload),
            unit: Axis::Instantiated(Unit::Scalar),
            contract: Axis::Instantiated(Contract::None),
            cardinality: Axis::Instantiated(Cardinality::Field),
            extent: Axis::Instantiated(extent),
        }
    }

    /// Replaces the unit axis.
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Axis::Instantiated(unit);
        self
    }

    /// Replaces the contract axis.
    #[must_use]
    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contract = Axis::Instantiated(contract);
        self
    }

    /// Returns `true` if any axis is still `Default`.
    ///
    /// Extent counts only when the cardinality is `Field`.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        let field = self.cardinality.value() == Some(Cardinality::Field);
        self.payload.is_default()
            || self.unit.is_default()
            || self.contract.is_default()
            || self.cardinality.is_default()
            || (field && self.extent.is_default())
    }
}

/// Failures produced by unification and connection checking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Both payload axes are instantiated and disagree.
    #[error("payload mismatch: {0} vs {1}")]
    PayloadMismatch(&'static str, &'static str),
    /// Both unit axes are instantiated and disagree.
    #[error("unit mismatch: {0} vs {1}")]
    UnitMismatch(&'static str, &'static str),
    /// Contract required by the destination is stronger than the source's.
    #[error("contract mismatch: {0} does not satisfy {1}")]
    ContractMismatch(&'static str, &'static str),
    /// Both cardinality axes are instantiated and disagree.
    #[error("cardinality mismatch: {0} vs {1}")]
    CardinalityMismatch(&'static str, &'static str),
    /// Two fields are aligned to different instances.
    #[error("extent mismatch: fields are bound to different instances")]
    ExtentMismatch,
    /// A unit axis remained `Default` after solving.
    #[error("unresolved unit")]
    UnresolvedUnit,
    /// A payload axis remained `Default` after solving.
    #[error("unresolved payload")]
    UnresolvedPayload,
    /// Payload/unit pair outside the admission table.
    #[error("payload {0} does not admit unit {1}")]
    UnitNotAdmitted(&'static str, &'static str),
}

fn unify_axis<T: Copy + PartialEq>(
    a: Axis<T>,
    b: Axis<T>,
    err: impl FnOnce(T, T) -> TypeError,
) -> Result<Axis<T>, TypeError> {
    match (a, b) {
        (Axis::Default, x) | (x, Axis::Default) => Ok(x),
        (Axis::Instantiated(x), Axis::Instantiated(y)) => {
            if x == y {
                Ok(Axis::Instantiated(x))
            } else {
                Err(err(x, y))
            }
        }
    }
}

/// Unifies two canonical types axis by axis.
///
/// Commutative: `unify(a, b)` and `unify(b, a)` produce structurally equal
/// results, or fail on the same axis (error operands may swap sides).
pub fn unify(a: &CanonicalType, b: &CanonicalType) -> Result<CanonicalType, TypeError> {
    let payload = unify_axis(a.payload, b.payload, |x, y| {
        TypeError::PayloadMismatch(x.name(), y.name())
    })?;
    let unit = unify_axis(a.unit, b.unit, |x, y| {
        TypeError::UnitMismatch(x.name(), y.name())
    })?;
    let contract = unify_axis(a.contract, b.contract, |x, y| {
        TypeError::ContractMismatch(x.name(), y.name())
    })?;
    let cardinality = unify_axis(a.cardinality, b.cardinality, |x, y| {
        TypeError::CardinalityMismatch(x.name(), y.name())
    })?;
    let extent = unify_axis(a.extent, b.extent, |_, _| TypeError::ExtentMismatch)?;
    Ok(CanonicalType {
        payload,
        unit,
        contract,
        cardinality,
        extent,
    })
}

/// Closed payload/unit admission table.
///
/// - `float` admits scalar, normalized, radians, turns, ms, seconds, degrees
/// - `int` admits scalar, count
/// - `bool` admits only scalar
/// - `phase` admits scalar, turns
/// - `vec2`/`vec3` admit scalar, normalized
/// - `color` admits only scalar
/// - opaque payloads admit only scalar
#[must_use]
pub fn payload_admits_unit(payload: Payload, unit: Unit) -> bool {
    match payload {
        Payload::Float => matches!(
            unit,
            Unit::Scalar
                | Unit::Normalized
                | Unit::Radians
                | Unit::Turns
                | Unit::Ms
                | Unit::Seconds
                | Unit::Degrees
        ),
        Payload::Int => matches!(unit, Unit::Scalar | Unit::Count),
        Payload::Phase => matches!(unit, Unit::Scalar | Unit::Turns),
        Payload::Vec2 | Payload::Vec3 => matches!(unit, Unit::Scalar | Unit::Normalized),
        Payload::Bool
        | Payload::Color
        | Payload::Shape
        | Payload::CameraProjection
        | Payload::PathRef
        | Payload::TopologyId => unit == Unit::Scalar,
    }
}

/// Directional contract compatibility.
///
/// A stronger guarantee may flow into a weaker requirement: any source
/// satisfies a `None` destination, and identical contracts satisfy each
/// other. Everything else demands a lens.
#[must_use]
pub fn contract_compatible(source: Contract, target: Contract) -> bool {
    target == Contract::None || source == target
}

/// What kind of adapter a connection needs to become legal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterNeed {
    /// Units disagree; an explicit converting adapter is required.
    UnitConversion {
        /// Source unit.
        from: Unit,
        /// Destination unit.
        to: Unit,
    },
    /// Destination contract is stronger than the source's; a lens enforcing
    /// `required` must be inserted.
    ContractLens {
        /// Contract the lens must establish.
        required: Contract,
    },
    /// A signal is feeding a field-expecting port; a broadcast node fans the
    /// signal out across the instance.
    Broadcast,
}

/// Outcome of [`check_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCheck {
    /// Types unify directly.
    Compatible,
    /// Types unify after inserting the described adapter.
    NeedsAdapter(AdapterNeed),
    /// No adapter can reconcile the types.
    Incompatible(TypeError),
}

/// Checks whether a value of `from` may flow into a port of `to`.
///
/// `broadcast_allowed` reflects the destination block's broadcast policy: a
/// `Signal` on a field-expecting port is adaptable only when the block opts
/// into zip-with-signal participation.
///
/// Check order is payload, cardinality, unit, contract; the first obstacle
/// decides the result.
#[must_use]
pub fn check_connection(
    from: &CanonicalType,
    to: &CanonicalType,
    broadcast_allowed: bool,
) -> ConnectionCheck {
    if let (Some(p), Some(q)) = (from.payload.value(), to.payload.value()) {
        if p != q {
            return ConnectionCheck::Incompatible(TypeError::PayloadMismatch(p.name(), q.name()));
        }
    }

    match (from.cardinality.value(), to.cardinality.value()) {
        (Some(a), Some(b)) if a != b => {
            // Const promotes freely; Signal->Field is adaptable when the
            // destination block allows zip-with-signal.
            match (a, b) {
                (Cardinality::Const, Cardinality::Signal | Cardinality::Field) => {}
                (Cardinality::Signal, Cardinality::Field) if broadcast_allowed => {
                    return ConnectionCheck::NeedsAdapter(AdapterNeed::Broadcast);
                }
                _ => {
                    return ConnectionCheck::Incompatible(TypeError::CardinalityMismatch(
                        a.name(),
                        b.name(),
                    ));
                }
            }
        }
        _ => {}
    }

    if let (Some(fa), Some(fb)) = (from.extent.value(), to.extent.value()) {
        if fa != fb {
            return ConnectionCheck::Incompatible(TypeError::ExtentMismatch);
        }
    }

    if let (Some(u), Some(v)) = (from.unit.value(), to.unit.value()) {
        if u != v {
            return ConnectionCheck::NeedsAdapter(AdapterNeed::UnitConversion { from: u, to: v });
        }
    }

    let src_contract = from.contract.value().unwrap_or_default();
    if let Some(required) = to.contract.value() {
        if !contract_compatible(src_contract, required) {
            return ConnectionCheck::NeedsAdapter(AdapterNeed::ContractLens { required });
        }
    }

    ConnectionCheck::Compatible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_absorbs_instantiated() {
        let a = CanonicalType::any();
        let b = CanonicalType::signal(Payload::Float);
        assert_eq!(unify(&a, &b), Ok(b));
        assert_eq!(unify(&b, &a), Ok(b));
    }

    #[test]
    fn instantiated_disagreement_fails_on_that_axis() {
        let a = CanonicalType::signal(Payload::Float);
        let b = CanonicalType::signal(Payload::Color);
        assert_eq!(
            unify(&a, &b),
            Err(TypeError::PayloadMismatch("float", "color"))
        );
    }

    #[test]
    fn contract_direction() {
        assert!(contract_compatible(Contract::Clamp01, Contract::None));
        assert!(!contract_compatible(Contract::None, Contract::Clamp01));
        assert!(contract_compatible(Contract::Wrap01, Contract::Wrap01));
        assert!(!contract_compatible(Contract::Clamp01, Contract::Clamp11));
    }

    #[test]
    fn signal_into_field_respects_broadcast_policy() {
        let sig = CanonicalType::signal(Payload::Float);
        let fld = CanonicalType::field(Payload::Float, ExtentId(0));
        assert_eq!(
            check_connection(&sig, &fld, true),
            ConnectionCheck::NeedsAdapter(AdapterNeed::Broadcast)
        );
        assert!(matches!(
            check_connection(&sig, &fld, false),
            ConnectionCheck::Incompatible(TypeError::CardinalityMismatch(_, _))
        ));
    }

    #[test]
    fn color_admits_only_scalar() {
        for unit in [
            Unit::Scalar,
            Unit::Radians,
            Unit::Turns,
            Unit::Ms,
            Unit::Seconds,
            Unit::Degrees,
            Unit::Count,
            Unit::Normalized,
        ] {
            assert_eq!(
                payload_admits_unit(Payload::Color, unit),
                unit == Unit::Scalar
            );
        }
    }
}
