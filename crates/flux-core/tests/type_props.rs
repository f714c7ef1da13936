// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]

use proptest::prelude::*;

use flux_core::types::{
    payload_admits_unit, unify, Axis, CanonicalType, Cardinality, Contract, ExtentId, Payload,
    TypeError, Unit,
};

const PAYLOADS: &[Payload] = &[
    Payload::Float,
    Payload::Int,
    Payload::Bool,
    Payload::Vec2,
    Payload::Vec3,
    Payload::Color,
    Payload::Shape,
    Payload::Phase,
    Payload::CameraProjection,
    Payload::PathRef,
    Payload::TopologyId,
];

const UNITS: &[Unit] = &[
    Unit::Scalar,
    Unit::Radians,
    Unit::Turns,
    Unit::Ms,
    Unit::Seconds,
    Unit::Degrees,
    Unit::Count,
    Unit::Normalized,
];

const CONTRACTS: &[Contract] = &[
    Contract::None,
    Contract::Clamp01,
    Contract::Wrap01,
    Contract::Clamp11,
];

const CARDINALITIES: &[Cardinality] = &[
    Cardinality::Signal,
    Cardinality::Field,
    Cardinality::Event,
    Cardinality::Const,
];

fn axis<T: Copy + core::fmt::Debug + 'static>(
    options: &'static [T],
) -> impl Strategy<Value = Axis<T>> {
    prop_oneof![
        Just(Axis::Default),
        (0..options.len()).prop_map(move |i| Axis::Instantiated(options[i])),
    ]
}

fn canonical_type() -> impl Strategy<Value = CanonicalType> {
    (
        axis(PAYLOADS),
        axis(UNITS),
        axis(CONTRACTS),
        axis(CARDINALITIES),
        prop_oneof![Just(Axis::Default), (0u32..4).prop_map(|i| Axis::Instantiated(ExtentId(i)))],
    )
        .prop_map(|(payload, unit, contract, cardinality, extent)| CanonicalType {
            payload,
            unit,
            contract,
            cardinality,
            extent,
        })
}

fn failure_axis(err: &TypeError) -> &'static str {
    match err {
        TypeError::PayloadMismatch(_, _) | TypeError::UnresolvedPayload => "payload",
        TypeError::UnitMismatch(_, _)
        | TypeError::UnresolvedUnit
        | TypeError::UnitNotAdmitted(_, _) => "unit",
        TypeError::ContractMismatch(_, _) => "contract",
        TypeError::CardinalityMismatch(_, _) => "cardinality",
        TypeError::ExtentMismatch => "extent",
    }
}

proptest! {
    /// `unify(a, b)` and `unify(b, a)` agree structurally, or fail on the
    /// same axis.
    #[test]
    fn unify_is_commutative(a in canonical_type(), b in canonical_type()) {
        match (unify(&a, &b), unify(&b, &a)) {
            (Ok(x), Ok(y)) => prop_assert_eq!(x, y),
            (Err(x), Err(y)) => prop_assert_eq!(failure_axis(&x), failure_axis(&y)),
            (x, y) => prop_assert!(false, "asymmetric outcome: {x:?} vs {y:?}"),
        }
    }

    /// Unifying with a fully polymorphic type is the identity.
    #[test]
    fn any_is_the_unit_of_unification(a in canonical_type()) {
        prop_assert_eq!(unify(&a, &CanonicalType::any()), Ok(a));
    }

    /// Unification is idempotent.
    #[test]
    fn unify_is_idempotent(a in canonical_type()) {
        prop_assert_eq!(unify(&a, &a), Ok(a));
    }
}

/// The payload/unit admission table, spelled out, must match the
/// implementation exactly.
#[test]
fn payload_unit_table_is_closed_and_documented() {
    let admits = |p: Payload, us: &[Unit]| {
        for u in UNITS {
            assert_eq!(
                payload_admits_unit(p, *u),
                us.contains(u),
                "payload {p:?} unit {u:?}"
            );
        }
    };
    admits(
        Payload::Float,
        &[
            Unit::Scalar,
            Unit::Normalized,
            Unit::Radians,
            Unit::Turns,
            Unit::Ms,
            Unit::Seconds,
            Unit::Degrees,
        ],
    );
    admits(Payload::Int, &[Unit::Scalar, Unit::Count]);
    admits(Payload::Bool, &[Unit::Scalar]);
    admits(Payload::Phase, &[Unit::Scalar, Unit::Turns]);
    admits(Payload::Vec2, &[Unit::Scalar, Unit::Normalized]);
    admits(Payload::Vec3, &[Unit::Scalar, Unit::Normalized]);
    admits(Payload::Color, &[Unit::Scalar]);
    admits(Payload::Shape, &[Unit::Scalar]);
    admits(Payload::CameraProjection, &[Unit::Scalar]);
    admits(Payload::PathRef, &[Unit::Scalar]);
    admits(Payload::TopologyId, &[Unit::Scalar]);
}
