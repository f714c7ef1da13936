// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declarative kernel signatures, separate from the implementations.
//!
//! The compiler consults these to seed unit constraints and validate
//! connections; the materializer consults them for stride agreement. The
//! implementations in `opcode`/`signal`/`field` never look at them.

use crate::types::{Contract, Payload, Unit};

use super::field::FieldKernel;
use super::opcode::Opcode;
use super::signal::SignalKernel;

/// Payload/unit expectations for one kernel.
#[derive(Clone, Copy, Debug)]
pub struct KernelSignature {
    /// Kernel name (matches the enum's `name()`).
    pub name: &'static str,
    /// Per-input payload and unit.
    pub inputs: &'static [(Payload, Unit)],
    /// Output payload and unit.
    pub output: (Payload, Unit),
    /// Contract the output is guaranteed to satisfy.
    pub out_contract: Contract,
}

const F_SCALAR: (Payload, Unit) = (Payload::Float, Unit::Scalar);
const F_RADIANS: (Payload, Unit) = (Payload::Float, Unit::Radians);
const F_NORM: (Payload, Unit) = (Payload::Float, Unit::Normalized);
const PHASE: (Payload, Unit) = (Payload::Phase, Unit::Turns);

/// Signature of a signal kernel.
#[must_use]
pub fn signal_signature(kernel: SignalKernel) -> KernelSignature {
    let (inputs, output, out_contract): (&'static [(Payload, Unit)], _, _) = match kernel {
        SignalKernel::OscSin
        | SignalKernel::OscCos
        | SignalKernel::OscTan
        | SignalKernel::Triangle
        | SignalKernel::Square
        | SignalKernel::Sawtooth => (
            &[PHASE],
            F_SCALAR,
            if kernel == SignalKernel::OscTan {
                // tan is unbounded near quarter phase.
                Contract::None
            } else {
                Contract::Clamp11
            },
        ),
        SignalKernel::EaseInQuad
        | SignalKernel::EaseOutQuad
        | SignalKernel::EaseInOutQuad
        | SignalKernel::EaseInCubic
        | SignalKernel::EaseOutCubic
        | SignalKernel::EaseInOutCubic
        | SignalKernel::EaseOutBounce => (&[F_NORM], F_NORM, Contract::Clamp01),
        // Elastic overshoots; no clamp01 guarantee.
        SignalKernel::EaseInElastic | SignalKernel::EaseOutElastic => {
            (&[F_NORM], F_NORM, Contract::None)
        }
        SignalKernel::Smoothstep => (&[F_SCALAR, F_SCALAR, F_SCALAR], F_SCALAR, Contract::Clamp01),
        SignalKernel::Step => (&[F_SCALAR, F_SCALAR], F_SCALAR, Contract::Clamp01),
        SignalKernel::Noise => (&[F_SCALAR], F_SCALAR, Contract::Wrap01),
    };
    KernelSignature {
        name: kernel.name(),
        inputs,
        output,
        out_contract,
    }
}

/// Signature of a field kernel.
#[must_use]
pub fn field_signature(kernel: FieldKernel) -> KernelSignature {
    let (inputs, output, out_contract): (&'static [(Payload, Unit)], _, _) = match kernel {
        FieldKernel::MakeVec2 => (
            &[F_SCALAR, F_SCALAR],
            (Payload::Vec2, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::MakeVec3 => (
            &[F_SCALAR, F_SCALAR, F_SCALAR],
            (Payload::Vec3, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::PolarToCartesian => (
            &[F_RADIANS, F_SCALAR],
            (Payload::Vec2, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::CartesianToPolar => (
            &[(Payload::Vec2, Unit::Scalar)],
            (Payload::Vec2, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::HsvToRgb => (
            &[(Payload::Vec3, Unit::Scalar)],
            (Payload::Color, Unit::Scalar),
            Contract::Clamp01,
        ),
        FieldKernel::ApplyOpacity => (
            &[(Payload::Color, Unit::Scalar), F_NORM],
            (Payload::Color, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::Jitter2d => (
            &[(Payload::Vec3, Unit::Scalar), F_SCALAR],
            (Payload::Vec3, Unit::Scalar),
            Contract::None,
        ),
        FieldKernel::FieldPulse => (&[F_SCALAR, PHASE], F_SCALAR, Contract::None),
        FieldKernel::FieldAngularOffset => (&[F_RADIANS, F_RADIANS], F_RADIANS, Contract::None),
        FieldKernel::FieldRadiusSqrt => (&[F_SCALAR], F_SCALAR, Contract::None),
        FieldKernel::FieldGoldenAngle => (&[F_SCALAR], F_RADIANS, Contract::None),
        FieldKernel::FieldHueFromPhase => (
            &[PHASE],
            (Payload::Color, Unit::Scalar),
            Contract::Clamp01,
        ),
        FieldKernel::LayerColor => (
            &[(Payload::Color, Unit::Scalar), (Payload::Color, Unit::Scalar)],
            (Payload::Color, Unit::Scalar),
            Contract::None,
        ),
    };
    KernelSignature {
        name: kernel.name(),
        inputs,
        output,
        out_contract,
    }
}

/// Unit an opcode pins on its inputs, if any. Trig wants radians; the rest
/// are unit-polymorphic.
#[must_use]
pub fn opcode_input_unit(op: Opcode) -> Option<Unit> {
    match op {
        Opcode::Sin | Opcode::Cos | Opcode::Tan => Some(Unit::Radians),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payload_admits_unit;

    #[test]
    fn signatures_respect_the_admission_table() {
        for k in [
            SignalKernel::OscSin,
            SignalKernel::Triangle,
            SignalKernel::EaseOutBounce,
            SignalKernel::Smoothstep,
            SignalKernel::Noise,
        ] {
            let sig = signal_signature(k);
            for (p, u) in sig.inputs {
                assert!(payload_admits_unit(*p, *u), "{}", sig.name);
            }
            assert!(payload_admits_unit(sig.output.0, sig.output.1), "{}", sig.name);
        }
        for k in [
            FieldKernel::MakeVec2,
            FieldKernel::PolarToCartesian,
            FieldKernel::HsvToRgb,
            FieldKernel::FieldGoldenAngle,
        ] {
            let sig = field_signature(k);
            for (p, u) in sig.inputs {
                assert!(payload_admits_unit(*p, *u), "{}", sig.name);
            }
            assert!(payload_admits_unit(sig.output.0, sig.output.1), "{}", sig.name);
        }
    }

    #[test]
    fn signature_arity_matches_kernel_arity() {
        for k in [
            FieldKernel::MakeVec2,
            FieldKernel::MakeVec3,
            FieldKernel::ApplyOpacity,
            FieldKernel::FieldHueFromPhase,
        ] {
            assert_eq!(field_signature(k).inputs.len(), k.arg_count());
        }
        for k in [SignalKernel::Smoothstep, SignalKernel::Step, SignalKernel::OscSin] {
            assert_eq!(signal_signature(k).inputs.len(), k.arg_count());
        }
    }
}
