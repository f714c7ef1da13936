// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layer B: signal kernels — domain-specific scalar functions.
//!
//! Oscillators take `phase` in `[0, 1)` and emit `[-1, 1]`; they convert
//! `phase * 2π` internally and dispatch through the Layer A trig opcodes so
//! there is exactly one numeric enforcer. Easings map `t ∈ [0, 1]` to
//! `u ∈ [0, 1]`.

use core::f64::consts::{PI, TAU};

use super::hash::value_noise;
use super::opcode::{eval_opcode, KernelError, Opcode};

/// Fixed seed for the `noise` kernel; per-lane variation comes from the
/// argument, not the seed.
const NOISE_SEED: u64 = 0x464C_5558_4E4F_4953;

/// Signal kernel. Closed set; dispatch is an enum match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalKernel {
    /// Sine oscillator.
    OscSin,
    /// Cosine oscillator.
    OscCos,
    /// Tangent oscillator (unbounded near quarter phase).
    OscTan,
    /// Triangle wave.
    Triangle,
    /// Square wave.
    Square,
    /// Sawtooth wave.
    Sawtooth,
    /// Quadratic ease-in.
    EaseInQuad,
    /// Quadratic ease-out.
    EaseOutQuad,
    /// Quadratic ease-in-out.
    EaseInOutQuad,
    /// Cubic ease-in.
    EaseInCubic,
    /// Cubic ease-out.
    EaseOutCubic,
    /// Cubic ease-in-out.
    EaseInOutCubic,
    /// Elastic ease-in.
    EaseInElastic,
    /// Elastic ease-out.
    EaseOutElastic,
    /// Bounce ease-out.
    EaseOutBounce,
    /// Hermite smoothstep over `(e0, e1, x)`.
    Smoothstep,
    /// Step over `(edge, x)`.
    Step,
    /// Deterministic seeded value noise, output in `[0, 1)`.
    Noise,
}

impl SignalKernel {
    /// Stable camelCase name used in patches and diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::OscSin => "oscSin",
            Self::OscCos => "oscCos",
            Self::OscTan => "oscTan",
            Self::Triangle => "triangle",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::EaseInQuad => "easeInQuad",
            Self::EaseOutQuad => "easeOutQuad",
            Self::EaseInOutQuad => "easeInOutQuad",
            Self::EaseInCubic => "easeInCubic",
            Self::EaseOutCubic => "easeOutCubic",
            Self::EaseInOutCubic => "easeInOutCubic",
            Self::EaseInElastic => "easeInElastic",
            Self::EaseOutElastic => "easeOutElastic",
            Self::EaseOutBounce => "easeOutBounce",
            Self::Smoothstep => "smoothstep",
            Self::Step => "step",
            Self::Noise => "noise",
        }
    }

    /// Parses a serialized kernel name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "oscSin" => Self::OscSin,
            "oscCos" => Self::OscCos,
            "oscTan" => Self::OscTan,
            "triangle" => Self::Triangle,
            "square" => Self::Square,
            "sawtooth" => Self::Sawtooth,
            "easeInQuad" => Self::EaseInQuad,
            "easeOutQuad" => Self::EaseOutQuad,
            "easeInOutQuad" => Self::EaseInOutQuad,
            "easeInCubic" => Self::EaseInCubic,
            "easeOutCubic" => Self::EaseOutCubic,
            "easeInOutCubic" => Self::EaseInOutCubic,
            "easeInElastic" => Self::EaseInElastic,
            "easeOutElastic" => Self::EaseOutElastic,
            "easeOutBounce" => Self::EaseOutBounce,
            "smoothstep" => Self::Smoothstep,
            "step" => Self::Step,
            "noise" => Self::Noise,
            _ => return None,
        })
    }

    /// Required argument count.
    #[must_use]
    pub fn arg_count(self) -> usize {
        match self {
            Self::Smoothstep => 3,
            Self::Step => 2,
            _ => 1,
        }
    }

    /// Returns `true` for the oscillator family (phase in, `[-1, 1]` out).
    #[must_use]
    pub fn is_oscillator(self) -> bool {
        matches!(
            self,
            Self::OscSin
                | Self::OscCos
                | Self::OscTan
                | Self::Triangle
                | Self::Square
                | Self::Sawtooth
        )
    }
}

fn ease_out_bounce(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

fn trig(op: Opcode, radians: f64) -> f64 {
    // Layer A is the only trig enforcer; arity is correct by construction.
    eval_opcode(op, &[radians]).unwrap_or(0.0)
}

/// Evaluates a signal kernel.
pub fn eval_signal(kernel: SignalKernel, args: &[f64]) -> Result<f64, KernelError> {
    if args.len() != kernel.arg_count() {
        return Err(KernelError::Arity {
            op: kernel.name(),
            expected: match kernel.arg_count() {
                2 => "2",
                3 => "3",
                _ => "1",
            },
            got: args.len(),
        });
    }
    let out = match kernel {
        SignalKernel::OscSin => trig(Opcode::Sin, args[0] * TAU),
        SignalKernel::OscCos => trig(Opcode::Cos, args[0] * TAU),
        SignalKernel::OscTan => trig(Opcode::Tan, args[0] * TAU),
        SignalKernel::Triangle => {
            let p = args[0] - args[0].floor();
            if p < 0.25 {
                4.0 * p
            } else if p < 0.75 {
                2.0 - 4.0 * p
            } else {
                4.0 * p - 4.0
            }
        }
        SignalKernel::Square => {
            let p = args[0] - args[0].floor();
            if p < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        SignalKernel::Sawtooth => {
            let p = args[0] - args[0].floor();
            2.0 * p - 1.0
        }
        SignalKernel::EaseInQuad => {
            let t = args[0].clamp(0.0, 1.0);
            t * t
        }
        SignalKernel::EaseOutQuad => {
            let t = args[0].clamp(0.0, 1.0);
            1.0 - (1.0 - t) * (1.0 - t)
        }
        SignalKernel::EaseInOutQuad => {
            let t = args[0].clamp(0.0, 1.0);
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        SignalKernel::EaseInCubic => {
            let t = args[0].clamp(0.0, 1.0);
            t * t * t
        }
        SignalKernel::EaseOutCubic => {
            let t = args[0].clamp(0.0, 1.0);
            1.0 - (1.0 - t).powi(3)
        }
        SignalKernel::EaseInOutCubic => {
            let t = args[0].clamp(0.0, 1.0);
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            }
        }
        SignalKernel::EaseInElastic => {
            let t = args[0].clamp(0.0, 1.0);
            if t == 0.0 || t == 1.0 {
                t
            } else {
                let c4 = TAU / 3.0;
                -libm::pow(2.0, 10.0 * t - 10.0) * trig(Opcode::Sin, (t * 10.0 - 10.75) * c4)
            }
        }
        SignalKernel::EaseOutElastic => {
            let t = args[0].clamp(0.0, 1.0);
            if t == 0.0 || t == 1.0 {
                t
            } else {
                let c4 = TAU / 3.0;
                libm::pow(2.0, -10.0 * t) * trig(Opcode::Sin, (t * 10.0 - 0.75) * c4) + 1.0
            }
        }
        SignalKernel::EaseOutBounce => ease_out_bounce(args[0].clamp(0.0, 1.0)),
        SignalKernel::Smoothstep => {
            let (e0, e1, x) = (args[0], args[1], args[2]);
            if e0 == e1 {
                if x < e0 {
                    0.0
                } else {
                    1.0
                }
            } else {
                let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
                t * t * (3.0 - 2.0 * t)
            }
        }
        SignalKernel::Step => {
            if args[1] < args[0] {
                0.0
            } else {
                1.0
            }
        }
        SignalKernel::Noise => value_noise(args[0], NOISE_SEED),
    };
    Ok(if out == 0.0 { 0.0 } else { out })
}

/// Half-turn in radians, re-exported for layout math.
pub const HALF_TURN: f64 = PI;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillators_cover_unit_interval() {
        for k in [
            SignalKernel::OscSin,
            SignalKernel::OscCos,
            SignalKernel::Triangle,
            SignalKernel::Square,
            SignalKernel::Sawtooth,
        ] {
            for i in 0..64 {
                let phase = f64::from(i) / 64.0;
                let v = eval_signal(k, &[phase]).unwrap();
                assert!((-1.0..=1.0).contains(&v), "{} at {phase} gave {v}", k.name());
            }
        }
    }

    #[test]
    fn easings_fix_endpoints() {
        for k in [
            SignalKernel::EaseInQuad,
            SignalKernel::EaseOutQuad,
            SignalKernel::EaseInOutQuad,
            SignalKernel::EaseInCubic,
            SignalKernel::EaseOutCubic,
            SignalKernel::EaseInOutCubic,
            SignalKernel::EaseInElastic,
            SignalKernel::EaseOutElastic,
            SignalKernel::EaseOutBounce,
        ] {
            assert!(eval_signal(k, &[0.0]).unwrap().abs() < 1e-9, "{}", k.name());
            assert!(
                (eval_signal(k, &[1.0]).unwrap() - 1.0).abs() < 1e-9,
                "{}",
                k.name()
            );
        }
    }

    #[test]
    fn triangle_hits_quarter_points() {
        assert!((eval_signal(SignalKernel::Triangle, &[0.25]).unwrap() - 1.0).abs() < 1e-12);
        assert!((eval_signal(SignalKernel::Triangle, &[0.75]).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn smoothstep_degenerate_edges() {
        assert_eq!(eval_signal(SignalKernel::Smoothstep, &[1.0, 1.0, 0.5]), Ok(0.0));
        assert_eq!(eval_signal(SignalKernel::Smoothstep, &[1.0, 1.0, 1.5]), Ok(1.0));
    }

    #[test]
    fn name_round_trip() {
        for k in [
            SignalKernel::OscSin,
            SignalKernel::Sawtooth,
            SignalKernel::EaseOutBounce,
            SignalKernel::Noise,
        ] {
            assert_eq!(SignalKernel::parse(k.name()), Some(k));
        }
    }
}
