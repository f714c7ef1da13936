// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layer C: field kernels — buffer operations, coordinate-space agnostic.
//!
//! Elementwise kernels run per lane via `map`/`zip`/`zipSig` with a
//! [`LaneCtx`] describing the lane's place in its instance. Layout functions
//! produce WORLD-SPACE unit-normalized positions; [`polygon_vertex`]
//! produces LOCAL-SPACE control points centered at the origin.

use core::f64::consts::TAU;

use super::hash::{lane_hash, to_unit};
use super::opcode::KernelError;

/// Golden angle in radians, `π(3 − √5)`.
pub const GOLDEN_ANGLE: f64 = 2.399963229728653;

/// Per-lane evaluation context.
#[derive(Clone, Copy, Debug)]
pub struct LaneCtx {
    /// Lane index within the instance.
    pub index: usize,
    /// Instance element count.
    pub count: usize,
    /// Instance-derived deterministic seed.
    pub seed: u64,
}

impl LaneCtx {
    /// Normalized index `i / (count − 1)`; a single-element instance
    /// normalizes to 0.
    #[must_use]
    pub fn normalized(&self) -> f64 {
        if self.count <= 1 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let v = self.index as f64 / (self.count - 1) as f64;
            v
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn centered(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.index as f64 + 0.5) / self.count as f64
        }
    }
}

/// Field kernel. Closed set; dispatch is an enum match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKernel {
    /// `(x, y) → vec2`.
    MakeVec2,
    /// `(x, y, z) → vec3`.
    MakeVec3,
    /// `(angle radians, radius) → vec2`.
    PolarToCartesian,
    /// `vec2 → vec2 (angle radians, radius)`.
    CartesianToPolar,
    /// `vec3 (h, s, v) → color` (alpha 1).
    HsvToRgb,
    /// `(color, opacity) → color` with alpha scaled.
    ApplyOpacity,
    /// `(vec3 position, amount) → vec3` deterministic per-lane jitter of
    /// the x/y components.
    Jitter2d,
    /// `(base, phase) → float` traveling pulse across the instance.
    FieldPulse,
    /// `(angle radians, amount) → angle + amount · index`.
    FieldAngularOffset,
    /// `radius → radius · sqrt((i + ½)/count)` for even-area discs.
    FieldRadiusSqrt,
    /// `scale → angle radians = i · goldenAngle · scale`.
    FieldGoldenAngle,
    /// `phase → color` hue wheel offset by normalized index.
    FieldHueFromPhase,
    /// `(top, bottom) → color` source-over compositing.
    LayerColor,
}

impl FieldKernel {
    /// Stable camelCase name used in patches and diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MakeVec2 => "makeVec2",
            Self::MakeVec3 => "makeVec3",
            Self::PolarToCartesian => "polarToCartesian",
            Self::CartesianToPolar => "cartesianToPolar",
            Self::HsvToRgb => "hsvToRgb",
            Self::ApplyOpacity => "applyOpacity",
            Self::Jitter2d => "jitter2d",
            Self::FieldPulse => "fieldPulse",
            Self::FieldAngularOffset => "fieldAngularOffset",
            Self::FieldRadiusSqrt => "fieldRadiusSqrt",
            Self::FieldGoldenAngle => "fieldGoldenAngle",
            Self::FieldHueFromPhase => "fieldHueFromPhase",
            Self::LayerColor => "layerColor",
        }
    }

    /// Number of input buffers.
    #[must_use]
    pub fn arg_count(self) -> usize {
        match self {
            Self::MakeVec3 => 3,
            Self::MakeVec2
            | Self::PolarToCartesian
            | Self::ApplyOpacity
            | Self::Jitter2d
            | Self::FieldPulse
            | Self::FieldAngularOffset
            | Self::LayerColor => 2,
            Self::CartesianToPolar
            | Self::HsvToRgb
            | Self::FieldRadiusSqrt
            | Self::FieldGoldenAngle
            | Self::FieldHueFromPhase => 1,
        }
    }

    /// Output lane stride.
    #[must_use]
    pub fn out_stride(self) -> u32 {
        match self {
            Self::MakeVec3 | Self::Jitter2d => 3,
            Self::HsvToRgb | Self::ApplyOpacity | Self::FieldHueFromPhase | Self::LayerColor => 4,
            Self::MakeVec2 | Self::PolarToCartesian | Self::CartesianToPolar => 2,
            Self::FieldPulse
            | Self::FieldAngularOffset
            | Self::FieldRadiusSqrt
            | Self::FieldGoldenAngle => 1,
        }
    }
}

/// Converts HSV (all components in `[0, 1]`) to RGB.
#[must_use]
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    let h = (h - h.floor()) * 6.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = i as u8;
    match sector {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Evaluates one lane of a field kernel.
///
/// `ins[k]` is the k-th input's element slice (length = that input's
/// stride); `out` is the output element slice. Stride agreement is the
/// caller's responsibility; the materializer derives both from the kernel
/// signature before the lane loop.
pub fn eval_field_lane(
    kernel: FieldKernel,
    ins: &[&[f64]],
    out: &mut [f64],
    ctx: &LaneCtx,
) -> Result<(), KernelError> {
    if ins.len() != kernel.arg_count() {
        return Err(KernelError::Arity {
            op: kernel.name(),
            expected: match kernel.arg_count() {
                3 => "3",
                2 => "2",
                _ => "1",
            },
            got: ins.len(),
        });
    }
    #[allow(clippy::cast_precision_loss)]
    let index_f = ctx.index as f64;
    match kernel {
        FieldKernel::MakeVec2 => {
            out[0] = ins[0][0];
            out[1] = ins[1][0];
        }
        FieldKernel::MakeVec3 => {
            out[0] = ins[0][0];
            out[1] = ins[1][0];
            out[2] = ins[2][0];
        }
        FieldKernel::PolarToCartesian => {
            let (angle, radius) = (ins[0][0], ins[1][0]);
            out[0] = radius * libm::cos(angle);
            out[1] = radius * libm::sin(angle);
        }
        FieldKernel::CartesianToPolar => {
            let (x, y) = (ins[0][0], ins[0][1]);
            out[0] = libm::atan2(y, x);
            out[1] = libm::sqrt(x * x + y * y);
        }
        FieldKernel::HsvToRgb => {
            let rgb = hsv_to_rgb(ins[0][0], ins[0][1].clamp(0.0, 1.0), ins[0][2].clamp(0.0, 1.0));
            out[0] = rgb[0];
            out[1] = rgb[1];
            out[2] = rgb[2];
            out[3] = 1.0;
        }
        FieldKernel::ApplyOpacity => {
            out[0] = ins[0][0];
            out[1] = ins[0][1];
            out[2] = ins[0][2];
            out[3] = ins[0][3] * ins[1][0].clamp(0.0, 1.0);
        }
        FieldKernel::Jitter2d => {
            let amount = ins[1][0];
            let hx = to_unit(lane_hash(ctx.seed, (ctx.index as u64) << 1)) - 0.5;
            let hy = to_unit(lane_hash(ctx.seed, ((ctx.index as u64) << 1) | 1)) - 0.5;
            out[0] = ins[0][0] + hx * amount;
            out[1] = ins[0][1] + hy * amount;
            out[2] = ins[0][2];
        }
        FieldKernel::FieldPulse => {
            let (base, phase) = (ins[0][0], ins[1][0]);
            out[0] = base * (0.5 + 0.5 * libm::sin(TAU * phase - TAU * ctx.normalized()));
        }
        FieldKernel::FieldAngularOffset => {
            out[0] = ins[0][0] + ins[1][0] * index_f;
        }
        FieldKernel::FieldRadiusSqrt => {
            out[0] = ins[0][0] * libm::sqrt(ctx.centered());
        }
        FieldKernel::FieldGoldenAngle => {
            out[0] = index_f * GOLDEN_ANGLE * ins[0][0];
        }
        FieldKernel::FieldHueFromPhase => {
            let h = ins[0][0] + ctx.normalized();
            let rgb = hsv_to_rgb(h - h.floor(), 1.0, 1.0);
            out[0] = rgb[0];
            out[1] = rgb[1];
            out[2] = rgb[2];
            out[3] = 1.0;
        }
        FieldKernel::LayerColor => {
            let (top, bottom) = (ins[0], ins[1]);
            let keep = 1.0 - top[3];
            out[0] = top[0] + bottom[0] * keep;
            out[1] = top[1] + bottom[1] * keep;
            out[2] = top[2] + bottom[2] * keep;
            out[3] = top[3] + bottom[3] * keep;
        }
    }
    for v in out.iter_mut() {
        // Rewrites -0.0 as +0.0; signed zero would leak into frame hashes.
        if *v == 0.0 {
            *v = 0.0;
        }
    }
    Ok(())
}

/// Grid layout: row-major cells, cell-centered, world-space `[0, 1]²`, z 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn grid_layout(index: usize, rows: usize, cols: usize) -> [f64; 3] {
    let cols = cols.max(1);
    let rows = rows.max(1);
    let col = index % cols;
    let row = (index / cols) % rows;
    [
        (col as f64 + 0.5) / cols as f64,
        (row as f64 + 0.5) / rows as f64,
        0.0,
    ]
}

/// Line layout from `from` to `to`, world-space; a single element sits at
/// `from`.
#[must_use]
pub fn line_layout(ctx: &LaneCtx, from: [f64; 2], to: [f64; 2]) -> [f64; 3] {
    let t = ctx.normalized();
    [
        from[0] + (to[0] - from[0]) * t,
        from[1] + (to[1] - from[1]) * t,
        0.0,
    ]
}

/// Circle layout: evenly spaced on a circle, world-space, starting at the
/// positive x axis.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn circle_layout(index: usize, count: usize, center: [f64; 2], radius: f64) -> [f64; 3] {
    let count = count.max(1);
    let angle = TAU * index as f64 / count as f64;
    [
        center[0] + radius * libm::cos(angle),
        center[1] + radius * libm::sin(angle),
        0.0,
    ]
}

/// Polygon control point `index` of an `sides`-gon, LOCAL-SPACE, centered at
/// the origin, first vertex at the top.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn polygon_vertex(index: usize, sides: usize, rx: f64, ry: f64) -> [f64; 2] {
    let sides = sides.max(3);
    let angle = TAU * index as f64 / sides as f64 - TAU / 4.0;
    [rx * libm::cos(angle), ry * libm::sin(angle)]
}

/// Which derivative [`path_derive`] produces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathDeriveKind {
    /// Unit tangent per control point (stride 2).
    Tangent,
    /// Unit normal per control point (stride 2).
    Normal,
    /// Cumulative arc length per control point (stride 1).
    ArcLength,
}

impl PathDeriveKind {
    /// Output lane stride.
    #[must_use]
    pub fn stride(self) -> u32 {
        match self {
            Self::Tangent | Self::Normal => 2,
            Self::ArcLength => 1,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Tangent => "tangent",
            Self::Normal => "normal",
            Self::ArcLength => "arcLength",
        }
    }
}

/// Computes per-control-point path derivatives over a polyline.
///
/// Tangents use central differences (wrapping when `closed`); normals are
/// tangents rotated a quarter turn; arc length accumulates segment lengths
/// from point 0. Degenerate (zero-length) differences produce a zero
/// tangent rather than NaN.
#[must_use]
pub fn path_derive(points: &[[f64; 2]], closed: bool, kind: PathDeriveKind) -> Vec<f64> {
    let n = points.len();
    let stride = kind.stride() as usize;
    let mut out = vec![0.0; n * stride];
    if n == 0 {
        return out;
    }
    match kind {
        PathDeriveKind::Tangent | PathDeriveKind::Normal => {
            for i in 0..n {
                let prev = if i == 0 {
                    if closed {
                        points[n - 1]
                    } else {
                        points[0]
                    }
                } else {
                    points[i - 1]
                };
                let next = if i + 1 == n {
                    if closed {
                        points[0]
                    } else {
                        points[n - 1]
                    }
                } else {
                    points[i + 1]
                };
                let dx = next[0] - prev[0];
                let dy = next[1] - prev[1];
                let len = libm::sqrt(dx * dx + dy * dy);
                let (tx, ty) = if len > 0.0 {
                    (dx / len, dy / len)
                } else {
                    (0.0, 0.0)
                };
                match kind {
                    PathDeriveKind::Tangent => {
                        out[i * 2] = tx;
                        out[i * 2 + 1] = ty;
                    }
                    PathDeriveKind::Normal => {
                        out[i * 2] = -ty;
                        out[i * 2 + 1] = tx;
                    }
                    PathDeriveKind::ArcLength => {}
                }
            }
        }
        PathDeriveKind::ArcLength => {
            let mut acc = 0.0;
            for i in 1..n {
                let dx = points[i][0] - points[i - 1][0];
                let dy = points[i][1] - points[i - 1][1];
                acc += libm::sqrt(dx * dx + dy * dy);
                out[i] = acc;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(index: usize, count: usize) -> LaneCtx {
        LaneCtx {
            index,
            count,
            seed: 99,
        }
    }

    #[test]
    fn grid_is_regular_and_inside_unit_square() {
        for i in 0..16 {
            let p = grid_layout(i, 4, 4);
            assert!((0.0..=1.0).contains(&p[0]));
            assert!((0.0..=1.0).contains(&p[1]));
        }
        assert_eq!(grid_layout(0, 4, 4), [0.125, 0.125, 0.0]);
        assert_eq!(grid_layout(5, 4, 4), [0.375, 0.375, 0.0]);
    }

    #[test]
    fn single_element_line_sits_at_origin_point() {
        let p = line_layout(&ctx(0, 1), [0.2, 0.3], [0.8, 0.9]);
        assert_eq!(p, [0.2, 0.3, 0.0]);
    }

    #[test]
    fn jitter_is_deterministic_per_lane() {
        let pos = [0.5, 0.5, 0.25];
        let amount = [0.1];
        let mut a = [0.0; 3];
        let mut b = [0.0; 3];
        let c = ctx(3, 8);
        eval_field_lane(FieldKernel::Jitter2d, &[&pos, &amount], &mut a, &c).unwrap();
        eval_field_lane(FieldKernel::Jitter2d, &[&pos, &amount], &mut b, &c).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[2], 0.25);
        let mut other = [0.0; 3];
        eval_field_lane(FieldKernel::Jitter2d, &[&pos, &amount], &mut other, &ctx(4, 8)).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let g = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((g[1] - 1.0).abs() < 1e-12 && g[0] < 1e-9 && g[2] < 1e-9);
    }

    #[test]
    fn arc_length_accumulates() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let len = path_derive(&square, true, PathDeriveKind::ArcLength);
        assert_eq!(len, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn closed_path_tangent_wraps() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let t = path_derive(&square, true, PathDeriveKind::Tangent);
        // Point 0's central difference spans point 3 to point 1.
        assert!((t[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((t[1] + std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }
}
