// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render assembly: projection, depth sort, culling, draw-op packaging.
//!
//! The assembler is the lifetime-contract checkpoint: everything that goes
//! into a [`RenderFrameIR`] is copied into freshly allocated arrays, never
//! viewed out of pooled buffers. Geometry stays LOCAL-SPACE; instance
//! transforms are screen-space.

use blake3::Hasher;

use crate::ident::Hash;
use crate::ir::{CameraProjection, DrawTopology, PathGeometry, StyleSpec};

/// Wire version of [`RenderFrameIR`].
pub const RENDER_FRAME_VERSION: u32 = 2;

/// Per-instance screen-space transforms, compact over visible survivors.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceTransforms {
    /// Visible instance count.
    pub count: usize,
    /// Normalized screen positions, stride 2, `[0, 1]`.
    pub screen_position: Vec<f32>,
    /// Screen radii (doubles as uniform scale).
    pub screen_radius: Vec<f32>,
    /// RGBA colors, stride 4.
    pub color: Vec<f32>,
    /// Per-instance opacity, when wired.
    pub opacity: Option<Vec<f32>>,
    /// Per-instance rotation in radians, when wired.
    pub rotation: Option<Vec<f32>>,
    /// Depth after projection (back-to-front sorted).
    pub depth: Vec<f32>,
}

/// Local-space geometry payload of a path draw op.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpGeometry {
    /// Grouping key; one op per distinct topology.
    pub topology: u64,
    /// LOCAL-SPACE control points.
    pub points: Vec<[f32; 2]>,
    /// Whether the path closes.
    pub closed: bool,
}

/// One draw operation.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrawOp {
    /// Custom path geometry instanced across transforms.
    PathInstances {
        /// Local-space geometry.
        geometry: OpGeometry,
        /// Screen-space transforms.
        instances: InstanceTransforms,
        /// Style.
        style: StyleSpec,
    },
    /// Built-in primitive topology instanced across transforms.
    PrimitiveInstances {
        /// Primitive topology.
        topology: DrawTopology,
        /// Screen-space transforms.
        instances: InstanceTransforms,
        /// Style.
        style: StyleSpec,
    },
}

impl DrawOp {
    /// The transforms of either variant.
    #[must_use]
    pub fn instances(&self) -> &InstanceTransforms {
        match self {
            Self::PathInstances { instances, .. } | Self::PrimitiveInstances { instances, .. } => {
                instances
            }
        }
    }

    /// Stable kind tag used by hosts and the frame digest.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathInstances { .. } => "drawPathInstances",
            Self::PrimitiveInstances { .. } => "drawPrimitiveInstances",
        }
    }
}

/// Versioned per-frame draw-op package.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderFrameIR {
    /// Schema version (see [`RENDER_FRAME_VERSION`]).
    pub version: u32,
    /// Frame index.
    pub frame: u64,
    /// Draw operations in paint order.
    pub ops: Vec<DrawOp>,
}

/// Content digest of a frame, for determinism audits and replay checks.
#[must_use]
pub fn frame_digest(frame: &RenderFrameIR) -> Hash {
    fn lanes(h: &mut Hasher, lanes: &[f32]) {
        h.update(&(lanes.len() as u64).to_le_bytes());
        for v in lanes {
            h.update(&v.to_bits().to_le_bytes());
        }
    }
    fn transforms(h: &mut Hasher, t: &InstanceTransforms) {
        h.update(&(t.count as u64).to_le_bytes());
        lanes(h, &t.screen_position);
        lanes(h, &t.screen_radius);
        lanes(h, &t.color);
        lanes(h, &t.depth);
        match &t.opacity {
            None => {
                h.update(&[0]);
            }
            Some(o) => {
                h.update(&[1]);
                lanes(h, o);
            }
        }
        match &t.rotation {
            None => {
                h.update(&[0]);
            }
            Some(r) => {
                h.update(&[1]);
                lanes(h, r);
            }
        }
    }
    let mut h = Hasher::new();
    h.update(b"frame:");
    h.update(&frame.version.to_le_bytes());
    h.update(&frame.frame.to_le_bytes());
    h.update(&(frame.ops.len() as u64).to_le_bytes());
    for op in &frame.ops {
        h.update(op.kind().as_bytes());
        match op {
            DrawOp::PathInstances {
                geometry,
                instances,
                ..
            } => {
                h.update(&geometry.topology.to_le_bytes());
                h.update(&(geometry.points.len() as u64).to_le_bytes());
                for p in &geometry.points {
                    h.update(&p[0].to_bits().to_le_bytes());
                    h.update(&p[1].to_bits().to_le_bytes());
                }
                transforms(&mut h, instances);
            }
            DrawOp::PrimitiveInstances { instances, .. } => {
                transforms(&mut h, instances);
            }
        }
    }
    h.finalize().into()
}

/// Borrowed (possibly pooled) inputs to one draw-op assembly.
pub(crate) struct AssembleInputs<'a> {
    pub position: &'a [f64],
    pub pos_stride: usize,
    pub radius: &'a [f64],
    pub color: &'a [f64],
    pub opacity: Option<&'a [f64]>,
    pub rotation: Option<&'a [f64]>,
    pub count: usize,
    pub camera: CameraProjection,
    pub style: StyleSpec,
    pub topology: DrawTopology,
    pub geometry: Option<&'a PathGeometry>,
}

/// Margin beyond the unit viewport an instance may occupy before culling.
const CULL_MARGIN: f64 = 0.1;

/// Projects, sorts back-to-front, culls, and copies into an owned op.
///
/// Every output array is freshly allocated here; no view of the pooled
/// inputs survives this call.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn assemble_op(inputs: &AssembleInputs<'_>) -> DrawOp {
    let CameraProjection::Orthographic { center, zoom } = inputs.camera;
    let zoom = if zoom <= 0.0 { 1.0 } else { zoom };

    struct Projected {
        index: usize,
        sx: f64,
        sy: f64,
        sr: f64,
        depth: f64,
    }
    let mut visible: Vec<Projected> = Vec::with_capacity(inputs.count);
    for i in 0..inputs.count {
        let px = inputs.position[i * inputs.pos_stride];
        let py = inputs.position[i * inputs.pos_stride + 1];
        let pz = if inputs.pos_stride > 2 {
            inputs.position[i * inputs.pos_stride + 2]
        } else {
            0.0
        };
        let sx = 0.5 + (px - center[0]) * zoom;
        let sy = 0.5 + (py - center[1]) * zoom;
        let sr = inputs.radius[i].abs() * zoom;
        let margin = CULL_MARGIN + sr;
        if sx < -margin || sx > 1.0 + margin || sy < -margin || sy > 1.0 + margin {
            continue;
        }
        if !(sx.is_finite() && sy.is_finite()) {
            continue;
        }
        visible.push(Projected {
            index: i,
            sx,
            sy,
            sr,
            depth: pz,
        });
    }

    // Back-to-front; original index breaks ties so the order is total.
    visible.sort_by(|a, b| {
        b.depth
            .partial_cmp(&a.depth)
            .unwrap_or(core::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });

    let n = visible.len();
    let mut instances = InstanceTransforms {
        count: n,
        screen_position: Vec::with_capacity(n * 2),
        screen_radius: Vec::with_capacity(n),
        color: Vec::with_capacity(n * 4),
        opacity: inputs.opacity.map(|_| Vec::with_capacity(n)),
        rotation: inputs.rotation.map(|_| Vec::with_capacity(n)),
        depth: Vec::with_capacity(n),
    };
    for p in &visible {
        instances.screen_position.push(p.sx as f32);
        instances.screen_position.push(p.sy as f32);
        instances.screen_radius.push(p.sr as f32);
        for c in 0..4 {
            instances
                .color
                .push(inputs.color.get(p.index * 4 + c).copied().unwrap_or(1.0) as f32);
        }
        if let (Some(out), Some(src)) = (&mut instances.opacity, inputs.opacity) {
            out.push(src.get(p.index).copied().unwrap_or(1.0) as f32);
        }
        if let (Some(out), Some(src)) = (&mut instances.rotation, inputs.rotation) {
            out.push(src.get(p.index).copied().unwrap_or(0.0) as f32);
        }
        instances.depth.push(p.depth as f32);
    }

    match inputs.geometry {
        Some(shape) => DrawOp::PathInstances {
            geometry: OpGeometry {
                topology: shape.topology,
                points: shape
                    .points
                    .iter()
                    .map(|p| [p[0] as f32, p[1] as f32])
                    .collect(),
                closed: shape.closed,
            },
            instances,
            style: inputs.style.clone(),
        },
        None => DrawOp::PrimitiveInstances {
            topology: inputs.topology,
            instances,
            style: inputs.style.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(pos: &'a [f64], radius: &'a [f64], color: &'a [f64]) -> AssembleInputs<'a> {
        AssembleInputs {
            position: pos,
            pos_stride: 3,
            radius,
            color,
            opacity: None,
            rotation: None,
            count: pos.len() / 3,
            camera: CameraProjection::default(),
            style: StyleSpec::default(),
            topology: DrawTopology::Circle,
            geometry: None,
        }
    }

    #[test]
    fn offscreen_instances_are_culled_and_survivors_compact() {
        let pos = [0.5, 0.5, 0.0, 9.0, 9.0, 0.0, 0.25, 0.25, 0.0];
        let radius = [0.02; 3];
        let color = [1.0; 12];
        let op = assemble_op(&inputs(&pos, &radius, &color));
        let t = op.instances();
        assert_eq!(t.count, 2);
        assert_eq!(t.screen_position.len(), 4);
    }

    #[test]
    fn depth_sorts_back_to_front() {
        let pos = [0.5, 0.5, 0.1, 0.4, 0.4, 0.9, 0.6, 0.6, 0.5];
        let radius = [0.02; 3];
        let color = [1.0; 12];
        let op = assemble_op(&inputs(&pos, &radius, &color));
        let t = op.instances();
        assert_eq!(t.depth, vec![0.9_f32, 0.5, 0.1]);
    }

    #[test]
    fn digest_is_stable_and_sensitive() {
        let pos = [0.5, 0.5, 0.0];
        let radius = [0.02];
        let color = [1.0; 4];
        let op = assemble_op(&inputs(&pos, &radius, &color));
        let frame = RenderFrameIR {
            version: RENDER_FRAME_VERSION,
            frame: 1,
            ops: vec![op],
        };
        assert_eq!(frame_digest(&frame), frame_digest(&frame.clone()));
        let mut other = frame.clone();
        other.frame = 2;
        assert_ne!(frame_digest(&frame), frame_digest(&other));
    }
}
