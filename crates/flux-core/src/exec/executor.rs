// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-frame executor: scalar sweep, event dispatch, field
//! materialization, continuity, render assembly.
//!
//! A frame runs to completion without yielding. Kernel failures mark the
//! affected slot with a diagnostic and the frame continues; the renderer
//! always receives a well-formed (possibly degraded) frame.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::continuity::{ContinuityStore, SemanticTag};
use crate::diag::{codes, DiagDomain, DiagTarget, Diagnostic, Severity};
use crate::ir::{
    CameraProjection, FieldExpr, FieldId, InstanceId, Intrinsic, LayoutSpec, ObjectValue,
    PathGeometry, PureFn, RenderBinding, ScheduleStep, SlotId, SlotStorage, ValueExpr,
    ValueExprId, ZipArg,
};
use crate::kernel::{
    circle_layout, eval_field_lane, eval_opcode, eval_signal, grid_layout, lane_hash, line_layout,
    path_derive, seed_from_hash, to_unit, KernelError, LaneCtx, Opcode,
};
use crate::render::{assemble_op, AssembleInputs, RenderFrameIR, RENDER_FRAME_VERSION};
use crate::types::Payload;
use crate::CompiledProgram;

use super::pool::{BufferPool, PoolBuffer, PoolStats};

/// Componentwise opcode application with stride-1 broadcasting.
fn opcode_lanes(op: Opcode, args: &[Vec<f64>]) -> Result<Vec<f64>, KernelError> {
    let out_len = args.iter().map(Vec::len).max().unwrap_or(1);
    let mut out = vec![0.0; out_len];
    let mut scratch: Vec<f64> = Vec::with_capacity(args.len());
    for c in 0..out_len {
        scratch.clear();
        for a in args {
            scratch.push(if a.len() == 1 {
                a[0]
            } else {
                a.get(c).copied().unwrap_or(0.0)
            });
        }
        out[c] = eval_opcode(op, &scratch)?;
    }
    Ok(out)
}

/// Slice view of one element with stride-1 broadcasting.
fn element<'a>(lanes: &'a [f64], stride: usize, index: usize) -> &'a [f64] {
    if stride == 0 || lanes.len() == stride {
        lanes
    } else {
        &lanes[index * stride..(index + 1) * stride]
    }
}

/// Drives a [`CompiledProgram`] frame by frame.
#[derive(Debug)]
pub struct Executor {
    program: Arc<CompiledProgram>,
    plane: Vec<f64>,
    objects: Vec<Option<ObjectValue>>,
    shapes: Vec<Option<PathGeometry>>,
    states: Vec<Vec<f64>>,
    events: Vec<bool>,
    cameras: FxHashMap<u32, CameraProjection>,
    pool: BufferPool,
    fields: FxHashMap<u32, PoolBuffer>,
    frame: u64,
    t_ms: f64,
    dt_ceiling_ms: f64,
    last_frame: Option<RenderFrameIR>,
    frame_diags: Vec<Diagnostic>,
}

impl Executor {
    /// Builds an executor over a program with the given dt ceiling.
    #[must_use]
    pub fn new(program: Arc<CompiledProgram>, dt_ceiling_ms: f64) -> Self {
        let mut objects = vec![None; program.object_len];
        let mut shapes = vec![None; program.shape_len];
        for (slot, value) in &program.object_init {
            let meta = &program.slots[slot.0 as usize];
            match (meta.storage, value) {
                (SlotStorage::Shape2d, ObjectValue::Shape(shape)) => {
                    shapes[meta.offset as usize] = Some(shape.clone());
                }
                (SlotStorage::Object, v) => {
                    objects[meta.offset as usize] = Some(v.clone());
                }
                _ => {
                    debug_assert!(false, "object init does not match slot storage");
                }
            }
        }
        let states = program
            .states
            .iter()
            .map(|s| s.initial.clone())
            .collect();
        Self {
            plane: vec![0.0; program.f64_len],
            objects,
            shapes,
            states,
            events: vec![false; program.event_count],
            cameras: FxHashMap::default(),
            pool: BufferPool::new(),
            fields: FxHashMap::default(),
            frame: 0,
            t_ms: 0.0,
            dt_ceiling_ms,
            last_frame: None,
            frame_diags: Vec::new(),
            program,
        }
    }

    /// The program this executor drives.
    #[must_use]
    pub fn program(&self) -> &Arc<CompiledProgram> {
        &self.program
    }

    /// Accumulated time in milliseconds.
    #[must_use]
    pub fn time_ms(&self) -> f64 {
        self.t_ms
    }

    /// Frames executed so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Pool statistics for host diagnostics.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Copy of the most recent frame, if any.
    #[must_use]
    pub fn snapshot_frame(&self) -> Option<RenderFrameIR> {
        self.last_frame.clone()
    }

    fn slot_span(&self, slot: SlotId) -> (usize, usize) {
        let meta = &self.program.slots[slot.0 as usize];
        (meta.offset as usize, meta.stride as usize)
    }

    fn read_slot(&self, slot: SlotId) -> Vec<f64> {
        let (offset, stride) = self.slot_span(slot);
        self.plane[offset..offset + stride].to_vec()
    }

    fn write_slot(&mut self, slot: SlotId, lanes: &[f64]) {
        let (offset, stride) = self.slot_span(slot);
        for c in 0..stride {
            self.plane[offset + c] = lanes.get(c).copied().unwrap_or_else(|| {
                lanes.first().copied().unwrap_or(0.0)
            });
        }
    }

    fn shape_at(&self, slot: SlotId) -> Option<&PathGeometry> {
        let meta = &self.program.slots[slot.0 as usize];
        match meta.storage {
            SlotStorage::Shape2d => self.shapes[meta.offset as usize].as_ref(),
            _ => None,
        }
    }

    fn camera_at(&self, slot: SlotId) -> Option<CameraProjection> {
        let meta = &self.program.slots[slot.0 as usize];
        match (meta.storage, self.objects.get(meta.offset as usize)) {
            (SlotStorage::Object, Some(Some(ObjectValue::Camera(c)))) => Some(*c),
            _ => None,
        }
    }

    fn runtime_diag(&mut self, code: &'static str, message: String) {
        self.frame_diags.push(Diagnostic::new(
            code,
            Severity::Warn,
            DiagDomain::Runtime,
            DiagTarget::Frame(self.frame),
            "runtime kernel fault",
            message,
        ));
    }

    /// Advances one frame and returns the assembled frame IR.
    pub fn advance(&mut self, dt_ms: f64, continuity: &mut ContinuityStore) -> &RenderFrameIR {
        let dt = dt_ms.clamp(0.0, self.dt_ceiling_ms);
        self.frame += 1;
        self.t_ms += dt;
        self.frame_diags.clear();
        self.events.iter_mut().for_each(|e| *e = false);
        self.cameras.clear();

        // 1. Advance time.
        let time = self.program.time;
        self.write_slot(time.t_ms, &[self.t_ms]);
        let phase_a = (self.t_ms / time.period_a_ms).fract();
        let phase_b = (self.t_ms / time.period_b_ms).fract();
        self.write_slot(time.phase_a, &[phase_a]);
        self.write_slot(time.phase_b, &[phase_b]);

        // 2..7. Walk the schedule.
        let program = Arc::clone(&self.program);
        let mut ops = Vec::new();
        for step in &program.schedule {
            match step {
                ScheduleStep::StateRead { slot, state } => {
                    let lanes = self.states[state.0 as usize].clone();
                    self.write_slot(*slot, &lanes);
                }
                ScheduleStep::EvalSig { slot, expr } => match self.eval_value(*expr) {
                    Ok(lanes) => self.write_slot(*slot, &lanes),
                    Err(err) => self.runtime_diag(codes::P_KERNEL_ARITY, err.to_string()),
                },
                ScheduleStep::Event { event, expr } => match self.eval_value(*expr) {
                    Ok(lanes) => {
                        if lanes.first().copied().unwrap_or(0.0) > 0.0 {
                            self.events[event.0 as usize] = true;
                        }
                    }
                    Err(err) => self.runtime_diag(codes::P_KERNEL_ARITY, err.to_string()),
                },
                ScheduleStep::Materialize { field, instance } => {
                    if let Err(err) = self.materialize_field(*field, *instance) {
                        self.runtime_diag(codes::P_KERNEL_ARITY, err.to_string());
                    }
                }
                ScheduleStep::StateWrite { state, slot } => {
                    let lanes = self.read_slot(*slot);
                    self.states[state.0 as usize] = lanes;
                }
                ScheduleStep::Projection { instance, camera } => {
                    let projection = camera
                        .and_then(|slot| self.camera_at(slot))
                        .unwrap_or_default();
                    self.cameras.insert(instance.0, projection);
                }
                ScheduleStep::Render(binding) => {
                    if let Some(op) = self.render_op(binding, continuity, dt) {
                        ops.push(op);
                    }
                }
            }
        }

        // NaN probe over the numeric plane.
        for meta in &program.slots {
            if meta.storage != SlotStorage::F64 {
                continue;
            }
            let offset = meta.offset as usize;
            let lanes = &self.plane[offset..offset + meta.stride as usize];
            if lanes.iter().any(|v| v.is_nan()) {
                self.frame_diags.push(Diagnostic::new(
                    codes::P_NAN_DETECTED,
                    Severity::Warn,
                    DiagDomain::Runtime,
                    DiagTarget::Frame(self.frame),
                    "NaN detected",
                    format!("slot {} holds NaN after the evaluation sweep", meta.slot.0),
                ));
                break;
            }
        }

        // 8. Every pooled buffer goes back at frame end.
        let buffers: Vec<PoolBuffer> = self.fields.drain().map(|(_, b)| b).collect();
        self.pool.release_all(buffers);

        self.last_frame = Some(RenderFrameIR {
            version: RENDER_FRAME_VERSION,
            frame: self.frame,
            ops,
        });
        self.last_frame.as_ref().unwrap_or(&EMPTY_FRAME)
    }

    /// Diagnostics raised during the most recent frame.
    #[must_use]
    pub fn frame_diagnostics(&self) -> &[Diagnostic] {
        &self.frame_diags
    }

    fn instance_count(&self, instance: InstanceId) -> usize {
        self.program.instance_count(instance)
    }

    fn instance_seed(&self, instance: InstanceId) -> u64 {
        seed_from_hash(&self.program.instances[instance.0 as usize].id_domain)
    }

    fn field_lanes(&self, field: FieldId) -> Option<&[f64]> {
        self.fields.get(&field.0).map(PoolBuffer::lanes)
    }

    fn eval_value(&mut self, id: ValueExprId) -> Result<Vec<f64>, KernelError> {
        let expr = self.program.value_exprs[id.0 as usize].clone();
        match expr {
            ValueExpr::Const { lanes } => Ok(lanes),
            ValueExpr::ReadSlot(slot) => Ok(self.read_slot(slot)),
            ValueExpr::Opcode { op, args } => {
                let mut lanes = Vec::with_capacity(args.len());
                for a in args {
                    lanes.push(self.eval_value(a)?);
                }
                opcode_lanes(op, &lanes)
            }
            ValueExpr::Kernel { kernel, args } => {
                let mut scalars = Vec::with_capacity(args.len());
                for a in args {
                    scalars.push(self.eval_value(a)?.first().copied().unwrap_or(0.0));
                }
                Ok(vec![eval_signal(kernel, &scalars)?])
            }
            ValueExpr::Pack { args } => {
                let mut lanes = Vec::with_capacity(args.len());
                for a in args {
                    lanes.extend(self.eval_value(a)?);
                }
                Ok(lanes)
            }
            ValueExpr::FieldFn { kernel, args } => {
                let mut arg_lanes = Vec::with_capacity(args.len());
                for a in args {
                    arg_lanes.push(self.eval_value(a)?);
                }
                let slices: Vec<&[f64]> = arg_lanes.iter().map(Vec::as_slice).collect();
                let mut out = vec![0.0; kernel.out_stride() as usize];
                eval_field_lane(
                    kernel,
                    &slices,
                    &mut out,
                    &LaneCtx {
                        index: 0,
                        count: 1,
                        seed: 0,
                    },
                )?;
                Ok(out)
            }
            ValueExpr::SelectFromField { field, index } => {
                let instance = self.program.field_instance[field.0 as usize];
                if let Some(instance) = instance {
                    self.materialize_field(field, instance)?;
                }
                let idx = self.eval_value(index)?.first().copied().unwrap_or(0.0);
                let stride = self.program.field_stride(field) as usize;
                let lanes = self.field_lanes(field).unwrap_or(&[]);
                let count = lanes.len() / stride.max(1);
                if count == 0 {
                    return Ok(vec![0.0; stride]);
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let i = (idx.floor().max(0.0) as usize).min(count - 1);
                Ok(lanes[i * stride..(i + 1) * stride].to_vec())
            }
            ValueExpr::Reduce { field, op } => {
                let instance = self.program.field_instance[field.0 as usize];
                if let Some(instance) = instance {
                    self.materialize_field(field, instance)?;
                }
                let stride = self.program.field_stride(field) as usize;
                let lanes = self.field_lanes(field).unwrap_or(&[]).to_vec();
                let count = lanes.len() / stride.max(1);
                let mut out = vec![0.0; stride];
                if count == 0 {
                    return Ok(out);
                }
                #[allow(clippy::cast_precision_loss)]
                let count_f = count as f64;
                for c in 0..stride {
                    let column = (0..count).map(|i| lanes[i * stride + c]);
                    out[c] = match op {
                        crate::ir::ReduceOp::Sum => column.sum(),
                        crate::ir::ReduceOp::Average => column.sum::<f64>() / count_f,
                        crate::ir::ReduceOp::Min => column.fold(f64::INFINITY, f64::min),
                        crate::ir::ReduceOp::Max => column.fold(f64::NEG_INFINITY, f64::max),
                    };
                }
                Ok(out)
            }
            ValueExpr::CrossingEvent {
                signal,
                threshold,
                hysteresis,
                state,
            } => {
                let current = self.eval_value(signal)?.first().copied().unwrap_or(0.0);
                let mem = &mut self.states[state.0 as usize];
                let prev = mem[0];
                let mut armed = mem[1] > 0.0;
                let mut fired = false;
                if prev.is_nan() {
                    // First frame: observe only.
                    armed = true;
                } else {
                    if armed && prev < threshold && current >= threshold {
                        fired = true;
                        armed = false;
                    }
                    if !armed && current <= threshold - hysteresis {
                        armed = true;
                    }
                }
                mem[0] = current;
                mem[1] = f64::from(u8::from(armed));
                Ok(vec![f64::from(u8::from(fired))])
            }
            ValueExpr::Hold {
                event,
                value,
                initial: _,
                state,
            } => {
                if self.events[event.0 as usize] {
                    let sampled = self.eval_value(value)?;
                    let mem = &mut self.states[state.0 as usize];
                    for (c, slot) in mem.iter_mut().enumerate() {
                        *slot = sampled.get(c).copied().unwrap_or(0.0);
                    }
                }
                Ok(self.states[state.0 as usize].clone())
            }
            ValueExpr::PathDerivativeAt { geometry, kind, t } => {
                let param = self.eval_value(t)?.first().copied().unwrap_or(0.0);
                let Some(shape) = self.shape_at(geometry) else {
                    return Ok(vec![0.0; kind.stride() as usize]);
                };
                let derived = path_derive(&shape.points, shape.closed, kind);
                let stride = kind.stride() as usize;
                let n = shape.points.len();
                if n == 0 {
                    return Ok(vec![0.0; stride]);
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let i = ((param.clamp(0.0, 1.0) * (n - 1) as f64).round() as usize).min(n - 1);
                Ok(derived[i * stride..(i + 1) * stride].to_vec())
            }
        }
    }

    /// Materializes a field into the frame cache, once per frame.
    fn materialize_field(
        &mut self,
        field: FieldId,
        instance: InstanceId,
    ) -> Result<(), KernelError> {
        if self.fields.contains_key(&field.0) {
            return Ok(());
        }
        let expr = self.program.field_exprs[field.0 as usize].clone();
        let count = self.instance_count(instance);
        let payload = self.program.field_types[field.0 as usize]
            .payload
            .value()
            .unwrap_or(Payload::Float);
        let stride = payload.stride() as usize;
        let seed = self.instance_seed(instance);

        // Materialize dependencies before acquiring the output buffer so
        // the cache reads below never alias the write target.
        match &expr {
            FieldExpr::Map { src, .. } => {
                let dep_instance = self.program.field_instance[src.0 as usize].unwrap_or(instance);
                self.materialize_field(*src, dep_instance)?;
            }
            FieldExpr::Zip { srcs, .. } => {
                for src in srcs {
                    let dep = self.program.field_instance[src.0 as usize].unwrap_or(instance);
                    self.materialize_field(*src, dep)?;
                }
            }
            FieldExpr::ZipSig { args, .. } => {
                for arg in args {
                    if let ZipArg::Field(src) = arg {
                        let dep =
                            self.program.field_instance[src.0 as usize].unwrap_or(instance);
                        self.materialize_field(*src, dep)?;
                    }
                }
            }
            _ => {}
        }

        let mut out = self.pool.acquire(payload, count);
        match expr {
            FieldExpr::Const { lanes } => {
                for i in 0..count {
                    for c in 0..stride {
                        out.lanes_mut()[i * stride + c] = lanes.get(c).copied().unwrap_or(0.0);
                    }
                }
            }
            FieldExpr::Broadcast { signal } => {
                let lanes = self.read_slot(signal);
                for i in 0..count {
                    for c in 0..stride {
                        out.lanes_mut()[i * stride + c] = lanes.get(c).copied().unwrap_or(0.0);
                    }
                }
            }
            FieldExpr::Intrinsic { instance, which } => {
                let decl = &self.program.instances[instance.0 as usize];
                for i in 0..count {
                    #[allow(clippy::cast_precision_loss)]
                    let value = match which {
                        Intrinsic::Index => i as f64,
                        Intrinsic::NormalizedIndex => {
                            if count <= 1 {
                                0.0
                            } else {
                                i as f64 / (count - 1) as f64
                            }
                        }
                        Intrinsic::RandomId => to_unit(lane_hash(seed, i as u64)),
                        Intrinsic::Position | Intrinsic::Radius => {
                            // Layout-backed intrinsics appear below through
                            // the Layout expression; reaching here without
                            // a layout degrades to zero.
                            match (&decl.layout, which) {
                                (Some(spec), Intrinsic::Position) => {
                                    let p = layout_position(spec, i, count);
                                    for c in 0..stride.min(3) {
                                        out.lanes_mut()[i * stride + c] = p[c];
                                    }
                                    continue;
                                }
                                _ => 0.0,
                            }
                        }
                    };
                    out.lanes_mut()[i * stride] = value;
                }
            }
            FieldExpr::Layout { instance } => {
                let decl = &self.program.instances[instance.0 as usize];
                let Some(spec) = decl.layout.clone() else {
                    return Err(KernelError::Arity {
                        op: "layout",
                        expected: "an instance with a layout",
                        got: 0,
                    });
                };
                for i in 0..count {
                    let p = layout_position(&spec, i, count);
                    for c in 0..stride.min(3) {
                        out.lanes_mut()[i * stride + c] = p[c];
                    }
                }
            }
            FieldExpr::Map { src, f } => {
                let src_stride = self.program.field_stride(src) as usize;
                let src_lanes = self.field_lanes(src).unwrap_or(&[]).to_vec();
                match f {
                    PureFn::Opcode(op) => {
                        for i in 0..count {
                            let elem = element(&src_lanes, src_stride, i);
                            for c in 0..stride {
                                let v = elem.get(c).copied().or_else(|| elem.first().copied());
                                out.lanes_mut()[i * stride + c] =
                                    eval_opcode(op, &[v.unwrap_or(0.0)])?;
                            }
                        }
                    }
                    PureFn::Kernel(kernel) => {
                        if kernel.arg_count() != 1 {
                            return Err(KernelError::MapArity(kernel.name()));
                        }
                        for i in 0..count {
                            let elem = element(&src_lanes, src_stride, i);
                            let mut lane_out = vec![0.0; stride];
                            eval_field_lane(
                                kernel,
                                &[elem],
                                &mut lane_out,
                                &LaneCtx {
                                    index: i,
                                    count,
                                    seed,
                                },
                            )?;
                            out.lanes_mut()[i * stride..(i + 1) * stride]
                                .copy_from_slice(&lane_out);
                        }
                    }
                }
            }
            FieldExpr::Zip { srcs, f } => {
                let inputs: Vec<(Vec<f64>, usize)> = srcs
                    .iter()
                    .map(|s| {
                        (
                            self.field_lanes(*s).unwrap_or(&[]).to_vec(),
                            self.program.field_stride(*s) as usize,
                        )
                    })
                    .collect();
                self.zip_lanes(&inputs, f, count, stride, seed, out.lanes_mut())?;
            }
            FieldExpr::ZipSig { args, f } => {
                let mut inputs: Vec<(Vec<f64>, usize)> = Vec::with_capacity(args.len());
                for arg in &args {
                    match arg {
                        ZipArg::Field(s) => inputs.push((
                            self.field_lanes(*s).unwrap_or(&[]).to_vec(),
                            self.program.field_stride(*s) as usize,
                        )),
                        ZipArg::Sig(slot) => {
                            let lanes = self.read_slot(*slot);
                            let len = lanes.len();
                            inputs.push((lanes, len));
                        }
                    }
                }
                // Signals carry stride == their full length, so `element`
                // broadcasts them to every lane.
                self.zip_lanes(&inputs, f, count, stride, seed, out.lanes_mut())?;
            }
            FieldExpr::PathDerivative {
                geometry,
                instance: _,
                kind,
            } => {
                if let Some(shape) = self.shape_at(geometry) {
                    let derived = path_derive(&shape.points, shape.closed, kind);
                    let lanes = out.lanes_mut();
                    let n = lanes.len().min(derived.len());
                    lanes[..n].copy_from_slice(&derived[..n]);
                }
            }
        }
        self.fields.insert(field.0, out);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn zip_lanes(
        &self,
        inputs: &[(Vec<f64>, usize)],
        f: PureFn,
        count: usize,
        stride: usize,
        seed: u64,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        match f {
            PureFn::Opcode(op) => {
                let mut scratch = Vec::with_capacity(inputs.len());
                for i in 0..count {
                    for c in 0..stride {
                        scratch.clear();
                        for (lanes, in_stride) in inputs {
                            let elem = element(lanes, *in_stride, i);
                            scratch.push(
                                elem.get(c)
                                    .copied()
                                    .or_else(|| elem.first().copied())
                                    .unwrap_or(0.0),
                            );
                        }
                        out[i * stride + c] = eval_opcode(op, &scratch)?;
                    }
                }
            }
            PureFn::Kernel(kernel) => {
                for i in 0..count {
                    let slices: Vec<&[f64]> = inputs
                        .iter()
                        .map(|(lanes, in_stride)| element(lanes, *in_stride, i))
                        .collect();
                    let mut lane_out = vec![0.0; stride];
                    eval_field_lane(
                        kernel,
                        &slices,
                        &mut lane_out,
                        &LaneCtx {
                            index: i,
                            count,
                            seed,
                        },
                    )?;
                    out[i * stride..(i + 1) * stride].copy_from_slice(&lane_out);
                }
            }
        }
        Ok(())
    }

    fn render_op(
        &mut self,
        binding: &RenderBinding,
        continuity: &mut ContinuityStore,
        dt_ms: f64,
    ) -> Option<crate::render::DrawOp> {
        let count = self.instance_count(binding.instance);
        let decl = self.program.instances[binding.instance.0 as usize].clone();
        let pos_stride = self.program.field_stride(binding.position) as usize;

        let position = self.field_lanes(binding.position)?.to_vec();
        let radius = self.field_lanes(binding.radius)?.to_vec();
        let color = self.field_lanes(binding.color)?.to_vec();
        let opacity = binding
            .opacity
            .and_then(|f| self.field_lanes(f))
            .map(<[f64]>::to_vec);
        let rotation = binding
            .rotation
            .and_then(|f| self.field_lanes(f))
            .map(<[f64]>::to_vec);

        // 6. Continuity smooths the render-bound buffers.
        let position = continuity
            .apply(
                binding.target_position,
                SemanticTag::Position,
                &position,
                pos_stride,
                count,
                &decl.id_domain,
                decl.identity,
                dt_ms,
            )
            .to_vec();
        let radius = continuity
            .apply(
                binding.target_radius,
                SemanticTag::Radius,
                &radius,
                1,
                count,
                &decl.id_domain,
                decl.identity,
                dt_ms,
            )
            .to_vec();
        let color = continuity
            .apply(
                binding.target_color,
                SemanticTag::Color,
                &color,
                4,
                count,
                &decl.id_domain,
                decl.identity,
                dt_ms,
            )
            .to_vec();

        let camera = self
            .cameras
            .get(&binding.instance.0)
            .copied()
            .unwrap_or_default();
        let geometry = binding.geometry.and_then(|slot| self.shape_at(slot)).cloned();

        Some(assemble_op(&AssembleInputs {
            position: &position,
            pos_stride,
            radius: &radius,
            color: &color,
            opacity: opacity.as_deref(),
            rotation: rotation.as_deref(),
            count,
            camera,
            style: binding.style.clone(),
            topology: binding.topology,
            geometry: geometry.as_ref(),
        }))
    }
}

static EMPTY_FRAME: RenderFrameIR = RenderFrameIR {
    version: RENDER_FRAME_VERSION,
    frame: 0,
    ops: Vec::new(),
};

fn layout_position(spec: &LayoutSpec, index: usize, count: usize) -> [f64; 3] {
    match spec {
        LayoutSpec::Grid { rows, cols } => grid_layout(index, *rows, *cols),
        LayoutSpec::Line { from, to } => line_layout(
            &LaneCtx {
                index,
                count,
                seed: 0,
            },
            *from,
            *to,
        ),
        LayoutSpec::Circle { center, radius } => circle_layout(index, count, *center, *radius),
    }
}
