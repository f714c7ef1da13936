// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Intermediate representation: expressions, program artifact, builder.

mod builder;
mod expr;
mod program;

pub use builder::{storage_for, IrBuilder, ValueRef};
pub use expr::{
    CameraProjection, EventId, FieldExpr, FieldId, InstanceId, Intrinsic, ObjectValue,
    PathGeometry, PureFn, ReduceOp, SlotId, StateId, ValueExpr, ValueExprId, ZipArg,
};
pub use program::{
    CompiledProgram, DrawTopology, IdentityMode, InstanceCount, InstanceDecl, LayoutSpec, LineCap,
    LineJoin, PortDir, ProgramStats, RenderBinding, ScheduleStep, SlotMeta, SlotStorage, StateDecl,
    StyleSpec, TimeBinding,
};
