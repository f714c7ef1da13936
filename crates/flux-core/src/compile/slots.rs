// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass 8 — slot metadata.
//!
//! Assigns each slot an offset within its storage plane, accumulating by
//! stride so wide payloads (color, stride 4) never overlap their
//! neighbors. The disjointness of `[offset, offset + stride)` ranges per
//! plane is the invariant the property tests pin.

use crate::ir::{storage_for, SlotId, SlotMeta, SlotStorage};
use crate::types::{CanonicalType, Payload};

/// Computed plane sizes.
pub(crate) struct SlotPlan {
    pub(crate) slots: Vec<SlotMeta>,
    pub(crate) f64_len: usize,
    pub(crate) object_len: usize,
    pub(crate) shape_len: usize,
}

/// Lays out every slot.
pub(crate) fn layout_slots(slot_types: &[CanonicalType]) -> SlotPlan {
    let mut f64_off: u32 = 0;
    let mut object_off: u32 = 0;
    let mut shape_off: u32 = 0;
    let mut slots = Vec::with_capacity(slot_types.len());
    for (i, ty) in slot_types.iter().enumerate() {
        let payload = ty.payload.value().unwrap_or(Payload::Float);
        let storage = storage_for(payload);
        let stride = match storage {
            SlotStorage::F64 => payload.stride(),
            SlotStorage::Object | SlotStorage::Shape2d => 1,
        };
        let offset = match storage {
            SlotStorage::F64 => {
                let o = f64_off;
                f64_off += stride;
                o
            }
            SlotStorage::Object => {
                let o = object_off;
                object_off += stride;
                o
            }
            SlotStorage::Shape2d => {
                let o = shape_off;
                shape_off += stride;
                o
            }
        };
        slots.push(SlotMeta {
            slot: SlotId(u32::try_from(i).unwrap_or(u32::MAX)),
            storage,
            offset,
            stride,
            ty: *ty,
        });
    }
    SlotPlan {
        slots,
        f64_len: f64_off as usize,
        object_len: object_off as usize,
        shape_len: shape_off as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalType;

    #[test]
    fn offsets_accumulate_by_stride() {
        let types = vec![
            CanonicalType::signal(Payload::Color),
            CanonicalType::signal(Payload::Float),
            CanonicalType::signal(Payload::Vec2),
        ];
        let plan = layout_slots(&types);
        assert_eq!(plan.slots[0].offset, 0);
        assert_eq!(plan.slots[1].offset, 4);
        assert_eq!(plan.slots[2].offset, 5);
        assert_eq!(plan.f64_len, 7);
    }

    #[test]
    fn planes_are_independent() {
        let types = vec![
            CanonicalType::signal(Payload::Float),
            CanonicalType::signal(Payload::Shape),
            CanonicalType::signal(Payload::CameraProjection),
            CanonicalType::signal(Payload::Float),
        ];
        let plan = layout_slots(&types);
        assert_eq!(plan.slots[1].storage, SlotStorage::Shape2d);
        assert_eq!(plan.slots[2].storage, SlotStorage::Object);
        assert_eq!(plan.slots[3].offset, 1);
        assert_eq!(plan.f64_len, 2);
        assert_eq!(plan.object_len, 1);
        assert_eq!(plan.shape_len, 1);
    }
}
