//! Frame bounds registry.
//!
//! Maps every registered frame to a *slot* in a dense list of sheet rectangles,
//! plus a per-frame local (source image) rectangle. Several frames may point at
//! the same slot; editing the slot's rectangle is then visible through all of
//! them. After every mutation that can orphan a slot the list is compacted so
//! that each slot is referenced by at least one frame and indices stay
//! contiguous.
//!
//! The registry is not synchronized. Callers that edit it from one thread while
//! another reads must serialize access or hand the reader a [`Clone`].

use crate::models::{Frame, FrameId, Rect};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by registry mutations. A failed call never leaves a partial edit behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    /// The frame has id -1 or otherwise has no identity
    #[error("frame has an invalid identity ({0})")]
    InvalidFrameId(FrameId),
    /// The frame has no size or pixel data yet
    #[error("{0} is not initialized")]
    UninitializedFrame(FrameId),
    /// Bulk replacement does not preserve the slot count
    #[error("expected {expected} sheet rectangles, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Registry of shared sheet rectangles and per-frame local rectangles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBoundsMap {
    /// Dense slot list; every entry is referenced by at least one frame
    sheet_bounds: Vec<Rect>,
    /// Frame -> slot index
    frame_slots: BTreeMap<FrameId, usize>,
    /// Frame -> local bounds in the source image
    local_bounds: BTreeMap<FrameId, Rect>,
}

impl FrameBoundsMap {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current slot list.
    pub fn sheet_bounds(&self) -> &[Rect] {
        &self.sheet_bounds
    }

    /// Number of registered frames.
    pub fn frame_count(&self) -> usize {
        self.frame_slots.len()
    }

    /// Whether the given frame has been registered.
    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.frame_slots.contains_key(&frame_id)
    }

    /// All registered frame ids, in ascending order.
    pub fn frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frame_slots.keys().copied()
    }

    /// Register frames under one new slot.
    ///
    /// The slot receives `local_bounds` moved to the origin (only the size is
    /// kept); each frame's local bounds are stored unmodified. Frames that were
    /// already registered are moved to the new slot.
    pub fn register_frames(&mut self, frames: &[&Frame], local_bounds: Rect) -> Result<(), BoundsError> {
        for frame in frames {
            validate_frame(frame)?;
        }

        let slot = self.sheet_bounds.len();
        self.sheet_bounds.push(local_bounds.at_origin());

        for frame in frames {
            self.frame_slots.insert(frame.id(), slot);
            self.local_bounds.insert(frame.id(), local_bounds);
        }

        self.compact();
        Ok(())
    }

    /// Slot index the frame currently points at.
    pub fn sheet_index_for_frame(&self, frame_id: FrameId) -> Option<usize> {
        self.frame_slots.get(&frame_id).copied()
    }

    /// Sheet rectangle of the frame's slot, or `None` if never registered.
    pub fn sheet_bounds_for_frame(&self, frame_id: FrameId) -> Option<Rect> {
        self.sheet_index_for_frame(frame_id).and_then(|i| self.sheet_bounds.get(i).copied())
    }

    /// Local rectangle of the frame, or `None` if never registered.
    pub fn local_bounds_for_frame(&self, frame_id: FrameId) -> Option<Rect> {
        self.local_bounds.get(&frame_id).copied()
    }

    /// Overwrite the rectangle of the frame's slot, affecting every frame that
    /// shares it. No-op for unregistered frames.
    pub fn set_sheet_bounds_for_frame(&mut self, frame: &Frame, bounds: Rect) -> Result<(), BoundsError> {
        validate_frame(frame)?;

        if let Some(slot) = self.sheet_index_for_frame(frame.id()) {
            self.sheet_bounds[slot] = bounds;
        }
        Ok(())
    }

    /// Overwrite only this frame's local rectangle. No-op for unregistered frames.
    pub fn set_local_bounds_for_frame(&mut self, frame: &Frame, bounds: Rect) -> Result<(), BoundsError> {
        validate_frame(frame)?;

        if let Some(local) = self.local_bounds.get_mut(&frame.id()) {
            *local = bounds;
        }
        Ok(())
    }

    /// Point `second` at the slot of `first`.
    ///
    /// Returns `Ok(true)` when the frames share a slot afterwards (including
    /// when they already did) and `Ok(false)` when either frame is unregistered.
    pub fn share_sheet_bounds_for_frames(&mut self, first: &Frame, second: &Frame) -> Result<bool, BoundsError> {
        validate_frame(first)?;
        validate_frame(second)?;

        let (Some(first_slot), Some(second_slot)) =
            (self.sheet_index_for_frame(first.id()), self.sheet_index_for_frame(second.id()))
        else {
            return Ok(false);
        };

        if first_slot == second_slot {
            return Ok(true);
        }

        self.frame_slots.insert(second.id(), first_slot);
        self.compact();
        Ok(true)
    }

    /// Move a frame that shares its slot into a new slot of its own.
    ///
    /// The new slot carries a copy of the shared rectangle. Returns `Ok(false)`
    /// when the frame is unregistered or already alone in its slot.
    pub fn split_shared_sheet_bounds_for_frame(&mut self, frame: &Frame) -> Result<bool, BoundsError> {
        validate_frame(frame)?;

        let Some(slot) = self.sheet_index_for_frame(frame.id()) else {
            return Ok(false);
        };
        if self.count_of_frames_at_sheet_bounds_index(slot) <= 1 {
            return Ok(false);
        }

        let bounds = self.sheet_bounds[slot];
        self.sheet_bounds.push(bounds);
        self.frame_slots.insert(frame.id(), self.sheet_bounds.len() - 1);
        self.compact();
        Ok(true)
    }

    /// Number of frames pointing at a slot.
    pub fn count_of_frames_at_sheet_bounds_index(&self, index: usize) -> usize {
        self.frame_slots.values().filter(|&&slot| slot == index).count()
    }

    /// Frames pointing at a slot, in ascending id order.
    pub fn frame_ids_at_sheet_index(&self, index: usize) -> Vec<FrameId> {
        self.frame_slots.iter().filter(|(_, &slot)| slot == index).map(|(&id, _)| id).collect()
    }

    /// Replace every slot rectangle positionally, keeping the sharing topology.
    pub fn replace_sheet_bounds(&mut self, bounds: &[Rect]) -> Result<(), BoundsError> {
        if bounds.len() != self.sheet_bounds.len() {
            return Err(BoundsError::CountMismatch {
                expected: self.sheet_bounds.len(),
                actual: bounds.len(),
            });
        }
        self.sheet_bounds.copy_from_slice(bounds);
        Ok(())
    }

    /// Drop slots nobody references and renumber the remaining ones densely,
    /// preserving their relative order.
    fn compact(&mut self) {
        let mut references = vec![0usize; self.sheet_bounds.len()];
        for &slot in self.frame_slots.values() {
            references[slot] += 1;
        }

        if references.iter().all(|&count| count > 0) {
            return;
        }

        let mut remap = vec![usize::MAX; self.sheet_bounds.len()];
        let mut kept = Vec::with_capacity(self.sheet_bounds.len());
        for (old, rect) in self.sheet_bounds.iter().enumerate() {
            if references[old] > 0 {
                remap[old] = kept.len();
                kept.push(*rect);
            }
        }

        for slot in self.frame_slots.values_mut() {
            *slot = remap[*slot];
        }
        self.sheet_bounds = kept;
    }
}

fn validate_frame(frame: &Frame) -> Result<(), BoundsError> {
    if !frame.id().is_valid() {
        return Err(BoundsError::InvalidFrameId(frame.id()));
    }
    if !frame.is_initialized() {
        return Err(BoundsError::UninitializedFrame(frame.id()));
    }
    Ok(())
}
