//! Detection of frames with identical pixel content.
//!
//! The content hash only narrows down candidates; two frames are identical when
//! their sizes match and every byte of their composed images (alpha included)
//! is equal.

use crate::models::Frame;
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::HashMap;

/// Check whether two frames can share one sheet region.
pub fn frames_identical(a: &Frame, b: &Frame) -> bool {
    if a.width() != b.width() || a.height() != b.height() {
        return false;
    }
    if a.hash() != b.hash() {
        return false;
    }
    a.composed().as_raw() == b.composed().as_raw()
}

/// For each frame, the index of the earliest frame with identical content, or
/// `None` when the frame is the first of its kind.
///
/// Composed images are computed in parallel; the result depends only on the
/// input order.
pub fn find_identical_frames(frames: &[&Frame]) -> Vec<Option<usize>> {
    let composed: Vec<RgbaImage> = frames.par_iter().map(|f| f.composed()).collect();
    find_identical_images(frames, &composed)
}

/// Same as [`find_identical_frames`] with composed images supplied by the caller.
pub(crate) fn find_identical_images(frames: &[&Frame], composed: &[RgbaImage]) -> Vec<Option<usize>> {
    let mut buckets: HashMap<(u32, u32, u64), Vec<usize>> = HashMap::new();
    let mut canonical = Vec::with_capacity(frames.len());

    for (index, frame) in frames.iter().enumerate() {
        let key = (frame.width(), frame.height(), frame.hash());
        let candidates = buckets.entry(key).or_default();

        let original = candidates
            .iter()
            .copied()
            .find(|&other| composed[other].as_raw() == composed[index].as_raw());

        match original {
            Some(other) => canonical.push(Some(other)),
            None => {
                candidates.push(index);
                canonical.push(None);
            }
        }
    }

    canonical
}

/// Number of frames that would reuse another frame's region.
pub fn count_reused(canonical: &[Option<usize>]) -> usize {
    canonical.iter().filter(|c| c.is_some()).count()
}
