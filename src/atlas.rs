//! Texture atlas - accumulates animation frames and rasterizes the packed sheet.
//!
//! The atlas only stores placement data. Deciding where each frame goes is the
//! job of a [`SheetPacker`](crate::packer::SheetPacker); [`TextureAtlas::generate_sheet`]
//! then copies every frame into its assigned rectangle.

use crate::bounds::FrameBoundsMap;
use crate::models::{copy_region, Animation, Frame, FrameId, Rect, TRANSPARENT};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Settings controlling how a sheet is packed and exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetExportSettings {
    /// Write a JSON descriptor next to the sheet image
    pub export_json: bool,
    /// Expand descriptor rectangles by half the padding on each side
    pub use_padding_on_json: bool,
    /// Empty pixels reserved horizontally around each frame
    pub x_padding: u32,
    /// Empty pixels reserved vertically around each frame
    pub y_padding: u32,
    /// Let identical frames share one region of the sheet
    pub reuse_identical_frames: bool,
    /// Round sheet dimensions up to powers of two
    pub force_power_of_two: bool,
    /// Trim empty borders off each frame before packing
    pub force_minimum_dimensions: bool,
    /// Try many layouts and keep the smallest one
    pub high_precision_area_matching: bool,
    /// Allow frames to be placed out of insertion order
    pub allow_unordered_frames: bool,
    /// Give every frame a cell the size of the largest frame
    pub use_uniform_grid: bool,
    /// Prefer square sheets over minimal area
    pub favor_ratio_over_area: bool,
}

impl Default for SheetExportSettings {
    fn default() -> Self {
        Self {
            export_json: true,
            use_padding_on_json: true,
            x_padding: 0,
            y_padding: 0,
            reuse_identical_frames: true,
            force_power_of_two: false,
            force_minimum_dimensions: true,
            high_precision_area_matching: false,
            allow_unordered_frames: true,
            use_uniform_grid: false,
            favor_ratio_over_area: false,
        }
    }
}

/// Aggregate metrics computed while packing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasInfo {
    /// Final sheet width in pixels
    pub width: u32,
    /// Final sheet height in pixels
    pub height: u32,
    /// Frames drawn from another frame's region
    pub reused_frames: usize,
    /// Pixels covered by frame regions (each shared region counted once)
    pub used_area: u64,
}

impl AtlasInfo {
    /// Fraction of the sheet covered by frame content, 0.0-1.0.
    pub fn efficiency(&self) -> f64 {
        let total = self.width as u64 * self.height as u64;
        if total == 0 {
            0.0
        } else {
            self.used_area as f64 / total as f64
        }
    }
}

/// Errors raised by atlas accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    #[error("frame index {index} is out of range (atlas has {len} frames)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// One frame on the atlas together with its placement.
#[derive(Debug, Clone)]
pub struct FrameSlot<'a> {
    pub frame: &'a Frame,
    /// Where the frame is drawn on the sheet
    pub bounds: Rect,
    /// Region of the frame image copied into `bounds`
    pub origin: Rect,
}

/// A set of frames destined for one sprite sheet.
#[derive(Debug, Clone)]
pub struct TextureAtlas<'a> {
    name: String,
    settings: SheetExportSettings,
    slots: Vec<FrameSlot<'a>>,
    animations: Vec<&'a Animation>,
    info: AtlasInfo,
    bounds_map: FrameBoundsMap,
}

impl<'a> TextureAtlas<'a> {
    /// Create an empty atlas.
    pub fn new(name: impl Into<String>, settings: SheetExportSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            slots: vec![],
            animations: vec![],
            info: AtlasInfo::default(),
            bounds_map: FrameBoundsMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &SheetExportSettings {
        &self.settings
    }

    pub fn info(&self) -> &AtlasInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut AtlasInfo {
        &mut self.info
    }

    /// Registry of shared regions built by the last packing pass.
    pub fn bounds_map(&self) -> &FrameBoundsMap {
        &self.bounds_map
    }

    pub(crate) fn set_bounds_map(&mut self, map: FrameBoundsMap) {
        self.bounds_map = map;
    }

    pub fn frame_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[FrameSlot<'a>] {
        &self.slots
    }

    /// Whether a frame with this identity is on the atlas.
    pub fn contains_frame(&self, id: FrameId) -> bool {
        self.slots.iter().any(|s| s.frame.id() == id)
    }

    /// Position of a frame on the atlas.
    pub fn index_of_frame(&self, id: FrameId) -> Option<usize> {
        self.slots.iter().position(|s| s.frame.id() == id)
    }

    /// Add a frame owned by `animation`. No-op if the frame is already present.
    ///
    /// The frame starts with an empty placement and an origin covering its
    /// full extent.
    pub fn insert_frame(&mut self, animation: &'a Animation, frame: &'a Frame) {
        if self.contains_frame(frame.id()) {
            return;
        }

        self.slots.push(FrameSlot { frame, bounds: Rect::default(), origin: frame.extent() });
        self.track_animation(animation);
    }

    /// Add every frame of an animation, in order.
    pub fn insert_frames_from_animation(&mut self, animation: &'a Animation) {
        self.track_animation(animation);
        for frame in animation.frames() {
            self.insert_frame(animation, frame);
        }
    }

    /// Animations that contributed frames, in insertion order.
    pub fn animations_on_atlas(&self) -> &[&'a Animation] {
        &self.animations
    }

    pub fn frame_bounds_rectangle(&self, index: usize) -> Option<Rect> {
        self.slots.get(index).map(|s| s.bounds)
    }

    pub fn set_frame_bounds_rectangle(&mut self, index: usize, bounds: Rect) -> Result<(), AtlasError> {
        self.slot_mut(index)?.bounds = bounds;
        Ok(())
    }

    pub fn frame_origins_rectangle(&self, index: usize) -> Option<Rect> {
        self.slots.get(index).map(|s| s.origin)
    }

    pub fn set_frame_origins_rectangle(&mut self, index: usize, origin: Rect) -> Result<(), AtlasError> {
        self.slot_mut(index)?.origin = origin;
        Ok(())
    }

    /// Distinct bounding rectangles in use, in first-use order.
    pub fn unique_bounds(&self) -> Vec<Rect> {
        let mut seen = HashSet::new();
        self.slots.iter().map(|s| s.bounds).filter(|b| seen.insert(*b)).collect()
    }

    /// Recompute the sheet size from the current bounds, keeping room for the
    /// trailing half of the padding and honoring the power-of-two setting.
    pub fn compute_sheet_size(&mut self) {
        let pad_x = (self.settings.x_padding - self.settings.x_padding / 2) as i32;
        let pad_y = (self.settings.y_padding - self.settings.y_padding / 2) as i32;

        let width = self.slots.iter().map(|s| s.bounds.right() + pad_x).max().unwrap_or(0).max(1) as u32;
        let height = self.slots.iter().map(|s| s.bounds.bottom() + pad_y).max().unwrap_or(0).max(1) as u32;

        let (width, height) = if self.settings.force_power_of_two {
            (next_power_of_two(width), next_power_of_two(height))
        } else {
            (width, height)
        };

        self.info.width = width;
        self.info.height = height;
        self.info.used_area = self.unique_bounds().iter().map(|b| b.area() as u64).sum();
    }

    /// Rasterize the sheet.
    pub fn generate_sheet(&self) -> RgbaImage {
        self.generate_sheet_with_progress(&mut |_| {})
    }

    /// Rasterize the sheet, reporting a 0-100 percentage after each frame.
    ///
    /// Frames are drawn sequentially in insertion order. With frame reuse on, a
    /// region that was already drawn is not drawn again.
    pub fn generate_sheet_with_progress(&self, on_progress: &mut dyn FnMut(u8)) -> RgbaImage {
        let mut sheet = RgbaImage::from_pixel(self.info.width.max(1), self.info.height.max(1), TRANSPARENT);
        let mut drawn: HashSet<Rect> = HashSet::new();
        let total = self.slots.len().max(1);

        for (index, slot) in self.slots.iter().enumerate() {
            let already_drawn = !drawn.insert(slot.bounds);
            if !(self.settings.reuse_identical_frames && already_drawn) && !slot.bounds.is_empty() {
                let composed = slot.frame.composed();
                let source = Rect::new(
                    slot.origin.x,
                    slot.origin.y,
                    slot.bounds.width.min(slot.origin.width),
                    slot.bounds.height.min(slot.origin.height),
                );
                copy_region(&mut sheet, &composed, source, slot.bounds.x, slot.bounds.y);
            }
            on_progress(((index + 1) * 100 / total) as u8);
        }

        sheet
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [FrameSlot<'a>] {
        &mut self.slots
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut FrameSlot<'a>, AtlasError> {
        let len = self.slots.len();
        self.slots.get_mut(index).ok_or(AtlasError::IndexOutOfRange { index, len })
    }

    fn track_animation(&mut self, animation: &'a Animation) {
        if !self.animations.iter().any(|a| a.id == animation.id) {
            self.animations.push(animation);
        }
    }
}

/// Get the next power of two >= n
pub fn next_power_of_two(n: u32) -> u32 {
    if n == 0 {
        return 1;
    }
    let mut p = 1u32;
    while p < n {
        p *= 2;
    }
    p
}
