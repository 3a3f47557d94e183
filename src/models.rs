//! Core data types: rectangles, frame and animation identities, frames and animations.
//!
//! Frames are the atomic unit of animation content. Every frame carries a stable
//! [`FrameId`]; the packing and export code compares frames by id only, never by
//! reference, so identities survive serialization round-trips.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Transparent color used for empty canvas space
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An integer rectangle, in sheet-space or frame-space depending on context.
///
/// Field names match the JSON descriptor schema (`x`, `y`, `width`, `height`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Create a rectangle at the origin with the given size.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// The same size, moved to (0, 0).
    pub fn at_origin(&self) -> Self {
        Self::from_size(self.width, self.height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Area in pixels (zero for degenerate rectangles).
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// True if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// True if `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Clamp width/height so they never exceed the given maximum size.
    pub fn clamp_size(&self, max_width: i32, max_height: i32) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: self.width.min(max_width),
            height: self.height.min(max_height),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// Stable identity of a frame. `-1` marks an uninitialized frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub i32);

impl FrameId {
    /// Identity of frames that were never assigned one
    pub const INVALID: FrameId = FrameId(-1);

    /// Check whether this id may be used as a frame identity.
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Stable identity of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub i32);

impl AnimationId {
    /// Identity of animations that were never assigned one
    pub const INVALID: AnimationId = AnimationId(-1);

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for AnimationId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "animation#{}", self.0)
    }
}

/// A single layer of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayer {
    pub image: RgbaImage,
    /// Hidden layers are skipped when flattening
    pub visible: bool,
}

impl FrameLayer {
    pub fn new(image: RgbaImage) -> Self {
        Self { image, visible: true }
    }
}

/// One bitmap of an animation, possibly made of several layers.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    id: FrameId,
    animation_id: Option<AnimationId>,
    width: u32,
    height: u32,
    layers: Vec<FrameLayer>,
    hash: u64,
}

impl Frame {
    /// Create a single-layer frame from an image.
    pub fn new(id: FrameId, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut frame = Self {
            id,
            animation_id: None,
            width,
            height,
            layers: vec![FrameLayer::new(image)],
            hash: 0,
        };
        frame.update_hash();
        frame
    }

    /// Create a fully transparent frame of the given size.
    pub fn blank(id: FrameId, width: u32, height: u32) -> Self {
        Self::new(id, RgbaImage::from_pixel(width, height, TRANSPARENT))
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Animation this frame was added to, if any.
    pub fn animation_id(&self) -> Option<AnimationId> {
        self.animation_id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full extent of the frame as a rectangle at the origin.
    pub fn extent(&self) -> Rect {
        Rect::from_size(self.width as i32, self.height as i32)
    }

    /// Content hash of the composed image. Equal frames have equal hashes;
    /// the converse does not hold.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn layers(&self) -> &[FrameLayer] {
        &self.layers
    }

    /// A frame is initialized once it has an identity, a size and pixel data.
    pub fn is_initialized(&self) -> bool {
        self.id.is_valid() && self.width > 0 && self.height > 0 && !self.layers.is_empty()
    }

    /// Append a layer on top. Layers with a different size are resized onto a
    /// transparent canvas of the frame size, anchored top-left.
    pub fn add_layer(&mut self, layer: FrameLayer) {
        let layer = if layer.image.dimensions() == (self.width, self.height) {
            layer
        } else {
            let mut canvas = RgbaImage::from_pixel(self.width, self.height, TRANSPARENT);
            copy_region(&mut canvas, &layer.image, Rect::from_size(self.width as i32, self.height as i32), 0, 0);
            FrameLayer { image: canvas, visible: layer.visible }
        };
        self.layers.push(layer);
        self.update_hash();
    }

    /// Toggle visibility of a layer. Returns false if the index is out of range.
    pub fn set_layer_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.visible = visible;
                self.update_hash();
                true
            }
            None => false,
        }
    }

    /// Flatten all visible layers into a single image.
    ///
    /// A frame with one visible layer yields that layer's pixels unchanged.
    pub fn composed(&self) -> RgbaImage {
        let mut visible = self.layers.iter().filter(|l| l.visible);
        let Some(first) = visible.next() else {
            return RgbaImage::from_pixel(self.width, self.height, TRANSPARENT);
        };

        let mut result = first.image.clone();
        for layer in visible {
            composite_over(&mut result, &layer.image);
        }
        result
    }

    pub(crate) fn set_animation_id(&mut self, animation_id: AnimationId) {
        self.animation_id = Some(animation_id);
    }

    fn update_hash(&mut self) {
        let composed = self.composed();
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        composed.as_raw().hash(&mut hasher);
        self.hash = hasher.finish();
    }
}

/// A named sequence of equally-sized frames.
#[derive(Debug, Clone)]
pub struct Animation {
    pub id: AnimationId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Whether playback may skip frames to keep up with `fps`
    pub frameskip: bool,
    frames: Vec<Frame>,
}

impl Animation {
    pub fn new(id: AnimationId, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self { id, name: name.into(), width, height, fps: 30, frameskip: true, frames: vec![] }
    }

    /// Set playback speed.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_frameskip(mut self, frameskip: bool) -> Self {
        self.frameskip = frameskip;
        self
    }

    /// Append a frame, stamping it with this animation's id.
    pub fn push_frame(&mut self, mut frame: Frame) {
        frame.set_animation_id(self.id);
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Look up a frame by identity.
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id == id)
    }
}

/// Copy `src_rect` of `src` into `dest` at (`dest_x`, `dest_y`), replacing pixels.
///
/// Pixels falling outside either image are skipped.
pub(crate) fn copy_region(dest: &mut RgbaImage, src: &RgbaImage, src_rect: Rect, dest_x: i32, dest_y: i32) {
    let (src_w, src_h) = (src.width() as i32, src.height() as i32);
    let (dest_w, dest_h) = (dest.width() as i32, dest.height() as i32);

    for row in 0..src_rect.height.max(0) {
        let sy = src_rect.y + row;
        let dy = dest_y + row;
        if sy < 0 || sy >= src_h || dy < 0 || dy >= dest_h {
            continue;
        }
        for col in 0..src_rect.width.max(0) {
            let sx = src_rect.x + col;
            let dx = dest_x + col;
            if sx < 0 || sx >= src_w || dx < 0 || dx >= dest_w {
                continue;
            }
            let pixel = *src.get_pixel(sx as u32, sy as u32);
            dest.put_pixel(dx as u32, dy as u32, pixel);
        }
    }
}

/// Composite a source image over a destination image with alpha blending.
fn composite_over(dest: &mut RgbaImage, src: &RgbaImage) {
    if dest.dimensions() != src.dimensions() {
        return;
    }

    for (dest_pixel, src_pixel) in dest.pixels_mut().zip(src.pixels()) {
        if src_pixel[3] == 0 {
            continue;
        }
        if src_pixel[3] == 255 {
            *dest_pixel = *src_pixel;
            continue;
        }

        let src_a = src_pixel[3] as f32 / 255.0;
        let dest_a = dest_pixel[3] as f32 / 255.0;
        let out_a = src_a + dest_a * (1.0 - src_a);

        if out_a > 0.0 {
            let blend = |s: u8, d: u8| -> u8 {
                let sf = s as f32 / 255.0;
                let df = d as f32 / 255.0;
                let out = (sf * src_a + df * dest_a * (1.0 - src_a)) / out_a;
                (out * 255.0).round().clamp(0.0, 255.0) as u8
            };

            dest_pixel[0] = blend(src_pixel[0], dest_pixel[0]);
            dest_pixel[1] = blend(src_pixel[1], dest_pixel[1]);
            dest_pixel[2] = blend(src_pixel[2], dest_pixel[2]);
            dest_pixel[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges_and_area() {
        let r = Rect::new(2, 3, 4, 5);
        assert_eq!(r.right(), 6);
        assert_eq!(r.bottom(), 8);
        assert_eq!(r.area(), 20);
        assert_eq!(r.at_origin(), Rect::new(0, 0, 4, 5));
        assert_eq!(Rect::new(0, 0, -1, 4).area(), 0);
    }

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(a.intersects(&Rect::new(3, 3, 2, 2)));
        assert!(!a.intersects(&Rect::new(4, 0, 2, 2)));
        assert!(!a.intersects(&Rect::new(1, 1, 0, 2)));
    }

    #[test]
    fn test_rect_clamp_size() {
        let r = Rect::new(5, 5, 40, 10).clamp_size(32, 32);
        assert_eq!(r, Rect::new(5, 5, 32, 10));
    }

    #[test]
    fn test_rect_serializes_with_schema_names() {
        let json = serde_json::to_string(&Rect::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2,"width":3,"height":4}"#);
    }

    #[test]
    fn test_frame_id_validity() {
        assert!(!FrameId::INVALID.is_valid());
        assert!(FrameId(0).is_valid());
        assert_eq!(FrameId::default(), FrameId(-1));
    }

    #[test]
    fn test_default_frame_is_uninitialized() {
        let frame = Frame::default();
        assert!(!frame.is_initialized());
        assert!(!Frame::blank(FrameId::INVALID, 4, 4).is_initialized());
        assert!(Frame::blank(FrameId(3), 4, 4).is_initialized());
    }

    #[test]
    fn test_hash_tracks_content() {
        let red = Rgba([255, 0, 0, 255]);
        let a = Frame::new(FrameId(0), RgbaImage::from_pixel(4, 4, red));
        let b = Frame::new(FrameId(1), RgbaImage::from_pixel(4, 4, red));
        let c = Frame::blank(FrameId(2), 4, 4);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_single_layer_composes_unchanged() {
        let mut image = RgbaImage::from_pixel(2, 2, TRANSPARENT);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        image.put_pixel(1, 1, Rgba([10, 20, 30, 128]));
        let frame = Frame::new(FrameId(0), image.clone());
        assert_eq!(frame.composed(), image);
    }

    #[test]
    fn test_layers_flatten_and_visibility() {
        let mut frame = Frame::new(FrameId(0), RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        let mut top = RgbaImage::from_pixel(2, 2, TRANSPARENT);
        top.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let before = frame.hash();
        frame.add_layer(FrameLayer::new(top));
        assert_ne!(frame.hash(), before);

        let composed = frame.composed();
        assert_eq!(*composed.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*composed.get_pixel(1, 0), Rgba([0, 0, 255, 255]));

        assert!(frame.set_layer_visible(1, false));
        assert_eq!(frame.hash(), before);
        assert!(!frame.set_layer_visible(7, false));
    }

    #[test]
    fn test_add_layer_resizes_to_frame() {
        let mut frame = Frame::blank(FrameId(0), 3, 3);
        frame.add_layer(FrameLayer::new(RgbaImage::from_pixel(5, 1, Rgba([1, 2, 3, 255]))));
        assert_eq!(frame.layers()[1].image.dimensions(), (3, 3));
        assert_eq!(*frame.composed().get_pixel(2, 0), Rgba([1, 2, 3, 255]));
        assert_eq!(*frame.composed().get_pixel(2, 1), TRANSPARENT);
    }

    #[test]
    fn test_animation_push_frame_stamps_owner() {
        let mut anim = Animation::new(AnimationId(7), "walk", 4, 4).with_fps(12);
        anim.push_frame(Frame::blank(FrameId(1), 4, 4));
        assert_eq!(anim.frames()[0].animation_id(), Some(AnimationId(7)));
        assert!(anim.frame(FrameId(1)).is_some());
        assert!(anim.frame(FrameId(2)).is_none());
        assert_eq!(anim.fps, 12);
    }

    #[test]
    fn test_copy_region_clips() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let mut dest = RgbaImage::from_pixel(3, 3, TRANSPARENT);
        copy_region(&mut dest, &src, Rect::new(0, 0, 4, 4), -1, 1);
        assert_eq!(*dest.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*dest.get_pixel(0, 1), Rgba([9, 9, 9, 255]));
        assert_eq!(*dest.get_pixel(2, 2), Rgba([9, 9, 9, 255]));
    }
}
