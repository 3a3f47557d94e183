//! Reading exported sheets back into frames.

use crate::bundle::Bundle;
use crate::export::json::SheetDescriptor;
use crate::export::{ExportError, Result};
use crate::models::{copy_region, Animation, Frame, Rect, TRANSPARENT};
use image::RgbaImage;
use std::path::{Component, Path};
use tracing::debug;

/// An animation rebuilt from a sheet and its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedAnimation {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frameskip: bool,
    pub frames: Vec<RgbaImage>,
}

impl ImportedAnimation {
    /// Turn the imported frames into an [`Animation`] with ids from `bundle`.
    ///
    /// The animation is returned, not added to the bundle.
    pub fn into_animation(self, bundle: &mut Bundle) -> Animation {
        let id = bundle.next_animation_id();
        let mut animation =
            Animation::new(id, self.name, self.width, self.height).with_fps(self.fps).with_frameskip(self.frameskip);
        for image in self.frames {
            let frame_id = bundle.next_frame_id();
            animation.push_frame(Frame::new(frame_id, image));
        }
        animation
    }
}

/// Read a descriptor file.
pub fn read_descriptor(json_path: &Path) -> Result<SheetDescriptor> {
    let content = std::fs::read_to_string(json_path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load `<name>.json` and the sheet image it points at, and slice the frames out.
pub fn load_sheet(json_path: &Path) -> Result<Vec<ImportedAnimation>> {
    let descriptor = read_descriptor(json_path)?;
    let base_dir = json_path.parent().unwrap_or_else(|| Path::new(""));
    let image_path = base_dir.join(&descriptor.sprite_image);

    let sheet = image::open(&image_path)?.to_rgba8();
    debug!(image = %image_path.display(), animations = descriptor.animations.len(), "loaded sheet");

    reconstruct(&descriptor, &sheet)
}

/// Rebuild every animation of `descriptor` from `sheet`.
///
/// Each frame starts as a transparent `width x height` buffer; the "sheet"
/// rectangle is copied into it at the "frame" rectangle's position, and
/// pixels landing outside the buffer are dropped.
pub fn reconstruct(descriptor: &SheetDescriptor, sheet: &RgbaImage) -> Result<Vec<ImportedAnimation>> {
    let sheet_area = Rect::from_size(sheet.width() as i32, sheet.height() as i32);

    descriptor
        .animations
        .iter()
        .map(|animation| {
            check_animation_name(&animation.name)?;
            let frames = animation
                .frames
                .iter()
                .enumerate()
                .map(|(index, frame)| {
                    if frame.sheet.width < 0 || frame.sheet.height < 0 || !sheet_area.contains_rect(&frame.sheet) {
                        return Err(ExportError::InvalidRect(format!(
                            "frame {} of '{}': {} is outside the {}x{} sheet",
                            index,
                            animation.name,
                            frame.sheet,
                            sheet.width(),
                            sheet.height()
                        )));
                    }

                    let mut image = RgbaImage::from_pixel(animation.width, animation.height, TRANSPARENT);
                    copy_region(&mut image, sheet, frame.sheet, frame.frame.x, frame.frame.y);
                    Ok(image)
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(ImportedAnimation {
                name: animation.name.clone(),
                width: animation.width,
                height: animation.height,
                fps: animation.fps,
                frameskip: animation.frameskip,
                frames,
            })
        })
        .collect()
}

/// Animation names become directory names on import, so they must be a
/// single plain path component.
fn check_animation_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
    if single && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(ExportError::InvalidName(name.to_string()))
    }
}
