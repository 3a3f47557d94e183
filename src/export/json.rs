//! JSON sheet descriptor.
//!
//! The descriptor sits next to the sheet image and lists, per animation, where
//! each frame's pixels live on the sheet and where they go inside the frame.
//!
//! # Output Format
//!
//! ```json
//! {
//!   "sprite_image": "hero.png",
//!   "animations": [
//!     {
//!       "name": "walk",
//!       "width": 32,
//!       "height": 32,
//!       "fps": 12,
//!       "frameskip": true,
//!       "frames": [
//!         {
//!           "sheet": { "x": 0, "y": 0, "width": 20, "height": 28 },
//!           "frame": { "x": 6, "y": 4, "width": 20, "height": 28 }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! When padding on JSON is enabled, half of the configured padding is taken
//! off `x`/`y` of both rectangles and twice that is added to the `sheet`
//! rectangle's size, so the descriptor covers the transparent margin too.

use crate::export::{BundleSheetExport, ExportOptions, Result};
use crate::models::Rect;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Top-level descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetDescriptor {
    /// Sheet image path, relative to the descriptor's directory
    pub sprite_image: String,
    pub animations: Vec<AnimationDescriptor>,
}

/// One animation's entry in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frameskip: bool,
    pub frames: Vec<FrameDescriptor>,
}

/// Sheet-space and frame-space placement of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub sheet: Rect,
    pub frame: Rect,
}

impl SheetDescriptor {
    /// Build the descriptor for an export whose image is at `sprite_image`.
    pub fn from_export(export: &BundleSheetExport, sprite_image: impl Into<String>) -> Self {
        let settings = export.settings();
        let (pad_x, pad_y) = if settings.use_padding_on_json {
            ((settings.x_padding / 2) as i32, (settings.y_padding / 2) as i32)
        } else {
            (0, 0)
        };

        let animations = export
            .animations()
            .iter()
            .map(|animation| AnimationDescriptor {
                name: animation.name.clone(),
                width: animation.width,
                height: animation.height,
                fps: animation.fps,
                frameskip: animation.frameskip,
                frames: animation
                    .frame_ids
                    .iter()
                    .filter_map(|&id| export.frame_rect(id))
                    .map(|rect| FrameDescriptor {
                        sheet: Rect::new(
                            rect.sheet_area.x - pad_x,
                            rect.sheet_area.y - pad_y,
                            rect.sheet_area.width + pad_x * 2,
                            rect.sheet_area.height + pad_y * 2,
                        ),
                        frame: Rect::new(
                            rect.frame_area.x - pad_x,
                            rect.frame_area.y - pad_y,
                            rect.frame_area.width,
                            rect.frame_area.height,
                        ),
                    })
                    .collect(),
            })
            .collect();

        Self { sprite_image: sprite_image.into(), animations }
    }
}

/// JSON descriptor exporter.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl JsonExporter {
    /// Create a new JSON exporter.
    pub fn new() -> Self {
        Self
    }

    /// Serialize the descriptor of `export` to a string.
    pub fn export_to_string(
        &self,
        export: &BundleSheetExport,
        sprite_image: &str,
        options: &ExportOptions,
    ) -> Result<String> {
        let descriptor = SheetDescriptor::from_export(export, sprite_image);
        let json = if options.pretty {
            serde_json::to_string_pretty(&descriptor)?
        } else {
            serde_json::to_string(&descriptor)?
        };
        Ok(json)
    }

    /// Write the descriptor to `output_path`, pointing at `image_path`.
    pub fn export(
        &self,
        export: &BundleSheetExport,
        output_path: &Path,
        image_path: &Path,
        options: &ExportOptions,
    ) -> Result<()> {
        let base_dir = output_path.parent().unwrap_or_else(|| Path::new(""));
        let sprite_image = relative_path(image_path, base_dir).to_string_lossy().replace('\\', "/");
        let json = self.export_to_string(export, &sprite_image, options)?;

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(output_path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

/// Express `target` relative to the directory `base`.
///
/// Both paths must be of the same kind (both relative or both absolute).
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();

    let common = target.iter().zip(&base).take_while(|(a, b)| a == b).count();

    let mut result = PathBuf::new();
    for _ in common..base.len() {
        result.push("..");
    }
    for component in &target[common..] {
        result.push(component.as_os_str());
    }
    result
}
