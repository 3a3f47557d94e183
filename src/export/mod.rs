//! Sprite sheet export.
//!
//! A packed [`TextureAtlas`] is rasterized into a [`BundleSheetExport`], which
//! owns the final sheet image together with one [`FrameRect`] per exported
//! frame. The export is written to disk as `<base>.png` plus an optional
//! `<base>.json` descriptor (see [`json`]); [`import`] reads that pair back.
//!
//! # Example
//!
//! ```ignore
//! use pixelaria::export::BundleSheetExport;
//! use pixelaria::packer::{SheetPacker, ShelfPacker};
//!
//! let mut atlas = bundle.atlas_for_sheet(&sheet)?;
//! ShelfPacker::new().pack(&mut atlas)?;
//! let export = BundleSheetExport::from_atlas(&atlas);
//! export.save_to_disk(Path::new("out/hero"))?;
//! ```

pub mod import;
pub mod json;

pub use import::*;
pub use json::*;

use crate::atlas::{SheetExportSettings, TextureAtlas};
use crate::models::{AnimationId, FrameId, Rect};
use image::RgbaImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Common error type for export operations.
#[derive(Debug)]
pub enum ExportError {
    /// IO error during file reading or writing
    Io(std::io::Error),
    /// Descriptor (de)serialization error
    Serialization(String),
    /// PNG encoding or decoding error
    Image(String),
    /// An animation name that cannot be used as a directory name
    InvalidName(String),
    /// A descriptor rectangle does not fit the sheet image
    InvalidRect(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "IO error: {}", e),
            ExportError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ExportError::Image(e) => write!(f, "Image error: {}", e),
            ExportError::InvalidName(e) => write!(f, "Invalid animation name: {}", e),
            ExportError::InvalidRect(e) => write!(f, "Invalid rectangle: {}", e),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

impl From<image::ImageError> for ExportError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => ExportError::Io(io),
            other => ExportError::Image(other.to_string()),
        }
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Options for descriptor output.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Pretty print output (with indentation)
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Placement of one exported frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRect {
    pub frame_id: FrameId,
    pub animation_id: Option<AnimationId>,
    /// Region of the sheet holding the frame's pixels
    pub sheet_area: Rect,
    /// Where that region sits inside the frame
    pub frame_area: Rect,
}

/// Animation metadata carried into the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedAnimation {
    pub id: AnimationId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frameskip: bool,
    /// Frames of the animation present in this export, in animation order
    pub frame_ids: Vec<FrameId>,
}

/// A rasterized sheet and the records needed to slice it back into frames.
///
/// The export owns its sheet image; [`BundleSheetExport::into_sheet`] hands
/// it over to the caller.
#[derive(Debug, Clone)]
pub struct BundleSheetExport {
    name: String,
    sheet: RgbaImage,
    frame_rects: Vec<FrameRect>,
    animations: Vec<ExportedAnimation>,
    settings: SheetExportSettings,
    reused_frames: usize,
}

impl BundleSheetExport {
    /// Rasterize a packed atlas.
    pub fn from_atlas(atlas: &TextureAtlas<'_>) -> Self {
        Self::from_atlas_with_progress(atlas, &mut |_| {})
    }

    /// Rasterize a packed atlas, reporting per-frame percentages.
    pub fn from_atlas_with_progress(atlas: &TextureAtlas<'_>, on_progress: &mut dyn FnMut(u8)) -> Self {
        let sheet = atlas.generate_sheet_with_progress(on_progress);

        let frame_rects: Vec<FrameRect> = atlas
            .slots()
            .iter()
            .map(|slot| {
                let (w, h) = (slot.frame.width() as i32, slot.frame.height() as i32);
                FrameRect {
                    frame_id: slot.frame.id(),
                    animation_id: slot.frame.animation_id(),
                    sheet_area: slot.bounds.clamp_size(w, h),
                    frame_area: slot.origin.clamp_size(w, h),
                }
            })
            .collect();

        let animations = atlas
            .animations_on_atlas()
            .iter()
            .map(|animation| ExportedAnimation {
                id: animation.id,
                name: animation.name.clone(),
                width: animation.width,
                height: animation.height,
                fps: animation.fps,
                frameskip: animation.frameskip,
                frame_ids: animation
                    .frames()
                    .iter()
                    .map(|f| f.id())
                    .filter(|&id| atlas.contains_frame(id))
                    .collect(),
            })
            .collect();

        debug!(
            sheet = atlas.name(),
            width = sheet.width(),
            height = sheet.height(),
            frames = frame_rects.len(),
            "rasterized sheet"
        );

        Self {
            name: atlas.name().to_string(),
            sheet,
            frame_rects,
            animations,
            settings: atlas.settings().clone(),
            reused_frames: atlas.info().reused_frames,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheet(&self) -> &RgbaImage {
        &self.sheet
    }

    /// Take ownership of the sheet image.
    pub fn into_sheet(self) -> RgbaImage {
        self.sheet
    }

    pub fn frame_rects(&self) -> &[FrameRect] {
        &self.frame_rects
    }

    pub fn frame_rect(&self, id: FrameId) -> Option<&FrameRect> {
        self.frame_rects.iter().find(|r| r.frame_id == id)
    }

    pub fn animations(&self) -> &[ExportedAnimation] {
        &self.animations
    }

    pub fn settings(&self) -> &SheetExportSettings {
        &self.settings
    }

    pub fn reused_frames(&self) -> usize {
        self.reused_frames
    }

    /// Write `<base>.png` and, when JSON export is enabled, `<base>.json`.
    ///
    /// Returns the paths written, image first.
    pub fn save_to_disk(&self, base: &Path) -> Result<Vec<PathBuf>> {
        if let Some(parent) = base.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let png_path = with_suffix(base, ".png");
        self.sheet.save_with_format(&png_path, image::ImageFormat::Png)?;
        let mut written = vec![png_path.clone()];

        if self.settings.export_json {
            let json_path = with_suffix(base, ".json");
            JsonExporter::new().export(self, &json_path, &png_path, &ExportOptions::default())?;
            written.push(json_path);
        }

        debug!(base = %base.display(), files = written.len(), "saved sheet");
        Ok(written)
    }
}

/// Append a suffix to the full file name, keeping any dots already in it.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
