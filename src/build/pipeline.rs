//! Export pipeline for a single sheet.
//!
//! One sheet goes through four steps: collect the frames of its animations
//! into an atlas, pack the atlas, rasterize it, and save the image and
//! descriptor. Batches run this pipeline once per sheet (see
//! [`ParallelExport`](crate::build::ParallelExport)).

use crate::build::BuildError;
use crate::bundle::{AnimationSheet, Bundle};
use crate::export::BundleSheetExport;
use crate::packer::{SheetPacker, ShelfPacker};
use std::path::{Path, PathBuf};
use tracing::info;

/// What a finished sheet export produced.
#[derive(Debug, Clone)]
pub struct SheetOutput {
    /// Files written, image first
    pub outputs: Vec<PathBuf>,
    /// Sheet image size
    pub dimensions: (u32, u32),
    /// Number of frames on the sheet
    pub frame_count: usize,
    /// Frames that reused another frame's region
    pub reused_frames: usize,
}

/// Pack, rasterize and save one sheet to `<base>.png` / `<base>.json`.
///
/// `on_progress` receives rasterization percentages.
#[tracing::instrument(skip_all, fields(sheet = %sheet.name))]
pub fn export_sheet(
    bundle: &Bundle,
    sheet: &AnimationSheet,
    base: &Path,
    on_progress: &mut dyn FnMut(u8),
) -> Result<SheetOutput, BuildError> {
    let mut atlas = bundle.atlas_for_sheet(sheet)?;
    ShelfPacker::new().pack(&mut atlas)?;

    let export = BundleSheetExport::from_atlas_with_progress(&atlas, on_progress);
    let outputs = export.save_to_disk(base)?;

    let output = SheetOutput {
        outputs,
        dimensions: export.sheet().dimensions(),
        frame_count: atlas.frame_count(),
        reused_frames: export.reused_frames(),
    };

    info!(
        width = output.dimensions.0,
        height = output.dimensions.1,
        frames = output.frame_count,
        reused = output.reused_frames,
        efficiency = atlas.info().efficiency(),
        "exported sheet"
    );
    Ok(output)
}
