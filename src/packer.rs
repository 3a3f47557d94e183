//! Placement policies that assign each atlas frame a rectangle on the sheet.
//!
//! [`ShelfPacker`] is the default policy: frames (optionally trimmed and
//! deduplicated) are laid out on horizontal shelves, trying one or several
//! shelf widths and keeping the best-scoring layout.

use crate::atlas::{next_power_of_two, TextureAtlas};
use crate::bounds::{BoundsError, FrameBoundsMap};
use crate::models::{Frame, Rect};
use crate::reuse::{count_reused, find_identical_images};
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// A policy that fills in the bounds and origin rectangles of an atlas.
pub trait SheetPacker {
    /// Assign a placement to every frame and update the atlas metrics.
    fn pack(&self, atlas: &mut TextureAtlas<'_>) -> Result<(), BoundsError>;
}

/// Shelf-based bin packing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShelfPacker;

impl ShelfPacker {
    pub fn new() -> Self {
        Self
    }
}

/// A rectangle to place, identified by its atlas index.
#[derive(Debug, Clone, Copy)]
struct Cell {
    index: usize,
    width: u32,
    height: u32,
}

/// A shelf in the shelf packing algorithm
#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    width_used: u32,
}

/// Cell positions for one candidate shelf width.
#[derive(Debug)]
struct Layout {
    positions: Vec<(u32, u32)>,
    width: u32,
    height: u32,
}

impl SheetPacker for ShelfPacker {
    #[tracing::instrument(skip_all, fields(atlas = atlas.name(), frames = atlas.frame_count()))]
    fn pack(&self, atlas: &mut TextureAtlas<'_>) -> Result<(), BoundsError> {
        let settings = atlas.settings().clone();
        let frames: Vec<&Frame> = atlas.slots().iter().map(|s| s.frame).collect();
        let composed: Vec<RgbaImage> = frames.par_iter().map(|f| f.composed()).collect();

        let trim = settings.force_minimum_dimensions && !settings.use_uniform_grid;
        let origins: Vec<Rect> = frames
            .iter()
            .zip(&composed)
            .map(|(frame, image)| if trim { trimmed_bounds(image) } else { frame.extent() })
            .collect();

        let canonical = if settings.reuse_identical_frames {
            find_identical_images(&frames, &composed)
        } else {
            vec![None; frames.len()]
        };

        let uniform = (
            origins.iter().map(|o| o.width).max().unwrap_or(0) as u32,
            origins.iter().map(|o| o.height).max().unwrap_or(0) as u32,
        );

        let mut cells: Vec<Cell> = (0..frames.len())
            .filter(|&i| canonical[i].is_none())
            .map(|i| {
                let (w, h) = if settings.use_uniform_grid {
                    uniform
                } else {
                    (origins[i].width as u32, origins[i].height as u32)
                };
                Cell { index: i, width: w + settings.x_padding, height: h + settings.y_padding }
            })
            .collect();

        if settings.allow_unordered_frames {
            cells.sort_by(|a, b| {
                b.height.cmp(&a.height).then(b.width.cmp(&a.width)).then(a.index.cmp(&b.index))
            });
        }

        let candidates = candidate_widths(
            &cells,
            settings.high_precision_area_matching,
            settings.force_power_of_two,
        );
        let score = |layout: &Layout| {
            let (w, h) = if settings.force_power_of_two {
                (next_power_of_two(layout.width), next_power_of_two(layout.height))
            } else {
                (layout.width, layout.height)
            };
            let area = w as u64 * h as u64;
            let squareness = w.abs_diff(h) as u64;
            if settings.favor_ratio_over_area {
                (squareness, area)
            } else {
                (area, squareness)
            }
        };
        let layout = candidates
            .iter()
            .map(|&width| shelf_layout(&cells, width, settings.allow_unordered_frames))
            .min_by_key(|layout| score(layout));

        let mut bounds = vec![Rect::default(); frames.len()];
        if let Some(layout) = &layout {
            debug!(
                width = layout.width,
                height = layout.height,
                candidates = candidates.len(),
                "selected shelf layout"
            );
            let (pad_x, pad_y) = ((settings.x_padding / 2) as i32, (settings.y_padding / 2) as i32);
            for (cell, &(x, y)) in cells.iter().zip(&layout.positions) {
                let origin = origins[cell.index];
                bounds[cell.index] = Rect::new(x as i32 + pad_x, y as i32 + pad_y, origin.width, origin.height);
            }
        }
        for i in 0..frames.len() {
            if let Some(original) = canonical[i] {
                bounds[i] = bounds[original];
            }
        }

        // Nothing is written to the atlas until the registry accepts every frame
        let bounds_map = build_bounds_map(&frames, &canonical, &origins, &bounds)?;
        for (slot, (bounds, origin)) in atlas.slots_mut().iter_mut().zip(bounds.iter().zip(&origins)) {
            slot.bounds = *bounds;
            slot.origin = *origin;
        }
        atlas.set_bounds_map(bounds_map);
        atlas.compute_sheet_size();
        atlas.info_mut().reused_frames = count_reused(&canonical);

        debug!(
            width = atlas.info().width,
            height = atlas.info().height,
            reused = atlas.info().reused_frames,
            "packed atlas"
        );
        Ok(())
    }
}

/// Bounds of the non-empty content of an image.
///
/// A pixel counts as empty only when all four bytes are zero, so trimmed
/// borders can be restored exactly. A fully empty image trims to its
/// top-left pixel.
pub fn trimmed_bounds(image: &RgbaImage) -> Rect {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0 != [0, 0, 0, 0] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return Rect::from_size(1, 1);
    }
    Rect::new(min_x as i32, min_y as i32, (max_x - min_x + 1) as i32, (max_y - min_y + 1) as i32)
}

/// Shelf widths worth trying for the given cells.
fn candidate_widths(cells: &[Cell], high_precision: bool, power_of_two: bool) -> Vec<u32> {
    if cells.is_empty() {
        return vec![];
    }

    let widest = cells.iter().map(|c| c.width).max().unwrap_or(1).max(1);
    let total_width: u32 = cells.iter().map(|c| c.width).sum();
    let area: u64 = cells.iter().map(|c| c.width as u64 * c.height as u64).sum();
    let square = widest.max((area as f64).sqrt().ceil() as u32);

    if !high_precision {
        return vec![square];
    }

    let mut widths = BTreeSet::from([widest, square, total_width.max(widest)]);
    let mut prefix = 0;
    for cell in cells {
        prefix += cell.width;
        if prefix >= widest {
            widths.insert(prefix);
        }
    }
    if power_of_two {
        let mut p = next_power_of_two(widest);
        while p < total_width {
            widths.insert(p);
            p *= 2;
        }
    }
    widths.into_iter().collect()
}

/// Place cells on shelves no wider than `max_width` (a single cell may exceed it).
///
/// In ordered mode only the newest shelf accepts cells, so placement follows
/// the cell order row by row.
fn shelf_layout(cells: &[Cell], max_width: u32, unordered: bool) -> Layout {
    let mut shelves: Vec<Shelf> = vec![];
    let mut positions = Vec::with_capacity(cells.len());

    for cell in cells {
        positions.push(try_place_in_shelves(&mut shelves, cell.width, cell.height, max_width, unordered));
    }

    let width = shelves.iter().map(|s| s.width_used).max().unwrap_or(0);
    let height = shelves.last().map(|s| s.y + s.height).unwrap_or(0);
    Layout { positions, width, height }
}

/// Put a cell in the first shelf with room, or open a new shelf.
fn try_place_in_shelves(
    shelves: &mut Vec<Shelf>,
    width: u32,
    height: u32,
    max_width: u32,
    unordered: bool,
) -> (u32, u32) {
    let open = if unordered { 0 } else { shelves.len().saturating_sub(1) };
    for shelf in shelves.iter_mut().skip(open) {
        let fits_height = height <= shelf.height || !unordered;
        if fits_height && shelf.width_used + width <= max_width {
            let x = shelf.width_used;
            shelf.width_used += width;
            shelf.height = shelf.height.max(height);
            return (x, shelf.y);
        }
    }

    let y = shelves.last().map(|s| s.y + s.height).unwrap_or(0);
    shelves.push(Shelf { y, height, width_used: width });
    (0, y)
}

/// Mirror a packing result into a bounds registry: one slot per unique region.
fn build_bounds_map(
    frames: &[&Frame],
    canonical: &[Option<usize>],
    origins: &[Rect],
    bounds: &[Rect],
) -> Result<FrameBoundsMap, BoundsError> {
    let mut map = FrameBoundsMap::new();

    for (i, frame) in frames.iter().enumerate() {
        if canonical[i].is_some() {
            continue;
        }
        let group: Vec<&Frame> = frames
            .iter()
            .enumerate()
            .filter(|&(j, _)| j == i || canonical[j] == Some(i))
            .map(|(_, f)| *f)
            .collect();
        map.register_frames(&group, origins[i])?;
        map.set_sheet_bounds_for_frame(frame, bounds[i])?;
    }

    Ok(map)
}
