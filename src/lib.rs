//! Pixelaria - sprite sheet packing and export for pixel-art animations
//!
//! This library provides functionality to:
//! - Pack the frames of one or more animations into a single sheet
//! - Share sheet regions between pixel-identical frames
//! - Export the sheet as PNG plus a JSON descriptor and slice it back again
//! - Export every sheet of a project concurrently

pub mod atlas;
pub mod bounds;
pub mod build;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod export;
pub mod models;
pub mod packer;
pub mod project;
pub mod reuse;
