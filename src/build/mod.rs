//! Batch export of every sheet in a bundle.
//!
//! # Overview
//!
//! - **Context**: configuration and resolved paths of one run
//! - **Pipeline**: pack, rasterize and save a single sheet
//! - **Parallel**: run the pipeline for many sheets on a bounded worker pool
//! - **Progress**: per-sheet and overall progress events
//!
//! # Example
//!
//! ```ignore
//! use pixelaria::build::{BuildContext, ParallelExport};
//! use pixelaria::config::load_config;
//! use pixelaria::project::load_bundle;
//!
//! let config = load_config(None)?;
//! let bundle = load_bundle(&config, &project_root)?;
//! let context = BuildContext::new(config, project_root);
//! let result = ParallelExport::new(context).run(&bundle);
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod parallel;
pub mod pipeline;
pub mod progress;
pub mod result;

pub use context::*;
pub use parallel::*;
pub use pipeline::*;
pub use progress::*;
pub use result::*;

use crate::bounds::BoundsError;
use crate::bundle::BundleError;
use crate::export::ExportError;
use thiserror::Error;

/// Error raised by a single sheet export.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error("packing failed: {0}")]
    Packing(#[from] BoundsError),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
