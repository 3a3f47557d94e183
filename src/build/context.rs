//! Build context containing configuration and state for a batch export.

use crate::config::PixelariaConfig;
use std::path::{Path, PathBuf};

/// Configuration plus resolved paths for one export run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: PixelariaConfig,
    /// Project root directory (where pixelaria.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: PixelariaConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PixelariaConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the animation source directory (resolved against the root).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved against the root).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Base output path for a sheet; `.png`/`.json` are appended on save.
    pub fn sheet_base_path(&self, sheet_name: &str) -> PathBuf {
        self.out_dir().join(sheet_name)
    }

    /// Configured worker count, if any.
    pub fn jobs(&self) -> Option<usize> {
        self.config.build.jobs
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::resolve_path(&self.project_root, path)
    }
}
