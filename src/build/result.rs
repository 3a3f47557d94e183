//! Batch export result types.
//!
//! Contains types for representing the outcome of exporting a set of sheets.

use std::path::PathBuf;
use std::time::Duration;

/// Status of a single sheet export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetStatus {
    /// Sheet exported
    Success,
    /// Export failed with error
    Failed(String),
    /// Batch was cancelled before the sheet started
    Cancelled,
}

impl SheetStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, SheetStatus::Success)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, SheetStatus::Failed(_))
    }

    /// Short machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetStatus::Success => "success",
            SheetStatus::Failed(_) => "failed",
            SheetStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetStatus::Success => write!(f, "success"),
            SheetStatus::Failed(err) => write!(f, "failed: {}", err),
            SheetStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of exporting a single sheet.
#[derive(Debug, Clone)]
pub struct SheetResult {
    /// Sheet name
    pub sheet: String,
    /// Export status
    pub status: SheetStatus,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Sheet image size, when the sheet was rasterized
    pub dimensions: Option<(u32, u32)>,
    /// Frames that reused another frame's region
    pub reused_frames: usize,
    /// Export duration
    pub duration: Duration,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
}

impl SheetResult {
    /// Create a successful result.
    pub fn success(sheet: String, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self {
            sheet,
            status: SheetStatus::Success,
            outputs,
            dimensions: None,
            reused_frames: 0,
            duration,
            warnings: vec![],
        }
    }

    /// Create a failed result.
    pub fn failed(sheet: String, error: String, duration: Duration) -> Self {
        Self {
            sheet,
            status: SheetStatus::Failed(error),
            outputs: vec![],
            dimensions: None,
            reused_frames: 0,
            duration,
            warnings: vec![],
        }
    }

    /// Create a cancelled result.
    pub fn cancelled(sheet: String) -> Self {
        Self {
            sheet,
            status: SheetStatus::Cancelled,
            outputs: vec![],
            dimensions: None,
            reused_frames: 0,
            duration: Duration::ZERO,
            warnings: vec![],
        }
    }

    /// Record the sheet size and reuse count.
    pub fn with_sheet_info(mut self, dimensions: (u32, u32), reused_frames: usize) -> Self {
        self.dimensions = Some(dimensions);
        self.reused_frames = reused_frames;
        self
    }

    /// Add warnings to the result.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete batch export.
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Results for each sheet, in bundle order
    pub sheets: Vec<SheetResult>,
    /// Total batch duration
    pub total_duration: Duration,
}

impl ExportResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet result.
    pub fn add_result(&mut self, result: SheetResult) {
        self.sheets.push(result);
    }

    /// Get the number of exported sheets.
    pub fn success_count(&self) -> usize {
        self.sheets.iter().filter(|r| r.status.is_success()).count()
    }

    /// Get the number of failed sheets.
    pub fn failed_count(&self) -> usize {
        self.sheets.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Get the number of sheets skipped by cancellation.
    pub fn cancelled_count(&self) -> usize {
        self.sheets.iter().filter(|r| r.status == SheetStatus::Cancelled).count()
    }

    /// True when every sheet was exported.
    pub fn is_success(&self) -> bool {
        self.sheets.iter().all(|r| r.status.is_success())
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.sheets.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.sheets.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get failed sheet results.
    pub fn failures(&self) -> Vec<&SheetResult> {
        self.sheets.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the batch.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let failed = self.failed_count();
        let cancelled = self.cancelled_count();
        let total = self.sheets.len();

        if failed > 0 {
            lines.push(format!(
                "Export failed: {} exported, {} failed, {} cancelled ({} total)",
                success, failed, cancelled, total
            ));
            for sheet in self.failures() {
                lines.push(format!("  - {}: {}", sheet.sheet, sheet.status));
            }
        } else if cancelled > 0 {
            lines.push(format!("Export cancelled: {} exported, {} cancelled ({} total)", success, cancelled, total));
        } else {
            lines.push(format!("Export succeeded: {} sheets in {:?}", total, self.total_duration));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
