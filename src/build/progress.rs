//! Batch export progress reporting.
//!
//! Workers report [`ProgressEvent`]s through a shared [`ProgressReporter`].
//! Console and JSON-lines reporters are provided; [`ProgressTracker`] folds
//! per-sheet percentages into one overall percentage.
//!
//! # Example
//!
//! ```ignore
//! use pixelaria::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BatchStarted { total_sheets: 2 });
//! reporter.report(ProgressEvent::SheetStarted { sheet: "characters".to_string() });
//! ```

use crate::build::SheetStatus;
use serde_json::json;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Events that can be reported during a batch export.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Batch started
    BatchStarted {
        /// Number of sheets in the batch
        total_sheets: usize,
    },
    /// A sheet export started
    SheetStarted { sheet: String },
    /// Rasterization progress of one sheet
    SheetProgress { sheet: String, percent: u8 },
    /// Mean progress over every sheet of the batch
    OverallProgress { percent: u8 },
    /// A sheet export finished
    SheetCompleted {
        sheet: String,
        status: SheetStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Batch finished
    BatchCompleted {
        /// Whether every sheet was exported
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
    },
    /// A warning was generated
    Warning {
        /// Sheet that generated the warning (if applicable)
        sheet: Option<String>,
        message: String,
    },
    /// An error occurred
    Error {
        /// Sheet that generated the error (if applicable)
        sheet: Option<String>,
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    current: AtomicUsize,
    total: AtomicUsize,
    /// Output writer (stderr unless replaced)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        Self {
            use_colors: std::io::stderr().is_terminal(),
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total_sheets } => {
                self.total.store(total_sheets, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_sheets > 0 {
                    self.writeln(&format!(
                        "{} Exporting {} sheet{}...",
                        self.cyan("[export]"),
                        total_sheets,
                        if total_sheets == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::SheetStarted { sheet } => {
                if self.verbose {
                    self.writeln(&format!("{} Packing {}...", self.cyan("[export]"), sheet));
                }
            }
            ProgressEvent::SheetProgress { sheet, percent } => {
                if self.verbose {
                    self.writeln(&format!("{} {} {}%", self.cyan("[export]"), sheet, percent));
                }
            }
            ProgressEvent::OverallProgress { .. } => {}
            ProgressEvent::SheetCompleted { sheet, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    SheetStatus::Success => self.green("ok"),
                    SheetStatus::Cancelled => self.yellow("cancelled"),
                    SheetStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[export]"),
                    current,
                    total,
                    status_str,
                    sheet,
                    format_duration(duration_ms)
                ));

                if let SheetStatus::Failed(err) = status {
                    self.writeln(&format!("        {}", self.red(&err)));
                }
            }
            ProgressEvent::BatchCompleted { success, duration_ms, succeeded, failed, cancelled } => {
                let duration_str = format_duration(duration_ms);
                if success {
                    self.writeln(&format!(
                        "\n{} {} {} exported in {}",
                        self.green("[done]"),
                        succeeded,
                        if succeeded == 1 { "sheet" } else { "sheets" },
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Export incomplete: {} succeeded, {} failed, {} cancelled in {}",
                        self.red("[error]"),
                        succeeded,
                        failed,
                        cancelled,
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { sheet, message } => {
                let prefix = sheet.map(|s| format!("{}: ", s)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { sheet, message } => {
                let prefix = sheet.map(|s| format!("{}: ", s)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: &serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BatchStarted { total_sheets } => {
                json!({ "event": "batch_started", "total_sheets": total_sheets })
            }
            ProgressEvent::SheetStarted { sheet } => json!({ "event": "sheet_started", "sheet": sheet }),
            ProgressEvent::SheetProgress { sheet, percent } => {
                json!({ "event": "sheet_progress", "sheet": sheet, "percent": percent })
            }
            ProgressEvent::OverallProgress { percent } => json!({ "event": "overall_progress", "percent": percent }),
            ProgressEvent::SheetCompleted { sheet, status, duration_ms } => {
                let mut value = json!({
                    "event": "sheet_completed",
                    "sheet": sheet,
                    "status": status.as_str(),
                    "duration_ms": duration_ms,
                });
                if let SheetStatus::Failed(error) = status {
                    value["error"] = json!(error);
                }
                value
            }
            ProgressEvent::BatchCompleted { success, duration_ms, succeeded, failed, cancelled } => json!({
                "event": "batch_completed",
                "success": success,
                "duration_ms": duration_ms,
                "succeeded": succeeded,
                "failed": failed,
                "cancelled": cancelled,
            }),
            ProgressEvent::Warning { sheet, message } => {
                let mut value = json!({ "event": "warning", "message": message });
                if let Some(sheet) = sheet {
                    value["sheet"] = json!(sheet);
                }
                value
            }
            ProgressEvent::Error { sheet, message } => {
                let mut value = json!({ "event": "error", "message": message });
                if let Some(sheet) = sheet {
                    value["sheet"] = json!(sheet);
                }
                value
            }
        };
        self.write_json(&value);
    }
}

/// Aggregates per-sheet state of a batch.
///
/// The overall percentage is the mean of the per-sheet percentages.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    start_time: Option<Instant>,
    percentages: Vec<u8>,
    completed: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    in_progress: Vec<String>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a batch of `total_sheets` sheets.
    pub fn start(&mut self, total_sheets: usize) {
        self.start_time = Some(Instant::now());
        self.percentages = vec![0; total_sheets];
        self.completed = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.cancelled = 0;
        self.in_progress.clear();
    }

    /// Mark a sheet as started.
    pub fn sheet_started(&mut self, sheet: &str) {
        self.in_progress.push(sheet.to_string());
    }

    /// Record progress of sheet `index` and return the overall percentage.
    pub fn update(&mut self, index: usize, percent: u8) -> u8 {
        if let Some(slot) = self.percentages.get_mut(index) {
            *slot = percent.min(100);
        }
        self.overall_percent()
    }

    /// Mark sheet `index` as finished; it counts as 100% from now on.
    pub fn sheet_completed(&mut self, index: usize, sheet: &str, status: &SheetStatus) {
        self.in_progress.retain(|s| s != sheet);
        if let Some(slot) = self.percentages.get_mut(index) {
            *slot = 100;
        }
        self.completed += 1;
        match status {
            SheetStatus::Success => self.succeeded += 1,
            SheetStatus::Failed(_) => self.failed += 1,
            SheetStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// Mean of the per-sheet percentages (100 for an empty batch).
    pub fn overall_percent(&self) -> u8 {
        if self.percentages.is_empty() {
            return 100;
        }
        let sum: usize = self.percentages.iter().map(|&p| p as usize).sum();
        (sum / self.percentages.len()) as u8
    }

    /// Get the elapsed time since the batch started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Get the elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Check if every sheet finished.
    pub fn is_complete(&self) -> bool {
        self.completed >= self.percentages.len()
    }

    /// Check if every finished sheet was exported.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Get the sheets currently in progress.
    pub fn in_progress(&self) -> &[String] {
        &self.in_progress
    }

    /// Generate a BatchCompleted event from current state.
    pub fn batch_completed_event(&self) -> ProgressEvent {
        ProgressEvent::BatchCompleted {
            success: self.is_success(),
            duration_ms: self.elapsed_ms(),
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Writer sharing its buffer with the test.
    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured(output: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8_lossy(&output.lock().unwrap()).into_owned()
    }

    #[test]
    fn test_null_progress() {
        let reporter = NullProgress::new();
        reporter.report(ProgressEvent::BatchStarted { total_sheets: 10 });
        reporter.report(ProgressEvent::SheetStarted { sheet: "test".to_string() });
        assert!(!reporter.is_verbose());
    }

    #[test]
    fn test_console_progress_batch_started() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::BatchStarted { total_sheets: 5 });

        assert!(captured(&output).contains("Exporting 5 sheets"));
    }

    #[test]
    fn test_console_progress_sheet_completed() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::BatchStarted { total_sheets: 2 });
        reporter.report(ProgressEvent::SheetCompleted {
            sheet: "characters".to_string(),
            status: SheetStatus::Success,
            duration_ms: 150,
        });
        reporter.report(ProgressEvent::SheetCompleted {
            sheet: "effects".to_string(),
            status: SheetStatus::Failed("disk full".to_string()),
            duration_ms: 1500,
        });

        let text = captured(&output);
        assert!(text.contains("[1/2] ok characters (150ms)"));
        assert!(text.contains("[2/2] FAILED effects (1.5s)"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_console_progress_quiet_unless_verbose() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::SheetProgress { sheet: "a".to_string(), percent: 50 });
        assert!(captured(&output).is_empty());

        let verbose = ConsoleProgress::with_output(TestWriter(Arc::clone(&output))).with_verbose(true);
        verbose.report(ProgressEvent::SheetProgress { sheet: "a".to_string(), percent: 50 });
        assert!(captured(&output).contains("a 50%"));
        assert!(verbose.is_verbose());
    }

    #[test]
    fn test_console_progress_batch_completed_failed() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::BatchCompleted {
            success: false,
            duration_ms: 500,
            succeeded: 3,
            failed: 2,
            cancelled: 1,
        });

        let text = captured(&output);
        assert!(text.contains("[error]"));
        assert!(text.contains("3 succeeded, 2 failed, 1 cancelled"));
    }

    #[test]
    fn test_console_progress_warning() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::Warning {
            sheet: Some("characters".to_string()),
            message: "sheet has no frames".to_string(),
        });

        let text = captured(&output);
        assert!(text.contains("[warn] characters: sheet has no frames"));
    }

    #[test]
    fn test_json_progress_lines_parse() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = JsonProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::BatchStarted { total_sheets: 2 });
        reporter.report(ProgressEvent::SheetProgress { sheet: "a\"b".to_string(), percent: 40 });
        reporter.report(ProgressEvent::SheetCompleted {
            sheet: "a\"b".to_string(),
            status: SheetStatus::Failed("bad\nthing".to_string()),
            duration_ms: 3,
        });

        let text = captured(&output);
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "batch_started");
        assert_eq!(lines[0]["total_sheets"], 2);
        assert_eq!(lines[1]["sheet"], "a\"b");
        assert_eq!(lines[1]["percent"], 40);
        assert_eq!(lines[2]["status"], "failed");
        assert_eq!(lines[2]["error"], "bad\nthing");
    }

    #[test]
    fn test_json_progress_optional_sheet() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = JsonProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::Error { sheet: None, message: "oops".to_string() });

        let value: serde_json::Value = serde_json::from_str(captured(&output).trim()).unwrap();
        assert_eq!(value["event"], "error");
        assert!(value.get("sheet").is_none());
    }

    #[test]
    fn test_tracker_mean_percentage() {
        let mut tracker = ProgressTracker::new();
        tracker.start(4);
        assert_eq!(tracker.overall_percent(), 0);

        assert_eq!(tracker.update(0, 100), 25);
        assert_eq!(tracker.update(1, 50), 37);
        assert_eq!(tracker.update(9, 50), 37);
    }

    #[test]
    fn test_tracker_completion() {
        let mut tracker = ProgressTracker::new();
        tracker.start(3);
        tracker.sheet_started("a");
        tracker.sheet_started("b");
        assert_eq!(tracker.in_progress().len(), 2);

        tracker.sheet_completed(0, "a", &SheetStatus::Success);
        tracker.sheet_completed(1, "b", &SheetStatus::Failed("x".to_string()));
        assert!(!tracker.is_complete());
        tracker.sheet_completed(2, "c", &SheetStatus::Cancelled);

        assert!(tracker.is_complete());
        assert!(!tracker.is_success());
        assert_eq!(tracker.overall_percent(), 100);
        assert!(tracker.in_progress().is_empty());
        assert_eq!((tracker.succeeded(), tracker.failed(), tracker.cancelled()), (1, 1, 1));

        match tracker.batch_completed_event() {
            ProgressEvent::BatchCompleted { success, succeeded, failed, cancelled, .. } => {
                assert!(!success);
                assert_eq!((succeeded, failed, cancelled), (1, 1, 1));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_tracker_empty_batch() {
        let mut tracker = ProgressTracker::new();
        tracker.start(0);
        assert_eq!(tracker.overall_percent(), 100);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }
}
