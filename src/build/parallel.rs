//! Parallel batch export.
//!
//! Every sheet of a bundle is an independent unit of work. Workers pull the
//! next sheet index from a shared counter, so at most `jobs` sheets are in
//! flight at once. Results are returned in bundle order regardless of which
//! worker finished first.
//!
//! A failing or panicking sheet only fails itself. Cancellation is checked before a sheet
//! starts; sheets that never started are reported as cancelled.
//!
//! # Example
//!
//! ```ignore
//! use pixelaria::build::{BuildContext, ParallelExport};
//!
//! let export = ParallelExport::new(context).with_jobs(4);
//! let cancel = export.cancel_token();
//! let result = export.run(&bundle)?;
//! println!("Exported {} sheets in {:?}", result.success_count(), result.total_duration);
//! ```

use crate::build::{
    export_sheet, BuildContext, BuildError, ExportResult, NullProgress, ProgressEvent, ProgressReporter,
    ProgressTracker, SheetResult,
};
use crate::bundle::{AnimationSheet, Bundle};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Shared flag used to stop a batch between sheets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Sheets already running finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parallel batch exporter.
pub struct ParallelExport {
    context: BuildContext,
    jobs: usize,
    cancel: CancelToken,
    reporter: Arc<dyn ProgressReporter>,
}

impl ParallelExport {
    /// Create a new exporter; the worker count comes from the config or the CPU count.
    pub fn new(context: BuildContext) -> Self {
        let jobs = context.jobs().unwrap_or_else(default_jobs).max(1);
        Self { context, jobs, cancel: CancelToken::new(), reporter: Arc::new(NullProgress::new()) }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set the progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use an existing cancel token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this exporter's batches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Export every sheet of the bundle.
    pub fn run(&self, bundle: &Bundle) -> Result<ExportResult, BuildError> {
        self.run_sheets(bundle, bundle.sheets())
    }

    /// Export the given sheets, resolving their animations in `bundle`.
    pub fn run_sheets(&self, bundle: &Bundle, sheets: &[AnimationSheet]) -> Result<ExportResult, BuildError> {
        let start = Instant::now();
        std::fs::create_dir_all(self.context.out_dir())?;

        let mut tracker = ProgressTracker::new();
        tracker.start(sheets.len());
        let tracker = Mutex::new(tracker);

        self.reporter.report(ProgressEvent::BatchStarted { total_sheets: sheets.len() });
        debug!(sheets = sheets.len(), jobs = self.jobs, "starting batch export");

        let mut indexed: Vec<(usize, SheetResult)> = if self.jobs == 1 || sheets.len() <= 1 {
            sheets.iter().enumerate().map(|(i, sheet)| (i, self.run_one(i, sheet, bundle, &tracker))).collect()
        } else {
            self.execute_parallel(sheets, bundle, &tracker)
        };
        indexed.sort_by_key(|(i, _)| *i);

        let mut result = ExportResult::new();
        for (_, sheet_result) in indexed {
            result.add_result(sheet_result);
        }
        result.total_duration = start.elapsed();

        let completed = lock_tracker(&tracker).batch_completed_event();
        self.reporter.report(completed);
        Ok(result)
    }

    /// Run sheets on scoped worker threads.
    ///
    /// Results go into a shared list as soon as each sheet finishes.
    fn execute_parallel(
        &self,
        sheets: &[AnimationSheet],
        bundle: &Bundle,
        tracker: &Mutex<ProgressTracker>,
    ) -> Vec<(usize, SheetResult)> {
        let next_idx = AtomicUsize::new(0);
        let next_idx = &next_idx;
        let collected = Mutex::new(Vec::with_capacity(sheets.len()));
        let results = &collected;
        let num_workers = self.jobs.min(sheets.len());

        std::thread::scope(|s| {
            for _ in 0..num_workers {
                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= sheets.len() {
                        break;
                    }
                    let result = self.run_one(idx, &sheets[idx], bundle, tracker);
                    results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
                });
            }
        });

        collected.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Export one sheet and record its completion. A panic while exporting
    /// fails this sheet only.
    fn run_one(
        &self,
        index: usize,
        sheet: &AnimationSheet,
        bundle: &Bundle,
        tracker: &Mutex<ProgressTracker>,
    ) -> SheetResult {
        let start = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.export_one(index, sheet, bundle, tracker))) {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("panicked during export: {}", panic_message(payload.as_ref()));
                error!(sheet = %sheet.name, "{}", message);
                SheetResult::failed(sheet.name.clone(), message, start.elapsed())
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| self.finish(index, &result, tracker))).is_err() {
            error!(sheet = %sheet.name, "progress reporter panicked");
        }
        result
    }

    /// Export one sheet, reporting progress along the way.
    fn export_one(
        &self,
        index: usize,
        sheet: &AnimationSheet,
        bundle: &Bundle,
        tracker: &Mutex<ProgressTracker>,
    ) -> SheetResult {
        if self.cancel.is_cancelled() {
            return SheetResult::cancelled(sheet.name.clone());
        }

        let start = Instant::now();
        lock_tracker(tracker).sheet_started(&sheet.name);
        self.reporter.report(ProgressEvent::SheetStarted { sheet: sheet.name.clone() });

        let mut warnings = Vec::new();
        if sheet.animation_ids.is_empty() {
            let message = "sheet has no animations".to_string();
            warn!(sheet = %sheet.name, "{}", message);
            self.reporter.report(ProgressEvent::Warning { sheet: Some(sheet.name.clone()), message: message.clone() });
            warnings.push(message);
        }

        let mut last_percent = None;
        let mut on_progress = |percent: u8| {
            if last_percent == Some(percent) {
                return;
            }
            last_percent = Some(percent);
            self.reporter.report(ProgressEvent::SheetProgress { sheet: sheet.name.clone(), percent });
            let overall = lock_tracker(tracker).update(index, percent);
            self.reporter.report(ProgressEvent::OverallProgress { percent: overall });
        };

        let base = self.context.sheet_base_path(&sheet.name);
        match export_sheet(bundle, sheet, &base, &mut on_progress) {
            Ok(output) => SheetResult::success(sheet.name.clone(), output.outputs, start.elapsed())
                .with_sheet_info(output.dimensions, output.reused_frames),
            Err(e) => {
                error!(sheet = %sheet.name, error = %e, "sheet export failed");
                self.reporter.report(ProgressEvent::Error { sheet: Some(sheet.name.clone()), message: e.to_string() });
                SheetResult::failed(sheet.name.clone(), e.to_string(), start.elapsed())
            }
        }
        .with_warnings(warnings)
    }

    fn finish(&self, index: usize, result: &SheetResult, tracker: &Mutex<ProgressTracker>) {
        let overall = {
            let mut tracker = lock_tracker(tracker);
            tracker.sheet_completed(index, &result.sheet, &result.status);
            tracker.overall_percent()
        };

        self.reporter.report(ProgressEvent::SheetCompleted {
            sheet: result.sheet.clone(),
            status: result.status.clone(),
            duration_ms: result.duration.as_millis() as u64,
        });
        self.reporter.report(ProgressEvent::OverallProgress { percent: overall });
    }
}

/// The tracker only holds counters, so a poisoned lock is still usable.
fn lock_tracker(tracker: &Mutex<ProgressTracker>) -> MutexGuard<'_, ProgressTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SheetStatus;
    use crate::config::default_config;
    use crate::models::{Animation, AnimationId, Frame, FrameId};
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    /// Records every event it receives.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Cancels the batch as soon as the first sheet completes.
    struct CancelAfterFirst(CancelToken);

    impl ProgressReporter for CancelAfterFirst {
        fn report(&self, event: ProgressEvent) {
            if matches!(event, ProgressEvent::SheetCompleted { .. }) {
                self.0.cancel();
            }
        }
    }

    /// Panics when the named sheet starts; keeps the batch summary event.
    struct PanicOnSheet {
        sheet: &'static str,
        batch: Mutex<Option<ProgressEvent>>,
    }

    impl PanicOnSheet {
        fn new(sheet: &'static str) -> Self {
            Self { sheet, batch: Mutex::new(None) }
        }
    }

    impl ProgressReporter for PanicOnSheet {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::SheetStarted { sheet } = &event {
                if *sheet == self.sheet {
                    panic!("reporter failure on {}", sheet);
                }
            }
            if matches!(event, ProgressEvent::BatchCompleted { .. }) {
                *self.batch.lock().unwrap() = Some(event);
            }
        }
    }

    fn bundle(sheet_count: usize) -> Bundle {
        let mut bundle = Bundle::new("test");
        for s in 0..sheet_count {
            let id = bundle.next_animation_id();
            let mut anim = Animation::new(id, format!("anim{}", s), 4, 4);
            for i in 0..3 {
                let frame_id = bundle.next_frame_id();
                let image = RgbaImage::from_pixel(4, 4, Rgba([s as u8, i as u8, 0, 255]));
                anim.push_frame(Frame::new(frame_id, image));
            }
            bundle.add_animation(anim).unwrap();

            let mut sheet = AnimationSheet::new(s as i32, format!("sheet{}", s));
            sheet.add_animation(id);
            bundle.add_sheet(sheet);
        }
        bundle
    }

    fn context(temp: &TempDir) -> BuildContext {
        BuildContext::new(default_config(), temp.path().to_path_buf())
    }

    #[test]
    fn test_jobs_setting() {
        let temp = TempDir::new().unwrap();
        let export = ParallelExport::new(context(&temp)).with_jobs(4);
        assert_eq!(export.jobs(), 4);

        let export = ParallelExport::new(context(&temp)).with_jobs(0);
        assert_eq!(export.jobs(), 1);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_parallel_export_all_sheets() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(6);

        let result = ParallelExport::new(context(&temp)).with_jobs(3).run(&bundle).unwrap();

        assert!(result.is_success());
        assert_eq!(result.success_count(), 6);
        let names: Vec<&str> = result.sheets.iter().map(|r| r.sheet.as_str()).collect();
        assert_eq!(names, vec!["sheet0", "sheet1", "sheet2", "sheet3", "sheet4", "sheet5"]);
        for i in 0..6 {
            assert!(temp.path().join("build").join(format!("sheet{}.png", i)).exists());
            assert!(temp.path().join("build").join(format!("sheet{}.json", i)).exists());
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let seq_dir = TempDir::new().unwrap();
        let par_dir = TempDir::new().unwrap();
        let bundle = bundle(4);

        ParallelExport::new(context(&seq_dir)).with_jobs(1).run(&bundle).unwrap();
        ParallelExport::new(context(&par_dir)).with_jobs(4).run(&bundle).unwrap();

        for i in 0..4 {
            let name = format!("build/sheet{}.png", i);
            let a = std::fs::read(seq_dir.path().join(&name)).unwrap();
            let b = std::fs::read(par_dir.path().join(&name)).unwrap();
            assert_eq!(a, b, "{} differs", name);
        }
    }

    #[test]
    fn test_partial_failure_isolated() {
        let temp = TempDir::new().unwrap();
        let mut bundle = bundle(3);
        let mut broken = AnimationSheet::new(10, "broken");
        broken.add_animation(AnimationId(99));
        bundle.add_sheet(broken);

        let result = ParallelExport::new(context(&temp)).with_jobs(2).run(&bundle).unwrap();

        assert_eq!(result.success_count(), 3);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.failures()[0].sheet, "broken");
        assert!(result.summary().contains("broken"));
    }

    #[test]
    fn test_cancel_before_run() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(3);
        let export = ParallelExport::new(context(&temp)).with_jobs(2);
        export.cancel_token().cancel();

        let result = export.run(&bundle).unwrap();
        assert_eq!(result.cancelled_count(), 3);
        assert!(!result.is_success());
        assert!(!temp.path().join("build/sheet0.png").exists());
    }

    #[test]
    fn test_cancel_between_sheets() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(3);
        let token = CancelToken::new();

        let result = ParallelExport::new(context(&temp))
            .with_jobs(1)
            .with_cancel_token(token.clone())
            .with_reporter(Arc::new(CancelAfterFirst(token)))
            .run(&bundle)
            .unwrap();

        let statuses: Vec<&SheetStatus> = result.sheets.iter().map(|r| &r.status).collect();
        assert_eq!(statuses, vec![&SheetStatus::Success, &SheetStatus::Cancelled, &SheetStatus::Cancelled]);
    }

    #[test]
    fn test_progress_events() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(2);
        let reporter = Arc::new(RecordingProgress::default());

        ParallelExport::new(context(&temp)).with_jobs(2).with_reporter(reporter.clone()).run(&bundle).unwrap();

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.first(), Some(&ProgressEvent::BatchStarted { total_sheets: 2 }));
        assert!(matches!(events.last(), Some(ProgressEvent::BatchCompleted { success: true, succeeded: 2, .. })));

        let started = events.iter().filter(|e| matches!(e, ProgressEvent::SheetStarted { .. })).count();
        let completed = events.iter().filter(|e| matches!(e, ProgressEvent::SheetCompleted { .. })).count();
        assert_eq!((started, completed), (2, 2));

        let overall: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::OverallProgress { percent } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(overall.contains(&100));
        assert!(overall.iter().all(|&p| p <= 100));
    }

    #[test]
    fn test_empty_sheet_warns() {
        let temp = TempDir::new().unwrap();
        let mut bundle = bundle(0);
        bundle.add_sheet(AnimationSheet::new(0, "empty"));

        let result = ParallelExport::new(context(&temp)).run(&bundle).unwrap();
        assert!(result.is_success());
        assert_eq!(result.all_warnings().len(), 1);
    }

    fn assert_only_sheet2_failed(temp: &TempDir, result: &ExportResult, reporter: &PanicOnSheet) {
        let statuses: Vec<bool> = result.sheets.iter().map(|r| r.is_success()).collect();
        assert_eq!(statuses, vec![true, true, false, true]);
        match &result.sheets[2].status {
            SheetStatus::Failed(message) => assert!(message.contains("reporter failure on sheet2")),
            other => panic!("expected failure, got {:?}", other),
        }
        for i in [0, 1, 3] {
            assert!(temp.path().join("build").join(format!("sheet{}.png", i)).exists());
        }

        let batch = reporter.batch.lock().unwrap().clone();
        match batch {
            Some(ProgressEvent::BatchCompleted { succeeded, failed, cancelled, success, .. }) => {
                assert_eq!((succeeded, failed, cancelled), (3, 1, 0));
                assert!(!success);
            }
            other => panic!("expected BatchCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_panicking_sheet_fails_alone_in_parallel() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(4);
        let reporter = Arc::new(PanicOnSheet::new("sheet2"));

        let result =
            ParallelExport::new(context(&temp)).with_jobs(2).with_reporter(reporter.clone()).run(&bundle).unwrap();

        assert_only_sheet2_failed(&temp, &result, &reporter);
    }

    #[test]
    fn test_panicking_sheet_fails_alone_sequentially() {
        let temp = TempDir::new().unwrap();
        let bundle = bundle(4);
        let reporter = Arc::new(PanicOnSheet::new("sheet2"));

        let result =
            ParallelExport::new(context(&temp)).with_jobs(1).with_reporter(reporter.clone()).run(&bundle).unwrap();

        assert_only_sheet2_failed(&temp, &result, &reporter);
    }
}
