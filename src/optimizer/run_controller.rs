//! # Run Controller Module
//!
//! Macchina a stati esposta al chiamante (GUI o CLI): Start, Stop e query dello stato.
//!
//! ## Stati:
//! - `Idle`: nessun run attivo (stato iniziale, e dopo un completamento naturale)
//! - `Running`: enumeratore e pool attivi
//! - `StopRequested`: Stop ricevuto, i task in corso finiscono, nessun nuovo dequeue
//! - `Stopped`: drain completato dopo uno Stop
//!
//! ## Transizioni:
//! - `start()` da `Idle`/`Stopped` → `Running`; da `Running`/`StopRequested` → `AlreadyRunning`
//! - `stop()` da `Running` → `StopRequested`; idempotente, non blocca mai
//! - drain completato → `Stopped` se era stato chiesto lo stop, altrimenti `Idle`
//!
//! ## Single writer:
//! Lo stato vive dietro un `Mutex` del controller; ogni transizione avviene con il
//! lock preso, quindi un solo Start/Stop alla volta viene osservato.
//!
//! ## Resume:
//! Nessuno stato persistito: un nuovo `start()` rifà l'enumerazione e il
//! classificatore salta ogni file il cui output esiste già.
//!
//! ## Esempio:
//! ```rust,ignore
//! let controller = RunController::new(Arc::new(ImageTranscoder::default()), Arc::new(SilentReporter));
//! controller.start(RunConfig::new("/photos", "/photos-small"))?;
//! // ... più tardi, da un handler di UI:
//! controller.stop();
//! let summary = controller.wait().await;
//! ```

use crate::{
    config::RunConfig,
    error::RunError,
    file_manager::TaskEnumerator,
    image_processor::Transcoder,
    optimizer::{progress_tracker::ProgressTracker, task_optimizer::TaskOptimizer, worker_pool::WorkerPool},
    progress::{ProgressReporter, RunSummary},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    StopRequested,
    Stopped,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::StopRequested)
    }
}

/// Sending half of the cooperative cancellation flag
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

/// Shared cancellation flag checked by the enumerator and the workers
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested; never resolves if the handle is gone without one
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

struct ControllerState {
    state: RunState,
    stop: Option<StopHandle>,
    run: Option<JoinHandle<RunSummary>>,
}

fn lock(inner: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns at most one active run at a time
pub struct RunController {
    transcoder: Arc<dyn Transcoder>,
    reporter: Arc<dyn ProgressReporter>,
    inner: Arc<Mutex<ControllerState>>,
}

impl RunController {
    pub fn new(transcoder: Arc<dyn Transcoder>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            transcoder,
            reporter,
            inner: Arc::new(Mutex::new(ControllerState {
                state: RunState::Idle,
                stop: None,
                run: None,
            })),
        }
    }

    pub fn status(&self) -> RunState {
        lock(&self.inner).state
    }

    /// Start a run with a snapshot of `config`.
    ///
    /// Validation of the roots happens here, before any task exists, so a bad input
    /// root is reported to the caller and leaves the state untouched.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, config: RunConfig) -> Result<(), RunError> {
        let mut inner = lock(&self.inner);
        if inner.state.is_active() {
            return Err(RunError::AlreadyRunning);
        }

        config.validate()?;
        let enumerator = TaskEnumerator::new(&config.input_root)?;
        let output_root = prepare_output_root(&config.output_root)?;
        let enumerator = enumerator.excluding(&output_root);

        let (stop_handle, stop_signal) = stop_channel();
        inner.state = RunState::Running;
        inner.stop = Some(stop_handle);

        let pipeline = Pipeline {
            config,
            enumerator,
            output_root,
            transcoder: self.transcoder.clone(),
            reporter: self.reporter.clone(),
            stop: stop_signal,
        };
        let drain = DrainGuard {
            inner: self.inner.clone(),
            stop: pipeline.stop.clone(),
            stopped: None,
        };
        inner.run = Some(tokio::spawn(pipeline.run(drain)));
        Ok(())
    }

    /// Request a cooperative stop; never blocks. Returns the state after the call.
    pub fn stop(&self) -> RunState {
        let mut inner = lock(&self.inner);
        if inner.state == RunState::Running {
            info!("Stop requested, letting in-flight files finish");
            inner.state = RunState::StopRequested;
            if let Some(ref handle) = inner.stop {
                handle.request();
            }
        }
        inner.state
    }

    /// Wait for the current run to drain and return its summary.
    ///
    /// `None` when no run was started since the last call. Dropping the future
    /// before it resolves detaches the run: it keeps going but its summary is lost.
    pub async fn wait(&self) -> Option<RunSummary> {
        let handle = lock(&self.inner).run.take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Run aborted: {}", e);
                None
            }
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        let inner = lock(&self.inner);
        if inner.state == RunState::Running {
            if let Some(ref handle) = inner.stop {
                handle.request();
            }
        }
    }
}

/// Create the output root if needed and return its canonical form
fn prepare_output_root(path: &Path) -> Result<PathBuf, RunError> {
    std::fs::create_dir_all(path)
        .and_then(|_| path.canonicalize())
        .map_err(|source| RunError::OutputRoot {
            path: path.to_path_buf(),
            source,
        })
}

/// Performs the drain-complete transition, also when the run unwinds
struct DrainGuard {
    inner: Arc<Mutex<ControllerState>>,
    stop: StopSignal,
    /// Stop flag as recorded in the summary; read from `stop` only if the run unwound
    stopped: Option<bool>,
}

impl DrainGuard {
    /// Complete the transition with the same stop flag the summary reports
    fn settle(mut self, stopped: bool) {
        self.stopped = Some(stopped);
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let stopped = self.stopped.unwrap_or_else(|| self.stop.is_requested());
        let mut inner = lock(&self.inner);
        inner.state = if stopped { RunState::Stopped } else { RunState::Idle };
        inner.stop = None;
        info!("Run drained, controller is {:?}", inner.state);
    }
}

/// Everything one run needs, captured at start
struct Pipeline {
    config: RunConfig,
    enumerator: TaskEnumerator,
    output_root: PathBuf,
    transcoder: Arc<dyn Transcoder>,
    reporter: Arc<dyn ProgressReporter>,
    stop: StopSignal,
}

impl Pipeline {
    async fn run(self, drain: DrainGuard) -> RunSummary {
        let started = Instant::now();
        let pool = WorkerPool::new(self.config.effective_workers(), self.config.queue_capacity);

        info!(
            "Starting run: {} -> {} (max width {}, {} workers)",
            self.enumerator.input_root().display(),
            self.output_root.display(),
            self.config.max_width,
            pool.workers()
        );
        self.reporter.on_run_started(&self.config);

        let optimizer = TaskOptimizer::new(self.output_root.clone(), self.config.max_width, self.transcoder.clone());
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(self.reporter.clone());

        let production = pool.run(self.enumerator.clone(), optimizer, self.stop.clone(), outcome_tx);
        let aggregation = async {
            while let Some(outcome) = outcome_rx.recv().await {
                tracker.record(&outcome);
            }
        };
        let (report, ()) = tokio::join!(production, aggregation);

        let stopped = self.stop.is_requested();
        let summary = tracker.finish(stopped, report.discarded, started.elapsed());
        info!(
            "Run {} after {} files: {}",
            if stopped { "stopped" } else { "completed" },
            report.produced,
            summary.format_summary()
        );
        self.reporter.on_run_finished(&summary);

        drain.settle(stopped);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscodeError;
    use crate::image_processor::{test_support::write_jpeg, ImageTranscoder};
    use crate::progress::SilentReporter;
    use crate::task::{Disposition, Outcome, OutcomeKind};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Reporter keeping every callback for inspection
    #[derive(Default)]
    struct RecordingReporter {
        started: AtomicUsize,
        outcomes: Mutex<Vec<Outcome>>,
        finished: Mutex<Vec<RunSummary>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn on_run_started(&self, _config: &RunConfig) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_task_outcome(&self, outcome: &Outcome) {
            self.outcomes.lock().unwrap().push(outcome.clone());
        }

        fn on_run_finished(&self, summary: &RunSummary) {
            self.finished.lock().unwrap().push(summary.clone());
        }
    }

    impl RecordingReporter {
        fn dispositions(&self) -> BTreeMap<PathBuf, (Disposition, OutcomeKind)> {
            self.outcomes
                .lock()
                .unwrap()
                .iter()
                .map(|o| (o.task.relative_path.clone(), (o.disposition, o.kind)))
                .collect()
        }

        fn clear(&self) {
            self.outcomes.lock().unwrap().clear();
        }
    }

    /// Real transcoder slowed down so a stop can land mid-run
    struct SlowTranscoder {
        inner: ImageTranscoder,
        delay: Duration,
    }

    impl Transcoder for SlowTranscoder {
        fn probe_width(&self, path: &Path) -> Result<u32, TranscodeError> {
            std::thread::sleep(self.delay);
            self.inner.probe_width(path)
        }

        fn compress(&self, path: &Path, max_width: u32) -> Result<Vec<u8>, TranscodeError> {
            self.inner.compress(path, max_width)
        }
    }

    struct FailingTranscoder;

    impl Transcoder for FailingTranscoder {
        fn probe_width(&self, _path: &Path) -> Result<u32, TranscodeError> {
            Ok(4000)
        }

        fn compress(&self, _path: &Path, _max_width: u32) -> Result<Vec<u8>, TranscodeError> {
            Err(TranscodeError::EncodeFailure("no encoder".to_string()))
        }
    }

    fn config(input: &Path, output: &Path, workers: usize) -> RunConfig {
        RunConfig {
            workers,
            queue_capacity: workers * 2,
            ..RunConfig::new(input, output)
        }
    }

    fn snapshot(root: &Path) -> HashMap<PathBuf, Vec<u8>> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
                (relative, std::fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn photos_tree(input: &Path) {
        write_jpeg(&input.join("1.jpg"), 3000, 20);
        std::fs::create_dir_all(input.join("sub")).unwrap();
        std::fs::write(input.join("sub/2.png"), b"not really a png").unwrap();
        write_jpeg(&input.join("sub/3.jpg"), 1200, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_photos_scenario_then_rerun_skips_everything() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("photos");
        let output = temp_dir.path().join("small");
        photos_tree(&input);

        let reporter = Arc::new(RecordingReporter::default());
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), reporter.clone());

        controller.start(config(&input, &output, 2)).unwrap();
        let summary = controller.wait().await.unwrap();
        assert_eq!(controller.status(), RunState::Idle);

        let expected: BTreeMap<PathBuf, (Disposition, OutcomeKind)> = [
            (PathBuf::from("1.jpg"), (Disposition::Compress, OutcomeKind::Succeeded)),
            (PathBuf::from("sub/2.png"), (Disposition::Copy, OutcomeKind::Succeeded)),
            (PathBuf::from("sub/3.jpg"), (Disposition::Copy, OutcomeKind::Succeeded)),
        ]
        .into_iter()
        .collect();
        assert_eq!(reporter.dispositions(), expected);
        assert_eq!((summary.compressed, summary.copied, summary.skipped), (1, 2, 0));
        assert!(!summary.stopped);

        assert_eq!(image::image_dimensions(output.join("1.jpg")).unwrap().0, 2160);
        assert_eq!(
            std::fs::read(output.join("sub/3.jpg")).unwrap(),
            std::fs::read(input.join("sub/3.jpg")).unwrap()
        );
        assert_eq!(std::fs::read(output.join("sub/2.png")).unwrap(), b"not really a png");

        let first_pass = snapshot(&output);
        reporter.clear();
        controller.start(config(&input, &output, 2)).unwrap();
        let second = controller.wait().await.unwrap();

        assert_eq!(second.skipped, 3);
        assert_eq!(second.files_processed(), 3);
        assert!(reporter
            .dispositions()
            .values()
            .all(|d| *d == (Disposition::Skip, OutcomeKind::Succeeded)));
        assert_eq!(snapshot(&output), first_pass);
        assert_eq!(reporter.started.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.finished.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_root_is_reported_at_start() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let reporter = Arc::new(RecordingReporter::default());
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), reporter.clone());

        let result = controller.start(config(&temp_dir.path().join("nope"), &output, 1));
        assert!(matches!(result, Err(RunError::InvalidInputRoot(_))));
        assert_eq!(controller.status(), RunState::Idle);
        assert_eq!(reporter.started.load(Ordering::SeqCst), 0);
        assert!(!output.exists());
        assert!(controller.wait().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_while_running_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        for i in 0..8 {
            write_jpeg(&input.join(format!("{}.jpg", i)), 64, 8);
        }

        let transcoder = Arc::new(SlowTranscoder {
            inner: ImageTranscoder::default(),
            delay: Duration::from_millis(50),
        });
        let controller = RunController::new(transcoder, Arc::new(SilentReporter));

        controller.start(config(&input, &output, 1)).unwrap();
        assert_eq!(controller.status(), RunState::Running);
        assert!(matches!(
            controller.start(config(&input, &output, 1)),
            Err(RunError::AlreadyRunning)
        ));

        assert_eq!(controller.stop(), RunState::StopRequested);
        assert!(matches!(
            controller.start(config(&input, &output, 1)),
            Err(RunError::AlreadyRunning)
        ));
        assert_eq!(controller.stop(), RunState::StopRequested);

        let summary = controller.wait().await.unwrap();
        assert!(summary.stopped);
        assert_eq!(controller.status(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), Arc::new(SilentReporter));
        assert_eq!(controller.stop(), RunState::Idle);
        assert_eq!(controller.status(), RunState::Idle);
    }

    #[test]
    fn test_drain_state_follows_the_summary_flag() {
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), Arc::new(SilentReporter));
        let guard = |signal: &StopSignal| DrainGuard {
            inner: controller.inner.clone(),
            stop: signal.clone(),
            stopped: None,
        };

        // A stop landing after the summary was built does not relabel the finished run
        let (handle, signal) = stop_channel();
        lock(&controller.inner).state = RunState::Running;
        let drain = guard(&signal);
        handle.request();
        drain.settle(false);
        assert_eq!(controller.status(), RunState::Idle);

        let (handle, signal) = stop_channel();
        lock(&controller.inner).state = RunState::StopRequested;
        let drain = guard(&signal);
        handle.request();
        drain.settle(true);
        assert_eq!(controller.status(), RunState::Stopped);

        // Unwound run: fall back to the live flag
        let (handle, signal) = stop_channel();
        lock(&controller.inner).state = RunState::StopRequested;
        handle.request();
        drop(guard(&signal));
        assert_eq!(controller.status(), RunState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resume_after_stop_matches_uninterrupted_run() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        for i in 0..12 {
            write_jpeg(&input.join(format!("d{}/{:02}.jpg", i % 3, i)), if i % 2 == 0 { 400 } else { 100 }, 10);
        }
        std::fs::write(input.join("d0/readme.txt"), b"notes").unwrap();

        // Reference: one uninterrupted run
        let reference = temp_dir.path().join("reference");
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), Arc::new(SilentReporter));
        controller.start(RunConfig { max_width: 200, ..config(&input, &reference, 2) }).unwrap();
        controller.wait().await.unwrap();

        // Interrupted run, then resume
        let output = temp_dir.path().join("resumed");
        let reporter = Arc::new(RecordingReporter::default());
        let slow = Arc::new(SlowTranscoder {
            inner: ImageTranscoder::default(),
            delay: Duration::from_millis(40),
        });
        let controller = RunController::new(slow, reporter.clone());
        let run_config = RunConfig { max_width: 200, ..config(&input, &output, 1) };

        controller.start(run_config.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.stop();
        let interrupted = controller.wait().await.unwrap();
        assert!(interrupted.stopped);
        assert!(interrupted.files_processed() < 13);
        let done_first: Vec<PathBuf> = reporter.dispositions().keys().cloned().collect();

        reporter.clear();
        controller.start(run_config).unwrap();
        let resumed = controller.wait().await.unwrap();
        assert!(!resumed.stopped);
        assert_eq!(controller.status(), RunState::Idle);

        // Nothing finished in the first pass is processed again
        let second = reporter.dispositions();
        for path in &done_first {
            assert_eq!(second[path].0, Disposition::Skip, "{} reprocessed", path.display());
        }
        assert_eq!(second.len(), 13);
        assert_eq!(snapshot(&output), snapshot(&reference));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_encode_failure_is_recovered_by_copy() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        write_jpeg(&input.join("big.jpg"), 64, 8);

        let reporter = Arc::new(RecordingReporter::default());
        let controller = RunController::new(Arc::new(FailingTranscoder), reporter.clone());
        controller.start(config(&input, &output, 2)).unwrap();
        let summary = controller.wait().await.unwrap();

        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            reporter.dispositions()[Path::new("big.jpg")],
            (Disposition::Compress, OutcomeKind::FailedFallbackToCopy)
        );
        assert_eq!(
            std::fs::read(output.join("big.jpg")).unwrap(),
            std::fs::read(input.join("big.jpg")).unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_output_root_inside_input_root() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.txt"), b"a").unwrap();

        let reporter = Arc::new(RecordingReporter::default());
        let controller = RunController::new(Arc::new(ImageTranscoder::default()), reporter.clone());
        controller.start(config(&input, &input.join("out"), 2)).unwrap();
        let summary = controller.wait().await.unwrap();
        assert_eq!(summary.copied, 1);

        controller.start(config(&input, &input.join("out"), 2)).unwrap();
        let summary = controller.wait().await.unwrap();
        assert_eq!(summary.files_processed(), 1);
        assert_eq!(summary.skipped, 1);
        assert!(!input.join("out/out").exists());
    }
}
