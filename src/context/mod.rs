//! Run context: cancellation, the continue gate, time, and user-facing output
//!
//! Every crawl component takes a [`RunContext`] instead of reaching for global
//! flags. The foreground side of a run holds a [`RunHandle`] to stop it or to
//! release the login pause.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default interval at which the continue gate is polled
pub const DEFAULT_CONTINUE_POLL: Duration = Duration::from_millis(500);

/// Receives `(current, total, status)` progress updates
pub trait ProgressSink: Send + Sync {
    fn progress(&self, current: usize, total: usize, status: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn progress(&self, current: usize, total: usize, status: &str) {
        self(current, total, status)
    }
}

/// Receives every formatted log line
pub trait LogSink: Send + Sync {
    fn log(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, line: &str) {
        self(line)
    }
}

/// Control surface handed to whoever started the run
#[derive(Debug, Clone)]
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    gate: Arc<AtomicBool>,
}

impl RunHandle {
    /// Requests a cooperative stop at the next checkpoint
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Releases the login/ready gate
    pub fn continue_after_pause(&self) {
        self.gate.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Shared state and collaborators for one crawl run
pub struct RunContext {
    cancel: Arc<AtomicBool>,
    gate: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    progress: Option<Arc<dyn ProgressSink>>,
    log_sink: Option<Arc<dyn LogSink>>,
    run_log: Option<PathBuf>,
    continue_poll: Duration,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Creates a context backed by the real clock, with no sinks attached
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(SystemClock),
            progress: None,
            log_sink: None,
            run_log: None,
            continue_poll: DEFAULT_CONTINUE_POLL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    pub fn with_continue_poll(mut self, interval: Duration) -> Self {
        self.continue_poll = interval;
        self
    }

    /// Returns a handle that can stop the run or release its pause gate
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancel: Arc::clone(&self.cancel),
            gate: Arc::clone(&self.gate),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Clears any stale stop request or gate release from a previous run
    pub fn reset(&self) {
        self.cancel.store(false, Ordering::SeqCst);
        self.gate.store(false, Ordering::SeqCst);
    }

    /// Suspends until the gate is released or the run is cancelled
    ///
    /// The gate is one-shot: a release is consumed by the wait it ends.
    /// Returns `true` when released, `false` when cancelled.
    pub async fn await_continue(&self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            if self.gate.swap(false, Ordering::SeqCst) {
                return true;
            }
            self.clock.sleep(self.continue_poll).await;
        }
    }

    /// Sleeps on the run's clock
    pub async fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration).await;
    }

    /// Directs log lines to `path` in addition to the sinks
    pub fn set_run_log(&mut self, path: Option<PathBuf>) {
        self.run_log = path;
    }

    pub fn run_log(&self) -> Option<&Path> {
        self.run_log.as_deref()
    }

    pub fn progress(&self, current: usize, total: usize, status: &str) {
        if let Some(sink) = &self.progress {
            sink.progress(current, total, status);
        }
    }

    /// Emits a user-visible line to tracing, the run log and the log sink
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{}", message);
        self.emit(message);
    }

    /// Like [`RunContext::log`] but at warn level
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!("{}", message);
        self.emit(message);
    }

    fn emit(&self, message: &str) {
        let line = format_line(message);

        if let Some(path) = &self.run_log {
            if let Err(e) = append_line(path, &line) {
                tracing::debug!("Failed to write run log {}: {}", path.display(), e);
            }
        }

        if let Some(sink) = &self.log_sink {
            sink.log(&line);
        }
    }
}

/// Formats a message as a timestamped run-log line
pub fn format_line(message: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}
