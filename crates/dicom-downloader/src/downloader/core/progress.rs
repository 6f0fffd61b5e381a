//! Progress tracking and reporting for download sessions
//!
//! A session talks to its caller through exactly two capabilities: a
//! progress updater taking the completed fraction (0.0 to 1.0) and an
//! append-only log sink taking one human-readable line at a time. Both are
//! `Send + Sync` because the session runs on a background task.

use std::sync::Arc;

/// Progress updater, called with the completed fraction in `0.0..=1.0`
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Append-only log sink, called once per log line in occurrence order
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// The pair of callbacks injected into a downloader
#[derive(Clone)]
pub struct SessionCallbacks {
    progress: ProgressFn,
    log: LogFn,
}

impl SessionCallbacks {
    pub fn new(progress: ProgressFn, log: LogFn) -> Self {
        Self { progress, log }
    }

    pub(crate) fn report_progress(&self, fraction: f64) {
        (self.progress)(fraction);
    }

    pub(crate) fn append_log(&self, line: &str) {
        (self.log)(line);
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks").finish_non_exhaustive()
    }
}

/// Trait for reporters that want both signals behind one object
pub trait SessionReporter: Send + Sync {
    fn on_progress(&self, _fraction: f64) {}
    fn on_log(&self, _line: &str) {}
}

/// Extension trait to convert a SessionReporter into SessionCallbacks
pub trait IntoSessionCallbacks {
    fn into_callbacks(self) -> SessionCallbacks;
}

impl<T: SessionReporter + 'static> IntoSessionCallbacks for T {
    fn into_callbacks(self) -> SessionCallbacks {
        let reporter = Arc::new(self);
        let progress_reporter = Arc::clone(&reporter);
        SessionCallbacks::new(
            Arc::new(move |fraction| progress_reporter.on_progress(fraction)),
            Arc::new(move |line| reporter.on_log(line)),
        )
    }
}

/// Simple console reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SessionReporter for ConsoleProgressReporter {
    fn on_progress(&self, fraction: f64) {
        if self.verbose {
            println!("⏬ {:.1}%", fraction * 100.0);
        }
    }

    fn on_log(&self, line: &str) {
        println!("{}", line);
    }
}

/// Null reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl SessionReporter for NullProgressReporter {}

/// Composite reporter that forwards signals to multiple reporters
pub struct CompositeProgressReporter {
    reporters: Vec<Box<dyn SessionReporter>>,
}

impl std::fmt::Debug for CompositeProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProgressReporter")
            .field("reporters_count", &self.reporters.len())
            .finish()
    }
}

impl CompositeProgressReporter {
    pub fn new() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter<R: SessionReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Default for CompositeProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionReporter for CompositeProgressReporter {
    fn on_progress(&self, fraction: f64) {
        for reporter in &self.reporters {
            reporter.on_progress(fraction);
        }
    }

    fn on_log(&self, line: &str) {
        for reporter in &self.reporters {
            reporter.on_log(line);
        }
    }
}

/// Fraction-complete bookkeeping for one session
///
/// `processed` only ever grows and is capped at `total`, so the reported
/// fraction never decreases. An empty session is complete from the start.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    total: usize,
    processed: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self { total, processed: 0 }
    }

    /// Record one more processed instance and return the new fraction
    pub fn advance(&mut self) -> f64 {
        if self.processed < self.total {
            self.processed += 1;
        }
        self.fraction()
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}
