// src/progress.rs
// Turns raw engine progress samples into rate-limited reports for the foreground

use crate::utils::{format_size, format_speed, format_time};
use log::{debug, trace};
use std::time::{Duration, Instant};

/// Minimum spacing between two non-terminal reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Message attached to the terminal report
pub const FINISHED_MESSAGE: &str = "Processing completed file...";

/// Phase reported by the engine for a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Downloading,
    Finished,
}

/// Raw progress event as delivered by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    pub phase: ProgressPhase,
    /// Bytes downloaded so far in the current stream
    pub downloaded: u64,
    /// Total size, absent when the engine does not know it
    pub total: Option<u64>,
    /// Instantaneous speed in bytes per second
    pub speed: Option<f64>,
    /// Engine's own ETA in seconds
    pub eta: Option<u64>,
    pub at: Instant,
}

impl ProgressSample {
    pub fn downloading(downloaded: u64, total: Option<u64>, at: Instant) -> Self {
        Self {
            phase: ProgressPhase::Downloading,
            downloaded,
            total,
            speed: None,
            eta: None,
            at,
        }
    }

    pub fn finished(at: Instant) -> Self {
        Self {
            phase: ProgressPhase::Finished,
            downloaded: 0,
            total: None,
            speed: None,
            eta: None,
            at,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_eta(mut self, eta: u64) -> Self {
        self.eta = Some(eta);
        self
    }
}

/// Completion fraction shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percent {
    Determinate(u8),
    /// Fraction unknown, show activity only
    Indeterminate,
}

impl Percent {
    pub fn value(&self) -> Option<u8> {
        match self {
            Percent::Determinate(p) => Some(*p),
            Percent::Indeterminate => None,
        }
    }

    /// Legacy integer encoding, -1 for indeterminate
    pub fn as_i32(&self) -> i32 {
        match self {
            Percent::Determinate(p) => i32::from(*p),
            Percent::Indeterminate => -1,
        }
    }
}

/// UI-ready progress update. Each report supersedes the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub percent: Percent,
    pub message: String,
    /// Set only on the final 100% report of a task
    pub terminal: bool,
}

/// Receiver of estimator output
pub trait ReportSink: Send {
    fn report(&mut self, report: ProgressReport);
}

/// Collects reports in memory
impl ReportSink for Vec<ProgressReport> {
    fn report(&mut self, report: ProgressReport) {
        self.push(report);
    }
}

/// Receiver of raw engine samples
pub trait ProgressSink: Send {
    fn on_sample(&mut self, sample: ProgressSample);
}

type FinishHook = Box<dyn FnOnce() + Send>;

/// Stateful smoothing of one task's progress stream.
///
/// Non-terminal reports are emitted at most once per `interval`. The terminal
/// report (100%) is emitted exactly once, either for the first `Finished`
/// sample or from [`ProgressEstimator::finish`], and everything after it is
/// ignored.
pub struct ProgressEstimator<S: ReportSink> {
    sink: S,
    interval: Duration,
    session_start: Instant,
    last_emit: Option<(Instant, u64)>,
    last_downloaded: Option<u64>,
    finished: bool,
    on_finished: Option<FinishHook>,
}

impl<S: ReportSink> ProgressEstimator<S> {
    pub fn new(sink: S, started_at: Instant) -> Self {
        Self::with_interval(sink, started_at, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_interval(sink: S, started_at: Instant, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            session_start: started_at,
            last_emit: None,
            last_downloaded: None,
            finished: false,
            on_finished: None,
        }
    }

    /// Register a consumer that runs once, right after the terminal report
    pub fn on_finished<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_finished = Some(Box::new(hook));
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Emit the terminal report if the engine never sent a finished sample
    pub fn finish(&mut self) {
        if !self.finished {
            self.emit_terminal();
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn emit_terminal(&mut self) {
        self.finished = true;
        self.sink.report(ProgressReport {
            percent: Percent::Determinate(100),
            message: FINISHED_MESSAGE.to_string(),
            terminal: true,
        });

        if let Some(hook) = self.on_finished.take() {
            hook();
        }
    }

    fn on_downloading(&mut self, sample: ProgressSample) {
        if let Some(previous) = self.last_downloaded {
            if sample.downloaded < previous {
                debug!(
                    "Downloaded bytes went back from {} to {}, starting a new session",
                    previous, sample.downloaded
                );
                self.session_start = sample.at;
                self.last_emit = None;
            }
        }
        self.last_downloaded = Some(sample.downloaded);

        if let Some((emitted_at, _)) = self.last_emit {
            if sample.at.saturating_duration_since(emitted_at) < self.interval {
                trace!("Skipping progress sample inside the report interval");
                return;
            }
        }

        let report = match sample.total.filter(|total| *total > 0) {
            Some(total) => self.known_total_report(&sample, total),
            None => self.unknown_total_report(&sample),
        };

        self.last_emit = Some((sample.at, sample.downloaded));
        self.sink.report(report);
    }

    fn known_total_report(&self, sample: &ProgressSample, total: u64) -> ProgressReport {
        let done = sample.downloaded.min(total);
        let percent = (u128::from(done) * 100 / u128::from(total)) as u8;

        let speed = reported_speed(sample).or_else(|| {
            let elapsed = sample
                .at
                .saturating_duration_since(self.session_start)
                .as_secs_f64();
            if elapsed > 0.0 {
                Some(sample.downloaded as f64 / elapsed)
            } else {
                None
            }
        });

        let eta = sample.eta.or_else(|| {
            speed
                .filter(|s| *s > 0.0)
                .map(|s| ((total - done) as f64 / s).ceil() as u64)
        });

        ProgressReport {
            percent: Percent::Determinate(percent),
            message: format!(
                "{} of {} ({}) ETA {}",
                format_size(sample.downloaded),
                format_size(total),
                format_speed(speed),
                format_time(eta)
            ),
            terminal: false,
        }
    }

    fn unknown_total_report(&self, sample: &ProgressSample) -> ProgressReport {
        let speed = reported_speed(sample).or_else(|| {
            let (since, bytes) = self.last_emit.unwrap_or((self.session_start, 0));
            let elapsed = sample.at.saturating_duration_since(since).as_secs_f64();
            if elapsed > 0.0 && sample.downloaded > bytes {
                Some((sample.downloaded - bytes) as f64 / elapsed)
            } else {
                None
            }
        });

        ProgressReport {
            percent: Percent::Indeterminate,
            message: format!(
                "{} downloaded ({})",
                format_size(sample.downloaded),
                format_speed(speed)
            ),
            terminal: false,
        }
    }
}

impl<S: ReportSink> ProgressSink for ProgressEstimator<S> {
    fn on_sample(&mut self, sample: ProgressSample) {
        if self.finished {
            trace!("Ignoring progress sample after the terminal report");
            return;
        }

        match sample.phase {
            ProgressPhase::Finished => self.emit_terminal(),
            ProgressPhase::Downloading => self.on_downloading(sample),
        }
    }
}

// A zero speed from the engine means "not measured yet"
fn reported_speed(sample: &ProgressSample) -> Option<f64> {
    sample.speed.filter(|s| s.is_finite() && *s > 0.0)
}
