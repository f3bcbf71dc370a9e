// src/task.rs
// Worker-side state machines and the per-task event channel

use crate::downloader::{Engine, VideoMetadata};
use crate::error::AppError;
use crate::planner::{DownloadPlan, DownloadRequest, PostProcessStep};
use crate::postprocess::{reencode_in_place, Tagger, Transcoder};
use crate::progress::{ProgressEstimator, ProgressReport, ReportSink, DEFAULT_REPORT_INTERVAL};
use humansize::{format_size, BINARY};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Default number of pending progress reports kept per task
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// The two independent task kinds, one slot each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Download,
    Metadata,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Download => f.write_str("download"),
            TaskKind::Metadata => f.write_str("metadata"),
        }
    }
}

/// Lifecycle of a download, announced through [`TaskEvent::Stage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Pending,
    FetchingMetadata,
    Downloading,
    PostProcessing,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStage::Completed | DownloadStage::Failed | DownloadStage::Cancelled
        )
    }

    /// Status line shown while the stage is active
    pub fn describe(&self) -> &'static str {
        match self {
            DownloadStage::Pending => "Initializing download...",
            DownloadStage::FetchingMetadata => "Fetching video information...",
            DownloadStage::Downloading => "Downloading...",
            DownloadStage::PostProcessing => "Processing completed file...",
            DownloadStage::Completed => "Download completed",
            DownloadStage::Failed => "Download failed",
            DownloadStage::Cancelled => "Download cancelled",
        }
    }
}

/// Coarse state exposed on a task handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        *self != TaskState::Running
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(String),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Completed(_) => TaskState::Completed,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn stage(&self) -> DownloadStage {
        match self {
            TaskOutcome::Completed(_) => DownloadStage::Completed,
            TaskOutcome::Failed(_) => DownloadStage::Failed,
            TaskOutcome::Cancelled => DownloadStage::Cancelled,
        }
    }

    pub fn from_result(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(AppError::Cancelled) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

/// Everything a worker tells the foreground
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Stage(DownloadStage),
    Progress(ProgressReport),
    /// Always the last event of a task
    Finished(TaskOutcome<T>),
}

impl<T> TaskEvent<T> {
    // Only non-terminal progress reports may be discarded under pressure
    fn is_droppable(&self) -> bool {
        matches!(self, TaskEvent::Progress(report) if !report.terminal)
    }
}

struct ChannelState<T> {
    queue: VecDeque<TaskEvent<T>>,
    senders: usize,
    dropped: u64,
}

struct Shared<T> {
    state: Mutex<ChannelState<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> Shared<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Create the ordered worker -> foreground queue for one task.
///
/// When more than `capacity` progress reports are pending the oldest one is
/// discarded. Stage changes, the terminal report and the outcome are always
/// delivered, in the order they were sent.
pub fn event_channel<T>(capacity: usize) -> (EventSender<T>, EventReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(ChannelState {
            queue: VecDeque::new(),
            senders: 1,
            dropped: 0,
        }),
        notify: Notify::new(),
        capacity: capacity.max(1),
    });

    (
        EventSender {
            shared: shared.clone(),
        },
        EventReceiver { shared },
    )
}

pub struct EventSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> EventSender<T> {
    pub fn send(&self, event: TaskEvent<T>) {
        {
            let mut state = self.shared.lock();
            if event.is_droppable() {
                let pending = state.queue.iter().filter(|e| e.is_droppable()).count();
                if pending >= self.shared.capacity {
                    if let Some(oldest) = state.queue.iter().position(|e| e.is_droppable()) {
                        state.queue.remove(oldest);
                        state.dropped += 1;
                    }
                }
            }
            state.queue.push_back(event);
        }
        self.shared.notify.notify_one();
    }
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        self.shared.lock().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for EventSender<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.lock();
            state.senders -= 1;
            state.senders == 0
        };
        if last {
            self.shared.notify.notify_one();
        }
    }
}

impl<T: Send> ReportSink for EventSender<T> {
    fn report(&mut self, report: ProgressReport) {
        self.send(TaskEvent::Progress(report));
    }
}

pub struct EventReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> EventReceiver<T> {
    /// Next event, or `None` once every sender is gone and the queue is empty
    pub async fn recv(&mut self) -> Option<TaskEvent<T>> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.lock();
                if let Some(event) = state.queue.pop_front() {
                    return Some(event);
                }
                if state.senders == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking variant of [`EventReceiver::recv`]
    pub fn try_recv(&mut self) -> Option<TaskEvent<T>> {
        self.shared.lock().queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Number of progress reports discarded so far
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }
}

/// Worker for one admitted download
pub struct DownloadTask {
    request: DownloadRequest,
    plan: DownloadPlan,
    engine: Arc<dyn Engine>,
    transcoder: Arc<dyn Transcoder>,
    tagger: Arc<dyn Tagger>,
    report_interval: Duration,
}

impl DownloadTask {
    pub fn new(
        request: DownloadRequest,
        plan: DownloadPlan,
        engine: Arc<dyn Engine>,
        transcoder: Arc<dyn Transcoder>,
        tagger: Arc<dyn Tagger>,
    ) -> Self {
        Self {
            request,
            plan,
            engine,
            transcoder,
            tagger,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Drive the download up to its artifact path.
    ///
    /// Terminal stage and outcome events are left to the caller so it can
    /// release its slot first. Dropping the returned future kills any running
    /// engine or transcoder process.
    pub async fn run(self, events: EventSender<PathBuf>) -> Result<PathBuf, AppError> {
        let url = self.request.url.as_str();

        events.send(TaskEvent::Stage(DownloadStage::FetchingMetadata));
        let metadata = self.engine.fetch_metadata(url).await?;
        info!("Downloading \"{}\" by {}", metadata.title, metadata.uploader);

        events.send(TaskEvent::Stage(DownloadStage::Downloading));
        let mut estimator =
            ProgressEstimator::with_interval(events.clone(), Instant::now(), self.report_interval);
        let stage_events = events.clone();
        estimator.on_finished(move || {
            stage_events.send(TaskEvent::Stage(DownloadStage::PostProcessing));
        });

        let reported = self.engine.download(url, &self.plan, &mut estimator).await?;
        estimator.finish();
        drop(estimator);

        let artifact = resolve_artifact(&self.plan, &metadata, reported);

        for step in self.plan.post_completion_steps() {
            match step {
                PostProcessStep::WriteTags { album } => {
                    if let Err(e) = self.write_tags(&artifact, &metadata, album).await {
                        warn!("Tags not written for {}: {}", artifact.display(), e);
                    }
                }
                PostProcessStep::Reencode(spec) => {
                    if let Err(e) = reencode_in_place(&*self.transcoder, &artifact, spec).await {
                        warn!("Keeping original {}: {}", artifact.display(), e);
                    }
                }
                other => debug!("Step {:?} already handled by the engine", other),
            }
        }

        match tokio::fs::metadata(&artifact).await {
            Ok(meta) => info!(
                "Saved {} ({})",
                artifact.display(),
                format_size(meta.len(), BINARY)
            ),
            Err(_) => warn!("Artifact {} is not on disk", artifact.display()),
        }

        Ok(artifact)
    }

    async fn write_tags(
        &self,
        artifact: &Path,
        metadata: &VideoMetadata,
        album: &str,
    ) -> Result<(), AppError> {
        let tagger = self.tagger.clone();
        let path = artifact.to_path_buf();
        let metadata = metadata.clone();
        let album = album.to_string();

        tokio::task::spawn_blocking(move || tagger.write_tags(&path, &metadata, &album))
            .await
            .map_err(|e| AppError::PostProcess(format!("Tagging task failed: {}", e)))?
    }
}

// The engine may report the pre-postprocessing name; prefer whatever exists
fn resolve_artifact(plan: &DownloadPlan, metadata: &VideoMetadata, reported: PathBuf) -> PathBuf {
    if reported.exists() {
        return reported;
    }

    let candidates = [
        reported.with_extension(&plan.container),
        plan.artifact_path_for(metadata),
    ];
    for candidate in candidates {
        if candidate.exists() {
            debug!(
                "Engine reported {}, using {}",
                reported.display(),
                candidate.display()
            );
            return candidate;
        }
    }

    reported
}

/// Worker for a metadata-only query
pub struct MetadataTask {
    url: String,
    engine: Arc<dyn Engine>,
}

impl MetadataTask {
    pub fn new(url: &str, engine: Arc<dyn Engine>) -> Self {
        Self {
            url: url.trim().to_string(),
            engine,
        }
    }

    pub async fn run(self, events: EventSender<VideoMetadata>) -> Result<VideoMetadata, AppError> {
        events.send(TaskEvent::Stage(DownloadStage::FetchingMetadata));
        let metadata = self.engine.fetch_metadata(&self.url).await?;
        debug!("Fetched metadata for {}: {}", self.url, metadata.title);
        Ok(metadata)
    }
}
