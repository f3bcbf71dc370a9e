// src/download_manager.rs
// Admission, slots and cancellation for the download and metadata workers

use crate::downloader::{Engine, VideoMetadata};
use crate::error::AppError;
use crate::planner::{self, DownloadRequest};
use crate::postprocess::{Tagger, Transcoder};
use crate::progress::DEFAULT_REPORT_INTERVAL;
use crate::task::{
    event_channel, DownloadStage, DownloadTask, EventReceiver, EventSender, MetadataTask,
    TaskEvent, TaskKind, TaskOutcome, TaskState, DEFAULT_EVENT_CAPACITY,
};
use crate::utils::{ensure_download_dir, validate_url};
use log::{debug, error, info};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Owns the single download slot and the single metadata slot
pub struct TaskSupervisor {
    engine: Arc<dyn Engine>,
    transcoder: Arc<dyn Transcoder>,
    tagger: Arc<dyn Tagger>,
    download_slot: Arc<AtomicBool>,
    metadata_slot: Arc<AtomicBool>,
    report_interval: Duration,
    event_capacity: usize,
}

impl TaskSupervisor {
    pub fn new(
        engine: Arc<dyn Engine>,
        transcoder: Arc<dyn Transcoder>,
        tagger: Arc<dyn Tagger>,
    ) -> Self {
        Self {
            engine,
            transcoder,
            tagger,
            download_slot: Arc::new(AtomicBool::new(false)),
            metadata_slot: Arc::new(AtomicBool::new(false)),
            report_interval: DEFAULT_REPORT_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Minimum spacing between progress reports of new download tasks
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Pending progress reports kept per task before the oldest is dropped
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn is_download_running(&self) -> bool {
        self.download_slot.load(Ordering::SeqCst)
    }

    pub fn is_metadata_running(&self) -> bool {
        self.metadata_slot.load(Ordering::SeqCst)
    }

    /// Admit a download. Rejections happen here, before any worker exists.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_download(&self, request: DownloadRequest) -> Result<TaskHandle<PathBuf>, AppError> {
        let plan = planner::plan(&request)?;
        ensure_download_dir(&request.destination)?;
        let slot = SlotGuard::claim(&self.download_slot, TaskKind::Download)?;

        let task = DownloadTask::new(
            request,
            plan,
            self.engine.clone(),
            self.transcoder.clone(),
            self.tagger.clone(),
        )
        .with_report_interval(self.report_interval);

        Ok(self.spawn(TaskKind::Download, slot, move |events| task.run(events)))
    }

    /// Admit a metadata-only query
    pub fn start_metadata(&self, url: &str) -> Result<TaskHandle<VideoMetadata>, AppError> {
        validate_url(url)?;
        let slot = SlotGuard::claim(&self.metadata_slot, TaskKind::Metadata)?;

        let task = MetadataTask::new(url, self.engine.clone());
        Ok(self.spawn(TaskKind::Metadata, slot, move |events| task.run(events)))
    }

    fn spawn<T, F, Fut>(&self, kind: TaskKind, slot: SlotGuard, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(EventSender<T>) -> Fut,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let id = generate_task_id(kind);
        let (events, receiver) = event_channel(self.event_capacity);
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let state = Arc::new(Mutex::new(TaskState::Running));

        events.send(TaskEvent::Stage(DownloadStage::Pending));
        let pipeline = work(events.clone());

        let worker_state = state.clone();
        let worker_id = id.clone();
        let join = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                Ok(()) = cancel_rx.recv() => {
                    debug!("Task {} cancelled", worker_id);
                    TaskOutcome::Cancelled
                }
                result = pipeline => TaskOutcome::from_result(result),
            };

            match &outcome {
                TaskOutcome::Completed(_) => info!("Task {} completed", worker_id),
                TaskOutcome::Failed(message) => error!("Task {} failed: {}", worker_id, message),
                TaskOutcome::Cancelled => info!("Task {} cancelled", worker_id),
            }

            // Free the slot before anyone can observe the end of the task
            drop(slot);
            *worker_state.lock().unwrap_or_else(|e| e.into_inner()) = outcome.state();
            events.send(TaskEvent::Stage(outcome.stage()));
            events.send(TaskEvent::Finished(outcome));
        });

        debug!("Started {} task {}", kind, id);
        TaskHandle {
            id,
            kind,
            state,
            events: receiver,
            cancel: cancel_tx,
            join: Some(join),
        }
    }
}

/// Occupancy of one slot, released on drop
struct SlotGuard {
    slot: Arc<AtomicBool>,
}

impl SlotGuard {
    fn claim(slot: &Arc<AtomicBool>, kind: TaskKind) -> Result<Self, AppError> {
        slot.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::AlreadyRunning(kind.to_string()))?;
        Ok(Self { slot: slot.clone() })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}

/// Foreground view of an admitted task
pub struct TaskHandle<T> {
    id: String,
    kind: TaskKind,
    state: Arc<Mutex<TaskState>>,
    events: EventReceiver<T>,
    cancel: broadcast::Sender<()>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask the worker to stop. No effect once the task has finished.
    pub fn cancel(&self) {
        if !self.state().is_finished() {
            debug!("Cancelling task {}", self.id);
            let _ = self.cancel.send(());
        }
    }

    pub async fn next_event(&mut self) -> Option<TaskEvent<T>> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<TaskEvent<T>> {
        self.events.try_recv()
    }

    /// Drain the remaining events and return the outcome
    pub async fn wait(mut self) -> TaskOutcome<T> {
        while let Some(event) = self.events.recv().await {
            if let TaskEvent::Finished(outcome) = event {
                return outcome;
            }
        }

        // The worker went away without reporting, which only happens on a panic
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                return TaskOutcome::Failed(format!("Worker stopped unexpectedly: {}", e));
            }
        }
        TaskOutcome::Failed("Worker stopped without an outcome".to_string())
    }
}

/// Generate a unique task id
fn generate_task_id(kind: TaskKind) -> String {
    use rand::Rng;
    let prefix = match kind {
        TaskKind::Download => "dl",
        TaskKind::Metadata => "md",
    };
    let timestamp = chrono::Utc::now().timestamp_millis();
    let random = rand::thread_rng().gen::<u32>();
    format!("{}_{}_{}", prefix, timestamp, random)
}
