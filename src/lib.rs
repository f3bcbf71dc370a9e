// src/lib.rs
// Download orchestration core, used by the vidgrabber binary

pub mod cli;
pub mod dependency_validator;
pub mod download_manager;
pub mod downloader;
pub mod error;
pub mod planner;
pub mod post_action;
pub mod postprocess;
pub mod progress;
pub mod settings;
pub mod task;
pub mod utils;

pub use download_manager::{TaskHandle, TaskSupervisor};
pub use downloader::{Engine, VideoMetadata, YtDlpEngine};
pub use error::AppError;
pub use planner::{plan, DownloadPlan, DownloadRequest, FormatKind, Resolution};
pub use task::{DownloadStage, TaskEvent, TaskOutcome, TaskState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
