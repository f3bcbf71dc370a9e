// src/downloader.rs
// Engine seam plus the yt-dlp backed implementation

use crate::error::AppError;
use crate::planner::{DownloadPlan, PostProcessStep};
use crate::progress::{ProgressPhase, ProgressSample, ProgressSink};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as AsyncCommand;

/// Prefix of the machine readable progress lines we ask yt-dlp to print
pub const PROGRESS_PREFIX: &str = "vgprogress|";
/// Prefix of the line carrying the final file path
pub const ARTIFACT_PREFIX: &str = "vgartifact:";

const PROGRESS_TEMPLATE: &str = "download:vgprogress|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";
const ARTIFACT_TEMPLATE: &str = "after_move:vgartifact:%(filepath)s";
const STDERR_TAIL: usize = 20;

/// Video information used for display, naming and tagging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    /// Uploader, falling back to the channel name
    pub uploader: String,
    /// Duration in seconds
    pub duration: Option<u64>,
    pub view_count: Option<u64>,
    pub thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct RawVideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
}

impl VideoMetadata {
    /// Parse one object of `yt-dlp --dump-json` output
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let raw: RawVideoInfo = serde_json::from_str(json)?;

        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::MetadataFetch("Video has no title".to_string()))?;

        let uploader = raw
            .uploader
            .or(raw.channel)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(Self {
            title,
            uploader,
            duration: raw
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
            view_count: raw.view_count,
            thumbnail: raw.thumbnail,
        })
    }
}

/// External extraction/download engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Metadata-only query, no media bytes are fetched
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, AppError>;

    /// Run the transfer described by `plan`, pushing raw samples into `sink`.
    /// Returns the path of the produced file.
    async fn download(
        &self,
        url: &str,
        plan: &DownloadPlan,
        sink: &mut dyn ProgressSink,
    ) -> Result<PathBuf, AppError>;
}

/// Engine backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpEngine {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, e: io::Error, context: fn(String) -> AppError) -> AppError {
        match e.kind() {
            io::ErrorKind::NotFound => AppError::MissingDependency(format!(
                "{} (not found, please ensure it is installed and in your PATH)",
                self.program.display()
            )),
            _ => context(format!("Failed to execute {}: {}", self.program.display(), e)),
        }
    }
}

#[async_trait]
impl Engine for YtDlpEngine {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, AppError> {
        debug!("Fetching metadata for {}", url);

        let output = AsyncCommand::new(&self.program)
            .args(["--dump-json", "--no-playlist", "--no-warnings", "--", url])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e, AppError::MetadataFetch))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(AppError::MetadataFetch(extract_error_message(
                &lines,
                output.status.code(),
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| AppError::MetadataFetch("yt-dlp returned no metadata".to_string()))?;

        VideoMetadata::from_json(line).map_err(|e| match e {
            AppError::MetadataFetch(_) => e,
            other => AppError::MetadataFetch(other.to_string()),
        })
    }

    async fn download(
        &self,
        url: &str,
        plan: &DownloadPlan,
        sink: &mut dyn ProgressSink,
    ) -> Result<PathBuf, AppError> {
        let args = build_download_args(url, plan);
        debug!("Running {} {:?}", self.program.display(), args);

        let mut command = AsyncCommand::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| self.spawn_error(e, AppError::Transfer))?;

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_tail(stderr)));

        let mut artifact = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| AppError::Transfer(format!("Lost engine output: {}", e)))?
            {
                if let Some(sample) = parse_progress_line(&line, Instant::now()) {
                    // yt-dlp reports "finished" per stream; only process exit ends the transfer
                    if sample.phase == ProgressPhase::Finished {
                        debug!("yt-dlp finished one stream at {} bytes", sample.downloaded);
                        continue;
                    }
                    sink.on_sample(sample);
                } else if let Some(path) = parse_artifact_line(&line) {
                    artifact = Some(path);
                } else if !line.trim().is_empty() {
                    debug!("yt-dlp: {}", line);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AppError::Transfer(format!("Failed to complete download: {}", e)))?;

        let stderr_lines = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            let message = extract_error_message(&stderr_lines, status.code());
            warn!("yt-dlp failed: {}", message);
            return Err(AppError::Transfer(message));
        }

        sink.on_sample(ProgressSample::finished(Instant::now()));

        let path = artifact.ok_or_else(|| {
            AppError::Transfer("yt-dlp did not report the output file".to_string())
        })?;
        info!("yt-dlp finished: {}", path.display());
        Ok(path)
    }
}

/// Build the yt-dlp argument list for a plan
pub fn build_download_args(url: &str, plan: &DownloadPlan) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--print".into(),
        ARTIFACT_TEMPLATE.into(),
        "-f".into(),
        plan.media.selector().into(),
        "-o".into(),
        plan.output_path_template().to_string_lossy().into_owned(),
    ];

    for step in plan.engine_steps() {
        match step {
            PostProcessStep::ExtractAudio { codec, quality } => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(codec.clone());
                args.push("--audio-quality".into());
                args.push(format!("{}K", quality));
            }
            PostProcessStep::MergeInto { container } => {
                args.push("--merge-output-format".into());
                args.push(container.clone());
            }
            PostProcessStep::Remux {
                container,
                drop_audio,
            } => {
                args.push("--remux-video".into());
                args.push(container.clone());
                if *drop_audio {
                    args.push("--postprocessor-args".into());
                    args.push("VideoRemuxer:-an".into());
                }
            }
            PostProcessStep::FetchSubtitles(subtitles) => {
                args.push("--write-subs".into());
                if subtitles.auto_generated {
                    args.push("--write-auto-subs".into());
                }
                args.push("--sub-langs".into());
                args.push(subtitles.languages.join(","));
                args.push("--convert-subs".into());
                args.push(subtitles.format.clone());
            }
            PostProcessStep::WriteTags { .. } | PostProcessStep::Reencode(_) => {}
        }
    }

    args.push("--".into());
    args.push(url.to_string());
    args
}

/// Parse one of our progress-template lines into a sample
pub fn parse_progress_line(line: &str, at: Instant) -> Option<ProgressSample> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let fields: Vec<&str> = rest.split('|').collect();
    if fields.len() != 6 {
        return None;
    }

    let phase = match fields[0] {
        "downloading" => ProgressPhase::Downloading,
        "finished" => ProgressPhase::Finished,
        _ => return None,
    };

    let total = parse_number(fields[2])
        .or_else(|| parse_number(fields[3]))
        .map(|t| t as u64)
        .filter(|t| *t > 0);

    Some(ProgressSample {
        phase,
        downloaded: parse_number(fields[1]).map(|d| d as u64).unwrap_or(0),
        total,
        speed: parse_number(fields[4]),
        eta: parse_number(fields[5]).map(|e| e as u64),
        at,
    })
}

/// Parse the `after_move` line carrying the final path
pub fn parse_artifact_line(line: &str) -> Option<PathBuf> {
    line.trim_end_matches(['\r', '\n'])
        .strip_prefix(ARTIFACT_PREFIX)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

/// Pick the most useful line of engine stderr, verbatim
pub fn extract_error_message(stderr_lines: &[String], exit_code: Option<i32>) -> String {
    if let Some(line) = stderr_lines
        .iter()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR:"))
    {
        return line.trim_start()["ERROR:".len()..].trim().to_string();
    }

    if let Some(line) = stderr_lines.iter().rev().find(|l| !l.trim().is_empty()) {
        return line.trim().to_string();
    }

    match exit_code {
        Some(code) => format!("yt-dlp exited with code {}", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    }
}

fn parse_number(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

async fn collect_tail<R>(reader: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tail.push(line);
        if tail.len() > STDERR_TAIL {
            tail.remove(0);
        }
    }
    tail
}
