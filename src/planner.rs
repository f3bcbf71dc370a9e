// src/planner.rs
// Maps a user request onto the engine/transcoder instructions for one download

use crate::downloader::VideoMetadata;
use crate::error::AppError;
use crate::utils::{sanitize_file_component, validate_url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// High frame rate filtering is only offered from this height up
pub const HIGH_FPS_MIN_HEIGHT: u32 = 720;
pub const HIGH_FPS: u32 = 60;

pub const AUDIO_CODEC: &str = "mp3";
pub const AUDIO_QUALITY: &str = "192";
pub const VIDEO_CONTAINER: &str = "mp4";
pub const SUBTITLE_FORMAT: &str = "srt";
pub const DEFAULT_SUBTITLE_LANGUAGE: &str = "en";
/// Language token selecting auto-generated captions
pub const AUTO_SUBTITLE_TOKEN: &str = "auto";
pub const TAG_ALBUM: &str = "vidgrabber";
pub const MUTED_SUFFIX: &str = " (muted)";

const OUTPUT_STEM: &str = "%(uploader)s - %(title)s";

/// Fixed height buckets offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    P144,
    P240,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
}

impl Resolution {
    pub const ALL: [Resolution; 8] = [
        Resolution::P144,
        Resolution::P240,
        Resolution::P360,
        Resolution::P480,
        Resolution::P720,
        Resolution::P1080,
        Resolution::P1440,
        Resolution::P2160,
    ];

    pub fn height(&self) -> u32 {
        match self {
            Resolution::P144 => 144,
            Resolution::P240 => 240,
            Resolution::P360 => 360,
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
            Resolution::P1440 => 1440,
            Resolution::P2160 => 2160,
        }
    }

    pub fn from_height(height: u32) -> Result<Self, AppError> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.height() == height)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unsupported resolution: {}", height)))
    }

    pub fn supports_high_fps(&self) -> bool {
        self.height() >= HIGH_FPS_MIN_HEIGHT
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::P720
    }
}

impl FromStr for Resolution {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('p')
            .or_else(|| trimmed.strip_suffix('P'))
            .unwrap_or(trimmed);
        let height: u32 = digits
            .parse()
            .map_err(|_| AppError::InvalidRequest(format!("Unsupported resolution: {}", s)))?;
        Self::from_height(height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.height())
    }
}

/// What kind of file the user wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    AudioOnly,
    VideoWithAudio,
    VideoMuted,
}

impl FormatKind {
    pub fn is_audio(&self) -> bool {
        *self == FormatKind::AudioOnly
    }
}

impl Default for FormatKind {
    fn default() -> Self {
        Self::VideoWithAudio
    }
}

impl FromStr for FormatKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio" => Ok(FormatKind::AudioOnly),
            "mp4" | "video" => Ok(FormatKind::VideoWithAudio),
            "muted_mp4" | "muted" => Ok(FormatKind::VideoMuted),
            other => Err(AppError::InvalidRequest(format!(
                "Unsupported format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::AudioOnly => "mp3",
            FormatKind::VideoWithAudio => "mp4",
            FormatKind::VideoMuted => "muted_mp4",
        };
        f.write_str(name)
    }
}

/// Requested subtitle languages, possibly including [`AUTO_SUBTITLE_TOKEN`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleRequest {
    pub languages: Vec<String>,
}

impl SubtitleRequest {
    pub fn new<I, L>(languages: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma separated list such as "en,de,auto"
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        )
    }
}

/// Everything the user asked for. Immutable once a task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub resolution: Resolution,
    pub kind: FormatKind,
    /// Only honoured for video kinds at 720p and above
    pub prefer_high_fps: bool,
    pub subtitles: Option<SubtitleRequest>,
    pub destination: PathBuf,
    /// Re-encode merged video to H.264/AAC after download
    pub reencode_h264: bool,
}

impl DownloadRequest {
    pub fn builder(url: &str, destination: impl AsRef<Path>) -> DownloadRequestBuilder {
        DownloadRequestBuilder::new(url, destination)
    }
}

/// Builder for creating download requests with fluent interface
#[derive(Debug)]
pub struct DownloadRequestBuilder {
    request: DownloadRequest,
}

impl DownloadRequestBuilder {
    pub fn new(url: &str, destination: impl AsRef<Path>) -> Self {
        Self {
            request: DownloadRequest {
                url: url.trim().to_string(),
                resolution: Resolution::default(),
                kind: FormatKind::default(),
                prefer_high_fps: false,
                subtitles: None,
                destination: destination.as_ref().to_path_buf(),
                reencode_h264: false,
            },
        }
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.request.resolution = resolution;
        self
    }

    pub fn kind(mut self, kind: FormatKind) -> Self {
        self.request.kind = kind;
        self
    }

    pub fn high_fps(mut self, prefer: bool) -> Self {
        self.request.prefer_high_fps = prefer;
        self
    }

    pub fn subtitles(mut self, subtitles: Option<SubtitleRequest>) -> Self {
        self.request.subtitles = subtitles;
        self
    }

    pub fn reencode(mut self, reencode: bool) -> Self {
        self.request.reencode_h264 = reencode;
        self
    }

    pub fn build(self) -> DownloadRequest {
        self.request
    }
}

/// Stream selection plus container handling, one variant per format kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPlan {
    AudioOnly {
        selector: String,
        codec: String,
        quality: String,
    },
    VideoWithAudio {
        selector: String,
        merge_container: String,
        high_fps: bool,
    },
    VideoMuted {
        selector: String,
        remux_container: String,
        high_fps: bool,
    },
}

impl MediaPlan {
    pub fn selector(&self) -> &str {
        match self {
            MediaPlan::AudioOnly { selector, .. }
            | MediaPlan::VideoWithAudio { selector, .. }
            | MediaPlan::VideoMuted { selector, .. } => selector,
        }
    }

    pub fn high_fps(&self) -> bool {
        match self {
            MediaPlan::AudioOnly { .. } => false,
            MediaPlan::VideoWithAudio { high_fps, .. } | MediaPlan::VideoMuted { high_fps, .. } => {
                *high_fps
            }
        }
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            MediaPlan::AudioOnly { .. } => FormatKind::AudioOnly,
            MediaPlan::VideoWithAudio { .. } => FormatKind::VideoWithAudio,
            MediaPlan::VideoMuted { .. } => FormatKind::VideoMuted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitlePlan {
    /// Explicit languages, never empty and never containing the auto token
    pub languages: Vec<String>,
    pub auto_generated: bool,
    pub format: String,
}

/// Target codecs for the compatibility re-encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReencodeSpec {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for ReencodeSpec {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessStep {
    ExtractAudio { codec: String, quality: String },
    MergeInto { container: String },
    Remux { container: String, drop_audio: bool },
    FetchSubtitles(SubtitlePlan),
    WriteTags { album: String },
    Reencode(ReencodeSpec),
}

impl PostProcessStep {
    /// Steps the engine performs itself as part of the transfer
    pub fn runs_in_engine(&self) -> bool {
        !matches!(
            self,
            PostProcessStep::WriteTags { .. } | PostProcessStep::Reencode(_)
        )
    }
}

/// Fully resolved instructions for one request. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub media: MediaPlan,
    /// Engine steps first, then the post-completion chain
    pub steps: Vec<PostProcessStep>,
    pub output_template: String,
    /// Extension of the produced file
    pub container: String,
    /// Directory the artifact is written to
    pub destination: PathBuf,
}

impl DownloadPlan {
    pub fn kind(&self) -> FormatKind {
        self.media.kind()
    }

    pub fn subtitles(&self) -> Option<&SubtitlePlan> {
        self.steps.iter().find_map(|step| match step {
            PostProcessStep::FetchSubtitles(plan) => Some(plan),
            _ => None,
        })
    }

    pub fn engine_steps(&self) -> impl Iterator<Item = &PostProcessStep> {
        self.steps.iter().filter(|s| s.runs_in_engine())
    }

    pub fn post_completion_steps(&self) -> impl Iterator<Item = &PostProcessStep> {
        self.steps.iter().filter(|s| !s.runs_in_engine())
    }

    /// Template handed to the engine, rooted in the destination directory
    pub fn output_path_template(&self) -> PathBuf {
        self.destination.join(&self.output_template)
    }

    pub fn artifact_path_for(&self, metadata: &VideoMetadata) -> PathBuf {
        self.destination.join(self.file_name_for(metadata))
    }

    /// Concrete file name the template resolves to for the given video
    pub fn file_name_for(&self, metadata: &VideoMetadata) -> String {
        let suffix = match self.media {
            MediaPlan::VideoMuted { .. } => MUTED_SUFFIX,
            _ => "",
        };
        format!(
            "{} - {}{}.{}",
            sanitize_file_component(&metadata.uploader),
            sanitize_file_component(&metadata.title),
            suffix,
            self.container
        )
    }
}

/// Build the plan for a request. Pure and deterministic.
pub fn plan(request: &DownloadRequest) -> Result<DownloadPlan, AppError> {
    validate_url(&request.url)?;

    if request.destination.as_os_str().is_empty() {
        return Err(AppError::InvalidRequest(
            "Destination directory must not be empty".to_string(),
        ));
    }

    let height = request.resolution.height();
    let high_fps = request.prefer_high_fps
        && request.resolution.supports_high_fps()
        && !request.kind.is_audio();

    let mut steps = Vec::new();
    let (media, output_template, container) = match request.kind {
        FormatKind::AudioOnly => {
            steps.push(PostProcessStep::ExtractAudio {
                codec: AUDIO_CODEC.to_string(),
                quality: AUDIO_QUALITY.to_string(),
            });
            (
                MediaPlan::AudioOnly {
                    selector: "bestaudio/best".to_string(),
                    codec: AUDIO_CODEC.to_string(),
                    quality: AUDIO_QUALITY.to_string(),
                },
                format!("{}.%(ext)s", OUTPUT_STEM),
                AUDIO_CODEC,
            )
        }
        FormatKind::VideoWithAudio => {
            let video = video_selector(height, high_fps);
            // Keep the audio pick from dragging the fallback off the fps ceiling
            let selector = if high_fps {
                format!(
                    "{}+bestaudio[fps<=?{}]/best[height<={}]",
                    video, HIGH_FPS, height
                )
            } else {
                format!("{}+bestaudio/best[height<={}]", video, height)
            };
            steps.push(PostProcessStep::MergeInto {
                container: VIDEO_CONTAINER.to_string(),
            });
            (
                MediaPlan::VideoWithAudio {
                    selector,
                    merge_container: VIDEO_CONTAINER.to_string(),
                    high_fps,
                },
                format!("{}.%(ext)s", OUTPUT_STEM),
                VIDEO_CONTAINER,
            )
        }
        FormatKind::VideoMuted => {
            steps.push(PostProcessStep::Remux {
                container: VIDEO_CONTAINER.to_string(),
                drop_audio: true,
            });
            (
                MediaPlan::VideoMuted {
                    selector: video_selector(height, high_fps),
                    remux_container: VIDEO_CONTAINER.to_string(),
                    high_fps,
                },
                format!("{}{}.%(ext)s", OUTPUT_STEM, MUTED_SUFFIX),
                VIDEO_CONTAINER,
            )
        }
    };

    if let Some(subtitles) = &request.subtitles {
        steps.push(PostProcessStep::FetchSubtitles(subtitle_plan(subtitles)));
    }

    match request.kind {
        FormatKind::AudioOnly => steps.push(PostProcessStep::WriteTags {
            album: TAG_ALBUM.to_string(),
        }),
        FormatKind::VideoWithAudio if request.reencode_h264 => {
            steps.push(PostProcessStep::Reencode(ReencodeSpec::default()))
        }
        _ => {}
    }

    Ok(DownloadPlan {
        media,
        steps,
        output_template,
        container: container.to_string(),
        destination: request.destination.clone(),
    })
}

fn video_selector(height: u32, high_fps: bool) -> String {
    if high_fps {
        format!("bestvideo[height<={}][fps>={}]", height, HIGH_FPS)
    } else {
        format!("bestvideo[height<={}]", height)
    }
}

fn subtitle_plan(request: &SubtitleRequest) -> SubtitlePlan {
    let mut auto_generated = false;
    let mut languages: Vec<String> = Vec::new();

    for language in request.languages.iter().map(|l| l.trim()) {
        if language.is_empty() {
            continue;
        }
        if language.eq_ignore_ascii_case(AUTO_SUBTITLE_TOKEN) {
            auto_generated = true;
        } else if !languages.iter().any(|l| l == language) {
            languages.push(language.to_string());
        }
    }

    if languages.is_empty() {
        languages.push(DEFAULT_SUBTITLE_LANGUAGE.to_string());
    }

    SubtitlePlan {
        languages,
        auto_generated,
        format: SUBTITLE_FORMAT.to_string(),
    }
}
