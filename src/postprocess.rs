// src/postprocess.rs
// Steps that run after the engine has produced the artifact

use crate::downloader::VideoMetadata;
use crate::error::AppError;
use crate::planner::ReencodeSpec;
use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::tag::Tag;
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;

/// External re-encoder
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `input` into `output`. On failure `input` is left untouched.
    async fn reencode(&self, input: &Path, output: &Path, spec: &ReencodeSpec)
        -> Result<(), AppError>;
}

/// Writes descriptive tags into an audio file in place
pub trait Tagger: Send + Sync {
    fn write_tags(&self, path: &Path, metadata: &VideoMetadata, album: &str)
        -> Result<(), AppError>;
}

/// Transcoder backed by the `ffmpeg` executable
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Build the ffmpeg argument list for a re-encode
pub fn build_reencode_args(input: &Path, output: &Path, spec: &ReencodeSpec) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        spec.video_codec.clone(),
        "-preset".to_string(),
        spec.preset.clone(),
        "-crf".to_string(),
        spec.crf.to_string(),
        "-c:a".to_string(),
        spec.audio_codec.clone(),
        "-b:a".to_string(),
        spec.audio_bitrate.clone(),
        output.to_string_lossy().into_owned(),
    ]
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        spec: &ReencodeSpec,
    ) -> Result<(), AppError> {
        let args = build_reencode_args(input, output, spec);
        debug!("Running {} {:?}", self.program.display(), args);

        let result = AsyncCommand::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output_status = match result {
            Ok(out) => out,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::MissingDependency(format!(
                    "{} (not found, please ensure it is installed and in your PATH)",
                    self.program.display()
                )));
            }
            Err(e) => {
                return Err(AppError::PostProcess(format!(
                    "Failed to execute {}: {}",
                    self.program.display(),
                    e
                )))
            }
        };

        if !output_status.status.success() {
            remove_partial(output);
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no diagnostic output")
                .trim()
                .to_string();
            return Err(AppError::PostProcess(format!(
                "ffmpeg exited with {}: {}",
                output_status.status, reason
            )));
        }

        if !output.exists() {
            return Err(AppError::PostProcess(format!(
                "ffmpeg reported success but {} is missing",
                output.display()
            )));
        }

        Ok(())
    }
}

/// Re-encode `path` and replace it with the result.
///
/// The encoder writes to a sibling file first; the original is only replaced
/// once that file is complete.
pub async fn reencode_in_place(
    transcoder: &dyn Transcoder,
    path: &Path,
    spec: &ReencodeSpec,
) -> Result<(), AppError> {
    let temp = reencode_temp_path(path);

    if let Err(e) = transcoder.reencode(path, &temp, spec).await {
        remove_partial(&temp);
        return Err(e);
    }

    tokio::fs::rename(&temp, path).await.map_err(|e| {
        remove_partial(&temp);
        AppError::PostProcess(format!("Could not replace {}: {}", path.display(), e))
    })?;

    info!("Re-encoded {} to {}", path.display(), spec.video_codec);
    Ok(())
}

/// Sibling path used while re-encoding, keeping the container extension
pub fn reencode_temp_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}.reencode.{}", stem, ext.to_string_lossy()),
        None => format!("{}.reencode", stem),
    };
    path.with_file_name(name)
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove partial file {}: {}", path.display(), e);
        }
    }
}

/// ID3 (or the file type's native tag) writer backed by lofty
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3Tagger;

impl Tagger for Id3Tagger {
    fn write_tags(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        album: &str,
    ) -> Result<(), AppError> {
        let mut tagged_file = lofty::read_from_path(path).map_err(|e| {
            AppError::PostProcess(format!("Could not read {}: {}", path.display(), e))
        })?;

        let mut tag = match tagged_file.primary_tag_mut() {
            Some(existing) => existing.clone(),
            None => Tag::new(tagged_file.file_type().primary_tag_type()),
        };

        tag.set_title(metadata.title.clone());
        tag.set_artist(metadata.uploader.clone());
        tag.set_album(album.to_string());

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| {
                AppError::PostProcess(format!("Could not tag {}: {}", path.display(), e))
            })?;

        debug!("Tagged {} ({} / {})", path.display(), metadata.uploader, metadata.title);
        Ok(())
    }
}
