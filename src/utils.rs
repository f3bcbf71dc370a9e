// src/utils.rs

use crate::error::AppError;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9\-._~%]+(?::\d{1,5})?(?:[/?#][^\s]*)?$")
        .expect("URL pattern is a valid regex")
});

/// Format a byte count as a human readable string (B, KB, MB, GB)
pub fn format_size(bytes: u64) -> String {
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}

/// Same as [`format_size`] but tolerant of an unknown value
pub fn format_optional_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => format_size(b),
        None => "N/A".to_string(),
    }
}

/// Format a transfer rate in bytes per second, "N/A" when unknown
pub fn format_speed(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed.is_finite() && speed >= 0.0 => {
            format!("{}/s", format_size(speed as u64))
        }
        _ => "N/A".to_string(),
    }
}

/// Format a duration in seconds as HH:MM:SS, "N/A" when unknown
pub fn format_time(seconds: Option<u64>) -> String {
    match seconds {
        Some(total_secs) => {
            let hours = total_secs / 3600;
            let minutes = (total_secs % 3600) / 60;
            let seconds = total_secs % 60;
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        }
        None => "N/A".to_string(),
    }
}

/// Validate that a URL is a non-empty http(s) address
pub fn validate_url(url: &str) -> Result<(), AppError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidRequest("URL must not be empty".to_string()));
    }

    if url.len() > 4096 {
        return Err(AppError::InvalidRequest(
            "URL exceeds maximum allowed length".to_string(),
        ));
    }

    if !URL_REGEX.is_match(url) {
        return Err(AppError::InvalidRequest(format!(
            "Invalid URL format: {}",
            url
        )));
    }

    Ok(())
}

/// Create the download directory if it is missing and make sure it is writable
pub fn ensure_download_dir(dir: &Path) -> Result<PathBuf, AppError> {
    if dir.as_os_str().is_empty() {
        return Err(AppError::Directory(
            "Destination directory is empty".to_string(),
        ));
    }

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Directory(format!("Could not create {}: {}", dir.display(), e))
        })?;
        info!("Created directory: {}", dir.display());
    }

    let metadata = fs::metadata(dir)
        .map_err(|e| AppError::Directory(format!("Could not inspect {}: {}", dir.display(), e)))?;

    if !metadata.is_dir() {
        return Err(AppError::Directory(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    if metadata.permissions().readonly() {
        return Err(AppError::Directory(format!(
            "{} is not writable",
            dir.display()
        )));
    }

    debug!("Using download directory {}", dir.display());
    Ok(dir.to_path_buf())
}

/// Make a metadata string safe to use as part of a file name
pub fn sanitize_file_component(component: &str) -> String {
    let sanitized: String = component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
