// src/dependency_validator.rs
// Startup check that the external engine and transcoder can be called

use crate::error::AppError;
use colored::*;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::{Command, Stdio};

// Oldest releases known to support --progress-template and --print after_move
pub const MIN_YTDLP_VERSION: &str = "2021.10.09";
pub const MIN_FFMPEG_VERSION: &str = "4.0.0";

static YTDLP_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}\.\d{2}\.\d{2}(?:\.\d+)?)").expect("valid regex"));
static FFMPEG_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ffmpeg|version)\s+(?:version\s+)?n?(\d+\.\d+(?:\.\d+)?)").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub is_min_version: bool,
}

/// Pull a version number out of `--version` / `-version` output
pub fn parse_version(output: &str, name: &str) -> Option<String> {
    let pattern = match name {
        "ffmpeg" => &FFMPEG_VERSION,
        _ => &YTDLP_VERSION,
    };

    pattern
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Compare dotted versions numerically, missing components count as zero
pub fn is_minimum_version(version: &str, min_version: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };

    let current = parse(version);
    let minimum = parse(min_version);
    let len = current.len().max(minimum.len());

    for i in 0..len {
        let a = current.get(i).copied().unwrap_or(0);
        let b = minimum.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }
    true
}

/// Installation hint shown next to a missing dependency
pub fn install_hint(name: &str) -> &'static str {
    match name {
        "ffmpeg" => {
            if cfg!(target_os = "windows") {
                "Install ffmpeg with: winget install ffmpeg (or choco install ffmpeg)"
            } else if cfg!(target_os = "macos") {
                "Install ffmpeg with: brew install ffmpeg"
            } else {
                "Install ffmpeg with your package manager, e.g. sudo apt install ffmpeg"
            }
        }
        _ => {
            if cfg!(target_os = "windows") {
                "Install yt-dlp with: winget install yt-dlp (or pip install yt-dlp)"
            } else if cfg!(target_os = "macos") {
                "Install yt-dlp with: brew install yt-dlp"
            } else {
                "Install yt-dlp with: python3 -m pip install -U yt-dlp"
            }
        }
    }
}

/// Run `<name> <version_arg>` and report what was found
pub fn get_dependency_info(name: &str) -> Result<DependencyInfo, AppError> {
    let version_arg = if name == "ffmpeg" { "-version" } else { "--version" };

    let output = Command::new(name)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            debug!("Could not run {}: {}", name, e);
            AppError::MissingDependency(format!("{} is not installed. {}", name, install_hint(name)))
        })?;

    if !output.status.success() {
        return Err(AppError::MissingDependency(format!(
            "{} is installed but not working (exit status {}). {}",
            name,
            output.status,
            install_hint(name)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout, name).unwrap_or_else(|| "unknown".to_string());
    let min_version = if name == "ffmpeg" {
        MIN_FFMPEG_VERSION
    } else {
        MIN_YTDLP_VERSION
    };

    Ok(DependencyInfo {
        name: name.to_string(),
        is_min_version: version == "unknown" || is_minimum_version(&version, min_version),
        version,
    })
}

pub fn is_ffmpeg_available() -> bool {
    get_dependency_info("ffmpeg").is_ok()
}

/// Check yt-dlp (required) and ffmpeg (required for merging, audio and re-encode)
pub fn validate_dependencies() -> Result<Vec<DependencyInfo>, AppError> {
    info!("Starting dependency validation");
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for name in ["yt-dlp", "ffmpeg"] {
        match get_dependency_info(name) {
            Ok(dep) => {
                debug!("{} {} found", dep.name, dep.version);
                if !dep.is_min_version {
                    warn!("{} {} is older than recommended", dep.name, dep.version);
                    println!(
                        "{}: {} {} is older than recommended",
                        "WARNING".yellow(),
                        dep.name,
                        dep.version
                    );
                }
                found.push(dep);
            }
            Err(e) => {
                println!("{}: {}", "ERROR".red(), e);
                missing.push(name);
            }
        }
    }

    if !missing.is_empty() {
        return Err(AppError::MissingDependency(missing.join(", ")));
    }

    info!("All dependencies validated successfully");
    Ok(found)
}
