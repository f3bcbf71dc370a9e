// src/settings.rs
// Persistent user preferences stored as JSON

use crate::error::AppError;
use crate::planner::FormatKind;
use crate::post_action::PostDownloadAction;
use dirs_next as dirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SETTINGS_DIR: &str = ".vidgrabber";
const SETTINGS_FILE: &str = "settings.json";

/// Keys accepted by [`Settings::set`]
pub const SETTING_KEYS: [&str; 4] = [
    "video_save_path",
    "audio_save_path",
    "theme",
    "post_download_action",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    System,
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Self::System
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(AppError::Settings(format!("Unknown theme: {}", other))),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::System => "system",
            Theme::Light => "light",
            Theme::Dark => "dark",
        };
        f.write_str(name)
    }
}

/// User preferences. Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "video_save_path")]
    pub video_dir: PathBuf,
    #[serde(rename = "audio_save_path")]
    pub audio_dir: PathBuf,
    pub theme: Theme,
    pub post_download_action: PostDownloadAction,
}

impl Default for Settings {
    fn default() -> Self {
        let downloads = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Downloads");

        Self {
            video_dir: downloads.join("Vids"),
            audio_dir: downloads.join("Songs"),
            theme: Theme::default(),
            post_download_action: PostDownloadAction::default(),
        }
    }
}

impl Settings {
    /// `<home>/.vidgrabber/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_DIR)
            .join(SETTINGS_FILE)
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path).map_err(|e| {
            AppError::Settings(format!("Could not read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&json).map_err(|e| {
            AppError::Settings(format!("Could not parse {}: {}", path.display(), e))
        })
    }

    /// Load from the default location, logging and falling back to defaults
    /// when the file is unreadable or corrupt
    pub fn load() -> Self {
        let path = Self::default_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Settings(format!("Could not create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            AppError::Settings(format!("Could not write {}: {}", path.display(), e))
        })?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::default_path())
    }

    /// Update one setting from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        match key {
            "video_save_path" | "video_dir" => self.video_dir = non_empty_path(key, value)?,
            "audio_save_path" | "audio_dir" => self.audio_dir = non_empty_path(key, value)?,
            "theme" => self.theme = value.parse()?,
            "post_download_action" => self.post_download_action = value.parse()?,
            other => {
                return Err(AppError::Settings(format!(
                    "Unknown setting '{}', expected one of: {}",
                    other,
                    SETTING_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Output directory for a format kind: songs for audio, videos otherwise
    pub fn destination_for(&self, kind: FormatKind) -> &Path {
        if kind.is_audio() {
            &self.audio_dir
        } else {
            &self.video_dir
        }
    }
}

fn non_empty_path(key: &str, value: &str) -> Result<PathBuf, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Settings(format!("{} must not be empty", key)));
    }
    Ok(PathBuf::from(trimmed))
}
