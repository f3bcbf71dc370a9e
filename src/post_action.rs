// src/post_action.rs
// What to do with the machine once a download has completed

use crate::error::AppError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostDownloadAction {
    Nothing,
    Suspend,
    /// Terminate this application
    Quit,
    Restart,
    Shutdown,
}

impl Default for PostDownloadAction {
    fn default() -> Self {
        Self::Nothing
    }
}

impl FromStr for PostDownloadAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nothing" | "none" => Ok(PostDownloadAction::Nothing),
            "suspend" | "sleep" => Ok(PostDownloadAction::Suspend),
            "quit" | "exit" => Ok(PostDownloadAction::Quit),
            "restart" | "reboot" => Ok(PostDownloadAction::Restart),
            "shutdown" => Ok(PostDownloadAction::Shutdown),
            other => Err(AppError::Settings(format!(
                "Unknown post-download action: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PostDownloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostDownloadAction::Nothing => "nothing",
            PostDownloadAction::Suspend => "suspend",
            PostDownloadAction::Quit => "quit",
            PostDownloadAction::Restart => "restart",
            PostDownloadAction::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// What the foreground has to do after [`execute`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEffect {
    Continue,
    /// Exit the application
    Quit,
}

/// System command implementing a machine-level action on this OS
pub fn command_for(action: PostDownloadAction) -> Option<(&'static str, Vec<&'static str>)> {
    match action {
        PostDownloadAction::Nothing | PostDownloadAction::Quit => None,
        PostDownloadAction::Suspend => suspend_command(),
        PostDownloadAction::Restart => restart_command(),
        PostDownloadAction::Shutdown => shutdown_command(),
    }
}

#[cfg(target_os = "linux")]
fn suspend_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("systemctl", vec!["suspend"]))
}

#[cfg(target_os = "macos")]
fn suspend_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("pmset", vec!["sleepnow"]))
}

#[cfg(target_os = "windows")]
fn suspend_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("rundll32.exe", vec!["powrprof.dll,SetSuspendState", "0,1,0"]))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn suspend_command() -> Option<(&'static str, Vec<&'static str>)> {
    None
}

#[cfg(target_os = "windows")]
fn restart_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("shutdown", vec!["/r", "/t", "0"]))
}

#[cfg(not(target_os = "windows"))]
fn restart_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("shutdown", vec!["-r", "now"]))
}

#[cfg(target_os = "windows")]
fn shutdown_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("shutdown", vec!["/s", "/t", "0"]))
}

#[cfg(not(target_os = "windows"))]
fn shutdown_command() -> Option<(&'static str, Vec<&'static str>)> {
    Some(("shutdown", vec!["-h", "now"]))
}

/// Run the configured action after a successful download
pub fn execute(action: PostDownloadAction) -> Result<ActionEffect, AppError> {
    match action {
        PostDownloadAction::Nothing => return Ok(ActionEffect::Continue),
        PostDownloadAction::Quit => {
            info!("Post-download action: quit");
            return Ok(ActionEffect::Quit);
        }
        _ => {}
    }

    let (program, args) = command_for(action).ok_or_else(|| {
        AppError::General(format!("'{}' is not supported on this platform", action))
    })?;

    info!("Post-download action: {} ({} {})", action, program, args.join(" "));
    let status = Command::new(program).args(&args).status()?;

    if !status.success() {
        warn!("{} exited with {}", program, status);
        return Err(AppError::General(format!(
            "Post-download action '{}' failed: {} exited with {}",
            action, program, status
        )));
    }

    Ok(ActionEffect::Continue)
}
