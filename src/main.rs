// src/main.rs

use clap::ArgMatches;
use colored::*;
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vidgrabber::cli::{build_cli, request_from_matches};
use vidgrabber::dependency_validator::validate_dependencies;
use vidgrabber::download_manager::{TaskHandle, TaskSupervisor};
use vidgrabber::downloader::YtDlpEngine;
use vidgrabber::error::AppError;
use vidgrabber::post_action::{self, ActionEffect};
use vidgrabber::postprocess::{FfmpegTranscoder, Id3Tagger};
use vidgrabber::progress::Percent;
use vidgrabber::settings::Settings;
use vidgrabber::task::{DownloadStage, TaskEvent, TaskOutcome};
use vidgrabber::utils::format_time;
use vidgrabber::VERSION;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logger();
    info!("vidgrabber starting up - version {}", VERSION);

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("download", sub)) => {
            print_logo();
            check_dependencies()?;
            run_download(sub).await
        }
        Some(("info", sub)) => {
            check_dependencies()?;
            run_info(sub).await
        }
        Some(("settings", sub)) => run_settings(sub),
        _ => Ok(()),
    }
}

fn check_dependencies() -> Result<(), AppError> {
    match validate_dependencies() {
        Ok(deps) => {
            for dep in deps {
                debug!("Using {} {}", dep.name, dep.version);
            }
            Ok(())
        }
        Err(e) => {
            error!("Dependency check failed: {}", e);
            Err(e)
        }
    }
}

fn supervisor() -> TaskSupervisor {
    TaskSupervisor::new(
        Arc::new(YtDlpEngine::new()),
        Arc::new(FfmpegTranscoder::new()),
        Arc::new(Id3Tagger),
    )
}

async fn run_download(matches: &ArgMatches) -> Result<(), AppError> {
    let settings = Settings::load();
    let request = request_from_matches(matches, &settings)?;
    let supervisor = supervisor();

    println!(
        "{} {} ({}, {})",
        "Downloading".bright_cyan(),
        request.url,
        request.kind,
        request.resolution
    );

    let handle = supervisor.start_download(request)?;
    let outcome = follow_download(handle).await;

    match outcome {
        TaskOutcome::Completed(path) => {
            println!("{} {}", "Saved to".green(), path.display());
            match post_action::execute(settings.post_download_action) {
                Ok(ActionEffect::Quit) => info!("Exiting after download"),
                Ok(ActionEffect::Continue) => {}
                Err(e) => eprintln!("{}: {}", "Warning".yellow(), e),
            }
            Ok(())
        }
        TaskOutcome::Failed(message) => {
            eprintln!("{}: {}", "Error".red(), message);
            Err(AppError::General(message))
        }
        TaskOutcome::Cancelled => {
            println!("{}", "Download cancelled.".yellow());
            Ok(())
        }
    }
}

// Render events until the task finishes; Ctrl+C cancels it
async fn follow_download(mut handle: TaskHandle<PathBuf>) -> TaskOutcome<PathBuf> {
    let pb = ProgressBar::new(100);
    pb.set_style(bar_style());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                pb.set_message("Cancelling...");
                handle.cancel();
            }
            event = handle.next_event() => match event {
                Some(TaskEvent::Stage(stage)) => {
                    debug!("Task {} entered {:?}", handle.id(), stage);
                    if !stage.is_terminal() {
                        pb.set_message(stage.describe());
                    }
                }
                Some(TaskEvent::Progress(report)) => match report.percent {
                    Percent::Determinate(percent) => {
                        pb.disable_steady_tick();
                        pb.set_style(bar_style());
                        pb.set_position(u64::from(percent));
                        pb.set_message(report.message);
                    }
                    Percent::Indeterminate => {
                        pb.set_style(spinner_style());
                        pb.enable_steady_tick(Duration::from_millis(120));
                        pb.set_message(report.message);
                    }
                },
                Some(TaskEvent::Finished(outcome)) => {
                    match &outcome {
                        TaskOutcome::Completed(_) => {
                            pb.finish_with_message(DownloadStage::Completed.describe())
                        }
                        TaskOutcome::Failed(_) => pb.abandon_with_message(DownloadStage::Failed.describe()),
                        TaskOutcome::Cancelled => pb.abandon_with_message(DownloadStage::Cancelled.describe()),
                    }
                    return outcome;
                }
                None => {
                    pb.abandon();
                    return TaskOutcome::Failed("Download worker stopped unexpectedly".to_string());
                }
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

async fn run_info(matches: &ArgMatches) -> Result<(), AppError> {
    let url = matches
        .get_one::<String>("url")
        .ok_or_else(|| AppError::InvalidRequest("URL is required".to_string()))?;

    let handle = supervisor().start_metadata(url)?;
    match handle.wait().await {
        TaskOutcome::Completed(metadata) => {
            println!("{}: {}", "Title".bright_cyan(), metadata.title);
            println!("{}: {}", "Uploader".bright_cyan(), metadata.uploader);
            println!("{}: {}", "Duration".bright_cyan(), format_time(metadata.duration));
            let views = metadata
                .view_count
                .map(|v| v.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            println!("{}: {}", "Views".bright_cyan(), views);
            Ok(())
        }
        TaskOutcome::Failed(message) => {
            eprintln!("{}: {}", "Error".red(), message);
            Err(AppError::MetadataFetch(message))
        }
        TaskOutcome::Cancelled => Ok(()),
    }
}

fn run_settings(matches: &ArgMatches) -> Result<(), AppError> {
    let path = Settings::default_path();

    match matches.subcommand() {
        Some(("show", _)) => {
            let settings = Settings::load_from(&path)?;
            println!("{}", format!("Settings file: {}", path.display()).cyan());
            println!("video_save_path      = {}", settings.video_dir.display());
            println!("audio_save_path      = {}", settings.audio_dir.display());
            println!("theme                = {}", settings.theme);
            println!("post_download_action = {}", settings.post_download_action);
        }
        Some(("set", sub)) => {
            let key = sub
                .get_one::<String>("key")
                .ok_or_else(|| AppError::Settings("Missing key".to_string()))?;
            let value = sub
                .get_one::<String>("value")
                .ok_or_else(|| AppError::Settings("Missing value".to_string()))?;

            let mut settings = Settings::load();
            settings.set(key, value)?;
            settings.save()?;
            println!("{} {} = {}", "Updated".green(), key, value);
        }
        Some(("reset", _)) => {
            Settings::default().save()?;
            println!("{}", "Settings restored to defaults".green());
        }
        _ => {}
    }

    Ok(())
}

fn init_logger() {
    // Create a custom logger builder
    let mut builder = Builder::from_default_env();

    // Set the default level based on debug/release mode
    if cfg!(debug_assertions) {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    // Define a custom format with timestamp, level, module, and message
    builder.format(|buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(
            buf,
            "[{} {} {}] {}",
            timestamp,
            record.level().to_string().to_uppercase(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    // Allow override through RUST_LOG environment variable
    builder.parse_env("RUST_LOG");

    builder.init();
}

fn print_logo() {
    println!(
        "\n{}\n{}\n",
        "vidgrabber".bright_cyan().bold(),
        format!("Version: {}", VERSION).cyan()
    );
}
