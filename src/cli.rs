// src/cli.rs

use crate::error::AppError;
use crate::planner::{DownloadRequest, FormatKind, Resolution, SubtitleRequest};
use crate::settings::{Settings, SETTING_KEYS};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Build the command-line interface for the application
pub fn build_cli() -> Command {
    Command::new("vidgrabber")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Ibrahim Mohamed")
        .about("Download videos and songs with yt-dlp, organized by media type")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("download")
                .about("Download a video or audio")
                .arg(
                    Arg::new("url")
                        .help("The URL of the video to download")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("resolution")
                        .long("resolution")
                        .short('r')
                        .help("Maximum video height")
                        .value_parser([
                            "144", "240", "360", "480", "720", "1080", "1440", "2160",
                        ])
                        .default_value("720"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format: video, audio only, or video without sound")
                        .value_parser(["mp4", "mp3", "muted_mp4"])
                        .default_value("mp4"),
                )
                .arg(
                    Arg::new("fps60")
                        .long("fps60")
                        .help("Prefer 60 fps streams (720p and above)")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("subtitles")
                        .long("subs")
                        .help("Comma separated subtitle languages, 'auto' adds generated captions")
                        .value_name("LANGS")
                        .num_args(0..=1)
                        .default_missing_value("en"),
                )
                .arg(
                    Arg::new("reencode")
                        .long("reencode")
                        .help("Re-encode the video to H.264/AAC for compatibility")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .short('o')
                        .help("Override the output directory from settings")
                        .value_name("DIRECTORY"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show video information without downloading")
                .arg(
                    Arg::new("url")
                        .help("The URL of the video")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Show or change persistent settings")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the current settings"))
                .subcommand(
                    Command::new("set")
                        .about("Change one setting")
                        .arg(
                            Arg::new("key")
                                .help("Setting name")
                                .required(true)
                                .index(1)
                                .value_parser(SETTING_KEYS),
                        )
                        .arg(
                            Arg::new("value")
                                .help("New value")
                                .required(true)
                                .index(2),
                        ),
                )
                .subcommand(Command::new("reset").about("Restore default settings")),
        )
}

/// Turn `download` arguments into a request, using settings for the default directory
pub fn request_from_matches(
    matches: &ArgMatches,
    settings: &Settings,
) -> Result<DownloadRequest, AppError> {
    let url = matches
        .get_one::<String>("url")
        .ok_or_else(|| AppError::InvalidRequest("URL is required".to_string()))?;

    let resolution: Resolution = match matches.get_one::<String>("resolution") {
        Some(value) => value.parse()?,
        None => Resolution::default(),
    };

    let kind: FormatKind = match matches.get_one::<String>("format") {
        Some(value) => value.parse()?,
        None => FormatKind::default(),
    };

    let destination = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.destination_for(kind).to_path_buf());

    let subtitles = matches
        .get_one::<String>("subtitles")
        .map(|list| SubtitleRequest::parse(list));

    Ok(DownloadRequest::builder(url, destination)
        .resolution(resolution)
        .kind(kind)
        .high_fps(matches.get_flag("fps60"))
        .subtitles(subtitles)
        .reencode(matches.get_flag("reencode"))
        .build())
}
