// tests/settings_test.rs
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use vidgrabber::error::AppError;
use vidgrabber::planner::FormatKind;
use vidgrabber::post_action::PostDownloadAction;
use vidgrabber::settings::{Settings, Theme};

#[test]
fn test_defaults() {
    let settings = Settings::default();
    assert!(settings.video_dir.ends_with(PathBuf::from("Downloads").join("Vids")));
    assert!(settings.audio_dir.ends_with(PathBuf::from("Downloads").join("Songs")));
    assert_eq!(settings.theme, Theme::System);
    assert_eq!(settings.post_download_action, PostDownloadAction::Nothing);
    assert!(Settings::default_path().ends_with(".vidgrabber/settings.json"));
}

#[test]
fn test_missing_file_gives_defaults() {
    let temp = tempdir().unwrap();
    let settings = Settings::load_from(&temp.path().join("settings.json")).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_save_and_load_round_trip() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("nested").join("settings.json");

    let mut settings = Settings::default();
    settings.set("video_save_path", "/media/videos").unwrap();
    settings.set("audio_save_path", "/media/music").unwrap();
    settings.set("theme", "Dark").unwrap();
    settings.set("post_download_action", "shutdown").unwrap();
    settings.save_to(&path).unwrap();

    let json = fs::read_to_string(&path).unwrap();
    assert!(json.contains("\"video_save_path\""));
    assert!(json.contains("\"dark\""));

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(loaded.video_dir, PathBuf::from("/media/videos"));
    assert_eq!(loaded.theme, Theme::Dark);
    assert_eq!(loaded.post_download_action, PostDownloadAction::Shutdown);
}

#[test]
fn test_missing_keys_fall_back() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("settings.json");
    fs::write(&path, r#"{"audio_save_path": "/srv/songs"}"#).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    let defaults = Settings::default();
    assert_eq!(settings.audio_dir, PathBuf::from("/srv/songs"));
    assert_eq!(settings.video_dir, defaults.video_dir);
    assert_eq!(settings.theme, defaults.theme);
}

#[test]
fn test_corrupt_file_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("settings.json");
    fs::write(&path, "{ this is not json").unwrap();

    assert!(matches!(
        Settings::load_from(&path),
        Err(AppError::Settings(_))
    ));
}

#[test]
fn test_set_rejects_bad_input() {
    let mut settings = Settings::default();
    assert!(matches!(
        settings.set("colour", "red"),
        Err(AppError::Settings(_))
    ));
    assert!(settings.set("theme", "neon").is_err());
    assert!(settings.set("post_download_action", "explode").is_err());
    assert!(settings.set("video_save_path", "  ").is_err());
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_destination_by_media_type() {
    let settings = Settings {
        video_dir: PathBuf::from("/v"),
        audio_dir: PathBuf::from("/a"),
        ..Settings::default()
    };
    assert_eq!(settings.destination_for(FormatKind::AudioOnly), PathBuf::from("/a"));
    assert_eq!(settings.destination_for(FormatKind::VideoWithAudio), PathBuf::from("/v"));
    assert_eq!(settings.destination_for(FormatKind::VideoMuted), PathBuf::from("/v"));
}
