// tests/dependency_validator_test.rs
use vidgrabber::dependency_validator::{
    get_dependency_info, install_hint, is_ffmpeg_available, is_minimum_version, parse_version,
    MIN_FFMPEG_VERSION, MIN_YTDLP_VERSION,
};
use vidgrabber::error::AppError;

// Requires ffmpeg to be installed
#[test]
#[ignore]
fn test_ffmpeg_available() {
    assert!(is_ffmpeg_available());
}

#[test]
fn test_parse_version() {
    assert_eq!(
        parse_version("2024.08.06\n", "yt-dlp"),
        Some("2024.08.06".to_string())
    );
    assert_eq!(
        parse_version("2023.11.16.1\n", "yt-dlp"),
        Some("2023.11.16.1".to_string())
    );
    assert_eq!(
        parse_version(
            "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers",
            "ffmpeg"
        ),
        Some("6.1.1".to_string())
    );
    assert_eq!(
        parse_version("ffmpeg version n7.0 Copyright (c) 2000-2024", "ffmpeg"),
        Some("7.0".to_string())
    );
    assert_eq!(parse_version("garbage", "yt-dlp"), None);
}

#[test]
fn test_version_comparison() {
    assert!(is_minimum_version("2024.08.06", MIN_YTDLP_VERSION));
    assert!(is_minimum_version(MIN_YTDLP_VERSION, MIN_YTDLP_VERSION));
    assert!(!is_minimum_version("2021.01.01", MIN_YTDLP_VERSION));

    assert!(is_minimum_version("6.1", MIN_FFMPEG_VERSION));
    assert!(is_minimum_version("4.0", MIN_FFMPEG_VERSION));
    assert!(!is_minimum_version("3.4.8", MIN_FFMPEG_VERSION));
}

#[test]
fn test_missing_program_is_reported() {
    match get_dependency_info("vidgrabber-no-such-program") {
        Err(AppError::MissingDependency(message)) => {
            assert!(message.contains("vidgrabber-no-such-program"));
        }
        other => panic!("Expected MissingDependency, got {:?}", other),
    }
}

#[test]
fn test_install_hints() {
    assert!(install_hint("ffmpeg").contains("ffmpeg"));
    assert!(install_hint("yt-dlp").contains("yt-dlp"));
}
