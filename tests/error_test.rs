// tests/error_test.rs
use std::io;
use vidgrabber::error::AppError;

#[test]
fn test_app_error_display() {
    let error = AppError::MissingDependency("ffmpeg".to_string());
    assert_eq!(error.to_string(), "Missing dependency: ffmpeg");

    let error = AppError::InvalidRequest("URL must not be empty".to_string());
    assert_eq!(error.to_string(), "Invalid request: URL must not be empty");

    let error = AppError::MetadataFetch("Video unavailable".to_string());
    assert_eq!(
        error.to_string(),
        "Could not fetch video information: Video unavailable"
    );

    let error = AppError::Transfer("HTTP Error 403: Forbidden".to_string());
    assert_eq!(error.to_string(), "Download failed: HTTP Error 403: Forbidden");

    let error = AppError::AlreadyRunning("download".to_string());
    assert_eq!(error.to_string(), "A download task is already running");

    let error = AppError::Cancelled;
    assert_eq!(error.to_string(), "Task cancelled");

    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let error = AppError::IoError(io_error);
    assert_eq!(error.to_string(), "I/O error: File not found");
}

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
    let app_error: AppError = io_error.into();
    match app_error {
        AppError::IoError(_) => (),
        _ => panic!("Expected IoError variant"),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let app_error: AppError = json_error.into();
    assert!(matches!(app_error, AppError::JsonError(_)));

    let app_error: AppError = "Something went wrong".into();
    match app_error {
        AppError::General(msg) => assert_eq!(msg, "Something went wrong"),
        _ => panic!("Expected General variant"),
    }

    let app_error: AppError = String::from("Another error").into();
    assert!(matches!(app_error, AppError::General(ref m) if m == "Another error"));
}

#[test]
fn test_admission_errors() {
    assert!(AppError::InvalidRequest("x".into()).is_admission_error());
    assert!(AppError::Directory("x".into()).is_admission_error());
    assert!(AppError::AlreadyRunning("download".into()).is_admission_error());

    assert!(!AppError::MetadataFetch("x".into()).is_admission_error());
    assert!(!AppError::Transfer("x".into()).is_admission_error());
    assert!(!AppError::PostProcess("x".into()).is_admission_error());
    assert!(!AppError::Cancelled.is_admission_error());
}
