// tests/utils_test.rs
use std::fs;
use tempfile::tempdir;
use vidgrabber::error::AppError;
use vidgrabber::utils::{
    ensure_download_dir, format_optional_size, format_size, format_speed, format_time,
    sanitize_file_component, validate_url,
};

#[test]
fn test_format_size_buckets() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
    assert_eq!(format_size(1024), "1.0 KB");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(1_048_575), "1024.0 KB");
    assert_eq!(format_size(1_048_576), "1.0 MB");
    assert_eq!(format_size(50_000_000), "47.7 MB");
    assert_eq!(format_size(1_073_741_824), "1.00 GB");
    assert_eq!(format_size(5_368_709_120), "5.00 GB");
}

#[test]
fn test_format_size_unit_is_monotonic() {
    fn unit_rank(s: &str) -> usize {
        ["B", "KB", "MB", "GB"]
            .iter()
            .position(|u| s.ends_with(&format!(" {}", u)))
            .unwrap()
    }

    let mut previous = 0;
    for shift in 0..40u32 {
        for bytes in [(1u64 << shift) - 1, 1u64 << shift] {
            let rank = unit_rank(&format_size(bytes));
            assert!(rank >= previous, "unit went down at {} bytes", bytes);
            previous = rank;
        }
    }
}

#[test]
fn test_format_optional_size_and_speed() {
    assert_eq!(format_optional_size(None), "N/A");
    assert_eq!(format_optional_size(Some(2048)), "2.0 KB");

    assert_eq!(format_speed(None), "N/A");
    assert_eq!(format_speed(Some(f64::NAN)), "N/A");
    assert_eq!(format_speed(Some(-5.0)), "N/A");
    assert_eq!(format_speed(Some(1_048_576.0)), "1.0 MB/s");
    assert_eq!(format_speed(Some(512.0)), "512 B/s");
}

#[test]
fn test_format_time() {
    assert_eq!(format_time(None), "N/A");
    assert_eq!(format_time(Some(0)), "00:00:00");
    assert_eq!(format_time(Some(59)), "00:00:59");
    assert_eq!(format_time(Some(3661)), "01:01:01");
    assert_eq!(format_time(Some(86_399)), "23:59:59");
    assert_eq!(format_time(Some(360_000)), "100:00:00");
}

#[test]
fn test_validate_url_valid_formats() {
    assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
    assert!(validate_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
    assert!(validate_url("http://vimeo.com/123456789").is_ok());
    assert!(validate_url("https://example.com:8443/video#t=10").is_ok());
    assert!(validate_url("  https://example.com/v  ").is_ok());
}

#[test]
fn test_validate_url_invalid_formats() {
    for url in [
        "",
        "   ",
        "not-a-url",
        "file:///etc/passwd",
        "ftp://example.com/video.mp4",
        "https://",
        "https://exa mple.com/video",
    ] {
        match validate_url(url) {
            Err(AppError::InvalidRequest(_)) => (),
            other => panic!("{:?} should be rejected, got {:?}", url, other),
        }
    }

    let very_long_url = format!("https://example.com/{}", "a".repeat(5000));
    assert!(validate_url(&very_long_url).is_err());
}

#[test]
fn test_ensure_download_dir_creates_missing() {
    let temp = tempdir().unwrap();
    let nested = temp.path().join("Downloads").join("Vids");

    let result = ensure_download_dir(&nested).unwrap();
    assert_eq!(result, nested);
    assert!(nested.is_dir());

    // Second call on an existing directory is fine
    assert!(ensure_download_dir(&nested).is_ok());
}

#[test]
fn test_ensure_download_dir_rejects_file() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("not_a_dir");
    fs::write(&file, b"x").unwrap();

    assert!(matches!(
        ensure_download_dir(&file),
        Err(AppError::Directory(_))
    ));
    assert!(matches!(
        ensure_download_dir(std::path::Path::new("")),
        Err(AppError::Directory(_))
    ));
}

#[test]
fn test_sanitize_file_component() {
    assert_eq!(sanitize_file_component("AC/DC: Live?"), "AC_DC_ Live_");
    assert_eq!(sanitize_file_component("  ..hidden.. "), "hidden");
    assert_eq!(sanitize_file_component("a\tb"), "a_b");
    assert_eq!(sanitize_file_component("..."), "untitled");
    assert_eq!(sanitize_file_component("Plain Title"), "Plain Title");
}
