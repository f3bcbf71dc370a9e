// tests/planner_test.rs
use std::path::PathBuf;
use vidgrabber::downloader::VideoMetadata;
use vidgrabber::error::AppError;
use vidgrabber::planner::{
    plan, DownloadRequest, FormatKind, MediaPlan, PostProcessStep, ReencodeSpec, Resolution,
    SubtitleRequest, TAG_ALBUM,
};

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

fn request(kind: FormatKind, resolution: Resolution, high_fps: bool) -> DownloadRequest {
    DownloadRequest::builder(URL, "/downloads")
        .kind(kind)
        .resolution(resolution)
        .high_fps(high_fps)
        .build()
}

fn metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Never Gonna Give You Up".to_string(),
        uploader: "Rick Astley".to_string(),
        ..VideoMetadata::default()
    }
}

#[test]
fn test_video_with_audio_high_fps() {
    let plan = plan(&request(FormatKind::VideoWithAudio, Resolution::P720, true)).unwrap();

    assert_eq!(
        plan.media,
        MediaPlan::VideoWithAudio {
            selector: "bestvideo[height<=720][fps>=60]+bestaudio[fps<=?60]/best[height<=720]"
                .to_string(),
            merge_container: "mp4".to_string(),
            high_fps: true,
        }
    );
    assert_eq!(
        plan.steps,
        vec![PostProcessStep::MergeInto {
            container: "mp4".to_string()
        }]
    );
    assert_eq!(plan.container, "mp4");
    assert_eq!(plan.output_template, "%(uploader)s - %(title)s.%(ext)s");
    assert_eq!(plan.destination, PathBuf::from("/downloads"));
}

#[test]
fn test_video_with_audio_plain() {
    let plan = plan(&request(FormatKind::VideoWithAudio, Resolution::P1080, false)).unwrap();
    assert_eq!(
        plan.media.selector(),
        "bestvideo[height<=1080]+bestaudio/best[height<=1080]"
    );
    assert!(!plan.media.high_fps());
}

#[test]
fn test_audio_only_plan() {
    let plan = plan(&request(FormatKind::AudioOnly, Resolution::P1080, true)).unwrap();

    assert_eq!(
        plan.media,
        MediaPlan::AudioOnly {
            selector: "bestaudio/best".to_string(),
            codec: "mp3".to_string(),
            quality: "192".to_string(),
        }
    );
    assert_eq!(
        plan.steps,
        vec![
            PostProcessStep::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "192".to_string()
            },
            PostProcessStep::WriteTags {
                album: TAG_ALBUM.to_string()
            },
        ]
    );
    assert_eq!(plan.container, "mp3");
    assert_eq!(plan.kind(), FormatKind::AudioOnly);
}

#[test]
fn test_muted_plan() {
    let plan = plan(&request(FormatKind::VideoMuted, Resolution::P1440, true)).unwrap();

    assert_eq!(plan.media.selector(), "bestvideo[height<=1440][fps>=60]");
    assert!(plan.media.high_fps());
    assert_eq!(
        plan.steps,
        vec![PostProcessStep::Remux {
            container: "mp4".to_string(),
            drop_audio: true
        }]
    );
    assert_eq!(plan.output_template, "%(uploader)s - %(title)s (muted).%(ext)s");
}

#[test]
fn test_high_fps_never_below_720_or_for_audio() {
    for resolution in Resolution::ALL {
        for kind in [
            FormatKind::AudioOnly,
            FormatKind::VideoWithAudio,
            FormatKind::VideoMuted,
        ] {
            let plan = plan(&request(kind, resolution, true)).unwrap();
            let expected = resolution.height() >= 720 && kind != FormatKind::AudioOnly;
            assert_eq!(plan.media.high_fps(), expected, "{} {}", kind, resolution);
            assert_eq!(
                plan.media.selector().contains("fps>=60"),
                expected,
                "{} {}",
                kind,
                resolution
            );
        }
    }
}

#[test]
fn test_plan_is_deterministic() {
    let request = DownloadRequest::builder(URL, "/downloads")
        .resolution(Resolution::P2160)
        .high_fps(true)
        .subtitles(Some(SubtitleRequest::parse("de,en,auto")))
        .reencode(true)
        .build();

    assert_eq!(plan(&request).unwrap(), plan(&request).unwrap());
    assert_eq!(plan(&request.clone()).unwrap(), plan(&request).unwrap());
}

#[test]
fn test_subtitles_follow_media_step() {
    let request = DownloadRequest::builder(URL, "/downloads")
        .subtitles(Some(SubtitleRequest::parse("de, en ,auto,de")))
        .reencode(true)
        .build();
    let plan = plan(&request).unwrap();

    assert!(matches!(plan.steps[0], PostProcessStep::MergeInto { .. }));
    let subtitles = plan.subtitles().unwrap();
    assert_eq!(subtitles.languages, vec!["de".to_string(), "en".to_string()]);
    assert!(subtitles.auto_generated);
    assert_eq!(subtitles.format, "srt");
    assert_eq!(
        plan.steps.last(),
        Some(&PostProcessStep::Reencode(ReencodeSpec::default()))
    );

    let engine: Vec<&PostProcessStep> = plan.engine_steps().collect();
    let after: Vec<&PostProcessStep> = plan.post_completion_steps().collect();
    assert_eq!(engine.len(), 2);
    assert_eq!(after, vec![&PostProcessStep::Reencode(ReencodeSpec::default())]);
}

#[test]
fn test_subtitle_defaults() {
    for list in ["", "auto", "AUTO"] {
        let request = DownloadRequest::builder(URL, "/downloads")
            .subtitles(Some(SubtitleRequest::parse(list)))
            .build();
        let plan = plan(&request).unwrap();
        let subtitles = plan.subtitles().unwrap();
        assert_eq!(subtitles.languages, vec!["en".to_string()]);
        assert_eq!(subtitles.auto_generated, !list.is_empty());
    }

    // Not requested, not planned
    let plan = plan(&request(FormatKind::VideoWithAudio, Resolution::P720, false)).unwrap();
    assert!(plan.subtitles().is_none());
}

#[test]
fn test_reencode_only_for_video_with_audio() {
    for kind in [FormatKind::AudioOnly, FormatKind::VideoMuted] {
        let request = DownloadRequest::builder(URL, "/downloads")
            .kind(kind)
            .reencode(true)
            .build();
        let plan = plan(&request).unwrap();
        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, PostProcessStep::Reencode(_))));
    }
}

#[test]
fn test_muted_and_audio_names_never_collide() {
    let metadata = metadata();
    let with_audio = plan(&request(FormatKind::VideoWithAudio, Resolution::P720, false)).unwrap();
    let muted = plan(&request(FormatKind::VideoMuted, Resolution::P720, false)).unwrap();
    let audio = plan(&request(FormatKind::AudioOnly, Resolution::P720, false)).unwrap();

    let names = [
        with_audio.file_name_for(&metadata),
        muted.file_name_for(&metadata),
        audio.file_name_for(&metadata),
    ];
    assert_eq!(names[0], "Rick Astley - Never Gonna Give You Up.mp4");
    assert_eq!(names[1], "Rick Astley - Never Gonna Give You Up (muted).mp4");
    assert_eq!(names[2], "Rick Astley - Never Gonna Give You Up.mp3");
    assert_ne!(names[0], names[1]);
    assert_ne!(
        with_audio.output_path_template(),
        muted.output_path_template()
    );
    assert_eq!(
        muted.artifact_path_for(&metadata),
        PathBuf::from("/downloads").join(&names[1])
    );
}

#[test]
fn test_invalid_requests() {
    let bad_url = DownloadRequest::builder("ftp://example.com/v", "/downloads").build();
    assert!(matches!(plan(&bad_url), Err(AppError::InvalidRequest(_))));

    let empty_url = DownloadRequest::builder("", "/downloads").build();
    assert!(matches!(plan(&empty_url), Err(AppError::InvalidRequest(_))));

    let no_destination = DownloadRequest::builder(URL, "").build();
    assert!(matches!(
        plan(&no_destination),
        Err(AppError::InvalidRequest(_))
    ));
}

#[test]
fn test_parse_request_strings() {
    assert_eq!("720".parse::<Resolution>().unwrap(), Resolution::P720);
    assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::P1080);
    assert!(matches!(
        "900".parse::<Resolution>(),
        Err(AppError::InvalidRequest(_))
    ));
    assert!("abc".parse::<Resolution>().is_err());
    assert_eq!(Resolution::P2160.to_string(), "2160p");

    assert_eq!("mp3".parse::<FormatKind>().unwrap(), FormatKind::AudioOnly);
    assert_eq!("MP4".parse::<FormatKind>().unwrap(), FormatKind::VideoWithAudio);
    assert_eq!(
        "muted_mp4".parse::<FormatKind>().unwrap(),
        FormatKind::VideoMuted
    );
    assert!(matches!(
        "flac".parse::<FormatKind>(),
        Err(AppError::InvalidRequest(_))
    ));
}
