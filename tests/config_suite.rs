use clap::Parser;
use crossterm::event::{KeyCode, KeyModifiers};
use neonviz::audio::{ManualClock, PlaybackClock};
use neonviz::config::Config;
use neonviz::dimensions::{AspectRatio, ResolutionTier};
use neonviz::error::VizError;
use neonviz::logging::filter_for;
use neonviz::present::{CellColors, UserCommand, command_for_key, write_half_blocks};
use neonviz::profile::VisualProfile;
use neonviz::scheduler::{FrameStepper, RealtimeScheduler, Scheduler};
use neonviz::status::{LyricStatus, Phase, Status};
use neonviz::surface::Surface;
use std::sync::Arc;

fn parse(args: &[&str]) -> Config {
    let mut argv = vec!["neonviz"];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).expect("valid args")
}

#[test]
fn defaults_are_preview_at_standard_landscape() {
    let cfg = parse(&["--audio", "music/Night Drive.mp3"]);
    assert!(!cfg.export);
    assert_eq!(cfg.resolution, ResolutionTier::Standard);
    assert_eq!(cfg.aspect, AspectRatio::Landscape);
    assert_eq!(cfg.profile, VisualProfile::Neon);
    assert_eq!(cfg.fps, 30);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.ffmpeg, std::path::PathBuf::from("ffmpeg"));
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.display_title(), "Night Drive");
}

#[test]
fn export_flags_and_aliases_parse() {
    let cfg = parse(&[
        "--audio",
        "a.wav",
        "--export",
        "--resolution",
        "4k",
        "--aspect",
        "9:16",
        "--profile",
        "matrix",
        "--title",
        "  Encore ",
        "--seed",
        "42",
    ]);
    assert!(cfg.export);
    let export = cfg.export_configuration();
    assert_eq!(export.resolution_tier, ResolutionTier::High);
    assert_eq!(export.aspect_ratio, AspectRatio::Portrait);
    assert_eq!(cfg.profile, VisualProfile::Matrix);
    assert_eq!(cfg.seed, Some(42));
    assert_eq!(cfg.display_title(), "Encore");
}

#[test]
fn invalid_settings_are_rejected() {
    assert!(Config::try_parse_from(["neonviz"]).is_err());
    assert!(Config::try_parse_from(["neonviz", "--audio", "a.wav", "--resolution", "8k"]).is_err());
    assert!(parse(&["--audio", "a.wav", "--fps", "0"]).validate().is_err());
    assert!(parse(&["--audio", "a.wav", "--title", "   "]).validate().is_err());
    assert!(parse(&["--audio", "a.wav", "--transcriber", " "]).validate().is_err());
}

#[test]
fn unknown_log_level_falls_back_without_panicking() {
    let filter = filter_for("not-a-level");
    assert!(!filter.to_string().is_empty());
}

#[test]
fn keys_map_to_commands() {
    let none = KeyModifiers::NONE;
    assert_eq!(command_for_key(KeyCode::Char('q'), none), Some(UserCommand::Quit));
    assert_eq!(command_for_key(KeyCode::Esc, none), Some(UserCommand::Quit));
    assert_eq!(
        command_for_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
        Some(UserCommand::Quit)
    );
    assert_eq!(command_for_key(KeyCode::Char('c'), none), None);
    assert_eq!(
        command_for_key(KeyCode::Char('r'), none),
        Some(UserCommand::RetryTranscription)
    );
}

#[test]
fn half_blocks_pair_rows_and_skip_repeated_colors() {
    let mut frame = Surface::new(2, 2);
    frame.clear([10, 20, 30, 255]);
    let mut out = Vec::new();
    let mut colors = CellColors::default();
    write_half_blocks(&frame, &mut out, &mut colors).expect("write");
    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(text.matches('\u{2580}').count(), 2);
    assert_eq!(text.matches("38;2;10;20;30").count(), 1);
    assert_eq!(text.matches("48;2;10;20;30").count(), 1);
    assert!(text.ends_with("\r\n"));
}

#[test]
fn status_line_reports_lyrics_state() {
    let mut status = Status::new();
    assert_eq!(status.label(), "idle | no lyrics");
    status.phase = Phase::Recording;
    status.lyrics = LyricStatus::Loaded(0);
    assert_eq!(status.label(), "recording | no lyrics");
    status.lyrics = LyricStatus::Loaded(12);
    status.notice = Some("saved out.mp4".into());
    assert_eq!(status.label(), "recording | lyrics: 12 lines | saved out.mp4");
    status.lyrics = LyricStatus::Failed("bad json".into());
    assert!(status.label().contains("no lyrics"));
}

#[test]
fn frame_stepper_advances_the_shared_clock() {
    let clock = Arc::new(ManualClock::new());
    clock.set(9.0);
    let mut stepper = FrameStepper::new(Arc::clone(&clock), 60);
    assert_eq!(clock.position_s(), 0.0);
    assert_eq!(stepper.wait_next(), None);

    stepper.request_tick();
    assert_eq!(stepper.wait_next(), Some(0.0));
    stepper.request_tick();
    assert_eq!(stepper.wait_next(), Some(1.0 / 60.0));
    assert_eq!(clock.position_s(), 1.0 / 60.0);
    assert_eq!(stepper.frames_stepped(), 2);

    let handle = stepper.request_tick();
    assert!(stepper.is_pending());
    stepper.cancel_tick(handle);
    assert!(!stepper.is_pending());
    assert_eq!(stepper.wait_next(), None);
    assert_eq!(stepper.frames_stepped(), 2);
}

#[test]
fn stale_cancel_keeps_the_newer_tick() {
    let mut scheduler = RealtimeScheduler::new(240);
    let old = scheduler.request_tick();
    let new = scheduler.request_tick();
    assert_ne!(old, new);
    scheduler.cancel_tick(old);
    assert!(scheduler.is_pending());
    let first = scheduler.wait_next().expect("tick due");
    scheduler.request_tick();
    let second = scheduler.wait_next().expect("tick due");
    assert!(second >= first);
    assert!(!scheduler.is_pending());
}

#[test]
fn errors_report_retryability() {
    assert!(VizError::AuthorizationFailure("401".into()).is_retryable());
    assert!(VizError::TranscriptionFailure("x".into()).is_retryable());
    assert!(!VizError::DecodeFailure("x".into()).is_retryable());
    assert!(!VizError::CaptureUnsupported { tried: "mp4".into() }.is_retryable());
}

#[cfg(unix)]
mod transcriber {
    use neonviz::error::VizError;
    use neonviz::transcription::{CommandTranscriber, Transcriber, spawn_transcription};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn script(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "neonviz-{}-{}.sh",
            name,
            std::process::id()
        ));
        std::fs::write(&path, body).expect("write script");
        path
    }

    fn transcriber(name: &str, body: &str) -> CommandTranscriber {
        let path = script(name, body);
        CommandTranscriber::new(&format!("sh {}", path.display())).expect("command")
    }

    #[test]
    fn stdout_json_becomes_lyrics_and_hint_is_passed() {
        let t = transcriber(
            "ok",
            "cat > /dev/null\necho \"[{\\\"time\\\": 1.5, \\\"text\\\": \\\"$NEONVIZ_HINT\\\"}]\"\n",
        );
        let lines = t.transcribe(b"RIFF....", Some("chorus")).expect("lyrics");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].time, 1.5);
        assert_eq!(lines[0].text, "chorus");
    }

    #[test]
    fn exit_code_77_is_an_authorization_failure() {
        let t = transcriber("auth", "cat > /dev/null\necho denied >&2\nexit 77\n");
        let err = t.transcribe(b"audio", None).expect_err("denied");
        assert!(matches!(err, VizError::AuthorizationFailure(ref why) if why == "denied"));
    }

    #[test]
    fn unauthorized_message_is_an_authorization_failure() {
        let t = transcriber(
            "auth-msg",
            "cat > /dev/null\necho 'HTTP 401 Unauthorized' >&2\nexit 1\n",
        );
        let err = t.transcribe(b"audio", None).expect_err("denied");
        assert!(matches!(err, VizError::AuthorizationFailure(_)));
    }

    #[test]
    fn other_failures_are_transcription_failures() {
        let crash = transcriber("crash", "cat > /dev/null\nexit 3\n");
        assert!(matches!(
            crash.transcribe(b"audio", None),
            Err(VizError::TranscriptionFailure(_))
        ));

        let garbage = transcriber("garbage", "cat > /dev/null\necho nope\n");
        assert!(matches!(
            garbage.transcribe(b"audio", None),
            Err(VizError::TranscriptionFailure(_))
        ));

        let missing = CommandTranscriber::new("neonviz-no-such-transcriber").expect("command");
        assert!(matches!(
            missing.transcribe(b"audio", None),
            Err(VizError::TranscriptionFailure(_))
        ));

        assert!(CommandTranscriber::new("   ").is_err());
    }

    #[test]
    fn background_job_delivers_one_outcome() {
        let t = transcriber(
            "bg",
            "cat > /dev/null\necho '{\"lines\": [{\"time\": 0, \"text\": \"a\"}, {\"time\": 2, \"text\": \"b\"}]}'\n",
        );
        let rx = spawn_transcription(Arc::new(t), Arc::new(vec![0u8; 64 * 1024]), None);
        let lines = rx
            .recv_timeout(Duration::from_secs(20))
            .expect("outcome")
            .expect("lyrics");
        assert_eq!(lines.len(), 2);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
