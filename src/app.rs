use crate::audio::{self, DecodedAudio, DevicePlayback, ManualClock, OfflinePlayback, Playback, SpectrumTap};
use crate::capture::{CAPTURE_FRAME_RATE, DirectorySaver, FfmpegBackend};
use crate::config::Config;
use crate::dimensions::RenderMode;
use crate::logging::{self, LogTarget};
use crate::lyrics::LyricTrack;
use crate::present::TerminalPresenter;
use crate::scheduler::{FrameStepper, RealtimeScheduler};
use crate::session::{Session, SessionConfig};
use crate::transcription::{CommandTranscriber, Transcriber, spawn_transcription};
use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(cfg: Config) -> Result<()> {
    cfg.validate()?;
    let log_file = cfg.log_file.as_deref();
    let target = if cfg.export {
        LogTarget::Stderr(log_file)
    } else {
        LogTarget::FileOnly(log_file)
    };
    logging::init(&cfg.log_level, target)?;

    let bytes = fs::read(&cfg.audio)
        .with_context(|| format!("failed reading {}", cfg.audio.display()))?;
    let bytes = Arc::new(bytes);
    let decoded = audio::decode(bytes.to_vec())
        .with_context(|| format!("cannot play {}", cfg.audio.display()))?;
    let decoded = Arc::new(decoded);
    info!(
        path = %cfg.audio.display(),
        duration_s = decoded.duration_s(),
        "audio decoded"
    );

    let local_track = match &cfg.lyrics {
        Some(path) => Some(LyricTrack::load(path)?),
        None => None,
    };
    let transcriber: Option<Arc<dyn Transcriber>> = match &cfg.transcriber {
        Some(cmd) => Some(Arc::new(CommandTranscriber::new(cmd)?)),
        None => None,
    };

    let mut session_cfg = SessionConfig {
        mode: if cfg.export {
            RenderMode::Capture
        } else {
            RenderMode::Preview
        },
        export: cfg.export_configuration(),
        profile: cfg.profile,
        title: cfg.display_title(),
        seed: None,
    };
    if let Some(seed) = cfg.seed {
        session_cfg = session_cfg.with_seed(seed);
    }

    let lyrics = LyricSource {
        track: local_track,
        transcriber,
        audio_bytes: bytes,
        hint: cfg.hint.clone(),
    };
    if cfg.export {
        run_capture(&cfg, session_cfg, decoded, lyrics)
    } else {
        run_preview(&cfg, session_cfg, decoded, lyrics)
    }
}

struct LyricSource {
    track: Option<LyricTrack>,
    transcriber: Option<Arc<dyn Transcriber>>,
    audio_bytes: Arc<Vec<u8>>,
    hint: Option<String>,
}

fn run_preview(
    cfg: &Config,
    session_cfg: SessionConfig,
    decoded: Arc<DecodedAudio>,
    lyrics: LyricSource,
) -> Result<()> {
    let presenter = TerminalPresenter::new()?;
    let playback = DevicePlayback::start(Arc::clone(&decoded)).context("start audio output")?;
    let tap = SpectrumTap::new(Arc::clone(&decoded), playback.clock());

    let mut session = Session::new(session_cfg, Box::new(RealtimeScheduler::new(cfg.fps)));
    session.attach_presenter(Box::new(presenter));
    session.attach_playback(Box::new(playback));
    session.attach_analysis(Box::new(tap));
    if let Some(track) = lyrics.track {
        session.set_track(track);
    }
    if let Some(transcriber) = lyrics.transcriber {
        let bytes = lyrics.audio_bytes;
        let hint = lyrics.hint;
        session.attach_transcriber(Box::new(move || {
            spawn_transcription(Arc::clone(&transcriber), Arc::clone(&bytes), hint.clone())
        }));
    }

    session.run();
    let summary = session.status().label();
    // Dropping the session restores the terminal before the summary is printed.
    drop(session);
    println!("{summary}");
    Ok(())
}

fn run_capture(
    cfg: &Config,
    session_cfg: SessionConfig,
    decoded: Arc<DecodedAudio>,
    lyrics: LyricSource,
) -> Result<()> {
    let clock = Arc::new(ManualClock::new());
    let scheduler = FrameStepper::new(Arc::clone(&clock), CAPTURE_FRAME_RATE);
    let mut session = Session::new(session_cfg, Box::new(scheduler));
    session.attach_playback(Box::new(OfflinePlayback::new(
        Arc::clone(&clock),
        decoded.duration_s(),
    )));
    session.attach_analysis(Box::new(SpectrumTap::new(Arc::clone(&decoded), clock)));

    if let Some(track) = lyrics.track {
        session.set_track(track);
    }
    // Headless frames outrun any transcription, so wait for it up front.
    if let Some(transcriber) = lyrics.transcriber {
        match transcriber.transcribe(&lyrics.audio_bytes, lyrics.hint.as_deref()) {
            Ok(lines) => session.set_lyrics(lines),
            Err(err) => warn!("transcription failed, exporting without lyrics: {err}"),
        }
    }

    let mut backend = FfmpegBackend::detect(&cfg.ffmpeg);
    session
        .begin_capture(
            &mut backend,
            Arc::clone(&decoded),
            Box::new(DirectorySaver::new(cfg.out_dir.clone())),
        )
        .context("start capture")?;

    session.run();
    let status = session.status().clone();
    session.dispose();
    match status.notice {
        Some(notice) => println!("{notice}"),
        None => println!("{}", status.label()),
    }
    Ok(())
}
