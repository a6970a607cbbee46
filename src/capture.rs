//! Recording of the composed output plus the decoded audio into a video file.

use crate::audio::DecodedAudio;
use crate::dimensions::{Dimensions, ExportConfiguration, RenderMode, ResolutionTier, resolve};
use crate::error::VizError;
use crate::surface::Surface;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Frames pulled from the output surface per second of logical time.
pub const CAPTURE_FRAME_RATE: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Mp4,
    WebmVp9,
    WebmVp8,
}

impl ContainerFormat {
    /// Tried in this order; the first one the backend supports wins.
    pub const PREFERENCE: [Self; 3] = [Self::Mp4, Self::WebmVp9, Self::WebmVp8];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebmVp9 | Self::WebmVp8 => "webm",
        }
    }

    pub fn video_encoder(self) -> &'static str {
        match self {
            Self::Mp4 => "libx264",
            Self::WebmVp9 => "libvpx-vp9",
            Self::WebmVp8 => "libvpx",
        }
    }

    pub fn audio_encoder(self) -> &'static str {
        match self {
            Self::Mp4 => "aac",
            Self::WebmVp9 => "libopus",
            Self::WebmVp8 => "libvorbis",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4/h264+aac",
            Self::WebmVp9 => "webm/vp9+opus",
            Self::WebmVp8 => "webm/vp8+vorbis",
        }
    }
}

#[derive(Debug)]
pub enum ArtifactPayload {
    Bytes(Vec<u8>),
    /// Finished file in a scratch location; the saver moves it.
    File(PathBuf),
}

#[derive(Debug)]
pub struct Artifact {
    pub format: ContainerFormat,
    pub file_name: String,
    pub payload: ArtifactPayload,
}

/// `neonviz-<tier>-<YYYYMMDD-HHMMSS>.<ext>`
pub fn artifact_file_name(
    tier: ResolutionTier,
    format: ContainerFormat,
    at: DateTime<Local>,
) -> String {
    format!(
        "neonviz-{}-{}.{}",
        tier.label(),
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// Encoder sessions for one container format.
pub trait CaptureBackend {
    fn supports(&self, format: ContainerFormat) -> bool;

    fn open(
        &mut self,
        format: ContainerFormat,
        dims: Dimensions,
        fps: u32,
        audio: Arc<DecodedAudio>,
    ) -> Result<Box<dyn RecordingSink>, VizError>;
}

pub trait RecordingSink {
    /// One tightly packed RGBA8 frame at the size the sink was opened with.
    fn push_frame(&mut self, rgba: &[u8]) -> Result<(), VizError>;

    fn finish(self: Box<Self>) -> Result<ArtifactPayload, VizError>;
}

/// The user-facing "save file" action.
pub trait ArtifactSaver {
    fn save(&mut self, artifact: Artifact) -> Result<PathBuf, VizError>;
}

#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSaver for DirectorySaver {
    fn save(&mut self, artifact: Artifact) -> Result<PathBuf, VizError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            VizError::Capture(format!("create output directory {}: {e}", self.dir.display()))
        })?;
        let dest = self.dir.join(&artifact.file_name);
        match artifact.payload {
            ArtifactPayload::Bytes(bytes) => fs::write(&dest, bytes)
                .map_err(|e| VizError::Capture(format!("write {}: {e}", dest.display())))?,
            ArtifactPayload::File(src) => move_file(&src, &dest)?,
        }
        Ok(dest)
    }
}

fn move_file(src: &Path, dest: &Path) -> Result<(), VizError> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems.
    fs::copy(src, dest)
        .map_err(|e| VizError::Capture(format!("copy {} -> {}: {e}", src.display(), dest.display())))?;
    if let Err(err) = fs::remove_file(src) {
        warn!("leftover scratch file {}: {err}", src.display());
    }
    Ok(())
}

/// Pulls output frames at a fixed rate into a recording sink and saves the result once.
pub struct CaptureController {
    sink: Option<Box<dyn RecordingSink>>,
    saver: Box<dyn ArtifactSaver>,
    format: ContainerFormat,
    export: ExportConfiguration,
    dims: Dimensions,
    frames_written: u64,
    finalized: bool,
}

impl CaptureController {
    /// Opens a sink for the first format, in preference order, that the backend
    /// supports and manages to open. Fails with `CaptureUnsupported` only after
    /// every candidate has been ruled out.
    ///
    /// `dims` must equal the export size; recording at any other size would make the
    /// artifact disagree with the configuration.
    pub fn begin(
        backend: &mut dyn CaptureBackend,
        dims: Dimensions,
        audio_tap: Arc<DecodedAudio>,
        export: ExportConfiguration,
        saver: Box<dyn ArtifactSaver>,
    ) -> Result<Self, VizError> {
        let expected = resolve(RenderMode::Capture, &export, (0, 0));
        if dims != expected {
            return Err(mismatch(expected, dims));
        }
        let mut open_failures = Vec::new();
        for format in ContainerFormat::PREFERENCE {
            if !backend.supports(format) {
                continue;
            }
            match backend.open(format, dims, CAPTURE_FRAME_RATE, Arc::clone(&audio_tap)) {
                Ok(sink) => {
                    info!(
                        format = format.label(),
                        width = dims.width,
                        height = dims.height,
                        "capture started"
                    );
                    return Ok(Self {
                        sink: Some(sink),
                        saver,
                        format,
                        export,
                        dims,
                        frames_written: 0,
                        finalized: false,
                    });
                }
                Err(err) => {
                    warn!(format = format.label(), "recorder failed to open: {err}");
                    open_failures.push(format!("{}: {err}", format.label()));
                }
            }
        }
        let mut tried = ContainerFormat::PREFERENCE
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(", ");
        if !open_failures.is_empty() {
            tried = format!("{tried} ({})", open_failures.join("; "));
        }
        Err(VizError::CaptureUnsupported { tried })
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn is_active(&self) -> bool {
        !self.finalized
    }

    /// Frames owed at logical time `time_s`.
    pub fn frames_due(time_s: f64) -> u64 {
        if !time_s.is_finite() || time_s < 0.0 {
            return 0;
        }
        (time_s * CAPTURE_FRAME_RATE as f64 + 1e-6).floor() as u64 + 1
    }

    /// Writes the current output until the frame count catches up with `time_s`,
    /// repeating the frame when ticks run slower than the capture rate.
    pub fn on_frame(&mut self, surface: &Surface, time_s: f64) -> Result<u64, VizError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(0);
        };
        let actual = Dimensions::new(surface.width() as u32, surface.height() as u32);
        if actual != self.dims {
            return Err(mismatch(self.dims, actual));
        }
        let due = Self::frames_due(time_s);
        let mut pushed = 0;
        while self.frames_written < due {
            sink.push_frame(surface.pixels())?;
            self.frames_written += 1;
            pushed += 1;
        }
        Ok(pushed)
    }

    /// Finalizes the recording and hands it to the saver. Only the first call does
    /// anything; it returns where the artifact was saved.
    ///
    /// When the encoder fails to finish there is nothing to save: the error is
    /// returned, the saver is never called, and later calls return `Ok(None)`.
    pub fn end(&mut self) -> Result<Option<PathBuf>, VizError> {
        if self.finalized {
            return Ok(None);
        }
        self.finalized = true;
        let Some(sink) = self.sink.take() else {
            return Ok(None);
        };
        let payload = match sink.finish() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    frames = self.frames_written,
                    "recording produced no artifact: {err}"
                );
                return Err(err);
            }
        };
        let artifact = Artifact {
            format: self.format,
            file_name: artifact_file_name(self.export.resolution_tier, self.format, Local::now()),
            payload,
        };
        let path = self.saver.save(artifact)?;
        info!(
            frames = self.frames_written,
            path = %path.display(),
            "capture saved"
        );
        Ok(Some(path))
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(err) = self.end() {
                warn!("finalize capture on drop: {err}");
            }
        }
    }
}

fn mismatch(expected: Dimensions, actual: Dimensions) -> VizError {
    VizError::CaptureMismatch {
        expected_w: expected.width,
        expected_h: expected.height,
        actual_w: actual.width,
        actual_h: actual.height,
    }
}

/// Encoder names from an `ffmpeg -encoders` listing.
pub fn parse_encoder_names(listing: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut in_table = false;
    for line in listing.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("------") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let mut cols = trimmed.split_whitespace();
        let (Some(_flags), Some(name)) = (cols.next(), cols.next()) else {
            continue;
        };
        names.insert(name.to_string());
    }
    names
}

/// Pipes raw RGBA frames into an `ffmpeg` child alongside a WAV copy of the track.
pub struct FfmpegBackend {
    program: PathBuf,
    encoders: HashSet<String>,
    scratch_dir: PathBuf,
}

impl FfmpegBackend {
    /// Probes the installed encoders. A missing ffmpeg yields a backend that
    /// supports nothing.
    pub fn detect(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let encoders = match Command::new(&program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
        {
            Ok(out) => parse_encoder_names(&String::from_utf8_lossy(&out.stdout)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("{} not found; capture is unavailable", program.display());
                HashSet::new()
            }
            Err(err) => {
                warn!("failed to run {}: {err}", program.display());
                HashSet::new()
            }
        };
        debug!(count = encoders.len(), "probed ffmpeg encoders");
        Self::with_encoders(encoders, std::env::temp_dir()).with_program(program)
    }

    pub fn with_encoders(encoders: HashSet<String>, scratch_dir: PathBuf) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            encoders,
            scratch_dir,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn scratch_path(&self, ext: &str) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("neonviz-{}-{n}.{ext}", std::process::id()))
    }
}

impl CaptureBackend for FfmpegBackend {
    fn supports(&self, format: ContainerFormat) -> bool {
        self.encoders.contains(format.video_encoder())
            && self.encoders.contains(format.audio_encoder())
    }

    fn open(
        &mut self,
        format: ContainerFormat,
        dims: Dimensions,
        fps: u32,
        audio: Arc<DecodedAudio>,
    ) -> Result<Box<dyn RecordingSink>, VizError> {
        let wav_path = self.scratch_path("wav");
        write_wav(&wav_path, &audio)?;
        let out_path = self.scratch_path(format.extension());

        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-video_size")
            .arg(format!("{}x{}", dims.width, dims.height))
            .arg("-framerate")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-i")
            .arg(&wav_path)
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c:v")
            .arg(format.video_encoder())
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-c:a")
            .arg(format.audio_encoder());
        match format {
            ContainerFormat::Mp4 => {
                cmd.arg("-movflags").arg("+faststart");
            }
            ContainerFormat::WebmVp9 => {
                cmd.arg("-b:v").arg("0").arg("-crf").arg("31");
            }
            ContainerFormat::WebmVp8 => {
                cmd.arg("-b:v").arg("8M");
            }
        }
        cmd.arg("-shortest")
            .arg(&out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| {
            let _ = fs::remove_file(&wav_path);
            VizError::Capture(format!(
                "spawn {} for {}: {e}",
                self.program.display(),
                out_path.display()
            ))
        })?;
        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = fs::remove_file(&wav_path);
            return Err(VizError::Capture("failed to open ffmpeg stdin".to_string()));
        };
        Ok(Box::new(FfmpegSink {
            child,
            stdin: Some(stdin),
            frame_len: dims.width as usize * dims.height as usize * 4,
            wav_path,
            out_path,
        }))
    }
}

struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
    wav_path: PathBuf,
    out_path: PathBuf,
}

impl RecordingSink for FfmpegSink {
    fn push_frame(&mut self, rgba: &[u8]) -> Result<(), VizError> {
        if rgba.len() != self.frame_len {
            return Err(VizError::Capture(format!(
                "frame is {} bytes, expected {}",
                rgba.len(),
                self.frame_len
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VizError::Capture("ffmpeg stdin already closed".to_string()))?;
        stdin
            .write_all(rgba)
            .map_err(|e| VizError::Capture(format!("write frame to ffmpeg: {e}")))
    }

    fn finish(mut self: Box<Self>) -> Result<ArtifactPayload, VizError> {
        drop(self.stdin.take());
        let status = self.child.wait();
        if let Err(err) = fs::remove_file(&self.wav_path) {
            debug!("remove scratch wav {}: {err}", self.wav_path.display());
        }
        let failure = match status {
            Ok(status) if status.success() => {
                return Ok(ArtifactPayload::File(self.out_path.clone()));
            }
            Ok(status) => VizError::Capture(format!("ffmpeg exited with status {status}")),
            Err(e) => VizError::Capture(format!("wait for ffmpeg: {e}")),
        };
        // Whatever ffmpeg wrote is unplayable.
        if let Err(err) = fs::remove_file(&self.out_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("remove partial recording {}: {err}", self.out_path.display());
            }
        }
        Err(failure)
    }
}

fn write_wav(path: &Path, audio: &DecodedAudio) -> Result<(), VizError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| VizError::Capture(format!("write {}: {e}", path.display()));
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &s in &audio.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(v).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}
