//! One render session: owns every layer, the surfaces, the audio handle and the
//! optional capture, and composes them tick by tick.

use crate::analyzer::{AnalysisSource, BandEnergies, FrequencyAnalyzer};
use crate::audio::{DecodedAudio, Playback, PlaybackClock};
use crate::background::BackgroundRenderer;
use crate::capture::{ArtifactSaver, CaptureBackend, CaptureController};
use crate::dimensions::{Dimensions, ExportConfiguration, RenderMode, resolve};
use crate::error::VizError;
use crate::lyrics::{LyricLine, LyricTrack};
use crate::particles::ParticleSystem;
use crate::present::{FramePresenter, UserCommand};
use crate::profile::{ProfileParams, VisualProfile};
use crate::rain::RainLayer;
use crate::scheduler::{Scheduler, TickHandle};
use crate::status::{LyricStatus, Phase, Status};
use crate::surface::Surface;
use crate::transcription::TranscriptionOutcome;
use crate::typography::TypographyRenderer;
use crate::waveform::draw_waveform;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

const SHAKE_PX: f32 = 12.0;
const ZOOM_GAIN: f32 = 0.05;
pub const SCANLINE_STRENGTH: f32 = 0.22;

/// Starts a transcription job; called again when the user retries.
pub type TranscriptionStarter = Box<dyn FnMut() -> Receiver<TranscriptionOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: RenderMode,
    pub export: ExportConfiguration,
    pub profile: VisualProfile,
    pub title: String,
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn preview(profile: VisualProfile, title: impl Into<String>) -> Self {
        Self {
            mode: RenderMode::Preview,
            export: ExportConfiguration::default(),
            profile,
            title: title.into(),
            seed: None,
        }
    }

    pub fn capture(
        export: ExportConfiguration,
        profile: VisualProfile,
        title: impl Into<String>,
    ) -> Self {
        Self {
            mode: RenderMode::Capture,
            export,
            profile,
            title: title.into(),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Screen-space treatment of the composed scene on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostEffects {
    pub offset: (f32, f32),
    pub zoom: f32,
    /// `None` when the profile has no scanlines.
    pub scanline_period: Option<usize>,
}

impl Default for PostEffects {
    fn default() -> Self {
        Self {
            offset: (0.0, 0.0),
            zoom: 1.0,
            scanline_period: None,
        }
    }
}

impl PostEffects {
    /// Shake and zoom move the scene; scanlines go on afterwards so they stay
    /// fixed to the screen.
    pub fn apply(&self, scene: &Surface, output: &mut Surface) {
        output.transform_from(scene, self.offset, self.zoom);
        if let Some(period) = self.scanline_period {
            output.scanlines(period, SCANLINE_STRENGTH);
        }
    }
}

/// Size and logical time of the composed output. Time never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderSurfaceState {
    pub width: u32,
    pub height: u32,
    pub time: f64,
}

pub struct Session {
    config: SessionConfig,
    params: ProfileParams,
    state: SessionState,
    surface_state: RenderSurfaceState,
    rng: fastrand::Rng,

    analyzer: FrequencyAnalyzer,
    background: BackgroundRenderer,
    rain: RainLayer,
    particles: ParticleSystem,
    typography: TypographyRenderer,
    track: LyricTrack,
    scene: Surface,
    output: Surface,

    scheduler: Box<dyn Scheduler>,
    pending: Option<TickHandle>,
    playback: Option<Box<dyn Playback>>,
    clock: Option<Arc<dyn PlaybackClock>>,
    presenter: Option<Box<dyn FramePresenter>>,
    capture: Option<CaptureController>,
    transcription: Option<Receiver<TranscriptionOutcome>>,
    starter: Option<TranscriptionStarter>,
    container: (u32, u32),

    status: Status,
    last_bands: BandEnergies,
    last_spawned: usize,
    last_post: PostEffects,
    ticks: u64,
}

impl Session {
    pub fn new(config: SessionConfig, scheduler: Box<dyn Scheduler>) -> Self {
        let params = config.profile.params();
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            background: BackgroundRenderer::new(params.palette, params.glitch_gain),
            rain: RainLayer::new(params.glyph_set),
            particles: ParticleSystem::from_profile(&params),
            typography: TypographyRenderer::new(),
            analyzer: FrequencyAnalyzer::new(),
            track: LyricTrack::empty(),
            scene: Surface::new(0, 0),
            output: Surface::new(0, 0),
            config,
            params,
            state: SessionState::Idle,
            surface_state: RenderSurfaceState::default(),
            rng,
            scheduler,
            pending: None,
            playback: None,
            clock: None,
            presenter: None,
            capture: None,
            transcription: None,
            starter: None,
            container: (0, 0),
            status: Status::new(),
            last_bands: BandEnergies::ZERO,
            last_spawned: 0,
            last_post: PostEffects::default(),
            ticks: 0,
        }
    }

    pub fn attach_playback(&mut self, playback: Box<dyn Playback>) {
        self.clock = Some(playback.clock());
        self.playback = Some(playback);
    }

    pub fn attach_analysis(&mut self, source: Box<dyn AnalysisSource>) {
        self.analyzer.attach(source);
    }

    pub fn attach_presenter(&mut self, presenter: Box<dyn FramePresenter>) {
        self.presenter = Some(presenter);
    }

    /// Live container size used in preview when no presenter reports one.
    pub fn set_container_size(&mut self, size: (u32, u32)) {
        self.container = size;
    }

    pub fn set_lyrics(&mut self, lines: Vec<LyricLine>) {
        let track = LyricTrack::new(lines);
        self.status.lyrics = LyricStatus::Loaded(track.len());
        info!(lines = track.len(), "lyrics adopted");
        self.track = track;
        self.typography.reset();
    }

    pub fn set_track(&mut self, track: LyricTrack) {
        self.status.lyrics = LyricStatus::Loaded(track.len());
        self.track = track;
        self.typography.reset();
    }

    /// Result of an in-flight transcription; adopted on whichever tick it arrives.
    pub fn adopt_transcription(&mut self, rx: Receiver<TranscriptionOutcome>) {
        self.status.lyrics = LyricStatus::Transcribing;
        self.transcription = Some(rx);
    }

    /// Starts transcription now and keeps `starter` for user retries.
    pub fn attach_transcriber(&mut self, mut starter: TranscriptionStarter) {
        let rx = starter();
        self.starter = Some(starter);
        self.adopt_transcription(rx);
    }

    /// Starts recording at the export size. The size is applied to every surface first.
    pub fn begin_capture(
        &mut self,
        backend: &mut dyn CaptureBackend,
        audio_tap: Arc<DecodedAudio>,
        saver: Box<dyn ArtifactSaver>,
    ) -> Result<(), VizError> {
        let dims = self.sync_dimensions();
        let controller =
            CaptureController::begin(backend, dims, audio_tap, self.config.export, saver)?;
        self.capture = Some(controller);
        if self.state == SessionState::Running {
            self.status.phase = Phase::Recording;
        }
        Ok(())
    }

    pub fn start(&mut self) {
        if self.state == SessionState::Running {
            return;
        }
        self.sync_dimensions();
        self.state = SessionState::Running;
        self.status.phase = if self.capture.is_some() {
            Phase::Recording
        } else {
            Phase::Playing
        };
        self.pending = Some(self.scheduler.request_tick());
        info!(
            profile = self.config.profile.label(),
            width = self.surface_state.width,
            height = self.surface_state.height,
            "session started"
        );
    }

    /// Drives ticks until the session leaves `Running`.
    pub fn run(&mut self) {
        self.start();
        while self.state == SessionState::Running {
            let Some(now) = self.scheduler.wait_next() else {
                break;
            };
            self.pending = None;
            self.tick(now);
        }
    }

    /// Cancels the pending tick, releases the audio, finalizes any capture and
    /// returns to `Idle`. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        self.shutdown();
        if self.state != SessionState::Idle {
            info!("session stopped");
        }
        self.state = SessionState::Idle;
        self.status.phase = Phase::Idle;
    }

    pub fn dispose(mut self) {
        self.stop();
    }

    fn finish(&mut self) {
        self.shutdown();
        self.state = SessionState::Stopped;
        self.status.phase = Phase::Finished;
        info!(ticks = self.ticks, "playback finished");
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_tick(handle);
        }
        if let Some(mut playback) = self.playback.take() {
            playback.halt();
        }
        self.clock = None;
        self.analyzer.detach();
        self.finalize_capture();
    }

    fn finalize_capture(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            return;
        };
        match capture.end() {
            Ok(Some(path)) => {
                self.status.notice = Some(format!("saved {}", path.display()));
            }
            Ok(None) => {}
            Err(err) => {
                warn!("finalize capture: {err}");
                self.status.notice = Some(format!("capture failed, nothing saved: {err}"));
            }
        }
    }

    /// Output size for the current mode, applied to scene, output and rain together.
    fn sync_dimensions(&mut self) -> Dimensions {
        if self.config.mode == RenderMode::Preview {
            if let Some(presenter) = self.presenter.as_mut() {
                self.container = presenter.container_size();
            }
        }
        let dims = resolve(self.config.mode, &self.config.export, self.container);
        let (w, h) = dims.as_usize();
        let changed = self.scene.resize(w, h);
        self.output.resize(w, h);
        if self.params.rain && self.rain.resize(dims, &mut self.rng) {
            debug!(
                width = dims.width,
                height = dims.height,
                columns = self.rain.column_count(),
                "rain grid reseeded"
            );
        }
        if changed {
            debug!(width = dims.width, height = dims.height, "surfaces resized");
        }
        self.surface_state.width = dims.width;
        self.surface_state.height = dims.height;
        dims
    }

    /// One frame. `now` is the scheduler's logical time in seconds.
    pub fn tick(&mut self, now: f64) {
        if self.state != SessionState::Running {
            return;
        }
        self.ticks += 1;

        self.poll_transcription();
        if let Some(cmd) = self.presenter.as_mut().and_then(|p| p.poll_command()) {
            match cmd {
                UserCommand::Quit => {
                    self.stop();
                    return;
                }
                UserCommand::RetryTranscription => self.retry_transcription(),
            }
        }
        if self.playback.as_ref().is_some_and(|p| p.is_finished()) {
            self.finish();
            return;
        }

        let dims = self.sync_dimensions();
        let t = self.clock.as_ref().map_or(now, |c| c.position_s());
        if t.is_finite() && t > self.surface_state.time {
            self.surface_state.time = t;
        }
        if !dims.is_empty() {
            self.compose(dims);
            self.present();
            self.pull_capture_frame();
        }

        if self.state == SessionState::Running {
            self.pending = Some(self.scheduler.request_tick());
        }
    }

    fn compose(&mut self, dims: Dimensions) {
        let time = self.surface_state.time as f32;
        let frame = self.analyzer.sample();
        let bands = frame.bands;
        self.last_bands = bands;

        self.background
            .render(time, dims.as_usize(), bands, &mut self.scene);

        if self.params.rain {
            self.rain.step(bands, &mut self.rng);
            self.rain.composite_onto(&mut self.scene);
        }

        if self.params.waveform && frame.is_ready() {
            draw_waveform(
                &mut self.scene,
                &frame.waveform,
                bands.bass,
                self.params.spawn_threshold,
                self.params.palette.accent_rgb(),
                dims,
            );
        }

        self.last_spawned = 0;
        if self.params.particles {
            self.particles.advance();
            let emoji = self
                .track
                .active_line(time)
                .and_then(LyricLine::emoji_glyph);
            self.last_spawned = self.particles.spawn(bands, emoji, dims, &mut self.rng);
            self.particles.draw(&mut self.scene);
        }

        self.typography.render(
            &mut self.scene,
            &self.track,
            time,
            bands,
            &self.config.title,
            &self.params.palette,
            &mut self.rng,
        );

        let unit = dims.unit();
        let bass = bands.bass.max(0.0);
        let offset = if bass > self.params.spawn_threshold && self.params.shake > 0.0 {
            let mag = SHAKE_PX * unit * bass * self.params.shake;
            (
                (self.rng.f32() - 0.5) * 2.0 * mag,
                (self.rng.f32() - 0.5) * 2.0 * mag,
            )
        } else {
            (0.0, 0.0)
        };
        let post = PostEffects {
            offset,
            zoom: 1.0 + ZOOM_GAIN * bass.min(1.5) * self.params.zoom,
            scanline_period: self
                .params
                .scanlines
                .then(|| ((4.0 * unit).round() as usize).max(2)),
        };
        post.apply(&self.scene, &mut self.output);
        self.last_post = post;
    }

    fn present(&mut self) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };
        let label = self.status.label();
        if let Err(err) = presenter.present(&self.output, &label) {
            warn!("presenter failed, continuing without it: {err:#}");
            self.presenter = None;
        }
    }

    fn pull_capture_frame(&mut self) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        if let Err(err) = capture.on_frame(&self.output, self.surface_state.time) {
            warn!("capture frame failed, finalizing recording: {err}");
            self.finalize_capture();
            if self.state == SessionState::Running {
                self.status.phase = Phase::Playing;
            }
        }
    }

    fn poll_transcription(&mut self) {
        let Some(rx) = self.transcription.as_ref() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(VizError::TranscriptionFailure(
                "transcription job ended without a result".to_string(),
            )),
        };
        self.transcription = None;
        match outcome {
            Ok(lines) => self.set_lyrics(lines),
            Err(VizError::AuthorizationFailure(why)) => {
                warn!("transcription not authorized: {why}");
                self.status.lyrics = LyricStatus::Unauthorized(why);
            }
            Err(err) => {
                warn!("transcription failed, continuing without lyrics: {err}");
                self.status.lyrics = LyricStatus::Failed(err.to_string());
            }
        }
    }

    fn retry_transcription(&mut self) {
        let retryable = matches!(
            self.status.lyrics,
            LyricStatus::Failed(_) | LyricStatus::Unauthorized(_)
        );
        if !retryable || self.transcription.is_some() {
            return;
        }
        if let Some(starter) = self.starter.as_mut() {
            info!("retrying transcription");
            let rx = starter();
            self.adopt_transcription(rx);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn surface_state(&self) -> RenderSurfaceState {
        self.surface_state
    }

    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    pub fn lyrics(&self) -> &LyricTrack {
        &self.track
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn rain(&self) -> &RainLayer {
        &self.rain
    }

    pub fn typography(&self) -> &TypographyRenderer {
        &self.typography
    }

    pub fn scene(&self) -> &Surface {
        &self.scene
    }

    pub fn output(&self) -> &Surface {
        &self.output
    }

    pub fn last_bands(&self) -> BandEnergies {
        self.last_bands
    }

    /// Particles spawned on the last composed tick.
    pub fn last_spawned(&self) -> usize {
        self.last_spawned
    }

    /// Post effects used for the last composed output.
    pub fn last_post(&self) -> PostEffects {
        self.last_post
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_tick_pending(&self) -> bool {
        self.pending.is_some() && self.scheduler.is_pending()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureController::is_active)
    }

    pub fn has_presenter(&self) -> bool {
        self.presenter.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
