use neonviz::analyzer::AnalysisSource;
use neonviz::audio::{ManualClock, OfflinePlayback};
use neonviz::dimensions::{
    AspectRatio, Dimensions, ExportConfiguration, RenderMode, ResolutionTier, resolve,
};
use neonviz::error::VizError;
use neonviz::lyrics::LyricLine;
use neonviz::present::{FramePresenter, UserCommand};
use neonviz::profile::VisualProfile;
use neonviz::scheduler::{FrameStepper, Scheduler, TickHandle};
use neonviz::session::{SCANLINE_STRENGTH, Session, SessionConfig, SessionState};
use neonviz::status::{LyricStatus, Phase};
use neonviz::surface::Surface;
use neonviz::transcription::TranscriptionOutcome;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc;

#[derive(Default)]
struct SchedulerLog {
    issued: u64,
    cancelled: u64,
    pending: Option<TickHandle>,
}

struct FakeScheduler {
    log: Rc<RefCell<SchedulerLog>>,
    times: VecDeque<f64>,
}

impl FakeScheduler {
    fn new(log: Rc<RefCell<SchedulerLog>>) -> Self {
        Self {
            log,
            times: VecDeque::new(),
        }
    }
}

impl Scheduler for FakeScheduler {
    fn request_tick(&mut self) -> TickHandle {
        let mut log = self.log.borrow_mut();
        log.issued += 1;
        let handle = TickHandle(log.issued);
        log.pending = Some(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        let mut log = self.log.borrow_mut();
        if log.pending == Some(handle) {
            log.pending = None;
            log.cancelled += 1;
        }
    }

    fn wait_next(&mut self) -> Option<f64> {
        self.log.borrow_mut().pending.take()?;
        self.times.pop_front()
    }

    fn is_pending(&self) -> bool {
        self.log.borrow().pending.is_some()
    }
}

struct FakePresenter {
    size: Rc<Cell<(u32, u32)>>,
    commands: VecDeque<Option<UserCommand>>,
    labels: Rc<RefCell<Vec<String>>>,
    fail: bool,
}

impl FakePresenter {
    fn new(size: (u32, u32)) -> (Self, Rc<Cell<(u32, u32)>>, Rc<RefCell<Vec<String>>>) {
        let size = Rc::new(Cell::new(size));
        let labels = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                size: Rc::clone(&size),
                commands: VecDeque::new(),
                labels: Rc::clone(&labels),
                fail: false,
            },
            size,
            labels,
        )
    }
}

impl FramePresenter for FakePresenter {
    fn container_size(&mut self) -> (u32, u32) {
        self.size.get()
    }

    fn present(&mut self, _frame: &Surface, status: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("terminal went away");
        }
        self.labels.borrow_mut().push(status.to_string());
        Ok(())
    }

    fn poll_command(&mut self) -> Option<UserCommand> {
        self.commands.pop_front().flatten()
    }
}

struct BassOnly;

impl AnalysisSource for BassOnly {
    fn window_size(&self) -> usize {
        2048
    }

    fn frequency_data(&mut self, out: &mut [u8]) {
        out.fill(0);
        out[..10].fill(255);
    }

    fn time_domain_data(&mut self, out: &mut [u8]) {
        for (i, v) in out.iter_mut().enumerate() {
            *v = if i % 2 == 0 { 200 } else { 56 };
        }
    }
}

fn preview_session(profile: VisualProfile) -> (Session, Rc<RefCell<SchedulerLog>>) {
    let log = Rc::new(RefCell::new(SchedulerLog::default()));
    let cfg = SessionConfig::preview(profile, "NEONVIZ").with_seed(11);
    let session = Session::new(cfg, Box::new(FakeScheduler::new(Rc::clone(&log))));
    (session, log)
}

#[test]
fn resolver_matches_export_tiers() {
    let cases = [
        (ResolutionTier::Standard, AspectRatio::Landscape, (1920, 1080)),
        (ResolutionTier::Standard, AspectRatio::Portrait, (1080, 1920)),
        (ResolutionTier::High, AspectRatio::Landscape, (3840, 2160)),
        (ResolutionTier::High, AspectRatio::Portrait, (2160, 3840)),
    ];
    for (tier, aspect, (w, h)) in cases {
        let export = ExportConfiguration {
            resolution_tier: tier,
            aspect_ratio: aspect,
        };
        assert_eq!(
            resolve(RenderMode::Capture, &export, (640, 480)),
            Dimensions::new(w, h)
        );
        assert_eq!(
            resolve(RenderMode::Preview, &export, (640, 480)),
            Dimensions::new(640, 480)
        );
    }
}

#[test]
fn empty_lyrics_keep_no_lyrics_status_every_tick() {
    let (mut session, _log) = preview_session(VisualProfile::Neon);
    let (presenter, _size, labels) = FakePresenter::new((160, 90));
    session.attach_presenter(Box::new(presenter));
    session.start();
    for i in 0..6 {
        session.tick(i as f64 / 30.0);
        assert!(session.status().lyrics.is_without_lyrics());
        assert_eq!(session.typography().cursor(), None);
    }
    let labels = labels.borrow();
    assert_eq!(labels.len(), 6);
    assert!(labels.iter().all(|l| l.contains("no lyrics")));
}

#[test]
fn bass_hit_spawns_floor_of_bass_times_multiplier() {
    let (mut session, _log) = preview_session(VisualProfile::Neon);
    session.set_container_size((120, 68));
    session.attach_analysis(Box::new(BassOnly));
    session.start();
    session.tick(0.0);

    let k = VisualProfile::Neon.params().spawn_multiplier;
    assert_eq!(session.last_bands().bass, 1.0);
    assert_eq!(session.last_spawned(), k.floor() as usize);
    assert_eq!(session.particles().len(), k.floor() as usize);
}

#[test]
fn scanlines_stay_on_screen_while_the_scene_shakes() {
    let (mut session, _log) = preview_session(VisualProfile::Glitch);
    session.set_container_size((120, 68));
    session.attach_analysis(Box::new(BassOnly));
    session.start();

    let mut offsets = Vec::new();
    for i in 0..6 {
        session.tick(i as f64 / 30.0);
        let post = session.last_post();
        let period = post.scanline_period.expect("glitch draws scanlines");
        assert!(post.zoom > 1.0);

        let mut moved = Surface::new(0, 0);
        moved.transform_from(session.scene(), post.offset, post.zoom);
        let mut expected = moved.clone();
        expected.scanlines(period, SCANLINE_STRENGTH);
        let out = session.output();
        assert_eq!(out.pixels(), expected.pixels(), "tick {i}");

        let mut darkened = 0;
        for y in 0..out.height() {
            let dark_row = y % period < (period / 2).max(1);
            for x in 0..out.width() {
                let o = out.get(x, y).expect("in bounds");
                let m = moved.get(x, y).expect("in bounds");
                if dark_row {
                    assert!(o[..3].iter().zip(&m[..3]).all(|(a, b)| a <= b));
                    if o != m {
                        darkened += 1;
                    }
                } else {
                    assert_eq!(o, m, "row {y} is not a scanline");
                }
            }
        }
        assert!(darkened > 0, "tick {i}");
        offsets.push(post.offset);
    }
    assert!(offsets.iter().all(|o| *o != (0.0, 0.0)));
    assert!(offsets.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn minimal_profile_outputs_the_scene_untouched() {
    let (mut session, _log) = preview_session(VisualProfile::Minimal);
    session.set_container_size((120, 68));
    session.attach_analysis(Box::new(BassOnly));
    session.start();
    session.tick(0.0);

    let post = session.last_post();
    assert_eq!(post.offset, (0.0, 0.0));
    assert_eq!(post.zoom, 1.0);
    assert_eq!(post.scanline_period, None);
    assert_eq!(session.output().pixels(), session.scene().pixels());
}

#[test]
fn transcription_result_is_adopted_mid_playback() {
    let (mut session, _log) = preview_session(VisualProfile::Matrix);
    session.set_container_size((96, 54));
    let (tx, rx) = mpsc::channel::<TranscriptionOutcome>();
    session.adopt_transcription(rx);
    session.start();

    session.tick(0.0);
    assert_eq!(session.status().lyrics, LyricStatus::Transcribing);
    assert!(session.status().label().contains("no lyrics"));

    tx.send(Ok(vec![
        LyricLine::new(0.0, "hello"),
        LyricLine::new(3.0, "world"),
    ]))
    .expect("send");
    session.tick(0.1);
    assert_eq!(session.status().lyrics, LyricStatus::Loaded(2));
    assert_eq!(session.lyrics().len(), 2);
    assert_eq!(session.typography().cursor(), Some(0));
}

#[test]
fn failed_transcription_falls_back_to_empty_lyrics() {
    let (mut session, _log) = preview_session(VisualProfile::Neon);
    session.set_container_size((64, 36));
    let (tx, rx) = mpsc::channel::<TranscriptionOutcome>();
    session.adopt_transcription(rx);
    session.start();
    tx.send(Err(VizError::TranscriptionFailure("garbled".into())))
        .expect("send");
    session.tick(0.0);
    assert!(matches!(session.status().lyrics, LyricStatus::Failed(_)));
    assert!(session.lyrics().is_empty());
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn authorization_failure_can_be_retried() {
    let (mut session, _log) = preview_session(VisualProfile::Neon);
    let (mut presenter, _size, _labels) = FakePresenter::new((64, 36));
    presenter.commands = VecDeque::from([None, Some(UserCommand::RetryTranscription), None]);
    session.attach_presenter(Box::new(presenter));

    let calls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&calls);
    session.attach_transcriber(Box::new(move || {
        counter.set(counter.get() + 1);
        let (tx, rx) = mpsc::channel();
        let outcome = if counter.get() == 1 {
            Err(VizError::AuthorizationFailure("401 unauthorized".into()))
        } else {
            Ok(vec![LyricLine::new(0.0, "granted")])
        };
        tx.send(outcome).expect("send");
        rx
    }));
    session.start();

    session.tick(0.0);
    assert!(matches!(session.status().lyrics, LyricStatus::Unauthorized(_)));
    assert!(session.status().label().contains("not authorized"));

    session.tick(0.1);
    assert_eq!(calls.get(), 2);
    assert_eq!(session.status().lyrics, LyricStatus::Transcribing);

    session.tick(0.2);
    assert_eq!(session.status().lyrics, LyricStatus::Loaded(1));
}

#[test]
fn resize_applies_to_every_surface_and_reseeds_rain_once() {
    let (mut session, _log) = preview_session(VisualProfile::Neon);
    let (presenter, size, _labels) = FakePresenter::new((160, 90));
    session.attach_presenter(Box::new(presenter));
    session.start();
    assert_eq!(session.rain().reseed_count(), 1);
    let columns = session.rain().column_count();

    for i in 0..4 {
        session.tick(i as f64 / 30.0);
        assert_eq!(session.rain().column_count(), columns);
    }
    assert_eq!(session.rain().reseed_count(), 1);

    size.set((200, 90));
    for i in 4..8 {
        session.tick(i as f64 / 30.0);
    }
    assert_eq!(session.rain().reseed_count(), 2);
    let state = session.surface_state();
    assert_eq!((state.width, state.height), (200, 90));
    assert_eq!((session.scene().width(), session.scene().height()), (200, 90));
    assert_eq!((session.output().width(), session.output().height()), (200, 90));
    let cell = session.rain().cell_size();
    assert_eq!(session.rain().column_count(), 200usize.div_ceil(cell));
}

#[test]
fn presenter_failure_detaches_without_stopping() {
    let (mut session, log) = preview_session(VisualProfile::Glitch);
    let (mut presenter, _size, _labels) = FakePresenter::new((64, 36));
    presenter.fail = true;
    session.attach_presenter(Box::new(presenter));
    session.start();
    session.tick(0.0);
    assert!(!session.has_presenter());
    assert_eq!(session.state(), SessionState::Running);
    assert!(log.borrow().pending.is_some());
}

#[test]
fn logical_time_never_decreases() {
    let (mut session, _log) = preview_session(VisualProfile::Minimal);
    session.set_container_size((32, 18));
    session.start();
    session.tick(0.5);
    session.tick(0.4);
    assert_eq!(session.surface_state().time, 0.5);
    session.tick(0.75);
    assert_eq!(session.surface_state().time, 0.75);
}

#[test]
fn stop_is_idempotent_and_cancels_the_pending_tick() {
    let (mut session, log) = preview_session(VisualProfile::Neon);
    session.set_container_size((48, 27));

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);

    session.start();
    session.tick(0.0);
    assert!(session.is_tick_pending());
    let issued = log.borrow().issued;

    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status().phase, Phase::Idle);
    assert!(!session.is_tick_pending());
    assert_eq!(log.borrow().cancelled, 1);

    session.tick(1.0);
    assert_eq!(log.borrow().issued, issued);
    assert_eq!(session.ticks(), 1);
}

#[test]
fn quit_command_stops_inside_the_tick() {
    let (mut session, log) = preview_session(VisualProfile::Neon);
    let (mut presenter, _size, labels) = FakePresenter::new((48, 27));
    presenter.commands = VecDeque::from([None, Some(UserCommand::Quit)]);
    session.attach_presenter(Box::new(presenter));
    session.start();
    session.tick(0.0);
    let issued = log.borrow().issued;
    session.tick(0.1);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(log.borrow().issued, issued);
    assert!(log.borrow().pending.is_none());
    assert_eq!(labels.borrow().len(), 1);
}

#[test]
fn playback_end_moves_to_stopped() {
    let clock = Arc::new(ManualClock::new());
    let stepper = FrameStepper::new(Arc::clone(&clock), 60);
    let cfg = SessionConfig::preview(VisualProfile::Neon, "END").with_seed(5);
    let mut session = Session::new(cfg, Box::new(stepper));
    session.set_container_size((40, 24));
    session.attach_playback(Box::new(OfflinePlayback::new(Arc::clone(&clock), 0.1)));
    session.run();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.status().phase, Phase::Finished);
    assert!(!session.is_tick_pending());
    // Frames at 0..=5/60 render; the tick at 6/60 sees the end.
    assert_eq!(session.ticks(), 7);
    assert!((session.surface_state().time - 5.0 / 60.0).abs() < 1e-9);
}

#[test]
fn sessions_do_not_share_layer_state() {
    let (mut a, _la) = preview_session(VisualProfile::Neon);
    let (mut b, _lb) = preview_session(VisualProfile::Neon);
    a.set_container_size((120, 68));
    b.set_container_size((120, 68));
    a.attach_analysis(Box::new(BassOnly));
    a.start();
    b.start();
    a.tick(0.0);
    b.tick(0.0);
    assert!(a.particles().len() > 0);
    assert_eq!(b.particles().len(), 0);
}
