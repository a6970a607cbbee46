//! Next-tick registration for the render loop.
//!
//! The session asks for a tick, the driver waits for it, and `stop` cancels the
//! outstanding request so no further tick runs.

use crate::audio::ManualClock;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Frame rate of the headless capture path.
pub const CAPTURE_FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(pub u64);

pub trait Scheduler {
    /// Registers the next tick. Replaces any tick still pending.
    fn request_tick(&mut self) -> TickHandle;

    /// Drops the pending tick if `handle` is still the current one.
    fn cancel_tick(&mut self, handle: TickHandle);

    /// Blocks until the pending tick is due and returns its logical time in seconds.
    /// `None` when nothing is pending.
    fn wait_next(&mut self) -> Option<f64>;

    fn is_pending(&self) -> bool;
}

/// Wall-clock pacing at a fixed frame rate.
pub struct RealtimeScheduler {
    frame: Duration,
    started: Instant,
    next_due: Instant,
    pending: Option<TickHandle>,
    issued: u64,
}

impl RealtimeScheduler {
    pub fn new(fps: u32) -> Self {
        let now = Instant::now();
        Self {
            frame: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            started: now,
            next_due: now,
            pending: None,
            issued: 0,
        }
    }
}

impl Scheduler for RealtimeScheduler {
    fn request_tick(&mut self) -> TickHandle {
        self.issued += 1;
        let handle = TickHandle(self.issued);
        self.pending = Some(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn wait_next(&mut self) -> Option<f64> {
        self.pending.take()?;
        let now = Instant::now();
        if self.next_due > now {
            thread::sleep(self.next_due - now);
        }
        let fired = Instant::now();
        // Skip missed frames instead of bursting to catch up.
        self.next_due += self.frame;
        if self.next_due < fired {
            self.next_due = fired + self.frame;
        }
        Some(fired.duration_since(self.started).as_secs_f64())
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Headless stepping: every tick advances logical time by exactly one frame and
/// moves the shared clock along with it.
pub struct FrameStepper {
    clock: Arc<ManualClock>,
    fps: u32,
    frame: u64,
    pending: Option<TickHandle>,
    issued: u64,
}

impl FrameStepper {
    pub fn new(clock: Arc<ManualClock>, fps: u32) -> Self {
        clock.set(0.0);
        Self {
            clock,
            fps: fps.max(1),
            frame: 0,
            pending: None,
            issued: 0,
        }
    }

    pub fn frames_stepped(&self) -> u64 {
        self.frame
    }
}

impl Scheduler for FrameStepper {
    fn request_tick(&mut self) -> TickHandle {
        self.issued += 1;
        let handle = TickHandle(self.issued);
        self.pending = Some(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn wait_next(&mut self) -> Option<f64> {
        self.pending.take()?;
        let t = self.frame as f64 / self.fps as f64;
        self.clock.set(t);
        self.frame += 1;
        Some(t)
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
