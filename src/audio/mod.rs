mod analyser;
mod playback;

pub use analyser::SpectrumTap;
pub use playback::DevicePlayback;

use crate::error::VizError;
use rodio::Source;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Whole track decoded to mono f32 before playback starts.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn duration_s(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }

    /// Copies the `out.len()` samples ending at `end` (zero-padded before the start).
    pub fn window_ending_at(&self, end: usize, out: &mut [f32]) {
        out.fill(0.0);
        let len = out.len();
        let end = end.min(self.samples.len());
        let start = end.saturating_sub(len);
        let src = &self.samples[start..end];
        let dst_off = len.saturating_sub(src.len());
        out[dst_off..].copy_from_slice(src);
    }
}

/// Decodes any container rodio understands (wav, mp3, flac, vorbis) into mono f32.
pub fn decode(bytes: Vec<u8>) -> Result<DecodedAudio, VizError> {
    if bytes.is_empty() {
        return Err(VizError::DecodeFailure("audio file is empty".to_string()));
    }
    let decoder = rodio::Decoder::new(Cursor::new(bytes))
        .map_err(|e| VizError::DecodeFailure(e.to_string()))?;
    let channels = decoder.channels().max(1) as usize;
    let sample_rate_hz = decoder.sample_rate();
    if sample_rate_hz == 0 {
        return Err(VizError::DecodeFailure("stream reports a zero sample rate".to_string()));
    }

    let mut samples = Vec::<f32>::new();
    let mut acc = 0.0f32;
    let mut k = 0usize;
    for s in decoder {
        acc += s as f32 / 32768.0;
        k += 1;
        if k == channels {
            samples.push((acc / channels as f32).clamp(-1.0, 1.0));
            acc = 0.0;
            k = 0;
        }
    }
    if samples.is_empty() {
        return Err(VizError::DecodeFailure("stream contained no samples".to_string()));
    }

    debug!(
        sample_rate_hz,
        channels,
        frames = samples.len(),
        "decoded audio"
    );
    Ok(DecodedAudio {
        sample_rate_hz,
        samples,
    })
}

/// Playback position source shared between the audio handle and the analyser.
pub trait PlaybackClock: Send + Sync {
    fn position_s(&self) -> f64;
}

/// Clock whose position is set explicitly (headless frame stepping, tests).
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, position_s: f64) {
        self.bits.store(position_s.to_bits(), Ordering::Release);
    }
}

impl PlaybackClock for ManualClock {
    fn position_s(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// The running session's audio handle.
pub trait Playback {
    fn clock(&self) -> Arc<dyn PlaybackClock>;
    fn duration_s(&self) -> f64;
    fn is_finished(&self) -> bool;
    /// Stops output and releases the device. Safe to call more than once.
    fn halt(&mut self);
}

/// Silent playback that follows an externally driven clock.
pub struct OfflinePlayback {
    clock: Arc<ManualClock>,
    duration_s: f64,
    halted: bool,
}

impl OfflinePlayback {
    pub fn new(clock: Arc<ManualClock>, duration_s: f64) -> Self {
        Self {
            clock,
            duration_s,
            halted: false,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl Playback for OfflinePlayback {
    fn clock(&self) -> Arc<dyn PlaybackClock> {
        self.clock.clone()
    }

    fn duration_s(&self) -> f64 {
        self.duration_s
    }

    fn is_finished(&self) -> bool {
        self.halted || self.clock.position_s() >= self.duration_s
    }

    fn halt(&mut self) {
        self.halted = true;
    }
}
