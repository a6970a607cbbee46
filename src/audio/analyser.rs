use super::{DecodedAudio, PlaybackClock};
use crate::analyzer::{AnalysisSource, REFERENCE_WINDOW};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Spectrum and waveform of the decoded track at the current playback position.
///
/// Blackman-windowed FFT with exponential smoothing across reads, magnitudes mapped
/// from -100..-30 dB onto 0..255.
pub struct SpectrumTap {
    audio: Arc<DecodedAudio>,
    clock: Arc<dyn PlaybackClock>,
    n: usize,
    window: Vec<f32>,
    blackman: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumTap {
    pub fn new(audio: Arc<DecodedAudio>, clock: Arc<dyn PlaybackClock>) -> Self {
        Self::with_window(audio, clock, REFERENCE_WINDOW)
    }

    pub fn with_window(audio: Arc<DecodedAudio>, clock: Arc<dyn PlaybackClock>, n: usize) -> Self {
        let n = n.max(32);
        let blackman = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        Self {
            audio,
            clock,
            n,
            window: vec![0.0; n],
            blackman,
            fft,
            fft_buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; n / 2],
        }
    }

    fn load_window(&mut self) {
        let pos = self.clock.position_s().max(0.0);
        let end = (pos * self.audio.sample_rate_hz as f64).floor() as usize;
        self.audio.window_ending_at(end, &mut self.window);
    }
}

impl AnalysisSource for SpectrumTap {
    fn window_size(&self) -> usize {
        self.n
    }

    fn frequency_data(&mut self, out: &mut [u8]) {
        self.load_window();
        for i in 0..self.n {
            self.fft_buf[i].re = self.window[i] * self.blackman[i];
            self.fft_buf[i].im = 0.0;
        }
        self.fft.process(&mut self.fft_buf);

        let inv_n = 1.0 / self.n as f32;
        let span = MAX_DB - MIN_DB;
        for (k, slot) in out.iter_mut().enumerate().take(self.smoothed.len()) {
            let c = self.fft_buf[k];
            let mag = (c.re * c.re + c.im * c.im).sqrt() * inv_n;
            let s = SMOOTHING * self.smoothed[k] + (1.0 - SMOOTHING) * mag;
            self.smoothed[k] = if s.is_finite() { s } else { 0.0 };
            let db = if self.smoothed[k] > 0.0 {
                20.0 * self.smoothed[k].log10()
            } else {
                MIN_DB
            };
            *slot = (((db - MIN_DB) / span) * 255.0).clamp(0.0, 255.0) as u8;
        }
    }

    fn time_domain_data(&mut self, out: &mut [u8]) {
        self.load_window();
        for (slot, s) in out.iter_mut().zip(self.window.iter()) {
            *slot = (128.0 + s * 128.0).clamp(0.0, 255.0) as u8;
        }
    }
}
