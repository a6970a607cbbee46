use super::{DecodedAudio, Playback, PlaybackClock};
use crate::error::VizError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

struct DeviceClock {
    played_frames: AtomicU64,
    rate_hz: u32,
}

impl PlaybackClock for DeviceClock {
    fn position_s(&self) -> f64 {
        self.played_frames.load(Ordering::Relaxed) as f64 / self.rate_hz.max(1) as f64
    }
}

/// Plays the decoded track on the default output device.
///
/// A feeder thread resamples into a ring buffer; the device callback drains it and
/// counts frames, which is the playback clock.
pub struct DevicePlayback {
    stream: Option<cpal::Stream>,
    stop: Arc<AtomicBool>,
    drained: Arc<AtomicBool>,
    feeder: Option<thread::JoinHandle<()>>,
    clock: Arc<DeviceClock>,
    duration_s: f64,
}

impl DevicePlayback {
    pub fn start(audio: Arc<DecodedAudio>) -> Result<Self, VizError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| VizError::Playback("no default output device found".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| VizError::Playback(format!("get default output config: {e}")))?;
        let rate_hz = supported.sample_rate().0;
        let channels = (supported.channels() as usize).max(1);
        let config: cpal::StreamConfig = supported.clone().into();

        // Half a second of headroom keeps the clock close to what is audible.
        let rb = HeapRb::<f32>::new((rate_hz as usize / 2).max(1024));
        let (mut prod, cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let fed_all = Arc::new(AtomicBool::new(false));
        let drained = Arc::new(AtomicBool::new(false));
        let clock = Arc::new(DeviceClock {
            played_frames: AtomicU64::new(0),
            rate_hz,
        });

        let wiring = CallbackWiring {
            channels,
            cons,
            clock: Arc::clone(&clock),
            fed_all: Arc::clone(&fed_all),
            drained: Arc::clone(&drained),
        };
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, wiring)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, wiring)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, wiring)?,
            fmt => {
                return Err(VizError::Playback(format!(
                    "unsupported output sample format: {fmt:?}"
                )));
            }
        };

        let duration_s = audio.duration_s();
        let stop_for_thread = Arc::clone(&stop);
        let feeder = thread::spawn(move || {
            feed_loop(&audio, rate_hz, &mut prod, &stop_for_thread, &fed_all)
        });

        if let Err(err) = stream.play() {
            stop.store(true, Ordering::Relaxed);
            let _ = feeder.join();
            return Err(VizError::Playback(format!("start output stream: {err}")));
        }
        debug!(rate_hz, channels, "audio output started");

        Ok(Self {
            stream: Some(stream),
            stop,
            drained,
            feeder: Some(feeder),
            clock,
            duration_s,
        })
    }
}

impl Playback for DevicePlayback {
    fn clock(&self) -> Arc<dyn PlaybackClock> {
        self.clock.clone()
    }

    fn duration_s(&self) -> f64 {
        self.duration_s
    }

    fn is_finished(&self) -> bool {
        self.drained.load(Ordering::Relaxed) || self.clock.position_s() >= self.duration_s
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                warn!("pause output stream: {err}");
            }
        }
        if let Some(h) = self.feeder.take() {
            let _ = h.join();
        }
    }
}

impl Drop for DevicePlayback {
    fn drop(&mut self) {
        self.halt();
    }
}

struct CallbackWiring {
    channels: usize,
    cons: ringbuf::HeapCons<f32>,
    clock: Arc<DeviceClock>,
    fed_all: Arc<AtomicBool>,
    drained: Arc<AtomicBool>,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    wiring: CallbackWiring,
) -> Result<cpal::Stream, VizError>
where
    T: SizedSample + FromSample<f32>,
{
    let CallbackWiring {
        channels,
        mut cons,
        clock,
        fed_all,
        drained,
    } = wiring;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut frames = 0u64;
                for frame in data.chunks_mut(channels) {
                    let v = match cons.try_pop() {
                        Some(s) => {
                            frames += 1;
                            s
                        }
                        None => {
                            if fed_all.load(Ordering::Relaxed) {
                                drained.store(true, Ordering::Relaxed);
                            }
                            0.0
                        }
                    };
                    for out in frame.iter_mut() {
                        *out = T::from_sample(v);
                    }
                }
                clock.played_frames.fetch_add(frames, Ordering::Relaxed);
            },
            |err| warn!("audio output stream error: {err}"),
            None,
        )
        .map_err(|e| VizError::Playback(format!("build output stream: {e}")))
}

fn feed_loop(
    audio: &DecodedAudio,
    device_rate_hz: u32,
    prod: &mut ringbuf::HeapProd<f32>,
    stop: &AtomicBool,
    fed_all: &AtomicBool,
) {
    let step = audio.sample_rate_hz as f64 / device_rate_hz.max(1) as f64;
    let samples = &audio.samples;
    let mut cursor = 0.0f64;

    while !stop.load(Ordering::Relaxed) {
        while prod.vacant_len() > 0 {
            let i = cursor as usize;
            if i + 1 >= samples.len() {
                fed_all.store(true, Ordering::Relaxed);
                return;
            }
            let frac = (cursor - i as f64) as f32;
            let s = samples[i] * (1.0 - frac) + samples[i + 1] * frac;
            let _ = prod.try_push(s);
            cursor += step;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
