/// Analysis window the band cutoffs were tuned for.
pub const REFERENCE_WINDOW: usize = 2048;
const REFERENCE_BINS: usize = REFERENCE_WINDOW / 2;
const REFERENCE_BASS_END: usize = 10;
const REFERENCE_MID_END: usize = 100;

/// Live frequency/time-domain data, one read per tick.
///
/// Frequency data is one byte per bin (0 = floor, 255 = ceiling); time-domain data
/// is one byte per sample centered on 128.
pub trait AnalysisSource {
    fn window_size(&self) -> usize;

    fn bin_count(&self) -> usize {
        self.window_size() / 2
    }

    fn frequency_data(&mut self, out: &mut [u8]);
    fn time_domain_data(&mut self, out: &mut [u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandEnergies {
    pub const ZERO: Self = Self {
        bass: 0.0,
        mid: 0.0,
        high: 0.0,
    };

    pub fn new(bass: f32, mid: f32, high: f32) -> Self {
        Self { bass, mid, high }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisFrame {
    pub bands: BandEnergies,
    /// Time-domain samples in -1..1; empty until a source is attached.
    pub waveform: Vec<f32>,
}

impl AnalysisFrame {
    pub fn is_ready(&self) -> bool {
        !self.waveform.is_empty()
    }
}

/// Bin ranges: `[0, bass_end)`, `[bass_end, mid_end)`, `[mid_end, bins)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandCutoffs {
    pub bass_end: usize,
    pub mid_end: usize,
    pub bins: usize,
}

impl BandCutoffs {
    /// 10 / 100 bins at 1024 bins, rescaled proportionally for other sizes.
    pub fn for_bin_count(bins: usize) -> Self {
        if bins == REFERENCE_BINS {
            return Self {
                bass_end: REFERENCE_BASS_END,
                mid_end: REFERENCE_MID_END,
                bins,
            };
        }
        let scale = |edge: usize| {
            ((edge as f64 * bins as f64) / REFERENCE_BINS as f64).round() as usize
        };
        let bass_end = scale(REFERENCE_BASS_END).max(1).min(bins);
        let mid_end = scale(REFERENCE_MID_END).max(bass_end + 1).min(bins);
        Self {
            bass_end,
            mid_end,
            bins,
        }
    }
}

/// Mean byte magnitude per band divided by 255.
pub fn bands_from_magnitudes(magnitudes: &[u8], cutoffs: BandCutoffs) -> BandEnergies {
    let n = magnitudes.len().min(cutoffs.bins);
    let mean = |lo: usize, hi: usize| -> f32 {
        let lo = lo.min(n);
        let hi = hi.min(n);
        if hi <= lo {
            return 0.0;
        }
        let sum: u32 = magnitudes[lo..hi].iter().map(|&m| m as u32).sum();
        sum as f32 / (hi - lo) as f32 / 255.0
    };
    BandEnergies {
        bass: mean(0, cutoffs.bass_end),
        mid: mean(cutoffs.bass_end, cutoffs.mid_end),
        high: mean(cutoffs.mid_end, n),
    }
}

pub struct FrequencyAnalyzer {
    source: Option<Box<dyn AnalysisSource>>,
    freq: Vec<u8>,
    time: Vec<u8>,
    cutoffs: BandCutoffs,
}

impl FrequencyAnalyzer {
    pub fn new() -> Self {
        Self {
            source: None,
            freq: Vec::new(),
            time: Vec::new(),
            cutoffs: BandCutoffs::for_bin_count(REFERENCE_BINS),
        }
    }

    pub fn attach(&mut self, source: Box<dyn AnalysisSource>) {
        let bins = source.bin_count();
        self.freq = vec![0u8; bins];
        self.time = vec![128u8; source.window_size()];
        self.cutoffs = BandCutoffs::for_bin_count(bins);
        self.source = Some(source);
    }

    pub fn detach(&mut self) {
        self.source = None;
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    pub fn cutoffs(&self) -> BandCutoffs {
        self.cutoffs
    }

    /// Zero bands and an empty waveform when no source is attached.
    pub fn sample(&mut self) -> AnalysisFrame {
        let Some(source) = self.source.as_mut() else {
            return AnalysisFrame::default();
        };
        source.frequency_data(&mut self.freq);
        source.time_domain_data(&mut self.time);
        let bands = bands_from_magnitudes(&self.freq, self.cutoffs);
        let waveform = self
            .time
            .iter()
            .map(|&b| (b as f32 - 128.0) / 128.0)
            .collect();
        AnalysisFrame { bands, waveform }
    }
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
