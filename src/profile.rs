use clap::ValueEnum;

/// Named visual variant. Each one selects which layers run and how hard they react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VisualProfile {
    Neon,
    #[value(alias = "rain")]
    Matrix,
    Glitch,
    #[value(alias = "calm")]
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphSet {
    Binary,
    Hex,
}

impl GlyphSet {
    pub fn glyphs(self) -> &'static [char] {
        match self {
            Self::Binary => &['0', '1'],
            Self::Hex => &[
                '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
            ],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileParams {
    pub rain: bool,
    pub glyph_set: GlyphSet,
    pub waveform: bool,
    pub particles: bool,
    pub emoji_particles: bool,
    pub spawn_threshold: f32,
    pub spawn_multiplier: f32,
    pub particle_decay: f32,
    pub shake: f32,
    pub zoom: f32,
    pub glitch_gain: f32,
    pub scanlines: bool,
    pub palette: Palette,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub deep: [f32; 3],
    pub accent: [f32; 3],
    pub secondary: [f32; 3],
}

impl Palette {
    pub fn accent_rgb(&self) -> [u8; 3] {
        to_rgb8(self.accent)
    }

    pub fn secondary_rgb(&self) -> [u8; 3] {
        to_rgb8(self.secondary)
    }
}

fn to_rgb8(c: [f32; 3]) -> [u8; 3] {
    [
        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

const NEON_PALETTE: Palette = Palette {
    deep: [0.08, 0.0, 0.16],
    accent: [1.0, 0.0, 0.43],
    secondary: [0.0, 0.94, 1.0],
};

const MATRIX_PALETTE: Palette = Palette {
    deep: [0.0, 0.05, 0.02],
    accent: [0.2, 1.0, 0.45],
    secondary: [0.55, 1.0, 0.8],
};

const GLITCH_PALETTE: Palette = Palette {
    deep: [0.05, 0.0, 0.08],
    accent: [1.0, 0.15, 0.25],
    secondary: [0.35, 0.45, 1.0],
};

impl VisualProfile {
    pub fn label(self) -> &'static str {
        match self {
            Self::Neon => "neon",
            Self::Matrix => "matrix",
            Self::Glitch => "glitch",
            Self::Minimal => "minimal",
        }
    }

    pub fn params(self) -> ProfileParams {
        match self {
            Self::Neon => ProfileParams {
                rain: true,
                glyph_set: GlyphSet::Hex,
                waveform: true,
                particles: true,
                emoji_particles: true,
                spawn_threshold: 0.6,
                spawn_multiplier: 5.0,
                particle_decay: 1.0 / 32.0,
                shake: 1.0,
                zoom: 1.0,
                glitch_gain: 1.0,
                scanlines: true,
                palette: NEON_PALETTE,
            },
            Self::Matrix => ProfileParams {
                rain: true,
                glyph_set: GlyphSet::Binary,
                waveform: false,
                particles: true,
                emoji_particles: false,
                spawn_threshold: 0.7,
                spawn_multiplier: 3.0,
                particle_decay: 1.0 / 32.0,
                shake: 0.5,
                zoom: 0.5,
                glitch_gain: 0.6,
                scanlines: true,
                palette: MATRIX_PALETTE,
            },
            Self::Glitch => ProfileParams {
                rain: true,
                glyph_set: GlyphSet::Hex,
                waveform: true,
                particles: true,
                emoji_particles: true,
                spawn_threshold: 0.5,
                spawn_multiplier: 8.0,
                particle_decay: 1.0 / 32.0,
                shake: 1.8,
                zoom: 1.4,
                glitch_gain: 1.8,
                scanlines: true,
                palette: GLITCH_PALETTE,
            },
            Self::Minimal => ProfileParams {
                rain: false,
                glyph_set: GlyphSet::Binary,
                waveform: true,
                particles: true,
                emoji_particles: false,
                spawn_threshold: 0.7,
                spawn_multiplier: 2.0,
                particle_decay: 1.0 / 64.0,
                shake: 0.0,
                zoom: 0.0,
                glitch_gain: 0.3,
                scanlines: false,
                palette: NEON_PALETTE,
            },
        }
    }
}
