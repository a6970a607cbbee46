//! Bass-driven debris pool.

use crate::analyzer::BandEnergies;
use crate::dimensions::Dimensions;
use crate::font::{self, TextStyle};
use crate::profile::ProfileParams;
use crate::surface::{BlendMode, Surface};

/// Chance that a spawn becomes a glyph sprite when an emoji hint is active.
pub const EMOJI_CHANCE: f32 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Debris,
    Glyph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub color: [u8; 3],
    pub kind: ParticleKind,
    pub glyph: Option<char>,
}

#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    threshold: f32,
    multiplier: f32,
    decay: f32,
    colors: [[u8; 3]; 2],
    emoji_enabled: bool,
}

impl ParticleSystem {
    pub fn new(threshold: f32, multiplier: f32, decay: f32, colors: [[u8; 3]; 2]) -> Self {
        Self {
            particles: Vec::new(),
            threshold,
            multiplier: multiplier.max(0.0),
            // A zero step would never empty the pool.
            decay: if decay.is_finite() && decay > 0.0 { decay } else { 1.0 / 32.0 },
            colors,
            emoji_enabled: false,
        }
    }

    pub fn from_profile(params: &ProfileParams) -> Self {
        Self::new(
            params.spawn_threshold,
            params.spawn_multiplier,
            params.particle_decay,
            [params.palette.accent_rgb(), params.palette.secondary_rgb()],
        )
        .with_emoji(params.emoji_particles)
    }

    pub fn with_emoji(mut self, enabled: bool) -> Self {
        self.emoji_enabled = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn decay_step(&self) -> f32 {
        self.decay
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Number of particles a tick with these bands spawns.
    pub fn spawn_count(&self, bands: BandEnergies) -> usize {
        if bands.bass > self.threshold {
            (bands.bass * self.multiplier).floor().max(0.0) as usize
        } else {
            0
        }
    }

    /// Adds `floor(bass * k)` particles on a bass hit and returns how many were added.
    pub fn spawn(
        &mut self,
        bands: BandEnergies,
        emoji: Option<char>,
        dims: Dimensions,
        rng: &mut fastrand::Rng,
    ) -> usize {
        let count = self.spawn_count(bands);
        if count == 0 || dims.is_empty() {
            return 0;
        }
        let (w, h) = (dims.width as f32, dims.height as f32);
        let unit = dims.unit();
        let emoji = emoji.filter(|_| self.emoji_enabled);

        self.particles.reserve(count);
        for _ in 0..count {
            let angle = rng.f32() * std::f32::consts::TAU;
            let speed = (2.0 + rng.f32() * 8.0) * unit;
            let color = self.colors[rng.usize(..2)];
            let (kind, glyph, width, height) = match emoji {
                Some(ch) if rng.f32() < EMOJI_CHANCE => {
                    let size = (18.0 + rng.f32() * 18.0) * unit;
                    (ParticleKind::Glyph, Some(ch), size, size)
                }
                _ => {
                    // Stretched along the direction of travel.
                    let long = (4.0 + rng.f32() * 10.0) * unit;
                    let short = (1.5 + rng.f32() * 2.5) * unit;
                    if angle.cos().abs() >= angle.sin().abs() {
                        (ParticleKind::Debris, None, long, short)
                    } else {
                        (ParticleKind::Debris, None, short, long)
                    }
                }
            };
            self.particles.push(Particle {
                x: rng.f32() * w,
                y: rng.f32() * h,
                width,
                height,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: 1.0,
                color,
                kind,
                glyph,
            });
        }
        count
    }

    /// Moves every particle, decays life and drops the dead ones in place.
    pub fn advance(&mut self) {
        let decay = self.decay;
        for p in &mut self.particles {
            p.x += p.vx;
            p.y += p.vy;
            p.life -= decay;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn draw(&self, surface: &mut Surface) {
        for p in &self.particles {
            let alpha = p.life.clamp(0.0, 1.0);
            match (p.kind, p.glyph) {
                (ParticleKind::Glyph, Some(ch)) => {
                    let mut style = TextStyle::new(p.height / font::GLYPH_ROWS as f32, p.color);
                    style.alpha = alpha;
                    style.mode = BlendMode::Add;
                    font::draw_glyph(surface, ch, p.x, p.y, &style);
                }
                _ => surface.fill_rect(
                    p.x - p.width * 0.5,
                    p.y - p.height * 0.5,
                    p.width,
                    p.height,
                    p.color,
                    alpha,
                    BlendMode::Over,
                ),
            }
        }
    }
}
