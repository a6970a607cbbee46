//! Procedural background, evaluated per pixel like a fragment program.

use crate::analyzer::BandEnergies;
use crate::profile::Palette;
use crate::surface::Surface;

pub const VIGNETTE_K: f32 = 0.55;
pub const SHOCK_GAIN: f32 = 1.6;
const MID_RING_GAIN: f32 = 0.9;
const GLITCH_GATE: f32 = 0.25;

/// Bass ring strength; saturates at bass >= 1.
pub fn shockwave_intensity(bands: BandEnergies) -> f32 {
    bands.bass.clamp(0.0, 1.0) * SHOCK_GAIN
}

fn mid_ring_intensity(bands: BandEnergies) -> f32 {
    bands.mid.clamp(0.0, 1.0) * MID_RING_GAIN
}

#[derive(Debug, Clone, Copy)]
pub struct BackgroundRenderer {
    palette: Palette,
    glitch_gain: f32,
}

impl BackgroundRenderer {
    pub fn new(palette: Palette, glitch_gain: f32) -> Self {
        Self {
            palette,
            glitch_gain,
        }
    }

    pub fn render(
        &self,
        time: f32,
        resolution: (usize, usize),
        bands: BandEnergies,
        out: &mut Surface,
    ) {
        let (w, h) = resolution;
        out.resize(w, h);
        if w == 0 || h == 0 {
            return;
        }
        let aspect = w as f32 / h as f32;
        let frame_seed = (time * 60.0) as u32;
        let pixels = out.pixels_mut();
        for y in 0..h {
            let py = 1.0 - 2.0 * (y as f32 + 0.5) / h as f32;
            for x in 0..w {
                let px = (2.0 * (x as f32 + 0.5) / w as f32 - 1.0) * aspect;
                let noise = hash01(
                    (x as u32).wrapping_mul(0x9E37_79B1)
                        ^ (y as u32).wrapping_mul(0x85EB_CA77)
                        ^ frame_seed.wrapping_mul(0xC2B2_AE3D),
                );
                let c = self.shade(px, py, time, bands, noise);
                let i = (y * w + x) * 4;
                pixels[i] = (c[0].clamp(0.0, 1.0) * 255.0) as u8;
                pixels[i + 1] = (c[1].clamp(0.0, 1.0) * 255.0) as u8;
                pixels[i + 2] = (c[2].clamp(0.0, 1.0) * 255.0) as u8;
                pixels[i + 3] = 255;
            }
        }
    }

    /// Color at normalized position (`x` aspect-corrected, `y` in -1..1).
    pub fn shade(&self, x: f32, y: f32, time: f32, bands: BandEnergies, noise: f32) -> [f32; 3] {
        let pal = &self.palette;
        let r = (x * x + y * y).sqrt();
        let a = y.atan2(x);

        // Tunnel.
        let depth = 1.0 / (r + 0.15);
        let tunnel = 0.5 + 0.5 * (depth * 3.0 - time * 2.0 - bands.bass * 4.0 + a * 3.0).sin();
        let core = (1.0 - r).max(0.0) * 0.25 * (1.0 + bands.mid);
        let mut col = [0.0f32; 3];
        for c in 0..3 {
            col[c] = lerp(pal.deep[c], pal.accent[c], tunnel * 0.45) + pal.secondary[c] * core * 0.4;
        }

        // Shockwave rings.
        let bass_ring_r = 0.15 + bands.bass.min(1.5) * 0.85;
        let bass_ring = (-(r - bass_ring_r).abs() * 18.0).exp() * shockwave_intensity(bands);
        let mid_ring_r = 0.1 + bands.mid.min(1.5) * 0.55;
        let mid_ring = (-(r - mid_ring_r).abs() * 26.0).exp() * mid_ring_intensity(bands);
        for c in 0..3 {
            col[c] += pal.accent[c] * bass_ring + pal.secondary[c] * mid_ring;
        }

        // Glitch blocks.
        if bands.high > GLITCH_GATE {
            let gx = step(0.55, fract(x * 7.0 + time * 2.3));
            let gy = step(0.65, fract(y * 11.0 - time * 4.7));
            let mask = gx * gy * (bands.high * self.glitch_gain).min(1.0);
            if mask > 0.0 {
                let shifted = [
                    col[2] * 1.4 + noise * 0.3,
                    col[0] * 0.6 + noise * 0.3,
                    col[1] * 1.4 + noise * 0.3,
                ];
                for c in 0..3 {
                    col[c] = lerp(col[c], shifted[c], mask);
                }
            }
        }

        let grain = (noise - 0.5) * 0.04;
        let vignette = (1.0 - VIGNETTE_K * r).max(0.0);
        for v in &mut col {
            *v = (*v + grain) * vignette;
        }
        col
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn step(edge: f32, v: f32) -> f32 {
    if v >= edge { 1.0 } else { 0.0 }
}

fn fract(v: f32) -> f32 {
    v - v.floor()
}

fn hash01(x: u32) -> f32 {
    let mut v = x;
    v ^= v >> 16;
    v = v.wrapping_mul(0x7feb_352d);
    v ^= v >> 15;
    v = v.wrapping_mul(0x846c_a68b);
    v ^= v >> 16;
    (v as f32) / (u32::MAX as f32)
}
