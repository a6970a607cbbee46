//! Falling glyph columns on their own trail surface.

use crate::analyzer::BandEnergies;
use crate::dimensions::Dimensions;
use crate::font::{self, TextStyle};
use crate::profile::GlyphSet;
use crate::surface::{BlendMode, Surface};

const BASE_CELL_PX: f32 = 16.0;
const FADE_ALPHA: f32 = 0.1;
const BASS_FLIP: f32 = 0.7;
const FLIP_CHANCE: f32 = 0.3;
const RESET_CHANCE: f32 = 0.025;

const GREEN: [u8; 3] = [0, 255, 70];
const WHITE: [u8; 3] = [235, 255, 245];
const CYAN: [u8; 3] = [0, 240, 255];

/// Glyph cell edge in pixels for an output size.
pub fn cell_size_for(dims: Dimensions) -> usize {
    (BASE_CELL_PX * dims.unit()).round().max(4.0) as usize
}

pub struct RainLayer {
    surface: Surface,
    cell: usize,
    drops: Vec<f32>,
    glyphs: GlyphSet,
    dims: Dimensions,
    reseeds: usize,
}

impl RainLayer {
    pub fn new(glyphs: GlyphSet) -> Self {
        Self {
            surface: Surface::new(0, 0),
            cell: cell_size_for(Dimensions::default()),
            drops: Vec::new(),
            glyphs,
            dims: Dimensions::default(),
            reseeds: 0,
        }
    }

    pub fn cell_size(&self) -> usize {
        self.cell
    }

    pub fn column_count(&self) -> usize {
        self.drops.len()
    }

    pub fn drops(&self) -> &[f32] {
        &self.drops
    }

    /// How many times the column grid has been rebuilt.
    pub fn reseed_count(&self) -> usize {
        self.reseeds
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Rebuilds the grid when the size differs; drops start at random negative rows.
    pub fn resize(&mut self, dims: Dimensions, rng: &mut fastrand::Rng) -> bool {
        if dims == self.dims && self.reseeds > 0 {
            return false;
        }
        self.dims = dims;
        let (w, h) = dims.as_usize();
        self.surface.resize(w, h);
        self.surface.clear([0, 0, 0, 0]);
        self.cell = cell_size_for(dims);
        let columns = w.div_ceil(self.cell);
        let rows = (h / self.cell).max(1) as f32;
        self.drops = (0..columns).map(|_| -(rng.f32() * rows)).collect();
        self.reseeds += 1;
        true
    }

    pub fn step(&mut self, bands: BandEnergies, rng: &mut fastrand::Rng) {
        if self.surface.is_empty() {
            return;
        }
        self.surface.erase(FADE_ALPHA);

        let cell = self.cell as f32;
        let height = self.surface.height() as f32;
        let hot = bands.bass > BASS_FLIP;
        let set = self.glyphs.glyphs();
        let mut style = TextStyle::new((cell / 6.0).max(1.0), GREEN);
        style.mode = BlendMode::Over;
        let glyph_w = font::GLYPH_COLS as f32 * style.scale;

        let speed = 0.5 + 1.5 * bands.bass.max(0.0);
        for (i, drop) in self.drops.iter_mut().enumerate() {
            let ch = set[rng.usize(..set.len())];
            style.color = if hot && rng.f32() < FLIP_CHANCE {
                if rng.bool() { WHITE } else { CYAN }
            } else {
                GREEN
            };
            let x = i as f32 * cell + (cell - glyph_w) * 0.5;
            let y = *drop * cell;
            if y + cell >= 0.0 {
                font::draw_glyph(&mut self.surface, ch, x, y, &style);
            }

            *drop += speed;
            if *drop * cell > height && rng.f32() < RESET_CHANCE {
                *drop = 0.0;
            }
        }
    }

    /// Additive blend so glyphs brighten the background instead of covering it.
    pub fn composite_onto(&self, dst: &mut Surface) {
        dst.composite_add(&self.surface);
    }
}
