use crate::analyzer::BandEnergies;
use crate::font::{self, DECORATIVE, TextStyle};
use crate::lyrics::{LyricLine, LyricStyle, LyricTrack};
use crate::profile::Palette;
use crate::surface::{BlendMode, Surface};

/// Characters revealed per tick.
pub const REVEAL_SPEED: f32 = 0.6;
/// Wrap width as a fraction of the frame width.
pub const WRAP_FRACTION: f32 = 0.85;
/// Glyph height in pixels at 1080 lines.
const BASE_TEXT_PX: f32 = 72.0;
const LINE_SPACING: f32 = 1.45;

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
const ABERRATION_RED: [u8; 3] = [255, 20, 60];
const ABERRATION_CYAN: [u8; 3] = [0, 235, 255];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleLook {
    pub size: f32,
    pub distortion: f32,
    /// Extra positional jitter in pixels per unit of bass.
    pub jitter: f32,
    pub color: [u8; 3],
}

/// Size, distortion and tint for a lyric style.
pub fn style_look(style: LyricStyle, palette: &Palette) -> StyleLook {
    match style {
        LyricStyle::Normal => StyleLook {
            size: 1.0,
            distortion: 1.0,
            jitter: 0.0,
            color: rgb(WHITE),
        },
        LyricStyle::Impact => StyleLook {
            size: 1.35,
            distortion: 1.8,
            jitter: 0.0,
            color: rgb(mix(WHITE, palette.accent, 0.6)),
        },
        LyricStyle::Glitch => StyleLook {
            size: 1.15,
            distortion: 1.2,
            jitter: 14.0,
            color: rgb(WHITE),
        },
        LyricStyle::Soft => StyleLook {
            size: 1.0,
            distortion: 0.4,
            jitter: 0.0,
            color: rgb(mix(WHITE, palette.secondary, 0.5)),
        },
    }
}

/// Greedy word wrap measured with the bitmap font at `scale`.
///
/// Whitespace runs collapse to single spaces. A word wider than `max_width` gets a
/// line of its own.
pub fn wrap_words(text: &str, max_width: f32, scale: f32) -> Vec<String> {
    let mut lines = Vec::<String>::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate_w = font::text_width(&current, scale)
            + font::ADVANCE_CELLS * scale * (1 + word.chars().count()) as f32;
        if candidate_w <= max_width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Splits a revealed prefix of `count` chars across already wrapped lines.
/// The space consumed by each line break counts as one revealed char.
pub fn reveal_across(lines: &[String], count: usize) -> Vec<String> {
    let mut left = count;
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if left == 0 {
            break;
        }
        let len = line.chars().count();
        let take = left.min(len);
        out.push(line.chars().take(take).collect());
        left -= take;
        left = left.saturating_sub(1);
    }
    out
}

/// Lyric line (or title) renderer with the decode-style reveal.
#[derive(Debug, Clone, Default)]
pub struct TypographyRenderer {
    cursor: Option<usize>,
    decoded: f32,
}

impl TypographyRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the line shown on the last tick.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn decoded_count(&self) -> f32 {
        self.decoded
    }

    pub fn reset(&mut self) {
        self.cursor = None;
        self.decoded = 0.0;
    }

    /// Selects the active line and steps the reveal counter.
    ///
    /// The counter drops to zero on the tick the index changes and otherwise grows
    /// by `REVEAL_SPEED`, capped at the line length.
    pub fn advance(&mut self, track: &LyricTrack, elapsed: f32) -> Option<usize> {
        let index = track.active_index(elapsed);
        if index != self.cursor {
            self.cursor = index;
            self.decoded = 0.0;
            return index;
        }
        if let Some(line) = index.and_then(|i| track.get(i)) {
            let len = line.text.chars().count() as f32;
            self.decoded = (self.decoded + REVEAL_SPEED).min(len);
        }
        index
    }

    pub fn render(
        &mut self,
        surface: &mut Surface,
        track: &LyricTrack,
        elapsed: f32,
        bands: BandEnergies,
        title: &str,
        palette: &Palette,
        rng: &mut fastrand::Rng,
    ) -> Option<usize> {
        if surface.is_empty() {
            return None;
        }
        if track.is_empty() {
            self.reset();
            let look = style_look(LyricStyle::Normal, palette);
            let lines = wrap_words(title, wrap_width(surface), text_scale(surface, look.size));
            draw_block(surface, &lines, &lines, None, look, bands, rng);
            return None;
        }

        let index = self.advance(track, elapsed)?;
        let line = track.get(index)?;
        self.draw_line(surface, line, bands, palette, rng);
        Some(index)
    }

    fn draw_line(
        &self,
        surface: &mut Surface,
        line: &LyricLine,
        bands: BandEnergies,
        palette: &Palette,
        rng: &mut fastrand::Rng,
    ) {
        let look = style_look(line.style(), palette);
        let wrapped = wrap_words(&line.text, wrap_width(surface), text_scale(surface, look.size));
        let total: usize = wrapped.iter().map(|l| l.chars().count()).sum::<usize>()
            + wrapped.len().saturating_sub(1);
        let shown = (self.decoded.floor() as usize).min(total);
        let mut visible = reveal_across(&wrapped, shown);
        let flicker = (shown < total).then(|| DECORATIVE[rng.usize(..DECORATIVE.len())]);
        if visible.is_empty() && flicker.is_some() {
            visible.push(String::new());
        }
        draw_block(surface, &wrapped, &visible, flicker, look, bands, rng);
    }
}

fn unit(surface: &Surface) -> f32 {
    (surface.width().min(surface.height()) as f32 / 1080.0).max(0.05)
}

fn wrap_width(surface: &Surface) -> f32 {
    surface.width() as f32 * WRAP_FRACTION
}

fn text_scale(surface: &Surface, size: f32) -> f32 {
    (BASE_TEXT_PX * unit(surface) * size / font::GLYPH_ROWS as f32).max(1.0)
}

/// Draws `visible` laid out on the geometry of `full`, centered as a block.
fn draw_block(
    surface: &mut Surface,
    full: &[String],
    visible: &[String],
    flicker: Option<char>,
    look: StyleLook,
    bands: BandEnergies,
    rng: &mut fastrand::Rng,
) {
    if full.is_empty() {
        return;
    }
    let u = unit(surface);
    let scale = text_scale(surface, look.size);
    let bass = bands.bass.max(0.0);
    let text_h = font::text_height(scale);
    let line_h = text_h * LINE_SPACING;
    let block_h = line_h * (full.len() - 1) as f32 + text_h;
    let top = (surface.height() as f32 - block_h) * 0.5;

    let shake = 6.0 * u * bass * look.distortion;
    let jitter = look.jitter * u * bass;
    let dx = (rng.f32() - 0.5) * 2.0 * (shake + jitter);
    let dy = (rng.f32() - 0.5) * 2.0 * (shake + jitter);
    let skew = (rng.f32() - 0.5) * 0.3 * bass.min(1.5) * look.distortion;
    let split = (1.0 + 10.0 * bass) * u * look.distortion;

    let mut main = TextStyle::new(scale, look.color);
    main.skew = skew;
    let mut red = main;
    red.color = ABERRATION_RED;
    red.alpha = 0.7;
    red.mode = BlendMode::Add;
    let mut cyan = red;
    cyan.color = ABERRATION_CYAN;
    let mut glow = main;
    glow.alpha = 0.22;
    glow.mode = BlendMode::Add;

    let last_visible = visible.len().saturating_sub(1);
    for (i, full_line) in full.iter().enumerate() {
        let Some(shown) = visible.get(i) else {
            break;
        };
        let mut text = shown.clone();
        if i == last_visible {
            if let Some(ch) = flicker {
                text.push(ch);
            }
        }
        let x = (surface.width() as f32 - font::text_width(full_line, scale)) * 0.5 + dx;
        let y = top + line_h * i as f32 + dy;

        font::draw_text(surface, &text, x - split, y, &red);
        font::draw_text(surface, &text, x + split, y, &cyan);
        let halo = (scale * 0.5).max(1.0);
        for (ox, oy) in [(-halo, 0.0), (halo, 0.0), (0.0, -halo), (0.0, halo)] {
            font::draw_text(surface, &text, x + ox, y + oy, &glow);
        }
        font::draw_text(surface, &text, x, y, &main);
    }
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn rgb(c: [f32; 3]) -> [u8; 3] {
    [
        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
    ]
}
