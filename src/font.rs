//! Scalable 3x5 bitmap font.

use crate::surface::{BlendMode, Surface};

pub const GLYPH_COLS: usize = 3;
pub const GLYPH_ROWS: usize = 5;
/// Horizontal advance in font cells (glyph plus one cell of spacing).
pub const ADVANCE_CELLS: f32 = 4.0;

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    /// Pixel size of one font cell.
    pub scale: f32,
    pub color: [u8; 3],
    pub alpha: f32,
    pub mode: BlendMode,
    /// Horizontal shear per pixel of height, measured from the glyph's vertical center.
    pub skew: f32,
}

impl TextStyle {
    pub fn new(scale: f32, color: [u8; 3]) -> Self {
        Self {
            scale,
            color,
            alpha: 1.0,
            mode: BlendMode::Over,
            skew: 0.0,
        }
    }
}

pub fn text_width(text: &str, scale: f32) -> f32 {
    let count = text.chars().count();
    if count == 0 {
        return 0.0;
    }
    count as f32 * ADVANCE_CELLS * scale - scale
}

pub fn text_height(scale: f32) -> f32 {
    GLYPH_ROWS as f32 * scale
}

pub fn draw_text(surface: &mut Surface, text: &str, x: f32, y: f32, style: &TextStyle) {
    let step = ADVANCE_CELLS * style.scale;
    let mut cursor = x;
    for ch in text.chars() {
        draw_glyph(surface, ch, cursor, y, style);
        cursor += step;
    }
}

pub fn draw_glyph(surface: &mut Surface, ch: char, x: f32, y: f32, style: &TextStyle) {
    let scale = style.scale.max(1.0);
    let rows = glyph_3x5(ch);
    let mid = GLYPH_ROWS as f32 * scale * 0.5;
    for (ry, bits) in rows.iter().enumerate() {
        let py = y + ry as f32 * scale;
        let shear = style.skew * (py + scale * 0.5 - (y + mid));
        for rx in 0..GLYPH_COLS {
            if bits & (1u8 << (GLYPH_COLS - 1 - rx)) == 0 {
                continue;
            }
            let px = x + rx as f32 * scale + shear;
            surface.fill_rect(px, py, scale, scale, style.color, style.alpha, style.mode);
        }
    }
}

/// Glyphs used for the decode flicker at the end of a partially revealed line.
pub const DECORATIVE: &[char] = &[
    '!', '<', '>', '-', '_', '\\', '/', '[', ']', '=', '+', '*', '^', '?', '#', '%', '&', '@',
];

fn glyph_3x5(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '<' => [0b001, 0b010, 0b100, 0b010, 0b001],
        '>' => [0b100, 0b010, 0b001, 0b010, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '*' => [0b101, 0b010, 0b111, 0b010, 0b101],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '\\' => [0b100, 0b100, 0b010, 0b001, 0b001],
        '[' => [0b110, 0b100, 0b100, 0b100, 0b110],
        ']' => [0b011, 0b001, 0b001, 0b001, 0b011],
        '^' => [0b010, 0b101, 0b000, 0b000, 0b000],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '&' => [0b010, 0b101, 0b010, 0b101, 0b011],
        '@' => [0b111, 0b101, 0b111, 0b100, 0b111],
        c if !c.is_ascii() => [0b010, 0b111, 0b111, 0b111, 0b010],
        _ => [0b111, 0b101, 0b101, 0b101, 0b111],
    }
}
