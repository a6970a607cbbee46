//! Time-domain trace across the middle of the frame.

use crate::dimensions::Dimensions;
use crate::surface::{BlendMode, Surface};

const AMPLITUDE: f32 = 0.18;
const SPLIT_PX: f32 = 6.0;
const RED: [u8; 3] = [255, 30, 60];
const CYAN: [u8; 3] = [0, 230, 255];

/// Draws `waveform` (samples in [-1, 1]) as a polyline in `accent`. When `bass`
/// exceeds `split_above`, red and cyan copies are added either side of it first.
pub fn draw_waveform(
    scene: &mut Surface,
    waveform: &[f32],
    bass: f32,
    split_above: f32,
    accent: [u8; 3],
    dims: Dimensions,
) {
    if waveform.is_empty() || dims.is_empty() {
        return;
    }
    let (w, h) = (dims.width as f32, dims.height as f32);
    let unit = dims.unit();
    let points = waveform.len().min(dims.width as usize).max(2);
    let stride = waveform.len() as f32 / points as f32;
    let mid = h * 0.5;
    let amp = h * AMPLITUDE;
    let thickness = (2.0 * unit).max(1.0);
    let trace: Vec<(f32, f32)> = (0..points)
        .map(|i| {
            let s = waveform[((i as f32 * stride) as usize).min(waveform.len() - 1)];
            (i as f32 / (points - 1) as f32 * w, mid + s.clamp(-1.0, 1.0) * amp)
        })
        .collect();

    let mut passes: Vec<(f32, [u8; 3], f32, BlendMode)> = Vec::with_capacity(3);
    if bass > split_above {
        let split = SPLIT_PX * unit * bass.min(1.5);
        passes.push((-split, RED, 0.6, BlendMode::Add));
        passes.push((split, CYAN, 0.6, BlendMode::Add));
    }
    passes.push((0.0, accent, 0.9, BlendMode::Over));

    for (dx, color, alpha, mode) in passes {
        for pair in trace.windows(2) {
            scene.draw_line(
                (pair[0].0 + dx, pair[0].1),
                (pair[1].0 + dx, pair[1].1),
                thickness,
                color,
                alpha,
                mode,
            );
        }
    }
}
