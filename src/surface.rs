//! CPU RGBA8 drawing surface used by every layer.
//!
//! Layer surfaces (rain) keep premultiplied color so an erase pass scales all four
//! channels. The scene and output surfaces stay opaque.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Over,
    Add,
    Screen,
}

#[derive(Debug, Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width.saturating_mul(height).saturating_mul(4)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reallocates and clears when the size changes. Returns whether it did.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0u8; width.saturating_mul(height).saturating_mul(4)];
        true
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn put(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * 4;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 3], alpha: f32, mode: BlendMode) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let i = (y * self.width + x) * 4;
        let px = &mut self.pixels[i..i + 4];
        for c in 0..3 {
            let dst = px[c] as f32;
            let src = color[c] as f32;
            let v = match mode {
                BlendMode::Over => dst * (1.0 - a) + src * a,
                BlendMode::Add => dst + src * a,
                BlendMode::Screen => 255.0 - (255.0 - dst) * (255.0 - src * a) / 255.0,
            };
            px[c] = v.clamp(0.0, 255.0) as u8;
        }
        let dst_a = px[3] as f32 / 255.0;
        px[3] = ((a + dst_a * (1.0 - a)) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    pub fn fill_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: [u8; 3],
        alpha: f32,
        mode: BlendMode,
    ) {
        if w <= 0.0 || h <= 0.0 || self.is_empty() {
            return;
        }
        let x0 = x.floor().max(0.0) as i32;
        let y0 = y.floor().max(0.0) as i32;
        let x1 = ((x + w).ceil() as i32).min(self.width as i32);
        let y1 = ((y + h).ceil() as i32).min(self.height as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color, alpha, mode);
            }
        }
    }

    /// Thick line segment, stamped as squares along the segment.
    pub fn draw_line(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
        color: [u8; 3],
        alpha: f32,
        mode: BlendMode,
    ) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        let t = thickness.max(1.0);
        let half = t * 0.5;
        // Add-blended stamps would stack on overlap; step one full stamp for those.
        let stride = if mode == BlendMode::Over { 1 } else { (t as usize).max(1) };
        let mut i = 0usize;
        while i <= steps {
            let f = i as f32 / steps as f32;
            let x = from.0 + dx * f;
            let y = from.1 + dy * f;
            self.fill_rect(x - half, y - half, t, t, color, alpha, mode);
            i += stride;
        }
    }

    /// Destination-out with a uniform alpha: every channel fades toward zero.
    pub fn erase(&mut self, alpha: f32) {
        let keep = (1.0 - alpha.clamp(0.0, 1.0)) * 256.0;
        let keep = keep as u32;
        for v in self.pixels.iter_mut() {
            *v = ((*v as u32 * keep) >> 8) as u8;
        }
    }

    /// Additive composite of a premultiplied layer of the same size.
    pub fn composite_add(&mut self, layer: &Surface) {
        if layer.width != self.width || layer.height != self.height {
            return;
        }
        for (dst, src) in self
            .pixels
            .chunks_exact_mut(4)
            .zip(layer.pixels.chunks_exact(4))
        {
            dst[0] = dst[0].saturating_add(src[0]);
            dst[1] = dst[1].saturating_add(src[1]);
            dst[2] = dst[2].saturating_add(src[2]);
        }
    }

    /// Copies `src` through a translate + zoom about the frame center.
    /// Pixels that map outside `src` become black.
    pub fn transform_from(&mut self, src: &Surface, offset: (f32, f32), zoom: f32) {
        self.resize(src.width, src.height);
        if src.is_empty() {
            return;
        }
        let zoom = if zoom.is_finite() && zoom > 0.01 { zoom } else { 1.0 };
        if offset == (0.0, 0.0) && (zoom - 1.0).abs() < 1e-6 {
            self.pixels.copy_from_slice(&src.pixels);
            return;
        }
        let cx = src.width as f32 * 0.5;
        let cy = src.height as f32 * 0.5;
        let inv = 1.0 / zoom;
        for y in 0..self.height {
            let sy = ((y as f32 + 0.5 - cy - offset.1) * inv + cy).floor();
            for x in 0..self.width {
                let sx = ((x as f32 + 0.5 - cx - offset.0) * inv + cx).floor();
                let di = (y * self.width + x) * 4;
                if sx < 0.0 || sy < 0.0 || sx >= src.width as f32 || sy >= src.height as f32 {
                    self.pixels[di..di + 4].copy_from_slice(&[0, 0, 0, 255]);
                    continue;
                }
                let si = (sy as usize * src.width + sx as usize) * 4;
                self.pixels[di..di + 4].copy_from_slice(&src.pixels[si..si + 4]);
            }
        }
    }

    /// Darkens every `period`-th band of rows.
    pub fn scanlines(&mut self, period: usize, strength: f32) {
        let period = period.max(2);
        let keep = ((1.0 - strength.clamp(0.0, 1.0)) * 256.0) as u32;
        let dark_rows = (period / 2).max(1);
        for y in 0..self.height {
            if y % period >= dark_rows {
                continue;
            }
            let row = &mut self.pixels[y * self.width * 4..(y + 1) * self.width * 4];
            for px in row.chunks_exact_mut(4) {
                px[0] = ((px[0] as u32 * keep) >> 8) as u8;
                px[1] = ((px[1] as u32 * keep) >> 8) as u8;
                px[2] = ((px[2] as u32 * keep) >> 8) as u8;
            }
        }
    }
}
