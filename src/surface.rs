use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const CYAN: Self = Self::new(0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let h = h.rem_euclid(360.0) / 60.0;
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {input:?}: expected #rrggbb or #rgb")]
pub struct ColorParseError {
    pub input: String,
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError {
            input: s.to_string(),
        };
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        match hex.len() {
            6 => {
                let v = u32::from_str_radix(hex, 16).map_err(|_| err())?;
                Ok(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            3 => {
                let v = u32::from_str_radix(hex, 16).map_err(|_| err())?;
                let expand = |n: u32| ((n & 0xF) * 17) as u8;
                Ok(Self::new(expand(v >> 8), expand(v >> 4), expand(v)))
            }
            _ => Err(err()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    SourceOver,
    Multiply,
}

/// RGBA8 drawing surface, non-premultiplied, row-major. A cleared surface is
/// transparent black (all bytes zero).
#[derive(Clone, Debug, PartialEq, Eq)]
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
            pixels: vec![0; width.saturating_mul(height).saturating_mul(4)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn area(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
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

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width.saturating_mul(height).saturating_mul(4)];
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }

    pub fn fill(&mut self, color: Rgb, alpha: f32, mode: BlendMode) {
        let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        if alpha <= 0.0 {
            return;
        }
        let src = [color.r, color.g, color.b];
        for px in self.pixels.chunks_exact_mut(4) {
            composite_px(px, src, alpha, mode);
        }
    }

    pub fn flood(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        if self.is_empty() || !(w > 0.0 && h > 0.0) {
            return;
        }
        let x0 = x.floor().max(0.0) as usize;
        let y0 = y.floor().max(0.0) as usize;
        let x1 = ((x + w).ceil().max(0.0) as usize).min(self.width);
        let y1 = ((y + h).ceil().max(0.0) as usize).min(self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.put(px, py, color);
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: Rgb) {
        if self.is_empty() || !(r > 0.0) {
            return;
        }
        let y0 = (cy - r).floor().max(0.0) as usize;
        let y1 = ((cy + r).ceil().max(0.0) as usize).min(self.height);
        let x0 = (cx - r).floor().max(0.0) as usize;
        let x1 = ((cx + r).ceil().max(0.0) as usize).min(self.width);
        let r2 = r * r;
        for py in y0..y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    self.put(px, py, color);
                }
            }
        }
    }

    /// Even-odd scanline fill of a closed polygon.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgb) {
        if self.is_empty() || points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        if !min_y.is_finite() || !max_y.is_finite() {
            return;
        }
        let y0 = min_y.floor().max(0.0) as usize;
        let y1 = (max_y.ceil().max(0.0) as usize).min(self.height);

        let mut xs: Vec<f32> = Vec::with_capacity(points.len());
        for py in y0..y1 {
            let sy = py as f32 + 0.5;
            xs.clear();
            for i in 0..points.len() {
                let (ax, ay) = points[i];
                let (bx, by) = points[(i + 1) % points.len()];
                if (ay <= sy && by > sy) || (by <= sy && ay > sy) {
                    let t = (sy - ay) / (by - ay);
                    xs.push(ax + t * (bx - ax));
                }
            }
            xs.sort_by(f32::total_cmp);
            for span in xs.chunks_exact(2) {
                let sx0 = (span[0] - 0.5).ceil().max(0.0) as usize;
                let sx1 = ((span[1] - 0.5).floor() + 1.0).max(0.0) as usize;
                for px in sx0..sx1.min(self.width) {
                    self.put(px, py, color);
                }
            }
        }
    }

    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], thickness: f32, color: Rgb) {
        let r = (thickness * 0.5).max(0.5);
        for seg in points.windows(2) {
            let (ax, ay) = seg[0];
            let (bx, by) = seg[1];
            let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            let steps = (len / r).ceil().max(1.0) as usize;
            for s in 0..=steps {
                let t = s as f32 / steps as f32;
                self.fill_circle(ax + (bx - ax) * t, ay + (by - ay) * t, r, color);
            }
        }
    }

    pub fn draw_image(&mut self, src: &[u8], src_w: usize, src_h: usize) {
        if self.is_empty() || src_w == 0 || src_h == 0 {
            return;
        }
        if src.len() < src_w.saturating_mul(src_h).saturating_mul(4) {
            return;
        }
        for y in 0..self.height {
            let sy = (y * src_h / self.height).min(src_h - 1);
            for x in 0..self.width {
                let sx = (x * src_w / self.width).min(src_w - 1);
                let si = (sy * src_w + sx) * 4;
                let di = (y * self.width + x) * 4;
                let a = src[si + 3];
                let dst = &mut self.pixels[di..di + 4];
                if a == 255 {
                    dst.copy_from_slice(&src[si..si + 4]);
                } else if a > 0 {
                    composite_px(
                        dst,
                        [src[si], src[si + 1], src[si + 2]],
                        a as f32 / 255.0,
                        BlendMode::SourceOver,
                    );
                }
            }
        }
    }

    pub fn resample_over_black(&self, dst_w: usize, dst_h: usize, out: &mut Vec<u8>) {
        out.clear();
        out.resize(dst_w.saturating_mul(dst_h).saturating_mul(4), 0);
        if self.is_empty() || dst_w == 0 || dst_h == 0 {
            return;
        }
        for y in 0..dst_h {
            let sy = (y * self.height / dst_h).min(self.height - 1);
            for x in 0..dst_w {
                let sx = (x * self.width / dst_w).min(self.width - 1);
                let si = (sy * self.width + sx) * 4;
                let di = (y * dst_w + x) * 4;
                let a = self.pixels[si + 3] as u16;
                for c in 0..3 {
                    out[di + c] = ((self.pixels[si + c] as u16 * a + 127) / 255) as u8;
                }
                out[di + 3] = 255;
            }
        }
    }

    fn put(&mut self, x: usize, y: usize, color: Rgb) {
        let i = (y * self.width + x) * 4;
        self.pixels[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, 255]);
    }
}

// W3C compositing of a solid source over one non-premultiplied pixel.
fn composite_px(dst: &mut [u8], src: [u8; 3], alpha_s: f32, mode: BlendMode) {
    let alpha_b = dst[3] as f32 / 255.0;
    let alpha_o = alpha_s + alpha_b * (1.0 - alpha_s);
    if alpha_o <= 0.0 {
        return;
    }
    for c in 0..3 {
        let cs = src[c] as f32 / 255.0;
        let cb = dst[c] as f32 / 255.0;
        let mixed = match mode {
            BlendMode::SourceOver => cs,
            BlendMode::Multiply => cs * cb,
        };
        let co = alpha_s * (1.0 - alpha_b) * cs + alpha_s * alpha_b * mixed + (1.0 - alpha_s) * alpha_b * cb;
        dst[c] = ((co / alpha_o) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (alpha_o * 255.0).round().clamp(0.0, 255.0) as u8;
}
