// Core types shared by the simulators, the rasterizer and the viewer.

use crate::error::Error;
use image::{ImageBuffer, Rgb as ImageRgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is on screen (pixels)
    pub height: usize,     // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Pack an RGB image as 0x00RRGGBB (camera frames arrive this way).
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();
        Self { width: w as usize, height: h as usize, pixels }
    }

    /// Copy into an `image` RGB buffer (for saving snapshots).
    pub fn to_rgb_image(&self) -> RgbImage {
        ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
            let px = self.pixels[y as usize * self.width + x as usize];
            ImageRgb([(px >> 16) as u8, (px >> 8) as u8, px as u8])
        })
    }

    /// Visual: writes exactly what the window currently shows to a PNG file.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        self.to_rgb_image().save(path)?;
        Ok(())
    }
}

/// Erasure buffer in [0,1] per pixel; 0 = fully fogged, 1 = fully erased.
/// Visual: unseen directly; it is cut out of the frost layer every frame.
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub alpha: Vec<f32>,   // length = width * height, values clamped to [0.0, 1.0]
}

impl Mask {
    /// A fully fogged mask (nothing erased yet).
    pub fn fogged(width: usize, height: usize) -> Self {
        Self { width, height, alpha: vec![0.0; width * height] }
    }

    /// Re-fog everything. Visual: the whole frost layer comes back.
    pub fn reset(&mut self) {
        self.alpha.fill(0.0);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.alpha[y * self.width + x]
    }

    /// Source-over accumulate `a` into pixel `idx`. Never decreases the value,
    /// so erased regions stay erased until `reset`.
    #[inline]
    pub fn accumulate(&mut self, idx: usize, a: f32) {
        let old = self.alpha[idx];
        self.alpha[idx] = (old + a * (1.0 - old)).clamp(old, 1.0);
    }

    /// Fraction of pixels that are fully erased.
    pub fn erased_fraction(&self) -> f32 {
        if self.alpha.is_empty() {
            return 0.0;
        }
        let n = self.alpha.iter().filter(|&&a| a >= 1.0).count();
        n as f32 / self.alpha.len() as f32
    }
}

/// 8-bit sRGB colour, written in TOML as `[r, g, b]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::hex(0xFF_FF_FF);

    pub const fn hex(v: u32) -> Self {
        Self { r: (v >> 16) as u8, g: (v >> 8) as u8, b: v as u8 }
    }

    /// Linear interpolation `a + (b - a) * t`, `t` clamped to [0,1].
    /// Endpoints are exact: `lerp(a, b, 0) == a`, `lerp(a, b, 1) == b`.
    pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let ch = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8;
        Rgb { r: ch(a.r, b.r), g: ch(a.g, b.g), b: ch(a.b, b.b) }
    }

    /// Channels as 0..1 floats (still sRGB encoded).
    #[inline]
    pub fn unit(self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(v: [u8; 3]) -> Self {
        Rgb { r: v[0], g: v[1], b: v[2] }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}
