// Software rasterizer behind the `Surface` trait, plus layer compositing.
// Visual outcomes:
// - Each effect draws into its own transparent layer (premultiplied RGBA).
// - Layers are then blended over the live camera frame in linear light.
// Shapes get ~1 px of anti-aliasing from distance-based coverage.

use crate::gamma::GammaLut;
use crate::surface::{Blend, RadialGradient, Stop, Style, Surface, VerticalGradient};
use crate::types::{FrameBuffer, Mask, Rgb};
use glam::Vec2;
use image::GrayImage;
use tracing::trace;

/// Premultiplied RGBA layer, channels in [0,1] (sRGB-encoded colour).
#[derive(Default)]
pub struct Canvas {
    width: usize,
    height: usize,
    px: Vec<[f32; 4]>,
}

#[inline]
fn finite2(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

#[inline]
fn lerp_stop(a: Stop, b: Stop, t: f32) -> ([f32; 3], f32) {
    let (ca, cb) = (a.color.unit(), b.color.unit());
    let t = t.clamp(0.0, 1.0);
    let c = [
        ca[0] + (cb[0] - ca[0]) * t,
        ca[1] + (cb[1] - ca[1]) * t,
        ca[2] + (cb[2] - ca[2]) * t,
    ];
    (c, a.alpha + (b.alpha - a.alpha) * t)
}

/// Distance from `p` to segment `a`-`b`.
#[inline]
fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 > 0.0 { ((p - a).dot(ab) / len2).clamp(0.0, 1.0) } else { 0.0 };
    p.distance(a + ab * t)
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, px: vec![[0.0; 4]; width * height] }
    }

    /// Premultiplied RGBA at (x,y).
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.px[y * self.width + x]
    }

    /// Blend one premultiplied-to-be sample into pixel `idx`.
    #[inline]
    fn blend_px(&mut self, idx: usize, rgb: [f32; 3], a: f32, blend: Blend) {
        if a <= 0.0 {
            return;
        }
        let a = a.min(1.0);
        let d = &mut self.px[idx];
        match blend {
            Blend::Normal => {
                let inv = 1.0 - a;
                for k in 0..3 {
                    d[k] = rgb[k] * a + d[k] * inv;
                }
                d[3] = a + d[3] * inv;
            }
            Blend::Additive => {
                for k in 0..3 {
                    d[k] = (d[k] + rgb[k] * a).min(1.0);
                }
                d[3] = (d[3] + a).min(1.0);
            }
            Blend::Cutout => {
                let keep = 1.0 - a;
                for v in d.iter_mut() {
                    *v *= keep;
                }
            }
        }
    }

    /// Clamp a float box to pixel indices; None when fully off-surface.
    fn pixel_box(&self, min: Vec2, max: Vec2) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x0 = min.x.floor().max(0.0);
        let y0 = min.y.floor().max(0.0);
        let x1 = max.x.ceil().min(self.width as f32 - 1.0);
        let y1 = max.y.ceil().min(self.height as f32 - 1.0);
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }

    /// Shared path for lines/polylines: coverage from the nearest segment.
    fn stroke_segments(&mut self, points: &[Vec2], width: f32, color: Rgb, style: Style) {
        if points.is_empty() || !width.is_finite() || width <= 0.0 || !points.iter().all(|p| finite2(*p)) {
            trace!(n = points.len(), width, "skipping stroke with invalid geometry");
            return;
        }
        let half = width * 0.5;
        let (mut lo, mut hi) = (points[0], points[0]);
        for p in points {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
        let pad = Vec2::splat(half + 1.0);
        let Some((x0, y0, x1, y1)) = self.pixel_box(lo - pad, hi + pad) else { return };
        let rgb = color.unit();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let d = if points.len() == 1 {
                    c.distance(points[0])
                } else {
                    points
                        .windows(2)
                        .map(|s| segment_distance(c, s[0], s[1]))
                        .fold(f32::INFINITY, f32::min)
                };
                let cov = (half + 0.5 - d).clamp(0.0, 1.0);
                if cov > 0.0 {
                    self.blend_px(y * self.width + x, rgb, cov * style.alpha, style.blend);
                }
            }
        }
    }

    /// Blend this layer over `frame` in linear light.
    /// Returns false (and leaves `frame` untouched) on a size mismatch.
    pub fn composite_onto(&self, frame: &mut FrameBuffer, blend: Blend, lut: &GammaLut) -> bool {
        if frame.width != self.width || frame.height != self.height {
            trace!(
                layer = ?(self.width, self.height),
                frame = ?(frame.width, frame.height),
                "layer/frame size mismatch; skipping composite"
            );
            return false;
        }
        for (dst, src) in frame.pixels.iter_mut().zip(&self.px) {
            let a = src[3];
            if a <= 0.0 && src[0] <= 0.0 && src[1] <= 0.0 && src[2] <= 0.0 {
                continue;
            }
            let d = lut.decode(*dst);
            let mut out = [0.0f32; 3];
            for k in 0..3 {
                // Un-premultiply, move to linear, premultiply again.
                let c = if a > 0.0 { src[k] / a } else { src[k] };
                let lin = lut.srgb_unit_to_linear(c);
                out[k] = match blend {
                    Blend::Normal => lin * a + d[k] * (1.0 - a),
                    Blend::Additive => d[k] + lin * a,
                    Blend::Cutout => d[k] * (1.0 - a),
                };
            }
            *dst = lut.encode(out);
        }
        true
    }
}

impl Surface for Canvas {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Drop the old buffer and start transparent at the new size.
    fn resize(&mut self, width: usize, height: usize) {
        *self = Canvas::new(width, height);
    }

    fn clear(&mut self) {
        self.px.fill([0.0; 4]);
    }

    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Rgb, style: Style) {
        if !finite2(min) || !finite2(max) {
            trace!(?min, ?max, "skipping rect with invalid geometry");
            return;
        }
        // Pixels whose centres fall inside [min, max).
        let Some((x0, y0, x1, y1)) = self.pixel_box(min, max) else { return };
        let rgb = color.unit();
        for y in y0..=y1 {
            let yc = y as f32 + 0.5;
            if yc < min.y || yc >= max.y {
                continue;
            }
            for x in x0..=x1 {
                let xc = x as f32 + 0.5;
                if xc >= min.x && xc < max.x {
                    self.blend_px(y * self.width + x, rgb, style.alpha, style.blend);
                }
            }
        }
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, style: Style) {
        if !finite2(center) || !radius.is_finite() || radius <= 0.0 {
            trace!(?center, radius, "skipping circle with invalid geometry");
            return;
        }
        let pad = Vec2::splat(radius + 1.0);
        let Some((x0, y0, x1, y1)) = self.pixel_box(center - pad, center + pad) else { return };
        let rgb = color.unit();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                let cov = (radius + 0.5 - d).clamp(0.0, 1.0);
                if cov > 0.0 {
                    self.blend_px(y * self.width + x, rgb, cov * style.alpha, style.blend);
                }
            }
        }
    }

    fn fill_path(&mut self, points: &[Vec2], paint: VerticalGradient, style: Style) {
        if points.len() < 3
            || !points.iter().all(|p| finite2(*p))
            || !(paint.y0.is_finite() && paint.y1.is_finite())
        {
            trace!(n = points.len(), "skipping path with invalid geometry");
            return;
        }
        let (mut lo, mut hi) = (points[0], points[0]);
        for p in points {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
        let Some((x0, y0, x1, y1)) = self.pixel_box(lo, hi) else { return };
        let span = paint.y1 - paint.y0;
        let mut xs: Vec<f32> = Vec::with_capacity(8);
        for y in y0..=y1 {
            let yc = y as f32 + 0.5;
            // Even-odd scanline crossings at the pixel-centre row.
            xs.clear();
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                if (a.y <= yc) != (b.y <= yc) {
                    xs.push(a.x + (yc - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            xs.sort_by(f32::total_cmp);
            let t = if span.abs() > f32::EPSILON { (yc - paint.y0) / span } else { 0.0 };
            let (rgb, a) = lerp_stop(paint.top, paint.bottom, t);
            for pair in xs.chunks_exact(2) {
                let from = (pair[0] - 0.5).ceil().max(x0 as f32) as usize;
                let to = (pair[1] - 0.5).floor().min(x1 as f32);
                if to < from as f32 {
                    continue;
                }
                for x in from..=to as usize {
                    self.blend_px(y * self.width + x, rgb, a * style.alpha, style.blend);
                }
            }
        }
    }

    fn fill_pattern(&mut self, tile: &GrayImage, style: Style) {
        let (tw, th) = tile.dimensions();
        if tw == 0 || th == 0 {
            trace!("skipping empty pattern tile");
            return;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                let v = tile.get_pixel(x as u32 % tw, y as u32 % th).0[0] as f32 / 255.0;
                self.blend_px(y * self.width + x, [v, v, v], style.alpha, style.blend);
            }
        }
    }

    fn fill_radial(&mut self, paint: RadialGradient, style: Style) {
        if !finite2(paint.center) || !(paint.r0.is_finite() && paint.r1.is_finite()) {
            trace!(center = ?paint.center, "skipping radial gradient with invalid geometry");
            return;
        }
        let span = paint.r1 - paint.r0;
        for y in 0..self.height {
            for x in 0..self.width {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(paint.center);
                let t = if span > f32::EPSILON {
                    (d - paint.r0) / span
                } else if d >= paint.r0 {
                    1.0
                } else {
                    0.0
                };
                let (rgb, a) = lerp_stop(paint.inner, paint.outer, t);
                self.blend_px(y * self.width + x, rgb, a * style.alpha, style.blend);
            }
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgb, style: Style) {
        self.stroke_segments(&[from, to], width, color, style);
    }

    fn stroke_path(&mut self, points: &[Vec2], width: f32, color: Rgb, style: Style) {
        self.stroke_segments(points, width, color, style);
    }

    fn cut_out(&mut self, mask: &Mask) {
        if mask.width != self.width || mask.height != self.height {
            trace!("mask size mismatch; skipping cut-out");
            return;
        }
        for (i, &m) in mask.alpha.iter().enumerate() {
            self.blend_px(i, [0.0; 3], m, Blend::Cutout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::hex(0xFF_00_00);

    #[test]
    fn circle_covers_center_not_corner() {
        let mut c = Canvas::new(20, 20);
        c.fill_circle(Vec2::new(10.0, 10.0), 4.0, RED, Style::normal(1.0));
        assert_eq!(c.pixel(10, 10), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(c.pixel(0, 0)[3], 0.0);
    }

    #[test]
    fn non_finite_geometry_is_skipped() {
        let mut c = Canvas::new(8, 8);
        c.fill_circle(Vec2::new(f32::NAN, 1.0), 3.0, RED, Style::normal(1.0));
        c.stroke_line(Vec2::ZERO, Vec2::new(f32::INFINITY, 0.0), 2.0, RED, Style::normal(1.0));
        c.fill_radial(
            RadialGradient {
                center: Vec2::new(4.0, f32::NAN),
                r0: 0.0,
                r1: 4.0,
                inner: Stop::new(RED, 1.0),
                outer: Stop::new(RED, 1.0),
            },
            Style::normal(1.0),
        );
        assert!(c.px.iter().all(|p| p[3] == 0.0));
        // The canvas still works afterwards.
        c.fill_circle(Vec2::new(4.0, 4.0), 2.0, RED, Style::normal(1.0));
        assert!(c.pixel(4, 4)[3] > 0.9);
    }

    #[test]
    fn additive_brightens_instead_of_occluding() {
        let mut c = Canvas::new(4, 4);
        let dim = Rgb::hex(0x80_40_00);
        c.fill_circle(Vec2::new(2.0, 2.0), 3.0, dim, Style::additive(0.5));
        let once = c.pixel(2, 2);
        c.fill_circle(Vec2::new(2.0, 2.0), 3.0, dim, Style::additive(0.5));
        let twice = c.pixel(2, 2);
        assert!(twice[0] > once[0]);
        assert!((twice[0] - 2.0 * once[0]).abs() < 1e-5);
    }

    #[test]
    fn cutout_clears_masked_pixels() {
        let mut c = Canvas::new(3, 1);
        c.fill_pattern(&GrayImage::from_pixel(1, 1, image::Luma([255])), Style::normal(1.0));
        let mut m = Mask::fogged(3, 1);
        m.alpha[1] = 1.0;
        m.alpha[2] = 0.5;
        c.cut_out(&m);
        assert_eq!(c.pixel(0, 0)[3], 1.0);
        assert_eq!(c.pixel(1, 0), [0.0; 4]);
        assert!((c.pixel(2, 0)[3] - 0.5).abs() < 1e-6);
        assert!((c.pixel(2, 0)[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn path_fill_uses_vertical_gradient() {
        let mut c = Canvas::new(10, 10);
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0), Vec2::new(0.0, 10.0)];
        let paint = VerticalGradient {
            y0: 0.0,
            y1: 10.0,
            top: Stop::new(Rgb::WHITE, 1.0),
            bottom: Stop::new(Rgb::hex(0x00_00_00), 1.0),
        };
        c.fill_path(&pts, paint, Style::normal(1.0));
        let top = c.pixel(5, 0)[0];
        let bottom = c.pixel(5, 9)[0];
        assert!(top > bottom);
        assert_eq!(c.pixel(0, 5)[3], 1.0);
        assert_eq!(c.pixel(9, 5)[3], 1.0);
    }

    #[test]
    fn rounded_line_has_round_caps() {
        let mut c = Canvas::new(30, 10);
        c.stroke_line(Vec2::new(10.0, 5.0), Vec2::new(20.0, 5.0), 6.0, RED, Style::normal(1.0));
        assert_eq!(c.pixel(15, 5)[3], 1.0);
        assert!(c.pixel(8, 5)[3] > 0.9); // inside the left cap
        assert_eq!(c.pixel(2, 5)[3], 0.0);
        assert_eq!(c.pixel(15, 0)[3], 0.0);
    }

    #[test]
    fn composite_normal_and_mismatch() {
        let lut = GammaLut::new();
        let mut c = Canvas::new(2, 1);
        c.fill_pattern(&GrayImage::from_pixel(1, 1, image::Luma([255])), Style::normal(1.0));
        let mut frame = FrameBuffer::new(2, 1);
        assert!(c.composite_onto(&mut frame, Blend::Normal, &lut));
        assert_eq!(frame.pixels[0], 0x00_FF_FF_FF);

        let mut other = FrameBuffer::new(3, 1);
        assert!(!c.composite_onto(&mut other, Blend::Normal, &lut));
        assert_eq!(other.pixels, vec![0; 3]);
    }

    #[test]
    fn composite_cutout_punches_through_frame() {
        let lut = GammaLut::new();
        let mut c = Canvas::new(2, 1);
        c.fill_rect(Vec2::ZERO, Vec2::new(1.0, 1.0), Rgb::WHITE, Style::normal(1.0));
        let mut frame = FrameBuffer::new(2, 1);
        frame.fill(0x00_FF_FF_FF);
        assert!(c.composite_onto(&mut frame, Blend::Cutout, &lut));
        assert_eq!(frame.pixels, vec![0, 0x00_FF_FF_FF]);
    }

    #[test]
    fn composite_transparent_layer_is_noop() {
        let lut = GammaLut::new();
        let c = Canvas::new(2, 2);
        let mut frame = FrameBuffer::new(2, 2);
        frame.fill(0x00_12_34_56);
        c.composite_onto(&mut frame, Blend::Additive, &lut);
        assert!(frame.pixels.iter().all(|&p| p == 0x00_12_34_56));
    }
}
