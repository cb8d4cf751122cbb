//! Draw primitives every effect renders through.
//!
//! Simulators never touch pixels: they describe shapes and paints on a
//! `Surface`. `raster::Canvas` turns those calls into pixels; `Recorder`
//! keeps them as a list so tests can inspect what a frame drew.

use crate::types::{Mask, Rgb};
use glam::Vec2;
use image::GrayImage;

/// How a draw call combines with what is already on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Blend {
    /// Source-over.
    #[default]
    Normal,
    /// Destination-out: the source's alpha removes coverage.
    Cutout,
    /// Lighter: colours add and saturate.
    Additive,
}

/// Compositing mode and global alpha for one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    pub blend: Blend,
    pub alpha: f32,
}

impl Style {
    pub const fn normal(alpha: f32) -> Self {
        Self { blend: Blend::Normal, alpha }
    }

    pub const fn additive(alpha: f32) -> Self {
        Self { blend: Blend::Additive, alpha }
    }
}

/// Colour and alpha at one gradient end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stop {
    pub color: Rgb,
    pub alpha: f32,
}

impl Stop {
    pub const fn new(color: Rgb, alpha: f32) -> Self {
        Self { color, alpha }
    }
}

/// Linear gradient from `top` at `y0` to `bottom` at `y1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerticalGradient {
    pub y0: f32,
    pub y1: f32,
    pub top: Stop,
    pub bottom: Stop,
}

/// Radial gradient: `inner` inside `r0`, `outer` beyond `r1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadialGradient {
    pub center: Vec2,
    pub r0: f32,
    pub r1: f32,
    pub inner: Stop,
    pub outer: Stop,
}

/// A render target for one effect layer.
pub trait Surface {
    fn size(&self) -> (usize, usize);

    /// Reallocate at a new size; previous content is discarded.
    fn resize(&mut self, width: usize, height: usize);

    /// Make the whole surface transparent.
    fn clear(&mut self);

    /// Solid axis-aligned rectangle from `min` to `max`.
    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Rgb, style: Style);

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, style: Style);

    /// Fill the closed polygon through `points` with a vertical gradient.
    fn fill_path(&mut self, points: &[Vec2], paint: VerticalGradient, style: Style);

    /// Tile `tile` (grey values) across the whole surface.
    fn fill_pattern(&mut self, tile: &GrayImage, style: Style);

    /// Cover the whole surface with a radial gradient.
    fn fill_radial(&mut self, paint: RadialGradient, style: Style);

    /// Round-capped line.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgb, style: Style);

    /// Open polyline through `points`, round joins.
    fn stroke_path(&mut self, points: &[Vec2], width: f32, color: Rgb, style: Style);

    /// Remove coverage wherever `mask` is set (destination-out).
    fn cut_out(&mut self, mask: &Mask);
}

/// A recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Clear,
    Rect { min: Vec2, max: Vec2, color: Rgb, style: Style },
    Circle { center: Vec2, radius: f32, color: Rgb, style: Style },
    Path { points: Vec<Vec2>, paint: VerticalGradient, style: Style },
    Pattern { tile: (u32, u32), style: Style },
    Radial { paint: RadialGradient, style: Style },
    Line { from: Vec2, to: Vec2, width: f32, color: Rgb, style: Style },
    Polyline { points: Vec<Vec2>, width: f32, color: Rgb, style: Style },
    CutOut { erased: f32 },
}

/// `Surface` that just remembers what it was asked to draw.
#[derive(Default)]
pub struct Recorder {
    pub width: usize,
    pub height: usize,
    pub ops: Vec<Op>,
}

impl Recorder {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, ops: Vec::new() }
    }

    pub fn circles(&self) -> impl Iterator<Item = &Op> {
        self.ops.iter().filter(|op| matches!(op, Op::Circle { .. }))
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}

impl Surface for Recorder {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: usize, height: usize) {
        *self = Recorder::new(width, height);
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(Op::Clear);
    }

    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Rgb, style: Style) {
        self.ops.push(Op::Rect { min, max, color, style });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, style: Style) {
        self.ops.push(Op::Circle { center, radius, color, style });
    }

    fn fill_path(&mut self, points: &[Vec2], paint: VerticalGradient, style: Style) {
        self.ops.push(Op::Path { points: points.to_vec(), paint, style });
    }

    fn fill_pattern(&mut self, tile: &GrayImage, style: Style) {
        self.ops.push(Op::Pattern { tile: tile.dimensions(), style });
    }

    fn fill_radial(&mut self, paint: RadialGradient, style: Style) {
        self.ops.push(Op::Radial { paint, style });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgb, style: Style) {
        self.ops.push(Op::Line { from, to, width, color, style });
    }

    fn stroke_path(&mut self, points: &[Vec2], width: f32, color: Rgb, style: Style) {
        self.ops.push(Op::Polyline { points: points.to_vec(), width, color, style });
    }

    fn cut_out(&mut self, mask: &Mask) {
        self.ops.push(Op::CutOut { erased: mask.erased_fraction() });
    }
}
