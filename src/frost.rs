// Frost: a fogged-glass layer you wipe clear with your finger.
// Visual outcomes:
// - The whole view sits behind a cold, slightly grainy white haze with bluish edges.
// - Dragging the drawing point wipes a clean, round-ended stroke through the haze.
// - When a stroke ends, sometimes a melt drop runs down from its end, leaving a faint trail.
// - Wiped areas stay clear until the layer is reset or the window is resized.

use crate::config::FrostConfig;
use crate::particle::{Fate, Particle, Pool, SpawnParams};
use crate::scheduler::FrameInput;
use crate::surface::{RadialGradient, Stop, Style, Surface};
use crate::types::Mask;
use glam::Vec2;
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Upper bound on concurrently running drips.
const MAX_DRIPS: usize = 64;

/// Paint a round-capped segment into the mask with anti-aliased edges.
/// `alpha` = 1.0 fully erases the covered pixels.
/// Visual: a clear streak appears in the frost along the segment.
pub fn erase_capsule(mask: &mut Mask, from: Vec2, to: Vec2, radius: f32, alpha: f32) {
    if mask.width == 0 || mask.height == 0 || !(from.is_finite() && to.is_finite() && radius.is_finite()) {
        return;
    }
    let lo = from.min(to) - Vec2::splat(radius + 1.0);
    let hi = from.max(to) + Vec2::splat(radius + 1.0);
    let x0 = lo.x.floor().max(0.0) as usize;
    let y0 = lo.y.floor().max(0.0) as usize;
    let x1 = hi.x.ceil().min(mask.width as f32 - 1.0);
    let y1 = hi.y.ceil().min(mask.height as f32 - 1.0);
    if x1 < 0.0 || y1 < 0.0 {
        return;
    }
    let ab = to - from;
    let len2 = ab.length_squared();
    for y in y0..=y1 as usize {
        for x in x0..=x1 as usize {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let t = if len2 > 0.0 { ((p - from).dot(ab) / len2).clamp(0.0, 1.0) } else { 0.0 };
            let d = p.distance(from + ab * t);
            let cov = (radius + 0.5 - d).clamp(0.0, 1.0);
            if cov > 0.0 {
                mask.accumulate(y * mask.width + x, cov * alpha);
            }
        }
    }
}

/// Build the fine grain tile once. Visual: faint static noise over the haze.
pub fn noise_tile(size: u32, rng: &mut impl Rng) -> GrayImage {
    GrayImage::from_fn(size, size, |_, _| Luma([rng.r#gen::<u8>()]))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrostStats {
    pub drips: usize,
    /// Gesture-start dots stamped this frame (0 or 1).
    pub dots: usize,
    /// Connecting segments stroked this frame (0 or 1).
    pub segments: usize,
    pub drip_spawned: bool,
    /// Drips that ran off the bottom or dried up this frame.
    pub drips_expired: usize,
}

pub struct FrostSimulator {
    cfg: FrostConfig,
    rng: StdRng,
    width: f32,
    height: f32,
    mask: Option<Mask>,        // None until the first non-empty resize
    noise: GrayImage,
    last_point: Option<Vec2>,  // previous point of the current gesture
    drips: Pool<Particle>,
    drip_spawn: SpawnParams,
}

impl FrostSimulator {
    pub fn new(cfg: FrostConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = noise_tile(cfg.noise_tile, &mut rng);
        let drip_spawn = SpawnParams {
            speed: cfg.drip_speed.clone(),
            angle: None,
            size: cfg.drip_size.clone(),
            life: cfg.drip_life.clone(),
            jitter: Vec2::new(cfg.drip_jitter, 0.0),
        };
        Self {
            cfg,
            rng,
            width: 0.0,
            height: 0.0,
            mask: None,
            noise,
            last_point: None,
            drips: Pool::with_target(MAX_DRIPS),
            drip_spawn,
        }
    }

    /// New fully fogged mask at the new size; drips and stroke state cleared.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width as f32;
        self.height = height as f32;
        self.mask = (width > 0 && height > 0).then(|| Mask::fogged(width, height));
        self.drips.clear();
        self.last_point = None;
        debug!(width, height, "frost mask reinitialised");
    }

    /// Fog everything back in.
    pub fn reset(&mut self) {
        if let Some(mask) = &mut self.mask {
            mask.reset();
        }
        self.drips.clear();
        self.last_point = None;
    }

    /// Forget the previous stroke point; the next drawing point starts a new gesture.
    pub fn end_gesture(&mut self) {
        self.last_point = None;
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn drips(&self) -> impl Iterator<Item = &Particle> {
        self.drips.iter()
    }

    pub fn is_idle(&self) -> bool {
        self.drips.is_empty()
    }

    pub fn step<S: Surface>(&mut self, input: &FrameInput, surface: &mut S) -> FrostStats {
        let mut stats = FrostStats::default();
        let Some(mask) = &mut self.mask else {
            return stats;
        };

        // Drips already running: fall, wiggle, melt a trail.
        let (dt, height, cfg, rng) = (input.dt, self.height, &self.cfg, &mut self.rng);
        let report = self.drips.step_all(|d| {
            d.integrate(dt);
            if rng.r#gen::<f32>() < cfg.wiggle_probability {
                d.vel.x = rng.gen_range(-1.0..=1.0) * cfg.wiggle_speed;
            }
            if d.pos.y > height {
                return Fate::Expired;
            }
            erase_capsule(mask, d.pos, d.pos, d.size, cfg.drip_alpha);
            if d.age(dt) { Fate::Live } else { Fate::Expired }
        });
        stats.drips_expired = report.removed;

        // Stroke input.
        if !input.frost_active {
            self.last_point = None;
        }
        let point = if input.frost_active { input.drawing_point } else { None };
        match (point, self.last_point) {
            (Some(p), Some(prev)) => {
                erase_capsule(mask, prev, p, self.cfg.brush_width * 0.5, 1.0);
                stats.segments = 1;
            }
            (Some(p), None) => {
                erase_capsule(mask, p, p, self.cfg.brush_width * 0.5, 1.0);
                stats.dots = 1;
            }
            (None, Some(end)) => {
                // Gesture end.
                if self.drips.len() < self.drips.target()
                    && self.rng.r#gen::<f32>() < self.cfg.drip_probability
                {
                    self.drips.push(Particle::spawn(end, &self.drip_spawn, &mut self.rng));
                    stats.drip_spawned = true;
                }
            }
            _ => {}
        }
        self.last_point = point;

        // Base haze, grain, vignette, then the holes.
        let (w, h) = (self.width, self.height);
        surface.fill_rect(Vec2::ZERO, Vec2::new(w, h), self.cfg.fog_color, Style::normal(self.cfg.fog_alpha));
        surface.fill_pattern(&self.noise, Style::normal(self.cfg.noise_alpha));
        let center = Vec2::new(w, h) * 0.5;
        surface.fill_radial(
            RadialGradient {
                center,
                r0: 0.0,
                r1: center.length(),
                inner: Stop::new(self.cfg.vignette_center, self.cfg.vignette_center_alpha),
                outer: Stop::new(self.cfg.vignette_edge, self.cfg.vignette_edge_alpha),
            },
            Style::normal(1.0),
        );
        surface.cut_out(mask);

        stats.drips = self.drips.len();
        stats
    }
}
