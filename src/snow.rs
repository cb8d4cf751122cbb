// Snow: flakes flutter down and pile up along the bottom edge.
// Visual outcomes:
// - White flakes fall with a sideways sway and wrap around the left/right edges.
// - Where they land, a soft white drift grows and slumps into smooth slopes.
// - Waving at the camera (high motion score) or a drift reaching the top wipes the pile.

use crate::config::SnowConfig;
use crate::field::{HeightField, ResetCause};
use crate::particle::{Fate, Particle, Pool, Pooled, SpawnParams};
use crate::scheduler::FrameInput;
use crate::surface::{Stop, Style, Surface, VerticalGradient};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// A falling flake. `phase` offsets its sway so flakes don't move in lockstep.
#[derive(Clone, Debug)]
pub struct Flake {
    pub p: Particle,
    pub phase: f32,
}

impl Pooled for Flake {
    fn particle(&self) -> &Particle {
        &self.p
    }
}

/// A new flake somewhere in a screen-height band above the top edge.
fn make_flake(rng: &mut StdRng, spawn: &SpawnParams, width: f32, height: f32) -> Flake {
    let origin = Vec2::new(rng.gen_range(0.0..width.max(1.0)), -rng.gen_range(0.0..height.max(1.0)));
    let phase = rng.gen_range(0.0..std::f32::consts::TAU);
    Flake { p: Particle::spawn(origin, spawn, rng), phase }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SnowStats {
    pub flakes: usize,
    /// Flakes that hit the pile this frame.
    pub landed: usize,
    /// Flakes spawned to refill the pool this frame.
    pub spawned: usize,
    /// Flakes that left the pool this frame (only while inactive).
    pub expired: usize,
    pub reset: Option<ResetCause>,
}

pub struct SnowSimulator {
    cfg: SnowConfig,
    rng: StdRng,
    width: f32,
    height: f32,
    field: Option<HeightField>, // None until the first non-empty resize
    flakes: Pool<Flake>,
    spawn: SpawnParams,
    profile: Vec<Vec2>,         // reused outline buffer
}

impl SnowSimulator {
    pub fn new(cfg: SnowConfig, seed: u64) -> Self {
        let spawn = SpawnParams {
            speed: cfg.fall_speed.clone(),
            angle: None,
            size: cfg.size.clone(),
            // Flakes don't age; they are recycled on landing instead.
            life: 1.0..1.0,
            jitter: Vec2::ZERO,
        };
        Self {
            flakes: Pool::with_target(cfg.target_count),
            cfg,
            rng: StdRng::seed_from_u64(seed),
            width: 0.0,
            height: 0.0,
            field: None,
            spawn,
            profile: Vec::new(),
        }
    }

    /// Throw away every buffer and start over at the new size.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width as f32;
        self.height = height as f32;
        self.field = (width > 0 && height > 0).then(|| HeightField::new(width, height as f32));
        self.flakes.clear();
        self.profile = Vec::with_capacity(width / self.cfg.profile_stride.max(1) + 4);
        debug!(width, height, "snow buffers reinitialised");
    }

    /// Clear the pile and all flakes without changing size.
    pub fn reset(&mut self) {
        if let Some(field) = &mut self.field {
            field.reset();
        }
        self.flakes.clear();
    }

    pub fn field(&self) -> Option<&HeightField> {
        self.field.as_ref()
    }

    /// Test/tooling hook: mutable access to the pile.
    pub fn field_mut(&mut self) -> Option<&mut HeightField> {
        self.field.as_mut()
    }

    pub fn flakes(&self) -> impl Iterator<Item = &Flake> {
        self.flakes.iter()
    }

    /// Nothing left falling and the pile has melted away.
    pub fn is_idle(&self) -> bool {
        self.flakes.is_empty()
            && self.field.as_ref().is_none_or(|f| f.peak() <= self.cfg.field.decay_threshold)
    }

    /// One frame: settle the pile, draw it, top up, move flakes, land them,
    /// draw the ones still in the air.
    pub fn step<S: Surface>(&mut self, input: &FrameInput, surface: &mut S) -> SnowStats {
        let mut stats = SnowStats::default();

        // 1-2) Avalanche + decay, then any reset.
        if let Some(field) = &mut self.field {
            let overflow = field.settle(&self.cfg.field);
            let cause = if input.motion_score > self.cfg.motion_threshold {
                Some(ResetCause::Motion)
            } else if overflow {
                Some(ResetCause::Overflow)
            } else {
                None
            };
            if let Some(cause) = cause {
                field.reset();
                info!(?cause, motion = input.motion_score, "snow pile reset");
                stats.reset = Some(cause);
            }
        }

        // 3) The pile.
        self.draw_pile(surface);

        // 4) Top up while active.
        if input.snow_active && self.width > 0.0 {
            let (rng, spawn, width, height) = (&mut self.rng, &self.spawn, self.width, self.height);
            stats.spawned = self.flakes.top_up(|| make_flake(rng, spawn, width, height));
        }

        // 5-7) Move, land, recycle.
        let dt = input.dt;
        let width = self.width;
        let height = self.height;
        let active = input.snow_active;
        let cfg = &self.cfg;
        let spawn = &self.spawn;
        let rng = &mut self.rng;
        let mut field = self.field.as_mut();
        let mut landed = 0;

        let report = self.flakes.step_all(|flake| {
            let p = &mut flake.p;
            p.integrate(dt);
            p.pos.x += (p.pos.y * cfg.drift_frequency + flake.phase).sin() * cfg.drift_amplitude * dt;
            if width > 0.0 {
                if p.pos.x < 0.0 {
                    p.pos.x += width;
                } else if p.pos.x >= width {
                    p.pos.x -= width;
                }
            }

            let hit = match field.as_deref_mut() {
                Some(f) => {
                    let col = f.column(p.pos.x);
                    if p.pos.y >= f.surface_y(col) - cfg.collision_tolerance {
                        f.deposit(col, p.size * cfg.deposit_scale, cfg.deposit_radius);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if hit {
                landed += 1;
            }

            if hit || p.pos.y > height {
                if active {
                    let origin = Vec2::new(rng.gen_range(0.0..width.max(1.0)), -p.size);
                    p.recycle(origin, spawn, rng);
                    flake.phase = rng.gen_range(0.0..std::f32::consts::TAU);
                    Fate::Recycled
                } else {
                    Fate::Expired
                }
            } else {
                Fate::Live
            }
        });
        stats.landed = landed;
        stats.expired = report.removed;

        // 8) Airborne flakes only.
        let style = Style::normal(self.cfg.flake_alpha);
        for flake in self.flakes.iter() {
            let p = &flake.p;
            let ground = match &self.field {
                Some(f) => f.surface_y(f.column(p.pos.x)),
                None => self.height,
            };
            if p.pos.y < ground {
                surface.fill_circle(p.pos, p.size, self.cfg.flake_color, style);
            }
        }

        stats.flakes = self.flakes.len();
        stats
    }

    fn draw_pile<S: Surface>(&mut self, surface: &mut S) {
        let Some(field) = &self.field else { return };
        let peak = field.peak();
        if peak <= 0.0 {
            return;
        }
        let w = field.width();
        let h = self.height;
        self.profile.clear();
        for x in (0..w).step_by(self.cfg.profile_stride.max(1)) {
            self.profile.push(Vec2::new(x as f32, field.surface_y(x)));
        }
        self.profile.push(Vec2::new(w as f32, field.surface_y(w - 1)));
        self.profile.push(Vec2::new(w as f32, h));
        self.profile.push(Vec2::new(0.0, h));
        let paint = VerticalGradient {
            y0: h - peak,
            y1: h,
            top: Stop::new(self.cfg.pile_top, 1.0),
            bottom: Stop::new(self.cfg.pile_bottom, 0.95),
        };
        surface.fill_path(&self.profile, paint, Style::normal(1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Op, Recorder};

    fn input(active: bool) -> FrameInput {
        FrameInput { snow_active: active, ..FrameInput::default() }
    }

    fn sim(w: usize, h: usize) -> SnowSimulator {
        let mut s = SnowSimulator::new(SnowConfig::default(), 42);
        s.resize(w, h);
        s
    }

    #[test]
    fn uninitialised_field_is_skipped() {
        let mut s = SnowSimulator::new(SnowConfig::default(), 1);
        let mut rec = Recorder::new(0, 0);
        let stats = s.step(&input(true), &mut rec);
        assert_eq!(stats.flakes, 0);
        assert!(rec.ops.is_empty());
        assert!(s.field().is_none());
    }

    #[test]
    fn flakes_fall_and_recycle_without_a_field() {
        // Width but no height: flakes exist, the field does not.
        let mut s = SnowSimulator::new(SnowConfig { target_count: 10, ..SnowConfig::default() }, 3);
        s.width = 50.0;
        s.height = 30.0;
        let mut rec = Recorder::new(50, 30);
        for _ in 0..200 {
            s.step(&input(true), &mut rec);
        }
        assert_eq!(s.flakes().count(), 10);
        assert!(s.flakes().all(|f| f.p.pos.y <= 30.0 + 5.0));
    }

    #[test]
    fn tops_up_to_target_when_active() {
        let mut s = sim(200, 100);
        let mut rec = Recorder::new(200, 100);
        let target = SnowConfig::default().target_count;
        let stats = s.step(&input(true), &mut rec);
        assert_eq!(stats.flakes, target);
        assert_eq!(stats.spawned, target);
        // Landed flakes are recycled in place, so the pool stays full.
        for _ in 0..100 {
            let stats = s.step(&input(true), &mut rec);
            assert_eq!((stats.spawned, stats.expired), (0, 0));
            assert_eq!(stats.flakes, target);
        }
    }

    #[test]
    fn flakes_wrap_horizontally() {
        let mut s = sim(100, 100);
        s.flakes.push(Flake {
            p: Particle { pos: Vec2::new(99.9, 10.0), vel: Vec2::new(2.0, 0.0), life: 1.0, max_life: 1.0, size: 1.0 },
            phase: 0.0,
        });
        s.cfg.drift_amplitude = 0.0;
        let mut rec = Recorder::new(100, 100);
        s.step(&input(false), &mut rec);
        let x = s.flakes().next().unwrap().p.pos.x;
        assert!((x - 1.9).abs() < 1e-3, "x = {x}");
    }

    #[test]
    fn landing_deposits_and_recycles() {
        let mut s = sim(100, 100);
        s.cfg.drift_amplitude = 0.0;
        s.flakes.push(Flake {
            p: Particle { pos: Vec2::new(40.0, 97.0), vel: Vec2::new(0.0, 2.0), life: 1.0, max_life: 1.0, size: 2.0 },
            phase: 0.0,
        });
        let mut rec = Recorder::new(100, 100);
        let stats = s.step(&input(false), &mut rec);
        assert_eq!(stats.landed, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.flakes, 0); // inactive: landed flakes are not respawned
        let f = s.field().unwrap();
        assert!(f.get(40) > 0.0);
        assert!(f.get(40) > f.get(44));
        // Nothing airborne was drawn.
        assert_eq!(rec.circles().count(), 0);
    }

    #[test]
    fn motion_wipes_the_pile() {
        let mut s = sim(100, 200);
        s.field_mut().unwrap().deposit(50, 20.0, 4);
        let mut rec = Recorder::new(100, 200);
        let stats = s.step(&FrameInput { motion_score: 0.9, ..FrameInput::default() }, &mut rec);
        assert_eq!(stats.reset, Some(ResetCause::Motion));
        assert_eq!(s.field().unwrap().peak(), 0.0);
        assert_eq!(rec.count(|op| matches!(op, Op::Path { .. })), 0);
    }

    #[test]
    fn pile_is_rendered_as_closed_profile() {
        let mut s = sim(40, 100);
        s.field_mut().unwrap().deposit(20, 10.0, 3);
        let mut rec = Recorder::new(40, 100);
        s.step(&input(false), &mut rec);
        let Some(Op::Path { points, paint, .. }) = rec.ops.iter().find(|op| matches!(op, Op::Path { .. })) else {
            panic!("no pile path");
        };
        assert_eq!(points.last(), Some(&Vec2::new(0.0, 100.0)));
        assert!(points.iter().any(|p| p.y < 95.0));
        assert_eq!(paint.y1, 100.0);
    }

    #[test]
    fn deactivated_snow_drains_to_idle() {
        let mut s = sim(60, 40);
        let mut rec = Recorder::new(60, 40);
        for _ in 0..50 {
            s.step(&input(true), &mut rec);
        }
        assert!(!s.is_idle());
        for _ in 0..20_000 {
            s.step(&input(false), &mut rec);
            if s.is_idle() {
                break;
            }
        }
        assert!(s.is_idle());
    }

    #[test]
    fn resize_zeroes_field() {
        let mut s = sim(100, 100);
        s.field_mut().unwrap().add(3, 9.0);
        s.resize(120, 90);
        let f = s.field().unwrap();
        assert_eq!(f.width(), 120);
        assert_eq!(f.peak(), 0.0);
        assert_eq!(s.flakes().count(), 0);
    }
}
