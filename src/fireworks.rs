// Fireworks: glowing bursts that follow a target point.
// Visual outcomes:
// - While active, a burst of sparks pops every few frames near the target,
//   trailing behind it when the target moves quickly.
// - Each burst has one colour family: sparks start at the mid hue, flare
//   toward the hot core colour, then cool through mid to the outer hue.
// - Sparks leave short fading tails and have a soft halo; overlaps brighten.

use crate::config::{FireworkConfig, LayerConfig};
use crate::particle::{Fate, Particle, Pool, Pooled, SpawnParams, Trail};
use crate::scheduler::FrameInput;
use crate::surface::{Style, Surface};
use crate::types::Rgb;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::debug;

/// Positions of history kept per spark.
pub const TRAIL_LEN: usize = 8;

/// Upper bound on live sparks; emission pauses while the pool is full.
const MAX_SPARKS: usize = 2048;

/// Remaining-life fraction where the colour is exactly `mid`.
const MID_AT: f32 = 0.6;
const FRESH_SPAN: f32 = 0.4; // 1.0 - MID_AT

/// Core/mid/outer colours shared by a whole burst group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub core: Rgb,
    pub mid: Rgb,
    pub outer: Rgb,
}

impl Palette {
    pub const fn new(core: u32, mid: u32, outer: u32) -> Self {
        Self { core: Rgb::hex(core), mid: Rgb::hex(mid), outer: Rgb::hex(outer) }
    }

    /// Gold, rose, cyan, violet, lime.
    pub fn defaults() -> Vec<Palette> {
        vec![
            Palette::new(0xFF_F8_E0, 0xFF_C0_40, 0xFF_50_20),
            Palette::new(0xFF_E8_F0, 0xFF_70_A0, 0xA0_20_60),
            Palette::new(0xE8_FF_FF, 0x40_D0_FF, 0x20_50_C0),
            Palette::new(0xF4_E8_FF, 0xB0_70_FF, 0x50_20_A0),
            Palette::new(0xF0_FF_E0, 0xA0_FF_50, 0x30_A0_40),
        ]
    }

    /// Colour for remaining-life fraction `life01` (1.0 = fresh).
    /// Fresh 40%: mid at 1.0 moving toward core. Remaining 60%: mid at 0.6
    /// fading to outer at 0.
    pub fn color_at(&self, life01: f32) -> Rgb {
        let t = life01.clamp(0.0, 1.0);
        if t > MID_AT {
            Rgb::lerp(self.core, self.mid, (t - MID_AT) / FRESH_SPAN)
        } else {
            Rgb::lerp(self.outer, self.mid, t / MID_AT)
        }
    }
}

/// Physics variant of a spark. Palette roles share the names but not the meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    /// Fast, small, short-lived, ballistic.
    Core,
    /// Medium speed; falls under gravity.
    Mid,
    /// Slow, large, long-lived; drag plus light gravity.
    Outer,
}

#[derive(Clone, Debug)]
pub struct Spark {
    pub p: Particle,
    pub layer: Layer,
    /// Index into the simulator's palette table.
    pub palette: usize,
    pub trail: Trail<TRAIL_LEN>,
}

impl Pooled for Spark {
    fn particle(&self) -> &Particle {
        &self.p
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FireworkStats {
    pub sparks: usize,
    /// A burst group was emitted this frame.
    pub emitted: bool,
    /// Sparks that burned out this frame.
    pub expired: usize,
}

pub struct FireworkSimulator {
    cfg: FireworkConfig,
    rng: StdRng,
    sparks: Pool<Spark>,
    emit_point: Option<Vec2>, // smoothed emission point
    since_emit: u32,          // active frames since the last group
    trail_buf: Vec<Vec2>,
}

impl FireworkSimulator {
    pub fn new(cfg: FireworkConfig, seed: u64) -> Self {
        Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
            sparks: Pool::with_target(MAX_SPARKS),
            emit_point: None,
            since_emit: 0,
            trail_buf: Vec::with_capacity(TRAIL_LEN + 1),
        }
    }

    /// Size changes just drop every spark; there is no buffer to rebuild.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.reset();
        debug!(width, height, "fireworks cleared for new size");
    }

    pub fn reset(&mut self) {
        self.sparks.clear();
        self.emit_point = None;
        self.since_emit = 0;
    }

    pub fn sparks(&self) -> impl Iterator<Item = &Spark> {
        self.sparks.iter()
    }

    pub fn palettes(&self) -> &[Palette] {
        &self.cfg.palettes
    }

    pub fn emit_point(&self) -> Option<Vec2> {
        self.emit_point
    }

    pub fn is_idle(&self) -> bool {
        self.sparks.is_empty()
    }

    fn layer_cfg(&self, layer: Layer) -> &LayerConfig {
        match layer {
            Layer::Core => &self.cfg.core,
            Layer::Mid => &self.cfg.mid,
            Layer::Outer => &self.cfg.outer,
        }
    }

    fn pick_layer(&mut self) -> Layer {
        let (c, m, o) = (self.cfg.core.weight, self.cfg.mid.weight, self.cfg.outer.weight);
        let roll = self.rng.r#gen::<f32>() * (c + m + o);
        if roll < c {
            Layer::Core
        } else if roll < c + m {
            Layer::Mid
        } else {
            Layer::Outer
        }
    }

    /// Spawn one burst group around `origin`, all sharing one palette.
    fn emit_group(&mut self, origin: Vec2) {
        let palette = self.rng.gen_range(0..self.cfg.palettes.len().max(1));
        for _ in 0..self.cfg.group_size {
            let layer = self.pick_layer();
            let lc = self.layer_cfg(layer);
            let params = SpawnParams {
                speed: lc.speed.clone(),
                angle: Some(0.0..TAU),
                size: lc.size.clone(),
                life: lc.life.clone(),
                jitter: Vec2::ZERO,
            };
            let p = Particle::spawn(origin, &params, &mut self.rng);
            self.sparks.push(Spark { p, layer, palette, trail: Trail::default() });
        }
    }

    pub fn step<S: Surface>(&mut self, input: &FrameInput, surface: &mut S) -> FireworkStats {
        let mut stats = FireworkStats::default();

        // Emission on a fixed cadence, from a point that chases the target.
        match (input.fireworks_active, input.target_point) {
            (true, Some(target)) if target.is_finite() => {
                if self.since_emit == 0 && self.sparks.len() + self.cfg.group_size <= self.sparks.target() {
                    let point = match self.emit_point {
                        Some(prev) => prev + (target - prev) * self.cfg.smoothing,
                        None => target,
                    };
                    self.emit_point = Some(point);
                    self.emit_group(point);
                    stats.emitted = true;
                }
                self.since_emit = (self.since_emit + 1) % self.cfg.emit_interval.max(1);
            }
            _ => {
                self.emit_point = None;
                self.since_emit = 0;
            }
        }

        // Per-layer physics through one code path: gravity and drag come from the layer.
        let dt = input.dt;
        let (core, mid, outer) = (&self.cfg.core, &self.cfg.mid, &self.cfg.outer);
        let report = self.sparks.step_all(|s| {
            let lc = match s.layer {
                Layer::Core => core,
                Layer::Mid => mid,
                Layer::Outer => outer,
            };
            s.trail.push(s.p.pos);
            if lc.drag != 1.0 {
                s.p.vel *= lc.drag.powf(dt);
            }
            s.p.vel.y += lc.gravity * dt;
            s.p.integrate(dt);
            if s.p.age(dt) { Fate::Live } else { Fate::Expired }
        });
        stats.expired = report.removed;

        // Tail, halo, head.
        for s in self.sparks.iter() {
            let t = s.p.life01();
            let Some(palette) = self.cfg.palettes.get(s.palette) else { continue };
            let color = palette.color_at(t);

            self.trail_buf.clear();
            self.trail_buf.extend(s.trail.iter());
            self.trail_buf.push(s.p.pos);
            if self.trail_buf.len() > 1 {
                surface.stroke_path(
                    &self.trail_buf,
                    self.cfg.trail_width,
                    color,
                    Style::additive(self.cfg.trail_alpha * t),
                );
            }
            surface.fill_circle(
                s.p.pos,
                s.p.size * self.cfg.halo_scale,
                color,
                Style::additive(self.cfg.halo_alpha * t),
            );
            surface.fill_circle(s.p.pos, s.p.size, color, Style::additive(t.max(self.cfg.min_head_alpha)));
        }

        stats.sparks = self.sparks.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Blend, Op, Recorder};
    use proptest::prelude::*;

    fn active_at(x: f32, y: f32) -> FrameInput {
        FrameInput { fireworks_active: true, target_point: Some(Vec2::new(x, y)), ..FrameInput::default() }
    }

    fn palette() -> Palette {
        Palette::new(0xFF_FF_FF, 0x80_80_00, 0x00_00_FF)
    }

    #[test]
    fn color_boundaries() {
        let p = palette();
        assert_eq!(p.color_at(1.0), p.mid);
        assert_eq!(p.color_at(0.6), p.mid);
        assert_eq!(p.color_at(0.0), p.outer);
        // Just above the split the colour is (almost) core.
        let near_core = p.color_at(0.600_01);
        assert!(near_core.r > 250 && near_core.b > 250);
        // Approaching zero converges on outer.
        let c = p.color_at(0.01);
        assert!(c.b > 250 && c.r < 5);
    }

    #[test]
    fn emits_every_fourth_active_frame() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 5);
        let mut rec = Recorder::new(200, 200);
        let emitted: Vec<bool> = (0..9).map(|_| s.step(&active_at(100.0, 100.0), &mut rec).emitted).collect();
        assert_eq!(emitted, vec![true, false, false, false, true, false, false, false, true]);
    }

    #[test]
    fn group_has_fixed_size_and_one_palette() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 8);
        let mut rec = Recorder::new(200, 200);
        let st = s.step(&active_at(50.0, 50.0), &mut rec);
        assert_eq!(st.sparks, 18);
        let first = s.sparks().next().unwrap().palette;
        assert!(s.sparks().all(|sp| sp.palette == first));
        assert!(first < s.palettes().len());
    }

    #[test]
    fn emission_point_moves_halfway() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 2);
        let mut rec = Recorder::new(500, 500);
        s.step(&active_at(0.0, 0.0), &mut rec);
        assert_eq!(s.emit_point(), Some(Vec2::ZERO));
        for _ in 0..3 {
            s.step(&active_at(100.0, 40.0), &mut rec);
        }
        // Only the cadence frame moves the tracked point.
        assert_eq!(s.emit_point(), Some(Vec2::ZERO));
        s.step(&active_at(100.0, 40.0), &mut rec);
        assert_eq!(s.emit_point(), Some(Vec2::new(50.0, 20.0)));
    }

    #[test]
    fn no_target_no_emission() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 2);
        let mut rec = Recorder::new(100, 100);
        let input = FrameInput { fireworks_active: true, ..FrameInput::default() };
        assert!(!s.step(&input, &mut rec).emitted);
        assert!(s.is_idle());
    }

    #[test]
    fn layers_follow_their_physics() {
        let mut cfg = FireworkConfig::default();
        cfg.group_size = 0;
        let mut s = FireworkSimulator::new(cfg, 4);
        let spark = |layer| Spark {
            p: Particle { pos: Vec2::ZERO, vel: Vec2::new(2.0, 0.0), life: 100.0, max_life: 100.0, size: 1.0 },
            layer,
            palette: 0,
            trail: Trail::default(),
        };
        s.sparks.push(spark(Layer::Core));
        s.sparks.push(spark(Layer::Mid));
        s.sparks.push(spark(Layer::Outer));
        let mut rec = Recorder::new(100, 100);
        for _ in 0..10 {
            s.step(&FrameInput::default(), &mut rec);
        }
        let by = |l| s.sparks().find(|sp| sp.layer == l).unwrap().p.clone();
        let (core, mid, outer) = (by(Layer::Core), by(Layer::Mid), by(Layer::Outer));
        assert_eq!(core.vel, Vec2::new(2.0, 0.0));
        assert_eq!(mid.vel.x, 2.0);
        assert!(mid.vel.y > 0.0);
        assert!(outer.vel.x < 2.0);
        assert!(outer.vel.y > 0.0 && outer.vel.y < mid.vel.y);
        assert_eq!(s.sparks().next().unwrap().trail.len(), TRAIL_LEN);
    }

    #[test]
    fn sparks_die_and_are_removed() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 6);
        let mut rec = Recorder::new(100, 100);
        let first = s.step(&active_at(10.0, 10.0), &mut rec);
        let mut expired = first.expired;
        for _ in 0..200 {
            let st = s.step(&FrameInput::default(), &mut rec);
            expired += st.expired;
            assert!(s.sparks().all(|sp| sp.p.life > 0.0 && sp.p.life <= sp.p.max_life));
        }
        assert!(s.is_idle());
        assert_eq!(expired, FireworkConfig::default().group_size);
    }

    #[test]
    fn render_is_trail_halo_head_additive() {
        let mut s = FireworkSimulator::new(FireworkConfig::default(), 3);
        let mut rec = Recorder::new(100, 100);
        s.step(&active_at(50.0, 50.0), &mut rec);
        rec.ops.clear();
        s.step(&FrameInput::default(), &mut rec);
        assert!(matches!(rec.ops[0], Op::Polyline { .. }));
        let Op::Circle { radius: halo, .. } = rec.ops[1] else { panic!("expected halo") };
        let Op::Circle { radius: head, style, .. } = rec.ops[2] else { panic!("expected head") };
        assert!(halo > head);
        assert_eq!(style.blend, Blend::Additive);
        assert!(style.alpha >= FireworkConfig::default().min_head_alpha);
    }

    proptest! {
        #[test]
        fn color_stays_inside_palette(t in 0.0f32..=1.0, idx in 0usize..5) {
            let p = Palette::defaults()[idx];
            let c = p.color_at(t);
            let within = |v: u8, a: u8, b: u8, d: u8| v >= a.min(b).min(d) && v <= a.max(b).max(d);
            prop_assert!(within(c.r, p.core.r, p.mid.r, p.outer.r));
            prop_assert!(within(c.g, p.core.g, p.mid.g, p.outer.g));
            prop_assert!(within(c.b, p.core.b, p.mid.b, p.outer.b));
        }
    }
}
