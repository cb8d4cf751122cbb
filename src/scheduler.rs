//! Frame scheduler: one entry point that steps every effect for a frame.
//!
//! The host loop (a window, a timer, a test) builds a [`FrameInput`] snapshot
//! and calls [`FrameScheduler::frame`]. Each effect draws into its own layer;
//! the layers are composited over the camera frame afterwards.

use crate::config::OverlayConfig;
use crate::fireworks::{FireworkSimulator, FireworkStats};
use crate::frost::{FrostSimulator, FrostStats};
use crate::gamma::GammaLut;
use crate::raster::Canvas;
use crate::snow::{SnowSimulator, SnowStats};
use crate::surface::{Blend, Surface};
use crate::types::FrameBuffer;
use glam::Vec2;
use tracing::debug;

/// Everything the outside world tells the effects about one frame.
/// Read once at the start of the frame and never again.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameInput {
    pub width: usize,
    pub height: usize,
    pub snow_active: bool,
    pub frost_active: bool,
    pub fireworks_active: bool,
    /// Coarse scene motion in [0,1].
    pub motion_score: f32,
    /// Where bursts should follow (e.g. a tracked hand).
    pub target_point: Option<Vec2>,
    /// Current point of a wipe gesture on the frost.
    pub drawing_point: Option<Vec2>,
    /// Step length in frames; 1.0 at the display's refresh rate.
    pub dt: f32,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            snow_active: false,
            frost_active: false,
            fireworks_active: false,
            motion_score: 0.0,
            target_point: None,
            drawing_point: None,
            dt: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Snow,
    Frost,
    Fireworks,
}

impl Effect {
    /// Bottom to top.
    pub const ALL: [Effect; 3] = [Effect::Frost, Effect::Snow, Effect::Fireworks];

    fn slot(self) -> usize {
        match self {
            Effect::Snow => 0,
            Effect::Frost => 1,
            Effect::Fireworks => 2,
        }
    }

    fn wanted(self, input: &FrameInput) -> bool {
        match self {
            Effect::Snow => input.snow_active,
            Effect::Frost => input.frost_active,
            Effect::Fireworks => input.fireworks_active,
        }
    }

    fn blend(self) -> Blend {
        match self {
            Effect::Fireworks => Blend::Additive,
            Effect::Snow | Effect::Frost => Blend::Normal,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// What ran this frame. `None` means that effect was stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub snow: Option<SnowStats>,
    pub frost: Option<FrostStats>,
    pub fireworks: Option<FireworkStats>,
}

impl FrameStats {
    /// Live particles over all effects.
    pub fn particles(&self) -> usize {
        self.snow.map_or(0, |s| s.flakes)
            + self.frost.map_or(0, |f| f.drips)
            + self.fireworks.map_or(0, |f| f.sparks)
    }
}

pub struct FrameScheduler<S = Canvas> {
    running: bool,
    size: Option<(usize, usize)>,
    snow: SnowSimulator,
    frost: FrostSimulator,
    fireworks: FireworkSimulator,
    states: [RunState; 3],
    layers: [S; 3],
}

impl<S: Surface + Default> FrameScheduler<S> {
    /// Each simulator gets its own stream derived from `seed`.
    pub fn new(config: OverlayConfig, seed: u64) -> Self {
        Self {
            running: false,
            size: None,
            snow: SnowSimulator::new(config.snow, seed),
            frost: FrostSimulator::new(config.frost, seed.wrapping_add(1)),
            fireworks: FireworkSimulator::new(config.fireworks, seed.wrapping_add(2)),
            states: [RunState::Stopped; 3],
            layers: Default::default(),
        }
    }
}

impl<S: Surface> FrameScheduler<S> {
    pub fn start(&mut self) {
        self.running = true;
        debug!("scheduler started");
    }

    /// Stop scheduling frames. Nothing is in flight, so there is nothing to undo.
    pub fn stop(&mut self) {
        self.running = false;
        debug!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self, effect: Effect) -> RunState {
        self.states[effect.slot()]
    }

    pub fn layer(&self, effect: Effect) -> &S {
        &self.layers[effect.slot()]
    }

    pub fn snow(&self) -> &SnowSimulator {
        &self.snow
    }

    pub fn frost(&self) -> &FrostSimulator {
        &self.frost
    }

    pub fn fireworks(&self) -> &FireworkSimulator {
        &self.fireworks
    }

    /// Clear the snow pile and flakes.
    pub fn reset_snow(&mut self) {
        self.snow.reset();
    }

    /// Fog the whole frost layer back in.
    pub fn reset_frost(&mut self) {
        self.frost.reset();
    }

    fn idle(&self, effect: Effect) -> bool {
        match effect {
            Effect::Snow => self.snow.is_idle(),
            Effect::Frost => self.frost.is_idle(),
            Effect::Fireworks => self.fireworks.is_idle(),
        }
    }

    /// New size: every simulator and layer starts over from scratch.
    fn resize(&mut self, width: usize, height: usize) {
        self.snow.resize(width, height);
        self.frost.resize(width, height);
        self.fireworks.resize(width, height);
        for layer in &mut self.layers {
            layer.resize(width, height);
        }
        self.size = Some((width, height));
        debug!(width, height, "overlay resized");
    }

    /// Step every running effect once. Returns `None` while the scheduler is stopped.
    ///
    /// An effect starts on the frame its toggle turns on. Once toggled off it
    /// keeps running until its simulator has nothing left to show.
    pub fn frame(&mut self, input: &FrameInput) -> Option<FrameStats> {
        if !self.running {
            return None;
        }
        if self.size != Some((input.width, input.height)) {
            self.resize(input.width, input.height);
        }

        let mut stats = FrameStats::default();
        for effect in Effect::ALL {
            let slot = effect.slot();
            let wanted = effect.wanted(input);
            let state = self.states[slot];
            match state {
                RunState::Stopped if wanted => {
                    self.states[slot] = RunState::Running;
                    debug!(?effect, "effect started");
                }
                RunState::Running if !wanted && self.idle(effect) => {
                    self.states[slot] = RunState::Stopped;
                    if effect == Effect::Frost {
                        // Not stepped while stopped, so it never sees the drawing point go away.
                        self.frost.end_gesture();
                    }
                    self.layers[slot].clear();
                    debug!(?effect, "effect drained and stopped");
                }
                _ => {}
            }
            if self.states[slot] == RunState::Stopped {
                continue;
            }

            let layer = &mut self.layers[slot];
            layer.clear();
            match effect {
                Effect::Snow => stats.snow = Some(self.snow.step(input, layer)),
                Effect::Frost => stats.frost = Some(self.frost.step(input, layer)),
                Effect::Fireworks => stats.fireworks = Some(self.fireworks.step(input, layer)),
            }
        }
        Some(stats)
    }
}

impl FrameScheduler<Canvas> {
    /// Blend every running layer over `frame`, bottom to top.
    pub fn composite(&self, frame: &mut FrameBuffer, lut: &GammaLut) {
        for effect in Effect::ALL {
            if self.state(effect) == RunState::Running {
                self.layer(effect).composite_onto(frame, effect.blend(), lut);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Op, Recorder};

    fn sized(w: usize, h: usize) -> FrameInput {
        FrameInput { width: w, height: h, ..FrameInput::default() }
    }

    fn scheduler() -> FrameScheduler<Recorder> {
        let mut s = FrameScheduler::new(OverlayConfig::default(), 42);
        s.start();
        s
    }

    #[test]
    fn stopped_scheduler_does_nothing() {
        let mut s: FrameScheduler<Recorder> = FrameScheduler::new(OverlayConfig::default(), 1);
        assert!(!s.is_running());
        assert_eq!(s.frame(&sized(10, 10)), None);
        assert!(s.snow().field().is_none());
        s.start();
        assert!(s.frame(&sized(10, 10)).is_some());
        s.stop();
        assert_eq!(s.frame(&sized(10, 10)), None);
    }

    #[test]
    fn toggle_on_starts_the_effect() {
        let mut s = scheduler();
        let stats = s.frame(&sized(64, 48)).unwrap();
        assert_eq!(stats, FrameStats::default());
        assert_eq!(s.state(Effect::Snow), RunState::Stopped);

        let input = FrameInput { snow_active: true, ..sized(64, 48) };
        let stats = s.frame(&input).unwrap();
        assert_eq!(s.state(Effect::Snow), RunState::Running);
        assert_eq!(stats.snow.map(|st| st.flakes), Some(OverlayConfig::default().snow.target_count));
        assert_eq!(stats.frost, None);
        assert_eq!(s.layer(Effect::Snow).ops[0], Op::Clear);
    }

    #[test]
    fn snow_drains_before_stopping() {
        let mut cfg = OverlayConfig::default();
        cfg.snow.field.decay_rate = 0.5;
        let mut s: FrameScheduler<Recorder> = FrameScheduler::new(cfg, 3);
        s.start();
        let on = FrameInput { snow_active: true, ..sized(40, 30) };
        for _ in 0..20 {
            s.frame(&on);
        }
        // Toggled off: flakes still falling, so the effect keeps running.
        let off = sized(40, 30);
        s.frame(&off);
        assert_eq!(s.state(Effect::Snow), RunState::Running);

        let mut frames = 0;
        while s.state(Effect::Snow) == RunState::Running {
            s.frame(&off);
            frames += 1;
            assert!(frames < 10_000, "snow never drained");
        }
        assert!(s.snow().is_idle());
        assert_eq!(s.layer(Effect::Snow).ops, vec![Op::Clear]);
    }

    #[test]
    fn fireworks_stop_once_sparks_burn_out() {
        let mut s = scheduler();
        let on = FrameInput {
            fireworks_active: true,
            target_point: Some(Vec2::new(30.0, 30.0)),
            ..sized(60, 60)
        };
        s.frame(&on);
        let off = sized(60, 60);
        let mut running = 0;
        while s.state(Effect::Fireworks) == RunState::Running {
            s.frame(&off);
            running += 1;
        }
        // Longest outer spark lives 80 frames.
        assert!(running > 10 && running <= 82);
        assert!(s.fireworks().is_idle());
    }

    #[test]
    fn frost_toggled_off_mid_gesture_starts_fresh() {
        let mut cfg = OverlayConfig::default();
        cfg.frost.drip_probability = 0.0;
        let mut s: FrameScheduler<Recorder> = FrameScheduler::new(cfg, 6);
        s.start();
        let drawing = |x: f32| FrameInput {
            frost_active: true,
            drawing_point: Some(Vec2::new(x, 50.0)),
            ..sized(200, 100)
        };

        s.frame(&drawing(20.0));
        // No drips in flight, so frost stops on the very frame it is toggled off.
        s.frame(&FrameInput { drawing_point: Some(Vec2::new(20.0, 50.0)), ..sized(200, 100) });
        assert_eq!(s.state(Effect::Frost), RunState::Stopped);

        let st = s.frame(&drawing(180.0)).unwrap().frost.unwrap();
        assert_eq!((st.dots, st.segments), (1, 0));
        let mask = s.frost().mask().unwrap();
        assert_eq!(mask.get(180, 50), 1.0);
        assert_eq!(mask.get(100, 50), 0.0);
    }

    #[test]
    fn resize_starts_everything_over() {
        let mut s = scheduler();
        let input = FrameInput {
            snow_active: true,
            frost_active: true,
            drawing_point: Some(Vec2::new(50.0, 50.0)),
            ..sized(120, 90)
        };
        s.frame(&input);
        assert!(s.frost().mask().unwrap().erased_fraction() > 0.0);

        let bigger = FrameInput { snow_active: true, frost_active: true, ..sized(160, 120) };
        s.frame(&bigger);
        let mask = s.frost().mask().unwrap();
        assert_eq!((mask.width, mask.height), (160, 120));
        assert_eq!(mask.erased_fraction(), 0.0);
        assert_eq!(s.snow().field().unwrap().width(), 160);
        assert_eq!(s.layer(Effect::Frost).width, 160);
    }

    #[test]
    fn composite_covers_black_frame_with_frost() {
        let mut s: FrameScheduler<Canvas> = FrameScheduler::new(OverlayConfig::default(), 9);
        s.start();
        let lut = GammaLut::new();
        let input = FrameInput { frost_active: true, ..sized(32, 32) };
        s.frame(&input);
        let mut frame = FrameBuffer::new(32, 32);
        s.composite(&mut frame, &lut);
        // Black camera frame picks up the pale fog.
        assert!(frame.pixels.iter().all(|&p| p != 0));
    }
}
