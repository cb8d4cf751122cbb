// Pooled particles shared by every effect.
// Visual outcomes:
// - Nothing on its own; snow flakes, frost drips and firework sparks are all
//   built on `Particle` and live in a `Pool`.

use glam::Vec2;
use rand::Rng;
use std::ops::Range;

/// Uniform sample from `range`; a degenerate range yields its start.
#[inline]
pub fn sample<R: Rng + ?Sized>(rng: &mut R, range: &Range<f32>) -> f32 {
    if range.start < range.end { rng.gen_range(range.clone()) } else { range.start }
}

/// What a particle spawns with. Velocity is `speed` along `angle` (radians,
/// +y is down), or straight down when `angle` is `None`.
#[derive(Clone, Debug)]
pub struct SpawnParams {
    pub speed: Range<f32>,
    pub angle: Option<Range<f32>>,
    pub size: Range<f32>,
    pub life: Range<f32>,
    /// Uniform positional jitter around the origin, px.
    pub jitter: Vec2,
}

/// One pooled entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,        // remaining lifetime (frames)
    pub max_life: f32,    // initial lifetime (for fade/colour)
    pub size: f32,        // radius in pixels, fixed at spawn
}

impl Particle {
    pub fn spawn<R: Rng + ?Sized>(origin: Vec2, params: &SpawnParams, rng: &mut R) -> Self {
        let mut p = Particle { pos: origin, vel: Vec2::ZERO, life: 1.0, max_life: 1.0, size: 1.0 };
        p.recycle(origin, params, rng);
        p
    }

    /// Re-initialise in place instead of allocating a new particle.
    pub fn recycle<R: Rng + ?Sized>(&mut self, origin: Vec2, params: &SpawnParams, rng: &mut R) {
        let jitter = Vec2::new(
            rng.gen_range(-1.0..=1.0) * params.jitter.x,
            rng.gen_range(-1.0..=1.0) * params.jitter.y,
        );
        let speed = sample(rng, &params.speed);
        let dir = match &params.angle {
            Some(a) => Vec2::from_angle(sample(rng, a)),
            None => Vec2::Y,
        };
        self.pos = origin + jitter;
        self.vel = dir * speed;
        self.size = sample(rng, &params.size);
        // Life must start strictly positive.
        self.max_life = sample(rng, &params.life).max(f32::EPSILON);
        self.life = self.max_life;
    }

    /// Explicit Euler step.
    #[inline]
    pub fn integrate(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }

    /// Count life down; true while still alive.
    #[inline]
    pub fn age(&mut self, dt: f32) -> bool {
        self.life -= dt;
        self.alive()
    }

    #[inline]
    pub fn alive(&self) -> bool {
        self.life > 0.0
    }

    /// Remaining-life fraction in [0,1]; 1.0 = just spawned.
    #[inline]
    pub fn life01(&self) -> f32 {
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

/// Anything stored in a `Pool`.
pub trait Pooled {
    fn particle(&self) -> &Particle;
}

impl Pooled for Particle {
    fn particle(&self) -> &Particle {
        self
    }
}

/// Outcome of stepping one particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fate {
    Live,
    /// Re-spawned in place by the step closure; stays in the pool.
    Recycled,
    /// Drop from the pool this frame.
    Expired,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub recycled: usize,
    pub removed: usize,
}

/// Particle pool with a target population.
/// Storage is allocated once; removal is swap-remove, so no per-frame churn.
pub struct Pool<P> {
    items: Vec<P>,
    target: usize,
}

impl<P: Pooled> Pool<P> {
    pub fn with_target(target: usize) -> Self {
        Self { items: Vec::with_capacity(target), target }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn push(&mut self, p: P) {
        self.items.push(p);
    }

    /// Spawn exactly enough particles to reach the target. Returns how many.
    pub fn top_up(&mut self, mut make: impl FnMut() -> P) -> usize {
        let missing = self.target.saturating_sub(self.items.len());
        for _ in 0..missing {
            self.items.push(make());
        }
        missing
    }

    /// Step every particle, walking from the end of the pool to the start so
    /// a swap-remove never skips or revisits an entry.
    pub fn step_all(&mut self, mut step: impl FnMut(&mut P) -> Fate) -> StepReport {
        let mut report = StepReport::default();
        let mut i = self.items.len();
        while i > 0 {
            i -= 1;
            match step(&mut self.items[i]) {
                Fate::Live => {}
                Fate::Recycled => report.recycled += 1,
                Fate::Expired => {
                    // The element swapped into `i` came from the already-visited tail.
                    self.items.swap_remove(i);
                    report.removed += 1;
                }
            }
        }
        debug_assert!(self.items.iter().all(|p| {
            let p = p.particle();
            p.life > 0.0 && p.life <= p.max_life
        }));
        report
    }
}

/// Fixed-capacity position history; the oldest entry is evicted first.
#[derive(Clone, Debug)]
pub struct Trail<const N: usize> {
    points: [Vec2; N],
    head: usize, // next write slot
    len: usize,
}

impl<const N: usize> Default for Trail<N> {
    fn default() -> Self {
        Self { points: [Vec2::ZERO; N], head: 0, len: 0 }
    }
}

impl<const N: usize> Trail<N> {
    pub fn push(&mut self, p: Vec2) {
        if N == 0 {
            return;
        }
        self.points[self.head] = p;
        self.head = (self.head + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.head = 0;
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Vec2> + '_ {
        let start = (self.head + N - self.len) % N.max(1);
        (0..self.len).map(move |k| self.points[(start + k) % N])
    }
}
