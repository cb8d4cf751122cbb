//! Camera-overlay effects: snow that piles up, frost you can wipe away and
//! firework bursts that follow a point.
//!
//! Every effect is a simulator with a single `step` per frame that draws onto
//! a [`surface::Surface`]. [`scheduler::FrameScheduler`] steps them together
//! and [`raster::Canvas`] turns their draw calls into pixels.

pub mod config;
pub mod draw;
pub mod error;
pub mod field;
pub mod fireworks;
pub mod frost;
pub mod gamma;
pub mod particle;
pub mod raster;
pub mod scheduler;
pub mod snow;
pub mod surface;
pub mod types;

#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "viewer")]
pub mod window;

pub use config::OverlayConfig;
pub use error::Error;
pub use scheduler::{Effect, FrameInput, FrameScheduler, FrameStats, RunState};
