//! Tunables for every effect, loadable from TOML.
//!
//! Defaults hold the design values; any field may be omitted from a file.

use crate::fireworks::Palette;
use crate::types::Rgb;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ParseError(String),
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub snow: SnowConfig,
    pub frost: FrostConfig,
    pub fireworks: FireworkConfig,
    pub logging: LoggingConfig,
}

impl OverlayConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.snow.validate()?;
        self.frost.validate()?;
        self.fireworks.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Avalanche solver and overflow detection for the snow pile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Fraction of height a cell loses per decay pass.
    pub decay_rate: f32,
    /// Cells at or below this height are left alone by decay.
    pub decay_threshold: f32,
    /// Decay touches every `decay_stride`-th cell, rotating the offset each frame.
    pub decay_stride: usize,
    pub relax_passes: usize,
    /// Maximum height difference between neighbours before material slides.
    pub slope_threshold: f32,
    /// Height moved from the taller to the shorter cell per transfer.
    pub settle_amount: f32,
    pub overflow_stride: usize,
    /// Overflow fires once a sampled cell reaches `surface height - margin`.
    pub overflow_margin: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.002,
            decay_threshold: 0.1,
            decay_stride: 2,
            relax_passes: 3,
            slope_threshold: 2.0,
            settle_amount: 0.5,
            overflow_stride: 10,
            overflow_margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowConfig {
    pub target_count: usize,
    /// Initial downward speed, px/frame.
    pub fall_speed: Range<f32>,
    pub size: Range<f32>,
    pub drift_amplitude: f32,
    /// Radians of drift phase per pixel of fall.
    pub drift_frequency: f32,
    /// A flake this close above the pile surface counts as landed.
    pub collision_tolerance: f32,
    /// Half-width of the deposit kernel, in cells.
    pub deposit_radius: usize,
    /// Height deposited at the impact column per unit of flake radius.
    pub deposit_scale: f32,
    /// Motion scores above this wipe the pile.
    pub motion_threshold: f32,
    /// Horizontal spacing of the pile outline, px.
    pub profile_stride: usize,
    pub flake_color: Rgb,
    pub flake_alpha: f32,
    pub pile_top: Rgb,
    pub pile_bottom: Rgb,
    pub field: FieldConfig,
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            target_count: 220,
            fall_speed: 0.8..2.2,
            size: 1.5..4.0,
            drift_amplitude: 0.6,
            drift_frequency: 0.02,
            collision_tolerance: 2.0,
            deposit_radius: 6,
            deposit_scale: 0.35,
            motion_threshold: 0.35,
            profile_stride: 4,
            flake_color: Rgb::WHITE,
            flake_alpha: 0.9,
            pile_top: Rgb::hex(0xFF_FF_FF),
            pile_bottom: Rgb::hex(0xC8_D8_EC),
            field: FieldConfig::default(),
        }
    }
}

impl SnowConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        check_range("snow.fall_speed", &self.fall_speed)?;
        check_range("snow.size", &self.size)?;
        check_unit("snow.motion_threshold", self.motion_threshold)?;
        check_unit("snow.flake_alpha", self.flake_alpha)?;
        check_positive("snow.profile_stride", self.profile_stride)?;
        check_positive("snow.field.decay_stride", self.field.decay_stride)?;
        check_positive("snow.field.overflow_stride", self.field.overflow_stride)?;
        check_unit("snow.field.decay_rate", self.field.decay_rate)?;
        if self.field.settle_amount < 0.0 || self.field.slope_threshold < 0.0 {
            return Err(ConfigError::ValidationError(
                "snow.field slope/settle must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrostConfig {
    pub fog_color: Rgb,
    pub fog_alpha: f32,
    /// Side of the square noise tile, px.
    pub noise_tile: u32,
    pub noise_alpha: f32,
    pub vignette_center: Rgb,
    pub vignette_center_alpha: f32,
    pub vignette_edge: Rgb,
    pub vignette_edge_alpha: f32,
    /// Width of the erasing stroke, px.
    pub brush_width: f32,
    /// Chance of one drip when a gesture ends.
    pub drip_probability: f32,
    pub drip_speed: Range<f32>,
    pub drip_jitter: f32,
    /// Drip lifetime in frames.
    pub drip_life: Range<f32>,
    pub drip_size: Range<f32>,
    pub drip_alpha: f32,
    pub wiggle_probability: f32,
    pub wiggle_speed: f32,
}

impl Default for FrostConfig {
    fn default() -> Self {
        Self {
            fog_color: Rgb::hex(0xE6_F0_F8),
            fog_alpha: 0.55,
            noise_tile: 64,
            noise_alpha: 0.08,
            vignette_center: Rgb::WHITE,
            vignette_center_alpha: 0.12,
            vignette_edge: Rgb::hex(0xA8_C0_E0),
            vignette_edge_alpha: 0.35,
            brush_width: 44.0,
            drip_probability: 0.4,
            drip_speed: 0.6..1.4,
            drip_jitter: 3.0,
            drip_life: 40.0..90.0,
            drip_size: 3.0..6.0,
            drip_alpha: 0.35,
            wiggle_probability: 0.05,
            wiggle_speed: 0.4,
        }
    }
}

impl FrostConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        check_unit("frost.fog_alpha", self.fog_alpha)?;
        check_unit("frost.noise_alpha", self.noise_alpha)?;
        check_unit("frost.drip_probability", self.drip_probability)?;
        check_unit("frost.drip_alpha", self.drip_alpha)?;
        check_unit("frost.wiggle_probability", self.wiggle_probability)?;
        check_range("frost.drip_speed", &self.drip_speed)?;
        check_range("frost.drip_life", &self.drip_life)?;
        check_range("frost.drip_size", &self.drip_size)?;
        check_positive("frost.noise_tile", self.noise_tile as usize)?;
        if self.drip_life.start <= 0.0 {
            return Err(ConfigError::ValidationError("frost.drip_life must be positive".into()));
        }
        if self.brush_width <= 0.0 {
            return Err(ConfigError::ValidationError("frost.brush_width must be positive".into()));
        }
        Ok(())
    }
}

/// Physics and spawn ranges for one firework layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Relative share of a burst group.
    pub weight: f32,
    pub speed: Range<f32>,
    pub size: Range<f32>,
    /// Lifetime in frames.
    pub life: Range<f32>,
    /// Downward acceleration, px/frame².
    pub gravity: f32,
    /// Velocity multiplier per frame (1.0 = no drag).
    pub drag: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworkConfig {
    /// Emit one group every `emit_interval` frames.
    pub emit_interval: u32,
    pub group_size: usize,
    /// Fraction of the gap to the target covered per emission.
    pub smoothing: f32,
    pub core: LayerConfig,
    pub mid: LayerConfig,
    pub outer: LayerConfig,
    pub palettes: Vec<Palette>,
    pub trail_alpha: f32,
    pub trail_width: f32,
    pub halo_scale: f32,
    pub halo_alpha: f32,
    pub min_head_alpha: f32,
}

impl Default for FireworkConfig {
    fn default() -> Self {
        Self {
            emit_interval: 4,
            group_size: 18,
            smoothing: 0.5,
            core: LayerConfig {
                weight: 0.15,
                speed: 6.0..10.0,
                size: 1.0..2.0,
                life: 14.0..24.0,
                gravity: 0.0,
                drag: 1.0,
            },
            mid: LayerConfig {
                weight: 0.6,
                speed: 2.5..5.5,
                size: 1.5..3.0,
                life: 30.0..50.0,
                gravity: 0.08,
                drag: 1.0,
            },
            outer: LayerConfig {
                weight: 0.25,
                speed: 1.5..3.5,
                size: 2.5..4.5,
                life: 50.0..80.0,
                gravity: 0.03,
                drag: 0.96,
            },
            palettes: Palette::defaults(),
            trail_alpha: 0.35,
            trail_width: 1.0,
            halo_scale: 2.5,
            halo_alpha: 0.25,
            min_head_alpha: 0.15,
        }
    }
}

impl FireworkConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        check_positive("fireworks.emit_interval", self.emit_interval as usize)?;
        check_positive("fireworks.group_size", self.group_size)?;
        check_unit("fireworks.smoothing", self.smoothing)?;
        check_unit("fireworks.min_head_alpha", self.min_head_alpha)?;
        if self.palettes.is_empty() {
            return Err(ConfigError::ValidationError("fireworks.palettes is empty".into()));
        }
        for (name, layer) in [("core", &self.core), ("mid", &self.mid), ("outer", &self.outer)] {
            check_range(&format!("fireworks.{name}.speed"), &layer.speed)?;
            check_range(&format!("fireworks.{name}.size"), &layer.size)?;
            check_range(&format!("fireworks.{name}.life"), &layer.life)?;
            check_unit(&format!("fireworks.{name}.drag"), layer.drag)?;
            if !layer.gravity.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "fireworks.{name}.gravity must be finite, got {}",
                    layer.gravity
                )));
            }
            if layer.weight < 0.0 || layer.life.start <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "fireworks.{name}: weight must be >= 0 and life > 0"
                )));
            }
        }
        if self.core.weight + self.mid.weight + self.outer.weight <= 0.0 {
            return Err(ConfigError::ValidationError("fireworks layer weights sum to 0".into()));
        }
        Ok(())
    }
}

fn check_range(name: &str, r: &Range<f32>) -> ConfigResult<()> {
    if !(r.start.is_finite() && r.end.is_finite()) || r.start > r.end {
        return Err(ConfigError::ValidationError(format!(
            "{name}: invalid range {}..{}",
            r.start, r.end
        )));
    }
    Ok(())
}

fn check_unit(name: &str, v: f32) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(ConfigError::ValidationError(format!("{name} must be in [0,1], got {v}")));
    }
    Ok(())
}

fn check_positive(name: &str, v: usize) -> ConfigResult<()> {
    if v == 0 {
        return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
    }
    Ok(())
}
