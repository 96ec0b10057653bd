//! Rasterizer settings, optionally read from the `[Software]` section of an
//! INI file.
//!
//! ```ini
//! [Software]
//! pixel_depth = 32
//! cache_budget = 8388608
//! bilinear = false
//! trilinear = false
//! gouraud = true
//! lighting = true
//! max_polygons = 0          ; 0 = unlimited
//! mip_bias = 0.0
//! half_blend = true
//! interpolation = smart     ; 8 | 16 | 32 | smart
//! step_flat = 0.000001
//! step_gentle = 0.00005
//! ```

use std::{path::Path, str::FromStr};

use ini::Ini;
use log::{debug, info, warn};

use crate::renderer::software::{
    interp::{InterpolationMode, StepThresholds},
    texcache::DEFAULT_BUDGET,
};

#[derive(Clone, Debug, PartialEq)]
pub struct RasterConfig {
    pub pixel_depth: u32,
    pub cache_budget: usize,
    pub bilinear: bool,
    pub trilinear: bool,
    pub gouraud: bool,
    pub lighting: bool,
    /// Debug cap on polygons drawn per frame.
    pub max_polygons: Option<u32>,
    pub mip_bias: f32,
    /// Use the mask-and-shift 50% blend instead of the general alpha path.
    pub half_blend: bool,
    pub interpolation: InterpolationMode,
    pub thresholds: StepThresholds,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            pixel_depth: 32,
            cache_budget: DEFAULT_BUDGET,
            bilinear: false,
            trilinear: false,
            gouraud: true,
            lighting: true,
            max_polygons: None,
            mip_bias: 0.0,
            half_blend: true,
            interpolation: InterpolationMode::Smart,
            thresholds: StepThresholds::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config syntax: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("bad value `{value}` for `{key}`")]
    Value { key: String, value: String },
}

/// Read settings from `path`. Missing or malformed files fall back to the
/// defaults with a warning.
pub fn load_config(path: Option<&Path>) -> RasterConfig {
    let Some(path) = path else {
        return RasterConfig::default();
    };
    info!("Loading config from: {}", path.display());
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("Cannot read config {}: {}", path.display(), e);
            return RasterConfig::default();
        }
    };
    match parse_config(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Failed to parse config: {}", e);
            RasterConfig::default()
        }
    }
}

/// Parse INI text. Keys that are absent keep their defaults.
pub fn parse_config(text: &str) -> Result<RasterConfig, ConfigError> {
    let conf = Ini::load_from_str(text)?;
    let mut cfg = RasterConfig::default();

    let Some(section) = conf.section(Some("Software")) else {
        debug!("no [Software] section, using defaults");
        return Ok(cfg);
    };

    if let Some(v) = section.get("pixel_depth") {
        cfg.pixel_depth = number("pixel_depth", v)?;
    }
    if let Some(v) = section.get("cache_budget") {
        cfg.cache_budget = number("cache_budget", v)?;
    }
    if let Some(v) = section.get("bilinear") {
        cfg.bilinear = flag("bilinear", v)?;
    }
    if let Some(v) = section.get("trilinear") {
        cfg.trilinear = flag("trilinear", v)?;
    }
    if let Some(v) = section.get("gouraud") {
        cfg.gouraud = flag("gouraud", v)?;
    }
    if let Some(v) = section.get("lighting") {
        cfg.lighting = flag("lighting", v)?;
    }
    if let Some(v) = section.get("max_polygons") {
        let n: u32 = number("max_polygons", v)?;
        cfg.max_polygons = (n > 0).then_some(n);
    }
    if let Some(v) = section.get("mip_bias") {
        cfg.mip_bias = number("mip_bias", v)?;
    }
    if let Some(v) = section.get("half_blend") {
        cfg.half_blend = flag("half_blend", v)?;
    }
    if let Some(v) = section.get("interpolation") {
        cfg.interpolation = match v.trim().to_ascii_lowercase().as_str() {
            "8" => InterpolationMode::Step8,
            "16" => InterpolationMode::Step16,
            "32" => InterpolationMode::Step32,
            "smart" => InterpolationMode::Smart,
            _ => return Err(bad("interpolation", v)),
        };
    }
    if let Some(v) = section.get("step_flat") {
        cfg.thresholds.flat = number("step_flat", v)?;
    }
    if let Some(v) = section.get("step_gentle") {
        cfg.thresholds.gentle = number("step_gentle", v)?;
    }
    debug!("{:?}", cfg);
    Ok(cfg)
}

fn bad(key: &str, value: &str) -> ConfigError {
    ConfigError::Value {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(bad(key, value)),
    }
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| bad(key, value))
}

/*──────────────────────────────── Tests ───────────────────────────────*/
