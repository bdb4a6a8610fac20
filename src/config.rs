//! Configuration file support for the try-on widget.
//!
//! Geometry, slider ranges and auto-fit tuning are all configurable. Every
//! section falls back to the built-in defaults when omitted, so a config
//! file only needs the values it changes.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Verbosity of the widget's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Severity ceiling passed to `env_logger` / `log::set_max_level`.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        self.to_level().to_level_filter()
    }

    /// Level for `console_log` in the browser.
    pub fn to_level(&self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Config file format version. Files with a higher version are refused.
pub const CONFIG_VERSION: u32 = 1;

/// Surface sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Maximum surface height in pixels
    pub max_height: f32,
    /// Container width used when the host reports none
    pub default_container_width: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            max_height: constants::DEFAULT_MAX_SURFACE_HEIGHT,
            default_container_width: constants::DEFAULT_CONTAINER_WIDTH,
        }
    }
}

/// Slider ranges and starting values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderConfig {
    /// Scale slider minimum, in percent
    pub scale_min: f32,
    /// Scale slider maximum, in percent
    pub scale_max: f32,
    /// Scale slider starting value, in percent
    pub scale_default: f32,
    /// Rotation slider minimum, in degrees
    pub rotation_min: f32,
    /// Rotation slider maximum, in degrees
    pub rotation_max: f32,
    /// Rotation slider starting value, in degrees
    pub rotation_default: f32,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            scale_min: constants::SCALE_SLIDER_MIN,
            scale_max: constants::SCALE_SLIDER_MAX,
            scale_default: constants::SCALE_SLIDER_DEFAULT,
            rotation_min: constants::ROTATION_SLIDER_MIN,
            rotation_max: constants::ROTATION_SLIDER_MAX,
            rotation_default: constants::ROTATION_SLIDER_DEFAULT,
        }
    }
}

/// Overlay geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Garment base width as a fraction of the surface width
    pub base_width_fraction: f32,
    /// Initial anchor height as a fraction of the surface height
    pub initial_anchor_height_fraction: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            base_width_fraction: constants::GARMENT_BASE_WIDTH_FRACTION,
            initial_anchor_height_fraction: constants::INITIAL_ANCHOR_HEIGHT_FRACTION,
        }
    }
}

/// Auto-fit tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFitConfig {
    /// Shoulders at or below this confidence are rejected
    pub min_confidence: f32,
    /// Estimated garment width per unit of shoulder width
    pub garment_width_per_shoulder: f32,
    /// Anchor offset below the shoulder line per unit of shoulder width
    pub anchor_drop_per_shoulder: f32,
}

impl Default for AutoFitConfig {
    fn default() -> Self {
        Self {
            min_confidence: constants::MIN_KEYPOINT_CONFIDENCE,
            garment_width_per_shoulder: constants::GARMENT_WIDTH_PER_SHOULDER,
            anchor_drop_per_shoulder: constants::ANCHOR_DROP_PER_SHOULDER,
        }
    }
}

/// Widget configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryOnConfig {
    /// See [`CONFIG_VERSION`]
    pub version: u32,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub sliders: SliderConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub auto_fit: AutoFitConfig,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

impl TryOnConfig {
    /// Built-in defaults.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            surface: SurfaceConfig::default(),
            sliders: SliderConfig::default(),
            overlay: OverlayConfig::default(),
            auto_fit: AutoFitConfig::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Pretty-printed JSON, suitable for writing a config file.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a config file's contents.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the widget cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !positive(self.surface.max_height) || !positive(self.surface.default_container_width) {
            return Err(ConfigError::invalid("surface dimensions must be positive"));
        }
        let s = &self.sliders;
        if !positive(s.scale_min) || s.scale_min > s.scale_max {
            return Err(ConfigError::invalid(
                "scale slider range must be positive and ordered",
            ));
        }
        if !(s.scale_min..=s.scale_max).contains(&s.scale_default)
            || !(s.rotation_min..=s.rotation_max).contains(&s.rotation_default)
        {
            return Err(ConfigError::invalid("slider defaults must lie within their ranges"));
        }
        if !positive(self.overlay.base_width_fraction)
            || !(0.0..=1.0).contains(&self.overlay.initial_anchor_height_fraction)
        {
            return Err(ConfigError::invalid("overlay geometry out of range"));
        }
        let a = &self.auto_fit;
        if !(0.0..=1.0).contains(&a.min_confidence)
            || !positive(a.garment_width_per_shoulder)
            || !a.anchor_drop_per_shoulder.is_finite()
        {
            return Err(ConfigError::invalid("auto-fit parameters out of range"));
        }
        Ok(())
    }

    /// File name looked up in the user's config directory.
    pub fn default_filename() -> &'static str {
        "tryon-config.json"
    }

    /// `<config dir>/tryon/tryon-config.json`, or under `~/.config` when
    /// the platform reports no config directory.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        let base = dirs::config_dir().or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
        Some(base.join("tryon").join(Self::default_filename()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("Using configuration {}", path.display());
        Ok(config)
    }

    /// Config from [`Self::default_path`]. A missing file silently yields
    /// `None`; an unreadable or invalid one is logged first.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.is_file() {
            log::debug!("No configuration at {}", path.display());
            return None;
        }
        Self::load_from_file(&path)
            .inspect_err(|e| log::warn!("Ignoring configuration {}: {}", path.display(), e))
            .ok()
    }
}

impl Default for TryOnConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a configuration could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed try-on configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Written by a newer release
    #[error("Configuration version {file_version} is not supported (newest known: {supported_version})")]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is outside the range the widget can work with
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not read configuration: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TryOnConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.sliders.scale_min, 50.0);
        assert_eq!(config.sliders.scale_max, 170.0);
        assert_eq!(config.surface.max_height, 700.0);
        assert_eq!(config.auto_fit.min_confidence, 0.5);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = TryOnConfig::new();
        config.auto_fit.garment_width_per_shoulder = 2.5;
        config.log_level = LogLevel::Debug;

        let json = config.to_json().unwrap();
        let parsed = TryOnConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "version": 1, "sliders": { "scale_max": 200.0 } }"#;
        let config = TryOnConfig::from_json(json).unwrap();
        assert_eq!(config.sliders.scale_max, 200.0);
        assert_eq!(config.sliders.scale_min, 50.0);
        assert_eq!(config.overlay, OverlayConfig::default());
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_newer_version_rejected() {
        let json = r#"{ "version": 99 }"#;
        assert!(matches!(
            TryOnConfig::from_json(json),
            Err(ConfigError::VersionTooNew {
                file_version: 99,
                supported_version: CONFIG_VERSION
            })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let json = r#"{ "version": 1, "sliders": { "scale_min": 0.0 } }"#;
        assert!(matches!(
            TryOnConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));

        let json = r#"{ "version": 1, "auto_fit": { "min_confidence": 1.5 } }"#;
        assert!(matches!(
            TryOnConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Trace.to_level(), log::Level::Trace);
    }
}
