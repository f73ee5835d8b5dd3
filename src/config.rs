//! Pipeline configuration management.
//!
//! One serializable struct holds every constant the pipeline depends on:
//! directory layout, media naming, sampling resolution, the source viewport
//! used to normalize gaze, and the canonical clock zone. Defaults reproduce
//! the conventions the recordings were captured with.
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::config::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! config.save_toml("dataset.toml")?;
//!
//! let loaded = PipelineConfig::load_toml("dataset.toml")?;
//! assert_eq!(loaded.sampling.image_size, 224);
//! ```

use crate::error::{DatasetError, Result};
use crate::timestamp::fixed_zone;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Unified pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Episode directory layout and media naming
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Tensor resolution and gaze viewport
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Canonical clock and alignment diagnostics
    #[serde(default)]
    pub clock: ClockConfig,

    /// Archive output
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where things live inside an episode directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// RGB frame directory, relative to the episode
    pub images_dir: String,

    /// Depth frame directory, relative to the episode
    pub depth_dir: String,

    /// Merged telemetry + gaze table, relative to the episode
    pub merged_table: String,

    /// Suffix appended to the RGB stem for legacy single-name media fields
    pub legacy_depth_suffix: String,

    /// Extensions counted as images by the correspondence check (lowercase, no dot)
    pub image_extensions: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            images_dir: "images".to_string(),
            depth_dir: "depth".to_string(),
            merged_table: "airsim_with_gaze_closest.csv".to_string(),
            legacy_depth_suffix: "_depth.png".to_string(),
            image_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl LayoutConfig {
    /// True if `path` has one of the configured image extensions.
    pub fn is_image_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.image_extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

/// Output tensor geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Square output resolution for RGB and depth tensors
    pub image_size: usize,

    /// Width of the viewport gaze `x` is expressed in (pixels)
    pub viewport_width: f64,

    /// Height of the viewport gaze `y` is expressed in (pixels)
    pub viewport_height: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            viewport_width: 640.0,
            viewport_height: 360.0,
        }
    }
}

/// Canonical clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Target zone as minutes east of UTC (+05:30 = 330)
    pub utc_offset_minutes: i32,

    /// Nearest matches farther apart than this are counted in the alignment
    /// report. Diagnostic only: matches are never rejected.
    pub match_distance_warn_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 330,
            match_distance_warn_ms: 100,
        }
    }
}

impl ClockConfig {
    /// The fixed target zone.
    pub fn zone(&self) -> Result<FixedOffset> {
        fixed_zone(self.utc_offset_minutes).ok_or_else(|| {
            DatasetError::InvalidConfig(format!(
                "utc_offset_minutes {} is outside ±24h",
                self.utc_offset_minutes
            ))
        })
    }
}

/// Archive output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving `<episode>.npz`
    pub output_dir: PathBuf,

    /// Also write `<episode>_metadata.json`
    pub write_metadata: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            write_metadata: false,
        }
    }
}

impl PipelineConfig {
    /// Create configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive output directory (builder pattern).
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.export.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the square tensor resolution (builder pattern).
    pub fn with_image_size(mut self, size: usize) -> Self {
        self.sampling.image_size = size;
        self
    }

    /// Enable metadata JSON next to each archive (builder pattern).
    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.export.write_metadata = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sampling.image_size == 0 {
            return Err("image_size must be > 0".to_string());
        }
        if !(self.sampling.viewport_width > 0.0 && self.sampling.viewport_width.is_finite()) {
            return Err("viewport_width must be a positive number".to_string());
        }
        if !(self.sampling.viewport_height > 0.0 && self.sampling.viewport_height.is_finite()) {
            return Err("viewport_height must be a positive number".to_string());
        }
        if fixed_zone(self.clock.utc_offset_minutes).is_none() {
            return Err("utc_offset_minutes must be within ±24h".to_string());
        }
        if self.layout.images_dir.is_empty() || self.layout.depth_dir.is_empty() {
            return Err("images_dir and depth_dir cannot be empty".to_string());
        }
        if self.layout.merged_table.is_empty() {
            return Err("merged_table cannot be empty".to_string());
        }
        if self.layout.legacy_depth_suffix.is_empty() {
            return Err("legacy_depth_suffix cannot be empty".to_string());
        }
        if self.layout.image_extensions.is_empty() {
            return Err("image_extensions cannot be empty".to_string());
        }
        if self
            .layout
            .image_extensions
            .iter()
            .any(|e| e.starts_with('.') || e.chars().any(|c| c.is_ascii_uppercase()))
        {
            return Err("image_extensions must be lowercase without a leading dot".to_string());
        }
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load and validate configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate().map_err(DatasetError::InvalidConfig)?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        config.validate().map_err(DatasetError::InvalidConfig)?;
        Ok(config)
    }
}
