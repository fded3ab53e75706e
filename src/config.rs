//! Settings module.
//!
//! Handles loading, validating, and merging `visionblocks.toml`. Stock defaults
//! form the base layer; a user file overrides any subset of keys on top.
//!
//! ## Config File Location
//!
//! `visionblocks.toml` in the working directory, or any path passed with
//! `--config`. A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! datasets_dir = "data/datasets"  # Root holding one folder per dataset
//!
//! [preview]
//! max_side = 512            # Longest side of preview PNGs written by the CLI
//!
//! [export]
//! jpeg_quality = 90         # JPEG quality for exported images (1-100)
//! default_key = "processed" # Key used when a name sanitizes to nothing
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [pipeline]
//! unknown_ops = "reject"    # "reject" | "ignore"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, UnknownOps};
use crate::naming::sanitize_key;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default settings file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "visionblocks.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings loaded from `visionblocks.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub datasets_dir: PathBuf,
    pub preview: PreviewConfig,
    pub export: ExportConfig,
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            datasets_dir: PathBuf::from("data/datasets"),
            preview: PreviewConfig::default(),
            export: ExportConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "datasets_dir must not be empty".into(),
            ));
        }
        if self.preview.max_side == 0 {
            return Err(ConfigError::Validation(
                "preview.max_side must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(ConfigError::Validation(
                "export.jpeg_quality must be 1-100".into(),
            ));
        }
        if sanitize_key(&self.export.default_key, "") != self.export.default_key {
            return Err(ConfigError::Validation(format!(
                "export.default_key '{}' is not a valid dataset key",
                self.export.default_key
            )));
        }
        if self.export.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "export.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Longest side, in pixels, of preview images written by the CLI.
    pub max_side: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { max_side: 512 }
    }
}

/// Batch export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub jpeg_quality: u32,
    pub default_key: String,
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            default_key: crate::export::DEFAULT_EXPORT_KEY.to_string(),
            max_processes: None,
        }
    }
}

impl ExportConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.jpeg_quality)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub unknown_ops: UnknownOps,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ExportConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Settings::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a settings file as a raw TOML value; `Ok(None)` when it doesn't exist.
pub fn load_raw(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, falling back to defaults if it doesn't exist.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    resolve(load_raw(path)?)
}

/// Returns a fully-commented stock `visionblocks.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# visionblocks configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Folder holding one sub-folder per dataset. Each dataset folder needs an
# images/ directory and may carry metadata.json and index.csv.
datasets_dir = "data/datasets"

# ---------------------------------------------------------------------------
# Preview images written by `sample --out` and `apply --out`
# ---------------------------------------------------------------------------
[preview]
# Longest side in pixels; larger images are downscaled, smaller ones kept.
max_side = 512

# ---------------------------------------------------------------------------
# Batch export
# ---------------------------------------------------------------------------
[export]
# Encoding quality for JPEG sources (1-100). PNG output is lossless.
jpeg_quality = 90

# Key used when the requested dataset name sanitizes to nothing.
default_key = "processed"

# Maximum parallel workers. Omit for auto (= number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# What to do with operations of an unrecognized type:
#   "reject" - fail before touching any image
#   "ignore" - skip them and log a warning
unknown_ops = "reject"
"##
}
