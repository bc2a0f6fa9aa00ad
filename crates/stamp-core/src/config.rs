//! TOML configuration
//!
//! Every section is optional; an empty file yields the defaults.
//!
//! ```toml
//! [render]
//! scale = 1.5
//!
//! [export]
//! drift_policy = "warn"   # "ignore" | "warn" | "reject"
//! drift_tolerance = 0.01
//!
//! [output]
//! suffix = "_signed"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::export::{DriftPolicy, ExportOptions};
use crate::raster::DEFAULT_RENDER_SCALE;
use crate::state::DEFAULT_OUTPUT_SUFFIX;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StampConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl StampConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.render.scale.is_finite() && self.render.scale > 0.0,
            "render.scale must be a positive number, got {}",
            self.render.scale
        );
        anyhow::ensure!(
            self.export.drift_tolerance >= 0.0,
            "export.drift_tolerance must not be negative, got {}",
            self.export.drift_tolerance
        );
        Ok(())
    }
}

/// How page images are produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Pixels per PDF point
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
        }
    }
}

fn default_scale() -> f64 {
    DEFAULT_RENDER_SCALE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub drift_policy: DriftPolicy,
    /// Relative difference tolerated between render scales
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            drift_policy: DriftPolicy::default(),
            drift_tolerance: default_drift_tolerance(),
        }
    }
}

fn default_drift_tolerance() -> f64 {
    0.01
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Inserted before `.pdf` in the exported filename
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
        }
    }
}

fn default_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

impl From<&StampConfig> for ExportOptions {
    fn from(config: &StampConfig) -> Self {
        Self {
            render_scale: Some(config.render.scale),
            drift_policy: config.export.drift_policy,
            drift_tolerance: config.export.drift_tolerance,
        }
    }
}
