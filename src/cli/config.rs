//! TOML configuration file for processing defaults.
//!
//! Settings that are not part of a calibration file can be kept in a config
//! file instead of being passed every time:
//!
//! ```toml
//! # rimseval.toml
//! [processing]
//! peak_fwhm = 0.0646
//! background_correction = true
//! optimize_mcal = false
//! mcal_offset = 0.05
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use rimseval::processor::DEFAULT_PEAK_FWHM;

/// Root configuration structure for rimseval.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Configuration for the process command.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessingConfig {
    /// Peak FWHM in µs, used if the calibration file has none.
    pub peak_fwhm: Option<f64>,

    /// Subtract backgrounds where defined.
    pub background_correction: Option<bool>,

    /// Re-locate the calibration peaks before calibrating.
    pub optimize_mcal: Option<bool>,

    /// How far calibration peaks may have moved, in µs.
    pub mcal_offset: Option<f64>,
}

impl ProcessingConfig {
    pub fn peak_fwhm(&self) -> f64 {
        self.peak_fwhm.unwrap_or(DEFAULT_PEAK_FWHM)
    }

    pub fn background_correction(&self) -> bool {
        self.background_correction.unwrap_or(true)
    }

    pub fn optimize_mcal(&self) -> bool {
        self.optimize_mcal.unwrap_or(false)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
