//! JSON calibration files.
//!
//! A calibration file stores everything needed to process a measurement the
//! same way again: mass calibration points, integral and background
//! definitions, the filter history, the peak width and whether backgrounds
//! were subtracted.
//!
//! ```json
//! {
//!   "mass_calibration": [[2.5, 12.0], [6.1, 56.0]],
//!   "integrals": [{"name": "56Fe", "lower": 55.8, "upper": 56.2}],
//!   "backgrounds": [{"name": "56Fe", "lower": 55.5, "upper": 55.7}],
//!   "applied_filters": {"max_ions_per_shot": {"enabled": true, "params": 3}},
//!   "peak_fwhm": 0.0646,
//!   "background_correction": false
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::integrals::{BackgroundDefinitions, IntegralDefinitions};
use crate::mass_cal::MassCalibration;
use crate::processor::AppliedFilters;

/// Processing settings of one measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    /// Mass calibration points
    #[serde(default)]
    pub mass_calibration: Option<MassCalibration>,

    /// Peak integral definitions
    #[serde(default)]
    pub integrals: Option<IntegralDefinitions>,

    /// Background definitions
    #[serde(default)]
    pub backgrounds: Option<BackgroundDefinitions>,

    /// Filter history
    #[serde(default)]
    pub applied_filters: AppliedFilters,

    /// Peak full width at half maximum in µs
    #[serde(default)]
    pub peak_fwhm: Option<f64>,

    /// Whether integrals were background corrected, used when replay integrates
    #[serde(default)]
    pub background_correction: Option<bool>,
}

impl CalibrationFile {
    /// Parse a calibration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the calibration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a calibration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PersistenceError::FileNotFound(path.display().to_string()));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the calibration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
