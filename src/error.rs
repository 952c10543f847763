//! Error types shared by the processing engine.
//!
//! Configuration and precondition errors are raised before any state is
//! touched, so a caller can catch them per file and carry on with the next one.
//! Data-quality problems are not errors: they are logged with `log::warn!` and
//! handled by a documented fallback in the module that detects them.

use crate::dataset::DatasetError;

/// Errors that can occur while processing a single CRD measurement
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// Invalid parameter value or shape supplied by the caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A value lies outside of its permitted range
    #[error("Out of range: {0}")]
    Range(String),

    /// Operation requires packages, but none were created
    #[error("There is no packaged data. Please create packages first.")]
    NoPackages,

    /// Operation requires a mass axis, but no mass calibration was applied
    #[error("A mass calibration needs to be applied first.")]
    NoMassCalibration,

    /// Operation requires mass calibration points, but none were defined
    #[error("No mass calibration was set.")]
    NoMassCalibrationDefined,

    /// Operation requires integral definitions, but none were set
    #[error("No integrals were set.")]
    NoIntegrals,

    /// Operation requires calculated integrals, but none are available
    #[error("Integrals have not been calculated yet.")]
    IntegralsNotCalculated,

    /// Integral peak names must be unique
    #[error("The peak names for integral definitions must be unique, found duplicate: {0}")]
    DuplicatePeakName(String),

    /// A mass calibration needs at least two points
    #[error("At least two mass calibration points must be given, got {0}.")]
    NotEnoughCalibrationPoints(usize),

    /// No spectrum was created yet
    #[error("No spectrum available. Create the full spectrum first.")]
    NoSpectrum,

    /// Shot and package filters operate on counts, not on dead time corrected data
    #[error("Dead time correction was already applied. Recalculate the applied filters instead.")]
    DeadTimeAlreadyApplied,

    /// A least-squares fit did not produce a usable result
    #[error("Fit failed: {0}")]
    Fit(String),

    /// Inconsistent arrival data
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Errors that can occur while saving or loading calibration and evaluation files
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error serializing/deserializing JSON
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// A file referenced from a save file could not be found
    #[error("Could not find file {0}")]
    FileNotFound(String),

    /// Stored timestamp is not valid ISO-8601
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
