//! # rimseval - Evaluation of CRD Time-of-Flight Measurements
//!
//! `rimseval` processes resonance ionization mass spectrometry (RIMS)
//! measurements recorded in the CRD format. A measurement is a sequence of
//! laser shots, each with the arrival bins of the ions it produced. From these
//! the crate builds spectra, calibrates them to mass, integrates peaks and
//! computes isotope ratios as δ-values.
//!
//! ## Key Features
//!
//! - **Shot-level filters**: reject shots with too many ions, too many ions in
//!   a time window or in a time-of-flight window, without copying arrival data.
//!
//! - **Packages**: split a measurement into batches of shots, filter batches
//!   by their ion count or with Peirce's criterion on their integrals.
//!
//! - **Replayable history**: every filter is recorded and can be replayed on
//!   the same or another measurement from a full reset.
//!
//! - **Dead time correction**, **mass calibration** with automatic peak
//!   re-location, and **background corrected integrals** with Poisson
//!   uncertainties.
//!
//! - **Evaluation across files**: sum integrals of several measurements,
//!   normalize to a standard and compute correlated δ-values.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rimseval::prelude::*;
//!
//! let json = std::fs::read_to_string("measurement.json")?;
//! let dataset: ArrivalDataset = serde_json::from_str(&json)?;
//!
//! let mut crd = CrdFileProcessor::new(dataset);
//! crd.spectrum_full()?;
//! crd.filter_max_ions_per_shot(3)?;
//!
//! crd.set_def_mcal(Some(MassCalibration::new([(2.5, 12.0), (6.1, 56.0)])?));
//! crd.mass_calibration()?;
//!
//! crd.set_def_integrals(Some(IntegralDefinitions::new(vec![
//!     PeakWindow::new("54Fe", 53.8, 54.2),
//!     PeakWindow::new("56Fe", 55.8, 56.2),
//! ])?));
//! crd.integrals_calc(false)?;
//!
//! for integral in crd.integrals().unwrap_or_default() {
//!     println!("{} ± {}", integral.value, integral.uncertainty);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: Raw arrival data and the CRD header
//! - [`spectrum`], [`packages`], [`filters`], [`dead_time`]: Building blocks of the pipeline
//! - [`mass_cal`], [`fitting`]: Mass calibration
//! - [`integrals`], [`peirce`], [`delta`]: Integrals, outlier rejection and δ-values
//! - [`processor`]: The processing session over one measurement
//! - [`calibration`], [`evaluator`], [`multi`]: Persistence and work across files

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod calibration;
pub mod dataset;
pub mod dead_time;
pub mod delta;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod fitting;
pub mod integrals;
pub mod mass_cal;
pub mod multi;
pub mod packages;
pub mod peirce;
pub mod processor;
pub mod spectrum;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::calibration::CalibrationFile;
    pub use crate::dataset::{ArrivalDataset, CrdHeader, DatasetError, ShotRange};
    pub use crate::delta::{delta_label, isotope_name, IsotopeReference, IsotopeTable};
    pub use crate::error::{PersistenceError, ProcessingError};
    pub use crate::evaluator::{
        load_integral_evaluator, save_integral_evaluator, EvaluatorError, IntegralEvaluator,
        IntegralRecord,
    };
    pub use crate::integrals::{BackgroundDefinitions, Integral, IntegralDefinitions, PeakWindow};
    pub use crate::mass_cal::MassCalibration;
    pub use crate::multi::{ApplyOptions, MultiFileProcessor};
    pub use crate::packages::Packages;
    pub use crate::peirce::{reject_outliers, PeirceResult};
    pub use crate::processor::{
        AppliedFilters, CrdFileProcessor, FilterEntry, Macro, DEFAULT_PEAK_FWHM,
    };
}
