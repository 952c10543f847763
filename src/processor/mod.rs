//! # CRD File Processor
//!
//! One processing session over a single measurement. The processor shares the
//! raw [`ArrivalDataset`] and keeps everything derived from it: the working
//! set of shots, the spectrum with its time and mass axes, packages, integrals
//! and the history of applied filters.
//!
//! ## Working shots
//!
//! Shots are identified by their index in the raw dataset. Filters never copy
//! arrival data, they shrink the list of working shot ids. Dropping a package
//! drops its shots from the working set as well, so at any time
//!
//! ```text
//! nof_shots == sum(package shot counts)
//! data      == sum(package spectra)
//! ```
//!
//! ## Replay
//!
//! There is no undo for a single filter. [`CrdFileProcessor::calculate_applied_filters`]
//! resets to the full spectrum and runs every enabled filter of the history
//! in a fixed order:
//!
//! 1. `spectrum_part`
//! 2. `max_ions_per_shot`, `max_ions_per_time`, `max_ions_per_tof_window`
//! 3. `packages`, then `max_ions_per_pkg`
//! 4. `pkg_peirce_rejection`, which integrates first
//! 5. `dead_time_corr`

mod history;
mod shots;


pub use history::{AppliedFilters, FilterEntry, MaxIonsPerTime, MaxIonsPerTofWindow};

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::calibration::CalibrationFile;
use crate::dataset::ArrivalDataset;
use crate::dead_time;
use crate::delta::{delta_calc, IsotopeReference};
use crate::error::ProcessingError;
use crate::integrals::{
    correct_background, mass_windows, sum_windows, BackgroundDefinitions, Integral,
    IntegralDefinitions,
};
use crate::mass_cal::MassCalibration;
use crate::packages::{make_packages, Packages};
use crate::spectrum::{bin_dataset_shots, build_tof_axis, multi_range_indexes};
use history::active;

/// Default full width at half maximum of a peak in µs
pub const DEFAULT_PEAK_FWHM: f64 = 0.0646;

/// An externally supplied transformation run against a live processor
pub trait Macro {
    /// Run the macro. It may call any public operation of the processor.
    fn run(self, processor: &mut CrdFileProcessor) -> Result<(), ProcessingError>;
}

impl<F> Macro for F
where
    F: FnOnce(&mut CrdFileProcessor) -> Result<(), ProcessingError>,
{
    fn run(self, processor: &mut CrdFileProcessor) -> Result<(), ProcessingError> {
        self(processor)
    }
}

/// Processing session over one CRD measurement
#[derive(Debug, Clone)]
pub struct CrdFileProcessor {
    raw: Arc<ArrivalDataset>,
    shots: Vec<usize>,

    tof: Option<Vec<f64>>,
    data: Option<Vec<f64>>,
    mass: Option<Vec<f64>>,
    packages: Option<Packages>,
    dead_time_applied: bool,

    def_mcal: Option<MassCalibration>,
    def_integrals: Option<IntegralDefinitions>,
    def_backgrounds: Option<BackgroundDefinitions>,
    peak_fwhm: f64,
    background_correction: bool,

    integrals: Option<Vec<Integral>>,
    integrals_pkg: Option<Vec<Vec<Integral>>>,
    integrals_delta: Option<Vec<Integral>>,
    integrals_delta_pkg: Option<Vec<Vec<Integral>>>,

    applied_filters: AppliedFilters,
}

impl CrdFileProcessor {
    /// Open a session over a dataset. No spectrum is built yet.
    pub fn new(dataset: ArrivalDataset) -> Self {
        Self::from_shared(Arc::new(dataset))
    }

    /// Open a session over a dataset shared with other sessions
    pub fn from_shared(raw: Arc<ArrivalDataset>) -> Self {
        let shots = (0..raw.nof_shots()).collect();
        Self {
            raw,
            shots,
            tof: None,
            data: None,
            mass: None,
            packages: None,
            dead_time_applied: false,
            def_mcal: None,
            def_integrals: None,
            def_backgrounds: None,
            peak_fwhm: DEFAULT_PEAK_FWHM,
            background_correction: true,
            integrals: None,
            integrals_pkg: None,
            integrals_delta: None,
            integrals_delta_pkg: None,
            applied_filters: AppliedFilters::default(),
        }
    }

    // ---- accessors ----

    /// The raw dataset
    pub fn dataset(&self) -> &ArrivalDataset {
        &self.raw
    }

    /// Name of the measurement
    pub fn name(&self) -> &str {
        self.raw.name()
    }

    /// Acquisition timestamp
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.raw.timestamp()
    }

    /// Raw ids of the shots still in use
    pub fn shot_ids(&self) -> &[usize] {
        &self.shots
    }

    /// Number of shots still in use
    pub fn nof_shots(&self) -> usize {
        self.shots.len()
    }

    /// Ion count of each working shot
    pub fn ions_per_shot(&self) -> Vec<u32> {
        let ions = self.raw.ions_per_shot();
        self.shots.iter().map(|&s| ions[s]).collect()
    }

    /// Time axis in µs
    pub fn tof(&self) -> Option<&[f64]> {
        self.tof.as_deref()
    }

    /// Spectrum counts
    pub fn data(&self) -> Option<&[f64]> {
        self.data.as_deref()
    }

    /// Mass axis in amu, available after [`Self::mass_calibration`]
    pub fn mass(&self) -> Option<&[f64]> {
        self.mass.as_deref()
    }

    /// Packages, if created
    pub fn package_set(&self) -> Option<&Packages> {
        self.packages.as_ref()
    }

    /// Spectrum of each package
    pub fn data_pkg(&self) -> Option<&[Vec<f64>]> {
        self.packages.as_ref().map(Packages::data)
    }

    /// Shot count of each package
    pub fn nof_shots_pkg(&self) -> Option<Vec<usize>> {
        self.packages.as_ref().map(Packages::shot_counts)
    }

    /// Whether the spectrum is dead time corrected
    pub fn dead_time_applied(&self) -> bool {
        self.dead_time_applied
    }

    /// Peak integrals
    pub fn integrals(&self) -> Option<&[Integral]> {
        self.integrals.as_deref()
    }

    /// Peak integrals of each package
    pub fn integrals_pkg(&self) -> Option<&[Vec<Integral>]> {
        self.integrals_pkg.as_deref()
    }

    /// δ-values of the integrals in ‰
    pub fn integrals_delta(&self) -> Option<&[Integral]> {
        self.integrals_delta.as_deref()
    }

    /// δ-values of each package in ‰
    pub fn integrals_delta_pkg(&self) -> Option<&[Vec<Integral>]> {
        self.integrals_delta_pkg.as_deref()
    }

    /// Recorded filter history
    pub fn applied_filters(&self) -> &AppliedFilters {
        &self.applied_filters
    }

    /// Replace the filter history, e.g. with the one of another measurement.
    ///
    /// Nothing is recalculated until [`Self::calculate_applied_filters`] runs.
    pub fn set_applied_filters(&mut self, filters: AppliedFilters) {
        self.applied_filters = filters;
    }

    /// Mass calibration points
    pub fn def_mcal(&self) -> Option<&MassCalibration> {
        self.def_mcal.as_ref()
    }

    /// Set or clear the mass calibration points
    pub fn set_def_mcal(&mut self, calibration: Option<MassCalibration>) {
        self.def_mcal = calibration;
    }

    /// Integral definitions
    pub fn def_integrals(&self) -> Option<&IntegralDefinitions> {
        self.def_integrals.as_ref()
    }

    /// Set or clear the integral definitions. Empty definitions clear them.
    pub fn set_def_integrals(&mut self, definitions: Option<IntegralDefinitions>) {
        self.def_integrals = definitions.filter(|d| !d.is_empty());
    }

    /// Background definitions
    pub fn def_backgrounds(&self) -> Option<&BackgroundDefinitions> {
        self.def_backgrounds.as_ref()
    }

    /// Set or clear the background definitions. Empty definitions clear them.
    pub fn set_def_backgrounds(&mut self, definitions: Option<BackgroundDefinitions>) {
        self.def_backgrounds = definitions.filter(|d| !d.is_empty());
    }

    /// Peak full width at half maximum in µs
    pub fn peak_fwhm(&self) -> f64 {
        self.peak_fwhm
    }

    /// Set the peak full width at half maximum in µs
    pub fn set_peak_fwhm(&mut self, fwhm: f64) -> Result<(), ProcessingError> {
        if !(fwhm.is_finite() && fwhm > 0.0) {
            return Err(ProcessingError::InvalidParameter(format!(
                "peak FWHM must be positive, got {fwhm}"
            )));
        }
        self.peak_fwhm = fwhm;
        Ok(())
    }

    /// Conversion factor from µs to bins
    pub fn us_to_chan(&self) -> f64 {
        self.raw.header().us_to_chan()
    }

    // ---- calibration persistence ----

    /// Current definitions and filter history as a calibration file
    pub fn calibration_file(&self) -> CalibrationFile {
        CalibrationFile {
            mass_calibration: self.def_mcal.clone(),
            integrals: self.def_integrals.clone(),
            backgrounds: self.def_backgrounds.clone(),
            applied_filters: self.applied_filters.clone(),
            peak_fwhm: Some(self.peak_fwhm),
            background_correction: Some(self.background_correction),
        }
    }

    /// Take over definitions and filter history from a calibration file.
    ///
    /// The file is validated before anything changes.
    pub fn apply_calibration(&mut self, calibration: &CalibrationFile) -> Result<(), ProcessingError> {
        if let Some(fwhm) = calibration.peak_fwhm {
            self.set_peak_fwhm(fwhm)?;
        }
        self.set_def_mcal(calibration.mass_calibration.clone());
        self.set_def_integrals(calibration.integrals.clone());
        self.set_def_backgrounds(calibration.backgrounds.clone());
        if let Some(bg_corr) = calibration.background_correction {
            self.background_correction = bg_corr;
        }
        self.applied_filters = calibration.applied_filters.clone();
        Ok(())
    }

    // ---- spectrum ----

    /// Build the time axis and the spectrum of all shots.
    ///
    /// Clears every filter result, packages and integrals. The filter history
    /// is kept. If a mass axis existed it is rebuilt from the calibration.
    pub fn spectrum_full(&mut self) -> Result<(), ProcessingError> {
        self.reset_shots();
        let data = bin_dataset_shots(&self.raw, &self.shots)?;
        let (tof, _) = build_tof_axis(self.raw.header(), data.len());

        let remap = self.mass.is_some();
        self.tof = Some(tof);
        self.data = Some(data);
        self.mass = None;
        if remap && self.def_mcal.is_some() {
            self.mass_calibration()?;
        }
        Ok(())
    }

    /// Restrict the spectrum to parts of the acquisition.
    ///
    /// `ranges` are 1-indexed, inclusive `(from, to)` shot ranges. They are
    /// sorted and must not overlap. This always starts from the full dataset
    /// and drops packages and other filter results.
    pub fn spectrum_part(&mut self, ranges: &[(usize, usize)]) -> Result<(), ProcessingError> {
        if ranges.is_empty() {
            return Err(ProcessingError::InvalidParameter(
                "at least one shot range is required".to_string(),
            ));
        }
        let mut sorted = ranges.to_vec();
        sorted.sort_unstable();
        if sorted.iter().any(|&(from, to)| from == 0 || to < from) {
            return Err(ProcessingError::InvalidParameter(
                "The `from, to` values in your range are not defined such that 1 <= `from` <= `to`."
                    .to_string(),
            ));
        }
        if sorted.windows(2).any(|pair| pair[0].1 >= pair[1].0) {
            return Err(ProcessingError::InvalidParameter(
                "Your ranges are not mutually exclusive.".to_string(),
            ));
        }

        self.applied_filters.spectrum_part = Some(FilterEntry::enabled(ranges.to_vec()));

        let nof_raw = self.raw.nof_shots();
        self.reset_shots();
        self.shots = multi_range_indexes(&sorted, nof_raw);

        let data = bin_dataset_shots(&self.raw, &self.shots)?;
        if self.tof.is_none() {
            let (tof, _) = build_tof_axis(self.raw.header(), data.len());
            self.tof = Some(tof);
        }
        self.data = Some(data);
        log::debug!("Restricted {} to {} shots", self.name(), self.shots.len());
        Ok(())
    }

    fn reset_shots(&mut self) {
        self.shots = (0..self.raw.nof_shots()).collect();
        self.packages = None;
        self.dead_time_applied = false;
        self.clear_integrals();
    }

    fn clear_integrals(&mut self) {
        self.integrals = None;
        self.integrals_pkg = None;
        self.integrals_delta = None;
        self.integrals_delta_pkg = None;
    }

    fn require_data(&self) -> Result<(), ProcessingError> {
        if self.data.is_none() {
            return Err(ProcessingError::NoSpectrum);
        }
        Ok(())
    }

    // ---- mass calibration ----

    /// Map the time axis to masses with the current calibration points.
    pub fn mass_calibration(&mut self) -> Result<(), ProcessingError> {
        let calibration = self
            .def_mcal
            .as_ref()
            .ok_or(ProcessingError::NoMassCalibrationDefined)?;
        let tof = self.tof.as_deref().ok_or(ProcessingError::NoSpectrum)?;
        self.mass = Some(calibration.apply(tof)?);
        Ok(())
    }

    /// Re-locate the calibration peaks in the current spectrum.
    ///
    /// `offset` is how far a peak may have wandered in µs and defaults to the
    /// peak FWHM. If fewer than two peaks are found again, the calibration is
    /// kept and a warning is logged.
    pub fn optimize_mcal(&mut self, offset: Option<f64>) -> Result<(), ProcessingError> {
        let calibration = self
            .def_mcal
            .as_ref()
            .ok_or(ProcessingError::NoMassCalibrationDefined)?;
        let (Some(tof), Some(data)) = (self.tof.as_deref(), self.data.as_deref()) else {
            return Err(ProcessingError::NoSpectrum);
        };

        let offset = offset.unwrap_or(self.peak_fwhm);
        if let Some(optimized) = calibration.optimize(tof, data, self.peak_fwhm, offset) {
            self.def_mcal = Some(optimized);
        }
        Ok(())
    }

    // ---- packages and dead time ----

    /// Split the working shots into packages of `shots_per_package` shots.
    pub fn packages(&mut self, shots_per_package: usize) -> Result<(), ProcessingError> {
        self.require_data()?;
        if self.dead_time_applied {
            return Err(ProcessingError::DeadTimeAlreadyApplied);
        }

        let (bin_start, bin_end) = self.raw.spectrum_bin_range();
        let packages = make_packages(
            shots_per_package,
            &self.shots,
            self.raw.shot_to_arrival_map(),
            self.raw.all_arrivals(),
            bin_start,
            bin_end,
        )?;

        self.applied_filters.packages = Some(FilterEntry::enabled(shots_per_package));
        self.packages = Some(packages);
        self.integrals_pkg = None;
        self.integrals_delta_pkg = None;
        Ok(())
    }

    /// Dead time correct the spectrum and every package.
    ///
    /// `dead_bins` is the number of bins after a detection in which the
    /// detector is blind. Without shots a warning is logged and nothing changes.
    pub fn dead_time_correction(&mut self, dead_bins: usize) -> Result<(), ProcessingError> {
        self.require_data()?;
        if self.dead_time_applied {
            return Err(ProcessingError::DeadTimeAlreadyApplied);
        }

        self.applied_filters.dead_time_corr = Some(FilterEntry::enabled(dead_bins));

        if self.shots.is_empty() {
            log::warn!("No data available; maybe all shots were filtered out?");
            return Ok(());
        }

        if let Some(data) = self.data.as_mut() {
            *data = dead_time::correct_row(data, self.shots.len(), dead_bins);
        }
        if let Some(packages) = self.packages.as_mut() {
            let counts = packages.shot_counts();
            let corrected = dead_time::correct(packages.data(), &counts, dead_bins)?;
            for (row, new) in packages.data_mut().iter_mut().zip(corrected) {
                *row = new;
            }
        }
        self.dead_time_applied = true;
        self.clear_integrals();
        Ok(())
    }

    // ---- integrals ----

    /// Integrate all defined peaks over the spectrum and the packages.
    ///
    /// With `bg_corr` set, backgrounds are subtracted where defined.
    pub fn integrals_calc(&mut self, bg_corr: bool) -> Result<(), ProcessingError> {
        let definitions = self.def_integrals.as_ref().ok_or(ProcessingError::NoIntegrals)?;
        let mass = self.mass.as_deref().ok_or(ProcessingError::NoMassCalibration)?;
        let data = self.data.as_deref().ok_or(ProcessingError::NoSpectrum)?;
        let package_data = self.packages.as_ref().map(Packages::data);

        let windows = mass_windows(mass, definitions.peaks());
        let mut set = sum_windows(data, &windows, package_data);

        if let Some(backgrounds) = self.def_backgrounds.as_ref().filter(|_| bg_corr) {
            let bg_windows = mass_windows(mass, backgrounds.windows());
            let bg_set = sum_windows(data, &bg_windows, package_data);
            let bg_names: Vec<String> = backgrounds.windows().iter().map(|w| w.name.clone()).collect();
            let peak_channels: Vec<usize> = windows.iter().map(Vec::len).collect();
            let bg_channels: Vec<usize> = bg_windows.iter().map(Vec::len).collect();
            correct_background(
                &mut set,
                &definitions.names(),
                &peak_channels,
                &bg_set,
                &bg_names,
                &bg_channels,
            );
        }

        self.background_correction = bg_corr;
        self.integrals = Some(set.integrals);
        self.integrals_pkg = set.packages;
        self.integrals_delta = None;
        self.integrals_delta_pkg = None;
        Ok(())
    }

    /// Calculate δ-values of the integrals against natural abundances.
    pub fn integrals_calc_delta(&mut self, reference: &dyn IsotopeReference) -> Result<(), ProcessingError> {
        let definitions = self.def_integrals.as_ref().ok_or(ProcessingError::NoIntegrals)?;
        let integrals = self
            .integrals
            .as_deref()
            .ok_or(ProcessingError::IntegralsNotCalculated)?;
        let names = definitions.names();

        let (delta, _) = delta_calc(&names, integrals, None, reference);
        self.integrals_delta = Some(delta);
        self.integrals_delta_pkg = self.integrals_pkg.as_ref().map(|rows| {
            rows.iter()
                .map(|row| delta_calc(&names, row, None, reference).0)
                .collect()
        });
        Ok(())
    }

    // ---- replay and macros ----

    /// Reset to the full spectrum and replay the filter history.
    pub fn calculate_applied_filters(&mut self) -> Result<(), ProcessingError> {
        self.spectrum_full()?;
        let filters = self.applied_filters.clone();

        if let Some(ranges) = active(&filters.spectrum_part) {
            self.spectrum_part(ranges)?;
        }
        if let Some(&max_ions) = active(&filters.max_ions_per_shot) {
            self.filter_max_ions_per_shot(max_ions)?;
        }
        if let Some(params) = active(&filters.max_ions_per_time) {
            self.filter_max_ions_per_time(params.max_ions, params.time_us)?;
        }
        if let Some(params) = active(&filters.max_ions_per_tof_window) {
            self.filter_max_ions_per_tof_window(params.max_ions, params.tof_window)?;
        }
        if let Some(&shots) = active(&filters.packages) {
            self.packages(shots)?;
        }
        if let Some(&max_ions) = active(&filters.max_ions_per_pkg) {
            self.filter_max_ions_per_pkg(max_ions)?;
        }
        if active(&filters.pkg_peirce_rejection).is_some() {
            if self.mass.is_none() && self.def_mcal.is_some() {
                self.mass_calibration()?;
            }
            self.integrals_calc(self.background_correction)?;
            self.filter_pkg_peirce_countrate()?;
        }
        if let Some(&dead_bins) = active(&filters.dead_time_corr) {
            self.dead_time_correction(dead_bins)?;
        }

        // replay rewrites entries with the same content, keep disabled ones as they were
        self.applied_filters = filters;
        log::debug!("Replayed filters on {}", self.name());
        Ok(())
    }

    /// Run a macro against this processor
    pub fn run_macro<M: Macro>(&mut self, script: M) -> Result<(), ProcessingError> {
        script.run(self)
    }
}
