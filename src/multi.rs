//! Processing many measurements with the configuration of one.
//!
//! A [`MultiFileProcessor`] owns one [`CrdFileProcessor`] per measurement.
//! [`MultiFileProcessor::apply_to_all`] takes mass calibration, integral and
//! background definitions and the filter history of a main file and replays
//! them on every file. With the `parallel` feature the files are processed
//! on the rayon thread pool, one processor per worker.

use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::calibration::CalibrationFile;
use crate::delta::IsotopeReference;
use crate::error::{PersistenceError, ProcessingError};
use crate::integrals::{BackgroundDefinitions, IntegralDefinitions};
use crate::mass_cal::MassCalibration;
use crate::processor::{AppliedFilters, CrdFileProcessor};

/// Configuration taken over from the main file
#[derive(Debug, Clone)]
struct Template {
    mcal: Option<MassCalibration>,
    integrals: Option<IntegralDefinitions>,
    backgrounds: Option<BackgroundDefinitions>,
    applied_filters: AppliedFilters,
}

impl Template {
    fn from_processor(main: &CrdFileProcessor) -> Self {
        Self {
            mcal: main.def_mcal().cloned(),
            integrals: main.def_integrals().cloned(),
            backgrounds: main.def_backgrounds().cloned(),
            applied_filters: main.applied_filters().clone(),
        }
    }
}

/// Options of [`MultiFileProcessor::apply_to_all`]
#[derive(Clone, Copy, Default)]
pub struct ApplyOptions<'a> {
    /// Re-locate the calibration peaks in every secondary file
    pub optimize_mcal: bool,
    /// Subtract backgrounds where the main file defines them
    pub background_correction: bool,
    /// Calculate δ-values against this reference
    pub reference: Option<&'a (dyn IsotopeReference + Sync)>,
}

/// A set of measurements processed together
#[derive(Debug, Clone, Default)]
pub struct MultiFileProcessor {
    files: Vec<CrdFileProcessor>,
}

impl MultiFileProcessor {
    /// Create from already opened processors
    pub fn new(files: Vec<CrdFileProcessor>) -> Self {
        Self { files }
    }

    /// All processors in order
    pub fn files(&self) -> &[CrdFileProcessor] {
        &self.files
    }

    /// Mutable access to all processors
    pub fn files_mut(&mut self) -> &mut [CrdFileProcessor] {
        &mut self.files
    }

    /// Number of open files
    pub fn num_of_files(&self) -> usize {
        self.files.len()
    }

    /// Append more processors. No sorting is done.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = CrdFileProcessor>) {
        self.files.extend(files);
    }

    /// Build the full spectrum of every file
    pub fn read_files(&mut self) -> Result<(), ProcessingError> {
        for file in &mut self.files {
            file.spectrum_full()?;
        }
        Ok(())
    }

    /// Mean peak FWHM over all files, `None` without files
    pub fn peak_fwhm(&self) -> Option<f64> {
        if self.files.is_empty() {
            return None;
        }
        let sum: f64 = self.files.iter().map(CrdFileProcessor::peak_fwhm).sum();
        Some(sum / self.files.len() as f64)
    }

    /// Set the same peak FWHM for every file
    pub fn set_peak_fwhm(&mut self, fwhm: f64) -> Result<(), ProcessingError> {
        for file in &mut self.files {
            file.set_peak_fwhm(fwhm)?;
        }
        Ok(())
    }

    /// Load a calibration for every file.
    ///
    /// The primary calibration of a file is `<dir>/<name>.json`. If it does
    /// not exist, `secondary` is used if given. Files without any calibration
    /// are left alone. Returns how many files got a calibration.
    pub fn load_calibrations(&mut self, dir: &Path, secondary: Option<&Path>) -> Result<usize, PersistenceError> {
        let fallback = match secondary.filter(|p| p.is_file()) {
            Some(path) => Some(CalibrationFile::load(path)?),
            None => None,
        };

        let mut loaded = 0;
        for file in &mut self.files {
            let primary = dir.join(format!("{}.json", file.name()));
            let calibration = if primary.is_file() {
                CalibrationFile::load(&primary)?
            } else if let Some(cal) = &fallback {
                cal.clone()
            } else {
                continue;
            };
            match file.apply_calibration(&calibration) {
                Ok(()) => loaded += 1,
                Err(e) => log::warn!("Calibration for {} rejected: {}", file.name(), e),
            }
        }
        Ok(loaded)
    }

    /// Process every file with the configuration of the file at `main`.
    ///
    /// The main file is processed first and any error on it aborts. The
    /// result of every other file is returned in file order, the entry of the
    /// main file is always `Ok`.
    pub fn apply_to_all(
        &mut self,
        main: usize,
        options: ApplyOptions<'_>,
    ) -> Result<Vec<Result<(), ProcessingError>>, ProcessingError> {
        let nof_files = self.files.len();
        let main_file = self.files.get_mut(main).ok_or_else(|| {
            ProcessingError::Range(format!("main file {main} does not exist, {nof_files} files open"))
        })?;

        let template = Template::from_processor(main_file);
        let bg_corr = options.background_correction && template.backgrounds.is_some();

        if main_file.tof().is_none() {
            main_file.spectrum_full()?;
        }
        if main_file.mass().is_none() && main_file.def_mcal().is_some() {
            main_file.mass_calibration()?;
        }
        finish_file(main_file, bg_corr, options.reference)?;
        log::info!("Processed main file {}", main_file.name());

        let process = |(index, file): (usize, &mut CrdFileProcessor)| {
            if index == main {
                return Ok(());
            }
            let result = process_secondary(file, &template, options.optimize_mcal, bg_corr, options.reference);
            match &result {
                Ok(()) => log::info!("Processed {}", file.name()),
                Err(e) => log::warn!("Processing {} failed: {}", file.name(), e),
            }
            result
        };

        #[cfg(feature = "parallel")]
        let results = self.files.par_iter_mut().enumerate().map(process).collect();
        #[cfg(not(feature = "parallel"))]
        let results = self.files.iter_mut().enumerate().map(process).collect();

        Ok(results)
    }

    /// Close the files at `ids`.
    ///
    /// If `main_id` is given and the main file stays open, its new index is
    /// returned. Out of range ids are ignored.
    pub fn close_selected_files(&mut self, ids: &[usize], main_id: Option<usize>) -> Option<usize> {
        let mut close = vec![false; self.files.len()];
        for &id in ids {
            if let Some(flag) = close.get_mut(id) {
                *flag = true;
            }
        }

        let new_main = main_id
            .filter(|&id| id < close.len() && !close[id])
            .map(|id| close[..id].iter().filter(|&&c| !c).count());

        let mut index = 0;
        self.files.retain(|_| {
            let keep = !close[index];
            index += 1;
            keep
        });
        new_main
    }

    /// Close all files
    pub fn close_files(&mut self) {
        self.files.clear();
    }
}

fn process_secondary(
    file: &mut CrdFileProcessor,
    template: &Template,
    optimize_mcal: bool,
    bg_corr: bool,
    reference: Option<&(dyn IsotopeReference + Sync)>,
) -> Result<(), ProcessingError> {
    file.spectrum_full()?;
    if let Some(mcal) = &template.mcal {
        file.set_def_mcal(Some(mcal.clone()));
        file.mass_calibration()?;
        if optimize_mcal {
            file.optimize_mcal(None)?;
            file.mass_calibration()?;
        }
    }
    if template.backgrounds.is_some() {
        file.set_def_backgrounds(template.backgrounds.clone());
    }
    if template.integrals.is_some() {
        file.set_def_integrals(template.integrals.clone());
    }
    file.set_applied_filters(template.applied_filters.clone());
    finish_file(file, bg_corr, reference)
}

/// Replay the filters, then integrate
fn finish_file(
    file: &mut CrdFileProcessor,
    bg_corr: bool,
    reference: Option<&(dyn IsotopeReference + Sync)>,
) -> Result<(), ProcessingError> {
    file.calculate_applied_filters()?;
    if file.def_integrals().is_none() {
        return Ok(());
    }
    if file.mass().is_none() {
        file.mass_calibration()?;
    }
    file.integrals_calc(bg_corr)?;
    if let Some(reference) = reference {
        file.integrals_calc_delta(reference)?;
    }
    Ok(())
}
