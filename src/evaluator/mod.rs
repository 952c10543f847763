//! # Integral Evaluator
//!
//! Combines the peak integrals of several measurements of the same sample,
//! normalizes them to a standard and computes δ-values with their
//! correlations.
//!
//! Integrals of all samples are summed peak by peak, uncertainties are added
//! in quadrature. Every sample must have the same peaks in the same order.

mod error;
mod io;

#[cfg(test)]
mod tests;

pub use error::EvaluatorError;
pub use io::{load_integral_evaluator, save_integral_evaluator, EvalFile, IntegralRecord};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::delta::{delta_calc, delta_label, IsotopeReference};
use crate::integrals::Integral;
use crate::processor::CrdFileProcessor;

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    name: String,
    timestamp: Option<NaiveDateTime>,
    integrals: Vec<Integral>,
    file: Option<PathBuf>,
}

/// Integrals of one or more measurements of a sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegralEvaluator {
    peaks: Option<Vec<String>>,
    samples: Vec<Sample>,
    standard: Option<Box<IntegralEvaluator>>,
    standard_timestamp: Option<NaiveDateTime>,
    correlation_set: BTreeSet<(usize, usize)>,
}

impl IntegralEvaluator {
    /// Empty evaluator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the integrals of one measurement.
    ///
    /// With `overwrite`, a sample of the same name is replaced instead of
    /// rejected.
    pub fn add_integral(&mut self, record: IntegralRecord, overwrite: bool) -> Result<(), EvaluatorError> {
        self.add_sample(record, None, overwrite)
    }

    /// Add the integrals stored in an integral file
    pub fn add_integral_file<P: AsRef<Path>>(&mut self, path: P, overwrite: bool) -> Result<(), EvaluatorError> {
        let path = path.as_ref();
        let record = IntegralRecord::load(path)?;
        let file = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.add_sample(record, Some(file), overwrite)
    }

    fn add_sample(
        &mut self,
        record: IntegralRecord,
        file: Option<PathBuf>,
        overwrite: bool,
    ) -> Result<(), EvaluatorError> {
        if record.peaks.len() != record.integrals.len() {
            return Err(EvaluatorError::ShapeMismatch {
                peaks: record.peaks.len(),
                integrals: record.integrals.len(),
            });
        }
        let existing = self.samples.iter().position(|s| s.name == record.name);
        if existing.is_some() && !overwrite {
            return Err(EvaluatorError::DuplicateSample(record.name));
        }
        match &self.peaks {
            Some(peaks) if *peaks != record.peaks => return Err(EvaluatorError::PeakMismatch),
            Some(_) => {}
            None => self.peaks = Some(record.peaks),
        }

        let sample = Sample {
            name: record.name,
            timestamp: record.timestamp,
            integrals: record.integrals,
            file,
        };
        match existing {
            Some(index) => self.samples[index] = sample,
            None => self.samples.push(sample),
        }
        Ok(())
    }

    /// Name of the evaluator, the name of the first sample added
    pub fn name(&self) -> Option<&str> {
        self.samples.first().map(|s| s.name.as_str())
    }

    /// Names of all samples in the order they were added
    pub fn names(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.name.as_str()).collect()
    }

    /// Peak names shared by all samples
    pub fn peaks(&self) -> Option<&[String]> {
        self.peaks.as_deref()
    }

    /// Acquisition timestamp of a sample
    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.samples
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.timestamp)
    }

    /// Integrals of a single sample
    pub fn sample_integrals(&self, name: &str) -> Option<&[Integral]> {
        self.samples
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.integrals.as_slice())
    }

    /// Integral files the samples were read from
    pub fn file_names(&self) -> Vec<&Path> {
        self.samples.iter().filter_map(|s| s.file.as_deref()).collect()
    }

    /// Summed integrals over all samples
    pub fn integrals(&self) -> Result<Vec<Integral>, EvaluatorError> {
        let peaks = self.peaks.as_ref().ok_or(EvaluatorError::NoSamples)?;
        Ok((0..peaks.len())
            .map(|peak| Integral::sum(self.samples.iter().map(|s| &s.integrals[peak])))
            .collect())
    }

    /// The standard this sample is normalized to
    pub fn standard(&self) -> Option<&IntegralEvaluator> {
        self.standard.as_deref()
    }

    /// Set the standard. It must have the same peaks as the samples.
    pub fn set_standard(&mut self, standard: IntegralEvaluator) -> Result<(), EvaluatorError> {
        if let (Some(peaks), Some(std_peaks)) = (&self.peaks, &standard.peaks) {
            if peaks != std_peaks {
                return Err(EvaluatorError::PeakMismatch);
            }
        }
        if standard.samples.is_empty() {
            return Err(EvaluatorError::NoSamples);
        }
        self.standard = Some(Box::new(standard));
        Ok(())
    }

    /// Time the standard was measured at
    pub fn standard_timestamp(&self) -> Option<NaiveDateTime> {
        self.standard_timestamp
    }

    /// Set the time the standard was measured at
    pub fn set_standard_timestamp(&mut self, timestamp: Option<NaiveDateTime>) {
        self.standard_timestamp = timestamp;
    }

    /// δ-values of the summed integrals in ‰.
    ///
    /// Normalized to the standard if one is set, otherwise to natural
    /// abundances.
    pub fn deltas(&self, reference: &dyn IsotopeReference) -> Result<Vec<Integral>, EvaluatorError> {
        Ok(self.delta_calc(reference)?.0)
    }

    fn delta_calc(
        &self,
        reference: &dyn IsotopeReference,
    ) -> Result<(Vec<Integral>, Vec<Option<(usize, usize)>>), EvaluatorError> {
        let peaks = self.peaks.as_ref().ok_or(EvaluatorError::NoSamples)?;
        let integrals = self.integrals()?;
        let standard = match &self.standard {
            Some(standard) if standard.peaks.as_ref() != Some(peaks) => {
                return Err(EvaluatorError::PeakMismatch)
            }
            Some(standard) => Some(standard.integrals()?),
            None => None,
        };
        Ok(delta_calc(peaks, &integrals, standard.as_deref(), reference))
    }

    /// Labels of the δ-values, `None` where no δ-value can be formed
    pub fn delta_labels(&self, reference: &dyn IsotopeReference) -> Result<Vec<Option<String>>, EvaluatorError> {
        let peaks = self.peaks.as_ref().ok_or(EvaluatorError::NoSamples)?;
        let (_, indices) = self.delta_calc(reference)?;
        Ok(indices
            .iter()
            .map(|pair| pair.and_then(|(nom, denom)| delta_label(&peaks[nom], &peaks[denom])))
            .collect())
    }

    /// Pairs of peaks whose δ-values are correlated
    pub fn correlation_set(&self) -> &BTreeSet<(usize, usize)> {
        &self.correlation_set
    }

    /// Replace the correlation set without checking it
    pub fn set_correlation_set(&mut self, correlations: BTreeSet<(usize, usize)>) {
        self.correlation_set = correlations;
    }

    /// Request the correlation of the δ-values of two peaks.
    ///
    /// Both δ-values must exist and share their denominator.
    pub fn add_correlation(
        &mut self,
        x: usize,
        y: usize,
        reference: &dyn IsotopeReference,
    ) -> Result<(), EvaluatorError> {
        let (_, indices) = self.delta_calc(reference)?;
        match (indices.get(x).copied().flatten(), indices.get(y).copied().flatten()) {
            (Some((_, dx)), Some((_, dy))) if dx == dy && x != y => {
                self.correlation_set.insert((x, y));
                Ok(())
            }
            _ => Err(EvaluatorError::IncompatibleCorrelation(x, y)),
        }
    }

    /// Correlation coefficients of all requested pairs.
    ///
    /// Needs a standard, since the coefficient depends on the uncertainty of
    /// the common denominator in both sample and standard.
    pub fn correlation_coefficients(
        &self,
        reference: &dyn IsotopeReference,
    ) -> Result<Vec<((usize, usize), f64)>, EvaluatorError> {
        let standard = self.standard.as_ref().ok_or(EvaluatorError::MissingStandard)?;
        let (deltas, indices) = self.delta_calc(reference)?;
        let integrals = self.integrals()?;
        let std_integrals = standard.integrals()?;

        self.correlation_set
            .iter()
            .map(|&(x, y)| {
                let Some((_, denom)) = indices.get(x).copied().flatten() else {
                    return Err(EvaluatorError::IncompatibleCorrelation(x, y));
                };
                let Some(&delta_y) = deltas.get(y) else {
                    return Err(EvaluatorError::IncompatibleCorrelation(x, y));
                };
                let rho = crate::delta::correlation_coefficient(
                    deltas[x],
                    delta_y,
                    integrals[denom],
                    std_integrals[denom],
                );
                Ok(((x, y), rho))
            })
            .collect()
    }
}

impl IntegralRecord {
    /// Take name, timestamp, peak names and integrals from a processed measurement
    pub fn from_processor(processor: &CrdFileProcessor) -> Option<Self> {
        Some(Self {
            name: processor.name().to_string(),
            timestamp: processor.timestamp(),
            peaks: processor.def_integrals()?.names(),
            integrals: processor.integrals()?.to_vec(),
        })
    }
}
