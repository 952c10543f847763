//! Shot and package filters of the processor.
//!
//! Every shot filter only decides which working shots to reject and hands
//! them to [`CrdFileProcessor::apply_individual_shots_filter`], which keeps
//! spectrum, packages and the working shot list in step.

use std::sync::Arc;

use super::{CrdFileProcessor, FilterEntry, MaxIonsPerTime, MaxIonsPerTofWindow};
use crate::error::ProcessingError;
use crate::filters;
use crate::integrals::aggregate;
use crate::peirce::reject_outliers;
use crate::spectrum::bin_dataset_shots;

impl CrdFileProcessor {
    fn check_shot_filter(&self, max_ions: u32) -> Result<(), ProcessingError> {
        if max_ions < 1 {
            return Err(ProcessingError::InvalidParameter(
                "The maximum number of ions must be >=1.".to_string(),
            ));
        }
        self.require_data()?;
        if self.dead_time_applied {
            return Err(ProcessingError::DeadTimeAlreadyApplied);
        }
        Ok(())
    }

    /// Working shots paired with their arrivals
    fn shot_arrivals(&self) -> impl Iterator<Item = (usize, &[u32])> + '_ {
        self.shots
            .iter()
            .map(move |&shot| (shot, self.raw.arrivals_of_shot(shot)))
    }

    /// Remove rejected shots from the spectrum, the packages and the working set.
    ///
    /// Shots that are not in the working set, e.g. because their package was
    /// dropped already, are ignored, so no shot is ever subtracted twice.
    pub(crate) fn apply_individual_shots_filter(&mut self, rejected: &[usize]) -> Result<(), ProcessingError> {
        let raw = Arc::clone(&self.raw);
        let mut in_use = vec![false; raw.nof_shots()];
        for &shot in &self.shots {
            in_use[shot] = true;
        }

        let mut removed = vec![false; raw.nof_shots()];
        let mut nof_removed = 0;
        for &shot in rejected {
            if shot < in_use.len() && in_use[shot] && !removed[shot] {
                removed[shot] = true;
                nof_removed += 1;
                if let Some(packages) = self.packages.as_mut() {
                    packages.remove_shot(shot, raw.arrivals_of_shot(shot));
                }
            }
        }
        if nof_removed == 0 {
            return Ok(());
        }

        self.shots.retain(|&shot| !removed[shot]);
        self.data = Some(bin_dataset_shots(&raw, &self.shots)?);
        self.clear_integrals();

        log::debug!(
            "Rejected {} shots, {} remaining",
            nof_removed,
            self.shots.len()
        );
        Ok(())
    }

    /// Reject every shot with more than `max_ions` ions.
    pub fn filter_max_ions_per_shot(&mut self, max_ions: u32) -> Result<(), ProcessingError> {
        self.check_shot_filter(max_ions)?;
        self.applied_filters.max_ions_per_shot = Some(FilterEntry::enabled(max_ions));

        let rejected = filters::shots_above(self.shot_arrivals(), max_ions);
        self.apply_individual_shots_filter(&rejected)
    }

    /// Reject shots with more than `max_ions` ions inside any window of
    /// `time_us` µs, e.g. from detector ringing.
    pub fn filter_max_ions_per_time(&mut self, max_ions: u32, time_us: f64) -> Result<(), ProcessingError> {
        self.check_shot_filter(max_ions)?;
        if !(time_us.is_finite() && time_us >= 0.0) {
            return Err(ProcessingError::InvalidParameter(format!(
                "time window must be a non-negative time, got {time_us}"
            )));
        }
        self.applied_filters.max_ions_per_time =
            Some(FilterEntry::enabled(MaxIonsPerTime { max_ions, time_us }));

        let window_bins = (time_us * self.us_to_chan()) as u32;
        let rejected = filters::reject_max_ions_per_time(self.shot_arrivals(), max_ions, window_bins);
        self.apply_individual_shots_filter(&rejected)
    }

    /// Reject shots with more than `max_ions` ions inside the time of flight
    /// window `tof_window` (start and stop in µs).
    pub fn filter_max_ions_per_tof_window(
        &mut self,
        max_ions: u32,
        tof_window: [f64; 2],
    ) -> Result<(), ProcessingError> {
        self.check_shot_filter(max_ions)?;
        let [start, stop] = tof_window;
        if !(start.is_finite() && stop.is_finite() && start <= stop) {
            return Err(ProcessingError::InvalidParameter(format!(
                "ToF window must be given as start <= stop, got [{start}, {stop}]"
            )));
        }
        self.applied_filters.max_ions_per_tof_window =
            Some(FilterEntry::enabled(MaxIonsPerTofWindow { max_ions, tof_window }));

        let header = self.raw.header();
        let window = (header.us_to_bin(start), header.us_to_bin(stop));
        let rejected = filters::reject_max_ions_per_tof_window(self.shot_arrivals(), max_ions, window);
        self.apply_individual_shots_filter(&rejected)
    }

    /// Drop every package with more than `max_ions` ions.
    ///
    /// The spectrum becomes the sum of the remaining packages.
    pub fn filter_max_ions_per_pkg(&mut self, max_ions: u32) -> Result<(), ProcessingError> {
        if max_ions < 1 {
            return Err(ProcessingError::InvalidParameter(
                "The maximum number of ions must be larger than 1.".to_string(),
            ));
        }
        let data_len = self.data.as_ref().map(Vec::len).ok_or(ProcessingError::NoSpectrum)?;
        if self.packages.is_none() {
            return Err(ProcessingError::NoPackages);
        }
        if self.dead_time_applied {
            return Err(ProcessingError::DeadTimeAlreadyApplied);
        }

        self.applied_filters.max_ions_per_pkg = Some(FilterEntry::enabled(max_ions));

        let Some(packages) = self.packages.as_mut() else {
            return Err(ProcessingError::NoPackages);
        };
        let limit = max_ions as f64;
        let drop: Vec<usize> = packages
            .totals()
            .iter()
            .enumerate()
            .filter(|(_, total)| **total > limit)
            .map(|(i, _)| i)
            .collect();

        let removed = packages.remove_packages(&drop);
        let data = packages.summed_data(data_len);
        log::debug!("Dropped {} packages with more than {} ions", drop.len(), max_ions);

        let mut dropped = vec![false; self.raw.nof_shots()];
        for shot in removed {
            dropped[shot] = true;
        }
        self.shots.retain(|&shot| !dropped[shot]);
        self.data = Some(data);
        self.clear_integrals();
        Ok(())
    }

    /// Drop packages whose total integrated counts are outliers by Peirce's criterion.
    ///
    /// Needs package integrals. The aggregate integrals, the spectrum and
    /// the shot count are recomputed from the packages that remain.
    pub fn filter_pkg_peirce_countrate(&mut self) -> Result<(), ProcessingError> {
        let data_len = self.data.as_ref().map(Vec::len).ok_or(ProcessingError::NoSpectrum)?;
        if self.packages.is_none() {
            return Err(ProcessingError::NoPackages);
        }
        let Some(integrals_pkg) = self.integrals_pkg.as_ref() else {
            return Err(ProcessingError::IntegralsNotCalculated);
        };

        let sums: Vec<f64> = integrals_pkg
            .iter()
            .map(|row| row.iter().map(|i| i.value).sum())
            .collect();
        let result = reject_outliers(&sums);
        log::info!(
            "Peirce criterion rejected {} / {} packages",
            result.outlier_indices.len(),
            sums.len()
        );

        self.applied_filters.pkg_peirce_rejection = Some(FilterEntry::enabled(()));

        let rejected = result.outlier_indices;
        let integrals_pkg: Vec<_> = integrals_pkg
            .iter()
            .enumerate()
            .filter(|(i, _)| rejected.binary_search(i).is_err())
            .map(|(_, row)| row.clone())
            .collect();
        let nof_peaks = self.integrals.as_ref().map_or(0, Vec::len);

        let Some(packages) = self.packages.as_mut() else {
            return Err(ProcessingError::NoPackages);
        };
        let removed = packages.remove_packages(&rejected);
        let data = packages.summed_data(data_len);

        let mut dropped = vec![false; self.raw.nof_shots()];
        for shot in removed {
            dropped[shot] = true;
        }
        self.shots.retain(|&shot| !dropped[shot]);
        self.data = Some(data);

        self.integrals = Some(aggregate(&integrals_pkg, nof_peaks));
        self.integrals_pkg = Some(integrals_pkg);
        self.integrals_delta = None;
        self.integrals_delta_pkg = None;
        Ok(())
    }
}
