//! Peak integrals over mass windows, with optional background subtraction.
//!
//! Integrals are Poisson counts: the uncertainty of a sum of `c` counts is
//! `sqrt(c)`. Once packages exist, the aggregate integral is the sum over the
//! package integrals and its uncertainty the root of the summed squared
//! package uncertainties.

use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;

/// Integrated counts of one peak with their 1σ uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Integral {
    /// Summed (and possibly background corrected) counts
    pub value: f64,
    /// 1σ uncertainty
    pub uncertainty: f64,
}

impl Integral {
    /// Poisson integral of a count sum
    pub fn from_counts(value: f64) -> Self {
        Self {
            value,
            uncertainty: value.sqrt(),
        }
    }

    /// Sum the values and add the uncertainties in quadrature
    pub fn sum<'a>(integrals: impl IntoIterator<Item = &'a Integral>) -> Self {
        let (value, variance) = integrals
            .into_iter()
            .fold((0.0, 0.0), |(v, var), i| (v + i.value, var + i.uncertainty.powi(2)));
        Self {
            value,
            uncertainty: variance.sqrt(),
        }
    }
}

/// Named mass window in amu, bounds inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    /// Peak name, e.g. `54Fe`
    pub name: String,
    /// Lower mass limit
    pub lower: f64,
    /// Upper mass limit
    pub upper: f64,
}

impl PeakWindow {
    /// Create a new window
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
        }
    }
}

/// Integral definitions with unique peak names, in the order given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PeakWindow>", into = "Vec<PeakWindow>")]
pub struct IntegralDefinitions {
    peaks: Vec<PeakWindow>,
}

impl IntegralDefinitions {
    /// Create definitions, rejecting repeated peak names.
    pub fn new(peaks: Vec<PeakWindow>) -> Result<Self, ProcessingError> {
        for (i, peak) in peaks.iter().enumerate() {
            if peaks[..i].iter().any(|other| other.name == peak.name) {
                return Err(ProcessingError::DuplicatePeakName(peak.name.clone()));
            }
        }
        Ok(Self { peaks })
    }

    /// Peak windows
    pub fn peaks(&self) -> &[PeakWindow] {
        &self.peaks
    }

    /// Peak names in order
    pub fn names(&self) -> Vec<String> {
        self.peaks.iter().map(|p| p.name.clone()).collect()
    }

    /// Number of peaks
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Whether no peak is defined
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

impl TryFrom<Vec<PeakWindow>> for IntegralDefinitions {
    type Error = ProcessingError;

    fn try_from(peaks: Vec<PeakWindow>) -> Result<Self, Self::Error> {
        Self::new(peaks)
    }
}

impl From<IntegralDefinitions> for Vec<PeakWindow> {
    fn from(definitions: IntegralDefinitions) -> Self {
        definitions.peaks
    }
}

/// Background windows. A peak may have several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackgroundDefinitions {
    windows: Vec<PeakWindow>,
}

impl BackgroundDefinitions {
    /// Create background definitions
    pub fn new(windows: Vec<PeakWindow>) -> Self {
        Self { windows }
    }

    /// Background windows
    pub fn windows(&self) -> &[PeakWindow] {
        &self.windows
    }

    /// Whether no background is defined
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Integrals of the spectrum and, if packaged, of every package
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralSet {
    /// One integral per peak
    pub integrals: Vec<Integral>,
    /// One row of integrals per package
    pub packages: Option<Vec<Vec<Integral>>>,
}

/// Indices of the mass axis that fall into each window, `lower <= mass <= upper`
pub fn mass_windows<'a>(
    mass: &[f64],
    windows: impl IntoIterator<Item = &'a PeakWindow>,
) -> Vec<Vec<usize>> {
    windows
        .into_iter()
        .map(|w| {
            mass.iter()
                .enumerate()
                .filter(|(_, m)| **m >= w.lower && **m <= w.upper)
                .map(|(i, _)| i)
                .collect()
        })
        .collect()
}

fn window_sum(data: &[f64], window: &[usize]) -> f64 {
    window.iter().map(|&i| data[i]).sum()
}

/// Sum the spectrum over each window.
///
/// With package data, every package is integrated as well and the aggregate
/// integrals are derived from the package integrals.
pub fn sum_windows(
    data: &[f64],
    windows: &[Vec<usize>],
    package_data: Option<&[Vec<f64>]>,
) -> IntegralSet {
    let Some(package_data) = package_data else {
        return IntegralSet {
            integrals: windows
                .iter()
                .map(|w| Integral::from_counts(window_sum(data, w)))
                .collect(),
            packages: None,
        };
    };

    let packages: Vec<Vec<Integral>> = package_data
        .iter()
        .map(|row| {
            windows
                .iter()
                .map(|w| Integral::from_counts(window_sum(row, w)))
                .collect()
        })
        .collect();

    IntegralSet {
        integrals: aggregate(&packages, windows.len()),
        packages: Some(packages),
    }
}

/// Per-peak sums over package integrals
pub fn aggregate(packages: &[Vec<Integral>], nof_peaks: usize) -> Vec<Integral> {
    (0..nof_peaks)
        .map(|peak| Integral::sum(packages.iter().map(|row| &row[peak])))
        .collect()
}

/// Background level per channel and its uncertainty
fn background_rate(
    backgrounds: &[Integral],
    channels: &[usize],
    selection: &[usize],
) -> Option<(f64, f64)> {
    let total_channels: usize = selection.iter().map(|&i| channels[i]).sum();
    if total_channels == 0 {
        return None;
    }
    let total_channels = total_channels as f64;
    let counts: f64 = selection.iter().map(|&i| backgrounds[i].value).sum();
    let variance: f64 = selection
        .iter()
        .map(|&i| backgrounds[i].uncertainty.powi(2))
        .sum();
    Some((counts / total_channels, variance.sqrt() / total_channels))
}

fn subtract(integral: &mut Integral, rate: (f64, f64), peak_channels: usize) {
    let channels = peak_channels as f64;
    integral.value -= rate.0 * channels;
    integral.uncertainty = (integral.uncertainty.powi(2) + (rate.1 * channels).powi(2)).sqrt();
}

/// Subtract backgrounds from the peak integrals.
///
/// All background windows named like a peak are pooled, scaled to the
/// number of channels of the peak window, and subtracted. Uncertainties add
/// in quadrature. Peaks without background are left alone. Packages are
/// corrected one by one and the aggregate is recomputed from them.
pub fn correct_background(
    peaks: &mut IntegralSet,
    peak_names: &[String],
    peak_channels: &[usize],
    backgrounds: &IntegralSet,
    background_names: &[String],
    background_channels: &[usize],
) {
    for (peak, name) in peak_names.iter().enumerate() {
        let selection: Vec<usize> = background_names
            .iter()
            .enumerate()
            .filter(|(_, bg)| *bg == name)
            .map(|(i, _)| i)
            .collect();
        if selection.is_empty() {
            continue;
        }

        if let Some(rate) =
            background_rate(&backgrounds.integrals, background_channels, &selection)
        {
            subtract(&mut peaks.integrals[peak], rate, peak_channels[peak]);
        } else {
            log::debug!("Background windows of {name} are empty, no correction applied");
        }

        if let (Some(rows), Some(bg_rows)) = (peaks.packages.as_mut(), backgrounds.packages.as_ref()) {
            for (row, bg_row) in rows.iter_mut().zip(bg_rows) {
                if let Some(rate) = background_rate(bg_row, background_channels, &selection) {
                    subtract(&mut row[peak], rate, peak_channels[peak]);
                }
            }
        }
    }

    if let Some(rows) = peaks.packages.as_ref() {
        peaks.integrals = aggregate(rows, peak_names.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let result = IntegralDefinitions::new(vec![
            PeakWindow::new("54Fe", 53.8, 54.2),
            PeakWindow::new("54Fe", 55.8, 56.2),
        ]);
        assert!(matches!(result, Err(ProcessingError::DuplicatePeakName(name)) if name == "54Fe"));

        // backgrounds may repeat
        let bgs = BackgroundDefinitions::new(vec![
            PeakWindow::new("54Fe", 53.5, 53.7),
            PeakWindow::new("54Fe", 54.3, 54.5),
        ]);
        assert_eq!(bgs.windows().len(), 2);
    }

    #[test]
    fn test_mass_windows_inclusive() {
        let mass = [1.0, 1.5, 2.0, 2.5, 3.0];
        let windows = mass_windows(&mass, &[PeakWindow::new("a", 1.5, 2.5), PeakWindow::new("b", 9.0, 10.0)]);
        assert_eq!(windows, vec![vec![1, 2, 3], vec![]]);
    }

    #[test]
    fn test_poisson_uncertainty() {
        let data = [0.0, 4.0, 5.0, 0.0];
        let set = sum_windows(&data, &[vec![1, 2]], None);
        assert_eq!(set.integrals[0].value, 9.0);
        assert_eq!(set.integrals[0].uncertainty, 3.0);
        assert!(set.packages.is_none());
    }

    #[test]
    fn test_aggregate_from_packages() {
        let rows = vec![vec![1.0, 3.0], vec![2.0, 2.0]];
        let set = sum_windows(&[3.0, 5.0], &[vec![0, 1]], Some(rows.as_slice()));
        let packages = set.packages.unwrap();
        assert_eq!(packages[0][0], Integral::from_counts(4.0));
        assert_eq!(set.integrals[0].value, 8.0);
        assert!((set.integrals[0].uncertainty - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_background_correction() {
        // peak of 3 channels, two background windows with 2 channels each
        let mut peaks = IntegralSet {
            integrals: vec![Integral::from_counts(100.0), Integral::from_counts(50.0)],
            packages: None,
        };
        let backgrounds = IntegralSet {
            integrals: vec![Integral::from_counts(4.0), Integral::from_counts(8.0)],
            packages: None,
        };
        let names = vec!["a".to_string(), "b".to_string()];
        let bg_names = vec!["a".to_string(), "a".to_string()];

        correct_background(&mut peaks, &names, &[3, 3], &backgrounds, &bg_names, &[2, 2]);

        // 12 counts over 4 channels, times 3 peak channels
        assert!((peaks.integrals[0].value - 91.0).abs() < 1e-12);
        let expected_unc = (100.0 + (12.0_f64.sqrt() / 4.0 * 3.0).powi(2)).sqrt();
        assert!((peaks.integrals[0].uncertainty - expected_unc).abs() < 1e-12);
        assert_eq!(peaks.integrals[1], Integral::from_counts(50.0));
    }

    #[test]
    fn test_background_correction_packages() {
        let mut peaks = IntegralSet {
            integrals: vec![Integral::from_counts(30.0)],
            packages: Some(vec![vec![Integral::from_counts(10.0)], vec![Integral::from_counts(20.0)]]),
        };
        let backgrounds = IntegralSet {
            integrals: vec![Integral::from_counts(3.0)],
            packages: Some(vec![vec![Integral::from_counts(1.0)], vec![Integral::from_counts(2.0)]]),
        };
        let names = vec!["a".to_string()];

        correct_background(&mut peaks, &names, &[1], &backgrounds, &names, &[1]);

        let rows = peaks.packages.unwrap();
        assert_eq!(rows[0][0].value, 9.0);
        assert_eq!(rows[1][0].value, 18.0);
        assert_eq!(peaks.integrals[0].value, 27.0);
        let expected = (11.0_f64 + 22.0).sqrt();
        assert!((peaks.integrals[0].uncertainty - expected).abs() < 1e-12);
    }
}
