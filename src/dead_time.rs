//! Non-paralyzable dead time correction.
//!
//! After an ion is detected, the detector stays blind for `dead_bins` bins.
//! For bin `i` the number of shots that could still register an ion is
//!
//! ```text
//! n'[i] = shots - (data[i-1] + ... + data[i-k]),  k = min(i, dead_bins)
//! ```
//!
//! and the corrected count is `-shots * ln(1 - data[i] / n'[i])`. All `n'`
//! are taken from the uncorrected counts.
//!
//! Counts at or above `n'` have no finite correction. Such bins become NaN or
//! infinite and are reported with a warning, they are not clamped.

use crate::error::ProcessingError;

/// Correct one spectrum recorded over `shots` shots.
///
/// If `shots` is zero the data is returned unchanged and a warning is logged.
pub fn correct_row(data: &[f64], shots: usize, dead_bins: usize) -> Vec<f64> {
    if shots == 0 {
        log::warn!("No data available; maybe all shots were filtered out?");
        return data.to_vec();
    }

    let shots = shots as f64;
    let mut corrected = Vec::with_capacity(data.len());
    let mut window = 0.0;

    for (i, &counts) in data.iter().enumerate() {
        // running sum over data[i-k..i]
        if i > 0 {
            window += data[i - 1];
            if i > dead_bins {
                window -= data[i - 1 - dead_bins];
            }
        }
        let ndash = shots - window;
        corrected.push(-shots * (1.0 - counts / ndash).ln());
    }

    let non_finite = corrected.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        log::warn!(
            "Dead time correction produced {} non-finite bins, counts exceed the available shots",
            non_finite
        );
    }
    corrected
}

/// Correct several spectra, each with its own shot count.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidParameter`] if the number of rows and
/// shot counts differ.
pub fn correct(
    data_rows: &[Vec<f64>],
    shots_per_row: &[usize],
    dead_bins: usize,
) -> Result<Vec<Vec<f64>>, ProcessingError> {
    if data_rows.len() != shots_per_row.len() {
        return Err(ProcessingError::InvalidParameter(format!(
            "{} spectra but {} shot counts given",
            data_rows.len(),
            shots_per_row.len()
        )));
    }

    Ok(data_rows
        .iter()
        .zip(shots_per_row)
        .map(|(row, &shots)| correct_row(row, shots, dead_bins))
        .collect())
}
