//! Histogramming of ion arrivals into time-of-flight spectra.
//!
//! Spectra are dense `f64` arrays over an inclusive bin range. Counts start out
//! integral and only become fractional after dead time correction.

use crate::dataset::{ArrivalDataset, CrdHeader, ShotRange};
use crate::error::ProcessingError;

/// Where the time axis of a spectrum came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
    /// Built from the header bin range and time offset
    Header,
    /// Header range disagreed with the data, built from the bin length alone
    BinLengthOnly,
}

/// Sort arrival bins into a histogram over `bin_start..=bin_end`.
///
/// `data[i]` counts the arrivals equal to `bin_start + i`.
pub fn bin_arrivals<'a, I>(arrivals: I, bin_start: u32, bin_end: u32) -> Result<Vec<f64>, ProcessingError>
where
    I: IntoIterator<Item = &'a u32>,
{
    if bin_end < bin_start {
        return Err(ProcessingError::Range(format!(
            "bin range {bin_start}..={bin_end} is reversed"
        )));
    }

    let mut data = vec![0.0; (bin_end - bin_start) as usize + 1];
    for &arrival in arrivals {
        if arrival < bin_start || arrival > bin_end {
            return Err(ProcessingError::Range(format!(
                "arrival bin {arrival} outside of {bin_start}..={bin_end}"
            )));
        }
        data[(arrival - bin_start) as usize] += 1.0;
    }
    Ok(data)
}

/// Histogram the arrivals of a set of shots.
///
/// `shots` are indices into `shot_to_arrival_map`.
pub fn bin_shots(
    shots: &[usize],
    shot_to_arrival_map: &[ShotRange],
    all_arrivals: &[u32],
    bin_start: u32,
    bin_end: u32,
) -> Result<Vec<f64>, ProcessingError> {
    bin_arrivals(
        shots
            .iter()
            .flat_map(|&shot| all_arrivals[shot_to_arrival_map[shot].as_range()].iter()),
        bin_start,
        bin_end,
    )
}

/// Histogram the arrivals of a subset of a dataset's shots over its full bin range
pub fn bin_dataset_shots(dataset: &ArrivalDataset, shots: &[usize]) -> Result<Vec<f64>, ProcessingError> {
    let (bin_start, bin_end) = dataset.spectrum_bin_range();
    bin_shots(
        shots,
        dataset.shot_to_arrival_map(),
        dataset.all_arrivals(),
        bin_start,
        bin_end,
    )
}

/// Build the time-of-flight axis in microseconds for a spectrum of `data_len` bins.
///
/// The axis spans the header bin range: `(bin_start + i) * bin_length / 1e6 + delta_t * 1e6`.
/// If that range does not have `data_len` bins, a warning is logged and the
/// axis is rebuilt from the bin length alone, starting at zero.
pub fn build_tof_axis(header: &CrdHeader, data_len: usize) -> (Vec<f64>, AxisSource) {
    let bin_length_us = header.bin_length as f64 / 1e6;
    let offset_us = header.delta_t * 1e6;

    let header_len = (header.bin_end - header.bin_start) as usize + 1;
    if header_len == data_len {
        let axis = (0..data_len)
            .map(|i| (header.bin_start as f64 + i as f64) * bin_length_us + offset_us)
            .collect();
        return (axis, AxisSource::Header);
    }

    log::warn!(
        "Bin ranges in CRD file were of bad length ({header_len} vs {data_len} bins). \
         Creating ToF array without CRD header input."
    );
    let axis = (0..data_len).map(|i| i as f64 * bin_length_us).collect();
    (axis, AxisSource::BinLengthOnly)
}

/// Zero-based indices covered by 1-indexed, inclusive `(from, to)` ranges.
///
/// Ranges are clipped to `len`. They are expected sorted and disjoint.
pub fn multi_range_indexes(ranges: &[(usize, usize)], len: usize) -> Vec<usize> {
    ranges
        .iter()
        .flat_map(|&(from, to)| from.saturating_sub(1)..to.min(len))
        .collect()
}

/// Element-wise sum of equally long rows
pub fn sum_rows(rows: &[Vec<f64>], len: usize) -> Vec<f64> {
    let mut total = vec![0.0; len];
    for row in rows {
        for (acc, value) in total.iter_mut().zip(row) {
            *acc += value;
        }
    }
    total
}
