//! # Arrival Dataset
//!
//! The in-memory form of one CRD measurement as handed over by a file parser:
//! per-shot ion counts, a map from each shot to its slice of the arrival list,
//! and the flat list of arrival bin numbers in acquisition order.
//!
//! ```text
//! ions_per_shot        [ 0,  2,     1,  3       ]
//! shot_to_arrival_map  [0,0) [0,2) [2,3) [3,6)
//! all_arrivals         [ 17, 42,  20,  5, 9, 40 ]
//! ```
//!
//! A dataset is never modified after it is built. All derived state lives in
//! [`crate::processor::CrdFileProcessor`], which can share one dataset between
//! threads through an [`std::sync::Arc`].

mod error;

#[cfg(test)]
mod tests;

pub use error::DatasetError;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Header values of a CRD file that the processing engine depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdHeader {
    /// Length of one time bin in picoseconds
    pub bin_length: u32,

    /// First bin of the recorded range (inclusive)
    pub bin_start: u32,

    /// Last bin of the recorded range (inclusive)
    pub bin_end: u32,

    /// Time offset of the first bin in seconds
    pub delta_t: f64,

    /// Number of shots the header claims were recorded
    pub nof_shots: usize,

    /// Start of the acquisition
    #[serde(default)]
    pub start_date_time: Option<NaiveDateTime>,
}

impl CrdHeader {
    /// Create a new header without acquisition timestamp
    pub fn new(bin_length: u32, bin_start: u32, bin_end: u32, delta_t: f64, nof_shots: usize) -> Self {
        Self {
            bin_length,
            bin_start,
            bin_end,
            delta_t,
            nof_shots,
            start_date_time: None,
        }
    }

    /// Set the acquisition timestamp
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.start_date_time = Some(timestamp);
        self
    }

    /// Conversion factor from microseconds to bins
    pub fn us_to_chan(&self) -> f64 {
        1e6 / self.bin_length as f64
    }

    /// Convert a time of flight in microseconds into a bin number.
    ///
    /// Times before the first representable bin saturate at zero.
    pub fn us_to_bin(&self, time_us: f64) -> u32 {
        let bin = (time_us - self.delta_t * 1e6) * self.us_to_chan();
        if bin <= 0.0 {
            0
        } else {
            bin as u32
        }
    }

    fn validate(&self) -> Result<(), DatasetError> {
        if self.bin_length == 0 {
            return Err(DatasetError::InvalidHeader(
                "bin length must be larger than zero".to_string(),
            ));
        }
        if self.bin_end < self.bin_start {
            return Err(DatasetError::InvalidHeader(format!(
                "bin range {}..={} is reversed",
                self.bin_start, self.bin_end
            )));
        }
        Ok(())
    }
}

/// Half-open range `[start, end)` of one shot's arrivals in the arrival list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotRange {
    /// Index of the first arrival of the shot
    pub start: usize,
    /// One past the index of the last arrival of the shot
    pub end: usize,
}

impl ShotRange {
    /// Create a new shot range
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of arrivals in this shot
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the shot recorded no ions
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// The range as an index range into the arrival list
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Raw ion arrivals of one measurement, read-only after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRecord", into = "DatasetRecord")]
pub struct ArrivalDataset {
    name: String,
    header: CrdHeader,
    ions_per_shot: Vec<u32>,
    shot_to_arrival_map: Vec<ShotRange>,
    all_arrivals: Vec<u32>,
    arrival_range: Option<(u32, u32)>,
}

impl ArrivalDataset {
    /// Build a dataset from ions per shot and the flat arrival list.
    ///
    /// The shot to arrival map is derived from the ion counts.
    pub fn new(
        name: impl Into<String>,
        header: CrdHeader,
        ions_per_shot: Vec<u32>,
        all_arrivals: Vec<u32>,
    ) -> Result<Self, DatasetError> {
        let mut shot_to_arrival_map = Vec::with_capacity(ions_per_shot.len());
        let mut start = 0usize;
        for &ions in &ions_per_shot {
            let end = start + ions as usize;
            shot_to_arrival_map.push(ShotRange::new(start, end));
            start = end;
        }
        Self::from_parts(name, header, ions_per_shot, shot_to_arrival_map, all_arrivals)
    }

    /// Build a dataset from all three arrays, checking that they agree.
    pub fn from_parts(
        name: impl Into<String>,
        header: CrdHeader,
        ions_per_shot: Vec<u32>,
        shot_to_arrival_map: Vec<ShotRange>,
        all_arrivals: Vec<u32>,
    ) -> Result<Self, DatasetError> {
        header.validate()?;

        if shot_to_arrival_map.len() != ions_per_shot.len() {
            return Err(DatasetError::ShotCountMismatch {
                map: shot_to_arrival_map.len(),
                shots: ions_per_shot.len(),
            });
        }

        let mut expected_start = 0usize;
        for (shot, (range, &ions)) in shot_to_arrival_map.iter().zip(&ions_per_shot).enumerate() {
            if range.start != expected_start || range.end < range.start {
                return Err(DatasetError::NonContiguousShot(shot));
            }
            if range.len() != ions as usize {
                return Err(DatasetError::IonCountMismatch {
                    shot,
                    mapped: range.len(),
                    ions: ions as usize,
                });
            }
            expected_start = range.end;
        }

        if expected_start != all_arrivals.len() {
            return Err(DatasetError::ArrivalCountMismatch {
                expected: expected_start,
                found: all_arrivals.len(),
            });
        }

        if header.nof_shots != ions_per_shot.len() {
            log::debug!(
                "Header reports {} shots, dataset holds {}",
                header.nof_shots,
                ions_per_shot.len()
            );
        }

        let arrival_range = all_arrivals
            .iter()
            .fold(None, |acc: Option<(u32, u32)>, &bin| match acc {
                None => Some((bin, bin)),
                Some((lo, hi)) => Some((lo.min(bin), hi.max(bin))),
            });

        Ok(Self {
            name: name.into(),
            header,
            ions_per_shot,
            shot_to_arrival_map,
            all_arrivals,
            arrival_range,
        })
    }

    /// Name of the measurement, usually the file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header values
    pub fn header(&self) -> &CrdHeader {
        &self.header
    }

    /// Acquisition timestamp from the header
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.header.start_date_time
    }

    /// Number of ions recorded in each shot
    pub fn ions_per_shot(&self) -> &[u32] {
        &self.ions_per_shot
    }

    /// Range of each shot in the arrival list
    pub fn shot_to_arrival_map(&self) -> &[ShotRange] {
        &self.shot_to_arrival_map
    }

    /// All arrival bins in acquisition order
    pub fn all_arrivals(&self) -> &[u32] {
        &self.all_arrivals
    }

    /// Number of shots acquired
    pub fn nof_shots(&self) -> usize {
        self.ions_per_shot.len()
    }

    /// Arrival bins of a single shot
    pub fn arrivals_of_shot(&self, shot: usize) -> &[u32] {
        &self.all_arrivals[self.shot_to_arrival_map[shot].as_range()]
    }

    /// Smallest and largest arrival bin, `None` if no ion was recorded
    pub fn arrival_range(&self) -> Option<(u32, u32)> {
        self.arrival_range
    }

    /// Bin range all spectra of this dataset are histogrammed over.
    ///
    /// This is the range spanned by the arrivals. Datasets without a single
    /// arrival fall back to the header range.
    pub fn spectrum_bin_range(&self) -> (u32, u32) {
        self.arrival_range
            .unwrap_or((self.header.bin_start, self.header.bin_end))
    }
}

/// Serialized form of a dataset: the shot map is implied by the ion counts
#[derive(Serialize, Deserialize)]
struct DatasetRecord {
    name: String,
    header: CrdHeader,
    ions_per_shot: Vec<u32>,
    all_arrivals: Vec<u32>,
}

impl TryFrom<DatasetRecord> for ArrivalDataset {
    type Error = DatasetError;

    fn try_from(record: DatasetRecord) -> Result<Self, Self::Error> {
        ArrivalDataset::new(
            record.name,
            record.header,
            record.ions_per_shot,
            record.all_arrivals,
        )
    }
}

impl From<ArrivalDataset> for DatasetRecord {
    fn from(dataset: ArrivalDataset) -> Self {
        Self {
            name: dataset.name,
            header: dataset.header,
            ions_per_shot: dataset.ions_per_shot,
            all_arrivals: dataset.all_arrivals,
        }
    }
}
