//! Packaging of shots into contiguous, fixed-size batches.
//!
//! Every package carries its own spectrum and the raw ids of the shots it
//! holds, so the package shot count is always the number of member shots.
//! Package ids are assigned once when packaging and stay stable while
//! packages are dropped, which keeps the owner lookup valid.

use std::collections::HashMap;

use crate::dataset::ShotRange;
use crate::error::ProcessingError;
use crate::spectrum::{bin_shots, sum_rows};

/// Spectra and shot bookkeeping for a partition of the shots into packages
#[derive(Debug, Clone, PartialEq)]
pub struct Packages {
    shots_per_package: usize,
    ids: Vec<usize>,
    data: Vec<Vec<f64>>,
    members: Vec<Vec<usize>>,
    owner: HashMap<usize, usize>,
    bin_start: u32,
}

/// Split `shots` into contiguous packages of `shots_per_package` shots each.
///
/// The last package holds the remainder and may be shorter. Each package is
/// histogrammed over `bin_start..=bin_end`, the range of the full spectrum.
///
/// # Errors
///
/// Returns [`ProcessingError::Range`] if `shots_per_package` is zero or not
/// smaller than the number of shots.
pub fn make_packages(
    shots_per_package: usize,
    shots: &[usize],
    shot_to_arrival_map: &[ShotRange],
    all_arrivals: &[u32],
    bin_start: u32,
    bin_end: u32,
) -> Result<Packages, ProcessingError> {
    if shots_per_package < 1 || shots_per_package >= shots.len() {
        return Err(ProcessingError::Range(format!(
            "Number of shots per package must be between 1 and {}, but is {}.",
            shots.len(),
            shots_per_package
        )));
    }

    let mut ids = Vec::new();
    let mut data = Vec::new();
    let mut members = Vec::new();
    let mut owner = HashMap::with_capacity(shots.len());

    for (id, chunk) in shots.chunks(shots_per_package).enumerate() {
        data.push(bin_shots(chunk, shot_to_arrival_map, all_arrivals, bin_start, bin_end)?);
        for &shot in chunk {
            owner.insert(shot, id);
        }
        members.push(chunk.to_vec());
        ids.push(id);
    }

    log::debug!(
        "Created {} packages of {} shots",
        ids.len(),
        shots_per_package
    );

    Ok(Packages {
        shots_per_package,
        ids,
        data,
        members,
        owner,
        bin_start,
    })
}

impl Packages {
    /// Requested number of shots per package
    pub fn shots_per_package(&self) -> usize {
        self.shots_per_package
    }

    /// Number of packages left
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether all packages were dropped
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Stable ids of the remaining packages, in acquisition order
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Spectrum of each package
    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Mutable spectra, used to apply corrections row by row
    pub(crate) fn data_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.data
    }

    /// Raw shot ids held by the package at `position`
    pub fn members(&self, position: usize) -> &[usize] {
        &self.members[position]
    }

    /// Number of shots in each package
    pub fn shot_counts(&self) -> Vec<usize> {
        self.members.iter().map(Vec::len).collect()
    }

    /// Total number of shots over all packages
    pub fn total_shots(&self) -> usize {
        self.members.iter().map(Vec::len).sum()
    }

    /// Total counts of each package
    pub fn totals(&self) -> Vec<f64> {
        self.data.iter().map(|row| row.iter().sum()).collect()
    }

    /// Element-wise sum over all package spectra
    pub fn summed_data(&self, len: usize) -> Vec<f64> {
        sum_rows(&self.data, len)
    }

    /// Position of the package with the given id
    pub fn position_of(&self, id: usize) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Position of the package holding the raw shot, if it is still packaged
    pub fn position_of_shot(&self, shot: usize) -> Option<usize> {
        self.owner.get(&shot).and_then(|&id| self.position_of(id))
    }

    /// Take one shot out of its package.
    ///
    /// The shot's arrivals are subtracted from the package spectrum and the
    /// package loses one shot. Returns `false` if no remaining package holds
    /// the shot, in which case nothing changes.
    pub fn remove_shot(&mut self, shot: usize, arrivals: &[u32]) -> bool {
        let Some(position) = self.position_of_shot(shot) else {
            return false;
        };

        let row = &mut self.data[position];
        for &arrival in arrivals {
            row[(arrival - self.bin_start) as usize] -= 1.0;
        }
        self.members[position].retain(|&member| member != shot);
        self.owner.remove(&shot);
        true
    }

    /// Drop packages by position and return the raw shot ids they held.
    pub fn remove_packages(&mut self, positions: &[usize]) -> Vec<usize> {
        let mut removed = Vec::new();
        let mut keep = vec![true; self.ids.len()];
        for &position in positions {
            if let Some(flag) = keep.get_mut(position) {
                *flag = false;
            }
        }

        let mut position = 0;
        let mut ids = Vec::with_capacity(self.ids.len());
        let mut data = Vec::with_capacity(self.ids.len());
        let mut members = Vec::with_capacity(self.ids.len());
        for ((id, row), shots) in self
            .ids
            .drain(..)
            .zip(self.data.drain(..))
            .zip(self.members.drain(..))
        {
            if keep[position] {
                ids.push(id);
                data.push(row);
                members.push(shots);
            } else {
                for shot in &shots {
                    self.owner.remove(shot);
                }
                removed.extend(shots);
            }
            position += 1;
        }

        self.ids = ids;
        self.data = data;
        self.members = members;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(ions: &[usize]) -> Vec<ShotRange> {
        let mut start = 0;
        ions.iter()
            .map(|&n| {
                let range = ShotRange::new(start, start + n);
                start += n;
                range
            })
            .collect()
    }

    // five shots with 1, 2, 0, 1, 3 ions
    fn fixture() -> (Vec<ShotRange>, Vec<u32>) {
        (map(&[1, 2, 0, 1, 3]), vec![10, 11, 12, 10, 12, 12, 13])
    }

    #[test]
    fn test_make_packages_partitions_shots() {
        let (map, arrivals) = fixture();
        let packages = make_packages(2, &[0, 1, 2, 3, 4], &map, &arrivals, 10, 13).unwrap();

        assert_eq!(packages.len(), 3);
        assert_eq!(packages.shot_counts(), vec![2, 2, 1]);
        assert_eq!(packages.members(1), &[2, 3]);
        assert_eq!(packages.data()[0], vec![1.0, 1.0, 1.0, 0.0]);
        assert_eq!(packages.data()[2], vec![0.0, 0.0, 2.0, 1.0]);

        let full = bin_shots(&[0, 1, 2, 3, 4], &map, &arrivals, 10, 13).unwrap();
        assert_eq!(packages.summed_data(4), full);
        assert_eq!(packages.total_shots(), 5);
    }

    #[test]
    fn test_make_packages_range() {
        let (map, arrivals) = fixture();
        let shots = [0, 1, 2, 3, 4];
        assert!(matches!(
            make_packages(0, &shots, &map, &arrivals, 10, 13),
            Err(ProcessingError::Range(_))
        ));
        assert!(matches!(
            make_packages(5, &shots, &map, &arrivals, 10, 13),
            Err(ProcessingError::Range(_))
        ));
    }

    #[test]
    fn test_remove_shot_only_once() {
        let (map, arrivals) = fixture();
        let mut packages = make_packages(2, &[0, 1, 2, 3, 4], &map, &arrivals, 10, 13).unwrap();

        assert!(packages.remove_shot(1, &arrivals[1..3]));
        assert_eq!(packages.shot_counts(), vec![1, 2, 1]);
        assert_eq!(packages.data()[0], vec![1.0, 0.0, 0.0, 0.0]);

        assert!(!packages.remove_shot(1, &arrivals[1..3]));
        assert_eq!(packages.data()[0], vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_remove_packages_keeps_ids_stable() {
        let (map, arrivals) = fixture();
        let mut packages = make_packages(2, &[0, 1, 2, 3, 4], &map, &arrivals, 10, 13).unwrap();

        let removed = packages.remove_packages(&[0]);
        assert_eq!(removed, vec![0, 1]);
        assert_eq!(packages.ids(), &[1, 2]);
        assert_eq!(packages.position_of_shot(4), Some(1));
        assert_eq!(packages.position_of_shot(0), None);

        // shot of a dropped package is ignored
        assert!(!packages.remove_shot(1, &arrivals[1..3]));
        assert!(packages.remove_shot(4, &arrivals[4..7]));
        assert_eq!(packages.shot_counts(), vec![2, 0]);
        assert_eq!(packages.totals(), vec![1.0, 0.0]);
    }
}
