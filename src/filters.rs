//! Shot rejection masks.
//!
//! The functions here only decide which shots to reject. Applying the decision
//! to spectra and packages is the job of the processor.

/// Shots with more than `max_ions` ions.
pub fn shots_above<'a>(
    shots: impl IntoIterator<Item = (usize, &'a [u32])>,
    max_ions: u32,
) -> Vec<usize> {
    shots
        .into_iter()
        .filter(|(_, arrivals)| arrivals.len() > max_ions as usize)
        .map(|(shot, _)| shot)
        .collect()
}

/// Shots in which some time window of `window_bins` bins holds more than
/// `max_ions` arrivals.
///
/// A window starts at every arrival `t` and covers `t..=t + window_bins`.
/// Shots with no more than `max_ions` ions in total are skipped.
pub fn reject_max_ions_per_time<'a>(
    shots: impl IntoIterator<Item = (usize, &'a [u32])>,
    max_ions: u32,
    window_bins: u32,
) -> Vec<usize> {
    let max_ions = max_ions as usize;
    let mut sorted = Vec::new();

    shots
        .into_iter()
        .filter(|(_, arrivals)| arrivals.len() > max_ions)
        .filter_map(|(shot, arrivals)| {
            sorted.clear();
            sorted.extend_from_slice(arrivals);
            sorted.sort_unstable();

            let mut end = 0;
            for (start, &first) in sorted.iter().enumerate() {
                let limit = first.saturating_add(window_bins);
                while end < sorted.len() && sorted[end] <= limit {
                    end += 1;
                }
                if end - start > max_ions {
                    return Some(shot);
                }
            }
            None
        })
        .collect()
}

/// Shots with more than `max_ions` arrivals inside the fixed bin window
/// `window.0..=window.1`.
pub fn reject_max_ions_per_tof_window<'a>(
    shots: impl IntoIterator<Item = (usize, &'a [u32])>,
    max_ions: u32,
    window: (u32, u32),
) -> Vec<usize> {
    let max_ions = max_ions as usize;
    let (low, high) = window;

    shots
        .into_iter()
        .filter(|(_, arrivals)| arrivals.len() > max_ions)
        .filter(|(_, arrivals)| {
            arrivals
                .iter()
                .filter(|&&bin| bin >= low && bin <= high)
                .count()
                > max_ions
        })
        .map(|(shot, _)| shot)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shots(data: &[Vec<u32>]) -> Vec<(usize, &[u32])> {
        data.iter().enumerate().map(|(i, a)| (i, a.as_slice())).collect()
    }

    #[test]
    fn test_shots_above() {
        let data = vec![vec![], vec![1, 2], vec![3], vec![1, 2, 3, 4, 5], vec![1, 2, 3]];
        assert_eq!(shots_above(shots(&data), 3), vec![3]);
        assert_eq!(shots_above(shots(&data), 1), vec![1, 3, 4]);
    }

    #[test]
    fn test_max_ions_per_time() {
        let data = vec![
            // three ions within 5 bins
            vec![100, 102, 104],
            // spread out
            vec![100, 200, 300],
            // unsorted, clustered at the end
            vec![500, 10, 498, 499],
            // below the pre-filter
            vec![1, 1],
        ];
        assert_eq!(reject_max_ions_per_time(shots(&data), 2, 5), vec![0, 2]);
        // window edge is inclusive
        assert_eq!(reject_max_ions_per_time(shots(&data), 2, 4), vec![0, 2]);
        assert_eq!(reject_max_ions_per_time(shots(&data), 2, 3), vec![2]);
    }

    #[test]
    fn test_max_ions_per_tof_window() {
        let data = vec![vec![10, 11, 12, 50], vec![10, 50, 51, 52], vec![11, 12]];
        assert_eq!(reject_max_ions_per_tof_window(shots(&data), 2, (10, 20)), vec![0]);
        assert_eq!(reject_max_ions_per_tof_window(shots(&data), 1, (10, 20)), vec![0, 2]);
        assert!(reject_max_ions_per_tof_window(shots(&data), 3, (30, 100)).is_empty());
    }
}
