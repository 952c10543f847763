//! Peirce's criterion for rejecting outliers from a normally distributed sample.
//!
//! The threshold for `n` doubtful observations out of `N` is found by the
//! iteration given by Gould (1855), see also Ross (2003). Starting with one
//! doubtful observation, every point whose squared deviation from the sample
//! mean exceeds `x² σ²` becomes a candidate. While the number of candidates
//! reaches the number assumed doubtful, the assumption is raised and the test
//! repeated.

use statrs::function::erf::erfc;

/// Result of an outlier rejection
#[derive(Debug, Clone, PartialEq)]
pub struct PeirceResult {
    /// Mean of the accepted values
    pub mean: f64,
    /// Sample standard deviation of the accepted values
    pub std_dev: f64,
    /// Rejected values in ascending order
    pub outliers: Vec<f64>,
    /// Indices of the rejected values in the input, ascending
    pub outlier_indices: Vec<usize>,
}

/// Squared threshold deviation ratio `x²` for `n` doubtful observations out of
/// `nof_obs`, with `m` unknowns estimated from the sample.
pub fn peirce_dev(nof_obs: usize, n: usize, m: usize) -> f64 {
    if nof_obs <= 1 || n == 0 || n >= nof_obs {
        return 0.0;
    }

    let big_n = nof_obs as f64;
    let n = n as f64;
    let m = m as f64;

    let q = (n.powf(n / big_n) * (big_n - n).powf((big_n - n) / big_n)) / big_n;

    let mut r_new = 1.0_f64;
    let mut r_old = 0.0_f64;
    let mut x2 = 0.0;
    let mut iterations = 0;
    while (r_new - r_old).abs() > big_n * 2.0e-16 && iterations < 1000 {
        iterations += 1;
        let mut ldiv = r_new.powf(n);
        if ldiv == 0.0 {
            ldiv = 1.0e-6;
        }
        let lambda = (q.powf(big_n) / ldiv).powf(1.0 / (big_n - n));
        x2 = 1.0 + (big_n - m - n) / n * (1.0 - lambda * lambda);
        r_old = r_new;
        if x2 < 0.0 {
            x2 = 0.0;
        } else {
            r_new = ((x2 - 1.0) / 2.0).exp() * erfc(x2.sqrt() / std::f64::consts::SQRT_2);
        }
    }
    x2
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Reject outliers from `sample` with Peirce's criterion.
///
/// Samples with fewer than three values are returned unchanged.
pub fn reject_outliers(sample: &[f64]) -> PeirceResult {
    let nof_obs = sample.len();
    if nof_obs < 3 {
        let (mean, std_dev) = if nof_obs == 0 {
            (f64::NAN, f64::NAN)
        } else {
            mean_std(sample)
        };
        return PeirceResult {
            mean,
            std_dev,
            outliers: Vec::new(),
            outlier_indices: Vec::new(),
        };
    }

    let (mean, std_dev) = mean_std(sample);
    let variance = std_dev * std_dev;

    let mut rejected: Vec<usize> = Vec::new();
    let mut doubtful = 1;
    while doubtful < nof_obs {
        let x2 = peirce_dev(nof_obs, doubtful, 1);
        let candidates: Vec<usize> = sample
            .iter()
            .enumerate()
            .filter(|(_, v)| (**v - mean).powi(2) > x2 * variance)
            .map(|(i, _)| i)
            .collect();

        if candidates.len() < doubtful {
            break;
        }
        doubtful = candidates.len() + 1;
        rejected = candidates;
    }

    let accepted: Vec<f64> = sample
        .iter()
        .enumerate()
        .filter(|(i, _)| rejected.binary_search(i).is_err())
        .map(|(_, &v)| v)
        .collect();
    let (mean, std_dev) = mean_std(&accepted);

    let mut outliers: Vec<f64> = rejected.iter().map(|&i| sample[i]).collect();
    outliers.sort_by(f64::total_cmp);

    PeirceResult {
        mean,
        std_dev,
        outliers,
        outlier_indices: rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ross_2003_example() {
        let data = [102.2, 90.0, 99.0, 102.0, 103.0, 100.2, 89.0, 98.1, 101.5, 102.0];
        let result = reject_outliers(&data);

        assert_eq!(result.outliers, vec![89.0, 90.0]);
        assert_eq!(result.outlier_indices, vec![1, 6]);
        assert!((result.mean - 100.9).abs() <= 0.1);
        assert!((result.std_dev - 1.66).abs() <= 0.1);
    }

    #[test]
    fn test_peirce_dev_table_values() {
        // Ross (2003), table 1: R for N = 10 is 1.878 for one and 1.570 for two doubtful values
        assert!((peirce_dev(10, 1, 1).sqrt() - 1.878).abs() < 1e-3);
        assert!((peirce_dev(10, 2, 1).sqrt() - 1.570).abs() < 1e-3);
        assert_eq!(peirce_dev(1, 1, 1), 0.0);
    }

    #[test]
    fn test_clean_sample_keeps_everything() {
        let data = [10.0, 10.2, 9.9, 10.1, 9.8, 10.0];
        let result = reject_outliers(&data);
        assert!(result.outliers.is_empty());
        assert!((result.mean - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_samples() {
        let result = reject_outliers(&[1.0, 100.0]);
        assert!(result.outlier_indices.is_empty());
        assert!(reject_outliers(&[]).mean.is_nan());
    }
}
