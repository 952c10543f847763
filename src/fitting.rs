//! Levenberg-Marquardt least squares for small models.
//!
//! Both the mass calibration and the Gaussian peak search fit a handful of
//! parameters against at most a few hundred points, so the Jacobian is built
//! by forward differences and the damped normal equations are solved directly.

use nalgebra::{DMatrix, DVector};

use crate::error::ProcessingError;

/// Stopping criteria for [`least_squares`]
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Maximum number of accepted or rejected steps
    pub max_iterations: usize,
    /// Relative change of the squared residual sum that counts as converged
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-12,
        }
    }
}

/// Fit `model(x, params)` to the points `(x, y)` starting from `initial`.
///
/// Returns the parameters with the smallest squared residual sum found.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidParameter`] if `x` and `y` differ in
/// length or there are fewer points than parameters, and
/// [`ProcessingError::Fit`] if the model cannot be evaluated at the start.
pub fn least_squares<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    options: FitOptions,
) -> Result<Vec<f64>, ProcessingError>
where
    F: Fn(f64, &[f64]) -> f64,
{
    if x.len() != y.len() {
        return Err(ProcessingError::InvalidParameter(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    if x.len() < initial.len() {
        return Err(ProcessingError::InvalidParameter(format!(
            "{} points cannot determine {} parameters",
            x.len(),
            initial.len()
        )));
    }

    let residuals = |params: &[f64]| -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter().zip(y).map(|(&xi, &yi)| yi - model(xi, params)),
        )
    };

    let mut params = initial.to_vec();
    let mut r = residuals(&params);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(ProcessingError::Fit(
            "model is not finite at the initial parameters".to_string(),
        ));
    }

    let mut lambda = 1e-3;
    for _ in 0..options.max_iterations {
        let jacobian = jacobian(&model, x, &params);
        let jtj = jacobian.transpose() * &jacobian;
        let gradient = jacobian.transpose() * &r;

        let mut lhs = jtj.clone();
        for j in 0..params.len() {
            lhs[(j, j)] += lambda * jtj[(j, j)].max(1e-12);
        }

        let Some(step) = lhs.lu().solve(&gradient) else {
            lambda *= 10.0;
            if lambda > 1e16 {
                break;
            }
            continue;
        };

        let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
        let trial_r = residuals(&trial);
        let trial_cost = trial_r.norm_squared();

        if trial_cost.is_finite() && trial_cost <= cost {
            let improvement = cost - trial_cost;
            params = trial;
            r = trial_r;
            cost = trial_cost;
            lambda = (lambda / 10.0).max(1e-12);
            if improvement <= options.tolerance * cost.max(f64::MIN_POSITIVE)
                || step.norm() <= options.tolerance * (norm(&params) + options.tolerance)
            {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e16 {
                break;
            }
        }
    }

    Ok(params)
}

/// Forward difference Jacobian of the model, `d model(x_i) / d p_j`.
///
/// Residuals are `y - model`, so the Gauss-Newton step solves
/// `J^T J step = J^T r` with this Jacobian.
fn jacobian<F>(model: &F, x: &[f64], params: &[f64]) -> DMatrix<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let mut jacobian = DMatrix::zeros(x.len(), params.len());
    let mut shifted = params.to_vec();
    for j in 0..params.len() {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        shifted[j] = params[j] + h;
        for (i, &xi) in x.iter().enumerate() {
            jacobian[(i, j)] = (model(xi, &shifted) - model(xi, params)) / h;
        }
        shifted[j] = params[j];
    }
    jacobian
}

fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_line() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let params = least_squares(
            |x, p| p[0] * x + p[1],
            &x,
            &y,
            &[1.0, 0.0],
            FitOptions::default(),
        )
        .unwrap();
        assert!((params[0] - 3.0).abs() < 1e-6);
        assert!((params[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_fits_gaussian() {
        let x: Vec<f64> = (0..41).map(|i| 9.0 + i as f64 * 0.05).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|v| 50.0 * (-((v - 10.1) / 0.3_f64).powi(2)).exp())
            .collect();
        let params = least_squares(
            |x, p| p[2] * (-((x - p[0]) / p[1]).powi(2)).exp(),
            &x,
            &y,
            &[10.0, 0.5, 45.0],
            FitOptions::default(),
        )
        .unwrap();
        assert!((params[0] - 10.1).abs() < 1e-5);
        assert!((params[1].abs() - 0.3).abs() < 1e-5);
        assert!((params[2] - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_underdetermined() {
        let result = least_squares(|x, p| p[0] * x + p[1], &[1.0], &[1.0], &[1.0, 0.0], FitOptions::default());
        assert!(matches!(result, Err(ProcessingError::InvalidParameter(_))));
    }
}
