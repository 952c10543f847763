//! Mass calibration: mapping time of flight to mass.
//!
//! The calibration follows `mass = ((tof - t0) / c)^2`, or equivalently
//! `tof = sqrt(mass) * c + t0`. Two points determine `t0` and `c` exactly,
//! more points are fitted by least squares in time.

use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::fitting::{least_squares, FitOptions};

/// One calibration point: a time of flight in µs and the mass in amu found there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    /// Time of flight in µs
    pub tof: f64,
    /// Mass in amu
    pub mass: f64,
}

/// Validated set of calibration points.
///
/// Serializes as a list of `[tof, mass]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct MassCalibration {
    points: Vec<CalibrationPoint>,
}

/// Fitted parameters of a mass calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassCalParams {
    /// Time offset in µs
    pub t0: f64,
    /// Proportionality constant in µs per sqrt(amu)
    pub constant: f64,
}

impl MassCalParams {
    /// Solve for the parameters from two points
    pub fn from_two_points(first: CalibrationPoint, second: CalibrationPoint) -> Self {
        let (t1, t2) = (first.tof, second.tof);
        let (sqm1, sqm2) = (first.mass.sqrt(), second.mass.sqrt());
        let t0 = (t1 * sqm2 - t2 * sqm1) / (sqm2 - sqm1);
        let constant = ((t1 - t0).powi(2) / first.mass).sqrt();
        Self { t0, constant }
    }

    /// Mass at a given time of flight
    pub fn mass(&self, tof: f64) -> f64 {
        ((tof - self.t0) / self.constant).powi(2)
    }

    /// Time of flight of a given mass
    pub fn tof(&self, mass: f64) -> f64 {
        mass.sqrt() * self.constant + self.t0
    }
}

impl MassCalibration {
    /// Create a calibration from `(tof, mass)` pairs.
    ///
    /// # Errors
    ///
    /// Fails with [`ProcessingError::NotEnoughCalibrationPoints`] for fewer
    /// than two points and with [`ProcessingError::InvalidParameter`] for
    /// repeated times, repeated masses or masses that are not positive.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, ProcessingError> {
        let points: Vec<CalibrationPoint> = points
            .into_iter()
            .map(|(tof, mass)| CalibrationPoint { tof, mass })
            .collect();

        if points.len() < 2 {
            return Err(ProcessingError::NotEnoughCalibrationPoints(points.len()));
        }
        for (i, point) in points.iter().enumerate() {
            if !point.tof.is_finite() || !point.mass.is_finite() || point.mass <= 0.0 {
                return Err(ProcessingError::InvalidParameter(format!(
                    "invalid calibration point ({}, {})",
                    point.tof, point.mass
                )));
            }
            if points[..i].iter().any(|other| other.tof == point.tof) {
                return Err(ProcessingError::InvalidParameter(format!(
                    "time of flight {} appears more than once in the mass calibration",
                    point.tof
                )));
            }
            if points[..i].iter().any(|other| other.mass == point.mass) {
                return Err(ProcessingError::InvalidParameter(format!(
                    "mass {} appears more than once in the mass calibration",
                    point.mass
                )));
            }
        }

        Ok(Self { points })
    }

    /// Calibration points in the order given
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Number of calibration points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, a calibration holds at least two points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fit `t0` and the constant.
    ///
    /// The first two points give the closed form solution, which is returned
    /// directly for two points and otherwise seeds the least squares fit.
    pub fn fit(&self) -> Result<MassCalParams, ProcessingError> {
        let seed = MassCalParams::from_two_points(self.points[0], self.points[1]);
        if self.points.len() == 2 {
            return Ok(seed);
        }

        let masses: Vec<f64> = self.points.iter().map(|p| p.mass).collect();
        let tofs: Vec<f64> = self.points.iter().map(|p| p.tof).collect();
        let fitted = least_squares(
            |mass, p| mass.sqrt() * p[1] + p[0],
            &masses,
            &tofs,
            &[seed.t0, seed.constant],
            FitOptions::default(),
        )?;

        Ok(MassCalParams {
            t0: fitted[0],
            constant: fitted[1],
        })
    }

    /// Map a time axis to masses
    pub fn apply(&self, tof_axis: &[f64]) -> Result<Vec<f64>, ProcessingError> {
        let params = self.fit()?;
        Ok(tof_axis.iter().map(|&tof| params.mass(tof)).collect())
    }

    /// Re-locate every calibration peak in the spectrum.
    ///
    /// Each point is searched for in `(tof - offset - 2 fwhm, tof + offset + 2 fwhm)`.
    /// Points whose window leaves the time axis, whose peak fit fails, or whose
    /// new position is `offset` or more away from the old one are dropped.
    /// Returns `None` and logs a warning if fewer than two points remain.
    pub fn optimize(&self, tof: &[f64], data: &[f64], peak_fwhm: f64, offset: f64) -> Option<Self> {
        let (Some(&tof_min), Some(&tof_max)) = (tof.first(), tof.last()) else {
            log::warn!("Cannot optimize the mass calibration without a spectrum.");
            return None;
        };

        let mut points = Vec::with_capacity(self.points.len());
        for point in &self.points {
            let min_time = point.tof - offset - 2.0 * peak_fwhm;
            let max_time = point.tof + offset + 2.0 * peak_fwhm;
            if min_time < tof_min || max_time > tof_max {
                log::debug!("Search window around {} µs leaves the spectrum", point.tof);
                continue;
            }

            let (x, y): (Vec<f64>, Vec<f64>) = tof
                .iter()
                .zip(data)
                .filter(|(t, _)| **t > min_time && **t < max_time)
                .map(|(&t, &d)| (t, d))
                .unzip();

            match gaussian_fit_get_max(&x, &y) {
                Ok(position) if (point.tof - position).abs() < offset => {
                    points.push(CalibrationPoint {
                        tof: position,
                        mass: point.mass,
                    });
                }
                Ok(position) => {
                    log::debug!("Peak at {} µs moved to {} µs, dropped", point.tof, position);
                }
                Err(e) => log::debug!("Peak fit around {} µs failed: {}", point.tof, e),
            }
        }

        if points.len() < 2 {
            log::warn!("Automatic mass calibration optimization did not find enough peaks.");
            return None;
        }
        Some(Self { points })
    }
}

/// Position of the maximum of a Gaussian `h * exp(-((x - mu) / sigma)^2)`
/// fitted to the data.
///
/// Starts at the highest data point with a width of a sixth of the x range.
pub fn gaussian_fit_get_max(x: &[f64], y: &[f64]) -> Result<f64, ProcessingError> {
    if x.len() != y.len() {
        return Err(ProcessingError::InvalidParameter(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    let Some((max_index, &height)) = y
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    else {
        return Err(ProcessingError::Fit("no data in peak window".to_string()));
    };
    let (Some(&x_min), Some(&x_max)) = (x.first(), x.last()) else {
        return Err(ProcessingError::Fit("no data in peak window".to_string()));
    };

    let sigma = (x_max - x_min) / 6.0;
    if sigma <= 0.0 || height <= 0.0 {
        return Err(ProcessingError::Fit(
            "peak window holds no signal".to_string(),
        ));
    }

    let params = least_squares(
        |x, p| p[2] * (-((x - p[0]) / p[1]).powi(2)).exp(),
        x,
        y,
        &[x[max_index], sigma, height],
        FitOptions::default(),
    )?;

    if params[0].is_finite() {
        Ok(params[0])
    } else {
        Err(ProcessingError::Fit("peak position diverged".to_string()))
    }
}

impl TryFrom<Vec<[f64; 2]>> for MassCalibration {
    type Error = ProcessingError;

    fn try_from(pairs: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::new(pairs.into_iter().map(|[tof, mass]| (tof, mass)))
    }
}

impl From<MassCalibration> for Vec<[f64; 2]> {
    fn from(calibration: MassCalibration) -> Self {
        calibration
            .points
            .into_iter()
            .map(|p| [p.tof, p.mass])
            .collect()
    }
}
