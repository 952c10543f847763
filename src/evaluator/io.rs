//! Integral files and `.eval` files.
//!
//! An integral file holds the result of one processed measurement. An
//! `.eval` file references integral files by absolute path, together with the
//! correlation set and the standard:
//!
//! ```json
//! {
//!   "sample_files": ["/data/sample_1.json", "/data/sample_2.json"],
//!   "correlations": [[0, 2]],
//!   "standard_files": null,
//!   "standard_timestamp": null
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{EvaluatorError, IntegralEvaluator};
use crate::error::PersistenceError;
use crate::integrals::Integral;

/// Integrals of one processed measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralRecord {
    /// Name of the measurement
    pub name: String,
    /// Acquisition timestamp
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    /// Peak names
    pub peaks: Vec<String>,
    /// One integral per peak
    pub integrals: Vec<Integral>,
}

impl IntegralRecord {
    /// Read an integral file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PersistenceError::FileNotFound(path.display().to_string()));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write an integral file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Content of an `.eval` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalFile {
    /// Absolute paths of the sample integral files
    pub sample_files: Vec<String>,
    /// Correlated peak pairs
    pub correlations: Vec<(usize, usize)>,
    /// Absolute paths of the standard integral files
    pub standard_files: Option<Vec<String>>,
    /// ISO-8601 timestamp of the standard
    pub standard_timestamp: Option<String>,
}

fn paths_to_strings(paths: Vec<&Path>) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Save an evaluator to an `.eval` file next to `path`.
///
/// The suffix is replaced by `.eval`. Only samples that were read from
/// integral files can be referenced.
pub fn save_integral_evaluator<P: AsRef<Path>>(
    evaluator: &IntegralEvaluator,
    path: P,
) -> Result<PathBuf, PersistenceError> {
    let path = path.as_ref().with_extension("eval");
    let eval = EvalFile {
        sample_files: paths_to_strings(evaluator.file_names()),
        correlations: evaluator.correlation_set().iter().copied().collect(),
        standard_files: evaluator.standard().map(|s| paths_to_strings(s.file_names())),
        standard_timestamp: evaluator
            .standard_timestamp()
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    };

    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, &eval)?;
    log::info!("Saved evaluation to {}", path.display());
    Ok(path)
}

/// Find a referenced file, falling back to its file name inside `cwd`
fn resolve(file: &str, cwd: Option<&Path>) -> Result<PathBuf, PersistenceError> {
    let path = PathBuf::from(file);
    if path.exists() {
        return Ok(path);
    }
    let fallback = cwd.zip(path.file_name()).map(|(dir, name)| dir.join(name));
    match fallback {
        Some(candidate) if candidate.exists() => {
            log::debug!("{} not found, using {}", file, candidate.display());
            Ok(candidate)
        }
        _ => Err(PersistenceError::FileNotFound(file.to_string())),
    }
}

/// Load an evaluator from an `.eval` file.
///
/// Integral files that no longer exist at their stored path are looked up
/// by file name in `cwd`.
pub fn load_integral_evaluator<P: AsRef<Path>>(
    path: P,
    cwd: Option<&Path>,
) -> Result<IntegralEvaluator, EvaluatorError> {
    let path = path.as_ref().with_extension("eval");
    if !path.is_file() {
        return Err(PersistenceError::FileNotFound(path.display().to_string()).into());
    }
    let reader = BufReader::new(File::open(&path).map_err(PersistenceError::from)?);
    let eval: EvalFile = serde_json::from_reader(reader).map_err(PersistenceError::from)?;

    let mut evaluator = IntegralEvaluator::new();
    for file in &eval.sample_files {
        evaluator.add_integral_file(resolve(file, cwd)?, false)?;
    }
    evaluator.set_correlation_set(eval.correlations.into_iter().collect());

    if let Some(standard_files) = &eval.standard_files {
        let mut standard = IntegralEvaluator::new();
        for file in standard_files {
            standard.add_integral_file(resolve(file, cwd)?, false)?;
        }
        evaluator.set_standard(standard)?;
    }

    if let Some(timestamp) = &eval.standard_timestamp {
        let parsed = timestamp
            .parse::<NaiveDateTime>()
            .map_err(|_| PersistenceError::InvalidTimestamp(timestamp.clone()))?;
        evaluator.set_standard_timestamp(Some(parsed));
    }

    Ok(evaluator)
}
