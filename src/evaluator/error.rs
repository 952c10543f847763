use crate::error::PersistenceError;

/// Errors that can occur when combining integrals of several measurements
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// A sample with this name was added before
    #[error("Name {0} already exists.")]
    DuplicateSample(String),

    /// Peak names differ from the ones of the samples added before
    #[error("Peak names are not the same.")]
    PeakMismatch,

    /// Number of integrals and peak names differ
    #[error("Got {integrals} integrals for {peaks} peaks")]
    ShapeMismatch {
        /// Number of peak names
        peaks: usize,
        /// Number of integrals
        integrals: usize,
    },

    /// Operation needs at least one sample
    #[error("No integrals were added yet.")]
    NoSamples,

    /// Operation needs a standard
    #[error("No standard was set.")]
    MissingStandard,

    /// Two δ-values cannot be correlated
    #[error("Peaks {0} and {1} do not form δ-values with a common denominator")]
    IncompatibleCorrelation(usize, usize),

    /// Failed to read or write an integral or evaluation file
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
