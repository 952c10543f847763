/// Errors that can occur when assembling an arrival dataset
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DatasetError {
    /// Shot map and ions per shot have different lengths
    #[error("Shot map has {map} entries, but {shots} shots are recorded")]
    ShotCountMismatch {
        /// Number of entries in the shot to arrival map
        map: usize,
        /// Number of entries in ions per shot
        shots: usize,
    },

    /// A shot map entry disagrees with the ion count of its shot
    #[error("Shot {shot}: map covers {mapped} arrivals, but {ions} ions are recorded")]
    IonCountMismatch {
        /// Index of the shot
        shot: usize,
        /// Arrivals covered by the map entry
        mapped: usize,
        /// Ions recorded for the shot
        ions: usize,
    },

    /// Shot map entries are not contiguous and in acquisition order
    #[error("Shot {0} does not continue where the previous shot ended")]
    NonContiguousShot(usize),

    /// Total number of arrivals disagrees with the ions per shot
    #[error("Expected {expected} arrivals from ions per shot, found {found}")]
    ArrivalCountMismatch {
        /// Sum over ions per shot
        expected: usize,
        /// Length of the arrival list
        found: usize,
    },

    /// Header describes an impossible bin range
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}
