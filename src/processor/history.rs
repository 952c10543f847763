use serde::{Deserialize, Serialize};

/// One recorded filter: whether it is active and the parameters it ran with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry<P> {
    /// Replay skips disabled filters
    pub enabled: bool,
    /// Parameters of the filter
    pub params: P,
}

impl<P> FilterEntry<P> {
    /// An enabled entry
    pub fn enabled(params: P) -> Self {
        Self {
            enabled: true,
            params,
        }
    }

    /// A disabled entry that keeps its parameters for later
    pub fn disabled(params: P) -> Self {
        Self {
            enabled: false,
            params,
        }
    }
}

/// Parameters of the max ions per time window filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxIonsPerTime {
    /// Highest number of ions allowed inside the window
    pub max_ions: u32,
    /// Window width in µs
    pub time_us: f64,
}

/// Parameters of the max ions per ToF window filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxIonsPerTofWindow {
    /// Highest number of ions allowed inside the window
    pub max_ions: u32,
    /// Start and stop of the window in µs
    pub tof_window: [f64; 2],
}

/// Every filter applied to a measurement, keyed by filter name.
///
/// Entries are overwritten when a filter runs again. Replay runs them in a
/// fixed order that does not depend on the order they were recorded in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppliedFilters {
    /// 1-indexed inclusive shot ranges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum_part: Option<FilterEntry<Vec<(usize, usize)>>>,

    /// Maximum number of ions per shot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ions_per_shot: Option<FilterEntry<u32>>,

    /// Maximum number of ions per time window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ions_per_time: Option<FilterEntry<MaxIonsPerTime>>,

    /// Maximum number of ions in a fixed ToF window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ions_per_tof_window: Option<FilterEntry<MaxIonsPerTofWindow>>,

    /// Shots per package
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<FilterEntry<usize>>,

    /// Maximum number of ions per package
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ions_per_pkg: Option<FilterEntry<u32>>,

    /// Dead bins after each bin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_time_corr: Option<FilterEntry<usize>>,

    /// Peirce rejection of packages by total integrated counts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkg_peirce_rejection: Option<FilterEntry<()>>,
}

impl AppliedFilters {
    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parameters of an entry that is present and enabled
pub(crate) fn active<P>(entry: &Option<FilterEntry<P>>) -> Option<&P> {
    entry.as_ref().filter(|e| e.enabled).map(|e| &e.params)
}
