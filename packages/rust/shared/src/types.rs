//! Core domain types for SkyDAG workflow assembly.

use crate::error::{Result, SkyDagError};

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// A known interferometer, parsed from its site code.
///
/// The numeric code is fixed by the search executable's `-I` convention:
/// Hanford (either arm length) is 2, Livingston is 1, GEO is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    /// LIGO Hanford 4 km.
    H1,
    /// LIGO Hanford 2 km.
    H2,
    /// LIGO Livingston 4 km.
    L1,
    /// GEO 600.
    G,
}

impl Instrument {
    /// Numeric detector code expected by the compute stage.
    pub fn code(&self) -> u8 {
        match self {
            Instrument::H1 | Instrument::H2 => 2,
            Instrument::L1 => 1,
            Instrument::G => 0,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Instrument::H1 => "H1",
            Instrument::H2 => "H2",
            Instrument::L1 => "L1",
            Instrument::G => "G",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Instrument {
    type Err = SkyDagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "H1" => Ok(Instrument::H1),
            "H2" => Ok(Instrument::H2),
            "L1" => Ok(Instrument::L1),
            "G" => Ok(Instrument::G),
            other => Err(SkyDagError::config(format!(
                "unknown instrument '{other}': expected H1, H2, L1, or G"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricMode
// ---------------------------------------------------------------------------

/// Metric-computation mode for the compute stage's template placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricMode {
    /// No metric (uniform template grid).
    Disabled,
    /// Ptolemaic approximation to the sky metric.
    Ptolemaic,
    /// Fully coherent metric.
    Coherent,
}

impl MetricMode {
    /// Resolve a numeric metric code from the CLI.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(MetricMode::Disabled),
            1 => Ok(MetricMode::Ptolemaic),
            2 => Ok(MetricMode::Coherent),
            other => Err(SkyDagError::config(format!(
                "unknown metric mode {other}: expected 0 (none), 1 (Ptolemaic), or 2 (coherent)"
            ))),
        }
    }

    /// Numeric code passed through to the compute stage.
    pub fn code(&self) -> u8 {
        match self {
            MetricMode::Disabled => 0,
            MetricMode::Ptolemaic => 1,
            MetricMode::Coherent => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// SkyPatch
// ---------------------------------------------------------------------------

/// A single (right ascension, declination) coordinate in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub alpha: f64,
    pub delta: f64,
}

/// The geometric form of a sky patch.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyRegion {
    /// An N-vertex polygon in (alpha, delta) pairs.
    Polygon(Vec<SkyCoord>),
    /// A center plus half-width intervals in each coordinate.
    Box {
        alpha: f64,
        delta: f64,
        alpha_band: f64,
        delta_band: f64,
    },
}

/// One sky-region descriptor read from the patch catalog.
///
/// `index` is the patch's 0-based position among the catalog's descriptor
/// lines and is stable across runs. `descriptor` keeps the verbatim line,
/// because compute nodes pass the literal token through to the search
/// executable unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyPatch {
    pub index: usize,
    pub region: SkyRegion,
    pub descriptor: String,
}

// ---------------------------------------------------------------------------
// SearchParameters
// ---------------------------------------------------------------------------

/// The full parameter set for one search run.
///
/// Immutable for the lifetime of one run; assembled once by the builder
/// after all preconditions have been validated.
#[derive(Debug, Clone)]
pub struct SearchParameters {
    /// Which detector's data to search.
    pub instrument: Instrument,
    /// GPS start of the data window (inclusive).
    pub gps_start: i64,
    /// GPS end of the data window (exclusive).
    pub gps_end: i64,
    /// Start frequency in Hz.
    pub frequency: f64,
    /// Search bandwidth in Hz.
    pub bandwidth: f64,
    /// Base spindown value to search up from.
    pub spindown: f64,
    /// Width of the spindown band.
    pub spindown_band: f64,
    /// Template-placement metric mode.
    pub metric: MetricMode,
    /// Maximal allowed template mismatch.
    pub mismatch: f64,
    /// Detection threshold on the F statistic.
    pub threshold: f64,
    /// Calibration type of the input data.
    pub calibration: String,
    /// Calibration version of the input data.
    pub calibration_version: u32,
    /// Ephemeris epoch label covering the window.
    pub epoch: String,
}

impl SearchParameters {
    /// Length of the data window in seconds.
    pub fn duration(&self) -> i64 {
        self.gps_end - self.gps_start
    }
}

// ---------------------------------------------------------------------------
// ValidationPolicy
// ---------------------------------------------------------------------------

/// How the builder treats recoverable catalog conditions (short read,
/// geometry warnings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Log a warning and proceed with whatever was read.
    #[default]
    BestEffort,
    /// Treat any warning as a fatal validation error.
    Strict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn instrument_codes() {
        assert_eq!(Instrument::H1.code(), 2);
        assert_eq!(Instrument::H2.code(), 2);
        assert_eq!(Instrument::L1.code(), 1);
        assert_eq!(Instrument::G.code(), 0);
    }

    #[test]
    fn instrument_parse_roundtrip() {
        for name in ["H1", "H2", "L1", "G"] {
            let inst = Instrument::from_str(name).expect("parse instrument");
            assert_eq!(inst.to_string(), name);
        }
    }

    #[test]
    fn instrument_rejects_unknown() {
        let err = Instrument::from_str("V1").unwrap_err();
        assert!(matches!(err, SkyDagError::Config { .. }));
        assert!(err.to_string().contains("unknown instrument 'V1'"));
    }

    #[test]
    fn metric_mode_codes() {
        for code in 0..=2 {
            let mode = MetricMode::from_code(code).expect("known code");
            assert_eq!(mode.code(), code);
        }
        assert!(MetricMode::from_code(3).is_err());
    }

    #[test]
    fn search_parameters_duration() {
        let params = SearchParameters {
            instrument: Instrument::H1,
            gps_start: 700000000,
            gps_end: 700086400,
            frequency: 1200.0,
            bandwidth: 1.0,
            spindown: 0.0,
            spindown_band: 0.0,
            metric: MetricMode::Ptolemaic,
            mismatch: 0.02,
            threshold: 10.0,
            calibration: "Funky".into(),
            calibration_version: 3,
            epoch: "00-04".into(),
        };
        assert_eq!(params.duration(), 86400);
    }

    #[test]
    fn validation_policy_defaults_to_best_effort() {
        assert_eq!(ValidationPolicy::default(), ValidationPolicy::BestEffort);
    }
}
