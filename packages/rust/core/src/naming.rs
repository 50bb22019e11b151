//! Deterministic naming for run directories and data products.
//!
//! Every artifact a workflow produces lives under a single run directory
//! whose name embeds the run stamp, so repeated builds never collide and
//! a directory listing sorts chronologically.

use std::path::PathBuf;

use skydag_shared::{Result, SearchParameters, SkyDagError};

/// Prefix for run directories created under the shared filesystem root.
pub const RUN_DIR_PREFIX: &str = "ClusterComputeF";

// ---------------------------------------------------------------------------
// Run stamp
// ---------------------------------------------------------------------------

/// Unix timestamp identifying one workflow build.
///
/// The stamp is captured once at the entry point and threaded through the
/// build, so every name derived from it agrees and tests can pin a fixed
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp(i64);

impl RunStamp {
    /// Capture the current wall-clock time as a stamp.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    /// Build a stamp from a known Unix timestamp.
    pub fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// The stamp as seconds since the Unix epoch.
    pub fn as_unix(&self) -> i64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Naming scheme
// ---------------------------------------------------------------------------

/// Derives all run-scoped paths and filenames from the shared directory
/// and the run stamp.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    shared_dir: PathBuf,
    stamp: RunStamp,
}

impl NamingScheme {
    pub fn new(shared_dir: impl Into<PathBuf>, stamp: RunStamp) -> Self {
        Self {
            shared_dir: shared_dir.into(),
            stamp,
        }
    }

    /// The run directory: `<shared>/ClusterComputeF_<stamp>`, with the
    /// stamp zero-padded to ten digits.
    pub fn output_dir(&self) -> PathBuf {
        self.shared_dir
            .join(format!("{RUN_DIR_PREFIX}_{:010}", self.stamp.as_unix()))
    }

    /// Filename of the narrowband frame the extract stage writes.
    ///
    /// The fields follow the frame-file convention:
    /// `<IFO>-SFT_<freq>_<band>-<gps-start>-<duration>.gwf`, with the
    /// frequency and band printed to three decimals in eight columns and
    /// the GPS fields zero-padded.
    pub fn narrowband_filename(params: &SearchParameters) -> String {
        format!(
            "{}-SFT_{:08.3}_{:08.3}-{:010}-{:08}.gwf",
            params.instrument,
            params.frequency,
            params.bandwidth,
            params.gps_start,
            params.duration()
        )
    }

    /// Absolute path of the narrowband frame inside the run directory.
    pub fn narrowband_path(&self, params: &SearchParameters) -> PathBuf {
        self.output_dir().join(Self::narrowband_filename(params))
    }

    /// Create the run directory, failing if it already exists.
    ///
    /// A pre-existing directory means a stamp collision (or a re-run into
    /// the same shared root), and silently reusing it could mix artifacts
    /// from two builds.
    pub fn create_output_dir(&self) -> Result<PathBuf> {
        let dir = self.output_dir();
        std::fs::create_dir(&dir).map_err(|e| SkyDagError::io(&dir, e))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use skydag_shared::{Instrument, MetricMode};

    use super::*;

    fn test_params() -> SearchParameters {
        SearchParameters {
            instrument: Instrument::H1,
            gps_start: 0,
            gps_end: 86_400,
            frequency: 1200.0,
            bandwidth: 1.0,
            spindown: 0.0,
            spindown_band: 0.0,
            metric: MetricMode::Ptolemaic,
            mismatch: 0.02,
            threshold: 10.0,
            calibration: "Funky".to_string(),
            calibration_version: 3,
            epoch: "00".to_string(),
        }
    }

    #[test]
    fn output_dir_pads_stamp_to_ten_digits() {
        let scheme = NamingScheme::new("/data/shared", RunStamp::from_unix(12345));
        assert_eq!(
            scheme.output_dir(),
            PathBuf::from("/data/shared/ClusterComputeF_0000012345")
        );
    }

    #[test]
    fn narrowband_filename_matches_frame_convention() {
        let name = NamingScheme::narrowband_filename(&test_params());
        assert_eq!(name, "H1-SFT_1200.000_0001.000-0000000000-00086400.gwf");
    }

    #[test]
    fn narrowband_filename_is_deterministic() {
        let params = test_params();
        assert_eq!(
            NamingScheme::narrowband_filename(&params),
            NamingScheme::narrowband_filename(&params)
        );
    }

    #[test]
    fn narrowband_filename_reflects_window() {
        let mut params = test_params();
        params.instrument = Instrument::L1;
        params.gps_start = 751_680_013;
        params.gps_end = 751_680_013 + 1800;
        params.frequency = 300.5;
        params.bandwidth = 0.25;
        let name = NamingScheme::narrowband_filename(&params);
        assert_eq!(name, "L1-SFT_0300.500_0000.250-0751680013-00001800.gwf");
    }

    #[test]
    fn create_output_dir_rejects_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let scheme = NamingScheme::new(tmp.path(), RunStamp::from_unix(99));
        let dir = scheme.create_output_dir().unwrap();
        assert!(dir.is_dir());
        assert!(scheme.create_output_dir().is_err());
    }
}
