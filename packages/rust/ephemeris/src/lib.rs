//! Ephemeris epoch resolution.
//!
//! The compute stage needs earth/sun ephemeris files covering the searched
//! time window. Ephemerides ship as `earth<label>.dat` / `sun<label>.dat`
//! pairs, where `<label>` is a two-digit year (`00`) or year range
//! (`98-04`). Resolution maps a GPS window to the label of a pair covering
//! every UTC year the window touches; no covering pair means no coverage,
//! which callers treat as fatal.

use std::path::PathBuf;

use chrono::{Datelike, TimeZone, Utc};
use skydag_shared::{Result, SkyDagError};
use tracing::debug;

/// Offset from the GPS epoch (1980-01-06T00:00:00Z) to the Unix epoch, in seconds.
pub const GPS_EPOCH_UNIX: i64 = 315_964_800;

/// Resolves the ephemeris epoch label for a GPS time window.
pub trait EpochResolver {
    /// Resolve the label covering `[gps_start, gps_end)`.
    ///
    /// `Ok(None)` signals "no coverage"; errors are reserved for I/O or
    /// out-of-range inputs.
    fn resolve(&self, gps_start: i64, gps_end: i64) -> Result<Option<String>>;
}

/// Filesystem resolver scanning a directory of ephemeris data files.
#[derive(Debug, Clone)]
pub struct EphemerisDir {
    dir: PathBuf,
}

impl EphemerisDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl EpochResolver for EphemerisDir {
    fn resolve(&self, gps_start: i64, gps_end: i64) -> Result<Option<String>> {
        let start_year = gps_year(gps_start)?;
        // The window is end-exclusive: the last covered instant is end - 1.
        let end_year = gps_year(gps_end.max(gps_start + 1) - 1)?;

        let entries = std::fs::read_dir(&self.dir).map_err(|e| SkyDagError::io(&self.dir, e))?;

        let mut candidates: Vec<(i32, String)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SkyDagError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(label) = name
                .strip_prefix("earth")
                .and_then(|rest| rest.strip_suffix(".dat"))
            else {
                continue;
            };
            let Some((first, last)) = label_span(label) else {
                continue;
            };
            // Only complete earth/sun pairs count.
            if !self.dir.join(format!("sun{label}.dat")).exists() {
                continue;
            }
            if first <= start_year && last >= end_year {
                candidates.push((last - first, label.to_string()));
            }
        }

        debug!(
            dir = %self.dir.display(),
            start_year,
            end_year,
            candidates = candidates.len(),
            "scanned ephemeris directory"
        );

        // Narrowest covering span wins; ties break lexicographically.
        candidates.sort();
        Ok(candidates.into_iter().next().map(|(_, label)| label))
    }
}

/// UTC calendar year of a GPS second.
///
/// Leap seconds are ignored; they cannot move a year boundary at this
/// granularity.
fn gps_year(gps: i64) -> Result<i32> {
    Utc.timestamp_opt(gps + GPS_EPOCH_UNIX, 0)
        .single()
        .map(|t| t.year())
        .ok_or_else(|| SkyDagError::Ephemeris(format!("GPS time {gps} out of representable range")))
}

/// Parse an ephemeris label into an inclusive year span.
///
/// `"00"` → (2000, 2000); `"98-04"` → (1998, 2004). Two-digit years pivot
/// at 80: below is 2000s, at or above is 1900s.
fn label_span(label: &str) -> Option<(i32, i32)> {
    match label.split_once('-') {
        Some((a, b)) => {
            let first = two_digit_year(a)?;
            let last = two_digit_year(b)?;
            (last >= first).then_some((first, last))
        }
        None => {
            let year = two_digit_year(label)?;
            Some((year, year))
        }
    }
}

fn two_digit_year(s: &str) -> Option<i32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i32 = s.parse().ok()?;
    Some(if value < 80 { 2000 + value } else { 1900 + value })
}
