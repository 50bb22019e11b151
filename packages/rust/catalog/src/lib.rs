//! Sky-patch catalog reading, sub-range selection, and geometry checks.
//!
//! A catalog is a text file with one sky-region descriptor per line (see
//! [`parser`] for the grammar). Line order among descriptor lines defines
//! the patch index; blank lines are ignored and do not consume indices.

mod parser;

use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use skydag_shared::{Result, SkyDagError, SkyPatch, SkyRegion};
use tracing::debug;

// ---------------------------------------------------------------------------
// GeometryWarning
// ---------------------------------------------------------------------------

/// A non-fatal structural problem found in a patch descriptor.
///
/// Whether these abort the build is the caller's policy decision, not the
/// catalog's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryWarning {
    /// Index of the offending patch in the catalog.
    pub patch_index: usize,
    /// Description of the problem.
    pub message: String,
}

impl std::fmt::Display for GeometryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "patch {}: {}", self.patch_index, self.message)
    }
}

// ---------------------------------------------------------------------------
// PatchCatalog
// ---------------------------------------------------------------------------

/// An ordered selection of sky patches read from a catalog file.
#[derive(Debug, Clone)]
pub struct PatchCatalog {
    patches: Vec<SkyPatch>,
}

impl PatchCatalog {
    /// Read a sub-range of patches from a catalog file.
    ///
    /// Skips the first `skip` descriptors, then reads up to `limit` patches
    /// (`None` = all remaining). Each returned patch keeps its absolute
    /// catalog index. The selection may be shorter than `limit` if the
    /// catalog is exhausted; detecting that is the caller's job. Descriptor
    /// lines outside the selected window are counted but not parsed.
    pub fn read(path: &Path, skip: usize, limit: Option<usize>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SkyDagError::io(path, e))?;

        let mut patches = Vec::new();
        let mut index = 0usize;

        for (line_idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let this_index = index;
            index += 1;

            if this_index < skip {
                continue;
            }
            if limit.is_some_and(|l| patches.len() >= l) {
                break;
            }
            patches.push(parser::parse_patch(line, this_index, line_idx + 1)?);
        }

        debug!(
            path = %path.display(),
            skip,
            selected = patches.len(),
            "catalog selection read"
        );

        Ok(Self { patches })
    }

    /// Check every selected patch for structural problems.
    ///
    /// Returns one warning per patch per problem kind; an empty result means
    /// the selection is geometrically sound.
    pub fn check(&self) -> Vec<GeometryWarning> {
        let mut warnings = Vec::new();

        for patch in &self.patches {
            match &patch.region {
                SkyRegion::Polygon(vertices) => {
                    if vertices.len() < 3 {
                        warn_on(&mut warnings, patch, format!(
                            "degenerate polygon with {} vertices",
                            vertices.len()
                        ));
                    }
                    if vertices.iter().any(|v| !v.alpha.is_finite() || !v.delta.is_finite()) {
                        warn_on(&mut warnings, patch, "non-finite vertex coordinate".into());
                    }
                    if vertices.iter().any(|v| v.alpha.is_finite() && !(0.0..=TAU).contains(&v.alpha)) {
                        warn_on(&mut warnings, patch, "right ascension outside [0, 2*pi]".into());
                    }
                    if vertices.iter().any(|v| {
                        v.delta.is_finite() && !(-FRAC_PI_2..=FRAC_PI_2).contains(&v.delta)
                    }) {
                        warn_on(&mut warnings, patch, "declination outside [-pi/2, pi/2]".into());
                    }
                }
                SkyRegion::Box {
                    alpha,
                    delta,
                    alpha_band,
                    delta_band,
                } => {
                    if ![alpha, delta, alpha_band, delta_band]
                        .iter()
                        .all(|v| v.is_finite())
                    {
                        warn_on(&mut warnings, patch, "non-finite box coordinate".into());
                    }
                    if alpha.is_finite() && !(0.0..=TAU).contains(alpha) {
                        warn_on(&mut warnings, patch, "right ascension outside [0, 2*pi]".into());
                    }
                    if delta.is_finite() && !(-FRAC_PI_2..=FRAC_PI_2).contains(delta) {
                        warn_on(&mut warnings, patch, "declination outside [-pi/2, pi/2]".into());
                    }
                    if *alpha_band <= 0.0 {
                        warn_on(&mut warnings, patch, "non-positive right-ascension interval".into());
                    }
                    if *delta_band <= 0.0 {
                        warn_on(&mut warnings, patch, "non-positive declination interval".into());
                    }
                }
            }
        }

        warnings
    }

    /// Number of patches in the selection.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the selection is empty.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// The selected patches, in catalog order.
    pub fn patches(&self) -> &[SkyPatch] {
        &self.patches
    }
}

fn warn_on(warnings: &mut Vec<GeometryWarning>, patch: &SkyPatch, message: String) {
    warnings.push(GeometryWarning {
        patch_index: patch.index,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(name: &str) -> std::path::PathBuf {
        std::path::PathBuf::from("../../../fixtures/catalogs").join(name)
    }

    fn write_catalog(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn read_full_fixture() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 0, None).unwrap();
        assert_eq!(catalog.len(), 5);

        let indices: Vec<usize> = catalog.patches().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        assert!(matches!(catalog.patches()[0].region, SkyRegion::Polygon(_)));
        assert!(matches!(catalog.patches()[3].region, SkyRegion::Box { .. }));
    }

    #[test]
    fn selection_window_keeps_absolute_indices() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 2, Some(2)).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.patches()[0].index, 2);
        assert_eq!(catalog.patches()[1].index, 3);
    }

    #[test]
    fn no_limit_reads_all_remaining() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 3, None).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.patches()[0].index, 3);
    }

    #[test]
    fn short_read_returns_what_exists() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 2, Some(10)).unwrap();
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn skip_past_end_is_empty() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 10, None).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn zero_limit_is_empty() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 0, Some(0)).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn blank_lines_do_not_consume_indices() {
        let file = write_catalog(
            "-a 1.0 -d 0.1 -z 0.2 -c 0.2\n\n\n-a 2.0 -d 0.2 -z 0.2 -c 0.2\n\n-a 3.0 -d 0.3 -z 0.2 -c 0.2\n",
        );
        let catalog = PatchCatalog::read(file.path(), 0, None).unwrap();
        assert_eq!(catalog.len(), 3);
        let indices: Vec<usize> = catalog.patches().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn malformed_line_in_window_is_fatal() {
        let file = write_catalog("-a 1.0 -d 0.1 -z 0.2 -c 0.2\nnot a descriptor\n");
        let err = PatchCatalog::read(file.path(), 0, None).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn lines_before_window_are_not_parsed() {
        let file = write_catalog("not a descriptor\n-a 1.0 -d 0.1 -z 0.2 -c 0.2\n");
        let catalog = PatchCatalog::read(file.path(), 1, None).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.patches()[0].index, 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PatchCatalog::read(std::path::Path::new("/nonexistent/patches.txt"), 0, None)
            .unwrap_err();
        assert!(matches!(err, SkyDagError::Io { .. }));
    }

    #[test]
    fn check_passes_clean_fixture() {
        let catalog = PatchCatalog::read(&fixture("allsky-patches.txt"), 0, None).unwrap();
        assert!(catalog.check().is_empty());
    }

    #[test]
    fn check_flags_degenerate_fixture() {
        let catalog = PatchCatalog::read(&fixture("degenerate-patches.txt"), 0, None).unwrap();
        let warnings = catalog.check();
        assert_eq!(warnings.len(), 3);

        assert_eq!(warnings[0].patch_index, 0);
        assert!(warnings[0].message.contains("degenerate polygon"));

        assert_eq!(warnings[1].patch_index, 1);
        assert!(warnings[1].message.contains("non-positive right-ascension interval"));

        assert_eq!(warnings[2].patch_index, 2);
        assert!(warnings[2].message.contains("right ascension outside"));
    }

    #[test]
    fn check_flags_nonfinite_coordinates() {
        let file = write_catalog("-a nan -d 0.1 -z 0.2 -c 0.2\n");
        let catalog = PatchCatalog::read(file.path(), 0, None).unwrap();
        let warnings = catalog.check();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("non-finite"));
    }
}
