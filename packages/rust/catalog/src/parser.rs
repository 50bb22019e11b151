//! Sky-patch descriptor parser.
//!
//! Parses the one-descriptor-per-line catalog format:
//! - Polygon: `-R (a1,d1),(a2,d2),...,(aN,dN)`
//! - Box:     `-a α -d δ -z Δα -c Δδ`
//!
//! Coordinates are (right ascension, declination) in radians.

use regex::Regex;
use skydag_shared::{Result, SkyCoord, SkyDagError, SkyPatch, SkyRegion};
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches a full polygon descriptor: `-R` followed by one or more pairs.
static POLYGON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-R\s+\(\s*[^,()\s]+\s*,\s*[^,()\s]+\s*\)(?:\s*,\s*\(\s*[^,()\s]+\s*,\s*[^,()\s]+\s*\))*$")
        .expect("polygon regex")
});

/// Extracts individual `(alpha,delta)` pairs from a polygon descriptor.
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*([^,()\s]+)\s*,\s*([^,()\s]+)\s*\)").expect("vertex pair regex")
});

/// Matches a full box descriptor: `-a α -d δ -z Δα -c Δδ`.
static BOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-a\s+(\S+)\s+-d\s+(\S+)\s+-z\s+(\S+)\s+-c\s+(\S+)$").expect("box regex")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one descriptor line into a [`SkyPatch`].
///
/// `index` is the patch's position among the catalog's descriptor lines;
/// `line_number` (1-based) is used for error reporting only.
pub(crate) fn parse_patch(line: &str, index: usize, line_number: usize) -> Result<SkyPatch> {
    let descriptor = line.trim();

    let region = if POLYGON_RE.is_match(descriptor) {
        let mut vertices = Vec::new();
        for caps in PAIR_RE.captures_iter(descriptor) {
            vertices.push(SkyCoord {
                alpha: parse_coord(&caps[1], line_number)?,
                delta: parse_coord(&caps[2], line_number)?,
            });
        }
        SkyRegion::Polygon(vertices)
    } else if let Some(caps) = BOX_RE.captures(descriptor) {
        SkyRegion::Box {
            alpha: parse_coord(&caps[1], line_number)?,
            delta: parse_coord(&caps[2], line_number)?,
            alpha_band: parse_coord(&caps[3], line_number)?,
            delta_band: parse_coord(&caps[4], line_number)?,
        }
    } else {
        return Err(SkyDagError::parse(format!(
            "line {line_number}: not a polygon (-R ...) or box (-a ... -d ... -z ... -c ...) descriptor: '{descriptor}'"
        )));
    };

    Ok(SkyPatch {
        index,
        region,
        descriptor: descriptor.to_string(),
    })
}

fn parse_coord(token: &str, line_number: usize) -> Result<f64> {
    token.parse::<f64>().map_err(|_| {
        SkyDagError::parse(format!(
            "line {line_number}: invalid coordinate '{token}'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_polygon() {
        let patch = parse_patch("-R (0.1,-0.2),(0.35,-0.2),(0.35,0.05)", 0, 1).unwrap();
        assert_eq!(patch.index, 0);
        match &patch.region {
            SkyRegion::Polygon(vertices) => {
                assert_eq!(vertices.len(), 3);
                assert_eq!(vertices[0].alpha, 0.1);
                assert_eq!(vertices[0].delta, -0.2);
                assert_eq!(vertices[2].delta, 0.05);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn parse_polygon_with_spacing() {
        let patch = parse_patch("-R ( 0.1 , 0.2 ), ( 0.3 , 0.4 ), ( 0.5 , 0.6 )", 4, 5).unwrap();
        match &patch.region {
            SkyRegion::Polygon(vertices) => assert_eq!(vertices.len(), 3),
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn parse_box() {
        let patch = parse_patch("-a 1.57 -d 0.0 -z 0.25 -c 0.25", 2, 3).unwrap();
        assert_eq!(
            patch.region,
            SkyRegion::Box {
                alpha: 1.57,
                delta: 0.0,
                alpha_band: 0.25,
                delta_band: 0.25,
            }
        );
    }

    #[test]
    fn descriptor_kept_verbatim() {
        let line = "-R (0.1,0.2),(0.3,0.4),(0.5,0.6)";
        let patch = parse_patch(line, 0, 1).unwrap();
        assert_eq!(patch.descriptor, line);
    }

    #[test]
    fn descriptor_trims_surrounding_whitespace() {
        let patch = parse_patch("  -a 1.0 -d 0.5 -z 0.1 -c 0.1  ", 0, 1).unwrap();
        assert_eq!(patch.descriptor, "-a 1.0 -d 0.5 -z 0.1 -c 0.1");
    }

    #[test]
    fn reject_unknown_form() {
        let err = parse_patch("patch number one", 0, 7).unwrap_err();
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn reject_truncated_box() {
        assert!(parse_patch("-a 1.0 -d 0.5 -z 0.1", 0, 1).is_err());
    }

    #[test]
    fn reject_bad_float() {
        let err = parse_patch("-a 1.0 -d 0.5 -z abc -c 0.1", 0, 2).unwrap_err();
        assert!(err.to_string().contains("invalid coordinate 'abc'"));
    }

    #[test]
    fn reject_empty_polygon() {
        assert!(parse_patch("-R", 0, 1).is_err());
        assert!(parse_patch("-R ()", 0, 1).is_err());
    }
}
