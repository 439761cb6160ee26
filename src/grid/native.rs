//! Native SILCS FragMap (`.map`) parser.
//!
//! ```text
//! GRID_PARAMETER_FILE 3fly.gpf
//! MACROMOLECULE 3fly.pdbqt
//! SPACING 1.0
//! NELEMENTS 2 2 1
//! CENTER 0.0 0.0 0.0
//! 1.0
//! -1.0
//! ...
//! ```
//!
//! The header ends at the first line whose first token is a float. `CENTER` is the
//! grid center, not its origin.

use std::collections::BTreeMap;

use tracing::trace;

use super::validation::Warning;
use super::{DataLayout, GridFormat, Placement, RawGrid};
use crate::error::ParseError;

/// Parse native map text into a [`RawGrid`] plus parse warnings.
pub fn parse(text: &str) -> Result<(RawGrid, Vec<Warning>), ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut spacing: Option<f64> = None;
    let mut dimensions: Option<[i64; 3]> = None;
    let mut center: Option<[f64; 3]> = None;
    let mut metadata = BTreeMap::new();

    let mut lines = text.lines().enumerate().peekable();

    // Header
    while let Some(&(idx, line)) = lines.peek() {
        let line = line.trim();
        if starts_numeric(line) {
            break;
        }
        lines.next();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let rest: Vec<&str> = tokens.collect();
        let invalid = |key: &'static str| ParseError::InvalidHeader {
            line: idx + 1,
            key,
            text: line.to_string(),
        };

        match key.to_ascii_uppercase().as_str() {
            "SPACING" => {
                let [s] = parse_fixed::<f64, 1>(&rest).ok_or_else(|| invalid("SPACING"))?;
                spacing = Some(s);
            }
            "NELEMENTS" => {
                dimensions = Some(parse_fixed(&rest).ok_or_else(|| invalid("NELEMENTS"))?);
            }
            "CENTER" => {
                center = Some(parse_fixed(&rest).ok_or_else(|| invalid("CENTER"))?);
            }
            _ => {
                metadata.insert(key.to_string(), rest.join(" "));
            }
        }
    }

    let dimensions = dimensions.ok_or(ParseError::MissingField("NELEMENTS"))?;
    let spacing = spacing.ok_or(ParseError::MissingField("SPACING"))?;
    let center = center.ok_or(ParseError::MissingField("CENTER"))?;
    trace!("Native header: dims={dimensions:?} spacing={spacing} center={center:?}");

    // Data
    let mut values = Vec::new();
    let mut dropped = 0usize;
    let mut first_dropped = 0usize;
    for (idx, line) in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split_whitespace() {
            match token.parse::<f32>() {
                Ok(v) => values.push(v),
                Err(_) => {
                    if dropped == 0 {
                        first_dropped = idx + 1;
                    }
                    dropped += 1;
                }
            }
        }
    }

    let mut warnings = Vec::new();
    if dropped > 0 {
        warnings.push(Warning::DroppedTokens {
            count: dropped,
            first_line: first_dropped,
        });
    }

    Ok((
        RawGrid {
            dimensions,
            spacing: [spacing; 3],
            placement: Placement::Center(center),
            layout: DataLayout::XFastest,
            values,
            metadata,
            format: GridFormat::Native,
        },
        warnings,
    ))
}

/// Data lines begin with a digit, a sign or a decimal point, or with a
/// float spelled out as `nan`/`inf`/`infinity`.
fn starts_numeric(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
        || line
            .split_whitespace()
            .next()
            .is_some_and(|token| token.parse::<f32>().is_ok())
}

/// Parse exactly `N` leading tokens; extra tokens are ignored.
pub(crate) fn parse_fixed<T: std::str::FromStr + Copy + Default, const N: usize>(
    tokens: &[&str],
) -> Option<[T; N]> {
    if tokens.len() < N {
        return None;
    }
    let mut out = [T::default(); N];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token.parse().ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = "\
GRID_PARAMETER_FILE 3fly.gpf
GRID_DATA_FILE 3fly.maps.fld
MACROMOLECULE 3fly.pdbqt
SPACING 1.0
NELEMENTS 2 2 1
CENTER 0.000 0.000 0.000
1.0
-1.0
-1.0
1.0
";

    #[test]
    fn header_and_data() {
        let (raw, warnings) = parse(SMALL_MAP).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(raw.dimensions, [2, 2, 1]);
        assert_eq!(raw.spacing, [1.0; 3]);
        assert_eq!(raw.placement, Placement::Center([0.0; 3]));
        assert_eq!(raw.values, vec![1.0, -1.0, -1.0, 1.0]);
        assert_eq!(raw.layout, DataLayout::XFastest);
    }

    #[test]
    fn unknown_keys_are_metadata() {
        let (raw, _) = parse(SMALL_MAP).unwrap();
        assert_eq!(raw.metadata.get("MACROMOLECULE").unwrap(), "3fly.pdbqt");
        assert_eq!(raw.metadata.get("GRID_PARAMETER_FILE").unwrap(), "3fly.gpf");
        assert!(!raw.metadata.contains_key("SPACING"));
    }

    #[test]
    fn multiple_values_per_line_and_comments() {
        let text = "SPACING 0.5\nNELEMENTS 2 2 2\nCENTER 1 2 3\n\
                    -0.5 0.25 .75\n# interior comment\n\n+1 -2e-1 3 4 5\n";
        let (raw, warnings) = parse(text).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(raw.values, vec![-0.5, 0.25, 0.75, 1.0, -0.2, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn counts_dropped_tokens() {
        let text = "SPACING 1\nNELEMENTS 2 1 1\nCENTER 0 0 0\n0.5\nabc -1.0 x\n";
        let (raw, warnings) = parse(text).unwrap();
        assert_eq!(raw.values, vec![0.5, -1.0]);
        assert_eq!(
            warnings,
            vec![Warning::DroppedTokens {
                count: 2,
                first_line: 5
            }]
        );
    }

    #[test]
    fn spelled_out_floats_end_the_header() {
        for first in ["NaN", "nan", "inf", "-Infinity"] {
            let text = format!("SPACING 1\nNELEMENTS 2 1 1\nCENTER 0 0 0\n{first}\n1.0\n");
            let (raw, warnings) = parse(&text).unwrap();
            assert!(warnings.is_empty());
            assert!(raw.metadata.is_empty());
            assert_eq!(raw.values.len(), 2);
            assert!(!raw.values[0].is_finite());
            assert_eq!(raw.values[1], 1.0);
        }
    }

    #[test]
    fn missing_nelements_is_fatal() {
        let err = parse("SPACING 1.0\nCENTER 0 0 0\n1.0\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingField("NELEMENTS")));
    }

    #[test]
    fn missing_spacing_is_fatal() {
        let err = parse("NELEMENTS 1 1 1\nCENTER 0 0 0\n1.0\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingField("SPACING")));
    }

    #[test]
    fn malformed_header_value() {
        let err = parse("SPACING 1.0\nNELEMENTS 2 two 1\nCENTER 0 0 0\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidHeader {
                line: 2,
                key: "NELEMENTS",
                ..
            }
        ));
    }

    #[test]
    fn empty_input() {
        assert!(matches!(parse("  \n\n"), Err(ParseError::Empty)));
    }

    #[test]
    fn reads_fixture() {
        let root = env!("CARGO_MANIFEST_DIR");
        let path = format!("{}/{}", root, "test-data/3x3x3.apolar.gfe.map");
        let text = std::fs::read_to_string(path).unwrap();
        let (raw, warnings) = parse(&text).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(raw.dimensions, [3, 3, 3]);
        assert_eq!(raw.values.len(), 27);
        assert_eq!(raw.spacing, [0.5; 3]);
    }
}
