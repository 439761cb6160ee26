//! OpenDX scalar field (`.dx`) parser.
//!
//! Only the regular-grid subset written by APBS/SILCS/VMD is supported:
//!
//! ```text
//! object 1 class gridpositions counts nx ny nz
//! origin x0 y0 z0
//! delta dx 0 0
//! delta 0 dy 0
//! delta 0 0 dz
//! object 2 class gridconnections counts nx ny nz
//! object 3 class array type double rank 0 items n data follows
//! v v v
//! ...
//! attribute "dep" string "positions"
//! ```
//!
//! Values are listed with z varying fastest.

use std::collections::BTreeMap;

use tracing::trace;

use super::native::parse_fixed;
use super::validation::Warning;
use super::{DataLayout, GridFormat, Placement, RawGrid};
use crate::error::ParseError;

/// Parse OpenDX text into a [`RawGrid`] plus parse warnings.
pub fn parse(text: &str) -> Result<(RawGrid, Vec<Warning>), ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut dimensions: Option<[i64; 3]> = None;
    let mut origin: Option<[f64; 3]> = None;
    let mut deltas: Vec<[f64; 3]> = Vec::with_capacity(3);
    let mut items: Option<usize> = None;
    let mut data_start: Option<usize> = None;
    let mut comments: Vec<&str> = Vec::new();

    let lines: Vec<&str> = text.lines().collect();

    for (idx, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            comments.push(comment.trim());
            continue;
        }
        let invalid = |key: &'static str| ParseError::InvalidHeader {
            line: idx + 1,
            key,
            text: line.to_string(),
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if line.contains("class array") && line.contains("data follows") {
            if let Some(pos) = tokens.iter().position(|t| *t == "items") {
                let n = tokens
                    .get(pos + 1)
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| invalid("items"))?;
                items = Some(n);
            }
            data_start = Some(idx + 1);
            break;
        }

        match tokens[0] {
            "object" if line.contains("gridpositions") && dimensions.is_none() => {
                let pos = tokens
                    .iter()
                    .position(|t| *t == "counts")
                    .ok_or_else(|| invalid("counts"))?;
                dimensions =
                    Some(parse_fixed(&tokens[pos + 1..]).ok_or_else(|| invalid("counts"))?);
            }
            "origin" => {
                origin = Some(parse_fixed(&tokens[1..]).ok_or_else(|| invalid("origin"))?);
            }
            "delta" => {
                let row = deltas.len();
                if row >= 3 {
                    return Err(invalid("delta"));
                }
                let delta: [f64; 3] =
                    parse_fixed(&tokens[1..]).ok_or_else(|| invalid("delta"))?;
                if (0..3).any(|axis| axis != row && delta[axis] != 0.0) {
                    return Err(ParseError::OffDiagonalDelta { row, delta });
                }
                deltas.push(delta);
            }
            _ => {}
        }
    }

    let dimensions = dimensions.ok_or(ParseError::MissingField("counts"))?;
    let origin = origin.ok_or(ParseError::MissingField("origin"))?;
    if deltas.len() < 3 {
        return Err(ParseError::MissingField("delta"));
    }
    let spacing = [deltas[0][0], deltas[1][1], deltas[2][2]];
    let data_start = data_start.ok_or(ParseError::MissingField("data follows"))?;
    trace!("OpenDX header: counts={dimensions:?} origin={origin:?} spacing={spacing:?}");

    let mut warnings = Vec::new();
    if let Some(declared) = items {
        let expected = dimensions
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n.max(0) as usize))
            .ok_or(ParseError::CountOverflow(dimensions))?;
        if declared != expected {
            warnings.push(Warning::ItemCountMismatch { declared, expected });
        }
    }

    // `items` is untrusted; the vector grows with what the file actually holds
    let mut values = Vec::new();
    let mut dropped = 0usize;
    let mut first_dropped = 0usize;
    'data: for (offset, raw_line) in lines[data_start..].iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_trailer(line) {
            break;
        }
        for token in line.split_whitespace() {
            if items.is_some_and(|n| values.len() >= n) {
                break 'data;
            }
            match token.parse::<f32>() {
                Ok(v) => values.push(v),
                Err(_) => {
                    if dropped == 0 {
                        first_dropped = data_start + offset + 1;
                    }
                    dropped += 1;
                }
            }
        }
    }
    if dropped > 0 {
        warnings.push(Warning::DroppedTokens {
            count: dropped,
            first_line: first_dropped,
        });
    }

    let mut metadata = BTreeMap::new();
    if !comments.is_empty() {
        metadata.insert("comment".to_string(), comments.join("\n"));
    }

    Ok((
        RawGrid {
            dimensions,
            spacing,
            placement: Placement::Origin(origin),
            layout: DataLayout::ZFastest,
            values,
            metadata,
            format: GridFormat::OpenDx,
        },
        warnings,
    ))
}

/// Lines that follow the data block in a complete DX file.
fn is_trailer(line: &str) -> bool {
    ["attribute", "object", "component"]
        .iter()
        .any(|kw| line.starts_with(kw))
}
