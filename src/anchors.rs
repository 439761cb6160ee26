//! Reference anchors from protein/ligand structures.
//!
//! Structures are read with [`pdbtbx`]; anchors are residue centroids or
//! individual ligand atoms from the first model.

use std::fmt;
use std::str::FromStr;

use nalgebra as na;
use pdbtbx::*;
use tracing::{debug, warn};

use crate::region::ReferenceAnchor;

/// Open a PDB or mmCIF file with [`pdbtbx`], keeping every residue.
///
/// Non-fatal problems are returned next to the structure; fatal ones as `Err`.
pub fn load_structure(input_file: &str) -> Result<(PDB, Vec<PDBError>), Vec<PDBError>> {
    pdbtbx::ReadOptions::default()
        .set_only_atomic_coords(true)
        .set_level(pdbtbx::StrictnessLevel::Loose)
        .read(input_file)
}

/// A residue reference such as `A:45` or `B:100A` (chain, number, insertion code).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResidueSelector {
    /// Chain identifier
    pub chain: String,
    /// Residue sequence number
    pub resi: isize,
    /// Insertion code, if any
    pub insertion: Option<String>,
}

impl ResidueSelector {
    /// Whether the selector refers to this chain/residue pair.
    pub fn matches(&self, chain: &str, resi: isize, insertion: Option<&str>) -> bool {
        self.chain == chain && self.resi == resi && self.insertion.as_deref() == insertion
    }
}

impl FromStr for ResidueSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, number) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("Residue selector {s:?} must look like CHAIN:NUMBER"))?;
        if chain.is_empty() {
            return Err(format!("Residue selector {s:?} has an empty chain"));
        }

        let split = number
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
            .map_or(number.len(), |(i, _)| i);
        let (digits, insertion) = number.split_at(split);
        let resi = digits
            .parse::<isize>()
            .map_err(|_| format!("Residue selector {s:?} has an invalid residue number"))?;

        Ok(Self {
            chain: chain.to_string(),
            resi,
            insertion: (!insertion.is_empty()).then(|| insertion.to_string()),
        })
    }
}

impl fmt::Display for ResidueSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}{}",
            self.chain,
            self.resi,
            self.insertion.as_deref().unwrap_or("")
        )
    }
}

/// Parse a comma-separated residue selection, e.g. `"A:45,A:46,B:100A"`.
pub fn parse_residue_selection(selection: &str) -> Result<Vec<ResidueSelector>, String> {
    selection
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ResidueSelector::from_str)
        .collect()
}

/// One anchor per selected residue, placed at the centroid of its atoms.
///
/// Selectors that match nothing in the first model are logged and skipped.
pub fn residue_anchors(pdb: &PDB, selectors: &[ResidueSelector]) -> Vec<ReferenceAnchor> {
    let Some(model) = pdb.models().next() else {
        return Vec::new();
    };

    let mut anchors = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let found = model.chains().find_map(|chain| {
            chain
                .residues()
                .find(|res| {
                    let (resi, insertion) = res.id();
                    selector.matches(chain.id(), resi, insertion)
                })
                .map(|res| (chain, res))
        });

        let Some((chain, residue)) = found else {
            warn!("Residue {selector} not found in structure");
            continue;
        };
        let Some(center) = centroid(residue.atoms()) else {
            warn!("Residue {selector} has no atoms");
            continue;
        };

        let label = format!(
            "{}:{}{} {}",
            chain.id(),
            residue.serial_number(),
            residue.insertion_code().unwrap_or(""),
            residue.name().unwrap_or("UNK")
        );
        anchors.push(ReferenceAnchor::with_label(center, label));
    }
    debug!("Built {} residue anchor(s)", anchors.len());
    anchors
}

/// One anchor per atom of every residue named `resn` (e.g. a docked ligand) in the first model.
pub fn ligand_anchors(pdb: &PDB, resn: &str) -> Vec<ReferenceAnchor> {
    let Some(model) = pdb.models().next() else {
        return Vec::new();
    };

    let anchors: Vec<ReferenceAnchor> = model
        .chains()
        .flat_map(|chain| chain.residues().map(move |res| (chain, res)))
        .filter(|(_, res)| res.name().is_some_and(|n| n.eq_ignore_ascii_case(resn)))
        .flat_map(|(chain, res)| {
            res.atoms().map(move |atom| {
                let (x, y, z) = atom.pos();
                ReferenceAnchor::with_label(
                    na::Point3::new(x, y, z),
                    format!(
                        "{}:{} {} {}",
                        chain.id(),
                        res.serial_number(),
                        res.name().unwrap_or("UNK"),
                        atom.name()
                    ),
                )
            })
        })
        .collect();
    debug!("Built {} ligand atom anchor(s) for {resn}", anchors.len());
    anchors
}

fn centroid<'a>(atoms: impl Iterator<Item = &'a Atom>) -> Option<na::Point3<f64>> {
    let (sum, n) = atoms.fold((na::Vector3::zeros(), 0usize), |(sum, n), atom| {
        let (x, y, z) = atom.pos();
        (sum + na::Vector3::new(x, y, z), n + 1)
    });
    (n > 0).then(|| na::Point3::from(sum / n as f64))
}
