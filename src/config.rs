//! Pipeline configuration.
//!
//! Every tunable lives in [`PipelineConfig`] and is passed in at call time.

use std::fmt;
use std::path::Path;

use crate::region::RegionParams;
use crate::sampling::{Direction, SamplingParams, Threshold};

/// Default isovalue for GFE maps (kcal/mol).
pub const DEFAULT_GFE_ISOVALUE: f32 = -1.0;
/// Default isovalue for exclusion maps.
pub const DEFAULT_EXCLUSION_ISOVALUE: f32 = 0.5;

/// SILCS FragMap types and their inclusion direction.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragMapKind {
    /// Generic apolar (benzene/propane)
    Apolar,
    /// Neutral hydrogen-bond donor
    HbondDonor,
    /// Neutral hydrogen-bond acceptor
    HbondAcceptor,
    /// Positive donor (methylammonium)
    PositiveDonor,
    /// Negative acceptor (acetate)
    NegativeAcceptor,
    /// Methanol oxygen
    Alcohol,
    /// Regions never visited by solutes or water
    Exclusion,
}

impl FragMapKind {
    /// All kinds, in display order.
    pub const ALL: [FragMapKind; 7] = [
        FragMapKind::Apolar,
        FragMapKind::HbondDonor,
        FragMapKind::HbondAcceptor,
        FragMapKind::PositiveDonor,
        FragMapKind::NegativeAcceptor,
        FragMapKind::Alcohol,
        FragMapKind::Exclusion,
    ];

    /// Side of the isovalue that counts as a hit for this map type.
    pub fn direction(self) -> Direction {
        match self {
            FragMapKind::Exclusion => Direction::Exclusion,
            _ => Direction::Favorable,
        }
    }

    /// Isovalue used when none is given.
    pub fn default_isovalue(self) -> f32 {
        match self {
            FragMapKind::Exclusion => DEFAULT_EXCLUSION_ISOVALUE,
            _ => DEFAULT_GFE_ISOVALUE,
        }
    }

    /// Threshold at the default isovalue in this kind's direction.
    pub fn default_threshold(self) -> Threshold {
        Threshold {
            value: self.default_isovalue(),
            direction: self.direction(),
        }
    }

    /// Short tag used in SILCS file names, e.g. `3fly.hbdon.gfe.map`.
    pub fn file_tag(self) -> &'static str {
        match self {
            FragMapKind::Apolar => "apolar",
            FragMapKind::HbondDonor => "hbdon",
            FragMapKind::HbondAcceptor => "hbacc",
            FragMapKind::PositiveDonor => "mamn",
            FragMapKind::NegativeAcceptor => "acec",
            FragMapKind::Alcohol => "meoo",
            FragMapKind::Exclusion => "excl",
        }
    }

    /// Infer the kind from a file name containing one of the SILCS tags.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let tokens: Vec<&str> = name.split(['.', '_', '-']).collect();
        Self::ALL
            .into_iter()
            .find(|kind| tokens.contains(&kind.file_tag()))
    }
}

impl fmt::Display for FragMapKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.file_tag())
    }
}

/// Everything the pipeline needs besides the grid text and the anchors.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Cutoff and direction
    pub threshold: Threshold,
    /// Stride, point cap and parallelism of the sampler
    pub sampling: SamplingParams,
    /// Region filter settings; `None` skips region filtering
    pub region: Option<RegionParams>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_kind(FragMapKind::Apolar)
    }
}

impl PipelineConfig {
    /// Defaults for a given map type.
    pub fn for_kind(kind: FragMapKind) -> Self {
        Self {
            threshold: kind.default_threshold(),
            sampling: SamplingParams::default(),
            region: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_carry_direction() {
        for kind in FragMapKind::ALL {
            let expected = if kind == FragMapKind::Exclusion {
                Direction::Exclusion
            } else {
                Direction::Favorable
            };
            assert_eq!(kind.direction(), expected);
            assert_eq!(kind.default_threshold().direction, expected);
        }
        assert_eq!(FragMapKind::Exclusion.default_isovalue(), 0.5);
        assert_eq!(FragMapKind::HbondDonor.default_isovalue(), -1.0);
    }

    #[test]
    fn kind_from_file_name() {
        assert_eq!(
            FragMapKind::from_path(Path::new("/data/3fly.hbdon.gfe.map")),
            Some(FragMapKind::HbondDonor)
        );
        assert_eq!(
            FragMapKind::from_path(Path::new("3fly_excl.dx")),
            Some(FragMapKind::Exclusion)
        );
        assert_eq!(
            FragMapKind::from_path(Path::new("3FLY.MAMN.GFE.MAP")),
            Some(FragMapKind::PositiveDonor)
        );
        assert_eq!(FragMapKind::from_path(Path::new("density.map")), None);
    }

    #[test]
    fn default_config_is_favorable() {
        let config = PipelineConfig::default();
        assert_eq!(config.threshold, Threshold::favorable(-1.0));
        assert!(config.region.is_none());
        assert_eq!(config.sampling.stride, 1);
    }
}
