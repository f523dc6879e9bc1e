use crate::error::InputError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Neighbourhood used when grouping raster cells into precinct regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Cells sharing an edge belong together. Diagonal neighbours become
    /// separate polygons.
    #[default]
    Four,
    /// Cells sharing an edge or a corner belong together.
    Eight,
}

/// Which way a voter travels when measuring impedance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TravelDirection {
    #[default]
    DemandToFacility,
    FacilityToDemand,
}

/// Points that seed the Euclidean allocation raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterSource {
    /// The selected polling places themselves.
    #[default]
    SelectedFacilities,
    /// Every assigned voter, labelled with its polling place.
    AssignedDemand,
}

/// How demand is attributed once the greedy cover has picked facilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignmentRule {
    /// Demand stays with the facility whose selection claimed it.
    #[default]
    ClaimingFacility,
    /// Demand moves to its nearest selected facility that still has room.
    NearestSelected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum impedance between a voter and its polling place.
    pub impedance_cutoff: f64,
    /// Maximum perpendicular distance when snapping points onto the network.
    pub snap_tolerance: f64,
    /// Edge length of an allocation raster cell.
    pub cell_size: f64,
    /// Douglas-Peucker tolerance for precinct boundaries. Zero keeps the exact
    /// cell staircase.
    pub simplification_tolerance: f64,
    pub connectivity: Connectivity,
    /// When set, distances closer than `tie_tolerance` compare as equal and
    /// fall through to the identifier tie-break.
    pub deterministic_ties: bool,
    pub tie_tolerance: f64,
    pub travel_direction: TravelDirection,
    pub raster_source: RasterSource,
    pub assignment_rule: AssignmentRule,
    pub max_raster_cells: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // one mile, in the feet-based state plane units the source data uses
            impedance_cutoff: 5280.0,
            snap_tolerance: 1000.0,
            cell_size: 50.0,
            simplification_tolerance: 25.0,
            connectivity: Connectivity::Four,
            deterministic_ties: true,
            tie_tolerance: 1e-9,
            travel_direction: TravelDirection::DemandToFacility,
            raster_source: RasterSource::SelectedFacilities,
            assignment_rule: AssignmentRule::ClaimingFacility,
            max_raster_cells: 100_000_000,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl PipelineConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        fn invalid(field: &'static str, reason: &str) -> InputError {
            InputError::InvalidConfig {
                field,
                reason: reason.to_string(),
            }
        }

        if self.impedance_cutoff.is_nan() || self.impedance_cutoff < 0.0 {
            return Err(invalid("impedance_cutoff", "must be a non-negative number"));
        }
        if !self.snap_tolerance.is_finite() || self.snap_tolerance < 0.0 {
            return Err(invalid("snap_tolerance", "must be a finite non-negative number"));
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(invalid("cell_size", "must be a finite positive number"));
        }
        if !self.simplification_tolerance.is_finite() || self.simplification_tolerance < 0.0 {
            return Err(invalid(
                "simplification_tolerance",
                "must be a finite non-negative number",
            ));
        }
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(invalid("tie_tolerance", "must be a finite non-negative number"));
        }
        if self.max_raster_cells == 0 {
            return Err(invalid("max_raster_cells", "must be at least 1"));
        }
        Ok(())
    }

    pub fn tie_break(&self) -> TieBreak {
        if self.deterministic_ties {
            TieBreak::new(self.tie_tolerance)
        } else {
            TieBreak::EXACT
        }
    }
}

/// Quantises distances before they are compared so that floating point noise
/// cannot flip an identifier tie-break from one run to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TieBreak {
    tolerance: f64,
}

impl TieBreak {
    pub const EXACT: TieBreak = TieBreak { tolerance: 0.0 };

    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    /// Ordering key for `value`. Values within one tolerance bucket share a key.
    pub fn key(&self, value: f64) -> OrderedFloat<f64> {
        if self.tolerance > 0.0 && value.is_finite() {
            OrderedFloat((value / self.tolerance).round() * self.tolerance)
        } else {
            OrderedFloat(value)
        }
    }
}
