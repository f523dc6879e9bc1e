//! Minimize-facilities location-allocation.
//!
//! Candidate polling places and voters are snapped onto the road network, a
//! coverage matrix of network impedances within the cutoff is computed, and
//! polling places are chosen greedily by the voter weight they would newly
//! serve. Results are immutable outcome records indexed like the inputs.

mod coverage;
pub mod extract;
mod solver;

#[cfg(test)]
mod solver_tests;

pub use coverage::{CoverageEntry, CoverageMatrix};
pub use extract::{AssignedDemand, ExtractedResults, SelectedFacility, extract};
pub use solver::LocationAllocationSolver;

use crate::ids::{DemandId, FacilityId};
use crate::network::NetworkLocation;
use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// A candidate polling place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub coord: Coord<f64>,
    /// Total demand weight the facility may serve. `None` is unlimited.
    #[serde(default)]
    pub capacity: Option<f64>,
}

impl Facility {
    pub fn new(id: u64, x: f64, y: f64) -> Self {
        Self {
            id: FacilityId(id),
            coord: Coord { x, y },
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A voter, or a group of voters sharing one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    pub id: DemandId,
    pub coord: Coord<f64>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl DemandPoint {
    pub fn new(id: u64, x: f64, y: f64) -> Self {
        Self {
            id: DemandId(id),
            coord: Coord { x, y },
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilityStatus {
    Selected,
    /// Snapped but never chosen.
    Candidate,
    /// No network edge within the snap tolerance.
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityOutcome {
    pub id: FacilityId,
    pub coord: Coord<f64>,
    pub capacity: Option<f64>,
    pub status: FacilityStatus,
    #[serde(skip)]
    pub location: Option<NetworkLocation>,
    pub assigned_count: usize,
    pub assigned_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DemandStatus {
    Assigned { facility: FacilityId, impedance: f64 },
    /// Snapped, but no selected facility serves it within the cutoff.
    Unassigned,
    /// No network edge within the snap tolerance.
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandOutcome {
    pub id: DemandId,
    pub coord: Coord<f64>,
    pub weight: f64,
    pub status: DemandStatus,
    #[serde(skip)]
    pub location: Option<NetworkLocation>,
}

impl DemandOutcome {
    pub fn assigned_facility(&self) -> Option<FacilityId> {
        match self.status {
            DemandStatus::Assigned { facility, .. } => Some(facility),
            _ => None,
        }
    }
}

/// One round of the greedy cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionStep {
    pub facility: FacilityId,
    /// Demand weight newly claimed by the facility in this round.
    pub gain: f64,
    pub claimed: usize,
}

/// Solver output. `facilities` and `demand` keep the order of the inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSolution {
    pub facilities: Vec<FacilityOutcome>,
    pub demand: Vec<DemandOutcome>,
    pub trace: Vec<SelectionStep>,
}

impl AllocationSolution {
    pub fn selected(&self) -> impl Iterator<Item = &FacilityOutcome> {
        self.facilities
            .iter()
            .filter(|f| f.status == FacilityStatus::Selected)
    }

    pub fn facility(&self, id: FacilityId) -> Option<&FacilityOutcome> {
        self.facilities.iter().find(|f| f.id == id)
    }

    pub fn demand_point(&self, id: DemandId) -> Option<&DemandOutcome> {
        self.demand.iter().find(|d| d.id == id)
    }

    pub fn count_demand(&self, matches: impl Fn(&DemandStatus) -> bool) -> (usize, f64) {
        self.demand
            .iter()
            .filter(|d| matches(&d.status))
            .fold((0, 0.0), |(n, w), d| (n + 1, w + d.weight))
    }
}
