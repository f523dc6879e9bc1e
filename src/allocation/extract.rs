use super::{AllocationSolution, DemandStatus, FacilityStatus};
use crate::ids::{DemandId, FacilityId};
use geo_types::Coord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedFacility {
    pub id: FacilityId,
    pub coord: Coord<f64>,
    pub assigned_demand_count: usize,
    pub assigned_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedDemand {
    pub id: DemandId,
    pub coord: Coord<f64>,
    pub facility: FacilityId,
    pub impedance: f64,
}

/// The two views handed to rasterisation and persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedResults {
    pub selected_facilities: Vec<SelectedFacility>,
    pub assigned_demand: Vec<AssignedDemand>,
}

pub fn extract(solution: &AllocationSolution) -> ExtractedResults {
    let selected_facilities = solution
        .facilities
        .iter()
        .filter(|f| f.status == FacilityStatus::Selected)
        .map(|f| SelectedFacility {
            id: f.id,
            coord: f.coord,
            assigned_demand_count: f.assigned_count,
            assigned_weight: f.assigned_weight,
        })
        .collect();

    let assigned_demand = solution
        .demand
        .iter()
        .filter_map(|d| match d.status {
            DemandStatus::Assigned {
                facility,
                impedance,
            } => Some(AssignedDemand {
                id: d.id,
                coord: d.coord,
                facility,
                impedance,
            }),
            DemandStatus::Unassigned | DemandStatus::Excluded => None,
        })
        .collect();

    ExtractedResults {
        selected_facilities,
        assigned_demand,
    }
}
