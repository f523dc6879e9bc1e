use crate::config::{TieBreak, TravelDirection};
use crate::ids::DemandId;
use crate::network::{NetworkLocation, RoutingService};
use rayon::prelude::*;

/// A demand point a facility can reach within the cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageEntry {
    /// Index into the demand input.
    pub demand: u32,
    pub cost: f64,
}

/// Facility-by-demand impedances within the cutoff.
///
/// Row `i` belongs to facility input `i` and is ordered nearest first, equal
/// costs by ascending demand id. Pairs beyond the cutoff or unreachable are
/// absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageMatrix {
    rows: Vec<Vec<CoverageEntry>>,
}

impl CoverageMatrix {
    /// One destination-rooted (or origin-rooted, for
    /// [`TravelDirection::FacilityToDemand`]) search per facility, run in
    /// parallel. Unsnapped facilities get an empty row and unsnapped demand
    /// never appears.
    pub fn compute<R: RoutingService + ?Sized>(
        router: &R,
        facilities: &[Option<NetworkLocation>],
        demand: &[Option<NetworkLocation>],
        demand_ids: &[DemandId],
        cutoff: f64,
        direction: TravelDirection,
        tie: TieBreak,
    ) -> Self {
        let (indices, locations): (Vec<u32>, Vec<NetworkLocation>) = demand
            .iter()
            .enumerate()
            .filter_map(|(i, loc)| loc.map(|loc| (i as u32, loc)))
            .unzip();

        let rows = facilities
            .par_iter()
            .map(|site| {
                let Some(site) = site else {
                    return Vec::new();
                };

                let costs = match direction {
                    TravelDirection::DemandToFacility => {
                        router.distances_to(site, &locations, Some(cutoff))
                    }
                    TravelDirection::FacilityToDemand => {
                        router.distances_from(site, &locations, Some(cutoff))
                    }
                };

                let mut row: Vec<CoverageEntry> = indices
                    .iter()
                    .zip(costs)
                    .filter_map(|(&demand, cost)| {
                        cost.filter(|c| *c <= cutoff)
                            .map(|cost| CoverageEntry { demand, cost })
                    })
                    .collect();

                row.sort_by(|a, b| {
                    tie.key(a.cost)
                        .cmp(&tie.key(b.cost))
                        .then_with(|| demand_ids[a.demand as usize].cmp(&demand_ids[b.demand as usize]))
                });
                row
            })
            .collect();

        Self { rows }
    }

    pub fn row(&self, facility: usize) -> &[CoverageEntry] {
        &self.rows[facility]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of facility/demand pairs within the cutoff.
    pub fn pair_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}
