use super::coverage::{CoverageEntry, CoverageMatrix};
use super::{
    AllocationSolution, DemandOutcome, DemandPoint, DemandStatus, Facility, FacilityOutcome,
    FacilityStatus, SelectionStep,
};
use crate::config::{AssignmentRule, PipelineConfig, TieBreak};
use crate::error::InputError;
use crate::network::{NetworkLocation, PointSnapper, RoutingService};
use ahash::AHashSet as HashSet;
use geo_types::Coord;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Assignment {
    facility: u32,
    cost: f64,
}

/// Demand a facility would newly serve this round.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Gain {
    weight: f64,
    count: usize,
}

/// Mutable solve state. Lives only inside [`LocationAllocationSolver::solve`].
struct Cover<'p> {
    facilities: &'p [Facility],
    demand: &'p [DemandPoint],
    assigned: Vec<Option<Assignment>>,
    load: Vec<f64>,
    selected: Vec<bool>,
}

impl Cover<'_> {
    fn fits(&self, facility: usize, weight: f64) -> bool {
        self.facilities[facility]
            .capacity
            .is_none_or(|capacity| self.load[facility] + weight <= capacity)
    }

    /// Walks the facility's coverage row nearest first and claims every
    /// unassigned demand point that still fits in the remaining capacity.
    fn claims<'r>(
        &self,
        facility: usize,
        row: &'r [CoverageEntry],
    ) -> impl Iterator<Item = &'r CoverageEntry> {
        let capacity = self.facilities[facility].capacity;
        let mut load = self.load[facility];

        row.iter().filter(move |entry| {
            if self.assigned[entry.demand as usize].is_some() {
                return false;
            }
            let weight = self.demand[entry.demand as usize].weight;
            if capacity.is_some_and(|capacity| load + weight > capacity) {
                return false;
            }
            load += weight;
            true
        })
    }

    fn gain(&self, facility: usize, row: &[CoverageEntry]) -> Gain {
        self.claims(facility, row).fold(Gain::default(), |gain, entry| Gain {
            weight: gain.weight + self.demand[entry.demand as usize].weight,
            count: gain.count + 1,
        })
    }

    fn assign(&mut self, demand: usize, facility: usize, cost: f64) {
        if let Some(previous) = self.assigned[demand] {
            self.load[previous.facility as usize] -= self.demand[demand].weight;
        }
        self.load[facility] += self.demand[demand].weight;
        self.assigned[demand] = Some(Assignment {
            facility: facility as u32,
            cost,
        });
    }
}

/// Greater is better: more weight, then the lower id.
fn compare_candidates(
    facilities: &[Facility],
    (fa, ga): (usize, Gain),
    (fb, gb): (usize, Gain),
) -> Ordering {
    OrderedFloat(ga.weight)
        .cmp(&OrderedFloat(gb.weight))
        .then_with(|| facilities[fb].id.cmp(&facilities[fa].id))
}

pub struct LocationAllocationSolver<'a, R: RoutingService + ?Sized> {
    router: &'a R,
    snapper: &'a PointSnapper<'a>,
    config: &'a PipelineConfig,
}

impl<'a, R: RoutingService + ?Sized> LocationAllocationSolver<'a, R> {
    pub fn new(router: &'a R, snapper: &'a PointSnapper<'a>, config: &'a PipelineConfig) -> Self {
        Self {
            router,
            snapper,
            config,
        }
    }

    pub fn solve(
        &self,
        facilities: &[Facility],
        demand: &[DemandPoint],
    ) -> Result<AllocationSolution, InputError> {
        validate(facilities, demand)?;
        let tie = self.config.tie_break();

        let facility_locations = self.snap_all(facilities.iter().map(|f| f.coord).collect());
        let demand_locations = self.snap_all(demand.iter().map(|d| d.coord).collect());

        let excluded_facilities = facility_locations.iter().filter(|l| l.is_none()).count();
        let excluded_demand = demand_locations.iter().filter(|l| l.is_none()).count();
        if excluded_facilities > 0 || excluded_demand > 0 {
            warn!(
                "{} facilities and {} demand points have no network edge within {}",
                excluded_facilities, excluded_demand, self.config.snap_tolerance
            );
        }

        let demand_ids: Vec<_> = demand.iter().map(|d| d.id).collect();
        let matrix = CoverageMatrix::compute(
            self.router,
            &facility_locations,
            &demand_locations,
            &demand_ids,
            self.config.impedance_cutoff,
            self.config.travel_direction,
            tie,
        );
        info!(
            "Coverage matrix: {} facilities, {} pairs within cutoff {}",
            matrix.len(),
            matrix.pair_count(),
            self.config.impedance_cutoff
        );

        let mut cover = Cover {
            facilities,
            demand,
            assigned: vec![None; demand.len()],
            load: vec![0.0; facilities.len()],
            selected: vec![false; facilities.len()],
        };
        let trace = greedy_cover(&mut cover, &matrix);

        if self.config.assignment_rule == AssignmentRule::NearestSelected {
            let moved = reassign_to_nearest(&mut cover, &matrix, tie);
            debug!("Nearest-selected pass moved {} demand points", moved);
        }

        let solution = build_solution(&cover, facility_locations, demand_locations, trace);
        info!(
            "Selected {} of {} facilities",
            solution.trace.len(),
            facilities.len()
        );
        Ok(solution)
    }

    fn snap_all(&self, coords: Vec<Coord<f64>>) -> Vec<Option<NetworkLocation>> {
        let tolerance = self.config.snap_tolerance;
        coords
            .into_par_iter()
            .map(|coord| match self.snapper.snap(coord, tolerance) {
                Ok(location) => Some(location),
                Err(err) => {
                    debug!("Excluding point: {}", err);
                    None
                }
            })
            .collect()
    }
}

fn validate(facilities: &[Facility], demand: &[DemandPoint]) -> Result<(), InputError> {
    if facilities.is_empty() {
        return Err(InputError::NoFacilities);
    }
    if demand.is_empty() {
        return Err(InputError::NoDemand);
    }

    let mut seen = HashSet::with_capacity(facilities.len());
    for facility in facilities {
        if !seen.insert(facility.id) {
            return Err(InputError::DuplicateFacility(facility.id));
        }
        if let Some(capacity) = facility.capacity
            && (capacity.is_nan() || capacity < 0.0)
        {
            return Err(InputError::InvalidCapacity {
                id: facility.id,
                capacity,
            });
        }
    }

    let mut seen = HashSet::with_capacity(demand.len());
    for point in demand {
        if !seen.insert(point.id) {
            return Err(InputError::DuplicateDemand(point.id));
        }
        if !point.weight.is_finite() || point.weight < 0.0 {
            return Err(InputError::InvalidWeight {
                id: point.id,
                weight: point.weight,
            });
        }
    }

    Ok(())
}

/// Rounds are sequential; the gains within a round are evaluated in parallel.
fn greedy_cover(cover: &mut Cover<'_>, matrix: &CoverageMatrix) -> Vec<SelectionStep> {
    let mut trace = Vec::new();

    loop {
        let best = {
            let cover = &*cover;
            (0..matrix.len())
                .into_par_iter()
                .filter(|&f| !cover.selected[f])
                .map(|f| (f, cover.gain(f, matrix.row(f))))
                .filter(|(_, gain)| gain.count > 0)
                .max_by(|a, b| compare_candidates(cover.facilities, *a, *b))
        };

        let Some((facility, gain)) = best else {
            break;
        };

        let claimed: Vec<CoverageEntry> = cover
            .claims(facility, matrix.row(facility))
            .copied()
            .collect();
        for entry in &claimed {
            cover.assign(entry.demand as usize, facility, entry.cost);
        }
        cover.selected[facility] = true;

        debug!(
            "Round {}: facility {} claims {} demand points (weight {})",
            trace.len() + 1,
            cover.facilities[facility].id,
            gain.count,
            gain.weight
        );
        trace.push(SelectionStep {
            facility: cover.facilities[facility].id,
            gain: gain.weight,
            claimed: gain.count,
        });
    }

    trace
}

/// Moves demand to its nearest selected facility with room for it. Demand is
/// visited in id order and only moves for a strictly better facility.
fn reassign_to_nearest(cover: &mut Cover<'_>, matrix: &CoverageMatrix, tie: TieBreak) -> usize {
    let mut options: Vec<Vec<(u32, f64)>> = vec![Vec::new(); cover.demand.len()];
    for facility in (0..matrix.len()).filter(|&f| cover.selected[f]) {
        for entry in matrix.row(facility) {
            options[entry.demand as usize].push((facility as u32, entry.cost));
        }
    }

    let order = (0..cover.demand.len()).sorted_by_key(|&d| cover.demand[d].id);

    let mut moved = 0;
    for demand in order {
        let facilities = cover.facilities;
        options[demand].sort_by(|(fa, ca), (fb, cb)| {
            tie.key(*ca)
                .cmp(&tie.key(*cb))
                .then_with(|| facilities[*fa as usize].id.cmp(&facilities[*fb as usize].id))
        });

        let current = cover.assigned[demand].map(|a| a.facility);
        let weight = cover.demand[demand].weight;
        let target = options[demand]
            .iter()
            .find(|(f, _)| Some(*f) == current || cover.fits(*f as usize, weight));

        if let Some(&(facility, cost)) = target
            && Some(facility) != current
        {
            cover.assign(demand, facility as usize, cost);
            moved += 1;
        }
    }

    moved
}

fn build_solution(
    cover: &Cover<'_>,
    facility_locations: Vec<Option<NetworkLocation>>,
    demand_locations: Vec<Option<NetworkLocation>>,
    trace: Vec<SelectionStep>,
) -> AllocationSolution {
    let mut assigned_count = vec![0usize; cover.facilities.len()];
    let mut assigned_weight = vec![0.0f64; cover.facilities.len()];

    let demand = cover
        .demand
        .iter()
        .zip(demand_locations)
        .zip(&cover.assigned)
        .map(|((point, location), assignment)| {
            let status = match (location, assignment) {
                (None, _) => DemandStatus::Excluded,
                (Some(_), Some(a)) => {
                    assigned_count[a.facility as usize] += 1;
                    assigned_weight[a.facility as usize] += point.weight;
                    DemandStatus::Assigned {
                        facility: cover.facilities[a.facility as usize].id,
                        impedance: a.cost,
                    }
                }
                (Some(_), None) => DemandStatus::Unassigned,
            };
            DemandOutcome {
                id: point.id,
                coord: point.coord,
                weight: point.weight,
                status,
                location,
            }
        })
        .collect();

    let facilities = cover
        .facilities
        .iter()
        .zip(facility_locations)
        .enumerate()
        .map(|(i, (facility, location))| FacilityOutcome {
            id: facility.id,
            coord: facility.coord,
            capacity: facility.capacity,
            status: match (location, cover.selected[i]) {
                (None, _) => FacilityStatus::Excluded,
                (Some(_), true) => FacilityStatus::Selected,
                (Some(_), false) => FacilityStatus::Candidate,
            },
            location,
            assigned_count: assigned_count[i],
            assigned_weight: assigned_weight[i],
        })
        .collect();

    AllocationSolution {
        facilities,
        demand,
        trace,
    }
}
