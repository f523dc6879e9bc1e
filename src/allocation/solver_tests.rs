use super::*;
use crate::config::{AssignmentRule, PipelineConfig};
use crate::error::InputError;
use crate::ids::{EdgeId, NodeId};
use crate::network::{Direction, NetworkGraph, PointSnapper, RawEdge, RawNode, RoutingService};
use ahash::AHashSet as HashSet;

/// Unit grid over [min, max] in both axes; every edge is two-way with
/// impedance equal to its length.
fn grid(min: i32, max: i32) -> NetworkGraph {
    let side = (max - min + 1) as u64;
    let id = |x: i32, y: i32| NodeId((y - min) as u64 * side + (x - min) as u64);

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let link = |from: NodeId, to: NodeId, edges: &mut Vec<RawEdge>| {
        edges.push(RawEdge {
            id: EdgeId(edges.len() as u64),
            from,
            to,
            impedance: 1.0,
            direction: Direction::Both,
            geometry: None,
        });
    };

    for y in min..=max {
        for x in min..=max {
            nodes.push(RawNode {
                id: id(x, y),
                coord: Coord {
                    x: x as f64,
                    y: y as f64,
                },
            });
            if x < max {
                link(id(x, y), id(x + 1, y), &mut edges);
            }
            if y < max {
                link(id(x, y), id(x, y + 1), &mut edges);
            }
        }
    }

    NetworkGraph::build(edges, nodes).unwrap()
}

fn config(cutoff: f64) -> PipelineConfig {
    PipelineConfig {
        impedance_cutoff: cutoff,
        ..Default::default()
    }
}

fn solve(
    graph: &NetworkGraph,
    config: &PipelineConfig,
    facilities: &[Facility],
    demand: &[DemandPoint],
) -> AllocationSolution {
    let snapper = PointSnapper::new(graph, config.tie_break());
    LocationAllocationSolver::new(graph, &snapper, config)
        .solve(facilities, demand)
        .unwrap()
}

/// Five voters around each of three polling places, plus one voter at (5, 0)
/// exactly five blocks from both of the first two.
fn three_clusters(ids: [u64; 3]) -> (Vec<Facility>, Vec<DemandPoint>) {
    let centres = [(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)];
    let offsets = [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0), (1.0, 1.0)];

    let facilities = ids
        .iter()
        .zip(centres)
        .map(|(&id, (x, y))| Facility::new(id, x, y))
        .collect();

    let mut demand: Vec<DemandPoint> = centres
        .iter()
        .enumerate()
        .flat_map(|(k, &(cx, cy))| {
            offsets
                .iter()
                .enumerate()
                .map(move |(i, &(dx, dy))| DemandPoint::new((k * 10 + i) as u64, cx + dx, cy + dy))
        })
        .collect();
    demand.push(DemandPoint::new(100, 5.0, 0.0));

    (facilities, demand)
}

#[test]
fn three_clusters_select_every_facility() {
    let graph = grid(-2, 12);
    let (facilities, demand) = three_clusters([1, 2, 3]);
    let solution = solve(&graph, &config(6.0), &facilities, &demand);

    let order: Vec<_> = solution.trace.iter().map(|s| (s.facility.0, s.claimed)).collect();
    assert_eq!(order, vec![(1, 6), (2, 5), (3, 5)]);
    assert_eq!(solution.selected().count(), 3);

    assert_eq!(
        solution.demand_point(DemandId(100)).unwrap().status,
        DemandStatus::Assigned {
            facility: FacilityId(1),
            impedance: 5.0,
        }
    );
    assert_eq!(solution.count_demand(|s| matches!(s, DemandStatus::Unassigned)).0, 0);
}

#[test]
fn equidistant_voter_goes_to_lower_identifier() {
    let graph = grid(-2, 12);
    // the polling place at (10, 0) now has the lower id
    let (facilities, demand) = three_clusters([7, 3, 5]);

    for _ in 0..3 {
        let solution = solve(&graph, &config(6.0), &facilities, &demand);
        assert_eq!(
            solution.demand_point(DemandId(100)).unwrap().assigned_facility(),
            Some(FacilityId(3))
        );
        assert_eq!(solution.trace[0].facility, FacilityId(3));
    }
}

#[test]
fn single_demand_beyond_cutoff_selects_nothing() {
    let graph = grid(-2, 12);
    let solution = solve(
        &graph,
        &config(6.0),
        &[Facility::new(1, 0.0, 0.0)],
        &[DemandPoint::new(1, 10.0, 0.0)],
    );

    assert!(solution.trace.is_empty());
    assert_eq!(solution.facilities[0].status, FacilityStatus::Candidate);
    assert_eq!(solution.demand[0].status, DemandStatus::Unassigned);
}

#[test]
fn solving_twice_is_byte_identical() {
    let graph = grid(-2, 12);
    let (facilities, demand) = three_clusters([1, 2, 3]);
    let config = config(6.0);

    let first = solve(&graph, &config, &facilities, &demand);
    let second = solve(&graph, &config, &facilities, &demand);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn assigned_impedance_matches_shortest_path_within_cutoff() {
    let graph = grid(-2, 12);
    let (facilities, demand) = three_clusters([1, 2, 3]);
    let config = config(6.0);
    let solution = solve(&graph, &config, &facilities, &demand);

    for point in &solution.demand {
        let DemandStatus::Assigned {
            facility,
            impedance,
        } = point.status
        else {
            continue;
        };
        let site = solution.facility(facility).unwrap();
        assert!(impedance <= config.impedance_cutoff);
        assert_eq!(
            graph.shortest_path(&point.location.unwrap(), &site.location.unwrap()),
            Some(impedance)
        );
    }
}

/// Deterministic scatter of integer grid points.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, modulo: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % modulo
    }
}

#[test]
fn every_round_picks_a_maximum_gain() {
    let graph = grid(-2, 12);
    let config = config(5.0);
    let mut rng = Lcg(17);

    let facilities: Vec<Facility> = (0..8)
        .map(|id| Facility::new(id, rng.next(15) as f64 - 2.0, rng.next(15) as f64 - 2.0))
        .collect();
    let demand: Vec<DemandPoint> = (0..40)
        .map(|id| {
            DemandPoint::new(id, rng.next(15) as f64 - 2.0, rng.next(15) as f64 - 2.0)
                .with_weight(1.0 + rng.next(3) as f64)
        })
        .collect();

    let solution = solve(&graph, &config, &facilities, &demand);
    assert!(!solution.trace.is_empty());

    let remaining_gain = |site: &FacilityOutcome, claimed: &HashSet<DemandId>| -> f64 {
        solution
            .demand
            .iter()
            .filter(|d| d.location.is_some() && !claimed.contains(&d.id))
            .filter(|d| {
                graph
                    .shortest_path(&d.location.unwrap(), &site.location.unwrap())
                    .is_some_and(|cost| cost <= config.impedance_cutoff)
            })
            .map(|d| d.weight)
            .sum()
    };

    let mut chosen: HashSet<FacilityId> = HashSet::new();
    let mut claimed: HashSet<DemandId> = HashSet::new();
    for step in &solution.trace {
        for site in solution.facilities.iter().filter(|f| f.location.is_some()) {
            if chosen.contains(&site.id) {
                continue;
            }
            let gain = remaining_gain(site, &claimed);
            if site.id == step.facility {
                assert_eq!(gain, step.gain);
            } else {
                assert!(gain <= step.gain, "facility {} beats {}", site.id, step.facility);
            }
        }

        chosen.insert(step.facility);
        claimed.extend(
            solution
                .demand
                .iter()
                .filter(|d| d.assigned_facility() == Some(step.facility))
                .map(|d| d.id),
        );
    }

    // nothing left that an unchosen facility could serve
    for site in solution.facilities.iter().filter(|f| f.location.is_some()) {
        if !chosen.contains(&site.id) {
            assert_eq!(remaining_gain(site, &claimed), 0.0);
        }
    }
}

#[test]
fn heavier_demand_wins_over_more_points() {
    let graph = grid(-2, 12);
    let solution = solve(
        &graph,
        &config(3.0),
        &[Facility::new(1, 0.0, 0.0), Facility::new(2, 10.0, 0.0)],
        &[
            DemandPoint::new(1, 1.0, 0.0),
            DemandPoint::new(2, 0.0, 1.0),
            DemandPoint::new(3, -1.0, 0.0),
            DemandPoint::new(4, 10.0, 1.0).with_weight(5.0),
        ],
    );

    assert_eq!(solution.trace[0].facility, FacilityId(2));
    assert_eq!(solution.trace[0].gain, 5.0);
    assert_eq!(solution.trace[1].facility, FacilityId(1));
}

#[test]
fn equal_weight_goes_to_lower_identifier_regardless_of_point_count() {
    let graph = grid(-2, 12);
    let solution = solve(
        &graph,
        &config(3.0),
        &[Facility::new(1, 0.0, 0.0), Facility::new(2, 10.0, 0.0)],
        &[
            DemandPoint::new(1, 1.0, 0.0).with_weight(2.0),
            DemandPoint::new(2, 11.0, 0.0),
            DemandPoint::new(3, 9.0, 0.0),
        ],
    );

    assert_eq!(solution.trace[0].facility, FacilityId(1));
    assert_eq!(solution.trace[0].gain, 2.0);
    assert_eq!(solution.trace[0].claimed, 1);
    assert_eq!(solution.trace[1].facility, FacilityId(2));
    assert_eq!(solution.trace[1].claimed, 2);
}

fn capacity_case(capacity: Option<f64>) -> AllocationSolution {
    let graph = grid(-2, 12);
    let mut near = Facility::new(1, 0.0, 0.0);
    near.capacity = capacity;

    solve(
        &graph,
        &config(6.0),
        &[near, Facility::new(2, 6.0, 0.0)],
        &[
            DemandPoint::new(10, 0.0, 1.0),
            DemandPoint::new(11, -1.0, 0.0),
            DemandPoint::new(12, 1.0, 0.0),
            DemandPoint::new(13, 2.0, 0.0),
        ],
    )
}

#[test]
fn binding_capacity_claims_nearest_and_leaves_the_rest_open() {
    let solution = capacity_case(Some(2.0));

    let order: Vec<_> = solution.trace.iter().map(|s| (s.facility.0, s.claimed)).collect();
    assert_eq!(order, vec![(1, 2), (2, 2)]);

    let owner = |id: u64| solution.demand_point(DemandId(id)).unwrap().assigned_facility();
    assert_eq!(owner(10), Some(FacilityId(1)));
    assert_eq!(owner(11), Some(FacilityId(1)));
    assert_eq!(owner(12), Some(FacilityId(2)));
    assert_eq!(owner(13), Some(FacilityId(2)));
    assert_eq!(solution.facility(FacilityId(1)).unwrap().assigned_weight, 2.0);
}

#[test]
fn unlimited_capacity_covers_everything_alone() {
    let solution = capacity_case(None);

    assert_eq!(solution.trace.len(), 1);
    assert_eq!(solution.facility(FacilityId(1)).unwrap().assigned_count, 4);
    assert_eq!(
        solution.facility(FacilityId(2)).unwrap().status,
        FacilityStatus::Candidate
    );
}

fn nearest_case(rule: AssignmentRule) -> AllocationSolution {
    let graph = grid(-2, 12);
    let config = PipelineConfig {
        assignment_rule: rule,
        ..config(6.0)
    };

    solve(
        &graph,
        &config,
        &[Facility::new(1, 0.0, 0.0), Facility::new(2, 8.0, 0.0)],
        &[
            DemandPoint::new(1, 0.0, 1.0),
            DemandPoint::new(2, 1.0, 0.0),
            DemandPoint::new(3, -1.0, 0.0),
            DemandPoint::new(4, 5.0, 0.0),
            DemandPoint::new(5, 8.0, 1.0),
            DemandPoint::new(6, 9.0, 0.0),
        ],
    )
}

#[test]
fn claiming_facility_keeps_the_far_voter() {
    let solution = nearest_case(AssignmentRule::ClaimingFacility);
    assert_eq!(
        solution.demand_point(DemandId(4)).unwrap().status,
        DemandStatus::Assigned {
            facility: FacilityId(1),
            impedance: 5.0,
        }
    );
}

#[test]
fn nearest_selected_moves_the_far_voter() {
    let solution = nearest_case(AssignmentRule::NearestSelected);
    assert_eq!(
        solution.demand_point(DemandId(4)).unwrap().status,
        DemandStatus::Assigned {
            facility: FacilityId(2),
            impedance: 3.0,
        }
    );
    assert_eq!(solution.facility(FacilityId(1)).unwrap().assigned_count, 3);
    assert_eq!(solution.facility(FacilityId(2)).unwrap().assigned_count, 3);
    // the selection itself is unchanged
    assert_eq!(solution.trace[0].facility, FacilityId(1));
}

#[test]
fn points_off_the_network_are_excluded() {
    let graph = grid(0, 4);
    let config = PipelineConfig {
        snap_tolerance: 1.0,
        ..config(6.0)
    };
    let solution = solve(
        &graph,
        &config,
        &[Facility::new(1, 0.0, 0.0), Facility::new(2, 50.0, 50.0)],
        &[DemandPoint::new(1, 1.0, 0.5), DemandPoint::new(2, 100.0, 100.0)],
    );

    assert_eq!(solution.facilities[1].status, FacilityStatus::Excluded);
    assert_eq!(solution.demand[1].status, DemandStatus::Excluded);
    assert!(solution.demand[1].location.is_none());
    assert_eq!(solution.demand[0].assigned_facility(), Some(FacilityId(1)));
}

#[test]
fn empty_or_duplicate_inputs_are_rejected() {
    let graph = grid(0, 2);
    let config = config(6.0);
    let snapper = PointSnapper::new(&graph, config.tie_break());
    let solver = LocationAllocationSolver::new(&graph, &snapper, &config);

    assert_eq!(
        solver.solve(&[], &[DemandPoint::new(1, 0.0, 0.0)]),
        Err(InputError::NoFacilities)
    );
    assert_eq!(
        solver.solve(&[Facility::new(1, 0.0, 0.0)], &[]),
        Err(InputError::NoDemand)
    );
    assert_eq!(
        solver.solve(
            &[Facility::new(4, 0.0, 0.0), Facility::new(4, 1.0, 0.0)],
            &[DemandPoint::new(1, 0.0, 0.0)]
        ),
        Err(InputError::DuplicateFacility(FacilityId(4)))
    );
    assert!(matches!(
        solver.solve(
            &[Facility::new(1, 0.0, 0.0).with_capacity(-1.0)],
            &[DemandPoint::new(1, 0.0, 0.0)]
        ),
        Err(InputError::InvalidCapacity { .. })
    ));
}
