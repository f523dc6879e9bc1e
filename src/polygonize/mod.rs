//! Allocation raster to precinct polygons.
//!
//! Same-label cells are grouped into regions (4- or 8-connected, fixed per
//! run), region boundaries are traced on the cell-corner lattice and cut into
//! arcs at junctions. Each arc is simplified once and shared by the regions on
//! both sides, so neighbouring precincts keep coincident edges.

mod arcs;
mod regions;
mod topology;
mod trace;


use crate::config::Connectivity;
use crate::ids::FacilityId;
use crate::raster::AllocationRaster;
use arcs::ArcSet;
use geo::algorithm::orient::{Direction as Winding, Orient};
use geo::{Area, Intersects, Simplify};
use geo_types::{Coord, LineString, Point, Polygon};
use regions::Regions;
use topology::RingPlan;
use tracing::{debug, info};

/// Simplification below this fraction of a cell is indistinguishable from the
/// exact staircase.
const MIN_TOLERANCE_CELLS: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct PrecinctPolygon {
    pub facility: FacilityId,
    pub polygon: Polygon<f64>,
    pub area: f64,
}

/// Line simplification used on each shared arc. Implementations must keep
/// both end points.
pub trait ArcSimplifier: Sync {
    fn simplify(&self, arc: &LineString<f64>, tolerance: f64) -> LineString<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DouglasPeucker;

impl ArcSimplifier for DouglasPeucker {
    fn simplify(&self, arc: &LineString<f64>, tolerance: f64) -> LineString<f64> {
        arc.simplify(&tolerance)
    }
}

/// Precinct polygons of `raster`, simplified with Douglas-Peucker.
/// A tolerance of zero reproduces the exact cell boundaries.
pub fn extract(
    raster: &AllocationRaster,
    simplification_tolerance: f64,
    connectivity: Connectivity,
) -> Vec<PrecinctPolygon> {
    extract_with(raster, simplification_tolerance, connectivity, &DouglasPeucker)
}

/// Polygons are ordered by facility id, then by the row-major position of
/// the region's first cell. Unlabelled cells produce nothing.
pub fn extract_with<S: ArcSimplifier + ?Sized>(
    raster: &AllocationRaster,
    simplification_tolerance: f64,
    connectivity: Connectivity,
    simplifier: &S,
) -> Vec<PrecinctPolygon> {
    let regions = Regions::label(raster, connectivity);
    if regions.region_label.is_empty() {
        return Vec::new();
    }

    let rings = trace::trace_rings(&regions, connectivity);
    let set = ArcSet::split(&regions, &rings);
    let plans = plan_polygons(&regions, &rings);
    debug!(
        "{} regions, {} rings, {} shared arcs",
        regions.len(),
        rings.len(),
        set.arcs.len()
    );

    let raw: Vec<Vec<Coord<f64>>> = set
        .arcs
        .iter()
        .map(|arc| {
            arc.iter()
                .map(|&(x, y)| raster.corner(x as usize, y as usize))
                .collect()
        })
        .collect();

    let arcs = topology::simplify_arcs(
        simplifier,
        &set,
        &plans,
        &raw,
        simplification_tolerance.max(0.0),
        raster.cell_size() * MIN_TOLERANCE_CELLS,
    );

    let mut precincts: Vec<PrecinctPolygon> = plans
        .iter()
        .map(|plan| {
            let exterior = topology::assemble_ring(&set, plan.exterior, &arcs);
            let holes = plan
                .holes
                .iter()
                .map(|&hole| topology::assemble_ring(&set, hole, &arcs))
                .collect();
            let polygon = Polygon::new(exterior, holes).orient(Winding::Default);
            let label = regions.region_label[plan.region as usize];

            PrecinctPolygon {
                facility: raster.labels()[label as usize],
                area: polygon.unsigned_area(),
                polygon,
            }
        })
        .collect();
    // stable, so regions keep their row-major order within a facility
    precincts.sort_by_key(|p| p.facility);

    info!(
        "Extracted {} precinct polygons for {} facilities",
        precincts.len(),
        raster.labels().len()
    );
    precincts
}

/// Pairs every exterior ring with the holes of the same region.
fn plan_polygons(regions: &Regions, rings: &[trace::Ring]) -> Vec<RingPlan> {
    let mut plans: Vec<RingPlan> = Vec::new();
    let mut by_region: Vec<Vec<usize>> = vec![Vec::new(); regions.len()];

    for (i, ring) in rings.iter().enumerate() {
        if ring.is_exterior() {
            by_region[ring.region as usize].push(plans.len());
            plans.push(RingPlan {
                region: ring.region,
                exterior: i,
                holes: Vec::new(),
            });
        }
    }

    let lattice = |ring: &trace::Ring| -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = ring
            .vertices
            .iter()
            .map(|&(x, y)| Coord {
                x: x as f64,
                y: y as f64,
            })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    };

    for (i, ring) in rings.iter().enumerate() {
        if ring.is_exterior() {
            continue;
        }
        let candidates = &by_region[ring.region as usize];
        let owner = match candidates.as_slice() {
            [] => continue,
            [only] => *only,
            several => {
                let (x, y) = ring.vertices[0];
                let probe = Point::new(x as f64, y as f64);
                several
                    .iter()
                    .copied()
                    .find(|&p| lattice(&rings[plans[p].exterior]).intersects(&probe))
                    .unwrap_or(several[0])
            }
        };
        plans[owner].holes.push(i);
    }

    // row-major order of each region's first cell
    plans.sort_by_key(|plan| plan.region);
    plans
}
