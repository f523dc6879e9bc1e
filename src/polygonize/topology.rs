//! Simplification of shared arcs without breaking the arrangement.

use super::ArcSimplifier;
use super::arcs::{ArcRef, ArcSet};
use geo::Intersects;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo_types::{Coord, Line, LineString, Point, Polygon};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};
use tracing::{debug, warn};

const MAX_ROUNDS: usize = 64;

/// A polygon as ring indices: one exterior and its holes.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct RingPlan {
    pub region: u32,
    pub exterior: usize,
    pub holes: Vec<usize>,
}

struct ArcSegment {
    arc: usize,
    index: usize,
    line: Line<f64>,
}

impl RTreeObject for ArcSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

fn is_endpoint(line: &Line<f64>, point: Coord<f64>) -> bool {
    line.start == point || line.end == point
}

/// Two segments may only meet at a vertex they both end at.
fn segments_conflict(a: Line<f64>, b: Line<f64>) -> bool {
    match line_intersection(a, b) {
        None => false,
        Some(LineIntersection::Collinear { intersection }) => intersection.start != intersection.end,
        Some(LineIntersection::SinglePoint {
            intersection,
            is_proper,
        }) => is_proper || !(is_endpoint(&a, intersection) && is_endpoint(&b, intersection)),
    }
}

fn crossing_arcs(arcs: &[Vec<Coord<f64>>], conflicted: &mut [bool]) {
    let segments: Vec<ArcSegment> = arcs
        .iter()
        .enumerate()
        .flat_map(|(arc, coords)| {
            coords.windows(2).enumerate().map(move |(index, w)| ArcSegment {
                arc,
                index,
                line: Line::new(w[0], w[1]),
            })
        })
        .collect();
    let tree = RTree::bulk_load(segments);

    for segment in tree.iter() {
        let envelope = segment.envelope();
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            if (candidate.arc, candidate.index) <= (segment.arc, segment.index) {
                continue;
            }
            if segments_conflict(segment.line, candidate.line) {
                conflicted[segment.arc] = true;
                conflicted[candidate.arc] = true;
            }
        }
    }
}

fn ring_coords(refs: &[ArcRef], arcs: &[Vec<Coord<f64>>]) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::new();
    for r in refs {
        let coords = &arcs[r.arc];
        let skip = usize::from(!out.is_empty());
        if r.reversed {
            out.extend(coords.iter().rev().skip(skip));
        } else {
            out.extend(coords.iter().skip(skip));
        }
    }
    out
}

fn signed_area2(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

/// Rings that collapsed, flipped, or whose holes escaped their exterior.
fn broken_rings(
    plans: &[RingPlan],
    set: &ArcSet,
    arcs: &[Vec<Coord<f64>>],
    raw_area2: &[f64],
    conflicted: &mut [bool],
) {
    let flag = |ring: usize, conflicted: &mut [bool]| {
        for r in &set.ring_arcs[ring] {
            conflicted[r.arc] = true;
        }
    };

    for plan in plans {
        let exterior = ring_coords(&set.ring_arcs[plan.exterior], arcs);
        let exterior_ok =
            exterior.len() >= 4 && signed_area2(&exterior) * raw_area2[plan.exterior] > 0.0;
        if !exterior_ok {
            flag(plan.exterior, conflicted);
            continue;
        }

        let shell = Polygon::new(LineString::new(exterior), vec![]);
        for &hole in &plan.holes {
            let coords = ring_coords(&set.ring_arcs[hole], arcs);
            let inside = coords
                .first()
                .is_some_and(|&c| shell.intersects(&Point::from(c)));
            if coords.len() < 4 || signed_area2(&coords) * raw_area2[hole] <= 0.0 || !inside {
                flag(hole, conflicted);
                flag(plan.exterior, conflicted);
            }
        }
    }
}

fn simplify_one<S: ArcSimplifier + ?Sized>(
    simplifier: &S,
    coords: &[Coord<f64>],
    tolerance: f64,
) -> Vec<Coord<f64>> {
    if tolerance <= 0.0 || coords.len() <= 2 {
        return coords.to_vec();
    }

    let run = |part: &[Coord<f64>]| -> Vec<Coord<f64>> {
        let mut out = simplifier
            .simplify(&LineString::new(part.to_vec()), tolerance)
            .0;
        out.dedup();
        out
    };

    // a loop has coincident ends, so split it at its farthest vertex first
    if coords.first() == coords.last() {
        let origin = coords[0];
        let far = coords
            .iter()
            .enumerate()
            .fold((0, 0.0), |(best, best_d), (i, c)| {
                let d = (c.x - origin.x).hypot(c.y - origin.y);
                if d > best_d { (i, d) } else { (best, best_d) }
            })
            .0;
        let mut head = run(&coords[..=far]);
        let tail = run(&coords[far..]);
        head.extend_from_slice(&tail[1..]);
        head
    } else {
        run(coords)
    }
}

/// Simplifies every arc once and halves the tolerance of arcs involved in a
/// crossing, an overlap or a broken ring until none remain. Arcs whose
/// tolerance falls below `min_tolerance` are left exact; the exact
/// arrangement is always valid.
pub(super) fn simplify_arcs<S: ArcSimplifier + ?Sized>(
    simplifier: &S,
    set: &ArcSet,
    plans: &[RingPlan],
    raw: &[Vec<Coord<f64>>],
    tolerance: f64,
    min_tolerance: f64,
) -> Vec<Vec<Coord<f64>>> {
    if tolerance <= 0.0 {
        return raw.to_vec();
    }

    let raw_area2: Vec<f64> = set
        .ring_arcs
        .iter()
        .map(|refs| signed_area2(&ring_coords(refs, raw)))
        .collect();

    let mut tolerances = vec![tolerance; raw.len()];
    let mut simplified: Vec<Vec<Coord<f64>>> = raw
        .par_iter()
        .map(|coords| simplify_one(simplifier, coords, tolerance))
        .collect();

    for round in 0..MAX_ROUNDS {
        let mut conflicted = vec![false; raw.len()];
        crossing_arcs(&simplified, &mut conflicted);
        broken_rings(plans, set, &simplified, &raw_area2, &mut conflicted);

        let pending: Vec<usize> = (0..raw.len())
            .filter(|&arc| conflicted[arc] && tolerances[arc] > 0.0)
            .collect();
        if pending.is_empty() {
            debug!("Arc simplification settled after {} rounds", round + 1);
            return simplified;
        }

        for &arc in &pending {
            tolerances[arc] /= 2.0;
            if tolerances[arc] < min_tolerance {
                tolerances[arc] = 0.0;
            }
        }
        let redone: Vec<(usize, Vec<Coord<f64>>)> = pending
            .par_iter()
            .map(|&arc| (arc, simplify_one(simplifier, &raw[arc], tolerances[arc])))
            .collect();
        for (arc, coords) in redone {
            simplified[arc] = coords;
        }
    }

    warn!(
        "Arc simplification did not settle after {} rounds; keeping exact boundaries",
        MAX_ROUNDS
    );
    raw.to_vec()
}

pub(super) fn assemble_ring(set: &ArcSet, ring: usize, arcs: &[Vec<Coord<f64>>]) -> LineString<f64> {
    LineString::new(ring_coords(&set.ring_arcs[ring], arcs))
}
