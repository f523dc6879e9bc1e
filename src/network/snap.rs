use super::graph::{NetworkGraph, NetworkLocation};
use crate::config::TieBreak;
use crate::error::NoLocationError;
use geo_types::Coord;
use rstar::RTree;
use rstar::primitives::{GeomWithData, Line};

/// Closest point of one edge to a query point.
struct Projection {
    distance: f64,
    along: f64,
    coord: Coord<f64>,
}

fn project_onto_edge(graph: &NetworkGraph, edge: u32, point: Coord<f64>) -> Option<Projection> {
    let coords = &graph.edge(edge).geometry.0;
    let mut best: Option<Projection> = None;
    let mut walked = 0.0;

    for w in coords.windows(2) {
        let (a, b) = (w[0], w[1]);
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let seg_len_sq = dx * dx + dy * dy;
        let t = if seg_len_sq > 0.0 {
            (((point.x - a.x) * dx + (point.y - a.y) * dy) / seg_len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let on = Coord {
            x: a.x + t * dx,
            y: a.y + t * dy,
        };
        let distance = (point.x - on.x).hypot(point.y - on.y);
        let seg_len = seg_len_sq.sqrt();

        // strict, so the first minimum along the edge wins
        if best.as_ref().is_none_or(|b| distance < b.distance) {
            best = Some(Projection {
                distance,
                along: walked + t * seg_len,
                coord: on,
            });
        }
        walked += seg_len;
    }

    best
}

/// Snaps `point` onto the closest of `candidate_edges` (indices into the
/// graph's edge array). Equally close edges resolve to the lowest edge id.
pub fn snap(
    graph: &NetworkGraph,
    point: Coord<f64>,
    candidate_edges: &[u32],
    tolerance: f64,
    tie: TieBreak,
) -> Result<NetworkLocation, NoLocationError> {
    let no_location = NoLocationError {
        x: point.x,
        y: point.y,
        tolerance,
    };

    let best = candidate_edges
        .iter()
        .filter_map(|&edge| project_onto_edge(graph, edge, point).map(|p| (edge, p)))
        .filter(|(_, p)| p.distance <= tolerance)
        .min_by(|(ea, pa), (eb, pb)| {
            tie.key(pa.distance)
                .cmp(&tie.key(pb.distance))
                .then_with(|| graph.edge(*ea).id.cmp(&graph.edge(*eb).id))
        });

    let (edge, projection) = best.ok_or(no_location)?;
    let length = graph.edge(edge).length;
    let fraction = if length > 0.0 {
        (projection.along / length).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(NetworkLocation {
        edge,
        edge_id: graph.edge(edge).id,
        fraction,
        offset: projection.distance,
        coord: projection.coord,
    })
}

/// Candidate lookup for [`snap`]: an R-tree over every edge segment.
pub struct PointSnapper<'a> {
    graph: &'a NetworkGraph,
    tree: RTree<GeomWithData<Line<[f64; 2]>, u32>>,
    tie: TieBreak,
}

impl<'a> PointSnapper<'a> {
    pub fn new(graph: &'a NetworkGraph, tie: TieBreak) -> Self {
        let segments: Vec<GeomWithData<Line<[f64; 2]>, u32>> = graph
            .edges()
            .iter()
            .enumerate()
            .flat_map(|(i, edge)| {
                edge.geometry.0.windows(2).map(move |w| {
                    GeomWithData::new(Line::new([w[0].x, w[0].y], [w[1].x, w[1].y]), i as u32)
                })
            })
            .collect();

        Self {
            graph,
            tree: RTree::bulk_load(segments),
            tie,
        }
    }

    pub fn snap(&self, point: Coord<f64>, tolerance: f64) -> Result<NetworkLocation, NoLocationError> {
        let mut candidates: Vec<u32> = self
            .tree
            .locate_within_distance([point.x, point.y], tolerance * tolerance)
            .map(|segment| segment.data)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        snap(self.graph, point, &candidates, tolerance, self.tie)
    }
}
