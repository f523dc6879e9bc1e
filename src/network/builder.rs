use super::graph::{Direction, NetworkInput, RawEdge, RawNode, polyline_length};
use crate::ids::{EdgeId, NodeId};
use ahash::AHashMap as HashMap;
use geo_types::{Coord, LineString};
use tracing::{debug, warn};

/// A road segment as drawn, before topology has been derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub id: Option<EdgeId>,
    pub geometry: LineString<f64>,
    /// Defaults to the planar length of `geometry`.
    pub impedance: Option<f64>,
    pub direction: Direction,
}

/// Derives nodes and edges from raw road polylines.
///
/// Endpoints with bit-identical coordinates become one shared node; interior
/// vertices never connect (overpasses stay overpasses). Polylines without an
/// id are numbered after the largest explicit id, in input order.
pub fn build_from_polylines(lines: Vec<Polyline>) -> NetworkInput {
    let mut node_by_coord: HashMap<(u64, u64), NodeId> = HashMap::new();
    let mut nodes = Vec::new();

    let mut node_for = |coord: Coord<f64>, nodes: &mut Vec<RawNode>| -> NodeId {
        let key = (coord.x.to_bits(), coord.y.to_bits());
        *node_by_coord.entry(key).or_insert_with(|| {
            let id = NodeId(nodes.len() as u64);
            nodes.push(RawNode { id, coord });
            id
        })
    };

    let mut next_edge_id = lines
        .iter()
        .filter_map(|line| line.id.map(|id| id.0 + 1))
        .max()
        .unwrap_or(0);

    let mut edges = Vec::with_capacity(lines.len());
    for line in lines {
        let id = line.id.unwrap_or_else(|| {
            let id = EdgeId(next_edge_id);
            next_edge_id += 1;
            id
        });

        let (Some(&first), Some(&last)) = (line.geometry.0.first(), line.geometry.0.last()) else {
            warn!("Skipping road segment {} with empty geometry", id);
            continue;
        };
        if line.geometry.0.len() < 2 {
            warn!("Skipping road segment {} with a single vertex", id);
            continue;
        }

        let from = node_for(first, &mut nodes);
        let to = node_for(last, &mut nodes);
        let impedance = line
            .impedance
            .unwrap_or_else(|| polyline_length(&line.geometry.0));

        edges.push(RawEdge {
            id,
            from,
            to,
            impedance,
            direction: line.direction,
            geometry: Some(line.geometry),
        });
    }

    debug!(
        "Derived {} nodes from {} road segments",
        nodes.len(),
        edges.len()
    );

    NetworkInput { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkGraph, RoutingService};

    fn line(coords: Vec<(f64, f64)>) -> Polyline {
        Polyline {
            id: None,
            geometry: LineString::from(coords),
            impedance: None,
            direction: Direction::Both,
        }
    }

    #[test]
    fn shared_endpoints_become_shared_nodes() {
        let input = build_from_polylines(vec![
            line(vec![(0.0, 0.0), (3.0, 4.0)]),
            line(vec![(3.0, 4.0), (3.0, 10.0)]),
            line(vec![(3.0, 10.0), (0.0, 10.0)]),
        ]);

        assert_eq!(input.nodes.len(), 4);
        assert_eq!(input.edges.len(), 3);
        assert_eq!(input.edges[0].impedance, 5.0);
        assert_eq!(input.edges[0].to, input.edges[1].from);
        assert!(NetworkGraph::build(input.edges, input.nodes).is_ok());
    }

    #[test]
    fn explicit_ids_are_kept_and_others_numbered_after_them() {
        let mut first = line(vec![(0.0, 0.0), (1.0, 0.0)]);
        first.id = Some(EdgeId(40));
        let input = build_from_polylines(vec![first, line(vec![(1.0, 0.0), (2.0, 0.0)])]);

        assert_eq!(input.edges[0].id, EdgeId(40));
        assert_eq!(input.edges[1].id, EdgeId(41));
    }

    #[test]
    fn built_network_routes_across_segments() {
        let input = build_from_polylines(vec![
            line(vec![(0.0, 0.0), (10.0, 0.0)]),
            line(vec![(10.0, 0.0), (10.0, 10.0)]),
        ]);
        let graph = NetworkGraph::build(input.edges, input.nodes).unwrap();
        let snapper = crate::network::PointSnapper::new(&graph, crate::config::TieBreak::EXACT);

        let a = snapper.snap(Coord { x: 2.0, y: 1.0 }, 5.0).unwrap();
        let b = snapper.snap(Coord { x: 11.0, y: 7.0 }, 5.0).unwrap();
        let cost = graph.shortest_path(&a, &b).expect("segments are connected");
        assert!((cost - 15.0).abs() < 1e-9);
    }
}
