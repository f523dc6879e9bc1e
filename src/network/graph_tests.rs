use super::graph::*;
use super::RoutingService;
use crate::error::InputError;
use crate::ids::{EdgeId, NodeId};
use geo_types::Coord;

fn node(id: u64, x: f64, y: f64) -> RawNode {
    RawNode {
        id: NodeId(id),
        coord: Coord { x, y },
    }
}

fn edge(id: u64, from: u64, to: u64, impedance: f64, direction: Direction) -> RawEdge {
    RawEdge {
        id: EdgeId(id),
        from: NodeId(from),
        to: NodeId(to),
        impedance,
        direction,
        geometry: None,
    }
}

fn at(graph: &NetworkGraph, id: u64, fraction: f64) -> NetworkLocation {
    let index = graph
        .edges()
        .iter()
        .position(|e| e.id == EdgeId(id))
        .expect("edge exists") as u32;
    let e = graph.edge(index);
    let a = e.geometry.0[0];
    let b = e.geometry.0[e.geometry.0.len() - 1];
    NetworkLocation {
        edge: index,
        edge_id: e.id,
        fraction,
        offset: 0.0,
        coord: Coord {
            x: a.x + (b.x - a.x) * fraction,
            y: a.y + (b.y - a.y) * fraction,
        },
    }
}

/// 1 --a-- 2 --b-- 3, plus a one-way shortcut 1 -> 3.
fn line_graph(shortcut: Direction) -> NetworkGraph {
    NetworkGraph::build(
        vec![
            edge(1, 1, 2, 10.0, Direction::Both),
            edge(2, 2, 3, 10.0, Direction::Both),
            edge(3, 1, 3, 4.0, shortcut),
        ],
        vec![node(1, 0.0, 0.0), node(2, 10.0, 0.0), node(3, 20.0, 0.0)],
    )
    .unwrap()
}

#[test]
fn dangling_node_reference_is_an_input_error() {
    let err = NetworkGraph::build(
        vec![edge(7, 1, 99, 1.0, Direction::Both)],
        vec![node(1, 0.0, 0.0)],
    )
    .unwrap_err();

    assert_eq!(
        err,
        InputError::DanglingNodeReference {
            edge: EdgeId(7),
            node: NodeId(99),
        }
    );
}

#[test]
fn negative_impedance_is_rejected() {
    let err = NetworkGraph::build(
        vec![edge(1, 1, 2, -1.0, Direction::Both)],
        vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0)],
    )
    .unwrap_err();
    assert!(matches!(err, InputError::InvalidImpedance { .. }));
}

#[test]
fn disconnected_components_are_unreachable_not_errors() {
    let graph = NetworkGraph::build(
        vec![
            edge(1, 1, 2, 5.0, Direction::Both),
            edge(2, 3, 4, 5.0, Direction::Both),
        ],
        vec![
            node(1, 0.0, 0.0),
            node(2, 5.0, 0.0),
            node(3, 100.0, 0.0),
            node(4, 105.0, 0.0),
        ],
    )
    .unwrap();

    assert_eq!(graph.shortest_path(&at(&graph, 1, 0.5), &at(&graph, 2, 0.5)), None);
    assert_eq!(
        graph.shortest_path(&at(&graph, 1, 0.0), &at(&graph, 1, 1.0)),
        Some(5.0)
    );
}

#[test]
fn one_way_shortcut_only_helps_in_its_direction() {
    let graph = line_graph(Direction::Forward);
    let start = at(&graph, 1, 0.0);
    let end = at(&graph, 2, 1.0);

    assert_eq!(graph.shortest_path(&start, &end), Some(4.0));
    assert_eq!(graph.shortest_path(&end, &start), Some(20.0));
}

#[test]
fn backward_edges_run_from_to_towards_from() {
    let graph = line_graph(Direction::Backward);
    let start = at(&graph, 1, 0.0);
    let end = at(&graph, 2, 1.0);

    assert_eq!(graph.shortest_path(&start, &end), Some(20.0));
    assert_eq!(graph.shortest_path(&end, &start), Some(4.0));
}

#[test]
fn same_edge_travel_respects_direction() {
    let graph = NetworkGraph::build(
        vec![edge(1, 1, 2, 8.0, Direction::Forward)],
        vec![node(1, 0.0, 0.0), node(2, 8.0, 0.0)],
    )
    .unwrap();

    let near = at(&graph, 1, 0.25);
    let far = at(&graph, 1, 0.75);
    assert_eq!(graph.shortest_path(&near, &far), Some(4.0));
    assert_eq!(graph.shortest_path(&far, &near), None);
}

#[test]
fn zero_impedance_connectors_do_not_shortcut() {
    let graph = NetworkGraph::build(
        vec![
            edge(1, 1, 2, 6.0, Direction::Both),
            edge(2, 2, 3, 0.0, Direction::Both),
            edge(3, 3, 4, 6.0, Direction::Both),
        ],
        vec![
            node(1, 0.0, 0.0),
            node(2, 6.0, 0.0),
            node(3, 6.0, 0.0),
            node(4, 12.0, 0.0),
        ],
    )
    .unwrap();

    assert_eq!(
        graph.shortest_path(&at(&graph, 1, 0.0), &at(&graph, 3, 1.0)),
        Some(12.0)
    );
}

#[test]
fn batched_queries_match_single_pair_queries() {
    let graph = line_graph(Direction::Both);
    let hub = at(&graph, 2, 0.5);
    let others = vec![at(&graph, 1, 0.0), at(&graph, 1, 0.5), at(&graph, 3, 0.25)];

    let to_hub = graph.distances_to(&hub, &others, None);
    let from_hub = graph.distances_from(&hub, &others, None);
    for (i, other) in others.iter().enumerate() {
        assert_eq!(to_hub[i], graph.shortest_path(other, &hub));
        assert_eq!(from_hub[i], graph.shortest_path(&hub, other));
    }
}

#[test]
fn cutoff_hides_farther_pairs() {
    let graph = line_graph(Direction::Both);
    let origin = at(&graph, 1, 0.0);
    let targets = vec![at(&graph, 1, 0.5), at(&graph, 2, 0.5)];

    let within = graph.distances_from(&origin, &targets, Some(6.0));
    assert_eq!(within, vec![Some(5.0), None]);
}
