use super::RoutingService;
use super::search::{SearchDirection, settle};
use crate::error::InputError;
use crate::ids::{EdgeId, NodeId};
use ahash::AHashMap as HashMap;
use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// Which way an edge may be traversed, relative to its `from -> to` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Both,
    Forward,
    Backward,
}

impl Direction {
    pub fn allows_forward(self) -> bool {
        matches!(self, Direction::Both | Direction::Forward)
    }

    pub fn allows_backward(self) -> bool {
        matches!(self, Direction::Both | Direction::Backward)
    }
}

/// Node as delivered by the network feature source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: NodeId,
    pub coord: Coord<f64>,
}

/// Edge as delivered by the network feature source. Nodes are referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub impedance: f64,
    pub direction: Direction,
    /// Shape of the edge. A straight segment between the nodes when absent.
    pub geometry: Option<LineString<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInput {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub id: NodeId,
    pub coord: Coord<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub id: EdgeId,
    /// Index into the graph's node array.
    pub from: u32,
    pub to: u32,
    pub impedance: f64,
    pub direction: Direction,
    pub geometry: LineString<f64>,
    /// Planar length of `geometry`; positions along the edge are measured
    /// against it.
    pub length: f64,
}

/// A point snapped onto an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkLocation {
    /// Index into the graph's edge array.
    pub edge: u32,
    pub edge_id: EdgeId,
    /// Position along the edge geometry, 0 at `from` and 1 at `to`.
    pub fraction: f64,
    /// Perpendicular distance between the input point and the edge.
    pub offset: f64,
    pub coord: Coord<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Hop {
    pub target: u32,
    pub weight: f64,
}

/// Read-only routable graph.
///
/// Adjacency is stored CSR style: the hops leaving node `i` are
/// `out_hops[first_out[i]..first_out[i + 1]]`, and likewise for the reversed
/// graph used by destination-rooted searches.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    first_out: Vec<u32>,
    out_hops: Vec<Hop>,
    first_in: Vec<u32>,
    in_hops: Vec<Hop>,
}

impl NetworkGraph {
    /// Builds the graph. Only malformed input fails; a logically disconnected
    /// network is accepted and simply reports unreachable pairs.
    pub fn build(edges: Vec<RawEdge>, nodes: Vec<RawNode>) -> Result<Self, InputError> {
        let mut nodes = nodes;
        nodes.sort_by_key(|n| n.id);

        let mut node_index: HashMap<NodeId, u32> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id, i as u32).is_some() {
                return Err(InputError::DuplicateNode(node.id));
            }
        }

        let mut edges = edges;
        edges.sort_by_key(|e| e.id);
        if let Some(pair) = edges.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(InputError::DuplicateEdge(pair[0].id));
        }

        let mut built = Vec::with_capacity(edges.len());
        for raw in edges {
            let from = *node_index
                .get(&raw.from)
                .ok_or(InputError::DanglingNodeReference {
                    edge: raw.id,
                    node: raw.from,
                })?;
            let to = *node_index
                .get(&raw.to)
                .ok_or(InputError::DanglingNodeReference {
                    edge: raw.id,
                    node: raw.to,
                })?;

            if raw.impedance.is_nan() || raw.impedance < 0.0 || raw.impedance.is_infinite() {
                return Err(InputError::InvalidImpedance {
                    edge: raw.id,
                    impedance: raw.impedance,
                });
            }

            let geometry = match raw.geometry {
                Some(line) if line.0.len() >= 2 => line,
                Some(_) => return Err(InputError::DegenerateEdge(raw.id)),
                None => LineString::new(vec![
                    nodes[from as usize].coord,
                    nodes[to as usize].coord,
                ]),
            };
            let length = polyline_length(&geometry.0);

            built.push(NetworkEdge {
                id: raw.id,
                from,
                to,
                impedance: raw.impedance,
                direction: raw.direction,
                geometry,
                length,
            });
        }

        let nodes: Vec<NetworkNode> = nodes
            .into_iter()
            .map(|n| NetworkNode {
                id: n.id,
                coord: n.coord,
            })
            .collect();

        let (first_out, out_hops) = build_adjacency(nodes.len(), &built, false);
        let (first_in, in_hops) = build_adjacency(nodes.len(), &built, true);

        Ok(Self {
            nodes,
            edges: built,
            first_out,
            out_hops,
            first_in,
            in_hops,
        })
    }

    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn edge(&self, index: u32) -> &NetworkEdge {
        &self.edges[index as usize]
    }

    pub(super) fn hops(&self, node: u32, direction: SearchDirection) -> &[Hop] {
        let (first, hops) = match direction {
            SearchDirection::Forward => (&self.first_out, &self.out_hops),
            SearchDirection::Reverse => (&self.first_in, &self.in_hops),
        };
        let start = first[node as usize] as usize;
        let end = first[node as usize + 1] as usize;
        &hops[start..end]
    }

    /// Nodes reachable by leaving `loc` along its edge, with the partial cost.
    fn exits(&self, loc: &NetworkLocation) -> [Option<(u32, f64)>; 2] {
        let e = self.edge(loc.edge);
        [
            e.direction
                .allows_forward()
                .then(|| (e.to, (1.0 - loc.fraction) * e.impedance)),
            e.direction
                .allows_backward()
                .then(|| (e.from, loc.fraction * e.impedance)),
        ]
    }

    /// Nodes from which `loc` can be reached along its edge, with the partial cost.
    fn entries(&self, loc: &NetworkLocation) -> [Option<(u32, f64)>; 2] {
        let e = self.edge(loc.edge);
        [
            e.direction
                .allows_forward()
                .then(|| (e.from, loc.fraction * e.impedance)),
            e.direction
                .allows_backward()
                .then(|| (e.to, (1.0 - loc.fraction) * e.impedance)),
        ]
    }

    /// Cost of moving between two locations on the same edge without leaving it.
    fn along_edge(&self, from: &NetworkLocation, to: &NetworkLocation) -> Option<f64> {
        if from.edge != to.edge {
            return None;
        }
        let e = self.edge(from.edge);
        let delta = to.fraction - from.fraction;
        let allowed = (delta >= 0.0 && e.direction.allows_forward())
            || (delta <= 0.0 && e.direction.allows_backward());
        allowed.then(|| delta.abs() * e.impedance)
    }
}

impl RoutingService for NetworkGraph {
    fn distances_to(
        &self,
        destination: &NetworkLocation,
        origins: &[NetworkLocation],
        cutoff: Option<f64>,
    ) -> Vec<Option<f64>> {
        let limit = cutoff.unwrap_or(f64::INFINITY);
        let seeds = self.entries(destination).into_iter().flatten();
        let dist = settle(self, seeds, SearchDirection::Reverse, limit);

        origins
            .iter()
            .map(|origin| {
                let mut best = self.along_edge(origin, destination);
                for (node, partial) in self.exits(origin).into_iter().flatten() {
                    if let Some(&d) = dist.get(&node) {
                        let candidate = partial + d;
                        best = Some(best.map_or(candidate, |b: f64| b.min(candidate)));
                    }
                }
                best.filter(|d| *d <= limit)
            })
            .collect()
    }

    fn distances_from(
        &self,
        origin: &NetworkLocation,
        destinations: &[NetworkLocation],
        cutoff: Option<f64>,
    ) -> Vec<Option<f64>> {
        let limit = cutoff.unwrap_or(f64::INFINITY);
        let seeds = self.exits(origin).into_iter().flatten();
        let dist = settle(self, seeds, SearchDirection::Forward, limit);

        destinations
            .iter()
            .map(|destination| {
                let mut best = self.along_edge(origin, destination);
                for (node, partial) in self.entries(destination).into_iter().flatten() {
                    if let Some(&d) = dist.get(&node) {
                        let candidate = d + partial;
                        best = Some(best.map_or(candidate, |b: f64| b.min(candidate)));
                    }
                }
                best.filter(|d| *d <= limit)
            })
            .collect()
    }
}

fn build_adjacency(num_nodes: usize, edges: &[NetworkEdge], reversed: bool) -> (Vec<u32>, Vec<Hop>) {
    // (tail, head, weight) for every traversable direction
    let mut arcs: Vec<(u32, u32, f64)> = Vec::with_capacity(edges.len() * 2);
    for e in edges {
        if e.direction.allows_forward() {
            arcs.push((e.from, e.to, e.impedance));
        }
        if e.direction.allows_backward() {
            arcs.push((e.to, e.from, e.impedance));
        }
    }
    if reversed {
        for arc in &mut arcs {
            std::mem::swap(&mut arc.0, &mut arc.1);
        }
    }
    // stable, so hops keep edge id order within a node
    arcs.sort_by_key(|arc| arc.0);

    let mut first = vec![0u32; num_nodes + 1];
    for &(tail, _, _) in &arcs {
        first[tail as usize + 1] += 1;
    }
    for i in 0..num_nodes {
        first[i + 1] += first[i];
    }

    let hops = arcs
        .into_iter()
        .map(|(_, head, weight)| Hop {
            target: head,
            weight,
        })
        .collect();

    (first, hops)
}

pub(crate) fn polyline_length(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}
