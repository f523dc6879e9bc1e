//! Routable road network: graph construction, point snapping and
//! shortest-path queries.

pub mod builder;
pub mod graph;
mod search;
pub mod snap;

#[cfg(test)]
mod graph_tests;

pub use builder::{Polyline, build_from_polylines};
pub use graph::{
    Direction, NetworkEdge, NetworkGraph, NetworkInput, NetworkLocation, NetworkNode, RawEdge,
    RawNode,
};
pub use snap::{PointSnapper, snap};

/// Shortest-path capability the solver depends on.
///
/// Distances honour edge directions and include the partial traversal of the
/// edges the two locations sit on. `None` means unreachable, or farther than
/// the cutoff when one is given.
pub trait RoutingService: Sync {
    /// Impedance from every origin to `destination`.
    fn distances_to(
        &self,
        destination: &NetworkLocation,
        origins: &[NetworkLocation],
        cutoff: Option<f64>,
    ) -> Vec<Option<f64>>;

    /// Impedance from `origin` to every destination.
    fn distances_from(
        &self,
        origin: &NetworkLocation,
        destinations: &[NetworkLocation],
        cutoff: Option<f64>,
    ) -> Vec<Option<f64>>;

    fn shortest_path(&self, from: &NetworkLocation, to: &NetworkLocation) -> Option<f64> {
        self.distances_to(to, std::slice::from_ref(from), None)
            .into_iter()
            .next()
            .flatten()
    }
}
