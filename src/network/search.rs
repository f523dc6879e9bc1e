use super::graph::NetworkGraph;
use ahash::AHashMap as HashMap;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SearchDirection {
    /// Follow edges in their permitted direction.
    Forward,
    /// Follow edges backwards, so distances are "to the root" instead of "from".
    Reverse,
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: OrderedFloat<f64>,
    node: u32,
}

// Flipped so the std max-heap pops the cheapest state first. Ties pop the
// lowest node index, which keeps settle order stable across runs.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra from a set of seeded nodes. Returns every node whose distance is
/// within `limit`; nodes beyond it are neither expanded nor reported.
///
/// Weights are non-negative, so zero-impedance connectors are settled at the
/// same cost as their neighbour and never shorten anything.
pub(super) fn settle(
    graph: &NetworkGraph,
    seeds: impl IntoIterator<Item = (u32, f64)>,
    direction: SearchDirection,
    limit: f64,
) -> HashMap<u32, f64> {
    let mut dist: HashMap<u32, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    for (node, cost) in seeds {
        if cost > limit {
            continue;
        }
        let improves = dist.get(&node).is_none_or(|&d| cost < d);
        if improves {
            dist.insert(node, cost);
            heap.push(State {
                cost: OrderedFloat(cost),
                node,
            });
        }
    }

    while let Some(State { cost, node }) = heap.pop() {
        let cost = cost.into_inner();
        // stale entry
        if dist.get(&node).is_some_and(|&d| cost > d) {
            continue;
        }

        for hop in graph.hops(node, direction) {
            let next = cost + hop.weight;
            if next > limit {
                continue;
            }
            let improves = dist.get(&hop.target).is_none_or(|&d| next < d);
            if improves {
                dist.insert(hop.target, next);
                heap.push(State {
                    cost: OrderedFloat(next),
                    node: hop.target,
                });
            }
        }
    }

    dist
}
