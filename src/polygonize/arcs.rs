use super::regions::Regions;
use super::trace::{Ring, Vertex, is_node};
use ahash::AHashMap as HashMap;

/// Use of a shared arc by one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ArcRef {
    pub arc: usize,
    pub reversed: bool,
}

/// Region boundaries cut at junctions. Each arc is stored once, in a
/// canonical direction, and every ring that borders it refers to it.
#[derive(Debug, Default)]
pub(super) struct ArcSet {
    pub arcs: Vec<Vec<Vertex>>,
    pub ring_arcs: Vec<Vec<ArcRef>>,
}

impl ArcSet {
    pub fn split(regions: &Regions, rings: &[Ring]) -> Self {
        let mut set = ArcSet::default();
        let mut by_key: HashMap<(Vertex, Vertex, Vertex), usize> = HashMap::new();

        for ring in rings {
            let vertices = &ring.vertices;
            let nodes: Vec<usize> = (0..vertices.len())
                .filter(|&i| is_node(regions, vertices[i]))
                .collect();

            let pieces = if nodes.is_empty() {
                vec![closed_loop(vertices)]
            } else {
                open_pieces(vertices, &nodes)
            };

            let refs = pieces
                .into_iter()
                .map(|piece| set.intern(&mut by_key, piece))
                .collect();
            set.ring_arcs.push(refs);
        }

        set
    }

    fn intern(
        &mut self,
        by_key: &mut HashMap<(Vertex, Vertex, Vertex), usize>,
        mut piece: Vec<Vertex>,
    ) -> ArcRef {
        let n = piece.len();
        let reversed = (piece[n - 1], piece[n - 2]) < (piece[0], piece[1]);
        if reversed {
            piece.reverse();
        }

        let key = (piece[0], piece[1], piece[n - 1]);
        let arc = *by_key.entry(key).or_insert_with(|| {
            self.arcs.push(piece);
            self.arcs.len() - 1
        });

        ArcRef { arc, reversed }
    }
}

/// A ring without junctions, rotated to start at its smallest vertex and
/// closed.
fn closed_loop(vertices: &[Vertex]) -> Vec<Vertex> {
    let start = vertices
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map_or(0, |(i, _)| i);

    let mut piece: Vec<Vertex> = vertices[start..]
        .iter()
        .chain(&vertices[..start])
        .copied()
        .collect();
    piece.push(piece[0]);
    piece
}

/// Node-to-node pieces of a ring, in travel order.
fn open_pieces(vertices: &[Vertex], nodes: &[usize]) -> Vec<Vec<Vertex>> {
    let n = vertices.len();
    (0..nodes.len())
        .map(|k| {
            let from = nodes[k];
            let to = nodes[(k + 1) % nodes.len()];
            let steps = (to + n - from) % n;
            let steps = if steps == 0 { n } else { steps };
            (0..=steps).map(|s| vertices[(from + s) % n]).collect()
        })
        .collect()
}
