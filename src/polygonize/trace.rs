//! Boundary tracing on the cell-corner lattice.
//!
//! Lattice vertex `(x, y)` is the top-left corner of cell `(row = y, col = x)`,
//! with `y` growing downwards. Every cell side that separates two regions is a
//! directed unit edge with its own cell on the right-hand side, so exteriors
//! have a positive lattice shoelace area and holes a negative one.

use super::regions::{OUTSIDE, Regions};
use crate::config::Connectivity;

pub(super) type Vertex = (u32, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Right,
    Down,
    Left,
    Up,
}

impl Step {
    const ALL: [Step; 4] = [Step::Right, Step::Down, Step::Left, Step::Up];

    fn index(self) -> usize {
        self as usize
    }

    fn right_turn(self) -> Step {
        Step::ALL[(self.index() + 1) % 4]
    }

    fn left_turn(self) -> Step {
        Step::ALL[(self.index() + 3) % 4]
    }

    /// Cell `(row, col)` whose side this step runs along from `v`.
    fn cell(self, (x, y): Vertex) -> (isize, isize) {
        let (x, y) = (x as isize, y as isize);
        match self {
            Step::Right => (y, x),
            Step::Down => (y, x - 1),
            Step::Left => (y - 1, x - 1),
            Step::Up => (y - 1, x),
        }
    }

    /// The cell on the far side of that side.
    fn across(self, (row, col): (isize, isize)) -> (isize, isize) {
        match self {
            Step::Right => (row - 1, col),
            Step::Down => (row, col + 1),
            Step::Left => (row + 1, col),
            Step::Up => (row, col - 1),
        }
    }

    fn end(self, (x, y): Vertex) -> Vertex {
        match self {
            Step::Right => (x + 1, y),
            Step::Down => (x, y + 1),
            Step::Left => (x - 1, y),
            Step::Up => (x, y - 1),
        }
    }

    /// Turn order tried at a vertex. At a saddle the two choices differ:
    /// hugging the current cell keeps diagonal cells apart, the opposite turn
    /// joins them.
    fn preference(self, connectivity: Connectivity) -> [Step; 3] {
        match connectivity {
            Connectivity::Four => [self.right_turn(), self, self.left_turn()],
            Connectivity::Eight => [self.left_turn(), self, self.right_turn()],
        }
    }
}

fn is_boundary(regions: &Regions, v: Vertex, step: Step, region: u32) -> bool {
    let cell = step.cell(v);
    let (ar, ac) = step.across(cell);
    regions.at(cell.0, cell.1) == region && regions.at(ar, ac) != region
}

/// Vertices where three or more regions meet, or where two regions meet
/// diagonally. Boundaries are split into shared arcs at these points.
pub(super) fn is_node(regions: &Regions, (x, y): Vertex) -> bool {
    let (x, y) = (x as isize, y as isize);
    let nw = regions.at(y - 1, x - 1);
    let ne = regions.at(y - 1, x);
    let sw = regions.at(y, x - 1);
    let se = regions.at(y, x);

    let mut around = [nw, ne, se, sw];
    around.sort_unstable();
    let distinct = 1 + around.windows(2).filter(|w| w[0] != w[1]).count();

    distinct >= 3 || (nw == se && ne == sw && nw != ne)
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Ring {
    pub region: u32,
    /// Corners and junction vertices in travel order, not closed.
    pub vertices: Vec<Vertex>,
    /// Twice the signed lattice area; positive for exterior rings.
    pub area2: i64,
}

impl Ring {
    pub fn is_exterior(&self) -> bool {
        self.area2 > 0
    }
}

/// Traces every boundary ring of every region, in row-major order of the
/// first cell side each ring passes.
pub(super) fn trace_rings(regions: &Regions, connectivity: Connectivity) -> Vec<Ring> {
    let cols = regions.cols;
    let mut visited = vec![false; regions.cell_region.len() * 4];
    let mut rings = Vec::new();

    for (cell, &region) in regions.cell_region.iter().enumerate() {
        if region == OUTSIDE {
            continue;
        }
        let (row, col) = ((cell / cols) as u32, (cell % cols) as u32);
        let starts = [
            ((col, row), Step::Right),
            ((col + 1, row), Step::Down),
            ((col + 1, row + 1), Step::Left),
            ((col, row + 1), Step::Up),
        ];

        for (v, step) in starts {
            if visited[cell * 4 + step.index()] || !is_boundary(regions, v, step, region) {
                continue;
            }
            rings.push(trace_one(regions, connectivity, region, v, step, &mut visited));
        }
    }

    rings
}

fn trace_one(
    regions: &Regions,
    connectivity: Connectivity,
    region: u32,
    start: Vertex,
    first: Step,
    visited: &mut [bool],
) -> Ring {
    let cols = regions.cols as isize;
    let mut mark = |v: Vertex, step: Step| {
        let (row, col) = step.cell(v);
        visited[(row * cols + col) as usize * 4 + step.index()] = true;
    };

    mark(start, first);
    let mut edges = vec![(start, first)];
    let (mut v, mut step) = (first.end(start), first);

    loop {
        let Some(next) = step
            .preference(connectivity)
            .into_iter()
            .find(|&s| is_boundary(regions, v, s, region))
        else {
            break;
        };
        if (v, next) == (start, first) {
            break;
        }
        mark(v, next);
        edges.push((v, next));
        v = next.end(v);
        step = next;
    }

    let n = edges.len();
    let mut area2 = 0i64;
    let mut vertices = Vec::new();
    for i in 0..n {
        let (a, step) = edges[i];
        let (b, _) = edges[(i + 1) % n];
        area2 += a.0 as i64 * b.1 as i64 - b.0 as i64 * a.1 as i64;

        let previous = edges[(i + n - 1) % n].1;
        if previous != step || is_node(regions, a) {
            vertices.push(a);
        }
    }

    Ring {
        region,
        vertices,
        area2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(rows: usize, cols: usize, cells: &[u32]) -> Regions {
        let mut region_label: Vec<u32> = cells.iter().copied().filter(|&c| c != OUTSIDE).collect();
        region_label.sort_unstable();
        region_label.dedup();
        Regions {
            rows,
            cols,
            cell_region: cells.to_vec(),
            region_label,
        }
    }

    #[test]
    fn single_cell_is_one_exterior_square() {
        let rings = trace_rings(&regions(1, 1, &[0]), Connectivity::Four);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].vertices, vec![(0, 0), (1, 0), (1, 1), (0, 1)]);
        assert_eq!(rings[0].area2, 2);
    }

    #[test]
    fn enclosed_region_leaves_a_hole() {
        #[rustfmt::skip]
        let cells = [
            0, 0, 0,
            0, 1, 0,
            0, 0, 0,
        ];
        let rings = trace_rings(&regions(3, 3, &cells), Connectivity::Four);

        let outer: Vec<_> = rings.iter().filter(|r| r.region == 0).collect();
        assert_eq!(outer.len(), 2);
        assert!(outer[0].is_exterior());
        assert_eq!(outer[1].area2, -2);
        assert!(rings.iter().any(|r| r.region == 1 && r.area2 == 2));
    }

    #[test]
    fn diagonal_contact_is_a_node() {
        #[rustfmt::skip]
        let cells = [
            0, 1,
            1, 0,
        ];
        let r = regions(2, 2, &cells);
        assert!(is_node(&r, (1, 1)));
        // outside, 0 and 1 meet on the top edge
        assert!(is_node(&r, (1, 0)));

        let strip = regions(1, 2, &[0, 0]);
        assert!(!is_node(&strip, (1, 0)));
    }

    #[test]
    fn saddle_turn_follows_connectivity() {
        // region 0 touches itself only at the centre vertex
        #[rustfmt::skip]
        let cells = [
            0, 1,
            1, 0,
        ];
        let r = regions(2, 2, &cells);

        let four = trace_rings(&r, Connectivity::Four);
        assert_eq!(four.iter().filter(|ring| ring.region == 0).count(), 2);

        let eight = trace_rings(&r, Connectivity::Eight);
        let zero: Vec<_> = eight.iter().filter(|ring| ring.region == 0).collect();
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0].area2, 4);
    }
}
