use crate::config::Connectivity;
use crate::raster::{AllocationRaster, NO_VALUE};
use std::collections::VecDeque;

/// Region id for cells outside the grid or without a label.
pub(super) const OUTSIDE: u32 = u32::MAX;

/// Connected same-label components of a raster.
pub(super) struct Regions {
    pub rows: usize,
    pub cols: usize,
    /// Row-major region id per cell, [`OUTSIDE`] for unlabelled cells.
    pub cell_region: Vec<u32>,
    /// Raster label index of each region.
    pub region_label: Vec<u32>,
}

impl Regions {
    /// Regions are numbered in row-major order of their first cell.
    pub fn label(raster: &AllocationRaster, connectivity: Connectivity) -> Self {
        let (rows, cols) = (raster.rows(), raster.cols());
        let cells = raster.cells();
        let mut cell_region = vec![OUTSIDE; cells.len()];
        let mut region_label = Vec::new();
        let mut queue = VecDeque::new();

        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
            (1, 0),
            (1, -1),
            (0, -1),
        ];
        let neighbours: &[(isize, isize)] = match connectivity {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        };

        for start in 0..cells.len() {
            if cells[start] == NO_VALUE || cell_region[start] != OUTSIDE {
                continue;
            }
            let region = region_label.len() as u32;
            let label = cells[start];
            region_label.push(label);
            cell_region[start] = region;
            queue.push_back(start);

            while let Some(cell) = queue.pop_front() {
                let (row, col) = ((cell / cols) as isize, (cell % cols) as isize);
                for &(dr, dc) in neighbours {
                    let (r, c) = (row + dr, col + dc);
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        continue;
                    }
                    let next = r as usize * cols + c as usize;
                    if cells[next] == label && cell_region[next] == OUTSIDE {
                        cell_region[next] = region;
                        queue.push_back(next);
                    }
                }
            }
        }

        Self {
            rows,
            cols,
            cell_region,
            region_label,
        }
    }

    pub fn len(&self) -> usize {
        self.region_label.len()
    }

    /// Region of the cell at `(row, col)`; anything off the grid is [`OUTSIDE`].
    pub fn at(&self, row: isize, col: isize) -> u32 {
        if row < 0 || col < 0 || row >= self.rows as isize || col >= self.cols as isize {
            OUTSIDE
        } else {
            self.cell_region[row as usize * self.cols + col as usize]
        }
    }
}
