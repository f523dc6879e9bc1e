//! Euclidean nearest-facility allocation raster, masked by the jurisdiction
//! boundary.
//!
//! Rows run top to bottom: row 0 touches the top of the boundary's bounding
//! box. Lattice corner `(x, y)` (column, row) sits at
//! `(min_x + x * cell_size, max_y - y * cell_size)`.

mod index;
mod mask;

pub use index::{RTreeSeedIndex, SeedIndex};

use crate::allocation::{AssignedDemand, ExtractedResults, SelectedFacility};
use crate::config::{RasterSource, TieBreak};
use crate::error::InputError;
use crate::ids::FacilityId;
use geo::BoundingRect;
use geo_types::{Coord, MultiPolygon};
use rayon::prelude::*;
use tracing::{debug, info};

/// Cell value for "outside the boundary" or "no seed".
pub const NO_VALUE: u32 = u32::MAX;

/// A labelled point the raster is allocated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub coord: Coord<f64>,
    pub label: FacilityId,
}

impl From<&SelectedFacility> for Seed {
    fn from(facility: &SelectedFacility) -> Self {
        Self {
            coord: facility.coord,
            label: facility.id,
        }
    }
}

impl From<&AssignedDemand> for Seed {
    fn from(demand: &AssignedDemand) -> Self {
        Self {
            coord: demand.coord,
            label: demand.facility,
        }
    }
}

pub fn seeds_for(results: &ExtractedResults, source: RasterSource) -> Vec<Seed> {
    match source {
        RasterSource::SelectedFacilities => {
            results.selected_facilities.iter().map(Seed::from).collect()
        }
        RasterSource::AssignedDemand => results.assigned_demand.iter().map(Seed::from).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRaster {
    min_x: f64,
    max_y: f64,
    cell_size: f64,
    rows: usize,
    cols: usize,
    labels: Vec<FacilityId>,
    /// Row-major indices into `labels`, or [`NO_VALUE`].
    cells: Vec<u32>,
}

impl AllocationRaster {
    /// Raster from explicit row-major cell labels, with `origin` at the top-left
    /// corner.
    pub fn from_labels(
        origin: Coord<f64>,
        cell_size: f64,
        rows: usize,
        cols: usize,
        cells: &[Option<FacilityId>],
    ) -> Result<Self, InputError> {
        if cells.len() != rows * cols {
            return Err(InputError::InvalidConfig {
                field: "cells",
                reason: format!("expected {} cells, got {}", rows * cols, cells.len()),
            });
        }

        let mut labels: Vec<FacilityId> = cells.iter().flatten().copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let cells = cells
            .iter()
            .map(|cell| match cell {
                Some(id) => labels.binary_search(id).map_or(NO_VALUE, |i| i as u32),
                None => NO_VALUE,
            })
            .collect();

        Ok(Self {
            min_x: origin.x,
            max_y: origin.y,
            cell_size,
            rows,
            cols,
            labels,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Top-left corner of the grid.
    pub fn origin(&self) -> Coord<f64> {
        Coord {
            x: self.min_x,
            y: self.max_y,
        }
    }

    pub fn labels(&self) -> &[FacilityId] {
        &self.labels
    }

    /// Raw cell values, row-major.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> Option<FacilityId> {
        match self.cells[row * self.cols + col] {
            NO_VALUE => None,
            index => Some(self.labels[index as usize]),
        }
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.min_x + (col as f64 + 0.5) * self.cell_size,
            y: self.max_y - (row as f64 + 0.5) * self.cell_size,
        }
    }

    /// World position of lattice corner `(x, y)`.
    pub fn corner(&self, x: usize, y: usize) -> Coord<f64> {
        Coord {
            x: self.min_x + x as f64 * self.cell_size,
            y: self.max_y - y as f64 * self.cell_size,
        }
    }

    pub fn labelled_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c != NO_VALUE).count()
    }

    /// True when no cell carries a label.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == NO_VALUE)
    }
}

/// Placement and size of the grid laid over a boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub min_x: f64,
    pub max_y: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// Grid covering the bounding box of `boundary`. Partial cells on the right
/// and bottom edges count whole.
pub fn grid_shape(
    boundary: &MultiPolygon<f64>,
    cell_size: f64,
    max_cells: usize,
) -> Result<GridShape, InputError> {
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(InputError::InvalidConfig {
            field: "cell_size",
            reason: format!("must be a finite positive number, got {}", cell_size),
        });
    }

    let extent = boundary
        .bounding_rect()
        .ok_or(InputError::EmptyBoundary)?;

    let cols = ((extent.width() / cell_size).ceil() as usize).max(1);
    let rows = ((extent.height() / cell_size).ceil() as usize).max(1);
    if rows.checked_mul(cols).is_none_or(|n| n > max_cells) {
        return Err(InputError::RasterTooLarge {
            rows,
            cols,
            limit: max_cells,
        });
    }

    Ok(GridShape {
        min_x: extent.min().x,
        max_y: extent.max().y,
        rows,
        cols,
    })
}

/// Allocates every cell whose centre lies inside `boundary` to the nearest
/// seed of `index`.
///
/// The grid is laid out by [`grid_shape`].
pub fn rasterize<I: SeedIndex + ?Sized>(
    index: &I,
    boundary: &MultiPolygon<f64>,
    cell_size: f64,
    max_cells: usize,
) -> Result<AllocationRaster, InputError> {
    let shape = grid_shape(boundary, cell_size, max_cells)?;
    let total = shape.cells();
    let GridShape {
        min_x,
        max_y,
        rows,
        cols,
    } = shape;
    info!(
        "Rasterising {}x{} cells of size {} against {} labels",
        rows,
        cols,
        cell_size,
        index.labels().len()
    );

    let mut cells = vec![NO_VALUE; total];
    cells
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, out)| {
            let y = max_y - (row as f64 + 0.5) * cell_size;
            let inside = mask::row_mask(boundary, y, min_x, cell_size, cols);
            for (col, cell) in out.iter_mut().enumerate() {
                if inside[col] {
                    let center = Coord {
                        x: min_x + (col as f64 + 0.5) * cell_size,
                        y,
                    };
                    *cell = index.nearest(center).unwrap_or(NO_VALUE);
                }
            }
        });

    let raster = AllocationRaster {
        min_x,
        max_y,
        cell_size,
        rows,
        cols,
        labels: index.labels().to_vec(),
        cells,
    };
    debug!("{} of {} cells labelled", raster.labelled_cells(), total);

    Ok(raster)
}

/// [`rasterize`] over an R-tree of `seeds`.
pub fn rasterize_seeds(
    seeds: &[Seed],
    boundary: &MultiPolygon<f64>,
    cell_size: f64,
    tie: TieBreak,
    max_cells: usize,
) -> Result<AllocationRaster, InputError> {
    let index = RTreeSeedIndex::new(seeds, tie);
    rasterize(&index, boundary, cell_size, max_cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Polygon, Rect, polygon};

    fn seed(label: u64, x: f64, y: f64) -> Seed {
        Seed {
            coord: Coord { x, y },
            label: FacilityId(label),
        }
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new((x0, y0), (x1, y1)).to_polygon()])
    }

    fn row_labels(raster: &AllocationRaster, row: usize) -> Vec<Option<u64>> {
        (0..raster.cols())
            .map(|col| raster.get(row, col).map(|id| id.0))
            .collect()
    }

    #[test]
    fn grid_covers_the_bounding_box() {
        let raster =
            rasterize_seeds(&[seed(1, 0.0, 0.0)], &rect(0.0, 0.0, 10.0, 7.0), 2.0, TieBreak::EXACT, 1000)
                .unwrap();

        assert_eq!((raster.rows(), raster.cols()), (4, 5));
        assert_eq!(raster.origin(), Coord { x: 0.0, y: 7.0 });
        assert_eq!(raster.cell_center(0, 0), Coord { x: 1.0, y: 6.0 });
        assert_eq!(raster.corner(5, 4), Coord { x: 10.0, y: -1.0 });
    }

    #[test]
    fn cells_take_the_nearest_seed() {
        let raster = rasterize_seeds(
            &[seed(2, 0.0, 1.0), seed(1, 10.0, 1.0)],
            &rect(0.0, 0.0, 10.0, 2.0),
            1.0,
            TieBreak::EXACT,
            1000,
        )
        .unwrap();

        let expected: Vec<_> = (0..10).map(|c| Some(if c < 5 { 2 } else { 1 })).collect();
        assert_eq!(row_labels(&raster, 0), expected);
        assert_eq!(row_labels(&raster, 1), expected);
    }

    #[test]
    fn exact_ties_go_to_the_lowest_label() {
        let raster = rasterize_seeds(
            &[seed(9, 3.0, 1.0), seed(4, 7.0, 1.0)],
            &rect(0.0, 0.0, 10.0, 2.0),
            2.0,
            TieBreak::EXACT,
            1000,
        )
        .unwrap();

        // the middle cell centre (5, 1) is equidistant
        assert_eq!(
            row_labels(&raster, 0),
            vec![Some(9), Some(9), Some(4), Some(4), Some(4)]
        );
    }

    #[test]
    fn cells_outside_the_boundary_have_no_value() {
        let triangle: Polygon<f64> = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 0.0, y: 3.0)];
        let raster = rasterize_seeds(
            &[seed(1, 1.0, 1.0)],
            &MultiPolygon::new(vec![triangle]),
            1.0,
            TieBreak::EXACT,
            1000,
        )
        .unwrap();

        assert_eq!((raster.rows(), raster.cols()), (3, 4));
        assert_eq!(row_labels(&raster, 0), vec![Some(1), None, None, None]);
        assert_eq!(row_labels(&raster, 1), vec![Some(1), Some(1), None, None]);
        assert_eq!(row_labels(&raster, 2), vec![Some(1), Some(1), Some(1), None]);
    }

    #[test]
    fn holes_are_masked() {
        let outer = LineString::from(vec![(0.0, 0.0), (6.0, 0.0), (6.0, 6.0), (0.0, 6.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)]);
        let boundary = MultiPolygon::new(vec![Polygon::new(outer, vec![hole])]);

        let raster =
            rasterize_seeds(&[seed(1, 0.0, 0.0)], &boundary, 1.0, TieBreak::EXACT, 1000).unwrap();

        assert_eq!(raster.get(2, 2), None);
        assert_eq!(raster.get(3, 3), None);
        assert_eq!(raster.get(1, 1), Some(FacilityId(1)));
        assert_eq!(raster.labelled_cells(), 32);
    }

    #[test]
    fn no_seeds_gives_an_empty_raster() {
        let raster =
            rasterize_seeds(&[], &rect(0.0, 0.0, 4.0, 4.0), 1.0, TieBreak::EXACT, 1000).unwrap();
        assert!(raster.is_empty());
    }

    #[test]
    fn oversized_and_empty_inputs_are_rejected() {
        let seeds = [seed(1, 0.0, 0.0)];
        assert_eq!(
            rasterize_seeds(&seeds, &rect(0.0, 0.0, 100.0, 100.0), 1.0, TieBreak::EXACT, 50),
            Err(InputError::RasterTooLarge {
                rows: 100,
                cols: 100,
                limit: 50,
            })
        );
        assert_eq!(
            rasterize_seeds(&seeds, &MultiPolygon::new(vec![]), 1.0, TieBreak::EXACT, 50),
            Err(InputError::EmptyBoundary)
        );
    }

    #[test]
    fn grid_shape_rounds_partial_cells_up() {
        let shape = grid_shape(&rect(-1.0, 2.0, 9.0, 7.5), 2.0, 1000).unwrap();
        assert_eq!(
            shape,
            GridShape {
                min_x: -1.0,
                max_y: 7.5,
                rows: 3,
                cols: 5,
            }
        );
        assert_eq!(shape.cells(), 15);
        assert!(matches!(
            grid_shape(&rect(0.0, 0.0, 1.0, 1.0), 0.0, 1000),
            Err(InputError::InvalidConfig {
                field: "cell_size",
                ..
            })
        ));
    }

    #[test]
    fn assigned_demand_seeds_carry_their_facility() {
        let results = ExtractedResults {
            selected_facilities: vec![SelectedFacility {
                id: FacilityId(3),
                coord: Coord { x: 0.0, y: 0.0 },
                assigned_demand_count: 1,
                assigned_weight: 1.0,
            }],
            assigned_demand: vec![AssignedDemand {
                id: crate::ids::DemandId(8),
                coord: Coord { x: 2.0, y: 2.0 },
                facility: FacilityId(3),
                impedance: 4.0,
            }],
        };

        let from_demand = seeds_for(&results, RasterSource::AssignedDemand);
        assert_eq!(from_demand, vec![seed(3, 2.0, 2.0)]);
        assert_eq!(
            seeds_for(&results, RasterSource::SelectedFacilities),
            vec![seed(3, 0.0, 0.0)]
        );
    }
}
