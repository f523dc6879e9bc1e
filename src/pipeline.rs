//! End-to-end run: network, location-allocation, raster, precincts.

use crate::allocation::{
    AllocationSolution, DemandPoint, DemandStatus, ExtractedResults, Facility, FacilityStatus,
    LocationAllocationSolver, extract,
};
use crate::config::PipelineConfig;
use crate::error::{InputError, PipelineError};
use crate::features::FeatureSource;
use crate::network::{NetworkGraph, NetworkInput, PointSnapper, build_from_polylines};
use crate::polygonize::{self, PrecinctPolygon};
use crate::raster::{self, AllocationRaster};
use geo_types::MultiPolygon;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    BuildNetwork,
    Solve,
    Extract,
    Rasterize,
    Polygonize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BuildNetwork => "build network",
            Stage::Solve => "solve",
            Stage::Extract => "extract",
            Stage::Rasterize => "rasterize",
            Stage::Polygonize => "polygonize",
        };
        f.write_str(name)
    }
}

/// Shared flag checked between stages. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Non-fatal conditions reported alongside a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum PipelineWarning {
    /// Facilities with no network edge within the snap tolerance.
    ExcludedFacilities { count: usize },
    /// Demand points with no network edge within the snap tolerance.
    ExcludedDemand { count: usize },
    /// Snapped demand no selected facility serves within the cutoff.
    UnassignedDemand { count: usize, weight: f64 },
    /// No facility was selected, or no raster cell inside the boundary was
    /// labelled, so no precincts were produced.
    EmptyAllocation,
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::ExcludedFacilities { count } => {
                write!(f, "{count} facilities could not be located on the network")
            }
            PipelineWarning::ExcludedDemand { count } => {
                write!(f, "{count} demand points could not be located on the network")
            }
            PipelineWarning::UnassignedDemand { count, weight } => write!(
                f,
                "{count} demand points (weight {weight}) are beyond the cutoff of every selected facility"
            ),
            PipelineWarning::EmptyAllocation => f.write_str("no precinct could be produced"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub network: NetworkInput,
    pub facilities: Vec<Facility>,
    pub demand: Vec<DemandPoint>,
    pub boundary: MultiPolygon<f64>,
}

impl PipelineInputs {
    /// Reads every layer from `source`, deriving the network topology from
    /// its road polylines.
    pub fn from_source<S: FeatureSource + ?Sized>(source: &S) -> Result<Self, PipelineError> {
        Ok(Self {
            network: build_from_polylines(source.network()?),
            facilities: source.facilities()?,
            demand: source.demand()?,
            boundary: source.boundary()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub solution: AllocationSolution,
    pub results: ExtractedResults,
    /// `None` when nothing was selected.
    pub raster: Option<AllocationRaster>,
    pub precincts: Vec<PrecinctPolygon>,
    pub warnings: Vec<PipelineWarning>,
}

/// Counts for downstream consumers, written next to the feature outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub candidate_facilities: usize,
    pub selected_facilities: usize,
    pub excluded_facilities: usize,
    pub demand_points: usize,
    pub assigned_demand: usize,
    pub assigned_weight: f64,
    pub unassigned_demand: usize,
    pub excluded_demand: usize,
    pub raster_rows: usize,
    pub raster_cols: usize,
    pub precincts: usize,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary {
        let solution = &self.solution;
        let (assigned, assigned_weight) =
            solution.count_demand(|s| matches!(s, DemandStatus::Assigned { .. }));
        let (unassigned, _) = solution.count_demand(|s| matches!(s, DemandStatus::Unassigned));
        let (excluded, _) = solution.count_demand(|s| matches!(s, DemandStatus::Excluded));

        RunSummary {
            candidate_facilities: solution.facilities.len(),
            selected_facilities: self.results.selected_facilities.len(),
            excluded_facilities: solution
                .facilities
                .iter()
                .filter(|f| f.status == FacilityStatus::Excluded)
                .count(),
            demand_points: solution.demand.len(),
            assigned_demand: assigned,
            assigned_weight,
            unassigned_demand: unassigned,
            excluded_demand: excluded,
            raster_rows: self.raster.as_ref().map_or(0, |r| r.rows()),
            raster_cols: self.raster.as_ref().map_or(0, |r| r.cols()),
            precincts: self.precincts.len(),
            warnings: self.warnings.clone(),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!("Cancelled before {}", stage);
            return Err(PipelineError::Cancelled(stage));
        }
        Ok(())
    }

    /// Snaps the inputs onto `graph` and runs the greedy cover.
    pub fn solve(
        &self,
        graph: &NetworkGraph,
        facilities: &[Facility],
        demand: &[DemandPoint],
    ) -> Result<AllocationSolution, PipelineError> {
        self.checkpoint(Stage::Solve)?;
        let snapper = PointSnapper::new(graph, self.config.tie_break());
        let solver = LocationAllocationSolver::new(graph, &snapper, &self.config);
        Ok(solver.solve(facilities, demand)?)
    }

    /// Allocation raster over `boundary` and its precinct polygons.
    pub fn partition(
        &self,
        results: &ExtractedResults,
        boundary: &MultiPolygon<f64>,
    ) -> Result<(AllocationRaster, Vec<PrecinctPolygon>), PipelineError> {
        self.checkpoint(Stage::Rasterize)?;
        let seeds = raster::seeds_for(results, self.config.raster_source);
        let raster = raster::rasterize_seeds(
            &seeds,
            boundary,
            self.config.cell_size,
            self.config.tie_break(),
            self.config.max_raster_cells,
        )?;
        info!(
            "Allocation raster {}x{} with {} labelled cells",
            raster.rows(),
            raster.cols(),
            raster.labelled_cells()
        );

        self.checkpoint(Stage::Polygonize)?;
        let precincts = polygonize::extract(
            &raster,
            self.config.simplification_tolerance,
            self.config.connectivity,
        );
        Ok((raster, precincts))
    }

    pub fn run(&self, inputs: PipelineInputs) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();

        let grid = raster::grid_shape(
            &inputs.boundary,
            self.config.cell_size,
            self.config.max_raster_cells,
        )?;
        debug!("Boundary grid is {}x{} cells", grid.rows, grid.cols);

        self.checkpoint(Stage::BuildNetwork)?;
        let graph = NetworkGraph::build(inputs.network.edges, inputs.network.nodes)?;
        info!(
            "Network has {} nodes and {} edges",
            graph.nodes().len(),
            graph.edges().len()
        );

        let solution = self.solve(&graph, &inputs.facilities, &inputs.demand)?;

        self.checkpoint(Stage::Extract)?;
        let results = extract(&solution);
        let mut warnings = solution_warnings(&solution);

        let (raster, precincts) = if results.selected_facilities.is_empty() {
            warnings.push(PipelineWarning::EmptyAllocation);
            (None, Vec::new())
        } else {
            let (raster, precincts) = self.partition(&results, &inputs.boundary)?;
            if raster.is_empty() {
                warnings.push(PipelineWarning::EmptyAllocation);
            }
            (Some(raster), precincts)
        };

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            "Run finished in {:?}: {} facilities selected, {} precincts",
            start.elapsed(),
            results.selected_facilities.len(),
            precincts.len()
        );

        Ok(PipelineOutput {
            solution,
            results,
            raster,
            precincts,
            warnings,
        })
    }
}

fn solution_warnings(solution: &AllocationSolution) -> Vec<PipelineWarning> {
    let mut warnings = Vec::new();

    let excluded_facilities = solution
        .facilities
        .iter()
        .filter(|f| f.status == FacilityStatus::Excluded)
        .count();
    if excluded_facilities > 0 {
        warnings.push(PipelineWarning::ExcludedFacilities {
            count: excluded_facilities,
        });
    }

    let (excluded_demand, _) = solution.count_demand(|s| matches!(s, DemandStatus::Excluded));
    if excluded_demand > 0 {
        warnings.push(PipelineWarning::ExcludedDemand {
            count: excluded_demand,
        });
    }

    let (count, weight) = solution.count_demand(|s| matches!(s, DemandStatus::Unassigned));
    if count > 0 {
        warnings.push(PipelineWarning::UnassignedDemand { count, weight });
    }

    warnings
}
