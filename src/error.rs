use crate::ids::{DemandId, EdgeId, FacilityId, NodeId};
use thiserror::Error;

/// Fatal input problems. The pipeline stops before solving and produces no
/// partial output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("edge {edge} references undefined node {node}")]
    DanglingNodeReference { edge: EdgeId, node: NodeId },
    #[error("node {0} is defined more than once")]
    DuplicateNode(NodeId),
    #[error("edge {0} is defined more than once")]
    DuplicateEdge(EdgeId),
    #[error("edge {edge} has invalid impedance {impedance}")]
    InvalidImpedance { edge: EdgeId, impedance: f64 },
    #[error("edge {0} has fewer than two coordinates")]
    DegenerateEdge(EdgeId),
    #[error("no candidate facilities were supplied")]
    NoFacilities,
    #[error("no demand points were supplied")]
    NoDemand,
    #[error("facility {0} is defined more than once")]
    DuplicateFacility(FacilityId),
    #[error("demand point {0} is defined more than once")]
    DuplicateDemand(DemandId),
    #[error("facility {id} has invalid capacity {capacity}")]
    InvalidCapacity { id: FacilityId, capacity: f64 },
    #[error("demand point {id} has invalid weight {weight}")]
    InvalidWeight { id: DemandId, weight: f64 },
    #[error("invalid configuration value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("boundary geometry is empty")]
    EmptyBoundary,
    #[error("raster of {rows}x{cols} cells exceeds the limit of {limit} cells")]
    RasterTooLarge {
        rows: usize,
        cols: usize,
        limit: usize,
    },
}

/// A point had no network edge within the snap tolerance. Recovered locally:
/// the point is excluded from the working set.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("no network edge within {tolerance} of ({x}, {y})")]
pub struct NoLocationError {
    pub x: f64,
    pub y: f64,
    pub tolerance: f64,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Source(#[from] crate::features::FeatureError),
    #[error("pipeline cancelled before stage `{0}`")]
    Cancelled(crate::pipeline::Stage),
}
