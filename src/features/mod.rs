//! Reading pipeline inputs from, and writing results to, feature files.

mod sink;
mod source;

pub use sink::GeoJsonSink;
pub use source::GeoJsonSource;

use crate::allocation::{DemandPoint, Facility};
use crate::network::Polyline;
use crate::pipeline::PipelineOutput;
use geo_types::MultiPolygon;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid GeoJSON in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },
    #[error("'{0}' is not a FeatureCollection")]
    NotFeatureCollection(PathBuf),
    #[error("feature {index} in '{path}' has unsupported geometry, expected {expected}")]
    UnsupportedGeometry {
        path: PathBuf,
        index: usize,
        expected: &'static str,
    },
    #[error("feature {index} in '{path}' has invalid `{name}`: {reason}")]
    InvalidAttribute {
        path: PathBuf,
        index: usize,
        name: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Where the pipeline's inputs come from.
pub trait FeatureSource {
    fn facilities(&self) -> Result<Vec<Facility>, FeatureError>;
    fn demand(&self) -> Result<Vec<DemandPoint>, FeatureError>;
    fn boundary(&self) -> Result<MultiPolygon<f64>, FeatureError>;
    fn network(&self) -> Result<Vec<Polyline>, FeatureError>;
}

/// Where a finished run is written.
pub trait FeatureSink {
    fn write(&mut self, output: &PipelineOutput) -> Result<(), FeatureError>;
}
