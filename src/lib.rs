#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Polling place selection and precinct generation.
//!
//! The pipeline snaps candidate polling places and voters onto a road network,
//! picks the smallest set of polling places that keeps every voter within the
//! impedance cutoff, and then carves the jurisdiction into precincts by
//! allocating every raster cell to its nearest selected polling place.

pub mod allocation;
pub mod config;
pub mod error;
pub mod features;
pub mod ids;
pub mod network;
pub mod pipeline;
pub mod polygonize;
pub mod raster;

pub use config::PipelineConfig;
pub use error::{InputError, NoLocationError, PipelineError};
pub use ids::{DemandId, EdgeId, FacilityId, NodeId};
pub use pipeline::{CancellationToken, Pipeline, PipelineInputs, PipelineOutput};
