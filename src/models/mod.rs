//! Core data models for the aggregation pipeline.

use thiserror::Error;

mod ids;
mod matches;
mod region;
mod stats;
mod status;

pub use ids::*;
pub use matches::*;
pub use region::*;
pub use stats::*;
pub use status::*;

/// Validation errors raised when constructing models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityKind(String),
}
