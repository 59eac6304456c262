#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pose cluster averaging.
pub mod aggregate;

/// Online clustering of pose candidates.
pub mod clustering;

mod engine;
pub use engine::*;

/// Matching parameters and their validation.
pub mod params;
pub use params::{CpfParams, ValidatedParams};

/// Per-model matching results.
pub mod result;
pub use result::{MatchSummary, MatchingData, PoseCluster};

mod voting;

/// Grow-only staging buffers used during descriptor extraction.
pub mod working_set;
pub use working_set::WorkingSet;

use cpf_3d::PointCloudError;

/// Errors raised by the matcher.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MatchingError {
    /// The input cloud is empty or its normals do not match its points.
    #[error("Invalid point cloud: {0}")]
    InvalidCloud(#[from] PointCloudError),

    /// The requested model id was never assigned.
    #[error("Model id {model_id} does not exist, {num_models} models registered")]
    UnknownModel {
        /// The requested id.
        model_id: usize,
        /// Number of registered models.
        num_models: usize,
    },

    /// Matching was requested before a scene was set.
    #[error("No scene set, set a scene first")]
    NoScene,

    /// A pose cluster without poses cannot be aggregated.
    #[error("Cannot combine an empty pose cluster")]
    EmptyCluster,

    /// The working set could not be grown.
    #[error("Failed to allocate the working set for {requested} points")]
    Allocation {
        /// Number of points requested.
        requested: usize,
    },
}
