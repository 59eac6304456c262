#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod icp;
pub use icp::*;

mod ops;
pub use ops::fit_transformation;

use cpf_3d::PointCloudError;

/// Errors raised by the ICP refiner.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum IcpError {
    /// `compute` was called before a target cloud was set.
    #[error("No target point cloud set")]
    NoTarget,

    /// The source point cloud has no points.
    #[error("Source point cloud is empty")]
    EmptySource,

    /// Not enough correspondences survived the outlier rejection to fit a transform.
    #[error("Not enough correspondences to fit a transformation: {0} < 3")]
    InsufficientCorrespondences(usize),

    /// A point cloud violates its invariants.
    #[error(transparent)]
    InvalidCloud(#[from] PointCloudError),
}
