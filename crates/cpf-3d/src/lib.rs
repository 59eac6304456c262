#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Curvature point-pair descriptors and their extraction.
pub mod descriptor;

/// Radius neighbor search over point clouds.
pub mod index;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud with optional colors and normals.
pub mod pointcloud;

/// Rigid body transforms in 3D.
pub mod se3;

/// Local reference frames for oriented points.
pub mod transforms;

pub use descriptor::{CurvatureExtractor, Descriptor, DescriptorConfig, DescriptorExtractor};
pub use index::{KdTreeIndex, SpatialIndex};
pub use pointcloud::{PointCloud, PointCloudError};
pub use se3::Se3;
