use crate::{linalg, se3::Se3};

/// Errors raised when a point cloud does not satisfy the oriented-cloud invariants.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PointCloudError {
    /// The point cloud has no points.
    #[error("Pointcloud data is empty")]
    Empty,

    /// The point cloud carries no normals.
    #[error("Pointcloud has no normals")]
    MissingNormals,

    /// The number of normals differs from the number of points.
    #[error("Pointcloud points size {points} != normals size {normals}")]
    LengthMismatch {
        /// Number of points.
        points: usize,
        /// Number of normals.
        normals: usize,
    },
}

/// A point cloud with points, colors, and normals.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            points,
            colors,
            normals,
        }
    }

    /// Create a point cloud from index-aligned points and normals.
    pub fn from_oriented(points: Vec<[f64; 3]>, normals: Vec<[f64; 3]>) -> Self {
        Self::new(points, None, Some(normals))
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &Vec<[f64; 3]> {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&Vec<[u8; 3]>> {
        self.colors.as_ref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&Vec<[f64; 3]>> {
        self.normals.as_ref()
    }

    /// Check the oriented-cloud invariants and return the normals.
    ///
    /// A cloud is oriented when it is not empty and carries exactly one normal per point.
    pub fn oriented(&self) -> Result<&[[f64; 3]], PointCloudError> {
        if self.points.is_empty() {
            return Err(PointCloudError::Empty);
        }
        let normals = self.normals.as_ref().ok_or(PointCloudError::MissingNormals)?;
        if normals.len() != self.points.len() {
            return Err(PointCloudError::LengthMismatch {
                points: self.points.len(),
                normals: normals.len(),
            });
        }
        Ok(normals)
    }

    /// Return a copy of the point cloud moved by `transform`.
    ///
    /// Points are transformed as positions and normals as directions. Colors are kept.
    pub fn transformed(&self, transform: &Se3) -> Self {
        let mut points = vec![[0.0; 3]; self.points.len()];
        linalg::transform_points(&self.points, transform, &mut points);

        let normals = self.normals.as_ref().map(|normals| {
            let mut dst = vec![[0.0; 3]; normals.len()];
            linalg::rotate_vectors(normals, transform, &mut dst);
            dst
        });

        Self {
            points,
            colors: self.colors.clone(),
            normals,
        }
    }
}
