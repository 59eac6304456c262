use cpf_3d::{transforms::reference_frame, Se3};
use glam::DVec3;

use crate::MatchingError;

/// Staging buffers sized to the largest cloud seen so far.
///
/// The buffers only grow. Growing releases the current buffers before reserving the new
/// ones, so the old and new allocations never coexist.
#[derive(Debug, Default)]
pub struct WorkingSet {
    capacity: usize,
    points: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    frames: Vec<Se3>,
}

/// A cloud staged in the working set together with its reference frames.
#[derive(Debug, Clone, Copy)]
pub struct Staged<'a> {
    /// Point positions.
    pub points: &'a [[f64; 3]],
    /// Point normals.
    pub normals: &'a [[f64; 3]],
    /// Reference frame of every point.
    pub frames: &'a [Se3],
}

impl WorkingSet {
    /// Create an empty working set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points the working set can stage without growing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make room for `num_points` points.
    ///
    /// Returns `true` if the buffers had to grow. On allocation failure the working set is
    /// left empty with a capacity of zero.
    pub fn ensure(&mut self, num_points: usize) -> Result<bool, MatchingError> {
        if num_points <= self.capacity {
            return Ok(false);
        }

        // release first
        self.points = Vec::new();
        self.normals = Vec::new();
        self.frames = Vec::new();
        self.capacity = 0;

        let reserved = self
            .points
            .try_reserve_exact(num_points)
            .and_then(|_| self.normals.try_reserve_exact(num_points))
            .and_then(|_| self.frames.try_reserve_exact(num_points));

        if let Err(err) = reserved {
            log::error!("Working set allocation for {} points failed: {}", num_points, err);
            self.points = Vec::new();
            self.normals = Vec::new();
            self.frames = Vec::new();
            return Err(MatchingError::Allocation {
                requested: num_points,
            });
        }

        log::debug!("Working set grown to {} points", num_points);
        self.capacity = num_points;
        Ok(true)
    }

    /// Copy an oriented cloud into the buffers and compute its reference frames.
    ///
    /// PRECONDITION: `points.len() == normals.len() <= self.capacity()`.
    pub fn stage(&mut self, points: &[[f64; 3]], normals: &[[f64; 3]]) -> Staged<'_> {
        debug_assert_eq!(points.len(), normals.len());
        debug_assert!(points.len() <= self.capacity);

        self.points.clear();
        self.points.extend_from_slice(points);
        self.normals.clear();
        self.normals.extend_from_slice(normals);
        self.frames.clear();
        self.frames.extend(
            points
                .iter()
                .zip(normals.iter())
                .map(|(p, n)| reference_frame(DVec3::from_array(*p), DVec3::from_array(*n))),
        );

        Staged {
            points: &self.points,
            normals: &self.normals,
            frames: &self.frames,
        }
    }
}
