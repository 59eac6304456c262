//! Curvature point-pair features (CPF).
//!
//! Every point gets a discretized curvature class computed from the spread of the
//! normals in its neighborhood. Every ordered pair of neighboring points then yields a
//! rotation-invariant code built from both curvature classes, the angle between the
//! normals and the pair distance, plus the angle `alpha` of the pair around the X axis
//! of the first point's reference frame. Two pairs with equal codes are candidate
//! correspondences and the difference of their `alpha` angles fixes the remaining
//! rotational degree of freedom.

use glam::DVec3;
use rayon::prelude::*;

use crate::{linalg::angle_between, se3::Se3};

/// Number of bins used to discretize the pair distance relative to the search radius.
pub const DISTANCE_BINS: f64 = 8.0;

/// Size of the discretized feature code.
pub const CODE_LEN: usize = 4;

/// A discretized point-pair descriptor owned by one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descriptor {
    /// Index of the point owning this descriptor.
    pub point_idx: usize,
    /// Discretized feature code. All zeros marks an invalid descriptor.
    pub code: [u32; CODE_LEN],
    /// Rotation angle of the pair about the X axis of the owner's reference frame, in radians.
    pub alpha: f64,
}

impl Descriptor {
    /// Create the sentinel descriptor for a point without curvature data.
    pub fn sentinel(point_idx: usize) -> Self {
        Self {
            point_idx,
            code: [0; CODE_LEN],
            alpha: 0.0,
        }
    }

    /// Whether the descriptor carries data, i.e. is not the all-zero sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.code != [0; CODE_LEN]
    }
}

/// Discretization settings for descriptor codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorConfig {
    /// Number of angle bins covering a full turn.
    pub angle_bins: usize,
    /// Radius used for the neighborhood queries.
    pub radius: f64,
}

/// Computes curvature classes and point-pair descriptors from neighbor lists.
pub trait DescriptorExtractor {
    /// Compute one discretized curvature class per point.
    ///
    /// A class of `0` means the point has no usable neighborhood.
    fn curvatures(
        &self,
        points: &[[f64; 3]],
        normals: &[[f64; 3]],
        neighbors: &[Vec<usize>],
        multiplier: f64,
    ) -> Vec<u32>;

    /// Compute the descriptors of all points.
    ///
    /// `frames[i]` is the reference frame of point `i`.
    fn descriptors(
        &self,
        points: &[[f64; 3]],
        normals: &[[f64; 3]],
        neighbors: &[Vec<usize>],
        curvatures: &[u32],
        frames: &[Se3],
        config: &DescriptorConfig,
    ) -> Vec<Descriptor>;
}

/// The default CPF extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurvatureExtractor;

impl CurvatureExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }
}

/// Mean normal deviation of a point against its neighbors, in `[0, 2]`.
fn normal_deviation(i: usize, normals: &[[f64; 3]], neighbors: &[usize]) -> Option<f64> {
    let n_i = DVec3::from_array(normals[i]);
    let mut sum = 0.0;
    let mut count = 0usize;
    for &j in neighbors.iter().filter(|&&j| j != i) {
        let n_j = DVec3::from_array(normals[j]);
        sum += 1.0 - n_i.dot(n_j).clamp(-1.0, 1.0);
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

impl DescriptorExtractor for CurvatureExtractor {
    fn curvatures(
        &self,
        _points: &[[f64; 3]],
        normals: &[[f64; 3]],
        neighbors: &[Vec<usize>],
        multiplier: f64,
    ) -> Vec<u32> {
        neighbors
            .par_iter()
            .enumerate()
            .map(|(i, nn)| match normal_deviation(i, normals, nn) {
                Some(c) => 1 + (c * multiplier).floor() as u32,
                None => 0,
            })
            .collect()
    }

    fn descriptors(
        &self,
        points: &[[f64; 3]],
        normals: &[[f64; 3]],
        neighbors: &[Vec<usize>],
        curvatures: &[u32],
        frames: &[Se3],
        config: &DescriptorConfig,
    ) -> Vec<Descriptor> {
        let angle_scale = config.angle_bins as f64 / std::f64::consts::TAU;

        let per_point = neighbors
            .par_iter()
            .enumerate()
            .map(|(i, nn)| {
                let mut out = Vec::with_capacity(nn.len());
                if curvatures[i] != 0 {
                    let p_i = DVec3::from_array(points[i]);
                    for &j in nn.iter().filter(|&&j| j != i && curvatures[j] != 0) {
                        let delta = DVec3::from_array(points[j]) - p_i;

                        // the pair in the local frame of point i, rotated only
                        let q = frames[i].transform_vector(delta);
                        let alpha = (-q.z).atan2(q.y);

                        let normal_bin = 1 + (angle_between(&normals[i], &normals[j]) * angle_scale)
                            .floor() as u32;
                        let distance_bin =
                            1 + (delta.length() / config.radius * DISTANCE_BINS).floor() as u32;

                        out.push(Descriptor {
                            point_idx: i,
                            code: [curvatures[i], curvatures[j], normal_bin, distance_bin],
                            alpha,
                        });
                    }
                }
                if out.is_empty() {
                    out.push(Descriptor::sentinel(i));
                }
                out
            })
            .collect::<Vec<_>>();

        per_point.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::reference_frame;

    fn frames_of(points: &[[f64; 3]], normals: &[[f64; 3]]) -> Vec<Se3> {
        points
            .iter()
            .zip(normals.iter())
            .map(|(p, n)| reference_frame(DVec3::from_array(*p), DVec3::from_array(*n)))
            .collect()
    }

    #[test]
    fn test_curvature_classes() {
        let normals = vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let points = vec![[0.0; 3]; 4];
        let neighbors = vec![vec![0, 1], vec![0, 1], vec![0, 2], vec![3]];

        let classes = CurvatureExtractor.curvatures(&points, &normals, &neighbors, 10.0);

        // flat neighborhood
        assert_eq!(classes[0], 1);
        // 90 degrees between the normals: deviation 1.0
        assert_eq!(classes[2], 11);
        // isolated point
        assert_eq!(classes[3], 0);
    }

    #[test]
    fn test_descriptors_sentinel_for_isolated_point() {
        let points = vec![[0.0, 0.0, 0.0], [0.06, 0.0, 0.0], [5.0, 5.0, 5.0]];
        let normals = vec![[0.0, 0.0, 1.0]; 3];
        let neighbors = vec![vec![0, 1], vec![0, 1], vec![2]];
        let curvatures = CurvatureExtractor.curvatures(&points, &normals, &neighbors, 10.0);
        let frames = frames_of(&points, &normals);
        let config = DescriptorConfig {
            angle_bins: 31,
            radius: 0.1,
        };

        let descriptors = CurvatureExtractor.descriptors(
            &points,
            &normals,
            &neighbors,
            &curvatures,
            &frames,
            &config,
        );

        assert_eq!(descriptors.len(), 3);
        assert!(descriptors[0].is_valid());
        assert_eq!(descriptors[0].point_idx, 0);
        assert_eq!(descriptors[1].point_idx, 1);
        assert_eq!(descriptors[2], Descriptor::sentinel(2));
        assert!(!descriptors[2].is_valid());

        // same curvature, parallel normals, distance bin 1 + floor(0.6 * 8)
        assert_eq!(descriptors[0].code, [1, 1, 1, 5]);
    }

    #[test]
    fn test_descriptors_rotation_invariant() {
        let points = vec![[0.0, 0.0, 0.0], [0.05, 0.02, 0.0], [0.0, 0.06, 0.01]];
        let normals = vec![[0.0, 0.0, 1.0], [0.0, 0.28, 0.96], [0.352, 0.0, 0.936]];
        let neighbors = vec![vec![0, 1, 2]; 3];
        let config = DescriptorConfig {
            angle_bins: 31,
            radius: 0.1,
        };

        let extract = |points: &[[f64; 3]], normals: &[[f64; 3]]| {
            let curvatures = CurvatureExtractor.curvatures(points, normals, &neighbors, 10.0);
            let frames = frames_of(points, normals);
            CurvatureExtractor.descriptors(
                points,
                normals,
                &neighbors,
                &curvatures,
                &frames,
                &config,
            )
        };

        let moved = Se3::from_axis_angle(DVec3::new(0.3, 1.0, -0.2), 0.9, DVec3::new(1.0, 2.0, 3.0));
        let moved_points = points
            .iter()
            .map(|p| moved.transform_point(DVec3::from_array(*p)).to_array())
            .collect::<Vec<_>>();
        let moved_normals = normals
            .iter()
            .map(|n| moved.transform_vector(DVec3::from_array(*n)).to_array())
            .collect::<Vec<_>>();

        let a = extract(&points, &normals);
        let b = extract(&moved_points, &moved_normals);
        assert_eq!(a.len(), b.len());
        for (da, db) in a.iter().zip(b.iter()) {
            assert_eq!(da.code, db.code);
        }
    }
}
