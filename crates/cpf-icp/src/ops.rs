use cpf_3d::{linalg::angle_between, Se3};
use glam::{DMat3, DVec3};
use kiddo::immutable::float::kdtree::ImmutableKdTree;

use crate::icp::RejectionMethod;

/// Matched point pairs of one ICP iteration.
#[derive(Debug, Default)]
pub(crate) struct Correspondences {
    pub points_in_src: Vec<[f64; 3]>,
    pub points_in_dst: Vec<[f64; 3]>,
    /// Squared distances between the matched points.
    pub distances: Vec<f64>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.points_in_src.len()
    }

    /// Root mean square distance of the accepted pairs.
    pub fn rms(&self) -> f64 {
        if self.distances.is_empty() {
            return f64::INFINITY;
        }
        (self.distances.iter().sum::<f64>() / self.distances.len() as f64).sqrt()
    }
}

/// Outlier rejection thresholds resolved for one refinement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rejection {
    pub method: RejectionMethod,
    pub max_distance: f64,
    /// Maximum normal deviation in radians.
    pub max_angle: f64,
}

impl Rejection {
    fn accepts(&self, distance_sq: f64, normals: Option<(&[f64; 3], &[f64; 3])>) -> bool {
        let distance_ok = || distance_sq <= self.max_distance * self.max_distance;
        // without normals on both sides the angle test cannot reject
        let angle_ok = || match normals {
            Some((a, b)) => angle_between(a, b) <= self.max_angle,
            None => true,
        };
        match self.method {
            RejectionMethod::None => true,
            RejectionMethod::Distance => distance_ok(),
            RejectionMethod::Angle => angle_ok(),
            RejectionMethod::DistanceAngle => distance_ok() && angle_ok(),
        }
    }
}

/// Pair every source point with its nearest target point and drop the outliers.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    source_normals: Option<&[[f64; 3]]>,
    target: &[[f64; 3]],
    target_normals: Option<&[[f64; 3]]>,
    kdtree: &ImmutableKdTree<f64, u32, 3, 32>,
    rejection: &Rejection,
) -> Correspondences {
    let mut res = Correspondences::default();

    for (i, p) in source.iter().enumerate() {
        let nn = kdtree.nearest_one::<kiddo::SquaredEuclidean>(p);
        let j = nn.item as usize;

        let normals = match (source_normals, target_normals) {
            (Some(src), Some(dst)) => Some((&src[i], &dst[j])),
            _ => None,
        };
        if !rejection.accepts(nn.distance, normals) {
            continue;
        }

        res.points_in_src.push(*p);
        res.points_in_dst.push(target[j]);
        res.distances.push(nn.distance);
    }

    res
}

/// Compute the centroids of two sets of points.
pub(crate) fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> (DVec3, DVec3) {
    let mut centroid1 = DVec3::ZERO;
    let mut centroid2 = DVec3::ZERO;

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        centroid1 += DVec3::from_array(*p1);
        centroid2 += DVec3::from_array(*p2);
    }

    centroid1 /= points1.len() as f64;
    centroid2 /= points2.len() as f64;

    (centroid1, centroid2)
}

fn to_dmat3(m: faer::MatRef<'_, f64>) -> DMat3 {
    // glam matrices are column major
    DMat3::from_cols_array(&std::array::from_fn(|k| m.read(k % 3, k / 3)))
}

/// Compute the rigid transformation that best maps `points_in_src` onto `points_in_dst`.
///
/// Least-squares fit of Arun et al.: with `H = Σ (src - src_mean) (dst - dst_mean)^T = U S V^T`
/// the rotation is `R = V U^T`, reflection corrected, and `t = dst_mean - R src_mean`.
///
/// PRECONDITION: both slices have the same length, at least 3.
pub fn fit_transformation(points_in_src: &[[f64; 3]], points_in_dst: &[[f64; 3]]) -> Se3 {
    assert_eq!(points_in_src.len(), points_in_dst.len());
    assert!(
        points_in_src.len() >= 3,
        "Need at least 3 points for transformation estimation"
    );

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);

    // compute covariance matrix H = Σ[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = DMat3::ZERO;
    for (p_in_src, p_in_dst) in points_in_src.iter().zip(points_in_dst.iter()) {
        let src_centered = DVec3::from_array(*p_in_src) - src_centroid;
        let dst_centered = DVec3::from_array(*p_in_dst) - dst_centroid;
        h += DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        );
    }

    let h_mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| h.col(j)[i]);
    let svd = h_mat.svd();
    let u = to_dmat3(svd.u());
    let mut v = to_dmat3(svd.v());

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        v.z_axis = -v.z_axis;
        r = v * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    Se3::from_rotation_matrix(&r, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cpf_3d::linalg::transform_points;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn create_random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
        (0..num_points)
            .map(|_| {
                [
                    rng.random::<f64>(),
                    rng.random::<f64>(),
                    rng.random::<f64>(),
                ]
            })
            .collect()
    }

    fn keep_all() -> Rejection {
        Rejection {
            method: RejectionMethod::None,
            max_distance: 0.0,
            max_angle: 0.0,
        }
    }

    #[test]
    fn test_compute_centroids() {
        let points1 = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let points2 = vec![[7.0, 8.0, 9.0], [10.0, 11.0, 12.0]];
        let (centroid1, centroid2) = compute_centroids(&points1, &points2);
        assert_relative_eq!(centroid1.x, 2.5);
        assert_relative_eq!(centroid1.y, 3.5);
        assert_relative_eq!(centroid1.z, 4.5);
        assert_relative_eq!(centroid2.x, 8.5);
        assert_relative_eq!(centroid2.y, 9.5);
        assert_relative_eq!(centroid2.z, 10.5);
    }

    #[test]
    fn test_fit_transformation_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = create_random_points(&mut rng, 30);

        let fitted = fit_transformation(&points, &points);

        assert!(fitted.rotation_angle_to(&Se3::IDENTITY) < 1e-6);
        assert!(fitted.translation.length() < 1e-9);
    }

    #[test]
    fn test_fit_transformation_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let points_src = create_random_points(&mut rng, 30);

        for _ in 0..10 {
            let axis = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.1..1.0),
            );
            let expected = Se3::from_axis_angle(
                axis,
                rng.random_range(-1.5..1.5),
                DVec3::new(
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                    rng.random_range(-0.5..0.5),
                ),
            );

            let mut points_dst = vec![[0.0; 3]; points_src.len()];
            transform_points(&points_src, &expected, &mut points_dst);

            let fitted = fit_transformation(&points_src, &points_dst);

            assert!(fitted.rotation_angle_to(&expected) < 1e-6);
            assert_relative_eq!(
                fitted.translation_distance(&expected),
                0.0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_find_correspondences() {
        let points_src = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let points_dst = vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];

        let kdtree = ImmutableKdTree::new_from_slice(&points_dst);

        let res = find_correspondences(&points_src, None, &points_dst, None, &kdtree, &keep_all());

        assert_eq!(res.len(), 4);
        assert_eq!(res.distances, vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(res.points_in_dst[3], [1.0, 1.0, 0.0]);
        assert_relative_eq!(res.rms(), 0.5f64.sqrt());
    }

    #[test]
    fn test_find_correspondences_rejection() {
        let points_src = vec![[0.0, 0.0, 0.0], [1.0, 0.05, 0.0], [1.0, 1.0, 0.0]];
        let normals_src = vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let points_dst = vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let normals_dst = vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        let kdtree = ImmutableKdTree::new_from_slice(&points_dst);

        let mut rejection = Rejection {
            method: RejectionMethod::Distance,
            max_distance: 0.1,
            max_angle: 45f64.to_radians(),
        };
        let res = find_correspondences(
            &points_src,
            Some(&normals_src),
            &points_dst,
            Some(&normals_dst),
            &kdtree,
            &rejection,
        );
        // the first point is 1.0 away from its neighbor
        assert_eq!(res.points_in_src, vec![[1.0, 0.05, 0.0], [1.0, 1.0, 0.0]]);

        rejection.method = RejectionMethod::Angle;
        let res = find_correspondences(
            &points_src,
            Some(&normals_src),
            &points_dst,
            Some(&normals_dst),
            &kdtree,
            &rejection,
        );
        // the last point has a normal at 90 degrees from its neighbor
        assert_eq!(res.points_in_src, vec![[0.0, 0.0, 0.0], [1.0, 0.05, 0.0]]);

        rejection.method = RejectionMethod::DistanceAngle;
        let res = find_correspondences(
            &points_src,
            Some(&normals_src),
            &points_dst,
            Some(&normals_dst),
            &kdtree,
            &rejection,
        );
        assert_eq!(res.points_in_src, vec![[1.0, 0.05, 0.0]]);
    }
}
