use glam::DVec3;

use crate::se3::Se3;

/// Transform a set of points using a rigid transform.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_t_src` - The rigid transform from the source to the destination frame.
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated vector of the same size as source.
///
/// Example:
///
/// ```
/// use cpf_3d::{linalg::transform_points, Se3};
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &Se3::IDENTITY, &mut dst_points);
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(src_points: &[[f64; 3]], dst_t_src: &Se3, dst_points: &mut [[f64; 3]]) {
    assert_eq!(src_points.len(), dst_points.len());

    for (dst, src) in dst_points.iter_mut().zip(src_points.iter()) {
        *dst = dst_t_src.transform_point(DVec3::from_array(*src)).to_array();
    }
}

/// Rotate a set of direction vectors (e.g. normals), ignoring the translation.
///
/// PRECONDITION: dst_vectors is a pre-allocated vector of the same size as source.
pub fn rotate_vectors(src_vectors: &[[f64; 3]], dst_t_src: &Se3, dst_vectors: &mut [[f64; 3]]) {
    assert_eq!(src_vectors.len(), dst_vectors.len());

    for (dst, src) in dst_vectors.iter_mut().zip(src_vectors.iter()) {
        *dst = dst_t_src.transform_vector(DVec3::from_array(*src)).to_array();
    }
}

/// Angle in radians between two direction vectors.
///
/// Returns `0.0` if either vector has zero length.
pub fn angle_between(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let a = DVec3::from_array(*a);
    let b = DVec3::from_array(*b);
    let denom = a.length() * b.length();
    if denom < 1e-12 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}
