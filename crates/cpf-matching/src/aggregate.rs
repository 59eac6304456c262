use cpf_3d::Se3;
use glam::{DQuat, DVec3, DVec4};

use crate::MatchingError;

/// Combine the poses of a cluster into a single pose.
///
/// Translations are averaged arithmetically. Rotations are averaged on the quaternion
/// coefficients, each flipped to `w >= 0` first, and the mean is normalized. This is only
/// a good approximation while the rotations of the cluster are close to each other.
///
/// # Arguments
///
/// * `poses` - The cluster members.
/// * `invert` - Return the inverse of the averaged pose.
///
/// # Errors
///
/// [`MatchingError::EmptyCluster`] if `poses` is empty.
///
/// Example:
///
/// ```
/// use cpf_3d::Se3;
/// use cpf_matching::aggregate::combine_pose_cluster;
/// use glam::DVec3;
///
/// let poses = [
///     Se3::from_translation(DVec3::new(1.0, 0.0, 0.0)),
///     Se3::from_translation(DVec3::new(3.0, 0.0, 0.0)),
/// ];
/// let pose = combine_pose_cluster(&poses, false).unwrap();
/// assert_eq!(pose.translation, DVec3::new(2.0, 0.0, 0.0));
/// ```
pub fn combine_pose_cluster(poses: &[Se3], invert: bool) -> Result<Se3, MatchingError> {
    if poses.is_empty() {
        log::warn!("No poses given to combine");
        return Err(MatchingError::EmptyCluster);
    }

    let mut trans_avg = DVec3::ZERO;
    let mut rot_avg = DVec4::ZERO;
    for pose in poses {
        trans_avg += pose.translation;
        let q = pose.rotation;
        let coeffs = DVec4::new(q.x, q.y, q.z, q.w);
        rot_avg += if q.w < 0.0 { -coeffs } else { coeffs };
    }

    let count = poses.len() as f64;
    trans_avg /= count;
    rot_avg /= count;

    let rotation = match rot_avg.try_normalize() {
        Some(v) => DQuat::from_xyzw(v.x, v.y, v.z, v.w),
        None => DQuat::IDENTITY,
    };

    let pose = Se3::new(rotation, trans_avg);
    Ok(if invert { pose.inverse() } else { pose })
}
