use glam::{DQuat, DVec3};

use crate::se3::Se3;

/// Compute the local reference frame of an oriented point.
///
/// The returned transform moves `point` to the origin and rotates `normal` onto the
/// +X axis, so that point pairs expressed in this frame only differ by a rotation
/// about X.
///
/// # Arguments
///
/// * `point` - The position of the oriented point.
/// * `normal` - The normal at the point. It does not need to be normalized.
///
/// # Returns
///
/// The transform from the cloud frame into the local frame. A zero normal yields the
/// pure translation `-point`.
///
/// Example:
///
/// ```
/// use cpf_3d::transforms::reference_frame;
/// use glam::DVec3;
///
/// let frame = reference_frame(DVec3::new(1.0, 2.0, 3.0), DVec3::Z);
/// let origin = frame.transform_point(DVec3::new(1.0, 2.0, 3.0));
/// assert!(origin.length() < 1e-12);
/// ```
pub fn reference_frame(point: DVec3, normal: DVec3) -> Se3 {
    let rotation = match normal.try_normalize() {
        Some(n) => DQuat::from_rotation_arc(n, DVec3::X),
        None => DQuat::IDENTITY,
    };
    Se3::new(rotation, -(rotation * point))
}

/// Rotation about the X axis, the canonical axis of the reference frames.
pub fn rotation_about_x(angle: f64) -> Se3 {
    Se3::new(DQuat::from_rotation_x(angle), DVec3::ZERO)
}
