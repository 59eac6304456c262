use std::ops::Mul;

use glam::{DMat3, DMat4, DQuat, DVec3, DVec4};

/// A rigid body transform: rotation followed by translation.
///
/// Applied to a point `p` it yields `rotation * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Se3 {
    /// Unit quaternion holding the rotation.
    pub rotation: DQuat,
    /// Translation applied after the rotation.
    pub translation: DVec3,
}

impl Default for Se3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Se3 {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from a rotation and a translation.
    pub fn new(rotation: DQuat, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(DQuat::IDENTITY, translation)
    }

    /// Create a transform from an axis-angle rotation and a translation.
    ///
    /// The axis does not need to be normalized.
    pub fn from_axis_angle(axis: DVec3, angle: f64, translation: DVec3) -> Self {
        let rotation = DQuat::from_axis_angle(axis.normalize(), angle);
        Self::new(rotation, translation)
    }

    /// Create a transform from a rotation matrix and a translation.
    pub fn from_rotation_matrix(rotation: &DMat3, translation: DVec3) -> Self {
        Self::new(DQuat::from_mat3(rotation).normalize(), translation)
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        let inv_trans = -(inv_rot * self.translation);
        Self::new(inv_rot, inv_trans)
    }

    /// Compose `self * other`, i.e. apply `other` first and then `self`.
    pub fn compose(&self, other: &Se3) -> Self {
        let new_rotation = (self.rotation * other.rotation).normalize();
        let new_translation = self.translation + (self.rotation * other.translation);
        Self::new(new_rotation, new_translation)
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Rotate a direction, ignoring the translation.
    #[inline]
    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.rotation * vector
    }

    /// The rotation as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }

    /// The transform as a homogeneous 4x4 matrix.
    pub fn as_matrix(&self) -> DMat4 {
        let mut matrix = DMat4::from_quat(self.rotation);
        matrix.w_axis = DVec4::new(
            self.translation.x,
            self.translation.y,
            self.translation.z,
            1.0,
        );
        matrix
    }

    /// Distance between the translations of two transforms.
    #[inline]
    pub fn translation_distance(&self, other: &Se3) -> f64 {
        self.translation.distance(other.translation)
    }

    /// Angle in radians of the relative rotation between two transforms.
    #[inline]
    pub fn rotation_angle_to(&self, other: &Se3) -> f64 {
        self.rotation.angle_between(other.rotation).abs()
    }
}

impl Mul for Se3 {
    type Output = Se3;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: DVec3, b: DVec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-12);
    }

    #[test]
    fn test_identity() {
        let p = DVec3::new(1.0, -2.0, 3.0);
        assert_eq!(Se3::IDENTITY.transform_point(p), p);
        assert_eq!(Se3::default(), Se3::IDENTITY);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Se3::from_axis_angle(DVec3::new(1.0, 1.0, 0.0), 0.7, DVec3::new(0.1, -0.4, 2.0));
        let p = DVec3::new(0.3, 0.2, -1.0);
        assert_vec_eq(t.inverse().transform_point(t.transform_point(p)), p);

        let identity = t * t.inverse();
        assert_vec_eq(identity.translation, DVec3::ZERO);
        assert!(identity.rotation_angle_to(&Se3::IDENTITY) < 1e-6);
    }

    #[test]
    fn test_compose_order() {
        let rot = Se3::from_axis_angle(DVec3::Z, std::f64::consts::FRAC_PI_2, DVec3::ZERO);
        let shift = Se3::from_translation(DVec3::new(1.0, 0.0, 0.0));

        // shift first, then rotate
        let p = (rot * shift).transform_point(DVec3::ZERO);
        assert_vec_eq(p, DVec3::new(0.0, 1.0, 0.0));

        // rotate first, then shift
        let p = (shift * rot).transform_point(DVec3::ZERO);
        assert_vec_eq(p, DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_as_matrix() {
        let t = Se3::from_axis_angle(DVec3::X, 0.3, DVec3::new(4.0, 5.0, 6.0));
        let m = t.as_matrix();
        let p = DVec3::new(1.0, 2.0, 3.0);
        assert_vec_eq(m.transform_point3(p), t.transform_point(p));

        let back = Se3::from_rotation_matrix(&t.rotation_matrix(), t.translation);
        assert!(back.rotation_angle_to(&t) < 1e-6);
    }
}
