use cpf_3d::DescriptorConfig;
use serde::{Deserialize, Serialize};

/// User facing matching parameters.
///
/// Angles are given in degrees. Values are clamped by [`CpfParams::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpfParams {
    /// Angle discretization step in degrees, in `[1, 180]`.
    pub angle_step: f64,
    /// Neighborhood radius of the curvature and descriptor computation, in `[0.001, 10]`.
    pub search_radius: f64,
    /// Maximum translation distance between two poses of one cluster, in `[0.0001, 100]`.
    pub cluster_trans_threshold: f64,
    /// Maximum rotation angle between two poses of one cluster in degrees, in `[0, 180]`.
    pub cluster_rot_threshold: f64,
    /// Curvature discretization multiplier, in `[1, 100]`.
    pub curvature_multiplier: f64,
    /// Enforce `cluster_rot_threshold` when clustering poses.
    pub cluster_rotation_check: bool,
}

impl Default for CpfParams {
    fn default() -> Self {
        Self {
            angle_step: 12.0,
            search_radius: 0.1,
            cluster_trans_threshold: 0.03,
            cluster_rot_threshold: 45.0,
            curvature_multiplier: 10.0,
            cluster_rotation_check: false,
        }
    }
}

impl CpfParams {
    /// Clamp every value to its safe range and derive the angle bin count.
    pub fn validate(&self) -> ValidatedParams {
        let angle_step = self.angle_step.clamp(1.0, 180.0);
        let cluster_rot_threshold = self.cluster_rot_threshold.clamp(0.0, 180.0);

        ValidatedParams {
            angle_step,
            search_radius: self.search_radius.clamp(0.001, 10.0),
            cluster_trans_threshold: self.cluster_trans_threshold.clamp(0.0001, 100.0),
            cluster_rot_threshold: cluster_rot_threshold.to_radians(),
            curvature_multiplier: self.curvature_multiplier.clamp(1.0, 100.0),
            cluster_rotation_check: self.cluster_rotation_check,
            angle_bins: angle_bins(angle_step),
        }
    }

    /// Whether every value already lies in its accepted range.
    pub fn is_valid(&self) -> bool {
        let in_range = |v: f64, lo: f64, hi: f64| (lo..=hi).contains(&v);
        in_range(self.angle_step, 1.0, 180.0)
            && in_range(self.search_radius, 0.001, 10.0)
            && in_range(self.cluster_trans_threshold, 0.0001, 100.0)
            && in_range(self.cluster_rot_threshold, 0.0, 180.0)
            && in_range(self.curvature_multiplier, 1.0, 100.0)
    }
}

/// Number of angle bins for an angle step in degrees: `floor(2π / step) + 1`.
pub fn angle_bins(angle_step_deg: f64) -> usize {
    (std::f64::consts::TAU / angle_step_deg.to_radians()).floor() as usize + 1
}

/// Parameters after clamping, as used by the matcher.
///
/// The angle bin count is always derived from the angle step and cannot be set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParams {
    /// Angle step in degrees.
    pub angle_step: f64,
    /// Neighborhood radius.
    pub search_radius: f64,
    /// Cluster translation threshold.
    pub cluster_trans_threshold: f64,
    /// Cluster rotation threshold in radians.
    pub cluster_rot_threshold: f64,
    /// Curvature discretization multiplier.
    pub curvature_multiplier: f64,
    /// Enforce the rotation threshold when clustering.
    pub cluster_rotation_check: bool,
    angle_bins: usize,
}

impl ValidatedParams {
    /// Number of angle bins.
    #[inline]
    pub fn angle_bins(&self) -> usize {
        self.angle_bins
    }

    /// Settings handed to the descriptor extractor.
    pub fn descriptor_config(&self) -> DescriptorConfig {
        DescriptorConfig {
            angle_bins: self.angle_bins,
            radius: self.search_radius,
        }
    }
}

impl Default for ValidatedParams {
    fn default() -> Self {
        CpfParams::default().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_params() {
        let params = ValidatedParams::default();
        assert_eq!(params.angle_bins(), angle_bins(12.0));
        assert!((30..=31).contains(&params.angle_bins()));
        assert!(CpfParams::default().is_valid());
    }

    #[test]
    fn test_angle_bins_derived() {
        for step in [1.0, 7.0, 12.0, 45.0, 90.0, 180.0] {
            let params = CpfParams {
                angle_step: step,
                ..Default::default()
            }
            .validate();
            let expected = (std::f64::consts::TAU / f64::to_radians(step)).floor() as usize + 1;
            assert_eq!(params.angle_bins(), expected);
        }
        assert_eq!(angle_bins(7.0), 52);
    }

    #[test]
    fn test_clamping() {
        let params = CpfParams {
            angle_step: 0.0,
            search_radius: 20.0,
            cluster_trans_threshold: 0.0,
            cluster_rot_threshold: 360.0,
            curvature_multiplier: 1000.0,
            cluster_rotation_check: true,
        };
        assert!(!params.is_valid());

        let validated = params.validate();
        assert_eq!(validated.angle_step, 1.0);
        assert_eq!(validated.search_radius, 10.0);
        assert_eq!(validated.cluster_trans_threshold, 0.0001);
        assert_relative_eq!(validated.cluster_rot_threshold, std::f64::consts::PI);
        assert_eq!(validated.curvature_multiplier, 100.0);
        assert_eq!(validated.angle_bins(), angle_bins(1.0));
    }

    #[test]
    fn test_params_from_json() -> Result<(), Box<dyn std::error::Error>> {
        let params: CpfParams = serde_json::from_str(r#"{ "angle_step": 7.0 }"#)?;
        assert_eq!(params.angle_step, 7.0);
        assert_eq!(params.search_radius, 0.1);
        assert_eq!(params.validate().angle_bins(), 52);
        Ok(())
    }
}
