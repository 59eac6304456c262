use cpf_icp::{IcpParams, RejectionMethod};
use cpf_matching::CpfParams;
use serde::{Deserialize, Serialize};

/// Parameters of a registration session, covering both detection and refinement.
///
/// Missing fields take their default value when deserialized:
///
/// ```
/// use cpf_registration::RegistrationParams;
///
/// let params: RegistrationParams = serde_json::from_str(r#"{ "angle_step": 7.0 }"#).unwrap();
/// assert_eq!(params.angle_step, 7.0);
/// assert_eq!(params.icp_num_max_iterations, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    /// Descriptor angle step in degrees.
    pub angle_step: f64,
    /// Neighborhood radius of the curvature and descriptor computation.
    pub curvature_search_radius: f64,
    /// Curvature discretization multiplier.
    pub curvature_multiplier: f64,
    /// Cluster translation threshold.
    pub cluster_trans_threshold: f64,
    /// Cluster rotation threshold in degrees.
    pub cluster_rot_threshold: f64,
    /// Enforce the cluster rotation threshold.
    pub cluster_rotation_check: bool,
    /// ICP termination threshold on the RMS error.
    pub icp_termination_dist: f64,
    /// Maximum number of ICP iterations.
    pub icp_num_max_iterations: usize,
    /// ICP outlier rejection angle in degrees.
    pub icp_outlier_reject_angle: f64,
    /// ICP outlier rejection distance.
    pub icp_outlier_reject_distance: f64,
    /// ICP outlier rejection strategy.
    pub icp_rejection: RejectionMethod,
    /// Log progress of both stages.
    pub verbose: bool,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        let cpf = CpfParams::default();
        let icp = IcpParams::default();
        Self {
            angle_step: cpf.angle_step,
            curvature_search_radius: cpf.search_radius,
            curvature_multiplier: cpf.curvature_multiplier,
            cluster_trans_threshold: cpf.cluster_trans_threshold,
            cluster_rot_threshold: cpf.cluster_rot_threshold,
            cluster_rotation_check: cpf.cluster_rotation_check,
            icp_termination_dist: icp.min_error,
            icp_num_max_iterations: icp.max_iterations,
            icp_outlier_reject_angle: icp.reject_max_angle,
            icp_outlier_reject_distance: icp.reject_max_distance,
            icp_rejection: icp.rejection,
            verbose: false,
        }
    }
}

impl RegistrationParams {
    /// The matcher part.
    pub fn cpf_params(&self) -> CpfParams {
        CpfParams {
            angle_step: self.angle_step,
            search_radius: self.curvature_search_radius,
            cluster_trans_threshold: self.cluster_trans_threshold,
            cluster_rot_threshold: self.cluster_rot_threshold,
            curvature_multiplier: self.curvature_multiplier,
            cluster_rotation_check: self.cluster_rotation_check,
        }
    }

    /// The refiner part.
    pub fn icp_params(&self) -> IcpParams {
        IcpParams {
            min_error: self.icp_termination_dist,
            max_iterations: self.icp_num_max_iterations,
            reject_max_angle: self.icp_outlier_reject_angle,
            reject_max_distance: self.icp_outlier_reject_distance,
            rejection: self.icp_rejection,
            verbose: self.verbose,
        }
    }

    /// Whether every value already lies in its accepted range.
    pub fn valid(&self) -> bool {
        self.cpf_params().is_valid() && self.icp_params().is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = RegistrationParams::default();
        assert!(params.valid());
        assert_eq!(params.angle_step, 12.0);
        assert_eq!(params.curvature_search_radius, 0.1);
        assert_eq!(params.icp_termination_dist, 1e-8);
        assert_eq!(params.icp_outlier_reject_angle, 45.0);
        assert_eq!(params.icp_rejection, RejectionMethod::DistanceAngle);
    }

    #[test]
    fn test_split() {
        let params = RegistrationParams {
            angle_step: 7.0,
            icp_num_max_iterations: 20,
            ..Default::default()
        };
        assert_eq!(params.cpf_params().angle_step, 7.0);
        assert_eq!(params.icp_params().max_iterations, 20);

        let invalid = RegistrationParams {
            icp_outlier_reject_angle: -1.0,
            ..Default::default()
        };
        assert!(!invalid.valid());
    }
}
