use cpf_3d::{
    linalg::{rotate_vectors, transform_points},
    PointCloud, Se3,
};
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use serde::{Deserialize, Serialize};

use crate::{
    ops::{find_correspondences, fit_transformation, Rejection},
    IcpError,
};

/// Strategy used to discard correspondences before fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionMethod {
    /// Keep every nearest-neighbor pair.
    None,
    /// Drop pairs farther apart than `reject_max_distance`.
    Distance,
    /// Drop pairs whose normals deviate more than `reject_max_angle`.
    Angle,
    /// Apply both the distance and the angle test.
    #[default]
    DistanceAngle,
}

/// Configuration of the ICP refiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Termination threshold on the RMS error and on its change between iterations.
    pub min_error: f64,
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Maximum angle between matched normals, in degrees.
    pub reject_max_angle: f64,
    /// Maximum distance between matched points.
    pub reject_max_distance: f64,
    /// Outlier rejection strategy.
    pub rejection: RejectionMethod,
    /// Log per-iteration progress.
    pub verbose: bool,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            min_error: 1e-8,
            max_iterations: 200,
            reject_max_angle: 45.0,
            reject_max_distance: 0.1,
            rejection: RejectionMethod::DistanceAngle,
            verbose: false,
        }
    }
}

impl IcpParams {
    const MIN_ERROR_RANGE: (f64, f64) = (0.0, 1.0);
    const MAX_ITERATIONS_RANGE: (usize, usize) = (1, 10_000);
    const ANGLE_RANGE: (f64, f64) = (0.0, 180.0);
    const DISTANCE_RANGE: (f64, f64) = (0.0, 100.0);

    /// Whether every value already lies in its accepted range.
    pub fn is_valid(&self) -> bool {
        self == &self.clamped()
    }

    /// Return a copy with every value clamped to its accepted range.
    pub fn clamped(&self) -> Self {
        Self {
            min_error: self
                .min_error
                .clamp(Self::MIN_ERROR_RANGE.0, Self::MIN_ERROR_RANGE.1),
            max_iterations: self
                .max_iterations
                .clamp(Self::MAX_ITERATIONS_RANGE.0, Self::MAX_ITERATIONS_RANGE.1),
            reject_max_angle: self
                .reject_max_angle
                .clamp(Self::ANGLE_RANGE.0, Self::ANGLE_RANGE.1),
            reject_max_distance: self
                .reject_max_distance
                .clamp(Self::DISTANCE_RANGE.0, Self::DISTANCE_RANGE.1),
            rejection: self.rejection,
            verbose: self.verbose,
        }
    }
}

/// Result of one ICP refinement.
///
/// The pose maps the source cloud into the target frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpResult {
    /// Refined pose.
    pub pose: Se3,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Last computed RMS error of the accepted correspondences.
    pub rms: f64,
}

struct Target {
    points: Vec<[f64; 3]>,
    normals: Option<Vec<[f64; 3]>>,
    kdtree: ImmutableKdTree<f64, u32, 3, 32>,
}

/// Point-to-point Iterative Closest Point refiner.
///
/// The target cloud is indexed once by [`Icp::set_target`] and reused by every
/// subsequent [`Icp::compute`] call.
#[derive(Default)]
pub struct Icp {
    params: IcpParams,
    target: Option<Target>,
}

impl Icp {
    /// Create a refiner with the given parameters, clamped to their valid ranges.
    pub fn new(params: IcpParams) -> Self {
        Self {
            params: params.clamped(),
            target: None,
        }
    }

    /// The active parameters.
    pub fn params(&self) -> &IcpParams {
        &self.params
    }

    /// Replace the parameters.
    ///
    /// Clamped values are always applied. Returns whether `params` was already valid.
    pub fn set_params(&mut self, params: IcpParams) -> bool {
        let valid = params.is_valid();
        if !valid {
            log::warn!("ICP parameters out of range, clamping: {:?}", params);
        }
        self.params = params.clamped();
        valid
    }

    /// Enable per-iteration logging.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.params.verbose = verbose;
    }

    /// Whether a target cloud is set.
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Set the cloud the source is aligned to and index it.
    ///
    /// Normals are used for angle rejection when they match the points one to one.
    pub fn set_target(&mut self, target: &PointCloud) -> Result<(), IcpError> {
        if target.is_empty() {
            log::error!("ICP target point cloud is empty");
            return Err(IcpError::InvalidCloud(cpf_3d::PointCloudError::Empty));
        }

        // build kdtree for target points to speed up the nearest neighbor search
        let kdtree = ImmutableKdTree::new_from_slice(target.points());
        self.target = Some(Target {
            points: target.points().clone(),
            normals: target.oriented().ok().map(|n| n.to_vec()),
            kdtree,
        });
        Ok(())
    }

    /// Align `source` to the target starting from `initial`.
    ///
    /// # Arguments
    ///
    /// * `source` - The cloud to move.
    /// * `initial` - Initial pose of the source in the target frame.
    ///
    /// # Returns
    ///
    /// The refined pose and the final RMS error.
    pub fn compute(&self, source: &PointCloud, initial: &Se3) -> Result<IcpResult, IcpError> {
        let target = self.target.as_ref().ok_or(IcpError::NoTarget)?;
        if source.is_empty() {
            return Err(IcpError::EmptySource);
        }

        let rejection = Rejection {
            method: self.params.rejection,
            max_distance: self.params.reject_max_distance,
            max_angle: self.params.reject_max_angle.to_radians(),
        };

        let mut result = IcpResult {
            pose: *initial,
            num_iterations: 0,
            rms: f64::INFINITY,
        };

        // move the source into the target frame using the initial pose
        let mut current_points = vec![[0.0; 3]; source.len()];
        transform_points(source.points(), initial, &mut current_points);
        let mut current_normals = source.oriented().ok().map(|normals| {
            let mut dst = vec![[0.0; 3]; normals.len()];
            rotate_vectors(normals, initial, &mut dst);
            dst
        });

        let mut next_points = vec![[0.0; 3]; source.len()];

        for i in 0..self.params.max_iterations {
            let matches = find_correspondences(
                &current_points,
                current_normals.as_deref(),
                &target.points,
                target.normals.as_deref(),
                &target.kdtree,
                &rejection,
            );

            if matches.len() < 3 {
                if i == 0 {
                    log::error!(
                        "ICP found {} correspondences, cannot fit a transformation",
                        matches.len()
                    );
                    return Err(IcpError::InsufficientCorrespondences(matches.len()));
                }
                log::warn!(
                    "ICP lost its correspondences at iteration {}, keeping the last pose",
                    i
                );
                break;
            }

            let delta = fit_transformation(&matches.points_in_src, &matches.points_in_dst);

            // the increment is expressed in the target frame: apply it after the current pose
            result.pose = delta * result.pose;
            transform_points(&current_points, &delta, &mut next_points);
            std::mem::swap(&mut current_points, &mut next_points);
            if let Some(normals) = current_normals.as_mut() {
                let rotated = normals.clone();
                rotate_vectors(&rotated, &delta, normals);
            }

            let rms = matches.rms();
            result.num_iterations += 1;

            if self.params.verbose {
                log::debug!(
                    "ICP iteration {}: {} correspondences, rms {}",
                    i,
                    matches.len(),
                    rms
                );
            }

            let converged =
                rms < self.params.min_error || (result.rms - rms).abs() < self.params.min_error;
            result.rms = rms;
            if converged {
                log::debug!("ICP converged in {} iterations with error {}", i + 1, rms);
                break;
            }
        }

        Ok(result)
    }
}
