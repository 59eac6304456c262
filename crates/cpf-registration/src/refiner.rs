use cpf_3d::{PointCloud, Se3};
use cpf_icp::{Icp, IcpError, IcpParams};

/// Output of a refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    /// Refined pose of the source in the target frame.
    pub pose: Se3,
    /// Residual error of the refined pose.
    pub residual: f64,
}

/// Local pose refinement, seeded with a detected pose.
pub trait Refiner {
    /// Apply the refinement settings. Returns whether they were already in range.
    fn configure(&mut self, params: &IcpParams) -> bool;

    /// Enable progress logging.
    fn set_verbose(&mut self, verbose: bool);

    /// Set the cloud the source is aligned to.
    fn set_target(&mut self, target: &PointCloud) -> Result<(), IcpError>;

    /// Refine the pose of `source` starting from `initial`.
    fn compute(&mut self, source: &PointCloud, initial: &Se3) -> Result<Refinement, IcpError>;
}

impl Refiner for Icp {
    fn configure(&mut self, params: &IcpParams) -> bool {
        self.set_params(params.clone())
    }

    fn set_verbose(&mut self, verbose: bool) {
        Icp::set_verbose(self, verbose);
    }

    fn set_target(&mut self, target: &PointCloud) -> Result<(), IcpError> {
        Icp::set_target(self, target)
    }

    fn compute(&mut self, source: &PointCloud, initial: &Se3) -> Result<Refinement, IcpError> {
        let result = Icp::compute(self, source, initial)?;
        log::debug!(
            "ICP refined the pose in {} iterations, rms {}",
            result.num_iterations,
            result.rms
        );
        Ok(Refinement {
            pose: result.pose,
            residual: result.rms,
        })
    }
}
