use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use cpf_3d::{PointCloud, Se3};
use cpf_icp::Icp;
use cpf_matching::CpfMatcher;

use crate::{params::RegistrationParams, refiner::Refiner, RegistrationError};

/// RMS reported before the first refinement.
const INITIAL_RMS: f64 = 100_000.0;

/// Lifecycle of a registration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No reference model yet.
    Empty,
    /// A reference model is loaded, no scene yet.
    ModelLoaded {
        /// Id of the model in the matcher.
        model_id: usize,
    },
    /// Model and scene are set, `process` can run.
    SceneReady {
        /// Id of the model in the matcher.
        model_id: usize,
    },
    /// `process` is running.
    Matching {
        /// Id of the model in the matcher.
        model_id: usize,
    },
}

impl SessionState {
    /// The id of the loaded model, if any.
    pub fn model_id(&self) -> Option<usize> {
        match *self {
            SessionState::Empty => None,
            SessionState::ModelLoaded { model_id }
            | SessionState::SceneReady { model_id }
            | SessionState::Matching { model_id } => Some(model_id),
        }
    }
}

/// Single-flight flag guarding [`Registration::process`].
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ProcessFlag(Arc<AtomicBool>);

impl ProcessFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag if it is clear. The returned guard clears it again on drop.
    pub fn try_acquire(&self) -> Option<ProcessGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessGuard(self.0.clone()))
    }

    /// Whether the flag is set.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds a [`ProcessFlag`] set until dropped.
#[derive(Debug)]
pub struct ProcessGuard(Arc<AtomicBool>);

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Result of a successful [`Registration::process`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome {
    /// The best detected pose was refined.
    Refined {
        /// Votes of the detected pose.
        votes: u32,
        /// Residual of the refinement.
        rms: f64,
    },
    /// Matching produced no pose; the session pose is unchanged.
    NoPose,
}

/// A registration session: one reference model, one scene.
///
/// `process` detects the model in the scene with the CPF matcher and refines the best
/// pose with the refiner `R`.
pub struct Registration<R = Icp> {
    matcher: CpfMatcher,
    refiner: R,
    params: RegistrationParams,
    state: SessionState,
    model: Option<PointCloud>,
    scene: Option<PointCloud>,
    pose: Se3,
    rms: f64,
    flag: ProcessFlag,
}

impl Registration {
    /// Create a session with the ICP refiner and default parameters.
    pub fn new() -> Self {
        Self::with_refiner(Icp::default())
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Refiner> Registration<R> {
    /// Create a session with a custom refiner and default parameters.
    pub fn with_refiner(refiner: R) -> Self {
        let mut session = Self {
            matcher: CpfMatcher::new(),
            refiner,
            params: RegistrationParams::default(),
            state: SessionState::Empty,
            model: None,
            scene: None,
            pose: Se3::IDENTITY,
            rms: INITIAL_RMS,
            flag: ProcessFlag::new(),
        };
        session.set_params(RegistrationParams::default());
        session
    }

    /// Add the reference model and start its descriptor extraction.
    ///
    /// Only one model per session: a second call fails without touching the first model.
    pub fn add_reference_model(
        &mut self,
        cloud: &PointCloud,
        label: &str,
    ) -> Result<usize, RegistrationError> {
        if let Some(model_id) = self.state.model_id() {
            log::error!("Reference model {} already loaded, rejecting {}", model_id, label);
            return Err(RegistrationError::ModelAlreadyLoaded { model_id });
        }

        let model_id = self.matcher.add_model(cloud, label)?;
        self.model = Some(cloud.clone());
        self.state = match self.scene {
            Some(_) => SessionState::SceneReady { model_id },
            None => SessionState::ModelLoaded { model_id },
        };

        Ok(model_id)
    }

    /// Set or replace the scene and start its descriptor extraction.
    pub fn update_scene(&mut self, cloud: &PointCloud) -> Result<(), RegistrationError> {
        self.matcher.set_scene(cloud)?;
        self.scene = Some(cloud.clone());
        if let SessionState::ModelLoaded { model_id } = self.state {
            self.state = SessionState::SceneReady { model_id };
        }
        Ok(())
    }

    /// Detect the model in the scene and refine the best pose.
    ///
    /// Fails with [`RegistrationError::NoModel`] without a model and with
    /// [`RegistrationError::AlreadyProcessing`] while another call holds the process flag.
    /// The flag is cleared on every return path.
    pub fn process(&mut self) -> Result<ProcessOutcome, RegistrationError> {
        let Some(model_id) = self.state.model_id() else {
            log::error!("Cannot process without a reference model");
            return Err(RegistrationError::NoModel);
        };
        let Some(_guard) = self.flag.try_acquire() else {
            log::warn!("Registration is already processing");
            return Err(RegistrationError::AlreadyProcessing);
        };

        let summary = self.matcher.match_model(model_id)?;
        let best = self
            .matcher
            .poses(model_id)
            .and_then(|(poses, votes)| Some((*poses.first()?, *votes.first()?)));

        let (Some((initial, votes)), Some(scene), Some(model)) =
            (best, self.scene.as_ref(), self.model.as_ref())
        else {
            if self.params.verbose {
                log::info!(
                    "No pose found: {} candidates, {} clusters",
                    summary.num_candidates,
                    summary.num_clusters
                );
            }
            return Ok(ProcessOutcome::NoPose);
        };

        // the refiner aligns the model to the scene snapshot, seeded with the best pose
        self.refiner.set_target(scene)?;
        let refined = self.refiner.compute(model, &initial)?;

        self.pose = refined.pose;
        self.rms = refined.residual;

        if self.params.verbose {
            log::info!("Registered with {} votes, rms {}", votes, self.rms);
        }

        Ok(ProcessOutcome::Refined {
            votes,
            rms: self.rms,
        })
    }

    /// Move the model back to its start: identity pose, scene snapshot set to the model.
    pub fn reset(&mut self) -> Result<(), RegistrationError> {
        let model = self.model.as_ref().ok_or(RegistrationError::NoModel)?;
        self.pose = Se3::IDENTITY;
        self.scene = Some(model.clone());
        Ok(())
    }

    /// Forward the parameters to the matcher and the refiner.
    ///
    /// Clamped values are applied in any case. Returns whether `params` was already valid.
    pub fn set_params(&mut self, params: RegistrationParams) -> bool {
        let valid = params.valid();

        self.matcher.set_params(params.cpf_params());
        self.matcher.set_verbose(params.verbose, 1);
        self.refiner.configure(&params.icp_params());

        self.params = params;
        valid
    }

    /// Enable progress logging in both stages.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.params.verbose = verbose;
        self.matcher.set_verbose(verbose, 1);
        self.refiner.set_verbose(verbose);
    }

    /// The parameters as given to [`Registration::set_params`].
    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    /// The session state. Reports [`SessionState::Matching`] while the process flag is set.
    pub fn state(&self) -> SessionState {
        match self.state.model_id() {
            Some(model_id) if self.flag.is_set() => SessionState::Matching { model_id },
            _ => self.state,
        }
    }

    /// A handle on the process flag.
    pub fn process_flag(&self) -> ProcessFlag {
        self.flag.clone()
    }

    /// The underlying matcher.
    pub fn matcher(&self) -> &CpfMatcher {
        &self.matcher
    }

    /// The reference model cloud.
    pub fn model_cloud(&self) -> Option<&PointCloud> {
        self.model.as_ref()
    }

    /// The scene snapshot the refiner aligns to.
    pub fn scene_cloud(&self) -> Option<&PointCloud> {
        self.scene.as_ref()
    }

    /// Detected poses of the last `process` call, highest voted first, with their votes.
    pub fn poses(&self) -> (&[Se3], &[u32]) {
        self.state
            .model_id()
            .and_then(|id| self.matcher.poses(id))
            .unwrap_or((&[], &[]))
    }

    /// The refined pose.
    pub fn icp_pose(&self) -> Se3 {
        self.pose
    }

    /// Residual of the last refinement.
    pub fn rms(&self) -> f64 {
        self.rms
    }

    /// Number of pose clusters of the last `process` call.
    pub fn num_pose_clusters(&self) -> usize {
        self.state
            .model_id()
            .and_then(|id| self.matcher.num_pose_clusters(id))
            .unwrap_or(0)
    }

    /// `(model point, scene point)` pairs behind the cluster at `rank`, 0 being the most voted.
    pub fn pose_cluster_pairs(&self, rank: usize) -> Option<Vec<(usize, usize)>> {
        self.matcher.pose_cluster_pairs(self.state.model_id()?, rank)
    }

    /// Curvature classes of the model.
    pub fn model_curvatures(&self) -> Option<&[u32]> {
        self.matcher.model_curvatures(self.state.model_id()?)
    }

    /// Curvature classes of the scene.
    pub fn scene_curvatures(&self) -> Option<&[u32]> {
        self.matcher.scene_curvatures()
    }
}
