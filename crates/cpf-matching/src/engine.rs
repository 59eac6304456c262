use cpf_3d::{
    CurvatureExtractor, Descriptor, DescriptorExtractor, KdTreeIndex, PointCloud, Se3,
    SpatialIndex,
};

use crate::{
    aggregate::combine_pose_cluster,
    clustering::{cluster_poses, ClusterCriteria, ClusteringError},
    params::{CpfParams, ValidatedParams},
    result::{MatchSummary, MatchingData},
    voting::{vote, VoteCloud},
    working_set::WorkingSet,
    MatchingError,
};

/// Maximum number of clusters aggregated into final poses per match.
pub const MAX_POSE_HITS: usize = 12;

/// A registered reference model.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    /// Dense id, the index of the model in registration order.
    pub id: usize,
    /// User given label.
    pub label: String,
    /// Copy of the model cloud.
    pub cloud: PointCloud,
    /// Descriptors of the model.
    pub descriptors: Vec<Descriptor>,
    /// Curvature class of every point.
    pub curvatures: Vec<u32>,
    frames: Vec<Se3>,
}

/// The active scene.
#[derive(Debug, Clone)]
pub struct SceneState {
    /// Copy of the scene cloud.
    pub cloud: PointCloud,
    /// Descriptors of the scene.
    pub descriptors: Vec<Descriptor>,
    /// Curvature class of every point.
    pub curvatures: Vec<u32>,
    frames: Vec<Se3>,
}

struct Extraction {
    descriptors: Vec<Descriptor>,
    curvatures: Vec<u32>,
    frames: Vec<Se3>,
}

/// Detects registered models in a scene by voting with curvature point-pair features.
///
/// The spatial index and the descriptor extractor are pluggable through `I` and `E`.
///
/// Example:
///
/// ```
/// use cpf_3d::PointCloud;
/// use cpf_matching::CpfMatcher;
///
/// let points = vec![[0.0, 0.0, 0.0], [0.05, 0.0, 0.0], [0.0, 0.05, 0.0]];
/// let normals = vec![[0.0, 0.0, 1.0]; 3];
/// let cloud = PointCloud::from_oriented(points, normals);
///
/// let mut matcher = CpfMatcher::new();
/// let model_id = matcher.add_model(&cloud, "plane").unwrap();
/// matcher.set_scene(&cloud).unwrap();
/// let summary = matcher.match_model(model_id).unwrap();
/// assert!(summary.num_candidates > 0);
/// ```
pub struct CpfMatcher<I = KdTreeIndex, E = CurvatureExtractor> {
    params: ValidatedParams,
    verbose: bool,
    verbose_level: u8,
    diagnostics: bool,
    index: I,
    extractor: E,
    working_set: WorkingSet,
    models: Vec<ModelEntry>,
    results: Vec<MatchingData>,
    scene: Option<SceneState>,
}

impl CpfMatcher {
    /// Create a matcher with the kd-tree index and the curvature extractor.
    pub fn new() -> Self {
        Self::with_components(KdTreeIndex::new(), CurvatureExtractor::new())
    }
}

impl Default for CpfMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: SpatialIndex, E: DescriptorExtractor> CpfMatcher<I, E> {
    /// Create a matcher from a spatial index and a descriptor extractor.
    pub fn with_components(index: I, extractor: E) -> Self {
        let mut matcher = Self {
            params: ValidatedParams::default(),
            verbose: false,
            verbose_level: 0,
            diagnostics: true,
            index,
            extractor,
            working_set: WorkingSet::new(),
            models: Vec::new(),
            results: Vec::new(),
            scene: None,
        };
        matcher.set_params(CpfParams::default());
        matcher
    }

    /// Register a reference model and return its id.
    ///
    /// The cloud must be oriented: non empty with one normal per point.
    pub fn add_model(&mut self, cloud: &PointCloud, label: &str) -> Result<usize, MatchingError> {
        if let Err(err) = cloud.oriented() {
            log::error!("Rejected model {}: {}", label, err);
            return Err(err.into());
        }

        if self.verbose {
            log::info!(
                "Start extracting descriptors from {} with {} points",
                label,
                cloud.len()
            );
        }

        let extraction = self.extract(cloud)?;
        let id = self.models.len();

        if self.verbose {
            log::info!(
                "Finished extraction of {} descriptors for {}",
                extraction.descriptors.len(),
                label
            );
        }

        self.models.push(ModelEntry {
            id,
            label: label.to_string(),
            cloud: cloud.clone(),
            descriptors: extraction.descriptors,
            curvatures: extraction.curvatures,
            frames: extraction.frames,
        });
        self.results.push(MatchingData::default());

        Ok(id)
    }

    /// Replace the scene.
    ///
    /// The cloud must be oriented: non empty with one normal per point.
    pub fn set_scene(&mut self, cloud: &PointCloud) -> Result<(), MatchingError> {
        if let Err(err) = cloud.oriented() {
            log::error!("Rejected scene: {}", err);
            return Err(err.into());
        }

        if self.progress() {
            log::debug!("Start extracting scene descriptors for {} points", cloud.len());
        }

        let extraction = self.extract(cloud)?;

        if self.progress() {
            log::debug!(
                "Finished extraction of {} scene descriptors",
                extraction.descriptors.len()
            );
        }

        self.scene = Some(SceneState {
            cloud: cloud.clone(),
            descriptors: extraction.descriptors,
            curvatures: extraction.curvatures,
            frames: extraction.frames,
        });

        Ok(())
    }

    /// Detect a registered model in the current scene.
    ///
    /// Finding no pose is not an error: the returned summary then reports zero
    /// candidates or clusters.
    pub fn match_model(&mut self, model_id: usize) -> Result<MatchSummary, MatchingError> {
        let Some(model) = self.models.get(model_id) else {
            log::error!("Selected model id {} for matching does not exist", model_id);
            return Err(MatchingError::UnknownModel {
                model_id,
                num_models: self.models.len(),
            });
        };
        let Some(scene) = self.scene.as_ref() else {
            log::error!("No scene set, set a scene first");
            return Err(MatchingError::NoScene);
        };

        let progress = self.progress();
        let data = &mut self.results[model_id];
        data.clear();

        if progress {
            log::debug!("Start matching descriptors");
        }

        let votes = vote(
            &VoteCloud {
                descriptors: &model.descriptors,
                frames: &model.frames,
            },
            &VoteCloud {
                descriptors: &scene.descriptors,
                frames: &scene.frames,
            },
            self.params.angle_bins(),
            self.diagnostics,
        );

        for point_votes in votes {
            data.vote_pairs.extend(point_votes.vote_pairs);
            data.match_pairs.extend(point_votes.match_pairs);
            for candidate in point_votes.candidates {
                data.pose_candidates.push(candidate.pose);
                data.pose_candidate_votes.push(candidate.votes);
                data.candidate_pairs
                    .push((candidate.model_point, candidate.scene_point));
            }
        }

        if progress {
            log::debug!("Found {} pose candidates", data.pose_candidates.len());
        }

        let criteria = ClusterCriteria::from(&self.params);
        let clusters =
            match cluster_poses(&data.pose_candidates, &data.pose_candidate_votes, &criteria) {
                Ok(clusters) => clusters,
                Err(ClusteringError::NoCandidates) => {
                    if self.verbose {
                        log::info!("Found 0 pose candidates for {}", model.label);
                    }
                    return Ok(MatchSummary::default());
                }
            };
        data.pose_clusters = clusters.clusters;
        data.pose_cluster_votes = clusters.ranking;

        if self.verbose {
            log::info!("Found {} pose clusters", data.pose_clusters.len());
        }

        let hits = data.pose_cluster_votes.len().min(MAX_POSE_HITS);
        for &(votes, cluster_id) in data.pose_cluster_votes.iter().take(hits) {
            let pose = combine_pose_cluster(&data.pose_clusters[cluster_id].poses, false)?;
            data.poses.push(pose);
            data.pose_votes.push(votes);
        }

        Ok(MatchSummary {
            num_candidates: data.pose_candidates.len(),
            num_clusters: data.pose_clusters.len(),
            num_poses: data.poses.len(),
        })
    }

    /// Set the verbosity. `level` is clamped to `[0, 2]`; level 2 logs extraction and
    /// matching progress.
    ///
    /// Returns the enabled flag.
    pub fn set_verbose(&mut self, enabled: bool, level: i32) -> bool {
        self.verbose = enabled;
        self.verbose_level = level.clamp(0, 2) as u8;
        self.verbose
    }

    /// Current verbosity level.
    pub fn verbose_level(&self) -> u8 {
        self.verbose_level
    }

    /// Record the `(model point, scene point)` pair of every descriptor match.
    pub fn set_diagnostics(&mut self, enabled: bool) {
        self.diagnostics = enabled;
    }

    /// Clamp and apply new parameters.
    ///
    /// Takes effect for clouds added or set afterwards.
    pub fn set_params(&mut self, params: CpfParams) -> &ValidatedParams {
        if !params.is_valid() {
            log::warn!("Matching parameters out of range, clamping: {:?}", params);
        }
        self.params = params.validate();
        &self.params
    }

    /// The active parameters.
    pub fn params(&self) -> &ValidatedParams {
        &self.params
    }

    /// Number of registered models.
    pub fn num_models(&self) -> usize {
        self.models.len()
    }

    /// A registered model.
    pub fn model(&self, model_id: usize) -> Option<&ModelEntry> {
        self.models.get(model_id)
    }

    /// The active scene.
    pub fn scene(&self) -> Option<&SceneState> {
        self.scene.as_ref()
    }

    /// Results of the last match of a model.
    pub fn result(&self, model_id: usize) -> Option<&MatchingData> {
        self.results.get(model_id)
    }

    /// Aggregated poses and their votes from the last match of a model.
    pub fn poses(&self, model_id: usize) -> Option<(&[Se3], &[u32])> {
        self.results
            .get(model_id)
            .map(|data| (data.poses.as_slice(), data.pose_votes.as_slice()))
    }

    /// Number of pose clusters from the last match of a model.
    pub fn num_pose_clusters(&self, model_id: usize) -> Option<usize> {
        self.results.get(model_id).map(MatchingData::num_pose_clusters)
    }

    /// The `(model point, scene point)` pairs of the cluster at `rank`, 0 being the most voted.
    pub fn pose_cluster_pairs(&self, model_id: usize, rank: usize) -> Option<Vec<(usize, usize)>> {
        self.results.get(model_id)?.cluster_pairs(rank)
    }

    /// Curvature classes of a model.
    pub fn model_curvatures(&self, model_id: usize) -> Option<&[u32]> {
        self.models.get(model_id).map(|m| m.curvatures.as_slice())
    }

    /// Curvature classes of the scene.
    pub fn scene_curvatures(&self) -> Option<&[u32]> {
        self.scene.as_ref().map(|s| s.curvatures.as_slice())
    }

    /// Capacity of the working set in points.
    pub fn working_set_capacity(&self) -> usize {
        self.working_set.capacity()
    }

    fn progress(&self) -> bool {
        self.verbose && self.verbose_level == 2
    }

    fn extract(&mut self, cloud: &PointCloud) -> Result<Extraction, MatchingError> {
        let normals = cloud.oriented()?;

        if self.working_set.ensure(cloud.len())? && self.progress() {
            log::debug!("Working set resized to {} points", cloud.len());
        }

        let staged = self.working_set.stage(cloud.points(), normals);

        self.index.populate(staged.points);
        let neighbors = self
            .index
            .radius_query(staged.points, self.params.search_radius);

        let curvatures = self.extractor.curvatures(
            staged.points,
            staged.normals,
            &neighbors,
            self.params.curvature_multiplier,
        );
        let descriptors = self.extractor.descriptors(
            staged.points,
            staged.normals,
            &neighbors,
            &curvatures,
            staged.frames,
            &self.params.descriptor_config(),
        );

        Ok(Extraction {
            descriptors,
            curvatures,
            frames: staged.frames.to_vec(),
        })
    }
}
