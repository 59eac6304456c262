//! Pose candidates are clustered online in arrival order. Each candidate is compared with
//! the first member of every existing cluster and joins *every* cluster it is similar to,
//! adding its votes to each of them. A candidate similar to no cluster starts a new one.
//! The result therefore depends on the order of the candidates, and a candidate may be
//! counted in more than one cluster.

use cpf_3d::Se3;

use crate::{params::ValidatedParams, result::PoseCluster};

/// Errors raised by the clustering.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ClusteringError {
    /// There was nothing to cluster.
    #[error("No pose candidates to cluster")]
    NoCandidates,
}

/// Similarity predicate between two poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterCriteria {
    /// Translations closer than this are similar.
    pub trans_threshold: f64,
    /// Rotation threshold in radians, only enforced with `rotation_check`.
    pub rot_threshold: f64,
    /// Enforce `rot_threshold`.
    pub rotation_check: bool,
}

impl ClusterCriteria {
    /// Whether `candidate` belongs to the cluster represented by `representative`.
    pub fn similar(&self, candidate: &Se3, representative: &Se3) -> bool {
        let delta_t = candidate.translation_distance(representative);
        let delta_r = candidate.rotation_angle_to(representative);
        delta_t < self.trans_threshold && (!self.rotation_check || delta_r < self.rot_threshold)
    }
}

impl From<&ValidatedParams> for ClusterCriteria {
    fn from(params: &ValidatedParams) -> Self {
        Self {
            trans_threshold: params.cluster_trans_threshold,
            rot_threshold: params.cluster_rot_threshold,
            rotation_check: params.cluster_rotation_check,
        }
    }
}

/// Clusters and their ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clusters {
    /// Clusters in creation order.
    pub clusters: Vec<PoseCluster>,
    /// `(votes, cluster id)` sorted by descending votes, ties in creation order.
    pub ranking: Vec<(u32, usize)>,
}

/// Cluster the pose candidates.
///
/// # Arguments
///
/// * `candidates` - The pose candidates in arrival order.
/// * `votes` - The votes of each candidate.
/// * `criteria` - The similarity predicate.
///
/// # Returns
///
/// The clusters and their ranking, or [`ClusteringError::NoCandidates`] if `candidates`
/// is empty.
///
/// PRECONDITION: `candidates` and `votes` have the same length.
pub fn cluster_poses(
    candidates: &[Se3],
    votes: &[u32],
    criteria: &ClusterCriteria,
) -> Result<Clusters, ClusteringError> {
    assert_eq!(candidates.len(), votes.len());

    if candidates.is_empty() {
        return Err(ClusteringError::NoCandidates);
    }

    let mut clusters: Vec<PoseCluster> = Vec::new();

    for (i, (pose, &vote)) in candidates.iter().zip(votes.iter()).enumerate() {
        let mut found = false;
        for cluster in clusters.iter_mut() {
            let Some(representative) = cluster.representative() else {
                continue;
            };
            if criteria.similar(pose, representative) {
                cluster.push(*pose, i, vote);
                found = true;
            }
        }

        if !found {
            clusters.push(PoseCluster::new(*pose, i, vote));
        }
    }

    let mut ranking = clusters
        .iter()
        .enumerate()
        .map(|(id, cluster)| (cluster.votes, id))
        .collect::<Vec<_>>();
    // stable: equal totals keep creation order
    ranking.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(Clusters { clusters, ranking })
}
