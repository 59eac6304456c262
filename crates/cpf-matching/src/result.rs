use cpf_3d::Se3;

/// A group of similar pose candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseCluster {
    /// Member poses in insertion order. The first one is the representative.
    pub poses: Vec<Se3>,
    /// Index of every member in the candidate list.
    pub candidate_ids: Vec<usize>,
    /// Accumulated votes of the members.
    pub votes: u32,
}

impl PoseCluster {
    /// Start a cluster from a single candidate.
    pub fn new(pose: Se3, candidate_id: usize, votes: u32) -> Self {
        Self {
            poses: vec![pose],
            candidate_ids: vec![candidate_id],
            votes,
        }
    }

    /// The first inserted pose.
    pub fn representative(&self) -> Option<&Se3> {
        self.poses.first()
    }

    /// Add a member to the cluster.
    pub fn push(&mut self, pose: Se3, candidate_id: usize, votes: u32) {
        self.poses.push(pose);
        self.candidate_ids.push(candidate_id);
        self.votes += votes;
    }

    /// Number of member poses.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the cluster has no members.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Everything produced by one match of a model against the scene.
///
/// Poses map model coordinates into the scene frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingData {
    /// `(model point, alpha)` of every descriptor match.
    pub vote_pairs: Vec<(usize, f64)>,
    /// Pose candidates in voting order.
    pub pose_candidates: Vec<Se3>,
    /// Votes of each pose candidate.
    pub pose_candidate_votes: Vec<u32>,
    /// `(model point, scene point)` that produced each pose candidate.
    pub candidate_pairs: Vec<(usize, usize)>,
    /// Clusters in creation order.
    pub pose_clusters: Vec<PoseCluster>,
    /// `(votes, cluster id)` sorted by descending votes.
    pub pose_cluster_votes: Vec<(u32, usize)>,
    /// Aggregated poses, highest voted first.
    pub poses: Vec<Se3>,
    /// Votes of each aggregated pose.
    pub pose_votes: Vec<u32>,
    /// `(model point, scene point)` of every descriptor match, filled when diagnostics are on.
    pub match_pairs: Vec<(usize, usize)>,
}

impl MatchingData {
    /// Drop every result.
    pub fn clear(&mut self) {
        self.vote_pairs.clear();
        self.pose_candidates.clear();
        self.pose_candidate_votes.clear();
        self.candidate_pairs.clear();
        self.match_pairs.clear();
        self.clear_clusters();
    }

    /// Drop the clusters and the aggregated poses, keeping the candidates.
    pub fn clear_clusters(&mut self) {
        self.pose_clusters.clear();
        self.pose_cluster_votes.clear();
        self.poses.clear();
        self.pose_votes.clear();
    }

    /// Number of pose clusters.
    pub fn num_pose_clusters(&self) -> usize {
        self.pose_clusters.len()
    }

    /// The `(model point, scene point)` pairs behind the cluster at `rank`.
    ///
    /// Rank 0 is the cluster with the most votes.
    pub fn cluster_pairs(&self, rank: usize) -> Option<Vec<(usize, usize)>> {
        let &(_, cluster_id) = self.pose_cluster_votes.get(rank)?;
        let cluster = self.pose_clusters.get(cluster_id)?;
        cluster
            .candidate_ids
            .iter()
            .map(|&id| self.candidate_pairs.get(id).copied())
            .collect()
    }
}

/// Counts reported by a match call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    /// Number of pose candidates.
    pub num_candidates: usize,
    /// Number of pose clusters.
    pub num_clusters: usize,
    /// Number of aggregated poses.
    pub num_poses: usize,
}

impl MatchSummary {
    /// Whether at least one pose was found.
    pub fn has_pose(&self) -> bool {
        self.num_poses > 0
    }
}
