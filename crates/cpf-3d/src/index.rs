use kiddo::immutable::float::kdtree::ImmutableKdTree;
use rayon::prelude::*;

/// A spatial index answering radius-neighbor queries over a point set.
pub trait SpatialIndex {
    /// Build the index over `points`, replacing any previous content.
    fn populate(&mut self, points: &[[f64; 3]]);

    /// For each query point, return the indices of the indexed points within `radius`.
    ///
    /// The order of the neighbors inside each list is ascending by index.
    fn radius_query(&self, queries: &[[f64; 3]], radius: f64) -> Vec<Vec<usize>>;
}

/// Spatial index backed by an immutable kd-tree.
#[derive(Default)]
pub struct KdTreeIndex {
    tree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
    len: usize,
}

impl KdTreeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl SpatialIndex for KdTreeIndex {
    fn populate(&mut self, points: &[[f64; 3]]) {
        self.len = points.len();
        self.tree = match points.is_empty() {
            true => {
                log::warn!("Populating a spatial index with an empty point set");
                None
            }
            false => Some(ImmutableKdTree::new_from_slice(points)),
        };
    }

    fn radius_query(&self, queries: &[[f64; 3]], radius: f64) -> Vec<Vec<usize>> {
        let Some(tree) = self.tree.as_ref() else {
            return vec![Vec::new(); queries.len()];
        };

        let radius_sq = radius * radius;
        queries
            .par_iter()
            .map(|query| {
                let mut neighbors = tree
                    .within_unsorted::<kiddo::SquaredEuclidean>(query, radius_sq)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .collect::<Vec<_>>();
                neighbors.sort_unstable();
                neighbors
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_query() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 3.0],
        ];
        let mut index = KdTreeIndex::new();
        index.populate(&points);
        assert_eq!(index.len(), 4);

        let neighbors = index.radius_query(&points, 1.5);
        assert_eq!(neighbors[0], vec![0, 1, 2]);
        assert_eq!(neighbors[1], vec![0, 1, 2]);
        assert_eq!(neighbors[3], vec![3]);
    }

    #[test]
    fn test_radius_query_empty_index() {
        let mut index = KdTreeIndex::new();
        index.populate(&[]);
        assert!(index.is_empty());

        let neighbors = index.radius_query(&[[0.0, 0.0, 0.0]], 1.0);
        assert_eq!(neighbors, vec![Vec::<usize>::new()]);
    }
}
