use std::collections::HashMap;
use std::f64::consts::TAU;

use cpf_3d::{descriptor::CODE_LEN, transforms::rotation_about_x, Descriptor, Se3};
use rayon::prelude::*;

/// Descriptors and reference frames of one cloud.
pub(crate) struct VoteCloud<'a> {
    pub descriptors: &'a [Descriptor],
    pub frames: &'a [Se3],
}

impl VoteCloud<'_> {
    fn num_points(&self) -> usize {
        self.frames.len()
    }
}

/// A pose hypothesis recovered from an accumulator maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub model_point: usize,
    pub scene_point: usize,
    pub pose: Se3,
    pub votes: u32,
}

/// Voting output of one model point.
#[derive(Debug, Default)]
pub(crate) struct PointVotes {
    pub vote_pairs: Vec<(usize, f64)>,
    pub match_pairs: Vec<(usize, usize)>,
    pub candidates: Vec<Candidate>,
}

/// Vote counters keyed by `(scene point, angle bin)`, reused across model points.
struct Accumulator {
    cells: Vec<u32>,
    touched: Vec<usize>,
}

impl Accumulator {
    fn new(len: usize) -> Self {
        Self {
            cells: vec![0; len],
            touched: Vec::new(),
        }
    }

    #[inline]
    fn vote(&mut self, cell: usize) {
        if self.cells[cell] == 0 {
            self.touched.push(cell);
        }
        self.cells[cell] += 1;
    }

    /// Return the maximum count and every cell reaching it in ascending order, then
    /// reset the touched cells.
    fn take_winners(&mut self) -> (u32, Vec<usize>) {
        self.touched.sort_unstable();
        let max_vote = self
            .touched
            .iter()
            .map(|&c| self.cells[c])
            .max()
            .unwrap_or(0);

        let winners = self
            .touched
            .iter()
            .copied()
            .filter(|&c| self.cells[c] == max_vote)
            .collect();

        for &c in self.touched.iter() {
            self.cells[c] = 0;
        }
        self.touched.clear();

        (max_vote, winners)
    }
}

/// Map an angle difference in `[-2π, 2π]` to one of `bins + 1` bins.
#[inline]
pub(crate) fn angle_bin(alpha: f64, bins: usize) -> usize {
    let bin = (bins as f64 * (alpha + TAU) / (2.0 * TAU)).round();
    bin.clamp(0.0, bins as f64) as usize
}

/// The angle in `[-2π, 2π]` at the center of `bin`.
#[inline]
pub(crate) fn bin_angle(bin: usize, bins: usize) -> f64 {
    bin as f64 / bins as f64 * 2.0 * TAU - TAU
}

/// Indices of the valid scene descriptors, grouped by code, in ascending order.
fn index_by_code(descriptors: &[Descriptor]) -> HashMap<[u32; CODE_LEN], Vec<usize>> {
    let mut index: HashMap<[u32; CODE_LEN], Vec<usize>> = HashMap::new();
    for (k, d) in descriptors.iter().enumerate().filter(|(_, d)| d.is_valid()) {
        index.entry(d.code).or_default().push(k);
    }
    index
}

/// Indices of the valid descriptors owned by each point.
fn group_by_point(descriptors: &[Descriptor], num_points: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); num_points];
    for (k, d) in descriptors.iter().enumerate() {
        if d.is_valid() && d.point_idx < num_points {
            groups[d.point_idx].push(k);
        }
    }
    groups
}

/// Match the model descriptors against the scene and recover the pose candidates.
///
/// Every model point votes in its own accumulator; the maxima become candidates
/// `inverse(scene_frame) * Rx(angle) * model_frame`. Model points are processed in
/// parallel and the output keeps the model point order.
pub(crate) fn vote(
    model: &VoteCloud<'_>,
    scene: &VoteCloud<'_>,
    angle_bins: usize,
    diagnostics: bool,
) -> Vec<PointVotes> {
    let scene_index = index_by_code(scene.descriptors);
    let groups = group_by_point(model.descriptors, model.num_points());

    // the clamped upper bin gets its own slot
    let stride = angle_bins + 1;
    let accumulator_len = scene.num_points() * stride;

    groups
        .par_iter()
        .enumerate()
        .map_init(
            || Accumulator::new(accumulator_len),
            |acc, (point_id, group)| {
                let mut out = PointVotes::default();
                if group.is_empty() {
                    return out;
                }

                for &k in group {
                    let src = &model.descriptors[k];
                    let Some(matches) = scene_index.get(&src.code) else {
                        continue;
                    };
                    for &j in matches {
                        let dst = &scene.descriptors[j];
                        let alpha = src.alpha - dst.alpha;
                        let bin = angle_bin(alpha, angle_bins);
                        acc.vote(dst.point_idx * stride + bin);

                        out.vote_pairs.push((point_id, alpha));
                        if diagnostics {
                            out.match_pairs.push((point_id, dst.point_idx));
                        }
                    }
                }

                let (max_vote, winners) = acc.take_winners();
                if max_vote == 0 {
                    return out;
                }

                let model_frame = &model.frames[point_id];
                out.candidates = winners
                    .into_iter()
                    .map(|cell| {
                        let scene_point = cell / stride;
                        let angle = bin_angle(cell % stride, angle_bins);
                        let scene_frame = &scene.frames[scene_point];
                        Candidate {
                            model_point: point_id,
                            scene_point,
                            pose: scene_frame.inverse() * rotation_about_x(angle) * *model_frame,
                            votes: max_vote,
                        }
                    })
                    .collect();

                out
            },
        )
        .collect()
}
