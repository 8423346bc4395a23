//! Groups trajectories for one example across candidate variants, with derived stats.

use indexmap::IndexMap;
use serde_json::Value;

use crate::trajectory::Trajectory;

/// Trajectories for one example, sorted descending by score, plus derived statistics.
///
/// Invariant: `min_score <= avg_score <= max_score`, and `trajectories` is sorted
/// non-increasing by score (stable: equal scores keep their input order).
#[derive(Debug, Clone)]
pub struct Bucket {
    pub trajectories: Vec<Trajectory>,
    pub max_score: f32,
    pub min_score: f32,
    pub avg_score: f32,
    pub max_to_min_gap: f32,
    pub max_to_avg_gap: f32,
    pub metadata: IndexMap<String, Value>,
}

impl Bucket {
    /// Builds a bucket from an unsorted sequence of trajectories for a single example.
    ///
    /// Panics if `trajectories` is empty — callers must only construct buckets for
    /// examples that produced at least one trajectory.
    pub fn new(mut trajectories: Vec<Trajectory>) -> Self {
        assert!(
            !trajectories.is_empty(),
            "a bucket requires at least one trajectory"
        );

        trajectories.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let max_score = trajectories.first().map(|t| t.score).unwrap_or(0.0);
        let min_score = trajectories.last().map(|t| t.score).unwrap_or(0.0);
        let avg_score =
            trajectories.iter().map(|t| t.score).sum::<f32>() / trajectories.len() as f32;

        Self {
            trajectories,
            max_score,
            min_score,
            avg_score,
            max_to_min_gap: max_score - min_score,
            max_to_avg_gap: max_score - avg_score,
            metadata: IndexMap::new(),
        }
    }

    /// The best (highest-scoring) trajectory in the bucket.
    pub fn best(&self) -> &Trajectory {
        &self.trajectories[0]
    }

    /// The worst (lowest-scoring) trajectory in the bucket.
    pub fn worst(&self) -> &Trajectory {
        &self.trajectories[self.trajectories.len() - 1]
    }

    /// Whether this bucket's spread is wide enough to be worth mutating over, per the
    /// configured gap threshold (`SimbaConfig::improvement_potential_threshold`).
    pub fn has_improvement_potential(&self, threshold: f32) -> bool {
        self.max_to_min_gap > threshold && self.max_score > 0.1
    }

    /// Whether the bucket contains both at least one success and at least one failure —
    /// the applicability condition for [`AppendRule`](crate::AppendRule).
    pub fn has_successes_and_failures(&self) -> bool {
        let mut has_success = false;
        let mut has_failure = false;
        for t in &self.trajectories {
            if t.success {
                has_success = true;
            } else {
                has_failure = true;
            }
            if has_success && has_failure {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Example, FieldMap, Program, SignatureRef};
    use indexmap::IndexMap as Map;

    fn program() -> Program {
        Program::new(
            SignatureRef::new("QA", ["question"], ["answer"]),
            "Answer.",
            vec![],
            Map::new(),
        )
    }

    fn example() -> Example {
        Example::new(FieldMap::new(), FieldMap::new())
    }

    #[test]
    fn stats_respect_min_avg_max_ordering() {
        let trajectories = vec![
            Trajectory::success(program(), example(), FieldMap::new(), 0.2, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.9, 1, Map::new()),
            Trajectory::failure(program(), example(), "oops", None, Map::new()),
        ];
        let bucket = Bucket::new(trajectories);

        assert!(bucket.min_score <= bucket.avg_score);
        assert!(bucket.avg_score <= bucket.max_score);
        assert_eq!(bucket.max_score, 0.9);
        assert_eq!(bucket.min_score, 0.0);
    }

    #[test]
    fn trajectories_are_sorted_descending_by_score() {
        let trajectories = vec![
            Trajectory::success(program(), example(), FieldMap::new(), 0.3, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.8, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.5, 1, Map::new()),
        ];
        let bucket = Bucket::new(trajectories);
        let scores: Vec<f32> = bucket.trajectories.iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![0.8, 0.5, 0.3]);
    }

    #[test]
    fn improvement_potential_requires_both_gap_and_nonzero_max() {
        let narrow = Bucket::new(vec![
            Trajectory::success(program(), example(), FieldMap::new(), 0.05, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.02, 1, Map::new()),
        ]);
        assert!(!narrow.has_improvement_potential(0.1));

        let wide = Bucket::new(vec![
            Trajectory::success(program(), example(), FieldMap::new(), 0.9, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.1, 1, Map::new()),
        ]);
        assert!(wide.has_improvement_potential(0.1));
    }

    #[test]
    fn detects_mixed_success_and_failure() {
        let mixed = Bucket::new(vec![
            Trajectory::success(program(), example(), FieldMap::new(), 1.0, 1, Map::new()),
            Trajectory::failure(program(), example(), "bad", None, Map::new()),
        ]);
        assert!(mixed.has_successes_and_failures());

        let uniform = Bucket::new(vec![
            Trajectory::success(program(), example(), FieldMap::new(), 1.0, 1, Map::new()),
            Trajectory::success(program(), example(), FieldMap::new(), 0.8, 1, Map::new()),
        ]);
        assert!(!uniform.has_successes_and_failures());
    }
}
