// src/profiling/anomaly.rs
use rand::Rng;
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{
    ISOLATION_CONTAMINATION, ISOLATION_MAX_SAMPLES, ISOLATION_TREES, MODEL_SEED,
};
use crate::error::ProfileError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Unsupervised outlier model fitted on standardized feature rows.
pub trait AnomalyDetector: Sized {
    fn fit(x: &[Vec<f64>]) -> Result<Self, ProfileError>;
    /// Decision values; higher is more normal, negative marks an outlier.
    fn score(&self, x: &[Vec<f64>]) -> Vec<f64>;

    fn predict(&self, x: &[Vec<f64>]) -> Vec<bool> {
        self.score(x).into_iter().map(|s| s < 0.0).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn path_length(&self, row: &[f64], depth: f64) -> f64 {
        match self {
            IsolationNode::Leaf { size } => depth + average_path_length(*size),
            IsolationNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let value = row.get(*feature).copied().unwrap_or(0.0);
                if value < *threshold {
                    left.path_length(row, depth + 1.0)
                } else {
                    right.path_length(row, depth + 1.0)
                }
            }
        }
    }
}

/// Isolation forest with a contamination-derived decision offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationNode>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    // Negated anomaly score, in [-1, 0); lower is more abnormal
    fn raw_score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return -0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size).max(f64::EPSILON);
        -(2f64).powf(-mean_path / normalizer)
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(x: &[Vec<f64>]) -> Result<Self, ProfileError> {
        if x.is_empty() {
            return Err(ProfileError::Training(
                "Cannot fit anomaly detector on an empty matrix".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(MODEL_SEED);
        let sample_size = x.len().min(ISOLATION_MAX_SAMPLES);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..ISOLATION_TREES)
            .map(|_| {
                let rows = index::sample(&mut rng, x.len(), sample_size).into_vec();
                build_tree(x, &rows, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        let mut training_scores: Vec<f64> = x.iter().map(|row| forest.raw_score(row)).collect();
        training_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        forest.offset = percentile(&training_scores, ISOLATION_CONTAMINATION);

        Ok(forest)
    }

    fn score(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.raw_score(row) - self.offset).collect()
    }
}

fn build_tree(
    x: &[Vec<f64>],
    rows: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut ChaCha8Rng,
) -> IsolationNode {
    if depth >= max_depth || rows.len() <= 1 {
        return IsolationNode::Leaf { size: rows.len() };
    }

    let n_features = x[rows[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                (lo.min(x[r][f]), hi.max(x[r][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        return IsolationNode::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&r| x[r][feature] < threshold);

    IsolationNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(x, &left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(x, &right, depth + 1, max_depth, rng)),
    }
}

// Expected path length of an unsuccessful BST search among n points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// Linear-interpolated quantile over ascending values
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.05;
                vec![jitter, -jitter, 0.1 * (i % 3) as f64]
            })
            .collect();
        rows.push(vec![8.0, -9.0, 7.5]);
        rows
    }

    #[test]
    fn isolated_point_scores_lowest() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows).unwrap();
        let scores = forest.score(&rows);
        let outlier = *scores.last().unwrap();
        assert!(scores[..scores.len() - 1].iter().all(|s| *s > outlier));
        assert!(forest.predict(&[rows.last().unwrap().clone()])[0]);
    }

    #[test]
    fn fitting_is_deterministic() {
        let rows = cluster_with_outlier();
        let a = IsolationForest::fit(&rows).unwrap().score(&rows);
        let b = IsolationForest::fit(&rows).unwrap().score(&rows);
        assert_eq!(a, b);
    }

    #[test]
    fn average_path_length_small_cases() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }
}
