//! Seeded isolation forest.
//!
//! Each tree isolates a random subsample by recursive random splits; points
//! that need fewer splits to isolate get higher anomaly scores. The
//! contamination fraction places the decision threshold at the matching
//! quantile of the training scores.
//!
//! Tree construction draws every random number from one `StdRng` seeded
//! with [`DetectionConfig::seed`], so identical input, parameters and seed
//! always give identical labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::stats::quantile;
use crate::config::DetectionConfig;
use crate::data::model::{Feature, Label, LabeledTable, MonthlyTable};
use crate::error::{DetectionError, Result};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(
        data: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= height_limit || indices.len() <= 1 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let dims = data[indices[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|f| {
                let (lo, hi) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(data[i][f]), hi.max(data[i][f])),
                );
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();

        if splittable.is_empty() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
        // Drawn from [lo, hi) with `<=` going left: both sides are non-empty.
        let value = rng.gen_range(lo..hi);

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| data[i][feature] <= value);

        Node::Split {
            feature,
            value,
            left: Box::new(Node::build(data, left, depth + 1, height_limit, rng)),
            right: Box::new(Node::build(data, right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *value { &**left } else { &**right };
                    depth += 1.0;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
    trees: Vec<Node>,
    sample_size: usize,
    threshold: Option<f64>,
}

impl IsolationForest {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            seed: config.seed,
            trees: Vec::new(),
            sample_size: 0,
            threshold: None,
        }
    }

    /// Per-tree sample size used by the last fit.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Score above which a point is anomalous; `None` before fitting.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Build the trees and calibrate the decision threshold on `data`.
    pub fn fit(&mut self, data: &[Vec<f64>]) -> Result<()> {
        check_input(data)?;
        let n = data.len();
        let dims = data[0].len();

        let any_spread = (0..dims).any(|f| {
            let first = data[0][f];
            data.iter().any(|row| row[f] != first)
        });
        if !any_spread {
            return Err(DetectionError::Scoring(
                "every feature is constant; nothing to isolate".to_string(),
            ));
        }

        self.sample_size = self.max_samples.min(n);
        let height_limit = (self.sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, self.sample_size).into_vec();
                Node::build(data, sample, 0, height_limit, &mut rng)
            })
            .collect();

        let scores = self.score_samples(data)?;
        self.threshold = Some(quantile(&scores, 1.0 - self.contamination));
        Ok(())
    }

    /// Anomaly score in (0, 1] for each row; higher is more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(DetectionError::Scoring(
                "model must be fitted before scoring".to_string(),
            ));
        }
        let norm = average_path_length(self.sample_size);
        Ok(data
            .iter()
            .map(|point| {
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(point))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                if norm > 0.0 {
                    2f64.powf(-mean_depth / norm)
                } else {
                    0.5
                }
            })
            .collect())
    }

    /// Label each row against the fitted threshold.
    pub fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<Label>> {
        let threshold = self.threshold.ok_or_else(|| {
            DetectionError::Scoring("model must be fitted before prediction".to_string())
        })?;
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|s| label_for(s, threshold))
            .collect())
    }

    /// Fit on `data` and label the same rows.
    pub fn fit_predict(&mut self, data: &[Vec<f64>]) -> Result<(Vec<Label>, Vec<f64>)> {
        self.fit(data)?;
        let scores = self.score_samples(data)?;
        let threshold = self.threshold.unwrap_or(f64::INFINITY);
        let labels = scores.iter().map(|&s| label_for(s, threshold)).collect();
        Ok((labels, scores))
    }
}

fn label_for(score: f64, threshold: f64) -> Label {
    if score > threshold {
        Label::Anomalous
    } else {
        Label::Normal
    }
}

fn check_input(data: &[Vec<f64>]) -> Result<()> {
    let Some(first) = data.first() else {
        return Err(DetectionError::Scoring("empty input".to_string()));
    };
    if first.is_empty() {
        return Err(DetectionError::Scoring("rows have no features".to_string()));
    }
    for (i, row) in data.iter().enumerate() {
        if row.len() != first.len() {
            return Err(DetectionError::Scoring(format!(
                "row {i} has {} features, expected {}",
                row.len(),
                first.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::Scoring(format!("row {i} has a non-finite value")));
        }
    }
    Ok(())
}

/// Fit a forest on the table's density/speed pairs and label every record.
pub fn score_table(table: &MonthlyTable, config: &DetectionConfig) -> Result<LabeledTable> {
    let data = table
        .records
        .iter()
        .map(|r| {
            Feature::ALL
                .iter()
                .map(|&f| {
                    r.value(f).ok_or_else(|| {
                        DetectionError::Scoring(format!("missing {f} at {}", r.datetime))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut forest = IsolationForest::new(config);
    let (labels, scores) = forest.fit_predict(&data)?;

    Ok(LabeledTable {
        table: table.clone(),
        labels,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cluster(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                vec![5.0 + (t * 0.7).sin(), 400.0 + 20.0 * (t * 1.3).cos()]
            })
            .collect()
    }

    #[test]
    fn average_path_length_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert_relative_eq!(average_path_length(256), 10.2448, epsilon = 1e-3);
    }

    #[test]
    fn same_seed_gives_identical_labels() {
        let data = cluster(150);
        let config = DetectionConfig::default();

        let (labels_a, scores_a) = IsolationForest::new(&config).fit_predict(&data).unwrap();
        let (labels_b, scores_b) = IsolationForest::new(&config).fit_predict(&data).unwrap();

        assert_eq!(labels_a, labels_b);
        assert_eq!(scores_a, scores_b);
    }

    #[test]
    fn different_seed_changes_scores() {
        let data = cluster(150);
        let a = IsolationForest::new(&DetectionConfig::default().with_seed(1))
            .fit_predict(&data)
            .unwrap()
            .1;
        let b = IsolationForest::new(&DetectionConfig::default().with_seed(2))
            .fit_predict(&data)
            .unwrap()
            .1;
        assert_ne!(a, b);
    }

    #[test]
    fn isolated_point_scores_highest() {
        let mut data = cluster(200);
        data.push(vec![40.0, 900.0]);

        let mut forest = IsolationForest::new(&DetectionConfig::default());
        let (labels, scores) = forest.fit_predict(&data).unwrap();

        let max_idx = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_idx, 200);
        assert_eq!(labels[200], Label::Anomalous);
        assert!(scores.iter().all(|&s| s > 0.0 && s <= 1.0));
    }

    #[test]
    fn anomaly_count_tracks_contamination() {
        let data = cluster(300);
        let (labels, _) = IsolationForest::new(&DetectionConfig::default())
            .fit_predict(&data)
            .unwrap();
        let flagged = labels.iter().filter(|l| **l == Label::Anomalous).count();
        assert!((1..=4).contains(&flagged), "flagged {flagged}");
    }

    #[test]
    fn sample_size_is_capped() {
        let mut forest = IsolationForest::new(&DetectionConfig::default());
        forest.fit(&cluster(30)).unwrap();
        assert_eq!(forest.sample_size(), 30);
        forest.fit(&cluster(300)).unwrap();
        assert_eq!(forest.sample_size(), 256);
    }

    #[test]
    fn one_constant_feature_is_fine() {
        let data: Vec<Vec<f64>> = (0..50).map(|i| vec![5.0, 400.0 + i as f64]).collect();
        assert!(IsolationForest::new(&DetectionConfig::default())
            .fit_predict(&data)
            .is_ok());
    }

    #[test]
    fn degenerate_inputs_are_scoring_errors() {
        let config = DetectionConfig::default();
        let constant = vec![vec![5.0, 400.0]; 40];
        let with_nan = vec![vec![1.0, f64::NAN], vec![2.0, 3.0]];
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];

        for data in [Vec::new(), constant, with_nan, ragged] {
            let err = IsolationForest::new(&config).fit(&data).unwrap_err();
            assert!(matches!(err, DetectionError::Scoring(_)), "{err}");
        }
    }

    #[test]
    fn predict_requires_fit() {
        let forest = IsolationForest::new(&DetectionConfig::default());
        assert!(forest.predict(&cluster(5)).is_err());
        assert!(forest.threshold().is_none());
    }
}
