use std::collections::HashMap;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::traits::AppearanceMetric;
use crate::error::{Result, TrackerError};

/// Distance function used to compare appearance features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl FromStr for Metric {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(Metric::Euclidean),
            "cosine" => Ok(Metric::Cosine),
            other => Err(TrackerError::InvalidConfig(format!(
                "unknown metric {:?}, expected \"euclidean\" or \"cosine\"",
                other
            ))),
        }
    }
}

fn to_f64(x: ArrayView1<'_, f32>) -> Array1<f64> {
    x.mapv(f64::from)
}

/// Squared euclidean distance between every pair of rows in `a` and `b`.
fn pdist(a: &[Array1<f64>], b: &[Array1<f64>]) -> Array2<f64> {
    let mut r2 = Array2::<f64>::zeros((a.len(), b.len()));
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            let d = (x - y).mapv(|v| v * v).sum();
            r2[[i, j]] = d.max(0.0);
        }
    }
    r2
}

/// `1 - cos` between every pair of rows in `a` and `b`.
fn cosine_distance(a: &[Array1<f64>], b: &[Array1<f64>]) -> Array2<f64> {
    let normalize = |x: &Array1<f64>| {
        let norm = x.dot(x).sqrt();
        if norm > 0.0 {
            x / norm
        } else {
            x.clone()
        }
    };
    let a: Vec<Array1<f64>> = a.iter().map(normalize).collect();
    let b: Vec<Array1<f64>> = b.iter().map(normalize).collect();

    let mut z = Array2::<f64>::zeros((a.len(), b.len()));
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            z[[i, j]] = 1.0 - x.dot(y);
        }
    }
    z
}

/// Smallest entry of each column.
fn column_min(distances: &Array2<f64>) -> Array1<f64> {
    distances.map_axis(ndarray::Axis(0), |col| {
        col.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

/// Nearest neighbor distance metric that, for each target, returns the
/// closest distance to any sample observed so far.
#[derive(Debug, Clone)]
pub struct NearestNeighborDistanceMetric {
    metric: Metric,
    matching_threshold: f64,
    budget: Option<usize>,
    samples: HashMap<u64, Vec<Array1<f32>>>,
}

impl NearestNeighborDistanceMetric {
    /// `budget` caps the number of samples kept per target, oldest first out.
    pub fn new(metric: Metric, matching_threshold: f64, budget: Option<usize>) -> Self {
        NearestNeighborDistanceMetric {
            metric,
            matching_threshold,
            budget,
            samples: HashMap::new(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    /// Stored samples of `target`, oldest first.
    pub fn samples(&self, target: u64) -> Option<&[Array1<f32>]> {
        self.samples.get(&target).map(Vec::as_slice)
    }

    /// Identities that currently have a gallery.
    pub fn targets(&self) -> Vec<u64> {
        let mut targets: Vec<u64> = self.samples.keys().copied().collect();
        targets.sort_unstable();
        targets
    }

    fn nn_distance(&self, x: &[Array1<f64>], y: &[Array1<f64>]) -> Array1<f64> {
        match self.metric {
            Metric::Euclidean => column_min(&pdist(x, y)),
            Metric::Cosine => column_min(&cosine_distance(x, y)),
        }
    }
}

impl AppearanceMetric for NearestNeighborDistanceMetric {
    fn matching_threshold(&self) -> f64 {
        self.matching_threshold
    }

    fn feature_len(&self) -> Option<usize> {
        self.samples
            .values()
            .flat_map(|samples| samples.first())
            .map(|sample| sample.len())
            .next()
    }

    fn distance(&self, features: &[ArrayView1<'_, f32>], targets: &[u64]) -> Result<Array2<f64>> {
        let queries: Vec<Array1<f64>> = features.iter().map(|f| to_f64(f.view())).collect();

        let mut cost_matrix = Array2::<f64>::zeros((targets.len(), features.len()));
        for (i, target) in targets.iter().enumerate() {
            let samples = self
                .samples
                .get(target)
                .ok_or(TrackerError::UnknownTarget(*target))?;
            let samples: Vec<Array1<f64>> = samples.iter().map(|s| to_f64(s.view())).collect();
            cost_matrix
                .row_mut(i)
                .assign(&self.nn_distance(&samples, &queries));
        }
        Ok(cost_matrix)
    }

    fn partial_fit(
        &mut self,
        features: Vec<Array1<f32>>,
        targets: &[u64],
        active_targets: &[u64],
    ) -> Result<()> {
        if features.len() != targets.len() {
            return Err(TrackerError::FeatureCountMismatch {
                features: features.len(),
                targets: targets.len(),
            });
        }
        if let Some(expected) = self.feature_len().or_else(|| features.first().map(|f| f.len())) {
            if let Some(bad) = features.iter().find(|f| f.len() != expected) {
                return Err(TrackerError::FeatureLength {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        for (feature, target) in features.into_iter().zip(targets) {
            let gallery = self.samples.entry(*target).or_default();
            gallery.push(feature);
            if let Some(budget) = self.budget {
                if gallery.len() > budget {
                    let excess = gallery.len() - budget;
                    gallery.drain(..excess);
                }
            }
        }

        self.samples.retain(|k, _| active_targets.contains(k));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rstest::rstest;

    use super::*;

    fn fitted(metric: Metric, budget: Option<usize>) -> NearestNeighborDistanceMetric {
        let mut nn = NearestNeighborDistanceMetric::new(metric, 0.2, budget);
        nn.partial_fit(
            vec![arr1(&[1.0, 0.0]), arr1(&[0.0, 1.0]), arr1(&[1.0, 1.0])],
            &[1, 2, 2],
            &[1, 2],
        )
        .unwrap();
        nn
    }

    #[test]
    fn cosine_distance_uses_closest_sample() {
        let nn = fitted(Metric::Cosine, None);
        let query = arr1(&[0.0f32, 3.0]);

        let cost = nn.distance(&[query.view()], &[1, 2]).unwrap();

        assert_eq!(cost.dim(), (2, 1));
        assert_relative_eq!(cost[[0, 0]], 1.0, epsilon = 1e-9);
        assert_relative_eq!(cost[[1, 0]], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn euclidean_distance_is_squared() {
        let nn = fitted(Metric::Euclidean, None);
        let query = arr1(&[3.0f32, 0.0]);

        let cost = nn.distance(&[query.view()], &[1, 2]).unwrap();

        assert_relative_eq!(cost[[0, 0]], 4.0);
        // closest sample of target 2 is (1, 1): 2^2 + 1^2
        assert_relative_eq!(cost[[1, 0]], 5.0);
    }

    #[test]
    fn budget_keeps_most_recent_samples() {
        let mut nn = NearestNeighborDistanceMetric::new(Metric::Cosine, 0.2, Some(2));
        nn.partial_fit(
            vec![arr1(&[1.0, 0.0]), arr1(&[0.0, 1.0]), arr1(&[1.0, 1.0])],
            &[7, 7, 7],
            &[7],
        )
        .unwrap();

        let samples = nn.samples(7).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], arr1(&[0.0, 1.0]));
        assert_eq!(samples[1], arr1(&[1.0, 1.0]));
    }

    #[test]
    fn partial_fit_evicts_inactive_targets() {
        let mut nn = fitted(Metric::Cosine, None);

        nn.partial_fit(vec![], &[], &[2]).unwrap();

        assert_eq!(nn.targets(), vec![2]);
        assert_eq!(nn.samples(2).unwrap().len(), 2);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let nn = fitted(Metric::Cosine, None);
        let query = arr1(&[1.0f32, 0.0]);

        let err = nn.distance(&[query.view()], &[42]).unwrap_err();
        assert_eq!(err, TrackerError::UnknownTarget(42));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut nn = NearestNeighborDistanceMetric::new(Metric::Cosine, 0.2, None);
        let err = nn
            .partial_fit(vec![arr1(&[1.0, 0.0])], &[1, 2], &[1, 2])
            .unwrap_err();
        assert!(matches!(err, TrackerError::FeatureCountMismatch { .. }));

        let mut nn = fitted(Metric::Cosine, None);
        let err = nn
            .partial_fit(vec![arr1(&[1.0, 0.0, 0.0])], &[1], &[1])
            .unwrap_err();
        assert_eq!(err, TrackerError::FeatureLength { expected: 2, actual: 3 });
    }

    #[rstest]
    #[case("cosine", Metric::Cosine)]
    #[case("euclidean", Metric::Euclidean)]
    fn parses_metric_names(#[case] name: &str, #[case] expected: Metric) {
        assert_eq!(name.parse::<Metric>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_metric_name() {
        assert!("manhattan".parse::<Metric>().is_err());
    }
}
