//! Capability traits for the tracker's collaborators.
//!
//! The tracker only needs "something that predicts and corrects a box state"
//! and "something that scores feature vectors against per-identity
//! galleries". Alternate motion models or embedding spaces plug in here
//! without touching [`Tracker`](super::tracker::Tracker).

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::Result;

/// Linear-Gaussian estimator over a `(x, y, a, h)` box measurement.
pub trait MotionModel {
    /// Create a track state from an unassociated measurement.
    fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>);

    /// Propagate the state distribution one time step.
    fn predict(&self, mean: &Array1<f64>, covariance: &Array2<f64>) -> (Array1<f64>, Array2<f64>);

    /// Correct the state distribution with an associated measurement.
    fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>)>;

    /// Squared Mahalanobis distance between the state and each measurement.
    fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
        only_position: bool,
    ) -> Result<Vec<f64>>;
}

/// Per-identity appearance gallery with a pairwise distance query.
pub trait AppearanceMetric {
    /// Costs above this value are treated as no match.
    fn matching_threshold(&self) -> f64;

    /// Length of the stored feature vectors, once any have been stored.
    fn feature_len(&self) -> Option<usize>;

    /// Cost matrix of shape `(targets.len(), features.len())`.
    fn distance(&self, features: &[ArrayView1<'_, f32>], targets: &[u64]) -> Result<Array2<f64>>;

    /// Add `features` (tagged by `targets`) to the galleries and drop every
    /// gallery whose identity is not in `active_targets`.
    fn partial_fit(
        &mut self,
        features: Vec<Array1<f32>>,
        targets: &[u64],
        active_targets: &[u64],
    ) -> Result<()>;
}
