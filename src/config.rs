use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::sort::kalman_filter::CHI2INV95;
use crate::sort::nn_matching::{Metric, NearestNeighborDistanceMetric};

/// Track management parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// IOU association is rejected above this `1 - iou` cost.
    pub max_iou_distance: f64,
    /// Maximum number of consecutive misses before a track is deleted.
    /// Also the depth of the matching cascade.
    pub max_age: u32,
    /// Number of consecutive hits, the creating detection included, before
    /// a track is confirmed.
    pub n_init: u32,
    /// Squared Mahalanobis distance above which a pairing is infeasible.
    pub gating_threshold: f64,
    /// Gate on the box center only instead of the full `(x, y, a, h)`.
    pub gating_only_position: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_iou_distance: 0.7,
            max_age: 70,
            n_init: 3,
            gating_threshold: CHI2INV95[3],
            gating_only_position: false,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> std::result::Result<(), TrackerError> {
        if self.n_init == 0 {
            return Err(TrackerError::InvalidConfig("n_init must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.max_iou_distance) {
            return Err(TrackerError::InvalidConfig(format!(
                "max_iou_distance must be within [0, 1], got {}",
                self.max_iou_distance
            )));
        }
        if !(self.gating_threshold > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "gating_threshold must be positive, got {}",
                self.gating_threshold
            )));
        }
        Ok(())
    }
}

/// Appearance metric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    pub metric: Metric,
    /// Appearance association is rejected above this distance.
    pub matching_threshold: f64,
    /// Samples kept per identity; `None` keeps all of them.
    pub budget: Option<usize>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            matching_threshold: 0.2,
            budget: Some(100),
        }
    }
}

impl MetricConfig {
    pub fn validate(&self) -> std::result::Result<(), TrackerError> {
        if !(self.matching_threshold.is_finite() && self.matching_threshold > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "matching_threshold must be finite and positive, got {}",
                self.matching_threshold
            )));
        }
        if self.budget == Some(0) {
            return Err(TrackerError::InvalidConfig("budget must be at least 1".into()));
        }
        Ok(())
    }

    pub fn build(&self) -> NearestNeighborDistanceMetric {
        NearestNeighborDistanceMetric::new(self.metric, self.matching_threshold, self.budget)
    }
}

/// Settings of the [`DeepSort`](crate::deep_sort::deep_sort::DeepSort)
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSortConfig {
    pub tracker: TrackerConfig,
    pub metric: MetricConfig,
    /// Detections with lower confidence are dropped.
    pub min_confidence: f64,
    /// NMS overlap; `1.0` disables suppression.
    pub nms_max_overlap: f64,
    /// Detections with a smaller box height are dropped.
    pub min_detection_height: f64,
}

impl Default for DeepSortConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            metric: MetricConfig::default(),
            min_confidence: 0.3,
            nms_max_overlap: 1.0,
            min_detection_height: 0.0,
        }
    }
}

impl DeepSortConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: DeepSortConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.tracker.validate()?;
        config.metric.validate()?;
        Ok(config)
    }
}
