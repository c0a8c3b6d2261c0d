//! Multi-object tracking by detection.
//!
//! Each frame, [`sort::tracker::Tracker`] predicts every track with a Kalman
//! filter and associates the frame's detections in two stages: an
//! appearance cascade over confirmed tracks, then IOU matching for new and
//! just-missed tracks. [`deep_sort::deep_sort::DeepSort`] wraps the tracker
//! with detection filtering and result reporting.

pub mod config;
pub mod deep_sort;
pub mod error;
pub mod mot;
pub mod sort;

#[cfg(test)]
mod test;

pub use config::{DeepSortConfig, MetricConfig, TrackerConfig};
pub use error::TrackerError;
pub use sort::detection::Detection;
pub use sort::nn_matching::{Metric, NearestNeighborDistanceMetric};
pub use sort::track::{Track, TrackState};
pub use sort::tracker::Tracker;
