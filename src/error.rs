use thiserror::Error;

/// Errors raised by the tracking core.
///
/// The `Invalid*`, `UnknownTarget` and `FeatureCountMismatch` variants mark a
/// caller contract violation at the boundary. `Singular` is a numerical
/// failure inside the motion filter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("no gallery for target {0}")]
    UnknownTarget(u64),

    #[error("{features} features supplied for {targets} targets")]
    FeatureCountMismatch { features: usize, targets: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("singular innovation covariance: {0}")]
    Singular(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
