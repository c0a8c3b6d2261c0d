use ndarray::Array1;

use crate::error::{Result, TrackerError};

/// A bounding box detection in a single image.
///
/// `tlwh` is `(top left x, top left y, width, height)`. `feature` is the
/// appearance descriptor of the image region.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub tlwh: [f64; 4],
    pub confidence: f64,
    pub feature: Array1<f32>,
}

impl Detection {
    pub fn new(tlwh: [f64; 4], confidence: f64, feature: Array1<f32>) -> Result<Self> {
        let detection = Detection {
            tlwh,
            confidence,
            feature,
        };
        detection.validate()?;
        Ok(detection)
    }

    /// Checks the box and feature vector. Fields are public, so the tracker
    /// runs this again on every detection it receives.
    pub fn validate(&self) -> Result<()> {
        if self.tlwh.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::InvalidDetection(format!(
                "non-finite box {:?}",
                self.tlwh
            )));
        }
        if self.tlwh[2] <= 0.0 || self.tlwh[3] <= 0.0 {
            return Err(TrackerError::InvalidDetection(format!(
                "box must have positive width and height, got {:?}",
                self.tlwh
            )));
        }
        if self.feature.is_empty() {
            return Err(TrackerError::InvalidDetection(
                "missing appearance feature".to_string(),
            ));
        }
        if self.feature.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::InvalidDetection(
                "non-finite value in appearance feature".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert to `(min x, min y, max x, max y)`.
    pub fn to_tlbr(&self) -> [f64; 4] {
        let mut ret = self.tlwh;
        ret[2] += ret[0];
        ret[3] += ret[1];
        ret
    }

    /// Convert to `(center x, center y, aspect ratio, height)`, where the
    /// aspect ratio is `width / height`.
    pub fn to_xyah(&self) -> [f64; 4] {
        let mut ret = self.tlwh;
        ret[0] += ret[2] / 2.0;
        ret[1] += ret[3] / 2.0;
        ret[2] /= ret[3];
        ret
    }
}
