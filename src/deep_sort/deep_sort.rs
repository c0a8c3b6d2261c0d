use chrono::Local;

use crate::config::DeepSortConfig;
use crate::error::Result;
use crate::sort::{detection::Detection, preprocessing::non_max_suppression, tracker::Tracker};

/// A confirmed track reported for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackOutput {
    pub track_id: u64,
    /// `(top left x, top left y, width, height)`
    pub tlwh: [f64; 4],
}

/// Per-frame pipeline: filter raw detections, run the tracker, report the
/// confirmed tracks that were seen recently.
#[derive(Debug, Clone)]
pub struct DeepSort {
    min_confidence: f64,
    nms_max_overlap: f64,
    min_detection_height: f64,
    tracker: Tracker,
}

impl DeepSort {
    pub fn new(config: &DeepSortConfig) -> Result<Self> {
        config.metric.validate()?;
        let metric = config.metric.build();
        let tracker = Tracker::new(metric, config.tracker.clone())?;
        Ok(DeepSort {
            min_confidence: config.min_confidence,
            nms_max_overlap: config.nms_max_overlap,
            min_detection_height: config.min_detection_height,
            tracker,
        })
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Track one frame. An empty `detections` still advances every track.
    pub fn update(&mut self, detections: Vec<Detection>) -> Result<Vec<TrackOutput>> {
        let start = Local::now();

        let detections: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence && d.tlwh[3] >= self.min_detection_height)
            .collect();

        let boxes: Vec<[f64; 4]> = detections.iter().map(|d| d.tlwh).collect();
        let scores: Vec<f64> = detections.iter().map(|d| d.confidence).collect();
        let mut keep = non_max_suppression(&boxes, self.nms_max_overlap, Some(&scores[..]));
        keep.sort_unstable();
        let detections: Vec<Detection> = keep.into_iter().map(|i| detections[i].clone()).collect();

        self.tracker.predict();
        self.tracker.update(&detections)?;

        let outputs: Vec<TrackOutput> = self
            .tracker
            .tracks()
            .iter()
            .filter(|t| t.is_confirmed() && t.time_since_update() <= 1)
            .map(|t| TrackOutput {
                track_id: t.track_id(),
                tlwh: t.to_tlwh(),
            })
            .collect();

        let elapsed = Local::now() - start;
        log::debug!(
            "tracked {} detections into {} outputs in {} ms",
            detections.len(),
            outputs.len(),
            elapsed.num_milliseconds()
        );
        Ok(outputs)
    }
}
