use ndarray::{Array2, ArrayView1};

use super::{
    detection::Detection,
    iou_matching::iou_cost,
    kalman_filter::KalmanFilter,
    linear_assignment::{gate_cost_matrix, matching_cascade, min_cost_matching, MatchResult, INFTY_COST},
    nn_matching::NearestNeighborDistanceMetric,
    track::Track,
    traits::{AppearanceMetric, MotionModel},
};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};

/// Matching outcome of one frame, before it is applied to the track set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    /// Pairs found by the appearance cascade over confirmed tracks.
    pub appearance_matches: Vec<(usize, usize)>,
    /// Tracks offered to the IOU stage.
    pub iou_candidates: Vec<usize>,
    /// Pairs found by the IOU stage.
    pub iou_matches: Vec<(usize, usize)>,
    /// Both stages merged.
    pub result: MatchResult,
}

/// The multi-target tracker.
///
/// Call [`predict`](Self::predict) once per frame, then
/// [`update`](Self::update) with that frame's detections.
#[derive(Debug, Clone)]
pub struct Tracker<M = NearestNeighborDistanceMetric, F = KalmanFilter> {
    metric: M,
    kf: F,
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
    feature_len: Option<usize>,
}

impl<M: AppearanceMetric> Tracker<M, KalmanFilter> {
    pub fn new(metric: M, config: TrackerConfig) -> Result<Self> {
        Self::with_motion_model(metric, KalmanFilter::new(), config)
    }
}

impl<M: AppearanceMetric, F: MotionModel> Tracker<M, F> {
    pub fn with_motion_model(metric: M, kf: F, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Tracker {
            metric,
            kf,
            config,
            tracks: Vec::new(),
            next_id: 1,
            feature_len: None,
        })
    }

    /// The active tracks, in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Identity the next new track will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Propagate track state distributions one time step forward.
    pub fn predict(&mut self) {
        for track in &mut self.tracks {
            track.predict(&self.kf);
        }
    }

    /// Perform measurement update and track management.
    ///
    /// Invalid detections and failed motion updates are reported before any
    /// track is touched.
    pub fn update(&mut self, detections: &[Detection]) -> Result<()> {
        self.validate(detections)?;

        let association = self.associate(detections)?;
        let MatchResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = association.result;
        log::debug!(
            "{} appearance matches, {} iou matches, {} missed tracks, {} new tracks",
            association.appearance_matches.len(),
            association.iou_matches.len(),
            unmatched_tracks.len(),
            unmatched_detections.len()
        );

        // Corrections are computed up front so a failing one leaves every
        // track untouched.
        let corrected = matches
            .iter()
            .map(|&(track_idx, detection_idx)| {
                let track = &self.tracks[track_idx];
                self.kf
                    .update(track.mean(), track.covariance(), detections[detection_idx].to_xyah())
            })
            .collect::<Result<Vec<_>>>()?;
        for ((track_idx, detection_idx), (mean, covariance)) in matches.into_iter().zip(corrected) {
            self.tracks[track_idx].commit_update(mean, covariance, &detections[detection_idx]);
        }
        for track_idx in unmatched_tracks {
            self.tracks[track_idx].mark_missed();
        }
        for detection_idx in unmatched_detections {
            self.initiate_track(&detections[detection_idx]);
        }
        self.tracks.retain(|t| !t.is_deleted());

        // Update distance metric.
        let active_targets: Vec<u64> = self
            .tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .map(|t| t.track_id())
            .collect();
        let mut features = vec![];
        let mut targets = vec![];
        for track in self.tracks.iter_mut().filter(|t| t.is_confirmed()) {
            let track_features = track.take_features();
            targets.extend(std::iter::repeat(track.track_id()).take(track_features.len()));
            features.extend(track_features);
        }
        self.metric.partial_fit(features, &targets, &active_targets)
    }

    fn validate(&mut self, detections: &[Detection]) -> Result<()> {
        let mut expected = self.feature_len.or_else(|| self.metric.feature_len());
        for detection in detections {
            detection.validate()?;
            let actual = detection.feature.len();
            match expected {
                Some(expected) if expected != actual => {
                    return Err(TrackerError::FeatureLength { expected, actual });
                }
                _ => expected = Some(actual),
            }
        }
        self.feature_len = expected;
        Ok(())
    }

    /// Run both association stages without touching the track set.
    pub(crate) fn associate(&self, detections: &[Detection]) -> Result<Association> {
        let (confirmed_tracks, unconfirmed_tracks): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| self.tracks[i].is_confirmed());

        let metric = &self.metric;
        let kf = &self.kf;
        let config = &self.config;
        let mut gated_metric = |tracks: &[Track],
                                dets: &[Detection],
                                track_indices: &[usize],
                                detection_indices: &[usize]|
         -> Result<Array2<f64>> {
            let features: Vec<ArrayView1<'_, f32>> =
                detection_indices.iter().map(|&i| dets[i].feature.view()).collect();
            let targets: Vec<u64> = track_indices.iter().map(|&i| tracks[i].track_id()).collect();
            let cost_matrix = metric.distance(&features, &targets)?;
            gate_cost_matrix(
                kf,
                cost_matrix,
                tracks,
                dets,
                track_indices,
                detection_indices,
                INFTY_COST,
                config.gating_only_position,
                config.gating_threshold,
            )
        };

        // Associate confirmed tracks using appearance features.
        let MatchResult {
            matches: appearance_matches,
            unmatched_tracks: cascade_unmatched_tracks,
            unmatched_detections: cascade_unmatched_detections,
        } = matching_cascade(
            &mut gated_metric,
            metric.matching_threshold(),
            config.max_age,
            &self.tracks,
            detections,
            Some(confirmed_tracks),
            None,
        )?;

        // Associate remaining tracks together with unconfirmed tracks using
        // IOU. Only tracks that were updated in the previous frame qualify.
        let (recently_missed, stale): (Vec<usize>, Vec<usize>) = cascade_unmatched_tracks
            .into_iter()
            .partition(|&k| self.tracks[k].time_since_update() == 1);
        let mut iou_candidates = unconfirmed_tracks;
        iou_candidates.extend(recently_missed);

        let mut iou_metric = iou_cost;
        let iou_result = min_cost_matching(
            &mut iou_metric,
            config.max_iou_distance,
            &self.tracks,
            detections,
            Some(iou_candidates.clone()),
            Some(cascade_unmatched_detections),
        )?;
        let iou_matches = iou_result.matches.clone();

        let appearance_stage = MatchResult {
            matches: appearance_matches.clone(),
            unmatched_tracks: stale,
            unmatched_detections: vec![],
        };
        Ok(Association {
            appearance_matches,
            iou_candidates,
            iou_matches,
            result: appearance_stage.merge(iou_result),
        })
    }

    fn initiate_track(&mut self, detection: &Detection) {
        let (mean, covariance) = self.kf.initiate(detection.to_xyah());
        log::trace!("new track {} at {:?}", self.next_id, detection.tlwh);
        self.tracks.push(Track::new(
            mean,
            covariance,
            self.next_id,
            self.config.n_init,
            self.config.max_age,
            Some(detection.feature.clone()),
        ));
        self.next_id += 1;
    }
}
