use ndarray::{Array1, Array2};

use super::detection::Detection;
use super::traits::MotionModel;
use crate::error::Result;

/// Lifecycle state of a track.
///
/// New tracks are `Tentative` until enough evidence has been collected, then
/// `Confirmed`. Tracks that are no longer alive are `Deleted` and removed
/// from the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

/// Inputs that drive [`TrackState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    /// Associated with a detection; `hits` includes this one.
    Hit { hits: u32, n_init: u32 },
    /// No detection this frame.
    Miss { time_since_update: u32, max_age: u32 },
}

impl TrackState {
    pub fn transition(self, event: TrackEvent) -> TrackState {
        use TrackEvent::*;
        use TrackState::*;

        match (self, event) {
            (Deleted, _) => Deleted,
            (Tentative, Hit { hits, n_init }) if hits >= n_init => Confirmed,
            (Tentative, Hit { .. }) => Tentative,
            (Tentative, Miss { .. }) => Deleted,
            (Confirmed, Hit { .. }) => Confirmed,
            (Confirmed, Miss { time_since_update, max_age }) if time_since_update > max_age => Deleted,
            (Confirmed, Miss { .. }) => Confirmed,
        }
    }
}

/// A single target track with state space `(x, y, a, h)` and associated
/// velocities, where `(x, y)` is the center of the bounding box, `a` the
/// aspect ratio and `h` the height.
#[derive(Debug, Clone)]
pub struct Track {
    mean: Array1<f64>,
    covariance: Array2<f64>,
    track_id: u64,
    hits: u32,
    age: u32,
    time_since_update: u32,
    state: TrackState,
    features: Vec<Array1<f32>>,
    n_init: u32,
    max_age: u32,
}

impl Track {
    /// The creating detection counts as the first hit.
    pub fn new(
        mean: Array1<f64>,
        covariance: Array2<f64>,
        track_id: u64,
        n_init: u32,
        max_age: u32,
        feature: Option<Array1<f32>>,
    ) -> Self {
        Track {
            mean,
            covariance,
            track_id,
            hits: 1,
            age: 1,
            time_since_update: 0,
            state: TrackState::Tentative,
            features: feature.into_iter().collect(),
            n_init,
            max_age,
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Features collected since the last gallery refresh.
    pub fn features(&self) -> &[Array1<f32>] {
        &self.features
    }

    /// Hand over the collected features, leaving the list empty.
    pub fn take_features(&mut self) -> Vec<Array1<f32>> {
        std::mem::take(&mut self.features)
    }

    /// Current position as `(top left x, top left y, width, height)`.
    pub fn to_tlwh(&self) -> [f64; 4] {
        let mut ret = [self.mean[0], self.mean[1], self.mean[2], self.mean[3]];
        ret[2] *= ret[3];
        ret[0] -= ret[2] / 2.0;
        ret[1] -= ret[3] / 2.0;
        ret
    }

    /// Current position as `(min x, min y, max x, max y)`.
    pub fn to_tlbr(&self) -> [f64; 4] {
        let mut ret = self.to_tlwh();
        ret[2] += ret[0];
        ret[3] += ret[1];
        ret
    }

    /// Propagate the state one time step. Call once per frame before
    /// [`update`](Self::update).
    pub fn predict<F: MotionModel>(&mut self, kf: &F) {
        let (mean, covariance) = kf.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
    }

    /// Correct the state with an associated detection.
    pub fn update<F: MotionModel>(&mut self, kf: &F, detection: &Detection) -> Result<()> {
        let (mean, covariance) = kf.update(&self.mean, &self.covariance, detection.to_xyah())?;
        self.commit_update(mean, covariance, detection);
        Ok(())
    }

    /// Store a corrected state computed by the motion model for `detection`.
    pub(crate) fn commit_update(&mut self, mean: Array1<f64>, covariance: Array2<f64>, detection: &Detection) {
        self.mean = mean;
        self.covariance = covariance;
        self.features.push(detection.feature.clone());

        self.hits += 1;
        self.time_since_update = 0;
        self.apply(TrackEvent::Hit {
            hits: self.hits,
            n_init: self.n_init,
        });
    }

    /// Mark this track as missed (no association at the current time step).
    pub fn mark_missed(&mut self) {
        self.apply(TrackEvent::Miss {
            time_since_update: self.time_since_update,
            max_age: self.max_age,
        });
    }

    fn apply(&mut self, event: TrackEvent) {
        let next = self.state.transition(event);
        if next != self.state {
            log::trace!("track {}: {:?} -> {:?} on {:?}", self.track_id, self.state, next, event);
        }
        self.state = next;
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }
}
