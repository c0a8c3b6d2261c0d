//! Multi-frame tracker behavior: association stages, lifecycle and the
//! appearance gallery working together.

use ndarray::arr1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use crate::config::TrackerConfig;
use crate::sort::detection::Detection;
use crate::sort::nn_matching::{Metric, NearestNeighborDistanceMetric};
use crate::sort::track::TrackState;
use crate::sort::tracker::Tracker;

const BOX: [f64; 4] = [50.0, 50.0, 20.0, 40.0];

fn tracker_with(n_init: u32, max_age: u32) -> Tracker {
    let metric = NearestNeighborDistanceMetric::new(Metric::Cosine, 0.2, Some(100));
    let config = TrackerConfig {
        n_init,
        max_age,
        ..TrackerConfig::default()
    };
    Tracker::new(metric, config).unwrap()
}

fn detection(tlwh: [f64; 4], feature: &[f32]) -> Detection {
    Detection::new(tlwh, 1.0, arr1(feature)).unwrap()
}

fn step(tracker: &mut Tracker, detections: &[Detection]) {
    tracker.predict();
    tracker.update(detections).unwrap();
}

/// Track 1, confirmed at `BOX` with gallery feature `[1, 0]`.
fn confirmed_tracker() -> Tracker {
    let mut tracker = tracker_with(2, 70);
    step(&mut tracker, &[detection(BOX, &[1.0, 0.0])]);
    step(&mut tracker, &[detection(BOX, &[1.0, 0.0])]);
    assert!(tracker.tracks()[0].is_confirmed());
    tracker
}

#[test]
fn unrelated_detection_starts_a_new_track() {
    let mut tracker = confirmed_tracker();

    step(&mut tracker, &[detection([500.0, 500.0, 20.0, 40.0], &[0.0, 1.0])]);

    let tracks = tracker.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].track_id(), 1);
    assert_eq!(tracks[0].state(), TrackState::Confirmed);
    assert_eq!(tracks[0].time_since_update(), 1);
    assert_eq!(tracks[1].track_id(), 2);
    assert_eq!(tracks[1].state(), TrackState::Tentative);
}

#[test]
fn overlap_recovers_a_weak_appearance_match() {
    let mut tracker = confirmed_tracker();
    tracker.predict();
    // cosine distance 0.25 to the gallery, above the 0.2 threshold
    let frame = [detection(BOX, &[0.75, 0.661_437_8])];

    let association = tracker.associate(&frame).unwrap();
    assert!(association.appearance_matches.is_empty());
    assert_eq!(association.iou_candidates, vec![0]);
    assert_eq!(association.iou_matches, vec![(0, 0)]);

    tracker.update(&frame).unwrap();
    assert_eq!(tracker.tracks().len(), 1);
    assert_eq!(tracker.tracks()[0].time_since_update(), 0);
    assert_eq!(tracker.metric().samples(1).unwrap().len(), 3);
}

#[rstest]
#[case(&[0.0, 1.0], false)]
#[case(&[1.0, 0.0], true)]
fn long_missed_track_only_matches_on_appearance(#[case] feature: &[f32], #[case] matched: bool) {
    let mut tracker = confirmed_tracker();
    for _ in 0..4 {
        step(&mut tracker, &[]);
    }
    tracker.predict();
    assert_eq!(tracker.tracks()[0].time_since_update(), 5);
    let frame = [detection(BOX, feature)];

    let association = tracker.associate(&frame).unwrap();
    assert!(association.iou_candidates.is_empty());
    assert!(association.iou_matches.is_empty());

    tracker.update(&frame).unwrap();
    if matched {
        assert_eq!(association.appearance_matches, vec![(0, 0)]);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].time_since_update(), 0);
    } else {
        assert!(association.appearance_matches.is_empty());
        assert_eq!(association.result.unmatched_tracks, vec![0]);
        assert_eq!(association.result.unmatched_detections, vec![0]);
        let ids: Vec<u64> = tracker.tracks().iter().map(|t| t.track_id()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(tracker.tracks()[0].is_confirmed());
    }
}

#[test]
fn empty_frame_only_ages_tracks() {
    let mut tracker = confirmed_tracker();
    let gallery = tracker.metric().samples(1).unwrap().to_vec();

    step(&mut tracker, &[]);

    assert_eq!(tracker.tracks().len(), 1);
    assert_eq!(tracker.tracks()[0].time_since_update(), 1);
    assert_eq!(tracker.next_id(), 2);
    assert_eq!(tracker.metric().samples(1).unwrap(), gallery.as_slice());
}

#[test]
fn tentative_track_dies_on_first_miss_and_ids_are_not_reused() {
    let mut tracker = tracker_with(3, 70);
    step(&mut tracker, &[detection(BOX, &[1.0, 0.0])]);
    step(&mut tracker, &[]);
    assert!(tracker.tracks().is_empty());

    step(&mut tracker, &[detection(BOX, &[1.0, 0.0])]);
    assert_eq!(tracker.tracks()[0].track_id(), 2);
    assert!(tracker.metric().targets().is_empty());
}

#[test]
fn confirmed_after_n_init_consecutive_hits() {
    let mut tracker = tracker_with(3, 70);
    let frame = [detection(BOX, &[1.0, 0.0])];

    step(&mut tracker, &frame);
    step(&mut tracker, &frame);
    assert!(tracker.tracks()[0].is_tentative());
    assert!(tracker.metric().targets().is_empty());

    step(&mut tracker, &frame);
    assert!(tracker.tracks()[0].is_confirmed());
    assert_eq!(tracker.tracks()[0].hits(), 3);
    // features of the tentative period reach the gallery on confirmation
    assert_eq!(tracker.metric().samples(1).unwrap().len(), 3);
}

#[test]
fn confirmed_track_is_deleted_after_max_age_misses() {
    let mut tracker = tracker_with(2, 3);
    let frame = [detection(BOX, &[1.0, 0.0])];
    step(&mut tracker, &frame);
    step(&mut tracker, &frame);

    for _ in 0..3 {
        step(&mut tracker, &[]);
    }
    assert_eq!(tracker.tracks().len(), 1);
    assert_eq!(tracker.tracks()[0].time_since_update(), 3);

    step(&mut tracker, &[]);
    assert!(tracker.tracks().is_empty());
    assert!(tracker.metric().samples(1).is_none());
}

#[test]
fn iou_stage_never_sees_long_missed_confirmed_tracks() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tracker = tracker_with(2, 10);
    let objects: Vec<([f64; 4], [f32; 2])> = (0..4)
        .map(|i| {
            let x = 100.0 * i as f64;
            let angle = i as f32 * 0.4;
            ([x, 50.0, 20.0, 40.0], [angle.cos(), angle.sin()])
        })
        .collect();

    for _ in 0..60 {
        tracker.predict();
        let frame: Vec<Detection> = objects
            .iter()
            .filter(|_| rng.gen_bool(0.6))
            .map(|(tlwh, feature)| detection(*tlwh, feature))
            .collect();

        let association = tracker.associate(&frame).unwrap();
        for &k in &association.iou_candidates {
            let track = &tracker.tracks()[k];
            assert!(!track.is_confirmed() || track.time_since_update() == 1);
        }
        let mut used: Vec<usize> = association.result.matches.iter().map(|&(_, d)| d).collect();
        used.extend(&association.result.unmatched_detections);
        used.sort_unstable();
        assert_eq!(used, (0..frame.len()).collect::<Vec<_>>());

        tracker.update(&frame).unwrap();
    }
}
