use ndarray::Array2;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};

use super::{detection::Detection, track::Track, traits::MotionModel};
use crate::error::Result;

pub const INFTY_COST: f64 = 1e+5;

/// Costs are scaled to integers before running Kuhn-Munkres.
const COST_SCALE: f64 = 1e6;

/// Outcome of one association stage.
///
/// `matches` holds `(track index, detection index)` pairs. All indices refer
/// to the full track and detection lists, not to the subsets a stage saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl MatchResult {
    /// Combine with a later stage that consumed this stage's leftover
    /// detections. Matches are concatenated, unmatched tracks are unioned
    /// without duplicates, and unmatched detections come from `later`.
    pub fn merge(self, later: MatchResult) -> MatchResult {
        let mut matches = self.matches;
        matches.extend(later.matches);

        let mut unmatched_tracks = self.unmatched_tracks;
        for k in later.unmatched_tracks {
            if !unmatched_tracks.contains(&k) {
                unmatched_tracks.push(k);
            }
        }

        MatchResult {
            matches,
            unmatched_tracks,
            unmatched_detections: later.unmatched_detections,
        }
    }
}

/// Solve the rectangular linear assignment problem, minimizing total cost.
///
/// Returns `(row, column)` pairs; `min(rows, cols)` pairs are assigned.
/// Costs are saturated to `[-INFTY_COST, INFTY_COST]` and NaN counts as
/// `INFTY_COST`.
pub fn linear_sum_assignment(cost_matrix: &Array2<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = cost_matrix.dim();
    if rows == 0 || cols == 0 {
        return vec![];
    }

    // Pad to square with a constant; padded rows/columns do not change
    // which real pairs are optimal.
    let size = rows.max(cols);
    let mut weights = Matrix::new(size, size, 0i64);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        weights[(i, j)] = (saturate(cost) * COST_SCALE).round() as i64;
    }

    let (_, assignment) = kuhn_munkres_min(&weights);
    assignment
        .into_iter()
        .enumerate()
        .filter(|&(row, col)| row < rows && col < cols)
        .collect()
}

fn saturate(cost: f64) -> f64 {
    if cost.is_nan() {
        INFTY_COST
    } else {
        cost.clamp(-INFTY_COST, INFTY_COST)
    }
}

/// Solve linear assignment problem.
///
/// `distance_metric` receives the full track and detection lists plus the
/// indices to score, and returns a `(track_indices, detection_indices)`
/// shaped cost matrix. Associations with cost larger than `max_distance`
/// are disregarded. `None` indices mean "all".
pub fn min_cost_matching<C>(
    distance_metric: &mut C,
    max_distance: f64,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: Option<Vec<usize>>,
    detection_indices: Option<Vec<usize>>,
) -> Result<MatchResult>
where
    C: FnMut(&[Track], &[Detection], &[usize], &[usize]) -> Result<Array2<f64>>,
{
    let track_indices = track_indices.unwrap_or_else(|| (0..tracks.len()).collect());
    let detection_indices = detection_indices.unwrap_or_else(|| (0..detections.len()).collect());

    if detection_indices.is_empty() || track_indices.is_empty() {
        return Ok(MatchResult {
            matches: vec![],
            unmatched_tracks: track_indices,
            unmatched_detections: detection_indices,
        });
    }

    let mut cost_matrix = distance_metric(tracks, detections, &track_indices, &detection_indices)?;
    // NaN falls on the infeasible side.
    cost_matrix.mapv_inplace(|c| if c <= max_distance { c } else { max_distance + 1e-5 });

    let assignment = linear_sum_assignment(&cost_matrix);

    let mut result = MatchResult::default();
    for (col, &detection_idx) in detection_indices.iter().enumerate() {
        if !assignment.iter().any(|&(_, c)| c == col) {
            result.unmatched_detections.push(detection_idx);
        }
    }
    for (row, &track_idx) in track_indices.iter().enumerate() {
        if !assignment.iter().any(|&(r, _)| r == row) {
            result.unmatched_tracks.push(track_idx);
        }
    }
    for (row, col) in assignment {
        let track_idx = track_indices[row];
        let detection_idx = detection_indices[col];
        if cost_matrix[[row, col]] > max_distance {
            result.unmatched_tracks.push(track_idx);
            result.unmatched_detections.push(detection_idx);
        } else {
            result.matches.push((track_idx, detection_idx));
        }
    }
    Ok(result)
}

/// Run matching cascade.
///
/// Tracks are matched in tiers of `time_since_update == 1 + level` for
/// `level in 0..cascade_depth`, so tracks that were seen more recently get
/// first claim on the detections. Detections matched in one tier are not
/// offered to the next.
pub fn matching_cascade<C>(
    distance_metric: &mut C,
    max_distance: f64,
    cascade_depth: u32,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: Option<Vec<usize>>,
    detection_indices: Option<Vec<usize>>,
) -> Result<MatchResult>
where
    C: FnMut(&[Track], &[Detection], &[usize], &[usize]) -> Result<Array2<f64>>,
{
    let track_indices = track_indices.unwrap_or_else(|| (0..tracks.len()).collect());
    let mut unmatched_detections =
        detection_indices.unwrap_or_else(|| (0..detections.len()).collect());

    let mut matches = vec![];
    for level in 0..cascade_depth {
        if unmatched_detections.is_empty() {
            break;
        }

        let track_indices_l: Vec<usize> = track_indices
            .iter()
            .copied()
            .filter(|&k| tracks[k].time_since_update() == 1 + level)
            .collect();
        if track_indices_l.is_empty() {
            continue;
        }

        let level_result = min_cost_matching(
            distance_metric,
            max_distance,
            tracks,
            detections,
            Some(track_indices_l),
            Some(unmatched_detections),
        )?;
        unmatched_detections = level_result.unmatched_detections;
        matches.extend(level_result.matches);
    }

    let unmatched_tracks = track_indices
        .into_iter()
        .filter(|k| !matches.iter().any(|&(t, _)| t == *k))
        .collect();

    Ok(MatchResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    })
}

/// Invalidate infeasible entries in the cost matrix based on the state
/// distributions obtained by Kalman filtering.
///
/// Entries whose squared Mahalanobis distance exceeds `gating_threshold`
/// are set to `gated_cost`.
#[allow(clippy::too_many_arguments)]
pub fn gate_cost_matrix<F: MotionModel>(
    kf: &F,
    mut cost_matrix: Array2<f64>,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
    gated_cost: f64,
    only_position: bool,
    gating_threshold: f64,
) -> Result<Array2<f64>> {
    let measurements: Vec<[f64; 4]> = detection_indices
        .iter()
        .map(|&i| detections[i].to_xyah())
        .collect();

    for (row, &track_idx) in track_indices.iter().enumerate() {
        let track = &tracks[track_idx];
        let gating_distance =
            kf.gating_distance(track.mean(), track.covariance(), &measurements, only_position)?;
        for (col, distance) in gating_distance.iter().enumerate() {
            if *distance > gating_threshold {
                cost_matrix[[row, col]] = gated_cost;
            }
        }
    }
    Ok(cost_matrix)
}
