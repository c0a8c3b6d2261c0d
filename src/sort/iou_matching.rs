use ndarray::{Array1, Array2};

use super::{detection::Detection, linear_assignment::INFTY_COST, track::Track};
use crate::error::Result;

/// Intersection over union of `bbox` with each of `candidates`.
///
/// All boxes are `(top left x, top left y, width, height)`. Returns values in
/// `[0, 1]`; a larger value means more overlap.
pub fn iou(bbox: [f64; 4], candidates: &[[f64; 4]]) -> Array1<f64> {
    let bbox_tl = [bbox[0], bbox[1]];
    let bbox_br = [bbox[0] + bbox[2], bbox[1] + bbox[3]];
    let area_bbox = bbox[2] * bbox[3];

    candidates
        .iter()
        .map(|c| {
            let tl = [bbox_tl[0].max(c[0]), bbox_tl[1].max(c[1])];
            let br = [bbox_br[0].min(c[0] + c[2]), bbox_br[1].min(c[1] + c[3])];
            let wh = [(br[0] - tl[0]).max(0.0), (br[1] - tl[1]).max(0.0)];

            let area_intersection = wh[0] * wh[1];
            let area_candidate = c[2] * c[3];
            let union = area_bbox + area_candidate - area_intersection;
            if union > 0.0 {
                area_intersection / union
            } else {
                0.0
            }
        })
        .collect()
}

/// An intersection over union distance metric.
///
/// Returns a `(track_indices, detection_indices)` cost matrix of `1 - iou`.
/// Rows of tracks that were not updated in the previous frame are set to
/// [`INFTY_COST`].
pub fn iou_cost(
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> Result<Array2<f64>> {
    let candidates: Vec<[f64; 4]> = detection_indices.iter().map(|&i| detections[i].tlwh).collect();

    let mut cost_matrix = Array2::<f64>::zeros((track_indices.len(), detection_indices.len()));
    for (row, &track_idx) in track_indices.iter().enumerate() {
        let track = &tracks[track_idx];
        if track.time_since_update() > 1 {
            cost_matrix.row_mut(row).fill(INFTY_COST);
            continue;
        }

        let overlap = iou(track.to_tlwh(), &candidates);
        cost_matrix.row_mut(row).assign(&overlap.mapv(|v| 1.0 - v));
    }
    Ok(cost_matrix)
}
