/// Suppress overlapping detections.
///
/// `boxes` are `(top left x, top left y, width, height)`. Boxes are visited
/// in descending order of `scores` (or of their bottom edge when no scores
/// are given); every remaining box whose overlap with the visited one,
/// relative to its own area, exceeds `max_bbox_overlap` is dropped.
///
/// Returns the indices of the boxes that survive, in visiting order.
pub fn non_max_suppression(boxes: &[[f64; 4]], max_bbox_overlap: f64, scores: Option<&[f64]>) -> Vec<usize> {
    let mut pick = vec![];
    if boxes.is_empty() {
        return pick;
    }

    let x1: Vec<f64> = boxes.iter().map(|b| b[0]).collect();
    let y1: Vec<f64> = boxes.iter().map(|b| b[1]).collect();
    let x2: Vec<f64> = boxes.iter().map(|b| b[0] + b[2]).collect();
    let y2: Vec<f64> = boxes.iter().map(|b| b[1] + b[3]).collect();
    let area: Vec<f64> = (0..boxes.len())
        .map(|i| (x2[i] - x1[i] + 1.0) * (y2[i] - y1[i] + 1.0))
        .collect();

    // Ascending; the best box sits at the end.
    let key = |i: usize| scores.map(|s| s[i]).unwrap_or(y2[i]);
    let mut idxs: Vec<usize> = (0..boxes.len()).collect();
    idxs.sort_by(|&a, &b| key(a).total_cmp(&key(b)));

    while let Some(i) = idxs.pop() {
        pick.push(i);
        idxs.retain(|&j| {
            let w = (x2[i].min(x2[j]) - x1[i].max(x1[j]) + 1.0).max(0.0);
            let h = (y2[i].min(y2[j]) - y1[i].max(y1[j]) + 1.0).max(0.0);
            let overlap = (w * h) / area[j];
            overlap <= max_bbox_overlap
        });
    }
    pick
}
