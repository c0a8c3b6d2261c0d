pub mod detection;
pub mod iou_matching;
pub mod kalman_filter;
pub mod linear_assignment;
pub mod nn_matching;
pub mod preprocessing;
pub mod track;
pub mod tracker;
pub mod traits;
