use ndarray::{s, Array1, Array2, ArrayView1};
use rulinalg::matrix::Matrix;
use rulinalg::vector::Vector;

use super::traits::MotionModel;
use crate::error::{Result, TrackerError};

/// 0.95 quantile of the chi-square distribution for 1 to 9 degrees of freedom.
pub const CHI2INV95: [f64; 9] = [
    3.8415,
    5.9915,
    7.8147,
    9.4877,
    11.070,
    12.592,
    14.067,
    15.507,
    16.919,
];

/// Gating threshold for `dof` degrees of freedom, if tabulated.
pub fn chi2inv95(dof: usize) -> Option<f64> {
    if (1..=CHI2INV95.len()).contains(&dof) {
        Some(CHI2INV95[dof - 1])
    } else {
        None
    }
}

const NDIM: usize = 4;

/// Kalman filter for tracking bounding boxes in image space.
///
/// The 8-dimensional state `(x, y, a, h, vx, vy, va, vh)` holds the box
/// center, aspect ratio, height and their velocities. Motion is constant
/// velocity; the box `(x, y, a, h)` is observed directly.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let dt = 1.0;
        let mut motion_mat = Array2::<f64>::eye(2 * NDIM);
        for i in 0..NDIM {
            motion_mat[[i, NDIM + i]] = dt;
        }
        let update_mat = Array2::<f64>::eye(2 * NDIM)
            .slice(s![0..NDIM, ..])
            .to_owned();

        KalmanFilter {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Project the state distribution into measurement space.
    pub fn project(&self, mean: &Array1<f64>, covariance: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];
        let innovation_cov = Array2::from_diag(&Array1::from_iter(std.iter().map(|v| v * v)));

        let mean = self.update_mat.dot(mean);
        let covariance = self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;
        (mean, covariance)
    }
}

impl MotionModel for KalmanFilter {
    fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::<f64>::zeros(2 * NDIM);
        for (i, v) in measurement.iter().enumerate() {
            mean[i] = *v;
        }

        let h = measurement[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];
        let covariance = Array2::from_diag(&Array1::from_iter(std.iter().map(|v| v * v)));
        (mean, covariance)
    }

    fn predict(&self, mean: &Array1<f64>, covariance: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];
        let motion_cov = Array2::from_diag(&Array1::from_iter(std.iter().map(|v| v * v)));

        let mean = self.motion_mat.dot(mean);
        let covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;
        (mean, covariance)
    }

    fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        // K = P H^T S^-1, solved one row at a time since S is symmetric.
        let pht = covariance.dot(&self.update_mat.t());
        let mut kalman_gain = Array2::<f64>::zeros((2 * NDIM, NDIM));
        for (i, row) in pht.outer_iter().enumerate() {
            let k = solve(&projected_cov, row)?;
            kalman_gain.row_mut(i).assign(&k);
        }

        let innovation = Array1::from(measurement.to_vec()) - &projected_mean;

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());
        Ok((new_mean, new_covariance))
    }

    fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
        only_position: bool,
    ) -> Result<Vec<f64>> {
        let (mean, covariance) = self.project(mean, covariance);
        let dims = if only_position { 2 } else { NDIM };
        let mean = mean.slice(s![..dims]);
        let covariance = covariance.slice(s![..dims, ..dims]).to_owned();

        measurements
            .iter()
            .map(|m| {
                let d = Array1::from_iter((0..dims).map(|j| m[j] - mean[j]));
                let z = solve(&covariance, d.view())?;
                Ok(d.dot(&z))
            })
            .collect()
    }
}

fn solve(a: &Array2<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let data: Vec<f64> = a.iter().copied().collect();
    let x = Matrix::new(n, n, data)
        .solve(Vector::new(b.to_vec()))
        .map_err(|e| TrackerError::Singular(e.to_string()))?;
    Ok(Array1::from(x.data().clone()))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn initiate_sets_position_and_zero_velocity() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate([50.0, 40.0, 0.5, 100.0]);

        assert_eq!(mean.to_vec(), vec![50.0, 40.0, 0.5, 100.0, 0.0, 0.0, 0.0, 0.0]);
        // 2 * (1/20) * 100 = 10
        assert_relative_eq!(covariance[[0, 0]], 100.0, epsilon = 1e-9);
        assert_relative_eq!(covariance[[2, 2]], 1e-4, epsilon = 1e-12);
        assert_relative_eq!(covariance[[0, 1]], 0.0);
    }

    #[test]
    fn predict_moves_by_velocity_and_grows_uncertainty() {
        let kf = KalmanFilter::new();
        let (mut mean, covariance) = kf.initiate([50.0, 40.0, 0.5, 100.0]);
        mean[4] = 2.0;
        mean[5] = -1.0;

        let (predicted, predicted_cov) = kf.predict(&mean, &covariance);

        assert_relative_eq!(predicted[0], 52.0);
        assert_relative_eq!(predicted[1], 39.0);
        assert_relative_eq!(predicted[3], 100.0);
        assert!(predicted_cov[[0, 0]] > covariance[[0, 0]]);
    }

    #[test]
    fn update_pulls_mean_towards_measurement() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate([50.0, 40.0, 0.5, 100.0]);
        let (mean, covariance) = kf.predict(&mean, &covariance);

        let (updated, updated_cov) = kf.update(&mean, &covariance, [60.0, 40.0, 0.5, 100.0]).unwrap();

        assert!(updated[0] > 50.0 && updated[0] < 60.0);
        assert_relative_eq!(updated[1], 40.0, epsilon = 1e-9);
        assert!(updated_cov[[0, 0]] < covariance[[0, 0]]);
    }

    #[test]
    fn gating_distance_is_zero_at_projected_mean() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate([50.0, 40.0, 0.5, 100.0]);

        let distances = kf
            .gating_distance(
                &mean,
                &covariance,
                &[[50.0, 40.0, 0.5, 100.0], [400.0, 400.0, 0.5, 100.0]],
                false,
            )
            .unwrap();

        assert_relative_eq!(distances[0], 0.0, epsilon = 1e-9);
        assert!(distances[1] > CHI2INV95[3]);
    }

    #[test]
    fn gating_distance_on_position_ignores_shape() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate([50.0, 40.0, 0.5, 100.0]);

        let full = kf
            .gating_distance(&mean, &covariance, &[[50.0, 40.0, 2.0, 300.0]], false)
            .unwrap();
        let position = kf
            .gating_distance(&mean, &covariance, &[[50.0, 40.0, 2.0, 300.0]], true)
            .unwrap();

        assert!(full[0] > 0.0);
        assert_relative_eq!(position[0], 0.0, epsilon = 1e-9);
    }

    #[rstest]
    #[case(1, Some(3.8415))]
    #[case(2, Some(5.9915))]
    #[case(4, Some(9.4877))]
    #[case(9, Some(16.919))]
    #[case(0, None)]
    #[case(10, None)]
    fn chi2inv95_table(#[case] dof: usize, #[case] expected: Option<f64>) {
        assert_eq!(chi2inv95(dof), expected);
    }
}
