use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};
use super::TargetFilter;
use crate::constants::{DEFAULT_KALMAN_MEASUREMENT_NOISE, DEFAULT_KALMAN_PROCESS_NOISE, KALMAN_INITIAL_COVARIANCE};

type Matrix2x4<T> = nalgebra::Matrix<T, nalgebra::U2, nalgebra::U4, nalgebra::ArrayStorage<T, 2, 4>>;

/// Kalman smoother for target position in pixel coordinates.
///
/// Lower process noise trusts the motion model more (smoother, more lag);
/// lower measurement noise trusts each detection more (less lag, more jitter).
pub struct KalmanSmoother {
    // State: [x, y, vx, vy]
    state: Vector4<f64>,
    // State covariance
    covariance: Matrix4<f64>,
    // Process noise
    process_noise: Matrix4<f64>,
    // Measurement noise
    measurement_noise: Matrix2<f64>,
    // State transition matrix, one frame per step
    transition: Matrix4<f64>,
    // Measurement matrix
    measurement: Matrix2x4<f64>,
    initialized: bool,
}

impl KalmanSmoother {
    /// Create a smoother with scalar process and measurement noise
    ///
    /// # Panics
    ///
    /// Panics if either noise scale is not positive
    #[must_use]
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        assert!(process_noise > 0.0, "Process noise must be positive, got {}", process_noise);
        assert!(
            measurement_noise > 0.0,
            "Measurement noise must be positive, got {}",
            measurement_noise
        );

        // Constant velocity, dt = 1 frame
        let transition = Matrix4::new(
            1.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        // Measurement matrix (we only measure position)
        let measurement = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity() * KALMAN_INITIAL_COVARIANCE,
            process_noise: Matrix4::identity() * process_noise,
            measurement_noise: Matrix2::identity() * measurement_noise,
            transition,
            measurement,
            initialized: false,
        }
    }

    /// Feed a measurement and return the corrected position.
    ///
    /// The first measurement initializes the state and is returned unchanged.
    pub fn update(&mut self, mx: f64, my: f64) -> (f64, f64) {
        if !self.initialized {
            self.state = Vector4::new(mx, my, 0.0, 0.0);
            self.covariance = Matrix4::identity() * KALMAN_INITIAL_COVARIANCE;
            self.initialized = true;
            return (mx, my);
        }

        self.step_prediction();
        self.correct(Vector2::new(mx, my));

        (self.state[0], self.state[1])
    }

    /// Extrapolate the position one frame ahead without a measurement.
    ///
    /// Returns `None` before the first measurement.
    pub fn predict(&mut self) -> Option<(f64, f64)> {
        if !self.initialized {
            return None;
        }
        self.step_prediction();
        Some((self.state[0], self.state[1]))
    }

    /// Whether a measurement has been seen since construction or reset
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current velocity estimate in pixels per frame
    #[must_use]
    pub fn velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    fn step_prediction(&mut self) {
        self.state = self.transition * self.state;
        self.covariance = self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    fn correct(&mut self, measurement: Vector2<f64>) {
        // Innovation
        let innovation = measurement - self.measurement * self.state;

        // Innovation covariance
        let innovation_cov = self.measurement * self.covariance * self.measurement.transpose() + self.measurement_noise;

        // Keep the prediction if the innovation covariance is singular
        let Some(innovation_inv) = innovation_cov.try_inverse() else {
            log::warn!("Kalman innovation covariance is singular, skipping correction");
            return;
        };

        let gain = self.covariance * self.measurement.transpose() * innovation_inv;

        self.state += gain * innovation;

        let identity = Matrix4::identity();
        self.covariance = (identity - gain * self.measurement) * self.covariance;
    }
}

impl Default for KalmanSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_KALMAN_PROCESS_NOISE, DEFAULT_KALMAN_MEASUREMENT_NOISE)
    }
}

impl TargetFilter for KalmanSmoother {
    fn apply(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.update(x, y)
    }

    fn predict(&mut self) -> Option<(f64, f64)> {
        Self::predict(self)
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity() * KALMAN_INITIAL_COVARIANCE;
        self.initialized = false;
    }

    fn name(&self) -> &str {
        "KalmanSmoother"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_returns_measurement() {
        let mut filter = KalmanSmoother::default();
        assert_eq!(filter.update(412.0, 198.0), (412.0, 198.0));
        assert!(filter.is_initialized());
    }

    #[test]
    fn test_second_measurement_is_smoothed() {
        let mut filter = KalmanSmoother::default();
        filter.update(100.0, 200.0);

        let (x, y) = filter.update(110.0, 210.0);
        assert!(x > 100.0 && x < 110.0);
        assert!(y > 200.0 && y < 210.0);
    }

    #[test]
    fn test_predict_requires_initialization() {
        let mut filter = KalmanSmoother::default();
        assert!(filter.predict().is_none());
    }

    #[test]
    fn test_predict_extrapolates_motion() {
        let mut filter = KalmanSmoother::new(0.01, 0.1);
        for i in 0..60 {
            let x = 100.0 + 5.0 * i as f64;
            filter.update(x, 240.0);
        }
        let (vx, _) = filter.velocity();
        assert!(vx > 3.0, "velocity estimate should approach 5 px/frame, got {vx}");

        let last = filter.update(400.0, 240.0);
        let (px, py) = filter.predict().unwrap();
        assert!(px > last.0);
        assert!((py - 240.0).abs() < 1.0);
    }

    #[test]
    fn test_reset() {
        let mut filter = KalmanSmoother::default();
        filter.update(10.0, 10.0);
        filter.update(12.0, 12.0);
        filter.reset();
        assert!(!filter.is_initialized());
        assert!(filter.predict().is_none());
        assert_eq!(filter.update(300.0, 50.0), (300.0, 50.0));
    }
}
