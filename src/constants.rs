//! Constants used throughout the tracker

/// Default frames per second assumption, used for the first tick's dt
pub const DEFAULT_FPS: f64 = 30.0;

/// Position filter defaults
pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_JUMP_THRESHOLD: f64 = 30.0;

/// Kalman smoother defaults
pub const DEFAULT_KALMAN_PROCESS_NOISE: f64 = 0.001;
pub const DEFAULT_KALMAN_MEASUREMENT_NOISE: f64 = 0.1;
pub const KALMAN_INITIAL_COVARIANCE: f64 = 1.0;

/// Exponential smoothing factor used by the two-stage smoother
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.3;

/// Axis controller defaults
pub const DEFAULT_DEAD_ZONE: f64 = 0.05;
pub const DEFAULT_OUTPUT_GAIN: f64 = 0.08;
pub const DEFAULT_KP: f64 = 0.5;
pub const DEFAULT_YAW_LIMIT_DEG: f64 = 160.0;
pub const DEFAULT_PITCH_LIMIT_DEG: f64 = 35.0;

/// Integral accumulator bound (before scaling by Ki)
pub const INTEGRAL_LIMIT: f64 = 1.0;

/// Normalized control output bound
pub const CONTROL_LIMIT: f64 = 1.0;

/// Hybrid allocation: head carries yaw up to this angle
pub const DEFAULT_HEAD_YAW_LIMIT_DEG: f64 = 25.0;

/// Bearing tracking ranges per mode
pub const HEAD_ONLY_YAW_RANGE_DEG: f64 = 35.0;
pub const BODY_YAW_RANGE_DEG: f64 = 160.0;

/// Timeouts
pub const DEFAULT_DETECTION_TIMEOUT_SECS: f64 = 1.0;
pub const DEFAULT_SOUND_TIMEOUT_SECS: f64 = 2.0;
pub const DEFAULT_NEUTRAL_DURATION_SECS: f64 = 1.0;

/// Activity gate defaults
pub const DEFAULT_GATE_COOLDOWN_SECS: f64 = 0.5;
