//! PID controllers turning target error into actuator angles.
//!
//! [`AxisController`] closes the loop on image error for one rotational axis.
//! It keeps its own last commanded angle and never reads back the physical
//! position: the actuator is assumed to reach each command within one tick.
//!
//! [`SetpointController`] steps a bearing toward a target angle and is used
//! when the target is a sound direction instead of an image position.

use crate::{
    constants::{CONTROL_LIMIT, DEFAULT_DEAD_ZONE, DEFAULT_KP, DEFAULT_OUTPUT_GAIN, INTEGRAL_LIMIT},
    detection::normalize_to_center,
    Result,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Sign relating positive normalized image error to a positive angle change.
///
/// This is a per-robot calibration constant. With the defaults, a target
/// right of center turns the head right, which is a negative yaw, and a
/// target below center increases pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDirection {
    /// Angle grows with image error
    #[default]
    Normal,
    /// Angle shrinks as image error grows
    Inverted,
}

impl RotationDirection {
    /// Numeric sign applied to the control output
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Inverted => -1.0,
        }
    }
}

/// PID gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    #[must_use]
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(DEFAULT_KP, 0.0, 0.0)
    }
}

/// PID core with a clamped raw integral accumulator
#[derive(Debug, Clone)]
struct Pid {
    gains: PidGains,
    integral: f64,
    last_error: f64,
}

impl Pid {
    const fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    /// Unclamped p + i + d for one step
    fn step(&mut self, error: f64, dt: f64, integral_limit: f64) -> f64 {
        let p = self.gains.kp * error;

        self.integral = (self.integral + error * dt).clamp(-integral_limit, integral_limit);
        let i = self.gains.ki * self.integral;

        let d = if dt > 0.0 {
            self.gains.kd * (error - self.last_error) / dt
        } else {
            0.0
        };
        self.last_error = error;

        p + i + d
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }
}

/// PID controller for one rotational axis (yaw/pan or pitch/tilt)
#[derive(Debug, Clone)]
pub struct AxisController {
    pid: Pid,
    gain: f64,
    dead_zone: f64,
    limit: f64,
    direction: RotationDirection,
    current_angle: f64,
}

impl AxisController {
    /// Create a controller.
    ///
    /// `gain` scales the normalized control output into radians per tick,
    /// `limit` bounds the commanded angle to `[-limit, limit]` radians and
    /// `dead_zone` is the normalized error below which no correction is made.
    #[must_use]
    pub fn new(gains: PidGains, gain: f64, dead_zone: f64, limit: f64, direction: RotationDirection) -> Self {
        Self {
            pid: Pid::new(gains),
            gain,
            dead_zone,
            limit: limit.abs(),
            direction,
            current_angle: 0.0,
        }
    }

    /// Controller with default gains and the given limit in degrees
    #[must_use]
    pub fn with_limit_degrees(limit_deg: f64, direction: RotationDirection) -> Self {
        Self::new(
            PidGains::default(),
            DEFAULT_OUTPUT_GAIN,
            DEFAULT_DEAD_ZONE,
            limit_deg.to_radians(),
            direction,
        )
    }

    /// Compute the next commanded angle for a target coordinate along this axis.
    ///
    /// Does not commit the angle; call [`AxisController::update`] once the
    /// command has been sent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidFrame`] when `frame_dimension` is zero
    pub fn compute(&mut self, target_coord: f64, frame_dimension: u32, dt: f64) -> Result<f64> {
        let error = normalize_to_center(target_coord, frame_dimension)?;

        if error.abs() < self.dead_zone {
            return Ok(self.current_angle);
        }

        let control = self.pid.step(error, dt, INTEGRAL_LIMIT).clamp(-CONTROL_LIMIT, CONTROL_LIMIT);
        let delta = self.direction.sign() * control * self.gain;
        let new_angle = (self.current_angle + delta).clamp(-self.limit, self.limit);

        debug!(
            "axis error {:.3} control {:.3} angle {:.4} -> {:.4}",
            error, control, self.current_angle, new_angle
        );

        Ok(new_angle)
    }

    /// Commit a new current angle, clamped to the axis limit
    pub fn update(&mut self, angle: f64) {
        self.current_angle = angle.clamp(-self.limit, self.limit);
    }

    /// Manually offset the current angle, clamped to the axis limit
    pub fn nudge(&mut self, delta: f64) -> f64 {
        self.update(self.current_angle + delta);
        self.current_angle
    }

    /// Zero angle, integral and last error
    pub fn reset(&mut self) {
        self.current_angle = 0.0;
        self.pid.reset();
    }

    /// Last committed angle in radians
    #[must_use]
    pub const fn current_angle(&self) -> f64 {
        self.current_angle
    }

    /// Raw integral accumulator, always within ±1
    #[must_use]
    pub const fn integral(&self) -> f64 {
        self.pid.integral
    }

    /// Error seen on the last PID step
    #[must_use]
    pub const fn last_error(&self) -> f64 {
        self.pid.last_error
    }

    #[must_use]
    pub const fn gains(&self) -> PidGains {
        self.pid.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.pid.gains = gains;
    }

    #[must_use]
    pub const fn output_gain(&self) -> f64 {
        self.gain
    }

    pub fn set_output_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    #[must_use]
    pub const fn dead_zone(&self) -> f64 {
        self.dead_zone
    }

    pub fn set_dead_zone(&mut self, dead_zone: f64) {
        self.dead_zone = dead_zone;
    }

    /// Angle limit in radians
    #[must_use]
    pub const fn limit(&self) -> f64 {
        self.limit
    }

    /// Change the angle limit; the current angle is pulled inside the new range
    pub fn set_limit(&mut self, limit: f64) {
        self.limit = limit.abs();
        self.current_angle = self.current_angle.clamp(-self.limit, self.limit);
    }

    #[must_use]
    pub const fn direction(&self) -> RotationDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: RotationDirection) {
        self.direction = direction;
    }
}

/// PID stepping a bearing toward a target angle
#[derive(Debug, Clone)]
pub struct SetpointController {
    pid: Pid,
    output_limit: f64,
}

impl SetpointController {
    /// Create a controller whose per-step output is bounded by `output_limit`
    #[must_use]
    pub fn new(gains: PidGains, output_limit: f64) -> Self {
        Self {
            pid: Pid::new(gains),
            output_limit: output_limit.abs(),
        }
    }

    /// Angle increment moving `current` toward `target`.
    ///
    /// Returns 0 when `dt <= 0`.
    pub fn step(&mut self, target: f64, current: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let integral_limit = if self.pid.gains.ki > 0.0 {
            self.output_limit / self.pid.gains.ki
        } else {
            self.output_limit
        };
        self.pid
            .step(target - current, dt, integral_limit)
            .clamp(-self.output_limit, self.output_limit)
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    #[must_use]
    pub const fn gains(&self) -> PidGains {
        self.pid.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.pid.gains = gains;
    }

    #[must_use]
    pub const fn output_limit(&self) -> f64 {
        self.output_limit
    }

    pub fn set_output_limit(&mut self, output_limit: f64) {
        self.output_limit = output_limit.abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn yaw_controller(kp: f64, ki: f64, kd: f64) -> AxisController {
        AxisController::new(
            PidGains::new(kp, ki, kd),
            0.08,
            0.05,
            160f64.to_radians(),
            RotationDirection::Inverted,
        )
    }

    #[test]
    fn test_dead_zone_returns_current_angle() {
        let mut controller = yaw_controller(0.8, 0.1, 0.1);
        controller.update(0.3);
        // error = (330 - 320) / 320 ≈ 0.031
        let angle = controller.compute(330.0, 640, 0.033).unwrap();
        assert_eq!(angle, 0.3);
        assert_eq!(controller.integral(), 0.0);
    }

    #[test]
    fn test_proportional_step_and_sign() {
        let mut controller = yaw_controller(0.8, 0.0, 0.0);
        let angle = controller.compute(400.0, 640, 0.033).unwrap();
        assert!((angle + 0.016).abs() < 1e-12);
        // compute does not commit
        assert_eq!(controller.current_angle(), 0.0);

        let mut pitch = AxisController::new(PidGains::new(0.8, 0.0, 0.0), 0.08, 0.05, 0.6, RotationDirection::Normal);
        let angle = pitch.compute(300.0, 480, 0.033).unwrap();
        assert!((angle - 0.016).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dt_has_no_derivative() {
        let mut controller = yaw_controller(0.0, 0.0, 1.0);
        let angle = controller.compute(400.0, 640, 0.0).unwrap();
        assert_eq!(angle, 0.0);
        let angle = controller.compute(400.0, 640, -1.0).unwrap();
        assert!(angle.is_finite());
    }

    #[test]
    fn test_zero_frame_dimension_is_an_error() {
        let mut controller = yaw_controller(0.5, 0.0, 0.0);
        assert!(controller.compute(10.0, 0, 0.033).is_err());
    }

    #[test]
    fn test_integral_anti_windup() {
        let mut controller = yaw_controller(0.5, 1.0, 0.0);
        for _ in 0..1000 {
            let angle = controller.compute(640.0, 640, 0.1).unwrap();
            controller.update(angle);
            assert!(controller.integral().abs() <= 1.0);
        }
        assert_eq!(controller.integral(), 1.0);
        assert!((controller.current_angle() + 160f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_reset_and_nudge() {
        let mut controller = yaw_controller(0.5, 1.0, 0.2);
        let angle = controller.compute(600.0, 640, 0.05).unwrap();
        controller.update(angle);
        controller.reset();
        assert_eq!(controller.current_angle(), 0.0);
        assert_eq!(controller.integral(), 0.0);
        assert_eq!(controller.last_error(), 0.0);

        let limit = controller.limit();
        assert_eq!(controller.nudge(10.0), limit);
    }

    #[test]
    fn test_setpoint_controller_steps_toward_target() {
        let mut controller = SetpointController::new(PidGains::new(0.6, 0.01, 0.3), 35f64.to_radians());
        let target = 0.5;
        let mut current = 0.0;
        for _ in 0..200 {
            current += controller.step(target, current, 0.5);
        }
        assert!((current - target).abs() < 0.01);
        assert_eq!(controller.step(target, current, 0.0), 0.0);
    }

    #[test]
    fn test_setpoint_output_is_bounded() {
        let limit = 0.1;
        let mut controller = SetpointController::new(PidGains::new(5.0, 1.0, 1.0), limit);
        let output = controller.step(3.0, 0.0, 0.05);
        assert_eq!(output, limit);
    }

    proptest! {
        #[test]
        fn prop_output_stays_within_limit(
            coords in proptest::collection::vec(-200.0f64..840.0, 1..50),
            kp in 0.0f64..50.0,
            ki in 0.0f64..50.0,
            kd in 0.0f64..50.0,
            gain in 0.0f64..10.0,
            dt in -0.1f64..1.0,
        ) {
            let limit = 35f64.to_radians();
            let mut controller = AxisController::new(PidGains::new(kp, ki, kd), gain, 0.05, limit, RotationDirection::Normal);
            for coord in coords {
                let angle = controller.compute(coord, 640, dt).unwrap();
                prop_assert!(angle.abs() <= limit + 1e-12);
                prop_assert!(controller.integral().abs() <= 1.0);
                controller.update(angle);
            }
        }
    }
}
