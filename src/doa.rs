//! Direction-of-arrival bearing conversion.
//!
//! The microphone array reports a bearing in radians where 90° is straight
//! ahead. The robot uses yaw 0 for straight ahead with positive yaw to the
//! left, so the conversion is `yaw = 90° - bearing`, wrapped into ±180°.

/// Convert a DoA bearing (radians) to a robot yaw (radians) in `[-π, π]`
#[must_use]
pub fn doa_to_robot_yaw(doa_angle: f64) -> f64 {
    let yaw_deg = wrap_degrees(90.0 - doa_angle.to_degrees());
    yaw_deg.to_radians()
}

/// Wrap an angle in degrees into `(-180, 180]`; non-finite input is returned as is
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
