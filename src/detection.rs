//! Detection data model shared by the selector, filters and controllers.
//!
//! Detections arrive from an external detector in pixel coordinates of the
//! current frame. They are consumed within the tick that produced them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create a new frame size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric center of the frame
    #[must_use]
    pub fn center(&self) -> TargetPoint {
        TargetPoint::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }

    /// Fail when either dimension is zero
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] for a zero width or height
    pub fn ensure_valid(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidFrame(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A single bounding box reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    pub class_id: i32,
}

impl Detection {
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    /// Box centered on `(cx, cy)` with the given size, mostly useful for tests and simulation
    #[must_use]
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32, confidence: f32, class_id: i32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
            confidence,
            class_id,
        )
    }

    /// Center of the bounding box
    #[must_use]
    pub fn center(&self) -> TargetPoint {
        TargetPoint::new(
            (f64::from(self.x1) + f64::from(self.x2)) / 2.0,
            (f64::from(self.y1) + f64::from(self.y2)) / 2.0,
        )
    }

    /// Box area in square pixels
    #[must_use]
    pub fn area(&self) -> f64 {
        (f64::from(self.x2) - f64::from(self.x1)) * (f64::from(self.y2) - f64::from(self.y1))
    }

    /// Corners are ordered and finite
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }
}

/// Target position in pixel coordinates of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetPoint {
    pub x: f64,
    pub y: f64,
}

impl TargetPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Error of this point relative to the frame center
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] if the frame has a zero dimension
    pub fn normalized_error(&self, frame: FrameSize) -> Result<NormalizedError> {
        Ok(NormalizedError {
            ex: normalize_to_center(self.x, frame.width)?,
            ey: normalize_to_center(self.y, frame.height)?,
        })
    }

    /// Keep the point within a band around the frame center.
    ///
    /// Offsets are fractions of the frame dimension, e.g. 0.45 allows the
    /// point to sit at most 45% of the width away from the center.
    #[must_use]
    pub fn clamp_to_safe_zone(
        &self,
        frame: FrameSize,
        max_horizontal_offset: Option<f64>,
        max_vertical_offset: Option<f64>,
    ) -> Self {
        let center = frame.center();
        let clamp_axis = |value: f64, center: f64, dim: u32, offset: Option<f64>| match offset {
            Some(fraction) => {
                let max_offset = f64::from(dim) * fraction;
                value.clamp(center - max_offset, center + max_offset)
            }
            None => value,
        };
        Self {
            x: clamp_axis(self.x, center.x, frame.width, max_horizontal_offset),
            y: clamp_axis(self.y, center.y, frame.height, max_vertical_offset),
        }
    }
}

/// Target offset from frame center, nominally in [-1, 1] per axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedError {
    pub ex: f64,
    pub ey: f64,
}

/// Normalize a pixel coordinate so that the frame center maps to 0 and the edges to ±1.
///
/// Values slightly beyond ±1 are possible when the target is partly off-frame.
///
/// # Errors
///
/// Returns [`Error::InvalidFrame`] when `dimension` is zero
pub fn normalize_to_center(coord: f64, dimension: u32) -> Result<f64> {
    if dimension == 0 {
        return Err(Error::InvalidFrame(
            "cannot normalize against a zero frame dimension".to_string(),
        ));
    }
    let half = f64::from(dimension) / 2.0;
    Ok((coord - half) / half)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_center_and_area() {
        let det = Detection::new(100.0, 50.0, 200.0, 150.0, 0.9, 39);
        let center = det.center();
        assert_eq!(center.x, 150.0);
        assert_eq!(center.y, 100.0);
        assert_eq!(det.area(), 10_000.0);
        assert!(det.is_valid());
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(!Detection::new(10.0, 10.0, 10.0, 20.0, 0.5, 0).is_valid());
        assert!(!Detection::new(f32::NAN, 10.0, 20.0, 20.0, 0.5, 0).is_valid());
    }

    #[test]
    fn test_normalize_to_center() {
        assert_eq!(normalize_to_center(320.0, 640).unwrap(), 0.0);
        assert_eq!(normalize_to_center(0.0, 640).unwrap(), -1.0);
        assert_eq!(normalize_to_center(640.0, 640).unwrap(), 1.0);
        assert!((normalize_to_center(400.0, 640).unwrap() - 0.25).abs() < 1e-12);
        assert!(normalize_to_center(10.0, 0).is_err());
    }

    #[test]
    fn test_normalized_error_zero_frame() {
        let point = TargetPoint::new(10.0, 10.0);
        assert!(point.normalized_error(FrameSize::new(640, 0)).is_err());
        assert!(FrameSize::new(0, 480).ensure_valid().is_err());
    }

    #[test]
    fn test_clamp_to_safe_zone() {
        let frame = FrameSize::new(640, 480);
        let point = TargetPoint::new(630.0, 5.0);
        let clamped = point.clamp_to_safe_zone(frame, Some(0.45), Some(0.40));
        assert!((clamped.x - (320.0 + 288.0)).abs() < 1e-9);
        assert!((clamped.y - (240.0 - 192.0)).abs() < 1e-9);

        let untouched = point.clamp_to_safe_zone(frame, None, None);
        assert_eq!(untouched, point);
    }
}
