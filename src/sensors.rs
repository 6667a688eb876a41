//! Interfaces to the sensing side: camera frames, the object detector and the
//! audio direction sensor.
//!
//! Capture and inference live outside this crate. Implementations only need
//! to hand over frames with their size and capture time, and detections in
//! pixel coordinates of that frame.

use std::time::Instant;

use serde::Serialize;

use crate::{
    detection::{Detection, FrameSize},
    Result,
};

/// A captured camera frame
pub trait Frame {
    /// Frame dimensions in pixels
    fn size(&self) -> FrameSize;

    /// Capture time
    fn captured_at(&self) -> Instant;
}

/// Blocking source of camera frames
pub trait FrameSource {
    type Frame: Frame;

    /// Read the next frame; `Ok(None)` means the stream ended
    ///
    /// # Errors
    ///
    /// Returns an error if the capture device fails
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// Object detector running on frames of type `F`
pub trait Detector<F> {
    /// Detect objects in `frame`, in pixel coordinates of that frame
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>>;
}

/// Detector output for one frame, as consumed by the tracking session
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub size: FrameSize,
    pub detections: Vec<Detection>,
    pub captured_at: Instant,
}

impl FrameObservation {
    #[must_use]
    pub const fn new(size: FrameSize, detections: Vec<Detection>, captured_at: Instant) -> Self {
        Self {
            size,
            detections,
            captured_at,
        }
    }

    /// Observation of `frame` with the given detections
    #[must_use]
    pub fn from_frame<F: Frame>(frame: &F, detections: Vec<Detection>) -> Self {
        Self::new(frame.size(), detections, frame.captured_at())
    }
}

/// One direction-of-arrival reading from the microphone array
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoaReading {
    /// Bearing in radians, 90° is straight ahead
    pub angle: f64,
    /// Speech detected
    pub active: bool,
}

/// A timestamped poll of the direction sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSample {
    /// `None` when the sensor had no estimate this poll
    pub reading: Option<DoaReading>,
    pub at: Instant,
}

impl DirectionSample {
    #[must_use]
    pub const fn new(reading: Option<DoaReading>, at: Instant) -> Self {
        Self { reading, at }
    }

    /// Whether the sample carries an active speech reading
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.reading.is_some_and(|reading| reading.active)
    }
}

/// Blocking source of direction samples
pub trait DirectionSensor {
    /// Poll the sensor; `Ok(None)` means the stream ended
    ///
    /// # Errors
    ///
    /// Returns an error if the audio front-end fails
    fn poll(&mut self) -> Result<Option<DirectionSample>>;
}
