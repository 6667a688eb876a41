//! Test doubles for sensors and actuators

#![allow(dead_code)]

use head_tracker::{
    actuator::{Actuator, ActuatorCommand},
    detection::{Detection, FrameSize},
    sensors::{Detector, DirectionSample, DirectionSensor, Frame, FrameObservation, FrameSource},
    Error, Result,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

/// Standard test frame size
pub const FRAME: FrameSize = FrameSize::new(640, 480);

/// Actuator recording every command it accepts; can be switched to failing
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    commands: Arc<Mutex<Vec<ActuatorCommand>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every command while `failing` is set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Commands accepted so far
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ActuatorCommand> {
        self.commands.lock().unwrap().last().copied()
    }
}

impl Actuator for RecordingActuator {
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Actuator("robot link down".to_string()));
        }
        self.commands.lock().unwrap().push(*command);
        Ok(())
    }
}

/// A 40x40 box centered on `(cx, cy)`
pub fn target_at(cx: f32, cy: f32) -> Detection {
    Detection::centered(cx, cy, 40.0, 40.0, 0.9, 0)
}

/// Observation on the standard frame
pub fn observation(at: Instant, detections: Vec<Detection>) -> FrameObservation {
    FrameObservation::new(FRAME, detections, at)
}

/// Instant `ms` milliseconds after `start`
pub fn after(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

/// Frame carrying the detections a [`ScriptedDetector`] should report
#[derive(Debug, Clone)]
pub struct TestFrame {
    pub size: FrameSize,
    pub at: Instant,
    pub detections: Vec<Detection>,
}

impl Frame for TestFrame {
    fn size(&self) -> FrameSize {
        self.size
    }

    fn captured_at(&self) -> Instant {
        self.at
    }
}

/// Frame source replaying prepared frames
#[derive(Debug, Default)]
pub struct ScriptedFrames {
    frames: VecDeque<TestFrame>,
}

impl ScriptedFrames {
    /// `count` frames at 30 fps, all showing the same detections
    pub fn repeat(start: Instant, count: u64, detections: &[Detection]) -> Self {
        let frames = (0..count)
            .map(|i| TestFrame {
                size: FRAME,
                at: start + Duration::from_millis(i * 33),
                detections: detections.to_vec(),
            })
            .collect();
        Self { frames }
    }

    pub fn push(&mut self, frame: TestFrame) {
        self.frames.push_back(frame);
    }
}

impl FrameSource for ScriptedFrames {
    type Frame = TestFrame;

    fn next_frame(&mut self) -> Result<Option<TestFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Source whose capture device always fails
pub struct BrokenCamera;

impl FrameSource for BrokenCamera {
    type Frame = TestFrame;

    fn next_frame(&mut self) -> Result<Option<TestFrame>> {
        Err(Error::Sensor("camera unplugged".to_string()))
    }
}

/// Detector reporting whatever the frame carries, or failing on demand
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    pub fail: bool,
}

impl Detector<TestFrame> for ScriptedDetector {
    fn detect(&mut self, frame: &TestFrame) -> Result<Vec<Detection>> {
        if self.fail {
            return Err(Error::Sensor("inference failed".to_string()));
        }
        Ok(frame.detections.clone())
    }
}

/// Direction sensor replaying prepared samples
#[derive(Debug, Default)]
pub struct ScriptedDirections {
    samples: VecDeque<DirectionSample>,
}

impl ScriptedDirections {
    pub fn new(samples: Vec<DirectionSample>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

impl DirectionSensor for ScriptedDirections {
    fn poll(&mut self) -> Result<Option<DirectionSample>> {
        Ok(self.samples.pop_front())
    }
}
