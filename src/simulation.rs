//! Simulated camera, detector, speaker and robot for running the control
//! loops without hardware.
//!
//! The scene moves a target along a smooth path in world angles. The camera
//! sits on the robot head, so the pixel position of the target depends on
//! where the simulated robot was last commanded to look. Detections get
//! uniform pixel noise and random dropouts. Frames carry synthetic capture
//! times spaced at the configured frame rate.

use std::{
    f64::consts::TAU,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::{
    actuator::{Actuator, ActuatorCommand},
    detection::{Detection, FrameSize, TargetPoint},
    sensors::{Detector, DirectionSample, DirectionSensor, DoaReading, Frame, FrameSource},
    Error, Result,
};

/// Pose the simulated robot was last commanded to, radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RobotPose {
    pub head_pitch: f64,
    pub head_yaw: f64,
    pub body_yaw: f64,
    pub antennas: [f64; 2],
}

impl RobotPose {
    /// Gaze yaw in the world frame
    #[must_use]
    pub fn total_yaw(&self) -> f64 {
        self.head_yaw + self.body_yaw
    }
}

/// Robot that reaches every commanded pose instantly
#[derive(Debug, Clone, Default)]
pub struct SimulatedRobot {
    pose: Arc<Mutex<RobotPose>>,
}

impl SimulatedRobot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pose
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatePoisoned`] if a holder of the pose panicked
    pub fn pose(&self) -> Result<RobotPose> {
        self.pose
            .lock()
            .map(|pose| *pose)
            .map_err(|e| Error::StatePoisoned(e.to_string()))
    }
}

impl Actuator for SimulatedRobot {
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()> {
        let mut pose = self.pose.lock().map_err(|e| Error::StatePoisoned(e.to_string()))?;
        if let Some(head) = command.head {
            pose.head_pitch = head.pitch;
            pose.head_yaw = head.yaw;
        }
        if let Some(body_yaw) = command.body_yaw {
            pose.body_yaw = body_yaw;
        }
        if let Some(antennas) = command.antennas {
            pose.antennas = antennas;
        }
        Ok(())
    }
}

/// Scene parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub frame: FrameSize,
    pub fps: f64,
    /// Horizontal field of view in degrees
    pub fov_h_deg: f64,
    /// Vertical field of view in degrees
    pub fov_v_deg: f64,
    /// Peak target yaw in degrees, positive to the left
    pub yaw_amplitude_deg: f64,
    /// Peak target pitch in degrees, positive downward
    pub pitch_amplitude_deg: f64,
    /// Time for one full sweep of the target path
    pub period_secs: f64,
    /// Target box side in pixels
    pub box_size: f64,
    /// Uniform detector noise in pixels
    pub noise_px: f64,
    /// Probability of missing the target in a frame
    pub dropout_rate: f64,
    /// Probability of an extra detection of another class
    pub distractor_rate: f64,
    /// Class id reported for the target
    pub class_id: i32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            frame: FrameSize::new(640, 480),
            fps: 30.0,
            fov_h_deg: 60.0,
            fov_v_deg: 45.0,
            yaw_amplitude_deg: 20.0,
            pitch_amplitude_deg: 6.0,
            period_secs: 8.0,
            box_size: 60.0,
            noise_px: 3.0,
            dropout_rate: 0.05,
            distractor_rate: 0.0,
            class_id: 0,
        }
    }
}

/// Frame produced by the simulated camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedFrame {
    size: FrameSize,
    captured_at: Instant,
    /// True target position, `None` when out of view
    pub target: Option<TargetPoint>,
}

impl Frame for SimulatedFrame {
    fn size(&self) -> FrameSize {
        self.size
    }

    fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Moving target seen through a camera mounted on the simulated robot
pub struct SimulatedScene {
    config: SceneConfig,
    robot: SimulatedRobot,
    start: Instant,
    frame_index: u64,
    max_frames: Option<u64>,
}

impl SimulatedScene {
    #[must_use]
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            robot: SimulatedRobot::new(),
            start: Instant::now(),
            frame_index: 0,
            max_frames: None,
        }
    }

    /// End the stream after `max_frames` frames
    #[must_use]
    pub const fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Actuator handle moving the camera of this scene
    #[must_use]
    pub fn robot(&self) -> SimulatedRobot {
        self.robot.clone()
    }

    /// Detector with its own random stream
    #[must_use]
    pub fn detector(&self, seed: u64) -> SimulatedDetector {
        SimulatedDetector::new(&self.config, seed)
    }

    #[must_use]
    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Target world angles (yaw, pitch) in radians at `t` seconds
    #[must_use]
    pub fn target_angles(&self, t: f64) -> (f64, f64) {
        let phase = TAU * t / self.config.period_secs;
        (
            self.config.yaw_amplitude_deg.to_radians() * phase.sin(),
            self.config.pitch_amplitude_deg.to_radians() * (2.0 * phase).sin(),
        )
    }

    /// Angular distance between gaze and target at the last emitted frame, radians
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatePoisoned`] if the robot pose cannot be read
    pub fn gaze_error(&self) -> Result<f64> {
        let (target_yaw, target_pitch) = self.target_angles(self.elapsed_secs());
        let pose = self.robot.pose()?;
        Ok((target_yaw - pose.total_yaw()).hypot(target_pitch - pose.head_pitch))
    }

    fn elapsed_secs(&self) -> f64 {
        self.frame_index.saturating_sub(1) as f64 / self.config.fps
    }

    fn project(&self, t: f64) -> Result<Option<TargetPoint>> {
        let (target_yaw, target_pitch) = self.target_angles(t);
        let pose = self.robot.pose()?;
        let half_h = self.config.fov_h_deg.to_radians() / 2.0;
        let half_v = self.config.fov_v_deg.to_radians() / 2.0;
        let center = self.config.frame.center();

        // Positive yaw looks left, so a target left of the gaze appears left of center
        let rel_yaw = target_yaw - pose.total_yaw();
        let rel_pitch = target_pitch - pose.head_pitch;
        if rel_yaw.abs() > half_h || rel_pitch.abs() > half_v {
            return Ok(None);
        }
        Ok(Some(TargetPoint::new(
            center.x - rel_yaw / half_h * center.x,
            center.y + rel_pitch / half_v * center.y,
        )))
    }
}

impl FrameSource for SimulatedScene {
    type Frame = SimulatedFrame;

    fn next_frame(&mut self) -> Result<Option<SimulatedFrame>> {
        if self.max_frames.is_some_and(|max| self.frame_index >= max) {
            return Ok(None);
        }
        let t = self.frame_index as f64 / self.config.fps;
        let frame = SimulatedFrame {
            size: self.config.frame,
            captured_at: self.start + Duration::from_secs_f64(t),
            target: self.project(t)?,
        };
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Noisy detector for [`SimulatedFrame`]s
pub struct SimulatedDetector {
    rng: StdRng,
    box_size: f64,
    noise_px: f64,
    dropout_rate: f64,
    distractor_rate: f64,
    class_id: i32,
}

impl SimulatedDetector {
    #[must_use]
    pub fn new(config: &SceneConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            box_size: config.box_size,
            noise_px: config.noise_px,
            dropout_rate: config.dropout_rate.clamp(0.0, 1.0),
            distractor_rate: config.distractor_rate.clamp(0.0, 1.0),
            class_id: config.class_id,
        }
    }

    fn jitter(&mut self) -> f64 {
        if self.noise_px > 0.0 {
            self.rng.gen_range(-self.noise_px..=self.noise_px)
        } else {
            0.0
        }
    }
}

impl Detector<SimulatedFrame> for SimulatedDetector {
    fn detect(&mut self, frame: &SimulatedFrame) -> Result<Vec<Detection>> {
        let mut detections = Vec::new();

        if let Some(target) = frame.target {
            if self.rng.gen_bool(self.dropout_rate) {
                debug!("simulated dropout");
            } else {
                let cx = target.x + self.jitter();
                let cy = target.y + self.jitter();
                let confidence = self.rng.gen_range(0.6..0.95);
                detections.push(Detection::centered(
                    cx as f32,
                    cy as f32,
                    self.box_size as f32,
                    self.box_size as f32,
                    confidence,
                    self.class_id,
                ));
            }
        }

        if self.rng.gen_bool(self.distractor_rate) {
            let size = frame.size;
            let cx = self.rng.gen_range(0.0..f64::from(size.width));
            let cy = self.rng.gen_range(0.0..f64::from(size.height));
            detections.push(Detection::centered(
                cx as f32,
                cy as f32,
                self.box_size as f32,
                self.box_size as f32,
                0.5,
                self.class_id + 1,
            ));
        }

        Ok(detections)
    }
}

/// Speaker parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerConfig {
    /// Speaker direction in robot yaw degrees, positive to the left
    pub yaw_deg: f64,
    /// Sensor poll interval
    pub poll_interval_secs: f64,
    /// Length of each utterance
    pub speech_secs: f64,
    /// Silence between utterances
    pub silence_secs: f64,
    /// Uniform bearing noise in degrees
    pub noise_deg: f64,
    /// Probability of a poll without an estimate
    pub dropout_rate: f64,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            yaw_deg: 30.0,
            poll_interval_secs: 0.05,
            speech_secs: 1.5,
            silence_secs: 1.0,
            noise_deg: 3.0,
            dropout_rate: 0.05,
        }
    }
}

/// Talking speaker heard by a microphone array fixed to the robot base
pub struct SimulatedSpeaker {
    config: SpeakerConfig,
    rng: StdRng,
    start: Instant,
    sample_index: u64,
    max_samples: Option<u64>,
}

impl SimulatedSpeaker {
    #[must_use]
    pub fn new(config: SpeakerConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            start: Instant::now(),
            sample_index: 0,
            max_samples: None,
        }
    }

    #[must_use]
    pub const fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Speaker direction as robot yaw, radians
    #[must_use]
    pub fn yaw(&self) -> f64 {
        self.config.yaw_deg.to_radians()
    }

    fn speaking(&self, t: f64) -> bool {
        let cycle = self.config.speech_secs + self.config.silence_secs;
        cycle > 0.0 && t % cycle < self.config.speech_secs
    }
}

impl DirectionSensor for SimulatedSpeaker {
    fn poll(&mut self) -> Result<Option<DirectionSample>> {
        if self.max_samples.is_some_and(|max| self.sample_index >= max) {
            return Ok(None);
        }
        let t = self.sample_index as f64 * self.config.poll_interval_secs;
        let at = self.start + Duration::from_secs_f64(t);
        self.sample_index += 1;

        if self.rng.gen_bool(self.config.dropout_rate.clamp(0.0, 1.0)) {
            return Ok(Some(DirectionSample::new(None, at)));
        }

        let noise = if self.config.noise_deg > 0.0 {
            self.rng.gen_range(-self.config.noise_deg..=self.config.noise_deg)
        } else {
            0.0
        };
        // Bearing 90° is straight ahead
        let bearing_deg = 90.0 - self.config.yaw_deg + noise;
        let reading = DoaReading {
            angle: bearing_deg.to_radians(),
            active: self.speaking(t),
        };
        Ok(Some(DirectionSample::new(Some(reading), at)))
    }
}
