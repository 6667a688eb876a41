//! Tracking state machine tying selection, filtering, control and actuation together.
//!
//! A [`TrackingSession`] consumes one observation per tick, either detections
//! for a camera frame or a direction-of-arrival sample, and sends at most one
//! tracking command to the actuator. Losing the target for longer than the
//! configured timeout resets all controller and filter state and returns the
//! robot to a neutral pose.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    activity_gate::ActivityGate,
    actuator::{Actuator, ActuatorCommand},
    allocation::{split_yaw, TrackingMode, YawSplit},
    config::{SoundConfig, TrackerConfig},
    constants::DEFAULT_FPS,
    controller::{AxisController, SetpointController},
    detection::{FrameSize, NormalizedError, TargetPoint},
    doa::doa_to_robot_yaw,
    filters::TargetFilter,
    sensors::{DirectionSample, FrameObservation},
    target_selector::TargetSelector,
    Result,
};

/// Tracking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No target, robot at rest
    #[default]
    Idle,
    /// Target seen, waiting for the activity gate to confirm it
    Detecting,
    /// Actively steering toward the target
    Tracking,
    /// Target timed out, robot returned to neutral
    Lost,
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
            Self::Tracking => "tracking",
            Self::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// State after the tick
    pub state: TrackingState,
    /// Smoothed (and safe-zone clamped) point the controllers steered toward
    pub filtered: Option<TargetPoint>,
    /// Command sent to the actuator this tick
    pub command: Option<ActuatorCommand>,
    /// Whether the actuator accepted the command
    pub delivered: bool,
}

impl TickOutcome {
    const fn hold(state: TrackingState) -> Self {
        Self {
            state,
            filtered: None,
            command: None,
            delivered: false,
        }
    }
}

/// Running counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    /// Observations processed
    pub ticks: u64,
    /// Observations carrying a usable target
    pub detections: u64,
    /// Transitions into tracking
    pub activations: u64,
    /// Commands accepted by the actuator
    pub commands_sent: u64,
    /// Commands the actuator rejected
    pub actuator_failures: u64,
    /// Targets lost to the detection timeout
    pub timeouts: u64,
}

/// Snapshot of the session for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: TrackingState,
    pub mode: TrackingMode,
    /// Total commanded yaw, radians
    pub yaw: f64,
    /// Commanded pitch, radians
    pub pitch: f64,
    /// How the last yaw command was split across head and body
    pub split: YawSplit,
    pub last_target: Option<TargetPoint>,
    pub last_filtered: Option<TargetPoint>,
    /// Offset of the steering point from frame center
    pub last_error: Option<NormalizedError>,
    /// Automatic actuation suspended, only [`TrackingSession::nudge`] moves the robot
    pub manual: bool,
    /// Robot yaw the sound tracker steers toward, radians
    pub bearing_target: Option<f64>,
    pub stats: SessionStats,
}

/// Closed-loop tracking session for one robot
pub struct TrackingSession {
    config: TrackerConfig,
    selector: TargetSelector,
    filter: Box<dyn TargetFilter>,
    yaw: AxisController,
    pitch: AxisController,
    bearing: SetpointController,
    gate: ActivityGate,
    state: TrackingState,
    last_tick: Option<Instant>,
    last_detection: Option<Instant>,
    last_control: Option<Instant>,
    bearing_target: Option<f64>,
    pending_antennas: Option<[f64; 2]>,
    split: YawSplit,
    last_target: Option<TargetPoint>,
    last_filtered: Option<TargetPoint>,
    last_error: Option<NormalizedError>,
    manual: bool,
    stats: SessionStats,
}

impl TrackingSession {
    /// Create a session from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let filter = config.create_filter()?;
        info!(
            "Tracking session: mode {}, filter {}",
            config.tracking.mode,
            filter.name()
        );

        Ok(Self {
            selector: config.tracking.selector(),
            filter,
            yaw: config.yaw.build(),
            pitch: config.pitch.build(),
            bearing: config.sound.build(config.tracking.mode),
            gate: config.gate.build(),
            state: TrackingState::Idle,
            last_tick: None,
            last_detection: None,
            last_control: None,
            bearing_target: None,
            pending_antennas: None,
            split: YawSplit { head: 0.0, body: None },
            last_target: None,
            last_filtered: None,
            last_error: None,
            manual: false,
            stats: SessionStats::default(),
            config,
        })
    }

    /// Process the detections of one camera frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidFrame`] for a zero frame dimension.
    /// Actuator failures are logged and reported in the outcome, not returned.
    pub fn on_frame<A: Actuator + ?Sized>(
        &mut self,
        observation: &FrameObservation,
        actuator: &mut A,
    ) -> Result<TickOutcome> {
        observation.size.ensure_valid()?;
        let now = observation.captured_at;
        let dt = self.tick_dt(now);
        self.stats.ticks += 1;

        match self.selector.select(&observation.detections, observation.size) {
            Some(detection) => self.on_target(detection.center(), observation.size, now, dt, actuator),
            None => self.on_gap(observation.size, now, dt, actuator),
        }
    }

    /// Process one direction-of-arrival sample.
    ///
    /// Speech passes through the activity gate; each time it fires the
    /// bearing target moves to the reported direction. While tracking, the
    /// yaw is stepped toward the target once per control interval.
    ///
    /// # Errors
    ///
    /// Currently infallible; actuator failures are logged.
    pub fn on_direction<A: Actuator + ?Sized>(
        &mut self,
        sample: &DirectionSample,
        actuator: &mut A,
    ) -> Result<TickOutcome> {
        let now = sample.at;
        self.last_tick = Some(now);
        self.stats.ticks += 1;

        if let Some(reading) = sample.reading {
            self.stats.detections += 1;
            if self.gate.update_at(reading.active, now) {
                let target = doa_to_robot_yaw(reading.angle);
                debug!(
                    "speech at {:.1}°, bearing target {:.1}°",
                    reading.angle.to_degrees(),
                    target.to_degrees()
                );
                self.bearing_target = Some(target);
                self.last_detection = Some(now);
                if self.state != TrackingState::Tracking {
                    self.enter_tracking();
                }
            }
        }

        if self.state != TrackingState::Tracking {
            return Ok(TickOutcome::hold(self.state));
        }

        if self.timed_out(now, self.config.sound.detection_timeout()) {
            return Ok(self.lose_target(actuator));
        }

        if self.manual {
            return Ok(TickOutcome::hold(self.state));
        }

        let control_speed = self.config.sound.control_speed();
        let dt = match self.last_control {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous);
                if elapsed < control_speed {
                    return Ok(TickOutcome::hold(self.state));
                }
                elapsed
            }
            None => control_speed,
        };
        self.last_control = Some(now);

        let Some(target) = self.bearing_target else {
            return Ok(TickOutcome::hold(self.state));
        };

        let mode = self.config.tracking.mode;
        let current = self.yaw.current_angle();
        let range = mode.yaw_range();
        let step = self.bearing.step(target, current, dt.as_secs_f64());
        let yaw = (current + step).clamp(-range, range);

        let pitch = self.pitch.current_angle();
        let split = split_yaw(mode, yaw, self.config.tracking.head_yaw_limit());
        let command = ActuatorCommand::head(pitch, split.head)
            .with_body_yaw(split.body)
            .with_antennas(self.pending_antennas)
            .with_duration(Some(control_speed));

        let delivered = self.send(actuator, &command);
        if delivered {
            self.yaw.update(yaw);
            self.split = split;
        }

        Ok(TickOutcome {
            state: self.state,
            filtered: None,
            command: Some(command),
            delivered,
        })
    }

    /// Return to idle, clear all tracking state and command the neutral pose.
    ///
    /// State is reset even if the actuator rejects the command.
    ///
    /// # Errors
    ///
    /// Returns the actuator error if the neutral pose could not be sent
    pub fn reset<A: Actuator + ?Sized>(&mut self, actuator: &mut A) -> Result<()> {
        info!("Resetting tracking session");
        self.state = TrackingState::Idle;
        self.reset_tracking();
        self.last_tick = None;

        let command = self.neutral_command();
        if let Err(e) = actuator.set_target(&command) {
            self.stats.actuator_failures += 1;
            return Err(e);
        }
        self.stats.commands_sent += 1;
        Ok(())
    }

    /// Replace the configuration at runtime.
    ///
    /// Gains, limits, dead zones and timeouts take effect on the next tick
    /// without disturbing the controllers. A changed filter or gate is
    /// rebuilt from scratch; a changed mode resets the controllers.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the session untouched if `config` is invalid
    pub fn apply_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        let new_filter = if config.filter == self.config.filter {
            None
        } else {
            Some(config.create_filter()?)
        };

        config.yaw.apply_to(&mut self.yaw);
        config.pitch.apply_to(&mut self.pitch);
        self.selector = config.tracking.selector();
        self.bearing.set_gains(config.sound.gains());
        self.bearing
            .set_output_limit(SoundConfig::output_limit(config.tracking.mode));

        if let Some(filter) = new_filter {
            info!("Filter changed: {} -> {}", self.filter.name(), filter.name());
            self.filter = filter;
        }

        if config.gate != self.config.gate {
            debug!("Activity gate reconfigured");
            self.gate = config.gate.build();
        }

        if config.tracking.mode != self.config.tracking.mode {
            info!(
                "Tracking mode changed: {} -> {}",
                self.config.tracking.mode, config.tracking.mode
            );
            self.yaw.reset();
            self.pitch.reset();
            self.bearing.reset();
            self.filter.reset();
        }

        self.config = config;
        Ok(())
    }

    /// Suspend or resume automatic actuation.
    ///
    /// In manual mode targets are still selected and filtered but no
    /// tracking command is sent; the pose only changes through
    /// [`TrackingSession::nudge`]. A lost target no longer returns the robot
    /// to neutral while manual.
    pub fn set_manual(&mut self, manual: bool) {
        if manual != self.manual {
            info!("Manual control {}", if manual { "enabled" } else { "disabled" });
        }
        self.manual = manual;
    }

    #[must_use]
    pub const fn is_manual(&self) -> bool {
        self.manual
    }

    /// Offset the commanded pitch and yaw by the given deltas in radians and
    /// send the resulting pose.
    ///
    /// Angles stay within the axis limits and the yaw range of the current
    /// mode. They are only kept if the actuator accepts the command.
    ///
    /// # Errors
    ///
    /// Returns the actuator error if the command could not be sent
    pub fn nudge<A: Actuator + ?Sized>(
        &mut self,
        pitch_delta: f64,
        yaw_delta: f64,
        actuator: &mut A,
    ) -> Result<ActuatorCommand> {
        let previous = (self.pitch.current_angle(), self.yaw.current_angle());
        let range = self.config.tracking.mode.yaw_range();
        let pitch = self.pitch.nudge(pitch_delta);
        let nudged = self.yaw.nudge(yaw_delta);
        self.yaw.update(nudged.clamp(-range, range));
        let yaw = self.yaw.current_angle();

        let tracking = &self.config.tracking;
        let split = split_yaw(tracking.mode, yaw, tracking.head_yaw_limit());
        let command = ActuatorCommand::head(pitch, split.head)
            .with_body_yaw(split.body)
            .with_duration(tracking.command_duration());
        debug!("manual nudge to pitch {:.4} yaw {:.4}", pitch, yaw);

        if let Err(e) = actuator.set_target(&command) {
            self.pitch.update(previous.0);
            self.yaw.update(previous.1);
            self.stats.actuator_failures += 1;
            return Err(e);
        }
        self.stats.commands_sent += 1;
        self.split = split;
        Ok(command)
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            mode: self.config.tracking.mode,
            yaw: self.yaw.current_angle(),
            pitch: self.pitch.current_angle(),
            split: self.split,
            last_target: self.last_target,
            last_filtered: self.last_filtered,
            last_error: self.last_error,
            manual: self.manual,
            bearing_target: self.bearing_target,
            stats: self.stats,
        }
    }

    #[must_use]
    pub const fn state(&self) -> TrackingState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub const fn yaw_controller(&self) -> &AxisController {
        &self.yaw
    }

    #[must_use]
    pub const fn pitch_controller(&self) -> &AxisController {
        &self.pitch
    }

    fn tick_dt(&mut self, now: Instant) -> f64 {
        let dt = self
            .last_tick
            .map_or(1.0 / DEFAULT_FPS, |previous| now.saturating_duration_since(previous).as_secs_f64());
        self.last_tick = Some(now);
        dt
    }

    fn on_target<A: Actuator + ?Sized>(
        &mut self,
        point: TargetPoint,
        frame: FrameSize,
        now: Instant,
        dt: f64,
        actuator: &mut A,
    ) -> Result<TickOutcome> {
        self.stats.detections += 1;
        self.last_target = Some(point);

        if self.state != TrackingState::Tracking {
            if self.config.tracking.require_confirmation && !self.gate.update_at(true, now) {
                if self.state != TrackingState::Detecting {
                    debug!("Target seen, waiting for confirmation");
                }
                self.state = TrackingState::Detecting;
                return Ok(TickOutcome::hold(self.state));
            }
            self.enter_tracking();
        }

        self.last_detection = Some(now);
        let (x, y) = self.filter.apply(point.x, point.y);
        self.drive(TargetPoint::new(x, y), frame, dt, actuator)
    }

    fn on_gap<A: Actuator + ?Sized>(
        &mut self,
        frame: FrameSize,
        now: Instant,
        dt: f64,
        actuator: &mut A,
    ) -> Result<TickOutcome> {
        match self.state {
            TrackingState::Tracking => {
                if self.timed_out(now, self.config.tracking.detection_timeout()) {
                    return Ok(self.lose_target(actuator));
                }
                if self.config.tracking.coast_on_gap {
                    if let Some((x, y)) = self.filter.predict() {
                        return self.drive(TargetPoint::new(x, y), frame, dt, actuator);
                    }
                }
                Ok(TickOutcome::hold(self.state))
            }
            TrackingState::Detecting => {
                self.gate.update_at(false, now);
                self.state = TrackingState::Idle;
                Ok(TickOutcome::hold(self.state))
            }
            TrackingState::Idle | TrackingState::Lost => {
                if self.config.tracking.require_confirmation {
                    self.gate.update_at(false, now);
                }
                Ok(TickOutcome::hold(self.state))
            }
        }
    }

    fn drive<A: Actuator + ?Sized>(
        &mut self,
        point: TargetPoint,
        frame: FrameSize,
        dt: f64,
        actuator: &mut A,
    ) -> Result<TickOutcome> {
        let tracking = &self.config.tracking;
        let point = point.clamp_to_safe_zone(frame, tracking.max_horizontal_offset, tracking.max_vertical_offset);
        self.last_filtered = Some(point);
        let error = point.normalized_error(frame)?;
        self.last_error = Some(error);

        if self.manual {
            debug!("manual: target error ({:.3}, {:.3})", error.ex, error.ey);
            return Ok(TickOutcome {
                state: self.state,
                filtered: Some(point),
                command: None,
                delivered: false,
            });
        }

        let range = tracking.mode.yaw_range();
        let yaw = self.yaw.compute(point.x, frame.width, dt)?.clamp(-range, range);
        let pitch = self.pitch.compute(point.y, frame.height, dt)?;

        let split = split_yaw(tracking.mode, yaw, tracking.head_yaw_limit());
        let command = ActuatorCommand::head(pitch, split.head)
            .with_body_yaw(split.body)
            .with_antennas(self.pending_antennas)
            .with_duration(tracking.command_duration());

        let delivered = self.send(actuator, &command);
        if delivered {
            self.yaw.update(yaw);
            self.pitch.update(pitch);
            self.split = split;
        }

        Ok(TickOutcome {
            state: self.state,
            filtered: Some(point),
            command: Some(command),
            delivered,
        })
    }

    fn enter_tracking(&mut self) {
        info!("Target acquired, tracking ({} mode)", self.config.tracking.mode);
        self.state = TrackingState::Tracking;
        self.stats.activations += 1;
        self.pending_antennas = self.config.antennas.active();
    }

    fn lose_target<A: Actuator + ?Sized>(&mut self, actuator: &mut A) -> TickOutcome {
        self.state = TrackingState::Lost;
        self.stats.timeouts += 1;

        if self.manual {
            info!("Target lost, holding manual pose");
            self.filter.reset();
            self.gate.reset();
            self.last_detection = None;
            self.bearing_target = None;
            self.last_error = None;
            return TickOutcome::hold(self.state);
        }

        info!("Target lost, returning to neutral");
        self.reset_tracking();

        let command = self.neutral_command();
        let delivered = self.send(actuator, &command);

        TickOutcome {
            state: self.state,
            filtered: None,
            command: Some(command),
            delivered,
        }
    }

    fn timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.last_detection
            .map_or(true, |last| now.saturating_duration_since(last) > timeout)
    }

    fn reset_tracking(&mut self) {
        self.yaw.reset();
        self.pitch.reset();
        self.bearing.reset();
        self.filter.reset();
        self.gate.reset();
        self.last_detection = None;
        self.last_control = None;
        self.bearing_target = None;
        self.pending_antennas = None;
        self.last_error = None;
        self.split = YawSplit {
            head: 0.0,
            body: self.config.tracking.mode.uses_body().then_some(0.0),
        };
    }

    fn neutral_command(&self) -> ActuatorCommand {
        let mode = self.config.tracking.mode;
        ActuatorCommand::neutral(self.config.tracking.neutral_duration())
            .with_body_yaw(mode.uses_body().then_some(0.0))
            .with_antennas(self.config.antennas.rest())
    }

    fn send<A: Actuator + ?Sized>(&mut self, actuator: &mut A, command: &ActuatorCommand) -> bool {
        match actuator.set_target(command) {
            Ok(()) => {
                self.stats.commands_sent += 1;
                if command.antennas.is_some() {
                    self.pending_antennas = None;
                }
                true
            }
            Err(e) => {
                warn!("Failed to send actuator command: {}", e);
                self.stats.actuator_failures += 1;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuator::LoggingActuator,
        detection::Detection,
        sensors::DoaReading,
    };

    fn frame_at(at: Instant, detections: Vec<Detection>) -> FrameObservation {
        FrameObservation::new(FrameSize::new(640, 480), detections, at)
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = TrackingSession::new(TrackerConfig::default()).unwrap();
        assert_eq!(session.state(), TrackingState::Idle);
        assert_eq!(session.status().stats, SessionStats::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = TrackerConfig::default();
        config.filter.kind = "bogus".to_string();
        assert!(TrackingSession::new(config).is_err());
    }

    #[test]
    fn test_zero_frame_is_an_error() {
        let mut session = TrackingSession::new(TrackerConfig::default()).unwrap();
        let obs = FrameObservation::new(FrameSize::new(0, 480), vec![], Instant::now());
        assert!(session.on_frame(&obs, &mut LoggingActuator::new()).is_err());
    }

    #[test]
    fn test_confirmation_holds_in_detecting() {
        let mut config = TrackerConfig::default();
        config.tracking.require_confirmation = true;
        config.gate.min_duration_secs = Some(0.1);
        let mut session = TrackingSession::new(config).unwrap();
        let mut actuator = LoggingActuator::new();
        let start = Instant::now();
        let target = vec![Detection::centered(500.0, 240.0, 40.0, 40.0, 0.9, 0)];

        let outcome = session.on_frame(&frame_at(start, target.clone()), &mut actuator).unwrap();
        assert_eq!(outcome.state, TrackingState::Detecting);
        assert!(outcome.command.is_none());

        // Gap drops back to idle
        let outcome = session
            .on_frame(&frame_at(start + Duration::from_millis(33), vec![]), &mut actuator)
            .unwrap();
        assert_eq!(outcome.state, TrackingState::Idle);

        let mut t = start + Duration::from_millis(66);
        let mut state = TrackingState::Idle;
        for _ in 0..5 {
            state = session.on_frame(&frame_at(t, target.clone()), &mut actuator).unwrap().state;
            t += Duration::from_millis(33);
        }
        assert_eq!(state, TrackingState::Tracking);
        assert_eq!(session.stats().activations, 1);
    }

    #[test]
    fn test_direction_tracking_steps_toward_bearing() {
        let mut config = TrackerConfig::default();
        config.gate.min_duration_secs = Some(0.0);
        let mut session = TrackingSession::new(config).unwrap();
        let mut actuator = LoggingActuator::new();
        let start = Instant::now();
        // 60° bearing is 30° to the left
        let speech = DoaReading { angle: 60f64.to_radians(), active: true };

        let outcome = session
            .on_direction(&DirectionSample::new(Some(speech), start), &mut actuator)
            .unwrap();
        assert_eq!(outcome.state, TrackingState::Tracking);
        assert!(outcome.delivered);
        let yaw = session.status().yaw;
        // First step may overshoot but never exceeds the head range
        assert!(yaw > 0.0 && yaw <= 35f64.to_radians() + 1e-9);
        let target = session.status().bearing_target.unwrap();
        assert!((target - 30f64.to_radians()).abs() < 1e-9);

        // Within the control interval nothing is sent
        let outcome = session
            .on_direction(&DirectionSample::new(None, start + Duration::from_millis(100)), &mut actuator)
            .unwrap();
        assert!(outcome.command.is_none());
    }

    #[test]
    fn test_direction_timeout_returns_to_neutral() {
        let mut config = TrackerConfig::default();
        config.gate.min_duration_secs = Some(0.0);
        let mut session = TrackingSession::new(config).unwrap();
        let mut actuator = LoggingActuator::new();
        let start = Instant::now();
        let speech = DoaReading { angle: 0.0, active: true };
        session
            .on_direction(&DirectionSample::new(Some(speech), start), &mut actuator)
            .unwrap();

        let outcome = session
            .on_direction(&DirectionSample::new(None, start + Duration::from_millis(2100)), &mut actuator)
            .unwrap();
        assert_eq!(outcome.state, TrackingState::Lost);
        let command = outcome.command.unwrap();
        assert_eq!(command.head.map(|h| h.yaw), Some(0.0));
        assert_eq!(session.status().yaw, 0.0);
        assert_eq!(session.stats().timeouts, 1);
    }
}
