//! Configuration management for the head tracker

use crate::{
    activity_gate::{ActivityGate, Sensitivity},
    allocation::TrackingMode,
    constants::{
        BODY_YAW_RANGE_DEG, DEFAULT_DEAD_ZONE, DEFAULT_DETECTION_TIMEOUT_SECS, DEFAULT_EXPONENTIAL_ALPHA,
        DEFAULT_GATE_COOLDOWN_SECS, DEFAULT_HEAD_YAW_LIMIT_DEG, DEFAULT_JUMP_THRESHOLD,
        DEFAULT_KALMAN_MEASUREMENT_NOISE, DEFAULT_KALMAN_PROCESS_NOISE, DEFAULT_KP, DEFAULT_NEUTRAL_DURATION_SECS,
        DEFAULT_OUTPUT_GAIN, DEFAULT_PITCH_LIMIT_DEG, DEFAULT_SOUND_TIMEOUT_SECS, DEFAULT_WINDOW_SIZE,
        DEFAULT_YAW_LIMIT_DEG, HEAD_ONLY_YAW_RANGE_DEG,
    },
    controller::{AxisController, PidGains, RotationDirection, SetpointController},
    filters::TargetFilter,
    target_selector::TargetSelector,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Horizontal (pan) axis
    pub yaw: AxisConfig,

    /// Vertical (tilt) axis
    pub pitch: AxisConfig,

    /// Target position smoothing
    pub filter: FilterConfig,

    /// Tracking behaviour
    pub tracking: TrackingConfig,

    /// Activity gate
    pub gate: GateConfig,

    /// Sound direction tracking
    pub sound: SoundConfig,

    /// Antenna feedback
    pub antennas: AntennaConfig,
}

/// One controlled axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,

    /// Radians per tick at full control output
    pub gain: f64,

    /// Normalized error below which the axis holds still
    pub dead_zone: f64,

    /// Angle limit in degrees
    pub limit_deg: f64,

    /// Calibrated sign between image error and angle
    pub direction: RotationDirection,
}

/// Filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// One of `none`, `window`, `kalman`, `exponential`, `kalman_exponential`,
    /// `window_kalman`, or a filter spec such as `kalman:0.01:0.1+ema:0.5`
    pub kind: String,

    /// Position filter window size
    pub window_size: usize,

    /// Position filter jump threshold in pixels
    pub jump_threshold: f64,

    /// Kalman process noise
    pub kalman_process_noise: f64,

    /// Kalman measurement noise
    pub kalman_measurement_noise: f64,

    /// Exponential smoothing factor
    pub exponential_alpha: f64,
}

/// Tracking behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Joints carrying the yaw command
    pub mode: TrackingMode,

    /// Time without a target before returning to neutral
    pub detection_timeout_secs: f64,

    /// Hybrid mode: yaw carried by the head before the body takes over
    pub head_yaw_limit_deg: f64,

    /// Interpolation time of tracking commands, immediate when unset
    pub command_duration_secs: Option<f64>,

    /// Interpolation time of the return to neutral
    pub neutral_duration_secs: f64,

    /// Keep steering on the filter's prediction during short gaps
    pub coast_on_gap: bool,

    /// Require the activity gate to fire before tracking starts
    pub require_confirmation: bool,

    /// Only track this detector class
    pub target_class: Option<i32>,

    /// Ignore detections below this confidence
    pub min_confidence: f32,

    /// Safe zone around the frame center as a fraction of the width
    pub max_horizontal_offset: Option<f64>,

    /// Safe zone around the frame center as a fraction of the height
    pub max_vertical_offset: Option<f64>,
}

/// Activity gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub sensitivity: Sensitivity,

    /// Overrides the sensitivity preset
    pub min_duration_secs: Option<f64>,

    pub cooldown_secs: f64,
}

/// Sound direction tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,

    /// Interval between bearing control steps, also the command duration
    pub control_speed_secs: f64,

    /// Time without speech before returning to neutral
    pub detection_timeout_secs: f64,
}

/// Antenna feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntennaConfig {
    /// Raise the antennas while tracking
    pub enabled: bool,

    /// Left/right angles in degrees when not tracking
    pub rest_deg: [f64; 2],

    /// Left/right angles in degrees while tracking
    pub active_deg: [f64; 2],
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            yaw: AxisConfig::yaw(),
            pitch: AxisConfig::pitch(),
            filter: FilterConfig::default(),
            tracking: TrackingConfig::default(),
            gate: GateConfig::default(),
            sound: SoundConfig::default(),
            antennas: AntennaConfig::default(),
        }
    }
}

impl AxisConfig {
    /// Pan axis defaults
    #[must_use]
    pub const fn yaw() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: 0.0,
            kd: 0.0,
            gain: DEFAULT_OUTPUT_GAIN,
            dead_zone: DEFAULT_DEAD_ZONE,
            limit_deg: DEFAULT_YAW_LIMIT_DEG,
            direction: RotationDirection::Inverted,
        }
    }

    /// Tilt axis defaults
    #[must_use]
    pub const fn pitch() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: 0.0,
            kd: 0.0,
            gain: DEFAULT_OUTPUT_GAIN,
            dead_zone: DEFAULT_DEAD_ZONE,
            limit_deg: DEFAULT_PITCH_LIMIT_DEG,
            direction: RotationDirection::Normal,
        }
    }

    #[must_use]
    pub const fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    /// Angle limit in radians
    #[must_use]
    pub fn limit(&self) -> f64 {
        self.limit_deg.to_radians()
    }

    /// Build a controller for this axis
    #[must_use]
    pub fn build(&self) -> AxisController {
        AxisController::new(self.gains(), self.gain, self.dead_zone, self.limit(), self.direction)
    }

    /// Push gains, limits and sign into an existing controller without resetting it
    pub fn apply_to(&self, controller: &mut AxisController) {
        controller.set_gains(self.gains());
        controller.set_output_gain(self.gain);
        controller.set_dead_zone(self.dead_zone);
        controller.set_limit(self.limit());
        controller.set_direction(self.direction);
    }

    fn validate(&self, axis: &str) -> Result<()> {
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd), ("gain", self.gain)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigError(format!(
                    "{axis} {name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.dead_zone) {
            return Err(Error::ConfigError(format!(
                "{axis} dead zone must be in [0, 1), got {}",
                self.dead_zone
            )));
        }
        if !(self.limit_deg > 0.0 && self.limit_deg <= 180.0) {
            return Err(Error::ConfigError(format!(
                "{axis} limit must be in (0, 180] degrees, got {}",
                self.limit_deg
            )));
        }
        Ok(())
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self::yaw()
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: "kalman".to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            jump_threshold: DEFAULT_JUMP_THRESHOLD,
            kalman_process_noise: DEFAULT_KALMAN_PROCESS_NOISE,
            kalman_measurement_noise: DEFAULT_KALMAN_MEASUREMENT_NOISE,
            exponential_alpha: DEFAULT_EXPONENTIAL_ALPHA,
        }
    }
}

impl FilterConfig {
    /// Filter spec string equivalent to this configuration
    #[must_use]
    pub fn spec(&self) -> String {
        let window = format!("window:{}:{}", self.window_size, self.jump_threshold);
        let kalman = format!(
            "kalman:{}:{}",
            self.kalman_process_noise, self.kalman_measurement_noise
        );
        let exponential = format!("exponential:{}", self.exponential_alpha);

        match self.kind.as_str() {
            "window" | "position" => window,
            "kalman" => kalman,
            "exponential" => exponential,
            "kalman_exponential" => format!("{kalman}+{exponential}"),
            "window_kalman" => format!("{window}+{kalman}"),
            other => other.to_string(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Head,
            detection_timeout_secs: DEFAULT_DETECTION_TIMEOUT_SECS,
            head_yaw_limit_deg: DEFAULT_HEAD_YAW_LIMIT_DEG,
            command_duration_secs: None,
            neutral_duration_secs: DEFAULT_NEUTRAL_DURATION_SECS,
            coast_on_gap: false,
            require_confirmation: false,
            target_class: None,
            min_confidence: 0.0,
            max_horizontal_offset: None,
            max_vertical_offset: None,
        }
    }
}

impl TrackingConfig {
    #[must_use]
    pub fn detection_timeout(&self) -> Duration {
        secs(self.detection_timeout_secs)
    }

    #[must_use]
    pub fn command_duration(&self) -> Option<Duration> {
        self.command_duration_secs.map(secs)
    }

    #[must_use]
    pub fn neutral_duration(&self) -> Duration {
        secs(self.neutral_duration_secs)
    }

    /// Hybrid head yaw limit in radians
    #[must_use]
    pub fn head_yaw_limit(&self) -> f64 {
        self.head_yaw_limit_deg.to_radians()
    }

    #[must_use]
    pub const fn selector(&self) -> TargetSelector {
        TargetSelector::new(self.target_class, self.min_confidence)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::Medium,
            min_duration_secs: None,
            cooldown_secs: DEFAULT_GATE_COOLDOWN_SECS,
        }
    }
}

impl GateConfig {
    /// Effective minimum activity duration
    #[must_use]
    pub fn min_duration(&self) -> Duration {
        self.min_duration_secs
            .map_or_else(|| self.sensitivity.min_duration(), secs)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }

    #[must_use]
    pub fn build(&self) -> ActivityGate {
        ActivityGate::new(self.min_duration(), self.cooldown())
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            kp: 0.6,
            ki: 0.01,
            kd: 0.3,
            control_speed_secs: 0.5,
            detection_timeout_secs: DEFAULT_SOUND_TIMEOUT_SECS,
        }
    }
}

impl SoundConfig {
    #[must_use]
    pub const fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    #[must_use]
    pub fn control_speed(&self) -> Duration {
        secs(self.control_speed_secs)
    }

    #[must_use]
    pub fn detection_timeout(&self) -> Duration {
        secs(self.detection_timeout_secs)
    }

    /// Bearing controller for a tracking mode; body mode may step further per tick
    #[must_use]
    pub fn build(&self, mode: TrackingMode) -> SetpointController {
        SetpointController::new(self.gains(), Self::output_limit(mode))
    }

    /// Largest bearing step per control tick, radians
    #[must_use]
    pub fn output_limit(mode: TrackingMode) -> f64 {
        if mode == TrackingMode::Body {
            BODY_YAW_RANGE_DEG.to_radians()
        } else {
            HEAD_ONLY_YAW_RANGE_DEG.to_radians()
        }
    }
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rest_deg: [0.0, 0.0],
            active_deg: [0.5, 0.5],
        }
    }
}

impl AntennaConfig {
    /// Rest angles in radians, `None` when feedback is disabled
    #[must_use]
    pub fn rest(&self) -> Option<[f64; 2]> {
        self.enabled.then(|| self.rest_deg.map(f64::to_radians))
    }

    /// Active angles in radians, `None` when feedback is disabled
    #[must_use]
    pub fn active(&self) -> Option<[f64; 2]> {
        self.enabled.then(|| self.active_deg.map(f64::to_radians))
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{name} must be non-negative, got {value}")))
    }
}

fn offset_fraction(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(fraction) if !(fraction > 0.0 && fraction <= 0.5) => Err(Error::ConfigError(format!(
            "{name} must be in (0, 0.5], got {fraction}"
        ))),
        _ => Ok(()),
    }
}

impl TrackerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for malformed YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_yaml()?;
        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;
        Ok(())
    }

    /// Create the target filter described by the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterError`] for an unknown kind or invalid parameters
    pub fn create_filter(&self) -> Result<Box<dyn TargetFilter>> {
        crate::filters::create_filter(&self.filter.spec())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] or [`Error::FilterError`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        self.yaw.validate("yaw")?;
        self.pitch.validate("pitch")?;

        // Filter parameters are checked by building the filter
        self.create_filter()?;

        let tracking = &self.tracking;
        positive("Detection timeout", tracking.detection_timeout_secs)?;
        positive("Head yaw limit", tracking.head_yaw_limit_deg)?;
        if tracking.head_yaw_limit_deg > HEAD_ONLY_YAW_RANGE_DEG {
            return Err(Error::ConfigError(format!(
                "Head yaw limit must not exceed {HEAD_ONLY_YAW_RANGE_DEG} degrees, got {}",
                tracking.head_yaw_limit_deg
            )));
        }
        if let Some(duration) = tracking.command_duration_secs {
            positive("Command duration", duration)?;
        }
        non_negative("Neutral duration", tracking.neutral_duration_secs)?;
        if !(0.0..=1.0).contains(&tracking.min_confidence) {
            return Err(Error::ConfigError(
                "Minimum confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        offset_fraction("Horizontal offset", tracking.max_horizontal_offset)?;
        offset_fraction("Vertical offset", tracking.max_vertical_offset)?;

        if let Some(min_duration) = self.gate.min_duration_secs {
            non_negative("Gate minimum duration", min_duration)?;
        }
        non_negative("Gate cooldown", self.gate.cooldown_secs)?;

        non_negative("Sound kp", self.sound.kp)?;
        non_negative("Sound ki", self.sound.ki)?;
        non_negative("Sound kd", self.sound.kd)?;
        positive("Control speed", self.sound.control_speed_secs)?;
        positive("Sound detection timeout", self.sound.detection_timeout_secs)?;

        if self
            .antennas
            .rest_deg
            .iter()
            .chain(&self.antennas.active_deg)
            .any(|angle| !angle.is_finite())
        {
            return Err(Error::ConfigError("Antenna angles must be finite".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Tracker Configuration

# Pan axis; a target right of center turns the head right (negative yaw)
yaw:
  kp: 0.5
  ki: 0.0
  kd: 0.0
  gain: 0.08
  dead_zone: 0.05
  limit_deg: 160.0
  direction: inverted

# Tilt axis
pitch:
  kp: 0.5
  ki: 0.0
  kd: 0.0
  gain: 0.08
  dead_zone: 0.05
  limit_deg: 35.0
  direction: normal

# Target smoothing: none, window, kalman, exponential,
# kalman_exponential, window_kalman or a spec like "kalman+ema:0.5"
filter:
  kind: "kalman"
  window_size: 5
  jump_threshold: 30.0
  kalman_process_noise: 0.001
  kalman_measurement_noise: 0.1
  exponential_alpha: 0.3

tracking:
  mode: head
  detection_timeout_secs: 1.0
  head_yaw_limit_deg: 25.0
  neutral_duration_secs: 1.0
  coast_on_gap: false
  require_confirmation: false
  min_confidence: 0.0

# Debounce of speech or detection activity
gate:
  sensitivity: medium
  cooldown_secs: 0.5

# Sound direction tracking
sound:
  kp: 0.6
  ki: 0.01
  kd: 0.3
  control_speed_secs: 0.5
  detection_timeout_secs: 2.0

antennas:
  enabled: true
  rest_deg: [0.0, 0.0]
  active_deg: [0.5, 0.5]
"#;
