//! Closed-loop head tracking for a small pan/tilt robot head.
//!
//! A stream of object detections drives the yaw and pitch of the head (and
//! optionally the body yaw) so the tracked object stays centered in the
//! camera frame, smoothly and safely under noisy, intermittent detections.
//! An audio variant steers toward a direction-of-arrival bearing instead.
//!
//! The pipeline for one camera frame:
//! 1. Target selection picks the detection closest to the frame center
//! 2. A filter stage smooths the target position (window, Kalman, exponential)
//! 3. Per-axis PID controllers turn the normalized error into angles
//! 4. The tracking mode splits yaw across head and body
//! 5. The command is sent to the actuator, fire-and-forget
//!
//! Losing the target for longer than the detection timeout resets every
//! controller and filter and returns the robot to a neutral pose.
//!
//! # Examples
//!
//! ## Driving a session by hand
//!
//! ```
//! use head_tracker::{
//!     actuator::LoggingActuator,
//!     config::TrackerConfig,
//!     detection::{Detection, FrameSize},
//!     sensors::FrameObservation,
//!     session::{TrackingSession, TrackingState},
//! };
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = TrackingSession::new(TrackerConfig::default())?;
//! let mut actuator = LoggingActuator::new();
//!
//! let detections = vec![Detection::new(380.0, 200.0, 420.0, 280.0, 0.9, 0)];
//! let observation = FrameObservation::new(FrameSize::new(640, 480), detections, Instant::now());
//!
//! let outcome = session.on_frame(&observation, &mut actuator)?;
//! assert_eq!(outcome.state, TrackingState::Tracking);
//! assert!(outcome.delivered);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Filters
//!
//! ```
//! use head_tracker::filters::{create_filter, TargetFilter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Kalman smoothing followed by exponential smoothing
//! let mut filter = create_filter("kalman+exponential:0.3")?;
//!
//! let (x, y) = filter.apply(412.0, 198.0);
//! println!("Filtered target: ({:.1}, {:.1})", x, y);
//!
//! filter.reset();
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the simulated loop
//!
//! ```
//! use head_tracker::{
//!     app::TrackingApp,
//!     config::TrackerConfig,
//!     simulation::{SceneConfig, SimulatedScene},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scene = SimulatedScene::new(SceneConfig::default()).with_max_frames(90);
//! let detector = scene.detector(42);
//! let robot = scene.robot();
//!
//! let mut app = TrackingApp::new(scene, detector, robot, TrackerConfig::default())?;
//! let status = app.run()?;
//! println!("{} commands sent", status.stats.commands_sent);
//! # Ok(())
//! # }
//! ```

/// Detection data model, frame geometry and error normalization
pub mod detection;

/// Choosing one detection to track
pub mod target_selector;

/// Smoothing filters for target positions
pub mod filters;

/// PID controllers for image axes and bearings
pub mod controller;

/// Debounce gate for intermittent activity signals
pub mod activity_gate;

/// Tracking modes and head/body yaw allocation
pub mod allocation;

/// Direction-of-arrival conversion
pub mod doa;

/// Camera, detector and direction sensor interfaces
pub mod sensors;

/// Robot actuator interface
pub mod actuator;

/// Tracking state machine
pub mod session;

/// Control loops, live tuning and cancellation
pub mod app;

/// Simulated scene and robot
pub mod simulation;

/// Error types and result handling
pub mod error;

/// Constants used throughout the tracker
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
