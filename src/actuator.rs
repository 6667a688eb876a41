//! Actuator interface for the robot head, body and antennas.
//!
//! Commands are fire-and-forget target poses; the robot interpolates toward
//! them itself. The tracker never reads back the physical position.

use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::Result;

/// Head orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HeadPose {
    pub pitch: f64,
    pub yaw: f64,
}

impl HeadPose {
    #[must_use]
    pub const fn new(pitch: f64, yaw: f64) -> Self {
        Self { pitch, yaw }
    }
}

/// A target pose for the robot; `None` fields are left untouched
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ActuatorCommand {
    pub head: Option<HeadPose>,
    /// Body rotation in radians
    pub body_yaw: Option<f64>,
    /// Left and right antenna angles in radians
    pub antennas: Option<[f64; 2]>,
    /// Interpolation time; `None` lets the robot move as fast as it can
    pub duration: Option<Duration>,
}

impl ActuatorCommand {
    /// Command only the head
    #[must_use]
    pub const fn head(pitch: f64, yaw: f64) -> Self {
        Self {
            head: Some(HeadPose::new(pitch, yaw)),
            body_yaw: None,
            antennas: None,
            duration: None,
        }
    }

    /// Head and body centered
    #[must_use]
    pub const fn neutral(duration: Duration) -> Self {
        Self {
            head: Some(HeadPose::new(0.0, 0.0)),
            body_yaw: Some(0.0),
            antennas: None,
            duration: Some(duration),
        }
    }

    #[must_use]
    pub const fn with_body_yaw(mut self, body_yaw: Option<f64>) -> Self {
        self.body_yaw = body_yaw;
        self
    }

    #[must_use]
    pub const fn with_antennas(mut self, antennas: Option<[f64; 2]>) -> Self {
        self.antennas = antennas;
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the command moves anything at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none() && self.body_yaw.is_none() && self.antennas.is_none()
    }
}

/// Anything that can receive target poses
pub trait Actuator {
    /// Send a target pose
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Actuator`] if the command could not be delivered
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()>;
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()> {
        (**self).set_target(command)
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()> {
        (**self).set_target(command)
    }
}

/// Dry-run actuator that logs every command
#[derive(Debug, Default)]
pub struct LoggingActuator {
    commands_sent: u64,
}

impl LoggingActuator {
    #[must_use]
    pub const fn new() -> Self {
        Self { commands_sent: 0 }
    }

    /// Number of commands received so far
    #[must_use]
    pub const fn commands_sent(&self) -> u64 {
        self.commands_sent
    }
}

impl Actuator for LoggingActuator {
    fn set_target(&mut self, command: &ActuatorCommand) -> Result<()> {
        if self.commands_sent == 0 {
            info!("Dry run: actuator commands are logged only");
        }
        self.commands_sent += 1;

        if let Some(head) = command.head {
            debug!(
                "head pitch {:.1}° yaw {:.1}°",
                head.pitch.to_degrees(),
                head.yaw.to_degrees()
            );
        }
        if let Some(body_yaw) = command.body_yaw {
            debug!("body yaw {:.1}°", body_yaw.to_degrees());
        }
        if let Some([left, right]) = command.antennas {
            debug!("antennas {:.2} {:.2}", left, right);
        }
        Ok(())
    }
}
