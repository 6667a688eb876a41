//! Tracking modes and the head/body yaw split.

use serde::{Deserialize, Serialize};

use crate::constants::{BODY_YAW_RANGE_DEG, HEAD_ONLY_YAW_RANGE_DEG};

/// Which joints carry the yaw command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Head only
    #[default]
    Head,
    /// Body rotates, head yaw stays centered
    Body,
    /// Head first, body takes the excess beyond the head yaw limit
    Hybrid,
}

impl TrackingMode {
    /// Largest total yaw this mode can reach, in radians
    #[must_use]
    pub fn yaw_range(self) -> f64 {
        match self {
            Self::Head => HEAD_ONLY_YAW_RANGE_DEG.to_radians(),
            Self::Body | Self::Hybrid => BODY_YAW_RANGE_DEG.to_radians(),
        }
    }

    /// Whether the body joint receives commands in this mode
    #[must_use]
    pub const fn uses_body(self) -> bool {
        matches!(self, Self::Body | Self::Hybrid)
    }
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Head => "head",
            Self::Body => "body",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "body" => Ok(Self::Body),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(crate::Error::InvalidInput(format!("Unknown tracking mode: {s}"))),
        }
    }
}

/// Yaw split between head and body joints, radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YawSplit {
    pub head: f64,
    /// `None` when the body is not commanded in this mode
    pub body: Option<f64>,
}

/// Distribute a total yaw across head and body according to `mode`.
///
/// In hybrid mode yaw within `head_limit` stays on the head with the body at
/// zero; beyond it the head holds `±head_limit` and the body takes the rest.
#[must_use]
pub fn split_yaw(mode: TrackingMode, yaw: f64, head_limit: f64) -> YawSplit {
    match mode {
        TrackingMode::Head => YawSplit { head: yaw, body: None },
        TrackingMode::Body => YawSplit {
            head: 0.0,
            body: Some(yaw),
        },
        TrackingMode::Hybrid => {
            let head_limit = head_limit.abs();
            if yaw.abs() <= head_limit {
                YawSplit {
                    head: yaw,
                    body: Some(0.0),
                }
            } else {
                let head = head_limit.copysign(yaw);
                YawSplit {
                    head,
                    body: Some(yaw - head),
                }
            }
        }
    }
}
