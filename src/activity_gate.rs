//! Debouncing of intermittent activity signals.
//!
//! Speech flags and low-confidence detections flicker. The gate only lets a
//! signal (re)trigger tracking after it has stayed active for a minimum
//! duration, then ignores all input for a cooldown period.

use crate::constants::DEFAULT_GATE_COOLDOWN_SECS;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Minimum activity duration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Quiet environments
    Low,
    /// General use
    #[default]
    Medium,
    /// Noisy environments
    High,
}

impl Sensitivity {
    /// Minimum continuous activity before the gate fires
    #[must_use]
    pub const fn min_duration(self) -> Duration {
        match self {
            Self::Low => Duration::from_millis(500),
            Self::Medium => Duration::from_millis(300),
            Self::High => Duration::from_millis(150),
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(crate::Error::InvalidInput(format!("Unknown sensitivity: {s}"))),
        }
    }
}

/// Gate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Waiting for activity
    Idle,
    /// Activity seen since the contained instant
    Accumulating(Instant),
    /// Fired at the contained instant, input ignored until the cooldown ends
    Cooldown(Instant),
}

/// Debounce gate for an activity signal
#[derive(Debug, Clone)]
pub struct ActivityGate {
    min_duration: Duration,
    cooldown: Duration,
    phase: GatePhase,
}

impl ActivityGate {
    #[must_use]
    pub const fn new(min_duration: Duration, cooldown: Duration) -> Self {
        Self {
            min_duration,
            cooldown,
            phase: GatePhase::Idle,
        }
    }

    /// Gate using a sensitivity preset and the default cooldown
    #[must_use]
    pub fn with_sensitivity(sensitivity: Sensitivity) -> Self {
        Self::new(
            sensitivity.min_duration(),
            Duration::from_secs_f64(DEFAULT_GATE_COOLDOWN_SECS),
        )
    }

    /// Feed the current signal, timestamped now
    pub fn update(&mut self, active: bool) -> bool {
        self.update_at(active, Instant::now())
    }

    /// Feed the signal observed at `now`; returns true exactly when the gate fires
    pub fn update_at(&mut self, active: bool, now: Instant) -> bool {
        if let GatePhase::Cooldown(fired_at) = self.phase {
            if now.saturating_duration_since(fired_at) < self.cooldown {
                return false;
            }
            self.phase = GatePhase::Idle;
        }

        if !active {
            self.phase = GatePhase::Idle;
            return false;
        }

        let started = match self.phase {
            GatePhase::Accumulating(started) => started,
            _ => {
                self.phase = GatePhase::Accumulating(now);
                now
            }
        };

        if now.saturating_duration_since(started) >= self.min_duration {
            self.phase = GatePhase::Cooldown(now);
            return true;
        }

        false
    }

    /// Drop any accumulation or cooldown
    pub fn reset(&mut self) {
        self.phase = GatePhase::Idle;
    }

    #[must_use]
    pub const fn phase(&self) -> GatePhase {
        self.phase
    }

    #[must_use]
    pub const fn min_duration(&self) -> Duration {
        self.min_duration
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_min_duration(&mut self, min_duration: Duration) {
        self.min_duration = min_duration;
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }
}

impl Default for ActivityGate {
    fn default() -> Self {
        Self::with_sensitivity(Sensitivity::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    #[test]
    fn test_short_activity_never_fires() {
        let mut gate = ActivityGate::new(Duration::from_millis(300), Duration::from_millis(500));
        let start = Instant::now();
        let mut now = start;

        for _ in 0..5 {
            assert!(!gate.update_at(true, now));
            now += TICK;
        }
        assert!(!gate.update_at(false, now));
        assert_eq!(gate.phase(), GatePhase::Idle);

        // Accumulation restarts from scratch
        now += TICK;
        assert!(!gate.update_at(true, now));
        assert_eq!(gate.phase(), GatePhase::Accumulating(now));
    }

    #[test]
    fn test_fires_once_then_cools_down() {
        let mut gate = ActivityGate::new(Duration::from_millis(300), Duration::from_millis(500));
        let start = Instant::now();
        let mut fired = Vec::new();

        for i in 0..30u32 {
            let now = start + TICK * i;
            if gate.update_at(true, now) {
                fired.push(i);
            }
        }

        // Fires at 300 ms, cooldown until 800 ms, accumulation restarts at
        // 800 ms and fires again at 1100 ms
        assert_eq!(fired, vec![6, 22]);
    }

    #[test]
    fn test_cooldown_ignores_inactive_input() {
        let mut gate = ActivityGate::new(Duration::ZERO, Duration::from_millis(500));
        let start = Instant::now();
        assert!(gate.update_at(true, start));
        assert!(!gate.update_at(false, start + TICK));
        assert_eq!(gate.phase(), GatePhase::Cooldown(start));
        assert!(!gate.update_at(true, start + TICK * 9));
        assert!(gate.update_at(true, start + TICK * 10));
    }

    #[test]
    fn test_sensitivity_presets() {
        assert_eq!(Sensitivity::Low.min_duration(), Duration::from_millis(500));
        assert_eq!(Sensitivity::Medium.min_duration(), Duration::from_millis(300));
        assert_eq!(Sensitivity::High.min_duration(), Duration::from_millis(150));
        assert_eq!("HIGH".parse::<Sensitivity>().unwrap(), Sensitivity::High);
        assert!("extreme".parse::<Sensitivity>().is_err());
    }
}
