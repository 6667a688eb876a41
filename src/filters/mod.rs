//! Smoothing stages for noisy per-frame target coordinates.
//!
//! Detector output jitters from frame to frame. These filters smooth the
//! selected target position before it reaches the axis controllers.

/// Kalman smoother with a constant-velocity model
pub mod kalman;

/// Sliding-window average with jump suppression
pub mod position;

/// Exponential smoothing
pub mod exponential;

use crate::{Error, Result};

/// Trait for all target position filters
pub trait TargetFilter: Send + Sync {
    /// Apply filter to a new measurement
    fn apply(&mut self, x: f64, y: f64) -> (f64, f64);

    /// Extrapolate without a new measurement, if the filter has a motion model
    fn predict(&mut self) -> Option<(f64, f64)> {
        None
    }

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl TargetFilter for NoFilter {
    fn apply(&mut self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Several filters applied one after another
pub struct FilterChain {
    stages: Vec<Box<dyn TargetFilter>>,
    name: String,
}

impl FilterChain {
    /// Build a chain from its stages, applied in order
    #[must_use]
    pub fn new(stages: Vec<Box<dyn TargetFilter>>) -> Self {
        let name = stages.iter().map(|s| s.name()).collect::<Vec<_>>().join("+");
        Self { stages, name }
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl TargetFilter for FilterChain {
    fn apply(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.stages.iter_mut().fold((x, y), |(x, y), stage| stage.apply(x, y))
    }

    /// The first stage with a motion model predicts; later stages smooth the
    /// prediction as they would a measurement.
    fn predict(&mut self) -> Option<(f64, f64)> {
        let mut stages = self.stages.iter_mut();
        let predicted = stages.by_ref().find_map(|stage| stage.predict())?;
        Some(stages.fold(predicted, |(x, y), stage| stage.apply(x, y)))
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parse_param<T: std::str::FromStr>(filter: &str, value: Option<&str>, default: T) -> Result<T> {
    match value {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::FilterError(format!("Invalid parameter '{raw}' for {filter} filter"))),
    }
}

fn create_stage(spec: &str) -> Result<Box<dyn TargetFilter>> {
    use crate::constants::{
        DEFAULT_EXPONENTIAL_ALPHA, DEFAULT_JUMP_THRESHOLD, DEFAULT_KALMAN_MEASUREMENT_NOISE,
        DEFAULT_KALMAN_PROCESS_NOISE, DEFAULT_WINDOW_SIZE,
    };

    let mut parts = spec.trim().split(':');
    let name = parts.next().unwrap_or_default().to_lowercase();
    let first = parts.next();
    let second = parts.next();
    if parts.next().is_some() {
        return Err(Error::FilterError(format!("Too many parameters in filter spec: {spec}")));
    }

    match name.as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "window" | "position" | "moving_average" | "movingaverage" => {
            let window_size = parse_param(&name, first, DEFAULT_WINDOW_SIZE)?;
            let threshold = parse_param(&name, second, DEFAULT_JUMP_THRESHOLD)?;
            if window_size == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            if !(threshold > 0.0) {
                return Err(Error::FilterError(format!(
                    "Jump threshold must be positive, got {threshold}"
                )));
            }
            Ok(Box::new(position::PositionFilter::new(window_size, threshold)))
        }
        "kalman" => {
            let q = parse_param(&name, first, DEFAULT_KALMAN_PROCESS_NOISE)?;
            let r = parse_param(&name, second, DEFAULT_KALMAN_MEASUREMENT_NOISE)?;
            if !(q > 0.0) || !(r > 0.0) {
                return Err(Error::FilterError(format!(
                    "Kalman noise scales must be positive, got q={q} r={r}"
                )));
            }
            Ok(Box::new(kalman::KalmanSmoother::new(q, r)))
        }
        "exponential" | "ema" => {
            let alpha = parse_param(&name, first, DEFAULT_EXPONENTIAL_ALPHA)?;
            if second.is_some() {
                return Err(Error::FilterError("Exponential filter takes one parameter".to_string()));
            }
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {name}"))),
    }
}

/// Create a target filter from a textual spec.
///
/// A spec is a filter name with optional `:`-separated parameters
/// (`window:5:30`, `kalman:0.001:0.1`, `exponential:0.3`). Stages joined
/// with `+` are chained in order, e.g. `kalman+exponential:0.3`.
///
/// # Errors
///
/// Returns [`Error::FilterError`] for unknown names or invalid parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn TargetFilter>> {
    let stages: Vec<&str> = spec.split('+').collect();
    if stages.len() == 1 {
        return create_stage(stages[0]);
    }
    let built = stages.into_iter().map(create_stage).collect::<Result<Vec<_>>>()?;
    Ok(Box::new(FilterChain::new(built)))
}
