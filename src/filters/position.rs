use std::collections::VecDeque;
use super::TargetFilter;

/// Moving average filter with jump suppression.
///
/// A plain moving average lags on large motions and is corrupted by single
/// outliers. Samples that jump further than `jump_threshold` from the last
/// output are limited to half the threshold before entering the window.
pub struct PositionFilter {
    window_size: usize,
    jump_threshold: f64,
    x_buffer: VecDeque<f64>,
    y_buffer: VecDeque<f64>,
    last_output: Option<(f64, f64)>,
}

impl PositionFilter {
    /// Create a new position filter
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero or `jump_threshold` is not positive
    #[must_use]
    pub fn new(window_size: usize, jump_threshold: f64) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        assert!(
            jump_threshold > 0.0,
            "Jump threshold must be positive, got {}",
            jump_threshold
        );
        Self {
            window_size,
            jump_threshold,
            x_buffer: VecDeque::with_capacity(window_size),
            y_buffer: VecDeque::with_capacity(window_size),
            last_output: None,
        }
    }

    /// Smooth a new raw coordinate pair
    pub fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
        let Some((last_x, last_y)) = self.last_output else {
            self.push(x, y);
            self.last_output = Some((x, y));
            return (x, y);
        };

        let jumped = (x - last_x).abs() > self.jump_threshold || (y - last_y).abs() > self.jump_threshold;
        if jumped {
            let half = self.jump_threshold / 2.0;
            self.push(last_x + (x - last_x).clamp(-half, half), last_y + (y - last_y).clamp(-half, half));
        } else {
            self.push(x, y);
        }

        let output = (mean(&self.x_buffer), mean(&self.y_buffer));
        self.last_output = Some(output);
        output
    }

    /// Configured window size
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Configured jump threshold in pixels
    #[must_use]
    pub const fn jump_threshold(&self) -> f64 {
        self.jump_threshold
    }

    /// Change the jump threshold without clearing history
    pub fn set_jump_threshold(&mut self, jump_threshold: f64) {
        self.jump_threshold = jump_threshold;
    }

    /// Number of samples currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_buffer.is_empty()
    }

    /// Last emitted output, `None` before the first sample or after a reset
    #[must_use]
    pub const fn last_output(&self) -> Option<(f64, f64)> {
        self.last_output
    }

    fn push(&mut self, x: f64, y: f64) {
        if self.x_buffer.len() >= self.window_size {
            self.x_buffer.pop_front();
        }
        if self.y_buffer.len() >= self.window_size {
            self.y_buffer.pop_front();
        }
        self.x_buffer.push_back(x);
        self.y_buffer.push_back(y);
    }
}

fn mean(buffer: &VecDeque<f64>) -> f64 {
    buffer.iter().sum::<f64>() / buffer.len() as f64
}

impl TargetFilter for PositionFilter {
    fn apply(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.filter(x, y)
    }

    fn reset(&mut self) {
        self.x_buffer.clear();
        self.y_buffer.clear();
        self.last_output = None;
    }

    fn name(&self) -> &str {
        "PositionFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_returns_input() {
        let mut filter = PositionFilter::new(5, 30.0);
        assert_eq!(filter.filter(123.5, 77.25), (123.5, 77.25));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_small_moves_are_averaged() {
        let mut filter = PositionFilter::new(3, 30.0);

        filter.filter(10.0, 20.0);
        let (x2, y2) = filter.filter(20.0, 30.0);
        assert_eq!(x2, 15.0);
        assert_eq!(y2, 25.0);

        // |30 - 15| = 15 stays under the threshold
        let (x3, y3) = filter.filter(30.0, 40.0);
        assert_eq!(x3, 20.0);
        assert_eq!(y3, 30.0);

        // Window is full, oldest value should be dropped
        let (x4, y4) = filter.filter(40.0, 50.0);
        assert_eq!(x4, 30.0);
        assert_eq!(y4, 40.0);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_jump_suppression() {
        let mut filter = PositionFilter::new(5, 30.0);
        let mut previous = (0.0, 0.0);
        for _ in 0..4 {
            previous = filter.filter(0.0, 0.0);
        }

        let (x, y) = filter.filter(1000.0, 0.0);
        assert!((x - previous.0).abs() <= 15.0);
        // Limited sample is 15, averaged with four zeros
        assert!((x - 3.0).abs() < 1e-12);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_jump_on_one_axis_limits_both() {
        let mut filter = PositionFilter::new(1, 30.0);
        filter.filter(0.0, 0.0);
        // y moves 20 (under threshold) but x jumps, so y is limited to 15 as well
        let (x, y) = filter.filter(100.0, 20.0);
        assert_eq!(x, 15.0);
        assert_eq!(y, 15.0);
    }

    #[test]
    fn test_reset_restores_cold_start() {
        let mut filter = PositionFilter::new(5, 30.0);
        filter.filter(10.0, 10.0);
        filter.filter(12.0, 12.0);
        filter.reset();
        assert!(filter.is_empty());
        assert!(filter.last_output().is_none());
        assert_eq!(filter.filter(500.0, 400.0), (500.0, 400.0));
    }
}
