//! Choosing a single detection to track when the detector reports several.

use crate::detection::{Detection, FrameSize};

/// Pick the detection whose center lies closest to the frame center.
///
/// Ties keep the first detection encountered, so the result depends on the
/// detector's output order. Returns `None` for an empty slice.
#[must_use]
pub fn select_best_target(detections: &[Detection], frame: FrameSize) -> Option<&Detection> {
    let center = frame.center();
    let mut best: Option<(&Detection, f64)> = None;

    for detection in detections {
        let distance = detection.center().distance_to(&center);
        match best {
            Some((_, min_distance)) if distance >= min_distance => {}
            _ => best = Some((detection, distance)),
        }
    }

    best.map(|(detection, _)| detection)
}

/// Selector that pre-filters candidates before applying the closest-to-center policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSelector {
    class_id: Option<i32>,
    min_confidence: f32,
}

impl TargetSelector {
    /// Create a selector accepting only `class_id` (any class when `None`)
    /// with at least `min_confidence`
    #[must_use]
    pub const fn new(class_id: Option<i32>, min_confidence: f32) -> Self {
        Self {
            class_id,
            min_confidence,
        }
    }

    /// Class of interest
    #[must_use]
    pub const fn class_id(&self) -> Option<i32> {
        self.class_id
    }

    /// Minimum accepted confidence
    #[must_use]
    pub const fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Whether a detection is a candidate at all
    #[must_use]
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.is_valid()
            && detection.confidence >= self.min_confidence
            && self.class_id.map_or(true, |class_id| class_id == detection.class_id)
    }

    /// Select the best accepted detection, if any
    #[must_use]
    pub fn select(&self, detections: &[Detection], frame: FrameSize) -> Option<Detection> {
        let candidates: Vec<Detection> = detections.iter().filter(|d| self.accepts(d)).copied().collect();
        select_best_target(&candidates, frame).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameSize {
        FrameSize::new(640, 480)
    }

    #[test]
    fn test_empty_input() {
        assert!(select_best_target(&[], frame()).is_none());
    }

    #[test]
    fn test_selects_closest_to_center() {
        // Centers at distances 50, 10 and 30 from (320, 240)
        let detections = vec![
            Detection::centered(370.0, 240.0, 20.0, 20.0, 0.9, 0),
            Detection::centered(320.0, 250.0, 20.0, 20.0, 0.9, 0),
            Detection::centered(290.0, 240.0, 20.0, 20.0, 0.9, 0),
        ];
        let best = select_best_target(&detections, frame()).unwrap();
        assert_eq!(*best, detections[1]);
    }

    #[test]
    fn test_tie_keeps_first() {
        let detections = vec![
            Detection::centered(330.0, 240.0, 20.0, 20.0, 0.4, 1),
            Detection::centered(310.0, 240.0, 20.0, 20.0, 0.9, 2),
        ];
        let best = select_best_target(&detections, frame()).unwrap();
        assert_eq!(best.class_id, 1);
    }

    #[test]
    fn test_selector_filters_class_and_confidence() {
        let selector = TargetSelector::new(Some(39), 0.5);
        let detections = vec![
            // Closest, wrong class
            Detection::centered(320.0, 240.0, 20.0, 20.0, 0.9, 0),
            // Right class, too weak
            Detection::centered(325.0, 240.0, 20.0, 20.0, 0.3, 39),
            // Right class, far away
            Detection::centered(500.0, 400.0, 20.0, 20.0, 0.8, 39),
        ];
        let best = selector.select(&detections, frame()).unwrap();
        assert_eq!(best, detections[2]);

        let none = TargetSelector::new(Some(7), 0.0);
        assert!(none.select(&detections, frame()).is_none());
    }
}
