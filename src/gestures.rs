//! Turns touch frames into touchpad swipe events.

use log::trace;

use crate::event::{GestureEvent, Phase};
use crate::tracker::FrameSummary;

pub const SWIPE_FINGERS: usize = 3;

/// Gesture units for a centroid motion across the whole pad.
pub const UNITS_PER_PAD: f64 = 400.;

#[derive(Debug, Default)]
pub struct SwipeDetector {
    last_centroid: Option<(f32, f32)>,
}

impl SwipeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.last_centroid.is_some()
    }

    /// BEGIN when three fingers land, UPDATE while they move, END once the
    /// finger count changes.
    pub fn update(&mut self, frame: &FrameSummary) -> Option<GestureEvent> {
        let fingers = SWIPE_FINGERS as u32;

        if frame.active_count != SWIPE_FINGERS {
            self.last_centroid.take()?;
            trace!("swipe end at {} fingers", frame.active_count);
            return Some(GestureEvent::swipe(fingers, Phase::End, frame.time_us));
        }

        let Some(last) = self.last_centroid.replace(frame.centroid) else {
            trace!("swipe begin");
            return Some(GestureEvent::swipe(fingers, Phase::Begin, frame.time_us));
        };

        let dx = f64::from(frame.centroid.0 - last.0) * UNITS_PER_PAD;
        let dy = f64::from(frame.centroid.1 - last.1) * UNITS_PER_PAD;
        if dx == 0. && dy == 0. {
            return None;
        }
        Some(GestureEvent::swipe_update(fingers, dx, dy, frame.time_us))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn frame(active_count: usize, y: f32, time_us: i64) -> FrameSummary {
        FrameSummary {
            time_us,
            active_count,
            centroid: (0.5, y),
        }
    }

    #[test]
    fn three_finger_swipe_phases() {
        let mut det = SwipeDetector::new();
        assert_eq!(det.update(&frame(1, 0.8, 0)), None);
        assert_eq!(det.update(&frame(2, 0.8, 1_000)), None);

        let begin = det.update(&frame(3, 0.8, 2_000)).unwrap();
        assert_eq!(begin.phase, Phase::Begin);
        assert_eq!(begin.fingers, 3);
        assert!(det.is_active());

        let update = det.update(&frame(3, 0.7, 10_000)).unwrap();
        assert_eq!(update.phase, Phase::Update);
        assert_abs_diff_eq!(update.dy, -0.1 * UNITS_PER_PAD, epsilon = 1e-4);
        assert_eq!(update.time_us, 10_000);

        // No motion, no event.
        assert_eq!(det.update(&frame(3, 0.7, 12_000)), None);

        let end = det.update(&frame(2, 0.7, 20_000)).unwrap();
        assert_eq!(end.phase, Phase::End);
        assert!(!det.is_active());
        assert_eq!(det.update(&frame(0, 0.5, 30_000)), None);
    }

    #[test]
    fn four_fingers_end_the_swipe() {
        let mut det = SwipeDetector::new();
        det.update(&frame(3, 0.5, 0));
        let end = det.update(&frame(4, 0.5, 5_000)).unwrap();
        assert_eq!(end.phase, Phase::End);
        assert_eq!(det.update(&frame(4, 0.4, 6_000)), None);
    }
}
