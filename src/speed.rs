//! Rolling velocity estimate over the most recent gesture deltas.

use std::collections::VecDeque;

/// Samples older than this (relative to the newest one) are dropped.
pub const WINDOW_US: i64 = 50_000;

/// Output is in distance units per 10 ms.
const SPEED_SCALE: f64 = 10_000.;

const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct MotionSample {
    dx: f64,
    dy: f64,
    time_us: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speed {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default)]
pub struct SpeedEstimator {
    samples: VecDeque<MotionSample>,
    sum_dx: f64,
    sum_dy: f64,
}

impl SpeedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new delta. A timestamp older than the newest sample (a wall
    /// clock step) is treated as simultaneous with it.
    pub fn update(&mut self, dx: f64, dy: f64, time_us: i64) {
        let time_us = match self.samples.back() {
            Some(last) => time_us.max(last.time_us),
            None => time_us,
        };
        self.samples.push_back(MotionSample { dx, dy, time_us });
        self.sum_dx += dx;
        self.sum_dy += dy;

        while self.samples.len() > MIN_SAMPLES {
            let Some(oldest) = self.samples.front().copied() else {
                break;
            };
            if time_us - oldest.time_us <= WINDOW_US {
                break;
            }
            self.sum_dx -= oldest.dx;
            self.sum_dy -= oldest.dy;
            self.samples.pop_front();
        }
    }

    pub fn speed(&self) -> Speed {
        if self.samples.len() < MIN_SAMPLES {
            return Speed::default();
        }

        let span = self.time_span();
        if span == 0 {
            return Speed::default();
        }

        let span = span as f64;
        Speed {
            x: self.sum_dx * SPEED_SCALE / span,
            y: self.sum_dy * SPEED_SCALE / span,
        }
    }

    /// Newest minus oldest retained timestamp.
    pub fn time_span(&self) -> i64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.time_us - first.time_us,
            _ => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_and_single_sample_are_still() {
        let mut est = SpeedEstimator::new();
        assert_eq!(est.speed(), Speed::default());

        est.update(5., -5., 1_000);
        assert_eq!(est.speed(), Speed::default());
    }

    #[test]
    fn two_samples() {
        let mut est = SpeedEstimator::new();
        est.update(3., -4., 10_000);
        est.update(1., -6., 30_000);

        let speed = est.speed();
        assert_abs_diff_eq!(speed.x, 4. * 10_000. / 20_000.);
        assert_abs_diff_eq!(speed.y, -10. * 10_000. / 20_000.);
    }

    #[test]
    fn backwards_clock_step_keeps_direction() {
        let mut est = SpeedEstimator::new();
        est.update(0., -10., 1_000_000);
        est.update(0., -10., 1_010_000);
        est.update(0., -10., 400_000);

        assert_eq!(est.time_span(), 10_000);
        assert!(est.speed().y < 0.);
        assert_abs_diff_eq!(est.speed().y, -30.);
    }

    #[test]
    fn stale_samples_are_evicted() {
        let mut est = SpeedEstimator::new();
        est.update(100., 100., 0);
        est.update(1., 1., 60_000);
        // Only two samples, nothing can be dropped yet.
        assert_eq!(est.len(), 2);

        est.update(1., 1., 70_000);
        assert_eq!(est.len(), 2);
        assert_eq!(est.time_span(), 10_000);

        let speed = est.speed();
        assert_abs_diff_eq!(speed.x, 2. * 10_000. / 10_000.);
    }

    #[test]
    fn sample_exactly_at_window_edge_is_kept() {
        let mut est = SpeedEstimator::new();
        est.update(1., 0., 0);
        est.update(1., 0., 10_000);
        est.update(1., 0., 50_000);
        assert_eq!(est.len(), 3);
    }

    #[test]
    fn zero_span_does_not_divide_by_zero() {
        let mut est = SpeedEstimator::new();
        est.update(1., 1., 5);
        est.update(1., 1., 5);
        assert_eq!(est.speed(), Speed::default());
    }

    proptest! {
        #[test]
        fn window_invariant(
            steps in prop::collection::vec((-50f64..50., -50f64..50., 0i64..40_000), 1..64)
        ) {
            let mut est = SpeedEstimator::new();
            let mut now = 0;
            for (dx, dy, gap) in steps {
                now += gap;
                est.update(dx, dy, now);

                prop_assert!(est.len() <= MIN_SAMPLES || est.time_span() <= WINDOW_US);

                let sum_dx: f64 = est.samples.iter().map(|s| s.dx).sum();
                let sum_dy: f64 = est.samples.iter().map(|s| s.dy).sum();
                prop_assert!((sum_dx - est.sum_dx).abs() < 1e-6);
                prop_assert!((sum_dy - est.sum_dy).abs() < 1e-6);
            }
        }
    }
}
