use std::cell::Cell;
use std::time::Duration;

use super::{Slider, SliderRef};
use crate::host::Completion;

/// Holds its child at the start until progress passes `delay`, then catches
/// up so the child reaches `1.0` together with the overall progress.
pub struct DelaySlider {
    latest: Cell<f64>,
    child: SliderRef,
    delay: f64,
}

impl DelaySlider {
    pub fn new(child: SliderRef, delay: f64) -> Self {
        debug_assert!(
            (0. ..1.).contains(&delay),
            "delay must be in [0, 1), got {delay}"
        );
        Self {
            latest: Cell::new(0.),
            child,
            delay,
        }
    }

    pub fn child(&self) -> &SliderRef {
        &self.child
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }
}

impl Slider for DelaySlider {
    fn latest(&self) -> &Cell<f64> {
        &self.latest
    }

    fn apply(&self, progress: f64) {
        let delay = self.delay;
        self.child
            .set_progress(f64::max(0., (progress - delay) / (1. - delay)));
    }

    fn animate_to_start(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(0.);
        self.child.animate_to_start(duration, on_complete);
    }

    fn animate_to_end(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(1.);
        self.child.animate_to_end(duration, on_complete);
    }
}
