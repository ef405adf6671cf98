//! Progress sliders: units that map one scalar progress onto visual state.
//!
//! `0.0` is the start (dismissed) state and `1.0` the end (revealed) state.
//! Sliders compose: a [`TeeSlider`] fans one progress value out to many
//! children, a [`DelaySlider`] holds its child back until a fraction of the
//! gesture has passed, and a [`ThresholdSlider`] flips a flag near the end.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::host::Completion;

mod delay;
mod properties;
mod tee;
mod threshold;

pub use delay::DelaySlider;
pub use properties::{PropertiesSlider, Values};
pub use tee::TeeSlider;
pub use threshold::{DEFAULT_THRESHOLD, ThresholdSlider};

pub type SliderRef = Rc<dyn Slider>;

pub trait Slider {
    /// Storage for the most recently applied progress.
    fn latest(&self) -> &Cell<f64>;

    /// Applies `progress` to whatever this slider drives.
    fn apply(&self, progress: f64);

    /// Eases towards progress `0.0`.
    fn animate_to_start(&self, duration: Duration, on_complete: Option<Completion>);

    /// Eases towards progress `1.0`.
    fn animate_to_end(&self, duration: Duration, on_complete: Option<Completion>);

    fn progress(&self) -> f64 {
        self.latest().get()
    }

    /// Out-of-range values are applied as-is.
    fn set_progress(&self, progress: f64) {
        self.latest().set(progress);
        self.apply(progress);
    }

    /// Reapplies the latest progress, e.g. after the endpoints changed.
    fn update(&self) {
        self.apply(self.progress());
    }
}

/// Identity comparison of two slider handles.
pub fn same_slider(a: &SliderRef, b: &SliderRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
