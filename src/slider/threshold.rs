use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use super::Slider;
use crate::host::{ActorRef, Completion, Property, Timers};

/// Progress past which a threshold slider switches to its end value.
pub const DEFAULT_THRESHOLD: f64 = 0.99999;

/// Step function over a flag property.
///
/// Animations are not eased: the value is assigned once the duration has
/// elapsed, unless a later assignment superseded it.
pub struct ThresholdSlider {
    latest: Cell<f64>,
    generation: Rc<Cell<u64>>,
    actor: ActorRef,
    property: Property,
    start: bool,
    end: bool,
    threshold: f64,
    timers: Rc<dyn Timers>,
}

impl ThresholdSlider {
    pub fn new(
        actor: ActorRef,
        property: Property,
        start: bool,
        end: bool,
        threshold: f64,
        timers: Rc<dyn Timers>,
    ) -> Self {
        Self {
            latest: Cell::new(0.),
            generation: Rc::new(Cell::new(0)),
            actor,
            property,
            start,
            end,
            threshold,
            timers,
        }
    }

    fn supersede(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    fn assign_after(&self, value: bool, duration: Duration, on_complete: Option<Completion>) {
        let ticket = self.supersede();
        let generation = self.generation.clone();
        let actor = self.actor.clone();
        let property = self.property;
        self.timers.timeout(
            duration,
            Box::new(move || {
                // Dropping `on_complete` unrun matches a removed transition.
                if generation.get() != ticket {
                    return;
                }
                actor.set_flag(property, value);
                if let Some(callback) = on_complete {
                    callback();
                }
            }),
        );
    }
}

impl Slider for ThresholdSlider {
    fn latest(&self) -> &Cell<f64> {
        &self.latest
    }

    fn apply(&self, progress: f64) {
        let value = if progress > self.threshold {
            self.end
        } else {
            self.start
        };
        self.supersede();
        self.actor.set_flag(self.property, value);
    }

    fn animate_to_start(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(0.);
        self.assign_after(self.start, duration, on_complete);
    }

    fn animate_to_end(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(1.);
        self.assign_after(self.end, duration, on_complete);
    }
}
