use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use super::Slider;
use crate::host::{ActorRef, Completion, Ease, EaseMode, Property};

pub type Values = BTreeMap<Property, f64>;

const OPACITY_RANGE: (f64, f64) = (0., 255.);

/// Linearly interpolates actor properties between two sets of values.
///
/// Only properties present in both `start` and `end` are touched.
pub struct PropertiesSlider {
    latest: Cell<f64>,
    actor: ActorRef,
    start: RefCell<Values>,
    end: RefCell<Values>,
}

impl PropertiesSlider {
    pub fn new(actor: ActorRef, start: Values, end: Values) -> Self {
        Self {
            latest: Cell::new(0.),
            actor,
            start: RefCell::new(start),
            end: RefCell::new(end),
        }
    }

    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    pub fn start_vals(&self) -> Values {
        self.start.borrow().clone()
    }

    pub fn end_vals(&self) -> Values {
        self.end.borrow().clone()
    }

    pub fn set_start_vals(&self, vals: Values) {
        *self.start.borrow_mut() = vals;
    }

    pub fn set_end_vals(&self, vals: Values) {
        *self.end.borrow_mut() = vals;
    }

    pub fn set_endpoints(&self, start: Values, end: Values) {
        self.set_start_vals(start);
        self.set_end_vals(end);
    }

    fn animate_to(&self, values: &Values, duration: Duration, on_complete: Option<Completion>) {
        let targets = values
            .iter()
            .map(|(&prop, &value)| {
                let value = if prop == Property::Opacity {
                    value.clamp(OPACITY_RANGE.0, OPACITY_RANGE.1)
                } else {
                    value
                };
                (prop, value)
            })
            .collect();

        self.actor.ease(
            Ease {
                targets,
                duration,
                mode: EaseMode::EaseOutQuad,
            },
            on_complete,
        );
    }
}

impl Slider for PropertiesSlider {
    fn latest(&self) -> &Cell<f64> {
        &self.latest
    }

    fn apply(&self, progress: f64) {
        let values: Vec<(Property, f64)> = {
            let start = self.start.borrow();
            let end = self.end.borrow();
            start
                .iter()
                .filter_map(|(prop, &from)| {
                    let to = *end.get(prop)?;
                    Some((*prop, to * progress + from * (1. - progress)))
                })
                .collect()
        };

        for (prop, value) in values {
            self.actor.set_number(prop, value);
        }
    }

    fn animate_to_start(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(0.);
        let start = self.start_vals();
        self.animate_to(&start, duration, on_complete);
    }

    fn animate_to_end(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(1.);
        let end = self.end_vals();
        self.animate_to(&end, duration, on_complete);
    }
}
