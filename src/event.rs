use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    #[default]
    TouchpadSwipe,
    TouchpadPinch,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Begin,
    Update,
    End,
    Cancel,
}

/// One touchpad gesture event as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub kind: EventKind,
    pub fingers: u32,
    pub phase: Phase,
    /// Motion delta, only meaningful for [`Phase::Update`].
    pub dx: f64,
    pub dy: f64,
    /// Monotonic timestamp in microseconds.
    pub time_us: i64,
}

impl GestureEvent {
    pub fn swipe(fingers: u32, phase: Phase, time_us: i64) -> Self {
        Self {
            kind: EventKind::TouchpadSwipe,
            fingers,
            phase,
            dx: 0.,
            dy: 0.,
            time_us,
        }
    }

    pub fn swipe_update(fingers: u32, dx: f64, dy: f64, time_us: i64) -> Self {
        Self {
            dx,
            dy,
            ..Self::swipe(fingers, Phase::Update, time_us)
        }
    }
}

/// Whether the host should keep delivering the event to other handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Propagation {
    Propagate,
    Stop,
}
