//! Scripted gesture sessions against the simulated host.
//!
//! A trace is a TOML file:
//!
//! ```toml
//! sensitivity = 50
//!
//! [[step]]
//! kind = "gesture"
//! phase = "begin"
//!
//! [[step]]
//! kind = "advance"
//! ms = 8
//!
//! [[step]]
//! kind = "gesture"
//! phase = "update"
//! dy = -40.0
//! ```
//!
//! Gesture timestamps come from the scene clock, so `advance` steps control
//! the swipe's speed. An `advance` without `ms` runs until the scene is idle.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::overview::{SceneSnapshot, SimLayout, SimOverview};
use super::scene::Scene;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::event::{EventKind, GestureEvent, Phase, Propagation};
use crate::handler::SwipeState;
use crate::runtime::SmoothSwipe;

fn default_fingers() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
    Gesture {
        phase: Phase,
        #[serde(default)]
        source: EventKind,
        #[serde(default = "default_fingers")]
        fingers: u32,
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
    },
    Advance {
        ms: Option<u64>,
    },
    Settings {
        sensitivity: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trace {
    pub sensitivity: Option<i64>,
    #[serde(default)]
    pub layout: SimLayout,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Trace {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Trace(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub time_us: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<Propagation>,
    pub state: SwipeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub state: SwipeState,
    pub progress: Option<f64>,
    pub scene: SceneSnapshot,
}

pub fn replay(trace: &Trace) -> Result<ReplayReport> {
    let settings = match trace.sensitivity {
        Some(value) => Settings::with_sensitivity(value)?,
        None => Settings::default(),
    };

    let scene = Scene::new();
    let overview = SimOverview::new(scene.clone(), &trace.layout);
    let swipe = SmoothSwipe::enable(overview.host(), &settings)?;

    let mut outcomes = Vec::with_capacity(trace.steps.len());
    for (index, step) in trace.steps.iter().enumerate() {
        let propagation = match *step {
            Step::Gesture {
                phase,
                source,
                fingers,
                dx,
                dy,
            } => {
                let event = GestureEvent {
                    kind: source,
                    fingers,
                    phase,
                    dx,
                    dy,
                    time_us: scene.now_us(),
                };
                Some(swipe.handle_event(&event))
            }
            Step::Advance { ms: Some(ms) } => {
                scene.advance(Duration::from_millis(ms));
                None
            }
            Step::Advance { ms: None } => {
                scene.settle();
                None
            }
            Step::Settings { sensitivity } => {
                swipe.apply_settings(&Settings::with_sensitivity(sensitivity)?);
                None
            }
        };

        debug!("step {index}: {step:?} -> {:?}", swipe.state());
        outcomes.push(StepOutcome {
            index,
            time_us: scene.now_us(),
            propagation,
            state: swipe.state(),
            progress: swipe.progress(),
        });
    }

    let report = ReplayReport {
        steps: outcomes,
        state: swipe.state(),
        progress: swipe.progress(),
        scene: overview.snapshot(),
    };
    swipe.disable();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLICK: &str = r#"
        [[step]]
        kind = "gesture"
        phase = "begin"

        [[step]]
        kind = "advance"
        ms = 8

        [[step]]
        kind = "gesture"
        phase = "update"
        dy = -30.0

        [[step]]
        kind = "advance"
        ms = 8

        [[step]]
        kind = "gesture"
        phase = "update"
        dy = -40.0

        [[step]]
        kind = "gesture"
        phase = "end"

        [[step]]
        kind = "advance"
    "#;

    #[test]
    fn parses_steps_with_defaults() {
        let trace = Trace::parse(FLICK).unwrap();
        assert_eq!(trace.steps.len(), 7);
        assert_eq!(trace.layout, SimLayout::default());
        assert_eq!(
            trace.steps[2],
            Step::Gesture {
                phase: Phase::Update,
                source: EventKind::TouchpadSwipe,
                fingers: 3,
                dx: 0.,
                dy: -30.,
            }
        );
        assert_eq!(trace.steps[6], Step::Advance { ms: None });
    }

    #[test]
    fn rejects_unknown_steps() {
        let err = Trace::parse("[[step]]\nkind = \"tap\"\n").unwrap_err();
        assert!(matches!(err, Error::Trace(_)));
    }

    #[test]
    fn flick_replay_reveals() {
        let report = replay(&Trace::parse(FLICK).unwrap()).unwrap();
        assert_eq!(report.state, SwipeState::Ready);
        assert_eq!(report.progress, Some(1.));
        assert!(report.scene.visible);
        assert_eq!(report.steps[0].propagation, Some(Propagation::Stop));
        assert_eq!(report.steps[0].state, SwipeState::SwipingUp);
        assert_eq!(report.steps[2].time_us, 8_000);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["steps"][0]["propagation"], "stop");
        assert!(json["scene"]["actors"].as_array().unwrap().len() > 4);
    }

    #[test]
    fn settings_step_changes_distance() {
        let text = r#"
            sensitivity = 0

            [[step]]
            kind = "gesture"
            phase = "begin"

            [[step]]
            kind = "gesture"
            phase = "update"
            dy = -150.0

            [[step]]
            kind = "settings"
            sensitivity = 100

            [[step]]
            kind = "gesture"
            phase = "update"
            dy = -0.0
        "#;
        let report = replay(&Trace::parse(text).unwrap()).unwrap();
        assert_eq!(report.steps[1].progress, Some(0.25));
        assert_eq!(report.steps[3].progress, Some(0.75));
    }

    #[test]
    fn bundled_demos_replay() {
        let flick = Trace::parse(include_str!("../../demos/flick.toml")).unwrap();
        let report = replay(&flick).unwrap();
        assert!(report.scene.visible);

        let slow = Trace::parse(include_str!("../../demos/slow-drag.toml")).unwrap();
        let report = replay(&slow).unwrap();
        assert!(!report.scene.visible);
        assert_eq!(report.state, SwipeState::Ready);
    }

    #[test]
    fn invalid_settings_fail_the_replay() {
        let text = "sensitivity = 300\n";
        assert!(matches!(
            replay(&Trace::parse(text).unwrap()),
            Err(Error::InvalidSensitivity(300))
        ));
    }

    #[test]
    fn other_gestures_pass_through() {
        let text = r#"
            [[step]]
            kind = "gesture"
            phase = "begin"
            fingers = 4

            [[step]]
            kind = "gesture"
            phase = "begin"
            source = "touchpad-pinch"
        "#;
        let report = replay(&Trace::parse(text).unwrap()).unwrap();
        assert!(
            report
                .steps
                .iter()
                .all(|s| s.propagation == Some(Propagation::Propagate))
        );
        assert!(!report.scene.visible);
    }
}
