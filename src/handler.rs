//! Three-finger vertical swipe state machine.
//!
//! A swipe up from the desktop builds a slider tree over the overview chrome
//! and backgrounds and shows the overview at progress 0. Further updates move
//! the tree's progress with the finger. When the fingers lift, the exit
//! velocity and the distance covered decide whether the reveal completes or
//! the overview is hidden again. A swipe down while the overview is up runs
//! the same machinery in reverse on the existing tree.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::{debug, trace};
use serde::Serialize;

use crate::config::Settings;
use crate::event::{EventKind, GestureEvent, Phase, Propagation};
use crate::host::{Overview, Property, SLIDE_X_TRANSITION, TRANSLATION_X_TRANSITION};
use crate::slider::{DelaySlider, PropertiesSlider, Slider, SliderRef, TeeSlider, Values};
use crate::speed::SpeedEstimator;

/// Duration of the commit animation.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(200);

/// Gesture distance that maps to full progress at sensitivity factor 1.
pub const FULL_PROGRESS_DISTANCE: f64 = 200.;

/// Fraction of the gesture after which chrome and backgrounds start changing.
pub const CONTROLS_DELAY: f64 = 0.7;

/// Background dimming at full reveal.
pub const VIGNETTE_BRIGHTNESS: f64 = 0.5;
pub const VIGNETTE_SHARPNESS: f64 = 0.7;

const SWIPE_FINGERS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwipeState {
    #[default]
    Ready,
    SwipingUp,
    SwipingDown,
    Closing,
}

impl SwipeState {
    pub fn is_swiping(self) -> bool {
        matches!(self, SwipeState::SwipingUp | SwipeState::SwipingDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Finish at the revealed state.
    Commit,
    /// Hide the overview.
    Cancel,
}

/// Commit/cancel policy. `velocity_y` is in units per 10 ms, negative is up.
pub fn decide(state: SwipeState, progress: f64, velocity_y: f64) -> Decision {
    let v = velocity_y;
    let p = progress;
    let commit = match state {
        SwipeState::SwipingUp => v < -2. || (p > 0.4 && v < -0.1) || (p > 0.6 && v <= 0.),
        SwipeState::SwipingDown => {
            !(v > 2. || (p < 0.6 && v > 0.1) || (p < 0.4 && v >= 0.))
        }
        SwipeState::Ready | SwipeState::Closing => false,
    };

    if commit {
        Decision::Commit
    } else {
        Decision::Cancel
    }
}

/// Progress for accumulated vertical displacement `dy`, `None` outside a swipe.
pub fn swipe_progress(state: SwipeState, dy: f64, sensitivity: f64) -> Option<f64> {
    let travel = |magnitude: f64| f64::min(1., magnitude / FULL_PROGRESS_DISTANCE * sensitivity);
    match state {
        SwipeState::SwipingUp => Some(travel(f64::max(-dy, 0.))),
        SwipeState::SwipingDown => Some(1. - travel(f64::max(dy, 0.))),
        SwipeState::Ready | SwipeState::Closing => None,
    }
}

/// State shared between the gesture handler and the layout adapter.
#[derive(Default)]
pub struct SwipeSession {
    state: Cell<SwipeState>,
    root: RefCell<Option<Rc<TeeSlider>>>,
}

impl SwipeSession {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn state(&self) -> SwipeState {
        self.state.get()
    }

    /// The slider tree driven by the current reveal, if any.
    pub fn root(&self) -> Option<Rc<TeeSlider>> {
        self.root.borrow().clone()
    }

    fn set_state(&self, state: SwipeState) {
        let old = self.state.replace(state);
        if old != state {
            trace!("swipe state {old:?} -> {state:?}");
        }
    }

    fn set_root(&self, root: Option<Rc<TeeSlider>>) {
        let old = self.root.replace(root);
        drop(old);
    }
}

fn opacity(value: f64) -> Values {
    Values::from([(Property::Opacity, value)])
}

pub struct GestureHandler {
    session: Rc<SwipeSession>,
    overview: Rc<dyn Overview>,
    sensitivity: Cell<f64>,
    dx: Cell<f64>,
    dy: Cell<f64>,
    speed: RefCell<Option<SpeedEstimator>>,
    controls: RefCell<Option<Rc<DelaySlider>>>,
}

impl GestureHandler {
    pub fn new(session: Rc<SwipeSession>, overview: Rc<dyn Overview>, settings: &Settings) -> Self {
        Self {
            session,
            overview,
            sensitivity: Cell::new(settings.sensitivity_factor()),
            dx: Cell::new(0.),
            dy: Cell::new(0.),
            speed: RefCell::new(None),
            controls: RefCell::new(None),
        }
    }

    pub fn session(&self) -> &Rc<SwipeSession> {
        &self.session
    }

    pub fn state(&self) -> SwipeState {
        self.session.state()
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity.get()
    }

    pub fn apply_settings(&self, settings: &Settings) {
        self.sensitivity.set(settings.sensitivity_factor());
        debug!("sensitivity factor now {:.3}", self.sensitivity.get());
    }

    /// Progress implied by the displacement accumulated so far.
    pub fn progress(&self) -> Option<f64> {
        swipe_progress(self.state(), self.dy.get(), self.sensitivity.get())
    }

    pub fn handle_event(&self, event: &GestureEvent) -> Propagation {
        if event.kind != EventKind::TouchpadSwipe || event.fingers != SWIPE_FINGERS {
            return Propagation::Propagate;
        }

        match event.phase {
            Phase::Begin => {
                if self.state() != SwipeState::Ready {
                    trace!("ignoring swipe begin in {:?}", self.state());
                    return Propagation::Propagate;
                }
                *self.speed.borrow_mut() = Some(SpeedEstimator::new());
                self.dx.set(0.);
                self.dy.set(0.);
                self.begin();
            }
            Phase::Update => {
                if !self.state().is_swiping() {
                    return Propagation::Propagate;
                }
                if let Some(speed) = self.speed.borrow_mut().as_mut() {
                    speed.update(event.dx, event.dy, event.time_us);
                }
                self.dx.set(self.dx.get() + event.dx);
                self.dy.set(self.dy.get() + event.dy);
                self.apply_progress();
            }
            Phase::End | Phase::Cancel => {
                if !self.state().is_swiping() {
                    return Propagation::Propagate;
                }
                self.finish();
            }
        }

        Propagation::Stop
    }

    /// Releases everything built for the reveal. Call when the overview has
    /// finished hiding.
    pub fn on_overview_hidden(&self) {
        let controls = self.controls.borrow_mut().take();
        if let Some(controls) = controls {
            // Leave the chrome fully visible for the next non-gesture show.
            controls.set_progress(1.);
        }
        self.session.set_root(None);
        self.speed.borrow_mut().take();
        self.session.set_state(SwipeState::Ready);
        debug!("overview hidden, swipe session reset");
    }

    fn begin(&self) {
        if self.session.root().is_some() || self.overview.is_visible() {
            self.session.set_state(SwipeState::SwipingDown);
        } else {
            self.session.set_state(SwipeState::SwipingUp);
            self.build_reveal();
        }
        debug!("swipe began in {:?}", self.state());
        self.apply_progress();
    }

    fn build_reveal(&self) {
        let controls = self.overview.controls();
        for side in [&controls.dash, &controls.thumbnails] {
            side.remove_transition(SLIDE_X_TRANSITION);
            side.remove_transition(TRANSLATION_X_TRANSITION);
        }

        let fades: Vec<SliderRef> = [
            &controls.dash,
            &controls.thumbnails,
            &controls.cover_pane,
            &controls.search_entry,
        ]
        .into_iter()
        .map(|actor| {
            Rc::new(PropertiesSlider::new(actor.clone(), opacity(0.), opacity(255.))) as SliderRef
        })
        .collect();
        let controls_slider = Rc::new(DelaySlider::new(
            Rc::new(TeeSlider::new(fades)),
            CONTROLS_DELAY,
        ));
        *self.controls.borrow_mut() = Some(controls_slider.clone());

        let root = Rc::new(TeeSlider::new(vec![controls_slider as SliderRef]));
        self.session.set_root(Some(root.clone()));

        // Layout passes triggered from here already see the new root.
        self.overview.show();

        controls.cover_pane.remove_all_transitions();
        for background in self.overview.backgrounds() {
            let dim = PropertiesSlider::new(
                background.clone(),
                Values::from([
                    (Property::Brightness, 1.),
                    (Property::VignetteSharpness, 0.),
                ]),
                Values::from([
                    (Property::Brightness, VIGNETTE_BRIGHTNESS),
                    (Property::VignetteSharpness, VIGNETTE_SHARPNESS),
                ]),
            );
            root.add_slider(Rc::new(DelaySlider::new(Rc::new(dim), CONTROLS_DELAY)));
            background.remove_all_transitions();
        }
    }

    fn apply_progress(&self) {
        let (Some(root), Some(progress)) = (self.session.root(), self.progress()) else {
            return;
        };
        root.set_progress(progress);
    }

    fn finish(&self) {
        let speed = self
            .speed
            .borrow_mut()
            .take()
            .map(|estimator| estimator.speed())
            .unwrap_or_default();
        let state = self.state();
        let progress = self.progress().unwrap_or(0.);
        let decision = decide(state, progress, speed.y);
        debug!(
            "swipe ended in {state:?}: progress {progress:.3}, speed {:.3} -> {decision:?}",
            speed.y
        );

        self.session.set_state(SwipeState::Closing);
        match decision {
            Decision::Commit => {
                if let Some(root) = self.session.root() {
                    root.animate_to_end(ANIMATION_DURATION, None);
                }
                self.session.set_state(SwipeState::Ready);
            }
            Decision::Cancel => {
                self.overview.hide();
                if !self.overview.is_visible() {
                    // Nothing to hide, so no "hidden" notification is coming.
                    self.on_overview_hidden();
                }
            }
        }
    }
}
