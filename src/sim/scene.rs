//! In-memory actors driven by a manual clock.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::warn;
use serde::Serialize;

use crate::host::{Actor, ActorId, Completion, Ease, EaseMode, Property, Timers};

/// Length of one simulated frame.
pub const FRAME: Duration = Duration::from_micros(16_667);

/// Upper bound on frames run by [`Scene::settle`].
const SETTLE_MAX_FRAMES: usize = 10_000;

struct PendingTimer {
    due_us: i64,
    seq: u64,
    callback: Completion,
}

#[derive(Default)]
pub struct Scene {
    now_us: Cell<i64>,
    next_id: Cell<u64>,
    next_seq: Cell<u64>,
    actors: RefCell<Vec<Rc<SceneActor>>>,
    timers: RefCell<Vec<PendingTimer>>,
}

impl Scene {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Current time in microseconds.
    pub fn now_us(&self) -> i64 {
        self.now_us.get()
    }

    pub fn actor(self: &Rc<Self>, name: &str) -> Rc<SceneActor> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let actor = Rc::new(SceneActor {
            id: ActorId(id),
            name: name.to_string(),
            scene: Rc::downgrade(self),
            numbers: RefCell::new(BTreeMap::new()),
            flags: RefCell::new(BTreeMap::new()),
            transitions: RefCell::new(Vec::new()),
            on_destroy: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        });
        self.actors.borrow_mut().push(actor.clone());
        actor
    }

    pub fn is_idle(&self) -> bool {
        self.timers.borrow().is_empty()
            && self
                .actors
                .borrow()
                .iter()
                .all(|a| a.transitions.borrow().is_empty())
    }

    /// Moves the clock forward frame by frame.
    pub fn advance(&self, by: Duration) {
        let target = self.now_us.get() + by.as_micros() as i64;
        let frame = FRAME.as_micros() as i64;
        while self.now_us.get() < target {
            let now = (self.now_us.get() + frame).min(target);
            self.now_us.set(now);
            self.tick(now);
        }
    }

    /// Advances until no transition or timer is pending.
    pub fn settle(&self) {
        for _ in 0..SETTLE_MAX_FRAMES {
            if self.is_idle() {
                return;
            }
            self.advance(FRAME);
        }
        warn!("scene did not settle after {SETTLE_MAX_FRAMES} frames");
    }

    fn tick(&self, now: i64) {
        let mut done = Vec::new();

        let actors = self.actors.borrow().clone();
        for actor in &actors {
            actor.step(now, &mut done);
        }
        self.actors.borrow_mut().retain(|a| !a.destroyed.get());

        let mut due = {
            let mut timers = self.timers.borrow_mut();
            let (due, pending): (Vec<_>, Vec<_>) =
                timers.drain(..).partition(|t| t.due_us <= now);
            *timers = pending;
            due
        };
        due.sort_by_key(|t| (t.due_us, t.seq));
        done.extend(due.into_iter().map(|t| t.callback));

        for callback in done {
            callback();
        }
    }
}

impl Timers for Scene {
    fn timeout(&self, after: Duration, callback: Completion) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().push(PendingTimer {
            due_us: self.now_us.get() + after.as_micros() as i64,
            seq,
            callback,
        });
    }
}

/// Completion shared by the per-property transitions of one ease.
struct EaseGroup {
    remaining: Cell<usize>,
    on_complete: RefCell<Option<Completion>>,
}

struct Transition {
    property: Property,
    from: f64,
    to: f64,
    start_us: i64,
    duration_us: i64,
    mode: EaseMode,
    group: Rc<EaseGroup>,
}

impl Transition {
    fn value_at(&self, now: i64) -> f64 {
        let t = (now - self.start_us) as f64 / self.duration_us as f64;
        let eased = self.mode.apply(t);
        self.from + (self.to - self.from) * eased
    }

    fn is_done(&self, now: i64) -> bool {
        now - self.start_us >= self.duration_us
    }

    /// Drops the group's completion without running it.
    fn cancel(self) {
        let callback = self.group.on_complete.borrow_mut().take();
        drop(callback);
    }
}

pub struct SceneActor {
    id: ActorId,
    name: String,
    scene: Weak<Scene>,
    numbers: RefCell<BTreeMap<Property, f64>>,
    flags: RefCell<BTreeMap<Property, bool>>,
    transitions: RefCell<Vec<Transition>>,
    on_destroy: RefCell<Vec<Completion>>,
    destroyed: Cell<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActorSnapshot {
    pub name: String,
    pub numbers: BTreeMap<Property, f64>,
    pub flags: BTreeMap<Property, bool>,
}

fn default_number(prop: Property) -> f64 {
    match prop {
        Property::ScaleX | Property::ScaleY | Property::Brightness => 1.,
        Property::Opacity => 255.,
        _ => 0.,
    }
}

fn default_flag(prop: Property) -> bool {
    matches!(prop, Property::Visible)
}

impl SceneActor {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.borrow().is_empty()
    }

    pub fn transition_names(&self) -> Vec<&'static str> {
        self.transitions
            .borrow()
            .iter()
            .map(|t| t.property.transition_name())
            .collect()
    }

    /// Starts a transition on a single property. Used for named layout
    /// transitions such as [`crate::host::SLIDE_X_TRANSITION`].
    pub fn ease_property(&self, property: Property, to: f64, duration: Duration) {
        self.ease(
            Ease {
                targets: vec![(property, to)],
                duration,
                mode: EaseMode::EaseOutQuad,
            },
            None,
        );
    }

    /// Cancels transitions, runs the destroy callbacks and detaches from the
    /// scene.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.remove_all_transitions();
        let callbacks = std::mem::take(&mut *self.on_destroy.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            name: self.name.clone(),
            numbers: self.numbers.borrow().clone(),
            flags: self.flags.borrow().clone(),
        }
    }

    fn step(&self, now: i64, done: &mut Vec<Completion>) {
        let finished = {
            let mut transitions = self.transitions.borrow_mut();
            let mut numbers = self.numbers.borrow_mut();
            let mut finished = Vec::new();
            transitions.retain(|t| {
                if t.is_done(now) {
                    numbers.insert(t.property, t.to);
                    finished.push(t.group.clone());
                    false
                } else {
                    numbers.insert(t.property, t.value_at(now));
                    true
                }
            });
            finished
        };

        for group in finished {
            let remaining = group.remaining.get().saturating_sub(1);
            group.remaining.set(remaining);
            if remaining == 0 {
                if let Some(callback) = group.on_complete.borrow_mut().take() {
                    done.push(callback);
                }
            }
        }
    }

    fn remove_where(&self, pred: impl Fn(&Transition) -> bool) {
        let removed: Vec<Transition> = {
            let mut transitions = self.transitions.borrow_mut();
            let (removed, kept): (Vec<_>, Vec<_>) = transitions.drain(..).partition(|t| pred(t));
            *transitions = kept;
            removed
        };
        for transition in removed {
            transition.cancel();
        }
    }
}

impl Actor for SceneActor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn number(&self, prop: Property) -> f64 {
        self.numbers
            .borrow()
            .get(&prop)
            .copied()
            .unwrap_or_else(|| default_number(prop))
    }

    /// A direct assignment removes any running transition on `prop`.
    fn set_number(&self, prop: Property, value: f64) {
        self.remove_transition(prop.transition_name());
        self.numbers.borrow_mut().insert(prop, value);
    }

    fn flag(&self, prop: Property) -> bool {
        self.flags
            .borrow()
            .get(&prop)
            .copied()
            .unwrap_or_else(|| default_flag(prop))
    }

    fn set_flag(&self, prop: Property, value: bool) {
        self.flags.borrow_mut().insert(prop, value);
    }

    fn ease(&self, ease: Ease, on_complete: Option<Completion>) {
        let Some(scene) = self.scene.upgrade() else {
            return;
        };
        if self.destroyed.get() {
            return;
        }

        let duration_us = ease.duration.as_micros() as i64;
        if ease.targets.is_empty() || duration_us == 0 {
            for &(prop, value) in &ease.targets {
                self.set_number(prop, value);
            }
            if let Some(callback) = on_complete {
                scene.timeout(Duration::ZERO, callback);
            }
            return;
        }

        let group = Rc::new(EaseGroup {
            remaining: Cell::new(ease.targets.len()),
            on_complete: RefCell::new(on_complete),
        });
        let now = scene.now_us();
        for &(property, to) in &ease.targets {
            self.remove_transition(property.transition_name());
            self.transitions.borrow_mut().push(Transition {
                property,
                from: self.number(property),
                to,
                start_us: now,
                duration_us,
                mode: ease.mode,
                group: group.clone(),
            });
        }
    }

    fn remove_transition(&self, name: &str) {
        self.remove_where(|t| t.property.transition_name() == name);
    }

    fn remove_all_transitions(&self) {
        self.remove_where(|_| true);
    }

    fn connect_destroy(&self, callback: Completion) {
        if self.destroyed.get() {
            return;
        }
        self.on_destroy.borrow_mut().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn ease(targets: &[(Property, f64)], ms: u64) -> Ease {
        Ease {
            targets: targets.to_vec(),
            duration: Duration::from_millis(ms),
            mode: EaseMode::EaseOutQuad,
        }
    }

    #[test]
    fn ease_follows_curve() {
        let scene = Scene::new();
        let actor = scene.actor("a");
        actor.ease(ease(&[(Property::X, 100.)], 200), None);

        scene.advance(Duration::from_millis(100));
        assert_abs_diff_eq!(actor.number(Property::X), 75., epsilon = 1e-6);

        scene.settle();
        assert_eq!(actor.number(Property::X), 100.);
        assert!(scene.is_idle());
    }

    #[test]
    fn replaced_transition_drops_completion() {
        let scene = Scene::new();
        let actor = scene.actor("a");
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        actor.ease(
            ease(&[(Property::X, 100.)], 200),
            Some(Box::new(move || h.set(h.get() + 1))),
        );
        let h = hits.clone();
        actor.ease(
            ease(&[(Property::X, 0.)], 200),
            Some(Box::new(move || h.set(h.get() + 10))),
        );

        scene.settle();
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn direct_assignment_supersedes_transition() {
        let scene = Scene::new();
        let actor = scene.actor("clone");
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        actor.ease(
            ease(&[(Property::X, 100.)], 200),
            Some(Box::new(move || h.set(h.get() + 1))),
        );
        actor.ease(ease(&[(Property::Y, 50.)], 200), None);

        scene.advance(Duration::from_millis(50));
        actor.set_number(Property::X, 10.);
        scene.advance(FRAME);
        assert_eq!(actor.number(Property::X), 10.);
        assert_eq!(actor.transition_names(), vec!["y"]);

        scene.settle();
        assert_eq!(actor.number(Property::X), 10.);
        assert_eq!(actor.number(Property::Y), 50.);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn named_transition_removal() {
        let scene = Scene::new();
        let actor = scene.actor("dash");
        actor.ease_property(Property::SlideX, 1., Duration::from_millis(250));
        actor.ease(ease(&[(Property::Opacity, 0.)], 250), None);

        actor.remove_transition(crate::host::SLIDE_X_TRANSITION);
        assert_eq!(actor.transition_names(), vec!["opacity"]);
    }

    #[test]
    fn destroy_runs_callbacks_once() {
        let scene = Scene::new();
        let actor = scene.actor("clone");
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        actor.connect_destroy(Box::new(move || h.set(h.get() + 1)));

        actor.destroy();
        actor.destroy();
        assert_eq!(hits.get(), 1);
        assert!(actor.is_destroyed());
    }

    #[test]
    fn timers_fire_in_order() {
        let scene = Scene::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (ms, tag) in [(30, "b"), (10, "a"), (30, "c")] {
            let log = log.clone();
            scene.timeout(
                Duration::from_millis(ms),
                Box::new(move || log.borrow_mut().push(tag)),
            );
        }
        scene.advance(Duration::from_millis(40));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }
}
