use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::{Slider, SliderRef, same_slider};
use crate::host::Completion;

/// Forwards progress to an ordered set of children.
pub struct TeeSlider {
    latest: Cell<f64>,
    children: RefCell<Vec<SliderRef>>,
}

impl TeeSlider {
    pub fn new(children: Vec<SliderRef>) -> Self {
        Self {
            latest: Cell::new(0.),
            children: RefCell::new(children),
        }
    }

    /// Returns `false` if the slider was already a child.
    pub fn add_slider(&self, slider: SliderRef) -> bool {
        let mut children = self.children.borrow_mut();
        if children.iter().any(|c| same_slider(c, &slider)) {
            return false;
        }
        children.push(slider);
        true
    }

    /// Returns `false` if the slider was not a child.
    pub fn remove_slider(&self, slider: &SliderRef) -> bool {
        let mut children = self.children.borrow_mut();
        let Some(idx) = children.iter().position(|c| same_slider(c, slider)) else {
            return false;
        };
        children.remove(idx);
        true
    }

    pub fn contains(&self, slider: &SliderRef) -> bool {
        self.children.borrow().iter().any(|c| same_slider(c, slider))
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    // Children may add or remove siblings from their callbacks, so never hold
    // the borrow while calling into them.
    fn snapshot(&self) -> Vec<SliderRef> {
        self.children.borrow().clone()
    }

    fn animate_to(&self, to_end: bool, duration: Duration, on_complete: Option<Completion>) {
        let children = self.snapshot();
        if children.is_empty() {
            if let Some(callback) = on_complete {
                callback();
            }
            return;
        }

        let join = Join::new(children.len(), on_complete);
        for child in children {
            let arrival = Arrival(join.clone());
            let callback: Completion = Box::new(move || drop(arrival));
            if to_end {
                child.animate_to_end(duration, Some(callback));
            } else {
                child.animate_to_start(duration, Some(callback));
            }
        }
    }
}

impl Slider for TeeSlider {
    fn latest(&self) -> &Cell<f64> {
        &self.latest
    }

    fn apply(&self, progress: f64) {
        for child in self.snapshot() {
            child.set_progress(progress);
        }
    }

    fn animate_to_start(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(0.);
        self.animate_to(false, duration, on_complete);
    }

    fn animate_to_end(&self, duration: Duration, on_complete: Option<Completion>) {
        self.latest.set(1.);
        self.animate_to(true, duration, on_complete);
    }
}

/// Fan-in barrier for one animate request.
struct Join {
    remaining: Cell<usize>,
    on_complete: RefCell<Option<Completion>>,
}

impl Join {
    fn new(count: usize, on_complete: Option<Completion>) -> Rc<Self> {
        Rc::new(Self {
            remaining: Cell::new(count),
            on_complete: RefCell::new(on_complete),
        })
    }
}

/// One child's share of a [`Join`].
///
/// Counts as arrived when its completion runs or when the completion is
/// dropped unrun, e.g. because the child's actor was destroyed mid-animation.
struct Arrival(Rc<Join>);

impl Drop for Arrival {
    fn drop(&mut self) {
        let join = &self.0;
        let remaining = join.remaining.get().saturating_sub(1);
        join.remaining.set(remaining);
        if remaining == 0 {
            let callback = join.on_complete.borrow_mut().take();
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Weak;

    use proptest::prelude::*;

    use super::*;
    use crate::host::Property;
    use crate::sim::Scene;
    use crate::slider::test_util::{RecordingSlider, Target};
    use crate::slider::{DelaySlider, PropertiesSlider, Values};

    fn counter() -> (Rc<Cell<u32>>, Completion) {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        (count, Box::new(move || inner.set(inner.get() + 1)))
    }

    #[test]
    fn forwards_progress_unchanged() {
        let a = RecordingSlider::new();
        let b = RecordingSlider::new();
        let tee = TeeSlider::new(vec![a.clone() as SliderRef, b.clone() as SliderRef]);

        tee.set_progress(0.3);
        tee.set_progress(1.2);
        assert_eq!(*a.applied.borrow(), vec![0.3, 1.2]);
        assert_eq!(*b.applied.borrow(), vec![0.3, 1.2]);
        assert_eq!(b.progress(), 1.2);
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let a: SliderRef = RecordingSlider::new();
        let tee = TeeSlider::new(vec![]);

        assert!(tee.add_slider(a.clone()));
        assert!(!tee.add_slider(a.clone()));
        assert_eq!(tee.len(), 1);

        assert!(tee.remove_slider(&a));
        assert!(!tee.remove_slider(&a));
        assert!(tee.is_empty());
    }

    #[test]
    fn join_waits_for_every_child() {
        let children: Vec<_> = (0..3).map(|_| RecordingSlider::new()).collect();
        let tee = TeeSlider::new(children.iter().map(|c| c.clone() as SliderRef).collect());

        let (count, callback) = counter();
        tee.animate_to_end(Duration::from_millis(200), Some(callback));
        for child in &children {
            assert_eq!(
                *child.animations.borrow(),
                vec![(Target::End, Duration::from_millis(200))]
            );
        }

        // Out of order.
        children[2].complete();
        children[0].complete();
        assert_eq!(count.get(), 0);
        children[1].complete();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn join_without_children_still_completes() {
        let tee = TeeSlider::new(vec![]);
        let (count, callback) = counter();
        tee.animate_to_start(Duration::from_millis(200), Some(callback));
        assert_eq!(count.get(), 1);
        assert_eq!(tee.progress(), 0.);
    }

    #[test]
    fn dropped_child_completion_counts_as_arrival() {
        let a = RecordingSlider::new();
        let b = RecordingSlider::new();
        let tee = TeeSlider::new(vec![a.clone() as SliderRef, b.clone() as SliderRef]);

        let (count, callback) = counter();
        tee.animate_to_end(Duration::from_millis(200), Some(callback));

        let b_ref: SliderRef = b.clone();
        tee.remove_slider(&b_ref);
        b.pending.borrow_mut().clear();
        assert_eq!(count.get(), 0);

        a.complete();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn child_may_remove_itself_during_progress() {
        let tee = Rc::new(TeeSlider::new(vec![]));

        struct SelfRemoving {
            latest: Cell<f64>,
            tee: Weak<TeeSlider>,
            me: RefCell<Option<Weak<SelfRemoving>>>,
        }

        impl Slider for SelfRemoving {
            fn latest(&self) -> &Cell<f64> {
                &self.latest
            }

            fn apply(&self, _progress: f64) {
                let me = self.me.borrow().as_ref().and_then(|me| me.upgrade());
                if let (Some(tee), Some(me)) = (self.tee.upgrade(), me) {
                    let me: SliderRef = me;
                    tee.remove_slider(&me);
                }
            }

            fn animate_to_start(&self, _: Duration, _: Option<Completion>) {}

            fn animate_to_end(&self, _: Duration, _: Option<Completion>) {}
        }

        let child = Rc::new(SelfRemoving {
            latest: Cell::new(0.),
            tee: Rc::downgrade(&tee),
            me: RefCell::new(None),
        });
        *child.me.borrow_mut() = Some(Rc::downgrade(&child));

        let other = RecordingSlider::new();
        tee.add_slider(child);
        tee.add_slider(other.clone());

        tee.set_progress(0.5);
        assert_eq!(tee.len(), 1);
        assert_eq!(*other.applied.borrow(), vec![0.5]);
    }

    proptest! {
        #[test]
        fn set_progress_is_idempotent(p in -1f64..2.) {
            let scene = Scene::new();
            let window = scene.actor("window");
            let dash = scene.actor("dash");
            let tee = TeeSlider::new(vec![
                Rc::new(PropertiesSlider::new(
                    window.clone(),
                    Values::from([(Property::TranslationX, 0.), (Property::ScaleX, 1.)]),
                    Values::from([(Property::TranslationX, 120.), (Property::ScaleX, 0.3)]),
                )) as SliderRef,
                Rc::new(DelaySlider::new(
                    Rc::new(PropertiesSlider::new(
                        dash.clone(),
                        Values::from([(Property::Opacity, 0.)]),
                        Values::from([(Property::Opacity, 255.)]),
                    )),
                    0.7,
                )) as SliderRef,
            ]);

            tee.set_progress(p);
            let once = (window.snapshot(), dash.snapshot());
            tee.set_progress(p);
            prop_assert_eq!(once, (window.snapshot(), dash.snapshot()));
        }
    }
}
