//! Drives window clone placement from the swipe's progress.
//!
//! While a swipe session is active, the host's window positioning is replaced:
//! instead of easing every clone into its slot, each clone gets a
//! [`PropertiesSlider`] from where it sat on the desktop to its slot, and the
//! sliders join the session's root. Outside a session the host's own
//! behavior runs unchanged.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::handler::{SwipeSession, SwipeState};
use crate::host::{
    Actor, ActorId, ActorRef, LayoutFlags, LayoutHooks, Property, Slot, Timers, WorkspaceRef,
};
use crate::intercept::OverrideRegistry;
use crate::slider::{
    DEFAULT_THRESHOLD, PropertiesSlider, Slider, SliderRef, TeeSlider, ThresholdSlider, Values,
};

struct LayoutState {
    session: Rc<SwipeSession>,
    timers: Rc<dyn Timers>,
    /// Desktop geometry of each clone, captured when the workspace was built.
    start_geometry: RefCell<HashMap<ActorId, Values>>,
    window_sliders: RefCell<HashMap<ActorId, Rc<PropertiesSlider>>>,
    overlay_sliders: RefCell<HashMap<ActorId, Rc<ThresholdSlider>>>,
}

pub struct LayoutInterceptor {
    registry: RefCell<OverrideRegistry>,
    state: Rc<LayoutState>,
}

impl LayoutInterceptor {
    pub fn install(
        session: Rc<SwipeSession>,
        timers: Rc<dyn Timers>,
        hooks: &LayoutHooks,
    ) -> Self {
        let state = Rc::new(LayoutState {
            session,
            timers,
            start_geometry: RefCell::new(HashMap::new()),
            window_sliders: RefCell::new(HashMap::new()),
            overlay_sliders: RefCell::new(HashMap::new()),
        });
        let mut registry = OverrideRegistry::new();

        let init_state = state.clone();
        registry.wrap(
            "workspace_init",
            &hooks.workspace_init,
            move |orig, ws: WorkspaceRef| {
                orig(ws.clone());
                init_state.capture_start_geometry(&ws);
            },
        );

        registry.wrap("workspaces_view_shown", &hooks.workspaces_view_shown, |_, ()| {});

        let update_state = state.clone();
        registry.wrap(
            "update_window_positions",
            &hooks.update_window_positions,
            move |orig, (ws, flags): (WorkspaceRef, LayoutFlags)| {
                let root = match update_state.session.state() {
                    SwipeState::Ready => None,
                    _ => update_state.session.root(),
                };
                match root {
                    Some(root) => update_state.update_window_positions(&ws, flags, &root),
                    None => orig((ws, flags)),
                }
            },
        );

        debug!("layout interceptor installed ({} hooks)", registry.len());
        Self {
            registry: RefCell::new(registry),
            state,
        }
    }

    /// Restores the host's hooks and forgets all per-window state.
    pub fn uninstall(&self) {
        self.registry.borrow_mut().unwrap_all();
        self.state.start_geometry.borrow_mut().clear();
        self.state.window_sliders.borrow_mut().clear();
        self.state.overlay_sliders.borrow_mut().clear();
        debug!("layout interceptor uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        !self.registry.borrow().is_empty()
    }

    /// Number of clones that currently have a slider.
    pub fn tracked_windows(&self) -> usize {
        self.state.window_sliders.borrow().len()
    }
}

impl Drop for LayoutInterceptor {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn geometry(x: f64, y: f64, translation_x: f64, translation_y: f64, scale: f64) -> Values {
    Values::from([
        (Property::X, x),
        (Property::Y, y),
        (Property::TranslationX, translation_x),
        (Property::TranslationY, translation_y),
        (Property::ScaleX, scale),
        (Property::ScaleY, scale),
    ])
}

fn slot_center(slot: &Slot) -> (f64, f64) {
    let width = slot.clone.number(Property::Width) * slot.scale;
    let height = slot.clone.number(Property::Height) * slot.scale;
    (slot.x + width / 2., slot.y + height / 2.)
}

impl LayoutState {
    fn capture_start_geometry(self: &Rc<Self>, ws: &WorkspaceRef) {
        for clone in ws.window_clones() {
            let id = clone.id();
            let captured = geometry(
                clone.number(Property::X),
                clone.number(Property::Y),
                clone.number(Property::TranslationX),
                clone.number(Property::TranslationY),
                1.,
            );
            self.start_geometry.borrow_mut().insert(id, captured);

            let state = Rc::downgrade(self);
            clone.connect_destroy(Box::new(move || {
                if let Some(state) = state.upgrade() {
                    state.start_geometry.borrow_mut().remove(&id);
                }
            }));
        }
        trace!("captured start geometry for {} clones", ws.window_clones().len());
    }

    fn update_window_positions(
        self: &Rc<Self>,
        ws: &WorkspaceRef,
        flags: LayoutFlags,
        root: &Rc<TeeSlider>,
    ) {
        if !ws.has_layout() {
            ws.recalculate_window_positions(flags);
            return;
        }

        for slot in ws.compute_window_slots() {
            let clone = &slot.clone;
            let (center_x, center_y) = slot_center(&slot);

            if !clone.flag(Property::Positioned) {
                for (prop, value) in geometry(0., 0., center_x, center_y, 0.) {
                    clone.set_number(prop, value);
                }
                clone.set_flag(Property::Positioned, true);
            }

            let slider = self.window_slider(clone, root);
            let start = self
                .start_geometry
                .borrow()
                .get(&clone.id())
                .cloned()
                .unwrap_or_else(|| geometry(0., 0., center_x, center_y, 0.));
            let end = geometry(0., 0., slot.x, slot.y, slot.scale);
            slider.set_endpoints(start, end);
            slider.set_progress(root.progress());

            ws.show_window_overlay(clone);
        }

        let group = ws.overlay_group();
        group.set_flag(Property::Visible, false);
        self.overlay_slider(&group, root).set_progress(root.progress());
    }

    /// The clone's slider, created and added to `root` on first sight.
    fn window_slider(self: &Rc<Self>, clone: &ActorRef, root: &Rc<TeeSlider>) -> Rc<PropertiesSlider> {
        let id = clone.id();
        if let Some(slider) = self.window_sliders.borrow().get(&id) {
            return slider.clone();
        }

        let slider = Rc::new(PropertiesSlider::new(
            clone.clone(),
            Values::new(),
            Values::new(),
        ));
        self.window_sliders.borrow_mut().insert(id, slider.clone());
        let child: SliderRef = slider.clone();
        root.add_slider(child.clone());

        let state = Rc::downgrade(self);
        let root = Rc::downgrade(root);
        clone.connect_destroy(Box::new(move || {
            detach(&root, &child);
            if let Some(state) = state.upgrade() {
                state.window_sliders.borrow_mut().remove(&id);
            }
            trace!("window clone {id:?} destroyed, slider detached");
        }));
        slider
    }

    /// The overlay group's slider, created and added to `root` on first sight.
    fn overlay_slider(
        self: &Rc<Self>,
        group: &ActorRef,
        root: &Rc<TeeSlider>,
    ) -> Rc<ThresholdSlider> {
        let id = group.id();
        if let Some(slider) = self.overlay_sliders.borrow().get(&id) {
            return slider.clone();
        }

        let slider = Rc::new(ThresholdSlider::new(
            group.clone(),
            Property::Visible,
            false,
            true,
            DEFAULT_THRESHOLD,
            self.timers.clone(),
        ));
        self.overlay_sliders.borrow_mut().insert(id, slider.clone());
        let child: SliderRef = slider.clone();
        root.add_slider(child.clone());

        let state = Rc::downgrade(self);
        let root = Rc::downgrade(root);
        group.connect_destroy(Box::new(move || {
            detach(&root, &child);
            if let Some(state) = state.upgrade() {
                state.overlay_sliders.borrow_mut().remove(&id);
            }
        }));
        slider
    }
}

fn detach(root: &Weak<TeeSlider>, child: &SliderRef) {
    if let Some(root) = root.upgrade() {
        root.remove_slider(child);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::config::Settings;
    use crate::event::{GestureEvent, Phase};
    use crate::handler::GestureHandler;
    use crate::host::{Overview, Workspace};
    use crate::sim::{Rect, Scene, SimLayout, SimOverview};

    struct Fixture {
        overview: Rc<SimOverview>,
        handler: Rc<GestureHandler>,
        layout: LayoutInterceptor,
        now: Cell<i64>,
    }

    impl Fixture {
        fn new() -> Self {
            let overview = SimOverview::new(Scene::new(), &SimLayout::default());
            let host = overview.host();
            let session = SwipeSession::new();
            let handler = Rc::new(GestureHandler::new(
                session.clone(),
                host.overview.clone(),
                &Settings { sensitivity: 100 },
            ));
            let weak = Rc::downgrade(&handler);
            overview.connect_hidden(Rc::new(move || {
                if let Some(handler) = weak.upgrade() {
                    handler.on_overview_hidden();
                }
            }));
            let layout = LayoutInterceptor::install(session, host.timers.clone(), &host.layout);
            Self {
                overview,
                handler,
                layout,
                now: Cell::new(0),
            }
        }

        fn send(&self, phase: Phase) {
            self.handler
                .handle_event(&GestureEvent::swipe(3, phase, self.now.get()));
        }

        fn drag(&self, dy: f64) {
            self.now.set(self.now.get() + 40_000);
            self.handler
                .handle_event(&GestureEvent::swipe_update(3, 0., dy, self.now.get()));
        }

        fn root(&self) -> Rc<TeeSlider> {
            self.handler.session().root().unwrap()
        }
    }

    #[test]
    fn clones_follow_progress_from_desktop_to_slot() {
        let f = Fixture::new();
        f.send(Phase::Begin);

        let ws = f.overview.workspace();
        let windows = SimLayout::default().windows;
        let slots = ws.compute_window_slots();
        assert_eq!(f.layout.tracked_windows(), 3);

        // Progress 0 keeps every clone over its window.
        for (slot, rect) in slots.iter().zip(&windows) {
            assert_eq!(slot.clone.number(Property::X), rect.x);
            assert_eq!(slot.clone.number(Property::TranslationX), 0.);
            assert_eq!(slot.clone.number(Property::ScaleX), 1.);
        }

        f.drag(-100.);
        for (slot, rect) in slots.iter().zip(&windows) {
            assert_abs_diff_eq!(slot.clone.number(Property::X), rect.x / 2.);
            assert_abs_diff_eq!(slot.clone.number(Property::TranslationY), slot.y / 2.);
            assert_abs_diff_eq!(slot.clone.number(Property::ScaleY), (1. + slot.scale) / 2.);
            assert!(ws.overlay_shown(slot.clone.id()));
        }
    }

    #[test]
    fn root_collects_windows_and_overlay_group() {
        let f = Fixture::new();
        f.send(Phase::Begin);
        // Controls, one background, three clones, one overlay group.
        assert_eq!(f.root().len(), 6);

        // Another layout pass attaches nothing new.
        f.overview.workspace().relayout(LayoutFlags::default());
        assert_eq!(f.root().len(), 6);
    }

    #[test]
    fn overlays_appear_only_at_full_reveal() {
        let f = Fixture::new();
        f.send(Phase::Begin);
        let group = f.overview.workspace().overlay_actor();

        f.drag(-150.);
        assert!(!group.flag(Property::Visible));

        f.drag(-100.);
        f.send(Phase::End);
        f.overview.scene().settle();
        assert!(f.overview.is_visible());
        assert!(group.flag(Property::Visible));

        let slots = f.overview.workspace().compute_window_slots();
        for slot in &slots {
            assert_abs_diff_eq!(slot.clone.number(Property::TranslationX), slot.x);
            assert_abs_diff_eq!(slot.clone.number(Property::ScaleX), slot.scale);
        }
    }

    #[test]
    fn destroyed_clone_leaves_root() {
        let f = Fixture::new();
        f.send(Phase::Begin);
        f.drag(-100.);
        assert_eq!(f.root().len(), 6);

        f.overview.workspace().remove_window(0);
        assert_eq!(f.root().len(), 5);
        assert_eq!(f.layout.tracked_windows(), 2);

        // The remaining clones were re-slotted at the current progress.
        let progress = f.root().progress();
        for slot in f.overview.workspace().compute_window_slots() {
            let expected = slot.y * progress;
            assert_abs_diff_eq!(slot.clone.number(Property::TranslationY), expected);
        }
    }

    #[test]
    fn relayout_keeps_overlays_in_line_with_progress() {
        let f = Fixture::new();
        f.send(Phase::Begin);
        f.drag(-250.);
        f.send(Phase::End);
        f.overview.scene().settle();

        f.send(Phase::Begin);
        assert_eq!(f.handler.state(), SwipeState::SwipingDown);
        let group = f.overview.workspace().overlay_actor();
        assert!(group.flag(Property::Visible));

        f.overview.workspace().remove_window(2);
        assert!(group.flag(Property::Visible));

        f.drag(50.);
        assert!(!group.flag(Property::Visible));
        f.overview.workspace().remove_window(1);
        assert!(!group.flag(Property::Visible));
    }

    #[test]
    fn new_window_grows_from_slot_center() {
        let f = Fixture::new();
        f.send(Phase::Begin);
        f.drag(-100.);

        f.overview
            .workspace()
            .add_window(Rect::new(50., 50., 400., 300.));
        assert_eq!(f.root().len(), 7);

        let slots = f.overview.workspace().compute_window_slots();
        let slot = slots.last().unwrap();
        assert!(slot.clone.flag(Property::Positioned));
        // Half way between scale 0 and the slot's scale.
        assert_abs_diff_eq!(slot.clone.number(Property::ScaleX), slot.scale / 2.);
        let (center_x, _) = slot_center(slot);
        assert_abs_diff_eq!(
            slot.clone.number(Property::TranslationX),
            (center_x + slot.x) / 2.,
            epsilon = 1e-9
        );
    }

    #[test]
    fn host_layout_runs_outside_a_swipe() {
        let f = Fixture::new();
        f.overview.show();
        f.overview.scene().settle();

        assert_eq!(f.layout.tracked_windows(), 0);
        for slot in f.overview.workspace().compute_window_slots() {
            assert_eq!(slot.clone.number(Property::TranslationX), slot.x);
        }
        assert!(f.overview.workspace().overlay_actor().flag(Property::Visible));
    }

    #[test]
    fn uninstall_restores_hooks() {
        let overview = SimOverview::new(Scene::new(), &SimLayout::default());
        let host = overview.host();
        let init = host.layout.workspace_init.current();
        let update = host.layout.update_window_positions.current();
        let shown = host.layout.workspaces_view_shown.current();

        let layout = LayoutInterceptor::install(SwipeSession::new(), host.timers.clone(), &host.layout);
        assert!(layout.is_installed());
        assert!(!Rc::ptr_eq(&update, &host.layout.update_window_positions.current()));

        layout.uninstall();
        assert!(!layout.is_installed());
        assert!(Rc::ptr_eq(&init, &host.layout.workspace_init.current()));
        assert!(Rc::ptr_eq(&update, &host.layout.update_window_positions.current()));
        assert!(Rc::ptr_eq(&shown, &host.layout.workspaces_view_shown.current()));
    }
}
