//! A minimal overview host: chrome actors, backgrounds and one workspace.
//!
//! Default behavior mirrors a stock shell: showing slides the controls in,
//! dims the backgrounds and zooms window clones into a grid; hiding reverses
//! that and destroys the clones once the animation is over.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::scene::{ActorSnapshot, Scene, SceneActor};
use crate::handler::{VIGNETTE_BRIGHTNESS, VIGNETTE_SHARPNESS};
use crate::host::{
    Actor, ActorId, ActorRef, Completion, Ease, EaseMode, Host, LayoutFlags, LayoutHooks,
    Overview, OverviewControls, Property, SignalId, Slot, Timers, Workspace, WorkspaceRef,
};
use crate::intercept::Hook;

/// Duration of the host's own show/hide animations.
pub const HOST_ANIMATION_TIME: Duration = Duration::from_millis(250);

const WORKSPACE_PADDING: f64 = 20.;

/// Fraction of a grid cell a window may occupy.
const CELL_FILL: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn padded(self, padding: f64) -> Self {
        Self::new(
            self.x + padding,
            self.y + padding,
            (self.width - 2. * padding).max(1.),
            (self.height - 2. * padding).max(1.),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimLayout {
    pub screen: Rect,
    pub windows: Vec<Rect>,
    pub backgrounds: usize,
}

impl Default for SimLayout {
    fn default() -> Self {
        Self {
            screen: Rect::new(0., 0., 1920., 1080.),
            windows: vec![
                Rect::new(100., 80., 900., 700.),
                Rect::new(700., 200., 1000., 760.),
                Rect::new(300., 400., 640., 480.),
            ],
            backgrounds: 1,
        }
    }
}

pub struct SimWorkspace {
    scene: Rc<Scene>,
    me: Weak<SimWorkspace>,
    area: Rect,
    windows: RefCell<Vec<Rect>>,
    clones: RefCell<Vec<Rc<SceneActor>>>,
    overlay_group: RefCell<Rc<SceneActor>>,
    has_layout: Cell<bool>,
    shown_overlays: RefCell<BTreeSet<ActorId>>,
    hooks: LayoutHooks,
}

impl SimWorkspace {
    pub fn new(scene: Rc<Scene>, area: Rect, windows: Vec<Rect>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let update = me.clone();
            let shown = me.clone();
            let hooks = LayoutHooks {
                workspace_init: Rc::new(Hook::new(|_: WorkspaceRef| {})),
                update_window_positions: Rc::new(Hook::new(
                    move |(_, flags): (WorkspaceRef, LayoutFlags)| {
                        if let Some(ws) = update.upgrade() {
                            ws.place_windows(flags);
                        }
                    },
                )),
                workspaces_view_shown: Rc::new(Hook::new(move |()| {
                    if let Some(ws) = shown.upgrade() {
                        ws.relayout(LayoutFlags {
                            animate: true,
                            initial: false,
                        });
                    }
                })),
            };

            let overlay_group = scene.actor("window-overlays");
            Self {
                scene,
                me: me.clone(),
                area,
                windows: RefCell::new(windows),
                clones: RefCell::new(Vec::new()),
                overlay_group: RefCell::new(overlay_group),
                has_layout: Cell::new(false),
                shown_overlays: RefCell::new(BTreeSet::new()),
                hooks,
            }
        })
    }

    pub fn hooks(&self) -> &LayoutHooks {
        &self.hooks
    }

    pub fn clones(&self) -> Vec<Rc<SceneActor>> {
        self.clones.borrow().clone()
    }

    pub fn overlay_actor(&self) -> Rc<SceneActor> {
        self.overlay_group.borrow().clone()
    }

    pub fn overlay_shown(&self, clone: ActorId) -> bool {
        self.shown_overlays.borrow().contains(&clone)
    }

    fn handle(&self) -> Option<WorkspaceRef> {
        let me = self.me.upgrade()?;
        Some(me)
    }

    fn new_clone(&self, idx: usize, rect: Rect, positioned: bool) -> Rc<SceneActor> {
        let clone = self.scene.actor(&format!("window-{idx}"));
        clone.set_number(Property::X, rect.x);
        clone.set_number(Property::Y, rect.y);
        clone.set_number(Property::Width, rect.width);
        clone.set_number(Property::Height, rect.height);
        clone.set_flag(Property::Positioned, positioned);
        clone
    }

    /// Creates fresh clones for every window and runs the init hook.
    pub fn rebuild(&self) {
        let clones: Vec<_> = self
            .windows
            .borrow()
            .iter()
            .enumerate()
            .map(|(idx, &rect)| self.new_clone(idx, rect, true))
            .collect();
        *self.clones.borrow_mut() = clones;
        *self.overlay_group.borrow_mut() = self.scene.actor("window-overlays");
        self.has_layout.set(false);
        self.shown_overlays.borrow_mut().clear();

        if let Some(ws) = self.handle() {
            self.hooks.workspace_init.call(ws);
        }
    }

    /// Destroys all clones and the overlay group.
    pub fn teardown(&self) {
        let clones = std::mem::take(&mut *self.clones.borrow_mut());
        for clone in clones {
            clone.destroy();
        }
        let group = self.overlay_actor();
        group.destroy();
        self.has_layout.set(false);
    }

    /// A layout pass, as triggered by an allocation.
    pub fn relayout(&self, flags: LayoutFlags) {
        if let Some(ws) = self.handle() {
            self.hooks.update_window_positions.call((ws, flags));
        }
    }

    /// Maps a new window while the overview is up.
    pub fn add_window(&self, rect: Rect) {
        let idx = {
            let mut windows = self.windows.borrow_mut();
            windows.push(rect);
            windows.len() - 1
        };
        if self.clones.borrow().is_empty() {
            return;
        }
        let clone = self.new_clone(idx, rect, false);
        self.clones.borrow_mut().push(clone);
        self.has_layout.set(false);
        self.relayout(LayoutFlags {
            animate: true,
            initial: false,
        });
    }

    /// Unmaps a window; its clone is destroyed.
    pub fn remove_window(&self, idx: usize) {
        {
            let mut windows = self.windows.borrow_mut();
            if idx >= windows.len() {
                return;
            }
            windows.remove(idx);
        }
        let clone = {
            let mut clones = self.clones.borrow_mut();
            (idx < clones.len()).then(|| clones.remove(idx))
        };
        if let Some(clone) = clone {
            clone.destroy();
            self.has_layout.set(false);
            self.relayout(LayoutFlags::default());
        }
    }

    /// Eases every clone back over its window.
    fn zoom_out(&self) {
        let windows = self.windows.borrow().clone();
        for (clone, rect) in self.clones().iter().zip(windows) {
            clone.ease(
                Ease {
                    targets: vec![
                        (Property::X, rect.x),
                        (Property::Y, rect.y),
                        (Property::TranslationX, 0.),
                        (Property::TranslationY, 0.),
                        (Property::ScaleX, 1.),
                        (Property::ScaleY, 1.),
                    ],
                    duration: HOST_ANIMATION_TIME,
                    mode: EaseMode::EaseOutQuad,
                },
                None,
            );
        }
        self.overlay_actor().set_flag(Property::Visible, false);
    }

    /// The stock positioning algorithm.
    fn place_windows(&self, flags: LayoutFlags) {
        if !self.has_layout.get() {
            self.recalculate_window_positions(flags);
            return;
        }

        for slot in self.compute_window_slots() {
            let targets = vec![
                (Property::X, 0.),
                (Property::Y, 0.),
                (Property::TranslationX, slot.x),
                (Property::TranslationY, slot.y),
                (Property::ScaleX, slot.scale),
                (Property::ScaleY, slot.scale),
            ];
            if flags.animate && slot.clone.flag(Property::Positioned) {
                slot.clone.ease(
                    Ease {
                        targets,
                        duration: HOST_ANIMATION_TIME,
                        mode: EaseMode::EaseOutQuad,
                    },
                    None,
                );
            } else {
                for (prop, value) in targets {
                    slot.clone.set_number(prop, value);
                }
            }
            slot.clone.set_flag(Property::Positioned, true);
            self.show_window_overlay(&slot.clone);
        }
        self.overlay_actor().set_flag(Property::Visible, true);
    }
}

impl Workspace for SimWorkspace {
    fn window_clones(&self) -> Vec<ActorRef> {
        self.clones()
            .into_iter()
            .map(|c| c as ActorRef)
            .collect()
    }

    fn has_layout(&self) -> bool {
        self.has_layout.get()
    }

    fn recalculate_window_positions(&self, flags: LayoutFlags) {
        self.has_layout.set(true);
        self.relayout(flags);
    }

    fn compute_window_slots(&self) -> Vec<Slot> {
        let clones = self.clones();
        if clones.is_empty() {
            return Vec::new();
        }

        let area = self.area.padded(WORKSPACE_PADDING);
        let n = clones.len();
        let cols = (n as f64).sqrt().ceil() as usize;
        let rows = n.div_ceil(cols);
        let cell_w = area.width / cols as f64;
        let cell_h = area.height / rows as f64;

        clones
            .into_iter()
            .enumerate()
            .map(|(idx, clone)| {
                let (col, row) = (idx % cols, idx / cols);
                let w = clone.number(Property::Width).max(1.);
                let h = clone.number(Property::Height).max(1.);
                let scale = (cell_w * CELL_FILL / w)
                    .min(cell_h * CELL_FILL / h)
                    .min(1.);
                Slot {
                    x: area.x + col as f64 * cell_w + (cell_w - w * scale) / 2.,
                    y: area.y + row as f64 * cell_h + (cell_h - h * scale) / 2.,
                    scale,
                    clone,
                }
            })
            .collect()
    }

    fn overlay_group(&self) -> ActorRef {
        self.overlay_actor()
    }

    fn show_window_overlay(&self, clone: &ActorRef) {
        self.shown_overlays.borrow_mut().insert(clone.id());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneSnapshot {
    pub visible: bool,
    pub actors: Vec<ActorSnapshot>,
}

pub struct SimOverview {
    scene: Rc<Scene>,
    me: Weak<SimOverview>,
    visible: Cell<bool>,
    hiding: Cell<bool>,
    dash: Rc<SceneActor>,
    thumbnails: Rc<SceneActor>,
    cover_pane: Rc<SceneActor>,
    search_entry: Rc<SceneActor>,
    backgrounds: Vec<Rc<SceneActor>>,
    workspace: Rc<SimWorkspace>,
    next_signal: Cell<u64>,
    hidden: RefCell<Vec<(SignalId, Rc<dyn Fn()>)>>,
}

impl SimOverview {
    pub fn new(scene: Rc<Scene>, layout: &SimLayout) -> Rc<Self> {
        let workspace = SimWorkspace::new(scene.clone(), layout.screen, layout.windows.clone());
        let cover_pane = scene.actor("cover-pane");
        cover_pane.set_number(Property::Opacity, 0.);
        let backgrounds = (0..layout.backgrounds)
            .map(|idx| scene.actor(&format!("background-{idx}")))
            .collect();

        Rc::new_cyclic(|me| Self {
            dash: scene.actor("dash"),
            thumbnails: scene.actor("thumbnails"),
            search_entry: scene.actor("search-entry"),
            cover_pane,
            backgrounds,
            workspace,
            me: me.clone(),
            visible: Cell::new(false),
            hiding: Cell::new(false),
            next_signal: Cell::new(0),
            hidden: RefCell::new(Vec::new()),
            scene,
        })
    }

    pub fn scene(&self) -> &Rc<Scene> {
        &self.scene
    }

    pub fn workspace(&self) -> &Rc<SimWorkspace> {
        &self.workspace
    }

    pub fn dash(&self) -> &Rc<SceneActor> {
        &self.dash
    }

    pub fn cover_pane(&self) -> &Rc<SceneActor> {
        &self.cover_pane
    }

    pub fn background_actors(&self) -> &[Rc<SceneActor>] {
        &self.backgrounds
    }

    pub fn is_hiding(&self) -> bool {
        self.hiding.get()
    }

    /// The host interface backed by this overview.
    pub fn host(self: &Rc<Self>) -> Host {
        Host {
            overview: self.clone(),
            timers: self.scene.clone(),
            layout: self.workspace.hooks().clone(),
        }
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let mut actors: Vec<ActorSnapshot> = [
            &self.dash,
            &self.thumbnails,
            &self.cover_pane,
            &self.search_entry,
        ]
        .into_iter()
        .chain(&self.backgrounds)
        .map(|a| a.snapshot())
        .collect();
        actors.extend(self.workspace.clones().iter().map(|c| c.snapshot()));
        actors.push(self.workspace.overlay_actor().snapshot());

        SceneSnapshot {
            visible: self.visible.get(),
            actors,
        }
    }

    fn ease_to(actor: &SceneActor, targets: Vec<(Property, f64)>) {
        actor.ease(
            Ease {
                targets,
                duration: HOST_ANIMATION_TIME,
                mode: EaseMode::EaseOutQuad,
            },
            None,
        );
    }

    fn finish_hide(&self) {
        self.visible.set(false);
        self.hiding.set(false);
        self.workspace.teardown();

        let handlers: Vec<_> = self.hidden.borrow().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler();
        }
    }
}

impl Overview for SimOverview {
    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn show(&self) {
        if self.visible.get() {
            return;
        }
        self.visible.set(true);

        for side in [&self.dash, &self.thumbnails] {
            side.set_number(Property::SlideX, 0.);
            side.ease_property(Property::SlideX, 1., HOST_ANIMATION_TIME);
        }
        Self::ease_to(&self.cover_pane, vec![(Property::Opacity, 255.)]);
        for background in &self.backgrounds {
            Self::ease_to(
                background,
                vec![
                    (Property::Brightness, VIGNETTE_BRIGHTNESS),
                    (Property::VignetteSharpness, VIGNETTE_SHARPNESS),
                ],
            );
        }

        self.workspace.rebuild();
        self.workspace.relayout(LayoutFlags {
            animate: true,
            initial: true,
        });
        self.workspace.hooks().workspaces_view_shown.call(());
    }

    fn hide(&self) {
        if !self.visible.get() || self.hiding.get() {
            return;
        }
        self.hiding.set(true);

        self.workspace.zoom_out();
        Self::ease_to(&self.cover_pane, vec![(Property::Opacity, 0.)]);
        for side in [&self.dash, &self.thumbnails] {
            side.ease_property(Property::SlideX, 0., HOST_ANIMATION_TIME);
        }
        for background in &self.backgrounds {
            Self::ease_to(
                background,
                vec![
                    (Property::Brightness, 1.),
                    (Property::VignetteSharpness, 0.),
                ],
            );
        }

        let me = self.me.clone();
        let done: Completion = Box::new(move || {
            if let Some(overview) = me.upgrade() {
                overview.finish_hide();
            }
        });
        self.scene.timeout(HOST_ANIMATION_TIME, done);
    }

    fn controls(&self) -> OverviewControls {
        OverviewControls {
            dash: self.dash.clone(),
            thumbnails: self.thumbnails.clone(),
            cover_pane: self.cover_pane.clone(),
            search_entry: self.search_entry.clone(),
        }
    }

    fn backgrounds(&self) -> Vec<ActorRef> {
        self.backgrounds
            .iter()
            .map(|b| b.clone() as ActorRef)
            .collect()
    }

    fn connect_hidden(&self, callback: Rc<dyn Fn()>) -> SignalId {
        let id = SignalId(self.next_signal.get());
        self.next_signal.set(id.0 + 1);
        self.hidden.borrow_mut().push((id, callback));
        id
    }

    fn disconnect(&self, id: SignalId) {
        self.hidden.borrow_mut().retain(|(other, _)| *other != id);
    }
}
