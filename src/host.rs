//! Interfaces the core consumes from the host compositor.
//!
//! Everything here is single-threaded: handles are `Rc`s and implementors use
//! interior mutability. Implementors must tolerate re-entrant calls, since a
//! completion or notification may run code that touches the same actor again.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::intercept::Hook;

/// Callback run once when a deferred operation finishes.
pub type Completion = Box<dyn FnOnce()>;

pub type ActorRef = Rc<dyn Actor>;
pub type WorkspaceRef = Rc<dyn Workspace>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(pub u64);

/// The closed set of actor properties the sliders know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    X,
    Y,
    Width,
    Height,
    TranslationX,
    TranslationY,
    ScaleX,
    ScaleY,
    Opacity,
    Brightness,
    VignetteSharpness,
    /// Horizontal slide offset of the overview side controls.
    SlideX,
    Visible,
    /// Set by the host once a window clone has been placed in its slot.
    Positioned,
}

impl Property {
    /// Name of the transition animating this property.
    pub fn transition_name(self) -> &'static str {
        match self {
            Property::X => "x",
            Property::Y => "y",
            Property::Width => "width",
            Property::Height => "height",
            Property::TranslationX => "translation-x",
            Property::TranslationY => "translation-y",
            Property::ScaleX => "scale-x",
            Property::ScaleY => "scale-y",
            Property::Opacity => "opacity",
            Property::Brightness => "brightness",
            Property::VignetteSharpness => "vignette-sharpness",
            Property::SlideX => "@layout.slide-x",
            Property::Visible => "visible",
            Property::Positioned => "positioned",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.transition_name())
    }
}

/// Layout transitions of the side controls that fight with gesture-driven
/// opacity changes.
pub const SLIDE_X_TRANSITION: &str = "@layout.slide-x";
pub const TRANSLATION_X_TRANSITION: &str = "@layout.translation-x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EaseMode {
    Linear,
    #[default]
    EaseOutQuad,
}

impl EaseMode {
    /// Maps linear time `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0., 1.);
        match self {
            EaseMode::Linear => t,
            EaseMode::EaseOutQuad => t * (2. - t),
        }
    }
}

/// A request to animate a set of numeric properties to target values.
#[derive(Debug, Clone, PartialEq)]
pub struct Ease {
    pub targets: Vec<(Property, f64)>,
    pub duration: Duration,
    pub mode: EaseMode,
}

pub trait Actor {
    fn id(&self) -> ActorId;

    fn name(&self) -> &str;

    fn number(&self, prop: Property) -> f64;

    fn set_number(&self, prop: Property, value: f64);

    fn flag(&self, prop: Property) -> bool;

    fn set_flag(&self, prop: Property, value: bool);

    /// Starts an implicit transition; `on_complete` runs once it finishes.
    fn ease(&self, ease: Ease, on_complete: Option<Completion>);

    fn remove_transition(&self, name: &str);

    fn remove_all_transitions(&self);

    /// Registers a callback for when the actor is destroyed.
    fn connect_destroy(&self, callback: Completion);
}

/// Main-loop timers.
pub trait Timers {
    fn timeout(&self, after: Duration, callback: Completion);
}

/// Actors making up the overview chrome.
#[derive(Clone)]
pub struct OverviewControls {
    pub dash: ActorRef,
    pub thumbnails: ActorRef,
    pub cover_pane: ActorRef,
    pub search_entry: ActorRef,
}

pub trait Overview {
    fn is_visible(&self) -> bool;

    fn show(&self);

    /// Starts hiding; the "hidden" notification fires once it is done.
    fn hide(&self);

    fn controls(&self) -> OverviewControls;

    fn backgrounds(&self) -> Vec<ActorRef>;

    fn connect_hidden(&self, callback: Rc<dyn Fn()>) -> SignalId;

    fn disconnect(&self, id: SignalId);
}

/// Layout flags passed through the window positioning entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutFlags {
    pub animate: bool,
    pub initial: bool,
}

/// A window's target place in the overview grid.
#[derive(Clone)]
pub struct Slot {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub clone: ActorRef,
}

pub trait Workspace {
    fn window_clones(&self) -> Vec<ActorRef>;

    /// Whether a window layout has been computed yet.
    fn has_layout(&self) -> bool;

    fn recalculate_window_positions(&self, flags: LayoutFlags);

    /// Slots for the current layout inside the padded work area.
    fn compute_window_slots(&self) -> Vec<Slot>;

    fn overlay_group(&self) -> ActorRef;

    fn show_window_overlay(&self, clone: &ActorRef);
}

/// Replaceable layout entry points exposed by the host.
#[derive(Clone)]
pub struct LayoutHooks {
    pub workspace_init: Rc<Hook<WorkspaceRef>>,
    pub update_window_positions: Rc<Hook<(WorkspaceRef, LayoutFlags)>>,
    pub workspaces_view_shown: Rc<Hook<()>>,
}

/// Everything the core needs from its environment.
#[derive(Clone)]
pub struct Host {
    pub overview: Rc<dyn Overview>,
    pub timers: Rc<dyn Timers>,
    pub layout: LayoutHooks,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn ease_out_quad_endpoints() {
        let mode = EaseMode::EaseOutQuad;
        assert_eq!(mode.apply(0.), 0.);
        assert_eq!(mode.apply(1.), 1.);
        assert_abs_diff_eq!(mode.apply(0.5), 0.75);
        assert_eq!(mode.apply(2.), 1.);
    }
}
