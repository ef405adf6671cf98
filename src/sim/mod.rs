//! In-process stand-in for the compositor, used by the tests and by the
//! `replay` and `watch` commands.

mod overview;
mod scene;
pub mod trace;

pub use overview::{HOST_ANIMATION_TIME, Rect, SceneSnapshot, SimLayout, SimOverview, SimWorkspace};
pub use scene::{ActorSnapshot, FRAME, Scene, SceneActor};
