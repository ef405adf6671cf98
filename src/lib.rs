//! Three-finger touchpad swipes that reveal and dismiss a desktop overview
//! in lockstep with the fingers.
//!
//! The core is a set of composable progress [`slider`]s driven by the
//! [`handler::GestureHandler`] state machine. The compositor is reached only
//! through the traits in [`host`]; [`sim`] provides an in-memory
//! implementation.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod gestures;
pub mod handler;
pub mod host;
pub mod input;
pub mod intercept;
pub mod layout;
pub mod logging;
pub mod runtime;
pub mod sim;
pub mod slider;
pub mod speed;
pub mod tracker;
pub mod watch;

pub use error::{Error, Result};
pub use runtime::SmoothSwipe;
