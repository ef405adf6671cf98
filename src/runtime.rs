//! The enable/disable handle that owns one swipe session.

use std::rc::Rc;

use log::info;

use crate::config::Settings;
use crate::error::Result;
use crate::event::{GestureEvent, Propagation};
use crate::handler::{GestureHandler, SwipeSession, SwipeState};
use crate::host::{Host, SignalId};
use crate::layout::LayoutInterceptor;
use crate::slider::Slider;

pub struct SmoothSwipe {
    host: Host,
    handler: Rc<GestureHandler>,
    layout: LayoutInterceptor,
    hidden_signal: SignalId,
}

impl SmoothSwipe {
    /// Fails if `settings` is out of range.
    pub fn enable(host: Host, settings: &Settings) -> Result<Self> {
        let settings = &Settings::with_sensitivity(settings.sensitivity.into())?;
        let session = SwipeSession::new();
        let handler = Rc::new(GestureHandler::new(
            session.clone(),
            host.overview.clone(),
            settings,
        ));

        let weak = Rc::downgrade(&handler);
        let hidden_signal = host.overview.connect_hidden(Rc::new(move || {
            if let Some(handler) = weak.upgrade() {
                handler.on_overview_hidden();
            }
        }));
        let layout = LayoutInterceptor::install(session, host.timers.clone(), &host.layout);

        info!(
            "smooth swipe enabled (sensitivity {})",
            settings.sensitivity
        );
        Ok(Self {
            host,
            handler,
            layout,
            hidden_signal,
        })
    }

    pub fn handle_event(&self, event: &GestureEvent) -> Propagation {
        self.handler.handle_event(event)
    }

    pub fn apply_settings(&self, settings: &Settings) {
        self.handler.apply_settings(settings);
    }

    pub fn state(&self) -> SwipeState {
        self.handler.state()
    }

    /// Current root progress, if a reveal tree exists.
    pub fn progress(&self) -> Option<f64> {
        self.handler.session().root().map(|root| root.progress())
    }

    pub fn disable(self) {
        self.host.overview.disconnect(self.hidden_signal);
        self.layout.uninstall();
        info!("smooth swipe disabled");
    }
}
