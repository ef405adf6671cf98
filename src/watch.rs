//! Live touchpad input driving the simulated host in real time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use evdev::{AbsoluteAxisCode, Device, EventType, InputEvent, SynchronizationCode};
use log::{debug, info, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::config::{SettingsState, SettingsWatcher};
use crate::event::Propagation;
use crate::gestures::SwipeDetector;
use crate::host::Overview;
use crate::input;
use crate::runtime::SmoothSwipe;
use crate::sim::{Scene, SimLayout, SimOverview};
use crate::tracker::Tracker;

const IDLE_SLEEP: Duration = Duration::from_millis(4);

struct Touchpad {
    path: String,
    device: Device,
    tracker: Tracker,
    detector: SwipeDetector,
}

impl Touchpad {
    fn open(path: &str) -> Result<Self> {
        let mut device = Device::open(path).with_context(|| format!("failed to open {path}"))?;
        device.set_nonblocking(true)?;

        let mut tracker = Tracker::new();
        match input::position_ranges(&device) {
            Some((x, y)) => tracker.set_ranges(x, y),
            None => warn!("{path}: no position ranges, assuming defaults"),
        }
        Ok(Self {
            path: path.to_string(),
            device,
            tracker,
            detector: SwipeDetector::new(),
        })
    }
}

fn time_us(ev: &InputEvent) -> i64 {
    ev.timestamp()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}

/// Stops on SIGINT or SIGTERM.
struct StopFlag {
    stop: Arc<AtomicBool>,
    handle: signal_hook::iterator::Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl StopFlag {
    fn install() -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!("received signal {signal}, stopping");
                flag.store(true, Ordering::SeqCst);
            }
        });
        Ok(Self {
            stop,
            handle,
            thread: Some(thread),
        })
    }

    fn is_set(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for StopFlag {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn run() -> Result<()> {
    let mut state = SettingsState::load_or_install_default()?;
    let watcher = SettingsWatcher::watch(&state.settings_path)?;

    let mut pads = Vec::new();
    for info in input::discover_touchpads() {
        match Touchpad::open(&info.path) {
            Ok(pad) => {
                info!("using {} ({})", info.name, info.path);
                pads.push(pad);
            }
            Err(e) => warn!("{e:#}"),
        }
    }
    if pads.is_empty() {
        bail!("no usable touchpad found; try `smoothswipe doctor`");
    }

    let scene = Scene::new();
    let overview = SimOverview::new(scene.clone(), &SimLayout::default());
    let swipe = SmoothSwipe::enable(overview.host(), &state.settings)?;
    let stop = StopFlag::install()?;

    let mut last_tick = Instant::now();
    let mut was_visible = overview.is_visible();
    while !stop.is_set() {
        let mut any_event = false;

        for pad in pads.iter_mut() {
            let Ok(events) = pad.device.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => pad.tracker.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            pad.tracker.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            pad.tracker.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            pad.tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    let frame = pad.tracker.on_syn_report(time_us(&ev));
                    if let Some(gesture) = pad.detector.update(&frame) {
                        let propagation = swipe.handle_event(&gesture);
                        if propagation == Propagation::Stop {
                            debug!(
                                "{}: {:?} -> {:?} ({:?})",
                                pad.path,
                                gesture.phase,
                                swipe.state(),
                                swipe.progress()
                            );
                        }
                    }
                }
            }
        }

        let now = Instant::now();
        scene.advance(now - last_tick);
        last_tick = now;

        let visible = overview.is_visible();
        if visible != was_visible {
            info!("overview {}", if visible { "shown" } else { "hidden" });
            was_visible = visible;
        }

        if watcher.try_changed() {
            match state.reload() {
                Ok(true) => {
                    swipe.apply_settings(&state.settings);
                    info!("settings reloaded (sensitivity {})", state.settings.sensitivity);
                }
                Ok(false) => {}
                Err(e) => warn!("settings reload failed, keeping previous: {e}"),
            }
        }

        if !any_event {
            thread::sleep(IDLE_SLEEP);
        }
    }

    swipe.disable();
    Ok(())
}
