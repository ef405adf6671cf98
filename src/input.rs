//! Touchpad discovery (evdev 0.13).

use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisCode, Device, EventType};
use log::{debug, warn};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

/// Multitouch devices under `/dev/input` that report slots and positions.
pub fn discover_touchpads() -> Vec<DeviceInfo> {
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        warn!("cannot read /dev/input");
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_event_node(p))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|p| {
            let dev = Device::open(&p)
                .inspect_err(|e| debug!("skipping {}: {e}", p.display()))
                .ok()?;
            is_touchpad(&dev).then(|| DeviceInfo {
                path: p.display().to_string(),
                name: dev.name().unwrap_or("unknown").to_string(),
            })
        })
        .collect()
}

fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with("event"))
}

fn is_touchpad(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    });
    has_abs && has_mt
}

/// Raw position range of one axis, used to scale deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn span(&self) -> i32 {
        (self.max - self.min).max(1)
    }
}

/// X and Y ranges of the device's multitouch position axes.
pub fn position_ranges(dev: &Device) -> Option<(AxisRange, AxisRange)> {
    let mut x = None;
    let mut y = None;
    for (axis, info) in dev.get_absinfo().ok()? {
        let range = AxisRange {
            min: info.minimum(),
            max: info.maximum(),
        };
        if axis == AbsoluteAxisCode::ABS_MT_POSITION_X {
            x = Some(range);
        } else if axis == AbsoluteAxisCode::ABS_MT_POSITION_Y {
            y = Some(range);
        }
    }
    Some((x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_nodes_only() {
        assert!(is_event_node(Path::new("/dev/input/event3")));
        assert!(!is_event_node(Path::new("/dev/input/mouse0")));
        assert!(!is_event_node(Path::new("/dev/input/by-id")));
    }

    #[test]
    fn degenerate_range_has_unit_span() {
        assert_eq!(AxisRange { min: 0, max: 1200 }.span(), 1200);
        assert_eq!(AxisRange { min: 5, max: 5 }.span(), 1);
    }
}
