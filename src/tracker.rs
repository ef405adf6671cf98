//! Per-slot touch tracking and frame snapshots.

use crate::input::AxisRange;

const MAX_SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotState {
    pub tracking_id: i32, // -1 = inactive
    pub x_norm: f32,
    pub y_norm: f32,
    active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    /// Kernel timestamp of the SYN_REPORT, in microseconds.
    pub time_us: i64,
    pub active_count: usize,
    /// Mean position of the active touches, normalized to the pad.
    pub centroid: (f32, f32),
}

#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    x_range: AxisRange,
    y_range: AxisRange,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            slots: vec![SlotState::default(); MAX_SLOTS],
            cur_slot: 0,
            x_range: AxisRange { min: 0, max: 4096 },
            y_range: AxisRange { min: 0, max: 4096 },
        }
    }

    pub fn set_ranges(&mut self, x: AxisRange, y: AxisRange) {
        self.x_range = x;
        self.y_range = y;
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, MAX_SLOTS as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        s.tracking_id = tracking_id;
        s.active = tracking_id >= 0;
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let nx = normalize(raw, self.x_range);
        self.slots[self.cur_slot].x_norm = nx;
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let ny = normalize(raw, self.y_range);
        self.slots[self.cur_slot].y_norm = ny;
    }

    pub fn on_syn_report(&self, time_us: i64) -> FrameSummary {
        let active: Vec<&SlotState> = self.slots.iter().filter(|s| s.active).collect();
        let centroid = if active.is_empty() {
            (0.5, 0.5)
        } else {
            let n = active.len() as f32;
            let sum_x: f32 = active.iter().map(|s| s.x_norm).sum();
            let sum_y: f32 = active.iter().map(|s| s.y_norm).sum();
            (sum_x / n, sum_y / n)
        };

        FrameSummary {
            time_us,
            active_count: active.len(),
            centroid,
        }
    }
}

fn normalize(raw: i32, range: AxisRange) -> f32 {
    ((raw - range.min) as f32 / range.span() as f32).clamp(0.0, 1.0)
}
