//! # System State
//!
//! Telemetry enable-flags, the fast-tick counter and the presence status
//! bits reported in the status frame.

use crate::clock::{elapsed, Micros};
use crate::presence::BraceSide;

/// Status bit: brace is mounted on the right hand.
pub const STATUS_SIDE_RIGHT: u8 = 0x01;
/// Status bit: brace is connected.
pub const STATUS_BRACE: u8 = 0x02;
/// Status bit: cable is connected.
pub const STATUS_CABLE: u8 = 0x04;

/// Outbound-stream flags and counters shared by the protocol and the loop.
#[derive(Debug, Clone)]
pub struct SystemState {
    pub send_version: bool,
    pub send_development: bool,
    pub send_setting: bool,
    pub send_status: bool,
    pub send_data: bool,

    version: String,
    development: String,
    status: u8,
    count: u32,
    dt: Micros,
    last_tick: Option<Micros>,
}

impl SystemState {
    /// Status and data streams start enabled; one-shot replies start disabled.
    pub fn new(version: impl Into<String>, development: impl Into<String>) -> Self {
        Self {
            send_version: false,
            send_development: false,
            send_setting: false,
            send_status: true,
            send_data: true,
            version: version.into(),
            development: development.into(),
            status: 0,
            count: 0,
            dt: 0,
            last_tick: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn development(&self) -> &str {
        &self.development
    }

    /// Count one fast tick and measure the time since the previous one.
    ///
    /// The counter wraps to zero after `u32::MAX`.
    pub fn record_tick(&mut self, now: Micros) -> u32 {
        self.count = self.count.checked_add(1).unwrap_or(0);
        if let Some(last) = self.last_tick {
            self.dt = elapsed(now, last);
        }
        self.last_tick = Some(now);
        self.count
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Duration of the last fast tick in microseconds.
    pub fn dt(&self) -> Micros {
        self.dt
    }

    /// 3-bit presence status carried in status byte 2.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Refresh the presence bits. The side bit is only set while a brace is connected.
    pub fn update_presence(&mut self, cable_connected: bool, side: BraceSide) {
        let mut status = 0;
        if cable_connected {
            status |= STATUS_CABLE;
        }
        match side {
            BraceSide::None => {}
            BraceSide::Left => status |= STATUS_BRACE,
            BraceSide::Right => status |= STATUS_BRACE | STATUS_SIDE_RIGHT,
        }
        self.status = status;
    }

    pub fn cable_connected(&self) -> bool {
        self.status & STATUS_CABLE != 0
    }

    pub fn brace_side(&self) -> BraceSide {
        match (self.status & STATUS_BRACE != 0, self.status & STATUS_SIDE_RIGHT != 0) {
            (false, _) => BraceSide::None,
            (true, false) => BraceSide::Left,
            (true, true) => BraceSide::Right,
        }
    }

    #[cfg(test)]
    fn set_count(&mut self, count: u32) {
        self.count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_flags() {
        let sys = SystemState::new("V1.0.0", "v20240531");
        assert!(sys.send_status && sys.send_data);
        assert!(!sys.send_version && !sys.send_development && !sys.send_setting);
        assert_eq!(sys.version(), "V1.0.0");
        assert_eq!(sys.development(), "v20240531");
    }

    #[test]
    fn test_record_tick_measures_dt() {
        let mut sys = SystemState::new("", "");
        assert_eq!(sys.record_tick(1_000), 1);
        assert_eq!(sys.dt(), 0);
        assert_eq!(sys.record_tick(21_000), 2);
        assert_eq!(sys.dt(), 20_000);
    }

    #[test]
    fn test_record_tick_across_clock_wrap() {
        let mut sys = SystemState::new("", "");
        sys.record_tick(u32::MAX - 9_999);
        sys.record_tick(10_000);
        assert_eq!(sys.dt(), 20_000);
    }

    #[test]
    fn test_counter_wraps_to_zero() {
        let mut sys = SystemState::new("", "");
        sys.set_count(u32::MAX);
        assert_eq!(sys.record_tick(0), 0);
        assert_eq!(sys.record_tick(1), 1);
    }

    #[test]
    fn test_presence_bits() {
        let mut sys = SystemState::new("", "");
        sys.update_presence(true, BraceSide::Right);
        assert_eq!(sys.status(), 0b111);
        assert_eq!(sys.brace_side(), BraceSide::Right);

        sys.update_presence(false, BraceSide::Left);
        assert_eq!(sys.status(), 0b010);
        assert!(!sys.cable_connected());

        sys.update_presence(true, BraceSide::None);
        assert_eq!(sys.status(), 0b100);
        assert_eq!(sys.brace_side(), BraceSide::None);
    }
}
