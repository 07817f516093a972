//! # Auxiliary Hardware Presence
//!
//! Contract of the probe that reports whether the cable and the brace are
//! attached, and which hand the brace is on. Polled once per housekeeping
//! tick.

use serde::Deserialize;

/// Which hand the brace is mounted on, if one is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BraceSide {
    /// No brace detected.
    #[default]
    None,
    Left,
    Right,
}

/// Source of the presence status bits.
pub trait PresenceProbe: Send {
    fn cable_connected(&mut self) -> bool;

    fn brace_side(&mut self) -> BraceSide;
}

/// Probe that always reports the configured values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPresence {
    pub cable_connected: bool,
    pub brace_side: BraceSide,
}

impl StaticPresence {
    pub fn new(cable_connected: bool, brace_side: BraceSide) -> Self {
        Self {
            cable_connected,
            brace_side,
        }
    }
}

impl PresenceProbe for StaticPresence {
    fn cable_connected(&mut self) -> bool {
        self.cable_connected
    }

    fn brace_side(&mut self) -> BraceSide {
        self.brace_side
    }
}
