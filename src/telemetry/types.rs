//! Serializable telemetry records

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::frame::MotorStatus;

/// One finger in a [`StatusRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FingerRecord {
    pub position: u8,
    pub moving: bool,
    pub flexing: bool,
    pub has_current: bool,
}

/// One status snapshot as written to the session log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    /// RFC 3339 wall-clock time
    pub timestamp: String,
    /// Fast-tick counter at the time of the snapshot
    pub count: u32,
    pub state: u8,
    pub cpm_state: u8,
    /// Presence status bits (side, brace, cable)
    pub system_status: u8,
    pub fingers: Vec<FingerRecord>,
}

impl StatusRecord {
    pub fn new(at: DateTime<Utc>, count: u32, status: &MotorStatus, system_status: u8) -> Self {
        Self {
            timestamp: at.to_rfc3339(),
            count,
            state: status.state,
            cpm_state: status.cpm_state,
            system_status,
            fingers: status
                .fingers
                .iter()
                .map(|f| FingerRecord {
                    position: f.position,
                    moving: f.is_moving,
                    flexing: f.is_flexing,
                    has_current: f.has_current,
                })
                .collect(),
        }
    }
}
