//! # Frame Layout and Commands
//!
//! Every frame, in both directions, has the layout
//!
//! ```text
//! [0xFF][LEN][CMD][PAYLOAD ...][CHECKSUM]
//! ```
//!
//! where `LEN` is the total frame size minus one (everything after the
//! header) and `CHECKSUM` is the inverted modulo-256 sum of `LEN`, `CMD` and
//! the payload.

use crate::motor::{CpmMode, N_FINGERS};

/// Frame header byte.
pub const HEADER: u8 = 0xFF;

/// Smallest valid frame: header, length, command, checksum.
pub const MIN_FRAME_SIZE: usize = 4;

/// Largest frame the single length byte can describe.
pub const MAX_FRAME_SIZE: usize = 256;

/// Largest inbound frame: a five-byte per-finger payload (`m`, `l`, `L`).
pub const MAX_COMMAND_FRAME_SIZE: usize = 9;

/// Declared length of the status frame.
pub const STATUS_LENGTH: u8 = 11;

/// Declared length of the sensor-data frame.
pub const DATA_LENGTH: u8 = 23;

/// Declared length of the setting frame.
pub const SETTING_LENGTH: u8 = 25;

/// Longest text an identification frame can carry.
pub const MAX_TEXT_LENGTH: usize = 252;

// Inbound command bytes
pub const CMD_RESET_EXTENSION: u8 = b'e';
pub const CMD_RESET_FLEXION: u8 = b'f';
pub const CMD_CALIBRATE: u8 = b'c';
pub const CMD_CPM: u8 = b'p';
pub const CMD_CPM_SEQUENTIAL: u8 = b's';
pub const CMD_CPM_SEQUENTIAL_REVERSE: u8 = b'r';
pub const CMD_PAUSE: u8 = b'Z';
pub const CMD_RESUME: u8 = b'z';
pub const CMD_STOP: u8 = b'x';
pub const CMD_MOVE: u8 = b'm';
pub const CMD_REZERO_SENSOR: u8 = b'M';
pub const CMD_CPM_ONCE: u8 = b'o';
pub const CMD_LIMIT_EXTENSION: u8 = b'l';
pub const CMD_LIMIT_FLEXION: u8 = b'L';
pub const CMD_WAIT_FLEXION: u8 = b't';
pub const CMD_WAIT_EXTENSION: u8 = b'T';
pub const CMD_VERSION: u8 = b'v';
pub const CMD_DEVELOPMENT: u8 = b'V';
pub const CMD_DATA_ON: u8 = b'D';
pub const CMD_DATA_OFF: u8 = b'd';
pub const CMD_STATUS_ON: u8 = b'G';
pub const CMD_STATUS_OFF: u8 = b'g';
pub const CMD_SETTING: u8 = b'i';
pub const CMD_DEBUG: u8 = b'I';

// Outbound frame kinds
pub const REPLY_STATUS: u8 = b'm';
pub const REPLY_DATA: u8 = b'd';
pub const REPLY_SETTING: u8 = b's';
pub const REPLY_VERSION: u8 = b'v';
pub const REPLY_DEVELOPMENT: u8 = b'V';

/// A checksum-verified frame, header and checksum stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: u8, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }
}

/// A decoded inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ResetExtension,
    ResetFlexion,
    Calibrate,
    /// Start CPM, excluding the fingers set in `skip_mask`.
    Cpm { mode: CpmMode, skip_mask: u8 },
    PauseCpm,
    ResumeCpm,
    Stop,
    /// Move to per-finger targets; `limited` applies the finger's limits.
    Move {
        targets: [u8; N_FINGERS],
        limited: [bool; N_FINGERS],
    },
    RezeroSensor,
    CpmOnce,
    SetLimitsExtension([u8; N_FINGERS]),
    SetLimitsFlexion([u8; N_FINGERS]),
    SetWaitFlexion(u32),
    SetWaitExtension(u32),
    RequestVersion,
    RequestDevelopment,
    /// Turn the sensor-data stream on or off.
    DataStream(bool),
    /// Turn the status stream on or off.
    StatusStream(bool),
    RequestSetting,
    DebugReport,
}

/// Per-finger part of the status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerStatus {
    pub is_moving: bool,
    pub is_flexing: bool,
    /// Position in whole percent, 0..=100.
    pub position: u8,
    pub has_current: bool,
}

/// Content of the status frame that comes from the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorStatus {
    /// 3-bit top-level state code.
    pub state: u8,
    /// 4-bit CPM sub-state code.
    pub cpm_state: u8,
    pub fingers: [FingerStatus; N_FINGERS],
}

/// Content of the setting frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingReport {
    pub limit_extension: [u8; N_FINGERS],
    pub limit_flexion: [u8; N_FINGERS],
    pub dt_full_rom: u32,
    pub dt_wait_ext: u32,
    pub dt_wait_flex: u32,
}

/// Content of the sensor-data frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReport {
    /// Fast-tick counter.
    pub count: u32,
    /// Duration of the last fast tick in microseconds.
    pub dt: u32,
    /// Tilt angles as reported by the sensor, unconverted.
    pub tilt: [f32; 3],
}
