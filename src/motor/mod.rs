//! # Motor Module
//!
//! Five finger actuators and the state machine that coordinates them.
//!
//! This module handles:
//! - Reset of all fingers to full extension or flexion with end-stop detection
//! - Calibration of the full range-of-motion travel time
//! - Free positioning to per-finger targets with optional limits
//! - Continuous passive motion (CPM), simultaneous or staggered, with pause/resume

pub mod actuator;
pub mod controller;
pub mod driver;
pub mod state;

pub use actuator::{Actuator, Direction};
pub use controller::{CpmMode, MotorController, MotorParams};
pub use driver::{BridgeOutputs, MotorDriver, ScriptedDriver, SimulatedDriver};
pub use state::{CalibrationState, CpmState, MotorState};

/// Number of finger actuators on the orthosis.
pub const N_FINGERS: usize = 5;

/// Position domain, percent of range of motion.
pub const TARGET_POS_MIN: u8 = 0;
pub const TARGET_POS_MAX: u8 = 100;

/// Limits applied to every finger at startup.
pub const DEFAULT_LIMIT_EXTENSION: u8 = 5;
pub const DEFAULT_LIMIT_FLEXION: u8 = 95;

/// Key of the persisted full range-of-motion duration.
pub const KEY_DT_FULL_ROM: &str = "DT_FULL_ROM";
