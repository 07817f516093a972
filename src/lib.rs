//! # HOH Control Library
//!
//! Control core of a five-finger motorized hand-rehabilitation orthosis.
//!
//! This library drives five linear finger actuators through reset,
//! calibration, free positioning and continuous passive motion (CPM), and
//! speaks the framed binary protocol used by the companion application.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod motor;
pub mod presence;
pub mod protocol;
pub mod sensor;
pub mod serial;
pub mod signal;
pub mod storage;
pub mod system;
pub mod telemetry;
