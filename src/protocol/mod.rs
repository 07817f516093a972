//! # Wire Protocol
//!
//! Framed binary protocol spoken with the companion application.
//!
//! This module handles:
//! - Frame validation (header, declared length, inverted-sum checksum)
//! - Parsing of the inbound command set into [`Command`]
//! - Encoding of the status, sensor-data, setting and identification frames

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod frame;

pub use decoder::{decode, decode_frame, parse_command};
pub use encoder::{encode_data, encode_identification, encode_setting, encode_status};
pub use frame::{Command, FingerStatus, Frame, MotorStatus, SensorReport, SettingReport};
