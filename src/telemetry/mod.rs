//! # Telemetry Module
//!
//! Optional session recorder for the status stream.
//!
//! This module handles:
//! - Converting status snapshots into serializable records
//! - Formatting them as JSONL (JSON Lines)
//! - Writing one file per day under the configured directory

pub mod logger;
pub mod types;

pub use logger::StatusRecorder;
pub use types::{FingerRecord, StatusRecord};
