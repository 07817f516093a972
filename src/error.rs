//! # Error Types
//!
//! Custom error types for HOH Control using `thiserror`.

use thiserror::Error;

/// Main error type for HOH Control
#[derive(Debug, Error)]
pub enum HohError {
    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial link errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Persistent setting store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons an inbound frame is rejected.
///
/// None of these are ever reported back to the sender; the device logs them
/// on the diagnostic channel and drops the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("invalid header byte: 0x{0:02X}")]
    BadHeader(u8),

    #[error("length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    #[error("unknown command byte: 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("command '{command}' needs {needed} payload bytes, got {got}")]
    PayloadTooShort { command: char, needed: usize, got: usize },
}

/// Result type alias for HOH Control
pub type Result<T> = std::result::Result<T, HohError>;
