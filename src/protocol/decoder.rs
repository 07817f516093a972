//! # Frame Decoder
//!
//! Validates inbound frames and turns them into [`Command`]s.

use super::checksum::checksum;
use super::frame::*;
use crate::error::ProtocolError;
use crate::motor::{CpmMode, N_FINGERS};

/// Validate a complete frame and strip header, length and checksum.
///
/// # Arguments
///
/// * `bytes` - One complete frame as received
///
/// # Returns
///
/// * `Result<Frame, ProtocolError>` - Command byte and payload
///
/// # Errors
///
/// Returns error if:
/// - The frame is shorter than header + length + command + checksum
/// - The header byte is not `0xFF`
/// - The declared length is not the frame size minus one
/// - The checksum does not match
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < MIN_FRAME_SIZE {
        return Err(ProtocolError::TooShort(bytes.len()));
    }

    if bytes[0] != HEADER {
        return Err(ProtocolError::BadHeader(bytes[0]));
    }

    let declared = bytes[1];
    if usize::from(declared) != bytes.len() - 1 {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let last = bytes.len() - 1;
    let expected = checksum(&bytes[1..last]);
    if bytes[last] != expected {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            received: bytes[last],
        });
    }

    Ok(Frame::new(bytes[2], bytes[3..last].to_vec()))
}

/// Interpret a validated frame.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownCommand`] for command bytes outside the
/// command set and [`ProtocolError::PayloadTooShort`] when the payload is
/// shorter than the command needs. Extra payload bytes are ignored.
pub fn parse_command(frame: &Frame) -> Result<Command, ProtocolError> {
    let command = match frame.command {
        CMD_RESET_EXTENSION => Command::ResetExtension,
        CMD_RESET_FLEXION => Command::ResetFlexion,
        CMD_CALIBRATE => Command::Calibrate,
        CMD_CPM => cpm(frame, CpmMode::Simultaneous)?,
        CMD_CPM_SEQUENTIAL => cpm(frame, CpmMode::Sequential)?,
        CMD_CPM_SEQUENTIAL_REVERSE => cpm(frame, CpmMode::SequentialReverse)?,
        CMD_PAUSE => Command::PauseCpm,
        CMD_RESUME => Command::ResumeCpm,
        CMD_STOP => Command::Stop,
        CMD_MOVE => {
            let bytes = per_finger(frame)?;
            Command::Move {
                targets: bytes.map(|b| b & 0x7F),
                limited: bytes.map(|b| b & 0x80 != 0),
            }
        }
        CMD_REZERO_SENSOR => Command::RezeroSensor,
        CMD_CPM_ONCE => Command::CpmOnce,
        CMD_LIMIT_EXTENSION => Command::SetLimitsExtension(per_finger(frame)?),
        CMD_LIMIT_FLEXION => Command::SetLimitsFlexion(per_finger(frame)?),
        CMD_WAIT_FLEXION => Command::SetWaitFlexion(read_u32_le(frame)?),
        CMD_WAIT_EXTENSION => Command::SetWaitExtension(read_u32_le(frame)?),
        CMD_VERSION => Command::RequestVersion,
        CMD_DEVELOPMENT => Command::RequestDevelopment,
        CMD_DATA_ON => Command::DataStream(true),
        CMD_DATA_OFF => Command::DataStream(false),
        CMD_STATUS_ON => Command::StatusStream(true),
        CMD_STATUS_OFF => Command::StatusStream(false),
        CMD_SETTING => Command::RequestSetting,
        CMD_DEBUG => Command::DebugReport,
        other => return Err(ProtocolError::UnknownCommand(other)),
    };

    Ok(command)
}

/// Validate and interpret in one step.
pub fn decode(bytes: &[u8]) -> Result<Command, ProtocolError> {
    parse_command(&decode_frame(bytes)?)
}

fn require(frame: &Frame, needed: usize) -> Result<&[u8], ProtocolError> {
    frame
        .payload
        .get(..needed)
        .ok_or(ProtocolError::PayloadTooShort {
            command: char::from(frame.command),
            needed,
            got: frame.payload.len(),
        })
}

fn cpm(frame: &Frame, mode: CpmMode) -> Result<Command, ProtocolError> {
    let skip_mask = require(frame, 1)?[0] & 0x1F;
    Ok(Command::Cpm { mode, skip_mask })
}

fn per_finger(frame: &Frame) -> Result<[u8; N_FINGERS], ProtocolError> {
    let bytes = require(frame, N_FINGERS)?;
    Ok(std::array::from_fn(|i| bytes[i]))
}

fn read_u32_le(frame: &Frame) -> Result<u32, ProtocolError> {
    let bytes = require(frame, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
