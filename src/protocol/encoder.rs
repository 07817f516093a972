//! # Frame Encoder
//!
//! Builds the four outbound frame kinds. Multi-byte fields are written
//! little-endian.

use bytes::BufMut;

use super::checksum::checksum;
use super::frame::*;

/// Wrap `payload` into a complete frame: header, length, command, payload, checksum.
fn seal(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + MIN_FRAME_SIZE);
    frame.put_u8(HEADER);
    frame.put_u8((payload.len() + 3) as u8);
    frame.put_u8(command);
    frame.put_slice(payload);

    let sum = checksum(&frame[1..]);
    frame.put_u8(sum);
    frame
}

/// Encode the status frame.
///
/// # Arguments
///
/// * `status` - Motor state and per-finger flags
/// * `system_status` - 3 presence bits (side, brace, cable)
///
/// # Returns
///
/// * `Vec<u8>` - 12-byte frame (declared length 11)
///
/// # Layout
///
/// ```text
/// Byte 3: bits 0-4 finger is moving, bits 5-7 motor state
/// Byte 4: bits 0-4 finger is flexing, bits 5-7 system status
/// Byte 5: bits 4-7 CPM sub-state
/// Byte 6-10: bits 0-6 position %, bit 7 has current
/// ```
pub fn encode_status(status: &MotorStatus, system_status: u8) -> Vec<u8> {
    let mut moving = (status.state & 0x07) << 5;
    let mut flexing = (system_status & 0x07) << 5;
    for (i, finger) in status.fingers.iter().enumerate() {
        moving |= u8::from(finger.is_moving) << i;
        flexing |= u8::from(finger.is_flexing) << i;
    }

    let mut payload = Vec::with_capacity(usize::from(STATUS_LENGTH) - 3);
    payload.put_u8(moving);
    payload.put_u8(flexing);
    payload.put_u8((status.cpm_state & 0x0F) << 4);
    for finger in &status.fingers {
        payload.put_u8((finger.position & 0x7F) | u8::from(finger.has_current) << 7);
    }

    seal(REPLY_STATUS, &payload)
}

/// Encode the sensor-data frame: tick counter, tick duration and three tilt angles.
///
/// # Returns
///
/// * `Vec<u8>` - 24-byte frame (declared length 23)
pub fn encode_data(report: &SensorReport) -> Vec<u8> {
    let mut payload = Vec::with_capacity(usize::from(DATA_LENGTH) - 3);
    payload.put_u32_le(report.count);
    payload.put_u32_le(report.dt);
    for angle in report.tilt {
        payload.put_f32_le(angle);
    }

    seal(REPLY_DATA, &payload)
}

/// Encode the setting frame: extension limits, flexion limits, then
/// `dt_full_rom`, `dt_wait_ext` and `dt_wait_flex`.
///
/// # Returns
///
/// * `Vec<u8>` - 26-byte frame (declared length 25)
pub fn encode_setting(report: &SettingReport) -> Vec<u8> {
    let mut payload = Vec::with_capacity(usize::from(SETTING_LENGTH) - 3);
    payload.put_slice(&report.limit_extension);
    payload.put_slice(&report.limit_flexion);
    payload.put_u32_le(report.dt_full_rom);
    payload.put_u32_le(report.dt_wait_ext);
    payload.put_u32_le(report.dt_wait_flex);

    seal(REPLY_SETTING, &payload)
}

/// Encode a version (`v`) or development (`V`) identification frame.
///
/// The text is cut at the first NUL and at [`MAX_TEXT_LENGTH`] bytes so the
/// declared length always fits in one byte.
///
/// # Examples
///
/// ```
/// use hoh_control::protocol::encoder::encode_identification;
///
/// let frame = encode_identification(b'v', "V1.0.0");
/// assert_eq!(frame.len(), 10);
/// assert_eq!(frame[1], 9);
/// ```
pub fn encode_identification(kind: u8, text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(bytes.len())
        .min(MAX_TEXT_LENGTH);

    seal(kind, &bytes[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::checksum::verify;
    use crate::protocol::decoder::decode_frame;

    fn sample_status() -> MotorStatus {
        let mut status = MotorStatus {
            state: 5,
            cpm_state: 3,
            ..MotorStatus::default()
        };
        status.fingers[0] = FingerStatus { is_moving: true, is_flexing: true, position: 42, has_current: true };
        status.fingers[4] = FingerStatus { is_moving: true, is_flexing: false, position: 100, has_current: false };
        status
    }

    #[test]
    fn test_status_layout() {
        let frame = encode_status(&sample_status(), 0b101);
        assert_eq!(frame.len(), 12);
        assert_eq!(frame[0], HEADER);
        assert_eq!(frame[1], STATUS_LENGTH);
        assert_eq!(frame[2], b'm');
        assert_eq!(frame[3], 0b1011_0001, "state 5 in high bits, fingers 0 and 4 moving");
        assert_eq!(frame[4], 0b1010_0001, "system status 5, finger 0 flexing");
        assert_eq!(frame[5], 0x30);
        assert_eq!(frame[6], 0x80 | 42);
        assert_eq!(frame[10], 100);
        assert!(verify(&frame));
    }

    #[test]
    fn test_status_decodes_as_valid_frame() {
        let frame = encode_status(&sample_status(), 0);
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.command, REPLY_STATUS);
        assert_eq!(decoded.payload, frame[3..11].to_vec());
    }

    #[test]
    fn test_data_layout() {
        let report = SensorReport { count: 7, dt: 20_000, tilt: [1.5, -2.0, 0.25] };
        let frame = encode_data(&report);
        assert_eq!(frame.len(), 24);
        assert_eq!(frame[1], DATA_LENGTH);
        assert_eq!(&frame[3..7], &7u32.to_le_bytes());
        assert_eq!(&frame[7..11], &20_000u32.to_le_bytes());
        assert_eq!(&frame[11..15], &1.5f32.to_le_bytes());
        assert_eq!(&frame[19..23], &0.25f32.to_le_bytes());
        assert!(verify(&frame));
    }

    #[test]
    fn test_setting_layout() {
        let report = SettingReport {
            limit_extension: [5, 6, 7, 8, 9],
            limit_flexion: [95, 94, 93, 92, 91],
            dt_full_rom: 1_800_000,
            dt_wait_ext: 2_000_000,
            dt_wait_flex: 500_000,
        };
        let frame = encode_setting(&report);
        assert_eq!(frame.len(), 26);
        assert_eq!(frame[1], SETTING_LENGTH);
        assert_eq!(frame[2], b's');
        assert_eq!(&frame[3..8], &[5, 6, 7, 8, 9]);
        assert_eq!(&frame[8..13], &[95, 94, 93, 92, 91]);
        assert_eq!(&frame[13..17], &1_800_000u32.to_le_bytes());
        assert_eq!(&frame[17..21], &2_000_000u32.to_le_bytes());
        assert_eq!(&frame[21..25], &500_000u32.to_le_bytes());
        assert!(decode_frame(&frame).is_ok());
    }

    #[test]
    fn test_identification() {
        let frame = encode_identification(b'V', "v20240531");
        assert_eq!(frame[1] as usize, frame.len() - 1);
        assert_eq!(&frame[3..12], b"v20240531");
        assert!(verify(&frame));
    }

    #[test]
    fn test_identification_truncates() {
        let long = "x".repeat(300);
        let frame = encode_identification(b'v', &long);
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        assert_eq!(frame[1], 255);
        assert!(decode_frame(&frame).is_ok());

        let frame = encode_identification(b'v', "ab\0cd");
        assert_eq!(frame.len(), 6);
    }
}
