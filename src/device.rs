//! # Device Context
//!
//! The process-owned context tying the motor controller, the system flags
//! and the sensor/presence collaborators to the wire protocol.
//!
//! Three entry points drive it, all on the same logical thread:
//!
//! - [`Device::handle_frame`] for every complete inbound frame; the command
//!   takes effect before the call returns
//! - [`Device::tick`] on the fast period, returning the frames to transmit
//! - [`Device::housekeeping`] on the slow period, refreshing presence bits
//!   and returning any one-shot replies

use std::fmt;

use tracing::{debug, info, trace};

use crate::clock::Micros;
use crate::motor::{MotorController, MotorDriver};
use crate::presence::{BraceSide, PresenceProbe};
use crate::protocol::frame::{REPLY_DEVELOPMENT, REPLY_VERSION};
use crate::protocol::{self, Command, SensorReport};
use crate::sensor::TiltSensor;
use crate::system::SystemState;

/// Controller, flags and collaborators of one orthosis.
pub struct Device<D: MotorDriver> {
    motor: MotorController<D>,
    system: SystemState,
    sensor: Box<dyn TiltSensor>,
    presence: Box<dyn PresenceProbe>,
}

impl<D: MotorDriver> Device<D> {
    pub fn new(
        motor: MotorController<D>,
        system: SystemState,
        sensor: Box<dyn TiltSensor>,
        presence: Box<dyn PresenceProbe>,
    ) -> Self {
        Self {
            motor,
            system,
            sensor,
            presence,
        }
    }

    pub fn motor(&self) -> &MotorController<D> {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut MotorController<D> {
        &mut self.motor
    }

    pub fn system(&self) -> &SystemState {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut SystemState {
        &mut self.system
    }

    /// Bring the hand to full extension so every session starts open.
    pub fn start(&mut self, now: Micros) {
        self.motor.reset_to_extension(now);
    }

    /// Decode one inbound frame and apply it.
    ///
    /// Malformed frames and unknown commands are logged and dropped; nothing
    /// is reported back to the sender. Returns the applied command.
    pub fn handle_frame(&mut self, bytes: &[u8], now: Micros) -> Option<Command> {
        match protocol::decode(bytes) {
            Ok(command) => {
                debug!("Received {:?} ({} bytes)", command, bytes.len());
                self.apply(command, now);
                Some(command)
            }
            Err(e) => {
                debug!("Dropped frame {:02X?}: {}", bytes, e);
                None
            }
        }
    }

    /// Apply a decoded command.
    pub fn apply(&mut self, command: Command, now: Micros) {
        match command {
            Command::ResetExtension => {
                self.motor.reset_skips();
                self.motor.reset_to_extension(now);
            }
            Command::ResetFlexion => {
                self.motor.reset_skips();
                self.motor.reset_to_flexion(now);
            }
            Command::Calibrate => {
                self.motor.reset_skips();
                self.motor.calibrate();
            }
            Command::Cpm { mode, skip_mask } => self.motor.start_cpm(mode, skip_mask),
            Command::PauseCpm => {
                if !self.motor.pause_cpm(now) {
                    debug!("Pause ignored in {:?}/{:?}", self.motor.state(), self.motor.cpm_state());
                }
            }
            Command::ResumeCpm => {
                if !self.motor.resume_cpm() {
                    debug!("Resume ignored, CPM is not paused");
                }
            }
            Command::Stop => self.motor.stop(now),
            Command::Move { targets, limited } => self.motor.move_to(targets, limited, now),
            Command::RezeroSensor => self.sensor.rezero(),
            Command::CpmOnce => self.motor.start_cpm_once(),
            Command::SetLimitsExtension(limits) => self.motor.set_limits_extension(limits),
            Command::SetLimitsFlexion(limits) => self.motor.set_limits_flexion(limits),
            Command::SetWaitFlexion(value) => self.motor.set_dt_wait_flex(value),
            Command::SetWaitExtension(value) => self.motor.set_dt_wait_ext(value),
            Command::RequestVersion => self.system.send_version = true,
            Command::RequestDevelopment => self.system.send_development = true,
            Command::DataStream(enabled) => self.system.send_data = enabled,
            Command::StatusStream(enabled) => self.system.send_status = enabled,
            Command::RequestSetting => self.system.send_setting = true,
            Command::DebugReport => info!("\n{}", self.debug_report()),
        }
    }

    /// Advance the controller one period and collect the streamed frames.
    pub fn tick(&mut self, now: Micros) -> Vec<Vec<u8>> {
        let count = self.system.record_tick(now);
        self.motor.tick(now);
        trace!("Tick {} ({} us)", count, self.system.dt());

        let mut frames = Vec::with_capacity(2);
        if self.system.send_status {
            frames.push(protocol::encode_status(&self.motor.status(), self.system.status()));
        }

        if self.system.send_data {
            self.sensor.update();
            if self.sensor.is_working() {
                frames.push(protocol::encode_data(&SensorReport {
                    count,
                    dt: self.system.dt(),
                    tilt: self.sensor.tilt(),
                }));
            }
        }
        frames
    }

    /// Refresh presence bits and flush requested one-shot replies.
    pub fn housekeeping(&mut self) -> Vec<Vec<u8>> {
        let cable = self.presence.cable_connected();
        let side = self.presence.brace_side();
        self.system.update_presence(cable, side);

        let mut frames = Vec::new();
        if self.system.send_version {
            frames.push(protocol::encode_identification(REPLY_VERSION, self.system.version()));
            self.system.send_version = false;
        }
        if self.system.send_development {
            frames.push(protocol::encode_identification(
                REPLY_DEVELOPMENT,
                self.system.development(),
            ));
            self.system.send_development = false;
        }
        if self.system.send_setting {
            frames.push(protocol::encode_setting(&self.motor.settings()));
            self.system.send_setting = false;
        }
        frames
    }

    /// Human-readable dump of versions, presence, fingers, timings and sensor.
    pub fn debug_report(&self) -> String {
        DebugReport(self).to_string()
    }
}

/// Display adapter rendering the `I` debug report.
struct DebugReport<'a, D: MotorDriver>(&'a Device<D>);

impl<D: MotorDriver> fmt::Display for DebugReport<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Device {
            motor,
            system,
            sensor,
            ..
        } = self.0;
        let side = match system.brace_side() {
            BraceSide::None => "Not Detected",
            BraceSide::Left => "Left",
            BraceSide::Right => "Right",
        };
        let yes_no = |b: bool| if b { "Yes" } else { "No" };

        writeln!(f, "===================")?;
        writeln!(f, "Version: {}", system.version())?;
        writeln!(f, "Development: {}", system.development())?;
        writeln!(f, "Connected Cable: {}", yes_no(system.cable_connected()))?;
        writeln!(f, "Connected Brace: {}", yes_no(system.brace_side() != BraceSide::None))?;
        writeln!(f, "Side: {}", side)?;
        writeln!(
            f,
            "State: {:?} / calibration {:?} / cpm {:?}",
            motor.state(),
            motor.calibration_state(),
            motor.cpm_state()
        )?;
        for finger in motor.fingers() {
            writeln!(
                f,
                "#{} Pos = {:.2}; Ext = {}; Flex = {}; Current = {:.2}",
                finger.index(),
                finger.position,
                finger.limit_extension,
                finger.limit_flexion,
                finger.current_mean()
            )?;
        }
        writeln!(f, "Time Taken to Move Full ROM: {}", motor.dt_full_rom())?;
        writeln!(f, "CPM Wait Time at Extension: {}", motor.dt_wait_ext())?;
        writeln!(f, "CPM Wait Time at Flexion: {}", motor.dt_wait_flex())?;
        writeln!(f, "Count: {}; dt: {}", system.count(), system.dt())?;
        let tilt = sensor.tilt();
        writeln!(
            f,
            "Tilt: {:.2}\t{:.2}\t{:.2} ({})",
            tilt[0],
            tilt[1],
            tilt[2],
            if sensor.is_working() { "working" } else { "not working" }
        )?;
        write!(f, "===================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{MotorParams, MotorState, ScriptedDriver};
    use crate::presence::StaticPresence;
    use crate::protocol::checksum::checksum;
    use crate::protocol::decode_frame;
    use crate::sensor::{GravityTiltSensor, NullTiltSensor};
    use crate::storage::MemoryStore;

    fn device_with(sensor: Box<dyn TiltSensor>) -> Device<ScriptedDriver> {
        let motor = MotorController::new(
            ScriptedDriver::new(),
            Box::new(MemoryStore::new()),
            MotorParams::default(),
            0,
        );
        Device::new(
            motor,
            SystemState::new("V1.0.0", "v20240531"),
            sensor,
            Box::new(StaticPresence::new(true, BraceSide::Right)),
        )
    }

    fn device() -> Device<ScriptedDriver> {
        device_with(Box::new(NullTiltSensor))
    }

    fn frame(command: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xFF, (payload.len() + 3) as u8, command];
        bytes.extend_from_slice(payload);
        bytes.push(checksum(&bytes[1..]));
        bytes
    }

    #[test]
    fn test_start_resets_to_extension() {
        let mut dev = device();
        dev.start(0);
        assert_eq!(dev.motor().state(), MotorState::ResetExtension);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut dev = device();
        assert!(dev.handle_frame(&[0xFF, 0x03, 0x65, 0x00], 0).is_none());
        assert!(dev.handle_frame(&[0x00, 0x03, 0x65, 0x97], 0).is_none());
        assert!(dev.handle_frame(&frame(b'?', &[]), 0).is_none());
        assert_eq!(dev.motor().state(), MotorState::Idle);
    }

    #[test]
    fn test_reset_command_clears_skips() {
        let mut dev = device();
        dev.motor_mut().set_skip_mask(0x1F);
        assert_eq!(dev.handle_frame(&[0xFF, 0x03, 0x65, 0x97], 0), Some(Command::ResetExtension));
        assert_eq!(dev.motor().state(), MotorState::ResetExtension);
        assert!(dev.motor().driver().any_output_active());
    }

    #[test]
    fn test_tick_streams_status_only_without_sensor() {
        let mut dev = device();
        let frames = dev.tick(0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][2], b'm');

        dev.handle_frame(&frame(b'g', &[]), 0);
        assert!(dev.tick(20_000).is_empty());
    }

    #[test]
    fn test_tick_streams_data_when_sensor_works() {
        let mut sensor = GravityTiltSensor::new(20_000);
        sensor.set_acceleration([0.0, 0.0, 9.81]);
        let mut dev = device_with(Box::new(sensor));

        dev.tick(0);
        let frames = dev.tick(20_000);
        assert_eq!(frames.len(), 2);
        let data = decode_frame(&frames[1]).unwrap();
        assert_eq!(data.command, b'd');
        assert_eq!(&data.payload[0..4], &2u32.to_le_bytes());
        assert_eq!(&data.payload[4..8], &20_000u32.to_le_bytes());

        dev.handle_frame(&frame(b'd', &[]), 20_000);
        assert_eq!(dev.tick(40_000).len(), 1);
    }

    #[test]
    fn test_status_carries_presence_bits() {
        let mut dev = device();
        dev.housekeeping();
        let frames = dev.tick(0);
        assert_eq!(frames[0][4] >> 5, 0b111);
    }

    #[test]
    fn test_one_shot_replies() {
        let mut dev = device();
        assert!(dev.housekeeping().is_empty());

        dev.handle_frame(&frame(b'v', &[]), 0);
        dev.handle_frame(&frame(b'V', &[]), 0);
        dev.handle_frame(&frame(b'i', &[]), 0);
        let frames = dev.housekeeping();
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][2..9], b"vV1.0.0");
        assert_eq!(&frames[1][2..12], b"Vv20240531");
        assert_eq!(frames[2][2], b's');

        assert!(dev.housekeeping().is_empty(), "replies are sent once");
    }

    #[test]
    fn test_wait_commands() {
        let mut dev = device();
        dev.handle_frame(&frame(b't', &2_000_000u32.to_le_bytes()), 0);
        dev.handle_frame(&frame(b'T', &500_000u32.to_le_bytes()), 0);
        assert_eq!(dev.motor().dt_wait_flex(), 2_000_000);
        assert_eq!(dev.motor().dt_wait_ext(), 500_000);
    }

    #[test]
    fn test_rezero_sensor() {
        let mut sensor = GravityTiltSensor::new(20_000);
        sensor.set_acceleration([0.0, 1.0, 1.0]);
        let mut dev = device_with(Box::new(sensor));
        for i in 0..300 {
            dev.tick(i * 20_000);
        }
        dev.handle_frame(&frame(b'M', &[]), 6_000_000);
        assert!(dev.debug_report().contains("Tilt: 0.00"));
    }

    #[test]
    fn test_debug_report() {
        let mut dev = device();
        dev.housekeeping();
        let report = dev.debug_report();
        assert!(report.contains("Version: V1.0.0"));
        assert!(report.contains("Side: Right"));
        assert!(report.contains("#4 Pos = 0.00; Ext = 5; Flex = 95"));
        assert!(report.contains("Time Taken to Move Full ROM: 2340000"));
        assert!(report.contains("Connected Brace: Yes"));
        assert!(report.contains("Tilt: 0.00\t0.00\t0.00 (not working)"));
        assert!(report.starts_with("===================\nVersion"));
        assert!(report.ends_with("dt: 0\nTilt: 0.00\t0.00\t0.00 (not working)\n==================="));
        assert_eq!(report.lines().count(), 18);
        assert!(dev.handle_frame(&frame(b'I', &[]), 0).is_some());
    }
}
