//! # Finger Actuator
//!
//! One linear actuator of the orthosis. Position is not measured: it is
//! estimated by integrating drive time against the calibrated duration of a
//! full range of motion (`dt_full_rom`).

use super::driver::MotorDriver;
use super::{DEFAULT_LIMIT_EXTENSION, DEFAULT_LIMIT_FLEXION, TARGET_POS_MAX, TARGET_POS_MIN};
use crate::clock::Micros;
use crate::config::EndStopSignal;
use crate::signal::SampleBuffer;

/// Drive direction of a finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Opening the hand, towards 0 %.
    Extending,
    /// Closing the hand, towards 100 %.
    Flexing,
    #[default]
    Stopped,
}

/// State of a single finger actuator.
#[derive(Debug, Clone)]
pub struct Actuator {
    index: usize,
    direction: Direction,
    current: SampleBuffer,

    /// Estimated position, percent of range of motion (0 = extended, 100 = flexed).
    pub position: f32,
    /// Desired end position of the current motion.
    pub target_position: u8,
    pub limit_extension: u8,
    pub limit_flexion: u8,
    pub is_moving: bool,
    pub is_flexing: bool,
    /// Smoothed current draw is above the threshold.
    pub has_current: bool,
    /// Excluded from the current mass operation.
    pub skip: bool,
}

impl Actuator {
    /// Create the actuator for finger `index` with default limits at 0 %.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            direction: Direction::Stopped,
            current: SampleBuffer::new(),
            position: 0.0,
            target_position: 0,
            limit_extension: DEFAULT_LIMIT_EXTENSION,
            limit_flexion: DEFAULT_LIMIT_FLEXION,
            is_moving: false,
            is_flexing: false,
            has_current: false,
            skip: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Set the bridge outputs for `direction`. Motion flags are left alone.
    pub fn drive<D: MotorDriver + ?Sized>(&mut self, driver: &mut D, direction: Direction) {
        self.direction = direction;
        driver.set_outputs(self.index, direction.into());
    }

    /// Start (or keep) moving towards flexion.
    pub fn flex<D: MotorDriver + ?Sized>(&mut self, driver: &mut D) {
        self.is_flexing = true;
        self.is_moving = true;
        self.drive(driver, Direction::Flexing);
    }

    /// Start (or keep) moving towards extension.
    pub fn extend<D: MotorDriver + ?Sized>(&mut self, driver: &mut D) {
        self.is_flexing = false;
        self.is_moving = true;
        self.drive(driver, Direction::Extending);
    }

    /// Stop the motor and clear `is_moving`.
    pub fn halt<D: MotorDriver + ?Sized>(&mut self, driver: &mut D) {
        self.is_moving = false;
        self.drive(driver, Direction::Stopped);
    }

    /// Feed one current sample and refresh `has_current` from the smoothed mean.
    pub fn observe_current(&mut self, sample: f32, threshold: f32) {
        self.current.update(sample);
        self.has_current = self.current.mean() > threshold;
    }

    /// Smoothed current draw.
    pub fn current_mean(&self) -> f32 {
        self.current.mean()
    }

    /// Whether the finger reports that it sits against a mechanical end.
    pub fn at_end_stop(&self, signal: EndStopSignal) -> bool {
        match signal {
            EndStopSignal::Stall => self.has_current,
            EndStopSignal::CurrentLoss => !self.has_current,
        }
    }

    /// Integrate `elapsed` microseconds of motion. No clamping here.
    pub fn advance_position(&mut self, elapsed: Micros, dt_full_rom: Micros) {
        if !self.is_moving || dt_full_rom == 0 {
            return;
        }
        let delta = (f64::from(elapsed) * 100.0 / f64::from(dt_full_rom)) as f32;
        if self.is_flexing {
            self.position += delta;
        } else {
            self.position -= delta;
        }
    }

    /// Pull the position estimate back into 0..=100.
    pub fn clamp_position(&mut self) {
        self.position = self
            .position
            .clamp(f32::from(TARGET_POS_MIN), f32::from(TARGET_POS_MAX));
    }

    /// Register a new target. `limited` additionally clamps it to the
    /// finger's extension/flexion window.
    pub fn set_target(&mut self, requested: u8, limited: bool) {
        let mut target = requested.clamp(TARGET_POS_MIN, TARGET_POS_MAX);
        if limited {
            target = target.clamp(self.limit_extension, self.limit_flexion);
        }
        self.target_position = target;
    }

    /// Freeze the finger where it is: position and target both snap to the
    /// whole percent below the estimate.
    pub fn hold_position(&mut self) {
        self.clamp_position();
        self.target_position = self.position as u8;
        self.position = f32::from(self.target_position);
    }

    /// Whether the estimate is within one percent of the target.
    pub fn at_target(&self) -> bool {
        (self.position - f32::from(self.target_position)).abs() < 1.0
    }

    /// Update the extension limit. Ignored unless it stays below the flexion limit.
    pub fn set_limit_extension(&mut self, value: u8) -> bool {
        let value = value.clamp(TARGET_POS_MIN, TARGET_POS_MAX);
        if value < self.limit_flexion {
            self.limit_extension = value;
            return true;
        }
        false
    }

    /// Update the flexion limit. Ignored unless it stays above the extension limit.
    pub fn set_limit_flexion(&mut self, value: u8) -> bool {
        let value = value.clamp(TARGET_POS_MIN, TARGET_POS_MAX);
        if value > self.limit_extension {
            self.limit_flexion = value;
            return true;
        }
        false
    }
}
