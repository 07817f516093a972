//! # Motor Driver Abstraction
//!
//! Each finger is driven by an H-bridge with two digital inputs. Driving IN1
//! high flexes the finger, IN2 high extends it, both low stops it. The
//! bridge's current-sense output is read over a shared ADC bus, one channel
//! per finger.
//!
//! [`MotorDriver`] hides the concrete pins and bus so the control logic can
//! run against real hardware, the [`SimulatedDriver`] or the
//! [`ScriptedDriver`].

use std::time::Instant;

use super::actuator::Direction;
use super::N_FINGERS;
use crate::config::EndStopSignal;

/// Output levels of one finger's two bridge inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeOutputs {
    pub in1: bool,
    pub in2: bool,
}

impl From<Direction> for BridgeOutputs {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Flexing => Self { in1: true, in2: false },
            Direction::Extending => Self { in1: false, in2: true },
            Direction::Stopped => Self { in1: false, in2: false },
        }
    }
}

/// Hardware access used by the motor controller.
pub trait MotorDriver: Send {
    /// Set the two control outputs of `finger`.
    fn set_outputs(&mut self, finger: usize, outputs: BridgeOutputs);

    /// Read one current-draw sample per finger (ADC units, already scaled).
    fn sample_currents(&mut self) -> [f32; N_FINGERS];
}

/// Current reported by a simulated motor that runs freely.
const SIM_RUNNING_CURRENT: f32 = 4.0;

/// Current reported by a simulated motor pushing against an end-stop.
const SIM_STALL_CURRENT: f32 = 40.0;

/// Actuator simulator for running without hardware.
///
/// Integrates each finger's true travel from wall-clock time and produces the
/// end-stop current signature selected by `signal`: a surge on stall, or a
/// drop to zero where an end switch would cut the motor.
#[derive(Debug)]
pub struct SimulatedDriver {
    outputs: [BridgeOutputs; N_FINGERS],
    travel: [f32; N_FINGERS],
    full_rom_us: f32,
    signal: EndStopSignal,
    last_update: Instant,
}

impl SimulatedDriver {
    /// Create a simulator whose fingers start half flexed.
    pub fn new(full_rom_us: u32, signal: EndStopSignal) -> Self {
        Self {
            outputs: [BridgeOutputs::default(); N_FINGERS],
            travel: [50.0; N_FINGERS],
            full_rom_us: full_rom_us.max(1) as f32,
            signal,
            last_update: Instant::now(),
        }
    }

    /// True finger travel in percent, as the hardware would physically be.
    pub fn travel(&self) -> [f32; N_FINGERS] {
        self.travel
    }

    fn integrate(&mut self) {
        let now = Instant::now();
        let dt_us = now.duration_since(self.last_update).as_micros() as f32;
        self.last_update = now;

        let step = dt_us * 100.0 / self.full_rom_us;
        for (travel, outputs) in self.travel.iter_mut().zip(self.outputs.iter()) {
            match (outputs.in1, outputs.in2) {
                (true, false) => *travel = (*travel + step).min(100.0),
                (false, true) => *travel = (*travel - step).max(0.0),
                _ => {}
            }
        }
    }

    fn finger_current(&self, finger: usize) -> f32 {
        let outputs = self.outputs[finger];
        let travel = self.travel[finger];
        let pushing_end = (outputs.in1 && travel >= 100.0) || (outputs.in2 && travel <= 0.0);
        let driven = outputs.in1 != outputs.in2;

        match self.signal {
            EndStopSignal::Stall if pushing_end => SIM_STALL_CURRENT,
            EndStopSignal::Stall if driven => SIM_RUNNING_CURRENT,
            EndStopSignal::CurrentLoss if driven && !pushing_end => SIM_STALL_CURRENT,
            _ => 0.0,
        }
    }
}

impl MotorDriver for SimulatedDriver {
    fn set_outputs(&mut self, finger: usize, outputs: BridgeOutputs) {
        self.integrate();
        self.outputs[finger] = outputs;
    }

    fn sample_currents(&mut self) -> [f32; N_FINGERS] {
        self.integrate();
        std::array::from_fn(|finger| self.finger_current(finger))
    }
}

/// Deterministic driver with scripted current draw.
///
/// Records every output change and returns whatever `currents` holds, which
/// makes the controller reproducible in tests and bench runs.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDriver {
    pub outputs: [BridgeOutputs; N_FINGERS],
    pub currents: [f32; N_FINGERS],
    pub history: Vec<(usize, BridgeOutputs)>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_all_currents(&mut self, value: f32) {
        self.currents = [value; N_FINGERS];
    }

    pub fn any_output_active(&self) -> bool {
        self.outputs.iter().any(|o| o.in1 || o.in2)
    }
}

impl MotorDriver for ScriptedDriver {
    fn set_outputs(&mut self, finger: usize, outputs: BridgeOutputs) {
        self.outputs[finger] = outputs;
        self.history.push((finger, outputs));
    }

    fn sample_currents(&mut self) -> [f32; N_FINGERS] {
        self.currents
    }
}
