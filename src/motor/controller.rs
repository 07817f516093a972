//! # Motor Controller
//!
//! Owns the five [`Actuator`]s and runs the top-level state machine together
//! with the calibration and CPM sub-machines.
//!
//! Commands (`reset_to_extension`, `move_to`, `start_cpm`, ...) only set up
//! state; all motion happens in [`MotorController::tick`], which the control
//! loop calls once per period (20 ms by default).
//!
//! ## Timers
//!
//! Two stopwatches on the wrapping microsecond counter:
//!
//! - the primary timer measures reset timeouts, end-stop debounce, the
//!   calibration travel time and CPM dwell, and is the integration reference
//!   for position estimates while fingers move
//! - the stagger timer only gates when each finger may start in sequential CPM
//!
//! ## End-stop detection
//!
//! Positions are estimated, not measured, so the mechanical ends are found
//! from current draw: a reset finishes when every driven finger reports its
//! end-stop (after a debounce window) or when the reset timeout expires.

use tracing::{debug, info, warn};

use super::actuator::{Actuator, Direction};
use super::driver::MotorDriver;
use super::state::{CalibrationState, CpmState, MotorState};
use super::{KEY_DT_FULL_ROM, N_FINGERS, TARGET_POS_MAX, TARGET_POS_MIN};
use crate::clock::{Micros, Timer};
use crate::config::EndStopSignal;
use crate::protocol::frame::{FingerStatus, MotorStatus, SettingReport};
use crate::storage::SettingStore;

/// Countdown used while no timed phase is active.
const MIN_RESPONSE_TIME: Micros = 1_000;

/// Tunable timing and sensing constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorParams {
    /// Maximum duration of a reset drive.
    pub reset_timeout_us: Micros,
    /// Reset end-stop checks start after this delay.
    pub reset_debounce_us: Micros,
    /// Calibration end-stop checks start after this delay.
    pub calibration_debounce_us: Micros,
    /// Full range-of-motion duration used until one is calibrated.
    pub default_dt_full_rom_us: Micros,
    /// Initial dwell at both ends of a CPM cycle.
    pub cpm_wait_us: Micros,
    /// Start offset between consecutive fingers in sequential CPM.
    pub sequential_stagger_us: Micros,
    /// Smoothed current above which a finger `has_current`.
    pub current_threshold: f32,
    pub end_stop_signal: EndStopSignal,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            reset_timeout_us: 3_000_000,
            reset_debounce_us: 500_000,
            calibration_debounce_us: 1_000_000,
            default_dt_full_rom_us: 2_340_000,
            cpm_wait_us: 1_000_000,
            sequential_stagger_us: 500_000,
            current_threshold: 10.0,
            end_stop_signal: EndStopSignal::Stall,
        }
    }
}

/// CPM flavours selectable over the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpmMode {
    /// All fingers move together.
    Simultaneous,
    /// One finger after another, starting from the little finger.
    Sequential,
    /// One finger after another, starting from the thumb.
    SequentialReverse,
}

/// Coordinator of the five finger actuators.
pub struct MotorController<D: MotorDriver> {
    driver: D,
    store: Box<dyn SettingStore>,
    params: MotorParams,
    fingers: [Actuator; N_FINGERS],

    state: MotorState,
    calibration_state: CalibrationState,
    cpm_state: CpmState,
    cpm_state_prev: CpmState,

    rep_to_go: i8,
    dt_full_rom: Micros,
    dt_wait_flex: Micros,
    dt_wait_ext: Micros,
    is_cpm_sequential: bool,
    is_cpm_from_proximal_end: bool,

    timer: Timer,
    stagger_timer: Timer,
    countdown: Micros,
}

impl<D: MotorDriver> MotorController<D> {
    /// Create the controller, loading the persisted full-ROM duration.
    pub fn new(driver: D, store: Box<dyn SettingStore>, params: MotorParams, now: Micros) -> Self {
        let dt_full_rom = match store.load_u32(KEY_DT_FULL_ROM) {
            Ok(Some(value)) if value > 0 => value,
            Ok(_) => params.default_dt_full_rom_us,
            Err(e) => {
                warn!("Failed to load {}: {}, using default", KEY_DT_FULL_ROM, e);
                params.default_dt_full_rom_us
            }
        };
        info!("Full ROM duration: {} us", dt_full_rom);

        Self {
            driver,
            store,
            params,
            fingers: std::array::from_fn(Actuator::new),
            state: MotorState::Idle,
            calibration_state: CalibrationState::End,
            cpm_state: CpmState::End,
            cpm_state_prev: CpmState::End,
            rep_to_go: 0,
            dt_full_rom,
            dt_wait_flex: params.cpm_wait_us,
            dt_wait_ext: params.cpm_wait_us,
            is_cpm_sequential: false,
            is_cpm_from_proximal_end: false,
            timer: Timer::started_at(now),
            stagger_timer: Timer::started_at(now),
            countdown: MIN_RESPONSE_TIME,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration_state
    }

    pub fn cpm_state(&self) -> CpmState {
        self.cpm_state
    }

    pub fn cpm_state_prev(&self) -> CpmState {
        self.cpm_state_prev
    }

    pub fn rep_to_go(&self) -> i8 {
        self.rep_to_go
    }

    pub fn dt_full_rom(&self) -> Micros {
        self.dt_full_rom
    }

    pub fn dt_wait_flex(&self) -> Micros {
        self.dt_wait_flex
    }

    pub fn dt_wait_ext(&self) -> Micros {
        self.dt_wait_ext
    }

    pub fn is_cpm_sequential(&self) -> bool {
        self.is_cpm_sequential
    }

    pub fn is_cpm_from_proximal_end(&self) -> bool {
        self.is_cpm_from_proximal_end
    }

    pub fn params(&self) -> &MotorParams {
        &self.params
    }

    pub fn fingers(&self) -> &[Actuator; N_FINGERS] {
        &self.fingers
    }

    pub fn finger(&self, index: usize) -> &Actuator {
        &self.fingers[index]
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Snapshot for the status frame.
    pub fn status(&self) -> MotorStatus {
        MotorStatus {
            state: self.state.wire_code(),
            cpm_state: self.cpm_state.wire_code(),
            fingers: std::array::from_fn(|i| {
                let f = &self.fingers[i];
                FingerStatus {
                    is_moving: f.is_moving,
                    is_flexing: f.is_flexing,
                    position: f.position.clamp(0.0, f32::from(TARGET_POS_MAX)) as u8,
                    has_current: f.has_current,
                }
            }),
        }
    }

    /// Snapshot for the setting frame.
    pub fn settings(&self) -> SettingReport {
        SettingReport {
            limit_extension: std::array::from_fn(|i| self.fingers[i].limit_extension),
            limit_flexion: std::array::from_fn(|i| self.fingers[i].limit_flexion),
            dt_full_rom: self.dt_full_rom,
            dt_wait_ext: self.dt_wait_ext,
            dt_wait_flex: self.dt_wait_flex,
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Exclude the fingers whose bit is set in `mask` (bit 0 = finger 0).
    pub fn set_skip_mask(&mut self, mask: u8) {
        for (i, finger) in self.fingers.iter_mut().enumerate() {
            finger.skip = mask & (1 << i) != 0;
        }
    }

    pub fn reset_skips(&mut self) {
        for finger in self.fingers.iter_mut() {
            finger.skip = false;
        }
    }

    /// Drive every non-skipped finger to full extension.
    pub fn reset_to_extension(&mut self, now: Micros) {
        self.drive_all(Direction::Extending, now);
        self.state = MotorState::ResetExtension;
        info!("Motors are moving to full extension");
    }

    /// Drive every non-skipped finger to full flexion.
    pub fn reset_to_flexion(&mut self, now: Micros) {
        self.drive_all(Direction::Flexing, now);
        self.state = MotorState::ResetFlexion;
        info!("Motors are moving to full flexion");
    }

    /// Start the full range-of-motion calibration.
    pub fn calibrate(&mut self) {
        self.state = MotorState::Calibrate;
        self.calibration_state = CalibrationState::Start;
        info!("Calibration started");
    }

    /// Move each finger to its target; `limited` applies the finger's limit window.
    ///
    /// Fingers still running from an earlier activity are stopped where they
    /// are first, so each one heads for its new target from a standstill.
    pub fn move_to(&mut self, targets: [u8; N_FINGERS], limited: [bool; N_FINGERS], now: Micros) {
        self.settle(now);
        for ((finger, target), limit) in self.fingers.iter_mut().zip(targets).zip(limited) {
            if finger.is_moving {
                finger.halt(&mut self.driver);
                finger.clamp_position();
            }
            finger.set_target(target, limit);
        }
        self.state = MotorState::Free;
        debug!("Free move to {:?} (limited {:?})", targets, limited);
    }

    /// Start indefinite CPM with the fingers in `skip_mask` excluded.
    pub fn start_cpm(&mut self, mode: CpmMode, skip_mask: u8) {
        self.set_skip_mask(skip_mask);
        self.rep_to_go = -1;
        self.cpm_state = CpmState::Start;
        self.cpm_state_prev = CpmState::End;
        let (state, sequential, from_proximal) = match mode {
            CpmMode::Simultaneous => (MotorState::Cpm, false, false),
            CpmMode::Sequential => (MotorState::CpmSequential, true, false),
            CpmMode::SequentialReverse => (MotorState::CpmSequentialReverse, true, true),
        };
        self.state = state;
        self.is_cpm_sequential = sequential;
        self.is_cpm_from_proximal_end = from_proximal;
        info!("CPM started ({:?}, skip mask 0x{:02X})", mode, skip_mask);
    }

    /// Run exactly one simultaneous CPM cycle.
    pub fn start_cpm_once(&mut self) {
        self.rep_to_go = 1;
        self.cpm_state = CpmState::Start;
        self.cpm_state_prev = CpmState::End;
        self.state = MotorState::CpmOnce;
        self.is_cpm_sequential = false;
        self.is_cpm_from_proximal_end = false;
        info!("Single CPM cycle started");
    }

    /// Pause a running CPM cycle. Returns whether the pause took effect.
    pub fn pause_cpm(&mut self, now: Micros) -> bool {
        if !self.state.is_cpm() || !self.cpm_state.is_pausable() {
            return false;
        }
        self.settle(now);
        for finger in self.fingers.iter_mut() {
            finger.halt(&mut self.driver);
            finger.clamp_position();
        }
        // a reset interrupted half way is re-issued from the start
        self.cpm_state_prev = match self.cpm_state {
            CpmState::Start | CpmState::ResetToExtension => CpmState::Start,
            other => other,
        };
        self.cpm_state = CpmState::Pause;
        info!("CPM paused in {:?}", self.cpm_state_prev);
        true
    }

    /// Resume a paused CPM cycle. Returns whether a pause was lifted.
    pub fn resume_cpm(&mut self) -> bool {
        if !self.state.is_cpm() || self.cpm_state != CpmState::Pause {
            return false;
        }
        self.cpm_state = self.cpm_state_prev;
        self.cpm_state_prev = CpmState::End;
        info!("CPM resumed in {:?}", self.cpm_state);
        true
    }

    /// Stop everything and return to idle, freezing targets at the current positions.
    pub fn stop(&mut self, now: Micros) {
        self.settle(now);
        self.mass_stop();
        self.reset_states();
        self.reset_skips();
        info!("Motors stopped");
    }

    /// Set the extension limit of every finger; invalid values are ignored per finger.
    pub fn set_limits_extension(&mut self, limits: [u8; N_FINGERS]) {
        for (finger, value) in self.fingers.iter_mut().zip(limits) {
            if !finger.set_limit_extension(value) {
                debug!("Ignored extension limit {} for finger {}", value, finger.index());
            }
        }
    }

    /// Set the flexion limit of every finger; invalid values are ignored per finger.
    pub fn set_limits_flexion(&mut self, limits: [u8; N_FINGERS]) {
        for (finger, value) in self.fingers.iter_mut().zip(limits) {
            if !finger.set_limit_flexion(value) {
                debug!("Ignored flexion limit {} for finger {}", value, finger.index());
            }
        }
    }

    pub fn set_dt_wait_flex(&mut self, value: Micros) {
        self.dt_wait_flex = value;
    }

    pub fn set_dt_wait_ext(&mut self, value: Micros) {
        self.dt_wait_ext = value;
    }

    // ---------------------------------------------------------------------
    // Periodic tick
    // ---------------------------------------------------------------------

    /// Sample current draw and advance whatever state is active.
    pub fn tick(&mut self, now: Micros) {
        let samples = self.driver.sample_currents();
        for (finger, sample) in self.fingers.iter_mut().zip(samples) {
            finger.observe_current(sample, self.params.current_threshold);
        }

        match self.state {
            MotorState::Idle => {}
            MotorState::ResetFlexion => self.loop_reset(now, TARGET_POS_MAX),
            MotorState::ResetExtension => self.loop_reset(now, TARGET_POS_MIN),
            MotorState::Calibrate => self.loop_calibration(now),
            MotorState::Free => self.loop_free(now),
            MotorState::Cpm
            | MotorState::CpmSequential
            | MotorState::CpmSequentialReverse
            | MotorState::CpmOnce => self.loop_cpm(now),
        }
    }

    fn loop_reset(&mut self, now: Micros, extreme: u8) {
        if !self.reset_finished(now) {
            return;
        }

        self.mass_stop();
        self.snap_unskipped(extreme);
        self.countdown = MIN_RESPONSE_TIME;
        self.reset_skips();
        self.reset_states();
        info!("Motors reset completed");
    }

    fn loop_calibration(&mut self, now: Micros) {
        match self.calibration_state {
            CalibrationState::Start => {
                self.drive_all(Direction::Extending, now);
                self.calibration_state = CalibrationState::ResetToExtension;
            }

            CalibrationState::ResetToExtension => {
                if !self.reset_finished(now) {
                    return;
                }
                self.mass_stop();
                self.snap_unskipped(TARGET_POS_MIN);
                self.calibration_state = CalibrationState::ResetToFlexion;
            }

            CalibrationState::ResetToFlexion => {
                // the travel time is measured from here
                self.drive_all(Direction::Flexing, now);
                self.calibration_state = CalibrationState::MeasureFlexionTime;
            }

            CalibrationState::MeasureFlexionTime => {
                if self.timer.check(now, self.countdown) {
                    warn!("Calibration timed out without reaching an end-stop");
                    self.mass_stop();
                    self.calibration_state = CalibrationState::End;
                    return;
                }

                let elapsed = self.timer.elapsed(now);
                if elapsed <= self.params.calibration_debounce_us {
                    return;
                }
                let signal = self.params.end_stop_signal;
                if self.fingers.iter().any(|f| !f.skip && f.at_end_stop(signal)) {
                    self.mass_stop();
                    self.record_full_rom(elapsed);
                    self.calibration_state = CalibrationState::VerifyByExtending;
                }
            }

            CalibrationState::VerifyByExtending => {
                for finger in self.fingers.iter_mut() {
                    finger.position = f32::from(TARGET_POS_MAX);
                }
                self.move_to([TARGET_POS_MIN; N_FINGERS], [false; N_FINGERS], now);
                self.calibration_state = CalibrationState::End;
            }

            CalibrationState::End => {
                self.reset_states();
                self.reset_skips();
            }
        }
    }

    fn loop_free(&mut self, now: Micros) {
        self.settle(now);

        let mut any_moving = false;
        for finger in self.fingers.iter_mut() {
            let target = f32::from(finger.target_position);
            // a long tick can carry the estimate across the target window
            let overshot = finger.is_moving
                && if finger.is_flexing {
                    finger.position >= target
                } else {
                    finger.position <= target
                };

            if overshot {
                finger.halt(&mut self.driver);
                finger.position = target;
            } else if finger.at_target() {
                finger.halt(&mut self.driver);
                finger.clamp_position();
            } else if finger.position < f32::from(finger.target_position) {
                finger.flex(&mut self.driver);
                any_moving = true;
            } else {
                finger.extend(&mut self.driver);
                any_moving = true;
            }
        }

        if !any_moving {
            self.reset_states();
            self.reset_skips();
            debug!("Free move completed");
        }
    }

    fn loop_cpm(&mut self, now: Micros) {
        match self.cpm_state {
            CpmState::Start => {
                self.drive_all(Direction::Extending, now);
                self.cpm_state = CpmState::ResetToExtension;
            }

            CpmState::ResetToExtension => {
                if !self.reset_finished(now) {
                    return;
                }
                self.mass_stop();
                self.snap_unskipped(TARGET_POS_MIN);
                self.enter_wait(CpmState::WaitAtFlexionEnd, self.dt_wait_flex, now);
            }

            CpmState::Pause => {
                self.timer.restart(now);
                self.stagger_timer.restart(now);
            }

            CpmState::WaitAtFlexionEnd => {
                if self.rep_to_go == 0 {
                    self.mass_stop();
                    self.reset_states();
                    self.reset_skips();
                    info!("CPM completed");
                    return;
                }
                if self.timer.check(now, self.countdown) {
                    self.set_all_targets(TARGET_POS_MAX);
                    self.cpm_state = if self.is_cpm_sequential {
                        CpmState::SequentialFlexion
                    } else {
                        CpmState::LoopFlexion
                    };
                    self.stagger_timer.restart(now);
                }
            }

            CpmState::LoopFlexion | CpmState::SequentialFlexion => {
                if self.drive_phase(Direction::Flexing, now) {
                    self.enter_wait(CpmState::WaitAtExtensionEnd, self.dt_wait_ext, now);
                }
            }

            CpmState::WaitAtExtensionEnd => {
                if self.timer.check(now, self.countdown) {
                    self.set_all_targets(TARGET_POS_MIN);
                    self.cpm_state = if self.is_cpm_sequential {
                        CpmState::SequentialExtension
                    } else {
                        CpmState::LoopExtension
                    };
                    self.stagger_timer.restart(now);
                }
            }

            CpmState::LoopExtension | CpmState::SequentialExtension => {
                if self.drive_phase(Direction::Extending, now) {
                    if self.rep_to_go > 0 {
                        self.rep_to_go -= 1;
                    }
                    debug!("CPM cycle completed, {} to go", self.rep_to_go);
                    self.enter_wait(CpmState::WaitAtFlexionEnd, self.dt_wait_flex, now);
                }
            }

            CpmState::End => {
                // running CPM mode without a sub-state: fall back to idle
                self.mass_stop();
                self.reset_states();
                self.reset_skips();
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn reset_states(&mut self) {
        self.state = MotorState::Idle;
        self.calibration_state = CalibrationState::End;
        self.cpm_state = CpmState::End;
    }

    /// Drive non-skipped fingers in `direction` and arm the reset timeout.
    fn drive_all(&mut self, direction: Direction, now: Micros) {
        for finger in self.fingers.iter_mut().filter(|f| !f.skip) {
            match direction {
                Direction::Flexing => finger.flex(&mut self.driver),
                Direction::Extending => finger.extend(&mut self.driver),
                Direction::Stopped => finger.halt(&mut self.driver),
            }
        }
        self.countdown = self.params.reset_timeout_us;
        self.timer.restart(now);
    }

    fn reset_finished(&mut self, now: Micros) -> bool {
        self.timer.check(now, self.countdown) || self.check_early_release(now)
    }

    /// Stop each driven finger that sits on its end-stop; `true` once all have.
    ///
    /// A finger halted on an earlier tick stays released even though its
    /// current has since fallen away.
    fn check_early_release(&mut self, now: Micros) -> bool {
        if self.timer.elapsed(now) <= self.params.reset_debounce_us {
            return false;
        }

        let signal = self.params.end_stop_signal;
        let mut all_released = true;
        for finger in self.fingers.iter_mut().filter(|f| !f.skip) {
            if !finger.is_moving || finger.at_end_stop(signal) {
                finger.halt(&mut self.driver);
            } else {
                all_released = false;
            }
        }
        all_released
    }

    fn mass_stop(&mut self) {
        for finger in self.fingers.iter_mut() {
            finger.halt(&mut self.driver);
            finger.hold_position();
        }
    }

    fn snap_unskipped(&mut self, extreme: u8) {
        for finger in self.fingers.iter_mut().filter(|f| !f.skip) {
            finger.position = f32::from(extreme);
            finger.target_position = extreme;
        }
    }

    /// Integrate motion since the last tick and restart the reference.
    fn settle(&mut self, now: Micros) {
        let elapsed = self.timer.elapsed(now);
        for finger in self.fingers.iter_mut() {
            finger.advance_position(elapsed, self.dt_full_rom);
        }
        self.timer.restart(now);
    }

    fn set_all_targets(&mut self, target: u8) {
        for finger in self.fingers.iter_mut() {
            finger.set_target(target, true);
        }
    }

    fn enter_wait(&mut self, wait_state: CpmState, dwell: Micros, now: Micros) {
        self.countdown = dwell;
        self.cpm_state = wait_state;
        self.timer.restart(now);
    }

    /// One tick of a CPM drive phase; `true` once no finger is moving.
    fn drive_phase(&mut self, direction: Direction, now: Micros) -> bool {
        self.settle(now);

        let stagger_elapsed = self.stagger_timer.elapsed(now);
        let mut any_moving = false;

        for rank in 0..N_FINGERS {
            let index = if self.is_cpm_sequential {
                if stagger_elapsed < self.params.sequential_stagger_us.saturating_mul(rank as u32) {
                    // not this finger's turn yet
                    any_moving = true;
                    continue;
                }
                if self.is_cpm_from_proximal_end {
                    rank
                } else {
                    N_FINGERS - 1 - rank
                }
            } else {
                rank
            };

            let finger = &mut self.fingers[index];
            if finger.skip {
                continue;
            }

            let target = f32::from(finger.target_position);
            let short_of_target = match direction {
                Direction::Flexing => finger.position < target,
                Direction::Extending => finger.position > target,
                Direction::Stopped => false,
            };

            if short_of_target {
                match direction {
                    Direction::Flexing => finger.flex(&mut self.driver),
                    _ => finger.extend(&mut self.driver),
                }
                any_moving = true;
            } else {
                finger.halt(&mut self.driver);
                finger.position = target;
            }
        }

        !any_moving
    }

    fn record_full_rom(&mut self, elapsed: Micros) {
        self.dt_full_rom = elapsed;
        if let Err(e) = self.store.save_u32(KEY_DT_FULL_ROM, elapsed) {
            warn!("Failed to persist {}: {}", KEY_DT_FULL_ROM, e);
        }
        info!("Calibrated full ROM time: {} us", elapsed);
    }
}

impl<D: MotorDriver> std::fmt::Debug for MotorController<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorController")
            .field("state", &self.state)
            .field("calibration_state", &self.calibration_state)
            .field("cpm_state", &self.cpm_state)
            .field("rep_to_go", &self.rep_to_go)
            .field("dt_full_rom", &self.dt_full_rom)
            .finish_non_exhaustive()
    }
}
