//! # Motor State Machines
//!
//! Top-level mode plus the calibration and CPM sub-machines. The numeric
//! codes are the values reported in the status frame.

/// Top-level motor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Idle,
    ResetFlexion,
    ResetExtension,
    Calibrate,
    Free,
    Cpm,
    CpmSequential,
    CpmSequentialReverse,
    CpmOnce,
}

impl MotorState {
    /// Any of the continuous-passive-motion modes.
    #[must_use]
    pub fn is_cpm(self) -> bool {
        matches!(
            self,
            Self::Cpm | Self::CpmSequential | Self::CpmSequentialReverse | Self::CpmOnce
        )
    }

    /// 3-bit code carried in the high bits of status byte 1.
    ///
    /// `CpmOnce` does not fit in three bits and is reported as `Cpm`.
    #[must_use]
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::ResetFlexion => 1,
            Self::ResetExtension => 2,
            Self::Calibrate => 3,
            Self::Free => 4,
            Self::Cpm | Self::CpmOnce => 5,
            Self::CpmSequential => 6,
            Self::CpmSequentialReverse => 7,
        }
    }
}

/// Calibration sub-machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    End,
    Start,
    ResetToExtension,
    ResetToFlexion,
    MeasureFlexionTime,
    VerifyByExtending,
}

/// CPM sub-machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpmState {
    #[default]
    End,
    Start,
    ResetToExtension,
    Pause,
    WaitAtFlexionEnd,
    LoopFlexion,
    WaitAtExtensionEnd,
    LoopExtension,
    SequentialFlexion,
    SequentialExtension,
}

impl CpmState {
    /// Code reported in the high nibble of status byte 3.
    #[must_use]
    pub fn wire_code(self) -> u8 {
        match self {
            Self::End => 0,
            Self::Start => 1,
            Self::ResetToExtension => 2,
            Self::Pause => 3,
            Self::WaitAtFlexionEnd => 4,
            Self::LoopFlexion => 5,
            Self::WaitAtExtensionEnd => 6,
            Self::LoopExtension => 7,
            Self::SequentialFlexion => 8,
            Self::SequentialExtension => 9,
        }
    }

    /// Sub-states that are part of a running cycle and may be paused.
    #[must_use]
    pub fn is_pausable(self) -> bool {
        !matches!(self, Self::End | Self::Pause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_state_codes_fit_three_bits() {
        for state in [
            MotorState::Idle,
            MotorState::ResetFlexion,
            MotorState::ResetExtension,
            MotorState::Calibrate,
            MotorState::Free,
            MotorState::Cpm,
            MotorState::CpmSequential,
            MotorState::CpmSequentialReverse,
            MotorState::CpmOnce,
        ] {
            assert!(state.wire_code() <= 0x07, "{:?} does not fit", state);
        }
        assert_eq!(MotorState::CpmOnce.wire_code(), MotorState::Cpm.wire_code());
    }

    #[test]
    fn test_is_cpm() {
        assert!(MotorState::Cpm.is_cpm());
        assert!(MotorState::CpmOnce.is_cpm());
        assert!(!MotorState::Free.is_cpm());
        assert!(!MotorState::Idle.is_cpm());
    }

    #[test]
    fn test_cpm_codes_fit_nibble() {
        assert_eq!(CpmState::Pause.wire_code(), 3);
        assert_eq!(CpmState::SequentialExtension.wire_code(), 9);
        assert!(CpmState::SequentialExtension.wire_code() <= 0x0F);
    }

    #[test]
    fn test_pausable() {
        assert!(CpmState::Start.is_pausable());
        assert!(CpmState::LoopFlexion.is_pausable());
        assert!(!CpmState::Pause.is_pausable());
        assert!(!CpmState::End.is_pausable());
    }
}
