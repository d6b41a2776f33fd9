use thiserror::Error;

use crate::calibration::CalibrationPhase;

#[derive(Error, Debug, Copy, Clone, PartialEq)]
pub enum MotionError {
    #[error("invalid {name} ({value})")]
    InvalidParameter { name: &'static str, value: f32 },
}

#[derive(Error, Debug, Copy, Clone, PartialEq)]
pub enum CommandError {
    #[error("unparsable number")]
    UnparsableNumber,
    #[error(transparent)]
    Motion(#[from] MotionError),
    #[error("calibration in progress")]
    Busy,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("field {index} is not a base-10 integer")]
    InvalidField { index: usize },
    #[error("field {index} out of range ({value}%)")]
    OutOfRange { index: usize, value: i32 },
    #[error("calibration in progress")]
    Busy,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("{phase:?} exceeded {limit} steps without reaching a limit")]
    Timeout {
        phase: CalibrationPhase,
        limit: u32,
    },
    #[error("calibration aborted during {0:?}")]
    Aborted(CalibrationPhase),
}
