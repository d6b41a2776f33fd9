mod stepper;

pub use stepper::{MotorSpec, SteppingMode};

use crate::{Axis, Steps};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub const fn from_sign(value: Steps) -> Option<Direction> {
        if value > 0 {
            Some(Direction::Forward)
        } else if value < 0 {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    pub const fn sign(self) -> Steps {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Identifies one limit switch on the board.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LimitSwitch(pub u8);

/// Sink for the step events produced by the motion core.
///
/// Implementations turn each call into one STEP pulse with DIR set to
/// `direction`. Called at most once per axis per tick.
pub trait StepOutput {
    fn step(&mut self, axis: Axis, direction: Direction);
}

pub trait LimitInput {
    fn is_triggered(&self, switch: LimitSwitch) -> bool;
}

impl<T: StepOutput + ?Sized> StepOutput for &mut T {
    fn step(&mut self, axis: Axis, direction: Direction) {
        (**self).step(axis, direction)
    }
}

impl<T: LimitInput + ?Sized> LimitInput for &mut T {
    fn is_triggered(&self, switch: LimitSwitch) -> bool {
        (**self).is_triggered(switch)
    }
}
