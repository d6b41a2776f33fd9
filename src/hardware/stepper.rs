use libm::roundf;

use crate::Steps;
use crate::error::MotionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SteppingMode {
    FullStep,
    HalfStep,
    QuarterStep,
    EighthStep,
    SixteenthStep,
}

impl SteppingMode {
    /// Microsteps per full step.
    pub const fn divisor(self) -> u32 {
        match self {
            SteppingMode::FullStep => 1,
            SteppingMode::HalfStep => 2,
            SteppingMode::QuarterStep => 4,
            SteppingMode::EighthStep => 8,
            SteppingMode::SixteenthStep => 16,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotorSpec {
    step_angle: f32, // degrees per full step
    stepping_mode: SteppingMode,
}

impl MotorSpec {
    /// 1.8°/step driven at 1/16 microstepping.
    pub const NEMA17: MotorSpec = MotorSpec {
        step_angle: 1.8,
        stepping_mode: SteppingMode::SixteenthStep,
    };

    pub const NEMA14: MotorSpec = MotorSpec {
        step_angle: 1.8,
        stepping_mode: SteppingMode::FullStep,
    };

    pub fn new(step_angle: f32, stepping_mode: SteppingMode) -> Result<Self, MotionError> {
        if !(step_angle > 0.0) || !step_angle.is_finite() {
            return Err(MotionError::InvalidParameter {
                name: "step angle",
                value: step_angle,
            });
        }

        Ok(MotorSpec {
            step_angle,
            stepping_mode,
        })
    }

    pub fn step_angle(&self) -> f32 {
        self.step_angle
    }

    pub fn stepping_mode(&self) -> SteppingMode {
        self.stepping_mode
    }

    pub fn steps_per_revolution(&self) -> f32 {
        self.stepping_mode.divisor() as f32 * 360.0 / self.step_angle
    }

    pub fn angle_to_steps(&self, degrees: f32) -> Steps {
        roundf(degrees / 360.0 * self.steps_per_revolution()) as Steps
    }
}

impl Default for MotorSpec {
    fn default() -> Self {
        MotorSpec::NEMA17
    }
}
