use crate::hardware::MotorSpec;
use crate::{Axis, Steps};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AxisSettings {
    pub max_speed: f32,      // steps/s
    pub acceleration: f32,   // steps/s^2
    pub constant_speed: f32, // steps/s, used by `spin`
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            max_speed: 6000.0,
            acceleration: 100.0,
            constant_speed: 200.0,
        }
    }
}

/// What to do with a numeric command parameter that does not parse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum NumberPolicy {
    /// Use `0.0` and log a warning.
    #[default]
    Lenient,
    /// Reject the command.
    Strict,
}

/// What to do with a percentage outside 0..=100 in a motion message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PercentPolicy {
    #[default]
    Clamp,
    Reject,
    PassThrough,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CalibrationSettings {
    pub max_speed: f32,
    pub acceleration: f32,
    /// Relative move reissued every poll while seeking a limit.
    pub seek_steps: Steps,
    /// Distance moved off the first limit before seeking the second.
    pub backoff_steps: Steps,
    /// Steps allowed in a single phase before giving up.
    pub max_phase_steps: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            max_speed: 1000.0,
            acceleration: 500.0,
            seek_steps: 1000,
            backoff_steps: 100,
            max_phase_steps: 64_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineSettings {
    pub axes: [AxisSettings; 3],
    pub motor: MotorSpec,
    /// Steps corresponding to 100% in a motion message.
    pub full_scale_steps: Steps,
    pub numbers: NumberPolicy,
    pub percents: PercentPolicy,
    pub calibration: CalibrationSettings,
    /// Axis the text commands act on.
    pub command_axis: Axis,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            axes: [AxisSettings::default(); 3],
            motor: MotorSpec::NEMA17,
            full_scale_steps: 3200,
            numbers: NumberPolicy::default(),
            percents: PercentPolicy::default(),
            calibration: CalibrationSettings::default(),
            command_axis: Axis::X,
        }
    }
}
