pub use crate::calibration::{Calibration, CalibrationPhase, CalibrationStatus};
pub use crate::config::{
    AxisSettings, CalibrationSettings, MachineSettings, NumberPolicy, PercentPolicy,
};
pub use crate::error::{CalibrationError, CommandError, MessageError, MotionError};
pub use crate::hardware::{Direction, LimitInput, LimitSwitch, MotorSpec, StepOutput, SteppingMode};
pub use crate::motion::{MessageDecoder, MotionMessage};
pub use crate::receiver::{Command, Interpreter, Response};
pub use crate::serialport::{Line, LineBuffer};
pub use crate::stepper::{AxisEngine, Mode};
pub use crate::systems::motion_system::MotionSystem;
pub use crate::{Axis, Steps};

pub use embassy_time::{Duration, Instant};
