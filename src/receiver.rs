use core::fmt;

use crate::Steps;
use crate::config::NumberPolicy;
use crate::error::{CommandError, MotionError};
use crate::hardware::MotorSpec;
use crate::stepper::AxisEngine;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
    SetSpeed(f32),        // "speed <v>"
    SetMaxSpeed(f32),     // "set speed <v>"
    SetAcceleration(f32), // "set accel <v>"
    MoveToAngle(f32),     // "move <degrees>"
    Spin,
    Stop,
    Query, // "where"
    Reset,
    Unknown,
}

impl Command {
    /// Parses one line of the text protocol. Longer prefixes are matched first
    /// so `set speed` is never read as `speed`.
    pub fn parse(line: &str, numbers: NumberPolicy) -> Result<Command, CommandError> {
        let line = line.trim_start().trim_end_matches(['\r', '\n']);

        let number = |text: &str| parse_number(text, numbers);

        let command = if let Some(arg) = line.strip_prefix("set speed ") {
            Command::SetMaxSpeed(number(arg)?)
        } else if let Some(arg) = line.strip_prefix("set accel ") {
            Command::SetAcceleration(number(arg)?)
        } else if let Some(arg) = line.strip_prefix("speed ") {
            Command::SetSpeed(number(arg)?)
        } else if let Some(arg) = line.strip_prefix("move ") {
            Command::MoveToAngle(number(arg)?)
        } else if line.starts_with("where") {
            Command::Query
        } else if line.starts_with("reset") {
            Command::Reset
        } else if line.starts_with("spin") {
            Command::Spin
        } else if line.starts_with("stop") {
            Command::Stop
        } else {
            Command::Unknown
        };

        log::debug!("parsed {:?} from {:?}", command, line);
        Ok(command)
    }
}

fn parse_number(text: &str, numbers: NumberPolicy) -> Result<f32, CommandError> {
    match text.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => match numbers {
            NumberPolicy::Lenient => {
                log::warn!("unparsable number {:?}, using 0", text);
                Ok(0.0)
            }
            NumberPolicy::Strict => Err(CommandError::UnparsableNumber),
        },
    }
}

/// Reply line for one command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Response {
    SpeedSet(f32),
    MaxSpeedSet(f32),
    AccelerationSet(f32),
    MovingTo { degrees: f32, target: Steps },
    Position(Steps),
    PositionReset,
    Spinning,
    Stopping,
    NotFound,
    Rejected(CommandError),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::SpeedSet(speed) => write!(f, "--Speed set to {speed:.2}"),
            Response::MaxSpeedSet(speed) => write!(f, "--New max speed set to {speed:.2}"),
            Response::AccelerationSet(accel) => {
                write!(f, "--New max acceleration set to {accel:.2}")
            }
            Response::MovingTo { degrees, .. } => write!(f, "Moving to {degrees:.2} degrees."),
            Response::Position(position) => write!(f, ">Current Position: {position}"),
            Response::PositionReset => f.write_str("--Position reset to 0."),
            Response::Spinning => f.write_str("Spinning"),
            Response::Stopping => f.write_str("--Stopping"),
            Response::NotFound => f.write_str("Command not found"),
            Response::Rejected(err) => write!(f, "!!{err}"),
        }
    }
}

/// Applies text commands to a single axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Interpreter {
    motor: MotorSpec,
    numbers: NumberPolicy,
}

impl Interpreter {
    pub fn new(motor: MotorSpec, numbers: NumberPolicy) -> Self {
        Self { motor, numbers }
    }

    pub fn motor(&self) -> &MotorSpec {
        &self.motor
    }

    pub fn handle_line(&self, line: &str, axis: &mut AxisEngine) -> Response {
        match Command::parse(line, self.numbers) {
            Ok(command) => self.execute(command, axis),
            Err(err) => Response::Rejected(err),
        }
    }

    pub fn execute(&self, command: Command, axis: &mut AxisEngine) -> Response {
        let result: Result<Response, MotionError> = match command {
            Command::SetSpeed(speed) => axis
                .set_speed(speed)
                .map(|()| Response::SpeedSet(axis.constant_speed())),
            Command::SetMaxSpeed(speed) => axis
                .set_max_speed(speed)
                .map(|()| Response::MaxSpeedSet(speed)),
            Command::SetAcceleration(accel) => axis
                .set_acceleration(accel)
                .map(|()| Response::AccelerationSet(accel)),
            Command::MoveToAngle(degrees) => {
                let target = self.motor.angle_to_steps(degrees);
                axis.move_to(target);
                Ok(Response::MovingTo { degrees, target })
            }
            Command::Query => Ok(Response::Position(axis.current_position())),
            Command::Reset => {
                axis.set_current_position(0);
                Ok(Response::PositionReset)
            }
            Command::Spin => {
                axis.spin();
                Ok(Response::Spinning)
            }
            Command::Stop => {
                axis.stop();
                Ok(Response::Stopping)
            }
            Command::Unknown => Ok(Response::NotFound),
        };

        result.unwrap_or_else(|err| Response::Rejected(err.into()))
    }
}
