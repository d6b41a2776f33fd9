use libm::round;

use crate::config::PercentPolicy;
use crate::error::MessageError;
use crate::{Axis, Steps};

/// Absolute targets for all three axes decoded from one `x,y,z` message.
///
/// Not `Copy`: it is handed to the motion system by value and applied once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionMessage {
    targets: [Steps; 3],
}

impl MotionMessage {
    pub fn new(targets: [Steps; 3]) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> [Steps; 3] {
        self.targets
    }

    pub fn target(&self, axis: Axis) -> Steps {
        self.targets[axis.index()]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MessageDecoder {
    full_scale_steps: Steps,
    percents: PercentPolicy,
}

impl MessageDecoder {
    pub fn new(full_scale_steps: Steps, percents: PercentPolicy) -> Self {
        Self {
            full_scale_steps,
            percents,
        }
    }

    pub fn full_scale_steps(&self) -> Steps {
        self.full_scale_steps
    }

    /// Decodes `"<x>,<y>,<z>"` percentages. Either all three fields decode or
    /// the whole message is rejected.
    pub fn decode(&self, line: &str) -> Result<MotionMessage, MessageError> {
        let mut fields = line.trim().split(',');
        let mut targets = [0; 3];

        for (index, target) in targets.iter_mut().enumerate() {
            let field = fields.next().ok_or(MessageError::FieldCount(index))?;
            let percent = field
                .trim()
                .parse::<i32>()
                .map_err(|_| MessageError::InvalidField { index })?;

            *target = self.to_steps(self.check(index, percent)?);
        }

        let extra = fields.count();
        if extra > 0 {
            return Err(MessageError::FieldCount(3 + extra));
        }

        log::info!("new targets {:?}", targets);
        Ok(MotionMessage { targets })
    }

    fn check(&self, index: usize, percent: i32) -> Result<i32, MessageError> {
        if (0..=100).contains(&percent) {
            return Ok(percent);
        }

        match self.percents {
            PercentPolicy::Clamp => {
                log::warn!("field {} clamped from {}%", index, percent);
                Ok(percent.clamp(0, 100))
            }
            PercentPolicy::Reject => Err(MessageError::OutOfRange {
                index,
                value: percent,
            }),
            PercentPolicy::PassThrough => Ok(percent),
        }
    }

    fn to_steps(&self, percent: i32) -> Steps {
        round(percent as f64 / 100.0 * self.full_scale_steps as f64) as Steps
    }
}
