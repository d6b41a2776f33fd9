use embassy_time::Instant;

use crate::calibration::{Calibration, CalibrationStatus};
use crate::config::{AxisSettings, MachineSettings};
use crate::error::{CommandError, MessageError, MotionError};
use crate::hardware::{LimitInput, LimitSwitch, StepOutput};
use crate::motion::{MessageDecoder, MotionMessage};
use crate::receiver::{Interpreter, Response};
use crate::stepper::AxisEngine;
use crate::{Axis, Steps};

/// Owns the three axis engines and everything that mutates them.
///
/// The poll loop feeds it lines and calls [`MotionSystem::tick`] as often as
/// it can.
pub struct MotionSystem {
    axes: [AxisEngine; 3],
    settings: MachineSettings,
    interpreter: Interpreter,
    decoder: MessageDecoder,
    calibration: Option<Calibration>,
}

impl MotionSystem {
    pub fn new(settings: MachineSettings) -> Result<MotionSystem, MotionError> {
        let axes = [
            AxisEngine::new(&settings.axes[0])?,
            AxisEngine::new(&settings.axes[1])?,
            AxisEngine::new(&settings.axes[2])?,
        ];

        let calibration = settings.calibration;
        AxisEngine::new(&AxisSettings {
            max_speed: calibration.max_speed,
            acceleration: calibration.acceleration,
            ..AxisSettings::default()
        })?;

        Ok(MotionSystem {
            axes,
            interpreter: Interpreter::new(settings.motor, settings.numbers),
            decoder: MessageDecoder::new(settings.full_scale_steps, settings.percents),
            settings,
            calibration: None,
        })
    }

    pub fn axis(&self, axis: Axis) -> &AxisEngine {
        &self.axes[axis.index()]
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisEngine {
        &mut self.axes[axis.index()]
    }

    pub fn positions(&self) -> [Steps; 3] {
        self.axes.each_ref().map(AxisEngine::current_position)
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    /// Runs one text command against the command axis.
    pub fn handle_command(&mut self, line: &str) -> Response {
        let axis = self.settings.command_axis;
        if self.calibrating(axis) {
            return Response::Rejected(CommandError::Busy);
        }

        self.interpreter.handle_line(line, &mut self.axes[axis.index()])
    }

    pub fn decode(&self, line: &str) -> Result<MotionMessage, MessageError> {
        self.decoder.decode(line)
    }

    /// Retargets all three axes from one message, or none of them.
    pub fn apply(&mut self, message: MotionMessage) -> Result<(), MessageError> {
        if self.calibration.is_some() {
            return Err(MessageError::Busy);
        }

        for axis in Axis::ALL {
            self.axes[axis.index()].move_to(message.target(axis));
        }
        Ok(())
    }

    pub fn handle_message(&mut self, line: &str) -> Result<[Steps; 3], MessageError> {
        let message = self.decode(line)?;
        let targets = message.targets();
        self.apply(message)?;
        Ok(targets)
    }

    pub fn start_calibration(
        &mut self,
        axis: Axis,
        limit_a: LimitSwitch,
        limit_b: LimitSwitch,
    ) -> Result<(), MotionError> {
        if let Some(mut previous) = self.calibration.take() {
            previous.abort(&mut self.axes[previous.axis().index()]);
            self.restore(&previous);
        }

        let calibration = Calibration::start(
            axis,
            &mut self.axes[axis.index()],
            self.settings.calibration,
            limit_a,
            limit_b,
        )?;
        self.calibration = Some(calibration);
        Ok(())
    }

    pub fn abort_calibration(&mut self) -> Option<CalibrationStatus> {
        let mut calibration = self.calibration.take()?;
        let axis = calibration.axis();
        calibration.abort(&mut self.axes[axis.index()]);
        self.restore(&calibration);
        Some(calibration.status())
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    fn calibrating(&self, axis: Axis) -> bool {
        self.calibration.as_ref().is_some_and(|c| c.axis() == axis)
    }

    /// One pass of the poll loop: advances calibration, then ticks every
    /// other axis. Returns the calibration result on the pass it finishes.
    pub fn tick<H: StepOutput + LimitInput>(
        &mut self,
        hw: &mut H,
        now: Instant,
    ) -> Option<CalibrationStatus> {
        let mut finished = None;

        if let Some(calibration) = self.calibration.as_mut() {
            let axis = calibration.axis();
            let status = calibration.poll(&mut self.axes[axis.index()], hw, now);
            if !matches!(status, CalibrationStatus::InProgress(_)) {
                finished = Some(status);
            }
        }

        let calibrating = self.calibration.as_ref().map(Calibration::axis);
        for axis in Axis::ALL {
            if calibrating == Some(axis) {
                continue;
            }
            if let Some(direction) = self.axes[axis.index()].tick(now) {
                hw.step(axis, direction);
            }
        }

        let status = finished?;
        if let Some(calibration) = self.calibration.take() {
            self.restore(&calibration);
        }
        Some(status)
    }

    /// Puts an axis back on the settings it had before the sweep. A moving
    /// axis is stopped again so the ramp-down uses the restored acceleration.
    fn restore(&mut self, calibration: &Calibration) {
        let axis = calibration.axis();
        let engine = &mut self.axes[axis.index()];

        if let Err(err) = engine.configure(&calibration.saved_settings()) {
            log::error!("{:?}: could not restore settings: {}", axis, err);
        }
        if engine.is_running() {
            engine.stop();
        }
    }
}
