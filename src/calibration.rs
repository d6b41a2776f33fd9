//! Two-limit homing sweep for a single axis.
//!
//! The sweep drives toward limit A until it trips, zeroes there, backs off a
//! few steps, then drives toward limit B to measure the travel. It advances by
//! at most one engine tick per [`Calibration::poll`], so it runs alongside the
//! other axes instead of blocking the loop.

use embassy_time::Instant;

use crate::config::{AxisSettings, CalibrationSettings};
use crate::error::{CalibrationError, MotionError};
use crate::hardware::{LimitInput, LimitSwitch, StepOutput};
use crate::stepper::AxisEngine;
use crate::{Axis, Steps};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CalibrationPhase {
    SeekLimitA,
    BackOff,
    SeekLimitB,
    Done,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CalibrationStatus {
    InProgress(CalibrationPhase),
    /// Travel between the limits, measured from the first one. The axis has
    /// been re-zeroed at the second limit.
    Complete { max_position: Steps },
    Failed(CalibrationError),
}

#[derive(Debug, Clone)]
pub struct Calibration {
    axis: Axis,
    phase: CalibrationPhase,
    limit_a: LimitSwitch,
    limit_b: LimitSwitch,
    settings: CalibrationSettings,
    /// Axis settings in force before the sweep.
    saved: AxisSettings,
    /// Steps taken since the current phase began.
    phase_steps: u32,
    outcome: Option<Result<Steps, CalibrationError>>,
}

impl Calibration {
    /// Begins a sweep of `axis`, switching `engine` to the calibration speed
    /// and acceleration. On error the engine is left untouched.
    pub fn start(
        axis: Axis,
        engine: &mut AxisEngine,
        settings: CalibrationSettings,
        limit_a: LimitSwitch,
        limit_b: LimitSwitch,
    ) -> Result<Self, MotionError> {
        let saved = engine.settings();
        engine.configure(&AxisSettings {
            max_speed: settings.max_speed,
            acceleration: settings.acceleration,
            ..saved
        })?;
        log::info!(
            "{:?}: calibrating between {:?} and {:?}",
            axis,
            limit_a,
            limit_b
        );

        Ok(Self {
            axis,
            phase: CalibrationPhase::SeekLimitA,
            limit_a,
            limit_b,
            settings,
            saved,
            phase_steps: 0,
            outcome: None,
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn saved_settings(&self) -> AxisSettings {
        self.saved
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn status(&self) -> CalibrationStatus {
        match self.outcome {
            None => CalibrationStatus::InProgress(self.phase),
            Some(Ok(max_position)) => CalibrationStatus::Complete { max_position },
            Some(Err(err)) => CalibrationStatus::Failed(err),
        }
    }

    pub fn poll<H: StepOutput + LimitInput>(
        &mut self,
        engine: &mut AxisEngine,
        hw: &mut H,
        now: Instant,
    ) -> CalibrationStatus {
        if self.is_finished() {
            return self.status();
        }

        match self.phase {
            CalibrationPhase::SeekLimitA => {
                if hw.is_triggered(self.limit_a) {
                    log::info!("{:?}: first limit reached", self.axis);
                    engine.stop();
                    engine.set_current_position(0);
                    engine.move_to(self.settings.backoff_steps);
                    self.enter(CalibrationPhase::BackOff);
                } else {
                    engine.move_by(-self.settings.seek_steps);
                    self.advance(engine, hw, now);
                }
            }
            CalibrationPhase::BackOff => {
                if engine.distance_to_go() == 0 {
                    self.enter(CalibrationPhase::SeekLimitB);
                } else {
                    self.advance(engine, hw, now);
                }
            }
            CalibrationPhase::SeekLimitB => {
                if hw.is_triggered(self.limit_b) {
                    engine.stop();
                    let max_position = engine.current_position();
                    engine.set_current_position(0);
                    log::info!(
                        "{:?}: second limit reached, max position {}",
                        self.axis,
                        max_position
                    );

                    self.enter(CalibrationPhase::Done);
                    self.outcome = Some(Ok(max_position));
                } else {
                    engine.move_by(self.settings.seek_steps);
                    self.advance(engine, hw, now);
                }
            }
            CalibrationPhase::Done => {}
        }

        self.status()
    }

    /// Ends the sweep early. The axis ramps down from wherever it is.
    pub fn abort(&mut self, engine: &mut AxisEngine) {
        if self.is_finished() {
            return;
        }

        log::warn!("{:?}: calibration aborted in {:?}", self.axis, self.phase);
        engine.stop();
        self.outcome = Some(Err(CalibrationError::Aborted(self.phase)));
    }

    fn enter(&mut self, phase: CalibrationPhase) {
        self.phase = phase;
        self.phase_steps = 0;
    }

    fn advance<H: StepOutput>(&mut self, engine: &mut AxisEngine, hw: &mut H, now: Instant) {
        let Some(direction) = engine.tick(now) else {
            return;
        };

        hw.step(self.axis, direction);
        self.phase_steps += 1;

        if self.phase_steps > self.settings.max_phase_steps {
            log::warn!(
                "{:?}: no limit after {} steps in {:?}",
                self.axis,
                self.phase_steps,
                self.phase
            );
            engine.stop();
            self.outcome = Some(Err(CalibrationError::Timeout {
                phase: self.phase,
                limit: self.settings.max_phase_steps,
            }));
        }
    }
}
