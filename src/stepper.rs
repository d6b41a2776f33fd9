use embassy_time::Instant;
use libm::{ceilf, fabsf, sqrtf};

use crate::Steps;
use crate::config::AxisSettings;
use crate::error::MotionError;
use crate::hardware::Direction;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Ramp toward `target_position` under the trapezoidal profile.
    Positioning,
    /// Step forever at `constant_speed`, ignoring acceleration.
    ConstantSpeed,
}

/// Kinematic state of one stepper axis.
///
/// Nothing moves until [`AxisEngine::tick`] is called. Each tick emits at most
/// one step and returns immediately when none is due, so it can be polled as
/// fast as the main loop spins.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisEngine {
    current_position: Steps,
    target_position: Steps,
    current_speed: f32, // steps/s, signed
    max_speed: f32,
    acceleration: f32,
    constant_speed: f32,
    mode: Mode,
    last_step: Option<Instant>,
}

impl AxisEngine {
    pub fn new(settings: &AxisSettings) -> Result<Self, MotionError> {
        let mut engine = Self {
            current_position: 0,
            target_position: 0,
            current_speed: 0.0,
            max_speed: 1.0,
            acceleration: 1.0,
            constant_speed: 0.0,
            mode: Mode::Positioning,
            last_step: None,
        };

        engine.configure(settings)?;
        Ok(engine)
    }

    /// Applies all three settings or, if any is rejected, none of them.
    pub fn configure(&mut self, settings: &AxisSettings) -> Result<(), MotionError> {
        let mut next = self.clone();
        next.set_max_speed(settings.max_speed)?;
        next.set_acceleration(settings.acceleration)?;
        next.set_constant_speed(settings.constant_speed)?;

        *self = next;
        Ok(())
    }

    pub fn settings(&self) -> AxisSettings {
        AxisSettings {
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            constant_speed: self.constant_speed,
        }
    }

    pub fn set_max_speed(&mut self, speed: f32) -> Result<(), MotionError> {
        if !(speed > 0.0) || !speed.is_finite() {
            return Err(MotionError::InvalidParameter {
                name: "max speed",
                value: speed,
            });
        }

        self.max_speed = speed;
        self.current_speed = self.current_speed.clamp(-speed, speed);
        self.constant_speed = self.constant_speed.clamp(-speed, speed);
        Ok(())
    }

    pub fn set_acceleration(&mut self, acceleration: f32) -> Result<(), MotionError> {
        if !(acceleration > 0.0) || !acceleration.is_finite() {
            return Err(MotionError::InvalidParameter {
                name: "acceleration",
                value: acceleration,
            });
        }

        self.acceleration = acceleration;
        Ok(())
    }

    /// Declares `position` as the current location without moving. Speed drops
    /// to zero and any constant-speed motion ends.
    pub fn set_current_position(&mut self, position: Steps) {
        self.current_position = position;
        self.target_position = position;
        self.current_speed = 0.0;
        self.mode = Mode::Positioning;
    }

    pub fn move_to(&mut self, position: Steps) {
        self.target_position = position;
        self.mode = Mode::Positioning;
    }

    pub fn move_by(&mut self, steps: Steps) {
        self.move_to(self.current_position + steps);
    }

    /// Switches to constant-speed mode at `speed` steps/s, clamped to the
    /// max speed. The sign selects the direction.
    pub fn set_speed(&mut self, speed: f32) -> Result<(), MotionError> {
        self.set_constant_speed(speed)?;
        self.spin();
        Ok(())
    }

    /// Re-enters constant-speed mode at the last speed given to `set_speed`.
    pub fn spin(&mut self) {
        self.mode = Mode::ConstantSpeed;
        self.current_speed = self.constant_speed;
        self.target_position = self.current_position;
    }

    /// Ramps the axis down to rest at the current acceleration.
    pub fn stop(&mut self) {
        self.mode = Mode::Positioning;

        let Some(heading) = Direction::from_sign(self.heading()) else {
            self.target_position = self.current_position;
            return;
        };

        let needed = ceilf(self.stopping_distance()) as Steps;
        self.target_position = self.current_position + needed * heading.sign();
    }

    /// Polls the axis. Emits one step if one is due and returns its direction.
    pub fn tick(&mut self, now: Instant) -> Option<Direction> {
        match self.mode {
            Mode::ConstantSpeed => {
                let direction = Direction::from_sign(self.heading())?;
                if !self.step_due(now) {
                    return None;
                }

                self.take_step(direction, now);
                self.target_position = self.current_position;
                Some(direction)
            }
            Mode::Positioning => self.tick_positioning(now),
        }
    }

    fn tick_positioning(&mut self, now: Instant) -> Option<Direction> {
        let distance = self.distance_to_go();
        if distance == 0 {
            self.current_speed = 0.0;
            return None;
        }

        // A stationary axis starts on the first tick.
        if self.current_speed != 0.0 && !self.step_due(now) {
            return None;
        }

        let toward = Direction::from_sign(distance)?;
        let direction = Direction::from_sign(self.heading()).unwrap_or(toward);
        let speed = fabsf(self.current_speed);

        let next_speed = if direction == toward {
            self.ramp(speed, distance.abs() - 1)
        } else {
            self.decelerate(speed)
        };

        self.current_speed = next_speed * direction.sign() as f32;
        self.take_step(direction, now);
        Some(direction)
    }

    /// Speed for the interval after the current step, given `remaining` steps
    /// left once it is taken. Keeps `v^2 <= 2 * a * remaining`.
    fn ramp(&self, speed: f32, remaining: Steps) -> f32 {
        let remaining = remaining as f32;

        let accelerated = sqrtf(speed * speed + 2.0 * self.acceleration).min(self.max_speed);
        if self.distance_to_rest(accelerated) <= remaining {
            accelerated
        } else if self.distance_to_rest(speed) <= remaining {
            speed
        } else {
            self.decelerate(speed)
        }
    }

    fn decelerate(&self, speed: f32) -> f32 {
        sqrtf((speed * speed - 2.0 * self.acceleration).max(0.0))
    }

    fn distance_to_rest(&self, speed: f32) -> f32 {
        speed * speed / (2.0 * self.acceleration)
    }

    fn step_due(&self, now: Instant) -> bool {
        match self.last_step {
            None => true,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_micros() as f64;
                elapsed * fabsf(self.current_speed) as f64 >= 1_000_000.0
            }
        }
    }

    fn take_step(&mut self, direction: Direction, now: Instant) {
        self.current_position += direction.sign();
        self.last_step = Some(now);
    }

    fn heading(&self) -> Steps {
        if self.current_speed > 0.0 {
            1
        } else if self.current_speed < 0.0 {
            -1
        } else {
            0
        }
    }

    fn set_constant_speed(&mut self, speed: f32) -> Result<(), MotionError> {
        if !speed.is_finite() {
            return Err(MotionError::InvalidParameter {
                name: "speed",
                value: speed,
            });
        }

        self.constant_speed = speed.clamp(-self.max_speed, self.max_speed);
        Ok(())
    }

    /// Steps needed to come to rest from the current speed.
    pub fn stopping_distance(&self) -> f32 {
        self.distance_to_rest(self.current_speed)
    }

    pub fn distance_to_go(&self) -> Steps {
        self.target_position - self.current_position
    }

    pub fn current_position(&self) -> Steps {
        self.current_position
    }

    pub fn target_position(&self) -> Steps {
        self.target_position
    }

    pub fn speed(&self) -> f32 {
        self.current_speed
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    pub fn constant_speed(&self) -> f32 {
        self.constant_speed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        match self.mode {
            Mode::ConstantSpeed => self.current_speed != 0.0,
            Mode::Positioning => self.current_speed != 0.0 || self.distance_to_go() != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::Duration;

    use super::*;

    fn engine(max_speed: f32, acceleration: f32) -> AxisEngine {
        AxisEngine::new(&AxisSettings {
            max_speed,
            acceleration,
            constant_speed: 200.0,
        })
        .unwrap()
    }

    /// Ticks every `period` until the axis settles, returning every observed
    /// (position, speed) pair after a step.
    fn run(engine: &mut AxisEngine, start: Instant, period: Duration) -> Vec<(Steps, f32)> {
        let mut now = start;
        let mut trace = Vec::new();
        for _ in 0..2_000_000 {
            let before = engine.current_position();
            if let Some(direction) = engine.tick(now) {
                assert_eq!(engine.current_position() - before, direction.sign());
                trace.push((engine.current_position(), engine.speed()));
            } else {
                assert_eq!(engine.current_position(), before);
            }
            if !engine.is_running() {
                return trace;
            }
            now += period;
        }
        panic!("axis never settled");
    }

    #[test]
    fn setters_reject_non_positive_values() {
        let mut axis = engine(1000.0, 500.0);

        assert_eq!(
            axis.set_max_speed(-1.0),
            Err(MotionError::InvalidParameter {
                name: "max speed",
                value: -1.0
            })
        );
        assert!(axis.set_max_speed(0.0).is_err());
        assert!(axis.set_max_speed(f32::NAN).is_err());
        assert!(axis.set_acceleration(0.0).is_err());
        assert!(axis.set_acceleration(f32::INFINITY).is_err());

        assert_eq!(axis.max_speed(), 1000.0);
        assert_eq!(axis.acceleration(), 500.0);
    }

    #[test]
    fn configure_is_all_or_nothing() {
        let mut axis = engine(1000.0, 500.0);
        let before = axis.settings();

        let rejected = AxisSettings {
            max_speed: 300.0,
            acceleration: 0.0,
            constant_speed: 100.0,
        };
        assert!(axis.configure(&rejected).is_err());
        assert_eq!(axis.settings(), before);

        let accepted = AxisSettings {
            max_speed: 300.0,
            acceleration: 50.0,
            constant_speed: 400.0,
        };
        axis.configure(&accepted).unwrap();
        assert_eq!(axis.max_speed(), 300.0);
        assert_eq!(axis.acceleration(), 50.0);
        assert_eq!(axis.constant_speed(), 300.0);
    }

    #[test]
    fn lowering_max_speed_clamps_current_speed() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(-800.0).unwrap();
        assert_eq!(axis.speed(), -800.0);

        axis.set_max_speed(300.0).unwrap();
        assert_eq!(axis.speed(), -300.0);
        assert_eq!(axis.constant_speed(), -300.0);
    }

    #[test]
    fn set_speed_clamps_to_max_speed() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(5000.0).unwrap();
        assert_eq!(axis.speed(), 1000.0);
        assert!(axis.set_speed(f32::NAN).is_err());
    }

    #[test]
    fn move_to_does_not_move_until_ticked() {
        let mut axis = engine(1000.0, 500.0);
        axis.move_to(50);
        assert_eq!(axis.current_position(), 0);
        assert_eq!(axis.distance_to_go(), 50);

        axis.move_by(-20);
        assert_eq!(axis.target_position(), -20);
    }

    #[test]
    fn set_current_position_declares_new_origin() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(100.0).unwrap();
        axis.tick(Instant::from_micros(0));
        axis.set_current_position(0);

        assert_eq!(axis.current_position(), 0);
        assert_eq!(axis.target_position(), 0);
        assert_eq!(axis.speed(), 0.0);
        assert_eq!(axis.mode(), Mode::Positioning);
        assert_eq!(axis.tick(Instant::from_micros(1_000_000)), None);
    }

    #[test]
    fn trapezoid_reaches_target_at_rest_without_overshoot() {
        let mut axis = engine(1000.0, 500.0);
        axis.move_to(1000);

        let trace = run(&mut axis, Instant::from_micros(0), Duration::from_micros(20));

        assert_eq!(trace.len(), 1000);
        assert_eq!(axis.current_position(), 1000);
        assert_eq!(axis.distance_to_go(), 0);
        assert_eq!(axis.speed(), 0.0);
        assert!(trace.iter().all(|&(position, _)| position <= 1000));
        assert!(trace.iter().all(|&(_, speed)| speed.abs() <= 1000.0));
        assert!(trace.windows(2).all(|w| w[1].0 == w[0].0 + 1));

        // 1000 steps at 500 steps/s^2 is all ramp: peak is sqrt(a * d)
        let peak = trace.iter().map(|&(_, s)| s).fold(0.0, f32::max);
        assert!(peak > 650.0 && peak < 720.0, "peak {peak}");
        let (_, last) = trace[trace.len() - 1];
        assert!(last < 5.0, "arrived at {last} steps/s");
    }

    #[test]
    fn long_move_cruises_at_max_speed() {
        let mut axis = engine(1000.0, 500.0);
        axis.move_to(-5000);

        let trace = run(&mut axis, Instant::from_micros(0), Duration::from_micros(20));

        assert_eq!(axis.current_position(), -5000);
        let cruising = trace.iter().filter(|&&(_, s)| s == -1000.0).count();
        assert!(cruising > 2500, "cruised for {cruising} steps");
        assert!(trace.iter().all(|&(p, s)| p >= -5000 && s <= 0.0 && s >= -1000.0));
    }

    #[test]
    fn step_timing_follows_speed() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(100.0).unwrap();

        assert_eq!(axis.tick(Instant::from_micros(0)), Some(Direction::Forward));
        // 100 steps/s is one step every 10ms
        assert_eq!(axis.tick(Instant::from_micros(9_999)), None);
        assert_eq!(axis.tick(Instant::from_micros(10_000)), Some(Direction::Forward));
        assert_eq!(axis.current_position(), 2);
        assert_eq!(axis.distance_to_go(), 0);
    }

    #[test]
    fn negative_constant_speed_steps_backward() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(-250.0).unwrap();

        let mut steps = 0;
        for ms in 0..=100 {
            if let Some(direction) = axis.tick(Instant::from_millis(ms)) {
                assert_eq!(direction, Direction::Backward);
                steps += 1;
            }
        }
        // one step every 4ms over 100ms, plus the first
        assert_eq!(steps, 26);
        assert_eq!(axis.current_position(), -26);
    }

    #[test]
    fn zero_constant_speed_never_steps() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(0.0).unwrap();
        for ms in 0..100 {
            assert_eq!(axis.tick(Instant::from_millis(ms)), None);
        }
    }

    #[test]
    fn stop_ramps_down_instead_of_halting() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(1000.0).unwrap();
        axis.tick(Instant::from_micros(0));
        assert_eq!(axis.mode(), Mode::ConstantSpeed);

        axis.stop();
        assert_eq!(axis.mode(), Mode::Positioning);
        // 1000^2 / (2 * 500)
        assert_eq!(axis.target_position(), 1 + 1000);

        let trace = run(&mut axis, Instant::from_micros(1_000), Duration::from_micros(20));
        assert_eq!(trace.len(), 1000);
        assert_eq!(axis.speed(), 0.0);
        assert!(trace.windows(2).all(|w| w[1].1 <= w[0].1));
    }

    #[test]
    fn stop_at_rest_pins_target_to_position() {
        let mut axis = engine(1000.0, 500.0);
        axis.move_to(300);
        axis.stop();
        assert_eq!(axis.target_position(), 0);
        assert_eq!(axis.tick(Instant::from_micros(0)), None);
    }

    #[test]
    fn reversal_decelerates_before_turning_back() {
        let mut axis = engine(1000.0, 500.0);
        axis.move_to(10_000);

        let mut now = Instant::from_micros(0);
        while axis.current_position() < 2000 {
            axis.tick(now);
            now += Duration::from_micros(20);
        }
        assert!(axis.speed() > 900.0);

        axis.move_to(0);
        let trace = run(&mut axis, now, Duration::from_micros(20));

        let furthest = trace.iter().map(|&(p, _)| p).max().unwrap();
        assert!(furthest > 2000);
        assert_eq!(axis.current_position(), 0);
        assert_eq!(axis.speed(), 0.0);
    }

    #[test]
    fn tick_before_last_step_is_harmless() {
        let mut axis = engine(1000.0, 500.0);
        axis.set_speed(10.0).unwrap();
        axis.tick(Instant::from_millis(500));
        assert_eq!(axis.tick(Instant::from_millis(100)), None);
        assert_eq!(axis.current_position(), 1);
    }
}
