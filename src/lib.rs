#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod config;
pub mod error;
pub mod hardware;
pub mod motion;
pub mod prelude;
pub mod receiver;
pub mod serialport;
pub mod stepper;
pub mod systems;

/// Signed step count.
pub type Steps = i64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn index(self) -> usize {
        self as usize
    }
}
