//! Hardware capability traits shared by the control core and its drivers.
//!
//! Every fallible call returns a boxed error so that driver crates stay free to
//! use their own error types; the core maps them at the boundary.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Error type used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wheel encoder: reports pulses counted since the previous read.
pub trait Encoder {
    fn read_pulses(&mut self) -> Result<u32, BoxError>;
}

/// One set of pulse widths captured from the radio receiver, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioFrame {
    pub steering_us: u16,
    pub throttle_us: u16,
    pub mode_us: u16,
}

/// Radio receiver. `read` blocks at most `timeout` waiting for a full frame.
pub trait Radio {
    fn read(&mut self, timeout: Duration) -> Result<RadioFrame, BoxError>;
}

/// A single PWM channel driven with a pulse width in microseconds.
pub trait PwmOutput {
    fn set_pulse_us(&mut self, pulse_us: u16) -> Result<(), BoxError>;
    fn disable(&mut self) -> Result<(), BoxError>;
}

/// Drive capability of the vehicle: traction, steering and a safe stop.
pub trait Vehicle {
    fn speed(&mut self, pulse_us: u16) -> Result<(), BoxError>;
    fn steer(&mut self, pulse_us: u16) -> Result<(), BoxError>;
    /// Idle the ESC and centre the steering.
    fn stop(&mut self) -> Result<(), BoxError>;
    /// Told whenever automatic control engages or disengages.
    fn set_auto(&mut self, _auto: bool) {}
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn read_pulses(&mut self) -> Result<u32, BoxError> {
        (**self).read_pulses()
    }
}

impl<T: Vehicle + ?Sized> Vehicle for Box<T> {
    fn speed(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        (**self).speed(pulse_us)
    }
    fn steer(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        (**self).steer(pulse_us)
    }
    fn stop(&mut self) -> Result<(), BoxError> {
        (**self).stop()
    }
    fn set_auto(&mut self, auto: bool) {
        (**self).set_auto(auto);
    }
}
