//! Drivers behind the `erumby_traits` capabilities.
//!
//! `sim` is always available and backs the offline `simulate` command and
//! the test suites. The Raspberry Pi backend is compiled only with the
//! `hardware` feature on Linux.

pub mod error;
pub mod rover;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pwm;

pub use rover::{EscLimits, Rover, ServoLimits};
pub use sim::{SimConfig, SimEncoder, SimPwm, SimRadio, SimVehicle, SimulatedPlant};
