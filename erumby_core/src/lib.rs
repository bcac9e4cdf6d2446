#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Real-time speed estimation and control for the erumby vehicle
//! (hardware-agnostic).
//!
//! All hardware goes through the `erumby_traits` capabilities; nothing in
//! here blocks except the paced `Runner::run` loop.
//!
//! ## Pipeline (one tick)
//!
//! - **Lookup**: encoder pulses to m/s (`lookup`)
//! - **Observe**: high-gain observer filters the speed (`observer`)
//! - **Compensate**: Smith predictor removes the known dead time (`smith`)
//! - **Control**: PI with integral clamping plus model feedforward (`pi`, `controller`)
//! - **Actuate**: normalized command to ESC/servo pulse widths (`actuator`)
//!
//! Mode selection (`mode`) decides whether the pipeline output, the radio
//! sticks, or nothing reaches the wheels.

pub mod actuator;
pub mod buffer;
pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod lookup;
pub mod mode;
pub mod model;
pub mod observer;
pub mod pi;
pub mod runner;
pub mod sampler;
pub mod smith;
pub mod status;
pub mod util;

pub use actuator::{ActuatorMaps, EscMap, ManualMap, SteeringMap};
pub use buffer::CyclicBuffer;
pub use builder::ControllerBuilder;
pub use config::{ControlCfg, Timing};
pub use controller::Controller;
pub use error::{BuildError, ControlError, NumericalFault, OutOfRange};
pub use lookup::{LookupTable, OutOfRangePolicy};
pub use mode::{DriveMode, ModeBands, ModeSelector};
pub use model::PlantModel;
pub use observer::{HighGainObserver, ObserverConfig, ObserverModel};
pub use pi::{OutputLimits, PiController, PiGains};
pub use runner::{RunStats, Runner, Setpoint, TickReport};
pub use smith::SmithPredictor;
pub use status::{Actuation, TickStatus};
