//! Outcome of a single controller tick.

use crate::error::NumericalFault;

/// Everything computed in one tick, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actuation {
    /// Speed after the lookup table, m/s.
    pub measured: f32,
    /// Observer speed estimate.
    pub estimate: f32,
    /// Delay-compensated estimate fed to the PI.
    pub compensated: f32,
    /// Delay-free model output of the speed predictor.
    pub predicted: f32,
    /// Delay-free model output of the ESC predictor.
    pub esc_predicted: f32,
    pub setpoint: f32,
    /// Normalized drive command.
    pub command: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Pipeline ran; `command` is safe to send.
    Applied(Actuation),
    /// Estimator state went bad; the controller has been reset and
    /// `fallback` is zero actuation.
    Fault { fault: NumericalFault, fallback: f32 },
}

impl TickStatus {
    pub fn command(&self) -> f32 {
        match self {
            Self::Applied(a) => a.command,
            Self::Fault { fallback, .. } => *fallback,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }
}
