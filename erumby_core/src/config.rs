//! Runtime configuration types for the control core.
//!
//! These are separate from the TOML-deserialized config in `erumby_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use crate::error::BuildError;
use crate::pi::{OutputLimits, PiGains};

/// Loop period and the plant dead time expressed in whole periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    period: Duration,
    delay_ticks: usize,
}

impl Timing {
    /// Both values in milliseconds; the dead time must be a positive whole
    /// multiple of the period.
    pub fn from_millis(period_ms: u32, dead_time_ms: u32) -> Result<Self, BuildError> {
        if period_ms == 0 {
            return Err(BuildError::InvalidConfig("period must be > 0"));
        }
        if dead_time_ms == 0 {
            return Err(BuildError::InvalidConfig("dead time must be > 0"));
        }
        let delay_ticks = crate::util::delay_ticks(dead_time_ms, period_ms).ok_or(
            BuildError::InvalidConfig("dead time must be a multiple of the period"),
        )?;
        Ok(Self {
            period: Duration::from_millis(u64::from(period_ms)),
            delay_ticks,
        })
    }

    pub fn new(period: Duration, delay_ticks: usize) -> Result<Self, BuildError> {
        if period.is_zero() {
            return Err(BuildError::InvalidConfig("period must be > 0"));
        }
        if delay_ticks == 0 {
            return Err(BuildError::InvalidConfig("dead time must be > 0"));
        }
        Ok(Self {
            period,
            delay_ticks,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn delay_ticks(&self) -> usize {
        self.delay_ticks
    }

    pub fn dead_time(&self) -> Duration {
        self.period
            .saturating_mul(u32::try_from(self.delay_ticks).unwrap_or(u32::MAX))
    }
}

/// Speed loop tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCfg {
    pub gains: PiGains,
    /// Normalized drive range handed to the ESC map.
    pub limits: OutputLimits,
    /// Add `phi_inv(setpoint)` to the PI action.
    pub feedforward: bool,
    /// Estimates beyond this magnitude (m/s) are treated as divergence.
    pub divergence_limit: f32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            gains: PiGains::default(),
            limits: OutputLimits::default(),
            feedforward: true,
            divergence_limit: 1.0e3,
        }
    }
}
