//! Discrete PI controller with integral clamping.

use std::time::Duration;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiGains {
    pub kp: f32,
    pub ki: f32,
}

impl Default for PiGains {
    fn default() -> Self {
        Self { kp: 1.0, ki: 0.1 }
    }
}

/// Valid actuator output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLimits {
    pub min: f32,
    pub max: f32,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl OutputLimits {
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    #[inline]
    pub fn clamp(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone)]
pub struct PiController {
    gains: PiGains,
    period_s: f32,
    limits: OutputLimits,
    integral: f32,
    last_output: f32,
}

impl PiController {
    pub fn new(
        gains: PiGains,
        period: Duration,
        limits: OutputLimits,
    ) -> Result<Self, BuildError> {
        if period.is_zero() {
            return Err(BuildError::InvalidConfig("pi period must be > 0"));
        }
        if !(gains.kp.is_finite() && gains.ki.is_finite()) || gains.kp < 0.0 || gains.ki < 0.0 {
            return Err(BuildError::InvalidConfig(
                "pi gains must be finite and >= 0",
            ));
        }
        if !(limits.min.is_finite() && limits.max.is_finite()) || limits.min >= limits.max {
            return Err(BuildError::InvalidConfig(
                "pi output limits must be finite with min < max",
            ));
        }
        Ok(Self {
            gains,
            period_s: period.as_secs_f32(),
            limits,
            integral: 0.0,
            last_output: 0.0,
        })
    }

    /// Advance one period and return the clamped command.
    ///
    /// The integral is clamped to `limits / ki` before it is used, so a long
    /// saturation never stores more action than the actuator could deliver.
    pub fn update(&mut self, setpoint: f32, measurement: f32) -> f32 {
        let error = setpoint - measurement;
        let PiGains { kp, ki } = self.gains;
        if ki > 0.0 {
            self.integral = (self.integral + error * self.period_s)
                .clamp(self.limits.min / ki, self.limits.max / ki);
        }
        let output = self.limits.clamp(kp * error + ki * self.integral);
        self.last_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_output = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn gains(&self) -> PiGains {
        self.gains
    }

    pub fn limits(&self) -> OutputLimits {
        self.limits
    }
}
