//! Smith predictor: dead-time compensation around an internal plant model.
//!
//! The model runs without delay on the issued commands. Its internal state
//! history is kept in a delay line of `delay + 1` slots so that the model
//! output `delay` ticks ago can be lined up against the (stale) measurement.
//! The mismatch between the two is the disturbance/model error, which is
//! added to the current model output:
//!
//! ```text
//! compensated = y - phi(x[k - D]) + phi(x[k])
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::buffer::CyclicBuffer;
use crate::error::BuildError;
use crate::model::PlantModel;
use crate::pi::OutputLimits;

#[derive(Debug, Clone)]
pub struct SmithPredictor {
    model: PlantModel,
    a_d: f32,
    b_d: f32,
    input: OutputLimits,
    delay: usize,
    line: CyclicBuffer<f32>,
    compensated: f32,
}

impl SmithPredictor {
    /// Predictor with the default linear model.
    pub fn new(period: Duration, delay: usize) -> Result<Self, BuildError> {
        Self::with_model(period, delay, PlantModel::default())
    }

    pub fn with_model(
        period: Duration,
        delay: usize,
        model: PlantModel,
    ) -> Result<Self, BuildError> {
        if period.is_zero() {
            return Err(BuildError::InvalidConfig("predictor period must be > 0"));
        }
        model.validate()?;
        let (a_d, b_d) = model.discretize(period);
        let slots = NonZeroUsize::MIN.saturating_add(delay);
        Ok(Self {
            model,
            a_d,
            b_d,
            input: OutputLimits::default(),
            delay,
            line: CyclicBuffer::filled(slots, 0.0),
            compensated: 0.0,
        })
    }

    /// Saturation applied to commands before they drive the model.
    #[must_use]
    pub fn with_input_limits(mut self, input: OutputLimits) -> Self {
        self.input = input;
        self
    }

    /// Combine a delayed measurement with the model; returns the compensated estimate.
    pub fn correct(&mut self, measurement: f32) -> f32 {
        let now = self.model.phi(self.x(0));
        let then = self.model.phi(self.x(self.delay));
        self.compensated = measurement - then + now;
        self.compensated
    }

    /// Drive the model one period with the command issued this tick.
    pub fn advance(&mut self, command: f32) {
        let u = self.input.clamp(command);
        let next = self.a_d * self.x(0) + self.b_d * u;
        self.line.push(next);
    }

    /// Last compensated estimate.
    pub fn state(&self) -> f32 {
        self.compensated
    }

    /// Delay-free model output.
    pub fn state_predict(&self) -> f32 {
        self.model.phi(self.x(0))
    }

    /// Model output `delay` ticks ago, aligned with the measurement.
    pub fn state_delayed(&self) -> f32 {
        self.model.phi(self.x(self.delay))
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn model(&self) -> &PlantModel {
        &self.model
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.compensated = 0.0;
    }

    // The line is filled at construction and on reset, so every k <= delay is present.
    #[inline]
    fn x(&self, k: usize) -> f32 {
        self.line.at(k).copied().unwrap_or_default()
    }
}
