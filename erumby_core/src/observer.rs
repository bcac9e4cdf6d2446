//! High-gain observer for a chain of integrators with a nonlinear drift.
//!
//! Continuous model, `n = gains.len()` states:
//!
//! ```text
//! x1' = x2 + psi(x1)            psi(x) = -a x - c1 x|x| - c2 x^3
//! xi' = x(i+1)   (1 < i < n)
//! xn' = 0
//! y   = x1
//! ```
//!
//! The correction gain on state `i` is `l_i / eps^i`, so shrinking `eps`
//! pushes every observer pole out to `1/eps` while keeping their pattern.
//! The update is backward Euler, split into a measurement-free prediction
//! `p = P (x + ts e1 psi(x1))` followed by `x = p + K (y - p1)`. `P` and `K`
//! are inverted once at construction; a tick is one matrix-vector product
//! and two `axpy`s into preallocated storage.

use std::time::Duration;

use nalgebra::{DMatrix, DVector};

use crate::error::BuildError;

/// Drift terms of the first state; all zero gives a pure integrator chain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObserverModel {
    pub a: f32,
    pub nonlin_a: f32,
    pub nonlin_b: f32,
}

impl ObserverModel {
    #[inline]
    pub fn psi(&self, x: f32) -> f32 {
        -self.a * x - self.nonlin_a * x * x.abs() - self.nonlin_b * x * x * x
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    /// `l1 .. ln`; the length fixes the state size.
    pub gains: Vec<f32>,
    pub epsilon: f32,
    pub model: ObserverModel,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        // Double pole at -1/eps.
        Self {
            gains: vec![2.0, 1.0],
            epsilon: 0.05,
            model: ObserverModel::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighGainObserver {
    model: ObserverModel,
    predict: DMatrix<f32>,
    drift: DVector<f32>,
    gain: DVector<f32>,
    x: DVector<f32>,
    scratch: DVector<f32>,
}

impl HighGainObserver {
    pub fn new(cfg: &ObserverConfig, period: Duration) -> Result<Self, BuildError> {
        let n = cfg.gains.len();
        if n < 2 {
            return Err(BuildError::InvalidConfig(
                "observer needs at least two gains",
            ));
        }
        if cfg.gains.iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(BuildError::InvalidConfig(
                "observer gains must be finite and > 0",
            ));
        }
        if !(cfg.epsilon > 0.0 && cfg.epsilon <= 1.0) {
            return Err(BuildError::InvalidConfig(
                "observer epsilon must be in (0, 1]",
            ));
        }
        if period.is_zero() {
            return Err(BuildError::InvalidConfig("observer period must be > 0"));
        }
        let ts = period.as_secs_f32();

        let shift = DMatrix::<f32>::from_fn(n, n, |r, c| if c == r + 1 { 1.0 } else { 0.0 });
        let mut scaled_gain = DVector::<f32>::zeros(n);
        let mut eps_pow = 1.0_f32;
        for (i, l) in cfg.gains.iter().enumerate() {
            eps_pow *= cfg.epsilon;
            scaled_gain[i] = l / eps_pow;
        }
        if scaled_gain.iter().any(|v| !v.is_finite()) {
            return Err(BuildError::InvalidConfig(
                "observer gains overflow for this epsilon",
            ));
        }

        let eye = DMatrix::<f32>::identity(n, n);
        let predict = (&eye - &shift * ts)
            .try_inverse()
            .ok_or(BuildError::SingularObserver)?;
        // Output matrix C = e1^T, so E L C only has a first column.
        let mut injection = DMatrix::<f32>::zeros(n, n);
        injection.set_column(0, &scaled_gain);
        let corrected = (&eye - (&shift - &injection) * ts)
            .try_inverse()
            .ok_or(BuildError::SingularObserver)?;

        let drift = predict.column(0) * ts;
        let gain = corrected * scaled_gain * ts;
        tracing::debug!(
            state_size = n,
            epsilon = cfg.epsilon,
            k1 = gain[0],
            "observer discretized"
        );
        Ok(Self {
            model: cfg.model,
            predict,
            drift,
            gain,
            x: DVector::zeros(n),
            scratch: DVector::zeros(n),
        })
    }

    /// Fold one measurement into the estimate and return it.
    pub fn update(&mut self, measurement: f32) -> &[f32] {
        let psi = self.model.psi(self.x[0]);
        self.scratch.gemv(1.0, &self.predict, &self.x, 0.0);
        self.scratch.axpy(psi, &self.drift, 1.0);
        let err = measurement - self.scratch[0];
        self.x.copy_from(&self.scratch);
        self.x.axpy(err, &self.gain, 1.0);
        self.x.as_slice()
    }

    pub fn state(&self) -> &[f32] {
        self.x.as_slice()
    }

    pub fn state_size(&self) -> usize {
        self.x.len()
    }

    /// Measurement gain applied to each state, in state order.
    pub fn correction_gains(&self) -> &[f32] {
        self.gain.as_slice()
    }

    pub fn reset(&mut self) {
        self.x.fill(0.0);
    }
}
