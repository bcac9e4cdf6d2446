//! First-order Wiener model of the ESC and drivetrain.
//!
//! The linear part is `x' = -a x + a u` with `u` the normalized drive. The
//! static output map turns the internal state into wheel speed:
//!
//! ```text
//! w = phi(x) = (sqrt(c1^2 + 4 c2 x) - c1) / (2 c2)
//! x = phi_inv(w) = c1 w + c2 w^2
//! ```
//!
//! With `c2 = 0` the map is linear, `phi(x) = x / c1`.

use std::time::Duration;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantModel {
    /// Pole of the linear part, 1/s.
    pub a: f32,
    /// Linear coefficient `c1` of `phi_inv`.
    pub nonlin_a: f32,
    /// Quadratic coefficient `c2` of `phi_inv`.
    pub nonlin_b: f32,
}

impl Default for PlantModel {
    fn default() -> Self {
        Self {
            a: 1.0,
            nonlin_a: 1.0,
            nonlin_b: 0.0,
        }
    }
}

impl PlantModel {
    /// Default for the ESC-response predictor: a faster, linear lag.
    pub const ESC: Self = Self {
        a: 20.0,
        nonlin_a: 1.0,
        nonlin_b: 0.0,
    };

    pub fn validate(&self) -> Result<(), BuildError> {
        let Self { a, nonlin_a, nonlin_b } = *self;
        if !(a.is_finite() && nonlin_a.is_finite() && nonlin_b.is_finite()) {
            return Err(BuildError::InvalidConfig("model coefficients must be finite"));
        }
        if a <= 0.0 {
            return Err(BuildError::InvalidConfig("model pole must be > 0"));
        }
        if nonlin_a < 0.0 || nonlin_b < 0.0 {
            return Err(BuildError::InvalidConfig(
                "model nonlinearity coefficients must be >= 0",
            ));
        }
        if nonlin_a == 0.0 && nonlin_b == 0.0 {
            return Err(BuildError::InvalidConfig(
                "model nonlinearity coefficients must not both be 0",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn phi(&self, x: f32) -> f32 {
        let (c1, c2) = (self.nonlin_a, self.nonlin_b);
        if c2 == 0.0 {
            return x / c1;
        }
        ((c1 * c1 + 4.0 * c2 * x).max(0.0).sqrt() - c1) / (2.0 * c2)
    }

    #[inline]
    pub fn phi_inv(&self, w: f32) -> f32 {
        self.nonlin_a * w + self.nonlin_b * w * w
    }

    /// Backward-Euler coefficients `(a_d, b_d)` of `x[k+1] = a_d x[k] + b_d u[k]`.
    pub fn discretize(&self, period: Duration) -> (f32, f32) {
        let ats = self.a * period.as_secs_f32();
        let a_d = 1.0 / (1.0 + ats);
        (a_d, a_d * ats)
    }
}
