//! Piecewise-linear lookup table with a per-instance out-of-range policy.
//!
//! Segment slopes are precomputed so `evaluate` is a binary search plus one
//! multiply-add. Exact breakpoints return their stored `y` bit-for-bit.

use crate::error::BuildError;

/// What `evaluate` returns outside `[x_first, x_last]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutOfRangePolicy {
    /// Hold the nearest boundary `y`.
    #[default]
    Clamp,
    /// Return fixed values below and above the table.
    Saturate { low: f32, high: f32 },
    /// Continue the first/last segment linearly.
    Extrapolate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    xs: Vec<f32>,
    ys: Vec<f32>,
    slopes: Vec<f32>,
    policy: OutOfRangePolicy,
}

impl LookupTable {
    pub fn new(points: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, BuildError> {
        let (xs, ys): (Vec<f32>, Vec<f32>) = points.into_iter().unzip();
        if xs.len() < 2 {
            return Err(BuildError::InvalidConfig(
                "lookup table needs at least two breakpoints",
            ));
        }
        if xs.iter().chain(&ys).any(|v| !v.is_finite()) {
            return Err(BuildError::InvalidConfig(
                "lookup breakpoints must be finite",
            ));
        }
        if let Some(i) = xs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(BuildError::NonMonotonicTable { index: i + 1 });
        }
        let slopes = xs
            .windows(2)
            .zip(ys.windows(2))
            .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
            .collect();
        Ok(Self {
            xs,
            ys,
            slopes,
            policy: OutOfRangePolicy::Clamp,
        })
    }

    /// Two-point linear map from `[x0, x1]` onto `[y0, y1]`.
    pub fn linear(x0: f32, x1: f32, y0: f32, y1: f32) -> Result<Self, BuildError> {
        Self::new([(x0, y0), (x1, y1)])
    }

    #[must_use]
    pub fn with_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OutOfRangePolicy {
        self.policy
    }

    /// Input range covered by the breakpoints.
    pub fn domain(&self) -> (f32, f32) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        if x.is_nan() {
            return f32::NAN;
        }
        let last = self.xs.len() - 1;
        if x < self.xs[0] {
            return match self.policy {
                OutOfRangePolicy::Clamp => self.ys[0],
                OutOfRangePolicy::Saturate { low, .. } => low,
                OutOfRangePolicy::Extrapolate => self.segment(0, x),
            };
        }
        if x > self.xs[last] {
            return match self.policy {
                OutOfRangePolicy::Clamp => self.ys[last],
                OutOfRangePolicy::Saturate { high, .. } => high,
                OutOfRangePolicy::Extrapolate => self.segment(last - 1, x),
            };
        }
        if x == self.xs[last] {
            return self.ys[last];
        }
        // First breakpoint strictly greater than x, minus one, is the segment start.
        let i = self.xs.partition_point(|&xi| xi <= x) - 1;
        self.segment(i, x)
    }

    #[inline]
    fn segment(&self, i: usize, x: f32) -> f32 {
        self.ys[i] + self.slopes[i] * (x - self.xs[i])
    }
}
