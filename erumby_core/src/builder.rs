//! Type-state builder for `Controller`.
//!
//! `build()` only exists once the loop timing and the encoder lookup table
//! are set; `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;

use crate::config::{ControlCfg, Timing};
use crate::controller::Controller;
use crate::error::{BuildError, Result};
use crate::lookup::LookupTable;
use crate::model::PlantModel;
use crate::observer::{HighGainObserver, ObserverConfig};
use crate::pi::{OutputLimits, PiController};
use crate::smith::SmithPredictor;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ControllerBuilder<T, L> {
    timing: Option<Timing>,
    table: Option<LookupTable>,
    control: Option<ControlCfg>,
    model: Option<PlantModel>,
    esc_model: Option<PlantModel>,
    observer: Option<ObserverConfig>,
    setpoint: Option<f32>,
    _t: PhantomData<T>,
    _l: PhantomData<L>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            timing: None,
            table: None,
            control: None,
            model: None,
            esc_model: None,
            observer: None,
            setpoint: None,
            _t: PhantomData,
            _l: PhantomData,
        }
    }
}

impl Controller {
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }
}

/// Validate configuration and construct a `Controller` with all discretized
/// coefficients precomputed.
fn validate_and_build(
    timing: Timing,
    table: LookupTable,
    control: ControlCfg,
    model: PlantModel,
    esc_model: PlantModel,
    observer: &ObserverConfig,
    setpoint: f32,
) -> Result<Controller> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !(control.divergence_limit.is_finite() && control.divergence_limit > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "divergence_limit must be finite and > 0",
        )));
    }
    if !setpoint.is_finite() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "setpoint must be finite",
        )));
    }
    if timing.delay_ticks() == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "dead time must be > 0",
        )));
    }

    // ── Precompute ───────────────────────────────────────────────────────────
    let period = timing.period();
    let limits = control.limits;
    // With feedforward the PI only trims around phi_inv(setpoint), so it may
    // need to pull the command down across the whole range.
    let pi_limits = if control.feedforward {
        OutputLimits {
            min: -limits.span(),
            max: limits.span(),
        }
    } else {
        limits
    };
    let pi = PiController::new(control.gains, period, pi_limits).map_err(eyre::Report::new)?;
    let predictor = SmithPredictor::with_model(period, timing.delay_ticks(), model)
        .map_err(eyre::Report::new)?
        .with_input_limits(limits);
    let esc_predictor = SmithPredictor::with_model(period, timing.delay_ticks(), esc_model)
        .map_err(eyre::Report::new)?
        .with_input_limits(limits);
    let observer = HighGainObserver::new(observer, period).map_err(eyre::Report::new)?;

    tracing::info!(
        period_us = crate::util::saturating_us(period),
        delay_ticks = timing.delay_ticks(),
        kp = control.gains.kp,
        ki = control.gains.ki,
        feedforward = control.feedforward,
        "controller built"
    );

    Ok(Controller {
        table,
        observer,
        pi,
        predictor,
        esc_predictor,
        control,
        timing,
        setpoint,
        last: None,
    })
}

impl<T, L> ControllerBuilder<T, L> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Controller> {
        let timing = self
            .timing
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTiming))?;
        let table = self
            .table
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTable))?;
        validate_and_build(
            timing,
            table,
            self.control.unwrap_or_default(),
            self.model.unwrap_or_default(),
            self.esc_model.unwrap_or(PlantModel::ESC),
            &self.observer.unwrap_or_default(),
            self.setpoint.unwrap_or(0.0),
        )
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_model(mut self, model: PlantModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_esc_model(mut self, model: PlantModel) -> Self {
        self.esc_model = Some(model);
        self
    }

    pub fn with_observer(mut self, observer: ObserverConfig) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_setpoint(mut self, speed_mps: f32) -> Self {
        self.setpoint = Some(speed_mps);
        self
    }
}

impl<L> ControllerBuilder<Missing, L> {
    pub fn with_timing(self, timing: Timing) -> ControllerBuilder<Set, L> {
        ControllerBuilder {
            timing: Some(timing),
            table: self.table,
            control: self.control,
            model: self.model,
            esc_model: self.esc_model,
            observer: self.observer,
            setpoint: self.setpoint,
            _t: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<T> ControllerBuilder<T, Missing> {
    pub fn with_table(self, table: LookupTable) -> ControllerBuilder<T, Set> {
        ControllerBuilder {
            timing: self.timing,
            table: Some(table),
            control: self.control,
            model: self.model,
            esc_model: self.esc_model,
            observer: self.observer,
            setpoint: self.setpoint,
            _t: PhantomData,
            _l: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available once timing and table are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}
