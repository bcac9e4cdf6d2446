//! Conversions from the TOML schema in `erumby_config` to core types.

use crate::actuator::{ActuatorMaps, EscMap, ManualMap, SteeringMap};
use crate::config::{ControlCfg, Timing};
use crate::controller::Controller;
use crate::error::{BuildError, Result};
use crate::lookup::{LookupTable, OutOfRangePolicy};
use crate::mode::ModeBands;
use crate::model::PlantModel;
use crate::observer::{ObserverConfig, ObserverModel};
use crate::pi::{OutputLimits, PiGains};

// ── Timing ───────────────────────────────────────────────────────────────────

impl TryFrom<&erumby_config::Timing> for Timing {
    type Error = BuildError;
    fn try_from(c: &erumby_config::Timing) -> std::result::Result<Self, Self::Error> {
        Self::from_millis(c.period_ms, c.dead_time_ms)
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&erumby_config::ControlCfg> for ControlCfg {
    fn from(c: &erumby_config::ControlCfg) -> Self {
        Self {
            gains: PiGains { kp: c.kp, ki: c.ki },
            limits: OutputLimits {
                min: c.output_min,
                max: c.output_max,
            },
            feedforward: c.feedforward,
            divergence_limit: c.divergence_limit,
        }
    }
}

// ── Models ───────────────────────────────────────────────────────────────────

impl From<&erumby_config::ModelCfg> for PlantModel {
    fn from(c: &erumby_config::ModelCfg) -> Self {
        Self {
            a: c.a,
            nonlin_a: c.nonlin_a,
            nonlin_b: c.nonlin_b,
        }
    }
}

impl From<&erumby_config::ObserverCfg> for ObserverConfig {
    fn from(c: &erumby_config::ObserverCfg) -> Self {
        Self {
            gains: c.gains.clone(),
            epsilon: c.epsilon,
            model: ObserverModel {
                a: c.a,
                nonlin_a: c.nonlin_a,
                nonlin_b: c.nonlin_b,
            },
        }
    }
}

// ── Encoder table ────────────────────────────────────────────────────────────

impl From<erumby_config::TablePolicy> for OutOfRangePolicy {
    fn from(p: erumby_config::TablePolicy) -> Self {
        match p {
            erumby_config::TablePolicy::Clamp => Self::Clamp,
            erumby_config::TablePolicy::Extrapolate => Self::Extrapolate,
        }
    }
}

impl TryFrom<&erumby_config::EncoderCfg> for LookupTable {
    type Error = BuildError;
    fn try_from(c: &erumby_config::EncoderCfg) -> std::result::Result<Self, Self::Error> {
        Ok(Self::new(c.table.iter().copied())?.with_policy(c.policy.into()))
    }
}

impl TryFrom<&erumby_config::EncoderCalibration> for LookupTable {
    type Error = BuildError;
    fn try_from(c: &erumby_config::EncoderCalibration) -> std::result::Result<Self, Self::Error> {
        Self::new(c.points.iter().copied())
    }
}

// ── Radio ────────────────────────────────────────────────────────────────────

impl From<&erumby_config::RadioCfg> for ModeBands {
    fn from(c: &erumby_config::RadioCfg) -> Self {
        Self {
            auto_us: c.auto_us,
            secure_us: c.secure_us,
            manual_us: c.manual_us,
            tolerance_us: c.tolerance_us,
        }
    }
}

// ── Actuator maps ────────────────────────────────────────────────────────────

impl TryFrom<&erumby_config::Config> for ActuatorMaps {
    type Error = BuildError;
    fn try_from(c: &erumby_config::Config) -> std::result::Result<Self, Self::Error> {
        let (esc, servo) = (&c.esc, &c.servo);
        let mut manual = ManualMap::passthrough(
            (esc.min_us, esc.idle_us, esc.max_us),
            (servo.right_us, servo.center_us, servo.left_us),
        )?;
        if c.radio.throttle_table.is_some() || c.radio.steering_table.is_some() {
            let idle = f32::from(esc.idle_us);
            let throttle = match &c.radio.throttle_table {
                Some(t) => LookupTable::new(t.iter().copied())?
                    .with_policy(OutOfRangePolicy::Saturate { low: idle, high: idle }),
                None => manual.throttle_table().clone(),
            };
            let steering = match &c.radio.steering_table {
                Some(t) => {
                    let table = LookupTable::new(t.iter().copied())?;
                    let (lo, hi) = table.domain();
                    let (low, high) = (table.evaluate(lo), table.evaluate(hi));
                    table.with_policy(OutOfRangePolicy::Saturate { low, high })
                }
                None => manual.steering_table().clone(),
            };
            manual = ManualMap::new(throttle, steering);
        }
        Ok(Self {
            esc: EscMap::new(esc.idle_us, esc.max_us)?,
            steering: SteeringMap::new(servo.right_us, servo.center_us, servo.left_us)?,
            manual,
        })
    }
}

// ── Controller ───────────────────────────────────────────────────────────────

impl Controller {
    /// Build the speed controller from a validated config. A loaded
    /// calibration replaces `[encoder] table`; `[encoder] policy` still applies.
    pub fn from_config(
        cfg: &erumby_config::Config,
        calibration: Option<&erumby_config::EncoderCalibration>,
    ) -> Result<Self> {
        let timing = Timing::try_from(&cfg.timing).map_err(eyre::Report::new)?;
        let table = match calibration {
            Some(cal) => {
                LookupTable::try_from(cal).map(|t| t.with_policy(cfg.encoder.policy.into()))
            }
            None => LookupTable::try_from(&cfg.encoder),
        }
        .map_err(eyre::Report::new)?;
        let mut b = Self::builder()
            .with_timing(timing)
            .with_table(table)
            .with_control((&cfg.controller).into())
            .with_model((&cfg.model).into())
            .with_observer((&cfg.observer).into());
        if let Some(m) = &cfg.esc_model {
            b = b.with_esc_model(m.into());
        }
        b.build()
    }
}
