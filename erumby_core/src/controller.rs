//! Speed controller: one fixed-period tick of the estimation and control
//! pipeline.
//!
//! ```text
//! raw pulses -> LookupTable -> HighGainObserver -> SmithPredictor -> PI (+ feedforward) -> command
//! ```
//!
//! The command issued this tick is fed back into both Smith predictors
//! before returning, so the models never lag the plant by more than the
//! configured dead time.

use crate::config::{ControlCfg, Timing};
use crate::error::NumericalFault;
use crate::lookup::LookupTable;
use crate::model::PlantModel;
use crate::observer::HighGainObserver;
use crate::pi::{OutputLimits, PiController};
use crate::smith::SmithPredictor;
use crate::status::{Actuation, TickStatus};

#[derive(Debug, Clone)]
pub struct Controller {
    pub(crate) table: LookupTable,
    pub(crate) observer: HighGainObserver,
    pub(crate) pi: PiController,
    pub(crate) predictor: SmithPredictor,
    pub(crate) esc_predictor: SmithPredictor,
    pub(crate) control: ControlCfg,
    pub(crate) timing: Timing,
    pub(crate) setpoint: f32,
    pub(crate) last: Option<Actuation>,
}

impl Controller {
    /// Run one tick on the raw encoder sample and return the command to apply.
    pub fn tick(&mut self, raw: f32) -> TickStatus {
        match self.pipeline(raw) {
            Ok(a) => {
                tracing::trace!(
                    measured = a.measured,
                    estimate = a.estimate,
                    compensated = a.compensated,
                    command = a.command,
                    "tick"
                );
                self.last = Some(a);
                TickStatus::Applied(a)
            }
            Err(fault) => {
                tracing::warn!(%fault, raw, "numerical fault; resetting controller");
                self.reset();
                TickStatus::Fault {
                    fault,
                    fallback: self.control.limits.clamp(0.0),
                }
            }
        }
    }

    fn pipeline(&mut self, raw: f32) -> Result<Actuation, NumericalFault> {
        let bound = self.control.divergence_limit;
        let measured = self.table.evaluate(raw);
        check("measurement", measured, bound)?;

        let estimate = {
            let state = self.observer.update(measured);
            for v in state {
                check("observer state", *v, bound)?;
            }
            state[0]
        };

        let compensated = self.predictor.correct(estimate);
        check("compensated estimate", compensated, bound)?;

        let feedback = self.pi.update(self.setpoint, compensated);
        let feedforward = if self.control.feedforward {
            self.predictor.model().phi_inv(self.setpoint)
        } else {
            0.0
        };
        let command = self.control.limits.clamp(feedforward + feedback);
        if !command.is_finite() {
            return Err(NumericalFault::NonFinite("command"));
        }

        self.predictor.advance(command);
        self.esc_predictor.advance(command);
        Ok(Actuation {
            measured,
            estimate,
            compensated,
            predicted: self.predictor.state_predict(),
            esc_predicted: self.esc_predictor.state_predict(),
            setpoint: self.setpoint,
            command,
        })
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    /// Change the target speed, keeping the integral (bumpless in auto).
    pub fn set_setpoint(&mut self, speed_mps: f32) {
        if speed_mps.is_finite() {
            self.setpoint = speed_mps;
        } else {
            tracing::warn!(speed_mps, "ignoring non-finite setpoint");
        }
    }

    /// Replace the setpoint from outside the loop (mode change, operator
    /// override); also clears the PI integral so re-engaging starts clean.
    pub fn reset_setpoint(&mut self, speed_mps: f32) {
        self.set_setpoint(speed_mps);
        self.pi.reset();
        tracing::debug!(setpoint = self.setpoint, "setpoint reset");
    }

    /// Return every estimator and the PI to rest. The setpoint is kept.
    pub fn reset(&mut self) {
        self.observer.reset();
        self.predictor.reset();
        self.esc_predictor.reset();
        self.pi.reset();
        self.last = None;
    }

    /// Latest compensated estimate (m/s).
    pub fn compensated(&self) -> f32 {
        self.predictor.state()
    }

    pub fn last_actuation(&self) -> Option<&Actuation> {
        self.last.as_ref()
    }

    pub fn predictor(&self) -> &SmithPredictor {
        &self.predictor
    }

    /// Predictor tracking the ESC response, advanced with the same commands.
    pub fn esc_predictor(&self) -> &SmithPredictor {
        &self.esc_predictor
    }

    /// Encoder pulses to m/s.
    pub fn table(&self) -> &LookupTable {
        &self.table
    }

    pub fn observer(&self) -> &HighGainObserver {
        &self.observer
    }

    pub fn pi(&self) -> &PiController {
        &self.pi
    }

    pub fn model(&self) -> &PlantModel {
        self.predictor.model()
    }

    pub fn limits(&self) -> OutputLimits {
        self.control.limits
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }
}

#[inline]
fn check(what: &'static str, v: f32, bound: f32) -> Result<(), NumericalFault> {
    if !v.is_finite() {
        return Err(NumericalFault::NonFinite(what));
    }
    if v.abs() > bound {
        return Err(NumericalFault::Diverged(what));
    }
    Ok(())
}
