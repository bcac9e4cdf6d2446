//! Fixed-period tick loop: radio -> mode -> encoder -> controller -> vehicle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use erumby_traits::clock::Clock;
use erumby_traits::{Encoder, Vehicle};

use crate::actuator::ActuatorMaps;
use crate::controller::Controller;
use crate::error::{ControlError, NumericalFault, Report, Result as CoreResult};
use crate::hw_error::map_hw_error;
use crate::mode::{DriveMode, ModeBands, ModeSelector, Transition};
use crate::sampler::FrameSource;
use crate::status::{Actuation, TickStatus};

/// Operator request for one tick of automatic driving.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Setpoint {
    pub speed_mps: f32,
    /// Normalized steering, -1 (right) to 1 (left).
    pub steering: f32,
}

/// What happened in one tick, for telemetry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub tick: u64,
    pub mode: DriveMode,
    pub transition: Option<Transition>,
    pub pulses: u32,
    pub actuation: Option<Actuation>,
    pub fault: Option<NumericalFault>,
    /// The tick ran past its period and its command was discarded.
    pub overrun: bool,
    pub esc_us: Option<u16>,
    pub servo_us: Option<u16>,
}

/// Running min/max/mean/stdev of tick latency without storing samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    count: u64,
    min_us: u64,
    max_us: u64,
    mean: f64,
    m2: f64,
}

impl LatencyStats {
    pub fn record(&mut self, us: u64) {
        if self.count == 0 {
            self.min_us = us;
            self.max_us = us;
        } else {
            self.min_us = self.min_us.min(us);
            self.max_us = self.max_us.max(us);
        }
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let (x, n) = (us as f64, self.count as f64);
        let delta = x - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min_us(&self) -> u64 {
        self.min_us
    }

    pub fn max_us(&self) -> u64 {
        self.max_us
    }

    pub fn mean_us(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation.
    pub fn stdev_us(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = (self.count - 1) as f64;
        (self.m2 / n).sqrt()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub ticks: u64,
    pub auto_ticks: u64,
    pub faults: u64,
    pub overruns: u64,
    pub missed_deadlines: u64,
    pub mode_changes: u64,
    pub latency: LatencyStats,
}

impl RunStats {
    fn record(&mut self, r: &TickReport, latency_us: u64) {
        self.ticks += 1;
        if r.mode == DriveMode::Auto {
            self.auto_ticks += 1;
        }
        if r.fault.is_some() {
            self.faults += 1;
        }
        if r.overrun {
            self.overruns += 1;
        }
        if r.transition.is_some() {
            self.mode_changes += 1;
        }
        self.latency.record(latency_us);
    }
}

pub struct Runner<E, V, F, C> {
    controller: Controller,
    maps: ActuatorMaps,
    modes: ModeSelector,
    encoder: E,
    vehicle: V,
    frames: F,
    clock: C,
}

impl<E, V, F, C> Runner<E, V, F, C>
where
    E: Encoder,
    V: Vehicle,
    F: FrameSource,
    C: Clock,
{
    pub fn new(
        controller: Controller,
        maps: ActuatorMaps,
        bands: ModeBands,
        io: (E, V, F),
        clock: C,
    ) -> Self {
        let (encoder, vehicle, frames) = io;
        Self {
            controller,
            maps,
            modes: ModeSelector::new(bands),
            encoder,
            vehicle,
            frames,
            clock,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn mode(&self) -> DriveMode {
        self.modes.current()
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    /// Execute one tick without pacing.
    pub fn step(&mut self, tick: u64, setpoint: Setpoint) -> CoreResult<TickReport> {
        let t0 = self.clock.now();
        let frame = self.frames.latest_frame();
        let transition = self.modes.update(frame.map(|f| f.mode_us));
        if let Some(t) = transition {
            self.on_transition(t)?;
        }
        // Read every tick so the first auto tick only sees one period of pulses.
        let pulses = match self.encoder.read_pulses() {
            Ok(p) => p,
            Err(e) => return Err(self.abort(&*e)),
        };
        let mut report = TickReport {
            tick,
            mode: self.modes.current(),
            transition,
            pulses,
            ..TickReport::default()
        };

        match report.mode {
            DriveMode::Secure => {
                if let Err(e) = self.vehicle.stop() {
                    return Err(self.abort(&*e));
                }
            }
            DriveMode::Manual => {
                if let Some(f) = frame {
                    let esc_us = self.maps.manual.throttle_us(f.throttle_us);
                    let servo_us = self.maps.manual.steering_us(f.steering_us);
                    self.apply(esc_us, servo_us)?;
                    report.esc_us = Some(esc_us);
                    report.servo_us = Some(servo_us);
                }
            }
            DriveMode::Auto => {
                self.controller.set_setpoint(setpoint.speed_mps);
                #[allow(clippy::cast_precision_loss)]
                let status = self.controller.tick(pulses as f32);
                let esc_us = self.maps.esc.pulse_us(status.command());
                let servo_us = self.maps.steering.pulse_us(setpoint.steering);
                match status {
                    TickStatus::Applied(a) => report.actuation = Some(a),
                    TickStatus::Fault { fault, .. } => report.fault = Some(fault),
                }
                let elapsed = self.clock.now().saturating_duration_since(t0);
                let budget = self.controller.timing().period();
                if elapsed > budget {
                    let err = ControlError::Overrun {
                        elapsed_us: crate::util::saturating_us(elapsed),
                        budget_us: crate::util::saturating_us(budget),
                    };
                    tracing::warn!(tick, error = %err, "discarding tick");
                    self.controller.reset();
                    report.overrun = true;
                } else {
                    self.apply(esc_us, servo_us)?;
                    report.esc_us = Some(esc_us);
                    report.servo_us = Some(servo_us);
                }
            }
        }
        Ok(report)
    }

    /// Run until `max_ticks`, shutdown, or an error. Deadlines that have
    /// already passed are skipped rather than replayed.
    pub fn run(
        &mut self,
        max_ticks: Option<u64>,
        mut setpoint: impl FnMut(u64) -> Setpoint,
        shutdown: &AtomicBool,
        mut on_tick: impl FnMut(&TickReport),
    ) -> CoreResult<RunStats> {
        let period = self.controller.timing().period();
        let mut deadline = self.clock.now();
        let mut stats = RunStats::default();
        let mut tick = 0_u64;
        tracing::info!(
            period_us = crate::util::saturating_us(period),
            delay_ticks = self.controller.timing().delay_ticks(),
            "control loop start"
        );

        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(tick, "shutdown requested");
                break;
            }
            if max_ticks.is_some_and(|m| tick >= m) {
                break;
            }

            let t0 = self.clock.now();
            let report = match self.step(tick, setpoint(tick)) {
                Ok(r) => r,
                Err(e) => {
                    let _ = self.vehicle.stop();
                    tracing::error!(tick, error = %e, "control loop aborted");
                    return Err(e);
                }
            };
            stats.record(&report, self.clock.us_since(t0));
            on_tick(&report);
            tick += 1;

            deadline += period;
            let now = self.clock.now();
            if now > deadline {
                let behind = now.saturating_duration_since(deadline);
                let missed = u32::try_from(behind.as_nanos() / period.as_nanos())
                    .unwrap_or(u32::MAX)
                    .saturating_add(1);
                deadline += period.saturating_mul(missed);
                stats.missed_deadlines += u64::from(missed);
                tracing::warn!(tick, missed, "missed deadlines; skipping ahead");
            }
            self.clock.sleep_until(deadline);
        }

        if let Err(e) = self.vehicle.stop() {
            return Err(Report::new(map_hw_error(&*e)));
        }
        tracing::info!(
            ticks = stats.ticks,
            faults = stats.faults,
            overruns = stats.overruns,
            "control loop stopped"
        );
        Ok(stats)
    }

    fn on_transition(&mut self, t: Transition) -> CoreResult<()> {
        if let Err(e) = self.vehicle.stop() {
            return Err(self.abort(&*e));
        }
        self.controller.reset_setpoint(0.0);
        self.controller.reset();
        self.vehicle.set_auto(t.to == DriveMode::Auto);
        Ok(())
    }

    fn apply(&mut self, esc_us: u16, servo_us: u16) -> CoreResult<()> {
        if let Err(e) = self.vehicle.speed(esc_us) {
            return Err(self.abort(&*e));
        }
        if let Err(e) = self.vehicle.steer(servo_us) {
            return Err(self.abort(&*e));
        }
        Ok(())
    }

    fn abort(&mut self, e: &(dyn std::error::Error + 'static)) -> Report {
        let _ = self.vehicle.stop();
        let mapped = map_hw_error(e);
        tracing::error!(error = %mapped, mode = %self.modes.current(), "hardware error");
        Report::new(mapped)
    }
}

/// Whole ticks of `period` that fit in `duration`.
pub fn ticks_for(duration: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    u64::try_from(duration.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX)
}
