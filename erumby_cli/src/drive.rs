//! Command execution: config mapping, drivetrain assembly, and the tick loop.

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use erumby_config::{Config, EncoderCalibration};
use erumby_core::runner::{RunStats, ticks_for};
use erumby_core::sampler::RadioSampler;
use erumby_core::util::saturating_us;
use erumby_core::{ActuatorMaps, Controller, ModeBands, Runner, Setpoint, TickReport, Timing};
use erumby_hardware::{EscLimits, ServoLimits, SimConfig, SimRadio, SimulatedPlant};
use erumby_traits::RadioFrame;
use erumby_traits::clock::{Clock, MonotonicClock};
use serde_json::json;

/// Measures real time but never sleeps, so the simulated plant advances one
/// period per tick as fast as the host can compute.
#[derive(Debug, Default, Clone, Copy)]
struct Unpaced;

impl Clock for Unpaced {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _d: Duration) {}
}

/// Validated operator request shared by `run` and `simulate`.
pub fn setpoint(speed_mps: f32, steering: f32) -> eyre::Result<Setpoint> {
    if !(speed_mps.is_finite() && speed_mps >= 0.0) {
        eyre::bail!("--speed must be a finite, non-negative speed in m/s");
    }
    if !(steering.is_finite() && (-1.0..=1.0).contains(&steering)) {
        eyre::bail!("--steering must be in [-1, 1]");
    }
    Ok(Setpoint {
        speed_mps,
        steering,
    })
}

/// Simulated drivetrain matching the configured model, scaled by `[sim] gain`.
pub fn sim_config(cfg: &Config, timing: Timing) -> SimConfig {
    let g = cfg.sim.gain;
    SimConfig {
        period: timing.period(),
        pole: cfg.model.a,
        nonlin_a: cfg.model.nonlin_a / g,
        nonlin_b: cfg.model.nonlin_b / (g * g),
        delay_ticks: timing.delay_ticks(),
        pulses_per_meter: cfg.sim.pulses_per_meter,
        esc: esc_limits(cfg),
    }
}

fn esc_limits(cfg: &Config) -> EscLimits {
    EscLimits {
        min_us: cfg.esc.min_us,
        idle_us: cfg.esc.idle_us,
        max_us: cfg.esc.max_us,
    }
}

fn servo_limits(cfg: &Config) -> ServoLimits {
    ServoLimits {
        right_us: cfg.servo.right_us,
        center_us: cfg.servo.center_us,
        left_us: cfg.servo.left_us,
    }
}

/// Mode switch held in auto, sticks centred.
fn auto_frame(cfg: &Config) -> RadioFrame {
    RadioFrame {
        steering_us: cfg.servo.center_us,
        throttle_us: cfg.esc.idle_us,
        mode_us: cfg.radio.auto_us,
    }
}

struct Assembled {
    controller: Controller,
    maps: ActuatorMaps,
    bands: ModeBands,
}

fn assemble(cfg: &Config, calib: Option<&EncoderCalibration>) -> eyre::Result<Assembled> {
    let controller = Controller::from_config(cfg, calib)?;
    let maps = ActuatorMaps::try_from(cfg).map_err(eyre::Report::new)?;
    let bands = ModeBands::from(&cfg.radio);
    bands.validate().map_err(eyre::Report::new)?;
    Ok(Assembled {
        controller,
        maps,
        bands,
    })
}

/// One JSON object per tick; numbers are null when the stage did not run.
pub fn report_json(r: &TickReport) -> serde_json::Value {
    let a = r.actuation;
    json!({
        "tick": r.tick,
        "mode": r.mode.as_str(),
        "transition": r.transition.map(|t| t.to.as_str()),
        "pulses": r.pulses,
        "setpoint": a.map(|a| a.setpoint),
        "measured": a.map(|a| a.measured),
        "estimate": a.map(|a| a.estimate),
        "compensated": a.map(|a| a.compensated),
        "predicted": a.map(|a| a.predicted),
        "esc_predicted": a.map(|a| a.esc_predicted),
        "command": a.map(|a| a.command),
        "fault": r.fault.map(|f| f.to_string()),
        "overrun": r.overrun,
        "esc_us": r.esc_us,
        "servo_us": r.servo_us,
    })
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Final result line on stdout.
fn print_summary(
    command: &str,
    sp: Setpoint,
    stats: &RunStats,
    period: Duration,
    estimate: Option<f32>,
    speed: Option<f32>,
    json: bool,
) {
    if json {
        let line = json!({
            "timestamp": unix_timestamp(),
            "command": command,
            "target_mps": sp.speed_mps,
            "duration_ms": stats.ticks.saturating_mul(saturating_us(period)) / 1_000,
            "ticks": stats.ticks,
            "auto_ticks": stats.auto_ticks,
            "faults": stats.faults,
            "overruns": stats.overruns,
            "final_estimate_mps": estimate,
            "final_speed_mps": speed,
        });
        println!("{line}");
    } else {
        let shown = speed.or(estimate).unwrap_or(0.0);
        println!(
            "{command} complete: {} ticks, speed {shown:.3} m/s (target {:.3}), {} faults, {} overruns",
            stats.ticks, sp.speed_mps, stats.faults, stats.overruns
        );
    }
}

/// Print latency/jitter stats to stderr.
pub fn print_stats(stats: &RunStats, period: Duration) {
    let l = &stats.latency;
    eprintln!("\n--- erumby Stats ---");
    eprintln!("Ticks: {} (auto {})", stats.ticks, stats.auto_ticks);
    eprintln!("Period (us): {}", saturating_us(period));
    eprintln!(
        "Latency min/avg/max/stdev (us): {} / {:.1} / {} / {:.1}",
        l.min_us(),
        l.mean_us(),
        l.max_us(),
        l.stdev_us()
    );
    eprintln!("Missed deadlines (> period): {}", stats.missed_deadlines);
    eprintln!("Overruns discarded: {}", stats.overruns);
    eprintln!("Numerical faults: {}", stats.faults);
    eprintln!("Mode changes: {}", stats.mode_changes);
    eprintln!("--------------------\n");
}

/// Closed loop against the simulated drivetrain, as fast as possible.
pub fn simulate(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    sp: Setpoint,
    duration: Duration,
    stats: bool,
    json: bool,
) -> eyre::Result<RunStats> {
    let Assembled {
        controller,
        maps,
        bands,
    } = assemble(cfg, calib)?;
    let timing = controller.timing();
    let plant = SimulatedPlant::new(sim_config(cfg, timing));
    let frame = auto_frame(cfg);
    let frames = move || Some(frame);
    let mut runner = Runner::new(
        controller,
        maps,
        bands,
        (plant.encoder(), plant.vehicle(), frames),
        Unpaced,
    );
    let ticks = ticks_for(duration, timing.period());
    tracing::info!(
        target_mps = sp.speed_mps,
        ticks,
        delay_ticks = timing.delay_ticks(),
        "simulation start"
    );
    let never = AtomicBool::new(false);
    let run_stats = runner.run(
        Some(ticks),
        |_| sp,
        &never,
        |r| {
            if json {
                println!("{}", report_json(r));
            }
        },
    )?;
    if stats {
        print_stats(&run_stats, timing.period());
    }
    let estimate = runner.controller().last_actuation().map(|a| a.estimate);
    print_summary(
        "simulate",
        sp,
        &run_stats,
        timing.period(),
        estimate,
        Some(plant.speed_mps()),
        json,
    );
    Ok(run_stats)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
type Drivetrain = (
    erumby_hardware::pwm::GpioEncoder,
    erumby_hardware::Rover<erumby_hardware::pwm::PwmChannel, erumby_hardware::pwm::PwmChannel>,
);

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_drivetrain(cfg: &Config) -> eyre::Result<Drivetrain> {
    use erumby_hardware::pwm::{GpioEncoder, PwmChannel};
    use eyre::WrapErr;

    let Some(pins) = cfg.pins else {
        eyre::bail!("pins missing: [pins] encoder, esc_pwm and servo_pwm are required for run");
    };
    let encoder = GpioEncoder::open(pins.encoder).wrap_err("open encoder gpio")?;
    let esc = PwmChannel::open(pins.esc_pwm, cfg.esc.idle_us).wrap_err("open esc pwm")?;
    let servo = PwmChannel::open(pins.servo_pwm, cfg.servo.center_us).wrap_err("open servo pwm")?;
    let rover = erumby_hardware::Rover::new(esc, servo, esc_limits(cfg), servo_limits(cfg));
    tracing::info!(
        encoder = pins.encoder,
        esc_pwm = pins.esc_pwm,
        servo_pwm = pins.servo_pwm,
        "hardware drivetrain ready"
    );
    Ok((encoder, rover))
}

/// Simulated plant behind the same range-checked rover as the hardware.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_drivetrain(
    cfg: &Config,
    timing: Timing,
) -> (
    erumby_hardware::SimEncoder,
    erumby_hardware::Rover<PlantPwm, erumby_hardware::SimPwm>,
) {
    let plant = SimulatedPlant::new(sim_config(cfg, timing));
    let rover = erumby_hardware::Rover::new(
        PlantPwm(plant.vehicle()),
        erumby_hardware::SimPwm::default(),
        esc_limits(cfg),
        servo_limits(cfg),
    );
    tracing::info!("hardware backend not compiled in; driving the simulated plant");
    (plant.encoder(), rover)
}

/// ESC channel that feeds its pulse width into the simulated drivetrain.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
struct PlantPwm(erumby_hardware::SimVehicle);

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
impl erumby_traits::PwmOutput for PlantPwm {
    fn set_pulse_us(&mut self, pulse_us: u16) -> Result<(), erumby_traits::BoxError> {
        use erumby_traits::Vehicle;
        self.0.speed(pulse_us)
    }

    fn disable(&mut self) -> Result<(), erumby_traits::BoxError> {
        use erumby_traits::Vehicle;
        self.0.stop()
    }
}

/// Real-time run until `duration` elapses or `shutdown` is raised.
pub fn run(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    sp: Setpoint,
    duration: Option<Duration>,
    stats: bool,
    json: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<RunStats> {
    let Assembled {
        controller,
        maps,
        bands,
    } = assemble(cfg, calib)?;
    let timing = controller.timing();

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let (encoder, vehicle) = open_drivetrain(cfg)?;
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let (encoder, vehicle) = open_drivetrain(cfg, timing);

    // No receiver driver: the sampler is fed a mode switch held in auto.
    let frames = RadioSampler::spawn(
        SimRadio::constant(auto_frame(cfg)),
        timing.period(),
        Duration::from_millis(cfg.radio.read_timeout_ms),
        Duration::from_millis(cfg.radio.failsafe_ms),
        MonotonicClock::new(),
    );
    let mut runner = Runner::new(
        controller,
        maps,
        bands,
        (encoder, vehicle, frames),
        MonotonicClock::new(),
    );
    let max_ticks = duration.map(|d| ticks_for(d, timing.period()));
    tracing::info!(
        target_mps = sp.speed_mps,
        steering = sp.steering,
        max_ticks,
        "run start"
    );
    let run_stats = runner.run(
        max_ticks,
        |_| sp,
        shutdown,
        |r| {
            if json {
                println!("{}", report_json(r));
            }
        },
    )?;
    if stats {
        print_stats(&run_stats, timing.period());
    }
    let estimate = runner.controller().last_actuation().map(|a| a.estimate);
    print_summary(
        "run",
        sp,
        &run_stats,
        timing.period(),
        estimate,
        None,
        json,
    );
    Ok(run_stats)
}

/// Build everything `run` would use and describe it on stdout.
pub fn self_check(cfg: &Config, calib: Option<&EncoderCalibration>) -> eyre::Result<()> {
    let Assembled {
        controller, maps, ..
    } = assemble(cfg, calib)?;
    let timing = controller.timing();

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let backend = {
        let _drivetrain = open_drivetrain(cfg)?;
        "hardware"
    };
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let backend = "sim";

    println!("OK");
    println!("backend: {backend}");
    println!(
        "period: {} us, dead time: {} ticks",
        saturating_us(timing.period()),
        timing.delay_ticks()
    );
    println!(
        "observer states: {}, encoder table: {} points{}",
        controller.observer().state_size(),
        controller.table().len(),
        if calib.is_some() { " (calibration)" } else { "" }
    );
    println!(
        "esc idle: {} us, servo centre: {} us",
        maps.esc.idle_us(),
        maps.steering.center_us()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setpoint_rejects_bad_requests() {
        assert!(setpoint(0.5, 0.0).is_ok());
        assert!(setpoint(-0.1, 0.0).is_err());
        assert!(setpoint(f32::NAN, 0.0).is_err());
        assert!(setpoint(0.5, 1.5).is_err());
    }

    #[test]
    fn sim_gain_scales_the_output_map() {
        let mut cfg = erumby_config::load_toml("").unwrap();
        cfg.sim.gain = 2.0;
        cfg.model.nonlin_b = 0.4;
        let timing = Timing::from_millis(cfg.timing.period_ms, cfg.timing.dead_time_ms).unwrap();
        let sim = sim_config(&cfg, timing);
        assert_eq!(sim.nonlin_a, 0.5);
        assert!((sim.nonlin_b - 0.1).abs() < 1e-6);
        assert_eq!(sim.delay_ticks, 20);
        assert_eq!(sim.esc.max_us, 2032);
    }

    #[test]
    fn report_json_has_nulls_outside_auto() {
        let r = TickReport::default();
        let v = report_json(&r);
        assert_eq!(v["mode"], "secure");
        assert!(v["compensated"].is_null());
        assert!(v["esc_us"].is_null());
    }
}
