//! Controller driving the simulated drivetrain through the ESC map.

use std::time::Duration;

use erumby_core::{
    ControlCfg, Controller, EscMap, LookupTable, NumericalFault, OutOfRangePolicy, PiGains,
    PlantModel, TickStatus, Timing,
};
use erumby_hardware::sim::{SimConfig, SimulatedPlant};
use erumby_traits::{Encoder, Vehicle};
use rstest::rstest;

const PERIOD: Duration = Duration::from_millis(10);
const DELAY: usize = 5;
// 1 pulse per tick is 1 mm/s at this resolution.
const PULSES_PER_METER: f32 = 100_000.0;

fn sim(nonlin_a: f32) -> SimulatedPlant {
    SimulatedPlant::new(SimConfig {
        period: PERIOD,
        pole: 5.0,
        nonlin_a,
        nonlin_b: 0.0,
        delay_ticks: DELAY,
        pulses_per_meter: PULSES_PER_METER,
        ..SimConfig::default()
    })
}

fn controller(gains: PiGains, setpoint: f32) -> Controller {
    Controller::builder()
        .with_timing(Timing::new(PERIOD, DELAY).unwrap())
        // pulses per tick -> m/s
        .with_table(LookupTable::linear(0.0, 10_000.0, 0.0, 10.0).unwrap())
        .with_model(PlantModel {
            a: 5.0,
            nonlin_a: 1.0,
            nonlin_b: 0.0,
        })
        .with_control(ControlCfg {
            gains,
            ..ControlCfg::default()
        })
        .with_setpoint(setpoint)
        .build()
        .unwrap()
}

/// Run `ticks` periods and return the plant speed after each.
fn drive(ctrl: &mut Controller, plant: &SimulatedPlant, ticks: usize) -> Vec<f32> {
    let esc = EscMap::new(1500, 2032).unwrap();
    let mut encoder = plant.encoder();
    let mut vehicle = plant.vehicle();
    let mut speeds = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        let pulses = encoder.read_pulses().unwrap();
        #[allow(clippy::cast_precision_loss)]
        let status = ctrl.tick(pulses as f32);
        assert!(!status.is_fault(), "unexpected fault: {status:?}");
        vehicle.speed(esc.pulse_us(status.command())).unwrap();
        speeds.push(plant.speed_mps());
    }
    speeds
}

#[rstest]
#[case(0.3)]
#[case(0.6)]
fn step_settles_on_setpoint_without_large_overshoot(#[case] setpoint: f32) {
    let plant = sim(1.0);
    let mut ctrl = controller(PiGains::default(), setpoint);
    let speeds = drive(&mut ctrl, &plant, 600);

    // Nothing can move before the dead time has elapsed.
    assert!(speeds[..DELAY].iter().all(|v| *v == 0.0));
    let peak = speeds.iter().copied().fold(0.0_f32, f32::max);
    assert!(peak < setpoint * 1.2, "peak {peak} for setpoint {setpoint}");
    let last = speeds[speeds.len() - 1];
    assert!((last - setpoint).abs() < 0.01, "final speed {last}");
}

#[rstest]
fn first_command_saturates_towards_setpoint() {
    let plant = sim(1.0);
    let mut ctrl = controller(PiGains::default(), 1.0);
    let mut encoder = plant.encoder();
    let pulses = encoder.read_pulses().unwrap();
    assert_eq!(pulses, 0);
    let status = ctrl.tick(0.0);
    assert_eq!(status.command(), 1.0);
    let a = ctrl.last_actuation().copied().unwrap();
    assert_eq!(a.measured, 0.0);
    assert_eq!(a.setpoint, 1.0);
    // The models have already seen the command.
    assert!(a.predicted > 0.0);
    assert!(a.esc_predicted > a.predicted);
}

#[rstest]
fn integral_action_removes_model_gain_mismatch() {
    // Plant delivers 80 % of the modelled speed.
    let plant = sim(1.25);
    let mut ctrl = controller(PiGains { kp: 1.0, ki: 2.0 }, 0.5);
    let speeds = drive(&mut ctrl, &plant, 2000);
    let last = speeds[speeds.len() - 1];
    assert!((last - 0.5).abs() < 0.01, "final speed {last}");
    assert!(ctrl.pi().integral() > 0.0);
}

#[rstest]
fn setpoint_change_is_followed() {
    let plant = sim(1.0);
    let mut ctrl = controller(PiGains::default(), 0.2);
    drive(&mut ctrl, &plant, 400);
    ctrl.set_setpoint(0.5);
    let speeds = drive(&mut ctrl, &plant, 600);
    assert!((speeds[speeds.len() - 1] - 0.5).abs() < 0.01);

    // Non-finite requests are ignored.
    ctrl.set_setpoint(f32::INFINITY);
    assert_eq!(ctrl.setpoint(), 0.5);
}

#[rstest]
fn divergent_measurement_faults_and_resets() {
    let mut ctrl = Controller::builder()
        .with_timing(Timing::new(PERIOD, DELAY).unwrap())
        .with_table(
            LookupTable::linear(0.0, 10_000.0, 0.0, 10.0)
                .unwrap()
                .with_policy(OutOfRangePolicy::Extrapolate),
        )
        .with_setpoint(0.5)
        .build()
        .unwrap();
    for _ in 0..10 {
        assert!(!ctrl.tick(500.0).is_fault());
    }
    assert!(ctrl.observer().state()[0] != 0.0);

    match ctrl.tick(1.0e7) {
        TickStatus::Fault { fault, fallback } => {
            assert_eq!(fault, NumericalFault::Diverged("measurement"));
            assert_eq!(fallback, 0.0);
        }
        other => panic!("expected fault, got {other:?}"),
    }
    assert!(ctrl.observer().state().iter().all(|v| *v == 0.0));
    assert_eq!(ctrl.predictor().state_predict(), 0.0);
    assert_eq!(ctrl.pi().integral(), 0.0);
    assert!(ctrl.last_actuation().is_none());
    // The setpoint survives a fault.
    assert_eq!(ctrl.setpoint(), 0.5);
}

#[rstest]
fn nan_measurement_faults() {
    let mut ctrl = controller(PiGains::default(), 0.5);
    let status = ctrl.tick(f32::NAN);
    assert_eq!(
        status,
        TickStatus::Fault {
            fault: NumericalFault::NonFinite("measurement"),
            fallback: 0.0,
        }
    );
    // Recovers on the next good sample.
    assert!(!ctrl.tick(0.0).is_fault());
}

#[rstest]
fn reset_setpoint_clears_integral() {
    let plant = sim(1.0);
    let mut ctrl = controller(PiGains { kp: 1.0, ki: 2.0 }, 0.5);
    drive(&mut ctrl, &plant, 50);
    assert!(ctrl.pi().integral() != 0.0);
    ctrl.reset_setpoint(0.0);
    assert_eq!(ctrl.pi().integral(), 0.0);
    assert_eq!(ctrl.setpoint(), 0.0);
}

#[rstest]
fn unit_step_reacts_before_the_dead_time_and_settles() {
    let plant = sim(1.0);
    let mut ctrl = controller(PiGains::default(), 1.0);
    let esc = EscMap::new(1500, 2032).unwrap();
    let mut encoder = plant.encoder();
    let mut vehicle = plant.vehicle();
    let mut commands = Vec::new();
    let mut speeds = Vec::new();
    for _ in 0..600 {
        #[allow(clippy::cast_precision_loss)]
        let pulses = encoder.read_pulses().unwrap() as f32;
        let command = ctrl.tick(pulses).command();
        commands.push(command);
        vehicle.speed(esc.pulse_us(command)).unwrap();
        speeds.push(plant.speed_mps());
    }
    // The measurement is still zero here; only the model has moved.
    assert!(commands[..2].iter().any(|c| *c > 0.5), "{:?}", &commands[..2]);
    assert!(speeds[..DELAY].iter().all(|v| *v == 0.0));

    let tail = &speeds[500..];
    let (lo, hi) = tail
        .iter()
        .fold((f32::MAX, f32::MIN), |(l, h), v| (l.min(*v), h.max(*v)));
    assert!(hi - lo < 0.01, "tail still moving: {lo}..{hi}");
    assert!((speeds[599] - 1.0).abs() < 0.02, "final speed {}", speeds[599]);
}
