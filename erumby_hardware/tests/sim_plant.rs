use std::time::Duration;

use erumby_hardware::{SimConfig, SimPwm, SimRadio, SimulatedPlant};
use erumby_traits::{Encoder, PwmOutput, Radio, RadioFrame, Vehicle};
use rstest::rstest;

fn full_throttle(plant: &SimulatedPlant) {
    let mut v = plant.vehicle();
    v.speed(plant_max_us()).unwrap();
}

fn plant_max_us() -> u16 {
    SimConfig::default().esc.max_us
}

#[test]
fn dead_time_holds_output_at_rest() {
    let cfg = SimConfig {
        delay_ticks: 5,
        ..SimConfig::default()
    };
    let plant = SimulatedPlant::new(cfg);
    full_throttle(&plant);
    let mut enc = plant.encoder();
    for tick in 0..5 {
        assert_eq!(enc.read_pulses().unwrap(), 0, "tick {tick}");
        assert_eq!(plant.speed_mps(), 0.0);
    }
    enc.read_pulses().unwrap();
    assert!(plant.speed_mps() > 0.0);
}

#[rstest]
#[case(0)]
#[case(3)]
fn settles_to_unit_speed_at_full_drive(#[case] delay_ticks: usize) {
    let plant = SimulatedPlant::new(SimConfig {
        delay_ticks,
        ..SimConfig::default()
    });
    full_throttle(&plant);
    let mut enc = plant.encoder();
    let mut pulses = 0u32;
    for _ in 0..500 {
        pulses += enc.read_pulses().unwrap();
    }
    assert!((plant.speed_mps() - 1.0).abs() < 1e-3);
    // 500 ticks of 10 ms approach 5 m of travel at 1000 pulses/m, minus the rise.
    assert!(pulses > 4000 && pulses < 5000, "pulses = {pulses}");
}

#[test]
fn encoder_carries_fractional_pulses() {
    let plant = SimulatedPlant::new(SimConfig {
        delay_ticks: 0,
        pulses_per_meter: 15.0,
        ..SimConfig::default()
    });
    full_throttle(&plant);
    let mut enc = plant.encoder();
    for _ in 0..1000 {
        enc.read_pulses().unwrap();
    }
    // At 1 m/s, 10 ms and 15 pulses/m each read is 0.15 pulses.
    let burst: u32 = (0..100).map(|_| enc.read_pulses().unwrap()).sum();
    assert!((14..=16).contains(&burst), "burst = {burst}");
}

#[test]
fn stop_and_idle_pulse_zero_the_drive() {
    let plant = SimulatedPlant::new(SimConfig::default());
    let mut v = plant.vehicle();
    v.speed(1766).unwrap();
    assert!((plant.drive() - 0.5).abs() < 1e-3);
    v.stop().unwrap();
    assert_eq!(plant.drive(), 0.0);
    v.speed(1000).unwrap();
    assert_eq!(plant.drive(), 0.0);
    v.steer(1300).unwrap();
    assert_eq!(plant.steering_us(), 1300);
}

#[test]
fn radio_replays_script_then_holds_last_frame() {
    let a = RadioFrame {
        steering_us: 1476,
        throttle_us: 1500,
        mode_us: 1504,
    };
    let b = RadioFrame { mode_us: 2024, ..a };
    let mut r = SimRadio::new([a, b]);
    let t = Duration::from_millis(1);
    assert_eq!(r.read(t).unwrap(), a);
    assert_eq!(r.read(t).unwrap(), b);
    assert_eq!(r.read(t).unwrap(), b);
}

#[test]
fn silent_radio_times_out() {
    let mut r = SimRadio::new([]);
    let err = r.read(Duration::from_millis(1)).unwrap_err();
    assert!(err.to_string().contains("timeout"));
}

#[test]
fn sim_pwm_tracks_last_pulse() {
    let mut p = SimPwm::default();
    p.set_pulse_us(1500).unwrap();
    assert_eq!(p.last_us, Some(1500));
    p.disable().unwrap();
    assert_eq!(p.last_us, None);
}
