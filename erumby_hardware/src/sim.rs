//! Simulated drivetrain, encoder and radio for offline runs and tests.
//!
//! The plant is the same first-order Wiener model the controller assumes:
//! `x' = -a x + a u` with output `w = phi(x)`, preceded by a pure dead time
//! of `delay_ticks` samples. The encoder integrates wheel travel into whole
//! pulses, carrying the fractional remainder to the next read.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use erumby_traits::{BoxError, Encoder, PwmOutput, Radio, RadioFrame, Vehicle};

use crate::error::HwError;
use crate::rover::EscLimits;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub period: Duration,
    pub pole: f32,
    pub nonlin_a: f32,
    pub nonlin_b: f32,
    pub delay_ticks: usize,
    pub pulses_per_meter: f32,
    pub esc: EscLimits,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            pole: 5.0,
            nonlin_a: 1.0,
            nonlin_b: 0.0,
            delay_ticks: 5,
            pulses_per_meter: 1000.0,
            esc: EscLimits::default(),
        }
    }
}

#[derive(Debug)]
struct PlantState {
    cfg: SimConfig,
    a_d: f32,
    b_d: f32,
    x: f32,
    drive: f32,
    steering_us: u16,
    pipeline: VecDeque<f32>,
    remainder: f32,
    speed_mps: f32,
}

impl PlantState {
    fn phi(&self, x: f32) -> f32 {
        let (c1, c2) = (self.cfg.nonlin_a, self.cfg.nonlin_b);
        if c2 == 0.0 {
            x / c1
        } else {
            ((c1 * c1 + 4.0 * c2 * x).max(0.0).sqrt() - c1) / (2.0 * c2)
        }
    }

    fn step(&mut self) -> f32 {
        self.pipeline.push_back(self.drive);
        let u = self.pipeline.pop_front().unwrap_or(0.0);
        self.x = self.a_d * self.x + self.b_d * u;
        self.speed_mps = self.phi(self.x);
        self.speed_mps
    }
}

/// Shared plant handle; hand out an encoder and a vehicle that both talk to it.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Rc<RefCell<PlantState>>,
}

impl SimulatedPlant {
    pub fn new(cfg: SimConfig) -> Self {
        let ts = cfg.period.as_secs_f32();
        let a_d = 1.0 / (1.0 + cfg.pole * ts);
        let state = PlantState {
            cfg,
            a_d,
            b_d: a_d * cfg.pole * ts,
            x: 0.0,
            drive: 0.0,
            steering_us: 0,
            pipeline: std::iter::repeat_n(0.0, cfg.delay_ticks).collect(),
            remainder: 0.0,
            speed_mps: 0.0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn encoder(&self) -> SimEncoder {
        SimEncoder {
            plant: self.clone(),
        }
    }

    pub fn vehicle(&self) -> SimVehicle {
        SimVehicle {
            plant: self.clone(),
        }
    }

    /// Normalized drive currently commanded (before the dead time).
    pub fn drive(&self) -> f32 {
        self.state.borrow().drive
    }

    pub fn speed_mps(&self) -> f32 {
        self.state.borrow().speed_mps
    }

    pub fn steering_us(&self) -> u16 {
        self.state.borrow().steering_us
    }
}

pub struct SimEncoder {
    plant: SimulatedPlant,
}

impl Encoder for SimEncoder {
    fn read_pulses(&mut self) -> Result<u32, BoxError> {
        let mut s = self.plant.state.borrow_mut();
        let speed = s.step();
        let travel = speed.max(0.0) * s.cfg.period.as_secs_f32() * s.cfg.pulses_per_meter;
        let total = travel + s.remainder;
        let whole = total.floor();
        s.remainder = total - whole;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(whole as u32)
    }
}

pub struct SimVehicle {
    plant: SimulatedPlant,
}

impl Vehicle for SimVehicle {
    fn speed(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        let mut s = self.plant.state.borrow_mut();
        let EscLimits { idle_us, max_us, .. } = s.cfg.esc;
        let span = f32::from(max_us.saturating_sub(idle_us)).max(1.0);
        let drive = (f32::from(pulse_us) - f32::from(idle_us)) / span;
        s.drive = drive.clamp(0.0, 1.0);
        Ok(())
    }

    fn steer(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        self.plant.state.borrow_mut().steering_us = pulse_us;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.plant.state.borrow_mut().drive = 0.0;
        Ok(())
    }
}

/// PWM channel that only remembers the last pulse width written.
#[derive(Debug, Default)]
pub struct SimPwm {
    pub last_us: Option<u16>,
}

impl PwmOutput for SimPwm {
    fn set_pulse_us(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        self.last_us = Some(pulse_us);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        self.last_us = None;
        Ok(())
    }
}

/// Radio that replays a script of frames, then repeats the last one forever.
/// An empty script times out on every read, like a receiver with no link.
#[derive(Debug, Clone)]
pub struct SimRadio {
    frames: VecDeque<RadioFrame>,
    last: Option<RadioFrame>,
}

impl SimRadio {
    pub fn new(frames: impl IntoIterator<Item = RadioFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            last: None,
        }
    }

    pub fn constant(frame: RadioFrame) -> Self {
        Self::new([frame])
    }
}

impl Radio for SimRadio {
    fn read(&mut self, timeout: Duration) -> Result<RadioFrame, BoxError> {
        if let Some(f) = self.frames.pop_front() {
            self.last = Some(f);
        }
        match self.last {
            Some(f) => Ok(f),
            None => {
                std::thread::sleep(timeout);
                Err(Box::new(HwError::Timeout))
            }
        }
    }
}
