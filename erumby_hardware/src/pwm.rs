//! Raspberry Pi backends: hardware PWM channels and an interrupt-driven
//! wheel encoder.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use erumby_traits::{BoxError, Encoder, PwmOutput};
use rppal::gpio::{Gpio, InputPin, Trigger};
use rppal::pwm::{Channel, Polarity, Pwm};

use crate::error::{HwError, Result};

/// Servo-style PWM frame (50 Hz).
const FRAME: Duration = Duration::from_millis(20);

pub struct PwmChannel {
    pwm: Pwm,
}

impl PwmChannel {
    /// Open hardware PWM channel 0 or 1 at `initial_us`.
    pub fn open(channel: u8, initial_us: u16) -> Result<Self> {
        let ch = match channel {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            _ => return Err(HwError::Pwm(format!("no pwm channel {channel}"))),
        };
        let pwm = Pwm::with_period(
            ch,
            FRAME,
            Duration::from_micros(u64::from(initial_us)),
            Polarity::Normal,
            true,
        )
        .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(Self { pwm })
    }
}

impl PwmOutput for PwmChannel {
    fn set_pulse_us(&mut self, pulse_us: u16) -> std::result::Result<(), BoxError> {
        self.pwm
            .set_pulse_width(Duration::from_micros(u64::from(pulse_us)))
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as BoxError)
    }

    fn disable(&mut self) -> std::result::Result<(), BoxError> {
        self.pwm
            .disable()
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as BoxError)
    }
}

/// Counts rising edges on one GPIO line.
pub struct GpioEncoder {
    _pin: InputPin,
    count: Arc<AtomicU32>,
}

impl GpioEncoder {
    pub fn open(bcm_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        pin.set_async_interrupt(Trigger::RisingEdge, move |_level| {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .map_err(|e| HwError::Gpio(e.to_string()))?;
        tracing::info!(bcm_pin, "encoder interrupt armed");
        Ok(Self { _pin: pin, count })
    }
}

impl Encoder for GpioEncoder {
    fn read_pulses(&mut self) -> std::result::Result<u32, BoxError> {
        Ok(self.count.swap(0, Ordering::Relaxed))
    }
}
