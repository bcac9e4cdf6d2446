//! The one concrete vehicle: an ESC and a steering servo on two PWM channels.

use erumby_traits::{BoxError, PwmOutput, Vehicle};

use crate::error::HwError;

/// ESC pulse-width limits in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscLimits {
    pub min_us: u16,
    pub idle_us: u16,
    pub max_us: u16,
}

impl Default for EscLimits {
    fn default() -> Self {
        Self {
            min_us: 1000,
            idle_us: 1500,
            max_us: 2032,
        }
    }
}

/// Steering servo pulse widths in microseconds. Right and left may be in
/// either order depending on linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoLimits {
    pub right_us: u16,
    pub center_us: u16,
    pub left_us: u16,
}

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            right_us: 1052,
            center_us: 1476,
            left_us: 1890,
        }
    }
}

impl ServoLimits {
    fn bounds(&self) -> (u16, u16) {
        (
            self.right_us.min(self.left_us),
            self.right_us.max(self.left_us),
        )
    }
}

pub struct Rover<E, S> {
    esc: E,
    servo: S,
    esc_limits: EscLimits,
    servo_limits: ServoLimits,
    auto: bool,
    alarm: Option<&'static str>,
}

impl<E: PwmOutput, S: PwmOutput> Rover<E, S> {
    pub fn new(esc: E, servo: S, esc_limits: EscLimits, servo_limits: ServoLimits) -> Self {
        Self {
            esc,
            servo,
            esc_limits,
            servo_limits,
            auto: false,
            alarm: None,
        }
    }

    pub fn alarm(&self) -> Option<&'static str> {
        self.alarm
    }

    pub fn clear_alarm(&mut self) {
        if let Some(reason) = self.alarm.take() {
            tracing::info!(reason, "rover alarm cleared");
        }
    }

    fn raise(&mut self, reason: &'static str) -> BoxError {
        tracing::error!(reason, "rover alarm");
        self.alarm = Some(reason);
        Box::new(HwError::Alarm(reason))
    }
}

impl<E: PwmOutput, S: PwmOutput> Vehicle for Rover<E, S> {
    fn speed(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        if self.alarm.is_some() {
            return self.esc.set_pulse_us(self.esc_limits.idle_us);
        }
        let EscLimits { min_us, idle_us, max_us } = self.esc_limits;
        if (min_us..=max_us).contains(&pulse_us) {
            return self.esc.set_pulse_us(pulse_us);
        }
        tracing::warn!(pulse_us, min_us, max_us, "esc command out of range");
        if self.auto {
            self.stop()?;
            return Err(self.raise("esc command out of range"));
        }
        self.esc.set_pulse_us(idle_us)
    }

    fn steer(&mut self, pulse_us: u16) -> Result<(), BoxError> {
        if self.alarm.is_some() {
            return self.servo.set_pulse_us(self.servo_limits.center_us);
        }
        let (lo, hi) = self.servo_limits.bounds();
        if (lo..=hi).contains(&pulse_us) {
            return self.servo.set_pulse_us(pulse_us);
        }
        tracing::warn!(pulse_us, lo, hi, "servo command out of range");
        if self.auto {
            self.stop()?;
            return Err(self.raise("servo command out of range"));
        }
        self.servo.set_pulse_us(self.servo_limits.center_us)
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.esc.set_pulse_us(self.esc_limits.idle_us)?;
        self.servo.set_pulse_us(self.servo_limits.center_us)
    }

    /// Out-of-range commands raise an alarm only while automatic control is
    /// engaged; a human driving in manual is just clamped to idle/centre.
    fn set_auto(&mut self, auto: bool) {
        self.auto = auto;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<u16>>>);

    impl PwmOutput for Recorder {
        fn set_pulse_us(&mut self, pulse_us: u16) -> Result<(), BoxError> {
            self.0.borrow_mut().push(pulse_us);
            Ok(())
        }
        fn disable(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn rover() -> (Rover<Recorder, Recorder>, Recorder, Recorder) {
        let esc = Recorder::default();
        let servo = Recorder::default();
        let r = Rover::new(
            esc.clone(),
            servo.clone(),
            EscLimits::default(),
            ServoLimits::default(),
        );
        (r, esc, servo)
    }

    #[test]
    fn in_range_commands_pass_through() {
        let (mut r, esc, servo) = rover();
        r.speed(1600).unwrap();
        r.steer(1200).unwrap();
        assert_eq!(esc.0.borrow().last(), Some(&1600));
        assert_eq!(servo.0.borrow().last(), Some(&1200));
    }

    #[test]
    fn manual_out_of_range_falls_back_without_alarm() {
        let (mut r, esc, servo) = rover();
        r.speed(2500).unwrap();
        r.steer(900).unwrap();
        assert_eq!(esc.0.borrow().last(), Some(&1500));
        assert_eq!(servo.0.borrow().last(), Some(&1476));
        assert!(r.alarm().is_none());
    }

    #[test]
    fn auto_out_of_range_latches_alarm_and_stops() {
        let (mut r, esc, _servo) = rover();
        r.set_auto(true);
        let err = r.speed(2500).unwrap_err();
        assert!(err.to_string().contains("alarm"));
        assert_eq!(r.alarm(), Some("esc command out of range"));
        // Latched: valid commands keep the ESC idle until cleared.
        r.speed(1700).unwrap();
        assert_eq!(esc.0.borrow().last(), Some(&1500));
        r.clear_alarm();
        r.speed(1700).unwrap();
        assert_eq!(esc.0.borrow().last(), Some(&1700));
    }

    #[test]
    fn latched_alarm_holds_servo_centred() {
        let (mut r, _esc, servo) = rover();
        r.set_auto(true);
        assert!(r.steer(900).is_err());
        r.steer(1200).unwrap();
        assert_eq!(servo.0.borrow().last(), Some(&1476));
        r.clear_alarm();
        r.steer(1200).unwrap();
        assert_eq!(servo.0.borrow().last(), Some(&1200));
    }
}
