//! Maps from normalized commands or raw radio pulses to actuator pulse widths.

use crate::error::BuildError;
use crate::lookup::{LookupTable, OutOfRangePolicy};

#[inline]
fn to_pulse(us: f32) -> u16 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let p = us.round().clamp(0.0, f32::from(u16::MAX)) as u16;
    p
}

/// Normalized drive `[0, 1]` to ESC pulse `[idle_us, max_us]`.
#[derive(Debug, Clone)]
pub struct EscMap {
    table: LookupTable,
}

impl EscMap {
    pub fn new(idle_us: u16, max_us: u16) -> Result<Self, BuildError> {
        if max_us <= idle_us {
            return Err(BuildError::InvalidConfig("esc max_us must be > idle_us"));
        }
        let table = LookupTable::linear(0.0, 1.0, f32::from(idle_us), f32::from(max_us))?;
        Ok(Self { table })
    }

    pub fn pulse_us(&self, command: f32) -> u16 {
        to_pulse(self.table.evaluate(command))
    }

    pub fn idle_us(&self) -> u16 {
        to_pulse(self.table.evaluate(0.0))
    }
}

/// Normalized steering `[-1, 1]` (right to left) to servo pulse.
#[derive(Debug, Clone)]
pub struct SteeringMap {
    table: LookupTable,
}

impl SteeringMap {
    pub fn new(right_us: u16, center_us: u16, left_us: u16) -> Result<Self, BuildError> {
        let monotone = (right_us < center_us && center_us < left_us)
            || (right_us > center_us && center_us > left_us);
        if !monotone {
            return Err(BuildError::InvalidConfig(
                "servo center_us must lie strictly between right_us and left_us",
            ));
        }
        let table = LookupTable::new([
            (-1.0, f32::from(right_us)),
            (0.0, f32::from(center_us)),
            (1.0, f32::from(left_us)),
        ])?;
        Ok(Self { table })
    }

    pub fn pulse_us(&self, steering: f32) -> u16 {
        to_pulse(self.table.evaluate(steering))
    }

    pub fn center_us(&self) -> u16 {
        to_pulse(self.table.evaluate(0.0))
    }
}

/// Radio stick pulses to ESC/servo pulses for manual driving. Sticks
/// outside the calibrated travel saturate to fixed values.
#[derive(Debug, Clone)]
pub struct ManualMap {
    throttle: LookupTable,
    steering: LookupTable,
}

impl ManualMap {
    pub fn new(throttle: LookupTable, steering: LookupTable) -> Self {
        Self { throttle, steering }
    }

    /// Identity maps over the given ESC and servo travel; throttle outside
    /// saturates to idle on both sides, steering to the nearest lock.
    pub fn passthrough(
        esc: (u16, u16, u16),
        servo: (u16, u16, u16),
    ) -> Result<Self, BuildError> {
        let (min_us, idle_us, max_us) = esc;
        let throttle = LookupTable::new(
            [min_us, idle_us, max_us].map(|v| (f32::from(v), f32::from(v))),
        )?
        .with_policy(OutOfRangePolicy::Saturate {
            low: f32::from(idle_us),
            high: f32::from(idle_us),
        });
        let (right_us, center_us, left_us) = servo;
        let mut s = [right_us, center_us, left_us];
        s.sort_unstable();
        let steering = LookupTable::new(s.map(|v| (f32::from(v), f32::from(v))))?.with_policy(
            OutOfRangePolicy::Saturate {
                low: f32::from(s[0]),
                high: f32::from(s[2]),
            },
        );
        Ok(Self { throttle, steering })
    }

    pub fn throttle_table(&self) -> &LookupTable {
        &self.throttle
    }

    pub fn steering_table(&self) -> &LookupTable {
        &self.steering
    }

    pub fn throttle_us(&self, radio_us: u16) -> u16 {
        to_pulse(self.throttle.evaluate(f32::from(radio_us)))
    }

    pub fn steering_us(&self, radio_us: u16) -> u16 {
        to_pulse(self.steering.evaluate(f32::from(radio_us)))
    }
}

/// All pulse-width maps the tick runner needs.
#[derive(Debug, Clone)]
pub struct ActuatorMaps {
    pub esc: EscMap,
    pub steering: SteeringMap,
    pub manual: ManualMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esc_map_spans_idle_to_max() {
        let m = EscMap::new(1500, 2032).unwrap();
        assert_eq!(m.pulse_us(0.0), 1500);
        assert_eq!(m.pulse_us(1.0), 2032);
        assert_eq!(m.pulse_us(0.5), 1766);
        assert_eq!(m.pulse_us(3.0), 2032);
        assert_eq!(m.pulse_us(-1.0), 1500);
    }

    #[test]
    fn steering_map_accepts_reversed_linkage() {
        let m = SteeringMap::new(1890, 1476, 1052).unwrap();
        assert_eq!(m.pulse_us(-1.0), 1890);
        assert_eq!(m.center_us(), 1476);
        assert!(SteeringMap::new(1052, 1900, 1890).is_err());
    }

    #[test]
    fn manual_throttle_saturates_to_idle() {
        let m = ManualMap::passthrough((1000, 1500, 2032), (1052, 1476, 1890)).unwrap();
        assert_eq!(m.throttle_us(1700), 1700);
        assert_eq!(m.throttle_us(2200), 1500);
        assert_eq!(m.throttle_us(900), 1500);
        assert_eq!(m.steering_us(2000), 1890);
        assert_eq!(m.steering_us(900), 1052);
    }
}
