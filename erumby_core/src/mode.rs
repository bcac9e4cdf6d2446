//! Drive-mode selection from the radio mode channel.
//!
//! The transmitter's three-position switch produces one of three pulse
//! widths. A pulse outside every band, or no radio at all, means `Secure`.

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriveMode {
    /// Speed loop drives the ESC.
    Auto,
    /// Vehicle held stopped.
    #[default]
    Secure,
    /// Radio sticks drive ESC and servo directly.
    Manual,
}

impl DriveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Secure => "secure",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centre pulse width of each switch position and the accepted deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeBands {
    pub auto_us: u16,
    pub secure_us: u16,
    pub manual_us: u16,
    pub tolerance_us: u16,
}

impl Default for ModeBands {
    fn default() -> Self {
        Self {
            auto_us: 2024,
            secure_us: 1504,
            manual_us: 980,
            tolerance_us: 100,
        }
    }
}

impl ModeBands {
    pub fn validate(&self) -> Result<(), BuildError> {
        let centres = [self.auto_us, self.secure_us, self.manual_us];
        let width = u32::from(self.tolerance_us) * 2;
        for (i, a) in centres.iter().enumerate() {
            for b in &centres[i + 1..] {
                if u32::from(a.abs_diff(*b)) <= width {
                    return Err(BuildError::InvalidConfig("radio mode bands overlap"));
                }
            }
        }
        Ok(())
    }

    pub fn decode(&self, pulse_us: u16) -> DriveMode {
        let near = |centre: u16| pulse_us.abs_diff(centre) <= self.tolerance_us;
        if near(self.secure_us) {
            DriveMode::Secure
        } else if near(self.auto_us) {
            DriveMode::Auto
        } else if near(self.manual_us) {
            DriveMode::Manual
        } else {
            DriveMode::Secure
        }
    }
}

/// A mode change observed by `ModeSelector::update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DriveMode,
    pub to: DriveMode,
}

/// Tracks the active mode; starts in `Secure`.
#[derive(Debug, Clone)]
pub struct ModeSelector {
    bands: ModeBands,
    current: DriveMode,
}

impl ModeSelector {
    pub fn new(bands: ModeBands) -> Self {
        Self {
            bands,
            current: DriveMode::Secure,
        }
    }

    pub fn current(&self) -> DriveMode {
        self.current
    }

    /// Feed the latest mode pulse (`None` when the radio is silent).
    pub fn update(&mut self, mode_pulse_us: Option<u16>) -> Option<Transition> {
        let next = mode_pulse_us.map_or(DriveMode::Secure, |p| self.bands.decode(p));
        if next == self.current {
            return None;
        }
        let t = Transition {
            from: self.current,
            to: next,
        };
        self.current = next;
        tracing::info!(from = %t.from, to = %t.to, "drive mode change");
        Some(t)
    }
}
