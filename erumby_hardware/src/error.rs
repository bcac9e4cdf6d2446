use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("pwm error: {0}")]
    Pwm(String),
    #[error("radio timeout")]
    Timeout,
    #[error("{channel} pulse {pulse_us}us outside [{min_us}, {max_us}]")]
    OutOfRange {
        channel: &'static str,
        pulse_us: u16,
        min_us: u16,
        max_us: u16,
    },
    #[error("alarm: {0}")]
    Alarm(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
