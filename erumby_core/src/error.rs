use thiserror::Error;

/// Per-tick numerical faults detected in the estimation pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NumericalFault {
    #[error("non-finite {0}")]
    NonFinite(&'static str),
    #[error("{0} diverged beyond the configured bound")]
    Diverged(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for radio")]
    Timeout,
    #[error("numerical fault: {0}")]
    Numerical(NumericalFault),
    #[error("tick overran its budget: {elapsed_us}us > {budget_us}us")]
    Overrun { elapsed_us: u64, budget_us: u64 },
    #[error("vehicle alarm: {0}")]
    Alarm(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing lookup table")]
    MissingTable,
    #[error("missing loop timing")]
    MissingTiming,
    #[error("lookup breakpoints must be strictly increasing (index {index})")]
    NonMonotonicTable { index: usize },
    #[error("observer discretization is singular")]
    SingularObserver,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// `CyclicBuffer::at` asked for a sample older than the buffer holds.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("index {index} out of range for buffer holding {len} samples")]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
