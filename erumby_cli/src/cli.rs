//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "erumby", version, about = "erumby vehicle speed control")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/erumby_config.toml")]
    pub config: PathBuf,

    /// Optional encoder calibration CSV (strict header)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines instead of pretty; per-tick reports become JSON too
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the vehicle in real time (radio mode switch decides who drives)
    Run {
        /// Speed setpoint in m/s while in auto mode
        #[arg(long, value_name = "MPS")]
        speed: f32,
        /// Normalized steering while in auto mode, -1 (right) to 1 (left)
        #[arg(long, value_name = "NORM", default_value_t = 0.0, allow_hyphen_values = true)]
        steering: f32,
        /// Stop after this many milliseconds (default: until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Print control loop timing stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Run the closed loop offline against the simulated drivetrain
    Simulate {
        /// Speed setpoint in m/s
        #[arg(long, value_name = "MPS")]
        speed: f32,
        /// Simulated time in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 5_000)]
        duration_ms: u64,
        /// Print control loop timing stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Build the controller from the config and report what would run
    SelfCheck,
}
