#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `erumby` command-line entry point.

mod cli;
mod drive;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        tracing::error!(error = %e, "erumby failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Only fails if a hook is already installed.
    let _ = color_eyre::install();

    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
    let cfg: erumby_config::Config = toml::from_str(&text).wrap_err("parse config TOML")?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    cfg.validate().wrap_err("invalid configuration")?;

    let calibration = cli
        .calibration
        .as_deref()
        .map(erumby_config::load_calibration_csv)
        .transpose()?;
    if let Some(c) = &calibration {
        tracing::info!(points = c.points.len(), "encoder calibration loaded");
    }

    match cli.cmd {
        Commands::Run {
            speed,
            steering,
            duration_ms,
            stats,
        } => {
            let sp = drive::setpoint(speed, steering)?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;
            drive::run(
                &cfg,
                calibration.as_ref(),
                sp,
                duration_ms.map(Duration::from_millis),
                stats,
                cli.json,
                &shutdown,
            )?;
        }
        Commands::Simulate {
            speed,
            duration_ms,
            stats,
        } => {
            let sp = drive::setpoint(speed, 0.0)?;
            drive::simulate(
                &cfg,
                calibration.as_ref(),
                sp,
                Duration::from_millis(duration_ms),
                stats,
                cli.json,
            )?;
        }
        Commands::SelfCheck => drive::self_check(&cfg, calibration.as_ref())?,
    }
    Ok(())
}

/// Console logs go to stderr so stdout carries only results. An optional
/// JSON file sink follows `[logging]`.
fn init_tracing(
    json: bool,
    cli_level: &str,
    logging: &erumby_config::Logging,
) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli_level))
        .wrap_err_with(|| format!("invalid --log-level {cli_level:?}"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let Some(name) = path.file_name() else {
                eyre::bail!("logging.file must name a file");
            };
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never, daily or hourly, got {other:?}"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging.level.as_deref().unwrap_or("info");
            let file_filter = EnvFilter::try_new(level)
                .wrap_err_with(|| format!("invalid logging.level {level:?}"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")
}
