//! Human-readable error descriptions and structured JSON error formatting.

use erumby_core::error::{BuildError, ControlError, NumericalFault};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTable => {
                "What happened: No encoder lookup table was provided to the controller.\nLikely causes: [encoder] table is empty and no calibration CSV was given.\nHow to fix: Add [encoder] table to the config or pass --calibration <FILE>.".to_string()
            }
            BuildError::MissingTiming => {
                "What happened: Loop period and dead time were not set.\nLikely causes: The controller builder was not given a Timing.\nHow to fix: Set [timing] period_ms and dead_time_ms in the config.".to_string()
            }
            BuildError::NonMonotonicTable { index } => format!(
                "What happened: Lookup table breakpoint {index} does not increase.\nLikely causes: Duplicate or unsorted pulse counts in [encoder] table or the calibration CSV.\nHow to fix: Sort the breakpoints by input and remove duplicates."
            ),
            BuildError::SingularObserver => {
                "What happened: The observer could not be discretized.\nLikely causes: Observer gains or epsilon make the correction matrix singular.\nHow to fix: Use positive gains (e.g. binomial coefficients) and 0 < epsilon <= 1 in [observer].".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/erumby_config.toml for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::Timeout => "What happened: A hardware read timed out.\nLikely causes: Radio receiver or encoder not wired, or radio.read_timeout_ms too low.\nHow to fix: Check wiring and power, and consider raising radio.read_timeout_ms.".to_string(),
            ControlError::Alarm(reason) => format!(
                "What happened: The vehicle raised an alarm ({reason}) and was stopped.\nLikely causes: An out-of-range ESC or servo pulse was commanded in auto mode.\nHow to fix: Check [esc] and [servo] limits against the actuator maps, then restart."
            ),
            ControlError::Overrun { elapsed_us, budget_us } => format!(
                "What happened: A control tick took {elapsed_us}us, longer than its {budget_us}us period.\nLikely causes: An overloaded CPU or a period that is too short.\nHow to fix: Increase timing.period_ms (keeping dead_time_ms a multiple of it)."
            ),
            ControlError::Numerical(fault) => humanize_fault(*fault),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(fault) = err.downcast_ref::<NumericalFault>() {
        return humanize_fault(*fault);
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'pulses,speed_mps'.".to_string();
    }

    if lower.contains("pins") && lower.contains("missing") {
        return "What happened: Hardware pins are not configured.\nLikely causes: The [pins] section (encoder, esc_pwm, servo_pwm) is absent.\nHow to fix: Add [pins] to the config, or use `erumby simulate` to run without hardware.".to_string();
    }

    if lower.contains("gpio") || lower.contains("pwm") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers, PWM overlay not enabled, or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access GPIO and PWM.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: A missing, mistyped or out-of-range value in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if msg.starts_with("--") {
        return format!(
            "What happened: Invalid argument ({msg}).\nLikely causes: A typo on the command line.\nHow to fix: See `erumby help` for accepted values."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_fault(fault: NumericalFault) -> String {
    format!(
        "What happened: The speed estimate became unusable ({fault}).\nLikely causes: Encoder glitches, a lookup table that extrapolates too far, or an unstable observer.\nHow to fix: Check the encoder signal, prefer the clamp policy, and review [observer] gains and controller.divergence_limit."
    )
}

/// Stable exit codes for typed control errors; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::Alarm(_) => 4,
            ControlError::Timeout => 5,
            ControlError::Overrun { .. } | ControlError::Numerical(_) => 6,
            _ => 1,
        };
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTable => "MissingTable",
            BuildError::MissingTiming => "MissingTiming",
            BuildError::NonMonotonicTable { .. } => "NonMonotonicTable",
            BuildError::SingularObserver => "SingularObserver",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::Hardware(_) => "Hardware",
            ControlError::HardwareFault(_) => "HardwareFault",
            ControlError::Timeout => "Timeout",
            ControlError::Numerical(_) => "Numerical",
            ControlError::Overrun { .. } => "Overrun",
            ControlError::Alarm(_) => "Alarm",
        };
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::Overrun {
            elapsed_us,
            budget_us,
        }) => json!({
            "reason": reason,
            "details": { "elapsed_us": elapsed_us, "budget_us": budget_us },
            "message": msg,
        })
        .to_string(),
        Some(ControlError::Alarm(alarm)) => json!({
            "reason": reason,
            "details": { "alarm": alarm },
            "message": msg,
        })
        .to_string(),
        _ => json!({ "reason": reason, "message": msg }).to_string(),
    }
}
