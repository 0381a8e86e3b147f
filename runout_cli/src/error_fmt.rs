//! Human-readable error descriptions and structured JSON error formatting.

use runout_core::error::RunoutError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RunoutError>() {
        return match re {
            RunoutError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing file, TOML syntax error, or out-of-range values.\nHow to fix: Edit the config file (see etc/runout.toml for a sample), then run `runout check-config`."
            ),
            RunoutError::PinBusy(msg) => format!(
                "What happened: The sensor pin is already in use ({msg}).\nLikely causes: The pin is claimed by I2C/SPI/UART or by another process.\nHow to fix: Pick a free GPIO pin or disable the peripheral using it."
            ),
            RunoutError::Sensor(msg) => format!(
                "What happened: The sensor pin could not be read ({msg}).\nLikely causes: Insufficient GPIO permissions, wrong numbering mode, or a build without the `hardware` feature.\nHow to fix: Check sensor.pin and sensor.numbering; run with GPIO access, or pass --sim-level to test without hardware."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config 2, sensor 3, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RunoutError>() {
        Some(RunoutError::Config(_)) => 2,
        Some(RunoutError::Sensor(_) | RunoutError::PinBusy(_)) => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<RunoutError>() {
        Some(RunoutError::Config(_)) => "Config",
        Some(RunoutError::Sensor(_)) => "Sensor",
        Some(RunoutError::PinBusy(_)) => "PinBusy",
        Some(RunoutError::Printer(_)) => "Printer",
        Some(RunoutError::Notify(_)) => "Notify",
        Some(RunoutError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunoutError::Config("bad pin".into()), 2, "Config")]
    #[case(RunoutError::Sensor("read failed".into()), 3, "Sensor")]
    #[case(RunoutError::PinBusy("gpio 2".into()), 3, "PinBusy")]
    #[case(RunoutError::Printer("offline".into()), 1, "Printer")]
    fn typed_errors_map_to_codes(
        #[case] e: RunoutError,
        #[case] code: i32,
        #[case] reason: &str,
    ) {
        let report = eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&report), code);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], reason);
        assert!(v["message"].as_str().unwrap().starts_with("What happened"));
    }

    #[test]
    fn untyped_errors_fall_back() {
        let report = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&report), 1);
        assert!(humanize(&report).contains("Original: boom"));
    }
}
