//! Maps `Box<dyn Error>` from trait boundaries to typed `RunoutError`.
//!
//! The traits in `runout_traits` use `Box<dyn Error + Send + Sync>` so any
//! pin driver or host adapter can plug in; this module converts those to our
//! typed error enum, with an optional feature-gated path for
//! `runout_hardware::HwError` downcasting.

use crate::error::RunoutError;

/// Map a pin-driver error to a typed `RunoutError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> RunoutError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<runout_hardware::error::HwError>() {
            return match hw {
                runout_hardware::error::HwError::PinInUse(_) => RunoutError::PinBusy(hw.to_string()),
                runout_hardware::error::HwError::InvalidPin(_) => {
                    RunoutError::Config(hw.to_string())
                }
                other => RunoutError::Sensor(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("in use") || lower.contains("busy") {
        RunoutError::PinBusy(s)
    } else {
        RunoutError::Sensor(s)
    }
}

/// Map a host printer-control error.
pub fn map_printer_error(e: &(dyn std::error::Error + 'static)) -> RunoutError {
    RunoutError::Printer(e.to_string())
}

/// Map a notification sink error.
pub fn map_notify_error(e: &(dyn std::error::Error + 'static)) -> RunoutError {
    RunoutError::Notify(e.to_string())
}
