//! `From` implementations bridging `runout_config` types to `runout_core` types.

use std::time::Duration;

use crate::config::{DebounceCfg, PinId, Power, RunoutAction, SensorConfig, TriggerMode};

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<runout_config::Power> for Power {
    fn from(p: runout_config::Power) -> Self {
        match p {
            runout_config::Power::Grounded => Power::Grounded,
            runout_config::Power::Powered => Power::Powered,
        }
    }
}

impl From<runout_config::Trigger> for TriggerMode {
    fn from(t: runout_config::Trigger) -> Self {
        match t {
            runout_config::Trigger::Open => TriggerMode::ActiveOpen,
            runout_config::Trigger::Closed => TriggerMode::ActiveClosed,
        }
    }
}

impl From<runout_config::Action> for RunoutAction {
    fn from(a: runout_config::Action) -> Self {
        match a {
            runout_config::Action::Macro => RunoutAction::SendMacro,
            runout_config::Action::Pause => RunoutAction::NativePause,
        }
    }
}

// ── DebounceCfg ──────────────────────────────────────────────────────────────

impl From<&runout_config::DebounceSection> for DebounceCfg {
    fn from(c: &runout_config::DebounceSection) -> Self {
        Self {
            samples: c.samples,
            interval: Duration::from_millis(c.interval_ms),
        }
    }
}

// ── SensorConfig ─────────────────────────────────────────────────────────────

/// Expects a validated config; a pin that does not resolve to a GPIO line
/// leaves the sensor disabled.
impl From<&runout_config::Config> for SensorConfig {
    fn from(c: &runout_config::Config) -> Self {
        let pin = match (c.sensor.pin, c.bcm_pin()) {
            (runout_config::PinSetting::Number(number), Some(bcm)) => Some(PinId { number, bcm }),
            _ => None,
        };
        Self {
            pin,
            power: c.sensor.power.into(),
            trigger: c.sensor.trigger.into(),
            bounce: Duration::from_millis(c.sensor.bounce_ms),
            debounce: (&c.debounce).into(),
            change_command: c.change.command.trim().to_string(),
            check_command: c.change.capability_check.trim().to_string(),
            probe_retry: Duration::from_millis(c.change.probe_retry_ms),
            action: c.change.action.into(),
            park_command: c.change.park_command.trim().to_string(),
        }
    }
}
