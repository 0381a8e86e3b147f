#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the filament runout monitor.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Pin numbers are checked against the selected addressing mode (physical
//!   header numbering or BCM GPIO numbering) before the hardware is touched.
use serde::Deserialize;
use serde::de::Deserializer;

/// Header pins (physical numbering) that are wired to a GPIO line.
pub const VALID_BOARD_PINS: [u8; 28] = [
    3, 5, 7, 8, 10, 11, 12, 13, 15, 16, 18, 19, 21, 22, 23, 24, 26, 27, 28, 29, 31, 32, 33, 35,
    36, 37, 38, 40,
];

/// Highest GPIO line addressable in BCM numbering.
pub const MAX_BCM_PIN: u8 = 27;

/// Translate a physical header pin to its BCM GPIO line.
pub fn board_to_bcm(pin: u8) -> Option<u8> {
    let bcm = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        27 => 0,
        28 => 1,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(bcm)
}

/// Sensor pin: either a pin number or the disabled sentinel.
///
/// Accepts `pin = -1`, `pin = "disabled"` or a missing key for "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinSetting {
    #[default]
    Disabled,
    Number(u8),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PinToml {
    Int(i64),
    Text(String),
}

fn de_pin<'de, D>(deserializer: D) -> Result<PinSetting, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match PinToml::deserialize(deserializer)? {
        PinToml::Int(-1) => Ok(PinSetting::Disabled),
        PinToml::Int(n) => u8::try_from(n).map(PinSetting::Number).map_err(|_| {
            D::Error::custom(format!("pin must be -1 (disabled) or a GPIO pin number, got {n}"))
        }),
        PinToml::Text(s) if s.eq_ignore_ascii_case("disabled") => Ok(PinSetting::Disabled),
        PinToml::Text(s) => Err(D::Error::custom(format!(
            "pin must be -1, \"disabled\" or a number, got \"{s}\""
        ))),
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    /// Physical header pin numbers (1..=40).
    #[default]
    Board,
    /// Broadcom GPIO line numbers (0..=27).
    Bcm,
}

/// What the sensor's common terminal is wired to.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    /// Wired to ground; the input uses a pull-up.
    #[default]
    Grounded,
    /// Wired to 3.3 V; the input uses a pull-down.
    Powered,
}

/// Which switch state means "out of filament".
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Switch open means runout.
    #[default]
    Open,
    /// Switch closed means runout.
    Closed,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Send the filament change command and follow the firmware dialogue.
    #[default]
    Macro,
    /// Park the head and pause the job from the host.
    Pause,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SensorSection {
    #[serde(deserialize_with = "de_pin")]
    pub pin: PinSetting,
    pub numbering: Numbering,
    pub power: Power,
    pub trigger: Trigger,
    /// Edge filter applied by the pin driver before the callback fires.
    pub bounce_ms: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            pin: PinSetting::Disabled,
            numbering: Numbering::Board,
            power: Power::Grounded,
            trigger: Trigger::Open,
            bounce_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DebounceSection {
    /// Consecutive agreeing samples required for a stable reading.
    pub samples: u32,
    /// Pause between samples (ms).
    pub interval_ms: u64,
}

impl Default for DebounceSection {
    fn default() -> Self {
        Self {
            samples: 5,
            interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChangeSection {
    /// Filament change command sent on runout.
    pub command: String,
    /// Command used to find out whether the firmware supports filament change.
    pub capability_check: String,
    /// Delay before re-sending the capability check after an unrelated reply (ms).
    pub probe_retry_ms: u64,
    pub action: Action,
    /// Head reposition command sent before a host-side pause.
    pub park_command: String,
}

impl Default for ChangeSection {
    fn default() -> Self {
        Self {
            command: "M600 X0 Y0".to_string(),
            capability_check: "M603".to_string(),
            probe_retry_ms: 1000,
            action: Action::Macro,
            park_command: "G1 X0 Y0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub debounce: DebounceSection,
    #[serde(default)]
    pub change: ChangeSection,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// True when a sensor pin is configured.
    pub fn sensor_enabled(&self) -> bool {
        self.sensor.pin != PinSetting::Disabled
    }

    /// Resolve the configured pin to a BCM GPIO line (what the driver uses).
    pub fn bcm_pin(&self) -> Option<u8> {
        match (self.sensor.pin, self.sensor.numbering) {
            (PinSetting::Disabled, _) => None,
            (PinSetting::Number(p), Numbering::Board) => board_to_bcm(p),
            (PinSetting::Number(p), Numbering::Bcm) if p <= MAX_BCM_PIN => Some(p),
            (PinSetting::Number(_), Numbering::Bcm) => None,
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if let PinSetting::Number(pin) = self.sensor.pin {
            match self.sensor.numbering {
                Numbering::Board => {
                    if pin > 40 {
                        eyre::bail!("sensor.pin {pin} is out of range for board numbering (1..=40)");
                    }
                    if !VALID_BOARD_PINS.contains(&pin) {
                        eyre::bail!(
                            "sensor.pin {pin} is a power, ground or reserved header pin, not a GPIO"
                        );
                    }
                }
                Numbering::Bcm => {
                    if pin > MAX_BCM_PIN {
                        eyre::bail!(
                            "sensor.pin {pin} is out of range for bcm numbering (0..={MAX_BCM_PIN})"
                        );
                    }
                }
            }
        }
        if self.sensor.bounce_ms > 10_000 {
            eyre::bail!("sensor.bounce_ms is unreasonably large (>10s)");
        }

        // Debounce
        if self.debounce.samples == 0 {
            eyre::bail!("debounce.samples must be >= 1");
        }
        if self.debounce.samples > 100 {
            eyre::bail!("debounce.samples must be <= 100");
        }
        if self.debounce.interval_ms == 0 {
            eyre::bail!("debounce.interval_ms must be >= 1");
        }
        if self.debounce.interval_ms > 5_000 {
            eyre::bail!("debounce.interval_ms is unreasonably large (>5s)");
        }

        // Change
        check_command("change.command", &self.change.command)?;
        check_command("change.capability_check", &self.change.capability_check)?;
        if self.change.action == Action::Pause {
            check_command("change.park_command", &self.change.park_command)?;
        }
        if self.change.probe_retry_ms == 0 {
            eyre::bail!("change.probe_retry_ms must be >= 1");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rotation}");
        }

        Ok(())
    }

    /// Non-fatal wiring advice for the current settings.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let PinSetting::Number(pin) = self.sensor.pin {
            let hardwired_pullup = match self.sensor.numbering {
                Numbering::Board => pin == 3 || pin == 5,
                Numbering::Bcm => pin == 2 || pin == 3,
            };
            if hardwired_pullup && self.sensor.power == Power::Powered {
                out.push(format!(
                    "sensor.pin {pin} has a hardwired pull-up; a sensor wired to 3.3V will always read high"
                ));
            }
        }
        out
    }
}

fn check_command(key: &str, value: &str) -> eyre::Result<()> {
    if value.trim().is_empty() {
        eyre::bail!("{key} must not be empty");
    }
    if value.contains('\n') || value.contains('\r') {
        eyre::bail!("{key} must be a single line");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_map_covers_every_valid_pin() {
        for pin in VALID_BOARD_PINS {
            let bcm = board_to_bcm(pin).expect("mapped");
            assert!(bcm <= MAX_BCM_PIN);
        }
        assert_eq!(board_to_bcm(1), None);
        assert_eq!(board_to_bcm(6), None);
    }

    #[test]
    fn defaults_are_valid_and_disabled() {
        let cfg = Config::default();
        cfg.validate().expect("defaults valid");
        assert!(!cfg.sensor_enabled());
        assert_eq!(cfg.bcm_pin(), None);
    }
}
