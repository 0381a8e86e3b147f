//! Runtime configuration for the runout monitor.
//!
//! These are the structs the state machines consume. They are separate from
//! the TOML-deserialized config in `runout_config`; see `conversions`.

use std::time::Duration;

use runout_traits::Pull;

/// A configured sensor pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinId {
    /// Number as the user entered it (board or BCM numbering).
    pub number: u8,
    /// BCM GPIO line used by the driver.
    pub bcm: u8,
}

/// What the sensor's common terminal is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Power {
    #[default]
    Grounded,
    Powered,
}

impl Power {
    /// Parity contribution of the wiring polarity.
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Power::Grounded => 0,
            Power::Powered => 1,
        }
    }

    /// Pull resistor that keeps an open switch at the opposite rail.
    #[inline]
    pub fn pull(self) -> Pull {
        match self {
            Power::Grounded => Pull::Up,
            Power::Powered => Pull::Down,
        }
    }
}

/// Which switch state the user declared as "out of filament".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    #[default]
    ActiveOpen,
    ActiveClosed,
}

impl TriggerMode {
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            TriggerMode::ActiveOpen => 0,
            TriggerMode::ActiveClosed => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunoutAction {
    /// Send the change command and track the firmware dialogue.
    #[default]
    SendMacro,
    /// Park the head and pause the job from the host.
    NativePause,
}

/// Debounce window: `samples` consecutive agreeing reads, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceCfg {
    pub samples: u32,
    pub interval: Duration,
}

impl DebounceCfg {
    /// 5 samples, 50 ms apart.
    pub const QUICK: Self = Self {
        samples: 5,
        interval: Duration::from_millis(50),
    };
    /// 10 samples, 200 ms apart; for very noisy wiring.
    pub const SLOW: Self = Self {
        samples: 10,
        interval: Duration::from_millis(200),
    };

    /// Time a fully agreeing window takes.
    pub fn quiet_window(&self) -> Duration {
        self.interval
            .saturating_mul(self.samples.max(1).saturating_sub(1))
    }
}

impl Default for DebounceCfg {
    fn default() -> Self {
        Self::QUICK
    }
}

/// Everything the monitor needs to evaluate and act on the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// `None` keeps the whole monitor inert.
    pub pin: Option<PinId>,
    pub power: Power,
    pub trigger: TriggerMode,
    /// Edge filter the pin driver applies before calling back.
    pub bounce: Duration,
    pub debounce: DebounceCfg,
    pub change_command: String,
    pub check_command: String,
    pub probe_retry: Duration,
    pub action: RunoutAction,
    pub park_command: String,
}

impl SensorConfig {
    pub fn is_enabled(&self) -> bool {
        self.pin.is_some()
    }

    pub fn pull(&self) -> Pull {
        self.power.pull()
    }

    /// True when switching to `other` needs the pin reopened or re-armed.
    pub fn needs_rebind(&self, other: &SensorConfig) -> bool {
        self.pin != other.pin || self.power != other.power || self.bounce != other.bounce
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            pin: None,
            power: Power::Grounded,
            trigger: TriggerMode::ActiveOpen,
            bounce: Duration::from_millis(250),
            debounce: DebounceCfg::default(),
            change_command: "M600 X0 Y0".to_string(),
            check_command: "M603".to_string(),
            probe_retry: Duration::from_millis(1000),
            action: RunoutAction::SendMacro,
            park_command: "G1 X0 Y0".to_string(),
        }
    }
}
