pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Logic level of a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// 0 for `Low`, 1 for `High`.
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }

    /// Any non-zero value maps to `High`.
    #[inline]
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 { Level::Low } else { Level::High }
    }
}

/// Pull resistor applied when a sensor pin is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
}

/// Which transitions an edge watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// A single digital input wired to the filament sensor.
///
/// Pull resistor selection happens when the pin is opened; implementations
/// apply their own bounce filter before invoking `on_edge`.
pub trait SensorPin {
    fn read(&mut self) -> Result<Level, Box<dyn std::error::Error + Send + Sync>>;
    fn watch_edges(
        &mut self,
        edge: Edge,
        bounce: Duration,
        on_edge: Box<dyn FnMut(Level) + Send>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn unwatch_edges(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Printer control exposed by the host print server.
pub trait Printer {
    fn send_command(&mut self, command: &str)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn cancel_print(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn pause_print(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
    Status,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Error => "error",
            NoticeKind::Status => "status",
        }
    }
}

/// A user-facing message. Status notices drive the UI's runout indicator
/// and carry `no_filament`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub auto_close: bool,
    pub no_filament: Option<bool>,
}

impl Notice {
    pub fn info(message: impl Into<String>, auto_close: bool) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
            auto_close,
            no_filament: None,
        }
    }

    pub fn error(message: impl Into<String>, auto_close: bool) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            auto_close,
            no_filament: None,
        }
    }

    pub fn status(no_filament: bool) -> Self {
        let message = if no_filament {
            "Filament NOT detected"
        } else {
            "Filament detected"
        };
        Self {
            kind: NoticeKind::Status,
            message: message.to_string(),
            auto_close: true,
            no_filament: Some(no_filament),
        }
    }
}

/// Notification sink (UI push channel of the host).
pub trait Notifier {
    fn publish(&mut self, notice: Notice) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
