use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunoutError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("sensor pin busy: {0}")]
    PinBusy(String),
    #[error("printer error: {0}")]
    Printer(String),
    #[error("notification error: {0}")]
    Notify(String),
    #[error("invalid state: {0}")]
    State(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
