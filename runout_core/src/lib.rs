#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Filament runout monitoring (hardware-agnostic).
//!
//! All pin access goes through `runout_traits::SensorPin`; the host print
//! server is reached through `runout_traits::Printer` and
//! `runout_traits::Notifier`.
//!
//! ## Architecture
//!
//! - **Presence**: parity rule mapping pin level + wiring to "filament present" (`presence`)
//! - **Debounce**: repeated sampling that restarts on disagreement (`debounce`)
//! - **Capability probe**: does the firmware accept the change macro (`capability`)
//! - **Change sequence**: one filament-change episode tracked from G-code traffic (`sequence`)
//! - **Monitor**: single owner of all state, driven by events (`coordinator`)
//! - **Runtime**: monitor thread, sensor worker thread and timers (`runtime`, `worker`)

pub mod capability;
pub mod config;
pub mod conversions;
pub mod coordinator;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod presence;
pub mod protocol;
pub mod runtime;
pub mod sequence;
pub mod worker;

pub use capability::{CapabilityProbe, CapabilityState, ProbeOutcome};
pub use config::{DebounceCfg, PinId, Power, RunoutAction, SensorConfig, TriggerMode};
pub use coordinator::{Event, LifecycleEvent, Monitor, PrintState, SamplePurpose, Task};
pub use debounce::Debouncer;
pub use error::{Report, Result, RunoutError};
pub use presence::{evaluate, is_present};
pub use runtime::Runtime;
pub use sequence::{ChangeSequence, ChangeSequenceState};
pub use worker::{PinFactory, sample_presence};
