//! The monitor: single owner of all runout state.
//!
//! Every input (lifecycle events, intercepted G-code in both directions, pin
//! edges, sensor results, timers, settings) arrives as an [`Event`] and is
//! handled in order on one thread. The monitor talks to the printer and the
//! notification sink directly; anything slow (opening the pin, debounced
//! reads, timers) is queued as a [`Task`] for the runtime to execute, and
//! the result comes back as another event.
//!
//! Keeping the monitor free of threads and clocks means the whole decision
//! logic can be driven step by step in tests.

use std::time::Duration;

use runout_traits::{Level, Notice, Notifier, Printer};

use crate::capability::{self, CapabilityProbe, CapabilityState, ProbeOutcome};
use crate::config::{RunoutAction, SensorConfig};
use crate::dispatch::EdgeDispatcher;
use crate::hw_error::{map_notify_error, map_printer_error};
use crate::sequence::{ChangeSequence, ChangeSequenceState, Incoming, Outgoing};

pub const RUNOUT_MESSAGE: &str = "Printer ran out of filament!";
pub const RUNOUT_WAITING_MESSAGE: &str = "Printer ran out of filament! It's waiting for user input";
pub const WAITING_FOR_USER_MESSAGE: &str = "Filament change: printer is waiting for user input.";
pub const NO_FILAMENT_CANCELLED_MESSAGE: &str = "No filament detected! Print cancelled.";
pub const FORGOT_TO_CONFIGURE_MESSAGE: &str = "You may have forgotten to configure this plugin.";
pub const PLEASE_CONFIGURE_MESSAGE: &str = "Don't forget to configure this plugin.";

/// Print lifecycle notifications from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected,
    Disconnected,
    PrintStarted,
    PrintResumed,
    PrintDone,
    PrintFailed,
    PrintCancelled,
    Error,
    UiAttached,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 9] = [
        LifecycleEvent::Connected,
        LifecycleEvent::Disconnected,
        LifecycleEvent::PrintStarted,
        LifecycleEvent::PrintResumed,
        LifecycleEvent::PrintDone,
        LifecycleEvent::PrintFailed,
        LifecycleEvent::PrintCancelled,
        LifecycleEvent::Error,
        LifecycleEvent::UiAttached,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Connected => "connected",
            LifecycleEvent::Disconnected => "disconnected",
            LifecycleEvent::PrintStarted => "print_started",
            LifecycleEvent::PrintResumed => "print_resumed",
            LifecycleEvent::PrintDone => "print_done",
            LifecycleEvent::PrintFailed => "print_failed",
            LifecycleEvent::PrintCancelled => "print_cancelled",
            LifecycleEvent::Error => "error",
            LifecycleEvent::UiAttached => "ui_attached",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

/// Why a debounced read was requested; decides what its result does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePurpose {
    PreflightStart,
    PreflightResume,
    Edge,
    EndOfSequence,
    Status,
}

#[derive(Debug)]
pub enum Event {
    Lifecycle(LifecycleEvent),
    /// Command about to be sent to the printer.
    Outgoing(String),
    /// Line received from the printer.
    Response(String),
    Edge(Level),
    /// Debounced read finished; `None` when the read failed or was cancelled.
    Sampled {
        purpose: SamplePurpose,
        epoch: u64,
        present: Option<bool>,
    },
    ProbeRetryDue,
    SettingsSaved(Box<runout_config::Config>),
    Bound,
    BindFailed(String),
    Shutdown,
}

/// Work the monitor hands to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Sample { purpose: SamplePurpose, epoch: u64 },
    Arm,
    Disarm,
    /// Open the configured pin, releasing any previous one.
    Bind(SensorConfig),
    StartRetryTimer(Duration),
    CancelRetryTimer,
    /// Sampling started under an older epoch must stop.
    Cancel { epoch: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintState {
    #[default]
    Idle,
    Printing,
}

pub struct Monitor<P: Printer, N: Notifier> {
    config: SensorConfig,
    printer: P,
    notifier: N,
    sequence: ChangeSequence,
    probe: CapabilityProbe,
    print: PrintState,
    edges: EdgeDispatcher,
    epoch: u64,
    armed: bool,
    pause_requested: bool,
    /// Config to fall back to if binding the new one fails.
    previous: Option<SensorConfig>,
    tasks: Vec<Task>,
}

impl<P: Printer, N: Notifier> Monitor<P, N> {
    pub fn new(config: SensorConfig, printer: P, notifier: N) -> Self {
        Self {
            config,
            printer,
            notifier,
            sequence: ChangeSequence::new(),
            probe: CapabilityProbe::new(),
            print: PrintState::Idle,
            edges: EdgeDispatcher::default(),
            epoch: 0,
            armed: false,
            pause_requested: false,
            previous: None,
            tasks: Vec::new(),
        }
    }

    /// Queue the initial pin bind.
    pub fn start(&mut self) {
        if self.config.is_enabled() {
            self.tasks.push(Task::Bind(self.config.clone()));
        } else {
            tracing::info!("no sensor pin configured; monitor is inert");
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }
    pub fn sequence_state(&self) -> ChangeSequenceState {
        self.sequence.state()
    }
    pub fn started(&self) -> bool {
        self.sequence.started()
    }
    pub fn capability(&self) -> CapabilityState {
        self.probe.state()
    }
    pub fn print_state(&self) -> PrintState {
        self.print
    }
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
    pub fn armed(&self) -> bool {
        self.armed
    }
    pub fn printer(&self) -> &P {
        &self.printer
    }
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn drain_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Lifecycle(e) => self.on_lifecycle(e),
            Event::Outgoing(cmd) => self.on_outgoing(&cmd),
            Event::Response(line) => self.on_response(&line),
            Event::Edge(level) => self.on_edge(level),
            Event::Sampled {
                purpose,
                epoch,
                present,
            } => self.on_sampled(purpose, epoch, present),
            Event::ProbeRetryDue => {
                if self.probe.retry_due() {
                    tracing::debug!(command = %self.config.check_command, "resending capability check");
                    let cmd = self.config.check_command.clone();
                    self.send(&cmd);
                }
            }
            Event::SettingsSaved(cfg) => self.on_settings(&cfg),
            Event::Bound => self.on_bound(),
            Event::BindFailed(msg) => self.on_bind_failed(&msg),
            Event::Shutdown => {}
        }
    }

    /// Confirmed runout: notify, then run the configured action once.
    /// Returns true when an action was taken.
    pub fn trigger(&mut self) -> bool {
        if !self.sequence.is_idle() {
            tracing::debug!(state = ?self.sequence.state(), "runout ignored; change already in progress");
            return false;
        }
        if self.config.action == RunoutAction::NativePause && self.pause_requested {
            tracing::debug!("runout ignored; pause already requested");
            return false;
        }
        tracing::warn!("filament runout confirmed");
        self.notify(Notice::info(RUNOUT_MESSAGE, false));
        match self.config.action {
            RunoutAction::SendMacro => {
                if !self.probe.allows_macro() {
                    tracing::warn!(
                        command = %self.config.change_command,
                        "firmware does not support the change command; not sending it"
                    );
                    return false;
                }
                if !self.sequence.begin() {
                    return false;
                }
                let cmd = self.config.change_command.clone();
                self.send(&cmd);
                true
            }
            RunoutAction::NativePause => {
                self.pause_requested = true;
                let park = self.config.park_command.clone();
                if !park.is_empty() {
                    self.send(&park);
                }
                if let Err(e) = self.printer.pause_print() {
                    let err = map_printer_error(e.as_ref());
                    tracing::error!(error = %err, "failed to pause print");
                }
                true
            }
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        tracing::debug!(event = event.as_str(), "lifecycle event");
        match event {
            LifecycleEvent::Connected => {
                self.probe.begin();
                self.tasks.push(Task::CancelRetryTimer);
                tracing::info!(command = %self.config.check_command, "probing firmware capability");
                let cmd = self.config.check_command.clone();
                self.send(&cmd);
            }
            LifecycleEvent::Disconnected => {
                self.probe.reset();
                self.tasks.push(Task::CancelRetryTimer);
                self.cancel_sampling();
            }
            LifecycleEvent::PrintStarted | LifecycleEvent::PrintResumed => {
                self.sequence.reset();
                self.print = PrintState::Printing;
                self.pause_requested = false;
                if !self.config.is_enabled() {
                    if event == LifecycleEvent::PrintStarted {
                        self.notify(Notice::info(FORGOT_TO_CONFIGURE_MESSAGE, true));
                    }
                    return;
                }
                self.arm();
                let purpose = if event == LifecycleEvent::PrintStarted {
                    SamplePurpose::PreflightStart
                } else {
                    SamplePurpose::PreflightResume
                };
                self.request_sample(purpose);
            }
            LifecycleEvent::PrintDone
            | LifecycleEvent::PrintFailed
            | LifecycleEvent::PrintCancelled
            | LifecycleEvent::Error => {
                self.sequence.reset();
                self.print = PrintState::Idle;
                self.pause_requested = false;
                self.disarm();
                self.cancel_sampling();
            }
            LifecycleEvent::UiAttached => {
                if !self.config.is_enabled() {
                    self.notify(Notice::info(PLEASE_CONFIGURE_MESSAGE, true));
                    return;
                }
                self.request_sample(SamplePurpose::Status);
                match self.sequence.state() {
                    ChangeSequenceState::Initiated | ChangeSequenceState::CommandSent => {
                        self.notify(Notice::info(RUNOUT_MESSAGE, false));
                    }
                    ChangeSequenceState::WaitingForUser => {
                        self.notify(Notice::info(RUNOUT_WAITING_MESSAGE, false));
                    }
                    ChangeSequenceState::Idle | ChangeSequenceState::Verifying => {}
                }
            }
        }
    }

    fn on_outgoing(&mut self, command: &str) {
        if !self.config.is_enabled() || !self.probe.allows_macro() {
            return;
        }
        match self.sequence.before_send(command, &self.config.change_command) {
            Outgoing::Deliberate => {
                tracing::info!(command, "change macro sent by hand; tracking it");
            }
            Outgoing::MacroSent => tracing::debug!(command, "change command on the wire"),
            Outgoing::SequenceEnded => {
                tracing::info!(command, "change macro finished; verifying filament");
                self.request_sample(SamplePurpose::EndOfSequence);
            }
            Outgoing::Ignored => {}
        }
    }

    fn on_response(&mut self, line: &str) {
        match self.probe.on_response_line(line, &self.config.check_command) {
            ProbeOutcome::Supported => {
                tracing::info!("firmware supports the change command");
                self.tasks.push(Task::CancelRetryTimer);
            }
            ProbeOutcome::Unsupported => {
                tracing::warn!(command = %self.config.change_command, "firmware rejected the capability check");
                self.tasks.push(Task::CancelRetryTimer);
                let msg = capability::unsupported_message(&self.config.change_command);
                self.notify(Notice::error(msg, true));
            }
            ProbeOutcome::Retry => {
                tracing::trace!(line, "unrelated line while probing; retry scheduled");
                self.tasks.push(Task::StartRetryTimer(self.config.probe_retry));
            }
            ProbeOutcome::Ignored => {}
        }

        if !self.config.is_enabled() || !self.probe.allows_macro() {
            return;
        }
        match self.sequence.on_response_line(line) {
            Incoming::PausedForUser => {
                tracing::info!("printer is waiting for the filament swap");
                self.notify(Notice::info(WAITING_FOR_USER_MESSAGE, false));
            }
            Incoming::Resumed => tracing::debug!("printer resumed processing during change"),
            Incoming::Ignored => {}
        }
    }

    fn on_edge(&mut self, level: Level) {
        if !self.config.is_enabled() {
            return;
        }
        if !self.edges.begin() {
            tracing::trace!(?level, "edge while a check is running; re-checking after it");
            return;
        }
        tracing::debug!(?level, "edge; verifying");
        self.request_sample(SamplePurpose::Edge);
    }

    fn on_sampled(&mut self, purpose: SamplePurpose, epoch: u64, present: Option<bool>) {
        if epoch != self.epoch {
            tracing::trace!(?purpose, epoch, current = self.epoch, "stale sample dropped");
            return;
        }
        if purpose == SamplePurpose::Edge && self.edges.finish() {
            // this result may predate the latest edge
            tracing::debug!("edge arrived during check; sampling again");
            self.request_sample(SamplePurpose::Edge);
        }
        let Some(present) = present else {
            tracing::warn!(?purpose, "presence check inconclusive; no action taken");
            if purpose == SamplePurpose::EndOfSequence {
                self.sequence.finish_verification();
            }
            return;
        };
        tracing::debug!(?purpose, present, "presence sampled");
        self.notify(Notice::status(!present));

        let printing = self.print == PrintState::Printing;
        match purpose {
            SamplePurpose::PreflightStart => {
                if printing && !present {
                    tracing::warn!("no filament at print start; cancelling");
                    if let Err(e) = self.printer.cancel_print() {
                        let err = map_printer_error(e.as_ref());
                        tracing::error!(error = %err, "failed to cancel print");
                    }
                    self.notify(Notice::error(NO_FILAMENT_CANCELLED_MESSAGE, true));
                }
            }
            SamplePurpose::PreflightResume | SamplePurpose::Edge => {
                if printing && !present {
                    self.trigger();
                }
            }
            SamplePurpose::EndOfSequence => {
                if self.sequence.finish_verification() && printing && !present {
                    tracing::warn!("still no filament after change; re-triggering");
                    self.trigger();
                }
            }
            SamplePurpose::Status => {}
        }
    }

    fn on_settings(&mut self, cfg: &runout_config::Config) {
        if let Err(e) = cfg.validate() {
            tracing::warn!(error = %e, "settings rejected");
            self.notify(Notice::error(format!("Settings rejected: {e}"), true));
            return;
        }
        for w in cfg.warnings() {
            tracing::warn!("{w}");
        }
        self.apply(SensorConfig::from(cfg));
    }

    fn apply(&mut self, new: SensorConfig) {
        if new == self.config {
            tracing::debug!("settings unchanged");
            return;
        }
        if !self.config.needs_rebind(&new) {
            tracing::info!("settings updated");
            self.config = new;
            return;
        }
        tracing::info!(pin = ?new.pin, "settings updated; rebinding sensor");
        self.cancel_sampling();
        self.disarm();
        self.previous = Some(std::mem::replace(&mut self.config, new));
        self.tasks.push(Task::Bind(self.config.clone()));
    }

    fn on_bound(&mut self) {
        self.previous = None;
        if self.config.is_enabled() && self.print == PrintState::Printing {
            self.arm();
        }
    }

    fn on_bind_failed(&mut self, msg: &str) {
        tracing::error!(error = msg, "sensor pin unavailable");
        self.notify(Notice::error(format!("Sensor pin unavailable: {msg}"), true));
        self.armed = false;
        match self.previous.take() {
            Some(prev) => {
                tracing::info!(pin = ?prev.pin, "restoring previous sensor settings");
                self.config = prev;
                self.tasks.push(Task::Bind(self.config.clone()));
            }
            None => {
                self.config.pin = None;
            }
        }
    }

    fn arm(&mut self) {
        if !self.armed {
            self.armed = true;
            self.tasks.push(Task::Arm);
        }
    }

    fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            self.tasks.push(Task::Disarm);
        }
    }

    fn request_sample(&mut self, purpose: SamplePurpose) {
        self.tasks.push(Task::Sample {
            purpose,
            epoch: self.epoch,
        });
    }

    fn cancel_sampling(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.tasks.push(Task::Cancel { epoch: self.epoch });
        self.edges.reset();
        if self.sequence.state() == ChangeSequenceState::Verifying {
            self.sequence.reset();
        }
    }

    fn send(&mut self, command: &str) {
        if let Err(e) = self.printer.send_command(command) {
            let err = map_printer_error(e.as_ref());
            tracing::error!(error = %err, command, "failed to send command");
        }
    }

    fn notify(&mut self, notice: Notice) {
        if let Err(e) = self.notifier.publish(notice) {
            let err = map_notify_error(e.as_ref());
            tracing::warn!(error = %err, "failed to publish notice");
        }
    }
}
