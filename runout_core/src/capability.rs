//! Firmware capability probe.
//!
//! On every connection the monitor sends the capability-check command and
//! classifies the response lines that follow. `ok` means the change macro is
//! usable, an `Unknown command` echo naming the check means it is not, and
//! anything else schedules a retry. The probe never gives up.

use crate::protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityState {
    #[default]
    Unknown,
    Probing,
    Supported,
    /// Holds until the next connection starts a new probe.
    Unsupported,
}

/// What a response line meant to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ignored,
    Supported,
    /// The check was rejected on this connection; warn the user once.
    Unsupported,
    /// Schedule one retry of the check command.
    Retry,
}

#[derive(Debug, Default)]
pub struct CapabilityProbe {
    state: CapabilityState,
    retry_pending: bool,
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CapabilityState {
        self.state
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Connection established: probe again, whatever the last verdict was.
    pub fn begin(&mut self) {
        self.state = CapabilityState::Probing;
        self.retry_pending = false;
    }

    /// Connection dropped.
    pub fn reset(&mut self) {
        self.state = CapabilityState::Unknown;
        self.retry_pending = false;
    }

    /// Unknown, Probing and Supported all allow the change macro.
    pub fn allows_macro(&self) -> bool {
        self.state != CapabilityState::Unsupported
    }

    pub fn on_response_line(&mut self, line: &str, check_command: &str) -> ProbeOutcome {
        if self.state != CapabilityState::Probing {
            return ProbeOutcome::Ignored;
        }
        if protocol::is_ok(line) {
            self.state = CapabilityState::Supported;
            self.retry_pending = false;
            ProbeOutcome::Supported
        } else if protocol::is_unknown_command(line, check_command) {
            self.state = CapabilityState::Unsupported;
            self.retry_pending = false;
            ProbeOutcome::Unsupported
        } else if self.retry_pending {
            ProbeOutcome::Ignored
        } else {
            self.retry_pending = true;
            ProbeOutcome::Retry
        }
    }

    /// Retry timer fired. True when the check command should be resent.
    pub fn retry_due(&mut self) -> bool {
        let due = self.retry_pending && self.state == CapabilityState::Probing;
        self.retry_pending = false;
        due
    }
}

/// Warning shown once when the firmware rejects the check command.
pub fn unsupported_message(change_command: &str) -> String {
    format!(
        "{} is not supported by this printer's firmware! Filament change on runout is disabled.",
        protocol::macro_prefix(change_command)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &str = "M603";

    fn probing() -> CapabilityProbe {
        let mut p = CapabilityProbe::new();
        p.begin();
        p
    }

    #[test]
    fn ok_means_supported() {
        let mut p = probing();
        assert_eq!(p.on_response_line("ok", CHECK), ProbeOutcome::Supported);
        assert_eq!(p.state(), CapabilityState::Supported);
        assert!(p.allows_macro());
        assert_eq!(p.on_response_line("ok", CHECK), ProbeOutcome::Ignored);
    }

    #[test]
    fn unknown_command_is_reported_once() {
        let mut p = probing();
        let line = "echo:Unknown command: \"M603\"";
        assert_eq!(p.on_response_line(line, CHECK), ProbeOutcome::Unsupported);
        assert!(!p.allows_macro());
        assert_eq!(p.on_response_line(line, CHECK), ProbeOutcome::Ignored);
        assert!(!p.retry_due());
        assert_eq!(p.state(), CapabilityState::Unsupported);
    }

    #[test]
    fn reconnect_probes_again_after_a_verdict() {
        let mut p = probing();
        p.on_response_line("ok", CHECK);
        p.begin();
        assert_eq!(p.state(), CapabilityState::Probing);
        assert_eq!(
            p.on_response_line("echo:Unknown command: \"M603\"", CHECK),
            ProbeOutcome::Unsupported
        );
        p.begin();
        assert_eq!(p.state(), CapabilityState::Probing);
        assert!(p.allows_macro());
    }

    #[test]
    fn unrelated_lines_schedule_one_retry() {
        let mut p = probing();
        let temp = "T:210.0 /210.0 B:60.0 /60.0";
        assert_eq!(p.on_response_line(temp, CHECK), ProbeOutcome::Retry);
        assert_eq!(p.on_response_line(temp, CHECK), ProbeOutcome::Ignored);
        assert_eq!(p.state(), CapabilityState::Probing);
        assert!(p.retry_due());
        assert!(!p.retry_due());
        // after the resend, a new unrelated line may schedule again
        assert_eq!(p.on_response_line(temp, CHECK), ProbeOutcome::Retry);
    }

    #[test]
    fn lines_outside_probing_are_ignored() {
        let mut p = CapabilityProbe::new();
        assert_eq!(p.on_response_line("ok", CHECK), ProbeOutcome::Ignored);
        assert_eq!(p.state(), CapabilityState::Unknown);
    }

    #[test]
    fn reset_restores_optimistic_unknown() {
        let mut p = probing();
        p.on_response_line("echo:Unknown command: \"M603\"", CHECK);
        p.reset();
        assert_eq!(p.state(), CapabilityState::Unknown);
        assert!(p.allows_macro());
    }

    #[test]
    fn retry_after_verdict_is_dropped() {
        let mut p = probing();
        p.on_response_line("wait", CHECK);
        p.on_response_line("ok", CHECK);
        assert!(!p.retry_due());
    }

    #[test]
    fn message_names_the_macro() {
        assert_eq!(
            unsupported_message("M600 X0 Y0"),
            "M600 is not supported by this printer's firmware! Filament change on runout is disabled."
        );
    }
}
