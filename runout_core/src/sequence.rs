//! One filament-change episode, tracked from the G-code traffic.
//!
//! The monitor never waits on the firmware. It watches commands going out
//! and lines coming back and moves through:
//!
//! ```text
//! Idle -> Initiated -> CommandSent <-> WaitingForUser -> Verifying -> Idle
//! ```
//!
//! `started` records that the firmware confirmed "paused for user" at least
//! once in this episode; only then does the next non-keepalive command mean
//! the macro has finished.

use crate::protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeSequenceState {
    #[default]
    Idle,
    /// Runout confirmed, change command queued to the printer.
    Initiated,
    /// Change command observed on the wire.
    CommandSent,
    /// Firmware is parked waiting for the user to swap filament.
    WaitingForUser,
    /// Macro finished; a fresh presence check is in flight.
    Verifying,
}

/// Effect of an outgoing command on the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    Ignored,
    /// The user or a script started the change macro by hand.
    Deliberate,
    /// Our own change command went out.
    MacroSent,
    /// The macro is over; verify presence before going idle.
    SequenceEnded,
}

/// Effect of a response line on the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    Ignored,
    PausedForUser,
    Resumed,
}

#[derive(Debug, Default)]
pub struct ChangeSequence {
    state: ChangeSequenceState,
    started: bool,
}

impl ChangeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChangeSequenceState {
        self.state
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn is_idle(&self) -> bool {
        self.state == ChangeSequenceState::Idle
    }

    /// Enter `Initiated`. No-op (returns false) unless idle, so a second
    /// runout during an episode never sends a second macro.
    pub fn begin(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.state = ChangeSequenceState::Initiated;
        self.started = false;
        true
    }

    pub fn reset(&mut self) {
        self.state = ChangeSequenceState::Idle;
        self.started = false;
    }

    pub fn before_send(&mut self, command: &str, change_command: &str) -> Outgoing {
        use ChangeSequenceState as S;
        match self.state {
            S::Idle if protocol::invokes_macro(command, change_command) => {
                self.state = S::CommandSent;
                self.started = false;
                Outgoing::Deliberate
            }
            S::Initiated if command.trim() == change_command => {
                self.state = S::CommandSent;
                Outgoing::MacroSent
            }
            S::CommandSent | S::WaitingForUser
                if self.started && !protocol::is_keepalive(command) =>
            {
                self.state = S::Verifying;
                Outgoing::SequenceEnded
            }
            _ => Outgoing::Ignored,
        }
    }

    pub fn on_response_line(&mut self, line: &str) -> Incoming {
        use ChangeSequenceState as S;
        match self.state {
            S::CommandSent if protocol::is_paused_for_user(line) => {
                self.state = S::WaitingForUser;
                self.started = true;
                Incoming::PausedForUser
            }
            S::WaitingForUser if protocol::is_processing(line) => {
                self.state = S::CommandSent;
                Incoming::Resumed
            }
            _ => Incoming::Ignored,
        }
    }

    /// Presence check after the macro came back. Leaves the episode idle
    /// either way; the caller re-triggers when filament is still missing.
    pub fn finish_verification(&mut self) -> bool {
        if self.state != ChangeSequenceState::Verifying {
            return false;
        }
        self.reset();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChangeSequenceState as S;

    const CHANGE: &str = "M600 X0 Y0";

    #[test]
    fn full_episode() {
        let mut seq = ChangeSequence::new();
        assert!(seq.begin());
        assert_eq!(seq.state(), S::Initiated);
        assert_eq!(seq.before_send("M600 X0 Y0", CHANGE), Outgoing::MacroSent);
        assert_eq!(seq.state(), S::CommandSent);
        assert!(!seq.started());

        assert_eq!(
            seq.on_response_line("echo:busy: paused for user"),
            Incoming::PausedForUser
        );
        assert_eq!(seq.state(), S::WaitingForUser);
        assert!(seq.started());

        assert_eq!(seq.before_send("M113", CHANGE), Outgoing::Ignored);
        assert_eq!(seq.before_send("G1 X10", CHANGE), Outgoing::SequenceEnded);
        assert_eq!(seq.state(), S::Verifying);
        assert!(seq.finish_verification());
        assert_eq!(seq.state(), S::Idle);
    }

    #[test]
    fn second_begin_is_a_noop() {
        let mut seq = ChangeSequence::new();
        assert!(seq.begin());
        assert!(!seq.begin());
        assert_eq!(seq.state(), S::Initiated);
    }

    #[test]
    fn hand_typed_macro_enters_command_sent() {
        let mut seq = ChangeSequence::new();
        assert_eq!(seq.before_send("M600", CHANGE), Outgoing::Deliberate);
        assert_eq!(seq.state(), S::CommandSent);
        assert!(!seq.started());
    }

    #[test]
    fn initiated_needs_exact_command() {
        let mut seq = ChangeSequence::new();
        seq.begin();
        assert_eq!(seq.before_send("M600", CHANGE), Outgoing::Ignored);
        assert_eq!(seq.state(), S::Initiated);
    }

    #[test]
    fn commands_before_pause_do_not_end_sequence() {
        let mut seq = ChangeSequence::new();
        seq.begin();
        seq.before_send(CHANGE, CHANGE);
        assert_eq!(seq.before_send("M105", CHANGE), Outgoing::Ignored);
        assert_eq!(seq.state(), S::CommandSent);
    }

    #[test]
    fn processing_returns_to_command_sent() {
        let mut seq = ChangeSequence::new();
        seq.begin();
        seq.before_send(CHANGE, CHANGE);
        seq.on_response_line("echo:busy: paused for user");
        assert_eq!(
            seq.on_response_line("echo:busy: processing"),
            Incoming::Resumed
        );
        assert_eq!(seq.state(), S::CommandSent);
        assert!(seq.started());
        // paused again later in the same episode
        assert_eq!(
            seq.on_response_line("echo:busy: paused for user"),
            Incoming::PausedForUser
        );
    }

    #[test]
    fn verifying_ignores_traffic() {
        let mut seq = ChangeSequence::new();
        seq.begin();
        seq.before_send(CHANGE, CHANGE);
        seq.on_response_line("busy: paused for user");
        seq.before_send("G28", CHANGE);
        assert_eq!(seq.before_send("M600", CHANGE), Outgoing::Ignored);
        assert_eq!(seq.on_response_line("busy: paused for user"), Incoming::Ignored);
        assert!(!seq.begin());
    }

    #[test]
    fn finish_outside_verifying_is_rejected() {
        let mut seq = ChangeSequence::new();
        seq.begin();
        assert!(!seq.finish_verification());
        assert_eq!(seq.state(), S::Initiated);
    }
}
