//! Test and helper mocks for runout_core.
//!
//! Recorders share their log through an `Arc`, so a clone kept by the test
//! sees everything the monitor did with the original.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use runout_traits::{Edge, Level, Notice, Notifier, Printer, SensorPin};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterCall {
    Command(String),
    Cancel,
    Pause,
}

/// Printer that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingPrinter {
    calls: Arc<Mutex<Vec<PrinterCall>>>,
    fail: bool,
}

impl RecordingPrinter {
    /// Records calls but reports every one as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PrinterCall> {
        lock(&self.calls).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                PrinterCall::Command(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PrinterCall) -> Result<(), BoxError> {
        lock(&self.calls).push(call);
        if self.fail {
            Err(Box::new(std::io::Error::other("printer offline")))
        } else {
            Ok(())
        }
    }
}

impl Printer for RecordingPrinter {
    fn send_command(&mut self, command: &str) -> Result<(), BoxError> {
        self.record(PrinterCall::Command(command.to_string()))
    }
    fn cancel_print(&mut self) -> Result<(), BoxError> {
        self.record(PrinterCall::Cancel)
    }
    fn pause_print(&mut self) -> Result<(), BoxError> {
        self.record(PrinterCall::Pause)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.notices)
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&mut self, notice: Notice) -> Result<(), BoxError> {
        lock(&self.notices).push(notice);
        Ok(())
    }
}

struct PinState {
    level: Level,
    /// Consumed by `read` before falling back to `level`.
    script: VecDeque<Level>,
    fail_reads: bool,
    on_edge: Option<Box<dyn FnMut(Level) + Send>>,
    reads: usize,
}

/// In-memory sensor pin. Reads return the scripted levels first, then the
/// current level. Tests drive it through a [`PinHandle`].
pub struct ScriptedPin {
    state: Arc<Mutex<PinState>>,
}

/// Test-side control of a [`ScriptedPin`].
#[derive(Clone)]
pub struct PinHandle {
    state: Arc<Mutex<PinState>>,
}

impl ScriptedPin {
    pub fn new(level: Level) -> (Self, PinHandle) {
        let state = Arc::new(Mutex::new(PinState {
            level,
            script: VecDeque::new(),
            fail_reads: false,
            on_edge: None,
            reads: 0,
        }));
        (
            Self {
                state: state.clone(),
            },
            PinHandle { state },
        )
    }
}

impl PinHandle {
    /// Change the steady level and fire the edge callback if armed.
    pub fn set_level(&self, level: Level) {
        let cb = {
            let mut s = lock(&self.state);
            if s.level == level {
                return;
            }
            s.level = level;
            s.on_edge.take()
        };
        if let Some(mut cb) = cb {
            cb(level);
            let mut s = lock(&self.state);
            // keep a callback installed by a re-arm during the call
            if s.on_edge.is_none() {
                s.on_edge = Some(cb);
            }
        }
    }

    /// Queue levels returned by the next reads.
    pub fn script(&self, levels: impl IntoIterator<Item = Level>) {
        lock(&self.state).script.extend(levels);
    }

    pub fn fail_reads(&self, fail: bool) {
        lock(&self.state).fail_reads = fail;
    }

    pub fn armed(&self) -> bool {
        lock(&self.state).on_edge.is_some()
    }

    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

impl SensorPin for ScriptedPin {
    fn read(&mut self) -> Result<Level, BoxError> {
        let mut s = lock(&self.state);
        s.reads += 1;
        if s.fail_reads {
            return Err(Box::new(std::io::Error::other("read failed")));
        }
        let level = s.level;
        Ok(s.script.pop_front().unwrap_or(level))
    }

    fn watch_edges(
        &mut self,
        _edge: Edge,
        _bounce: Duration,
        on_edge: Box<dyn FnMut(Level) + Send>,
    ) -> Result<(), BoxError> {
        lock(&self.state).on_edge = Some(on_edge);
        Ok(())
    }

    fn unwatch_edges(&mut self) -> Result<(), BoxError> {
        lock(&self.state).on_edge = None;
        Ok(())
    }
}
