//! Edge interrupts into the monitor's event queue.
//!
//! The pin driver calls back on its own thread. The callback only posts an
//! event; the debounced check runs on the sensor worker and its result comes
//! back to the monitor. One check is in flight at a time. Edges that arrive
//! meanwhile collapse into a single follow-up check, so the last edge is
//! always verified by a read taken after it.

use crossbeam_channel as xch;
use runout_traits::Level;

use crate::coordinator::Event;

/// Callback handed to `SensorPin::watch_edges`.
pub fn edge_callback(events: xch::Sender<Event>) -> Box<dyn FnMut(Level) + Send> {
    Box::new(move |level| {
        // monitor gone: nothing left to notify
        let _ = events.send(Event::Edge(level));
    })
}

/// Coalesces edge checks.
#[derive(Debug, Default)]
pub struct EdgeDispatcher {
    in_flight: bool,
    /// An edge arrived while the check was running.
    pending: bool,
    dropped: u64,
}

impl EdgeDispatcher {
    /// True when a new check should start.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            self.dropped = self.dropped.saturating_add(1);
            self.pending = true;
            return false;
        }
        self.in_flight = true;
        true
    }

    /// The running check reported back. True when edges came in meanwhile;
    /// the caller then starts the follow-up check, which stays in flight.
    pub fn finish(&mut self) -> bool {
        if std::mem::take(&mut self.pending) {
            return true;
        }
        self.in_flight = false;
        false
    }

    /// Forget the in-flight check (its epoch was cancelled).
    pub fn reset(&mut self) {
        self.in_flight = false;
        self.pending = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Edges dropped while a check was running.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
