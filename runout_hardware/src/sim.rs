//! Simulated sensor pin for running without GPIO.
//!
//! The level is shared with a [`SimHandle`]; changing it through the handle
//! fires the armed edge callback, subject to the same bounce filter the
//! hardware pin applies.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use runout_traits::{Edge, Level, SensorPin};

use crate::bounce::BounceFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

struct Watch {
    edge: Edge,
    filter: BounceFilter,
    on_edge: Box<dyn FnMut(Level) + Send>,
}

struct SimState {
    level: Level,
    watch: Option<Watch>,
}

fn lock(m: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulatedPin {
    bcm: u8,
    state: Arc<Mutex<SimState>>,
}

#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPin {
    pub fn new(bcm: u8, level: Level) -> (Self, SimHandle) {
        let handle = SimHandle::new(level);
        (handle.open(bcm), handle)
    }

    pub fn bcm(&self) -> u8 {
        self.bcm
    }
}

impl SimHandle {
    /// A simulated line, initially at `level`, with no pin open on it.
    pub fn new(level: Level) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState { level, watch: None })),
        }
    }

    /// Open a pin on this line. Pins opened later replace the edge watch of
    /// earlier ones.
    pub fn open(&self, bcm: u8) -> SimulatedPin {
        SimulatedPin {
            bcm,
            state: self.state.clone(),
        }
    }

    pub fn level(&self) -> Level {
        lock(&self.state).level
    }

    /// Drive the simulated line. Fires the edge callback when the level
    /// changes in a watched direction and the bounce filter lets it through.
    pub fn set(&self, level: Level) {
        let mut s = lock(&self.state);
        if s.level == level {
            return;
        }
        s.level = level;
        let Some(w) = s.watch.as_mut() else {
            return;
        };
        let wanted = match w.edge {
            Edge::Both => true,
            Edge::Rising => level == Level::High,
            Edge::Falling => level == Level::Low,
        };
        if wanted && w.filter.accept(Instant::now()) {
            tracing::trace!(?level, "simulated edge");
            (w.on_edge)(level);
        }
    }

    pub fn watched(&self) -> bool {
        lock(&self.state).watch.is_some()
    }
}

impl SensorPin for SimulatedPin {
    fn read(&mut self) -> Result<Level, BoxError> {
        Ok(lock(&self.state).level)
    }

    fn watch_edges(
        &mut self,
        edge: Edge,
        bounce: Duration,
        on_edge: Box<dyn FnMut(Level) + Send>,
    ) -> Result<(), BoxError> {
        tracing::debug!(bcm = self.bcm, ?edge, "simulated edge watch armed");
        lock(&self.state).watch = Some(Watch {
            edge,
            filter: BounceFilter::new(bounce),
            on_edge,
        });
        Ok(())
    }

    fn unwatch_edges(&mut self) -> Result<(), BoxError> {
        lock(&self.state).watch = None;
        Ok(())
    }
}

impl Drop for SimulatedPin {
    fn drop(&mut self) {
        lock(&self.state).watch = None;
    }
}
