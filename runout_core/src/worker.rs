//! Sensor worker thread.
//!
//! Owns the pin. Opens it, runs debounced reads, and arms or disarms the
//! edge watch on request from the monitor, reporting results back as events.
//! Debounced reads stop early when the monitor bumps the sampling epoch.
//!
//! Safety: each `SensorWorker` spawns exactly one thread, shut down and
//! joined when the worker is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use eyre::WrapErr;
use runout_traits::{Clock, Edge, Pull, SensorPin};

use crate::config::SensorConfig;
use crate::coordinator::{Event, SamplePurpose};
use crate::debounce::Debouncer;
use crate::dispatch::edge_callback;
use crate::error::{Result, RunoutError};
use crate::hw_error::map_sensor_error;
use crate::presence::{read_presence, runout_level};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Opens the pin with the given BCM line and pull.
pub type PinFactory = Box<dyn FnMut(u8, Pull) -> std::result::Result<Box<dyn SensorPin + Send>, BoxError> + Send>;

#[derive(Debug)]
pub enum Request {
    Bind(SensorConfig),
    Sample { purpose: SamplePurpose, epoch: u64 },
    Arm,
    Disarm,
}

/// One debounced presence check, blocking until the window agrees.
pub fn sample_presence<P: SensorPin + ?Sized, C: Clock>(
    pin: &mut P,
    config: &SensorConfig,
    clock: C,
) -> std::result::Result<bool, RunoutError> {
    Debouncer::new(config.debounce, clock).sample_stable(|| read_presence(pin, config))
}

pub struct SensorWorker {
    tx: Option<xch::Sender<Request>>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl SensorWorker {
    pub fn spawn<C: Clock + Clone + Send + 'static>(
        factory: PinFactory,
        clock: C,
        epoch: Arc<AtomicU64>,
        events: xch::Sender<Event>,
    ) -> Result<Self> {
        let (tx, rx) = xch::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut state = WorkerState {
            factory,
            clock,
            epoch,
            events,
            shutdown: shutdown.clone(),
            pin: None,
            config: SensorConfig::default(),
            armed: false,
        };
        let join_handle = std::thread::Builder::new()
            .name("runout-sensor".into())
            .spawn(move || {
                for req in rx.iter() {
                    if state.shutdown.load(Ordering::Relaxed) {
                        tracing::debug!("sensor worker received shutdown signal");
                        break;
                    }
                    state.handle(req);
                }
                state.release();
                tracing::trace!("sensor worker exiting cleanly");
            })
            .wrap_err("spawn sensor worker thread")?;
        Ok(Self {
            tx: Some(tx),
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    /// False once the worker has stopped.
    pub fn request(&self, req: Request) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(req).is_ok())
    }
}

impl Drop for SensorWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // closing the queue wakes the thread if it is idle
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sensor worker joined"),
                Err(e) => tracing::warn!(?e, "sensor worker panicked during shutdown"),
            }
        }
    }
}

struct WorkerState<C> {
    factory: PinFactory,
    clock: C,
    epoch: Arc<AtomicU64>,
    events: xch::Sender<Event>,
    shutdown: Arc<AtomicBool>,
    pin: Option<Box<dyn SensorPin + Send>>,
    config: SensorConfig,
    armed: bool,
}

impl<C: Clock + Clone> WorkerState<C> {
    fn handle(&mut self, req: Request) {
        match req {
            Request::Bind(config) => self.bind(config),
            Request::Sample { purpose, epoch } => {
                let present = self.sample(epoch);
                let _ = self.events.send(Event::Sampled {
                    purpose,
                    epoch,
                    present,
                });
            }
            Request::Arm => self.arm(),
            Request::Disarm => self.disarm(),
        }
    }

    fn bind(&mut self, config: SensorConfig) {
        self.release();
        self.config = config;
        let Some(pin_id) = self.config.pin else {
            tracing::info!("sensor released");
            let _ = self.events.send(Event::Bound);
            return;
        };
        let pull = self.config.pull();
        match (self.factory)(pin_id.bcm, pull) {
            Ok(pin) => {
                tracing::info!(pin = pin_id.number, bcm = pin_id.bcm, ?pull, "sensor pin opened");
                self.pin = Some(pin);
                let _ = self.events.send(Event::Bound);
            }
            Err(e) => {
                let err = map_sensor_error(e.as_ref());
                tracing::error!(pin = pin_id.number, error = %err, "failed to open sensor pin");
                let _ = self.events.send(Event::BindFailed(err.to_string()));
            }
        }
    }

    fn sample(&mut self, epoch: u64) -> Option<bool> {
        let Some(pin) = self.pin.as_mut() else {
            tracing::debug!("sample requested with no pin bound");
            return None;
        };
        let current = &self.epoch;
        let shutdown = &self.shutdown;
        let keep_going =
            || !shutdown.load(Ordering::Relaxed) && current.load(Ordering::Acquire) == epoch;
        let config = &self.config;
        let debouncer = Debouncer::new(config.debounce, self.clock.clone());
        match debouncer.sample_stable_while(|| read_presence(pin.as_mut(), config), keep_going) {
            Ok(Some(present)) => Some(present),
            Ok(None) => {
                tracing::debug!(epoch, "sampling cancelled");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "sensor read failed");
                None
            }
        }
    }

    fn arm(&mut self) {
        if self.armed {
            return;
        }
        let Some(pin) = self.pin.as_mut() else {
            tracing::warn!("cannot arm edge watch; no pin bound");
            return;
        };
        match pin.watch_edges(Edge::Both, self.config.bounce, edge_callback(self.events.clone())) {
            Ok(()) => {
                self.armed = true;
                let runout_level = runout_level(self.config.power, self.config.trigger);
                tracing::info!(
                    bounce_ms = self.config.bounce.as_millis() as u64,
                    ?runout_level,
                    "edge watch armed"
                );
            }
            Err(e) => {
                let err = map_sensor_error(e.as_ref());
                tracing::error!(error = %err, "failed to arm edge watch");
            }
        }
    }

    fn disarm(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Some(pin) = self.pin.as_mut() {
            match pin.unwatch_edges() {
                Ok(()) => tracing::info!("edge watch disarmed"),
                Err(e) => {
                    let err = map_sensor_error(e.as_ref());
                    tracing::warn!(error = %err, "failed to disarm edge watch");
                }
            }
        }
    }

    fn release(&mut self) {
        self.disarm();
        self.pin = None;
    }
}
