//! Threads around the monitor.
//!
//! `Runtime::spawn` starts the monitor thread, which owns the [`Monitor`] and
//! a [`SensorWorker`]. Callers on any thread post events through the
//! `Runtime` handle; the G-code intercepts return the line unchanged
//! immediately and never wait for the monitor.
//!
//! The probe retry timer lives in the monitor loop as a crossbeam timer
//! channel; cancelling it swaps in a channel that never fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use eyre::WrapErr;
use runout_traits::{Clock, Notifier, Printer};

use crate::config::SensorConfig;
use crate::coordinator::{Event, LifecycleEvent, Monitor, Task};
use crate::error::Result;
use crate::worker::{PinFactory, Request, SensorWorker};

pub struct Runtime {
    events: xch::Sender<Event>,
    join_handle: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn spawn<P, N, C>(
        config: SensorConfig,
        printer: P,
        notifier: N,
        factory: PinFactory,
        clock: C,
    ) -> Result<Self>
    where
        P: Printer + Send + 'static,
        N: Notifier + Send + 'static,
        C: Clock + Clone + Send + 'static,
    {
        let (tx, rx) = xch::unbounded();
        let epoch = Arc::new(AtomicU64::new(0));
        let worker = SensorWorker::spawn(factory, clock, epoch.clone(), tx.clone())
            .wrap_err("start sensor worker")?;
        let mut monitor = Monitor::new(config, printer, notifier);
        let join_handle = std::thread::Builder::new()
            .name("runout-monitor".into())
            .spawn(move || {
                monitor.start();
                let mut exec = Executor {
                    worker,
                    epoch,
                    retry: xch::never(),
                };
                exec.run(&mut monitor);
                loop {
                    let mut retry_due = false;
                    xch::select! {
                        recv(rx) -> ev => {
                            let Ok(ev) = ev else { break };
                            if matches!(ev, Event::Shutdown) {
                                tracing::debug!("monitor received shutdown signal");
                                break;
                            }
                            monitor.handle(ev);
                        }
                        recv(exec.retry) -> _ => retry_due = true,
                    }
                    if retry_due {
                        exec.retry = xch::never();
                        monitor.handle(Event::ProbeRetryDue);
                    }
                    exec.run(&mut monitor);
                }
                // joins the worker before the monitor goes away
                drop(exec);
                tracing::trace!("monitor thread exiting cleanly");
            })
            .wrap_err("spawn monitor thread")?;
        Ok(Self {
            events: tx,
            join_handle: Some(join_handle),
        })
    }

    /// False once the monitor has stopped.
    pub fn post(&self, event: Event) -> bool {
        self.events.send(event).is_ok()
    }

    /// Outgoing-command intercept. Returns `command` unchanged.
    pub fn before_send<'a>(&self, command: &'a str) -> &'a str {
        self.post(Event::Outgoing(command.to_string()));
        command
    }

    /// Response-line intercept. Returns `line` unchanged.
    pub fn on_response_line<'a>(&self, line: &'a str) -> &'a str {
        self.post(Event::Response(line.to_string()));
        line
    }

    pub fn lifecycle(&self, event: LifecycleEvent) {
        self.post(Event::Lifecycle(event));
    }

    pub fn settings_saved(&self, config: runout_config::Config) {
        self.post(Event::SettingsSaved(Box::new(config)));
    }

    /// Stop after the events already posted have been handled.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.events.send(Event::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("monitor thread joined"),
                Err(e) => tracing::warn!(?e, "monitor thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Carries out the monitor's tasks on the monitor thread.
struct Executor {
    worker: SensorWorker,
    epoch: Arc<AtomicU64>,
    retry: xch::Receiver<std::time::Instant>,
}

impl Executor {
    fn run<P: Printer, N: Notifier>(&mut self, monitor: &mut Monitor<P, N>) {
        for task in monitor.drain_tasks() {
            let delivered = match task {
                Task::Sample { purpose, epoch } => {
                    self.worker.request(Request::Sample { purpose, epoch })
                }
                Task::Arm => self.worker.request(Request::Arm),
                Task::Disarm => self.worker.request(Request::Disarm),
                Task::Bind(config) => self.worker.request(Request::Bind(config)),
                Task::StartRetryTimer(delay) => {
                    self.retry = xch::after(delay);
                    true
                }
                Task::CancelRetryTimer => {
                    self.retry = xch::never();
                    true
                }
                Task::Cancel { epoch } => {
                    self.epoch.store(epoch, Ordering::Release);
                    true
                }
            };
            if !delivered {
                tracing::warn!("sensor worker stopped; task dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinId;
    use crate::coordinator::RUNOUT_MESSAGE;
    use crate::mocks::{PinHandle, RecordingNotifier, RecordingPrinter, ScriptedPin};
    use runout_traits::{Level, ManualClock, SensorPin};
    use std::time::{Duration, Instant};

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn spawn(level: Level) -> (Runtime, RecordingPrinter, RecordingNotifier, PinHandle) {
        let (pin, handle) = ScriptedPin::new(level);
        let mut slot = Some(pin);
        let factory: PinFactory = Box::new(move |_, _| {
            slot.take()
                .map(|p| Box::new(p) as Box<dyn SensorPin + Send>)
                .ok_or_else(|| "pin already taken".into())
        });
        let config = SensorConfig {
            pin: Some(PinId { number: 11, bcm: 17 }),
            probe_retry: Duration::from_millis(10),
            ..SensorConfig::default()
        };
        let printer = RecordingPrinter::default();
        let notifier = RecordingNotifier::default();
        let rt = Runtime::spawn(
            config,
            printer.clone(),
            notifier.clone(),
            factory,
            ManualClock::new(),
        )
        .expect("spawn");
        (rt, printer, notifier, handle)
    }

    #[test]
    fn intercepts_pass_lines_through() {
        let (rt, _, _, _) = spawn(Level::Low);
        assert_eq!(rt.before_send("G1 X10"), "G1 X10");
        assert_eq!(rt.on_response_line("ok"), "ok");
        rt.shutdown();
    }

    #[test]
    fn edge_during_print_sends_change_command() {
        let (rt, printer, notifier, pin) = spawn(Level::Low);
        rt.lifecycle(LifecycleEvent::PrintStarted);
        assert!(wait_for(|| pin.armed()));
        pin.set_level(Level::High);
        assert!(wait_for(|| printer.commands() == ["M600 X0 Y0"]));
        assert!(notifier.messages().contains(&RUNOUT_MESSAGE.to_string()));
        rt.shutdown();
    }

    #[test]
    fn probe_retries_until_answered() {
        let (rt, printer, _, _) = spawn(Level::Low);
        rt.lifecycle(LifecycleEvent::Connected);
        rt.on_response_line("T:20.0 /0.0");
        assert!(wait_for(|| printer.commands().len() == 2));
        rt.on_response_line("ok");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(printer.commands(), vec!["M603", "M603"]);
    }

    #[test]
    fn drop_disarms_pin() {
        let (rt, _, _, pin) = spawn(Level::Low);
        rt.lifecycle(LifecycleEvent::PrintStarted);
        assert!(wait_for(|| pin.armed()));
        drop(rt);
        assert!(!pin.armed());
    }
}
