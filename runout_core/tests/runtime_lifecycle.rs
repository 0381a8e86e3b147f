//! Runtime thread lifecycle: spawning and dropping must not leak threads or
//! leave the pin armed.

use runout_core::config::{PinId, SensorConfig};
use runout_core::coordinator::LifecycleEvent;
use runout_core::mocks::{RecordingNotifier, RecordingPrinter, ScriptedPin};
use runout_core::{PinFactory, Runtime};
use runout_traits::{Level, ManualClock, SensorPin};
use std::time::{Duration, Instant};

fn factory_for(pin: ScriptedPin) -> PinFactory {
    let mut slot = Some(pin);
    Box::new(move |_, _| {
        slot.take()
            .map(|p| Box::new(p) as Box<dyn SensorPin + Send>)
            .ok_or_else(|| "pin already taken".into())
    })
}

fn configured() -> SensorConfig {
    SensorConfig {
        pin: Some(PinId { number: 7, bcm: 4 }),
        ..SensorConfig::default()
    }
}

fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn runtime_threads_exit_on_drop() {
    let (pin, _handle) = ScriptedPin::new(Level::Low);
    let rt = Runtime::spawn(
        configured(),
        RecordingPrinter::default(),
        RecordingNotifier::default(),
        factory_for(pin),
        ManualClock::new(),
    )
    .expect("spawn");
    std::thread::sleep(Duration::from_millis(20));
    drop(rt);
}

#[test]
fn many_runtimes_dont_leak_threads() {
    for _ in 0..10 {
        let (pin, handle) = ScriptedPin::new(Level::Low);
        let rt = Runtime::spawn(
            configured(),
            RecordingPrinter::default(),
            RecordingNotifier::default(),
            factory_for(pin),
            ManualClock::new(),
        )
        .expect("spawn");
        rt.lifecycle(LifecycleEvent::PrintStarted);
        assert!(eventually(|| handle.armed()));
        rt.shutdown();
        assert!(!handle.armed());
    }
}

#[test]
fn print_end_disarms_edge_watch() {
    let (pin, handle) = ScriptedPin::new(Level::Low);
    let rt = Runtime::spawn(
        configured(),
        RecordingPrinter::default(),
        RecordingNotifier::default(),
        factory_for(pin),
        ManualClock::new(),
    )
    .expect("spawn");
    rt.lifecycle(LifecycleEvent::PrintStarted);
    assert!(eventually(|| handle.armed()));
    rt.lifecycle(LifecycleEvent::PrintDone);
    assert!(eventually(|| !handle.armed()));
}

#[test]
fn unconfigured_runtime_never_opens_a_pin() {
    let factory: PinFactory = Box::new(|_, _| panic!("pin opened while disabled"));
    let notifier = RecordingNotifier::default();
    let rt = Runtime::spawn(
        SensorConfig::default(),
        RecordingPrinter::default(),
        notifier.clone(),
        factory,
        ManualClock::new(),
    )
    .expect("spawn");
    rt.lifecycle(LifecycleEvent::PrintStarted);
    rt.shutdown();
    assert_eq!(notifier.notices().len(), 1);
}
