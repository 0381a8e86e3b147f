#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use runout_core::mocks::{RecordingNotifier, RecordingPrinter};
use runout_core::{Event, LifecycleEvent, Monitor, PinId, SensorConfig};

#[derive(Debug, Arbitrary)]
enum Step {
    Lifecycle(u8),
    Outgoing(String),
    Response(String),
    Sampled(bool),
}

fuzz_target!(|steps: Vec<Step>| {
    let cfg = SensorConfig {
        pin: Some(PinId { number: 11, bcm: 17 }),
        ..SensorConfig::default()
    };
    let mut m = Monitor::new(cfg, RecordingPrinter::default(), RecordingNotifier::default());
    m.start();
    for step in steps {
        let event = match step {
            Step::Lifecycle(i) => {
                let all = LifecycleEvent::ALL;
                Event::Lifecycle(all[usize::from(i) % all.len()])
            }
            Step::Outgoing(cmd) => Event::Outgoing(cmd),
            Step::Response(line) => Event::Response(line),
            Step::Sampled(present) => Event::Sampled {
                purpose: runout_core::SamplePurpose::Edge,
                epoch: m.epoch(),
                present: Some(present),
            },
        };
        m.handle(event);
        let _ = m.drain_tasks();
    }
});
