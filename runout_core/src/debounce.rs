//! Repeated-sampling debounce.
//!
//! A reading is accepted once `samples` consecutive reads agree. Any
//! disagreement restarts the window with the disagreeing read as its first
//! sample: contact bounce comes in bursts, so the debouncer waits for the
//! line to go quiet instead of voting.
//!
//! Sampling blocks the calling thread for at least
//! `(samples - 1) * interval`; run it on the sensor worker, never on the
//! thread that forwards protocol lines.

use runout_traits::Clock;

use crate::config::DebounceCfg;

pub struct Debouncer<C: Clock> {
    cfg: DebounceCfg,
    clock: C,
}

impl<C: Clock> Debouncer<C> {
    pub fn new(cfg: DebounceCfg, clock: C) -> Self {
        Self { cfg, clock }
    }

    pub fn cfg(&self) -> DebounceCfg {
        self.cfg
    }

    /// Sample until a full window agrees and return the agreed value.
    pub fn sample_stable<E>(&self, read: impl FnMut() -> Result<bool, E>) -> Result<bool, E> {
        // never cancelled, so the window always yields a value
        Ok(self.sample_stable_while(read, || true)?.unwrap_or_default())
    }

    /// Like `sample_stable`, but checks `keep_going` before every read and
    /// returns `Ok(None)` as soon as it reports false.
    pub fn sample_stable_while<E>(
        &self,
        mut read: impl FnMut() -> Result<bool, E>,
        keep_going: impl Fn() -> bool,
    ) -> Result<Option<bool>, E> {
        let window = self.cfg.samples.max(1);
        if !keep_going() {
            return Ok(None);
        }
        let mut last = read()?;
        let mut agreeing = 1u32;
        let mut restarts = 0u32;
        while agreeing < window {
            self.clock.sleep(self.cfg.interval);
            if !keep_going() {
                tracing::trace!(agreeing, restarts, "debounce cancelled");
                return Ok(None);
            }
            let v = read()?;
            if v == last {
                agreeing += 1;
            } else {
                restarts = restarts.saturating_add(1);
                tracing::trace!(from = last, to = v, restarts, "debounce window restarted");
                last = v;
                agreeing = 1;
            }
        }
        if restarts > 0 {
            tracing::debug!(value = last, restarts, "debounced reading settled");
        }
        Ok(Some(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use runout_traits::ManualClock;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::time::Duration;

    fn debouncer(samples: u32, clock: ManualClock) -> Debouncer<ManualClock> {
        Debouncer::new(
            DebounceCfg {
                samples,
                interval: Duration::from_millis(50),
            },
            clock,
        )
    }

    /// Reads from a script; panics when the script runs dry.
    fn scripted<'a>(
        seq: &'a [bool],
        reads: &'a Cell<usize>,
    ) -> impl FnMut() -> Result<bool, Infallible> + 'a {
        move || {
            let i = reads.get();
            reads.set(i + 1);
            Ok(seq[i])
        }
    }

    #[test]
    fn quiet_line_needs_exactly_one_window() {
        let clock = ManualClock::new();
        let d = debouncer(5, clock.clone());
        let seq = [false; 5];
        let reads = Cell::new(0);
        let read = scripted(&seq, &reads);
        assert_eq!(d.sample_stable(read), Ok(false));
        assert_eq!(reads.get(), 5);
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn single_flip_restarts_the_window() {
        let clock = ManualClock::new();
        let d = debouncer(5, clock.clone());
        // flip at the third sample, then quiet
        let seq = [true, true, false, false, false, false, false];
        let reads = Cell::new(0);
        let read = scripted(&seq, &reads);
        assert_eq!(d.sample_stable(read), Ok(false));
        assert_eq!(reads.get(), 7);
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn flip_back_still_requires_full_window() {
        let d = debouncer(3, ManualClock::new());
        let seq = [true, false, true, true, true];
        let reads = Cell::new(0);
        let read = scripted(&seq, &reads);
        assert_eq!(d.sample_stable(read), Ok(true));
        assert_eq!(reads.get(), 5);
    }

    #[test]
    fn zero_window_behaves_like_one() {
        let d = debouncer(0, ManualClock::new());
        let seq = [true];
        let reads = Cell::new(0);
        let read = scripted(&seq, &reads);
        assert_eq!(d.sample_stable(read), Ok(true));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn read_error_aborts_window() {
        let d = debouncer(5, ManualClock::new());
        let mut n = 0;
        let res = d.sample_stable(|| {
            n += 1;
            if n == 3 { Err("pin gone") } else { Ok(true) }
        });
        assert_eq!(res, Err("pin gone"));
    }

    #[test]
    fn cancellation_stops_before_next_read() {
        let d = debouncer(5, ManualClock::new());
        let reads = Cell::new(0u32);
        let res = d.sample_stable_while(
            || {
                reads.set(reads.get() + 1);
                Ok::<_, Infallible>(true)
            },
            || reads.get() < 2,
        );
        assert_eq!(res, Ok(None));
        assert_eq!(reads.get(), 2);
    }

    #[test]
    fn cancelled_up_front_never_reads() {
        let d = debouncer(5, ManualClock::new());
        let res = d.sample_stable_while(|| -> Result<bool, Infallible> { panic!("read") }, || false);
        assert_eq!(res, Ok(None));
    }

    /// Index just past the first run of `window` equal values.
    fn first_settled(seq: &[bool], window: usize) -> Option<(bool, usize)> {
        let mut run = 0;
        for i in 0..seq.len() {
            if i > 0 && seq[i] == seq[i - 1] {
                run += 1;
            } else {
                run = 1;
            }
            if run == window {
                return Some((seq[i], i + 1));
            }
        }
        None
    }

    proptest! {
        #[test]
        fn settles_on_first_quiet_run(
            prefix in proptest::collection::vec(any::<bool>(), 0..20),
            tail in any::<bool>(),
            window in 1u32..8,
        ) {
            let mut seq = prefix;
            seq.extend(std::iter::repeat_n(tail, window as usize));
            let (want, reads_needed) = first_settled(&seq, window as usize).expect("tail settles");

            let d = debouncer(window, ManualClock::new());
            let reads = Cell::new(0usize);
            let got = d.sample_stable(|| {
                let i = reads.get();
                reads.set(i + 1);
                Ok::<_, Infallible>(seq[i])
            });
            prop_assert_eq!(got, Ok(want));
            prop_assert_eq!(reads.get(), reads_needed);
        }
    }
}
