//! Raw pin level → "filament present".
//!
//! Present iff `(level + power + trigger) mod 2 == 0`. The power bit says
//! which level a closed switch produces (ground wiring pulls a closed switch
//! low), the trigger bit says whether closed or open means "out of filament".

use runout_traits::{Level, SensorPin};

use crate::config::{Power, SensorConfig, TriggerMode};
use crate::error::RunoutError;
use crate::hw_error::map_sensor_error;

#[inline]
pub fn is_present(level: Level, power: Power, trigger: TriggerMode) -> bool {
    (level.bit() + power.bit() + trigger.bit()) % 2 == 0
}

#[inline]
pub fn evaluate(level: Level, config: &SensorConfig) -> bool {
    is_present(level, config.power, config.trigger)
}

/// The pin level that reads as "no filament".
pub fn runout_level(power: Power, trigger: TriggerMode) -> Level {
    Level::from_bit((1 + power.bit() + trigger.bit()) % 2)
}

/// One raw read, evaluated.
pub fn read_presence<P: SensorPin + ?Sized>(
    pin: &mut P,
    config: &SensorConfig,
) -> Result<bool, RunoutError> {
    let level = pin.read().map_err(|e| map_sensor_error(e.as_ref()))?;
    Ok(evaluate(level, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn power(bit: u8) -> Power {
        if bit == 0 { Power::Grounded } else { Power::Powered }
    }

    fn trigger(bit: u8) -> TriggerMode {
        if bit == 0 {
            TriggerMode::ActiveOpen
        } else {
            TriggerMode::ActiveClosed
        }
    }

    #[rstest]
    #[case(0, 0, 0, true)]
    #[case(1, 0, 0, false)]
    #[case(0, 1, 0, false)]
    #[case(1, 1, 0, true)]
    #[case(0, 0, 1, false)]
    #[case(1, 0, 1, true)]
    #[case(0, 1, 1, true)]
    #[case(1, 1, 1, false)]
    fn parity_table(#[case] l: u8, #[case] p: u8, #[case] t: u8, #[case] present: bool) {
        assert_eq!(is_present(Level::from_bit(l), power(p), trigger(t)), present);
    }

    #[test]
    fn grounded_open_switch_reads_high_and_means_runout() {
        // pull-up holds an open switch high
        assert!(!is_present(Level::High, Power::Grounded, TriggerMode::ActiveOpen));
        assert_eq!(runout_level(Power::Grounded, TriggerMode::ActiveOpen), Level::High);
        assert_eq!(runout_level(Power::Grounded, TriggerMode::ActiveClosed), Level::Low);
    }

    proptest! {
        #[test]
        fn matches_parity_formula(l in 0u8..2, p in 0u8..2, t in 0u8..2) {
            let got = is_present(Level::from_bit(l), power(p), trigger(t));
            prop_assert_eq!(got, (l + p + t) % 2 == 0);
        }

        #[test]
        fn runout_level_is_never_present(p in 0u8..2, t in 0u8..2) {
            let level = runout_level(power(p), trigger(t));
            prop_assert!(!is_present(level, power(p), trigger(t)));
        }
    }
}
