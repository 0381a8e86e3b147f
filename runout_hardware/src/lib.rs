//! Sensor pin drivers: a simulated pin for development and tests, and the
//! Raspberry Pi GPIO pin behind the `hardware` feature (Linux only).

pub mod bounce;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use error::HwError;
pub use sim::{SimHandle, SimulatedPin};

#[cfg(test)]
mod tests {
    use super::*;
    use runout_traits::{Level, SensorPin};

    #[test]
    fn simulated_pin_reads_handle_level() {
        let (mut pin, handle) = SimulatedPin::new(17, Level::Low);
        assert_eq!(pin.read().ok(), Some(Level::Low));
        handle.set(Level::High);
        assert_eq!(pin.read().ok(), Some(Level::High));
        assert_eq!(pin.bcm(), 17);
    }
}
