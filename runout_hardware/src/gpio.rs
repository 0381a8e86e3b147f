//! Raspberry Pi GPIO sensor pin (rppal).

use std::time::Duration;

use rppal::gpio::{Event, Gpio, InputPin, Mode, Trigger};
use runout_traits::{Edge, Level, Pull, SensorPin};

use crate::error::{HwError, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a header pin is currently configured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFunction {
    Input,
    Output,
    /// Claimed by a peripheral (I2C, SPI, UART, PWM).
    Alternate(u8),
    Unused,
}

fn map_gpio_error(e: rppal::gpio::Error) -> HwError {
    match e {
        rppal::gpio::Error::PinUsed(p) => HwError::PinInUse(p),
        rppal::gpio::Error::PinNotAvailable(p) => HwError::InvalidPin(p),
        rppal::gpio::Error::Io(io) => HwError::Io(io),
        other => HwError::Gpio(other.to_string()),
    }
}

fn function_of(mode: Mode) -> PinFunction {
    match mode {
        Mode::Input => PinFunction::Input,
        Mode::Output => PinFunction::Output,
        Mode::Alt0 => PinFunction::Alternate(0),
        Mode::Alt1 => PinFunction::Alternate(1),
        Mode::Alt2 => PinFunction::Alternate(2),
        Mode::Alt3 => PinFunction::Alternate(3),
        Mode::Alt4 => PinFunction::Alternate(4),
        Mode::Alt5 => PinFunction::Alternate(5),
        #[allow(unreachable_patterns)]
        _ => PinFunction::Unused,
    }
}

fn to_level(level: rppal::gpio::Level) -> Level {
    match level {
        rppal::gpio::Level::Low => Level::Low,
        rppal::gpio::Level::High => Level::High,
    }
}

/// Current function of BCM line `bcm`, without claiming it.
pub fn query_pin_function(bcm: u8) -> Result<PinFunction> {
    let gpio = Gpio::new().map_err(map_gpio_error)?;
    let pin = gpio.get(bcm).map_err(map_gpio_error)?;
    Ok(function_of(pin.mode()))
}

pub struct GpioPin {
    bcm: u8,
    pin: InputPin,
}

impl GpioPin {
    /// Claim BCM line `bcm` as an input with the given pull resistor.
    /// Lines owned by a peripheral are refused.
    pub fn open(bcm: u8, pull: Pull) -> Result<Self> {
        let gpio = Gpio::new().map_err(map_gpio_error)?;
        let pin = gpio.get(bcm).map_err(map_gpio_error)?;
        if let PinFunction::Alternate(alt) = function_of(pin.mode()) {
            tracing::warn!(bcm, alt, "pin is assigned to a peripheral");
            return Err(HwError::PinInUse(bcm));
        }
        let pin = match pull {
            Pull::Up => pin.into_input_pullup(),
            Pull::Down => pin.into_input_pulldown(),
        };
        tracing::debug!(bcm, ?pull, "gpio input configured");
        Ok(Self { bcm, pin })
    }
}

impl SensorPin for GpioPin {
    fn read(&mut self) -> std::result::Result<Level, BoxError> {
        Ok(to_level(self.pin.read()))
    }

    fn watch_edges(
        &mut self,
        edge: Edge,
        bounce: Duration,
        mut on_edge: Box<dyn FnMut(Level) + Send>,
    ) -> std::result::Result<(), BoxError> {
        let trigger = match edge {
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
            Edge::Both => Trigger::Both,
        };
        // rppal applies the bounce window in its interrupt thread
        let debounce = (!bounce.is_zero()).then_some(bounce);
        self.pin
            .set_async_interrupt(trigger, debounce, move |event: Event| {
                let level = match event.trigger {
                    Trigger::RisingEdge => Level::High,
                    _ => Level::Low,
                };
                on_edge(level);
            })
            .map_err(|e| Box::new(map_gpio_error(e)) as BoxError)?;
        tracing::debug!(bcm = self.bcm, ?edge, "gpio interrupt registered");
        Ok(())
    }

    fn unwatch_edges(&mut self) -> std::result::Result<(), BoxError> {
        self.pin
            .clear_async_interrupt()
            .map_err(|e| Box::new(map_gpio_error(e)) as BoxError)
    }
}

/// Pin factory for the runtime.
pub fn open_sensor_pin(
    bcm: u8,
    pull: Pull,
) -> std::result::Result<Box<dyn SensorPin + Send>, BoxError> {
    Ok(Box::new(GpioPin::open(bcm, pull)?))
}
