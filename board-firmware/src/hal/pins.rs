// Die vier frei nutzbaren I/O-Pins (D0, D5, D6, D7)

use board_core::{IoPin, PinDirection, PinIo};
use esp_hal::gpio::{Flex, InputConfig, Level, OutputConfig, Pull};

/// Flex-Pins, damit jeder Pin zur Laufzeit zwischen Eingang und Ausgang
/// wechseln kann (LED-Effekt vs. Taster)
pub struct BoardPins {
    pins: [Flex<'static>; 4],
}

impl BoardPins {
    /// Reihenfolge wie [`IoPin::ALL`]
    pub fn new(pins: [Flex<'static>; 4]) -> Self {
        Self { pins }
    }
}

impl PinIo for BoardPins {
    fn configure(&mut self, pin: IoPin, direction: PinDirection) {
        let flex = &mut self.pins[pin.index()];
        match direction {
            PinDirection::InputPullUp => {
                flex.set_output_enable(false);
                flex.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
                flex.set_input_enable(true);
            }
            PinDirection::Output => {
                flex.set_input_enable(false);
                flex.apply_output_config(&OutputConfig::default());
                flex.set_level(Level::Low);
                flex.set_output_enable(true);
            }
        }
    }

    fn set_level(&mut self, pin: IoPin, high: bool) {
        self.pins[pin.index()].set_level(Level::from(high));
    }

    fn is_low(&mut self, pin: IoPin) -> bool {
        self.pins[pin.index()].is_low()
    }
}
