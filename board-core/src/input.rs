//! Taster und generische I/O-Pins
//!
//! Klicks werden im Tick-Kontext erfasst und bleiben gespeichert, bis der
//! Foreground-Code sie abfragt.

use crate::effect::DutyPhase;
use crate::traits::{PinDirection, PinIo};
use crate::types::KeyScan;

pub const IO_PIN_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    A,
    B,
}

/// Die vier herausgeführten I/O-Pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoPin {
    D0,
    D5,
    D6,
    D7,
}

impl IoPin {
    pub const ALL: [IoPin; IO_PIN_COUNT] = [IoPin::D0, IoPin::D5, IoPin::D6, IoPin::D7];

    pub fn index(self) -> usize {
        match self {
            IoPin::D0 => 0,
            IoPin::D5 => 1,
            IoPin::D6 => 2,
            IoPin::D7 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    #[default]
    Unused,
    /// Eingang mit Pull-Up, Klick-Erkennung wie bei den Onboard-Tastern
    Button,
    /// Ausgang mit Duty-Cycle (0 = aus, 10 = dauerhaft an)
    Output(u8),
}

/// Pegel + gespeicherter Klick eines Tasters
#[derive(Debug, Clone, Copy, Default)]
struct ButtonState {
    down: bool,
    clicked: bool,
}

impl ButtonState {
    fn sample(&mut self, pressed: bool) {
        self.down = pressed;
        if pressed {
            self.clicked = true;
        }
    }

    /// Ein Klick zählt erst nach dem Loslassen
    fn take_click(&mut self) -> bool {
        if self.down {
            return false;
        }
        core::mem::take(&mut self.clicked)
    }
}

#[derive(Debug, Default)]
pub struct InputEngine {
    a: ButtonState,
    b: ButtonState,
    both_clicked: bool,
    pins: [PinMode; IO_PIN_COUNT],
    pin_buttons: [ButtonState; IO_PIN_COUNT],
    reconfigure: [bool; IO_PIN_COUNT],
    phase: DutyPhase,
}

impl InputEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Tick-Kontext
    // ========================================================================

    /// Übernimmt den Tastenzustand und bedient die I/O-Pins
    ///
    /// `keys` ist `None`, wenn der Bus im aktuellen Tick nicht lesbar war.
    pub fn poll<P: PinIo>(&mut self, keys: Option<KeyScan>, pins: &mut P) {
        if let Some(keys) = keys {
            self.a.sample(keys.a);
            self.b.sample(keys.b);
            if keys.a && keys.b {
                self.both_clicked = true;
            }
        }

        for pin in IoPin::ALL {
            let i = pin.index();
            if core::mem::take(&mut self.reconfigure[i]) {
                match self.pins[i] {
                    PinMode::Unused => pins.set_level(pin, false),
                    PinMode::Button => pins.configure(pin, PinDirection::InputPullUp),
                    PinMode::Output(_) => pins.configure(pin, PinDirection::Output),
                }
            }
            match self.pins[i] {
                PinMode::Unused => {}
                PinMode::Button => self.pin_buttons[i].sample(pins.is_low(pin)),
                PinMode::Output(duty) => pins.set_level(pin, self.phase.is_lit(duty)),
            }
        }
        self.phase.step();
    }

    // ========================================================================
    // Foreground-API
    // ========================================================================

    pub fn is_down(&self, button: Button) -> bool {
        match button {
            Button::A => self.a.down,
            Button::B => self.b.down,
        }
    }

    /// `true` genau einmal pro Klick, nachdem der Taster losgelassen wurde
    pub fn clicked(&mut self, button: Button) -> bool {
        match button {
            Button::A => self.a.take_click(),
            Button::B => self.b.take_click(),
        }
    }

    /// Beide Taster gleichzeitig geklickt; verbraucht auch die Einzelklicks
    pub fn clicked_both(&mut self) -> bool {
        if self.a.down || self.b.down || !self.both_clicked {
            return false;
        }
        self.both_clicked = false;
        self.a.clicked = false;
        self.b.clicked = false;
        true
    }

    pub fn pin_mode(&self, pin: IoPin) -> PinMode {
        self.pins[pin.index()]
    }

    /// Pin als Ausgang mit Duty-Cycle 0..=10
    pub fn set_pin_effect(&mut self, pin: IoPin, duty: u8) {
        self.set_mode(pin, PinMode::Output(duty.min(10)));
    }

    pub fn enable_pin_button(&mut self, pin: IoPin) {
        self.set_mode(pin, PinMode::Button);
    }

    /// Pin freigeben (Ausgang wird auf LOW gezogen)
    pub fn clear_pin(&mut self, pin: IoPin) {
        self.set_mode(pin, PinMode::Unused);
    }

    pub fn pin_down(&self, pin: IoPin) -> bool {
        self.pin_buttons[pin.index()].down
    }

    pub fn pin_clicked(&mut self, pin: IoPin) -> bool {
        self.pin_buttons[pin.index()].take_click()
    }

    fn set_mode(&mut self, pin: IoPin, mode: PinMode) {
        let i = pin.index();
        let direction_changes = !matches!(
            (self.pins[i], mode),
            (PinMode::Output(_), PinMode::Output(_)) | (PinMode::Button, PinMode::Button)
        );
        self.pins[i] = mode;
        if direction_changes {
            self.reconfigure[i] = true;
            self.pin_buttons[i] = ButtonState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePins {
        levels: [bool; IO_PIN_COUNT],
        low: [bool; IO_PIN_COUNT],
        directions: [Option<PinDirection>; IO_PIN_COUNT],
    }

    impl PinIo for FakePins {
        fn configure(&mut self, pin: IoPin, direction: PinDirection) {
            self.directions[pin.index()] = Some(direction);
        }
        fn set_level(&mut self, pin: IoPin, high: bool) {
            self.levels[pin.index()] = high;
        }
        fn is_low(&mut self, pin: IoPin) -> bool {
            self.low[pin.index()]
        }
    }

    fn press(input: &mut InputEngine, pins: &mut FakePins, a: bool, b: bool) {
        input.poll(Some(KeyScan { a, b }), pins);
    }

    #[test]
    fn test_click_only_after_release() {
        let mut input = InputEngine::new();
        let mut pins = FakePins::default();
        press(&mut input, &mut pins, true, false);
        assert!(input.is_down(Button::A));
        assert!(!input.clicked(Button::A));

        press(&mut input, &mut pins, false, false);
        assert!(input.clicked(Button::A));
        assert!(!input.clicked(Button::A));
    }

    #[test]
    fn test_both_clicked_consumes_single_clicks() {
        let mut input = InputEngine::new();
        let mut pins = FakePins::default();
        press(&mut input, &mut pins, true, true);
        assert!(!input.clicked_both());
        press(&mut input, &mut pins, false, false);
        assert!(input.clicked_both());
        assert!(!input.clicked(Button::A));
        assert!(!input.clicked(Button::B));
    }

    #[test]
    fn test_pin_duty_cycle() {
        let mut input = InputEngine::new();
        let mut pins = FakePins::default();
        input.set_pin_effect(IoPin::D5, 3);

        let mut high = 0;
        for _ in 0..10 {
            input.poll(None, &mut pins);
            if pins.levels[IoPin::D5.index()] {
                high += 1;
            }
        }
        assert_eq!(high, 3);
        assert_eq!(pins.directions[IoPin::D5.index()], Some(PinDirection::Output));
    }

    #[test]
    fn test_pin_button() {
        let mut input = InputEngine::new();
        let mut pins = FakePins::default();
        input.enable_pin_button(IoPin::D7);
        pins.low[IoPin::D7.index()] = true;
        input.poll(None, &mut pins);
        assert!(input.pin_down(IoPin::D7));
        pins.low[IoPin::D7.index()] = false;
        input.poll(None, &mut pins);
        assert!(input.pin_clicked(IoPin::D7));
        assert_eq!(pins.directions[IoPin::D7.index()], Some(PinDirection::InputPullUp));
    }
}
