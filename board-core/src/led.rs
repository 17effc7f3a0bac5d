//! RGB-Effekt-Engine
//!
//! Hält den Zustand der Onboard-RGB-LED und berechnet pro Tick das
//! nächste Bild. Die Hardware wird nur bei einer Änderung beschrieben.

use rgb::RGB8;

use crate::color::{self, BLACK};
use crate::effect::{Cycles, DutyPhase, Effect};
use crate::traits::{LedError, SmartLedWriter};

pub const DEFAULT_BRIGHTNESS: u8 = 255;

/// Faktor für das Glühen (×1,2 bzw. ÷1,2 pro Tick)
const GLOW_NUM: u32 = 6;
const GLOW_DEN: u32 = 5;
/// Untergrenze des Glüh-Pegels (in Zehnteln der Helligkeit)
const GLOW_FLOOR: u32 = 10;

pub struct RgbEngine<L: SmartLedWriter> {
    led: L,
    color: RGB8,
    effect: Effect,
    cycles: Cycles,
    brightness: u8,
    phase: DutyPhase,
    /// Aktueller Pegel für Spark (0..=brightness) bzw. Glow (×10)
    level: u32,
    rising: bool,
    shown: RGB8,
}

impl<L: SmartLedWriter> RgbEngine<L> {
    pub fn new(led: L) -> Self {
        Self {
            led,
            color: BLACK,
            effect: Effect::On,
            cycles: Cycles::Remaining(0),
            brightness: DEFAULT_BRIGHTNESS,
            phase: DutyPhase::default(),
            level: 0,
            rising: true,
            shown: BLACK,
        }
    }

    pub fn color(&self) -> RGB8 {
        self.color
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn cycles(&self) -> Cycles {
        self.cycles
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Zuletzt auf die Hardware geschriebene Farbe
    pub fn shown(&self) -> RGB8 {
        self.shown
    }

    pub fn led(&self) -> &L {
        &self.led
    }

    pub fn led_mut(&mut self) -> &mut L {
        &mut self.led
    }

    /// Setzt Farbe, Effekt und Anzahl der Zyklen
    ///
    /// Die Farbe erscheint sofort; ist sie bereits sichtbar, wird nicht geschrieben.
    pub fn set_effect(&mut self, color: RGB8, effect: Effect, cycles: Cycles) -> Result<(), LedError> {
        self.color = color;
        self.effect = effect;
        self.cycles = cycles;
        self.phase.reset();
        self.rising = true;
        self.level = match effect {
            Effect::Spark => u32::from(self.brightness),
            Effect::Glow => GLOW_FLOOR,
            _ => 0,
        };
        self.show(color::dim(color, self.brightness))
    }

    /// Farbe dauerhaft an
    pub fn set_color(&mut self, color: RGB8) -> Result<(), LedError> {
        self.set_effect(color, Effect::On, Cycles::Forever)
    }

    /// LED aus und Effekt beenden
    pub fn clear(&mut self) -> Result<(), LedError> {
        self.color = BLACK;
        self.cycles = Cycles::Remaining(0);
        self.show(BLACK)
    }

    /// Helligkeit 1..=255; eine leuchtende LED wird sofort neu geschrieben
    pub fn set_brightness(&mut self, brightness: u8) -> Result<(), LedError> {
        self.brightness = brightness.max(1);
        if self.shown == BLACK {
            return Ok(());
        }
        self.show(color::dim(self.color, self.brightness))
    }

    /// Ein Tick (50 ms) der Effekt-Engine
    pub fn advance(&mut self) -> Result<(), LedError> {
        if self.cycles.is_done() {
            return self.clear();
        }

        match self.effect {
            Effect::On => {
                if self.phase.step() {
                    self.cycles.decrement();
                }
                Ok(())
            }
            Effect::Blink(duty) => {
                let frame = if self.phase.is_lit(duty) {
                    color::dim(self.color, self.brightness)
                } else {
                    BLACK
                };
                if self.phase.step() {
                    self.cycles.decrement();
                }
                self.show(frame)
            }
            Effect::Spark => {
                let frame = color::dim(self.color, self.level as u8);
                self.level /= 2;
                if self.level == 0 {
                    self.level = u32::from(self.brightness);
                    self.cycles.decrement();
                }
                self.show(frame)
            }
            Effect::Glow => {
                let frame = color::dim(self.color, (self.level / 10) as u8);
                self.level = if self.rising {
                    self.level * GLOW_NUM / GLOW_DEN
                } else {
                    self.level * GLOW_DEN / GLOW_NUM
                };
                let ceiling = u32::from(self.brightness) * 10;
                if self.level <= GLOW_FLOOR {
                    self.level = GLOW_FLOOR;
                    self.rising = true;
                } else if self.level >= ceiling {
                    self.level = ceiling;
                    self.rising = false;
                    self.cycles.decrement();
                }
                self.show(frame)
            }
        }
    }

    fn show(&mut self, frame: RGB8) -> Result<(), LedError> {
        if frame == self.shown {
            return Ok(());
        }
        self.led.write(frame)?;
        self.shown = frame;
        Ok(())
    }
}
