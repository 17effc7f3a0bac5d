//! Effekt-Modell der RGB LED
//!
//! Alle Effekte laufen in Fenstern von zehn Ticks (500 ms).

use rgb::RGB8;

use crate::color::{self, ColorError};

/// Ticks pro Effekt-Fenster
pub const WINDOW_TICKS: u8 = 10;

/// Darstellungsart der RGB LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Dauerhaft an, zählt trotzdem Fenster herunter
    On,
    /// An für `duty` von 10 Ticks, dann aus
    Blink(u8),
    /// Heller Puls, der pro Tick halbiert wird
    Spark,
    /// Pulsierendes An-/Abschwellen
    Glow,
}

impl Effect {
    pub const OFF: Effect = Effect::Blink(0);
    pub const FLASH: Effect = Effect::Blink(1);
    pub const BLINK: Effect = Effect::Blink(5);

    /// Blinken mit begrenztem Duty-Cycle
    pub fn blink(duty: u8) -> Self {
        Effect::Blink(duty.min(WINDOW_TICKS))
    }

    /// Numerischer Effekt-Code (0..=9 Blinken, 10 an, 11 Spark, 12 Glow)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0..=9 => Some(Effect::Blink(code as u8)),
            10 => Some(Effect::On),
            11 => Some(Effect::Spark),
            12 => Some(Effect::Glow),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Effect::Blink(duty) => duty.min(WINDOW_TICKS),
            Effect::On => 10,
            Effect::Spark => 11,
            Effect::Glow => 12,
        }
    }
}

/// Verbleibende Effekt-Zyklen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cycles {
    Forever,
    Remaining(u32),
}

impl Cycles {
    /// Negative Werte bedeuten "endlos"
    pub fn from_count(count: i32) -> Self {
        if count < 0 {
            Cycles::Forever
        } else {
            Cycles::Remaining(count as u32)
        }
    }

    pub fn is_done(self) -> bool {
        self == Cycles::Remaining(0)
    }

    /// Zählt einen Zyklus herunter; bei 0 bzw. `Forever` ohne Wirkung
    pub fn decrement(&mut self) {
        if let Cycles::Remaining(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

/// Phase innerhalb eines 10-Tick-Fensters (1..=10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyPhase(u8);

impl Default for DutyPhase {
    fn default() -> Self {
        Self(1)
    }
}

impl DutyPhase {
    pub fn reset(&mut self) {
        self.0 = 1;
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Liegt die aktuelle Phase im An-Anteil?
    pub fn is_lit(self, duty: u8) -> bool {
        self.0 <= duty
    }

    /// Nächster Tick; `true` wenn damit ein Fenster abgeschlossen ist
    pub fn step(&mut self) -> bool {
        self.0 += 1;
        if self.0 > WINDOW_TICKS {
            self.0 = 1;
            true
        } else {
            false
        }
    }
}

/// Geparster Farbbefehl (z.B. aus `RGB/COLOR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCommand {
    pub color: RGB8,
    pub effect: Effect,
    pub cycles: Cycles,
}

impl ColorCommand {
    /// Format: `RRGGBB` oder `RRGGBB:effekt[:zyklen]`
    ///
    /// Ohne Effekt ist die LED endlos an. Zyklen dürfen Nachkommastellen
    /// haben (werden abgeschnitten), negative Werte laufen endlos.
    pub fn parse(payload: &str) -> Result<Self, ColorError> {
        let payload = payload.trim();
        let mut parts = payload.splitn(3, ':');
        let color = color::parse_hex(parts.next().unwrap_or(""))?;

        let effect = match parts.next() {
            None => Effect::On,
            Some(code) => code
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(Effect::from_code)
                .ok_or(ColorError::InvalidEffect)?,
        };

        let cycles = match parts.next() {
            None => Cycles::Forever,
            Some(duration) => {
                let value = duration
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| ColorError::InvalidDuration)?;
                Cycles::from_count(value as i32)
            }
        };

        Ok(Self { color, effect, cycles })
    }
}
