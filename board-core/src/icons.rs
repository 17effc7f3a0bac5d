//! Icons für die 5×5 Matrix
//!
//! Ein Icon ist als 25-Bit-Wert kodiert: Bit 24 ist das Pixel oben links,
//! Bit 0 das Pixel unten rechts (zeilenweise).

use crate::effect::Cycles;
use crate::matrix::BlinkRate;

pub const ICON_WIFI: u32 = 0xE0F4B4;
pub const ICON_RING: u32 = 0xE8C62E;
pub const ICON_CROSS: u32 = 0x1151151;
pub const ICON_CHECK: u32 = 0xA880;
pub const ICON_SMILE: u32 = 0x5022E;
pub const ICON_SAD: u32 = 0x501D1;
pub const ICON_HEART: u32 = 0xAAC544;
pub const ICON_PLUS: u32 = 0x427C84;
pub const ICON_ARROW_DOWN: u32 = 0x4255C4;
pub const ICON_ARROW_UP: u32 = 0x475484;
pub const ICON_ARROW_RIGHT: u32 = 0x417C44;
pub const ICON_ARROW_LEFT: u32 = 0x447D04;

/// Icon-String entspricht keinem bekannten Format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IconError {
    MalformedIconFormat,
}

/// Geparstes Icon inkl. optionaler Blink-/Dauer-Angaben
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icon {
    /// Zeilen oben → unten, Bit 4 = linke Spalte
    pub rows: [u8; 5],
    pub blink: Option<BlinkRate>,
    /// Anzeigedauer in Zehntelsekunden
    pub duration: Option<Cycles>,
}

impl Icon {
    pub fn from_bits(bits: u32) -> Self {
        let mut rows = [0u8; 5];
        for (y, row) in rows.iter_mut().enumerate() {
            *row = ((bits >> (20 - 5 * y)) & 0x1F) as u8;
        }
        Self { rows, blink: None, duration: None }
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.rows[y] & (0b1_0000 >> x) != 0
    }

    /// Parst ein Icon im Hex- oder Binärformat
    ///
    /// - `0x` + 10 Hex-Ziffern: ein Byte pro Zeile, Bit 7 = linke Spalte
    /// - `B` + 25 Ziffern `0`/`1`, optional `:blink[:sekunden]`
    ///
    /// Bei mehrzeiligen Strings wird nur die erste Zeile verwendet.
    pub fn parse(text: &str) -> Result<Self, IconError> {
        let text = text.lines().next().unwrap_or("").trim();

        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return Self::parse_hex(hex);
        }
        if let Some(binary) = text.strip_prefix('B').or_else(|| text.strip_prefix('b')) {
            return Self::parse_binary(binary);
        }
        Err(IconError::MalformedIconFormat)
    }

    fn parse_hex(hex: &str) -> Result<Self, IconError> {
        if hex.len() != 10 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IconError::MalformedIconFormat);
        }
        let mut rows = [0u8; 5];
        for (y, row) in rows.iter_mut().enumerate() {
            let byte = u8::from_str_radix(&hex[2 * y..2 * y + 2], 16)
                .map_err(|_| IconError::MalformedIconFormat)?;
            *row = byte >> 3;
        }
        Ok(Self { rows, blink: None, duration: None })
    }

    fn parse_binary(binary: &str) -> Result<Self, IconError> {
        let (pixels, suffix) = if binary.len() >= 25 && binary.is_char_boundary(25) {
            binary.split_at(25)
        } else {
            return Err(IconError::MalformedIconFormat);
        };

        let mut rows = [0u8; 5];
        for (i, b) in pixels.bytes().enumerate() {
            match b {
                b'0' => {}
                b'1' => rows[i / 5] |= 0b1_0000 >> (i % 5),
                _ => return Err(IconError::MalformedIconFormat),
            }
        }

        let mut icon = Self { rows, blink: None, duration: None };
        if suffix.is_empty() {
            return Ok(icon);
        }

        let options = suffix.strip_prefix(':').ok_or(IconError::MalformedIconFormat)?;
        let mut parts = options.splitn(2, ':');
        if let Some(blink) = parts.next() {
            let code = blink.trim().parse::<i32>().map_err(|_| IconError::MalformedIconFormat)?;
            icon.blink = Some(BlinkRate::from_code(code));
        }
        if let Some(seconds) = parts.next() {
            let seconds = seconds.trim().parse::<f32>().map_err(|_| IconError::MalformedIconFormat)?;
            icon.duration = Some(Cycles::from_count((seconds * 10.0) as i32));
        }
        Ok(icon)
    }
}
