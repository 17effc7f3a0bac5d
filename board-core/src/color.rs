//! Farb-Hilfsfunktionen
//!
//! Hex-Strings, Farbkreis und Helligkeitsskalierung für die RGB LED.

use core::fmt::Write;
use heapless::String;
use rgb::RGB8;

pub const BLACK: RGB8 = from_u32(0x000000);
pub const WHITE: RGB8 = from_u32(0xFFFFFF);
pub const RED: RGB8 = from_u32(0xFF0000);
pub const GREEN: RGB8 = from_u32(0x00FF00);
pub const BLUE: RGB8 = from_u32(0x0000FF);
pub const CYAN: RGB8 = from_u32(0x00FFFF);
pub const ORANGE: RGB8 = from_u32(0xC93B03);

// Statusfarben während Verbindungsaufbau und Updates
pub const STATE_WIFI: RGB8 = from_u32(0x000022);
pub const STATE_WIFI_PORTAL: RGB8 = from_u32(0x110022);
pub const STATE_MQTT: RGB8 = from_u32(0x010001);
pub const STATE_ERROR: RGB8 = from_u32(0x220000);
pub const STATE_CONFIG: RGB8 = from_u32(0x000101);
pub const STATE_UPDATE: RGB8 = ORANGE;

/// Ungültiger Farb-String
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorError {
    InvalidHex,
    InvalidEffect,
    InvalidDuration,
}

/// 0xRRGGBB → RGB8
pub const fn from_u32(value: u32) -> RGB8 {
    RGB8 {
        r: (value >> 16) as u8,
        g: (value >> 8) as u8,
        b: value as u8,
    }
}

pub const fn to_u32(color: RGB8) -> u32 {
    (color.r as u32) << 16 | (color.g as u32) << 8 | color.b as u32
}

/// Parst "RRGGBB" (optional mit führendem '#')
///
/// ```
/// # use board_core::color::parse_hex;
/// # use rgb::RGB8;
/// assert_eq!(parse_hex("#FF8000"), Ok(RGB8 { r: 255, g: 128, b: 0 }));
/// ```
pub fn parse_hex(text: &str) -> Result<RGB8, ColorError> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex);
    }
    u32::from_str_radix(digits, 16)
        .map(from_u32)
        .map_err(|_| ColorError::InvalidHex)
}

/// RGB8 → "RRGGBB" (Großbuchstaben)
pub fn to_hex(color: RGB8) -> String<6> {
    let mut out = String::new();
    let _ = write!(out, "{:02X}{:02X}{:02X}", color.r, color.g, color.b);
    out
}

/// Position auf dem Farbkreis (0..=255) → Farbe
///
/// 0 und 255 sind Rot, 85 Grün, 170 Blau.
pub fn hue(position: u8) -> RGB8 {
    let h = 255 - position;
    if h < 85 {
        RGB8 { r: 255 - h * 3, g: 0, b: h * 3 }
    } else if h < 170 {
        let h = h - 85;
        RGB8 { r: 0, g: h * 3, b: 255 - h * 3 }
    } else {
        let h = h - 170;
        RGB8 { r: h * 3, g: 255 - h * 3, b: 0 }
    }
}

pub fn hue_to_hex(position: u8) -> String<6> {
    to_hex(hue(position))
}

/// Skaliert eine Farbe mit einer Helligkeit (255 = unverändert)
pub fn dim(color: RGB8, brightness: u8) -> RGB8 {
    if brightness == u8::MAX {
        return color;
    }
    let scale = |c: u8| ((u16::from(c) * (u16::from(brightness) + 1)) >> 8) as u8;
    RGB8 {
        r: scale(color.r),
        g: scale(color.g),
        b: scale(color.b),
    }
}
