//! LED-Matrix-Engine (5×5)
//!
//! Verwaltet den Display-Puffer des HT16K33, Icons, Einzelpixel und die
//! Laufschrift. Busbefehle (Helligkeit, Blinken) werden vorgemerkt und erst
//! im Tick-Kontext übertragen.

use heapless::String;

use crate::effect::Cycles;
use crate::font::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::icons::{Icon, IconError};
use crate::traits::MatrixBus;

pub const MATRIX_SIZE: usize = 5;
/// Zeilen im Display-RAM des HT16K33
pub const MATRIX_ROWS: usize = 8;
pub const TEXT_CAPACITY: usize = 64;

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 15;
pub const DEFAULT_BRIGHTNESS: u8 = 10;
/// Laufschrift rückt jeden dritten Tick eine Spalte weiter
pub const DEFAULT_SCROLL_DIVISOR: u32 = 3;
/// Startposition der Laufschrift (rechts außerhalb)
const SCROLL_START: i16 = 4;

/// Display-RAM: acht Zeilen à 16 Bit
pub type MatrixBuffer = [u16; MATRIX_ROWS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkRate {
    Static = 0,
    TwoHz = 1,
    OneHz = 2,
    HalfHz = 3,
}

impl BlinkRate {
    /// Unbekannte Codes schalten das Blinken ab
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => BlinkRate::TwoHz,
            2 => BlinkRate::OneHz,
            3 => BlinkRate::HalfHz,
            _ => BlinkRate::Static,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn from_code(code: u8) -> Self {
        match code % 4 {
            1 => Rotation::R90,
            2 => Rotation::R180,
            3 => Rotation::R270,
            _ => Rotation::R0,
        }
    }
}

/// Logische Koordinate → (Bit, Zeile) im Display-RAM
///
/// Die Matrix ist gespiegelt verdrahtet: Spalten laufen über die RAM-Zeilen.
pub fn transform(x: usize, y: usize, rotation: Rotation) -> (usize, usize) {
    let x1 = 4 - x;
    let y1 = y;
    match rotation {
        Rotation::R0 => (y1, x1),
        Rotation::R90 => (4 - x1, y1),
        Rotation::R180 => (4 - y1, 4 - x1),
        Rotation::R270 => (x1, 4 - y1),
    }
}

/// Display-Puffer mit Rotation
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    rows: MatrixBuffer,
    rotation: Rotation,
}

impl Frame {
    fn clear(&mut self) {
        self.rows = [0; MATRIX_ROWS];
    }

    fn set(&mut self, x: usize, y: usize, on: bool) {
        if x >= MATRIX_SIZE || y >= MATRIX_SIZE {
            return;
        }
        let (bit, row) = transform(x, y, self.rotation);
        if on {
            self.rows[row] |= 1 << bit;
        } else {
            self.rows[row] &= !(1 << bit);
        }
    }

    fn get(&self, x: usize, y: usize) -> bool {
        if x >= MATRIX_SIZE || y >= MATRIX_SIZE {
            return false;
        }
        let (bit, row) = transform(x, y, self.rotation);
        self.rows[row] & (1 << bit) != 0
    }

    fn draw_icon(&mut self, icon: &Icon) {
        self.clear();
        for y in 0..MATRIX_SIZE {
            for x in 0..MATRIX_SIZE {
                if icon.is_set(x, y) {
                    self.set(x, y, true);
                }
            }
        }
    }

    /// Zeichnet den Text ab Spalte `offset` (darf negativ sein)
    fn draw_text(&mut self, text: &str, offset: i16) {
        let mut x0 = offset;
        for c in text.chars() {
            if x0 >= MATRIX_SIZE as i16 {
                break;
            }
            if x0 + GLYPH_WIDTH as i16 > 0 {
                let glyph = font::glyph(c);
                for row in 0..GLYPH_HEIGHT {
                    for col in 0..GLYPH_WIDTH {
                        let x = x0 + col as i16;
                        if x >= 0 && font::is_set(&glyph, col, row) {
                            self.set(x as usize, row, true);
                        }
                    }
                }
            }
            x0 += GLYPH_ADVANCE;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Scroll {
    text: String<TEXT_CAPACITY>,
    passes: Cycles,
    offset: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Icon, Pixel oder leer; `remaining` in Zehntelsekunden
    Static { remaining: Cycles },
    Scroll(Scroll),
}

pub struct MatrixEngine {
    frame: Frame,
    dirty: bool,
    mode: Mode,
    scroll_divisor: u32,
    brightness: u8,
    pending_brightness: Option<u8>,
    pending_blink: Option<BlinkRate>,
    id_showing: bool,
}

impl Default for MatrixEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixEngine {
    pub fn new() -> Self {
        Self {
            frame: Frame::default(),
            dirty: true,
            mode: Mode::Static { remaining: Cycles::Remaining(0) },
            scroll_divisor: DEFAULT_SCROLL_DIVISOR,
            brightness: DEFAULT_BRIGHTNESS,
            pending_brightness: None,
            pending_blink: None,
            id_showing: false,
        }
    }

    // ========================================================================
    // Foreground-API
    // ========================================================================

    /// Startet eine Laufschrift mit `passes` Durchläufen
    ///
    /// Ein einzelnes Zeichen wird statt zu scrollen mittig angezeigt.
    pub fn write_text(&mut self, text: &str, passes: Cycles) {
        self.id_showing = false;
        self.pending_blink = Some(BlinkRate::Static);
        if text.is_empty() {
            self.clear();
            return;
        }

        let mut stored = String::new();
        for c in text.chars() {
            if stored.push(c).is_err() {
                warn!("MATRIX: Text truncated to {} bytes", TEXT_CAPACITY);
                break;
            }
        }
        self.mode = Mode::Scroll(Scroll {
            text: stored,
            passes,
            offset: SCROLL_START,
        });
    }

    /// Aktuelle Laufschrift ("" wenn keine)
    pub fn text(&self) -> &str {
        match &self.mode {
            Mode::Scroll(scroll) => scroll.text.as_str(),
            Mode::Static { .. } => "",
        }
    }

    /// Horizontale Position der Laufschrift
    pub fn scroll_offset(&self) -> Option<i16> {
        match &self.mode {
            Mode::Scroll(scroll) => Some(scroll.offset),
            Mode::Static { .. } => None,
        }
    }

    /// Alle Durchläufe der Laufschrift bzw. die Icon-Dauer abgeschlossen?
    pub fn text_done(&self) -> bool {
        match &self.mode {
            Mode::Scroll(scroll) => scroll.passes.is_done(),
            Mode::Static { remaining } => remaining.is_done(),
        }
    }

    /// Zeichnet ein Icon im Hex- oder Binärformat
    pub fn draw_icon(&mut self, text: &str) -> Result<(), IconError> {
        let icon = Icon::parse(text)?;
        self.show_icon(&icon);
        Ok(())
    }

    /// Zeichnet ein 25-Bit-Icon (Bit 24 = oben links)
    pub fn draw_icon_bits(&mut self, bits: u32) {
        self.show_icon(&Icon::from_bits(bits));
    }

    fn show_icon(&mut self, icon: &Icon) {
        self.id_showing = false;
        self.frame.draw_icon(icon);
        self.dirty = true;
        self.pending_blink = Some(icon.blink.unwrap_or(BlinkRate::Static));
        self.mode = Mode::Static {
            remaining: icon.duration.unwrap_or(Cycles::Forever),
        };
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.enter_static();
        self.frame.set(x, y, on);
        self.dirty = true;
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.frame.get(x, y)
    }

    pub fn clear(&mut self) {
        self.id_showing = false;
        self.frame.clear();
        self.dirty = true;
        self.mode = Mode::Static { remaining: Cycles::Remaining(0) };
    }

    /// Fortschrittsanzeige beim Booten: Pixel `i` leuchtet, solange `status < i`
    pub fn show_status(&mut self, status: u8) {
        if self.id_showing {
            return;
        }
        self.enter_static();
        for i in 0..MATRIX_SIZE * MATRIX_SIZE {
            self.frame.set(i % MATRIX_SIZE, i / MATRIX_SIZE, usize::from(status) < i);
        }
        self.dirty = true;
    }

    /// Zeigt die 6-stellige Board-ID als Bitmuster
    ///
    /// Ziffern 0..4 belegen die Zeilen 0..4 (Spalten 0..3), Ziffer 5 die
    /// Spalte 4 (Zeilen 0..3).
    pub fn show_id(&mut self, id: u32) {
        self.clear();
        self.mode = Mode::Static { remaining: Cycles::Forever };
        for digit in 0..6 {
            let nibble = (id >> (4 * (5 - digit))) & 0xF;
            for bit in 0..4 {
                let on = nibble & (1 << (3 - bit)) != 0;
                if digit < 5 {
                    self.frame.set(bit, digit, on);
                } else {
                    self.frame.set(4, bit, on);
                }
            }
        }
        self.frame.set(4, 4, false);
        self.id_showing = true;
    }

    pub fn is_id_showing(&self) -> bool {
        self.id_showing
    }

    /// Helligkeit 1..=15, wird im nächsten Tick übertragen
    pub fn set_brightness(&mut self, level: u8) {
        let level = level.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS);
        self.brightness = level;
        self.pending_brightness = Some(level);
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_blink_rate(&mut self, rate: BlinkRate) {
        self.pending_blink = Some(rate);
    }

    /// Geschwindigkeit 1 (langsam) ..= 10 (schnell)
    pub fn set_scroll_speed(&mut self, speed: u8) {
        let speed = speed.clamp(1, 10);
        self.scroll_divisor = 11 - u32::from(speed);
    }

    pub fn scroll_divisor(&self) -> u32 {
        self.scroll_divisor
    }

    /// Dreht die Anzeige; der aktuelle Inhalt wird übernommen
    pub fn set_rotation(&mut self, rotation: Rotation) {
        let mut rotated = Frame { rows: [0; MATRIX_ROWS], rotation };
        for y in 0..MATRIX_SIZE {
            for x in 0..MATRIX_SIZE {
                rotated.set(x, y, self.frame.get(x, y));
            }
        }
        self.frame = rotated;
        self.dirty = true;
    }

    pub fn rotation(&self) -> Rotation {
        self.frame.rotation
    }

    /// Roher Display-Puffer (wie er auf den Bus geschrieben wird)
    pub fn buffer(&self) -> &MatrixBuffer {
        &self.frame.rows
    }

    fn enter_static(&mut self) {
        if !matches!(self.mode, Mode::Static { remaining: Cycles::Forever }) {
            if matches!(self.mode, Mode::Scroll(_)) {
                self.frame.clear();
            }
            self.mode = Mode::Static { remaining: Cycles::Forever };
        }
    }

    // ========================================================================
    // Tick-Kontext
    // ========================================================================

    /// Ein Tick: vorgemerkte Busbefehle, Laufschrift/Icon-Dauer, Flush
    pub fn advance<B: MatrixBus>(&mut self, tick: u32, bus: &mut B) {
        self.apply_pending(bus);

        match &mut self.mode {
            Mode::Scroll(scroll) if !scroll.passes.is_done() => {
                if scroll.text.chars().nth(1).is_none() {
                    self.frame.clear();
                    self.frame.draw_text(&scroll.text, 1);
                    scroll.passes = Cycles::Remaining(0);
                    self.dirty = true;
                } else if tick % self.scroll_divisor == 0 {
                    self.frame.clear();
                    self.frame.draw_text(&scroll.text, scroll.offset);
                    scroll.offset -= 1;
                    let width = scroll.text.chars().count() as i16 * GLYPH_ADVANCE;
                    if scroll.offset < -width {
                        scroll.offset = SCROLL_START;
                        scroll.passes.decrement();
                    }
                    self.dirty = true;
                }
            }
            Mode::Scroll(_) => {}
            Mode::Static { remaining } => {
                if tick % 2 == 0 && matches!(remaining, Cycles::Remaining(n) if *n > 0) {
                    remaining.decrement();
                    if remaining.is_done() {
                        self.frame.clear();
                        self.dirty = true;
                    }
                }
            }
        }

        if self.dirty {
            match bus.write_display(&self.frame.rows) {
                Ok(()) => self.dirty = false,
                Err(_) => warn!("MATRIX: Display write failed"),
            }
        }
    }

    fn apply_pending<B: MatrixBus>(&mut self, bus: &mut B) {
        if let Some(level) = self.pending_brightness {
            match bus.set_brightness(level) {
                Ok(()) => self.pending_brightness = None,
                Err(_) => warn!("MATRIX: Brightness command failed"),
            }
        }
        if let Some(rate) = self.pending_blink {
            match bus.set_blink_rate(rate) {
                Ok(()) => self.pending_blink = None,
                Err(_) => warn!("MATRIX: Blink command failed"),
            }
        }
    }
}
