//! HT16K33 LED-Matrix- und Tasten-Controller (I2C)
//!
//! Generisch über `embedded_hal::i2c::I2c`, damit derselbe Treiber auf dem
//! ESP32 und gegen einen Mock-Bus läuft.

use embedded_hal::i2c::I2c;

use crate::matrix::{BlinkRate, MatrixBuffer};
use crate::traits::{BusError, MatrixBus};
use crate::types::KeyScan;

pub const HT16K33_ADDRESS: u8 = 0x70;

// Befehle / Register
const CMD_OSCILLATOR_ON: u8 = 0x21;
const CMD_BLINK: u8 = 0x80;
const BLINK_DISPLAY_ON: u8 = 0x01;
const CMD_BRIGHTNESS: u8 = 0xE0;
const REG_DISPLAY_RAM: u8 = 0x00;
const REG_KEY_RAM: u8 = 0x40;
const REG_KEY_INT: u8 = 0x60;

pub struct Ht16k33<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ht16k33<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, HT16K33_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Oszillator an, Display an (ohne Blinken), Helligkeit setzen
    pub fn init(&mut self, brightness: u8) -> Result<(), BusError> {
        self.command(CMD_OSCILLATOR_ON)?;
        self.set_blink_rate(BlinkRate::Static)?;
        self.set_brightness(brightness)?;
        self.write_display(&[0; 8])
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn command(&mut self, cmd: u8) -> Result<(), BusError> {
        self.i2c.write(self.address, &[cmd]).map_err(|_| BusError::Transfer)
    }

    fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .map_err(|_| BusError::Transfer)
    }
}

impl<I2C: I2c> MatrixBus for Ht16k33<I2C> {
    /// Register 0x00, danach pro Zeile Low- und High-Byte
    fn write_display(&mut self, rows: &MatrixBuffer) -> Result<(), BusError> {
        let mut frame = [0u8; 17];
        frame[0] = REG_DISPLAY_RAM;
        for (i, row) in rows.iter().enumerate() {
            frame[1 + 2 * i] = (*row & 0xFF) as u8;
            frame[2 + 2 * i] = (*row >> 8) as u8;
        }
        self.i2c.write(self.address, &frame).map_err(|_| BusError::Transfer)
    }

    fn read_keys(&mut self) -> Result<KeyScan, BusError> {
        // Lesen des Interrupt-Registers quittiert den Key-Interrupt
        let mut int = [0u8; 1];
        self.read_register(REG_KEY_INT, &mut int)?;

        let mut keys = [0u8; 2];
        self.read_register(REG_KEY_RAM, &mut keys)?;
        Ok(KeyScan {
            a: keys[0] != 0,
            b: keys[1] != 0,
        })
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), BusError> {
        self.command(CMD_BRIGHTNESS | level.clamp(1, 15))
    }

    fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<(), BusError> {
        self.command(CMD_BLINK | BLINK_DISPLAY_ON | ((rate as u8) << 1))
    }
}
