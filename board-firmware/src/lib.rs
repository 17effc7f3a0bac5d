// Library-Root: ESP32-C6 Plattform für die board-core Runtime
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// picoserve-Formulare deserialisieren in alloc::String
extern crate alloc;

// Module
pub mod config;
pub mod hal;
pub mod tasks;

use board_core::{Ht16k33, Platform, SharedRuntime};
use esp_hal::Blocking;
use esp_hal::i2c::master::I2c;

use crate::hal::{BoardPins, EmbassyClock, EspSystem, FlashFileStore, RmtLedWriter};
use crate::tasks::{ChannelMqttTransport, EspWifiRadio, HttpUpdateService};

// ============================================================================
// Type-Aliase
// ============================================================================

/// I2C-Bus zum HT16K33 (blockierend, gehört exklusiv dem Tick-Kontext)
pub type MatrixI2c = I2c<'static, Blocking>;

/// Matrix-Treiber mit Tastenabfrage
pub type FirmwareBus = Ht16k33<MatrixI2c>;

/// Die geteilte Runtime, wie sie Tick-Task und Board sehen
pub type FirmwareRuntime = SharedRuntime<FirmwareBus, RmtLedWriter, BoardPins>;

/// Das Board der Firmware
pub type FirmwareBoard = board_core::Board<'static, EspPlatform>;

// ============================================================================
// Plattform
// ============================================================================

/// Bindet die ESP32-C6 Treiber an die board-core Traits
pub struct EspPlatform;

impl Platform for EspPlatform {
    type Bus = FirmwareBus;
    type Led = RmtLedWriter;
    type Pins = BoardPins;
    type Wifi = EspWifiRadio;
    type Mqtt = ChannelMqttTransport;
    type Storage = FlashFileStore;
    type Updater = HttpUpdateService;
    type System = EspSystem;
    type Delay = embassy_time::Delay;
    type Clock = EmbassyClock;
}
