//! Board Core - Plattformunabhängige Runtime des Lernboards
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert Traits für LED, Matrix-Bus, Pins, Speicher, WLAN und MQTT
//! sowie die gesamte Logik dahinter:
//!
//! - Tick-Kontext: [`scheduler::BoardRuntime`] mit RGB-, Matrix- und Eingabe-Engine
//! - Foreground-Kontext: [`board::Board`] mit WLAN-Setup, MQTT-Sitzung und Routing

#![no_std]

// Muss zuerst kommen, damit die Makros in allen Modulen sichtbar sind
mod fmt;

pub mod board;
pub mod color;
pub mod config;
pub mod credentials;
pub mod effect;
pub mod font;
pub mod ht16k33;
pub mod icons;
pub mod input;
pub mod led;
pub mod matrix;
pub mod mqtt;
mod network;
pub mod router;
pub mod scheduler;
pub mod traits;
pub mod types;
pub mod wifi;

/// Bibliotheks-Version (wird im Status-Heartbeat gemeldet)
pub const LIB_VERSION: &str = concat!("board-core_", env!("CARGO_PKG_VERSION"));

// Re-exports für einfachen Zugriff
pub use board::{Board, BoardSettings, SharedRuntimeOf};
pub use effect::{ColorCommand, Cycles, Effect};
pub use ht16k33::Ht16k33;
pub use input::{Button, IoPin};
pub use scheduler::{BoardRuntime, SharedRuntime, TICK_PERIOD_MS, run_tick};
pub use traits::{
    BusError, Clock, LedError, MatrixBus, MqttError, MqttTransport, PinDirection, PinIo, Platform, PlatformParts,
    SmartLedWriter, Storage, StorageError, SystemControl, UpdateError, UpdateService, WifiError, WifiRadio,
};
pub use types::{ConfigRequest, ConnectOptions, Credential, DeviceInfo, FirmwareUpdate, InboundMessage, KeyScan, ScanResult};
