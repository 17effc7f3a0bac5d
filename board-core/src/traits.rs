//! Hardware Abstraction Traits
//!
//! Diese Traits definieren Schnittstellen für Hardware- und Netzwerkzugriff
//! ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** `board-firmware` (ESP32-C6, esp-hal / esp-radio / embassy-net)
//! - **Testing:** Mocks in `board-tests` (in-memory)
#![allow(async_fn_in_trait)]

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use rgb::RGB8;

use crate::input::IoPin;
use crate::matrix::{BlinkRate, MatrixBuffer};
use crate::types::{ConfigRequest, ConnectOptions, Credential, FirmwareUpdate, InboundMessage, KeyScan, ScanResult};

/// Maximale Anzahl Netzwerke pro Scan
pub const MAX_SCAN_RESULTS: usize = 16;

// ============================================================================
// Fehler-Typen
// ============================================================================

/// Fehler-Typ für LED-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedError {
    WriteFailed,
}

/// Fehler auf dem I2C-Bus zum Matrix-Controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    NotFound,
    Io,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiError {
    Radio,
    AssociationFailed,
    ScanFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError {
    NotConnected,
    ConnectFailed,
    Rejected,
    TopicTooLong,
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateError {
    /// Server nicht erreichbar
    Connect,
    /// HTTP-Status ungleich 200
    Status(u16),
    BodyTooLarge,
    Io,
}

// ============================================================================
// LED + Matrix + Pins (Tick-Kontext)
// ============================================================================

/// Trait für SmartLED Hardware-Zugriff
///
/// Abstrahiert den Zugriff auf die RGB LED (WS2812/Neopixel).
pub trait SmartLedWriter: Send {
    /// Schreibt eine RGB-Farbe auf die LED
    ///
    /// # Fehlerbehandlung
    /// Gibt `LedError::WriteFailed` zurück wenn Hardware-Zugriff fehlschlägt
    fn write(&mut self, color: RGB8) -> Result<(), LedError>;
}

/// Bus zum LED-Matrix-/Tasten-Controller
///
/// Wird ausschließlich aus dem Tick-Kontext angesprochen.
pub trait MatrixBus {
    /// Überträgt den kompletten Display-Puffer (8 Zeilen × 16 Bit)
    fn write_display(&mut self, rows: &MatrixBuffer) -> Result<(), BusError>;
    /// Liest den Tastenzustand
    fn read_keys(&mut self) -> Result<KeyScan, BusError>;
    /// Helligkeit 1..=15
    fn set_brightness(&mut self, level: u8) -> Result<(), BusError>;
    fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<(), BusError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinDirection {
    /// Eingang mit Pull-Up (Taster gegen GND)
    InputPullUp,
    Output,
}

/// Zugriff auf die vier frei nutzbaren I/O-Pins
pub trait PinIo {
    fn configure(&mut self, pin: IoPin, direction: PinDirection);
    fn set_level(&mut self, pin: IoPin, high: bool);
    /// `true` wenn der Pin auf LOW liegt (Taster gedrückt)
    fn is_low(&mut self, pin: IoPin) -> bool;
}

// ============================================================================
// Persistenz
// ============================================================================

/// Einfacher Dateispeicher (Pfad → Bytes)
pub trait Storage {
    /// Liest eine Datei in `buf` und gibt die Länge zurück
    fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError>;
    /// Ersetzt den Inhalt einer Datei
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ============================================================================
// Netzwerk
// ============================================================================

/// WLAN-Radio (Station-Modus + Provisioning-Portal)
pub trait WifiRadio {
    /// Ein Assoziierungsversuch inkl. IP-Konfiguration
    async fn connect(&mut self, credential: &Credential) -> Result<(), WifiError>;
    fn is_connected(&mut self) -> bool;
    async fn scan(&mut self, results: &mut Vec<ScanResult, MAX_SCAN_RESULTS>) -> Result<(), WifiError>;
    async fn disconnect(&mut self);
    /// Startet den Access-Point `ap_name` mit Captive-Portal und wartet
    /// höchstens `timeout_ms` auf eingegebene Zugangsdaten
    async fn provision(&mut self, ap_name: &str, timeout_ms: u32) -> Option<Credential>;
}

/// MQTT-Client-Verbindung
pub trait MqttTransport {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), MqttError>;
    fn is_connected(&self) -> bool;
    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;
    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError>;
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError>;
    /// Nächste empfangene Nachricht, `None` wenn keine ansteht
    async fn poll(&mut self) -> Option<InboundMessage>;
    async fn disconnect(&mut self);
}

/// HTTP-Update-Server (Konfiguration + Firmware)
pub trait UpdateService {
    /// Fragt eine neue Konfiguration an; nur HTTP 200 liefert einen Body
    async fn fetch_config(
        &mut self,
        server: &str,
        request: &ConfigRequest<'_>,
        body: &mut [u8],
    ) -> Result<usize, UpdateError>;

    async fn update_firmware(&mut self, server: &str, request: &ConfigRequest<'_>) -> FirmwareUpdate;
}

// ============================================================================
// System
// ============================================================================

pub trait SystemControl {
    /// Neustart des Boards (kehrt auf echter Hardware nicht zurück)
    fn restart(&mut self);
}

/// Monotone Zeitquelle in Millisekunden
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Bündelt alle Hardware-Typen einer Plattform
pub trait Platform {
    type Bus: MatrixBus;
    type Led: SmartLedWriter;
    type Pins: PinIo;
    type Wifi: WifiRadio;
    type Mqtt: MqttTransport;
    type Storage: Storage;
    type Updater: UpdateService;
    type System: SystemControl;
    type Delay: DelayNs;
    type Clock: Clock;
}

/// Die foreground-seitigen Instanzen einer Plattform
pub struct PlatformParts<P: Platform> {
    pub wifi: P::Wifi,
    pub mqtt: P::Mqtt,
    pub storage: P::Storage,
    pub updater: P::Updater,
    pub system: P::System,
    pub delay: P::Delay,
    pub clock: P::Clock,
}
