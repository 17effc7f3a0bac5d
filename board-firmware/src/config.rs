// Projekt-Konfiguration: Pin-Zuordnung, Puffergrößen, Timeouts und Standort-Defaults
#![allow(dead_code)]

// ============================================================================
// Pin-Zuordnung (ESP32-C6 Lernboard)
// ============================================================================

/// GPIO-Pin für die RGB LED (WS2812/Neopixel)
pub const LED_GPIO_PIN: u8 = 8;

/// I2C-Pins zum HT16K33 (Matrix + Taster A/B)
pub const I2C_SDA_GPIO_PIN: u8 = 6;
pub const I2C_SCL_GPIO_PIN: u8 = 7;

/// I2C-Takt in kHz (HT16K33 kann bis 400 kHz)
pub const I2C_FREQUENCY_KHZ: u32 = 400;

/// GPIOs der frei nutzbaren Pins D0, D5, D6, D7
pub const IO_GPIO_PINS: [u8; 4] = [2, 3, 4, 5];

/// RMT Taktfrequenz in MHz (optimal für WS2812-Timing)
pub const RMT_CLOCK_MHZ: u32 = 80;

/// Matrix-Helligkeit nach dem Booten (1..=15)
pub const MATRIX_BRIGHTNESS: u8 = 8;

// ============================================================================
// Gerät
// ============================================================================

/// Präfix des Gerätenamens ("Lernboard_4F2A10")
pub const NAME_PREFIX: &str = "Lernboard";

/// Gerätetyp im Config-Update-Header
pub const DEVICE_TYPE: &str = "ESP32C6-Lernboard";

/// Nummer des Boards im Klassensatz (Status-Heartbeat)
pub const BOARD_NUMBER: u8 = match option_env!("BOARD_NUMBER") {
    Some(value) => parse_u8(value, 0),
    None => 0,
};

/// Begrüßungstext nach erfolgreichem Booten
pub const WELCOME_TEXT: &str = "HELLO!";

/// Log-Zeilen von Anfang an per MQTT spiegeln
pub const MQTT_LOG_AT_BOOT: bool = false;

// ============================================================================
// Standort-Defaults (aus .env, /conf.json überschreibt zur Laufzeit)
// ============================================================================

pub const DEFAULT_BROKER: &str = match option_env!("BOARD_BROKER") {
    Some(value) => value,
    None => "",
};

pub const DEFAULT_BROKER_PORT: u16 = match option_env!("BOARD_BROKER_PORT") {
    Some(value) => parse_u16(value, 1883),
    None => 1883,
};

pub const DEFAULT_BROKER_USER: &str = match option_env!("BOARD_BROKER_USER") {
    Some(value) => value,
    None => "",
};

pub const DEFAULT_BROKER_PASSWORD: &str = match option_env!("BOARD_BROKER_PASSWORD") {
    Some(value) => value,
    None => "",
};

pub const DEFAULT_UPDATE_SERVER: &str = match option_env!("BOARD_UPDATE_SERVER") {
    Some(value) => value,
    None => "",
};

pub const DEFAULT_PLATFORM_PASSWORD: &str = match option_env!("BOARD_PLATFORM_PASSWORD") {
    Some(value) => value,
    None => "",
};

// ============================================================================
// Speicher
// ============================================================================

/// Heap für den WiFi-Stack (reclaimed RAM)
pub const WIFI_HEAP_SIZE: usize = 65536;

/// Zusätzlicher Heap (picoserve, esp-radio Puffer)
pub const EXTRA_HEAP_SIZE: usize = 36864;

/// Größe eines Datei-Slots im Flash-Dateispeicher
pub const FILE_SLOT_SIZE: u32 = 4096;

/// Anzahl Datei-Slots (belegt 64 KB der Daten-Partition)
pub const FILE_SLOT_COUNT: u32 = 16;

/// Maximale Pfadlänge im Dateispeicher
pub const FILE_PATH_CAPACITY: usize = 32;

// ============================================================================
// Netzwerk
// ============================================================================

/// Sockets im Station-Stack: MQTT (1) + HTTP-Update (1) + DNS (1)
pub const STA_SOCKETS: usize = 4;

/// Sockets im Access-Point-Stack (Portal)
pub const AP_SOCKETS: usize = 3;

/// Feste Adresse des Boards im Provisioning-Netz
pub const AP_ADDRESS: [u8; 4] = [192, 168, 4, 1];

/// Wartezeit auf DHCP nach erfolgreicher Assoziierung
pub const DHCP_TIMEOUT_SECS: u64 = 10;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// MQTT
// ============================================================================

/// MQTT Buffer-Größe in Bytes
pub const MQTT_BUFFER_SIZE: usize = 1024;

/// Keep-Alive in Sekunden (PINGREQ nach der Hälfte)
pub const MQTT_KEEP_ALIVE_SECS: u16 = 30;

/// Empfangene Nachrichten, die auf `loop_once` warten
pub const MQTT_INBOX_DEPTH: usize = 8;

/// Antwortzeit des Session-Tasks auf ein Kommando
pub const MQTT_COMMAND_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// HTTP (Portal + Update-Client)
// ============================================================================

pub const HTTP_BUFFER_SIZE: usize = 1024;
pub const TCP_RX_BUFFER_SIZE: usize = 1536;
pub const TCP_TX_BUFFER_SIZE: usize = 1024;

/// Pfad der Config-Update-Anfrage auf dem Update-Server
pub const CONFIG_UPDATE_PATH: &str = "/updateConf";

/// Pfad der Firmware-Update-Anfrage auf dem Update-Server
pub const FIRMWARE_UPDATE_PATH: &str = "/updateFW";

/// Timeout einer Update-Anfrage
pub const HTTP_TIMEOUT_SECS: u64 = 8;

/// Chunk-Größe beim Schreiben eines OTA-Images
pub const OTA_CHUNK_SIZE: usize = 4096;

// ============================================================================
// Hilfsfunktionen (const, für option_env!)
// ============================================================================

const fn parse_u16(value: &str, fallback: u16) -> u16 {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return fallback;
    }
    let mut result: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        if digit < b'0' || digit > b'9' {
            return fallback;
        }
        result = result * 10 + (digit - b'0') as u32;
        if result > u16::MAX as u32 {
            return fallback;
        }
        i += 1;
    }
    result as u16
}

const fn parse_u8(value: &str, fallback: u8) -> u8 {
    let parsed = parse_u16(value, fallback as u16);
    if parsed > u8::MAX as u16 { fallback } else { parsed as u8 }
}
