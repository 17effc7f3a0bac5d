//! Core Types für die Lernboard-Runtime
//!
//! Datenstrukturen ohne Hardware-Dependencies

use core::fmt::Write;
use heapless::String;

/// Maximale Länge einer SSID (IEEE 802.11)
pub const SSID_CAPACITY: usize = 32;
/// Maximale Länge einer WPA-Passphrase
pub const PASSPHRASE_CAPACITY: usize = 64;
/// Maximale Länge eines voll qualifizierten MQTT-Topics
pub const TOPIC_CAPACITY: usize = 128;
/// Maximale Länge einer MQTT-Nutzlast
pub const PAYLOAD_CAPACITY: usize = 256;

pub type Topic = String<TOPIC_CAPACITY>;
pub type Payload = String<PAYLOAD_CAPACITY>;

/// Momentaufnahme der beiden Onboard-Taster (aus dem HT16K33 Key-RAM)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyScan {
    pub a: bool,
    pub b: bool,
}

/// Gespeichertes WLAN (SSID + Passphrase)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String<SSID_CAPACITY>,
    pub passphrase: String<PASSPHRASE_CAPACITY>,
}

impl Credential {
    /// Erstellt ein Credential, `None` bei leerer SSID oder zu langen Feldern
    pub fn new(ssid: &str, passphrase: &str) -> Option<Self> {
        if ssid.is_empty() {
            return None;
        }
        Some(Self {
            ssid: String::try_from(ssid).ok()?,
            passphrase: String::try_from(passphrase).ok()?,
        })
    }

    /// Parst eine Zeile im Format `ssid=passphrase`
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        let (ssid, passphrase) = line.split_once('=')?;
        Self::new(ssid, passphrase)
    }
}

/// Ergebnis eines WLAN-Scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub ssid: String<SSID_CAPACITY>,
    pub rssi: i8,
}

/// Eingehende MQTT-Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub payload: Payload,
}

impl InboundMessage {
    /// Erstellt eine Nachricht; zu lange Topics/Nutzlasten ergeben `None`
    pub fn new(topic: &str, payload: &str) -> Option<Self> {
        Some(Self {
            topic: String::try_from(topic).ok()?,
            payload: String::try_from(payload).ok()?,
        })
    }
}

/// Verbindungsparameter für den MQTT-Broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String<64>,
    pub port: u16,
    pub client_id: String<32>,
    pub user: String<32>,
    pub password: String<64>,
}

/// Ergebnis einer Firmware-Update-Prüfung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareUpdate {
    /// Neues Image geschrieben, Neustart erforderlich
    Updated,
    /// Server meldet: keine neuere Firmware
    NoUpdate,
    /// Download oder Flash-Vorgang fehlgeschlagen
    Failed,
}

/// Header-Informationen für eine Config-Update-Anfrage
#[derive(Debug, Clone, Copy)]
pub struct ConfigRequest<'a> {
    pub mac: &'a str,
    pub firmware_version: &'a str,
    pub device_type: &'a str,
    pub current_config: &'a str,
}

/// Identität des Boards (aus der Station-MAC abgeleitet)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mac: [u8; 6],
    pub reset_reason: &'static str,
    pub board_number: u8,
    pub device_type: &'static str,
    pub name_prefix: &'static str,
}

impl DeviceInfo {
    /// Board-ID: die letzten drei MAC-Bytes als 6 Hex-Ziffern (z.B. "4F2A10")
    pub fn id(&self) -> String<6> {
        let mut id = String::new();
        let _ = write!(id, "{:02X}{:02X}{:02X}", self.mac[3], self.mac[4], self.mac[5]);
        id
    }

    /// Board-ID als Zahl (für das ID-Muster auf der Matrix)
    pub fn id_value(&self) -> u32 {
        u32::from(self.mac[3]) << 16 | u32::from(self.mac[4]) << 8 | u32::from(self.mac[5])
    }

    /// Gerätename, z.B. "Lernboard_4F2A10"
    pub fn name(&self) -> String<32> {
        let mut name = String::new();
        let _ = write!(name, "{}_{}", self.name_prefix, self.id());
        name
    }

    /// MAC ohne Trennzeichen (für Management-Topics)
    pub fn mac_compact(&self) -> String<12> {
        let mut out = String::new();
        for byte in self.mac {
            let _ = write!(out, "{:02X}", byte);
        }
        out
    }

    /// MAC im Format "AA:BB:CC:DD:EE:FF"
    pub fn mac_string(&self) -> String<17> {
        let mut out = String::new();
        for (i, byte) in self.mac.iter().enumerate() {
            if i > 0 {
                let _ = out.push(':');
            }
            let _ = write!(out, "{:02X}", byte);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DeviceInfo {
        DeviceInfo {
            mac: [0x5C, 0xCF, 0x7F, 0x4F, 0x2A, 0x10],
            reset_reason: "PowerOn",
            board_number: 0,
            device_type: "ESP32C6",
            name_prefix: "Lernboard",
        }
    }

    #[test]
    fn test_id_uses_last_three_mac_bytes() {
        assert_eq!(info().id().as_str(), "4F2A10");
        assert_eq!(info().id_value(), 0x4F2A10);
    }

    #[test]
    fn test_name_and_mac_formats() {
        assert_eq!(info().name().as_str(), "Lernboard_4F2A10");
        assert_eq!(info().mac_compact().as_str(), "5CCF7F4F2A10");
        assert_eq!(info().mac_string().as_str(), "5C:CF:7F:4F:2A:10");
    }

    #[test]
    fn test_credential_parse_line() {
        let cred = Credential::parse_line("Heimnetz=geheim=1\r").unwrap();
        assert_eq!(cred.ssid.as_str(), "Heimnetz");
        assert_eq!(cred.passphrase.as_str(), "geheim=1");
        assert!(Credential::parse_line("=nur-passwort").is_none());
        assert!(Credential::parse_line("keine-trennung").is_none());
    }
}
