//! WLAN-Zugangsdaten
//!
//! Gespeichert als Textdatei mit einer Zeile `ssid=passphrase` pro Netz,
//! zuletzt hinzugefügte Netze zuerst.

use core::fmt::Write;
use heapless::{String, Vec};

use crate::traits::StorageError;
use crate::types::Credential;

pub const WIFI_CONF_PATH: &str = "/wifi.conf";
pub const FORCED_WIFI_PATH: &str = "/forcedwifi.conf";
pub const MAX_STORED_NETWORKS: usize = 16;
/// Maximale Größe der Datei (16 × (32 + 1 + 64 + 1))
pub const WIFI_FILE_CAPACITY: usize = 1568;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    entries: Vec<Credential, MAX_STORED_NETWORKS>,
}

impl CredentialStore {
    /// Liest den Dateiinhalt; ungültige Zeilen werden übersprungen
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for credential in text.lines().filter_map(Credential::parse_line) {
            if entries.push(credential).is_err() {
                warn!("WIFI: Credential file has more than {} entries", MAX_STORED_NETWORKS);
                break;
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.entries.iter()
    }

    /// Zuletzt hinzugefügtes Netz
    pub fn first(&self) -> Option<&Credential> {
        self.entries.first()
    }

    /// Erster Eintrag mit passender SSID
    pub fn lookup(&self, ssid: &str) -> Option<&Credential> {
        self.entries.iter().find(|c| c.ssid == ssid)
    }

    /// Stellt das Paar an den Anfang, falls es noch nicht gespeichert ist
    ///
    /// Bei voller Liste fällt der älteste Eintrag heraus. Gibt `true`
    /// zurück, wenn sich der Inhalt geändert hat.
    pub fn remember(&mut self, credential: &Credential) -> bool {
        if self.entries.contains(credential) {
            return false;
        }
        if self.entries.is_full() {
            self.entries.pop();
        }
        // Platz ist garantiert, da notfalls oben ein Eintrag entfernt wurde
        let _ = self.entries.insert(0, credential.clone());
        true
    }

    /// Serialisiert die Liste im Dateiformat
    pub fn to_text<const N: usize>(&self, out: &mut String<N>) -> Result<(), StorageError> {
        out.clear();
        for c in &self.entries {
            writeln!(out, "{}={}", c.ssid, c.passphrase).map_err(|_| StorageError::TooLarge)?;
        }
        Ok(())
    }
}

/// Erstes Netz aus `/forcedwifi.conf`
pub fn parse_forced(text: &str) -> Option<Credential> {
    text.lines().find_map(Credential::parse_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(ssid: &str, pass: &str) -> Credential {
        Credential::new(ssid, pass).unwrap()
    }

    #[test]
    fn test_parse_skips_invalid_lines() {
        let store = CredentialStore::parse("Heim=pass1\n\nkaputt\nSchule=pass2\r\n");
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("Schule").unwrap().passphrase.as_str(), "pass2");
        assert!(store.lookup("kaputt").is_none());
    }

    #[test]
    fn test_lookup_returns_first_match() {
        let store = CredentialStore::parse("Heim=neu\nHeim=alt\n");
        assert_eq!(store.lookup("Heim").unwrap().passphrase.as_str(), "neu");
    }

    #[test]
    fn test_remember_prepends_once() {
        let mut store = CredentialStore::parse("A=1\n");
        assert!(store.remember(&cred("B", "2")));
        assert!(!store.remember(&cred("B", "2")));
        assert_eq!(store.first().unwrap().ssid.as_str(), "B");
        assert_eq!(store.len(), 2);

        let mut text: String<64> = String::new();
        store.to_text(&mut text).unwrap();
        assert_eq!(text.as_str(), "B=2\nA=1\n");
    }

    #[test]
    fn test_remember_evicts_oldest_when_full() {
        let mut store = CredentialStore::default();
        for i in 0..MAX_STORED_NETWORKS as u8 {
            let ssid = [b'a' + i];
            store.remember(&cred(core::str::from_utf8(&ssid).unwrap(), "x"));
        }
        assert!(store.remember(&cred("neu", "x")));
        assert_eq!(store.len(), MAX_STORED_NETWORKS);
        assert!(store.lookup("a").is_none());
        assert_eq!(store.first().unwrap().ssid.as_str(), "neu");
    }

    #[test]
    fn test_forced_uses_first_valid_line() {
        let forced = parse_forced("\nLabor=secret\nAnders=x").unwrap();
        assert_eq!(forced.ssid.as_str(), "Labor");
    }
}
