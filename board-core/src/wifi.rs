//! WLAN-Verbindungsaufbau
//!
//! Reihenfolge: zuletzt genutztes Netz → erzwungenes Netz aus
//! `/forcedwifi.conf` → gespeicherte Netze in Reihenfolge der Signalstärke.
//! Optional vorher das Provisioning-Portal.

use core::cmp::Reverse;

use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};

use crate::board::{Board, read_text};
use crate::color::{STATE_ERROR, STATE_WIFI, STATE_WIFI_PORTAL};
use crate::credentials::{CredentialStore, FORCED_WIFI_PATH, WIFI_CONF_PATH, WIFI_FILE_CAPACITY, parse_forced};
use crate::effect::{Cycles, Effect};
use crate::icons::ICON_WIFI;
use crate::traits::{MAX_SCAN_RESULTS, Platform, Storage, WifiRadio};
use crate::types::{Credential, ScanResult};

/// Anzahl Versuche und Pause dazwischen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub delay_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiSettings {
    pub last_used: RetryPolicy,
    pub forced: RetryPolicy,
    pub scanned: RetryPolicy,
    pub provisioning_timeout_ms: u32,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            last_used: RetryPolicy { attempts: 20, delay_ms: 500 },
            forced: RetryPolicy { attempts: 10, delay_ms: 1000 },
            scanned: RetryPolicy { attempts: 20, delay_ms: 1000 },
            provisioning_timeout_ms: 300_000,
        }
    }
}

// Fortschritt auf der Matrix während des Verbindungsaufbaus
const STATUS_WIFI_START: u8 = 5;
const STATUS_WIFI_LAST: u8 = 6;
const STATUS_WIFI_SCAN: u8 = 7;
const STATUS_WIFI_CANDIDATE: u8 = 8;
const STATUS_WIFI_DONE: u8 = 9;

/// Indizes der Scan-Ergebnisse, stärkstes Signal zuerst
///
/// Bei gleicher Stärke bleibt die Scan-Reihenfolge erhalten.
pub fn rank_by_signal(results: &[ScanResult]) -> Vec<usize, MAX_SCAN_RESULTS> {
    let mut order: Vec<usize, MAX_SCAN_RESULTS> = (0..results.len().min(MAX_SCAN_RESULTS)).collect();
    order.sort_unstable_by_key(|&i| (Reverse(results[i].rssi), i));
    order
}

/// Ein Netz mit bis zu `policy.attempts` Versuchen
async fn try_network<W: WifiRadio, D: DelayNs>(
    wifi: &mut W,
    delay: &mut D,
    credential: &Credential,
    policy: RetryPolicy,
) -> bool {
    info!("WIFI: Trying {}", credential.ssid.as_str());
    for attempt in 1..=policy.attempts {
        match wifi.connect(credential).await {
            Ok(()) => {
                info!("WIFI: Connected to {}", credential.ssid.as_str());
                return true;
            }
            Err(e) => {
                debug!("WIFI: Attempt {} failed: {}", attempt, e);
                if attempt < policy.attempts {
                    delay.delay_ms(policy.delay_ms).await;
                }
            }
        }
    }
    false
}

impl<'a, P: Platform> Board<'a, P> {
    /// Verbindet mit einem bekannten WLAN
    ///
    /// - `portal`: zuerst das Provisioning-Portal anbieten
    /// - `fast`: ohne Icon, und sofort fertig wenn bereits verbunden
    /// - `reconnecting`: implizit aus `connect()`; respektiert ein
    ///   abgeschaltetes WLAN und zeigt bei Fehlschlag keinen Text
    pub async fn wifi_setup(&mut self, portal: bool, fast: bool, reconnecting: bool) -> bool {
        if reconnecting && !self.wifi_enabled {
            return false;
        }
        if !portal && fast && self.wifi.is_connected() {
            return true;
        }
        self.wifi_enabled = true;
        self.load_credentials();
        if !reconnecting {
            self.show_status(STATUS_WIFI_START);
        }

        if portal {
            self.run_portal().await;
        }

        self.set_color_effect(STATE_WIFI, Effect::BLINK, Cycles::Forever);
        if !fast {
            self.draw_icon_bits(ICON_WIFI);
        }

        let mut connected: Option<Credential> = None;
        self.forced_network = false;

        let last = self.last_network.clone().or_else(|| self.credentials.first().cloned());
        if let Some(last) = last {
            self.show_status(STATUS_WIFI_LAST);
            if try_network(&mut self.wifi, &mut self.delay, &last, self.settings.wifi.last_used).await {
                connected = Some(last);
            }
        }

        if connected.is_none() {
            if let Some(forced) = self.read_forced_network() {
                if try_network(&mut self.wifi, &mut self.delay, &forced, self.settings.wifi.forced).await {
                    self.forced_network = true;
                    connected = Some(forced);
                }
            }
        }

        if connected.is_none() && !self.credentials.is_empty() {
            connected = self.try_scanned_networks().await;
        }

        match connected {
            Some(credential) => {
                if !self.forced_network && self.credentials.remember(&credential) {
                    self.save_credentials();
                }
                self.last_network = Some(credential);
                self.set_color_effect(STATE_WIFI, Effect::On, Cycles::Forever);
                self.show_status(STATUS_WIFI_DONE);
                true
            }
            None => {
                error!("WIFI: No known network reachable");
                self.wifi_enabled = false;
                self.set_color_effect(STATE_ERROR, Effect::BLINK, Cycles::Forever);
                if !reconnecting {
                    self.write_text("NO WIFI!", Cycles::Remaining(1), true).await;
                }
                false
            }
        }
    }

    pub fn is_wifi_connected(&mut self) -> bool {
        self.wifi.is_connected()
    }

    async fn try_scanned_networks(&mut self) -> Option<Credential> {
        self.show_status(STATUS_WIFI_SCAN);
        let mut results: Vec<ScanResult, MAX_SCAN_RESULTS> = Vec::new();
        if let Err(e) = self.wifi.scan(&mut results).await {
            warn!("WIFI: Scan failed: {}", e);
            return None;
        }
        info!("WIFI: Scan found {} networks", results.len());

        for i in rank_by_signal(&results) {
            let Some(credential) = self.credentials.lookup(results[i].ssid.as_str()).cloned() else {
                continue;
            };
            self.show_status(STATUS_WIFI_CANDIDATE);
            if try_network(&mut self.wifi, &mut self.delay, &credential, self.settings.wifi.scanned).await {
                return Some(credential);
            }
        }
        None
    }

    async fn run_portal(&mut self) {
        let name = self.name();
        let mut banner: String<48> = String::new();
        let _ = banner.push_str("WIFI AP: ");
        let _ = banner.push_str(self.id().as_str());

        info!("WIFI: Starting provisioning portal {}", name.as_str());
        self.set_color_effect(STATE_WIFI_PORTAL, Effect::FLASH, Cycles::Forever);
        self.write_text(&banner, Cycles::Forever, false).await;

        let timeout = self.settings.wifi.provisioning_timeout_ms;
        match self.wifi.provision(&name, timeout).await {
            Some(credential) => {
                info!("WIFI: Portal received credentials for {}", credential.ssid.as_str());
                self.last_network = Some(credential);
            }
            None => warn!("WIFI: Portal timed out"),
        }
        self.clear_matrix();
    }

    fn load_credentials(&mut self) {
        let mut buf = [0u8; WIFI_FILE_CAPACITY];
        let text = read_text(&mut self.storage, WIFI_CONF_PATH, &mut buf);
        self.credentials = CredentialStore::parse(text);
    }

    fn save_credentials(&mut self) {
        let mut text: String<WIFI_FILE_CAPACITY> = String::new();
        if let Err(e) = self.credentials.to_text(&mut text) {
            warn!("WIFI: Cannot serialize credentials: {}", e);
            return;
        }
        if let Err(e) = self.storage.write(WIFI_CONF_PATH, text.as_bytes()) {
            warn!("WIFI: Saving {} failed: {}", WIFI_CONF_PATH, e);
        }
    }

    fn read_forced_network(&mut self) -> Option<Credential> {
        let mut buf = [0u8; 128];
        parse_forced(read_text(&mut self.storage, FORCED_WIFI_PATH, &mut buf))
    }
}
