// WiFi-Radio: Station-Modus für das Board, Access-Point-Modus für das Portal
use board_core::traits::MAX_SCAN_RESULTS;
use board_core::{Credential, ScanResult, WifiError, WifiRadio};
use defmt::{Debug2Format, error, info, warn};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{AccessPointConfig, ClientConfig, ModeConfig, ScanConfig, WifiController, WifiDevice};
use heapless::{String, Vec};

use crate::config::DHCP_TIMEOUT_SECS;
use crate::tasks::portal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RadioMode {
    Off,
    Client,
    AccessPoint,
}

/// [`WifiRadio`] über den esp-radio Controller
///
/// Hält beide Netzwerk-Stacks: `sta` (DHCP-Client) für den normalen Betrieb,
/// `ap` (statische Adresse) für das Provisioning-Portal.
pub struct EspWifiRadio {
    controller: WifiController<'static>,
    sta: Stack<'static>,
    ap: Stack<'static>,
    mode: RadioMode,
}

impl EspWifiRadio {
    pub fn new(controller: WifiController<'static>, sta: Stack<'static>, ap: Stack<'static>) -> Self {
        Self {
            controller,
            sta,
            ap,
            mode: RadioMode::Off,
        }
    }

    /// Station-Modus mit `config` aktivieren (stoppt ggf. den Access-Point)
    async fn enter_client_mode(&mut self, config: ClientConfig) -> Result<(), WifiError> {
        if self.mode == RadioMode::AccessPoint {
            let _ = self.controller.stop_async().await;
        } else if matches!(self.controller.is_connected(), Ok(true)) {
            let _ = self.controller.disconnect_async().await;
        }

        if let Err(e) = self.controller.set_config(&ModeConfig::Client(config)) {
            error!("WiFi: Failed to set configuration: {}", Debug2Format(&e));
            return Err(WifiError::Radio);
        }

        if !matches!(self.controller.is_started(), Ok(true)) {
            if let Err(e) = self.controller.start_async().await {
                error!("WiFi: Failed to start: {}", Debug2Format(&e));
                return Err(WifiError::Radio);
            }
            info!("WiFi: Started in station mode");
        }
        self.mode = RadioMode::Client;
        Ok(())
    }
}

impl WifiRadio for EspWifiRadio {
    async fn connect(&mut self, credential: &Credential) -> Result<(), WifiError> {
        let config = ClientConfig::default()
            .with_ssid(credential.ssid.as_str().into())
            .with_password(credential.passphrase.as_str().into());
        self.enter_client_mode(config).await?;

        info!("WiFi: Connecting to '{}'...", credential.ssid.as_str());
        if let Err(e) = self.controller.connect_async().await {
            warn!("WiFi: Connection failed: {}", Debug2Format(&e));
            return Err(WifiError::AssociationFailed);
        }

        match with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS), self.sta.wait_config_up()).await {
            Ok(()) => {
                if let Some(config) = self.sta.config_v4() {
                    info!("WiFi: Got IP address {}", Debug2Format(&config.address.address()));
                }
                Ok(())
            }
            Err(_) => {
                warn!("WiFi: DHCP timeout, dropping association");
                let _ = self.controller.disconnect_async().await;
                Err(WifiError::AssociationFailed)
            }
        }
    }

    fn is_connected(&mut self) -> bool {
        self.mode == RadioMode::Client
            && matches!(self.controller.is_connected(), Ok(true))
            && self.sta.is_config_up()
    }

    async fn scan(&mut self, results: &mut Vec<ScanResult, MAX_SCAN_RESULTS>) -> Result<(), WifiError> {
        if self.mode != RadioMode::Client {
            self.enter_client_mode(ClientConfig::default()).await?;
        }

        let found = match self.controller.scan_with_config_async(ScanConfig::default()).await {
            Ok(found) => found,
            Err(e) => {
                warn!("WiFi: Scan failed: {}", Debug2Format(&e));
                return Err(WifiError::ScanFailed);
            }
        };
        info!("WiFi: Found {} access points", found.len());

        results.clear();
        for ap_info in &found {
            let Ok(ssid) = String::try_from(ap_info.ssid.as_str()) else {
                continue;
            };
            if ssid.is_empty() {
                continue;
            }
            if results
                .push(ScanResult {
                    ssid,
                    rssi: ap_info.signal_strength,
                })
                .is_err()
            {
                break;
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.mode == RadioMode::Client && matches!(self.controller.is_connected(), Ok(true)) {
            info!("WiFi: Disconnecting");
            let _ = self.controller.disconnect_async().await;
        }
    }

    async fn provision(&mut self, ap_name: &str, timeout_ms: u32) -> Option<Credential> {
        if matches!(self.controller.is_started(), Ok(true)) {
            let _ = self.controller.stop_async().await;
        }

        let config = AccessPointConfig::default().with_ssid(ap_name.into());
        if let Err(e) = self.controller.set_config(&ModeConfig::AccessPoint(config)) {
            error!("WiFi: Failed to configure access point: {}", Debug2Format(&e));
            return None;
        }
        if let Err(e) = self.controller.start_async().await {
            error!("WiFi: Failed to start access point: {}", Debug2Format(&e));
            return None;
        }
        self.mode = RadioMode::AccessPoint;
        info!("WiFi: Access point '{}' started", ap_name);

        let credential = portal::run_portal(self.ap, Duration::from_millis(u64::from(timeout_ms))).await;

        let _ = self.controller.stop_async().await;
        self.mode = RadioMode::Off;
        credential
    }
}

/// Network Task: prozessiert die Pakete eines Netzwerk-Stacks
///
/// Zwei Instanzen: Station und Access-Point.
#[embassy_executor::task(pool_size = 2)]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}
