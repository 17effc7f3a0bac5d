//! MQTT-Verbindung, Nachrichten-Routing und Plattform-Updates des Boards

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};

use crate::LIB_VERSION;
use crate::board::{Board, read_text};
use crate::color::{STATE_ERROR, STATE_MQTT, STATE_UPDATE};
use crate::config::{CONFIG_FILE_CAPACITY, CONFIG_PATH};
use crate::effect::{ColorCommand, Cycles, Effect};
use crate::icons::ICON_ARROW_DOWN;
use crate::mqtt::{RESUBSCRIBE_SLOTS, STATUS_FIRMWARE, STATUS_LIB_VERSION, STATUS_NUMBER, STATUS_RESET_REASON};
use crate::router::{Route, TOPIC_MATRIX_ALL, TOPIC_RGB_ALL};
use crate::traits::{Clock, MqttTransport, Platform, Storage, SystemControl, UpdateService};
use crate::types::{ConfigRequest, ConnectOptions, FirmwareUpdate, InboundMessage, Topic};

/// Icon während eines Firmware-Downloads (blinkender Pfeil)
const ICON_FW_DOWNLOAD: &str = "B0010000100101010111000100:1:-1";
/// Icon nach erfolgreichem Firmware-Update
const ICON_FW_DONE: &str = "B0111000000011100000011111:1:-1";
const UPDATE_FAILED_TEXT: &str = "Update Failed! ";

// Matrix-Fortschritt während der Broker-Verbindung (wechselt pro Versuch)
const STATUS_MQTT_EVEN: u8 = 16;
const STATUS_MQTT_ODD: u8 = 15;

impl<'a, P: Platform> Board<'a, P> {
    // ========================================================================
    // Verbindung
    // ========================================================================

    /// Erste Verbindung beim Booten; aktiviert MQTT für `loop_once`
    pub async fn mqtt_setup(&mut self) -> bool {
        self.mqtt_enabled = true;
        self.connect(false).await
    }

    pub fn is_connected(&self) -> bool {
        self.mqtt_enabled && self.mqtt.is_connected()
    }

    /// Verbindet mit dem Broker (No-op wenn bereits verbunden)
    ///
    /// Nach dem Handshake werden die Management-Topics und bis zu zehn
    /// gemerkte Subscriptions (neueste zuerst) erneut abonniert.
    pub async fn connect(&mut self, silent: bool) -> bool {
        if self.mqtt.is_connected() {
            return true;
        }
        if !self.wifi_setup(false, true, true).await {
            return false;
        }
        let Some(options) = self.connect_options() else {
            error!("MQTT: No broker configured");
            return false;
        };

        if !silent {
            self.set_color_effect(STATE_MQTT, Effect::BLINK, Cycles::Forever);
        }

        let policy = self.settings.mqtt;
        let mut connected = false;
        for attempt in 0..policy.attempts {
            match self.mqtt.connect(&options).await {
                Ok(()) => {
                    connected = true;
                    break;
                }
                Err(e) => {
                    warn!("MQTT: Connect attempt {} failed: {}", attempt + 1, e);
                    if !silent {
                        self.show_status(if attempt % 2 == 0 { STATUS_MQTT_EVEN } else { STATUS_MQTT_ODD });
                    }
                    self.delay.delay_ms(policy.delay_ms).await;
                }
            }
        }

        if !connected {
            error!("MQTT: Broker not reachable");
            self.set_color_effect(STATE_ERROR, Effect::BLINK, Cycles::Forever);
            return false;
        }
        info!("MQTT: Connected to broker");

        let topics = self.session.topics.clone();
        for topic in [&topics.request_password, &topics.update, &topics.enable_log] {
            if let Err(e) = self.mqtt.subscribe(topic).await {
                warn!("MQTT: Subscribe {} failed: {}", topic.as_str(), e);
            }
        }

        let replay: Vec<Topic, RESUBSCRIBE_SLOTS> = self
            .session
            .ring
            .iter()
            .filter_map(|t| Topic::try_from(t).ok())
            .collect();
        for topic in &replay {
            debug!("MQTT: Resubscribing {}", topic.as_str());
            if let Err(e) = self.mqtt.subscribe(topic).await {
                warn!("MQTT: Resubscribe {} failed: {}", topic.as_str(), e);
            }
        }

        self.publish_status().await;
        true
    }

    fn connect_options(&self) -> Option<ConnectOptions> {
        if self.config.broker_host.is_empty() {
            return None;
        }
        Some(ConnectOptions {
            host: self.config.broker_host.clone(),
            port: self.config.broker_port,
            client_id: String::try_from(self.info.name().as_str()).ok()?,
            user: self.config.broker_user.clone(),
            password: self.config.broker_password.clone(),
        })
    }

    // ========================================================================
    // Publish / Subscribe
    // ========================================================================

    /// Setzt das Gruppen-Präfix für alle folgenden Topics
    pub fn set_group(&mut self, group: &str) -> bool {
        match self.session.set_group(group) {
            Ok(()) => true,
            Err(e) => {
                warn!("MQTT: Group {} rejected: {}", group, e);
                false
            }
        }
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> bool {
        let Ok(full) = self.session.group_topic(topic) else {
            warn!("MQTT: Topic too long");
            return false;
        };
        self.publish_connected(&full, payload).await
    }

    /// Ohne Gruppen-Präfix
    pub async fn publish_public(&mut self, topic: &str, payload: &str) -> bool {
        let Ok(full) = self.session.public_topic(topic) else {
            warn!("MQTT: Topic too long");
            return false;
        };
        self.publish_connected(&full, payload).await
    }

    pub async fn subscribe(&mut self, topic: &str) -> bool {
        let Ok(full) = self.session.group_topic(topic) else {
            warn!("MQTT: Topic too long");
            return false;
        };
        self.subscribe_full(&full).await
    }

    pub async fn subscribe_public(&mut self, topic: &str) -> bool {
        let Ok(full) = self.session.public_topic(topic) else {
            warn!("MQTT: Topic too long");
            return false;
        };
        self.subscribe_full(&full).await
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> bool {
        let Ok(full) = self.session.group_topic(topic) else {
            return false;
        };
        self.unsubscribe_full(&full).await
    }

    pub async fn unsubscribe_public(&mut self, topic: &str) -> bool {
        let Ok(full) = self.session.public_topic(topic) else {
            return false;
        };
        self.unsubscribe_full(&full).await
    }

    /// LED per `RGB/COLOR` fernsteuerbar machen
    pub async fn connect_rgb(&mut self) -> bool {
        self.session.rgb_remote = true;
        self.subscribe(TOPIC_RGB_ALL).await
    }

    /// Matrix per `MATRIX/ICON` und `MATRIX/TEXT` fernsteuerbar machen
    pub async fn connect_matrix(&mut self) -> bool {
        self.session.matrix_remote = true;
        self.subscribe(TOPIC_MATRIX_ALL).await
    }

    async fn subscribe_full(&mut self, topic: &str) -> bool {
        if !self.mqtt_enabled || !self.connect(true).await {
            return false;
        }
        match self.mqtt.subscribe(topic).await {
            Ok(()) => {
                self.session.ring.push_front(topic);
                true
            }
            Err(e) => {
                warn!("MQTT: Subscribe {} failed: {}", topic, e);
                false
            }
        }
    }

    async fn unsubscribe_full(&mut self, topic: &str) -> bool {
        // Ohne Verbindung bleibt das Topic im Ring und wird beim Reconnect erneut abonniert
        if !self.mqtt_enabled || !self.connect(true).await {
            return false;
        }
        let result = self.mqtt.unsubscribe(topic).await;
        self.session.ring.remove(topic);
        if let Err(e) = &result {
            warn!("MQTT: Unsubscribe {} failed: {}", topic, e);
        }
        result.is_ok()
    }

    async fn publish_connected(&mut self, topic: &str, payload: &str) -> bool {
        if !self.mqtt_enabled || !self.connect(true).await {
            return false;
        }
        self.publish_raw(topic, payload).await
    }

    /// Sendet nur bei bestehender Verbindung (ohne Reconnect)
    pub(crate) async fn publish_raw(&mut self, topic: &str, payload: &str) -> bool {
        if !self.mqtt.is_connected() {
            return false;
        }
        match self.mqtt.publish(topic, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("MQTT: Publish to {} failed: {}", topic, e);
                false
            }
        }
    }

    // ========================================================================
    // Heartbeat
    // ========================================================================

    /// Status-Heartbeat, wenn fällig oder `force`
    pub async fn update_status(&mut self, force: bool) {
        let due = self
            .session
            .heartbeat_due(self.clock.now_ms(), self.config.publish_delay_secs);
        if !force && !due {
            return;
        }
        if !self.mqtt_enabled || !self.connect(true).await {
            return;
        }
        self.publish_status().await;
    }

    async fn publish_status(&mut self) {
        debug!("MQTT: Publishing status");
        let topics = self.session.topics.clone();
        let fw_version = self.config.fw_version.clone();
        let mut number: String<4> = String::new();
        let _ = write!(number, "{}", self.info.board_number);

        self.publish_raw(&topics.status_topic(STATUS_LIB_VERSION), LIB_VERSION).await;
        self.publish_raw(&topics.status_topic(STATUS_FIRMWARE), &fw_version).await;
        self.publish_raw(&topics.status_topic(STATUS_RESET_REASON), self.info.reset_reason)
            .await;
        self.publish_raw(&topics.status_topic(STATUS_NUMBER), &number).await;
        self.session.mark_heartbeat(self.clock.now_ms());
    }

    // ========================================================================
    // Empfang
    // ========================================================================

    /// Reconnect bei Bedarf, eingehende Nachrichten verarbeiten, Heartbeat
    pub async fn loop_once(&mut self) {
        if !self.mqtt_enabled {
            return;
        }
        if !self.mqtt.is_connected() && !self.connect(true).await {
            return;
        }
        self.pump().await;
        self.update_status(false).await;
    }

    /// Verarbeitet alle anstehenden Nachrichten
    pub(crate) async fn pump(&mut self) {
        while let Some(message) = self.mqtt.poll().await {
            self.dispatch(&message).await;
        }
    }

    async fn dispatch(&mut self, message: &InboundMessage) {
        let topic = message.topic.as_str();
        let payload = message.payload.as_str();
        debug!("MQTT: Message on {}", topic);

        match Route::classify(topic, payload, &self.session) {
            Route::PasswordRequest => {
                let reply_topic = self.session.topics.response_password.clone();
                let password = self.config.platform_password.clone();
                self.publish_raw(&reply_topic, &password).await;
            }
            Route::ConfigUpdate => {
                self.check_config_update().await;
            }
            Route::FirmwareUpdate => {
                if self.check_firmware_update().await == FirmwareUpdate::Failed {
                    self.write_text_blocking(UPDATE_FAILED_TEXT).await;
                }
            }
            Route::UpdateIgnored => warn!("MQTT: Unknown update request {}", payload),
            Route::LogMirroring(on) => {
                info!("MQTT: Log mirroring {}", on);
                self.session.log_mirroring = on;
            }
            Route::RgbColor => match ColorCommand::parse(payload) {
                Ok(cmd) => self.set_color_effect(cmd.color, cmd.effect, cmd.cycles),
                Err(e) => warn!("MQTT: Ignoring color {}: {}", payload, e),
            },
            Route::MatrixIcon => {
                self.draw_icon(payload);
            }
            Route::MatrixText => {
                if payload.is_empty() {
                    self.clear_matrix();
                } else {
                    self.with_runtime(|rt| rt.matrix.write_text(payload, Cycles::Forever));
                }
            }
            Route::Application => {}
        }

        if let Some(handler) = self.handler.as_deref_mut() {
            handler(self.session.strip_group(topic), payload);
        }
    }

    // ========================================================================
    // Plattform-Updates
    // ========================================================================

    /// Fragt eine neue Konfiguration an; bei Erfolg speichern und neu starten
    ///
    /// Ohne neue Konfiguration bleibt die Update-Anzeige aktiv.
    pub async fn check_config_update(&mut self) -> bool {
        info!("UPDATE: Checking for new configuration");
        self.set_color_effect(STATE_UPDATE, Effect::BLINK, Cycles::Forever);
        self.draw_icon_bits(ICON_ARROW_DOWN);

        let mut current = [0u8; CONFIG_FILE_CAPACITY];
        let current = read_text(&mut self.storage, CONFIG_PATH, &mut current);
        let mac = self.info.mac_string();
        let server = self.config.update_server.clone();
        let request = ConfigRequest {
            mac: &mac,
            firmware_version: &self.config.fw_version,
            device_type: self.info.device_type,
            current_config: current,
        };

        let mut body = [0u8; CONFIG_FILE_CAPACITY];
        let result = self.updater.fetch_config(&server, &request, &mut body).await;

        let accepted = match result {
            Ok(len) => match core::str::from_utf8(&body[..len]) {
                Ok(json) => {
                    let mut next = self.config.clone();
                    match next.apply_json(json) {
                        Ok(()) => match self.storage.write(CONFIG_PATH, json.as_bytes()) {
                            Ok(()) => {
                                self.config = next;
                                true
                            }
                            Err(e) => {
                                warn!("UPDATE: Saving configuration failed: {}", e);
                                false
                            }
                        },
                        Err(e) => {
                            warn!("UPDATE: Invalid configuration: {}", e);
                            false
                        }
                    }
                }
                Err(_) => {
                    warn!("UPDATE: Configuration is not UTF-8");
                    false
                }
            },
            Err(e) => {
                warn!("UPDATE: No new configuration: {}", e);
                false
            }
        };

        if accepted {
            info!("UPDATE: New configuration saved");
            self.mqtt.disconnect().await;
            self.system.restart();
            return true;
        }
        // Update-Anzeige (LED und Pfeil) bleibt stehen, bis das Programm sie überschreibt
        false
    }

    /// Prüft auf neue Firmware; nach erfolgreichem Update Neustart
    pub async fn check_firmware_update(&mut self) -> FirmwareUpdate {
        info!("UPDATE: Checking for new firmware");
        self.set_color_effect(STATE_UPDATE, Effect::BLINK, Cycles::Forever);
        self.draw_icon(ICON_FW_DOWNLOAD);

        let mac = self.info.mac_string();
        let server = self.config.update_server.clone();
        let request = ConfigRequest {
            mac: &mac,
            firmware_version: &self.config.fw_version,
            device_type: self.info.device_type,
            current_config: "",
        };
        let result = self.updater.update_firmware(&server, &request).await;

        match result {
            FirmwareUpdate::Failed => {
                error!("UPDATE: Firmware update failed");
                self.set_color_effect(STATE_ERROR, Effect::BLINK, Cycles::Forever);
            }
            FirmwareUpdate::NoUpdate => {
                info!("UPDATE: Firmware is up to date");
                self.clear_color();
                self.clear_matrix();
            }
            FirmwareUpdate::Updated => {
                info!("UPDATE: Firmware updated, restarting");
                self.set_color(STATE_UPDATE);
                self.draw_icon(ICON_FW_DONE);
                self.mqtt.disconnect().await;
                self.system.restart();
            }
        }
        result
    }
}
