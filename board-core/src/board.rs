//! Foreground-Fassade des Boards
//!
//! [`Board`] bündelt die geteilte Runtime mit den Netzwerk- und
//! System-Diensten einer [`Platform`]. Alle Methoden laufen im
//! Foreground-Kontext; LED und Matrix werden nur über den Mutex verändert.

use heapless::String;
use rgb::RGB8;

use crate::color;
use crate::config::{CONFIG_FILE_CAPACITY, CONFIG_PATH, DeviceConfig};
use crate::credentials::CredentialStore;
use crate::effect::{Cycles, Effect};
use crate::input::{Button, IoPin};
use crate::mqtt::{DEFAULT_BASE_TOPIC, MqttSession, STATUS_LOG};
use crate::scheduler::{BoardRuntime, SharedRuntime};
use crate::traits::{Clock, MqttTransport, Platform, PlatformParts, Storage, StorageError, SystemControl};
use crate::types::{Credential, DeviceInfo};
use crate::wifi::{RetryPolicy, WifiSettings};

use embedded_hal_async::delay::DelayNs;

/// Unterhalb dieser Dauer schläft `sleep` ohne den MQTT-Client zu bedienen
pub const SLEEP_SLICE_MS: u32 = 100;
/// Anzeigedauer eines einzelnen Zeichens bei `write_text(.., wait = true)`
const SINGLE_CHAR_WAIT_MS: u32 = 1000;

pub type RuntimeOf<P> = BoardRuntime<<P as Platform>::Bus, <P as Platform>::Led, <P as Platform>::Pins>;
pub type SharedRuntimeOf<P> = SharedRuntime<<P as Platform>::Bus, <P as Platform>::Led, <P as Platform>::Pins>;

/// Anwendungs-Callback für MQTT-Nachrichten (Topic ohne Gruppe, Nutzlast)
pub type MessageHandler<'a> = &'a mut dyn FnMut(&str, &str);

/// Einstellbare Zeitkonstanten der Verbindungslogik
#[derive(Debug, Clone, Copy)]
pub struct BoardSettings {
    pub wifi: WifiSettings,
    pub mqtt: RetryPolicy,
    pub base_topic: &'static str,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            wifi: WifiSettings::default(),
            mqtt: RetryPolicy { attempts: 20, delay_ms: 1000 },
            base_topic: DEFAULT_BASE_TOPIC,
        }
    }
}

pub struct Board<'a, P: Platform> {
    pub(crate) runtime: &'a SharedRuntimeOf<P>,
    pub(crate) wifi: P::Wifi,
    pub(crate) mqtt: P::Mqtt,
    pub(crate) storage: P::Storage,
    pub(crate) updater: P::Updater,
    pub(crate) system: P::System,
    pub(crate) delay: P::Delay,
    pub(crate) clock: P::Clock,
    pub(crate) info: DeviceInfo,
    pub(crate) config: DeviceConfig,
    pub(crate) credentials: CredentialStore,
    pub(crate) last_network: Option<Credential>,
    pub(crate) session: MqttSession,
    pub(crate) settings: BoardSettings,
    pub(crate) wifi_enabled: bool,
    pub(crate) mqtt_enabled: bool,
    pub(crate) forced_network: bool,
    pub(crate) handler: Option<MessageHandler<'a>>,
}

impl<'a, P: Platform> Board<'a, P> {
    pub fn new(
        runtime: &'a SharedRuntimeOf<P>,
        parts: PlatformParts<P>,
        info: DeviceInfo,
        settings: BoardSettings,
    ) -> Self {
        Self {
            runtime,
            wifi: parts.wifi,
            mqtt: parts.mqtt,
            storage: parts.storage,
            updater: parts.updater,
            system: parts.system,
            delay: parts.delay,
            clock: parts.clock,
            session: MqttSession::new(&info, settings.base_topic),
            info,
            config: DeviceConfig::default(),
            credentials: CredentialStore::default(),
            last_network: None,
            settings,
            wifi_enabled: true,
            mqtt_enabled: false,
            forced_network: false,
            handler: None,
        }
    }

    // ========================================================================
    // Identität + Konfiguration
    // ========================================================================

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn id(&self) -> String<6> {
        self.info.id()
    }

    pub fn name(&self) -> String<32> {
        self.info.name()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DeviceConfig {
        &mut self.config
    }

    pub fn session(&self) -> &MqttSession {
        &self.session
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Lädt `/conf.json`; Fehler werden protokolliert und ignoriert
    pub fn load_config(&mut self) -> bool {
        let mut buf = [0u8; CONFIG_FILE_CAPACITY];
        let json = read_text(&mut self.storage, CONFIG_PATH, &mut buf);
        if json.is_empty() {
            return false;
        }
        match self.config.apply_json(json) {
            Ok(()) => {
                info!("CONFIG: Loaded {}", CONFIG_PATH);
                true
            }
            Err(e) => {
                warn!("CONFIG: Ignoring {}: {}", CONFIG_PATH, e);
                false
            }
        }
    }

    /// Liest eine Datei als Text; bei Fehlern ""
    pub fn read_file<'b>(&mut self, path: &str, buf: &'b mut [u8]) -> &'b str {
        read_text(&mut self.storage, path, buf)
    }

    pub fn write_file(&mut self, path: &str, data: &str) -> bool {
        match self.storage.write(path, data.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                warn!("STORAGE: Writing {} failed: {}", path, e);
                false
            }
        }
    }

    // ========================================================================
    // Runtime-Zugriff (LED, Matrix, Eingaben)
    // ========================================================================

    /// Führt `f` unter dem Runtime-Mutex aus
    pub fn with_runtime<R>(&self, f: impl FnOnce(&mut RuntimeOf<P>) -> R) -> R {
        self.runtime.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn set_color_effect(&mut self, color: RGB8, effect: Effect, cycles: Cycles) {
        if self.with_runtime(|rt| rt.rgb.set_effect(color, effect, cycles)).is_err() {
            warn!("RGB: LED write failed");
        }
    }

    pub fn set_color(&mut self, color: RGB8) {
        self.set_color_effect(color, Effect::On, Cycles::Forever);
    }

    /// Farbe als "RRGGBB"; ungültige Strings werden ignoriert
    pub fn set_color_hex(&mut self, hex: &str) -> bool {
        match color::parse_hex(hex) {
            Ok(c) => {
                self.set_color(c);
                true
            }
            Err(_) => {
                warn!("RGB: Invalid color {}", hex);
                false
            }
        }
    }

    pub fn clear_color(&mut self) {
        if self.with_runtime(|rt| rt.rgb.clear()).is_err() {
            warn!("RGB: LED write failed");
        }
    }

    /// Laufschrift; mit `wait` kehrt der Aufruf erst nach allen Durchläufen zurück
    pub async fn write_text(&mut self, text: &str, passes: Cycles, wait: bool) {
        self.with_runtime(|rt| rt.matrix.write_text(text, passes));
        if !wait {
            return;
        }
        if passes == Cycles::Forever {
            warn!("MATRIX: Not waiting for endless text");
            return;
        }
        if text.chars().nth(1).is_none() {
            self.sleep(SINGLE_CHAR_WAIT_MS).await;
            return;
        }
        while !self.with_runtime(|rt| rt.matrix.text_done()) {
            self.sleep(SLEEP_SLICE_MS).await;
        }
    }

    /// Wie `write_text(.., 1, true)`, ohne dabei MQTT-Nachrichten zu verarbeiten
    pub(crate) async fn write_text_blocking(&mut self, text: &str) {
        self.with_runtime(|rt| rt.matrix.write_text(text, Cycles::Remaining(1)));
        while !self.with_runtime(|rt| rt.matrix.text_done()) {
            self.delay.delay_ms(SLEEP_SLICE_MS).await;
        }
    }

    /// Icon im Hex- oder Binärformat; ungültige Icons werden ignoriert
    pub fn draw_icon(&mut self, icon: &str) -> bool {
        match self.with_runtime(|rt| rt.matrix.draw_icon(icon)) {
            Ok(()) => true,
            Err(e) => {
                warn!("MATRIX: Ignoring icon: {}", e);
                false
            }
        }
    }

    pub fn draw_icon_bits(&mut self, bits: u32) {
        self.with_runtime(|rt| rt.matrix.draw_icon_bits(bits));
    }

    pub fn clear_matrix(&mut self) {
        self.with_runtime(|rt| rt.matrix.clear());
    }

    pub fn show_status(&mut self, status: u8) {
        self.with_runtime(|rt| rt.matrix.show_status(status));
    }

    pub fn show_id(&mut self) {
        let id = self.info.id_value();
        self.with_runtime(|rt| rt.matrix.show_id(id));
    }

    pub fn clicked(&mut self, button: Button) -> bool {
        self.with_runtime(|rt| rt.input.clicked(button))
    }

    pub fn clicked_both(&mut self) -> bool {
        self.with_runtime(|rt| rt.input.clicked_both())
    }

    pub fn is_down(&self, button: Button) -> bool {
        self.with_runtime(|rt| rt.input.is_down(button))
    }

    pub fn pin_clicked(&mut self, pin: IoPin) -> bool {
        self.with_runtime(|rt| rt.input.pin_clicked(pin))
    }

    // ========================================================================
    // Zeit + Logging
    // ========================================================================

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Wartet `ms` und bedient dabei den MQTT-Client in 100-ms-Scheiben
    pub async fn sleep(&mut self, ms: u32) {
        if ms < SLEEP_SLICE_MS {
            self.delay.delay_ms(ms).await;
            return;
        }
        let deadline = self.clock.now_ms() + u64::from(ms);
        loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                break;
            }
            if self.mqtt_enabled && self.mqtt.is_connected() {
                self.pump().await;
            }
            let slice = (deadline - now).min(u64::from(SLEEP_SLICE_MS)) as u32;
            self.delay.delay_ms(slice).await;
        }
    }

    /// Protokolliert eine Zeile; bei aktivem MQTT-Log auch an den Broker
    pub async fn log(&mut self, line: &str) {
        info!("LOG: {}", line);
        if self.session.log_mirroring && self.mqtt.is_connected() {
            let topic = self.session.topics.status_topic(STATUS_LOG);
            self.publish_raw(&topic, line).await;
        }
    }

    pub fn set_log_mirroring(&mut self, on: bool) {
        self.session.log_mirroring = on;
    }

    /// Registriert den Anwendungs-Callback für MQTT-Nachrichten
    pub fn on_message(&mut self, handler: MessageHandler<'a>) {
        self.handler = Some(handler);
    }

    pub fn restart(&mut self) {
        info!("SYSTEM: Restarting");
        self.system.restart();
    }
}

/// Liest eine Datei als UTF-8; Fehler ergeben ""
pub(crate) fn read_text<'b, S: Storage>(storage: &mut S, path: &str, buf: &'b mut [u8]) -> &'b str {
    match storage.read(path, buf) {
        Ok(len) => match core::str::from_utf8(&buf[..len]) {
            Ok(text) => text,
            Err(_) => {
                warn!("STORAGE: {} is not valid UTF-8", path);
                ""
            }
        },
        Err(StorageError::NotFound) => {
            debug!("STORAGE: {} not found", path);
            ""
        }
        Err(e) => {
            warn!("STORAGE: Reading {} failed: {}", path, e);
            ""
        }
    }
}
