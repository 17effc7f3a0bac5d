//! Gemeinsame Mocks für die Integrationstests
//!
//! Tick-seitige Mocks (LED, Bus, Pins) gehören der Runtime und werden über
//! `with_runtime` geprüft. Foreground-Mocks teilen ihren Zustand per
//! `Rc<RefCell<..>>` mit dem Test.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::rc::Rc;

use board_core::board::BoardSettings;
use board_core::matrix::{BlinkRate, MatrixBuffer};
use board_core::scheduler::{self, SharedRuntime};
use board_core::traits::MAX_SCAN_RESULTS;
use board_core::wifi::{RetryPolicy, WifiSettings};
use board_core::{
    Board, BoardRuntime, BusError, Clock, ConfigRequest, ConnectOptions, Credential, DeviceInfo, FirmwareUpdate,
    InboundMessage, IoPin, KeyScan, LedError, MatrixBus, MqttError, MqttTransport, PinDirection, PinIo, Platform,
    PlatformParts, ScanResult, SmartLedWriter, Storage, StorageError, SystemControl, UpdateError, UpdateService,
    WifiError, WifiRadio,
};
use embedded_hal_async::delay::DelayNs;
use rgb::RGB8;

// ============================================================================
// Tick-Kontext: LED, Matrix-Bus, Pins
// ============================================================================

#[derive(Default)]
pub struct MockLedWriter {
    pub writes: Vec<RGB8>,
    pub fail_next_write: bool,
}

impl MockLedWriter {
    pub fn last(&self) -> Option<RGB8> {
        self.writes.last().copied()
    }
}

impl SmartLedWriter for MockLedWriter {
    fn write(&mut self, color: RGB8) -> Result<(), LedError> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(LedError::WriteFailed);
        }
        self.writes.push(color);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockBus {
    pub frames: Vec<MatrixBuffer>,
    pub keys: KeyScan,
    pub brightness: Vec<u8>,
    pub blink: Vec<BlinkRate>,
    pub fail_writes: bool,
    pub fail_keys: bool,
}

impl MatrixBus for MockBus {
    fn write_display(&mut self, rows: &MatrixBuffer) -> Result<(), BusError> {
        if self.fail_writes {
            return Err(BusError::Transfer);
        }
        self.frames.push(*rows);
        Ok(())
    }

    fn read_keys(&mut self) -> Result<KeyScan, BusError> {
        if self.fail_keys {
            return Err(BusError::Transfer);
        }
        Ok(self.keys)
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), BusError> {
        self.brightness.push(level);
        Ok(())
    }

    fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<(), BusError> {
        self.blink.push(rate);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPins {
    pub levels: [bool; 4],
    pub low: [bool; 4],
    pub directions: [Option<PinDirection>; 4],
}

impl PinIo for MockPins {
    fn configure(&mut self, pin: IoPin, direction: PinDirection) {
        self.directions[pin.index()] = Some(direction);
    }

    fn set_level(&mut self, pin: IoPin, high: bool) {
        self.levels[pin.index()] = high;
    }

    fn is_low(&mut self, pin: IoPin) -> bool {
        self.low[pin.index()]
    }
}

pub type TestRuntime = SharedRuntime<MockBus, MockLedWriter, MockPins>;

pub fn runtime() -> TestRuntime {
    scheduler::share(BoardRuntime::new(MockBus::default(), MockLedWriter::default(), MockPins::default()))
}

// ============================================================================
// Simulierte Zeit: jede Verzögerung treibt den Tick-Kontext an
// ============================================================================

#[derive(Clone, Default)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }
}

pub struct SimDelay<'a> {
    clock: SimClock,
    runtime: &'a TestRuntime,
}

impl SimDelay<'_> {
    fn advance_us(&mut self, us: u64) {
        const TICK_US: u64 = board_core::TICK_PERIOD_MS as u64 * 1000;
        let before = self.clock.now_us.get();
        let after = before + us;
        self.clock.now_us.set(after);
        for _ in 0..(after / TICK_US - before / TICK_US) {
            board_core::run_tick(self.runtime);
        }
    }
}

impl DelayNs for SimDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance_us(u64::from(ns) / 1000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance_us(u64::from(ms) * 1000);
    }
}

// ============================================================================
// Foreground: WLAN, MQTT, Speicher, Updates, System
// ============================================================================

#[derive(Default)]
pub struct WifiState {
    /// Erreichbare Netze (SSID → Passphrase)
    pub reachable: HashMap<String, String>,
    pub scan: Vec<ScanResult>,
    pub connected: Option<String>,
    /// Jeder Assoziierungsversuch (SSID)
    pub attempts: Vec<String>,
    pub provision_result: Option<Credential>,
    pub provision_calls: usize,
}

pub struct MockWifi(pub Rc<RefCell<WifiState>>);

impl WifiRadio for MockWifi {
    async fn connect(&mut self, credential: &Credential) -> Result<(), WifiError> {
        let mut state = self.0.borrow_mut();
        let ssid = credential.ssid.as_str().to_string();
        state.attempts.push(ssid.clone());
        let ok = state.reachable.get(&ssid).map(|p| p == credential.passphrase.as_str()).unwrap_or(false);
        if ok {
            state.connected = Some(ssid);
            Ok(())
        } else {
            Err(WifiError::AssociationFailed)
        }
    }

    fn is_connected(&mut self) -> bool {
        self.0.borrow().connected.is_some()
    }

    async fn scan(&mut self, results: &mut heapless::Vec<ScanResult, MAX_SCAN_RESULTS>) -> Result<(), WifiError> {
        for r in self.0.borrow().scan.iter() {
            let _ = results.push(r.clone());
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.0.borrow_mut().connected = None;
    }

    async fn provision(&mut self, _ap_name: &str, _timeout_ms: u32) -> Option<Credential> {
        let mut state = self.0.borrow_mut();
        state.provision_calls += 1;
        state.provision_result.clone()
    }
}

#[derive(Default)]
pub struct MqttState {
    pub connected: bool,
    pub reject_connect: bool,
    pub connects: usize,
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub published: Vec<(String, String)>,
    pub inbound: VecDeque<InboundMessage>,
}

impl MqttState {
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(InboundMessage::new(topic, payload).unwrap());
    }
}

pub struct MockMqtt(pub Rc<RefCell<MqttState>>);

impl MqttTransport for MockMqtt {
    async fn connect(&mut self, _options: &ConnectOptions) -> Result<(), MqttError> {
        let mut state = self.0.borrow_mut();
        state.connects += 1;
        if state.reject_connect {
            return Err(MqttError::ConnectFailed);
        }
        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.0.borrow_mut().subscribed.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.0.borrow_mut().unsubscribed.push(topic.to_string());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.0.borrow_mut().published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn poll(&mut self) -> Option<InboundMessage> {
        self.0.borrow_mut().inbound.pop_front()
    }

    async fn disconnect(&mut self) {
        self.0.borrow_mut().connected = false;
    }
}

#[derive(Clone, Default)]
pub struct MockStorage {
    pub files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    /// Kein Dateispeicher vorhanden (z.B. fehlende Daten-Partition)
    pub unavailable: Rc<Cell<bool>>,
}

impl MockStorage {
    pub fn put(&self, path: &str, content: &str) {
        self.files.borrow_mut().insert(path.to_string(), content.as_bytes().to_vec());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files
            .borrow()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl Storage for MockStorage {
    fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.unavailable.get() {
            return Err(StorageError::Io);
        }
        let files = self.files.borrow();
        let data = files.get(path).ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::TooLarge);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.unavailable.get() {
            return Err(StorageError::Io);
        }
        self.files.borrow_mut().insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

pub struct UpdaterState {
    pub config_response: Result<String, UpdateError>,
    pub firmware: FirmwareUpdate,
    pub config_requests: Vec<(String, String)>,
}

impl Default for UpdaterState {
    fn default() -> Self {
        Self {
            config_response: Err(UpdateError::Status(304)),
            firmware: FirmwareUpdate::NoUpdate,
            config_requests: Vec::new(),
        }
    }
}

pub struct MockUpdater(pub Rc<RefCell<UpdaterState>>);

impl UpdateService for MockUpdater {
    async fn fetch_config(
        &mut self,
        server: &str,
        request: &ConfigRequest<'_>,
        body: &mut [u8],
    ) -> Result<usize, UpdateError> {
        let mut state = self.0.borrow_mut();
        state.config_requests.push((server.to_string(), request.mac.to_string()));
        let json = state.config_response.clone()?;
        body[..json.len()].copy_from_slice(json.as_bytes());
        Ok(json.len())
    }

    async fn update_firmware(&mut self, _server: &str, _request: &ConfigRequest<'_>) -> FirmwareUpdate {
        self.0.borrow().firmware
    }
}

pub struct MockSystem(pub Rc<Cell<usize>>);

impl SystemControl for MockSystem {
    fn restart(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

pub struct MockPlatform<'a>(PhantomData<&'a ()>);

impl<'a> Platform for MockPlatform<'a> {
    type Bus = MockBus;
    type Led = MockLedWriter;
    type Pins = MockPins;
    type Wifi = MockWifi;
    type Mqtt = MockMqtt;
    type Storage = MockStorage;
    type Updater = MockUpdater;
    type System = MockSystem;
    type Delay = SimDelay<'a>;
    type Clock = SimClock;
}

// ============================================================================
// Harness
// ============================================================================

pub const BROKER_CONFIG: &str =
    r#"{"configbrokerurl":"broker.local","configupdateserver":"update.local","fw_version":"1.2.3","platformpassword":"pw123"}"#;

pub fn device_info() -> DeviceInfo {
    DeviceInfo {
        mac: [0x5C, 0xCF, 0x7F, 0x4F, 0x2A, 0x10],
        reset_reason: "PowerOn",
        board_number: 7,
        device_type: "ESP32C6",
        name_prefix: "Lernboard",
    }
}

/// Kurze Wartezeiten, damit die Tests schnell simulieren
pub fn fast_settings() -> BoardSettings {
    let quick = RetryPolicy { attempts: 2, delay_ms: 100 };
    BoardSettings {
        wifi: WifiSettings {
            last_used: quick,
            forced: quick,
            scanned: quick,
            provisioning_timeout_ms: 1000,
        },
        mqtt: quick,
        base_topic: "",
    }
}

pub struct Harness {
    pub runtime: TestRuntime,
    pub clock: SimClock,
    pub wifi: Rc<RefCell<WifiState>>,
    pub mqtt: Rc<RefCell<MqttState>>,
    pub storage: MockStorage,
    pub updater: Rc<RefCell<UpdaterState>>,
    pub restarts: Rc<Cell<usize>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            runtime: runtime(),
            clock: SimClock::default(),
            wifi: Rc::default(),
            mqtt: Rc::default(),
            storage: MockStorage::default(),
            updater: Rc::default(),
            restarts: Rc::default(),
        }
    }

    /// Board mit einem erreichbaren Netz, gespeicherten Zugangsdaten und Broker-Konfiguration
    pub fn online() -> Self {
        let h = Self::new();
        h.wifi.borrow_mut().reachable.insert("Heim".into(), "geheim".into());
        h.storage.put("/wifi.conf", "Heim=geheim\n");
        h.storage.put("/conf.json", BROKER_CONFIG);
        h
    }

    pub fn board(&self) -> Board<'_, MockPlatform<'_>> {
        let parts = PlatformParts {
            wifi: MockWifi(self.wifi.clone()),
            mqtt: MockMqtt(self.mqtt.clone()),
            storage: self.storage.clone(),
            updater: MockUpdater(self.updater.clone()),
            system: MockSystem(self.restarts.clone()),
            delay: SimDelay {
                clock: self.clock.clone(),
                runtime: &self.runtime,
            },
            clock: self.clock.clone(),
        };
        let mut board = Board::new(&self.runtime, parts, device_info(), fast_settings());
        board.load_config();
        board
    }

    pub fn ticks(&self) -> u32 {
        self.runtime.lock(|rt| rt.borrow().ticks())
    }
}

pub type Runtime = BoardRuntime<MockBus, MockLedWriter, MockPins>;

/// Direkter Zugriff auf die Runtime unter dem Mutex
pub fn with_rt<R>(runtime: &TestRuntime, f: impl FnOnce(&mut Runtime) -> R) -> R {
    runtime.lock(|cell| f(&mut cell.borrow_mut()))
}

pub fn tick_n(runtime: &TestRuntime, n: usize) {
    for _ in 0..n {
        board_core::run_tick(runtime);
    }
}
