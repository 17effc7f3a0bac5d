// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

// Heap Allocator (WiFi und Portal-Formulare benötigen dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Ipv4Address, Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;

// ESP32-C6 HAL
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::{
    self, DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType,
};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::Flex;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rmt::PulseCode;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_smartled::smart_led_buffer;
use esp_storage::FlashStorage;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

use defmt::{error, info, warn};

// Board-Runtime
use board_core::color::{GREEN, STATE_ERROR, STATE_UPDATE};
use board_core::config::DeviceConfig;
use board_core::scheduler::share;
use board_core::{
    Board, BoardRuntime, BoardSettings, Button, Cycles, DeviceInfo, Effect, Ht16k33, PlatformParts,
};

// Projekt-Module und Konfiguration
use esp_lernboard::config::*;
use esp_lernboard::hal::{
    BoardPins, EmbassyClock, EspSystem, FlashFileStore, LED_BUFFER_SIZE, RmtLedWriter, SharedFlash,
    reset_reason_name, station_mac,
};
use esp_lernboard::tasks::{
    ChannelMqttTransport, EspWifiRadio, HttpUpdateService, MqttLink, mqtt_session_task, net_task,
    tick_task,
};
use esp_lernboard::{EspPlatform, FirmwareBoard, FirmwareRuntime};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Firmware-Version, wie sie der Update-Server sieht
const FIRMWARE_VERSION: &str = concat!("esp-lernboard_", env!("CARGO_PKG_VERSION"));

/// Kanal zwischen Board und MQTT-Session-Task
static MQTT_LINK: MqttLink = MqttLink::new();

// Boot-Fortschritt auf der Matrix (Anzahl dunkler Pixel von oben links)
const BOOT_TICKER: u8 = 1;
const BOOT_STORAGE: u8 = 2;
const BOOT_CONFIG: u8 = 3;
const BOOT_BEFORE_WIFI: u8 = 4;
const BOOT_WIFI_DONE: u8 = 15;
const BOOT_MQTT_DONE: u8 = 16;
const BOOT_NEARLY_DONE: u8 = 20;

/// Main Entry Point
///
/// Initialisiert Hardware, WiFi und die geteilte Runtime, spawnt die Tasks
/// und fährt danach die Boot-Sequenz des Boards. Anschließend bedient
/// main() das Board im Demo-Loop.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator: reclaimed RAM für WiFi + extra Bereich
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    info!("BOOT: Reset reason {}", reset_reason_name());

    // ========================================================================
    // Tick-Kontext: Matrix, LED, Pins
    // ========================================================================

    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQUENCY_KHZ)),
    )
    .expect("Failed to initialize I2C")
    .with_sda(peripherals.GPIO6)
    .with_scl(peripherals.GPIO7);

    let mut matrix = Ht16k33::new(i2c);
    if let Err(e) = matrix.init(MATRIX_BRIGHTNESS) {
        // Ohne Matrix läuft der Rest weiter, nur die Anzeige bleibt dunkel
        error!("MATRIX: HT16K33 not responding: {}", e);
    }

    static LED_BUFFER: StaticCell<[PulseCode; LED_BUFFER_SIZE]> = StaticCell::new();
    let led_buffer = LED_BUFFER.init(smart_led_buffer!(1));
    let led = RmtLedWriter::new(peripherals.GPIO8, peripherals.RMT, RMT_CLOCK_MHZ, led_buffer);

    let pins = BoardPins::new([
        Flex::new(peripherals.GPIO2),
        Flex::new(peripherals.GPIO3),
        Flex::new(peripherals.GPIO4),
        Flex::new(peripherals.GPIO5),
    ]);

    static RUNTIME: StaticCell<FirmwareRuntime> = StaticCell::new();
    let runtime: &'static FirmwareRuntime = RUNTIME.init(share(BoardRuntime::new(matrix, led, pins)));
    spawner.must_spawn(tick_task(runtime));

    // ========================================================================
    // Flash: Partitionen + Dateispeicher
    // ========================================================================

    static FLASH: StaticCell<SharedFlash> = StaticCell::new();
    let flash: &'static SharedFlash = FLASH.init(Mutex::new(FlashStorage::new(peripherals.FLASH)));
    let data_partition = prepare_flash(flash).await;

    // ========================================================================
    // WiFi + Netzwerk-Stacks (Station mit DHCP, Access-Point statisch)
    // ========================================================================

    static RADIO_INIT: StaticCell<esp_radio::Controller> = StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // MQTT, Update-Client, DNS, DHCP-Client
    static STA_RESOURCES: StaticCell<StackResources<STA_SOCKETS>> = StaticCell::new();
    let (sta_stack, sta_runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::new()),
        seed,
    );

    // Portal-HTTP, DHCP-Server
    let [a, b, c, d] = AP_ADDRESS;
    let ap_config = NetConfig::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), 24),
        gateway: Some(Ipv4Address::new(a, b, c, d)),
        dns_servers: Default::default(),
    });
    static AP_RESOURCES: StaticCell<StackResources<AP_SOCKETS>> = StaticCell::new();
    let (ap_stack, ap_runner) = embassy_net::new(
        interfaces.ap,
        ap_config,
        AP_RESOURCES.init(StackResources::new()),
        seed.wrapping_add(1),
    );

    spawner.must_spawn(net_task(sta_runner));
    spawner.must_spawn(net_task(ap_runner));
    spawner.must_spawn(mqtt_session_task(sta_stack, &MQTT_LINK));

    // ========================================================================
    // Board
    // ========================================================================

    let info = DeviceInfo {
        mac: station_mac(),
        reset_reason: reset_reason_name(),
        board_number: BOARD_NUMBER,
        device_type: DEVICE_TYPE,
        name_prefix: NAME_PREFIX,
    };
    let parts = PlatformParts::<EspPlatform> {
        wifi: EspWifiRadio::new(wifi_controller, sta_stack, ap_stack),
        mqtt: ChannelMqttTransport::new(&MQTT_LINK),
        storage: FlashFileStore::new(flash, data_partition),
        updater: HttpUpdateService::new(sta_stack, flash),
        system: EspSystem,
        delay: embassy_time::Delay,
        clock: EmbassyClock,
    };
    let mut board: FirmwareBoard = Board::new(runtime, parts, info, BoardSettings::default());
    info!("BOOT: Board {}", board.name().as_str());

    boot(&mut board).await;

    // ========================================================================
    // Demo-Loop: Taster A zeigt ein Herz, Taster B die Board-ID
    // ========================================================================

    loop {
        if board.clicked(Button::A) {
            board.draw_icon_bits(board_core::icons::ICON_HEART);
            board.publish("button", "A").await;
        }
        if board.clicked(Button::B) {
            board.show_id();
            board.publish("button", "B").await;
        }
        board.loop_once().await;
        board.sleep(100).await;
    }
}

/// Liest die Partitionstabelle, bestätigt das laufende OTA-Image und liefert
/// Offset und Größe der Daten-Partition für den Dateispeicher
async fn prepare_flash(flash: &'static SharedFlash) -> Option<(u32, u32)> {
    let mut flash = flash.lock().await;
    let mut table_buffer = [0u8; PARTITION_TABLE_MAX_LEN];

    let store = match partitions::read_partition_table(&mut *flash, &mut table_buffer) {
        Ok(table) => match table.find_partition(PartitionType::Data(DataPartitionSubType::Spiffs)) {
            Ok(Some(entry)) => Some((entry.offset(), entry.len())),
            _ => None,
        },
        Err(e) => {
            error!("BOOT: Reading partition table failed: {}", defmt::Debug2Format(&e));
            None
        }
    };

    // Ein frisch geflashtes Image gilt als gut, sobald es bis hier bootet
    if let Ok(mut ota) = OtaUpdater::new(&mut *flash, &mut table_buffer) {
        if let Ok(OtaImageState::New | OtaImageState::PendingVerify) = ota.current_ota_state() {
            info!("BOOT: Marking OTA image valid");
            if ota.set_current_ota_state(OtaImageState::Valid).is_err() {
                warn!("BOOT: Could not mark OTA image valid");
            }
        }
    }

    store
}

/// Standort-Defaults aus dem Build, `/conf.json` überschreibt sie
fn apply_site_defaults(config: &mut DeviceConfig) {
    fn set<const N: usize>(target: &mut heapless::String<N>, value: &str) {
        target.clear();
        let _ = target.push_str(value);
    }

    set(&mut config.broker_host, DEFAULT_BROKER);
    config.broker_port = DEFAULT_BROKER_PORT;
    set(&mut config.broker_user, DEFAULT_BROKER_USER);
    set(&mut config.broker_password, DEFAULT_BROKER_PASSWORD);
    set(&mut config.update_server, DEFAULT_UPDATE_SERVER);
    set(&mut config.platform_password, DEFAULT_PLATFORM_PASSWORD);
    set(&mut config.fw_version, FIRMWARE_VERSION);
}

/// Boot-Sequenz: Konfiguration, WLAN, MQTT, Begrüßung
async fn boot(board: &mut FirmwareBoard) {
    // Alle Pixel an, dann Fortschritt herunterzählen
    board.show_status(0);
    board.set_color_effect(board_core::color::CYAN, Effect::FLASH, Cycles::Forever);
    board.show_status(BOOT_TICKER);

    apply_site_defaults(board.config_mut());
    let node_name = board.name();
    board.config_mut().node_name = node_name;
    board.show_status(BOOT_STORAGE);

    if board.load_config() {
        info!("BOOT: Configuration loaded");
    }
    board.set_log_mirroring(MQTT_LOG_AT_BOOT);
    board.show_status(BOOT_CONFIG);

    board.clear_color();
    board.show_status(BOOT_BEFORE_WIFI);

    // Tasten sind erst nach ein paar Ticks entprellt
    Timer::after(Duration::from_millis(200)).await;
    let portal = board.is_down(Button::B);
    let show_id = !portal && board.is_down(Button::A);
    if portal {
        info!("BOOT: Button B held, starting provisioning portal");
    } else if show_id {
        board.show_id();
    }

    let wifi = board.wifi_setup(portal, false, false).await;
    if wifi {
        board.show_status(BOOT_WIFI_DONE);
        board.mqtt_setup().await;
        board.show_status(BOOT_MQTT_DONE);
    }

    // ID bleibt stehen, bis Taster B gedrückt wird (z.B. zum Zuordnen am Server)
    if wifi && show_id {
        board.update_status(true).await;
        board.show_id();
        board.set_color_effect(STATE_UPDATE, Effect::BLINK, Cycles::Forever);
        while !board.is_down(Button::B) {
            board.sleep(1000).await;
            info!("BOOT: Waiting for button B...");
        }
    }
    board.show_status(BOOT_NEARLY_DONE);

    board.clear_matrix();
    board.write_text(WELCOME_TEXT, Cycles::Remaining(1), false).await;

    if wifi {
        board.set_color_effect(GREEN, Effect::On, Cycles::Remaining(10));
    } else {
        board.set_color_effect(STATE_ERROR, Effect::BLINK, Cycles::Forever);
    }
    info!("BOOT: Done");
}
