// Hardware Abstraction Layer (HAL) Module
//
// Implementierungen der board-core Traits für den ESP32-C6.

pub mod flash_store;
pub mod led_writer;
pub mod pins;
pub mod system;

pub use flash_store::{FlashFileStore, SharedFlash};
pub use led_writer::{LED_BUFFER_SIZE, RmtLedWriter};
pub use pins::BoardPins;
pub use system::{EmbassyClock, EspSystem, reset_reason_name, station_mac};
