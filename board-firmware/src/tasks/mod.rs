// Task-Modul: Embassy Tasks und die Netzwerk-Dienste des Boards
//
// tick: 50-ms-Takt für LED, Matrix und Eingänge
// wifi/portal: Station-Modus und Provisioning-Access-Point
// mqtt: Session-Task mit Channel-Anbindung an das Board
// update: Konfigurations- und Firmware-Updates über HTTP

pub mod dns;
pub mod mqtt;
pub mod portal;
pub mod tick;
pub mod update;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use mqtt::{ChannelMqttTransport, MqttLink, mqtt_session_task};
pub use tick::tick_task;
pub use update::HttpUpdateService;
pub use wifi::{EspWifiRadio, net_task};
